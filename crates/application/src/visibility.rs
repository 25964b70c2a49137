//! 可见性判定（C7）。
//!
//! 纯谓词：只读组合 C1–C3 的查询，无副作用，可按请求缓存。
//! 注意反向的 accepted 边足以允许「私信」，但永远不等于「关注」。

use std::sync::Arc;

use domain::{GroupId, Post, PostId, PostPrivacy, UserId};

use crate::error::{ApplicationError, ApplicationResult};
use crate::repository::{FollowRepository, GroupRepository, PostRepository, UserRepository};

pub struct VisibilityOracle {
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
    groups: Arc<dyn GroupRepository>,
    posts: Arc<dyn PostRepository>,
}

impl VisibilityOracle {
    pub fn new(
        users: Arc<dyn UserRepository>,
        follows: Arc<dyn FollowRepository>,
        groups: Arc<dyn GroupRepository>,
        posts: Arc<dyn PostRepository>,
    ) -> Self {
        Self {
            users,
            follows,
            groups,
            posts,
        }
    }

    /// 私信准入：
    /// - 双方都是 public，或
    /// - 任一方向存在 accepted 关注边，或
    /// - 接收方是 public。
    /// 自己发给自己恒为 false。查不到的用户按拒绝处理。
    pub async fn can_send_private(
        &self,
        sender: UserId,
        receiver: UserId,
    ) -> ApplicationResult<bool> {
        if sender == receiver {
            return Ok(false);
        }
        let sender_user = match self.users.find_by_id(sender).await? {
            Some(user) => user,
            None => return Ok(false),
        };
        let receiver_user = match self.users.find_by_id(receiver).await? {
            Some(user) => user,
            None => return Ok(false),
        };

        if sender_user.is_public() && receiver_user.is_public() {
            return Ok(true);
        }
        if self.follows.accepted_between(sender, receiver).await? {
            return Ok(true);
        }
        Ok(receiver_user.is_public())
    }

    /// 读会话历史与发私信的判定一致。
    pub async fn can_read_conversation(
        &self,
        viewer: UserId,
        other: UserId,
    ) -> ApplicationResult<bool> {
        self.can_send_private(viewer, other).await
    }

    pub async fn can_send_group(&self, sender: UserId, group: GroupId) -> ApplicationResult<bool> {
        self.membership_accepted(sender, group).await
    }

    pub async fn can_read_group(&self, viewer: UserId, group: GroupId) -> ApplicationResult<bool> {
        self.membership_accepted(viewer, group).await
    }

    async fn membership_accepted(&self, user: UserId, group: GroupId) -> ApplicationResult<bool> {
        let membership = self.groups.membership(user, group).await?;
        Ok(membership.is_some_and(|m| m.status.is_accepted()))
    }

    /// 帖子可见性：作者恒可见；public 全可见；almost_private 要求
    /// viewer 已被接受地关注作者；private 群帖要求群成员，
    /// 非群帖要求在白名单里。
    pub async fn post_visible(&self, viewer: UserId, post: &Post) -> ApplicationResult<bool> {
        if viewer == post.author {
            return Ok(true);
        }
        match post.privacy {
            PostPrivacy::Public => Ok(true),
            PostPrivacy::AlmostPrivate => {
                Ok(self.follows.is_accepted(viewer, post.author).await?)
            }
            PostPrivacy::Private => match post.group {
                Some(group) => self.membership_accepted(viewer, group).await,
                None => Ok(self.posts.is_allowed_follower(post.id, viewer).await?),
            },
        }
    }

    pub async fn post_visible_by_id(
        &self,
        viewer: UserId,
        post: PostId,
    ) -> ApplicationResult<bool> {
        let post = self
            .posts
            .find_by_id(post)
            .await?
            .ok_or(ApplicationError::Domain(domain::DomainError::PostNotFound))?;
        self.post_visible(viewer, &post).await
    }
}
