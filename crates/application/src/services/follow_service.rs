//! 关注关系服务。
//!
//! 状态机：`none -> pending -> accepted | declined`；终态之后允许
//! 重新发起，旧行被新的 pending 行替换。accepted 时向 followers
//! 表幂等写入 accepted 边。

use std::sync::Arc;

use domain::{DomainError, FollowStatus, User, UserId};
use tracing::warn;

use crate::clock::Clock;
use crate::error::ApplicationResult;
use crate::repository::{FollowRepository, FollowRequestView, UserRepository};
use crate::services::notification_service::NotificationService;

/// follow 动作的结果：公开主页直接成边，私密主页进入请求流程。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    RequestSent,
}

pub struct FollowServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub follow_repository: Arc<dyn FollowRepository>,
    pub notifications: Arc<NotificationService>,
    pub clock: Arc<dyn Clock>,
}

pub struct FollowService {
    deps: FollowServiceDependencies,
}

impl FollowService {
    pub fn new(deps: FollowServiceDependencies) -> Self {
        Self { deps }
    }

    async fn resolve(&self, nickname: &str) -> ApplicationResult<User> {
        Ok(self
            .deps
            .user_repository
            .find_by_nickname(nickname)
            .await?
            .ok_or(DomainError::UserNotFound)?)
    }

    /// 发起关注。目标公开则直接建边；私密则挂起请求并通知对方。
    pub async fn follow(
        &self,
        requester: UserId,
        target_nickname: &str,
    ) -> ApplicationResult<FollowOutcome> {
        let target = self.resolve(target_nickname).await?;
        if target.id == requester {
            return Err(DomainError::SelfFollow.into());
        }
        if self
            .deps
            .follow_repository
            .edge_exists(requester, target.id)
            .await?
        {
            return Err(DomainError::AlreadyFollowing.into());
        }

        let now = self.deps.clock.now();
        match self
            .deps
            .follow_repository
            .find_request(requester, target.id)
            .await?
        {
            Some(request) if request.status == FollowStatus::Pending => {
                return Err(DomainError::FollowRequestPending.into());
            }
            // 终态行（declined/accepted）被新的 pending 替换
            Some(_) | None => {
                self.deps
                    .follow_repository
                    .replace_request(requester, target.id, now)
                    .await?;
            }
        }

        if target.is_public() {
            // 公开主页：立即成边（幂等），请求行标记 accepted
            self.deps
                .follow_repository
                .insert_accepted_edge(requester, target.id, now)
                .await?;
            if let Some(request) = self
                .deps
                .follow_repository
                .find_request(requester, target.id)
                .await?
            {
                self.deps
                    .follow_repository
                    .set_request_status(request.id, FollowStatus::Accepted, now)
                    .await?;
            }
            Ok(FollowOutcome::Followed)
        } else {
            // 通知失败不回滚请求行
            if let Err(err) = self
                .deps
                .notifications
                .follow_requested(target.id, requester)
                .await
            {
                warn!(target = %target.id, error = %err, "follow request notification failed");
            }
            Ok(FollowOutcome::RequestSent)
        }
    }

    /// 取消关注：删边并清理请求行；本就没有边则 NotFollowing。
    pub async fn unfollow(
        &self,
        follower: UserId,
        target_nickname: &str,
    ) -> ApplicationResult<()> {
        let target = self.resolve(target_nickname).await?;
        let removed = self
            .deps
            .follow_repository
            .delete_edge(follower, target.id)
            .await?;
        self.deps
            .follow_repository
            .delete_requests(follower, target.id)
            .await?;
        if removed {
            Ok(())
        } else {
            Err(DomainError::NotFollowing.into())
        }
    }

    /// 应答关注请求。只有请求的目标本人可以应答 pending 行。
    /// accept 幂等建边并回声通知请求者；decline 只翻状态。
    pub async fn respond(
        &self,
        target: UserId,
        request_id: i64,
        accept: bool,
    ) -> ApplicationResult<()> {
        let request = self
            .deps
            .follow_repository
            .find_request_by_id(request_id)
            .await?
            .filter(|r| r.target == target && r.status == FollowStatus::Pending)
            .ok_or(DomainError::FollowRequestNotFound)?;

        let now = self.deps.clock.now();
        if accept {
            self.deps
                .follow_repository
                .set_request_status(request.id, FollowStatus::Accepted, now)
                .await?;
            self.deps
                .follow_repository
                .insert_accepted_edge(request.requester, target, now)
                .await?;
            if let Err(err) = self
                .deps
                .notifications
                .follow_accepted(request.requester, target)
                .await
            {
                warn!(requester = %request.requester, error = %err,
                    "follow accepted notification failed");
            }
        } else {
            self.deps
                .follow_repository
                .set_request_status(request.id, FollowStatus::Declined, now)
                .await?;
        }
        Ok(())
    }

    pub async fn list_followers(&self, user: UserId) -> ApplicationResult<Vec<User>> {
        Ok(self.deps.follow_repository.list_followers(user).await?)
    }

    pub async fn list_following(&self, user: UserId) -> ApplicationResult<Vec<User>> {
        Ok(self.deps.follow_repository.list_following(user).await?)
    }

    pub async fn pending_requests(
        &self,
        user: UserId,
    ) -> ApplicationResult<Vec<FollowRequestView>> {
        Ok(self.deps.follow_repository.pending_requests(user).await?)
    }
}
