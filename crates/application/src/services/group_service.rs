//! 群组成员资格与活动服务。
//!
//! 成员状态机见 domain::group。这里只实现会触发通知（C9）或被
//! 调度器依赖的生命周期切片；群组的其余 CRUD 在外部服务。

use std::sync::Arc;

use domain::{
    DomainError, EventId, EventResponse, Group, GroupEvent, GroupId, GroupMembership,
    MembershipRole, MembershipStatus, Timestamp, UserId,
};
use tracing::warn;

use crate::clock::Clock;
use crate::error::ApplicationResult;
use crate::repository::{EventRepository, GroupRepository, UserRepository};
use crate::services::notification_service::NotificationService;

/// 待应答的成员关系类型：邀请由被邀请人应答，申请由群主应答。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipRequestKind {
    Invitation,
    JoinRequest,
}

pub struct GroupServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub group_repository: Arc<dyn GroupRepository>,
    pub event_repository: Arc<dyn EventRepository>,
    pub notifications: Arc<NotificationService>,
    pub clock: Arc<dyn Clock>,
}

pub struct GroupService {
    deps: GroupServiceDependencies,
}

impl GroupService {
    pub fn new(deps: GroupServiceDependencies) -> Self {
        Self { deps }
    }

    async fn require_group(&self, group: GroupId) -> ApplicationResult<Group> {
        Ok(self
            .deps
            .group_repository
            .find_by_id(group)
            .await?
            .ok_or(DomainError::GroupNotFound)?)
    }

    async fn accepted_membership(
        &self,
        user: UserId,
        group: GroupId,
    ) -> ApplicationResult<GroupMembership> {
        Ok(self
            .deps
            .group_repository
            .membership(user, group)
            .await?
            .filter(|m| m.status.is_accepted())
            .ok_or(DomainError::NotGroupMember)?)
    }

    /// 邀请用户入群。邀请人必须是 accepted 成员；目标已有任意状态的
    /// 成员行（包括待定的申请）则冲突。
    pub async fn invite(
        &self,
        inviter: UserId,
        target: UserId,
        group: GroupId,
    ) -> ApplicationResult<()> {
        self.require_group(group).await?;
        self.accepted_membership(inviter, group).await?;
        if self
            .deps
            .user_repository
            .find_by_id(target)
            .await?
            .is_none()
        {
            return Err(DomainError::UserNotFound.into());
        }
        if self
            .deps
            .group_repository
            .membership(target, group)
            .await?
            .is_some()
        {
            return Err(DomainError::MembershipExists.into());
        }

        self.deps
            .group_repository
            .insert_membership(target, group, MembershipRole::Member, MembershipStatus::Invited)
            .await?;

        if let Err(err) = self
            .deps
            .notifications
            .group_invited(target, inviter, group)
            .await
        {
            warn!(target = %target, group = %group, error = %err,
                "group invite notification failed");
        }
        Ok(())
    }

    /// 申请入群。已有成员行（含被邀请状态）则冲突；成功后通知群主。
    pub async fn request_join(&self, requester: UserId, group: GroupId) -> ApplicationResult<()> {
        let group_row = self.require_group(group).await?;
        if self
            .deps
            .group_repository
            .membership(requester, group)
            .await?
            .is_some()
        {
            return Err(DomainError::MembershipExists.into());
        }

        self.deps
            .group_repository
            .insert_membership(
                requester,
                group,
                MembershipRole::Member,
                MembershipStatus::Pending,
            )
            .await?;

        if let Err(err) = self
            .deps
            .notifications
            .group_join_requested(group_row.creator, requester, group)
            .await
        {
            warn!(group = %group, error = %err, "join request notification failed");
        }
        Ok(())
    }

    /// 应答邀请或加群申请。
    /// 邀请：只有被邀请人自己可应答，结果回声给群主。
    /// 申请：只有群主可应答，结果回声给申请者。
    /// accept 把行推进到 accepted；reject 删行。
    pub async fn respond(
        &self,
        actor: UserId,
        group: GroupId,
        kind: MembershipRequestKind,
        target: Option<UserId>,
        accept: bool,
    ) -> ApplicationResult<()> {
        let group_row = self.require_group(group).await?;

        let (subject, expected_status) = match kind {
            MembershipRequestKind::Invitation => (actor, MembershipStatus::Invited),
            MembershipRequestKind::JoinRequest => {
                if actor != group_row.creator {
                    return Err(DomainError::OperationNotAllowed.into());
                }
                let target = target.ok_or_else(|| {
                    DomainError::invalid_argument("target_user_id", "required for join_request")
                })?;
                (target, MembershipStatus::Pending)
            }
        };

        let membership = self
            .deps
            .group_repository
            .membership(subject, group)
            .await?
            .filter(|m| m.status == expected_status)
            .ok_or(DomainError::MembershipNotPending)?;
        debug_assert!(membership.may_respond(actor, group_row.creator));

        if accept {
            self.deps
                .group_repository
                .update_status(subject, group, MembershipStatus::Accepted, self.deps.clock.now())
                .await?;
        } else {
            self.deps
                .group_repository
                .remove_membership(subject, group)
                .await?;
        }

        // 裁决回声；失败不回滚成员行
        let echo = match kind {
            MembershipRequestKind::Invitation => {
                self.deps
                    .notifications
                    .invitation_answered(group_row.creator, actor, group, accept)
                    .await
            }
            MembershipRequestKind::JoinRequest => {
                self.deps
                    .notifications
                    .join_request_answered(subject, actor, group, accept)
                    .await
            }
        };
        if let Err(err) = echo {
            warn!(group = %group, error = %err, "membership decision notification failed");
        }
        Ok(())
    }

    /// 退群。群主不能退出自己的群。
    pub async fn leave(&self, user: UserId, group: GroupId) -> ApplicationResult<()> {
        let membership = self.accepted_membership(user, group).await?;
        if membership.role == MembershipRole::Creator {
            return Err(DomainError::CannotLeaveAsCreator.into());
        }
        self.deps.group_repository.remove_membership(user, group).await?;
        Ok(())
    }

    /// 移除成员。只有群主/管理员可操作；群主不可被移除；
    /// 管理员只有群主能移除；不能移除自己。
    pub async fn remove_member(
        &self,
        operator: UserId,
        group: GroupId,
        target: UserId,
    ) -> ApplicationResult<()> {
        let operator_membership = self.accepted_membership(operator, group).await?;
        if !operator_membership.role.can_manage_members() {
            return Err(DomainError::OperationNotAllowed.into());
        }
        let target_membership = self.accepted_membership(target, group).await?;

        if target_membership.role == MembershipRole::Creator
            || operator == target
            || (target_membership.role == MembershipRole::Admin
                && operator_membership.role != MembershipRole::Creator)
        {
            return Err(DomainError::OperationNotAllowed.into());
        }

        self.deps.group_repository.remove_membership(target, group).await?;
        Ok(())
    }

    /// 创建群组活动并通知其余 accepted 成员。
    pub async fn create_event(
        &self,
        creator: UserId,
        group: GroupId,
        title: &str,
        description: &str,
        event_time: Timestamp,
    ) -> ApplicationResult<GroupEvent> {
        self.require_group(group).await?;
        self.accepted_membership(creator, group).await?;
        if title.trim().is_empty() {
            return Err(DomainError::invalid_argument("title", "cannot be empty").into());
        }

        let event = self
            .deps
            .event_repository
            .insert(group, creator, title.trim(), description, event_time)
            .await?;

        if let Err(err) = self
            .deps
            .notifications
            .event_created(group, creator, &event.title)
            .await
        {
            warn!(group = %group, event = %event.id, error = %err,
                "event notifications failed");
        }
        Ok(event)
    }

    /// 回应活动（going / not_going），要求仍是群内 accepted 成员。
    pub async fn respond_event(
        &self,
        user: UserId,
        event: EventId,
        response: EventResponse,
    ) -> ApplicationResult<()> {
        let event_row = self
            .deps
            .event_repository
            .find_by_id(event)
            .await?
            .ok_or(DomainError::EventNotFound)?;
        self.accepted_membership(user, event_row.group).await?;
        self.deps
            .event_repository
            .upsert_response(event, user, response)
            .await?;
        Ok(())
    }
}
