//! 通知生产与日志操作（C5 + C9）。
//!
//! 生产者契约：先解析名字（查不到用兜底文案，绝不因此失败），
//! 再落库；落库失败直接返回错误、不推送。推送是尽力而为：
//! 收件人不在线算成功，通道错误只记日志，不回滚日志行。

use std::sync::Arc;

use domain::{
    EventId, GroupId, NewNotification, Notification, NotificationId, NotificationKind, UserId,
};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::dto::{NotificationFrame, NotificationView, OutboundFrame};
use crate::error::ApplicationResult;
use crate::registry::{ConnectionRegistry, DeliveryStatus};
use crate::repository::{
    EventRepository, GroupRepository, NotificationRepository, UserRepository,
};

/// 通知分页的返回体（带总数，供前端分页）。
#[derive(Debug, Clone, serde::Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

pub struct NotificationServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub group_repository: Arc<dyn GroupRepository>,
    pub notification_repository: Arc<dyn NotificationRepository>,
    pub event_repository: Arc<dyn EventRepository>,
    pub registry: Arc<ConnectionRegistry>,
    pub clock: Arc<dyn Clock>,
}

pub struct NotificationService {
    deps: NotificationServiceDependencies,
}

impl NotificationService {
    pub fn new(deps: NotificationServiceDependencies) -> Self {
        Self { deps }
    }

    /// 落库然后尝试实时推送。推送帧带上展示名（行里只有外键）。
    async fn produce(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        message: String,
        related_user: Option<UserId>,
        related_group: Option<GroupId>,
        sender_name: Option<String>,
        group_name: Option<String>,
    ) -> ApplicationResult<Notification> {
        let mut stored = self
            .deps
            .notification_repository
            .append(
                NewNotification {
                    recipient,
                    kind,
                    message,
                    related_user,
                    related_group,
                },
                self.deps.clock.now(),
            )
            .await?;
        stored.sender_name = sender_name;
        stored.group_name = group_name;

        let frame = OutboundFrame::Notification(NotificationFrame::new(NotificationView::from(
            stored.clone(),
        )));
        match self.deps.registry.deliver(recipient, frame) {
            DeliveryStatus::Delivered => {
                info!(recipient = %recipient, kind = kind.as_str(), "notification pushed");
            }
            DeliveryStatus::Absent => {
                info!(recipient = %recipient, kind = kind.as_str(),
                    "recipient offline, notification stored only");
            }
            DeliveryStatus::Error => {
                // 日志行已经保留了事件，客户端下次拉取时对账
                warn!(recipient = %recipient, kind = kind.as_str(), "notification push failed");
            }
        }
        Ok(stored)
    }

    async fn nickname_or(&self, user: UserId, fallback: &str) -> String {
        match self.deps.user_repository.find_by_id(user).await {
            Ok(Some(u)) => u.nickname.into_string(),
            _ => fallback.to_owned(),
        }
    }

    async fn group_title_or(&self, group: GroupId, fallback: &str) -> String {
        match self.deps.group_repository.find_by_id(group).await {
            Ok(Some(g)) => g.title,
            _ => fallback.to_owned(),
        }
    }

    // ---- 领域事件入口（C9） ----

    /// 关注请求：通知私密主页的被关注者。
    pub async fn follow_requested(
        &self,
        target: UserId,
        requester: UserId,
    ) -> ApplicationResult<Notification> {
        let name = self.nickname_or(requester, "Someone").await;
        self.produce(
            target,
            NotificationKind::FollowRequest,
            format!("{name} sent you a follow request"),
            Some(requester),
            None,
            Some(name.clone()),
            None,
        )
        .await
    }

    /// 关注请求被接受：回声给请求者。
    pub async fn follow_accepted(
        &self,
        requester: UserId,
        accepter: UserId,
    ) -> ApplicationResult<Notification> {
        let name = self.nickname_or(accepter, "Someone").await;
        self.produce(
            requester,
            NotificationKind::FollowRequest,
            format!("{name} accepted your follow request"),
            Some(accepter),
            None,
            Some(name.clone()),
            None,
        )
        .await
    }

    /// 群组邀请。
    pub async fn group_invited(
        &self,
        target: UserId,
        inviter: UserId,
        group: GroupId,
    ) -> ApplicationResult<Notification> {
        let name = self.nickname_or(inviter, "Someone").await;
        let title = self.group_title_or(group, "a group").await;
        self.produce(
            target,
            NotificationKind::GroupInvite,
            format!("{name} invited you to join '{title}'"),
            Some(inviter),
            Some(group),
            Some(name.clone()),
            Some(title.clone()),
        )
        .await
    }

    /// 加群申请：通知群主。
    pub async fn group_join_requested(
        &self,
        creator: UserId,
        requester: UserId,
        group: GroupId,
    ) -> ApplicationResult<Notification> {
        let name = self.nickname_or(requester, "Someone").await;
        let title = self.group_title_or(group, "your group").await;
        self.produce(
            creator,
            NotificationKind::GroupRequest,
            format!("{name} requested to join '{title}'"),
            Some(requester),
            Some(group),
            Some(name.clone()),
            Some(title.clone()),
        )
        .await
    }

    /// 加群申请的裁决回声：通知申请者。
    pub async fn join_request_answered(
        &self,
        requester: UserId,
        creator: UserId,
        group: GroupId,
        accepted: bool,
    ) -> ApplicationResult<Notification> {
        let title = self.group_title_or(group, "the group").await;
        let verdict = if accepted { "accepted" } else { "rejected" };
        self.produce(
            requester,
            NotificationKind::GroupRequest,
            format!("Your request to join '{title}' was {verdict}"),
            Some(creator),
            Some(group),
            None,
            Some(title.clone()),
        )
        .await
    }

    /// 邀请的应答回声：通知发出邀请的一方（群主）。
    pub async fn invitation_answered(
        &self,
        creator: UserId,
        responder: UserId,
        group: GroupId,
        accepted: bool,
    ) -> ApplicationResult<Notification> {
        let name = self.nickname_or(responder, "Someone").await;
        let title = self.group_title_or(group, "the group").await;
        let verdict = if accepted { "accepted" } else { "declined" };
        self.produce(
            creator,
            NotificationKind::Other,
            format!("{name} {verdict} your invitation to join '{title}'"),
            Some(responder),
            Some(group),
            Some(name.clone()),
            Some(title.clone()),
        )
        .await
    }

    /// 活动创建：通知除创建者外的全体 accepted 成员。
    /// 单个收件人的落库失败只记日志，不影响其他人。
    pub async fn event_created(
        &self,
        group: GroupId,
        creator: UserId,
        event_title: &str,
    ) -> ApplicationResult<usize> {
        let name = self.nickname_or(creator, "Someone").await;
        let title = self.group_title_or(group, "your group").await;
        let message = format!("{name} created a new event '{event_title}' in {title}");

        let members = self.deps.group_repository.accepted_member_ids(group).await?;
        let mut notified = 0usize;
        for member in members {
            if member == creator {
                continue;
            }
            match self
                .produce(
                    member,
                    NotificationKind::GroupEvent,
                    message.clone(),
                    Some(creator),
                    Some(group),
                    Some(name.clone()),
                    Some(title.clone()),
                )
                .await
            {
                Ok(_) => notified += 1,
                Err(err) => {
                    warn!(member = %member, group = %group, error = %err,
                        "failed to create event notification");
                }
            }
        }
        Ok(notified)
    }

    /// 活动提醒：发给回复 going 的成员。
    pub async fn event_reminder(
        &self,
        event: EventId,
        reminder: &str,
    ) -> ApplicationResult<usize> {
        let event = self
            .deps
            .event_repository
            .find_by_id(event)
            .await?
            .ok_or(domain::DomainError::EventNotFound)?;
        let title = self.group_title_or(event.group, "the group").await;
        let message = format!("Reminder: '{}' {reminder}", event.title);

        let attendees = self
            .deps
            .event_repository
            .going_member_ids(event.id, event.group)
            .await?;
        let mut notified = 0usize;
        for member in attendees {
            match self
                .produce(
                    member,
                    NotificationKind::GroupEvent,
                    message.clone(),
                    Some(event.creator),
                    Some(event.group),
                    None,
                    Some(title.clone()),
                )
                .await
            {
                Ok(_) => notified += 1,
                Err(err) => {
                    warn!(member = %member, event = %event.id, error = %err,
                        "failed to create event reminder");
                }
            }
        }
        Ok(notified)
    }

    // ---- 日志操作 ----

    /// 只有收件人本人能翻转 read；不命中按不存在处理。
    pub async fn mark_read(&self, user: UserId, id: NotificationId) -> ApplicationResult<()> {
        if self.deps.notification_repository.mark_read(user, id).await? {
            Ok(())
        } else {
            Err(domain::DomainError::NotificationNotFound.into())
        }
    }

    pub async fn mark_all_read(&self, user: UserId) -> ApplicationResult<u64> {
        Ok(self.deps.notification_repository.mark_all_read(user).await?)
    }

    pub async fn count_unread(&self, user: UserId) -> ApplicationResult<i64> {
        Ok(self.deps.notification_repository.count_unread(user).await?)
    }

    pub async fn delete(&self, user: UserId, id: NotificationId) -> ApplicationResult<()> {
        if self.deps.notification_repository.delete(user, id).await? {
            Ok(())
        } else {
            Err(domain::DomainError::NotificationNotFound.into())
        }
    }

    /// 分页读取，并在同一逻辑操作里把返回的行标记为已读
    /// （read-on-fetch 契约；只想轮询的客户端用 unread_only）。
    pub async fn page(
        &self,
        user: UserId,
        limit: i64,
        offset: i64,
        unread_only: bool,
    ) -> ApplicationResult<NotificationPage> {
        let rows = self
            .deps
            .notification_repository
            .page(user, limit, offset, unread_only)
            .await?;
        let total_count = self
            .deps
            .notification_repository
            .count_total(user, unread_only)
            .await?;

        if !rows.is_empty() {
            let ids: Vec<NotificationId> = rows.iter().map(|n| n.id).collect();
            if let Err(err) = self
                .deps
                .notification_repository
                .mark_read_many(user, &ids)
                .await
            {
                warn!(user = %user, error = %err, "failed to mark fetched notifications read");
            }
        }

        Ok(NotificationPage {
            notifications: rows,
            total_count,
            limit,
            offset,
        })
    }
}
