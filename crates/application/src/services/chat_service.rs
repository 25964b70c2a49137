//! 聊天消息路由服务（C8 的语义部分）。
//!
//! 传输层在 web-api 侧：那边负责握手、读循环与拆除；
//! 这里负责盖戳、鉴权、落库与投递。落库永远先于投递，
//! 落库失败时不做任何投递。

use std::sync::Arc;

use domain::{GroupId, MessageBody, UserId};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::dto::{
    ChatListItem, ClientFrame, ErrorFrame, InboundFrame, OutboundFrame, WireMessage,
};
use crate::error::{ApplicationError, ApplicationResult};
use crate::registry::{ConnectionGuard, ConnectionRegistry, DeliveryStatus};
use crate::repository::{GroupRepository, MessageRepository, UserRepository};
use crate::visibility::VisibilityOracle;

/// 私信被拒时回给发送者的文案（群消息违规静默丢弃，防探测）。
const PRIVATE_DENIED: &str =
    "Cannot send message: You must follow this user or they must have a public profile";

pub struct ChatServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub group_repository: Arc<dyn GroupRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub oracle: Arc<VisibilityOracle>,
    pub registry: Arc<ConnectionRegistry>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.deps.registry
    }

    /// 注册一条新连接：解析已接受群组作为连接缓存，attach（驱逐旧
    /// 连接），然后向全体在线连接广播在线名单。
    pub async fn connect(
        &self,
        user: UserId,
        sender: tokio::sync::mpsc::UnboundedSender<OutboundFrame>,
    ) -> ApplicationResult<ConnectionGuard> {
        let groups = match self.deps.group_repository.accepted_group_ids(user).await {
            Ok(groups) => groups,
            Err(err) => {
                // 群组解析失败不阻断连接，按无群处理
                warn!(user = %user, error = %err, "failed to load groups on connect");
                Vec::new()
            }
        };
        info!(user = %user, groups = groups.len(), "user connected");
        let guard = self.deps.registry.attach(user, groups, sender);
        self.deps.registry.broadcast_presence();
        Ok(guard)
    }

    /// 处理一帧入站消息。入站顺序即处理顺序（单连接读循环串行调用）。
    /// 返回 Err 表示帧无法解析，调用方应关闭连接。
    pub async fn handle_frame(&self, sender: UserId, frame: InboundFrame) -> ApplicationResult<()> {
        let frame = frame.classify()?;
        let sent_at = self.deps.clock.now();
        let sender_name = self.nickname_of(sender).await;

        match frame {
            ClientFrame::Private { receiver, content } => {
                self.handle_private(sender, sender_name, receiver, content, sent_at)
                    .await
            }
            ClientFrame::Group { group, content } => {
                self.handle_group(sender, sender_name, group, content, sent_at)
                    .await
            }
            ClientFrame::TypingPrivate { receiver } => {
                let wire = WireMessage {
                    kind: "typing",
                    sender_id: sender.0,
                    receiver_id: Some(receiver.0),
                    group_id: None,
                    content: String::new(),
                    sent_at: sent_at.to_rfc3339(),
                    sender_name,
                };
                // typing 从不落库
                self.deps.registry.deliver(receiver, OutboundFrame::Chat(wire));
                Ok(())
            }
            ClientFrame::TypingGroup { group } => {
                let wire = OutboundFrame::Chat(WireMessage {
                    kind: "typing",
                    sender_id: sender.0,
                    receiver_id: None,
                    group_id: Some(group.0),
                    content: String::new(),
                    sent_at: sent_at.to_rfc3339(),
                    sender_name,
                });
                // 群 typing 用连接缓存的群组过滤，排除发送者
                self.deps.registry.broadcast_snapshot(&wire, |user, groups| {
                    user != sender && groups.contains(&group)
                });
                Ok(())
            }
        }
    }

    async fn handle_private(
        &self,
        sender: UserId,
        sender_name: String,
        receiver: UserId,
        content: String,
        sent_at: domain::Timestamp,
    ) -> ApplicationResult<()> {
        let allowed = match self.deps.oracle.can_send_private(sender, receiver).await {
            Ok(allowed) => allowed,
            Err(err) => {
                error!(sender = %sender, receiver = %receiver, error = %err,
                    "permission check failed, dropping private message");
                return Ok(());
            }
        };
        if !allowed {
            info!(sender = %sender, receiver = %receiver, "private message denied");
            self.error_to(sender, PRIVATE_DENIED);
            return Ok(());
        }

        let body = match MessageBody::new(content) {
            Ok(body) => body,
            Err(err) => {
                self.error_to(sender, format!("Cannot send message: {err}"));
                return Ok(());
            }
        };

        // 先落库，失败则不投递
        if let Err(err) = self
            .deps
            .message_repository
            .append_private(sender, receiver, body.as_str(), sent_at)
            .await
        {
            error!(sender = %sender, receiver = %receiver, error = %err,
                "failed to persist private message");
            self.error_to(sender, "Failed to send message");
            return Ok(());
        }

        let wire = WireMessage {
            kind: "private",
            sender_id: sender.0,
            receiver_id: Some(receiver.0),
            group_id: None,
            content: body.into_string(),
            sent_at: sent_at.to_rfc3339(),
            sender_name,
        };
        self.deps.registry.deliver(receiver, OutboundFrame::Chat(wire));
        Ok(())
    }

    async fn handle_group(
        &self,
        sender: UserId,
        sender_name: String,
        group: GroupId,
        content: String,
        sent_at: domain::Timestamp,
    ) -> ApplicationResult<()> {
        let allowed = match self.deps.oracle.can_send_group(sender, group).await {
            Ok(allowed) => allowed,
            Err(err) => {
                error!(sender = %sender, group = %group, error = %err,
                    "membership check failed, dropping group message");
                return Ok(());
            }
        };
        if !allowed {
            // 静默丢弃：不回错误帧，避免探测群成员关系
            info!(sender = %sender, group = %group, "group message from non-member dropped");
            return Ok(());
        }

        let body = match MessageBody::new(content) {
            Ok(body) => body,
            Err(_) => {
                debug!(sender = %sender, group = %group, "empty group message dropped");
                return Ok(());
            }
        };

        if let Err(err) = self
            .deps
            .message_repository
            .append_group(group, sender, body.as_str(), sent_at)
            .await
        {
            error!(sender = %sender, group = %group, error = %err,
                "failed to persist group message");
            return Ok(());
        }

        // 扇出目标实时解析（不是连接缓存）：投递时刻的 accepted 成员
        let members = match self.deps.group_repository.accepted_member_ids(group).await {
            Ok(members) => members,
            Err(err) => {
                error!(group = %group, error = %err, "failed to resolve group members");
                return Ok(());
            }
        };

        let wire = WireMessage {
            kind: "group",
            sender_id: sender.0,
            receiver_id: None,
            group_id: Some(group.0),
            content: body.into_string(),
            sent_at: sent_at.to_rfc3339(),
            sender_name,
        };
        for member in members {
            if member == sender {
                continue;
            }
            if self
                .deps
                .registry
                .deliver(member, OutboundFrame::Chat(wire.clone()))
                == DeliveryStatus::Error
            {
                warn!(member = %member, group = %group, "group fan-out delivery failed");
            }
        }
        Ok(())
    }

    /// 私聊历史：比 offset 更旧的最新 20 行，降序。读权限与发信一致。
    pub async fn page_private(
        &self,
        viewer: UserId,
        other: UserId,
        offset: i64,
    ) -> ApplicationResult<Vec<domain::PrivateMessage>> {
        if !self
            .deps
            .oracle
            .can_read_conversation(viewer, other)
            .await?
        {
            return Err(ApplicationError::Authorization);
        }
        Ok(self
            .deps
            .message_repository
            .page_private(viewer, other, offset)
            .await?)
    }

    /// 群聊历史：仅 accepted 成员可读。
    pub async fn page_group(
        &self,
        viewer: UserId,
        group: GroupId,
        offset: i64,
    ) -> ApplicationResult<Vec<domain::GroupMessage>> {
        if !self.deps.oracle.can_read_group(viewer, group).await? {
            return Err(ApplicationError::Authorization);
        }
        Ok(self.deps.message_repository.page_group(group, offset).await?)
    }

    /// 聊天目录：已关注用户 + 已加入群组，按最近一条消息排序，
    /// 用户条目带在线标记。
    pub async fn chat_list(&self, user: UserId) -> ApplicationResult<Vec<ChatListItem>> {
        let partners = self.deps.message_repository.chat_partners(user).await?;
        let groups = self.deps.message_repository.chat_groups(user).await?;

        let mut items: Vec<(domain::Timestamp, ChatListItem)> =
            Vec::with_capacity(partners.len() + groups.len());
        for partner in partners {
            let is_online = self.deps.registry.is_online(partner.id);
            items.push((
                partner.last_message_time,
                ChatListItem {
                    id: partner.id.0,
                    kind: "user",
                    name: partner.name,
                    profile_type: Some(partner.profile_type),
                    last_message_time: partner.last_message_time.to_rfc3339(),
                    last_message: partner.last_message,
                    is_online: Some(is_online),
                    member_count: None,
                },
            ));
        }
        for group in groups {
            items.push((
                group.last_message_time,
                ChatListItem {
                    id: group.id.0,
                    kind: "group",
                    name: group.name,
                    profile_type: None,
                    last_message_time: group.last_message_time.to_rfc3339(),
                    last_message: group.last_message,
                    is_online: None,
                    member_count: Some(group.member_count),
                },
            ));
        }
        items.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(items.into_iter().map(|(_, item)| item).collect())
    }

    async fn nickname_of(&self, user: UserId) -> String {
        match self.deps.user_repository.find_by_id(user).await {
            Ok(Some(u)) => u.nickname.into_string(),
            Ok(None) => String::new(),
            Err(err) => {
                debug!(user = %user, error = %err, "nickname lookup failed");
                String::new()
            }
        }
    }

    /// 给某个在线 principal 回一帧错误（不在线则丢弃）。
    fn error_to(&self, user: UserId, message: impl Into<String>) {
        self.deps
            .registry
            .deliver(user, OutboundFrame::Error(ErrorFrame::new(message)));
    }
}
