//! 实时通道上的帧定义。
//!
//! 入站帧是按 `type` 区分的和类型（缺省视为 private）；
//! 出站帧统一走 `OutboundFrame`，每个变体自带 `type` 字面量。

use domain::{DomainError, GroupId, Notification, UserId};
use serde::{Deserialize, Serialize};

/// 客户端入站帧的原始形态。服务端负责盖 sender/sent_at 戳，
/// 客户端传来的这两个字段一律忽略。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub receiver_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub content: String,
}

/// 分类后的入站帧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Private { receiver: UserId, content: String },
    Group { group: GroupId, content: String },
    TypingPrivate { receiver: UserId },
    TypingGroup { group: GroupId },
}

impl InboundFrame {
    /// 按 `type` 字段分类；缺省按 private 处理（与线上契约一致）。
    pub fn classify(self) -> Result<ClientFrame, DomainError> {
        match self.kind.as_deref() {
            Some("typing") => {
                if let Some(group) = self.group_id.filter(|id| *id > 0) {
                    Ok(ClientFrame::TypingGroup {
                        group: GroupId::new(group),
                    })
                } else if let Some(receiver) = self.receiver_id {
                    Ok(ClientFrame::TypingPrivate {
                        receiver: UserId::new(receiver),
                    })
                } else {
                    Err(DomainError::invalid_argument(
                        "typing",
                        "requires receiver_id or group_id",
                    ))
                }
            }
            Some("group") => {
                let group = self.group_id.ok_or_else(|| {
                    DomainError::invalid_argument("group_id", "required for group messages")
                })?;
                Ok(ClientFrame::Group {
                    group: GroupId::new(group),
                    content: self.content,
                })
            }
            _ => {
                let receiver = self.receiver_id.ok_or_else(|| {
                    DomainError::invalid_argument("receiver_id", "required for private messages")
                })?;
                Ok(ClientFrame::Private {
                    receiver: UserId::new(receiver),
                    content: self.content,
                })
            }
        }
    }
}

/// 服务端补全后的聊天帧（私聊 / 群聊 / typing 共用一个线格式）。
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sender_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub content: String,
    pub sent_at: String,
    pub sender_name: String,
}

/// 在线名单快照帧，每次成员变化后全量下发。
#[derive(Debug, Clone, Serialize)]
pub struct PresenceFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub online_users: Vec<i64>,
}

impl PresenceFrame {
    pub fn new(online_users: Vec<i64>) -> Self {
        Self {
            kind: "online_users",
            online_users,
        }
    }
}

/// 通知的线上视图。
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
    pub read_status: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_group_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.0,
            user_id: n.recipient.0,
            kind: n.kind.as_str(),
            message: n.message,
            read_status: n.read,
            created_at: n.created_at.to_rfc3339(),
            related_user_id: n.related_user.map(|u| u.0),
            related_group_id: n.related_group.map(|g| g.0),
            sender_name: n.sender_name,
            group_name: n.group_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub notification: NotificationView,
}

impl NotificationFrame {
    pub fn new(notification: NotificationView) -> Self {
        Self {
            kind: "notification",
            notification,
        }
    }
}

/// 握手成功回执。
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedFrame {
    pub status: &'static str,
    pub user_id: String,
}

impl ConnectedFrame {
    pub fn new(user_id: UserId) -> Self {
        Self {
            status: "connected",
            user_id: user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorFrame {
    pub error: String,
}

impl ErrorFrame {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// 服务端出站帧的和类型。serde 按变体自身结构序列化。
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Chat(WireMessage),
    Presence(PresenceFrame),
    Notification(NotificationFrame),
    Connected(ConnectedFrame),
    Error(ErrorFrame),
}

/// 聊天目录条目（用户与群合并排序后的视图）。
#[derive(Debug, Clone, Serialize)]
pub struct ChatListItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<String>,
    pub last_message_time: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_type_defaults_to_private() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"receiver_id": 7, "content": "hi"}"#).unwrap();
        assert_eq!(
            frame.classify().unwrap(),
            ClientFrame::Private {
                receiver: UserId(7),
                content: "hi".to_owned()
            }
        );
    }

    #[test]
    fn typing_prefers_group_over_receiver() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type":"typing","group_id":3,"receiver_id":7,"content":""}"#)
                .unwrap();
        assert_eq!(
            frame.classify().unwrap(),
            ClientFrame::TypingGroup { group: GroupId(3) }
        );
    }

    #[test]
    fn typing_without_target_is_rejected() {
        let frame: InboundFrame = serde_json::from_str(r#"{"type":"typing"}"#).unwrap();
        assert!(frame.classify().is_err());
    }

    #[test]
    fn group_frame_requires_group_id() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type":"group","content":"hello"}"#).unwrap();
        assert!(frame.classify().is_err());
    }

    #[test]
    fn client_supplied_stamps_are_ignored() {
        // sender_id / sent_at 不在入站结构里，客户端伪造无效。
        let frame: InboundFrame = serde_json::from_str(
            r#"{"receiver_id":1,"content":"x","sender_id":999,"sent_at":"2001-01-01T00:00:00Z","sender_name":"fake"}"#,
        )
        .unwrap();
        assert!(frame.classify().is_ok());
    }

    #[test]
    fn presence_frame_serializes_with_type_tag() {
        let json =
            serde_json::to_string(&OutboundFrame::Presence(PresenceFrame::new(vec![1, 2]))).unwrap();
        assert_eq!(json, r#"{"type":"online_users","online_users":[1,2]}"#);
    }
}
