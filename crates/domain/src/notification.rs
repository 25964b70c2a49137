//! 通知实体。
//!
//! `read` 是唯一可变字段，且只能由收件人翻转。related_* 引用在
//! 创建时必须存在；之后被删除则展示端降级（名字缺省为空）。

use serde::{Deserialize, Serialize};

use crate::value_objects::{GroupId, NotificationId, Timestamp, UserId};

/// 通知类别。客户端依赖 kind 做结构化展示，body 只是渲染好的文案。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FollowRequest,
    GroupInvite,
    GroupRequest,
    GroupEvent,
    Other,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FollowRequest => "follow_request",
            Self::GroupInvite => "group_invite",
            Self::GroupRequest => "group_request",
            Self::GroupEvent => "group_event",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "follow_request" => Self::FollowRequest,
            "group_invite" => Self::GroupInvite,
            "group_request" => Self::GroupRequest,
            "group_event" => Self::GroupEvent,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub created_at: Timestamp,
    pub related_user: Option<UserId>,
    pub related_group: Option<GroupId>,
    /// 展示补充：related_user 的昵称，行已删除时为 None。
    pub sender_name: Option<String>,
    /// 展示补充：related_group 的标题。
    pub group_name: Option<String>,
}

/// 待写入的通知行（id 与时间戳由日志生成）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub related_user: Option<UserId>,
    pub related_group: Option<GroupId>,
}
