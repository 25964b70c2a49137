//! 关注关系与关注请求。
//!
//! 关注边是有向的：`follower -> following`。同一有序对最多一行；
//! 被拒绝后允许重新发起请求，旧行被新的 pending 行替换。

use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId};

/// 关注请求状态机：`pending -> accepted | declined`。
/// 终态之后允许重新进入 pending（替换旧行）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Pending,
    Accepted,
    Declined,
}

impl FollowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "accepted" => Self::Accepted,
            "declined" => Self::Declined,
            _ => Self::Pending,
        }
    }

    /// 终态行可以被一条新的 pending 请求替换。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }
}

/// `followers` 表的一行：已建立（或待定）的关注边。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: UserId,
    pub following: UserId,
    pub status: FollowStatus,
    pub requested_at: Timestamp,
}

/// `follow_requests` 表的一行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub id: i64,
    pub requester: UserId,
    pub target: UserId,
    pub status: FollowStatus,
    pub created_at: Timestamp,
    pub responded_at: Option<Timestamp>,
}
