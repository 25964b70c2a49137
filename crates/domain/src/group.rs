//! 群组与群组成员资格。
//!
//! 成员状态机：`none -> invited | pending -> accepted | removed`。
//! `invited` 由邀请人创建，`pending` 由加群申请创建；只有对应的
//! 另一方（被邀请人 / 群主）可以推进到 `accepted`。移除即删行。
//! 群主不可被移除，也不可退群。

use serde::{Deserialize, Serialize};

use crate::value_objects::{GroupId, Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    pub creator: UserId,
    pub created_at: Timestamp,
}

/// 群内角色。creator 建群时自动写入，状态恒为 accepted。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Creator,
    Admin,
    Member,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "creator" => Self::Creator,
            "admin" => Self::Admin,
            _ => Self::Member,
        }
    }

    pub fn can_manage_members(&self) -> bool {
        matches!(self, Self::Creator | Self::Admin)
    }
}

/// 成员状态。只有 accepted 才授予消息与可见性权利。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Invited,
    Pending,
    Accepted,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "invited" => Self::Invited,
            "accepted" => Self::Accepted,
            _ => Self::Pending,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// `group_memberships` 表的一行，(user, group) 上唯一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub user: UserId,
    pub group: GroupId,
    pub role: MembershipRole,
    pub status: MembershipStatus,
    pub joined_at: Option<Timestamp>,
}

impl GroupMembership {
    /// 判断 `responder` 是否是本行待定状态的合法应答方：
    /// 邀请由被邀请人应答，加群申请由群主应答。
    pub fn may_respond(&self, responder: UserId, group_creator: UserId) -> bool {
        match self.status {
            MembershipStatus::Invited => responder == self.user,
            MembershipStatus::Pending => responder == group_creator,
            MembershipStatus::Accepted => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn membership(status: MembershipStatus) -> GroupMembership {
        GroupMembership {
            user: UserId(2),
            group: GroupId(7),
            role: MembershipRole::Member,
            status,
            joined_at: Some(Utc::now()),
        }
    }

    #[test]
    fn invited_answered_by_invitee_only() {
        let m = membership(MembershipStatus::Invited);
        assert!(m.may_respond(UserId(2), UserId(1)));
        assert!(!m.may_respond(UserId(1), UserId(1)));
    }

    #[test]
    fn pending_answered_by_creator_only() {
        let m = membership(MembershipStatus::Pending);
        assert!(m.may_respond(UserId(1), UserId(1)));
        assert!(!m.may_respond(UserId(2), UserId(1)));
    }

    #[test]
    fn accepted_rows_have_no_pending_response() {
        let m = membership(MembershipStatus::Accepted);
        assert!(!m.may_respond(UserId(1), UserId(1)));
        assert!(!m.may_respond(UserId(2), UserId(1)));
    }
}
