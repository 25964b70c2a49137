//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("user not found")]
    UserNotFound,

    #[error("group not found")]
    GroupNotFound,

    #[error("message not found")]
    MessageNotFound,

    #[error("notification not found")]
    NotificationNotFound,

    #[error("event not found")]
    EventNotFound,

    #[error("post not found")]
    PostNotFound,

    #[error("follow request not found")]
    FollowRequestNotFound,

    #[error("cannot follow yourself")]
    SelfFollow,

    #[error("already following this user")]
    AlreadyFollowing,

    #[error("follow request already pending")]
    FollowRequestPending,

    #[error("not following this user")]
    NotFollowing,

    #[error("user is not an accepted member of the group")]
    NotGroupMember,

    #[error("membership already exists")]
    MembershipExists,

    #[error("no pending membership to respond to")]
    MembershipNotPending,

    #[error("messaging not allowed between these users")]
    MessagingNotAllowed,

    #[error("group creators cannot leave their own group")]
    CannotLeaveAsCreator,

    #[error("operation not allowed")]
    OperationNotAllowed,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
