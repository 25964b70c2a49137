pub mod chat_service;
pub mod follow_service;
pub mod group_service;
pub mod notification_service;

pub use chat_service::{ChatService, ChatServiceDependencies};
pub use follow_service::{FollowOutcome, FollowService, FollowServiceDependencies};
pub use group_service::{GroupService, GroupServiceDependencies, MembershipRequestKind};
pub use notification_service::{
    NotificationPage, NotificationService, NotificationServiceDependencies,
};

#[cfg(test)]
mod group_service_tests;
