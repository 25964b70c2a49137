//! 应用层：端口、可见性判定、连接注册表与各服务。

pub mod clock;
pub mod dto;
pub mod error;
pub mod registry;
pub mod repository;
pub mod services;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{Clock, SystemClock};
pub use dto::{
    ChatListItem, ClientFrame, ConnectedFrame, ErrorFrame, InboundFrame, NotificationFrame,
    NotificationView, OutboundFrame, PresenceFrame, WireMessage,
};
pub use error::{ApplicationError, ApplicationResult};
pub use registry::{ConnectionGuard, ConnectionRegistry, DeliveryStatus};
pub use repository::{
    ChatGroupEntry, ChatPartner, EventRepository, FollowRepository, FollowRequestView,
    GroupRepository, MessageRepository, NotificationRepository, PostRepository, UserRepository,
    MESSAGE_PAGE_SIZE,
};
pub use services::{
    ChatService, ChatServiceDependencies, FollowOutcome, FollowService, FollowServiceDependencies,
    GroupService, GroupServiceDependencies, MembershipRequestKind, NotificationPage,
    NotificationService, NotificationServiceDependencies,
};
pub use visibility::VisibilityOracle;
