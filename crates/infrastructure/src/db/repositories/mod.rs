mod event_repository_impl;
mod follow_repository_impl;
mod group_repository_impl;
mod message_repository_impl;
mod notification_repository_impl;
mod post_repository_impl;
mod user_repository_impl;

pub use event_repository_impl::PostgresEventRepository;
pub use follow_repository_impl::PostgresFollowRepository;
pub use group_repository_impl::PostgresGroupRepository;
pub use message_repository_impl::PostgresMessageRepository;
pub use notification_repository_impl::PostgresNotificationRepository;
pub use post_repository_impl::PostgresPostRepository;
pub use user_repository_impl::PostgresUserRepository;
