//! 基础设施层：仓储端口的 Postgres 实现。

pub mod db;

pub use db::repositories::{
    PostgresEventRepository, PostgresFollowRepository, PostgresGroupRepository,
    PostgresMessageRepository, PostgresNotificationRepository, PostgresPostRepository,
    PostgresUserRepository,
};
pub use db::{connect_pool, DbPool};
