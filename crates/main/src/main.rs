//! 主应用程序入口
//!
//! 装配仓储、服务与路由，然后启动 Axum 服务。

use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, ConnectionRegistry, FollowService,
    FollowServiceDependencies, GroupService, GroupServiceDependencies, NotificationService,
    NotificationServiceDependencies, SystemClock, VisibilityOracle,
};
use config::AppConfig;
use infrastructure::{
    connect_pool, PostgresEventRepository, PostgresFollowRepository, PostgresGroupRepository,
    PostgresMessageRepository, PostgresNotificationRepository, PostgresPostRepository,
    PostgresUserRepository,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 配置错误时直接拒绝启动
    let config = AppConfig::load()?;

    tracing::info!("connecting to database...");
    let pool = Arc::new(connect_pool(&config.database.url, config.database.max_connections).await?);

    // 仓储
    let user_repository = Arc::new(PostgresUserRepository::new(pool.clone()));
    let follow_repository = Arc::new(PostgresFollowRepository::new(pool.clone()));
    let group_repository = Arc::new(PostgresGroupRepository::new(pool.clone()));
    let message_repository = Arc::new(PostgresMessageRepository::new(pool.clone()));
    let notification_repository = Arc::new(PostgresNotificationRepository::new(pool.clone()));
    let post_repository = Arc::new(PostgresPostRepository::new(pool.clone()));
    let event_repository = Arc::new(PostgresEventRepository::new(pool.clone()));

    // 进程级连接注册表与可见性判定
    let registry = Arc::new(ConnectionRegistry::new());
    let oracle = Arc::new(VisibilityOracle::new(
        user_repository.clone(),
        follow_repository.clone(),
        group_repository.clone(),
        post_repository,
    ));
    let clock = Arc::new(SystemClock);

    // 服务
    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        user_repository: user_repository.clone(),
        group_repository: group_repository.clone(),
        message_repository,
        oracle,
        registry: registry.clone(),
        clock: clock.clone(),
    }));

    let notification_service = Arc::new(NotificationService::new(
        NotificationServiceDependencies {
            user_repository: user_repository.clone(),
            group_repository: group_repository.clone(),
            notification_repository,
            event_repository: event_repository.clone(),
            registry,
            clock: clock.clone(),
        },
    ));

    let follow_service = Arc::new(FollowService::new(FollowServiceDependencies {
        user_repository: user_repository.clone(),
        follow_repository,
        notifications: notification_service.clone(),
        clock: clock.clone(),
    }));

    let group_service = Arc::new(GroupService::new(GroupServiceDependencies {
        user_repository,
        group_repository,
        event_repository,
        notifications: notification_service.clone(),
        clock,
    }));

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState::new(
        chat_service,
        notification_service,
        follow_service,
        group_service,
        jwt_service,
    );

    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("realtime server listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
