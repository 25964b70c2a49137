//! Web API 层：HTTP 路由、JWT 认证与 WebSocket 调度器。

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws_connection;

pub use auth::{Claims, JwtService};
pub use config::JwtConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
