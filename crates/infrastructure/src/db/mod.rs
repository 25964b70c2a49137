//! 数据库连接与仓储实现。

pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// 建立连接池。配置错误应当让进程启动失败，而不是带病运行。
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    tracing::info!(max_connections, "database pool ready");
    Ok(pool)
}

/// sqlx 错误到仓储错误的统一映射。唯一约束冲突单独归类。
pub(crate) fn map_sqlx_err(err: sqlx::Error) -> domain::RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return domain::RepositoryError::Conflict;
        }
    }
    domain::RepositoryError::storage(err.to_string())
}
