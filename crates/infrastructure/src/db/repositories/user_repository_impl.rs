//! 用户仓储实现（对核心只读）。

use std::sync::Arc;

use application::UserRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Nickname, ProfileVisibility, RepositoryError, User, UserId};
use sqlx::{query_as, FromRow};

use crate::db::{map_sqlx_err, DbPool};

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: i64,
    nickname: String,
    profile_type: String,
    created_at: DateTime<Utc>,
}

impl DbUser {
    fn into_user(self) -> Result<User, RepositoryError> {
        let nickname = Nickname::parse(self.nickname)
            .map_err(|err| RepositoryError::storage(format!("invalid nickname in row: {err}")))?;
        Ok(User {
            id: UserId(self.id),
            nickname,
            visibility: ProfileVisibility::parse(&self.profile_type),
            created_at: self.created_at,
        })
    }
}

pub struct PostgresUserRepository {
    pool: Arc<DbPool>,
}

impl PostgresUserRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = query_as::<_, DbUser>(
            "SELECT id, nickname, profile_type, created_at FROM users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row.map(DbUser::into_user).transpose()
    }

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<User>, RepositoryError> {
        let row = query_as::<_, DbUser>(
            "SELECT id, nickname, profile_type, created_at FROM users WHERE nickname = $1",
        )
        .bind(nickname)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row.map(DbUser::into_user).transpose()
    }
}
