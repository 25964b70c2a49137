//! 社交图仓储实现。
//!
//! followers 表存边，follow_requests 表存请求；同一有序对的请求
//! 在重新发起时整行替换（事务内先删后插）。

use std::sync::Arc;

use application::{FollowRepository, FollowRequestView};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    FollowRequest, FollowStatus, Nickname, ProfileVisibility, RepositoryError, Timestamp, User,
    UserId,
};
use sqlx::{query, query_as, query_scalar, FromRow};

use crate::db::{map_sqlx_err, DbPool};

#[derive(Debug, Clone, FromRow)]
struct DbFollowRequest {
    id: i64,
    requester_id: i64,
    target_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

impl From<DbFollowRequest> for FollowRequest {
    fn from(row: DbFollowRequest) -> Self {
        Self {
            id: row.id,
            requester: UserId(row.requester_id),
            target: UserId(row.target_id),
            status: FollowStatus::parse(&row.status),
            created_at: row.created_at,
            responded_at: row.responded_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbUserRow {
    id: i64,
    nickname: String,
    profile_type: String,
    created_at: DateTime<Utc>,
}

fn into_user(row: DbUserRow) -> Result<User, RepositoryError> {
    let nickname = Nickname::parse(row.nickname)
        .map_err(|err| RepositoryError::storage(format!("invalid nickname in row: {err}")))?;
    Ok(User {
        id: UserId(row.id),
        nickname,
        visibility: ProfileVisibility::parse(&row.profile_type),
        created_at: row.created_at,
    })
}

pub struct PostgresFollowRepository {
    pool: Arc<DbPool>,
}

impl PostgresFollowRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowRepository for PostgresFollowRepository {
    async fn accepted_between(&self, a: UserId, b: UserId) -> Result<bool, RepositoryError> {
        query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM followers
                WHERE ((follower_id = $1 AND following_id = $2)
                    OR (follower_id = $2 AND following_id = $1))
                  AND status = 'accepted'
            )
            "#,
        )
        .bind(a.0)
        .bind(b.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn is_accepted(
        &self,
        follower: UserId,
        following: UserId,
    ) -> Result<bool, RepositoryError> {
        query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM followers
                WHERE follower_id = $1 AND following_id = $2 AND status = 'accepted'
            )
            "#,
        )
        .bind(follower.0)
        .bind(following.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn edge_exists(
        &self,
        follower: UserId,
        following: UserId,
    ) -> Result<bool, RepositoryError> {
        query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM followers WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower.0)
        .bind(following.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn insert_accepted_edge(
        &self,
        follower: UserId,
        following: UserId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        query(
            r#"
            INSERT INTO followers (follower_id, following_id, status, requested_at)
            VALUES ($1, $2, 'accepted', $3)
            ON CONFLICT (follower_id, following_id) DO NOTHING
            "#,
        )
        .bind(follower.0)
        .bind(following.0)
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn delete_edge(
        &self,
        follower: UserId,
        following: UserId,
    ) -> Result<bool, RepositoryError> {
        let result = query("DELETE FROM followers WHERE follower_id = $1 AND following_id = $2")
            .bind(follower.0)
            .bind(following.0)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_request(
        &self,
        requester: UserId,
        target: UserId,
    ) -> Result<Option<FollowRequest>, RepositoryError> {
        let row = query_as::<_, DbFollowRequest>(
            r#"
            SELECT id, requester_id, target_id, status, created_at, responded_at
            FROM follow_requests
            WHERE requester_id = $1 AND target_id = $2
            "#,
        )
        .bind(requester.0)
        .bind(target.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(FollowRequest::from))
    }

    async fn find_request_by_id(&self, id: i64) -> Result<Option<FollowRequest>, RepositoryError> {
        let row = query_as::<_, DbFollowRequest>(
            r#"
            SELECT id, requester_id, target_id, status, created_at, responded_at
            FROM follow_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(FollowRequest::from))
    }

    async fn replace_request(
        &self,
        requester: UserId,
        target: UserId,
        at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        query("DELETE FROM follow_requests WHERE requester_id = $1 AND target_id = $2")
            .bind(requester.0)
            .bind(target.0)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        query(
            r#"
            INSERT INTO follow_requests (requester_id, target_id, status, created_at)
            VALUES ($1, $2, 'pending', $3)
            "#,
        )
        .bind(requester.0)
        .bind(target.0)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        tx.commit().await.map_err(map_sqlx_err)
    }

    async fn set_request_status(
        &self,
        id: i64,
        status: FollowStatus,
        responded_at: Timestamp,
    ) -> Result<(), RepositoryError> {
        query("UPDATE follow_requests SET status = $2, responded_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(responded_at)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn delete_requests(
        &self,
        requester: UserId,
        target: UserId,
    ) -> Result<(), RepositoryError> {
        query("DELETE FROM follow_requests WHERE requester_id = $1 AND target_id = $2")
            .bind(requester.0)
            .bind(target.0)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn list_followers(&self, user: UserId) -> Result<Vec<User>, RepositoryError> {
        let rows = query_as::<_, DbUserRow>(
            r#"
            SELECT u.id, u.nickname, u.profile_type, u.created_at
            FROM users u
            JOIN followers f ON u.id = f.follower_id
            WHERE f.following_id = $1 AND f.status = 'accepted'
            ORDER BY f.requested_at DESC
            "#,
        )
        .bind(user.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(into_user).collect()
    }

    async fn list_following(&self, user: UserId) -> Result<Vec<User>, RepositoryError> {
        let rows = query_as::<_, DbUserRow>(
            r#"
            SELECT u.id, u.nickname, u.profile_type, u.created_at
            FROM users u
            JOIN followers f ON u.id = f.following_id
            WHERE f.follower_id = $1 AND f.status = 'accepted'
            ORDER BY f.requested_at DESC
            "#,
        )
        .bind(user.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(into_user).collect()
    }

    async fn pending_requests(
        &self,
        target: UserId,
    ) -> Result<Vec<FollowRequestView>, RepositoryError> {
        #[derive(FromRow)]
        struct Row {
            id: i64,
            requester_id: i64,
            nickname: String,
            created_at: DateTime<Utc>,
        }

        let rows = query_as::<_, Row>(
            r#"
            SELECT fr.id, fr.requester_id, u.nickname, fr.created_at
            FROM follow_requests fr
            JOIN users u ON fr.requester_id = u.id
            WHERE fr.target_id = $1 AND fr.status = 'pending'
            ORDER BY fr.created_at DESC
            "#,
        )
        .bind(target.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows
            .into_iter()
            .map(|row| FollowRequestView {
                request_id: row.id,
                requester_id: UserId(row.requester_id),
                requester_name: row.nickname,
                created_at: row.created_at,
            })
            .collect())
    }
}
