//! 通知日志实现（C5）。
//!
//! 读路径 LEFT JOIN 关联用户/群组补展示名；被引用行已删除时
//! 名字为 NULL，展示端优雅降级。所有可变操作都带收件人过滤，
//! 所有权在 SQL 层面强制。

use std::sync::Arc;

use application::NotificationRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    GroupId, NewNotification, Notification, NotificationId, NotificationKind, RepositoryError,
    Timestamp, UserId,
};
use sqlx::{query, query_as, query_scalar, FromRow};

use crate::db::{map_sqlx_err, DbPool};

#[derive(Debug, Clone, FromRow)]
struct DbNotification {
    notification_id: i64,
    user_id: i64,
    #[sqlx(rename = "type")]
    kind: String,
    message: String,
    read_status: bool,
    created_at: DateTime<Utc>,
    related_user_id: Option<i64>,
    related_group_id: Option<i64>,
    sender_name: Option<String>,
    group_name: Option<String>,
}

impl From<DbNotification> for Notification {
    fn from(row: DbNotification) -> Self {
        Self {
            id: NotificationId(row.notification_id),
            recipient: UserId(row.user_id),
            kind: NotificationKind::parse(&row.kind),
            message: row.message,
            read: row.read_status,
            created_at: row.created_at,
            related_user: row.related_user_id.map(UserId),
            related_group: row.related_group_id.map(GroupId),
            sender_name: row.sender_name,
            group_name: row.group_name,
        }
    }
}

pub struct PostgresNotificationRepository {
    pool: Arc<DbPool>,
}

impl PostgresNotificationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn append(
        &self,
        notification: NewNotification,
        at: Timestamp,
    ) -> Result<Notification, RepositoryError> {
        let id = query_scalar::<_, i64>(
            r#"
            INSERT INTO notifications
                (user_id, type, message, read_status, created_at, related_user_id, related_group_id)
            VALUES ($1, $2, $3, FALSE, $4, $5, $6)
            RETURNING notification_id
            "#,
        )
        .bind(notification.recipient.0)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(at)
        .bind(notification.related_user.map(|u| u.0))
        .bind(notification.related_group.map(|g| g.0))
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Notification {
            id: NotificationId(id),
            recipient: notification.recipient,
            kind: notification.kind,
            message: notification.message,
            read: false,
            created_at: at,
            related_user: notification.related_user,
            related_group: notification.related_group,
            sender_name: None,
            group_name: None,
        })
    }

    async fn mark_read(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, RepositoryError> {
        let result = query(
            "UPDATE notifications SET read_status = TRUE WHERE notification_id = $1 AND user_id = $2",
        )
        .bind(id.0)
        .bind(recipient.0)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_read_many(
        &self,
        recipient: UserId,
        ids: &[NotificationId],
    ) -> Result<(), RepositoryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        query(
            "UPDATE notifications SET read_status = TRUE WHERE user_id = $1 AND notification_id = ANY($2)",
        )
        .bind(recipient.0)
        .bind(raw)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn mark_all_read(&self, recipient: UserId) -> Result<u64, RepositoryError> {
        let result = query(
            "UPDATE notifications SET read_status = TRUE WHERE user_id = $1 AND read_status = FALSE",
        )
        .bind(recipient.0)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn count_unread(&self, recipient: UserId) -> Result<i64, RepositoryError> {
        query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_status = FALSE",
        )
        .bind(recipient.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn delete(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<bool, RepositoryError> {
        let result = query("DELETE FROM notifications WHERE notification_id = $1 AND user_id = $2")
            .bind(id.0)
            .bind(recipient.0)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn page(
        &self,
        recipient: UserId,
        limit: i64,
        offset: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let sql = if unread_only {
            r#"
            SELECT n.notification_id, n.user_id, n.type, n.message, n.read_status, n.created_at,
                   n.related_user_id, n.related_group_id,
                   u.nickname AS sender_name, g.title AS group_name
            FROM notifications n
            LEFT JOIN users u ON n.related_user_id = u.id
            LEFT JOIN groups g ON n.related_group_id = g.group_id
            WHERE n.user_id = $1 AND n.read_status = FALSE
            ORDER BY n.created_at DESC
            LIMIT $2 OFFSET $3
            "#
        } else {
            r#"
            SELECT n.notification_id, n.user_id, n.type, n.message, n.read_status, n.created_at,
                   n.related_user_id, n.related_group_id,
                   u.nickname AS sender_name, g.title AS group_name
            FROM notifications n
            LEFT JOIN users u ON n.related_user_id = u.id
            LEFT JOIN groups g ON n.related_group_id = g.group_id
            WHERE n.user_id = $1
            ORDER BY n.created_at DESC
            LIMIT $2 OFFSET $3
            "#
        };

        let rows = query_as::<_, DbNotification>(sql)
            .bind(recipient.0)
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&*self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn count_total(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> Result<i64, RepositoryError> {
        let sql = if unread_only {
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_status = FALSE"
        } else {
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1"
        };
        query_scalar::<_, i64>(sql)
            .bind(recipient.0)
            .fetch_one(&*self.pool)
            .await
            .map_err(map_sqlx_err)
    }
}
