//! 消息日志实现（C4）。
//!
//! 追加写入，历史分页固定 20 行降序。LIMIT/OFFSET 在并发插入下
//! 不保证分页稳定，这一点是契约内的非保证。

use std::sync::Arc;

use application::{ChatGroupEntry, ChatPartner, MessageRepository, MESSAGE_PAGE_SIZE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    GroupId, GroupMessage, MessageId, PrivateMessage, RepositoryError, Timestamp, UserId,
};
use sqlx::{query_as, query_scalar, FromRow};

use crate::db::{map_sqlx_err, DbPool};

#[derive(Debug, Clone, FromRow)]
struct DbPrivateMessage {
    message_id: i64,
    sender_id: i64,
    receiver_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    nickname: String,
}

impl From<DbPrivateMessage> for PrivateMessage {
    fn from(row: DbPrivateMessage) -> Self {
        Self {
            id: MessageId(row.message_id),
            sender: UserId(row.sender_id),
            receiver: UserId(row.receiver_id),
            content: row.content,
            sent_at: row.created_at,
            sender_name: row.nickname,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbGroupMessage {
    message_id: i64,
    group_id: i64,
    sender_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    nickname: String,
}

impl From<DbGroupMessage> for GroupMessage {
    fn from(row: DbGroupMessage) -> Self {
        Self {
            id: MessageId(row.message_id),
            group: GroupId(row.group_id),
            sender: UserId(row.sender_id),
            content: row.content,
            sent_at: row.created_at,
            sender_name: row.nickname,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbChatPartner {
    id: i64,
    nickname: String,
    profile_type: String,
    last_message_time: DateTime<Utc>,
    last_message: String,
}

#[derive(Debug, Clone, FromRow)]
struct DbChatGroup {
    group_id: i64,
    title: String,
    last_message_time: DateTime<Utc>,
    last_message: String,
    member_count: i64,
}

pub struct PostgresMessageRepository {
    pool: Arc<DbPool>,
}

impl PostgresMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn append_private(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
        at: Timestamp,
    ) -> Result<MessageId, RepositoryError> {
        let id = query_scalar::<_, i64>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, content, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING message_id
            "#,
        )
        .bind(sender.0)
        .bind(receiver.0)
        .bind(content)
        .bind(at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(MessageId(id))
    }

    async fn append_group(
        &self,
        group: GroupId,
        sender: UserId,
        content: &str,
        at: Timestamp,
    ) -> Result<MessageId, RepositoryError> {
        let id = query_scalar::<_, i64>(
            r#"
            INSERT INTO group_messages (group_id, sender_id, content, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING message_id
            "#,
        )
        .bind(group.0)
        .bind(sender.0)
        .bind(content)
        .bind(at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(MessageId(id))
    }

    async fn page_private(
        &self,
        viewer: UserId,
        other: UserId,
        offset: i64,
    ) -> Result<Vec<PrivateMessage>, RepositoryError> {
        let rows = query_as::<_, DbPrivateMessage>(
            r#"
            SELECT m.message_id, m.sender_id, m.receiver_id, m.content, m.created_at, u.nickname
            FROM messages m
            JOIN users u ON m.sender_id = u.id
            WHERE (m.sender_id = $1 AND m.receiver_id = $2)
               OR (m.sender_id = $2 AND m.receiver_id = $1)
            ORDER BY m.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(viewer.0)
        .bind(other.0)
        .bind(MESSAGE_PAGE_SIZE)
        .bind(offset.max(0))
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(PrivateMessage::from).collect())
    }

    async fn page_group(
        &self,
        group: GroupId,
        offset: i64,
    ) -> Result<Vec<GroupMessage>, RepositoryError> {
        let rows = query_as::<_, DbGroupMessage>(
            r#"
            SELECT gm.message_id, gm.group_id, gm.sender_id, gm.content, gm.created_at, u.nickname
            FROM group_messages gm
            JOIN users u ON gm.sender_id = u.id
            WHERE gm.group_id = $1
            ORDER BY gm.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(group.0)
        .bind(MESSAGE_PAGE_SIZE)
        .bind(offset.max(0))
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(GroupMessage::from).collect())
    }

    async fn chat_partners(&self, user: UserId) -> Result<Vec<ChatPartner>, RepositoryError> {
        let rows = query_as::<_, DbChatPartner>(
            r#"
            SELECT u.id, u.nickname, u.profile_type,
                   COALESCE(latest.created_at, to_timestamp(0)) AS last_message_time,
                   COALESCE(latest.content, '') AS last_message
            FROM users u
            JOIN followers f
              ON f.following_id = u.id AND f.follower_id = $1 AND f.status = 'accepted'
            LEFT JOIN (
                SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS other_user_id,
                       content, created_at,
                       ROW_NUMBER() OVER (
                           PARTITION BY CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END
                           ORDER BY created_at DESC
                       ) AS rn
                FROM messages
                WHERE sender_id = $1 OR receiver_id = $1
            ) latest ON latest.other_user_id = u.id AND latest.rn = 1
            ORDER BY last_message_time DESC, u.nickname ASC
            "#,
        )
        .bind(user.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows
            .into_iter()
            .map(|row| ChatPartner {
                id: UserId(row.id),
                name: row.nickname,
                profile_type: row.profile_type,
                last_message_time: row.last_message_time,
                last_message: row.last_message,
            })
            .collect())
    }

    async fn chat_groups(&self, user: UserId) -> Result<Vec<ChatGroupEntry>, RepositoryError> {
        let rows = query_as::<_, DbChatGroup>(
            r#"
            SELECT g.group_id, g.title,
                   COALESCE(latest.created_at, to_timestamp(0)) AS last_message_time,
                   COALESCE(latest.content, '') AS last_message,
                   (SELECT COUNT(*) FROM group_memberships gm2
                     WHERE gm2.group_id = g.group_id AND gm2.status = 'accepted') AS member_count
            FROM groups g
            JOIN group_memberships gm
              ON gm.group_id = g.group_id AND gm.user_id = $1 AND gm.status = 'accepted'
            LEFT JOIN (
                SELECT group_id, content, created_at,
                       ROW_NUMBER() OVER (PARTITION BY group_id ORDER BY created_at DESC) AS rn
                FROM group_messages
            ) latest ON latest.group_id = g.group_id AND latest.rn = 1
            ORDER BY last_message_time DESC, g.title ASC
            "#,
        )
        .bind(user.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows
            .into_iter()
            .map(|row| ChatGroupEntry {
                id: GroupId(row.group_id),
                name: row.title,
                last_message_time: row.last_message_time,
                last_message: row.last_message,
                member_count: row.member_count,
            })
            .collect())
    }
}
