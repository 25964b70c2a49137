//! 群组活动仓储实现。

use std::sync::Arc;

use application::EventRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    EventId, EventResponse, GroupEvent, GroupId, RepositoryError, Timestamp, UserId,
};
use sqlx::{query, query_as, query_scalar, FromRow};

use crate::db::{map_sqlx_err, DbPool};

#[derive(Debug, Clone, FromRow)]
struct DbEvent {
    event_id: i64,
    group_id: i64,
    creator_id: i64,
    title: String,
    description: String,
    event_time: DateTime<Utc>,
}

impl From<DbEvent> for GroupEvent {
    fn from(row: DbEvent) -> Self {
        Self {
            id: EventId(row.event_id),
            group: GroupId(row.group_id),
            creator: UserId(row.creator_id),
            title: row.title,
            description: row.description,
            event_time: row.event_time,
        }
    }
}

pub struct PostgresEventRepository {
    pool: Arc<DbPool>,
}

impl PostgresEventRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PostgresEventRepository {
    async fn insert(
        &self,
        group: GroupId,
        creator: UserId,
        title: &str,
        description: &str,
        event_time: Timestamp,
    ) -> Result<GroupEvent, RepositoryError> {
        let id = query_scalar::<_, i64>(
            r#"
            INSERT INTO events (group_id, creator_id, title, description, event_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING event_id
            "#,
        )
        .bind(group.0)
        .bind(creator.0)
        .bind(title)
        .bind(description)
        .bind(event_time)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(GroupEvent {
            id: EventId(id),
            group,
            creator,
            title: title.to_owned(),
            description: description.to_owned(),
            event_time,
        })
    }

    async fn find_by_id(&self, id: EventId) -> Result<Option<GroupEvent>, RepositoryError> {
        let row = query_as::<_, DbEvent>(
            r#"
            SELECT event_id, group_id, creator_id, title, description, event_time
            FROM events
            WHERE event_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(GroupEvent::from))
    }

    async fn upsert_response(
        &self,
        event: EventId,
        user: UserId,
        response: EventResponse,
    ) -> Result<(), RepositoryError> {
        query(
            r#"
            INSERT INTO event_responses (event_id, user_id, response)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, user_id) DO UPDATE SET response = EXCLUDED.response
            "#,
        )
        .bind(event.0)
        .bind(user.0)
        .bind(response.as_str())
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn going_member_ids(
        &self,
        event: EventId,
        group: GroupId,
    ) -> Result<Vec<UserId>, RepositoryError> {
        let ids = query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT er.user_id
            FROM event_responses er
            JOIN group_memberships gm
              ON gm.user_id = er.user_id AND gm.group_id = $2 AND gm.status = 'accepted'
            WHERE er.event_id = $1 AND er.response = 'going'
            "#,
        )
        .bind(event.0)
        .bind(group.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(ids.into_iter().map(UserId).collect())
    }
}
