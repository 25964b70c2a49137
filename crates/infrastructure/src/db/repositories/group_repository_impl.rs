//! 群组与成员资格仓储实现。角色与状态以小写文本存储。

use std::sync::Arc;

use application::GroupRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Group, GroupId, GroupMembership, MembershipRole, MembershipStatus, RepositoryError, Timestamp,
    UserId,
};
use sqlx::{query, query_as, query_scalar, FromRow};

use crate::db::{map_sqlx_err, DbPool};

#[derive(Debug, Clone, FromRow)]
struct DbGroup {
    group_id: i64,
    title: String,
    creator_id: i64,
    created_at: DateTime<Utc>,
}

impl From<DbGroup> for Group {
    fn from(row: DbGroup) -> Self {
        Self {
            id: GroupId(row.group_id),
            title: row.title,
            creator: UserId(row.creator_id),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbMembership {
    user_id: i64,
    group_id: i64,
    role: String,
    status: String,
    joined_at: Option<DateTime<Utc>>,
}

impl From<DbMembership> for GroupMembership {
    fn from(row: DbMembership) -> Self {
        Self {
            user: UserId(row.user_id),
            group: GroupId(row.group_id),
            role: MembershipRole::parse(&row.role),
            status: MembershipStatus::parse(&row.status),
            joined_at: row.joined_at,
        }
    }
}

pub struct PostgresGroupRepository {
    pool: Arc<DbPool>,
}

impl PostgresGroupRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for PostgresGroupRepository {
    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, RepositoryError> {
        let row = query_as::<_, DbGroup>(
            "SELECT group_id, title, creator_id, created_at FROM groups WHERE group_id = $1",
        )
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(Group::from))
    }

    async fn membership(
        &self,
        user: UserId,
        group: GroupId,
    ) -> Result<Option<GroupMembership>, RepositoryError> {
        let row = query_as::<_, DbMembership>(
            r#"
            SELECT user_id, group_id, role, status, joined_at
            FROM group_memberships
            WHERE user_id = $1 AND group_id = $2
            "#,
        )
        .bind(user.0)
        .bind(group.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(GroupMembership::from))
    }

    async fn accepted_member_ids(&self, group: GroupId) -> Result<Vec<UserId>, RepositoryError> {
        let ids = query_scalar::<_, i64>(
            "SELECT user_id FROM group_memberships WHERE group_id = $1 AND status = 'accepted'",
        )
        .bind(group.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(ids.into_iter().map(UserId).collect())
    }

    async fn accepted_group_ids(&self, user: UserId) -> Result<Vec<GroupId>, RepositoryError> {
        let ids = query_scalar::<_, i64>(
            "SELECT group_id FROM group_memberships WHERE user_id = $1 AND status = 'accepted'",
        )
        .bind(user.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(ids.into_iter().map(GroupId).collect())
    }

    async fn insert_membership(
        &self,
        user: UserId,
        group: GroupId,
        role: MembershipRole,
        status: MembershipStatus,
    ) -> Result<(), RepositoryError> {
        query(
            r#"
            INSERT INTO group_memberships (user_id, group_id, role, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.0)
        .bind(group.0)
        .bind(role.as_str())
        .bind(status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn update_status(
        &self,
        user: UserId,
        group: GroupId,
        status: MembershipStatus,
        joined_at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let result = query(
            r#"
            UPDATE group_memberships SET status = $3, joined_at = $4
            WHERE user_id = $1 AND group_id = $2
            "#,
        )
        .bind(user.0)
        .bind(group.0)
        .bind(status.as_str())
        .bind(joined_at)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn remove_membership(
        &self,
        user: UserId,
        group: GroupId,
    ) -> Result<bool, RepositoryError> {
        let result = query("DELETE FROM group_memberships WHERE user_id = $1 AND group_id = $2")
            .bind(user.0)
            .bind(group.0)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }
}
