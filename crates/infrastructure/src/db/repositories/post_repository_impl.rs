//! 帖子可见性查询实现。帖子的写路径在外部服务。

use std::sync::Arc;

use application::PostRepository;
use async_trait::async_trait;
use domain::{GroupId, Post, PostId, PostPrivacy, RepositoryError, UserId};
use sqlx::{query_as, query_scalar, FromRow};

use crate::db::{map_sqlx_err, DbPool};

#[derive(Debug, Clone, FromRow)]
struct DbPost {
    post_id: i64,
    user_id: i64,
    group_id: Option<i64>,
    privacy: String,
}

impl From<DbPost> for Post {
    fn from(row: DbPost) -> Self {
        Self {
            id: PostId(row.post_id),
            author: UserId(row.user_id),
            privacy: PostPrivacy::parse(&row.privacy),
            group: row.group_id.map(GroupId),
        }
    }
}

pub struct PostgresPostRepository {
    pool: Arc<DbPool>,
}

impl PostgresPostRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        let row = query_as::<_, DbPost>(
            "SELECT post_id, user_id, group_id, privacy FROM posts WHERE post_id = $1",
        )
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(Post::from))
    }

    async fn is_allowed_follower(
        &self,
        post: PostId,
        user: UserId,
    ) -> Result<bool, RepositoryError> {
        query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM post_allowed_followers WHERE post_id = $1 AND follower_id = $2)",
        )
        .bind(post.0)
        .bind(user.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)
    }
}
