use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::Mutation;
use crate::domain::post::{Post, PostSummary};
use crate::infra::db::Db;

const POST_COLUMNS: &str =
    "id, user_id, title, content, tags, categories, created_at, updated_at";

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        user_id: Uuid,
        title: String,
        content: String,
        tags: Vec<String>,
        categories: Vec<String>,
    ) -> Result<Post> {
        let sql = format!(
            "INSERT INTO posts (user_id, title, content, tags, categories) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(title)
            .bind(content)
            .bind(tags)
            .bind(categories)
            .fetch_one(self.db.pool())
            .await?;

        Ok(post_from_row(&row))
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, id DESC LIMIT $1",
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// Every post whose title, content, tags, categories or author username
    /// contains `query` ignoring case, newest first. An empty query returns
    /// every post.
    ///
    /// Non-ASCII queries skip the SQL prefilter since `lower()` outside ASCII
    /// depends on the database collation; callers filter the result anyway.
    pub async fn list_matching(&self, query: &str) -> Result<Vec<Post>> {
        let needle = query.trim().to_lowercase();
        let needle = if needle.is_ascii() { needle } else { String::new() };

        let sql = format!(
            "SELECT {} FROM posts p \
             WHERE $1 = '' \
                OR position($1 IN lower(p.title)) > 0 \
                OR position($1 IN lower(p.content)) > 0 \
                OR EXISTS (SELECT 1 FROM unnest(p.tags) AS t(tag) \
                           WHERE position($1 IN lower(t.tag)) > 0) \
                OR EXISTS (SELECT 1 FROM unnest(p.categories) AS c(category) \
                           WHERE position($1 IN lower(c.category)) > 0) \
                OR EXISTS (SELECT 1 FROM users u \
                           WHERE u.id = p.user_id AND position($1 IN lower(u.username)) > 0) \
             ORDER BY p.created_at DESC, p.id DESC",
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(needle)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn list_by_author(&self, user_id: Uuid) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn list_summaries_by_author(&self, user_id: Uuid) -> Result<Vec<PostSummary>> {
        let rows = sqlx::query(
            "SELECT id, title, created_at FROM posts \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(PostSummary {
                id: row.get("id"),
                title: row.get("title"),
                created_at: row.get("created_at"),
            });
        }

        Ok(posts)
    }

    pub async fn update_post(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        changes: PostChanges,
    ) -> Result<Mutation<Post>> {
        let sql = format!(
            "UPDATE posts \
             SET title = COALESCE($3, title), \
                 content = COALESCE($4, content), \
                 tags = COALESCE($5, tags), \
                 categories = COALESCE($6, categories), \
                 updated_at = now() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(post_id)
            .bind(user_id)
            .bind(changes.title)
            .bind(changes.content)
            .bind(changes.tags)
            .bind(changes.categories)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => Ok(Mutation::Done(post_from_row(&row))),
            None => self.missing_or_forbidden(post_id).await,
        }
    }

    /// Deleting a post cascades to its comments, likes, bookmarks and views.
    pub async fn delete_post(&self, post_id: Uuid, user_id: Uuid) -> Result<Mutation<()>> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            return Ok(Mutation::Done(()));
        }
        self.missing_or_forbidden(post_id).await
    }

    async fn missing_or_forbidden<T>(&self, post_id: Uuid) -> Result<Mutation<T>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(if exists {
            Mutation::Forbidden
        } else {
            Mutation::NotFound
        })
    }
}

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        tags: row.get("tags"),
        categories: row.get("categories"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
