use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::Mutation;
use crate::domain::engagement::Comment;
use crate::domain::user::AuthorSummary;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Oldest first, matching reading order under a post.
    pub async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, c.updated_at, \
                    u.username, u.avatar_url, NULL::text AS post_title \
             FROM comments c \
             LEFT JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, c.updated_at, \
                    u.username, u.avatar_url, p.title AS post_title \
             FROM comments c \
             LEFT JOIN users u ON u.id = c.user_id \
             JOIN posts p ON p.id = c.post_id \
             WHERE c.user_id = $1 \
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    pub async fn create_comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        content: String,
    ) -> Result<Comment> {
        let row = sqlx::query(
            "WITH inserted AS ( \
                INSERT INTO comments (post_id, user_id, content) \
                VALUES ($1, $2, $3) \
                RETURNING id, post_id, user_id, content, created_at, updated_at \
             ) \
             SELECT i.*, u.username, u.avatar_url, NULL::text AS post_title \
             FROM inserted i \
             LEFT JOIN users u ON u.id = i.user_id",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(self.db.pool())
        .await?;

        Ok(comment_from_row(&row))
    }

    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Mutation<Comment>> {
        let row = sqlx::query(
            "WITH updated AS ( \
                UPDATE comments SET content = $3, updated_at = now() \
                WHERE id = $1 AND user_id = $2 \
                RETURNING id, post_id, user_id, content, created_at, updated_at \
             ) \
             SELECT c.*, u.username, u.avatar_url, NULL::text AS post_title \
             FROM updated c \
             LEFT JOIN users u ON u.id = c.user_id",
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(content)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Mutation::Done(comment_from_row(&row))),
            None => self.missing_or_forbidden(comment_id).await,
        }
    }

    pub async fn delete_comment(&self, comment_id: Uuid, user_id: Uuid) -> Result<Mutation<()>> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND user_id = $2")
            .bind(comment_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            return Ok(Mutation::Done(()));
        }
        self.missing_or_forbidden(comment_id).await
    }

    async fn missing_or_forbidden<T>(&self, comment_id: Uuid) -> Result<Mutation<T>> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM comments WHERE id = $1)")
                .bind(comment_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(if exists {
            Mutation::Forbidden
        } else {
            Mutation::NotFound
        })
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    let user_id: Uuid = row.get("user_id");
    let username: Option<String> = row.get("username");
    let author = match username {
        Some(username) => AuthorSummary {
            id: user_id,
            username,
            avatar_url: row.get("avatar_url"),
        },
        None => AuthorSummary::unknown(user_id),
    };

    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        user_id,
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        author,
        post_title: row.get("post_title"),
    }
}
