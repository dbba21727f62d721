use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::posts::PostService;
use crate::domain::user::{PublicProfile, User};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, bio, avatar_url, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Public profile with the user's post titles and subscriber count.
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<PublicProfile>> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(None);
        };

        let subscribers_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscribers WHERE creator_id = $1")
                .bind(user_id)
                .fetch_one(self.db.pool())
                .await?;

        let posts = PostService::new(self.db.clone())
            .list_summaries_by_author(user_id)
            .await?;

        Ok(Some(PublicProfile::new(user, subscribers_count, posts)))
    }

    /// `None` leaves a field unchanged. A blank `bio` or `avatar_url`
    /// clears it.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        username: Option<String>,
        bio: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<Option<User>> {
        let row = sqlx::query(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 bio = CASE WHEN $3::text IS NULL THEN bio ELSE NULLIF(btrim($3), '') END, \
                 avatar_url = CASE WHEN $4::text IS NULL THEN avatar_url \
                                   ELSE NULLIF(btrim($4), '') END, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING id, username, email, bio, avatar_url, created_at",
        )
        .bind(user_id)
        .bind(username)
        .bind(bio)
        .bind(avatar_url)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Delete user account and all associated data.
    /// ON DELETE CASCADE removes posts, comments, likes, bookmarks, views,
    /// refresh tokens and subscriptions on either side.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        bio: row.get("bio"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
    }
}
