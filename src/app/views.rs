use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::engagement::ViewerIdentifier;
use crate::infra::cache::RedisCache;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct ViewService {
    db: Db,
    cache: RedisCache,
    window_hours: u64,
}

impl ViewService {
    pub fn new(db: Db, cache: RedisCache, window_hours: u64) -> Self {
        Self {
            db,
            cache,
            window_hours,
        }
    }

    /// Records at most one view per viewer per window and returns the post's
    /// total view count, or `None` when the post does not exist.
    pub async fn register_view(
        &self,
        post_id: Uuid,
        viewer: &ViewerIdentifier,
    ) -> Result<Option<i64>> {
        let gate_key = gate_key(post_id, viewer);
        let claimed = match self.cache.claim(&gate_key, self.window_seconds()).await {
            Ok(claimed) => claimed,
            Err(err) => {
                tracing::warn!(error = ?err, post_id = %post_id, "view gate unavailable");
                true
            }
        };

        if claimed {
            if let Err(err) = self.record(post_id, viewer).await {
                if let Err(release_err) = self.cache.release(&gate_key).await {
                    tracing::warn!(error = ?release_err, key = %gate_key, "failed to release view gate");
                }
                return Err(err);
            }
        }

        self.count(post_id).await
    }

    /// Total view events for the post, or `None` when the post does not exist.
    pub async fn count(&self, post_id: Uuid) -> Result<Option<i64>> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1) AS found, \
                    (SELECT COUNT(*) FROM views WHERE post_id = $1) AS views",
        )
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;

        let found: bool = row.get("found");
        if !found {
            return Ok(None);
        }
        let views: i64 = row.get("views");
        Ok(Some(views.max(0)))
    }

    async fn record(&self, post_id: Uuid, viewer: &ViewerIdentifier) -> Result<bool> {
        let viewer_key = viewer.key();
        let mut tx = self.db.pool().begin().await?;

        // Serializes registrations for the same (post, viewer) pair.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{}:{}", post_id, viewer_key))
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "INSERT INTO views (post_id, user_id, viewer_identifier) \
             SELECT $1, $2, $3 \
             WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1) \
               AND NOT EXISTS ( \
                 SELECT 1 FROM views \
                 WHERE post_id = $1 \
                   AND viewer_identifier = $3 \
                   AND created_at > now() - make_interval(hours => $4) \
               )",
        )
        .bind(post_id)
        .bind(viewer.user_id())
        .bind(&viewer_key)
        .bind(self.window_hours.min(i32::MAX as u64) as i32)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::debug!(post_id = %post_id, viewer = %viewer_key, "view recorded");
        }
        Ok(inserted)
    }

    fn window_seconds(&self) -> u64 {
        self.window_hours.saturating_mul(3600)
    }
}

fn gate_key(post_id: Uuid, viewer: &ViewerIdentifier) -> String {
    format!("view:{}:{}", post_id, viewer.key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_key_separates_users_from_addresses() {
        let post_id = Uuid::nil();
        let user = ViewerIdentifier::User(Uuid::nil());
        let address = ViewerIdentifier::Address("ab12".to_string());

        assert_eq!(
            gate_key(post_id, &user),
            "view:00000000-0000-0000-0000-000000000000:user:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            gate_key(post_id, &address),
            "view:00000000-0000-0000-0000-000000000000:ip:ab12"
        );
    }
}
