use anyhow::Result;
use sqlx::Row;
use std::fmt;
use uuid::Uuid;

use crate::app::posts::post_from_row;
use crate::domain::engagement::{Relation, Toggle};
use crate::domain::post::Post;
use crate::domain::user::AuthorSummary;
use crate::infra::db::Db;

/// Returned when an actor targets itself on a relation that forbids it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfRelationError;

impl fmt::Display for SelfRelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cannot subscribe to yourself")
    }
}

impl std::error::Error for SelfRelationError {}

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Flips the relation in a single statement. If a concurrent toggle
    /// inserted the same pair first, the conflicting insert is skipped and
    /// the relation is reported active.
    pub async fn toggle(&self, relation: Relation, actor_id: Uuid, target_id: Uuid) -> Result<Toggle> {
        ensure_distinct(relation, actor_id, target_id)?;

        let sql = toggle_sql(relation);
        let active: bool = sqlx::query_scalar(&sql)
            .bind(actor_id)
            .bind(target_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(Toggle { active })
    }

    /// Returns true when this call created the relation.
    pub async fn set(&self, relation: Relation, actor_id: Uuid, target_id: Uuid) -> Result<bool> {
        ensure_distinct(relation, actor_id, target_id)?;

        let sql = format!(
            "INSERT INTO {table} ({actor}, {target}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            table = relation.table(),
            actor = relation.actor_column(),
            target = relation.target_column(),
        );
        let result = sqlx::query(&sql)
            .bind(actor_id)
            .bind(target_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns true when this call removed the relation.
    pub async fn unset(&self, relation: Relation, actor_id: Uuid, target_id: Uuid) -> Result<bool> {
        ensure_distinct(relation, actor_id, target_id)?;

        let sql = format!(
            "DELETE FROM {table} WHERE {actor} = $1 AND {target} = $2",
            table = relation.table(),
            actor = relation.actor_column(),
            target = relation.target_column(),
        );
        let result = sqlx::query(&sql)
            .bind(actor_id)
            .bind(target_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_active(&self, relation: Relation, actor_id: Uuid, target_id: Uuid) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {table} WHERE {actor} = $1 AND {target} = $2)",
            table = relation.table(),
            actor = relation.actor_column(),
            target = relation.target_column(),
        );
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(actor_id)
            .bind(target_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(exists)
    }

    pub async fn count_for_target(&self, relation: Relation, target_id: Uuid) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE {target} = $1",
            table = relation.table(),
            target = relation.target_column(),
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(target_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.max(0))
    }

    pub async fn list_likers(&self, post_id: Uuid) -> Result<Vec<Uuid>> {
        let user_ids = sqlx::query_scalar(
            "SELECT user_id FROM likes WHERE post_id = $1 ORDER BY created_at, user_id",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(user_ids)
    }

    pub async fn list_bookmarked_posts(&self, user_id: Uuid) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT p.id, p.user_id, p.title, p.content, p.tags, p.categories, \
                    p.created_at, p.updated_at \
             FROM bookmarks b \
             JOIN posts p ON p.id = b.post_id \
             WHERE b.user_id = $1 \
             ORDER BY b.created_at DESC, p.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn list_liked_posts(&self, user_id: Uuid) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT p.id, p.user_id, p.title, p.content, p.tags, p.categories, \
                    p.created_at, p.updated_at \
             FROM likes l \
             JOIN posts p ON p.id = l.post_id \
             WHERE l.user_id = $1 \
             ORDER BY l.created_at DESC, p.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// Creators the user subscribes to, most recent first.
    pub async fn list_subscriptions(&self, subscriber_id: Uuid) -> Result<Vec<AuthorSummary>> {
        let rows = sqlx::query(
            "SELECT u.id, u.username, u.avatar_url \
             FROM subscribers s \
             JOIN users u ON u.id = s.creator_id \
             WHERE s.subscriber_id = $1 \
             ORDER BY s.created_at DESC, u.id DESC",
        )
        .bind(subscriber_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(author_from_row).collect())
    }

    pub async fn list_subscribers(&self, creator_id: Uuid) -> Result<Vec<AuthorSummary>> {
        let rows = sqlx::query(
            "SELECT u.id, u.username, u.avatar_url \
             FROM subscribers s \
             JOIN users u ON u.id = s.subscriber_id \
             WHERE s.creator_id = $1 \
             ORDER BY s.created_at DESC, u.id DESC",
        )
        .bind(creator_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(author_from_row).collect())
    }
}

fn ensure_distinct(relation: Relation, actor_id: Uuid, target_id: Uuid) -> Result<()> {
    if !relation.allows_self_target() && actor_id == target_id {
        return Err(SelfRelationError.into());
    }
    Ok(())
}

// Data-modifying CTEs share one snapshot: the insert only runs when the
// delete removed nothing, and `active` is true whenever the pair was absent
// before this statement, including when a concurrent insert won the race.
fn toggle_sql(relation: Relation) -> String {
    format!(
        "WITH removed AS ( \
            DELETE FROM {table} WHERE {actor} = $1 AND {target} = $2 RETURNING 1 \
         ), inserted AS ( \
            INSERT INTO {table} ({actor}, {target}) \
            SELECT $1, $2 WHERE NOT EXISTS (SELECT 1 FROM removed) \
            ON CONFLICT DO NOTHING \
            RETURNING 1 \
         ) \
         SELECT NOT EXISTS (SELECT 1 FROM removed) AS active",
        table = relation.table(),
        actor = relation.actor_column(),
        target = relation.target_column(),
    )
}

pub(crate) fn author_from_row(row: &sqlx::postgres::PgRow) -> AuthorSummary {
    AuthorSummary {
        id: row.get("id"),
        username: row.get("username"),
        avatar_url: row.get("avatar_url"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_sql_targets_relation_columns() {
        let sql = toggle_sql(Relation::Subscription);
        assert!(sql.contains("DELETE FROM subscribers WHERE subscriber_id = $1 AND creator_id = $2"));
        assert!(sql.contains("INSERT INTO subscribers (subscriber_id, creator_id)"));

        let sql = toggle_sql(Relation::Bookmark);
        assert!(sql.contains("DELETE FROM bookmarks WHERE user_id = $1 AND post_id = $2"));
    }

    #[test]
    fn self_subscription_is_rejected() {
        let id = Uuid::new_v4();
        let err = ensure_distinct(Relation::Subscription, id, id).unwrap_err();
        assert!(err.downcast_ref::<SelfRelationError>().is_some());
        assert_eq!(err.to_string(), "cannot subscribe to yourself");
    }

    #[test]
    fn likes_and_bookmarks_skip_self_check() {
        let id = Uuid::new_v4();
        assert!(ensure_distinct(Relation::Like, id, id).is_ok());
        assert!(ensure_distinct(Relation::Bookmark, id, id).is_ok());
    }
}
