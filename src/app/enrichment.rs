use anyhow::Result;
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::app::engagement::author_from_row;
use crate::domain::post::{Post, PostView};
use crate::domain::user::AuthorSummary;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct EnrichmentService {
    db: Db,
}

impl EnrichmentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Attaches author and engagement counts to each post, preserving order.
    /// Lookup failures degrade to placeholders instead of failing the page.
    pub async fn enrich(&self, posts: Vec<Post>) -> Vec<PostView> {
        if posts.is_empty() {
            return Vec::new();
        }

        let lookups = self.lookup(&posts).await;
        merge(posts, &lookups)
    }

    pub async fn enrich_one(&self, post: Post) -> PostView {
        let lookups = self.lookup(std::slice::from_ref(&post)).await;
        merge_one(post, &lookups)
    }

    async fn lookup(&self, posts: &[Post]) -> Lookups {
        let author_ids: Vec<Uuid> = posts
            .iter()
            .map(|post| post.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let post_ids: Vec<Uuid> = posts.iter().map(|post| post.id).collect();

        let (authors, likes, views) = tokio::join!(
            self.authors(&author_ids),
            self.counts("likes", &post_ids),
            self.counts("views", &post_ids),
        );

        Lookups {
            authors: authors.unwrap_or_else(|err| {
                tracing::warn!(error = ?err, "author lookup failed, using placeholders");
                HashMap::new()
            }),
            likes: likes.unwrap_or_else(|err| {
                tracing::warn!(error = ?err, "like counts unavailable");
                HashMap::new()
            }),
            views: views.unwrap_or_else(|err| {
                tracing::warn!(error = ?err, "view counts unavailable");
                HashMap::new()
            }),
        }
    }

    async fn authors(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, AuthorSummary>> {
        let rows = sqlx::query("SELECT id, username, avatar_url FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows
            .iter()
            .map(author_from_row)
            .map(|author| (author.id, author))
            .collect())
    }

    async fn counts(&self, table: &'static str, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let sql = format!(
            "SELECT post_id, COUNT(*) AS total FROM {} WHERE post_id = ANY($1) GROUP BY post_id",
            table
        );
        let rows = sqlx::query(&sql)
            .bind(post_ids)
            .fetch_all(self.db.pool())
            .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(row.get("post_id"), row.get::<i64, _>("total"));
        }
        Ok(counts)
    }
}

#[derive(Default)]
struct Lookups {
    authors: HashMap<Uuid, AuthorSummary>,
    likes: HashMap<Uuid, i64>,
    views: HashMap<Uuid, i64>,
}

fn merge(posts: Vec<Post>, lookups: &Lookups) -> Vec<PostView> {
    posts
        .into_iter()
        .map(|post| merge_one(post, lookups))
        .collect()
}

fn merge_one(post: Post, lookups: &Lookups) -> PostView {
    PostView {
        author: lookups
            .authors
            .get(&post.user_id)
            .cloned()
            .unwrap_or_else(|| AuthorSummary::unknown(post.user_id)),
        likes_count: lookups.likes.get(&post.id).copied().unwrap_or(0).max(0),
        views_count: lookups.views.get(&post.id).copied().unwrap_or(0).max(0),
        snippet: None,
        post,
    }
}
