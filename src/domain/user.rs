use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::post::PostSummary;

pub const UNKNOWN_USERNAME: &str = "Unknown User";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Author fields attached to posts, comments and subscription lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl AuthorSummary {
    /// Placeholder used when the author row cannot be resolved.
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            username: UNKNOWN_USERNAME.to_string(),
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub subscribers_count: i64,
    pub posts: Vec<PostSummary>,
}

impl PublicProfile {
    pub fn new(user: User, subscribers_count: i64, posts: Vec<PostSummary>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            bio: user.bio,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
            subscribers_count,
            posts,
        }
    }
}
