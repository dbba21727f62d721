use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::AuthorSummary;

/// A binary relation between an actor and a target that users can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// user likes post
    Like,
    /// user bookmarks post
    Bookmark,
    /// subscriber follows creator
    Subscription,
}

impl Relation {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Like => "likes",
            Self::Bookmark => "bookmarks",
            Self::Subscription => "subscribers",
        }
    }

    pub fn actor_column(&self) -> &'static str {
        match self {
            Self::Like | Self::Bookmark => "user_id",
            Self::Subscription => "subscriber_id",
        }
    }

    pub fn target_column(&self) -> &'static str {
        match self {
            Self::Like | Self::Bookmark => "post_id",
            Self::Subscription => "creator_id",
        }
    }

    pub fn allows_self_target(&self) -> bool {
        !matches!(self, Self::Subscription)
    }
}

/// State of a relation after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Toggle {
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub author: AuthorSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerIdentifier {
    User(Uuid),
    /// sha256 hex of the caller's network address
    Address(String),
}

impl ViewerIdentifier {
    /// Anonymous viewer keyed by a digest of the network address.
    pub fn from_address(address: &str) -> Self {
        let digest = Sha256::digest(address.as_bytes());
        Self::Address(hex::encode(digest))
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(*id),
            Self::Address(_) => None,
        }
    }

    pub fn key(&self) -> String {
        match self {
            Self::User(id) => format!("user:{}", id),
            Self::Address(digest) => format!("ip:{}", digest),
        }
    }
}
