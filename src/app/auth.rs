use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::tokens::{TokenKeys, TokenKind, TokenSubject};
use crate::app::users::user_from_row;
use crate::domain::user::User;
use crate::infra::db::Db;

const USER_COLUMNS: &str = "id, username, email, bio, avatar_url, created_at";

/// Caller behind a verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

/// Accounts and sessions. A session is one stored refresh token; access
/// tokens are stateless.
#[derive(Clone)]
pub struct AuthService {
    db: Db,
    keys: TokenKeys,
}

impl AuthService {
    pub fn new(db: Db, keys: TokenKeys) -> Self {
        Self { db, keys }
    }

    /// Emails are stored lowercased, so uniqueness ignores case.
    pub async fn register(
        &self,
        username: String,
        email: String,
        password: &str,
    ) -> Result<(User, TokenPair)> {
        let password_hash = hash_password(password.to_string()).await?;

        let mut tx = self.db.pool().begin().await?;
        let sql = format!(
            "INSERT INTO users (username, email, password_hash) \
             VALUES ($1, lower($2), $3) \
             RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .await?;
        let user = user_from_row(&row);

        let (_, tokens) = self.open_session(&mut *tx, user.id).await?;
        tx.commit().await?;

        Ok((user, tokens))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Option<(User, TokenPair)>> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE email = lower($1)",
            USER_COLUMNS
        );
        let Some(row) = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?
        else {
            return Ok(None);
        };

        let stored: String = row.get("password_hash");
        if !password_matches(password.to_string(), stored).await? {
            return Ok(None);
        }

        let user = user_from_row(&row);
        let tokens = self.start_session(user.id).await?;
        Ok(Some((user, tokens)))
    }

    /// Trades a live refresh token for a new pair. The presented token is
    /// revoked and linked to its successor in the same transaction.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenPair>> {
        let Some(subject) = self.keys.open(TokenKind::Refresh, refresh_token)? else {
            return Ok(None);
        };

        let mut tx = self.db.pool().begin().await?;

        // Only one concurrent refresh of the same token can claim it.
        let claimed = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 \
               AND revoked_at IS NULL AND expires_at > now()",
        )
        .bind(subject.token_id)
        .bind(subject.user_id)
        .bind(token_digest(refresh_token))
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let (next_id, tokens) = self.open_session(&mut *tx, subject.user_id).await?;
        sqlx::query("UPDATE refresh_tokens SET replaced_by = $1 WHERE id = $2")
            .bind(next_id)
            .bind(subject.token_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(tokens))
    }

    /// Revokes the session behind `refresh_token`. False when it was not a
    /// live session.
    pub async fn logout(&self, refresh_token: &str) -> Result<bool> {
        let Some(subject) = self.keys.open(TokenKind::Refresh, refresh_token)? else {
            return Ok(false);
        };

        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(subject.token_id)
        .bind(subject.user_id)
        .bind(token_digest(refresh_token))
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub fn authenticate(&self, access_token: &str) -> Result<Option<AuthSession>> {
        let subject = self.keys.open(TokenKind::Access, access_token)?;
        Ok(subject.map(|subject| AuthSession {
            user_id: subject.user_id,
        }))
    }

    pub async fn start_session(&self, user_id: Uuid) -> Result<TokenPair> {
        let mut conn = self.db.pool().acquire().await?;
        let (_, tokens) = self.open_session(&mut *conn, user_id).await?;
        Ok(tokens)
    }

    /// Seals a fresh pair and stores the refresh token's digest. Returns the
    /// new session id.
    async fn open_session(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<(Uuid, TokenPair)> {
        let session_id = Uuid::new_v4();
        let access = self.keys.seal(
            TokenKind::Access,
            &TokenSubject {
                user_id,
                token_id: Uuid::new_v4(),
            },
        )?;
        let refresh = self.keys.seal(
            TokenKind::Refresh,
            &TokenSubject {
                user_id,
                token_id: session_id,
            },
        )?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(token_digest(&refresh.token))
        .bind(refresh.expires_at)
        .execute(&mut *conn)
        .await?;

        Ok((
            session_id,
            TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
                access_expires_at: access.expires_at,
                refresh_expires_at: refresh.expires_at,
            },
        ))
    }
}

// Argon2 runs on the blocking pool.
async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!("failed to hash password: {}", err))
    })
    .await?
}

async fn password_matches(password: String, stored: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored) else {
            tracing::warn!("stored password hash is unreadable");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(Into::into)
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
