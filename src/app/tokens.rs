use anyhow::{anyhow, Result};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::AppConfig;

const TOKEN_ISSUER: &str = "quill";

/// Which of the two token families a PASETO belongs to. Each family has its
/// own key and the kind is bound into the token as the implicit assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Claims Quill reads back out of a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub token_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct SealedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// PASETO v4.local keys and lifetimes for access and refresh tokens.
#[derive(Clone)]
pub struct TokenKeys {
    access_key: [u8; 32],
    refresh_key: [u8; 32],
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenKeys {
    pub fn new(
        access_key: [u8; 32],
        refresh_key: [u8; 32],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_key,
            refresh_key,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.paseto_access_key,
            config.paseto_refresh_key,
            Duration::minutes(config.access_ttl_minutes as i64),
            Duration::days(config.refresh_ttl_days as i64),
        )
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn key(&self, kind: TokenKind) -> Result<SymmetricKey<V4>> {
        let bytes = match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        };
        Ok(SymmetricKey::<V4>::from(bytes)?)
    }

    /// Encrypts a token of `kind` for `subject`. The `exp` claim is the
    /// returned `expires_at`, truncated to whole seconds.
    pub fn seal(&self, kind: TokenKind, subject: &TokenSubject) -> Result<SealedToken> {
        let now = OffsetDateTime::now_utc().replace_nanosecond(0)?;
        let expires_at = now + self.ttl(kind);

        let mut claims = Claims::new()?;
        claims.issued_at(&now.format(&Rfc3339)?)?;
        claims.not_before(&now.format(&Rfc3339)?)?;
        claims.expiration(&expires_at.format(&Rfc3339)?)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&subject.user_id.to_string())?;
        claims.token_identifier(&subject.token_id.to_string())?;
        claims.add_additional("typ", kind.as_str())?;

        let token = local::encrypt(
            &self.key(kind)?,
            &claims,
            None,
            Some(kind.as_str().as_bytes()),
        )?;

        Ok(SealedToken { token, expires_at })
    }

    /// `Ok(None)` for anything that is not a live token of `kind` issued by
    /// Quill: malformed, wrong key, wrong kind, expired.
    pub fn open(&self, kind: TokenKind, token: &str) -> Result<Option<TokenSubject>> {
        let Ok(untrusted) = UntrustedToken::<Local, V4>::try_from(token) else {
            return Ok(None);
        };

        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let key = self.key(kind)?;
        let Ok(trusted) = local::decrypt(
            &key,
            &untrusted,
            &rules,
            None,
            Some(kind.as_str().as_bytes()),
        ) else {
            return Ok(None);
        };

        let Some(claims) = trusted.payload_claims() else {
            return Ok(None);
        };
        if claim_str(claims, "typ") != Some(kind.as_str()) {
            return Ok(None);
        }

        Ok(Some(TokenSubject {
            user_id: claim_uuid(claims, "sub")?,
            token_id: claim_uuid(claims, "jti")?,
        }))
    }
}

fn claim_str<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims.get_claim(name).and_then(|value| value.as_str())
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claim_str(claims, name).ok_or_else(|| anyhow!("token has no {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}
