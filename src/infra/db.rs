use anyhow::Result;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;

use crate::config::AppConfig;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn migrate(&self, dir: &Path) -> Result<()> {
        let migrator = Migrator::new(dir).await?;
        migrator.run(&self.pool).await?;
        Ok(())
    }
}

/// Constraint violation reported by Postgres, if the error carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    Unique(String),
    ForeignKey(String),
    Check(String),
}

pub fn constraint_violation(err: &anyhow::Error) -> Option<ConstraintViolation> {
    let db_err = err.downcast_ref::<sqlx::Error>()?.as_database_error()?;
    let constraint = db_err.constraint().unwrap_or_default().to_string();
    match db_err.code()?.as_ref() {
        UNIQUE_VIOLATION => Some(ConstraintViolation::Unique(constraint)),
        FOREIGN_KEY_VIOLATION => Some(ConstraintViolation::ForeignKey(constraint)),
        CHECK_VIOLATION => Some(ConstraintViolation::Check(constraint)),
        _ => None,
    }
}
