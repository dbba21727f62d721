pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::tokens::TokenKeys;
use crate::config::AppConfig;
use crate::infra::{cache::RedisCache, db::Db};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub tokens: TokenKeys,
    pub view_window_hours: u64,
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Db, cache: RedisCache) -> Self {
        Self {
            db,
            cache,
            tokens: TokenKeys::from_config(config),
            view_window_hours: config.view_window_hours,
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}
