use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod middleware;
mod routes;
mod viewer;

pub use auth::AuthUser;
pub use error::AppError;
pub use viewer::ClientAddress;

use middleware::rate_limit::{ip_rate_limit_middleware, rate_limit_middleware};

/// All routes with per-user and per-IP rate limiting applied. Transport
/// layers (tracing, CORS, compression, body limit) are added by the binary.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::posts())
        .merge(routes::comments())
        .merge(routes::bookmarks())
        .merge(routes::subscribers());

    Router::new()
        .merge(routes::health())
        .nest("/api", api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            ip_rate_limit_middleware,
        ))
        .with_state(state)
}
