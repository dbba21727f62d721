use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::app::rate_limiter::{RateLimitInfo, RateLimiter};
use crate::config::rate_limits::RateAction;
use crate::http::viewer::client_address;
use crate::http::{AppError, AuthUser};
use crate::AppState;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Per-user limits for authenticated writes.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let action = user_action(request.method(), request.uri().path());

    let (Some(action), Some(auth_user)) = (action, auth) else {
        return Ok(next.run(request).await);
    };

    let rate_limiter = RateLimiter::new(state.cache.clone());
    let subject = format!("user:{}", auth_user.user_id);
    let info = rate_limiter.hit(&subject, action).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to check rate limit");
        AppError::internal("failed to check rate limit")
    })?;

    if info.limited {
        let rejection = AppError::rate_limited(format!(
            "Rate limit exceeded for action: {}. Please try again later.",
            action.as_str()
        ));
        return Ok(with_quota(rejection.into_response(), info));
    }

    Ok(with_quota(next.run(request).await, info))
}

/// IP-based limits for unauthenticated endpoints (register, login).
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let action = match ip_action(request.method(), request.uri().path()) {
        Some(action) => action,
        None => return Ok(next.run(request).await),
    };

    let Some(ip) = client_address(
        request.headers(),
        request.extensions(),
        state.trust_forwarded_for,
    ) else {
        return Ok(next.run(request).await);
    };

    let rate_limiter = RateLimiter::new(state.cache.clone());
    let info = rate_limiter
        .hit(&format!("ip:{}", ip), action)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check IP rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if info.limited {
        tracing::warn!(ip = %ip, action = action.as_str(), "IP rate limit exceeded");
        let rejection = AppError::rate_limited(
            "Too many attempts from your IP address. Please try again later.",
        );
        return Ok(with_quota(rejection.into_response(), info));
    }

    Ok(with_quota(next.run(request).await, info))
}

fn with_quota(mut response: Response, info: RateLimitInfo) -> Response {
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(info.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(info.remaining));
    response
}

fn user_action(method: &Method, path: &str) -> Option<RateAction> {
    let is_write = *method == Method::POST || *method == Method::DELETE;
    match path {
        "/api/posts" if *method == Method::POST => Some(RateAction::Post),
        "/api/comments" if *method == Method::POST => Some(RateAction::Comment),
        p if *method == Method::POST && p.starts_with("/api/posts/") && p.ends_with("/like") => {
            Some(RateAction::Like)
        }
        p if is_write && p.starts_with("/api/bookmarks/") => Some(RateAction::Bookmark),
        p if is_write && p.starts_with("/api/subscribers/") && !p.ends_with("/count") => {
            Some(RateAction::Subscribe)
        }
        _ => None,
    }
}

fn ip_action(method: &Method, path: &str) -> Option<RateAction> {
    if *method != Method::POST {
        return None;
    }
    match path {
        "/api/auth/login" => Some(RateAction::Login),
        "/api/auth/register" => Some(RateAction::Register),
        _ => None,
    }
}
