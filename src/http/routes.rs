use axum::{routing::get, routing::post, routing::put, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route(
            "/users/profile",
            put(handlers::update_profile).delete(handlers::delete_account),
        )
        .route("/users/:id", get(handlers::get_user_profile))
        .route("/users/:id/posts", get(handlers::list_user_posts))
        .route("/users/:id/likes", get(handlers::list_user_likes))
        .route("/users/:id/comments", get(handlers::list_user_comments))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::list_posts).post(handlers::create_post))
        .route(
            "/posts/:id",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route("/posts/:id/like", post(handlers::toggle_like))
        .route("/posts/:id/likes", get(handlers::list_post_likes))
        .route("/posts/:id/likes/count", get(handlers::count_post_likes))
        .route("/posts/:id/view", post(handlers::register_view))
        .route("/posts/:id/views", get(handlers::count_views))
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route("/comments", post(handlers::create_comment))
        .route("/comments/post/:post_id", get(handlers::list_post_comments))
        .route(
            "/comments/:id",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
}

pub fn bookmarks() -> Router<AppState> {
    Router::new()
        .route("/bookmarks", get(handlers::list_bookmarks))
        .route(
            "/bookmarks/:post_id",
            get(handlers::bookmark_status)
                .post(handlers::toggle_bookmark)
                .delete(handlers::remove_bookmark),
        )
}

pub fn subscribers() -> Router<AppState> {
    Router::new()
        .route("/subscribers", get(handlers::list_subscriptions))
        .route("/subscribers/subscribers", get(handlers::list_subscribers))
        .route(
            "/subscribers/:creator_id",
            get(handlers::subscription_status)
                .post(handlers::subscribe)
                .delete(handlers::unsubscribe),
        )
        .route(
            "/subscribers/:creator_id/toggle",
            post(handlers::toggle_subscription),
        )
        .route(
            "/subscribers/:creator_id/count",
            get(handlers::count_subscribers),
        )
}
