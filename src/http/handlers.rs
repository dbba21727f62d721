use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::comments::CommentService;
use crate::app::engagement::{EngagementService, SelfRelationError};
use crate::app::enrichment::EnrichmentService;
use crate::app::posts::{PostChanges, PostService};
use crate::app::search::{self, DEFAULT_SNIPPET_WINDOW};
use crate::app::users::UserService;
use crate::app::views::ViewService;
use crate::app::Mutation;
use crate::domain::engagement::{Comment, Relation, ViewerIdentifier};
use crate::domain::post::{Post, PostSort, PostView};
use crate::domain::user::{AuthorSummary, PublicProfile, User};
use crate::http::auth::auth_service;
use crate::http::viewer::ClientAddress;
use crate::http::{AppError, AuthUser};
use crate::infra::db::{constraint_violation, ConstraintViolation};
use crate::AppState;

const MAX_TITLE_LEN: usize = 300;
const MAX_CONTENT_LEN: usize = 50_000;
const MAX_COMMENT_LEN: usize = 5_000;
const MAX_USERNAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<crate::app::auth::TokenPair> for TokenResponse {
    fn from(tokens: crate::app::auth::TokenPair) -> Self {
        Self {
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub user: User,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();

    if username.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request(
            "username, email and password are required",
        ));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request("username must be at most 50 characters"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.chars().count() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let (user, tokens) = service
        .register(username, email, &payload.password)
        .await
        .map_err(|err| {
            if let Some(conflict) = user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(Json(AuthResponse {
        tokens: tokens.into(),
        user,
    }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.chars().count() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let session = service
        .login(payload.email.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match session {
        Some((user, tokens)) => Ok(Json(AuthResponse {
            tokens: tokens.into(),
            user,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let tokens = service
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let revoked = service
        .logout(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    if !revoked {
        tracing::debug!("logout with unknown or already revoked refresh token");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service
        .get_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch current user")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn get_user_profile(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PublicProfile>, AppError> {
    let service = UserService::new(state.db.clone());
    let profile = service.get_profile(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user profile");
        AppError::internal("failed to fetch user profile")
    })?;

    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let username = match payload.username {
        Some(username) => {
            let username = username.trim().to_string();
            if username.is_empty() {
                return Err(AppError::bad_request("username cannot be empty"));
            }
            if username.chars().count() > MAX_USERNAME_LEN {
                return Err(AppError::bad_request("username must be at most 50 characters"));
            }
            Some(username)
        }
        None => None,
    };

    let service = UserService::new(state.db.clone());
    let user = service
        .update_profile(auth.user_id, username, payload.bio, payload.avatar_url)
        .await
        .map_err(|err| {
            if let Some(conflict) = user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

/// Delete the caller's account and everything that references it.
pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = UserService::new(state.db.clone());
    let deleted = service
        .delete_account(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to delete account");
            AppError::internal("failed to delete account")
        })?;

    if deleted {
        tracing::info!(user_id = %auth.user_id, "account deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("user not found"))
    }
}

pub async fn list_user_posts(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let service = PostService::new(state.db.clone());
    let posts = service.list_by_author(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to list user posts");
        AppError::internal("failed to list user posts")
    })?;

    Ok(Json(enrich(&state, posts).await))
}

pub async fn list_user_likes(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let posts = service.list_liked_posts(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to list liked posts");
        AppError::internal("failed to list liked posts")
    })?;

    Ok(Json(enrich(&state, posts).await))
}

pub async fn list_user_comments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let service = CommentService::new(state.db.clone());
    let comments = service.list_by_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to list user comments");
        AppError::internal("failed to list user comments")
    })?;

    Ok(Json(comments))
}

#[derive(Deserialize)]
pub struct PostListQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
}

/// Posts matching `q`, enriched and ordered by `sort`, capped at `limit`
/// after ordering.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 500"));
    }
    let sort = match query.sort.as_deref() {
        None | Some("") => PostSort::default(),
        Some(value) => PostSort::parse(value).ok_or_else(|| {
            AppError::bad_request("sort must be one of newest, oldest, most_likes, most_views")
        })?,
    };

    let query_text = query.q.unwrap_or_default();
    let service = PostService::new(state.db.clone());

    // Without a query, the newest page is already the answer.
    let candidates = if query_text.trim().is_empty() && sort == PostSort::Newest {
        service.list_recent(limit).await
    } else {
        service.list_matching(&query_text).await
    };
    let candidates = candidates.map_err(|err| {
        tracing::error!(error = ?err, "failed to list posts");
        AppError::internal("failed to list posts")
    })?;

    let enriched = enrich(&state, candidates).await;
    let mut posts = search::search(enriched, &query_text, sort, DEFAULT_SNIPPET_WINDOW);
    posts.truncate(limit as usize);
    Ok(Json(posts))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    validate_title(&payload.title)?;
    validate_content(&payload.content)?;

    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(
            auth.user_id,
            payload.title.trim().to_string(),
            payload.content,
            clean_labels(payload.tags),
            clean_labels(payload.categories),
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    tracing::info!(post_id = %post.id, user_id = %auth.user_id, "post created");
    Ok(Json(post))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PostView>, AppError> {
    let service = PostService::new(state.db.clone());
    let post = service.get_post(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to fetch post");
        AppError::internal("failed to fetch post")
    })?;

    match post {
        Some(post) => Ok(Json(
            EnrichmentService::new(state.db.clone())
                .enrich_one(post)
                .await,
        )),
        None => Err(AppError::not_found("post not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    if let Some(title) = &payload.title {
        validate_title(title)?;
    }
    if let Some(content) = &payload.content {
        validate_content(content)?;
    }

    let changes = PostChanges {
        title: payload.title.map(|title| title.trim().to_string()),
        content: payload.content,
        tags: payload.tags.map(clean_labels),
        categories: payload.categories.map(clean_labels),
    };

    let service = PostService::new(state.db.clone());
    let result = service
        .update_post(id, auth.user_id, changes)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    match result {
        Mutation::Done(post) => Ok(Json(post)),
        Mutation::NotFound => Err(AppError::not_found("post not found")),
        Mutation::Forbidden => Err(AppError::forbidden("cannot edit another user's post")),
    }
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    let result = service
        .delete_post(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to delete post");
            AppError::internal("failed to delete post")
        })?;

    match result {
        Mutation::Done(()) => Ok(StatusCode::NO_CONTENT),
        Mutation::NotFound => Err(AppError::not_found("post not found")),
        Mutation::Forbidden => Err(AppError::forbidden("cannot delete another user's post")),
    }
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: i64,
}

pub async fn toggle_like(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let toggle = service
        .toggle(Relation::Like, auth.user_id, id)
        .await
        .map_err(|err| relation_error(err, Relation::Like, auth.user_id, id))?;

    let likes_count = service
        .count_for_target(Relation::Like, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to count likes");
            AppError::internal("failed to count likes")
        })?;

    Ok(Json(LikeResponse {
        liked: toggle.active,
        likes_count,
    }))
}

pub async fn list_post_likes(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Uuid>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let likers = service.list_likers(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to list likes");
        AppError::internal("failed to list likes")
    })?;

    Ok(Json(likers))
}

pub async fn count_post_likes(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<i64>, AppError> {
    count_relation(&state, Relation::Like, id).await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ViewResponse {
    pub views: i64,
}

/// Authenticated callers are counted by user id; a `userId` in the body
/// must match the token. Anonymous callers are counted by address.
pub async fn register_view(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    address: Option<ClientAddress>,
    State(state): State<AppState>,
    payload: Option<Json<ViewRequest>>,
) -> Result<Json<ViewResponse>, AppError> {
    let claimed_user = payload.and_then(|Json(body)| body.user_id);

    let viewer = match auth {
        Some(auth) => {
            if claimed_user.is_some_and(|user_id| user_id != auth.user_id) {
                return Err(AppError::forbidden("userId does not match the authenticated user"));
            }
            ViewerIdentifier::User(auth.user_id)
        }
        None => {
            let ClientAddress(address) = address.ok_or_else(|| {
                tracing::error!(post_id = %id, "request has no peer address");
                AppError::internal("client address unavailable")
            })?;
            ViewerIdentifier::from_address(&address)
        }
    };

    let service = ViewService::new(state.db.clone(), state.cache.clone(), state.view_window_hours);
    let views = service.register_view(id, &viewer).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, viewer = %viewer.key(), "failed to register view");
        AppError::internal("failed to register view")
    })?;

    match views {
        Some(views) => Ok(Json(ViewResponse { views })),
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn count_views(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<i64>, AppError> {
    let service = ViewService::new(state.db.clone(), state.cache.clone(), state.view_window_hours);
    let views = service.count(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to count views");
        AppError::internal("failed to count views")
    })?;

    match views {
        Some(views) => Ok(Json(views)),
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn list_post_comments(
    Path(post_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let service = CommentService::new(state.db.clone());
    let comments = service.list_for_post(post_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %post_id, "failed to list comments");
        AppError::internal("failed to list comments")
    })?;

    Ok(Json(comments))
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    #[serde(alias = "postId")]
    pub post_id: Uuid,
    pub content: String,
}

pub async fn create_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<Json<Comment>, AppError> {
    validate_comment(&payload.content)?;

    let service = CommentService::new(state.db.clone());
    let comment = service
        .create_comment(auth.user_id, payload.post_id, payload.content.trim().to_string())
        .await
        .map_err(|err| {
            if let Some(ConstraintViolation::ForeignKey(_)) = constraint_violation(&err) {
                return AppError::not_found("post not found");
            }
            tracing::error!(
                error = ?err,
                post_id = %payload.post_id,
                user_id = %auth.user_id,
                "failed to create comment"
            );
            AppError::internal("failed to create comment")
        })?;

    Ok(Json(comment))
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

pub async fn update_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, AppError> {
    validate_comment(&payload.content)?;

    let service = CommentService::new(state.db.clone());
    let result = service
        .update_comment(id, auth.user_id, payload.content.trim().to_string())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to update comment");
            AppError::internal("failed to update comment")
        })?;

    match result {
        Mutation::Done(comment) => Ok(Json(comment)),
        Mutation::NotFound => Err(AppError::not_found("comment not found")),
        Mutation::Forbidden => Err(AppError::forbidden("cannot edit another user's comment")),
    }
}

pub async fn delete_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = CommentService::new(state.db.clone());
    let result = service
        .delete_comment(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;

    match result {
        Mutation::Done(()) => Ok(StatusCode::NO_CONTENT),
        Mutation::NotFound => Err(AppError::not_found("comment not found")),
        Mutation::Forbidden => Err(AppError::forbidden("cannot delete another user's comment")),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkResponse {
    pub is_bookmarked: bool,
}

pub async fn list_bookmarks(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let posts = service
        .list_bookmarked_posts(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list bookmarks");
            AppError::internal("failed to list bookmarks")
        })?;

    Ok(Json(enrich(&state, posts).await))
}

pub async fn bookmark_status(
    Path(post_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BookmarkResponse>, AppError> {
    let is_bookmarked = relation_status(&state, Relation::Bookmark, auth.user_id, post_id).await?;
    Ok(Json(BookmarkResponse { is_bookmarked }))
}

pub async fn toggle_bookmark(
    Path(post_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BookmarkResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let toggle = service
        .toggle(Relation::Bookmark, auth.user_id, post_id)
        .await
        .map_err(|err| relation_error(err, Relation::Bookmark, auth.user_id, post_id))?;

    Ok(Json(BookmarkResponse {
        is_bookmarked: toggle.active,
    }))
}

pub async fn remove_bookmark(
    Path(post_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BookmarkResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    service
        .unset(Relation::Bookmark, auth.user_id, post_id)
        .await
        .map_err(|err| relation_error(err, Relation::Bookmark, auth.user_id, post_id))?;

    Ok(Json(BookmarkResponse {
        is_bookmarked: false,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub is_subscribed: bool,
}

/// Creators the caller subscribes to.
pub async fn list_subscriptions(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AuthorSummary>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let creators = service
        .list_subscriptions(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list subscriptions");
            AppError::internal("failed to list subscriptions")
        })?;

    Ok(Json(creators))
}

/// Users subscribed to the caller.
pub async fn list_subscribers(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AuthorSummary>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let subscribers = service
        .list_subscribers(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list subscribers");
            AppError::internal("failed to list subscribers")
        })?;

    Ok(Json(subscribers))
}

pub async fn subscription_status(
    Path(creator_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let is_subscribed =
        relation_status(&state, Relation::Subscription, auth.user_id, creator_id).await?;
    Ok(Json(SubscriptionResponse { is_subscribed }))
}

pub async fn subscribe(
    Path(creator_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let created = service
        .set(Relation::Subscription, auth.user_id, creator_id)
        .await
        .map_err(|err| relation_error(err, Relation::Subscription, auth.user_id, creator_id))?;

    if created {
        tracing::info!(subscriber_id = %auth.user_id, creator_id = %creator_id, "subscribed");
    }
    Ok(Json(SubscriptionResponse {
        is_subscribed: true,
    }))
}

pub async fn unsubscribe(
    Path(creator_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    service
        .unset(Relation::Subscription, auth.user_id, creator_id)
        .await
        .map_err(|err| relation_error(err, Relation::Subscription, auth.user_id, creator_id))?;

    Ok(Json(SubscriptionResponse {
        is_subscribed: false,
    }))
}

pub async fn toggle_subscription(
    Path(creator_id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let toggle = service
        .toggle(Relation::Subscription, auth.user_id, creator_id)
        .await
        .map_err(|err| relation_error(err, Relation::Subscription, auth.user_id, creator_id))?;

    Ok(Json(SubscriptionResponse {
        is_subscribed: toggle.active,
    }))
}

pub async fn count_subscribers(
    Path(creator_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<i64>, AppError> {
    count_relation(&state, Relation::Subscription, creator_id).await
}

async fn enrich(state: &AppState, posts: Vec<Post>) -> Vec<PostView> {
    EnrichmentService::new(state.db.clone()).enrich(posts).await
}

async fn relation_status(
    state: &AppState,
    relation: Relation,
    actor_id: Uuid,
    target_id: Uuid,
) -> Result<bool, AppError> {
    let service = EngagementService::new(state.db.clone());
    service
        .is_active(relation, actor_id, target_id)
        .await
        .map_err(|err| {
            tracing::error!(
                error = ?err,
                relation = relation.table(),
                actor_id = %actor_id,
                target_id = %target_id,
                "failed to check relation"
            );
            AppError::internal("failed to check status")
        })
}

async fn count_relation(
    state: &AppState,
    relation: Relation,
    target_id: Uuid,
) -> Result<Json<i64>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let count = service
        .count_for_target(relation, target_id)
        .await
        .map_err(|err| {
            tracing::error!(
                error = ?err,
                relation = relation.table(),
                target_id = %target_id,
                "failed to count relation"
            );
            AppError::internal("failed to count")
        })?;

    Ok(Json(count))
}

fn relation_error(err: anyhow::Error, relation: Relation, actor_id: Uuid, target_id: Uuid) -> AppError {
    if let Some(self_relation) = err.downcast_ref::<SelfRelationError>() {
        return AppError::bad_request(self_relation.to_string());
    }
    match constraint_violation(&err) {
        Some(ConstraintViolation::ForeignKey(_)) => {
            return AppError::not_found(match relation {
                Relation::Subscription => "user not found",
                Relation::Like | Relation::Bookmark => "post not found",
            });
        }
        Some(ConstraintViolation::Check(_)) => {
            return AppError::bad_request(SelfRelationError.to_string());
        }
        _ => {}
    }

    tracing::error!(
        error = ?err,
        relation = relation.table(),
        actor_id = %actor_id,
        target_id = %target_id,
        "failed to update relation"
    );
    AppError::internal("failed to update relation")
}

fn user_conflict(err: &anyhow::Error) -> Option<AppError> {
    match constraint_violation(err)? {
        ConstraintViolation::Unique(constraint) if constraint.contains("users_username_key") => {
            Some(AppError::conflict("Username already taken"))
        }
        ConstraintViolation::Unique(constraint) if constraint.contains("users_email_key") => {
            Some(AppError::conflict("Email already taken"))
        }
        _ => None,
    }
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::bad_request("title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::bad_request("title must be at most 300 characters"));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::bad_request("content cannot be empty"));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::bad_request("content must be at most 50000 characters"));
    }
    Ok(())
}

fn validate_comment(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::bad_request("comment cannot be empty"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request("comment must be at most 5000 characters"));
    }
    Ok(())
}

fn clean_labels(labels: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim();
        if !label.is_empty() && !cleaned.iter().any(|existing| existing == label) {
            cleaned.push(label.to_string());
        }
    }
    cleaned
}
