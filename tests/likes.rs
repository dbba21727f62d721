//! Like Toggle Tests
//!
//! Covers the like toggle, liker listing, like counts and the enriched
//! counts returned with posts.

mod common;

use axum::http::StatusCode;
use common::app;
use uuid::Uuid;

#[tokio::test]
async fn like_then_like_again_returns_to_unliked() {
    let app = app().await;
    let author = app.create_user("like_author").await;
    let reader = app.create_user("like_reader").await;
    let post_id = app.create_post_for_user(author.id, "Likeable", "body").await;

    let resp = app
        .post_empty(&format!("/api/posts/{}/like", post_id), Some(&reader.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["liked"], true);
    assert_eq!(resp.json()["likes_count"], 1);

    let resp = app
        .post_empty(&format!("/api/posts/{}/like", post_id), Some(&reader.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["liked"], false);
    assert_eq!(resp.json()["likes_count"], 0);
}

#[tokio::test]
async fn likes_from_different_users_accumulate() {
    let app = app().await;
    let author = app.create_user("like_multi_author").await;
    let first = app.create_user("like_multi_a").await;
    let second = app.create_user("like_multi_b").await;
    let post_id = app.create_post_for_user(author.id, "Popular", "body").await;

    app.post_empty(&format!("/api/posts/{}/like", post_id), Some(&first.access_token))
        .await;
    let resp = app
        .post_empty(&format!("/api/posts/{}/like", post_id), Some(&second.access_token))
        .await;
    assert_eq!(resp.json()["likes_count"], 2);

    let resp = app.get(&format!("/api/posts/{}/likes", post_id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let likers: Vec<String> = resp
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap().to_string())
        .collect();
    assert_eq!(likers.len(), 2);
    assert!(likers.contains(&first.id.to_string()));
    assert!(likers.contains(&second.id.to_string()));

    let resp = app
        .get(&format!("/api/posts/{}/likes/count", post_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json(), 2);
}

#[tokio::test]
async fn like_count_is_zero_without_likes() {
    let app = app().await;
    let author = app.create_user("like_zero").await;
    let post_id = app.create_post_for_user(author.id, "Quiet", "body").await;

    let resp = app
        .get(&format!("/api/posts/{}/likes/count", post_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json(), 0);
}

#[tokio::test]
async fn like_requires_authentication() {
    let app = app().await;
    let author = app.create_user("like_noauth").await;
    let post_id = app.create_post_for_user(author.id, "Locked", "body").await;

    let resp = app
        .post_empty(&format!("/api/posts/{}/like", post_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn like_unknown_post_is_not_found() {
    let app = app().await;
    let user = app.create_user("like_missing").await;

    let resp = app
        .post_empty(
            &format!("/api/posts/{}/like", Uuid::new_v4()),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");
}

#[tokio::test]
async fn concurrent_likes_by_one_user_never_fail() {
    let app = app().await;
    let author = app.create_user("like_race_author").await;
    let reader = app.create_user("like_race_reader").await;
    let post_id = app.create_post_for_user(author.id, "Race", "body").await;
    let path = format!("/api/posts/{}/like", post_id);

    let (first, second) = tokio::join!(
        app.post_empty(&path, Some(&reader.access_token)),
        app.post_empty(&path, Some(&reader.access_token)),
    );

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(count <= 1);
}

#[tokio::test]
async fn liked_posts_are_listed_for_the_user() {
    let app = app().await;
    let author = app.create_user("liked_list_author").await;
    let reader = app.create_user("liked_list_reader").await;
    let post_id = app.create_post_for_user(author.id, "Keeper", "body").await;

    app.post_empty(&format!("/api/posts/{}/like", post_id), Some(&reader.access_token))
        .await;

    let resp = app.get(&format!("/api/users/{}/likes", reader.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let posts = resp.json();
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], post_id.to_string());
    assert_eq!(posts[0]["likes_count"], 1);
    assert_eq!(posts[0]["author"]["username"], author.username);
}
