//! Bookmark Tests
//!
//! Covers bookmark toggle, status checks, removal and listing.

mod common;

use axum::http::StatusCode;
use common::app;
use uuid::Uuid;

#[tokio::test]
async fn bookmark_toggle_flips_state() {
    let app = app().await;
    let author = app.create_user("bm_toggle_author").await;
    let reader = app.create_user("bm_toggle_reader").await;
    let post_id = app.create_post_for_user(author.id, "Save me", "body").await;
    let path = format!("/api/bookmarks/{}", post_id);

    let resp = app.get(&path, Some(&reader.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["isBookmarked"], false);

    let resp = app.post_empty(&path, Some(&reader.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["isBookmarked"], true);

    let resp = app.get(&path, Some(&reader.access_token)).await;
    assert_eq!(resp.json()["isBookmarked"], true);

    let resp = app.post_empty(&path, Some(&reader.access_token)).await;
    assert_eq!(resp.json()["isBookmarked"], false);
}

#[tokio::test]
async fn delete_bookmark_is_idempotent() {
    let app = app().await;
    let author = app.create_user("bm_delete_author").await;
    let reader = app.create_user("bm_delete_reader").await;
    let post_id = app.create_post_for_user(author.id, "Remove me", "body").await;
    let path = format!("/api/bookmarks/{}", post_id);

    app.post_empty(&path, Some(&reader.access_token)).await;

    for _ in 0..2 {
        let resp = app.delete(&path, Some(&reader.access_token)).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json()["isBookmarked"], false);
    }

    let resp = app.get(&path, Some(&reader.access_token)).await;
    assert_eq!(resp.json()["isBookmarked"], false);
}

#[tokio::test]
async fn bookmarks_list_returns_enriched_posts() {
    let app = app().await;
    let author = app.create_user("bm_list_author").await;
    let reader = app.create_user("bm_list_reader").await;
    let first = app.create_post_for_user(author.id, "First", "body").await;
    let second = app.create_post_for_user(author.id, "Second", "body").await;

    app.post_empty(&format!("/api/bookmarks/{}", first), Some(&reader.access_token))
        .await;
    app.post_empty(&format!("/api/bookmarks/{}", second), Some(&reader.access_token))
        .await;

    let resp = app.get("/api/bookmarks", Some(&reader.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let posts = resp.json();
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 2);
    // most recently bookmarked first
    assert_eq!(posts[0]["id"], second.to_string());
    assert_eq!(posts[1]["id"], first.to_string());
    assert_eq!(posts[0]["author"]["username"], author.username);
    assert_eq!(posts[0]["views_count"], 0);
}

#[tokio::test]
async fn bookmark_unknown_post_is_not_found() {
    let app = app().await;
    let reader = app.create_user("bm_missing").await;

    let resp = app
        .post_empty(
            &format!("/api/bookmarks/{}", Uuid::new_v4()),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bookmarks_require_authentication() {
    let app = app().await;

    let resp = app.get("/api/bookmarks", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}
