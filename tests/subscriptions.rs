//! Subscription Tests
//!
//! Covers subscribe/unsubscribe, toggle, self-subscription rejection,
//! subscriber counts and listings.

mod common;

use axum::http::StatusCode;
use common::app;
use uuid::Uuid;

#[tokio::test]
async fn subscribe_and_unsubscribe() {
    let app = app().await;
    let creator = app.create_user("sub_basic_creator").await;
    let fan = app.create_user("sub_basic_fan").await;
    let path = format!("/api/subscribers/{}", creator.id);

    let resp = app.post_empty(&path, Some(&fan.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["isSubscribed"], true);

    // second subscribe is absorbed
    let resp = app.post_empty(&path, Some(&fan.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["isSubscribed"], true);

    let resp = app
        .get(&format!("/api/subscribers/{}/count", creator.id), None)
        .await;
    assert_eq!(resp.json(), 1);

    let resp = app.delete(&path, Some(&fan.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["isSubscribed"], false);

    let resp = app.get(&path, Some(&fan.access_token)).await;
    assert_eq!(resp.json()["isSubscribed"], false);

    let resp = app
        .get(&format!("/api/subscribers/{}/count", creator.id), None)
        .await;
    assert_eq!(resp.json(), 0);
}

#[tokio::test]
async fn toggle_twice_restores_original_state() {
    let app = app().await;
    let creator = app.create_user("sub_toggle_creator").await;
    let fan = app.create_user("sub_toggle_fan").await;
    let path = format!("/api/subscribers/{}/toggle", creator.id);

    let resp = app.post_empty(&path, Some(&fan.access_token)).await;
    assert_eq!(resp.json()["isSubscribed"], true);

    let resp = app.post_empty(&path, Some(&fan.access_token)).await;
    assert_eq!(resp.json()["isSubscribed"], false);

    let resp = app
        .get(&format!("/api/subscribers/{}/count", creator.id), None)
        .await;
    assert_eq!(resp.json(), 0);
}

#[tokio::test]
async fn self_subscription_is_rejected() {
    let app = app().await;
    let user = app.create_user("sub_self").await;

    for path in [
        format!("/api/subscribers/{}", user.id),
        format!("/api/subscribers/{}/toggle", user.id),
    ] {
        let resp = app.post_empty(&path, Some(&user.access_token)).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_message(), "cannot subscribe to yourself");
    }

    let resp = app
        .delete(&format!("/api/subscribers/{}", user.id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscribers WHERE creator_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn subscribing_to_unknown_user_is_not_found() {
    let app = app().await;
    let fan = app.create_user("sub_missing").await;

    let resp = app
        .post_empty(
            &format!("/api/subscribers/{}", Uuid::new_v4()),
            Some(&fan.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

#[tokio::test]
async fn subscription_lists_cover_both_directions() {
    let app = app().await;
    let creator = app.create_user("sub_list_creator").await;
    let fan = app.create_user("sub_list_fan").await;

    app.post_empty(
        &format!("/api/subscribers/{}", creator.id),
        Some(&fan.access_token),
    )
    .await;

    let resp = app.get("/api/subscribers", Some(&fan.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let creators = resp.json();
    assert_eq!(creators.as_array().unwrap().len(), 1);
    assert_eq!(creators[0]["id"], creator.id.to_string());
    assert_eq!(creators[0]["username"], creator.username);

    let resp = app
        .get("/api/subscribers/subscribers", Some(&creator.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let subscribers = resp.json();
    assert_eq!(subscribers.as_array().unwrap().len(), 1);
    assert_eq!(subscribers[0]["id"], fan.id.to_string());

    let resp = app.get(&format!("/api/users/{}", creator.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["subscribers_count"], 1);
}

#[tokio::test]
async fn count_for_user_without_subscribers_is_zero() {
    let app = app().await;

    let resp = app
        .get(&format!("/api/subscribers/{}/count", Uuid::new_v4()), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json(), 0);
}
