/// Ads API tests
/// Moderation visibility, ownership, view counting and top-ups
mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use x67_market::mailer::Notification;

#[tokio::test]
async fn test_new_ads_wait_for_approval() {
    let app = TestApp::new().await;
    let (token, _) = app.register("seller@example.com", "Seller").await;

    let created = app
        .post(
            "/api/ads",
            Some(&token),
            json!({
                "title": "Dacia Logan 2015",
                "description": "Un singur proprietar",
                "category_id": "cars",
                "city_id": "bucuresti",
                "price": 4200.0,
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.body["status"], "pending");
    let ad_id = created.body["ad_id"].as_str().unwrap().to_string();

    let listing = app.get("/api/ads", None).await;
    assert_eq!(listing.body["total"], 0);

    app.ctx
        .ad_manager
        .set_status(&ad_id, x67_market::ads::AdStatus::Active)
        .await
        .unwrap();

    let listing = app.get("/api/ads?category_id=cars", None).await;
    assert_eq!(listing.body["total"], 1);
    assert_eq!(listing.body["ads"][0]["ad_id"], ad_id.as_str());
    assert_eq!(listing.body["ads"][0]["category_name"].is_string(), true);

    let mine = app.get("/api/my-ads", Some(&token)).await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.body["ads"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_requires_session_and_fields() {
    let app = TestApp::new().await;

    let anonymous = app
        .post("/api/ads", None, json!({"title": "X", "description": "Y"}))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let (token, _) = app.register("seller@example.com", "Seller").await;
    let incomplete = app
        .post("/api/ads", Some(&token), json!({"title": "Fara descriere"}))
        .await;
    assert_eq!(incomplete.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detail_counts_views_and_reports_milestones() {
    let mut app = TestApp::new().await;
    let (token, _) = app.register("seller@example.com", "Seller").await;
    let ad_id = app.create_active_ad(&token, "Apartament 2 camere").await;
    app.drain_notifications();

    let first = app.get(&format!("/api/ads/{}", ad_id), None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["views"], 1);
    assert_eq!(first.body["user_name"], "Seller");

    sqlx::query("UPDATE ads SET views = 99 WHERE ad_id = ?1")
        .bind(&ad_id)
        .execute(&app.ctx.db)
        .await
        .unwrap();

    let hundredth = app.get(&format!("/api/ads/{}", ad_id), None).await;
    assert_eq!(hundredth.body["views"], 100);

    let queued = app.drain_notifications();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].to, "seller@example.com");
    match &queued[0].notification {
        Notification::ViewsMilestone { milestone, .. } => assert_eq!(*milestone, 100),
        other => panic!("Expected milestone notification, got {:?}", other),
    }

    // The next view crosses nothing
    app.get(&format!("/api/ads/{}", ad_id), None).await;
    assert!(app.drain_notifications().is_empty());
}

#[tokio::test]
async fn test_search_matches_diacritics_in_any_case() {
    let app = TestApp::new().await;
    let (token, _) = app.register("seller@example.com", "Seller").await;
    let ad_id = app.create_active_ad(&token, "Țeavă cupru").await;
    app.create_active_ad(&token, "Scaun").await;

    // Țeavă and ȚEAVĂ, percent-encoded
    for query in ["%C8%9Aeav%C4%83", "%C8%9AEAV%C4%82", "CUPRU"] {
        let listing = app.get(&format!("/api/ads?search={}", query), None).await;
        assert_eq!(listing.status, StatusCode::OK);
        assert_eq!(listing.body["total"], 1, "search={}", query);
        assert_eq!(listing.body["ads"][0]["ad_id"], ad_id.as_str());
    }

    let none = app.get("/api/ads?search=%C4%83la", None).await;
    assert_eq!(none.body["total"], 0);
}

#[tokio::test]
async fn test_out_of_range_page_is_empty() {
    let app = TestApp::new().await;
    let (token, _) = app.register("seller@example.com", "Seller").await;
    app.create_active_ad(&token, "Golf 7").await;

    let listing = app
        .get("/api/ads?page=9223372036854775807&limit=9223372036854775807", None)
        .await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.body["total"], 1);
    assert!(listing.body["ads"].as_array().unwrap().is_empty());

    let mine = app
        .get("/api/my-ads?page=9223372036854775807", Some(&token))
        .await;
    assert_eq!(mine.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_ad() {
    let app = TestApp::new().await;
    let response = app.get("/api/ads/ad_missing", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["detail"], "Ad not found");
}

#[tokio::test]
async fn test_only_owner_or_admin_may_edit() {
    let app = TestApp::new().await;
    let (owner, _) = app.register("owner@example.com", "Owner").await;
    let (other, _) = app.register("other@example.com", "Other").await;
    let admin = app.admin().await;
    let ad_id = app.create_ad(&owner, "Bicicleta").await;
    let path = format!("/api/ads/{}", ad_id);

    let foreign = app
        .request(Method::PUT, &path, Some(&other), Some(json!({"title": "Furat"})))
        .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let own = app
        .request(
            Method::PUT,
            &path,
            Some(&owner),
            Some(json!({"title": "Bicicleta MTB", "price": null})),
        )
        .await;
    assert_eq!(own.status, StatusCode::OK);

    let ad = app.ctx.ad_manager.get(&ad_id).await.unwrap();
    assert_eq!(ad.title, "Bicicleta MTB");
    assert_eq!(ad.price, None);

    let foreign_delete = app.request(Method::DELETE, &path, Some(&other), None).await;
    assert_eq!(foreign_delete.status, StatusCode::FORBIDDEN);

    let admin_delete = app.request(Method::DELETE, &path, Some(&admin), None).await;
    assert_eq!(admin_delete.status, StatusCode::OK);
    assert_eq!(app.get(&path, None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_topup_cooldown() {
    let app = TestApp::new().await;
    let (owner, _) = app.register("owner@example.com", "Owner").await;
    let (other, _) = app.register("other@example.com", "Other").await;

    let pending = app.create_ad(&owner, "Inca in moderare").await;
    let rejected = app
        .post(&format!("/api/ads/{}/topup", pending), Some(&owner), json!({}))
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.body["detail"], "Ad must be active to topup");

    let ad_id = app.create_active_ad(&owner, "Masina de spalat").await;
    let path = format!("/api/ads/{}/topup", ad_id);

    let foreign = app.post(&path, Some(&other), json!({})).await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let first = app.post(&path, Some(&owner), json!({})).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["next_topup_available_in"], 60);

    let second = app.post(&path, Some(&owner), json!({})).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert!(second.body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Top-up available again in"));
}

#[tokio::test]
async fn test_auto_topup_toggle() {
    let app = TestApp::new().await;
    let (owner, _) = app.register("owner@example.com", "Owner").await;
    let ad_id = app.create_active_ad(&owner, "Canapea").await;
    let path = format!("/api/ads/{}/auto-topup", ad_id);

    let on = app.post(&path, Some(&owner), json!({})).await;
    assert_eq!(on.status, StatusCode::OK);
    assert_eq!(on.body["auto_topup"], true);

    let off = app.post(&path, Some(&owner), json!({"enabled": false})).await;
    assert_eq!(off.body["auto_topup"], false);
    assert!(!app.ctx.ad_manager.get(&ad_id).await.unwrap().auto_topup);
}

#[tokio::test]
async fn test_taxonomy_is_public() {
    let app = TestApp::new().await;

    let categories = app.get("/api/categories", None).await;
    assert_eq!(categories.status, StatusCode::OK);
    assert!(categories
        .body
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["id"] == "cars"));

    let cities = app.get("/api/cities", None).await;
    assert!(!cities.body.as_array().unwrap().is_empty());

    let brands = app.get("/api/car-brands", None).await;
    assert!(brands.body.is_object());
}
