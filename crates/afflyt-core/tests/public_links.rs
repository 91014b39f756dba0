//! Public link lookup and visit tracking against a mock backend.

use std::time::Duration;

use afflyt_core::api::{ApiClient, AuthErrorKind, ClickEvent};
use afflyt_core::preview::{PreviewPage, Tracker, UNKNOWN_DESTINATION};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_public_link_builds_preview_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/links/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "link": {
                    "hash": "abc123",
                    "originalUrl": "https://www.amazon.it/dp/B000?tag=mario-21",
                    "title": "Cuffie wireless"
                },
                "branding": { "displayName": "Mario Deals", "customMessage": "Ciao!" },
                "owner": { "name": "Mario" }
            }
        })))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri());
    let data = api.public_link("abc123").await.unwrap();
    let page = PreviewPage::from(&data);

    assert_eq!(page.hash, "abc123");
    assert_eq!(page.title, "Cuffie wireless");
    assert_eq!(page.destination_domain, "amazon.it");
    assert_eq!(page.brand_name.as_deref(), Some("Mario Deals"));
    assert_eq!(page.brand_message.as_deref(), Some("Ciao!"));
    assert_eq!(page.owner_name.as_deref(), Some("Mario"));
}

#[tokio::test]
async fn test_unparseable_destination_uses_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/links/bad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "link": { "hash": "bad", "destinationUrl": "::::" }
        })))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri());
    let page = PreviewPage::from(&api.public_link("bad").await.unwrap());
    assert_eq!(page.destination_domain, UNKNOWN_DESTINATION);
}

#[tokio::test]
async fn test_missing_link_has_readable_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/links/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Not found" })))
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri());
    let err = api.public_link("gone").await.unwrap_err();
    assert_eq!(err.kind, AuthErrorKind::Api);
    assert!(err.message.contains("does not exist"));
}

#[tokio::test]
async fn test_pixel_carries_hash_and_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/pixel"))
        .and(query_param("hash", "abc123"))
        .and(query_param_contains("t", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x47, 0x49, 0x46]))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = Tracker::new(ApiClient::new(server.uri()), Duration::from_millis(10));
    tracker.fire_pixel("abc123").await.unwrap();
}

#[tokio::test]
async fn test_click_registration_posts_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/public/track/click"))
        .and(body_json(json!({ "hash": "abc123", "userAgent": "afflyt-test" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = Tracker::new(ApiClient::new(server.uri()), Duration::ZERO);
    tracker
        .register_click(ClickEvent {
            hash: "abc123".to_string(),
            referrer: None,
            user_agent: Some("afflyt-test".to_string()),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_tracking_failures_are_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/pixel"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/public/track/click"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tracker = Tracker::new(ApiClient::new(server.uri()), Duration::ZERO);
    // Join handles complete normally: nothing panics or propagates.
    tracker.fire_pixel("abc123").await.unwrap();
    tracker
        .register_click(ClickEvent {
            hash: "abc123".to_string(),
            referrer: None,
            user_agent: None,
        })
        .await
        .unwrap();
}
