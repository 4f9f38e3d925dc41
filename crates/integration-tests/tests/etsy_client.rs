//! Etsy client behavior against a mock Etsy API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use httpmock::prelude::*;
use secrecy::ExposeSecret;
use serde_json::json;

use scratchcard_integration_tests::{
    SHOP_ID, connected_store, etsy_config, shop_connection,
};
use scratchcard_server::etsy::{EtsyClient, EtsyError, MemoryTokenStore};

fn listing(id: i64, section: i64, state: &str) -> serde_json::Value {
    json!({
        "listing_id": id,
        "title": format!("Card {id}"),
        "state": state,
        "shop_section_id": section,
    })
}

// ============================================================================
// Token lifecycle
// ============================================================================

#[tokio::test]
async fn test_refreshes_once_on_401_and_persists_rotated_tokens() {
    let server = MockServer::start_async().await;
    let store = connected_store("old-access", "old-refresh");
    let client = EtsyClient::new(&etsy_config(&server.base_url(), None), store.clone()).unwrap();

    let rejected = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/shops/{SHOP_ID}/sections"))
                .header("authorization", "Bearer old-access");
            then.status(401).json_body(json!({"error": "invalid_token"}));
        })
        .await;
    let accepted = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/shops/{SHOP_ID}/sections"))
                .header("authorization", "Bearer new-access");
            then.status(200).json_body(json!({
                "count": 1,
                "results": [{"shop_section_id": 9, "title": "Scratch Cards"}]
            }));
        })
        .await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/oauth/token")
                .body_contains("grant_type=refresh_token")
                .body_contains("refresh_token=old-refresh");
            then.status(200).json_body(json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            }));
        })
        .await;

    let sections = client.shop_sections(SHOP_ID).await.unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].shop_section_id, 9);

    rejected.assert_async().await;
    accepted.assert_async().await;
    token.assert_async().await;

    let stored = store.current().await.unwrap();
    assert_eq!(stored.token.access_token.expose_secret(), "new-access");
    assert_eq!(stored.token.refresh_token.expose_secret(), "new-refresh");
}

#[tokio::test]
async fn test_second_401_after_refresh_is_unauthorized() {
    let server = MockServer::start_async().await;
    let store = connected_store("old-access", "old-refresh");
    let client = EtsyClient::new(&etsy_config(&server.base_url(), None), store).unwrap();

    let api = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/shops/{SHOP_ID}/sections"));
            then.status(401);
        })
        .await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": 3600
            }));
        })
        .await;

    let result = client.shop_sections(SHOP_ID).await;
    assert!(matches!(result, Err(EtsyError::Unauthorized)));
    assert_eq!(api.hits_async().await, 2);
    assert_eq!(token.hits_async().await, 1);
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_before_request() {
    let server = MockServer::start_async().await;
    let expires_soon = chrono::Utc::now().timestamp() + 30;
    let store = Arc::new(MemoryTokenStore::with_connection(shop_connection(
        "stale-access",
        "stale-refresh",
        expires_soon,
    )));
    let client = EtsyClient::new(&etsy_config(&server.base_url(), None), store.clone()).unwrap();

    let token = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(json!({
                "access_token": "fresh-access",
                "refresh_token": "fresh-refresh",
                "expires_in": 3600
            }));
        })
        .await;
    let api = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/shops/{SHOP_ID}/listings/active"))
                .header("authorization", "Bearer fresh-access")
                .header("x-api-key", "test-keystring");
            then.status(200).json_body(json!({"count": 0, "results": []}));
        })
        .await;

    let listings = client.active_listings(SHOP_ID).await.unwrap();
    assert!(listings.is_empty());

    token.assert_async().await;
    api.assert_async().await;
    let stored = store.current().await.unwrap();
    assert_eq!(stored.token.refresh_token.expose_secret(), "fresh-refresh");
}

#[tokio::test]
async fn test_rejected_refresh_surfaces_token_error() {
    let server = MockServer::start_async().await;
    let store = connected_store("old-access", "revoked-refresh");
    let client = EtsyClient::new(&etsy_config(&server.base_url(), None), store.clone()).unwrap();

    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(400).json_body(json!({
                "error": "invalid_grant",
                "error_description": "refresh token revoked"
            }));
        })
        .await;

    let err = client.refresh().await.unwrap_err();
    match err {
        EtsyError::TokenRequest { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "refresh token revoked");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let stored = store.current().await.unwrap();
    assert_eq!(stored.token.access_token.expose_secret(), "old-access");
}

#[tokio::test]
async fn test_requests_without_connection_fail_fast() {
    let server = MockServer::start_async().await;
    let client = EtsyClient::new(
        &etsy_config(&server.base_url(), None),
        Arc::new(MemoryTokenStore::new()),
    )
    .unwrap();

    let any = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;

    assert!(matches!(
        client.active_listings(SHOP_ID).await,
        Err(EtsyError::NotConnected)
    ));
    assert!(matches!(client.refresh().await, Err(EtsyError::NotConnected)));
    assert_eq!(any.hits_async().await, 0);
}

// ============================================================================
// Listings
// ============================================================================

#[tokio::test]
async fn test_section_listings_paginate_and_filter() {
    let server = MockServer::start_async().await;
    let client = EtsyClient::new(
        &etsy_config(&server.base_url(), Some(9)),
        connected_store("access", "refresh"),
    )
    .unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/shops/{SHOP_ID}/sections"));
            then.status(200).json_body(json!({
                "count": 2,
                "results": [
                    {"shop_section_id": 3, "title": "Prints"},
                    {"shop_section_id": 9, "title": "Scratch Cards"}
                ]
            }));
        })
        .await;

    // First page is full: 99 active cards in the section plus one draft.
    let mut first_page: Vec<_> = (1..=99).map(|id| listing(id, 9, "active")).collect();
    first_page.push(listing(100, 9, "draft"));
    let page_one = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/shops/{SHOP_ID}/listings"))
                .query_param("shop_section_id", "9")
                .query_param("limit", "100")
                .query_param("offset", "0");
            then.status(200)
                .json_body(json!({"count": 102, "results": first_page}));
        })
        .await;
    let page_two = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/shops/{SHOP_ID}/listings"))
                .query_param("shop_section_id", "9")
                .query_param("offset", "100");
            then.status(200).json_body(json!({
                "count": 102,
                "results": [listing(101, 9, "active"), listing(102, 3, "active")]
            }));
        })
        .await;

    let listings = client.section_listings(SHOP_ID, 9).await.unwrap().unwrap();

    page_one.assert_async().await;
    page_two.assert_async().await;
    assert_eq!(listings.len(), 100);
    assert!(listings.iter().all(|l| l.is_active_in(9)));
    assert!(listings.iter().any(|l| l.listing_id == 101));
    assert!(!listings.iter().any(|l| l.listing_id == 100));
}

#[tokio::test]
async fn test_section_listings_unknown_section() {
    let server = MockServer::start_async().await;
    let client = EtsyClient::new(
        &etsy_config(&server.base_url(), Some(9)),
        connected_store("access", "refresh"),
    )
    .unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/shops/{SHOP_ID}/sections"));
            then.status(200).json_body(json!({"count": 0, "results": []}));
        })
        .await;
    let listings = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/shops/{SHOP_ID}/listings"));
            then.status(200).json_body(json!({"count": 0, "results": []}));
        })
        .await;

    assert!(client.section_listings(SHOP_ID, 9).await.unwrap().is_none());
    assert_eq!(listings.hits_async().await, 0);
}

#[tokio::test]
async fn test_api_error_is_reported_with_status() {
    let server = MockServer::start_async().await;
    let client = EtsyClient::new(
        &etsy_config(&server.base_url(), None),
        connected_store("access", "refresh"),
    )
    .unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/shops/{SHOP_ID}/receipts"));
            then.status(503).body("upstream unavailable");
        })
        .await;

    match client.recent_receipts(SHOP_ID, 25).await.unwrap_err() {
        EtsyError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Receipts and webhooks
// ============================================================================

#[tokio::test]
async fn test_recent_receipts_sorted_newest_first() {
    let server = MockServer::start_async().await;
    let client = EtsyClient::new(
        &etsy_config(&server.base_url(), None),
        connected_store("access", "refresh"),
    )
    .unwrap();

    let receipts = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/shops/{SHOP_ID}/receipts"))
                .query_param("limit", "25")
                .query_param("sort_on", "created")
                .query_param("sort_order", "desc");
            then.status(200).json_body(json!({
                "count": 1,
                "results": [{
                    "receipt_id": 555,
                    "buyer_email": "buyer@example.com",
                    "transactions": [{"transaction_id": 1, "listing_id": 7}]
                }]
            }));
        })
        .await;

    let result = client.recent_receipts(SHOP_ID, 25).await.unwrap();
    receipts.assert_async().await;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].buyer_email.as_deref(), Some("buyer@example.com"));
    assert_eq!(result[0].transactions[0].listing_id, Some(7));
}

#[tokio::test]
async fn test_create_webhook_posts_subscription() {
    let server = MockServer::start_async().await;
    let client = EtsyClient::new(
        &etsy_config(&server.base_url(), None),
        connected_store("access", "refresh"),
    )
    .unwrap();

    let webhook = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/shops/{SHOP_ID}/webhooks"))
                .json_body(json!({
                    "event_name": "order.paid",
                    "callback_url": "https://api.example.com/api/etsy/etsy-webhook",
                    "shop_id": SHOP_ID
                }));
            then.status(201).json_body(json!({
                "event_name": "order.paid",
                "callback_url": "https://api.example.com/api/etsy/etsy-webhook",
                "webhook_id": "wh_1"
            }));
        })
        .await;

    let registration = client
        .create_webhook(
            SHOP_ID,
            "order.paid",
            "https://api.example.com/api/etsy/etsy-webhook",
        )
        .await
        .unwrap();

    webhook.assert_async().await;
    assert_eq!(registration.event_name.as_deref(), Some("order.paid"));
    assert_eq!(registration.extra.get("webhook_id"), Some(&json!("wh_1")));
}

#[tokio::test]
async fn test_receipt_line_items() {
    let server = MockServer::start_async().await;
    let client = EtsyClient::new(
        &etsy_config(&server.base_url(), None),
        connected_store("access", "refresh"),
    )
    .unwrap();

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/shops/{SHOP_ID}/receipts/555/transactions"));
            then.status(200).json_body(json!({
                "count": 2,
                "results": [
                    {"transaction_id": 1, "receipt_id": 555, "listing_id": 7, "quantity": 1},
                    {"transaction_id": 2, "receipt_id": 555, "listing_id": 8, "quantity": 2}
                ]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/shops/{SHOP_ID}/transactions/2"));
            then.status(200).json_body(json!({
                "transaction_id": 2,
                "receipt_id": 555,
                "listing_id": 8,
                "title": "Scratch card"
            }));
        })
        .await;

    let lines = client.receipt_transactions(SHOP_ID, 555).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].quantity, Some(2));

    let line = client.transaction(SHOP_ID, 2).await.unwrap();
    assert_eq!(line.listing_id, Some(8));
    assert_eq!(line.title.as_deref(), Some("Scratch card"));
}
