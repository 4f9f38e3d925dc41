//! Template image storage against a mock storage API.

#![allow(clippy::unwrap_used)]

use httpmock::prelude::*;
use serde_json::json;

use scratchcard_integration_tests::storage_config;
use scratchcard_server::services::storage::{StorageClient, StorageError, UploadFile};

fn png(name: &str) -> UploadFile {
    UploadFile {
        file_name: name.to_string(),
        content_type: Some("image/png".to_string()),
        data: vec![0x89, b'P', b'N', b'G'],
    }
}

#[tokio::test]
async fn test_upload_returns_public_url() {
    let server = MockServer::start_async().await;
    let storage = StorageClient::new(&storage_config(&server.base_url(), Some("cards"))).unwrap();

    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/storage/v1/object/cards/background-1700000000000-front.png")
                .header("x-upsert", "true")
                .header("content-type", "image/png")
                .header("authorization", "Bearer service-role-key")
                .header("apikey", "service-role-key");
            then.status(200)
                .json_body(json!({"Key": "cards/background-1700000000000-front.png"}));
        })
        .await;

    let url = storage
        .upload("background-1700000000000-front.png", png("front.png"))
        .await
        .unwrap();

    upload.assert_async().await;
    assert_eq!(
        url,
        format!(
            "{}/storage/v1/object/public/cards/background-1700000000000-front.png",
            server.base_url()
        )
    );
    assert_eq!(
        storage.object_path(&url).as_deref(),
        Some("background-1700000000000-front.png")
    );
}

#[tokio::test]
async fn test_upload_error_carries_status() {
    let server = MockServer::start_async().await;
    let storage = StorageClient::new(&storage_config(&server.base_url(), Some("cards"))).unwrap();

    server
        .mock_async(|when, then| {
            when.method(POST).path_contains("/storage/v1/object/cards/");
            then.status(413).body("Payload too large");
        })
        .await;

    match storage.upload("sticker-1-big.png", png("big.png")).await {
        Err(StorageError::Api { status, message }) => {
            assert_eq!(status, 413);
            assert_eq!(message, "Payload too large");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_remove_sends_prefixes() {
    let server = MockServer::start_async().await;
    let storage = StorageClient::new(&storage_config(&server.base_url(), Some("cards"))).unwrap();

    let remove = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/storage/v1/object/cards")
                .json_body(json!({"prefixes": ["background-1-a.png", "sticker-1-b.png"]}));
            then.status(200).json_body(json!([]));
        })
        .await;

    storage
        .remove(&[
            "background-1-a.png".to_string(),
            "sticker-1-b.png".to_string(),
        ])
        .await
        .unwrap();

    remove.assert_async().await;
}

#[tokio::test]
async fn test_remove_nothing_skips_request() {
    let server = MockServer::start_async().await;
    let storage = StorageClient::new(&storage_config(&server.base_url(), Some("cards"))).unwrap();

    let any = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;

    storage.remove(&[]).await.unwrap();
    assert_eq!(any.hits_async().await, 0);
}

#[tokio::test]
async fn test_upload_without_bucket() {
    let server = MockServer::start_async().await;
    let storage = StorageClient::new(&storage_config(&server.base_url(), None)).unwrap();

    let result = storage.upload("a.png", png("a.png")).await;
    assert!(matches!(result, Err(StorageError::BucketNotConfigured)));
}
