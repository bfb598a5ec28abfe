#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use std::sync::Arc;
use switchyard_auth::*;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// 1. File-backed tokens survive a restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_store_tokens_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.json");

    {
        let store = Arc::new(FileSecretStore::new(path.clone()).await.unwrap());
        let manager = TokenManager::new(store);
        let cred = OAuthCredential::from_token_response("at-1".into(), Some("rt-1".into()), None)
            .unwrap();
        manager.store_tokens("gemini", "work", &cred).await.unwrap();
    }

    let store = Arc::new(FileSecretStore::new(path).await.unwrap());
    assert_eq!(
        store.list().await.unwrap(),
        vec![token_key("gemini", "work")]
    );
    let manager = TokenManager::new(store);
    assert_eq!(
        manager.get_access_token("gemini", "work").await.as_deref(),
        Some("at-1")
    );
}

// ---------------------------------------------------------------------------
// 2. Expiring token refreshed over HTTP and persisted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expiring_token_refreshed_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        FileSecretStore::new(dir.path().join("secrets.json"))
            .await
            .unwrap(),
    );
    let manager = TokenManager::new(store.clone()).with_refresher(
        "openai",
        Arc::new(OAuthRefresher::new(server.uri(), "client")),
    );

    let stale = OAuthCredential {
        access_token: "at-1".into(),
        refresh_token: Some("rt-1".into()),
        expires_at: Utc::now() + Duration::seconds(30),
        token_type: None,
        scope: None,
    };
    manager.store_tokens("openai", "oauth", &stale).await.unwrap();

    assert_eq!(
        manager.get_access_token("openai", "oauth").await.as_deref(),
        Some("at-2")
    );
    // Second call is served from the store.
    assert_eq!(
        manager.get_access_token("openai", "oauth").await.as_deref(),
        Some("at-2")
    );

    let raw = store
        .get(&token_key("openai", "oauth"))
        .await
        .unwrap()
        .unwrap();
    let persisted: OAuthCredential = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted.refresh_token.as_deref(), Some("rt-1"));
}

// ---------------------------------------------------------------------------
// 3. Status listing carries no token material
// ---------------------------------------------------------------------------

#[tokio::test]
async fn listing_has_no_token_material() {
    let manager = TokenManager::new(Arc::new(MemorySecretStore::new()));
    let cred = OAuthCredential::from_token_response("secret-at".into(), Some("secret-rt".into()), None)
        .unwrap();
    manager.store_tokens("anthropic", "max", &cred).await.unwrap();

    let entries = manager.list_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    let json = serde_json::to_string(&entries).unwrap();
    assert!(!json.contains("secret-at"));
    assert!(!json.contains("secret-rt"));
    assert!(json.contains("anthropic"));
}

// ---------------------------------------------------------------------------
// 4. Unrepresentable expiry from the token endpoint degrades to no token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unrepresentable_refresh_expiry_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-2",
            "expires_in": i64::MAX
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySecretStore::new());
    let manager = TokenManager::new(store.clone()).with_refresher(
        "openai",
        Arc::new(OAuthRefresher::new(server.uri(), "client")),
    );

    let expired = OAuthCredential {
        access_token: "at-1".into(),
        refresh_token: Some("rt-1".into()),
        expires_at: Utc::now() - Duration::minutes(5),
        token_type: None,
        scope: None,
    };
    manager.store_tokens("openai", "oauth", &expired).await.unwrap();

    assert!(manager.get_access_token("openai", "oauth").await.is_none());

    // The stored credential is left as it was.
    let raw = store
        .get(&token_key("openai", "oauth"))
        .await
        .unwrap()
        .unwrap();
    let kept: OAuthCredential = serde_json::from_str(&raw).unwrap();
    assert_eq!(kept.access_token, "at-1");
    assert_eq!(kept.refresh_token.as_deref(), Some("rt-1"));
}
