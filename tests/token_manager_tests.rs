//! Integration tests for TokenManager and the storage backends.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use oauth2_token_manager::{
    token_manager_config, AuthServerError, CookieOptions, CookieTokenStorage, FileTokenStorage,
    GrantType, HttpAuthorizationServer, MemoryTokenStorage, MockAuthorizationServer,
    OAuth2Error, RequestHeaderTokenStorage, Token, TokenError, TokenManager, TokenManagerConfig,
    TokenResponse, TokenStorage,
};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn compact(claims: Value) -> String {
    format!(
        "{}.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

fn expired_token() -> Token {
    Token::new(
        compact(json!({
            "exp": Utc::now().timestamp() - 60,
            "sub": "u1",
            "scope": "read write"
        })),
        Some("r1".to_string()),
    )
    .unwrap()
}

fn fresh_compact() -> String {
    compact(json!({
        "exp": Utc::now().timestamp() + 3600,
        "sub": "u1",
        "scope": "read write"
    }))
}

fn config() -> TokenManagerConfig {
    token_manager_config()
        .server("https://auth.example.com")
        .client_id("client-1")
        .client_secret("secret")
        .build()
        .unwrap()
}

async fn manager_with_expired_token(
    server: MockAuthorizationServer,
) -> TokenManager<MockAuthorizationServer, MemoryTokenStorage> {
    TokenManager::new(
        config(),
        Arc::new(server),
        Arc::new(MemoryTokenStorage::with_token(expired_token())),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_stored() {
    let server = MockAuthorizationServer::new();
    let fresh = fresh_compact();
    server.queue_token(TokenResponse::bearer(fresh.clone()));
    let mut manager = manager_with_expired_token(server).await;

    assert!(manager.has_valid_access_token().await.unwrap());

    let stored = manager.storage().get().await.unwrap().unwrap();
    assert_eq!(stored.compact(), fresh);
    assert_eq!(stored.refresh_credential(), Some("r1"));
    assert_eq!(manager.server().token_requests()[0].0, GrantType::RefreshToken);
}

#[tokio::test]
async fn test_failed_refresh_propagates_and_empties_storage() {
    let server = MockAuthorizationServer::new();
    server.queue_token_error(
        AuthServerError::new("invalid_grant")
            .with_description("Refresh token revoked")
            .into(),
    );
    let mut manager = manager_with_expired_token(server).await;

    let result = manager.has_valid_access_token().await;
    assert!(matches!(result, Err(OAuth2Error::AuthServer(_))));
    assert!(manager.storage().get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_without_credential_keeps_record() {
    let expired = Token::parse(compact(json!({"exp": 1, "sub": "u1"}))).unwrap();
    let storage = Arc::new(MemoryTokenStorage::with_token(expired.clone()));
    let mut manager = TokenManager::new(
        config(),
        Arc::new(MockAuthorizationServer::new()),
        storage.clone(),
    )
    .await
    .unwrap();

    let result = manager.refresh_access_token(None).await;
    assert!(matches!(
        result,
        Err(OAuth2Error::Token(TokenError::NoRefreshCredential))
    ));
    assert_eq!(storage.peek(), Some(expired));
}

#[tokio::test]
async fn test_refresh_of_valid_token_makes_no_call() {
    let current = Token::new(fresh_compact(), Some("r1".to_string())).unwrap();
    let server = Arc::new(MockAuthorizationServer::new());
    let mut manager = TokenManager::new(
        config(),
        server.clone(),
        Arc::new(MemoryTokenStorage::with_token(current.clone())),
    )
    .await
    .unwrap();

    assert_eq!(manager.refresh_access_token(None).await.unwrap(), Some(current));
    assert!(server.token_requests().is_empty());
}

#[tokio::test]
async fn test_absent_token_has_no_side_effects() {
    let server = Arc::new(MockAuthorizationServer::new());
    let mut manager = TokenManager::new(
        config(),
        server.clone(),
        Arc::new(RequestHeaderTokenStorage::empty()),
    )
    .await
    .unwrap();

    assert!(!manager.has_valid_access_token().await.unwrap());
    assert!(server.token_requests().is_empty());
    assert!(server.resource_owner_requests().is_empty());
}

#[tokio::test]
async fn test_check_scope_from_inbound_header() {
    let authorization = format!("Bearer {}", fresh_compact());
    let mut manager = TokenManager::new(
        config(),
        Arc::new(MockAuthorizationServer::new()),
        Arc::new(RequestHeaderTokenStorage::new(Some(authorization))),
    )
    .await
    .unwrap();

    assert!(manager.check_scope(&["read"]).await.unwrap());
    assert!(!manager.check_scope(&["admin"]).await.unwrap());
}

#[tokio::test]
async fn test_inbound_header_token_is_not_refreshable() {
    let authorization = format!("Bearer {}", expired_token().compact());
    let server = Arc::new(MockAuthorizationServer::new());
    let mut manager = TokenManager::new(
        config(),
        server.clone(),
        Arc::new(RequestHeaderTokenStorage::new(Some(authorization))),
    )
    .await
    .unwrap();

    assert!(!manager.has_valid_access_token().await.unwrap());
    assert!(server.token_requests().is_empty());
}

#[tokio::test]
async fn test_malformed_inbound_header_fails_construction() {
    let result = TokenManager::new(
        config(),
        Arc::new(MockAuthorizationServer::new()),
        Arc::new(RequestHeaderTokenStorage::new(Some("Bearer bad.bad.bad"))),
    )
    .await;
    assert!(matches!(
        result,
        Err(OAuth2Error::Token(TokenError::Malformed { .. }))
    ));
}

#[tokio::test]
async fn test_file_and_cookie_round_trip() {
    let token = Token::new(fresh_compact(), Some("r1".to_string())).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let backends: Vec<Box<dyn TokenStorage>> = vec![
        Box::new(FileTokenStorage::new(dir.path().join("token.json"))),
        Box::new(CookieTokenStorage::new(CookieOptions::default())),
    ];

    for storage in backends {
        storage.save(&token).await.unwrap();
        let loaded = storage.get().await.unwrap().unwrap();
        assert_eq!(loaded.compact(), token.compact());
        assert_eq!(loaded.refresh_credential(), Some("r1"));
    }
}

#[tokio::test]
async fn test_delete_is_idempotent_for_every_backend() {
    let token = Token::new(fresh_compact(), Some("r1".to_string())).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let authorization = format!("Bearer {}", token.compact());

    let backends: Vec<Box<dyn TokenStorage>> = vec![
        Box::new(MemoryTokenStorage::new()),
        Box::new(FileTokenStorage::new(dir.path().join("token.json"))),
        Box::new(CookieTokenStorage::new(CookieOptions::default())),
        Box::new(RequestHeaderTokenStorage::new(Some(authorization))),
    ];

    for storage in backends {
        storage.delete().await.unwrap();
        assert!(storage.get().await.unwrap().is_none());

        storage.save(&token).await.unwrap();
        storage.delete().await.unwrap();
        storage.delete().await.unwrap();
        assert!(storage.get().await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_password_grant_over_http_persists_to_file() {
    let mock = MockServer::start().await;
    let issued = fresh_compact();
    Mock::given(method("POST"))
        .and(path("/api/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=ann"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": issued,
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "r1"
        })))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/resource"))
        .and(header("authorization", format!("Bearer {issued}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1",
            "user_id": 42,
            "name": "Ann"
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let config = token_manager_config()
        .server(mock.uri())
        .client_id("client-1")
        .client_secret("secret")
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileTokenStorage::new(dir.path().join("token.json")));
    let server = Arc::new(HttpAuthorizationServer::from_config(&config).unwrap());
    let mut manager = TokenManager::new(config, server, storage.clone()).await.unwrap();

    let token = manager.do_password_grant("ann", "pw").await.unwrap();
    assert_eq!(token.compact(), issued);
    assert_eq!(storage.get().await.unwrap(), Some(token));

    let owner = manager.get_resource_owner().await.unwrap();
    assert_eq!(owner.id().as_deref(), Some("u1"));
    assert!(owner.get("user_id").is_none());
    manager.get_resource_owner().await.unwrap();
}

#[tokio::test]
async fn test_refresh_over_http_failure_deletes_file() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Refresh token expired"
        })))
        .mount(&mock)
        .await;

    let config = token_manager_config()
        .server(mock.uri())
        .client_id("client-1")
        .client_secret("secret")
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    let storage = Arc::new(FileTokenStorage::new(&path));
    storage.save(&expired_token()).await.unwrap();

    let server = Arc::new(HttpAuthorizationServer::from_config(&config).unwrap());
    let mut manager = TokenManager::new(config, server, storage).await.unwrap();

    match manager.has_valid_access_token().await {
        Err(OAuth2Error::AuthServer(e)) => assert_eq!(e.error, "invalid_grant"),
        other => panic!("expected auth server error, got {other:?}"),
    }
    assert!(!path.exists());
}
