//! HTTP routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use crypto_session::CryptoError;
use shared_protocol::{CreateSessionRequest, CreateSessionResponse, EnvelopeBody, EnvelopeReply};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::{ApiError, AppState, Caller, MAX_BODY_BYTES};

/// Build the service router
pub fn router(state: AppState) -> Router {
    let channel = Router::new()
        .route("/pubkey", get(public_key_handler))
        .route("/session", post(create_session_handler))
        .route("/session/{session_id}", delete(close_session_handler))
        .route("/secure/{session_id}", post(secure_message_handler));

    Router::new()
        .nest("/api/crypto", channel)
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Server public key as PEM text
async fn public_key_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let keys = state.keys.clone();
    let pem = tokio::task::spawn_blocking(move || keys.public_key_pem())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], pem))
}

/// Handshake: register the client's wrapped session key
async fn create_session_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadBody(e.body_text()))?;
    let encrypted_key = request
        .encrypted_key()
        .map_err(|_| ApiError::MissingEncryptedKey)?;

    debug!(caller = ?caller, "Handshake requested");
    let session_id = state.handshake.create_session(encrypted_key).await?;

    Ok(Json(CreateSessionResponse { session_id }))
}

/// Secure message exchange.
///
/// The session is resolved before the body is inspected, so an unknown
/// session is always a 401.
async fn secure_message_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Caller(caller): Caller,
    body: Result<Json<EnvelopeBody>, JsonRejection>,
) -> Result<Json<EnvelopeReply>, ApiError> {
    let session = state.messages.open_session(&session_id).await?;
    let Json(body) = body.map_err(|e| CryptoError::MalformedInput(e.body_text()))?;

    let reply = state.messages.respond(&session, &body, caller).await?;
    Ok(Json(reply))
}

/// Close a session before its TTL runs out
async fn close_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Caller(_caller): Caller,
) -> Result<StatusCode, ApiError> {
    state.messages.close(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use axum::body::{Body, Bytes};
    use axum::http::Request;
    use base64::Engine;
    use crypto_session::{
        ClientHandshake, EchoHandler, KeyConfig, KeyManager, RSA_MODULUS_BITS, SessionCipher,
        SessionKey, TAG_SIZE, generate_pem_pair,
    };
    use serde_json::{Value, json};
    use session_store::{DEFAULT_SESSION_TTL, MemorySessionStore};
    use shared_protocol::{CallerIdentity, SESSION_ID_LEN};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    fn test_keys() -> (TempDir, Arc<KeyManager>) {
        static PAIR: OnceLock<(String, String)> = OnceLock::new();
        let (public_pem, private_pem) = PAIR.get_or_init(|| {
            let (public, private) = generate_pem_pair(RSA_MODULUS_BITS).unwrap();
            (public, private.to_string())
        });

        let dir = tempfile::tempdir().unwrap();
        let config = KeyConfig {
            key_dir: dir.path().join("keys"),
            ..Default::default()
        };
        let keys = KeyManager::with_keypair(config, public_pem, private_pem).unwrap();
        (dir, Arc::new(keys))
    }

    fn test_app(require_caller: bool) -> (TempDir, Router) {
        let (dir, keys) = test_keys();
        let store = Arc::new(MemorySessionStore::new(DEFAULT_SESSION_TTL));
        let state = AppState::new(keys, store, Arc::new(EchoHandler), require_caller);
        (dir, router(state))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn error_of(body: &Bytes) -> String {
        let json: Value = serde_json::from_slice(body).unwrap();
        json["error"].as_str().unwrap().to_string()
    }

    async fn fetch_public_key(app: &Router) -> String {
        let request = Request::builder()
            .uri("/api/crypto/pubkey")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        String::from_utf8(body.to_vec()).unwrap()
    }

    /// Full handshake over HTTP, returning the session id and client cipher
    async fn open_session(app: &Router, key: SessionKey) -> (String, SessionCipher) {
        let pem = fetch_public_key(app).await;
        let client = ClientHandshake::with_key(&pem, key).unwrap();

        let (status, body) = send(
            app,
            post_json(
                "/api/crypto/session",
                &json!({ "encryptedKey": client.encrypted_key() }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        let session_id = json["sessionId"].as_str().unwrap().to_string();
        (session_id, client.cipher())
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = test_app(false);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_public_key_is_pem_text() {
        let (_dir, app) = test_app(false);
        let request = Request::builder()
            .uri("/api/crypto/pubkey")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.starts_with(b"-----BEGIN PUBLIC KEY-----"));
    }

    #[tokio::test]
    async fn test_public_key_storage_failure_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let keys = KeyManager::new(KeyConfig {
            key_dir: blocker.join("keys"),
            ..Default::default()
        })
        .unwrap();

        let store = Arc::new(MemorySessionStore::new(DEFAULT_SESSION_TTL));
        let app = router(AppState::new(
            Arc::new(keys),
            store,
            Arc::new(EchoHandler),
            false,
        ));

        let request = Request::builder()
            .uri("/api/crypto/pubkey")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(&body), "internal");
    }

    #[tokio::test]
    async fn test_scenario_handshake_and_echo() {
        let (_dir, app) = test_app(false);
        let (session_id, cipher) = open_session(&app, SessionKey::from([0x01; 32])).await;
        assert_eq!(session_id.len(), SESSION_ID_LEN);

        let request = cipher.seal(br#"{"hello":"world"}"#, None).unwrap();
        let body = serde_json::to_value(request.to_body()).unwrap();
        let (status, body) = send(
            &app,
            post_json(&format!("/api/crypto/secure/{}", session_id), &body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let reply: EnvelopeReply = serde_json::from_slice(&body).unwrap();
        let plaintext = cipher.open(&reply.decode().unwrap()).unwrap();
        let echoed: Value = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(echoed, json!({ "ok": true, "got": r#"{"hello":"world"}"# }));
    }

    #[tokio::test]
    async fn test_scenario_unknown_session() {
        let (_dir, app) = test_app(false);
        let cipher = SessionCipher::new(&SessionKey::generate());
        let body = serde_json::to_value(cipher.seal(b"hi", None).unwrap().to_body()).unwrap();

        let uri = format!("/api/crypto/secure/{}", "ab".repeat(SESSION_ID_LEN / 2));
        let (status, body) = send(&app, post_json(&uri, &body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(&body), "invalid session");

        // Session resolution comes before body validation
        let (status, _) = send(&app, post_json(&uri, &json!({ "nonsense": 1 }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_scenario_short_ciphertext() {
        let (_dir, app) = test_app(false);
        let (session_id, _cipher) = open_session(&app, SessionKey::generate()).await;

        let engine = base64::engine::general_purpose::STANDARD;
        let body = json!({
            "iv": engine.encode([0u8; 12]),
            "ciphertext": engine.encode(vec![0u8; TAG_SIZE - 1]),
        });
        let (status, body) = send(
            &app,
            post_json(&format!("/api/crypto/secure/{}", session_id), &body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&body), "invalid message");
    }

    #[tokio::test]
    async fn test_tampering_indistinguishable_from_malformed() {
        let (_dir, app) = test_app(false);
        let (session_id, cipher) = open_session(&app, SessionKey::generate()).await;
        let uri = format!("/api/crypto/secure/{}", session_id);

        let mut tampered = cipher.seal(b"payload", None).unwrap();
        let last = tampered.ciphertext.len() - 1;
        tampered.ciphertext[last] ^= 0x01;
        let tampered = send(
            &app,
            post_json(&uri, &serde_json::to_value(tampered.to_body()).unwrap()),
        )
        .await;

        let missing = send(&app, post_json(&uri, &json!({ "iv": "AAAA" }))).await;

        assert_eq!(tampered.0, StatusCode::BAD_REQUEST);
        assert_eq!(tampered, missing);
    }

    #[tokio::test]
    async fn test_handshake_input_errors() {
        let (_dir, app) = test_app(false);

        let (status, body) = send(&app, post_json("/api/crypto/session", &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&body), "missing encryptedKey");

        let engine = base64::engine::general_purpose::STANDARD;
        let (status, body) = send(
            &app,
            post_json(
                "/api/crypto/session",
                &json!({ "encryptedKey": engine.encode([9u8; 384]) }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&body), "invalid encryptedKey");

        let request = Request::builder()
            .method("POST")
            .uri("/api/crypto/session")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_close_session() {
        let (_dir, app) = test_app(false);
        let (session_id, cipher) = open_session(&app, SessionKey::generate()).await;
        let uri = format!("/api/crypto/secure/{}", session_id);
        let body = serde_json::to_value(cipher.seal(b"hi", None).unwrap().to_body()).unwrap();

        let (status, _) = send(&app, post_json(&uri, &body)).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/crypto/session/{}", session_id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, post_json(&uri, &body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_required_caller_identity() {
        let (_dir, app) = test_app(true);

        // Public key stays open
        fetch_public_key(&app).await;

        let (status, body) = send(
            &app,
            post_json("/api/crypto/session", &json!({ "encryptedKey": "AAAA" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(&body), "unauthenticated");

        let pem = fetch_public_key(&app).await;
        let client = ClientHandshake::new(&pem).unwrap();
        let mut request = post_json(
            "/api/crypto/session",
            &json!({ "encryptedKey": client.encrypted_key() }),
        );
        request
            .extensions_mut()
            .insert(CallerIdentity::new("user-1"));
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
    }
}
