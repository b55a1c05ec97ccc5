//! Attack Scenario Tests
//!
//! These tests verify that specific attack patterns are blocked at the HTTP
//! boundary. Each test represents a way to walk away with a certificate for
//! an address the attacker does not control.

use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use sideshow_bridge::handlers::MockVerifier;
use sideshow_core::{CertificateIssuer, KeyPair};
use sideshow_server::{create_router, AppState, Config, KeyProvider, MemoryStore, TrustService};

// =============================================================================
// Test Helpers
// =============================================================================

fn test_app() -> Router {
    let config = Config::default();
    let issuer = CertificateIssuer::new("sideshow.test", config.cert_max_duration);
    let service = TrustService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MockVerifier::new()),
        issuer,
        Arc::new(KeyProvider::with_key_pair(KeyPair::generate())),
    );
    create_router(Arc::new(AppState { service, config }))
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn certify(app: &Router, cookie: Option<&str>, email: &str) -> Response {
    let body = json!({
        "email": email,
        "pubkey": {"algorithm": "Ed25519", "publicKey": "YXR0YWNrZXIta2V5"},
        "duration": 3_600_000,
    });
    certify_raw(app, cookie, Some("application/json"), body.to_string()).await
}

async fn certify_raw(
    app: &Router,
    cookie: Option<&str>,
    content_type: Option<&str>,
    body: String,
) -> Response {
    let mut builder = Request::builder().method("POST").uri("/provision/certify");
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

/// Claim `claimed` in a new session, then have the provider vouch for `proven`
async fn session_proving(app: &Router, claimed: &str, proven: &str) -> (String, StatusCode) {
    let forward = get(
        app,
        &format!("/authenticate/forward?email={}", claimed.replace('@', "%40")),
        None,
    )
    .await;
    let cookie = session_cookie(&forward);
    let verify = get(
        app,
        &format!("/authenticate/verify?mock.email={}", proven.replace('@', "%40")),
        Some(&cookie),
    )
    .await;
    (cookie, verify.status())
}

// =============================================================================
// ATTACK: Replay
// =============================================================================

/// A single verification is replayed to mint a second certificate.
///
/// The proof is spent by the first certify call.
#[tokio::test]
async fn attack_proof_replay_prevented() {
    let app = test_app();
    let (cookie, status) = session_proving(&app, "alice@example.com", "alice@example.com").await;
    assert_eq!(status, StatusCode::OK);

    let first = certify(&app, Some(&cookie), "alice@example.com").await;
    assert_eq!(first.status(), StatusCode::OK);

    let replay = certify(&app, Some(&cookie), "alice@example.com").await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

/// Many certify requests race on one proof; exactly one may win.
#[tokio::test]
async fn attack_concurrent_certify_single_winner() {
    let app = test_app();
    let (cookie, _) = session_proving(&app, "alice@example.com", "alice@example.com").await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let app = app.clone();
        let cookie = cookie.clone();
        handles.push(tokio::spawn(async move {
            certify(&app, Some(&cookie), "alice@example.com").await.status()
        }));
    }

    let mut issued = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => issued += 1,
            other => assert_eq!(other, StatusCode::UNAUTHORIZED),
        }
    }
    assert_eq!(issued, 1);
}

// =============================================================================
// ATTACK: Account Substitution
// =============================================================================

/// The attacker claims the victim's address but signs in to the provider
/// with their own account.
#[tokio::test]
async fn attack_claim_victim_prove_self_prevented() {
    let app = test_app();
    let (cookie, status) =
        session_proving(&app, "victim@example.com", "mallory@example.com").await;
    assert_eq!(status, StatusCode::CONFLICT);

    for email in ["victim@example.com", "mallory@example.com"] {
        let response = certify(&app, Some(&cookie), email).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", email);
    }
}

/// After proving their own address the attacker re-claims the victim's and
/// asks for a certificate in the victim's name.
#[tokio::test]
async fn attack_reclaim_after_proof_prevented() {
    let app = test_app();
    let (cookie, _) = session_proving(&app, "mallory@example.com", "mallory@example.com").await;

    // Claim the victim without completing verification
    let forward = get(
        &app,
        "/authenticate/forward?email=victim%40example.com",
        Some(&cookie),
    )
    .await;
    assert_eq!(forward.status(), StatusCode::FOUND);

    let provision = get(&app, "/provision", Some(&cookie)).await;
    assert_eq!(body_json(provision).await, json!({"certify": ""}));

    let response = certify(&app, Some(&cookie), "victim@example.com").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// A proof for one address is presented with a different address.
/// The failed attempt burns the proof.
#[tokio::test]
async fn attack_wrong_email_burns_proof() {
    let app = test_app();
    let (cookie, _) = session_proving(&app, "mallory@example.com", "mallory@example.com").await;

    let wrong = certify(&app, Some(&cookie), "victim@example.com").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let right = certify(&app, Some(&cookie), "mallory@example.com").await;
    assert_eq!(right.status(), StatusCode::UNAUTHORIZED);
}

/// A lookalike address that only differs in case and padding is the same
/// mailbox; the certificate carries the address as requested.
#[tokio::test]
async fn case_variant_of_proven_email_is_certified_verbatim() {
    let app = test_app();
    let (cookie, _) = session_proving(&app, "alice@example.com", "alice@example.com").await;

    let response = certify(&app, Some(&cookie), "ALICE@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "ALICE@example.com");
}

// =============================================================================
// ATTACK: Session Confusion
// =============================================================================

/// The victim's proof lives in the victim's session; another session cannot
/// spend it.
#[tokio::test]
async fn attack_cross_session_prevented() {
    let app = test_app();
    let (victim_cookie, _) =
        session_proving(&app, "victim@example.com", "victim@example.com").await;

    let (attacker_cookie, _) =
        session_proving(&app, "mallory@example.com", "mallory@example.com").await;
    assert_ne!(victim_cookie, attacker_cookie);

    let response = certify(&app, Some(&attacker_cookie), "victim@example.com").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = certify(&app, None, "victim@example.com").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The victim's own proof is untouched
    let response = certify(&app, Some(&victim_cookie), "victim@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// A hand-crafted session cookie is not accepted as an existing session.
#[tokio::test]
async fn attack_forged_session_cookie_prevented() {
    let app = test_app();
    let response = certify(&app, Some("sideshow_session=admin"), "victim@example.com").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// A verification callback cannot be completed in a session that never
/// claimed anything.
#[tokio::test]
async fn attack_unsolicited_assertion_prevented() {
    let app = test_app();
    let cookie = session_cookie(&get(&app, "/provision", None).await);

    let response = get(
        &app,
        "/authenticate/verify?mock.email=mallory%40example.com",
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = certify(&app, Some(&cookie), "mallory@example.com").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// ATTACK: Malformed Certify
// =============================================================================

/// A certify body with a non-string email is refused and spends the proof,
/// so it cannot be used to test the waters before a real request.
#[tokio::test]
async fn attack_mistyped_email_burns_proof() {
    let app = test_app();
    let (cookie, _) = session_proving(&app, "alice@example.com", "alice@example.com").await;

    let body = json!({
        "email": 5,
        "pubkey": {"algorithm": "Ed25519", "publicKey": "YXR0YWNrZXIta2V5"},
        "duration": 3_600_000,
    });
    let mistyped = certify_raw(&app, Some(&cookie), Some("application/json"), body.to_string()).await;
    assert_eq!(mistyped.status(), StatusCode::UNAUTHORIZED);

    let retry = certify(&app, Some(&cookie), "alice@example.com").await;
    assert_eq!(retry.status(), StatusCode::UNAUTHORIZED);
}

/// A body that is not JSON at all is rejected and still spends the proof.
#[tokio::test]
async fn attack_non_json_certify_burns_proof() {
    let app = test_app();
    let (cookie, _) = session_proving(&app, "alice@example.com", "alice@example.com").await;

    let form = certify_raw(
        &app,
        Some(&cookie),
        Some("application/x-www-form-urlencoded"),
        "email=alice%40example.com".to_string(),
    )
    .await;
    assert_eq!(form.status(), StatusCode::BAD_REQUEST);

    let provision = get(&app, "/provision", Some(&cookie)).await;
    assert_eq!(body_json(provision).await["certify"], "");

    let retry = certify(&app, Some(&cookie), "alice@example.com").await;
    assert_eq!(retry.status(), StatusCode::UNAUTHORIZED);
}

/// Without a content type the body is still parsed, so a well-formed
/// request is not turned away on a header technicality.
#[tokio::test]
async fn test_certify_without_content_type() {
    let app = test_app();
    let (cookie, _) = session_proving(&app, "alice@example.com", "alice@example.com").await;

    let body = json!({
        "email": "alice@example.com",
        "pubkey": {"algorithm": "Ed25519", "publicKey": "YXR0YWNrZXIta2V5"},
        "duration": 3_600_000,
    });
    let response = certify_raw(&app, Some(&cookie), None, body.to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);
}
