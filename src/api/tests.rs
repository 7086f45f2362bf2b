use super::*;
use crate::gateway::{CompletionSettings, Dispatcher};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use relay_core::{
    config::Messages,
    context::Context,
    error::RelayError,
    identity::IdentityNormalizer,
    message::{Completion, CompletionMetadata, OutboundReply},
    traits::{Channel, Provider},
};
use relay_memory::ConversationStore;
use sha2::Sha256;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tower::ServiceExt;

// -----------------------------------------------------------------------
// Mocks
// -----------------------------------------------------------------------

struct StaticProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn complete(&self, _context: &Context) -> Result<Completion, RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            text: Some("Hi!".into()),
            metadata: CompletionMetadata::default(),
        })
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Records sends; fails them when `fail_send` is set.
struct MockChannel {
    sent: Arc<Mutex<Vec<OutboundReply>>>,
    fail_send: bool,
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, reply: &OutboundReply) -> Result<(), RelayError> {
        if self.fail_send {
            return Err(RelayError::Channel("connection reset".to_string()));
        }
        self.sent.lock().unwrap().push(reply.clone());
        Ok(())
    }
}

// -----------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------

struct TestApp {
    router: Router,
    gateway: Arc<Gateway>,
    sent: Arc<Mutex<Vec<OutboundReply>>>,
    calls: Arc<AtomicUsize>,
}

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.whatsapp.verify_token = "secret".into();
    cfg.whatsapp.access_token = "EAAG-token".into();
    cfg.whatsapp.phone_number_id = "123".into();
    cfg.provider.api_key = "gsk".into();
    cfg
}

fn app_with(cfg: Config, fail_send: bool) -> TestApp {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let channel = MockChannel {
        sent: Arc::clone(&sent),
        fail_send,
    };
    let gateway = Arc::new(Gateway::new(
        Arc::new(StaticProvider {
            calls: Arc::clone(&calls),
        }),
        Dispatcher::new(
            Arc::new(channel),
            IdentityNormalizer::plain(),
            cfg.whatsapp.simulate(),
        ),
        ConversationStore::new(cfg.memory.max_turns),
        Messages::default(),
        CompletionSettings {
            model: cfg.provider.model.clone(),
            temperature: cfg.provider.temperature,
            max_tokens: cfg.provider.max_tokens,
        },
    ));
    TestApp {
        router: build_router(ApiState::new(&cfg, Arc::clone(&gateway))),
        gateway,
        sent,
        calls,
    }
}

fn app() -> TestApp {
    app_with(test_config(), false)
}

fn post_webhook(body: &str) -> Request<Body> {
    Request::post("/webhook")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(resp).await).unwrap()
}

fn text_payload(from: &str, body: &str) -> String {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{ "changes": [{ "value": {
            "contacts": [{ "wa_id": from }],
            "messages": [{ "from": from, "type": "text", "text": { "body": body } }]
        } }] }]
    })
    .to_string()
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

// -----------------------------------------------------------------------
// Health
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_health() {
    let t = app();
    let resp = t
        .router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["conversations"], 0);
    assert_eq!(json["simulate"], false);
}

// -----------------------------------------------------------------------
// Handshake
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_handshake_success_echoes_challenge() {
    let t = app();
    let resp = t
        .router
        .oneshot(
            Request::get("/webhook?hub.mode=subscribe&hub.verify_token=secret&hub.challenge=xyz123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "xyz123");
}

#[tokio::test]
async fn test_handshake_bare_param_names() {
    let t = app();
    let resp = t
        .router
        .oneshot(
            Request::get("/webhook?mode=subscribe&verify_token=secret&challenge=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "abc");
}

#[tokio::test]
async fn test_handshake_wrong_token_is_forbidden() {
    let t = app();
    let resp = t
        .router
        .oneshot(
            Request::get("/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=xyz123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(!body_string(resp).await.contains("xyz123"));
}

#[tokio::test]
async fn test_handshake_without_params_is_forbidden() {
    let t = app();
    let resp = t
        .router
        .oneshot(Request::get("/webhook").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_handshake_conflicting_params_are_forbidden() {
    for uri in [
        "/webhook?hub.mode=subscribe&mode=subscribe&hub.verify_token=wrong&hub.challenge=x",
        "/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.verify_token=wrong&hub.challenge=x",
        "/webhook?hub.mode=subscribe&hub.verify_token=secret&verify_token=secret&hub.challenge=x",
    ] {
        let t = app();
        let resp = t
            .router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body_string(resp).await, "Forbidden");
    }
}

// -----------------------------------------------------------------------
// Delivery
// -----------------------------------------------------------------------

#[tokio::test]
async fn test_empty_messages_acknowledged_without_dispatch() {
    let t = app();
    let body = json!({ "entry": [{ "changes": [{ "value": { "messages": [] } }] }] }).to_string();
    let resp = t.router.oneshot(post_webhook(&body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"ok": true}));
    assert!(t.sent.lock().unwrap().is_empty());
    assert_eq!(t.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_text_message_round_trip() {
    let t = app();
    let resp = t
        .router
        .oneshot(post_webhook(&text_payload("5511999998888", "Hello")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"ok": true}));

    let sent = t.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].destination_key, "5511999998888");
    assert_eq!(sent[0].text, "Hi!");
    assert_eq!(t.gateway.store().get("5511999998888").await.len(), 2);
}

#[tokio::test]
async fn test_invalid_json_is_acknowledged() {
    let t = app();
    let resp = t.router.oneshot(post_webhook("not json {")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(t.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delivery_failure_still_acknowledged() {
    let t = app_with(test_config(), true);
    let resp = t
        .router
        .oneshot(post_webhook(&text_payload("5511", "Hello")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"ok": true}));
    // The exchange is still recorded even though the reply was lost.
    assert_eq!(t.gateway.store().get("5511").await.len(), 2);
}

#[tokio::test]
async fn test_signature_required_when_secret_configured() {
    let mut cfg = test_config();
    cfg.whatsapp.app_secret = Some("app-secret".into());
    let body = text_payload("5511", "Hello");

    let t = app_with(cfg.clone(), false);
    let resp = t.router.oneshot(post_webhook(&body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(t.calls.load(Ordering::SeqCst), 0);

    let t = app_with(cfg.clone(), false);
    let req = Request::post("/webhook")
        .header("Content-Type", "application/json")
        .header("X-Hub-Signature-256", sign("wrong", body.as_bytes()))
        .body(Body::from(body.clone()))
        .unwrap();
    let resp = t.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let t = app_with(cfg, false);
    let req = Request::post("/webhook")
        .header("Content-Type", "application/json")
        .header("X-Hub-Signature-256", sign("app-secret", body.as_bytes()))
        .body(Body::from(body))
        .unwrap();
    let resp = t.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(t.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_simulate_mode_acknowledges_without_sending() {
    let mut cfg = test_config();
    cfg.whatsapp.access_token = "FAKE".into();
    let t = app_with(cfg, false);
    let resp = t
        .router
        .oneshot(post_webhook(&text_payload("5511", "Hello")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(t.sent.lock().unwrap().is_empty());
    assert_eq!(t.calls.load(Ordering::SeqCst), 1);
}

// -----------------------------------------------------------------------
// Diagnostic send
// -----------------------------------------------------------------------

fn send_test_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/send-test");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_send_test_without_recipient_is_bad_request() {
    let t = app();
    let resp = t.router.oneshot(send_test_request(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_test_sends_diagnostic_text() {
    let mut cfg = test_config();
    cfg.whatsapp.test_recipient = Some("+55 11 99999-8888".into());
    let t = app_with(cfg, false);
    let resp = t.router.oneshot(send_test_request(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "sent");

    let sent = t.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].destination_key, "5511999998888");
    assert_eq!(sent[0].text, Messages::default().diagnostic);
}

#[tokio::test]
async fn test_send_test_reports_delivery_failure() {
    let mut cfg = test_config();
    cfg.whatsapp.test_recipient = Some("5511".into());
    let t = app_with(cfg, true);
    let resp = t.router.oneshot(send_test_request(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "failed");
    assert!(json["error"].as_str().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_send_test_requires_bearer_when_api_key_set() {
    let mut cfg = test_config();
    cfg.api.api_key = "ops-key".into();
    cfg.whatsapp.test_recipient = Some("5511".into());

    let t = app_with(cfg.clone(), false);
    let resp = t.router.oneshot(send_test_request(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let t = app_with(cfg.clone(), false);
    let resp = t.router.oneshot(send_test_request(Some("nope"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let t = app_with(cfg, false);
    let resp = t.router.oneshot(send_test_request(Some("ops-key"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(t.sent.lock().unwrap().len(), 1);
}
