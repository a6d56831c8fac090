use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use farm_payment_engine::traits::LedgerError;
use serde_json::json;

use super::{
    helpers::{payment_succeeded_body, post_webhook, send, sign, verifier, webhook_app},
    mocks::MockLedger,
};

#[actix_web::test]
async fn health_endpoint() {
    let (status, body) = send(TestRequest::get().uri("/health"), webhook_app(MockLedger::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("👍️\n"));
}

#[actix_web::test]
async fn missing_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    // No expectations: any ledger call panics
    let body = payment_succeeded_body("evt_1", "pi_1", 3000);
    let (status, res) = post_webhook(&body, None, webhook_app(MockLedger::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["received"], json!(false));
    assert_eq!(res["error"], json!("The webhook signature header is missing."));
}

#[actix_web::test]
async fn tampered_payload_touches_no_ledger() {
    let _ = env_logger::try_init().ok();
    let body = payment_succeeded_body("evt_1", "pi_1", 3000);
    let signature = sign(&body);
    let tampered = body.replace("3000", "300");
    let (status, res) = post_webhook(&tampered, Some(&signature), webhook_app(MockLedger::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["received"], json!(false));
    assert!(res["error"].as_str().unwrap().contains("No signature in the header matches the payload"));
}

#[actix_web::test]
async fn stale_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = payment_succeeded_body("evt_1", "pi_1", 3000);
    let signature = verifier().sign(Utc::now().timestamp() - 3600, body.as_bytes()).unwrap();
    let (status, res) = post_webhook(&body, Some(&signature), webhook_app(MockLedger::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(res["error"].as_str().unwrap().contains("seconds away from the current time"));
}

#[actix_web::test]
async fn signed_but_unreadable_payload() {
    let body = r#"{"hello": "world"}"#;
    let (status, res) = post_webhook(body, Some(&sign(body)), webhook_app(MockLedger::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(res["error"].as_str().unwrap().contains("not a valid payment event"));
}

#[actix_web::test]
async fn missing_event_id_is_a_bad_request() {
    let body = payment_succeeded_body("", "pi_1", 3000);
    let (status, res) = post_webhook(&body, Some(&sign(&body)), webhook_app(MockLedger::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["received"], json!(false));
}

#[actix_web::test]
async fn other_methods_are_not_allowed() {
    for req in [TestRequest::get(), TestRequest::put(), TestRequest::delete()] {
        let (status, res) = send(req.uri("/webhook/payment"), webhook_app(MockLedger::new())).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res["received"], json!(false));
    }
}

#[actix_web::test]
async fn unhandled_event_types_are_acknowledged() {
    let body = json!({
        "id": "evt_7",
        "type": "charge.refunded",
        "data": { "object": { "id": "ch_1" } }
    })
    .to_string();
    let (status, res) = post_webhook(&body, Some(&sign(&body)), webhook_app(MockLedger::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, json!({ "received": true, "outcome": "ignored" }));
}

#[actix_web::test]
async fn lookup_failure_forgets_the_event() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_record_if_new().withf(|event_id, _| event_id.to_string() == "evt_9").times(1).returning(|_, _| Ok(true));
    ledger
        .expect_fetch_order_by_payment_intent()
        .withf(|pi| pi.as_str() == "pi_9")
        .times(1)
        .returning(|_| Err(LedgerError::DatabaseError("database is locked".into())));
    ledger.expect_forget_event().withf(|event_id| event_id.to_string() == "evt_9").times(1).returning(|_| Ok(()));
    let body = payment_succeeded_body("evt_9", "pi_9", 3000);
    let (status, res) = post_webhook(&body, Some(&sign(&body)), webhook_app(ledger)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res["received"], json!(false));
    assert!(res["error"].as_str().unwrap().contains("database is locked"));
}

#[actix_web::test]
async fn event_store_outage_is_retryable() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_record_if_new().times(1).returning(|_, _| Err(LedgerError::DatabaseError("disk I/O error".into())));
    let body = payment_succeeded_body("evt_10", "pi_10", 3000);
    let (status, res) = post_webhook(&body, Some(&sign(&body)), webhook_app(ledger)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res["error"].as_str().unwrap().contains("recording the event"));
}

#[actix_web::test]
async fn seen_event_is_not_forgotten_on_failure() {
    let mut ledger = MockLedger::new();
    ledger.expect_record_if_new().times(1).returning(|_, _| Ok(false));
    ledger
        .expect_fetch_order_by_payment_intent()
        .times(1)
        .returning(|_| Err(LedgerError::DatabaseError("database is locked".into())));
    ledger.expect_forget_event().never();
    let body = payment_succeeded_body("evt_11", "pi_11", 3000);
    let (status, _) = post_webhook(&body, Some(&sign(&body)), webhook_app(ledger)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
