use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::Utc;
use farm_payment_engine::{LookupRetry, ReconciliationApi, ReconciliationDatabase, ReconciliationSettings};
use fpg_common::Secret;
use log::debug;
use serde_json::{json, Value};

use crate::{
    routes::{health, PaymentWebhookRoute},
    signature::WebhookVerifier,
};

pub const TEST_SIGNING_SECRET: &str = "whsec_endpoint_test_secret";

pub fn verifier() -> WebhookVerifier {
    WebhookVerifier::new(Secret::new(TEST_SIGNING_SECRET.to_string()))
}

pub fn sign(body: &str) -> String {
    verifier().sign(Utc::now().timestamp(), body.as_bytes()).expect("Failed to sign body")
}

/// Short lookup retries, so that order-not-found cases don't slow the suite down.
pub fn test_settings() -> ReconciliationSettings {
    ReconciliationSettings::default().with_lookup_retry(LookupRetry::new(2, std::time::Duration::from_millis(20)))
}

/// Registers the webhook and health routes against `db`, the way the server does.
pub fn webhook_app<B>(db: B) -> impl FnOnce(&mut ServiceConfig)
where B: ReconciliationDatabase + 'static {
    move |cfg: &mut ServiceConfig| {
        let api = ReconciliationApi::new(db, Default::default(), test_settings());
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(verifier()))
            .service(health)
            .service(web::scope("/webhook").service(PaymentWebhookRoute::<B>::new()));
    }
}

pub fn payment_succeeded_body(event_id: &str, payment_intent: &str, amount: i64) -> String {
    json!({
        "id": event_id,
        "object": "event",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": payment_intent,
            "object": "payment_intent",
            "amount": amount,
            "amount_received": amount,
            "currency": "jpy",
            "payment_method_types": ["card"]
        } }
    })
    .to_string()
}

pub fn payment_failed_body(event_id: &str, payment_intent: &str, message: &str) -> String {
    json!({
        "id": event_id,
        "object": "event",
        "type": "payment_intent.payment_failed",
        "data": { "object": {
            "id": payment_intent,
            "object": "payment_intent",
            "amount": 3000,
            "last_payment_error": { "code": "card_declined", "message": message }
        } }
    })
    .to_string()
}

/// POSTs `body` to the webhook. `signature` is sent in the signature header when present.
pub async fn post_webhook(
    body: &str,
    signature: Option<&str>,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, Value) {
    let mut req = TestRequest::post().uri("/webhook/payment").set_payload(body.to_string());
    if let Some(sig) = signature {
        req = req.insert_header(("Stripe-Signature", sig));
    }
    send(req, configure).await
}

pub async fn send(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, Value) {
    let app = test::init_service(App::new().configure(configure)).await;
    debug!("Making request");
    let res = test::call_service(&app, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    let value = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()));
    (status, value)
}
