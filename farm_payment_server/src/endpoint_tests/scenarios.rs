//! End-to-end webhook deliveries against a throw-away SQLite database.
use actix_web::http::StatusCode;
use farm_payment_engine::{
    db_types::{NewOrder, NewOrderItem, Order, PaymentStatus, SelectedOptions},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{EventStore, OrderLedger, StockLedger},
    SqliteDatabase,
};
use fpg_common::Yen;
use serde_json::json;

use super::helpers::{payment_failed_body, payment_succeeded_body, post_webhook, sign, webhook_app};

async fn store_with_order_o1() -> (SqliteDatabase, String) {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let order = NewOrder::new("pi_1".into(), "Hanako Sato", "hanako@example.jp")
        .with_shipping("390-0811", "Nagano", "1-2-3 Chuo, Matsumoto", Yen::from(600))
        .with_item(NewOrderItem::new("apple-juice", "Apple juice", 2, Yen::from(1200)));
    db.insert_order(order).await.expect("Could not insert order O1");
    db.set_stock("apple-juice", &SelectedOptions::new(), 10).await.expect("Could not set stock");
    (db, url)
}

async fn order_o1(db: &SqliteDatabase) -> Order {
    db.fetch_order_by_payment_intent(&"pi_1".into()).await.unwrap().expect("Order O1 is missing")
}

async fn apple_juice_stock(db: &SqliteDatabase) -> i64 {
    db.fetch_stock("apple-juice", &SelectedOptions::new()).await.unwrap().map(|s| s.quantity).unwrap_or_default()
}

fn remove_db(url: &str) {
    let path = url.trim_start_matches("sqlite://");
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
}

#[actix_web::test]
async fn payment_is_reconciled_once() {
    let (db, url) = store_with_order_o1().await;
    let body = payment_succeeded_body("evt_1", "pi_1", 3000);
    let signature = sign(&body);

    let (status, res) = post_webhook(&body, Some(&signature), webhook_app(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, json!({ "received": true, "outcome": "paid" }));
    let order = order_o1(&db).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.payment_method.as_deref(), Some("card"));
    let order_number = order.order_number.clone().expect("Paid orders have an order number");
    assert!(order_number.starts_with("FM"));
    assert_eq!(apple_juice_stock(&db).await, 8);

    // Redelivery of the same event
    let (status, res) = post_webhook(&body, Some(&signature), webhook_app(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, json!({ "received": true, "outcome": "duplicate", "duplicate": true }));
    let order = order_o1(&db).await;
    assert_eq!(order.order_number.as_deref(), Some(order_number.as_str()));
    assert_eq!(apple_juice_stock(&db).await, 8);
    remove_db(&url);
}

#[actix_web::test]
async fn unknown_payment_intent_is_acknowledged_with_a_warning() {
    let (db, url) = store_with_order_o1().await;
    let body = payment_succeeded_body("evt_2", "pi_missing", 3000);
    let (status, res) = post_webhook(&body, Some(&sign(&body)), webhook_app(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, json!({ "received": true, "outcome": "order_not_found", "warning": "order_not_found" }));
    assert_eq!(order_o1(&db).await.payment_status, PaymentStatus::Pending);
    remove_db(&url);
}

#[actix_web::test]
async fn tampered_delivery_changes_nothing() {
    let (db, url) = store_with_order_o1().await;
    let body = payment_succeeded_body("evt_1", "pi_1", 3000);
    let signature = sign(&body);
    let tampered = body.replace("pi_1", "pi_2");
    let (status, res) = post_webhook(&tampered, Some(&signature), webhook_app(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["received"], json!(false));
    assert_eq!(order_o1(&db).await.payment_status, PaymentStatus::Pending);
    assert!(db.fetch_processed_event("evt_1").await.unwrap().is_none());
    assert_eq!(apple_juice_stock(&db).await, 10);
    remove_db(&url);
}

#[actix_web::test]
async fn amount_mismatch_is_paid_and_annotated() {
    let (db, url) = store_with_order_o1().await;
    let body = payment_succeeded_body("evt_3", "pi_1", 2500);
    let (status, res) = post_webhook(&body, Some(&sign(&body)), webhook_app(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["outcome"], json!("paid"));
    let order = order_o1(&db).await;
    assert!(order.is_paid());
    assert!(order.note_entries().any(|n| n == "amount_mismatch expected=3000 received=2500 event=evt_3"));
    remove_db(&url);
}

#[actix_web::test]
async fn failure_then_success_then_late_failure() {
    let (db, url) = store_with_order_o1().await;
    let failed = payment_failed_body("evt_f1", "pi_1", "Your card was declined.");
    let (status, res) = post_webhook(&failed, Some(&sign(&failed)), webhook_app(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["outcome"], json!("failed"));
    let order = order_o1(&db).await;
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert!(order.note_entries().any(|n| n == "payment_failed event=evt_f1 reason=card_declined: Your card was declined."));

    let paid = payment_succeeded_body("evt_s1", "pi_1", 3000);
    let (status, res) = post_webhook(&paid, Some(&sign(&paid)), webhook_app(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["outcome"], json!("paid"));
    let order = order_o1(&db).await;
    assert!(order.is_paid());
    assert!(order.note_entries().any(|n| n == "paid_after_failure event=evt_s1"));

    let late = payment_failed_body("evt_f2", "pi_1", "Your card was declined.");
    let (status, res) = post_webhook(&late, Some(&sign(&late)), webhook_app(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["outcome"], json!("terminal_state"));
    assert!(order_o1(&db).await.is_paid());
    assert_eq!(apple_juice_stock(&db).await, 8);
    remove_db(&url);
}
