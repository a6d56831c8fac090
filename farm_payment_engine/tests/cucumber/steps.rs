use std::time::Duration;

use cucumber::{then, when};
use farm_payment_engine::{
    db_types::{NewOrder, NewOrderItem, Order, PaymentStatus, SelectedOptions},
    traits::{EventStore, OrderLedger, StockLedger, UnmatchedPayments},
    PaymentEvent,
    PaymentFailed,
    PaymentSucceeded,
};
use fpg_common::Yen;

use crate::cucumber::FarmWorld;

#[when(expr = "the processor reports payment intent {word} succeeded for {int} yen in event {word}")]
async fn payment_succeeded(world: &mut FarmWorld, pi: String, amount: i64, event_id: String) {
    let event = PaymentEvent::Succeeded(PaymentSucceeded {
        event_id,
        payment_intent_id: pi.into(),
        amount_received: Yen::from(amount),
        payment_method: Some("card".into()),
    });
    world.last_outcome = Some(world.api().process_event(event).await);
}

#[when(expr = "the processor reports payment intent {word} failed in event {word}")]
async fn payment_failed(world: &mut FarmWorld, pi: String, event_id: String) {
    let event = PaymentEvent::Failed(PaymentFailed {
        event_id,
        payment_intent_id: pi.into(),
        failure_message: Some("card_declined".into()),
    });
    world.last_outcome = Some(world.api().process_event(event).await);
}

#[when(expr = "the checkout creates order {word} for payment intent {word} after {int}ms")]
async fn late_order(world: &mut FarmWorld, label: String, pi: String, delay: u64) {
    let db = world.db().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let order = NewOrder::new(pi.into(), label.as_str(), "customer@example.jp")
            .with_item(NewOrderItem::new("rice", "rice", 1, Yen::from(3000)));
        db.insert_order(order).await.expect("Error inserting late order");
    });
}

#[when(expr = "the checkout creates order {word} for payment intent {word}")]
async fn create_order(world: &mut FarmWorld, label: String, pi: String) {
    let order = NewOrder::new(pi.into(), label.as_str(), "customer@example.jp")
        .with_item(NewOrderItem::new("rice", "rice", 1, Yen::from(3000)));
    world.db().insert_order(order).await.expect("Error inserting order");
}

#[when("the unmatched payments are swept")]
async fn sweep(world: &mut FarmWorld) {
    world.api().sweep_unmatched_payments(100).await.expect("Sweep failed");
}

#[then(expr = "the outcome is {word}")]
async fn check_outcome(world: &mut FarmWorld, name: String) {
    let outcome = world.last_outcome.as_ref().expect("No event has been processed");
    let outcome = outcome.as_ref().expect("Processing failed");
    assert_eq!(outcome.name(), name, "Unexpected outcome {outcome:?}");
}

#[then(expr = "the response carries the warning {word}")]
async fn check_warning(world: &mut FarmWorld, warning: String) {
    let outcome = world.last_outcome.as_ref().and_then(|r| r.as_ref().ok()).expect("No successful outcome");
    assert_eq!(outcome.warning(), Some(warning.as_str()));
}

async fn order_for(world: &FarmWorld, pi: &str) -> Order {
    world.db().fetch_order_by_payment_intent(&pi.into()).await.expect("Error fetching order").expect("Order not found")
}

#[then(expr = "the order for payment intent {word} is {word}")]
async fn check_payment_status(world: &mut FarmWorld, pi: String, status: String) {
    let expected = status.parse::<PaymentStatus>().expect("Not a payment status");
    let order = order_for(world, &pi).await;
    assert_eq!(order.payment_status, expected);
}

#[then(expr = "the order for payment intent {word} has an order number")]
async fn check_order_number(world: &mut FarmWorld, pi: String) {
    let order = order_for(world, &pi).await;
    let number = order.order_number.expect("No order number");
    assert!(number.starts_with("FM"), "Unexpected order number {number}");
}

#[then(expr = "the order notes for payment intent {word} include {string}")]
async fn check_notes(world: &mut FarmWorld, pi: String, note: String) {
    let order = order_for(world, &pi).await;
    assert!(order.note_entries().any(|n| n == note), "Notes were: {}", order.notes);
}

#[then(expr = "there are {int} units of {word} in stock")]
async fn check_stock(world: &mut FarmWorld, quantity: i64, product: String) {
    let record = world
        .db()
        .fetch_stock(&product, &SelectedOptions::default())
        .await
        .expect("Error fetching stock")
        .expect("No stock record");
    assert_eq!(record.quantity, quantity);
}

#[then(expr = "event {word} has been recorded")]
async fn check_event_recorded(world: &mut FarmWorld, event_id: String) {
    let event = world.db().fetch_processed_event(&event_id).await.expect("Error fetching event");
    assert!(event.is_some(), "Event {event_id} was not recorded");
}

#[then(expr = "{int} unmatched payments are waiting")]
async fn check_unmatched(world: &mut FarmWorld, count: usize) {
    let open = world.db().fetch_unresolved_payments(100).await.expect("Error fetching unmatched payments");
    assert_eq!(open.len(), count);
}
