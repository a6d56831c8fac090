use cucumber::given;
use farm_payment_engine::{
    db_types::{NewOrder, NewOrderItem, SelectedOptions},
    traits::{OrderLedger, StockLedger},
};
use fpg_common::Yen;

use crate::cucumber::{FarmWorld, ReconciliationSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut FarmWorld) {
    let system = ReconciliationSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "{int} units of {word} in stock")]
async fn stock_level(world: &mut FarmWorld, quantity: i64, product: String) {
    world.db().set_stock(&product, &SelectedOptions::default(), quantity).await.expect("Error setting stock");
}

#[given(expr = "order {word} for payment intent {word} with {int} x {word} at {int} yen")]
async fn order_exists(world: &mut FarmWorld, label: String, pi: String, quantity: i64, product: String, price: i64) {
    let order = NewOrder::new(pi.into(), label.as_str(), "customer@example.jp")
        .with_item(NewOrderItem::new(product.as_str(), product.as_str(), quantity, Yen::from(price)));
    world.db().insert_order(order).await.expect("Error inserting order");
}
