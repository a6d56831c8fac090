use std::time::Duration;

use farm_payment_engine::{
    db_types::Order,
    events::EventProducers,
    ReconciliationApi,
    ReconciliationSettings,
    SqliteDatabase,
};
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// The most unmatched payments looked at in one pass.
pub const SWEEP_BATCH_SIZE: i64 = 50;

/// Starts the unmatched payment sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_sweep_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    settings: ReconciliationSettings,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let api = ReconciliationApi::new(db, producers, settings);
        info!("🧹️ Unmatched payment sweeper started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🧹️ Running unmatched payment sweep");
            match api.sweep_unmatched_payments(SWEEP_BATCH_SIZE).await {
                Ok(result) if result.examined == 0 => trace!("🧹️ No unmatched payments"),
                Ok(result) => {
                    info!("🧹️ {} of {} unmatched payments resolved", result.resolved(), result.examined);
                    debug!("🧹️ Settled orders: {}", order_list(&result.settled));
                },
                Err(e) => {
                    error!("🧹️ Error running unmatched payment sweep: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] {} {}", o.id, o.order_number.as_deref().unwrap_or("-"), o.payment_intent_id))
        .collect::<Vec<String>>()
        .join(", ")
}
