use std::fmt::Debug;

use futures_util::future::join_all;
use log::*;

use crate::{
    db_types::{NewUnmatchedPayment, Order, OrderItem, PaymentIntentId, PaymentStatus},
    events::{EventProducers, OrderPaidEvent, PaymentUnmatchedEvent},
    fpe_api::{
        errors::ReconciliationError,
        reconciliation_objects::{
            PaymentEvent,
            PaymentFailed,
            PaymentSucceeded,
            ReconciliationOutcome,
            ReconciliationSettings,
            SweepResult,
            PAYMENT_FAILED,
            PAYMENT_SUCCEEDED,
        },
    },
    helpers::{generate_order_number, jst_today},
    traits::{FailedTransition, LedgerError, PaidTransition, ReconciliationDatabase},
};

/// `ReconciliationApi` turns verified processor events into order payment transitions.
///
/// All coordination between concurrent deliveries goes through the backend: the event store admits each event id
/// once, and the guarded status update lets exactly one request move an order to `paid`. Only that request applies
/// the side effects (stock, coupon usage and the order-paid hook).
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
    settings: ReconciliationSettings,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.settings)
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers, settings: ReconciliationSettings) -> Self {
        Self { db, producers, settings }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn settings(&self) -> &ReconciliationSettings {
        &self.settings
    }
}

impl<B> ReconciliationApi<B>
where B: ReconciliationDatabase
{
    /// Processes a single verified payment event.
    ///
    /// Every `Ok` result should be acknowledged to the processor. An `Err` means the processor should redeliver: if
    /// the event had been recorded by this call, the record is removed again first.
    pub async fn process_event(&self, event: PaymentEvent) -> Result<ReconciliationOutcome, ReconciliationError> {
        if event.event_id().trim().is_empty() {
            return Err(ReconciliationError::InvalidEvent("The event id is missing".into()));
        }
        match event {
            PaymentEvent::Succeeded(ev) => self.process_payment_succeeded(ev).await,
            PaymentEvent::Failed(ev) => self.process_payment_failed(ev).await,
            PaymentEvent::Unhandled { event_id, event_type } => {
                debug!("🧾️ Ignoring event {event_id} of type {event_type}");
                Ok(ReconciliationOutcome::Ignored { reason: format!("unhandled event type {event_type}") })
            },
        }
    }

    pub async fn process_payment_succeeded(
        &self,
        ev: PaymentSucceeded,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        if ev.payment_intent_id.as_str().is_empty() {
            return Err(ReconciliationError::InvalidEvent(format!("Event {} has no payment intent", ev.event_id)));
        }
        let is_new = self
            .db
            .record_if_new(&ev.event_id, PAYMENT_SUCCEEDED)
            .await
            .map_err(|e| ReconciliationError::infrastructure("recording the event", e))?;
        if !is_new {
            debug!("🧾️ Event {} has been seen before. Checking whether there is anything left to do", ev.event_id);
        }
        let order = match self.find_order_with_retry(&ev.payment_intent_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                self.record_unmatched(&ev).await;
                return Ok(ReconciliationOutcome::OrderNotFound { payment_intent_id: ev.payment_intent_id });
            },
            Err(e) => return Err(self.rollback_event(&ev.event_id, is_new, "looking up the order", e).await),
        };
        if order.is_paid() {
            debug!("🧾️ Order #{} is already paid. Event {} changes nothing", order.id, ev.event_id);
            return Ok(paid_outcome(order.id, is_new));
        }
        match self.settle_order(&order, &ev).await {
            Ok(Some(paid)) => {
                info!(
                    "🧾️ Order #{} ({}) is paid. {} received via {}",
                    paid.id,
                    paid.order_number.as_deref().unwrap_or("-"),
                    ev.amount_received,
                    paid.payment_method.as_deref().unwrap_or("-")
                );
                let side_effect_failures = self.apply_side_effects(&paid).await;
                Ok(ReconciliationOutcome::Paid { order: paid, side_effect_failures })
            },
            Ok(None) => {
                debug!("🧾️ Order #{} was paid by a concurrent request while handling {}", order.id, ev.event_id);
                Ok(paid_outcome(order.id, is_new))
            },
            Err(e) => Err(self.rollback_event(&ev.event_id, is_new, "marking the order as paid", e).await),
        }
    }

    pub async fn process_payment_failed(
        &self,
        ev: PaymentFailed,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let is_new = self
            .db
            .record_if_new(&ev.event_id, PAYMENT_FAILED)
            .await
            .map_err(|e| ReconciliationError::infrastructure("recording the event", e))?;
        let order = match self.db.fetch_order_by_payment_intent(&ev.payment_intent_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                debug!("🧾️ No order for failed payment intent {}. Nothing to do", ev.payment_intent_id);
                return Ok(ReconciliationOutcome::Ignored {
                    reason: format!("no order for payment intent {}", ev.payment_intent_id),
                });
            },
            Err(e) => return Err(self.rollback_event(&ev.event_id, is_new, "looking up the order", e).await),
        };
        if order.is_paid() {
            info!("🧾️ Order #{} is paid. Ignoring payment failure event {}", order.id, ev.event_id);
            return Ok(ReconciliationOutcome::TerminalState { order_id: order.id });
        }
        let note = match &ev.failure_message {
            Some(msg) => format!("payment_failed event={} reason={msg}", ev.event_id),
            None => format!("payment_failed event={}", ev.event_id),
        };
        let previous = order.payment_status;
        match self.db.mark_order_failed(order.id, FailedTransition::with_note(note)).await {
            Ok(Some(_)) if previous == PaymentStatus::Failed => {
                let outcome = if is_new {
                    ReconciliationOutcome::AlreadyFailed { order_id: order.id }
                } else {
                    ReconciliationOutcome::Duplicate { order_id: order.id }
                };
                Ok(outcome)
            },
            Ok(Some(failed)) => {
                info!("🧾️ Payment for order #{} failed: {}", failed.id, ev.failure_message.as_deref().unwrap_or("-"));
                Ok(ReconciliationOutcome::Failed { order: failed })
            },
            Ok(None) => {
                info!("🧾️ Order #{} was paid while handling failure event {}", order.id, ev.event_id);
                Ok(ReconciliationOutcome::TerminalState { order_id: order.id })
            },
            Err(e) => Err(self.rollback_event(&ev.event_id, is_new, "marking the order as failed", e).await),
        }
    }

    /// Retries payments that arrived before their order.
    ///
    /// For each unresolved record whose order now exists, the same guarded transition and side effects as the webhook
    /// path are applied, and the record is marked resolved. Records whose order is still missing are left alone.
    pub async fn sweep_unmatched_payments(&self, limit: i64) -> Result<SweepResult, ReconciliationError> {
        let pending = self
            .db
            .fetch_unresolved_payments(limit)
            .await
            .map_err(|e| ReconciliationError::infrastructure("fetching unmatched payments", e))?;
        let mut result = SweepResult { examined: pending.len(), ..Default::default() };
        for payment in pending {
            let ev = PaymentSucceeded {
                event_id: payment.event_id,
                payment_intent_id: payment.payment_intent_id,
                amount_received: payment.amount_received,
                payment_method: payment.payment_method,
            };
            match self.sweep_one(&ev).await {
                Ok(SweepStep::Settled(order, failures)) => {
                    result.side_effect_failures += failures.len();
                    result.settled.push(order);
                },
                Ok(SweepStep::AlreadyPaid) => result.already_paid += 1,
                Ok(SweepStep::StillMissing) => result.still_unmatched += 1,
                Err(e) => {
                    warn!("🧹️ Could not sweep unmatched payment {}: {e}", ev.event_id);
                    result.errors += 1;
                },
            }
        }
        if result.examined > 0 {
            info!(
                "🧹️ Swept {} unmatched payments. {} settled ({} failed side effects), {} already paid, {} still \
                 unmatched, {} errors",
                result.examined,
                result.settled.len(),
                result.side_effect_failures,
                result.already_paid,
                result.still_unmatched,
                result.errors
            );
        }
        Ok(result)
    }

    async fn sweep_one(&self, ev: &PaymentSucceeded) -> Result<SweepStep, LedgerError> {
        let Some(order) = self.db.fetch_order_by_payment_intent(&ev.payment_intent_id).await? else {
            return Ok(SweepStep::StillMissing);
        };
        if order.is_paid() {
            self.db.resolve_unmatched_payment(&ev.event_id, order.id).await?;
            return Ok(SweepStep::AlreadyPaid);
        }
        let step = match self.settle_order(&order, ev).await? {
            Some(paid) => {
                info!("🧹️ Order #{} settled from unmatched payment {}", paid.id, ev.event_id);
                let failures = self.apply_side_effects(&paid).await;
                SweepStep::Settled(paid, failures)
            },
            None => SweepStep::AlreadyPaid,
        };
        self.db.resolve_unmatched_payment(&ev.event_id, order.id).await?;
        Ok(step)
    }

    async fn find_order_with_retry(&self, payment_intent: &PaymentIntentId) -> Result<Option<Order>, LedgerError> {
        let retry = self.settings.lookup_retry;
        let attempts = retry.attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(order) = self.db.fetch_order_by_payment_intent(payment_intent).await? {
                if attempt > 1 {
                    debug!("🧾️ Found order for {payment_intent} on attempt {attempt}");
                }
                return Ok(Some(order));
            }
            if attempt < attempts {
                trace!("🧾️ No order for {payment_intent} yet (attempt {attempt}/{attempts})");
                tokio::time::sleep(retry.delay).await;
            }
        }
        Ok(None)
    }

    /// Runs the guarded `-> paid` update. Returns `None` if the order was paid by someone else in the meantime.
    async fn settle_order(&self, order: &Order, ev: &PaymentSucceeded) -> Result<Option<Order>, LedgerError> {
        let order_number =
            generate_order_number(&self.settings.order_number_prefix, jst_today(), &mut rand::thread_rng());
        let method = ev.payment_method.clone().unwrap_or_else(|| self.settings.default_payment_method.clone());
        let mut transition = PaidTransition::new(method, order_number);
        if ev.amount_received != order.total_amount {
            warn!(
                "🧾️ Amount mismatch on order #{}. Expected {}, but received {} in event {}",
                order.id, order.total_amount, ev.amount_received, ev.event_id
            );
            transition = transition.with_note(format!(
                "amount_mismatch expected={} received={} event={}",
                order.total_amount.value(),
                ev.amount_received.value(),
                ev.event_id
            ));
        }
        if order.payment_status == PaymentStatus::Failed {
            info!("🧾️ Order #{} previously failed and is now being paid by event {}", order.id, ev.event_id);
            transition = transition.with_note(format!("paid_after_failure event={}", ev.event_id));
        }
        self.db.mark_order_paid(order.id, transition).await
    }

    /// Applies the once-per-order consequences of a payment. Failures are logged and returned, and never undo the
    /// payment itself.
    async fn apply_side_effects(&self, order: &Order) -> Vec<String> {
        let mut failures = Vec::new();
        let items = match self.db.fetch_order_items(order.id).await {
            Ok(items) => items,
            Err(e) => {
                error!("📦️ Could not fetch line items for order #{}. Stock was not adjusted: {e}", order.id);
                failures.push(format!("line items: {e}"));
                Vec::new()
            },
        };
        failures.extend(self.decrement_stock_for(order.id, &items).await);
        if let Some(coupon_id) = order.coupon_id {
            match self.db.increment_coupon_usage(coupon_id).await {
                Ok(coupon) if coupon.is_over_limit() => {
                    warn!(
                        "🎟️ Coupon {} has now been used {} times, which exceeds its limit of {}",
                        coupon.code,
                        coupon.usage_count,
                        coupon.usage_limit.unwrap_or_default()
                    );
                },
                Ok(coupon) => trace!("🎟️ Coupon {} has been used {} times", coupon.code, coupon.usage_count),
                Err(e) => {
                    error!("🎟️ Could not record usage of coupon {coupon_id} for order #{}: {e}", order.id);
                    failures.push(format!("coupon {coupon_id}: {e}"));
                },
            }
        }
        self.call_order_paid_hook(order, items).await;
        if !failures.is_empty() {
            warn!("🧾️ Order #{} is paid, but {} side effect(s) failed", order.id, failures.len());
        }
        failures
    }

    async fn decrement_stock_for(&self, order_id: i64, items: &[OrderItem]) -> Vec<String> {
        let updates = items.iter().map(|item| async move {
            let result = self.db.decrement_stock(&item.product_id, &item.selected_options, item.quantity).await;
            (item, result)
        });
        join_all(updates)
            .await
            .into_iter()
            .filter_map(|(item, result)| match result {
                Ok(record) => {
                    trace!("📦️ {} {} now has {} in stock", item.product_id, record.option_key, record.quantity);
                    None
                },
                Err(e) => {
                    warn!(
                        "📦️ Could not take {} x {} {} from stock for order #{order_id}: {e}",
                        item.quantity, item.product_id, item.selected_options
                    );
                    Some(format!("stock {} {}: {e}", item.product_id, item.selected_options))
                },
            })
            .collect()
    }

    async fn call_order_paid_hook(&self, order: &Order, items: Vec<OrderItem>) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🧾️ Notifying order paid hook subscribers");
            emitter.publish_event(OrderPaidEvent::new(order.clone(), items.clone())).await;
        }
    }

    async fn record_unmatched(&self, ev: &PaymentSucceeded) {
        warn!(
            "🧾️ No order found for payment intent {} (event {}, {}). The payment has been set aside",
            ev.payment_intent_id, ev.event_id, ev.amount_received
        );
        let record = NewUnmatchedPayment {
            event_id: ev.event_id.clone(),
            payment_intent_id: ev.payment_intent_id.clone(),
            amount_received: ev.amount_received,
            payment_method: ev.payment_method.clone(),
        };
        if let Err(e) = self.db.record_unmatched_payment(record).await {
            error!("🧾️ Could not record unmatched payment {}: {e}", ev.event_id);
        }
        for emitter in &self.producers.payment_unmatched_producer {
            let event = PaymentUnmatchedEvent {
                event_id: ev.event_id.clone(),
                payment_intent_id: ev.payment_intent_id.clone(),
                amount_received: ev.amount_received,
            };
            emitter.publish_event(event).await;
        }
    }

    /// Undoes the speculative event record, so that the processor's retry is processed afresh.
    async fn rollback_event(
        &self,
        event_id: &str,
        is_new: bool,
        stage: &'static str,
        e: LedgerError,
    ) -> ReconciliationError {
        error!("🧾️ Infrastructure failure while {stage} for event {event_id}: {e}");
        if is_new {
            if let Err(forget_err) = self.db.forget_event(event_id).await {
                error!("🧾️ Could not forget event {event_id}. Redeliveries will be treated as duplicates: {forget_err}");
            }
        }
        ReconciliationError::infrastructure(stage, e)
    }
}

enum SweepStep {
    Settled(Order, Vec<String>),
    AlreadyPaid,
    StillMissing,
}

fn paid_outcome(order_id: i64, is_new: bool) -> ReconciliationOutcome {
    if is_new {
        ReconciliationOutcome::AlreadyPaid { order_id }
    } else {
        ReconciliationOutcome::Duplicate { order_id }
    }
}
