//! Best-effort notification of paid orders to a downstream service (e.g. the fulfilment mailer).
//!
//! The relay is driven from the engine's order-paid hook, so it runs after the webhook has been answered. Every
//! failure is logged and dropped.
use std::time::Duration;

use chrono::{DateTime, Utc};
use farm_payment_engine::{
    db_types::{Order, OrderItem, SelectedOptions},
    events::{EventHandlers, EventHooks, OrderPaidEvent},
};
use fpg_common::Yen;
use futures::future::BoxFuture;
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(7);
pub const RELAY_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Could not initialize the relay client. {0}")]
    Initialization(String),
    #[error("The relay request failed. {0}")]
    RequestError(String),
    #[error("The relay destination answered with status {status}. {message}")]
    Rejected { status: u16, message: String },
}

/// The order summary sent to the relay destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: i64,
    pub order_number: Option<String>,
    pub payment_intent_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_postal_code: String,
    pub shipping_prefecture: String,
    pub shipping_address: String,
    pub subtotal: Yen,
    pub shipping_fee: Yen,
    pub discount_amount: Yen,
    pub total_amount: Yen,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub items: Vec<ItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub selected_options: SelectedOptions,
    pub line_total: Yen,
}

impl OrderSnapshot {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        let items = items
            .into_iter()
            .map(|item| ItemSnapshot {
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                selected_options: item.selected_options,
                line_total: item.line_total,
            })
            .collect();
        Self {
            order_id: order.id,
            order_number: order.order_number,
            payment_intent_id: order.payment_intent_id.0,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            shipping_postal_code: order.shipping_postal_code,
            shipping_prefecture: order.shipping_prefecture,
            shipping_address: order.shipping_address,
            subtotal: order.subtotal,
            shipping_fee: order.shipping_fee,
            discount_amount: order.discount_amount,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            paid_at: order.paid_at,
            items,
        }
    }

    fn label(&self) -> &str {
        self.order_number.as_deref().unwrap_or(self.payment_intent_id.as_str())
    }
}

impl From<OrderPaidEvent> for OrderSnapshot {
    fn from(ev: OrderPaidEvent) -> Self {
        Self::new(ev.order, ev.items)
    }
}

#[derive(Debug, Clone)]
struct RelayTarget {
    url: String,
    client: Client,
}

/// POSTs [`OrderSnapshot`]s to the configured URL. Without a URL, [`NotificationRelay::notify`] does nothing.
#[derive(Debug, Clone, Default)]
pub struct NotificationRelay {
    target: Option<RelayTarget>,
}

impl NotificationRelay {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, RelayError> {
        let target = match url.filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let client =
                    Client::builder().timeout(timeout).build().map_err(|e| RelayError::Initialization(e.to_string()))?;
                Some(RelayTarget { url, client })
            },
            None => None,
        };
        Ok(Self { target })
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Sends the snapshot, logging (and swallowing) any failure.
    pub async fn notify(&self, snapshot: &OrderSnapshot) {
        match self.try_notify(snapshot).await {
            Ok(true) => info!("📣️ Order {} relayed.", snapshot.label()),
            Ok(false) => trace!("📣️ No relay is configured. Order {} was not relayed.", snapshot.label()),
            Err(e) => warn!("📣️ Could not relay order {}. {e}", snapshot.label()),
        }
    }

    /// Returns `Ok(false)` when the relay is disabled.
    pub async fn try_notify(&self, snapshot: &OrderSnapshot) -> Result<bool, RelayError> {
        let Some(target) = &self.target else {
            return Ok(false);
        };
        trace!("📣️ Relaying order {} to {}", snapshot.label(), target.url);
        let response = target
            .client
            .post(target.url.as_str())
            .json(snapshot)
            .send()
            .await
            .map_err(|e| RelayError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            Ok(true)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(RelayError::Rejected { status, message })
        }
    }
}

/// Builds the engine event handlers that feed paid orders to the relay and log unmatched payments.
pub fn create_relay_event_handlers(relay: NotificationRelay) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(move |ev| {
        if !relay.is_enabled() {
            return no_op();
        }
        let relay = relay.clone();
        Box::pin(async move {
            let snapshot = OrderSnapshot::from(ev);
            relay.notify(&snapshot).await;
        })
    });
    hooks.on_payment_unmatched(|ev| {
        warn!(
            "📣️ Payment {} ({}) for {} has no order yet. It will be picked up by the sweeper.",
            ev.payment_intent_id, ev.event_id, ev.amount_received
        );
        no_op()
    });
    EventHandlers::new(RELAY_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
