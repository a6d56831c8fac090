//! Translation of the card processor's webhook payloads into engine [`PaymentEvent`]s.
//!
//! Only the fields that reconciliation needs are read. Event types other than `payment_intent.succeeded` and
//! `payment_intent.payment_failed` are passed through as [`PaymentEvent::Unhandled`] without looking at their data.
use farm_payment_engine::{PaymentEvent, PaymentFailed, PaymentSucceeded, PAYMENT_FAILED, PAYMENT_SUCCEEDED};
use fpg_common::{Yen, YEN_CURRENCY_CODE};
use log::*;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Invalid JSON. {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Deserialize)]
struct ProcessorEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: String,
    #[serde(default)]
    amount: Option<u64>,
    #[serde(default)]
    amount_received: Option<u64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    payment_method_types: Vec<String>,
    #[serde(default)]
    last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Deserialize)]
struct LastPaymentError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl LastPaymentError {
    fn describe(self) -> Option<String> {
        match (self.code, self.message) {
            (Some(code), Some(msg)) => Some(format!("{code}: {msg}")),
            (None, Some(msg)) => Some(msg),
            (Some(code), None) => Some(code),
            (None, None) => None,
        }
    }
}

/// Parses a raw (already authenticated) webhook body.
pub fn parse_payment_event(raw_body: &[u8]) -> Result<PaymentEvent, PayloadError> {
    let event = serde_json::from_slice::<ProcessorEvent>(raw_body)?;
    trace!("🧾️ Parsing {} event {}", event.event_type, event.id);
    match event.event_type.as_str() {
        PAYMENT_SUCCEEDED => {
            let intent = serde_json::from_value::<PaymentIntentObject>(event.data.object)?;
            warn_on_foreign_currency(&event.id, intent.currency.as_deref());
            let amount = intent.amount_received.or(intent.amount).unwrap_or_default();
            let amount_received = Yen::try_from(amount).map_err(|e| PayloadError::InvalidAmount(e.to_string()))?;
            Ok(PaymentEvent::Succeeded(PaymentSucceeded {
                event_id: event.id,
                payment_intent_id: intent.id.into(),
                amount_received,
                payment_method: intent.payment_method_types.into_iter().next(),
            }))
        },
        PAYMENT_FAILED => {
            let intent = serde_json::from_value::<PaymentIntentObject>(event.data.object)?;
            Ok(PaymentEvent::Failed(PaymentFailed {
                event_id: event.id,
                payment_intent_id: intent.id.into(),
                failure_message: intent.last_payment_error.and_then(LastPaymentError::describe),
            }))
        },
        _ => Ok(PaymentEvent::Unhandled { event_id: event.id, event_type: event.event_type }),
    }
}

fn warn_on_foreign_currency(event_id: &str, currency: Option<&str>) {
    match currency {
        Some(c) if !c.eq_ignore_ascii_case(YEN_CURRENCY_CODE) => {
            warn!("🧾️ Event {event_id} reports an amount in {c}. It will be compared to the order total as yen.")
        },
        _ => {},
    }
}
