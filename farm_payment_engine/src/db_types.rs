//! Data types shared by the ledgers, the reconciliation API and the database backends.
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fpg_common::Yen;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
/// The payment state of an order. `Paid` is terminal: nothing moves an order out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The order row exists, and we are waiting on the processor.
    Pending,
    /// The processor reported the payment as succeeded.
    Paid,
    /// The processor reported the payment as failed.
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError { kind: "payment status", value: s.to_string() }),
        }
    }
}

//--------------------------------------  FulfillmentStatus    ---------------------------------------------------------
/// The shipping lifecycle of an order. Only `AwaitingPayment -> Processing` is driven by payment reconciliation; the
/// remaining transitions belong to the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    AwaitingPayment,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingPayment => write!(f, "awaiting_payment"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError { kind: "fulfillment status", value: s.to_string() }),
        }
    }
}

//--------------------------------------   PaymentIntentId     ---------------------------------------------------------
/// The processor-assigned identifier of a checkout attempt. It is the join key between our orders and the
/// processor's events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PaymentIntentId(pub String);

impl PaymentIntentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PaymentIntentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PaymentIntentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for PaymentIntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------   SelectedOptions     ---------------------------------------------------------
/// The option set a customer picked for a product line, e.g. `{"size": "5kg"}`.
///
/// Keys are kept sorted, so the canonical key of two equal option sets is always the same string. The canonical key of
/// the empty set is `{}`, which addresses the product-level stock record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedOptions(BTreeMap<String, String>);

impl SelectedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn canonical_key(&self) -> String {
        // A map of strings always serializes
        serde_json::to_string(&self.0).unwrap_or_else(|_| String::from("{}"))
    }
}

impl TryFrom<String> for SelectedOptions {
    type Error = serde_json::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&value)
    }
}

impl Display for SelectedOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_key())
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub payment_intent_id: PaymentIntentId,
    /// The human-facing order number. Assigned once, when the order is first paid.
    pub order_number: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_postal_code: String,
    pub shipping_prefecture: String,
    pub shipping_address: String,
    pub subtotal: Yen,
    pub shipping_fee: Yen,
    pub discount_amount: Yen,
    pub total_amount: Yen,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub payment_method: Option<String>,
    pub coupon_id: Option<i64>,
    /// Append-only audit trail, one entry per line.
    pub notes: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn note_entries(&self) -> impl Iterator<Item = &str> {
        self.notes.lines().filter(|l| !l.trim().is_empty())
    }
}

//--------------------------------------      NewOrder         ---------------------------------------------------------
/// An order as written by the checkout flow, before any payment event has been seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub payment_intent_id: PaymentIntentId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_postal_code: String,
    pub shipping_prefecture: String,
    pub shipping_address: String,
    pub shipping_fee: Yen,
    pub discount_amount: Yen,
    pub coupon_id: Option<i64>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(payment_intent_id: PaymentIntentId, customer_name: S, customer_email: S) -> Self {
        Self {
            payment_intent_id,
            customer_name: customer_name.into(),
            customer_email: customer_email.into(),
            customer_phone: None,
            shipping_postal_code: String::default(),
            shipping_prefecture: String::default(),
            shipping_address: String::default(),
            shipping_fee: Yen::default(),
            discount_amount: Yen::default(),
            coupon_id: None,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_shipping<S: Into<String>>(mut self, postal_code: S, prefecture: S, address: S, fee: Yen) -> Self {
        self.shipping_postal_code = postal_code.into();
        self.shipping_prefecture = prefecture.into();
        self.shipping_address = address.into();
        self.shipping_fee = fee;
        self
    }

    pub fn with_coupon(mut self, coupon_id: i64, discount: Yen) -> Self {
        self.coupon_id = Some(coupon_id);
        self.discount_amount = discount;
        self
    }

    pub fn subtotal(&self) -> Yen {
        self.items.iter().map(NewOrderItem::line_total).sum()
    }

    pub fn total_amount(&self) -> Yen {
        self.subtotal() + self.shipping_fee - self.discount_amount
    }
}

//--------------------------------------     OrderItem         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    #[sqlx(try_from = "String")]
    pub selected_options: SelectedOptions,
    pub unit_price: Yen,
    pub line_total: Yen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub selected_options: SelectedOptions,
    pub unit_price: Yen,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(product_id: S, product_name: S, quantity: i64, unit_price: Yen) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            selected_options: SelectedOptions::default(),
            unit_price,
        }
    }

    pub fn with_options(mut self, options: SelectedOptions) -> Self {
        self.selected_options = options;
        self
    }

    pub fn line_total(&self) -> Yen {
        self.unit_price * self.quantity
    }
}

//--------------------------------------    StockRecord        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: String,
    /// Canonical key of the option combination. See [`SelectedOptions::canonical_key`].
    pub option_key: String,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Coupon          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub usage_count: i64,
    pub usage_limit: Option<i64>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_over_limit(&self) -> bool {
        self.usage_limit.map(|limit| self.usage_count > limit).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub usage_limit: Option<i64>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl NewCoupon {
    pub fn new<S: Into<String>>(code: S) -> Self {
        Self { code: code.into(), usage_limit: None, valid_from: Utc::now(), valid_until: None }
    }

    pub fn with_usage_limit(mut self, limit: i64) -> Self {
        self.usage_limit = Some(limit);
        self
    }
}

//--------------------------------------   ProcessedEvent      ---------------------------------------------------------
/// The record left behind by the idempotency gate for every processor event id it has admitted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
}

//--------------------------------------  UnmatchedPayment     ---------------------------------------------------------
/// A successful payment that arrived before (or without) its order row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UnmatchedPayment {
    pub event_id: String,
    pub payment_intent_id: PaymentIntentId,
    pub amount_received: Yen,
    pub payment_method: Option<String>,
    pub received_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_order_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewUnmatchedPayment {
    pub event_id: String,
    pub payment_intent_id: PaymentIntentId,
    pub amount_received: Yen,
    pub payment_method: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_option_keys_ignore_insertion_order() {
        let a = SelectedOptions::new().with("size", "5kg").with("variety", "koshihikari");
        let b = SelectedOptions::new().with("variety", "koshihikari").with("size", "5kg");
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a.canonical_key(), r#"{"size":"5kg","variety":"koshihikari"}"#);
        assert_eq!(SelectedOptions::default().canonical_key(), "{}");
    }

    #[test]
    fn options_from_stored_text() {
        let opts = SelectedOptions::try_from(r#"{"size":"10kg"}"#.to_string()).unwrap();
        assert_eq!(opts.get("size"), Some("10kg"));
        assert!(SelectedOptions::try_from(String::new()).unwrap().is_empty());
        assert!(SelectedOptions::try_from("not json".to_string()).is_err());
    }

    #[test]
    fn new_order_totals() {
        let order = NewOrder::new("pi_1".into(), "Hanako", "hanako@example.jp")
            .with_item(NewOrderItem::new("rice", "Rice", 2, Yen::from(1200)))
            .with_item(NewOrderItem::new("miso", "Miso", 1, Yen::from(600)))
            .with_shipping("100-0001", "Tokyo", "Chiyoda 1-1", Yen::from(500))
            .with_coupon(1, Yen::from(300));
        assert_eq!(order.subtotal(), Yen::from(3000));
        assert_eq!(order.total_amount(), Yen::from(3200));
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert_eq!(FulfillmentStatus::AwaitingPayment.to_string(), "awaiting_payment");
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn coupon_limits() {
        let mut coupon = Coupon {
            id: 1,
            code: "HARVEST".into(),
            usage_count: 10,
            usage_limit: Some(10),
            valid_from: Utc::now(),
            valid_until: None,
            created_at: Utc::now(),
        };
        assert!(!coupon.is_over_limit());
        coupon.usage_count = 11;
        assert!(coupon.is_over_limit());
        coupon.usage_limit = None;
        assert!(!coupon.is_over_limit());
    }
}
