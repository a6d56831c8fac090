use farm_payment_engine::{
    db_types::{
        Coupon,
        NewCoupon,
        NewOrder,
        NewUnmatchedPayment,
        Order,
        OrderItem,
        PaymentIntentId,
        ProcessedEvent,
        SelectedOptions,
        StockRecord,
        UnmatchedPayment,
    },
    traits::{
        CouponLedger,
        EventStore,
        FailedTransition,
        LedgerError,
        OrderLedger,
        PaidTransition,
        ReconciliationDatabase,
        StockLedger,
        UnmatchedPayments,
    },
};
use mockall::mock;

mock! {
    pub Ledger {}
    impl Clone for Ledger {
        fn clone(&self) -> Self;
    }
    impl EventStore for Ledger {
        async fn record_if_new(&self, event_id: &str, event_type: &str) -> Result<bool, LedgerError>;
        async fn forget_event(&self, event_id: &str) -> Result<(), LedgerError>;
        async fn fetch_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>, LedgerError>;
    }
    impl OrderLedger for Ledger {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError>;
        async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, LedgerError>;
        async fn fetch_order_by_payment_intent(&self, payment_intent: &PaymentIntentId) -> Result<Option<Order>, LedgerError>;
        async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, LedgerError>;
        async fn mark_order_paid(&self, order_id: i64, transition: PaidTransition) -> Result<Option<Order>, LedgerError>;
        async fn mark_order_failed(&self, order_id: i64, transition: FailedTransition) -> Result<Option<Order>, LedgerError>;
    }
    impl StockLedger for Ledger {
        async fn decrement_stock(&self, product_id: &str, options: &SelectedOptions, quantity: i64) -> Result<StockRecord, LedgerError>;
        async fn fetch_stock(&self, product_id: &str, options: &SelectedOptions) -> Result<Option<StockRecord>, LedgerError>;
        async fn set_stock(&self, product_id: &str, options: &SelectedOptions, quantity: i64) -> Result<StockRecord, LedgerError>;
    }
    impl CouponLedger for Ledger {
        async fn insert_coupon(&self, coupon: NewCoupon) -> Result<Coupon, LedgerError>;
        async fn fetch_coupon(&self, coupon_id: i64) -> Result<Option<Coupon>, LedgerError>;
        async fn increment_coupon_usage(&self, coupon_id: i64) -> Result<Coupon, LedgerError>;
    }
    impl UnmatchedPayments for Ledger {
        async fn record_unmatched_payment(&self, payment: NewUnmatchedPayment) -> Result<bool, LedgerError>;
        async fn fetch_unresolved_payments(&self, limit: i64) -> Result<Vec<UnmatchedPayment>, LedgerError>;
        async fn resolve_unmatched_payment(&self, event_id: &str, order_id: i64) -> Result<bool, LedgerError>;
    }
}

impl ReconciliationDatabase for MockLedger {
    fn url(&self) -> &str {
        "mock://ledger"
    }
}
