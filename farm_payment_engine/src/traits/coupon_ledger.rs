use crate::{
    db_types::{Coupon, NewCoupon},
    traits::LedgerError,
};

#[allow(async_fn_in_trait)]
pub trait CouponLedger {
    async fn insert_coupon(&self, coupon: NewCoupon) -> Result<Coupon, LedgerError>;

    async fn fetch_coupon(&self, coupon_id: i64) -> Result<Option<Coupon>, LedgerError>;

    /// Adds one to the coupon's usage count in a single statement. Usage limits are not enforced here.
    async fn increment_coupon_usage(&self, coupon_id: i64) -> Result<Coupon, LedgerError>;
}
