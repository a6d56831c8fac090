use crate::{
    db_types::{SelectedOptions, StockRecord},
    traits::LedgerError,
};

/// Per-option inventory, keyed by product id and the canonical key of the selected options.
#[allow(async_fn_in_trait)]
pub trait StockLedger {
    /// Decrements the stock record by `quantity` in a single guarded statement, so that concurrent decrements can
    /// never take the quantity below zero.
    ///
    /// Fails with [`LedgerError::InsufficientStock`] if there is not enough stock, and with
    /// [`LedgerError::StockRecordNotFound`] if there is no record for the product/option combination.
    async fn decrement_stock(
        &self,
        product_id: &str,
        options: &SelectedOptions,
        quantity: i64,
    ) -> Result<StockRecord, LedgerError>;

    async fn fetch_stock(&self, product_id: &str, options: &SelectedOptions) -> Result<Option<StockRecord>, LedgerError>;

    /// Creates or overwrites the stock level for the product/option combination.
    async fn set_stock(
        &self,
        product_id: &str,
        options: &SelectedOptions,
        quantity: i64,
    ) -> Result<StockRecord, LedgerError>;
}
