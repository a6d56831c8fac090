use crate::{db_types::ProcessedEvent, traits::LedgerError};

/// The idempotency gate.
///
/// Processors deliver events at least once, and may deliver them concurrently. The gate admits each event id exactly
/// once, using a uniqueness constraint in the backend rather than a read-then-write check.
#[allow(async_fn_in_trait)]
pub trait EventStore {
    /// Records the event id. Returns `true` if the id was new, and `false` if it had already been recorded.
    ///
    /// A uniqueness conflict is the only condition that yields `false`. Any other failure is an error.
    async fn record_if_new(&self, event_id: &str, event_type: &str) -> Result<bool, LedgerError>;

    /// Removes a speculative record so that the processor's redelivery of the event is processed afresh.
    ///
    /// Only called when processing failed for infrastructure reasons *after* the event was recorded.
    async fn forget_event(&self, event_id: &str) -> Result<(), LedgerError>;

    async fn fetch_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>, LedgerError>;
}
