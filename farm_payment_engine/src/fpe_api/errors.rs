use thiserror::Error;

use crate::traits::LedgerError;

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    /// A ledger operation failed for reasons other than the business rules, e.g. the database is unavailable. The
    /// processor should retry the delivery.
    #[error("Infrastructure failure while {stage}: {source}")]
    Infrastructure { stage: &'static str, source: LedgerError },
    #[error("The payment event is not usable: {0}")]
    InvalidEvent(String),
}

impl ReconciliationError {
    pub fn infrastructure(stage: &'static str, source: LedgerError) -> Self {
        Self::Infrastructure { stage, source }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure { .. })
    }
}
