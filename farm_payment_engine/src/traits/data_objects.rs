use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The field values written by the `pending|failed -> paid` transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidTransition {
    pub paid_at: DateTime<Utc>,
    pub payment_method: String,
    /// Only used if the order does not have a number yet.
    pub order_number: String,
    /// Audit entries appended to the order notes, in order.
    pub notes: Vec<String>,
}

impl PaidTransition {
    pub fn new<S: Into<String>>(payment_method: S, order_number: S) -> Self {
        Self { paid_at: Utc::now(), payment_method: payment_method.into(), order_number: order_number.into(), notes: vec![] }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn joined_notes(&self) -> Option<String> {
        if self.notes.is_empty() {
            None
        } else {
            Some(self.notes.join("\n"))
        }
    }
}

/// The field values written by the `pending -> failed` transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTransition {
    /// Appended to the notes only when the status actually changes.
    pub note: Option<String>,
}

impl FailedTransition {
    pub fn with_note<S: Into<String>>(note: S) -> Self {
        Self { note: Some(note.into()) }
    }
}
