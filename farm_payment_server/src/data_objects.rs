use farm_payment_engine::ReconciliationOutcome;
use serde::{Deserialize, Serialize};

/// The body of every 2xx webhook response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

impl From<&ReconciliationOutcome> for WebhookAck {
    fn from(outcome: &ReconciliationOutcome) -> Self {
        Self {
            received: true,
            outcome: outcome.name().to_string(),
            warning: outcome.warning().map(String::from),
            duplicate: outcome.is_duplicate().then_some(true),
        }
    }
}
