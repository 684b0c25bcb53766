//! Wire types for the webhook endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::WebhookAck;

/// Response body returned to the webhook caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckBody {
    /// Whether the event was accepted (verified or verification skipped).
    pub received: bool,
}

impl From<WebhookAck> for AckBody {
    fn from(ack: WebhookAck) -> Self {
        Self {
            received: ack.received,
        }
    }
}
