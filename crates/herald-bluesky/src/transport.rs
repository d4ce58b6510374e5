//! Chat DM transport.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use herald_outreach::{MessageTransport, SendAck, TransportError};

use crate::BlueskyClient;

/// Delivers outreach messages as Bluesky chat DMs.
pub struct BlueskyTransport {
    client: Arc<BlueskyClient>,
    cap_fallback: Duration,
}

impl BlueskyTransport {
    pub fn new(client: Arc<BlueskyClient>, cap_fallback: Duration) -> Self {
        Self {
            client,
            cap_fallback,
        }
    }
}

#[async_trait]
impl MessageTransport for BlueskyTransport {
    async fn send(&self, recipient_id: &str, text: &str) -> Result<SendAck, TransportError> {
        let message_id = self
            .client
            .send_dm(recipient_id, text)
            .await
            .map_err(|e| e.into_transport(Utc::now(), self.cap_fallback))?;

        Ok(SendAck { message_id })
    }
}
