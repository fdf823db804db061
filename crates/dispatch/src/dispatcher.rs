use std::sync::Arc;

use serde::Serialize;
use tokio_tungstenite::tungstenite::Message;

use curbside_common::ids::new_message_id;
use curbside_common::time::now_ms;
use curbside_protocol::make_envelope;

use crate::registry::{Channel, Registry};

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    // Fire-and-forget fan-out. A failed delivery never propagates back into
    // the transition that triggered it.
    pub async fn publish<T: Serialize>(&self, channel: &Channel, event: &str, payload: &T) -> usize {
        let envelope = match make_envelope(event, &new_message_id(), now_ms(), payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!("failed to encode {event}: {err}");
                return 0;
            }
        };
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("failed to encode {event}: {err}");
                return 0;
            }
        };

        let mut delivered = 0;
        for tx in self.registry.members(channel).await {
            if tx.send(Message::Text(text.clone())).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!("dropped {event} for a closed connection");
            }
        }
        delivered
    }
}
