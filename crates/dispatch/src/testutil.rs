use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use curbside_protocol::{Envelope, UserType};
use curbside_store::memory::MemoryStore;
use curbside_store::{Store, UserProfile};

use crate::dispatcher::Dispatcher;
use crate::registry::{Identity, Registry};

pub struct TestBed {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    pub dispatcher: Dispatcher,
}

pub fn test_bed() -> TestBed {
    let registry = Arc::new(Registry::new());
    TestBed {
        store: Arc::new(MemoryStore::new()),
        dispatcher: Dispatcher::new(Arc::clone(&registry)),
        registry,
    }
}

pub fn rider(user_id: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        user_type: UserType::Rider,
    }
}

pub fn driver(user_id: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        user_type: UserType::Driver,
    }
}

pub async fn connect(
    registry: &Registry,
    conn_id: &str,
    identity: Identity,
) -> mpsc::UnboundedReceiver<Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    registry.join(conn_id, identity, tx).await;
    rx
}

pub fn reply_channel() -> (
    mpsc::UnboundedSender<Message>,
    mpsc::UnboundedReceiver<Message>,
) {
    mpsc::unbounded_channel()
}

pub fn next_envelope(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<Envelope> {
    let msg = rx.try_recv().ok()?;
    serde_json::from_str(msg.to_text().expect("text message")).ok()
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Envelope> {
    let mut envelopes = Vec::new();
    while let Some(envelope) = next_envelope(rx) {
        envelopes.push(envelope);
    }
    envelopes
}

pub fn seed_profile(store: &Arc<dyn Store>, user_id: &str, first_name: &str, user_type: UserType) {
    store
        .upsert_user(UserProfile {
            user_id: user_id.to_string(),
            first_name: first_name.to_string(),
            last_name: "Tester".to_string(),
            phone: "555-0100".to_string(),
            user_type,
        })
        .expect("seed profile");
}
