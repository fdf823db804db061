use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::{IntentState, IntentStatus, PaymentIntent, PaymentProvider};

#[derive(Clone, Default)]
pub struct MockProvider {
    intents: Arc<Mutex<HashMap<String, IntentState>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_succeeded(&self, intent_id: &str) {
        let mut intents = self.intents.lock().expect("intents lock");
        if let Some(intent) = intents.get_mut(intent_id) {
            intent.status = IntentStatus::Succeeded;
        }
    }
}

impl PaymentProvider for MockProvider {
    fn create_intent(
        &self,
        amount: f64,
        _currency: &str,
        _ride_id: &str,
        _user_id: &str,
    ) -> anyhow::Result<PaymentIntent> {
        if amount <= 0.0 {
            anyhow::bail!("amount must be positive")
        }
        let intent_id = format!("pi_{}", Uuid::new_v4());
        let client_secret = format!("cs_{}", Uuid::new_v4());
        let mut intents = self.intents.lock().expect("intents lock");
        intents.insert(
            intent_id.clone(),
            IntentState {
                intent_id: intent_id.clone(),
                status: IntentStatus::RequiresPayment,
                amount,
            },
        );
        Ok(PaymentIntent {
            intent_id,
            client_secret,
        })
    }

    fn retrieve_intent(&self, intent_id: &str) -> anyhow::Result<IntentState> {
        let intents = self.intents.lock().expect("intents lock");
        let state = intents.get(intent_id).cloned().unwrap_or(IntentState {
            intent_id: intent_id.to_string(),
            status: IntentStatus::Failed,
            amount: 0.0,
        });
        Ok(state)
    }
}
