pub mod mock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPayment,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentState {
    pub intent_id: String,
    pub status: IntentStatus,
    pub amount: f64,
}

pub trait PaymentProvider: Send + Sync {
    fn create_intent(
        &self,
        amount: f64,
        currency: &str,
        ride_id: &str,
        user_id: &str,
    ) -> anyhow::Result<PaymentIntent>;

    fn retrieve_intent(&self, intent_id: &str) -> anyhow::Result<IntentState>;
}
