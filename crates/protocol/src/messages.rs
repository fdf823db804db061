use serde::{Deserialize, Serialize};

use curbside_geo::{Coordinates, RideType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub id: String,
    pub ts: i64,
    pub payload: serde_json::Value,
}

pub fn make_envelope<T: Serialize>(
    message_type: &str,
    id: &str,
    ts: i64,
    payload: &T,
) -> anyhow::Result<Envelope> {
    let payload_value = serde_json::to_value(payload)?;
    Ok(Envelope {
        message_type: message_type.to_string(),
        id: id.to_string(),
        ts,
        payload: payload_value,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Rider,
    Driver,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Rider => write!(f, "rider"),
            UserType::Driver => write!(f, "driver"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Requested,
    Accepted,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RideStatus::Requested | RideStatus::Accepted | RideStatus::Started
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Cash,
    Qr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientJoin {
    pub user_id: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRideRequest {
    pub pickup_address: String,
    pub dropoff_address: String,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    #[serde(default)]
    pub ride_type: RideType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRideAccept {
    pub ride_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRideStart {
    pub ride_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRideComplete {
    pub ride_id: String,
    pub final_fare: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRideCancel {
    pub ride_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientLocation {
    pub lat: f64,
    pub lng: f64,
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRate {
    pub ride_id: String,
    pub score: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPaymentIntent {
    pub ride_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPaymentConfirm {
    pub ride_id: String,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerHello {
    pub server_version: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerWelcome {
    pub session_id: String,
    pub user_id: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideInfo {
    pub ride_id: String,
    pub rider_id: String,
    pub driver_id: Option<String>,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    pub ride_type: RideType,
    pub distance_miles: f64,
    pub estimated_fare: f64,
    pub final_fare: Option<f64>,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideDetail {
    pub ride: RideInfo,
    pub counterpart: Option<UserInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRideRequest {
    pub ride_id: String,
    pub rider_id: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    pub estimated_fare: f64,
    pub distance_miles: f64,
    pub ride_type: RideType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRideAccepted {
    pub ride_id: String,
    pub driver: Option<UserInfo>,
    pub status: RideStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRideTaken {
    pub ride_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRideStarted {
    pub ride_id: String,
    pub status: RideStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRideCompleted {
    pub ride_id: String,
    pub final_fare: Option<f64>,
    pub status: RideStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRideCancelled {
    pub ride_id: String,
    pub status: RideStatus,
    pub cancelled_by: UserType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDriverLocation {
    pub driver_id: String,
    pub ride_id: String,
    pub lat: f64,
    pub lng: f64,
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPaymentIntent {
    pub ride_id: String,
    pub payment_intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPaymentCompleted {
    pub ride_id: String,
    pub final_fare: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingInfo {
    pub score: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRating {
    pub ride_id: String,
    pub rating: RatingInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRide {
    pub ride: RideInfo,
    pub counterpart: Option<UserInfo>,
    pub rating: Option<RatingInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRideHistory {
    pub rides: Vec<HistoryRide>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCurrentRide {
    pub ride: Option<RideDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerAvailableRides {
    pub rides: Vec<RideDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDriverStats {
    pub completed_rides: u64,
    pub total_earnings: f64,
    pub average_rating: f64,
    pub total_ratings: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerProfile {
    pub user: UserInfo,
    pub user_type: UserType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPaymentHistory {
    pub payments: Vec<RideInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerNotice {
    pub text: String,
}
