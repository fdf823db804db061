pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use curbside_geo::{Coordinates, RideType};
use curbside_protocol::{
    PaymentMethod, PaymentStatus, RideInfo, RideStatus, UserInfo, UserType,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRecord {
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
    pub payment_intent_id: Option<String>,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl From<&RideRecord> for RideInfo {
    fn from(record: &RideRecord) -> Self {
        RideInfo {
            ride_id: record.ride_id.clone(),
            rider_id: record.rider_id.clone(),
            driver_id: record.driver_id.clone(),
            pickup_address: record.pickup_address.clone(),
            dropoff_address: record.dropoff_address.clone(),
            pickup: record.pickup,
            dropoff: record.dropoff,
            ride_type: record.ride_type,
            distance_miles: record.distance_miles,
            estimated_fare: record.estimated_fare,
            final_fare: record.final_fare,
            status: record.status,
            payment_status: record.payment_status,
            payment_method: record.payment_method,
            created_at: record.created_at,
            accepted_at: record.accepted_at,
            completed_at: record.completed_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRide {
    pub rider_id: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    pub ride_type: RideType,
    pub distance_miles: f64,
    pub estimated_fare: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRecord {
    pub rating_id: String,
    pub ride_id: String,
    pub rider_id: String,
    pub driver_id: String,
    pub score: u8,
    pub comment: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewRating {
    pub ride_id: String,
    pub rider_id: String,
    pub driver_id: String,
    pub score: u8,
    pub comment: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub user_type: UserType,
}

impl From<&UserProfile> for UserInfo {
    fn from(profile: &UserProfile) -> Self {
        UserInfo {
            user_id: profile.user_id.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            phone: profile.phone.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conditional update matched no record")]
    NoMatch,
    #[error("record already exists")]
    Duplicate,
    #[error("storage failure: {0}")]
    Internal(String),
}

/// Persistence collaborator. Every state transition is a single conditional
/// write: the stated predicate and the update apply atomically, so racing
/// callers observe exactly one winner and `NoMatch` losers.
pub trait Store: Send + Sync {
    fn create_ride(&self, ride: NewRide) -> Result<RideRecord, StoreError>;

    fn ride(&self, ride_id: &str) -> Result<RideRecord, StoreError>;

    /// Predicate: status is `requested` and no driver assigned.
    fn accept_ride(
        &self,
        ride_id: &str,
        driver_id: &str,
        accepted_at: i64,
    ) -> Result<RideRecord, StoreError>;

    /// Predicate: status is `accepted` and `driver_id` is the assigned driver.
    fn start_ride(&self, ride_id: &str, driver_id: &str) -> Result<RideRecord, StoreError>;

    /// Predicate: status is `accepted` or `started` and `driver_id` is the
    /// assigned driver.
    fn complete_ride(
        &self,
        ride_id: &str,
        driver_id: &str,
        final_fare: Option<f64>,
        completed_at: i64,
    ) -> Result<RideRecord, StoreError>;

    /// Predicate: the actor is the rider (from `requested` or `accepted`) or
    /// the assigned driver (from `accepted`).
    fn cancel_ride(&self, ride_id: &str, actor_id: &str) -> Result<RideRecord, StoreError>;

    /// Predicate: the ride belongs to `rider_id` and is `completed`.
    fn record_payment_intent(
        &self,
        ride_id: &str,
        rider_id: &str,
        intent_id: &str,
    ) -> Result<RideRecord, StoreError>;

    /// Predicate: the ride belongs to `rider_id`.
    fn settle_payment(
        &self,
        ride_id: &str,
        rider_id: &str,
        final_fare: f64,
        method: PaymentMethod,
        intent_id: Option<String>,
    ) -> Result<RideRecord, StoreError>;

    fn rides_for_user(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<Vec<RideRecord>, StoreError>;

    fn current_ride(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<Option<RideRecord>, StoreError>;

    fn available_rides(&self) -> Result<Vec<RideRecord>, StoreError>;

    fn active_ride_for_driver(&self, driver_id: &str) -> Result<Option<RideRecord>, StoreError>;

    fn settled_rides_for_rider(&self, rider_id: &str) -> Result<Vec<RideRecord>, StoreError>;

    fn create_rating(&self, rating: NewRating) -> Result<RatingRecord, StoreError>;

    fn rating_for_ride(&self, ride_id: &str) -> Result<Option<RatingRecord>, StoreError>;

    fn ratings_for_driver(&self, driver_id: &str) -> Result<Vec<RatingRecord>, StoreError>;

    fn user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    fn upsert_user(&self, profile: UserProfile) -> Result<(), StoreError>;

    fn all_rides(&self) -> Result<Vec<RideRecord>, StoreError>;

    fn all_ratings(&self) -> Result<Vec<RatingRecord>, StoreError>;
}
