use std::collections::HashMap;
use std::sync::Mutex;

use curbside_protocol::{PaymentMethod, PaymentStatus, RideStatus, UserType};

use crate::{NewRating, NewRide, RatingRecord, RideRecord, Store, StoreError, UserProfile};

#[derive(Default)]
struct Inner {
    next_ride_id: u64,
    next_rating_id: u64,
    rides: HashMap<String, RideRecord>,
    ratings: HashMap<String, RatingRecord>,
    users: HashMap<String, UserProfile>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(
        rides: Vec<RideRecord>,
        ratings: Vec<RatingRecord>,
        users: Vec<UserProfile>,
    ) -> Self {
        let mut inner = Inner::default();
        for ride in rides {
            inner.next_ride_id = inner.next_ride_id.max(id_sequence(&ride.ride_id, "r_"));
            inner.rides.insert(ride.ride_id.clone(), ride);
        }
        for rating in ratings {
            inner.next_rating_id = inner
                .next_rating_id
                .max(id_sequence(&rating.rating_id, "t_"));
            inner.ratings.insert(rating.rating_id.clone(), rating);
        }
        for user in users {
            inner.users.insert(user.user_id.clone(), user);
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store lock")
    }
}

fn id_sequence(id: &str, prefix: &str) -> u64 {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.parse().ok())
        .unwrap_or(0)
}

impl Store for MemoryStore {
    fn create_ride(&self, ride: NewRide) -> Result<RideRecord, StoreError> {
        let mut inner = self.lock();
        inner.next_ride_id += 1;
        let ride_id = format!("r_{}", inner.next_ride_id);
        let record = RideRecord {
            ride_id: ride_id.clone(),
            rider_id: ride.rider_id,
            driver_id: None,
            pickup_address: ride.pickup_address,
            dropoff_address: ride.dropoff_address,
            pickup: ride.pickup,
            dropoff: ride.dropoff,
            ride_type: ride.ride_type,
            distance_miles: ride.distance_miles,
            estimated_fare: ride.estimated_fare,
            final_fare: None,
            status: RideStatus::Requested,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            payment_intent_id: None,
            created_at: ride.created_at,
            accepted_at: None,
            completed_at: None,
        };
        inner.rides.insert(ride_id, record.clone());
        Ok(record)
    }

    fn ride(&self, ride_id: &str) -> Result<RideRecord, StoreError> {
        self.lock()
            .rides
            .get(ride_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn accept_ride(
        &self,
        ride_id: &str,
        driver_id: &str,
        accepted_at: i64,
    ) -> Result<RideRecord, StoreError> {
        let mut inner = self.lock();
        let ride = inner.rides.get_mut(ride_id).ok_or(StoreError::NotFound)?;
        if ride.status != RideStatus::Requested || ride.driver_id.is_some() {
            return Err(StoreError::NoMatch);
        }
        ride.status = RideStatus::Accepted;
        ride.driver_id = Some(driver_id.to_string());
        ride.accepted_at = Some(accepted_at);
        Ok(ride.clone())
    }

    fn start_ride(&self, ride_id: &str, driver_id: &str) -> Result<RideRecord, StoreError> {
        let mut inner = self.lock();
        let ride = inner.rides.get_mut(ride_id).ok_or(StoreError::NotFound)?;
        if ride.status != RideStatus::Accepted || ride.driver_id.as_deref() != Some(driver_id) {
            return Err(StoreError::NoMatch);
        }
        ride.status = RideStatus::Started;
        Ok(ride.clone())
    }

    fn complete_ride(
        &self,
        ride_id: &str,
        driver_id: &str,
        final_fare: Option<f64>,
        completed_at: i64,
    ) -> Result<RideRecord, StoreError> {
        let mut inner = self.lock();
        let ride = inner.rides.get_mut(ride_id).ok_or(StoreError::NotFound)?;
        let completable =
            matches!(ride.status, RideStatus::Accepted | RideStatus::Started)
                && ride.driver_id.as_deref() == Some(driver_id);
        if !completable {
            return Err(StoreError::NoMatch);
        }
        ride.status = RideStatus::Completed;
        ride.final_fare = final_fare;
        ride.completed_at = Some(completed_at);
        Ok(ride.clone())
    }

    fn cancel_ride(&self, ride_id: &str, actor_id: &str) -> Result<RideRecord, StoreError> {
        let mut inner = self.lock();
        let ride = inner.rides.get_mut(ride_id).ok_or(StoreError::NotFound)?;
        let cancellable = match ride.status {
            RideStatus::Requested => ride.rider_id == actor_id,
            RideStatus::Accepted => {
                ride.rider_id == actor_id || ride.driver_id.as_deref() == Some(actor_id)
            }
            _ => false,
        };
        if !cancellable {
            return Err(StoreError::NoMatch);
        }
        ride.status = RideStatus::Cancelled;
        Ok(ride.clone())
    }

    fn record_payment_intent(
        &self,
        ride_id: &str,
        rider_id: &str,
        intent_id: &str,
    ) -> Result<RideRecord, StoreError> {
        let mut inner = self.lock();
        let ride = inner.rides.get_mut(ride_id).ok_or(StoreError::NotFound)?;
        if ride.rider_id != rider_id || ride.status != RideStatus::Completed {
            return Err(StoreError::NoMatch);
        }
        ride.payment_intent_id = Some(intent_id.to_string());
        Ok(ride.clone())
    }

    fn settle_payment(
        &self,
        ride_id: &str,
        rider_id: &str,
        final_fare: f64,
        method: PaymentMethod,
        intent_id: Option<String>,
    ) -> Result<RideRecord, StoreError> {
        let mut inner = self.lock();
        let ride = inner.rides.get_mut(ride_id).ok_or(StoreError::NotFound)?;
        if ride.rider_id != rider_id {
            return Err(StoreError::NoMatch);
        }
        ride.payment_status = PaymentStatus::Completed;
        ride.final_fare = Some(final_fare);
        ride.payment_method = Some(method);
        if intent_id.is_some() {
            ride.payment_intent_id = intent_id;
        }
        Ok(ride.clone())
    }

    fn rides_for_user(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<Vec<RideRecord>, StoreError> {
        let inner = self.lock();
        let mut rides: Vec<RideRecord> = inner
            .rides
            .values()
            .filter(|ride| is_party(ride, user_id, user_type))
            .cloned()
            .collect();
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rides)
    }

    fn current_ride(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<Option<RideRecord>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .rides
            .values()
            .filter(|ride| ride.status.is_active() && is_party(ride, user_id, user_type))
            .max_by_key(|ride| ride.created_at)
            .cloned())
    }

    fn available_rides(&self) -> Result<Vec<RideRecord>, StoreError> {
        let inner = self.lock();
        let mut rides: Vec<RideRecord> = inner
            .rides
            .values()
            .filter(|ride| ride.status == RideStatus::Requested)
            .cloned()
            .collect();
        rides.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rides)
    }

    fn active_ride_for_driver(&self, driver_id: &str) -> Result<Option<RideRecord>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .rides
            .values()
            .filter(|ride| {
                matches!(ride.status, RideStatus::Accepted | RideStatus::Started)
                    && ride.driver_id.as_deref() == Some(driver_id)
            })
            .max_by_key(|ride| ride.created_at)
            .cloned())
    }

    fn settled_rides_for_rider(&self, rider_id: &str) -> Result<Vec<RideRecord>, StoreError> {
        let inner = self.lock();
        let mut rides: Vec<RideRecord> = inner
            .rides
            .values()
            .filter(|ride| {
                ride.rider_id == rider_id && ride.payment_status == PaymentStatus::Completed
            })
            .cloned()
            .collect();
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rides)
    }

    fn create_rating(&self, rating: NewRating) -> Result<RatingRecord, StoreError> {
        let mut inner = self.lock();
        if inner
            .ratings
            .values()
            .any(|existing| existing.ride_id == rating.ride_id)
        {
            return Err(StoreError::Duplicate);
        }
        inner.next_rating_id += 1;
        let rating_id = format!("t_{}", inner.next_rating_id);
        let record = RatingRecord {
            rating_id: rating_id.clone(),
            ride_id: rating.ride_id,
            rider_id: rating.rider_id,
            driver_id: rating.driver_id,
            score: rating.score,
            comment: rating.comment,
            created_at: rating.created_at,
        };
        inner.ratings.insert(rating_id, record.clone());
        Ok(record)
    }

    fn rating_for_ride(&self, ride_id: &str) -> Result<Option<RatingRecord>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .ratings
            .values()
            .find(|rating| rating.ride_id == ride_id)
            .cloned())
    }

    fn ratings_for_driver(&self, driver_id: &str) -> Result<Vec<RatingRecord>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .ratings
            .values()
            .filter(|rating| rating.driver_id == driver_id)
            .cloned()
            .collect())
    }

    fn user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.lock().users.get(user_id).cloned())
    }

    fn upsert_user(&self, profile: UserProfile) -> Result<(), StoreError> {
        self.lock().users.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    fn all_rides(&self) -> Result<Vec<RideRecord>, StoreError> {
        Ok(self.lock().rides.values().cloned().collect())
    }

    fn all_ratings(&self) -> Result<Vec<RatingRecord>, StoreError> {
        Ok(self.lock().ratings.values().cloned().collect())
    }
}

fn is_party(ride: &RideRecord, user_id: &str, user_type: UserType) -> bool {
    match user_type {
        UserType::Rider => ride.rider_id == user_id,
        UserType::Driver => ride.driver_id.as_deref() == Some(user_id),
    }
}

#[cfg(test)]
mod tests {
    use curbside_geo::{Coordinates, RideType};

    use super::*;

    fn new_ride(rider_id: &str, created_at: i64) -> NewRide {
        NewRide {
            rider_id: rider_id.to_string(),
            pickup_address: "12 Main St".to_string(),
            dropoff_address: "80 Oak Ave".to_string(),
            pickup: Coordinates { lat: 40.0, lng: -73.0 },
            dropoff: Coordinates { lat: 40.1, lng: -73.0 },
            ride_type: RideType::Standard,
            distance_miles: 6.91,
            estimated_fare: 12.87,
            created_at,
        }
    }

    fn new_rating(ride_id: &str, rider_id: &str, driver_id: &str) -> NewRating {
        NewRating {
            ride_id: ride_id.to_string(),
            rider_id: rider_id.to_string(),
            driver_id: driver_id.to_string(),
            score: 5,
            comment: None,
            created_at: 100,
        }
    }

    #[test]
    fn create_ride_starts_requested() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");
        assert_eq!(ride.status, RideStatus::Requested);
        assert_eq!(ride.driver_id, None);
        assert_eq!(ride.distance_miles, 6.91);
        assert_eq!(ride.estimated_fare, 12.87);
    }

    #[test]
    fn accept_has_exactly_one_winner() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");

        let won = store.accept_ride(&ride.ride_id, "d_1", 2).expect("accept");
        assert_eq!(won.status, RideStatus::Accepted);
        assert_eq!(won.driver_id.as_deref(), Some("d_1"));
        assert_eq!(won.accepted_at, Some(2));

        let lost = store.accept_ride(&ride.ride_id, "d_2", 3);
        assert!(matches!(lost, Err(StoreError::NoMatch)));
        let unchanged = store.ride(&ride.ride_id).expect("ride");
        assert_eq!(unchanged.driver_id.as_deref(), Some("d_1"));
    }

    #[test]
    fn accept_rejects_cancelled_ride() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");
        store.cancel_ride(&ride.ride_id, "u_1").expect("cancel");
        assert!(matches!(
            store.accept_ride(&ride.ride_id, "d_1", 2),
            Err(StoreError::NoMatch)
        ));
    }

    #[test]
    fn complete_requires_assigned_driver() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");
        store.accept_ride(&ride.ride_id, "d_1", 2).expect("accept");

        let denied = store.complete_ride(&ride.ride_id, "d_2", Some(15.0), 3);
        assert!(matches!(denied, Err(StoreError::NoMatch)));
        assert_eq!(
            store.ride(&ride.ride_id).expect("ride").status,
            RideStatus::Accepted
        );

        let done = store
            .complete_ride(&ride.ride_id, "d_1", Some(15.0), 3)
            .expect("complete");
        assert_eq!(done.status, RideStatus::Completed);
        assert_eq!(done.final_fare, Some(15.0));
        assert_eq!(done.completed_at, Some(3));
    }

    #[test]
    fn complete_without_fare_leaves_it_unset() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");
        store.accept_ride(&ride.ride_id, "d_1", 2).expect("accept");
        let done = store
            .complete_ride(&ride.ride_id, "d_1", None, 3)
            .expect("complete");
        assert_eq!(done.final_fare, None);
    }

    #[test]
    fn complete_allowed_from_started() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");
        store.accept_ride(&ride.ride_id, "d_1", 2).expect("accept");
        store.start_ride(&ride.ride_id, "d_1").expect("start");
        let done = store
            .complete_ride(&ride.ride_id, "d_1", None, 3)
            .expect("complete");
        assert_eq!(done.status, RideStatus::Completed);
    }

    #[test]
    fn start_requires_accepted_status() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");
        assert!(matches!(
            store.start_ride(&ride.ride_id, "d_1"),
            Err(StoreError::NoMatch)
        ));
    }

    #[test]
    fn cancel_actors_and_states() {
        let store = MemoryStore::new();

        let requested = store.create_ride(new_ride("u_1", 1)).expect("create");
        assert!(matches!(
            store.cancel_ride(&requested.ride_id, "d_1"),
            Err(StoreError::NoMatch)
        ));
        store.cancel_ride(&requested.ride_id, "u_1").expect("cancel");

        let accepted = store.create_ride(new_ride("u_1", 2)).expect("create");
        store.accept_ride(&accepted.ride_id, "d_1", 3).expect("accept");
        store.cancel_ride(&accepted.ride_id, "d_1").expect("cancel");

        let started = store.create_ride(new_ride("u_1", 4)).expect("create");
        store.accept_ride(&started.ride_id, "d_1", 5).expect("accept");
        store.start_ride(&started.ride_id, "d_1").expect("start");
        assert!(matches!(
            store.cancel_ride(&started.ride_id, "u_1"),
            Err(StoreError::NoMatch)
        ));
    }

    #[test]
    fn history_is_newest_first_per_role() {
        let store = MemoryStore::new();
        let first = store.create_ride(new_ride("u_1", 10)).expect("create");
        let second = store.create_ride(new_ride("u_1", 20)).expect("create");
        store.accept_ride(&second.ride_id, "d_1", 21).expect("accept");

        let rider_rides = store.rides_for_user("u_1", UserType::Rider).expect("query");
        assert_eq!(rider_rides.len(), 2);
        assert_eq!(rider_rides[0].ride_id, second.ride_id);
        assert_eq!(rider_rides[1].ride_id, first.ride_id);

        let driver_rides = store
            .rides_for_user("d_1", UserType::Driver)
            .expect("query");
        assert_eq!(driver_rides.len(), 1);
        assert_eq!(driver_rides[0].ride_id, second.ride_id);
    }

    #[test]
    fn current_ride_is_most_recent_active() {
        let store = MemoryStore::new();
        let old = store.create_ride(new_ride("u_1", 10)).expect("create");
        store.accept_ride(&old.ride_id, "d_1", 11).expect("accept");
        store
            .complete_ride(&old.ride_id, "d_1", None, 12)
            .expect("complete");
        assert!(store
            .current_ride("u_1", UserType::Rider)
            .expect("query")
            .is_none());

        let current = store.create_ride(new_ride("u_1", 20)).expect("create");
        let found = store
            .current_ride("u_1", UserType::Rider)
            .expect("query")
            .expect("current");
        assert_eq!(found.ride_id, current.ride_id);
    }

    #[test]
    fn available_rides_are_requested_oldest_first() {
        let store = MemoryStore::new();
        let late = store.create_ride(new_ride("u_2", 20)).expect("create");
        let early = store.create_ride(new_ride("u_1", 10)).expect("create");
        let taken = store.create_ride(new_ride("u_3", 5)).expect("create");
        store.accept_ride(&taken.ride_id, "d_1", 6).expect("accept");

        let available = store.available_rides().expect("query");
        assert_eq!(available.len(), 2);
        assert_eq!(available[0].ride_id, early.ride_id);
        assert_eq!(available[1].ride_id, late.ride_id);
    }

    #[test]
    fn active_ride_for_driver_ignores_terminal_rides() {
        let store = MemoryStore::new();
        let done = store.create_ride(new_ride("u_1", 10)).expect("create");
        store.accept_ride(&done.ride_id, "d_1", 11).expect("accept");
        store
            .complete_ride(&done.ride_id, "d_1", None, 12)
            .expect("complete");
        assert!(store
            .active_ride_for_driver("d_1")
            .expect("query")
            .is_none());

        let active = store.create_ride(new_ride("u_2", 20)).expect("create");
        store.accept_ride(&active.ride_id, "d_1", 21).expect("accept");
        let found = store
            .active_ride_for_driver("d_1")
            .expect("query")
            .expect("active");
        assert_eq!(found.ride_id, active.ride_id);
    }

    #[test]
    fn rating_is_unique_per_ride() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");
        store.accept_ride(&ride.ride_id, "d_1", 2).expect("accept");
        store
            .complete_ride(&ride.ride_id, "d_1", None, 3)
            .expect("complete");

        store
            .create_rating(new_rating(&ride.ride_id, "u_1", "d_1"))
            .expect("rate");
        let again = store.create_rating(new_rating(&ride.ride_id, "u_1", "d_1"));
        assert!(matches!(again, Err(StoreError::Duplicate)));
        assert!(store
            .rating_for_ride(&ride.ride_id)
            .expect("query")
            .is_some());
    }

    #[test]
    fn settle_payment_marks_ride_paid() {
        let store = MemoryStore::new();
        let ride = store.create_ride(new_ride("u_1", 1)).expect("create");
        store.accept_ride(&ride.ride_id, "d_1", 2).expect("accept");
        store
            .complete_ride(&ride.ride_id, "d_1", None, 3)
            .expect("complete");

        let denied = store.settle_payment(&ride.ride_id, "u_2", 15.0, PaymentMethod::Cash, None);
        assert!(matches!(denied, Err(StoreError::NoMatch)));

        let paid = store
            .settle_payment(&ride.ride_id, "u_1", 15.0, PaymentMethod::Cash, None)
            .expect("settle");
        assert_eq!(paid.payment_status, PaymentStatus::Completed);
        assert_eq!(paid.final_fare, Some(15.0));
        assert_eq!(paid.payment_method, Some(PaymentMethod::Cash));

        let settled = store.settled_rides_for_rider("u_1").expect("query");
        assert_eq!(settled.len(), 1);
    }

    #[test]
    fn restore_continues_id_sequences() {
        let store = MemoryStore::new();
        store.create_ride(new_ride("u_1", 1)).expect("create");
        let ride = store.create_ride(new_ride("u_1", 2)).expect("create");
        assert_eq!(ride.ride_id, "r_2");

        let restored = MemoryStore::restore(
            store.all_rides().expect("rides"),
            store.all_ratings().expect("ratings"),
            Vec::new(),
        );
        let next = restored.create_ride(new_ride("u_1", 3)).expect("create");
        assert_eq!(next.ride_id, "r_3");
    }
}
