use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use curbside_common::time::now_ms;
use curbside_geo::{distance_miles, estimate_fare};
use curbside_protocol::{
    ClientLocation, ClientRate, ClientRideAccept, ClientRideCancel, ClientRideComplete,
    ClientRideRequest, ClientRideStart, HistoryRide, NewRideRequest, RatingInfo, RideDetail,
    RideInfo, RideStatus, ServerAvailableRides, ServerCurrentRide, ServerDriverLocation,
    ServerDriverStats, ServerProfile, ServerRating, ServerRideAccepted, ServerRideCancelled,
    ServerRideCompleted, ServerRideHistory, ServerRideStarted, ServerRideTaken, UserInfo,
    UserType,
};
use curbside_store::{NewRating, NewRide, RideRecord, Store, StoreError};

use crate::dispatcher::Dispatcher;
use crate::error::OpError;
use crate::registry::{Channel, Identity};
use crate::server::send_envelope;

pub async fn handle_request_ride(
    payload: ClientRideRequest,
    identity: &Identity,
    store: &Arc<dyn Store>,
    dispatcher: &Dispatcher,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Rider {
        return Err(OpError::NotAuthorized("only riders can request rides"));
    }

    let distance = distance_miles(payload.pickup, payload.dropoff);
    let estimated_fare = estimate_fare(distance, payload.ride_type);
    let ride = store.create_ride(NewRide {
        rider_id: identity.user_id.clone(),
        pickup_address: payload.pickup_address,
        dropoff_address: payload.dropoff_address,
        pickup: payload.pickup,
        dropoff: payload.dropoff,
        ride_type: payload.ride_type,
        distance_miles: distance,
        estimated_fare,
        created_at: now_ms(),
    })?;
    tracing::info!("rider {} requested ride {}", ride.rider_id, ride.ride_id);

    let request = NewRideRequest {
        ride_id: ride.ride_id.clone(),
        rider_id: ride.rider_id.clone(),
        pickup_address: ride.pickup_address.clone(),
        dropoff_address: ride.dropoff_address.clone(),
        pickup: ride.pickup,
        dropoff: ride.dropoff,
        estimated_fare: ride.estimated_fare,
        distance_miles: ride.distance_miles,
        ride_type: ride.ride_type,
    };
    dispatcher
        .publish(&Channel::DriverPool, "server.new_ride_request", &request)
        .await;

    send_envelope(tx, "server.ride_detail", &detail(store, &ride, identity.user_type)?)?;
    Ok(())
}

pub async fn handle_accept_ride(
    payload: ClientRideAccept,
    identity: &Identity,
    store: &Arc<dyn Store>,
    dispatcher: &Dispatcher,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Driver {
        return Err(OpError::NotAuthorized("only drivers can accept rides"));
    }

    let ride = store
        .accept_ride(&payload.ride_id, &identity.user_id, now_ms())
        .map_err(|err| match err {
            StoreError::NoMatch => {
                OpError::Precondition("ride not available or already accepted")
            }
            other => other.into(),
        })?;
    tracing::info!("driver {} accepted ride {}", identity.user_id, ride.ride_id);

    let driver = store.user(&identity.user_id)?.as_ref().map(UserInfo::from);
    let accepted = ServerRideAccepted {
        ride_id: ride.ride_id.clone(),
        driver,
        status: RideStatus::Accepted,
        message: "Driver is on the way!".to_string(),
    };
    dispatcher
        .publish(
            &Channel::Rider(ride.rider_id.clone()),
            "server.ride_accepted",
            &accepted,
        )
        .await;
    let taken = ServerRideTaken {
        ride_id: ride.ride_id.clone(),
    };
    dispatcher
        .publish(&Channel::DriverPool, "server.ride_taken", &taken)
        .await;

    send_envelope(tx, "server.ride_detail", &detail(store, &ride, identity.user_type)?)?;
    Ok(())
}

pub async fn handle_start_ride(
    payload: ClientRideStart,
    identity: &Identity,
    store: &Arc<dyn Store>,
    dispatcher: &Dispatcher,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Driver {
        return Err(OpError::NotAuthorized("only drivers can start rides"));
    }

    let ride = store
        .start_ride(&payload.ride_id, &identity.user_id)
        .map_err(|err| match err {
            StoreError::NoMatch => {
                OpError::Precondition("ride cannot be started by this driver")
            }
            other => other.into(),
        })?;
    tracing::info!("driver {} started ride {}", identity.user_id, ride.ride_id);

    let started = ServerRideStarted {
        ride_id: ride.ride_id.clone(),
        status: RideStatus::Started,
    };
    dispatcher
        .publish(
            &Channel::Rider(ride.rider_id.clone()),
            "server.ride_started",
            &started,
        )
        .await;

    send_envelope(tx, "server.ride_detail", &detail(store, &ride, identity.user_type)?)?;
    Ok(())
}

pub async fn handle_complete_ride(
    payload: ClientRideComplete,
    identity: &Identity,
    store: &Arc<dyn Store>,
    dispatcher: &Dispatcher,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Driver {
        return Err(OpError::NotAuthorized("only drivers can complete rides"));
    }

    let ride = store
        .complete_ride(
            &payload.ride_id,
            &identity.user_id,
            payload.final_fare,
            now_ms(),
        )
        .map_err(|err| match err {
            StoreError::NoMatch => {
                OpError::Precondition("ride cannot be completed by this driver")
            }
            other => other.into(),
        })?;
    tracing::info!("driver {} completed ride {}", identity.user_id, ride.ride_id);

    let completed = ServerRideCompleted {
        ride_id: ride.ride_id.clone(),
        final_fare: ride.final_fare,
        status: RideStatus::Completed,
    };
    dispatcher
        .publish(
            &Channel::Rider(ride.rider_id.clone()),
            "server.ride_completed",
            &completed,
        )
        .await;

    send_envelope(tx, "server.ride_detail", &detail(store, &ride, identity.user_type)?)?;
    Ok(())
}

pub async fn handle_cancel_ride(
    payload: ClientRideCancel,
    identity: &Identity,
    store: &Arc<dyn Store>,
    dispatcher: &Dispatcher,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    let ride = store
        .cancel_ride(&payload.ride_id, &identity.user_id)
        .map_err(|err| match err {
            StoreError::NoMatch => OpError::Precondition("ride can no longer be cancelled"),
            other => other.into(),
        })?;
    tracing::info!(
        "{} {} cancelled ride {}",
        identity.user_type,
        identity.user_id,
        ride.ride_id
    );

    let cancelled = ServerRideCancelled {
        ride_id: ride.ride_id.clone(),
        status: RideStatus::Cancelled,
        cancelled_by: identity.user_type,
    };
    match identity.user_type {
        UserType::Rider => match &ride.driver_id {
            Some(driver_id) => {
                dispatcher
                    .publish(
                        &Channel::Driver(driver_id.clone()),
                        "server.ride_cancelled",
                        &cancelled,
                    )
                    .await;
            }
            None => {
                // Never assigned: drop it from pending driver lists instead.
                let taken = ServerRideTaken {
                    ride_id: ride.ride_id.clone(),
                };
                dispatcher
                    .publish(&Channel::DriverPool, "server.ride_taken", &taken)
                    .await;
            }
        },
        UserType::Driver => {
            dispatcher
                .publish(
                    &Channel::Rider(ride.rider_id.clone()),
                    "server.ride_cancelled",
                    &cancelled,
                )
                .await;
        }
    }

    send_envelope(tx, "server.ride_detail", &detail(store, &ride, identity.user_type)?)?;
    Ok(())
}

pub async fn handle_location(
    payload: ClientLocation,
    identity: &Identity,
    store: &Arc<dyn Store>,
    dispatcher: &Dispatcher,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Driver {
        return Err(OpError::NotAuthorized("only drivers send location updates"));
    }

    // Location reaches the participants of the driver's active ride, nobody else.
    let Some(ride) = store.active_ride_for_driver(&identity.user_id)? else {
        tracing::debug!("driver {} has no active ride, location dropped", identity.user_id);
        return Ok(());
    };

    let update = ServerDriverLocation {
        driver_id: identity.user_id.clone(),
        ride_id: ride.ride_id.clone(),
        lat: payload.lat,
        lng: payload.lng,
        heading: payload.heading,
    };
    dispatcher
        .publish(
            &Channel::Rider(ride.rider_id.clone()),
            "server.driver_location",
            &update,
        )
        .await;
    dispatcher
        .publish(
            &Channel::Driver(identity.user_id.clone()),
            "server.driver_location",
            &update,
        )
        .await;
    Ok(())
}

pub async fn handle_rate(
    payload: ClientRate,
    identity: &Identity,
    store: &Arc<dyn Store>,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Rider {
        return Err(OpError::NotAuthorized("only riders can rate drivers"));
    }
    if !(1..=5).contains(&payload.score) {
        return Err(OpError::Precondition("score must be between 1 and 5"));
    }

    let ride = store.ride(&payload.ride_id)?;
    if ride.rider_id != identity.user_id {
        return Err(OpError::NotFound("ride not found"));
    }
    if ride.status != RideStatus::Completed {
        return Err(OpError::Precondition("ride is not completed"));
    }
    let Some(driver_id) = ride.driver_id.clone() else {
        return Err(OpError::Precondition("ride has no driver"));
    };

    let rating = store
        .create_rating(NewRating {
            ride_id: ride.ride_id.clone(),
            rider_id: identity.user_id.clone(),
            driver_id,
            score: payload.score,
            comment: payload.comment,
            created_at: now_ms(),
        })
        .map_err(|err| match err {
            StoreError::Duplicate => OpError::Duplicate("ride already rated"),
            other => other.into(),
        })?;

    let reply = ServerRating {
        ride_id: rating.ride_id.clone(),
        rating: RatingInfo {
            score: rating.score,
            comment: rating.comment.clone(),
        },
    };
    send_envelope(tx, "server.rating", &reply)?;
    Ok(())
}

pub async fn handle_history(
    identity: &Identity,
    store: &Arc<dyn Store>,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    let rides = store.rides_for_user(&identity.user_id, identity.user_type)?;
    let mut entries = Vec::with_capacity(rides.len());
    for ride in &rides {
        let with_counterpart = detail(store, ride, identity.user_type)?;
        let rating = store.rating_for_ride(&ride.ride_id)?.map(|r| RatingInfo {
            score: r.score,
            comment: r.comment,
        });
        entries.push(HistoryRide {
            ride: with_counterpart.ride,
            counterpart: with_counterpart.counterpart,
            rating,
        });
    }
    send_envelope(tx, "server.ride_history", &ServerRideHistory { rides: entries })?;
    Ok(())
}

pub async fn handle_current_ride(
    identity: &Identity,
    store: &Arc<dyn Store>,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    let current = store.current_ride(&identity.user_id, identity.user_type)?;
    let ride = match &current {
        Some(record) => Some(detail(store, record, identity.user_type)?),
        None => None,
    };
    send_envelope(tx, "server.current_ride", &ServerCurrentRide { ride })?;
    Ok(())
}

pub async fn handle_available_rides(
    identity: &Identity,
    store: &Arc<dyn Store>,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Driver {
        return Err(OpError::NotAuthorized("only drivers can list open requests"));
    }

    let rides = store.available_rides()?;
    let mut entries = Vec::with_capacity(rides.len());
    for ride in &rides {
        entries.push(detail(store, ride, identity.user_type)?);
    }
    send_envelope(
        tx,
        "server.available_rides",
        &ServerAvailableRides { rides: entries },
    )?;
    Ok(())
}

pub async fn handle_stats(
    identity: &Identity,
    store: &Arc<dyn Store>,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Driver {
        return Err(OpError::NotAuthorized("only drivers have dispatch stats"));
    }

    let rides = store.rides_for_user(&identity.user_id, identity.user_type)?;
    let completed: Vec<&RideRecord> = rides
        .iter()
        .filter(|ride| ride.status == RideStatus::Completed)
        .collect();
    let total_earnings = completed
        .iter()
        .map(|ride| ride.final_fare.unwrap_or(0.0))
        .sum();

    let ratings = store.ratings_for_driver(&identity.user_id)?;
    let average_rating = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().map(|r| f64::from(r.score)).sum::<f64>() / ratings.len() as f64
    };

    let stats = ServerDriverStats {
        completed_rides: completed.len() as u64,
        total_earnings,
        average_rating,
        total_ratings: ratings.len() as u64,
    };
    send_envelope(tx, "server.driver_stats", &stats)?;
    Ok(())
}

pub async fn handle_profile(
    identity: &Identity,
    store: &Arc<dyn Store>,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    let Some(profile) = store.user(&identity.user_id)? else {
        return Err(OpError::NotFound("user not found"));
    };
    let reply = ServerProfile {
        user: UserInfo::from(&profile),
        user_type: profile.user_type,
    };
    send_envelope(tx, "server.profile", &reply)?;
    Ok(())
}

fn detail(
    store: &Arc<dyn Store>,
    ride: &RideRecord,
    viewer: UserType,
) -> Result<RideDetail, OpError> {
    let counterpart_id = match viewer {
        UserType::Rider => ride.driver_id.clone(),
        UserType::Driver => Some(ride.rider_id.clone()),
    };
    let counterpart = match counterpart_id {
        Some(user_id) => store.user(&user_id)?.as_ref().map(UserInfo::from),
        None => None,
    };
    Ok(RideDetail {
        ride: RideInfo::from(ride),
        counterpart,
    })
}
