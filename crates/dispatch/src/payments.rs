use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use curbside_payments::{IntentStatus, PaymentProvider};
use curbside_protocol::{
    ClientPaymentConfirm, ClientPaymentIntent, PaymentMethod, RideInfo, RideStatus,
    ServerPaymentCompleted, ServerPaymentHistory, ServerPaymentIntent, UserType,
};
use curbside_store::{Store, StoreError};

use crate::dispatcher::Dispatcher;
use crate::error::OpError;
use crate::registry::{Channel, Identity};
use crate::server::send_envelope;

pub async fn handle_payment_intent(
    payload: ClientPaymentIntent,
    identity: &Identity,
    store: &Arc<dyn Store>,
    provider: &Arc<dyn PaymentProvider>,
    currency: &str,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Rider {
        return Err(OpError::NotAuthorized("only riders pay for rides"));
    }

    let ride = store.ride(&payload.ride_id)?;
    if ride.rider_id != identity.user_id || ride.status != RideStatus::Completed {
        return Err(OpError::NotFound("ride not found or not completed"));
    }

    let intent = provider
        .create_intent(payload.amount, currency, &ride.ride_id, &identity.user_id)
        .map_err(|err| {
            tracing::error!("create intent failed for ride {}: {err}", ride.ride_id);
            OpError::Upstream(err.to_string())
        })?;
    store
        .record_payment_intent(&ride.ride_id, &identity.user_id, &intent.intent_id)
        .map_err(|err| match err {
            StoreError::NoMatch => OpError::Precondition("ride is no longer payable"),
            other => other.into(),
        })?;

    let reply = ServerPaymentIntent {
        ride_id: ride.ride_id.clone(),
        payment_intent_id: intent.intent_id,
        client_secret: intent.client_secret,
    };
    send_envelope(tx, "server.payment_intent", &reply)?;
    Ok(())
}

pub async fn handle_payment_confirm(
    payload: ClientPaymentConfirm,
    identity: &Identity,
    store: &Arc<dyn Store>,
    provider: &Arc<dyn PaymentProvider>,
    dispatcher: &Dispatcher,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Rider {
        return Err(OpError::NotAuthorized("only riders pay for rides"));
    }

    // Cash and QR settle unconditionally; card goes back to the provider.
    let (successful, final_amount) = match payload.payment_method {
        PaymentMethod::Cash | PaymentMethod::Qr => (true, payload.amount),
        PaymentMethod::Card => {
            let Some(intent_id) = payload.payment_intent_id.as_deref() else {
                return Err(OpError::Precondition(
                    "card payments require a payment intent",
                ));
            };
            let state = provider.retrieve_intent(intent_id).map_err(|err| {
                tracing::error!("retrieve intent {intent_id} failed: {err}");
                OpError::Upstream(err.to_string())
            })?;
            (state.status == IntentStatus::Succeeded, state.amount)
        }
    };
    if !successful {
        return Err(OpError::Precondition("payment not successful"));
    }

    let ride = store.settle_payment(
        &payload.ride_id,
        &identity.user_id,
        final_amount,
        payload.payment_method,
        payload.payment_intent_id.clone(),
    )?;
    tracing::info!("ride {} paid by {}", ride.ride_id, identity.user_id);

    let completed = ServerPaymentCompleted {
        ride_id: ride.ride_id.clone(),
        final_fare: final_amount,
    };
    dispatcher
        .publish(
            &Channel::Rider(ride.rider_id.clone()),
            "server.payment_completed",
            &completed,
        )
        .await;

    send_envelope(tx, "server.payment_completed", &completed)?;
    Ok(())
}

pub async fn handle_payment_history(
    identity: &Identity,
    store: &Arc<dyn Store>,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    if identity.user_type != UserType::Rider {
        return Err(OpError::NotAuthorized("only riders have payment history"));
    }

    let rides = store.settled_rides_for_rider(&identity.user_id)?;
    let payments = rides.iter().map(RideInfo::from).collect();
    send_envelope(tx, "server.payment_history", &ServerPaymentHistory { payments })?;
    Ok(())
}
