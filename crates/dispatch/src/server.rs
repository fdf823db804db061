use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use curbside_common::config::DispatchConfig;
use curbside_common::ids::{new_connection_id, new_message_id, new_session_id};
use curbside_common::time::now_ms;
use curbside_payments::PaymentProvider;
use curbside_protocol::{
    make_envelope, ClientJoin, Envelope, ServerError, ServerHello, ServerNotice, ServerWelcome,
};
use curbside_store::Store;

use crate::dispatcher::Dispatcher;
use crate::error::OpError;
use crate::payments;
use crate::registry::{Identity, Registry};
use crate::rides;
use crate::storage::Storage;

pub struct DispatchServer {
    config: DispatchConfig,
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    provider: Arc<dyn PaymentProvider>,
    storage: Arc<Storage>,
}

impl DispatchServer {
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn Store>,
        registry: Arc<Registry>,
        provider: Arc<dyn PaymentProvider>,
        storage: Arc<Storage>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        Self {
            config,
            store,
            registry,
            dispatcher,
            provider,
            storage,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("dispatch listening on {}", self.config.bind_addr);
        loop {
            let (stream, addr) = listener.accept().await?;
            let conn_id = new_connection_id();
            tracing::info!("conn {conn_id} accepted from {addr}");
            let store = Arc::clone(&self.store);
            let registry = Arc::clone(&self.registry);
            let dispatcher = self.dispatcher.clone();
            let provider = Arc::clone(&self.provider);
            let storage = Arc::clone(&self.storage);
            let currency = self.config.currency.clone();
            tokio::spawn(async move {
                let result = handle_connection(
                    stream, store, registry, dispatcher, provider, storage, currency,
                    conn_id.clone(),
                )
                .await;
                if let Err(err) = result {
                    tracing::error!("conn {conn_id} error: {err}");
                }
            });
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_connection(
    stream: tokio::net::TcpStream,
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    provider: Arc<dyn PaymentProvider>,
    storage: Arc<Storage>,
    currency: String,
    conn_id: String,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_write.send(msg).await.is_err() {
                break;
            }
        }
    });

    let hello = ServerHello {
        server_version: "0.1".to_string(),
        currency: currency.clone(),
    };
    send_envelope(&tx, "server.hello", &hello)?;

    let mut joined: Option<Identity> = None;

    while let Some(msg) = ws_read.next().await {
        let msg = msg?;
        if !msg.is_text() {
            continue;
        }
        let env: Envelope = serde_json::from_str(msg.to_text()?)?;

        if joined.is_none() {
            if env.message_type != "client.join" {
                send_error(&tx, "join_required", "expected client.join")?;
                tracing::warn!("conn {conn_id} rejected: expected client.join");
                break;
            }
            // Identity is verified upstream; the join payload carries the
            // already-resolved (user, role) pair.
            let join: ClientJoin = serde_json::from_value(env.payload)?;
            let identity = Identity {
                user_id: join.user_id,
                user_type: join.user_type,
            };
            registry.join(&conn_id, identity.clone(), tx.clone()).await;
            let welcome = ServerWelcome {
                session_id: new_session_id(),
                user_id: identity.user_id.clone(),
                user_type: identity.user_type,
            };
            send_envelope(&tx, "server.welcome", &welcome)?;
            tracing::info!(
                "conn {conn_id} joined as {} {}",
                identity.user_type,
                identity.user_id
            );
            joined = Some(identity);
            continue;
        }

        let identity = joined.as_ref().expect("identity set");
        let message_type = env.message_type.clone();
        let result =
            dispatch_message(env, identity, &store, &dispatcher, &provider, &currency, &tx).await;
        match &result {
            Ok(()) => {
                if mutates_state(&message_type) {
                    persist_snapshot(&storage, &store).await;
                }
            }
            Err(err) => {
                if let OpError::Upstream(detail) = err {
                    tracing::error!("conn {conn_id} {message_type}: {detail}");
                }
                send_error(&tx, err.code(), &err.public_message())?;
            }
        }
    }

    if let Some(identity) = joined {
        registry.disconnect(&conn_id).await;
        persist_snapshot(&storage, &store).await;
        tracing::info!("{} {} disconnected", identity.user_type, identity.user_id);
    } else {
        tracing::info!("conn {conn_id} closed before join");
    }

    writer.abort();
    Ok(())
}

async fn dispatch_message(
    env: Envelope,
    identity: &Identity,
    store: &Arc<dyn Store>,
    dispatcher: &Dispatcher,
    provider: &Arc<dyn PaymentProvider>,
    currency: &str,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), OpError> {
    match env.message_type.as_str() {
        "client.request_ride" => {
            let payload = parse(env.payload)?;
            rides::handle_request_ride(payload, identity, store, dispatcher, tx).await
        }
        "client.accept_ride" => {
            let payload = parse(env.payload)?;
            rides::handle_accept_ride(payload, identity, store, dispatcher, tx).await
        }
        "client.start_ride" => {
            let payload = parse(env.payload)?;
            rides::handle_start_ride(payload, identity, store, dispatcher, tx).await
        }
        "client.complete_ride" => {
            let payload = parse(env.payload)?;
            rides::handle_complete_ride(payload, identity, store, dispatcher, tx).await
        }
        "client.cancel_ride" => {
            let payload = parse(env.payload)?;
            rides::handle_cancel_ride(payload, identity, store, dispatcher, tx).await
        }
        "client.location" => {
            let payload = parse(env.payload)?;
            rides::handle_location(payload, identity, store, dispatcher).await
        }
        "client.rate" => {
            let payload = parse(env.payload)?;
            rides::handle_rate(payload, identity, store, tx).await
        }
        "client.history" => rides::handle_history(identity, store, tx).await,
        "client.current_ride" => rides::handle_current_ride(identity, store, tx).await,
        "client.available_rides" => rides::handle_available_rides(identity, store, tx).await,
        "client.stats" => rides::handle_stats(identity, store, tx).await,
        "client.profile" => rides::handle_profile(identity, store, tx).await,
        "client.payment_intent" => {
            let payload = parse(env.payload)?;
            payments::handle_payment_intent(payload, identity, store, provider, currency, tx).await
        }
        "client.payment_confirm" => {
            let payload = parse(env.payload)?;
            payments::handle_payment_confirm(payload, identity, store, provider, dispatcher, tx)
                .await
        }
        "client.payment_history" => payments::handle_payment_history(identity, store, tx).await,
        "client.heartbeat" => {
            send_notice(tx, "pong").map_err(OpError::from)
        }
        other => {
            tracing::warn!("unknown message type {other}");
            send_error(tx, "invalid_message", "unknown message type").map_err(OpError::from)
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: serde_json::Value) -> Result<T, OpError> {
    serde_json::from_value(payload).map_err(|err| {
        tracing::debug!("malformed payload: {err}");
        OpError::Precondition("malformed payload")
    })
}

fn mutates_state(message_type: &str) -> bool {
    matches!(
        message_type,
        "client.request_ride"
            | "client.accept_ride"
            | "client.start_ride"
            | "client.complete_ride"
            | "client.cancel_ride"
            | "client.rate"
            | "client.payment_intent"
            | "client.payment_confirm"
    )
}

async fn persist_snapshot(storage: &Arc<Storage>, store: &Arc<dyn Store>) {
    let rides = match store.all_rides() {
        Ok(rides) => rides,
        Err(err) => {
            tracing::warn!("snapshot skipped: {err}");
            return;
        }
    };
    let ratings = match store.all_ratings() {
        Ok(ratings) => ratings,
        Err(err) => {
            tracing::warn!("snapshot skipped: {err}");
            return;
        }
    };
    if let Err(err) = storage.save_rides_async(rides).await {
        tracing::warn!("failed to save rides: {err}");
    }
    if let Err(err) = storage.save_ratings_async(ratings).await {
        tracing::warn!("failed to save ratings: {err}");
    }
}

pub fn send_envelope<T: serde::Serialize>(
    tx: &mpsc::UnboundedSender<Message>,
    message_type: &str,
    payload: &T,
) -> anyhow::Result<()> {
    let env = make_envelope(message_type, &new_message_id(), now_ms(), payload)?;
    let text = serde_json::to_string(&env)?;
    tx.send(Message::Text(text))?;
    Ok(())
}

pub fn send_error(
    tx: &mpsc::UnboundedSender<Message>,
    code: &str,
    message: &str,
) -> anyhow::Result<()> {
    let payload = ServerError {
        code: code.to_string(),
        message: message.to_string(),
    };
    send_envelope(tx, "server.error", &payload)
}

pub fn send_notice(tx: &mpsc::UnboundedSender<Message>, text: &str) -> anyhow::Result<()> {
    let payload = ServerNotice {
        text: text.to_string(),
    };
    send_envelope(tx, "server.notice", &payload)
}
