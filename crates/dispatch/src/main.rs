use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use curbside_common::config::{load_config, DispatchConfig};
use curbside_payments::mock::MockProvider;
use curbside_payments::PaymentProvider;
use curbside_store::memory::MemoryStore;
use curbside_store::Store;

use crate::registry::Registry;
use crate::server::DispatchServer;
use crate::storage::Storage;

mod dispatcher;
mod error;
mod payments;
mod registry;
mod rides;
mod server;
mod storage;
#[cfg(test)]
mod testutil;

#[derive(Parser, Debug)]
#[command(name = "curbside-dispatch")]
struct Args {
    #[arg(long, default_value = "config/dispatch.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config: DispatchConfig = load_config(&args.config)?;
    let storage = Storage::new(&config.data_dir)?;
    let users = storage.load_users()?;
    let rides = storage.load_rides()?;
    let ratings = storage.load_ratings()?;
    let store: Arc<dyn Store> = Arc::new(MemoryStore::restore(rides, ratings, users));
    let registry = Arc::new(Registry::new());
    let provider: Arc<dyn PaymentProvider> = Arc::new(MockProvider::new());

    let server = DispatchServer::new(config, store, registry, provider, Arc::new(storage));
    server.run().await
}
