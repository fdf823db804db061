use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;

use curbside_protocol::UserType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    DriverPool,
    Rider(String),
    Driver(String),
}

impl Channel {
    fn contains(&self, identity: &Identity) -> bool {
        match self {
            Channel::DriverPool => identity.user_type == UserType::Driver,
            Channel::Rider(user_id) => {
                identity.user_type == UserType::Rider && identity.user_id == *user_id
            }
            Channel::Driver(user_id) => {
                identity.user_type == UserType::Driver && identity.user_id == *user_id
            }
        }
    }
}

struct ConnectionEntry {
    identity: Identity,
    tx: mpsc::UnboundedSender<Message>,
}

// Channel membership is derived from live registrations, never stored:
// a registration is the entire join.
#[derive(Default)]
pub struct Registry {
    connections: RwLock<HashMap<String, ConnectionEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(
        &self,
        conn_id: &str,
        identity: Identity,
        tx: mpsc::UnboundedSender<Message>,
    ) {
        self.connections
            .write()
            .await
            .insert(conn_id.to_string(), ConnectionEntry { identity, tx });
    }

    pub async fn disconnect(&self, conn_id: &str) -> Option<Identity> {
        self.connections
            .write()
            .await
            .remove(conn_id)
            .map(|entry| entry.identity)
    }

    pub async fn members(&self, channel: &Channel) -> Vec<mpsc::UnboundedSender<Message>> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|entry| channel.contains(&entry.identity))
            .map(|entry| entry.tx.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rider(user_id: &str) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            user_type: UserType::Rider,
        }
    }

    fn driver(user_id: &str) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            user_type: UserType::Driver,
        }
    }

    async fn connect(registry: &Registry, conn_id: &str, identity: Identity) {
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.join(conn_id, identity, tx).await;
    }

    #[tokio::test]
    async fn driver_pool_holds_every_driver_connection() {
        let registry = Registry::new();
        connect(&registry, "c1", driver("d_1")).await;
        connect(&registry, "c2", driver("d_2")).await;
        connect(&registry, "c3", rider("u_1")).await;

        assert_eq!(registry.members(&Channel::DriverPool).await.len(), 2);
    }

    #[tokio::test]
    async fn private_channels_match_exact_identity() {
        let registry = Registry::new();
        connect(&registry, "c1", rider("u_1")).await;
        connect(&registry, "c2", rider("u_2")).await;
        connect(&registry, "c3", driver("u_1")).await;

        let rider_channel = registry.members(&Channel::Rider("u_1".to_string())).await;
        assert_eq!(rider_channel.len(), 1);

        let driver_channel = registry.members(&Channel::Driver("u_1".to_string())).await;
        assert_eq!(driver_channel.len(), 1);
    }

    #[tokio::test]
    async fn multiple_devices_hold_independent_memberships() {
        let registry = Registry::new();
        connect(&registry, "phone", rider("u_1")).await;
        connect(&registry, "tablet", rider("u_1")).await;

        let channel = Channel::Rider("u_1".to_string());
        assert_eq!(registry.members(&channel).await.len(), 2);

        registry.disconnect("phone").await;
        assert_eq!(registry.members(&channel).await.len(), 1);
    }

    #[tokio::test]
    async fn disconnect_then_rejoin_restores_pool_membership() {
        let registry = Registry::new();
        connect(&registry, "c1", driver("d_1")).await;
        assert_eq!(registry.members(&Channel::DriverPool).await.len(), 1);

        let identity = registry.disconnect("c1").await.expect("registered");
        assert_eq!(identity.user_id, "d_1");
        assert_eq!(registry.members(&Channel::DriverPool).await.len(), 0);

        connect(&registry, "c2", driver("d_1")).await;
        assert_eq!(registry.members(&Channel::DriverPool).await.len(), 1);
    }
}
