use super::client::ApiConnection;
use super::error::RouterError;
use super::protocol::Record;
use crate::comment::has_content;
use crate::config::{NetworkConfig, RouterConfig};
use crate::models::{InterfaceCounters, Lease, RouterIdentity, SimpleQueue};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

pub const LEASE_PATH: &str = "/ip/dhcp-server/lease";
pub const QUEUE_PATH: &str = "/queue/simple";
pub const INTERFACE_PATH: &str = "/interface";
pub const RESOURCE_PATH: &str = "/system/resource";

/// Access to one router's management API.
///
/// Implementations are used by one task at a time and process requests in
/// order; a session is never shared between concurrent requests.
#[async_trait]
pub trait RouterSession: Send {
    /// Configured router id.
    fn router_id(&self) -> &str;

    fn host(&self) -> &str;

    async fn connect(&mut self) -> Result<(), RouterError>;

    /// Close the connection. Safe to call when not connected.
    async fn disconnect(&mut self);

    async fn identity(&mut self) -> Result<RouterIdentity, RouterError>;

    /// Every DHCP lease, with or without comment.
    async fn list_leases(&mut self) -> Result<Vec<Lease>, RouterError>;

    async fn list_queues(&mut self) -> Result<Vec<SimpleQueue>, RouterError>;

    async fn list_interfaces(&mut self) -> Result<Vec<InterfaceCounters>, RouterError>;

    async fn set_lease_comment(&mut self, lease_id: &str, comment: &str) -> Result<(), RouterError>;

    /// Leases whose comment is not blank.
    async fn list_leases_with_comment(&mut self) -> Result<Vec<Lease>, RouterError> {
        Ok(self
            .list_leases()
            .await?
            .into_iter()
            .filter(|lease| has_content(&lease.comment))
            .collect())
    }

    /// The API has no address-keyed update, so the lease id is looked up first.
    async fn set_lease_comment_by_address(&mut self, address: &str, comment: &str) -> Result<(), RouterError> {
        let leases = self.list_leases().await?;
        let lease = leases
            .iter()
            .find(|lease| lease.address == address)
            .ok_or_else(|| RouterError::LeaseNotFound(address.to_string()))?;
        if lease.id.is_empty() {
            return Err(RouterError::MissingLeaseId);
        }
        let lease_id = lease.id.clone();
        self.set_lease_comment(&lease_id, comment).await
    }
}

/// [`RouterSession`] over a RouterOS API TCP connection.
pub struct MikrotikSession {
    router: RouterConfig,
    connect_timeout: Duration,
    io_timeout: Duration,
    connection: Option<ApiConnection<TcpStream>>,
}

impl MikrotikSession {
    pub fn new(router: RouterConfig, network: &NetworkConfig) -> Self {
        Self {
            router,
            connect_timeout: Duration::from_secs(network.connect_timeout_secs),
            io_timeout: Duration::from_secs(network.io_timeout_secs),
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn connection(&mut self) -> Result<&mut ApiConnection<TcpStream>, RouterError> {
        self.connection.as_mut().ok_or(RouterError::NotConnected)
    }

    /// Drop the connection when `result` left it out of step with the router.
    /// Later requests then fail with [`RouterError::NotConnected`].
    fn settle<T>(&mut self, result: Result<T, RouterError>) -> Result<T, RouterError> {
        if let Err(e) = &result {
            if e.breaks_connection() && self.connection.take().is_some() {
                warn!(router = %self.router.id, error = %e, "Dropping router connection");
            }
        }
        result
    }
}

#[async_trait]
impl RouterSession for MikrotikSession {
    fn router_id(&self) -> &str {
        &self.router.id
    }

    fn host(&self) -> &str {
        &self.router.host
    }

    async fn connect(&mut self) -> Result<(), RouterError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let mut connection = ApiConnection::open(
            &self.router.host,
            self.router.port,
            self.connect_timeout,
            self.io_timeout,
        )
        .await?;
        connection
            .login(&self.router.username, &self.router.password)
            .await?;

        info!(router = %self.router.id, host = %self.router.host, "Connected to router");
        self.connection = Some(connection);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!(router = %self.router.id, "Disconnected from router");
        }
    }

    async fn identity(&mut self) -> Result<RouterIdentity, RouterError> {
        let result = self.connection()?.print(RESOURCE_PATH, &[]).await;
        let record = self.settle(result)?.into_iter().next().unwrap_or_default();
        Ok(RouterIdentity {
            board_name: field(&record, "board-name"),
            version: field(&record, "version"),
            uptime: field(&record, "uptime"),
        })
    }

    async fn list_leases(&mut self) -> Result<Vec<Lease>, RouterError> {
        let result = self.connection()?.print(LEASE_PATH, &[]).await;
        let records = self.settle(result)?;
        Ok(records.iter().map(lease_from_record).collect())
    }

    async fn list_queues(&mut self) -> Result<Vec<SimpleQueue>, RouterError> {
        let result = self.connection()?.print(QUEUE_PATH, &[("stats", "")]).await;
        let records = self.settle(result)?;
        Ok(records.iter().map(queue_from_record).collect())
    }

    async fn list_interfaces(&mut self) -> Result<Vec<InterfaceCounters>, RouterError> {
        let result = self.connection()?.print(INTERFACE_PATH, &[]).await;
        let records = self.settle(result)?;
        Ok(records.iter().filter_map(|r| interface_from_record(r, &self.router.id)).collect())
    }

    async fn set_lease_comment(&mut self, lease_id: &str, comment: &str) -> Result<(), RouterError> {
        if lease_id.is_empty() {
            return Err(RouterError::MissingLeaseId);
        }
        let result = self
            .connection()?
            .call(LEASE_PATH, "set", &[(".id", lease_id), ("comment", comment)])
            .await;
        self.settle(result)?;
        debug!(router = %self.router.id, lease = lease_id, "Lease comment updated");
        Ok(())
    }
}

fn field(record: &Record, key: &str) -> String {
    record.get(key).cloned().unwrap_or_default()
}

pub(crate) fn lease_from_record(record: &Record) -> Lease {
    Lease::new(field(record, ".id"), field(record, "address"), field(record, "comment"))
}

pub(crate) fn queue_from_record(record: &Record) -> SimpleQueue {
    let target = record
        .get("target")
        .filter(|t| !t.is_empty())
        .or_else(|| record.get("dst"))
        .cloned()
        .unwrap_or_default();
    SimpleQueue {
        name: field(record, "name"),
        target,
        bytes: field(record, "bytes"),
    }
}

pub(crate) fn interface_from_record(record: &Record, router_id: &str) -> Option<InterfaceCounters> {
    let name = field(record, "name");
    if name.is_empty() {
        return None;
    }
    let counter = |key: &str| -> u64 {
        match record.get(key) {
            None => 0,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(router = router_id, interface = %name, key, value = %raw, "Ignoring non-numeric counter");
                0
            }),
        }
    };
    Some(InterfaceCounters {
        rx_byte: counter("rx-byte"),
        tx_byte: counter("tx-byte"),
        name,
    })
}
