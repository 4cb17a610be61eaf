//! Shared fixtures: a scripted in-memory router session.

#![allow(dead_code)]

use async_trait::async_trait;
use mikrotik_billing::models::{InterfaceCounters, Lease, RouterIdentity, SimpleQueue};
use mikrotik_billing::router::{RouterError, RouterSession};
use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};

/// Calls observed by a [`FakeSession`], shared with the test after the session
/// has been boxed into an engine.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub connects: usize,
    pub disconnects: usize,
    pub writes: Vec<(String, String)>,
}

pub type SharedLog = Arc<Mutex<SessionLog>>;

/// Router state served from memory.
pub struct FakeSession {
    pub id: String,
    pub host: String,
    pub leases: Vec<Lease>,
    pub queues: Vec<SimpleQueue>,
    pub interfaces: Vec<InterfaceCounters>,
    pub unreachable: bool,
    pub queues_fail: bool,
    /// Lease ids whose comment write is refused.
    pub failing_writes: HashSet<String>,
    pub log: SharedLog,
    connected: bool,
}

impl FakeSession {
    pub fn new(id: &str, host: &str) -> Self {
        Self {
            id: id.to_string(),
            host: host.to_string(),
            leases: Vec::new(),
            queues: Vec::new(),
            interfaces: Vec::new(),
            unreachable: false,
            queues_fail: false,
            failing_writes: HashSet::new(),
            log: SharedLog::default(),
            connected: false,
        }
    }

    pub fn lease(mut self, id: &str, address: &str, comment: &str) -> Self {
        self.leases.push(Lease::new(id, address, comment));
        self
    }

    pub fn queue(mut self, target: &str, bytes: &str) -> Self {
        self.queues.push(SimpleQueue {
            name: format!("queue-{}", target),
            target: target.to_string(),
            bytes: bytes.to_string(),
        });
        self
    }

    pub fn interface(mut self, name: &str, rx_byte: u64, tx_byte: u64) -> Self {
        self.interfaces.push(InterfaceCounters {
            name: name.to_string(),
            rx_byte,
            tx_byte,
        });
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn failing_write(mut self, lease_id: &str) -> Self {
        self.failing_writes.insert(lease_id.to_string());
        self
    }

    fn ensure_connected(&self) -> Result<(), RouterError> {
        if self.connected {
            Ok(())
        } else {
            Err(RouterError::NotConnected)
        }
    }
}

#[async_trait]
impl RouterSession for FakeSession {
    fn router_id(&self) -> &str {
        &self.id
    }

    fn host(&self) -> &str {
        &self.host
    }

    async fn connect(&mut self) -> Result<(), RouterError> {
        self.log.lock().unwrap().connects += 1;
        if self.unreachable {
            return Err(RouterError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connected {
            self.log.lock().unwrap().disconnects += 1;
        }
        self.connected = false;
    }

    async fn identity(&mut self) -> Result<RouterIdentity, RouterError> {
        self.ensure_connected()?;
        Ok(RouterIdentity {
            board_name: "RB750Gr3".to_string(),
            version: "7.14".to_string(),
            uptime: "3d4h".to_string(),
        })
    }

    async fn list_leases(&mut self) -> Result<Vec<Lease>, RouterError> {
        self.ensure_connected()?;
        Ok(self.leases.clone())
    }

    async fn list_queues(&mut self) -> Result<Vec<SimpleQueue>, RouterError> {
        self.ensure_connected()?;
        if self.queues_fail {
            return Err(RouterError::Trap("no such command".to_string()));
        }
        Ok(self.queues.clone())
    }

    async fn list_interfaces(&mut self) -> Result<Vec<InterfaceCounters>, RouterError> {
        self.ensure_connected()?;
        Ok(self.interfaces.clone())
    }

    async fn set_lease_comment(&mut self, lease_id: &str, comment: &str) -> Result<(), RouterError> {
        self.ensure_connected()?;
        if self.failing_writes.contains(lease_id) {
            return Err(RouterError::Trap("failure: item is read-only".to_string()));
        }
        if let Some(lease) = self.leases.iter_mut().find(|l| l.id == lease_id) {
            *lease = Lease::new(lease_id, lease.address.clone(), comment);
        }
        self.log
            .lock()
            .unwrap()
            .writes
            .push((lease_id.to_string(), comment.to_string()));
        Ok(())
    }
}

pub const GB: u64 = 1024 * 1024 * 1024;
