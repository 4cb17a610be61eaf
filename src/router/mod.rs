//! RouterOS API client for MikroTik routers
//!
//! Implements the binary API protocol (TCP 8728), plaintext login, and the
//! handful of resources billing needs: DHCP leases, simple queues, interfaces
//! and system resource.

pub mod client;
pub mod error;
pub mod protocol;
pub mod session;

pub use client::ApiConnection;
pub use error::RouterError;
pub use session::{MikrotikSession, RouterSession};
