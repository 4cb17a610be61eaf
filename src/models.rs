//! Core Data Models
//!
//! Data flows through these types in the following order:
//!
//! 1. **Router state**: [`Lease`], [`SimpleQueue`], [`InterfaceCounters`] as read
//!    from one router
//! 2. **Usage**: [`UsageBreakdown`] computed per lease by [`crate::usage`]
//! 3. **Output**: [`CustomerRecord`], the unified view over router leases and
//!    manual customers consumed by display, receipts and the provisioning script
//!
//! Customer records are never persisted as such. They are rebuilt from live
//! router state and the manual list on every refresh.

use crate::comment::LeaseComment;
use crate::due_date::DueDate;
use serde::Serialize;
use std::fmt;

/// Placeholder shown for missing text fields.
pub const PLACEHOLDER: &str = "-";

/// Name used when a lease comment carries no `nama` field.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A DHCP lease that carries a comment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lease {
    /// RouterOS `.id`, e.g. `*1A`
    pub id: String,
    pub address: String,
    /// Raw comment as stored on the router.
    pub comment: String,
    /// Comment decoded at read time.
    pub metadata: LeaseComment,
}

impl Lease {
    pub fn new(id: impl Into<String>, address: impl Into<String>, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        let metadata = LeaseComment::decode(&comment);
        Self {
            id: id.into(),
            address: address.into(),
            comment,
            metadata,
        }
    }
}

/// Simple queue with cumulative byte counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleQueue {
    pub name: String,
    /// Target address or CIDR list entry (`dst` is used when `target` is absent).
    pub target: String,
    /// `"<download>/<upload>"` byte counters.
    pub bytes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceCounters {
    pub name: String,
    pub rx_byte: u64,
    pub tx_byte: u64,
}

/// Answer to a connection test.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouterIdentity {
    pub board_name: String,
    pub version: String,
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceUsage {
    pub name: String,
    pub gb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    Queue,
    Interfaces,
    None,
}

/// Usage figure of one customer with the per-interface breakdown it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageBreakdown {
    #[serde(rename = "totalGb")]
    pub total_gb: f64,
    /// Discovery order.
    #[serde(rename = "perInterface")]
    pub per_interface: Vec<InterfaceUsage>,
    pub source: UsageSource,
}

impl UsageBreakdown {
    pub fn empty() -> Self {
        Self {
            total_gb: 0.0,
            per_interface: Vec::new(),
            source: UsageSource::None,
        }
    }
}

/// Where a customer record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomerSource {
    Manual,
    Router {
        #[serde(rename = "routerId")]
        router_id: String,
        #[serde(rename = "leaseId")]
        lease_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub name: String,
    pub package: String,
    pub price: u64,
    pub phone: String,
    #[serde(rename = "dueDate")]
    pub due_date: DueDate,
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
    #[serde(rename = "usageTotal")]
    pub usage_total: String,
    #[serde(rename = "usagePerInterface")]
    pub usage_per_interface: Vec<InterfaceUsage>,
    pub source: CustomerSource,
}

impl CustomerRecord {
    pub fn is_manual(&self) -> bool {
        matches!(self.source, CustomerSource::Manual)
    }

    pub fn router_id(&self) -> Option<&str> {
        match &self.source {
            CustomerSource::Router { router_id, .. } => Some(router_id),
            CustomerSource::Manual => None,
        }
    }

    /// True when the record has an address usable as a queue target.
    pub fn has_ip(&self) -> bool {
        let ip = self.ip_address.trim();
        !ip.is_empty() && ip != PLACEHOLDER
    }
}

/// How a bill was paid, printed on receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
pub enum PaymentMethod {
    Tunai,
    Qris,
    Transfer,
    #[default]
    BelumBayar,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Tunai => "Tunai",
            PaymentMethod::Qris => "QRIS",
            PaymentMethod::Transfer => "Transfer",
            PaymentMethod::BelumBayar => "Belum Bayar",
        };
        f.write_str(label)
    }
}

/// Parse a price written by hand: every ASCII digit counts, separators and
/// currency text are ignored (`"Rp 100.000"` is `100000`).
pub fn parse_price(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Empty text becomes the placeholder.
pub fn or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}
