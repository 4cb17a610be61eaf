//! Reconciliation Engine
//!
//! Joins live router state with the manual customer list into one ordered list
//! of [`CustomerRecord`]s, and pushes usage summaries back into lease comments.
//!
//! ## Failure policy
//!
//! This module is the single place that decides whether a router error is
//! recovered or propagated:
//!
//! - A router that cannot be reached yields no customers and an
//!   [`SyncStatus::Unreachable`] entry in the report. The batch continues.
//! - Queue or interface listing failures degrade usage to zero for that router.
//! - A failed comment write is logged and counted in the [`PushReport`].
//! - Comments that were not valid UTF-8 are never rewritten; push counts them
//!   as skipped and an edit fails.
//! - Unknown router ids and manual list errors fail the whole call.
//!
//! ## Ordering
//!
//! Manual entries come first, then routers in configuration order, then leases
//! in the order the router returned them. Routers are synchronized concurrently
//! but their results are joined back in configuration order.

use crate::comment::{is_lossy, merge_usage, LeaseComment, RecognizedKey};
use crate::config::Config;
use crate::due_date::DueDate;
use crate::manual::{ManualCustomer, ManualCustomerStore};
use crate::models::{
    or_placeholder, parse_price, CustomerRecord, CustomerSource, InterfaceCounters, Lease, RouterIdentity,
    SimpleQueue, PLACEHOLDER, UNKNOWN_NAME,
};
use crate::router::{MikrotikSession, RouterSession};
use crate::usage::{combine, format_usage, usage_summary};
use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Which routers a refresh covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RouterTarget {
    #[default]
    All,
    Router(String),
}

impl FromStr for RouterTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lowered = trimmed.to_lowercase();
        if lowered.is_empty() || lowered == "all" || lowered == "semua mikrotik" {
            Ok(RouterTarget::All)
        } else {
            Ok(RouterTarget::Router(trimmed.to_string()))
        }
    }
}

impl fmt::Display for RouterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterTarget::All => f.write_str("all"),
            RouterTarget::Router(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Connected and read `leases` leases that carry a comment.
    Synced { leases: usize },
    Unreachable { reason: String },
}

impl SyncStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, SyncStatus::Synced { .. })
    }
}

/// Outcome of one router in a refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterSync {
    #[serde(rename = "routerId")]
    pub router_id: String,
    pub host: String,
    pub status: SyncStatus,
    #[serde(skip)]
    pub customers: Vec<CustomerRecord>,
}

/// Per-router line of a [`CustomerCollection`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterReport {
    #[serde(rename = "routerId")]
    pub router_id: String,
    pub host: String,
    pub status: SyncStatus,
    pub customers: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerCollection {
    pub customers: Vec<CustomerRecord>,
    pub routers: Vec<RouterReport>,
}

impl CustomerCollection {
    pub fn unreachable(&self) -> impl Iterator<Item = &RouterReport> {
        self.routers.iter().filter(|r| !r.status.is_reachable())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushReport {
    #[serde(rename = "routerId")]
    pub router_id: String,
    pub host: String,
    pub status: SyncStatus,
    pub updated: usize,
    pub failed: usize,
    /// Leases left alone because their comment could not be decoded.
    pub skipped: usize,
}

/// Read one router into customer records. Never fails: connectivity problems
/// are reported through [`SyncStatus::Unreachable`] with an empty list.
pub async fn sync_router(session: &mut dyn RouterSession) -> RouterSync {
    let router_id = session.router_id().to_string();
    let host = session.host().to_string();

    if let Err(e) = session.connect().await {
        warn!(router = %router_id, host = %host, error = %e, "Router unreachable, skipping");
        return RouterSync {
            router_id,
            host,
            status: SyncStatus::Unreachable { reason: e.to_string() },
            customers: Vec::new(),
        };
    }

    let leases = match session.list_leases_with_comment().await {
        Ok(leases) => leases,
        Err(e) => {
            warn!(router = %router_id, error = %e, connectivity = e.is_connectivity(), "Failed to list leases");
            session.disconnect().await;
            return RouterSync {
                router_id,
                host,
                status: SyncStatus::Unreachable { reason: e.to_string() },
                customers: Vec::new(),
            };
        }
    };

    let (queues, interfaces) = read_counters(session, &router_id).await;

    let customers: Vec<CustomerRecord> = leases
        .iter()
        .map(|lease| customer_from_lease(lease, &router_id, &queues, &interfaces))
        .collect();

    session.disconnect().await;

    info!(router = %router_id, customers = customers.len(), "Router synchronized");
    RouterSync {
        router_id,
        host,
        status: SyncStatus::Synced { leases: leases.len() },
        customers,
    }
}

/// Write a fresh usage summary into every commented lease of one router.
pub async fn push_usage_update(session: &mut dyn RouterSession) -> PushReport {
    let router_id = session.router_id().to_string();
    let host = session.host().to_string();
    let mut report = PushReport {
        router_id: router_id.clone(),
        host,
        status: SyncStatus::Synced { leases: 0 },
        updated: 0,
        failed: 0,
        skipped: 0,
    };

    if let Err(e) = session.connect().await {
        warn!(router = %router_id, error = %e, "Router unreachable, usage not pushed");
        report.status = SyncStatus::Unreachable { reason: e.to_string() };
        return report;
    }

    let leases = match session.list_leases_with_comment().await {
        Ok(leases) => leases,
        Err(e) => {
            warn!(router = %router_id, error = %e, "Failed to list leases");
            session.disconnect().await;
            report.status = SyncStatus::Unreachable { reason: e.to_string() };
            return report;
        }
    };
    report.status = SyncStatus::Synced { leases: leases.len() };

    let (queues, interfaces) = read_counters(session, &router_id).await;

    for lease in &leases {
        if is_lossy(&lease.comment) {
            warn!(router = %router_id, lease = %lease.id, address = %lease.address, "Comment is not valid UTF-8, left unchanged");
            report.skipped += 1;
            continue;
        }
        let usage = combine(&lease.address, &queues, &interfaces);
        let comment = merge_usage(&lease.comment, &usage_summary(&usage));
        match session.set_lease_comment(&lease.id, &comment).await {
            Ok(()) => report.updated += 1,
            Err(e) => {
                warn!(
                    router = %router_id,
                    lease = %lease.id,
                    address = %lease.address,
                    error = %e,
                    connectivity = e.is_connectivity(),
                    "Failed to update lease comment"
                );
                report.failed += 1;
            }
        }
    }

    session.disconnect().await;

    info!(
        router = %router_id,
        updated = report.updated,
        failed = report.failed,
        skipped = report.skipped,
        "Usage pushed"
    );
    report
}

/// Queues and interfaces are read once per router. Failures degrade to empty.
async fn read_counters(session: &mut dyn RouterSession, router_id: &str) -> (Vec<SimpleQueue>, Vec<InterfaceCounters>) {
    let queues = session.list_queues().await.unwrap_or_else(|e| {
        warn!(router = router_id, error = %e, "Failed to list simple queues");
        Vec::new()
    });
    let interfaces = session.list_interfaces().await.unwrap_or_else(|e| {
        warn!(router = router_id, error = %e, "Failed to list interfaces");
        Vec::new()
    });
    (queues, interfaces)
}

pub fn customer_from_lease(
    lease: &Lease,
    router_id: &str,
    queues: &[SimpleQueue],
    interfaces: &[InterfaceCounters],
) -> CustomerRecord {
    let meta = &lease.metadata;
    let usage = combine(&lease.address, queues, interfaces);

    CustomerRecord {
        name: or_placeholder(meta.get(RecognizedKey::Name), UNKNOWN_NAME),
        package: or_placeholder(meta.get(RecognizedKey::Package), PLACEHOLDER),
        price: meta.get(RecognizedKey::Price).and_then(parse_price).unwrap_or(0),
        phone: or_placeholder(meta.get(RecognizedKey::Phone), PLACEHOLDER),
        due_date: DueDate::parse(meta.get(RecognizedKey::DueDate).unwrap_or_default()),
        ip_address: lease.address.clone(),
        usage_total: format_usage(usage.total_gb),
        usage_per_interface: usage.per_interface,
        source: CustomerSource::Router {
            router_id: router_id.to_string(),
            lease_id: lease.id.clone(),
        },
    }
}

/// Field edits applied to a lease comment or a manual record.
///
/// `None` leaves a field alone, an empty string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerEdit {
    pub name: Option<String>,
    pub package: Option<String>,
    pub price: Option<String>,
    pub due_date: Option<String>,
    pub phone: Option<String>,
    pub interface: Option<String>,
}

impl CustomerEdit {
    pub fn is_empty(&self) -> bool {
        *self == CustomerEdit::default()
    }

    /// Prices are stored as bare digits.
    fn normalized_price(&self) -> Option<String> {
        self.price
            .as_deref()
            .map(|p| parse_price(p).map(|n| n.to_string()).unwrap_or_default())
    }

    pub fn apply_to_comment(&self, comment: &mut LeaseComment) {
        let fields = [
            (RecognizedKey::Name, self.name.clone()),
            (RecognizedKey::Package, self.package.clone()),
            (RecognizedKey::Price, self.normalized_price()),
            (RecognizedKey::DueDate, self.due_date.clone()),
            (RecognizedKey::Phone, self.phone.clone()),
            (RecognizedKey::Interface, self.interface.clone()),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                comment.set(key, value);
            }
        }
    }

    pub fn apply_to_manual(&self, customer: &mut ManualCustomer) {
        let text = |value: &str| or_placeholder(Some(value), PLACEHOLDER);
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            customer.name = name.trim().to_string();
        }
        if let Some(package) = &self.package {
            customer.package = text(package);
        }
        if let Some(price) = &self.price {
            customer.price = parse_price(price).unwrap_or(0);
        }
        if let Some(due_date) = &self.due_date {
            customer.due_date = text(due_date);
        }
        if let Some(phone) = &self.phone {
            customer.phone = text(phone);
        }
    }
}

/// Owns one session per configured router plus the manual store.
pub struct BillingEngine {
    sessions: Vec<Box<dyn RouterSession>>,
    manual: ManualCustomerStore,
}

impl BillingEngine {
    pub fn new(sessions: Vec<Box<dyn RouterSession>>, manual: ManualCustomerStore) -> Self {
        Self { sessions, manual }
    }

    pub fn from_config(config: &Config) -> Self {
        let sessions = config
            .routers
            .iter()
            .map(|router| Box::new(MikrotikSession::new(router.clone(), &config.network)) as Box<dyn RouterSession>)
            .collect();
        Self::new(sessions, ManualCustomerStore::new(&config.paths.manual_customers_file))
    }

    pub fn router_ids(&self) -> Vec<&str> {
        self.sessions.iter().map(|s| s.router_id()).collect()
    }

    /// Indexes of the sessions covered by `target`, in configuration order.
    fn select(&self, target: &RouterTarget) -> Result<Vec<usize>> {
        match target {
            RouterTarget::All => Ok((0..self.sessions.len()).collect()),
            RouterTarget::Router(id) => self
                .index_of(id)
                .map(|index| vec![index])
                .ok_or_else(|| self.unknown_router(id)),
        }
    }

    fn index_of(&self, id_or_host: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|s| s.router_id() == id_or_host)
            .or_else(|| self.sessions.iter().position(|s| s.host() == id_or_host))
    }

    fn unknown_router(&self, id: &str) -> anyhow::Error {
        let known = self.router_ids();
        anyhow::anyhow!(
            "Router '{}' not found in configuration (known: {})",
            id,
            if known.is_empty() { "none".to_string() } else { known.join(", ") }
        )
    }

    fn session(&mut self, id: &str) -> Result<&mut Box<dyn RouterSession>> {
        let index = self.index_of(id).ok_or_else(|| self.unknown_router(id))?;
        Ok(&mut self.sessions[index])
    }

    /// Manual entries followed by the customers of every selected router.
    pub async fn collect_customers(&mut self, target: &RouterTarget) -> Result<CustomerCollection> {
        let selected = self.select(target)?;

        let manual = self
            .manual
            .load()
            .with_context(|| format!("Failed to load manual customers from {}", self.manual.path().display()))?;
        let mut customers: Vec<CustomerRecord> = manual.iter().map(ManualCustomer::to_record).collect();
        debug!(count = customers.len(), "Manual customers loaded");

        let futures = self
            .sessions
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| selected.contains(index))
            .map(|(_, session)| sync_router(session.as_mut()));
        let results = join_all(futures).await;

        let mut routers = Vec::with_capacity(results.len());
        for sync in results {
            routers.push(RouterReport {
                router_id: sync.router_id,
                host: sync.host,
                status: sync.status,
                customers: sync.customers.len(),
            });
            customers.extend(sync.customers);
        }

        info!(selection = %target, customers = customers.len(), routers = routers.len(), "Customers collected");
        Ok(CustomerCollection { customers, routers })
    }

    pub async fn push_usage(&mut self, target: &RouterTarget) -> Result<Vec<PushReport>> {
        let selected = self.select(target)?;
        let futures = self
            .sessions
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| selected.contains(index))
            .map(|(_, session)| push_usage_update(session.as_mut()));
        Ok(join_all(futures).await)
    }

    /// Connect, read the system resource, disconnect. Errors are returned as-is.
    pub async fn test_connection(&mut self, router: &str) -> Result<RouterIdentity> {
        let session = self.session(router)?;
        let router_id = session.router_id().to_string();

        session
            .connect()
            .await
            .with_context(|| format!("Failed to connect to router '{}'", router_id))?;
        let identity = session.identity().await;
        session.disconnect().await;

        identity.with_context(|| format!("Failed to read system resource from '{}'", router_id))
    }

    /// Rewrite the comment of the lease holding `address` with `edit` applied.
    /// Returns the comment written.
    pub async fn edit_lease_comment(&mut self, router: &str, address: &str, edit: &CustomerEdit) -> Result<String> {
        let session = self.session(router)?;
        let router_id = session.router_id().to_string();

        session
            .connect()
            .await
            .with_context(|| format!("Failed to connect to router '{}'", router_id))?;
        let result = Self::write_edit(session.as_mut(), address, edit).await;
        session.disconnect().await;

        let comment = result.with_context(|| format!("Failed to edit lease {} on '{}'", address, router_id))?;
        info!(router = %router_id, address, "Lease comment edited");
        Ok(comment)
    }

    async fn write_edit(
        session: &mut dyn RouterSession,
        address: &str,
        edit: &CustomerEdit,
    ) -> Result<String, crate::router::RouterError> {
        let current = session
            .list_leases()
            .await?
            .into_iter()
            .find(|lease| lease.address == address);
        if let Some(lease) = current.as_ref().filter(|lease| is_lossy(&lease.comment)) {
            return Err(crate::router::RouterError::UndecodableComment(lease.id.clone()));
        }

        let mut updated: LeaseComment = current.map(|lease| lease.metadata).unwrap_or_default();
        edit.apply_to_comment(&mut updated);
        let comment = updated.encode();

        session.set_lease_comment_by_address(address, &comment).await?;
        Ok(comment)
    }
}
