//! MikroTik Billing Library
//!
//! Billing helper for small WiFi operators who run MikroTik routers. Customer
//! metadata lives in the comment of each DHCP lease; this library reads it back,
//! joins it with live usage counters and a local list of manual customers, and
//! writes usage summaries back into the comments.
//!
//! ## Architecture Overview
//!
//! - [`comment`] - Codec for the `key:value; key:value` lease comment format
//! - [`usage`] - Reduces queue and interface counters to per-customer GB figures
//! - [`router`] - RouterOS API wire protocol, client and [`router::RouterSession`]
//! - [`reconcile`] - [`BillingEngine`]: collects customers and pushes usage per router
//! - [`manual`] - JSON file of customers that have no lease
//! - [`provisioning`] - `.rsc` script creating one simple queue per customer
//! - [`receipt`] - Plain-text payment receipts
//! - [`display`] - Colored terminal and JSON output
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//!
//! ## Main Entry Point
//!
//! ```no_run
//! use mikrotik_billing::{config::Config, BillingEngine, RouterTarget};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(None)?;
//! let mut engine = BillingEngine::from_config(&config);
//! let collection = engine.collect_customers(&RouterTarget::All).await?;
//! for customer in &collection.customers {
//!     println!("{} {}", customer.name, customer.usage_total);
//! }
//! # Ok(())
//! # }
//! ```

pub mod comment;
pub mod config;
pub mod display;
pub mod due_date;
pub mod logging;
pub mod manual;
pub mod models;
pub mod provisioning;
pub mod receipt;
pub mod reconcile;
pub mod router;
pub mod usage;

// Command modules
pub mod commands;

pub use models::*;
pub use reconcile::{BillingEngine, RouterTarget};
