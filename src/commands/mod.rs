//! Command module for the billing CLI
//!
//! Each subcommand lives in its own module and takes the loaded [`Config`]
//! explicitly. Commands print through [`crate::display::DisplayManager`] and
//! return `anyhow::Result` so `main` can render errors uniformly.
//!
//! [`Config`]: crate::config::Config

pub mod connection;
pub mod customers;
pub mod edit;
pub mod init;
pub mod manual;
pub mod push;
pub mod receipt;

pub use connection::run_test_connection;
pub use customers::{run_customers, run_rsc};
pub use edit::run_edit_comment;
pub use init::run_init_config;
pub use manual::{run_manual, ManualAction};
pub use push::run_push_usage;
pub use receipt::{run_receipt, ReceiptArgs};

use crate::config::Config;
use crate::due_date::DueDate;
use crate::reconcile::{CustomerEdit, RouterTarget};
use anyhow::Result;
use clap::Args;

/// Customer fields that can be set from the command line.
///
/// Flag names follow the keys stored in lease comments. Passing an empty
/// string clears the field.
#[derive(Args, Debug, Clone, Default)]
pub struct FieldArgs {
    /// Customer name
    #[arg(long = "nama")]
    pub name: Option<String>,
    /// Package, e.g. 10Mbps
    #[arg(long = "paket")]
    pub package: Option<String>,
    /// Monthly price; separators are ignored (100.000 or 100000)
    #[arg(long = "harga")]
    pub price: Option<String>,
    /// Due date, dd/mm/yyyy or YYYY-MM-DD
    #[arg(long = "due", visible_alias = "jatuh-tempo")]
    pub due_date: Option<String>,
    /// Phone number
    #[arg(long = "no-hp")]
    pub phone: Option<String>,
    /// Interface the customer is connected to
    #[arg(long = "iface")]
    pub interface: Option<String>,
}

impl FieldArgs {
    /// Validated edit. Due dates must use one of the accepted spellings.
    pub fn to_edit(&self) -> Result<CustomerEdit> {
        if let Some(due) = self.due_date.as_deref().filter(|d| !d.trim().is_empty()) {
            DueDate::parse_strict(due)?;
        }
        Ok(CustomerEdit {
            name: self.name.clone(),
            package: self.package.clone(),
            price: self.price.clone(),
            due_date: self.due_date.clone(),
            phone: self.phone.clone(),
            interface: self.interface.clone(),
        })
    }
}

/// `--router` when given, otherwise the configured default, otherwise all routers.
pub fn resolve_target(config: &Config, router: Option<&str>) -> RouterTarget {
    match router.or(config.app.default_router.as_deref()) {
        Some(router) => router.parse().unwrap_or_default(),
        None => RouterTarget::All,
    }
}
