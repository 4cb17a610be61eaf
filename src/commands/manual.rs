//! `manual`: maintain customers that have no router lease.

use anyhow::{Context, Result};
use clap::Subcommand;

use super::FieldArgs;
use crate::config::Config;
use crate::display::DisplayManager;
use crate::manual::{ManualCustomer, ManualCustomerStore};
use crate::models::{parse_price, PLACEHOLDER};

#[derive(Subcommand, Debug, Clone)]
pub enum ManualAction {
    /// Show every manual customer
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Add a customer
    Add {
        /// Customer name
        #[arg(long = "nama")]
        name: String,
        /// IP address, omit when the customer has none
        #[arg(long, default_value = "")]
        ip: String,
        #[arg(long = "paket")]
        package: Option<String>,
        #[arg(long = "harga")]
        price: Option<String>,
        #[arg(long = "no-hp")]
        phone: Option<String>,
        #[arg(long = "due", visible_alias = "jatuh-tempo")]
        due_date: Option<String>,
        /// Free-text usage shown on receipts
        #[arg(long)]
        usage: Option<String>,
    },
    /// Change fields of the customer identified by NAME and IP
    Edit {
        #[arg(value_name = "NAME")]
        customer: String,
        #[arg(default_value = "")]
        ip: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Remove the customer identified by NAME and IP
    Delete {
        name: String,
        #[arg(default_value = "")]
        ip: String,
    },
}

pub fn run_manual(config: &Config, action: ManualAction) -> Result<()> {
    let store = ManualCustomerStore::new(&config.paths.manual_customers_file);
    let display = DisplayManager::new();

    match action {
        ManualAction::List { json } => {
            let customers = store.load()?;
            display.display_manual(&customers, json);
        }
        ManualAction::Add {
            name,
            ip,
            package,
            price,
            phone,
            due_date,
            usage,
        } => {
            let fields = FieldArgs {
                due_date: due_date.clone(),
                ..Default::default()
            };
            fields.to_edit()?;

            let text = |value: Option<String>| {
                value
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| PLACEHOLDER.to_string())
            };
            let mut customer = ManualCustomer::new(name.trim(), ip.trim());
            customer.package = text(package);
            customer.price = price.as_deref().and_then(parse_price).unwrap_or(0);
            customer.phone = text(phone);
            customer.due_date = text(due_date);
            customer.usage_total = text(usage);

            store
                .add(customer.clone())
                .with_context(|| format!("Failed to add {}", customer.name))?;
            println!("✅ Added {} ({})", customer.name, display_ip(&customer.ip));
        }
        ManualAction::Edit { customer, ip, fields } => {
            let edit = fields.to_edit()?;
            if edit.is_empty() {
                anyhow::bail!("Nothing to change, pass at least one field flag");
            }
            let updated = store.update(&customer, &ip, |c| edit.apply_to_manual(c))?;
            println!("✅ Updated {} ({})", updated.name, display_ip(&updated.ip));
        }
        ManualAction::Delete { name, ip } => {
            let removed = store.delete(&name, &ip)?;
            println!("🗑️  Deleted {} ({})", removed.name, display_ip(&removed.ip));
        }
    }

    Ok(())
}

fn display_ip(ip: &str) -> &str {
    if ip.trim().is_empty() {
        PLACEHOLDER
    } else {
        ip
    }
}
