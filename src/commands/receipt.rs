//! `receipt`: render a payment receipt for one customer.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::models::{CustomerRecord, PaymentMethod, PLACEHOLDER};
use crate::receipt::Receipt;
use crate::reconcile::BillingEngine;

#[derive(Args, Debug, Clone)]
pub struct ReceiptArgs {
    /// Customer name, matched case-insensitively
    pub name: String,
    /// Disambiguate customers sharing a name
    #[arg(long)]
    pub ip: Option<String>,
    /// Only look at this router (manual customers are always included)
    #[arg(long)]
    pub router: Option<String>,
    #[arg(long, value_enum, default_value_t = PaymentMethod::default())]
    pub method: PaymentMethod,
    /// Receipt date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Write the receipt to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn run_receipt(config: &Config, args: ReceiptArgs) -> Result<()> {
    let target = super::resolve_target(config, args.router.as_deref());
    let mut engine = BillingEngine::from_config(config);
    let collection = engine.collect_customers(&target).await?;

    let customer = find_customer(&collection.customers, &args.name, args.ip.as_deref())?;
    let router_host = customer
        .router_id()
        .and_then(|id| config.router(id).ok())
        .map(|r| r.host.clone())
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    let receipt = Receipt {
        customer,
        router_host,
        date: args.date.unwrap_or_else(|| chrono::Local::now().date_naive()),
        method: args.method,
    };
    let text = receipt.render(&config.app);

    match &args.output {
        Some(path) => {
            fs::write(path, &text)
                .with_context(|| format!("Failed to write receipt: {}", path.display()))?;
            println!("✅ Receipt for {} written to {}", customer.name, path.display());
        }
        None => print!("{}", text),
    }

    Ok(())
}

/// The single customer matching `name` (and `ip` when given).
pub fn find_customer<'a>(customers: &'a [CustomerRecord], name: &str, ip: Option<&str>) -> Result<&'a CustomerRecord> {
    let matches: Vec<&CustomerRecord> = customers
        .iter()
        .filter(|c| c.name.eq_ignore_ascii_case(name.trim()))
        .filter(|c| ip.map(|ip| c.ip_address == ip.trim()).unwrap_or(true))
        .collect();

    match matches.as_slice() {
        [] => anyhow::bail!("No customer named '{}' found", name),
        [customer] => Ok(*customer),
        many => {
            let ips: Vec<&str> = many.iter().map(|c| c.ip_address.as_str()).collect();
            anyhow::bail!(
                "{} customers are named '{}' ({}), pass --ip to pick one",
                many.len(),
                name,
                ips.join(", ")
            )
        }
    }
}
