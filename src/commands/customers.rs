//! `customers` and `rsc`: refresh the customer list from every source.

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::display::DisplayManager;
use crate::provisioning::write_queue_script;
use crate::reconcile::{BillingEngine, CustomerCollection, RouterTarget};

/// List customers and regenerate the provisioning script.
pub async fn run_customers(config: &Config, target: RouterTarget, json: bool, write_script: bool) -> Result<()> {
    let mut engine = BillingEngine::from_config(config);
    let collection = engine.collect_customers(&target).await?;

    DisplayManager::new().display_customers(&collection, json);

    if write_script {
        // Script failures do not fail the listing
        if let Err(e) = write_script_for(config, &collection) {
            warn!(error = %e, "Provisioning script not written");
            if !json {
                eprintln!("⚠️  {:#}", e);
            }
        }
    }

    for router in collection.unreachable() {
        info!(router = %router.router_id, "Router was unreachable during refresh");
    }
    Ok(())
}

/// Write the provisioning script only.
pub async fn run_rsc(config: &Config, target: RouterTarget) -> Result<()> {
    let mut engine = BillingEngine::from_config(config);
    let collection = engine.collect_customers(&target).await?;

    let queues = write_script_for(config, &collection)?;
    println!(
        "✅ {} queues written to {}",
        queues,
        config.paths.provisioning_script.display()
    );
    for router in collection.unreachable() {
        println!("⚠️  {} was unreachable, its customers are missing from the script", router.router_id);
    }
    Ok(())
}

fn write_script_for(config: &Config, collection: &CustomerCollection) -> Result<usize> {
    write_queue_script(
        &config.paths.provisioning_script,
        &collection.customers,
        &config.app.queue_max_limit,
    )
}
