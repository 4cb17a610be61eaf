//! `edit-comment`: rewrite a customer's billing fields.
//!
//! The lease comment on the router is rebuilt in canonical form with the
//! edited fields applied; fields this tool does not know about are kept. With
//! `--manual` the same edit is applied to the manual customer record, and the
//! lease is only touched when `--router` is also given.

use anyhow::Result;
use tracing::info;

use super::FieldArgs;
use crate::config::Config;
use crate::manual::ManualCustomerStore;
use crate::reconcile::BillingEngine;

pub async fn run_edit_comment(
    config: &Config,
    ip: &str,
    router: Option<&str>,
    manual_name: Option<&str>,
    fields: &FieldArgs,
) -> Result<()> {
    let edit = fields.to_edit()?;
    if edit.is_empty() {
        anyhow::bail!("Nothing to change, pass at least one field flag");
    }

    // The default router applies only when no manual record was named, so
    // `--manual` alone leaves the routers untouched
    let router = match (router, manual_name) {
        (Some(router), _) => Some(router),
        (None, None) => config.app.default_router.as_deref(),
        (None, Some(_)) => None,
    };
    if router.is_none() && manual_name.is_none() {
        anyhow::bail!("Pass --router to edit a lease comment or --manual to edit a manual customer");
    }

    if let Some(name) = manual_name {
        let store = ManualCustomerStore::new(&config.paths.manual_customers_file);
        let updated = store.update(name, ip, |customer| edit.apply_to_manual(customer))?;
        println!("✅ Manual record updated: {}", updated.name);
    }

    if let Some(router) = router {
        let router_id = config.router(router)?.id.clone();
        let mut engine = BillingEngine::from_config(config);
        let comment = engine.edit_lease_comment(&router_id, ip, &edit).await?;
        info!(router = %router_id, ip, "Comment written");
        println!("✅ Lease {} on {} now reads:", ip, router_id);
        println!("   {}", comment);
    }

    Ok(())
}
