//! `test-connection`: log in to one router and read its system resource.

use anyhow::Result;

use crate::config::Config;
use crate::display::DisplayManager;
use crate::reconcile::BillingEngine;

pub async fn run_test_connection(config: &Config, router: &str, json: bool) -> Result<()> {
    // Resolve through the configuration first so unknown ids fail before any I/O
    let router = config.router(router)?;

    let mut engine = BillingEngine::from_config(config);
    let identity = engine.test_connection(&router.id).await?;

    DisplayManager::new().display_identity(router, &identity, json);
    Ok(())
}
