//! `push-usage`: write usage summaries back into lease comments.

use anyhow::Result;

use crate::config::Config;
use crate::display::DisplayManager;
use crate::reconcile::{BillingEngine, RouterTarget};

pub async fn run_push_usage(config: &Config, target: RouterTarget, json: bool) -> Result<()> {
    let mut engine = BillingEngine::from_config(config);
    let reports = engine.push_usage(&target).await?;
    DisplayManager::new().display_push_reports(&reports, json);
    Ok(())
}
