//! RouterOS provisioning script
//!
//! Renders a `.rsc` file that creates one simple queue per customer with an IP.
//! The file is regenerated on every customer refresh and imported on the
//! router with `/import`.

use crate::models::CustomerRecord;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Queue name for a customer: spaces become `_`, quotes are escaped.
pub fn queue_name(customer_name: &str) -> String {
    customer_name
        .trim()
        .replace(' ', "_")
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}

/// Single-host targets get `/32`; anything already in CIDR form is kept.
pub fn queue_target(ip: &str) -> String {
    let ip = ip.trim();
    if ip.contains('/') {
        ip.to_string()
    } else {
        format!("{}/32", ip)
    }
}

pub fn render_queue_script(customers: &[CustomerRecord], max_limit: &str, file_name: &str) -> String {
    let mut script = String::new();
    script.push_str("# Auto-generated Mikrotik Simple Queue\n");
    script.push_str(&format!("# Import ke MikroTik dengan: /import {}\n", file_name));
    script.push_str("\n/queue simple\n");

    for customer in customers.iter().filter(|c| c.has_ip()) {
        script.push_str(&format!(
            "add name=\"{}\" target={} max-limit={}\n",
            queue_name(&customer.name),
            queue_target(&customer.ip_address),
            max_limit
        ));
    }

    script
}

/// Write the script and return the number of queues it contains.
pub fn write_queue_script(path: &Path, customers: &[CustomerRecord], max_limit: &str) -> Result<usize> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "queue_pelanggan.rsc".to_string());
    let script = render_queue_script(customers, max_limit, &file_name);

    fs::write(path, &script)
        .with_context(|| format!("Failed to write provisioning script: {}", path.display()))?;

    let queues = customers.iter().filter(|c| c.has_ip()).count();
    info!(path = %path.display(), queues, "Provisioning script written");
    Ok(queues)
}
