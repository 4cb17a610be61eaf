//! Output Formatting and Display Management
//!
//! Renders command results either as colored terminal output or as pretty
//! JSON for scripting.
//!
//! ## Customer table
//!
//! One line per customer in collection order (manual entries first, then
//! routers in configuration order). Overdue due dates are shown in red.
//! Below the table every router gets a status line so that "router
//! unreachable" is never confused with "no customers on that router".
//!
//! ## JSON output
//!
//! ```json
//! {
//!   "customers": [
//!     {
//!       "name": "Andi",
//!       "package": "10Mbps",
//!       "price": 100000,
//!       "dueDate": "10/11/2025",
//!       "ipAddress": "192.168.2.10",
//!       "usageTotal": "1.00 GB",
//!       "source": { "kind": "router", "routerId": "kantor", "leaseId": "*1A" }
//!     }
//!   ],
//!   "routers": [
//!     { "routerId": "kantor", "host": "192.168.88.1", "status": { "state": "synced", "leases": 1 }, "customers": 1 }
//!   ]
//! }
//! ```

use crate::config::RouterConfig;
use crate::manual::ManualCustomer;
use crate::models::{CustomerRecord, RouterIdentity};
use crate::receipt::format_rupiah;
use crate::reconcile::{CustomerCollection, PushReport, RouterReport, SyncStatus};
use chrono::NaiveDate;
use colored::Colorize;
use serde::Serialize;

const RULE_WIDTH: usize = 100;

pub struct DisplayManager {
    today: NaiveDate,
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::with_today(chrono::Local::now().date_naive())
    }

    /// Fixed reference date for overdue highlighting.
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json_str) => println!("{}", json_str),
            Err(e) => eprintln!("Error serializing output to JSON: {}", e),
        }
    }

    fn header(&self, title: &str) {
        println!("\n{}", "=".repeat(RULE_WIDTH).bright_cyan());
        println!("{}", title.bright_white().bold());
        println!("{}", "=".repeat(RULE_WIDTH).bright_cyan());
    }

    pub fn display_customers(&self, collection: &CustomerCollection, json_output: bool) {
        if json_output {
            self.print_json(collection);
            return;
        }

        self.header("Daftar Pelanggan WiFi");

        let manual = collection.customers.iter().filter(|c| c.is_manual()).count();
        let total_price: u64 = collection.customers.iter().map(|c| c.price).sum();
        println!(
            "\n{} {} customers • {} manual • {} billed\n",
            "📊".bright_yellow(),
            collection.customers.len().to_string().bright_white().bold(),
            manual.to_string().bright_white(),
            format_rupiah(total_price).bright_green().bold()
        );

        if collection.customers.is_empty() {
            println!("   {}", "No customers found.".dimmed());
        } else {
            println!(
                "   {:<22} {:<10} {:>12} {:<14} {:<12} {:>11} {:<16} {}",
                "Nama".bold(),
                "Paket".bold(),
                "Harga".bold(),
                "No. HP".bold(),
                "Jatuh Tempo".bold(),
                "Usage".bold(),
                "IP".bold(),
                "Sumber".bold()
            );
            for customer in &collection.customers {
                self.customer_line(customer);
            }
        }

        if !collection.routers.is_empty() {
            println!("\n{} Routers:", "📡".bright_blue());
            for router in &collection.routers {
                self.router_line(router);
            }
        }
        println!();
    }

    fn customer_line(&self, customer: &CustomerRecord) {
        let due = format!("{:<12}", customer.due_date.to_string());
        let due = if customer.due_date.is_overdue(self.today) {
            due.bright_red().bold()
        } else {
            due.normal()
        };
        let source = customer.router_id().unwrap_or("manual");

        println!(
            "   {:<22} {:<10} {:>12} {:<14} {} {:>11} {:<16} {}",
            truncate(&customer.name, 22).bright_white(),
            truncate(&customer.package, 10),
            format_rupiah(customer.price).bright_green(),
            customer.phone,
            due,
            customer.usage_total.bright_yellow(),
            customer.ip_address.bright_cyan(),
            source.dimmed()
        );
    }

    fn router_line(&self, router: &RouterReport) {
        match &router.status {
            SyncStatus::Synced { leases } => println!(
                "   {} {} ({}): {} leases, {} customers",
                "✅".green(),
                router.router_id.bright_white().bold(),
                router.host,
                leases,
                router.customers
            ),
            SyncStatus::Unreachable { reason } => println!(
                "   {} {} ({}): {} {}",
                "⚠️".yellow(),
                router.router_id.bright_white().bold(),
                router.host,
                "unreachable".bright_red().bold(),
                reason.dimmed()
            ),
        }
    }

    pub fn display_push_reports(&self, reports: &[PushReport], json_output: bool) {
        if json_output {
            self.print_json(reports);
            return;
        }

        self.header("Usage Update");
        for report in reports {
            match &report.status {
                SyncStatus::Synced { leases } => println!(
                    "   {} {} ({}): {} of {} leases updated{}{}",
                    "✅".green(),
                    report.router_id.bright_white().bold(),
                    report.host,
                    report.updated.to_string().bright_green(),
                    leases,
                    if report.failed > 0 {
                        format!(", {} failed", report.failed).bright_red().to_string()
                    } else {
                        String::new()
                    },
                    if report.skipped > 0 {
                        format!(", {} skipped (comment not UTF-8)", report.skipped).yellow().to_string()
                    } else {
                        String::new()
                    }
                ),
                SyncStatus::Unreachable { reason } => println!(
                    "   {} {} ({}): {} {}",
                    "⚠️".yellow(),
                    report.router_id.bright_white().bold(),
                    report.host,
                    "unreachable".bright_red().bold(),
                    reason.dimmed()
                ),
            }
        }
        if reports.is_empty() {
            println!("   {}", "No routers configured.".dimmed());
        }
        println!();
    }

    pub fn display_identity(&self, router: &RouterConfig, identity: &RouterIdentity, json_output: bool) {
        if json_output {
            self.print_json(&serde_json::json!({
                "routerId": router.id,
                "label": router.display_label(),
                "host": router.host,
                "identity": identity,
            }));
            return;
        }

        println!(
            "{} Connected to {}",
            "✅".green(),
            router_title(&router.id, router.display_label()).bright_white().bold()
        );
        println!("   Board:   {}", identity.board_name.bright_cyan());
        println!("   Version: {}", identity.version.bright_cyan());
        println!("   Uptime:  {}", identity.uptime.bright_cyan());
    }

    pub fn display_manual(&self, customers: &[ManualCustomer], json_output: bool) {
        if json_output {
            self.print_json(customers);
            return;
        }

        self.header("Pelanggan Manual");
        if customers.is_empty() {
            println!("   {}", "No manual customers.".dimmed());
        }
        for customer in customers {
            println!(
                "   {:<22} {:<16} {:<10} {:>12} {:<14} {}",
                truncate(&customer.name, 22).bright_white(),
                customer.ip.bright_cyan(),
                customer.package,
                format_rupiah(customer.price).bright_green(),
                customer.phone,
                customer.due_date
            );
        }
        println!();
    }
}

/// `label (id)`, or just the id when no label is configured.
fn router_title(id: &str, label: &str) -> String {
    if label == id {
        id.to_string()
    } else {
        format!("{} ({})", label, id)
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
