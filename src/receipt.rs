//! Plain-text payment receipts sized for an 80mm thermal printer.

use crate::config::AppConfig;
use crate::models::{CustomerRecord, PaymentMethod, PLACEHOLDER};
use chrono::NaiveDate;

/// Characters per line on an 80mm roll.
pub const RECEIPT_WIDTH: usize = 42;

const TITLE: &str = "===== STRUK PEMBAYARAN =====";

/// `1234567` as `Rp 1.234.567`.
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("Rp {}", grouped)
}

/// Everything printed on one receipt.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    pub customer: &'a CustomerRecord,
    /// Address of the router the customer is served by, `-` for manual customers.
    pub router_host: String,
    pub date: NaiveDate,
    pub method: PaymentMethod,
}

fn centered(text: &str) -> String {
    let len = text.chars().count();
    if len >= RECEIPT_WIDTH {
        return text.to_string();
    }
    format!("{}{}", " ".repeat((RECEIPT_WIDTH - len) / 2), text)
}

impl Receipt<'_> {
    pub fn render(&self, app: &AppConfig) -> String {
        let c = self.customer;
        let mut lines = Vec::new();

        lines.push(centered(&app.store_name));
        if !app.store_address.trim().is_empty() {
            lines.push(centered(&app.store_address));
        }
        lines.push(String::new());
        lines.push(centered(TITLE));
        lines.push(String::new());

        let host = if self.router_host.trim().is_empty() {
            PLACEHOLDER
        } else {
            self.router_host.as_str()
        };
        let date = self.date.format("%d/%m/%Y").to_string();
        let fields: [(&str, String); 9] = [
            ("Nama", c.name.clone()),
            ("IP MikroTik", host.to_string()),
            ("Paket", c.package.clone()),
            ("Tagihan", format_rupiah(c.price)),
            ("Usage", c.usage_total.clone()),
            ("No. HP", c.phone.clone()),
            ("Jatuh Tempo", c.due_date.to_string()),
            ("Tanggal", date),
            ("Metode Bayar", self.method.to_string()),
        ];
        for (label, value) in fields {
            lines.push(format!("{:<12}: {}", label, value));
        }

        lines.push("-".repeat(RECEIPT_WIDTH));
        for footer in app.footer_message.lines().filter(|l| !l.trim().is_empty()) {
            lines.push(centered(footer.trim()));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
