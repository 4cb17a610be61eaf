//! Usage Aggregator
//!
//! Reduces router counters to a per-customer usage figure. Two sources exist:
//!
//! - **Simple queues**: per-customer byte counters, matched by target IP/CIDR.
//!   Considered authoritative.
//! - **Interfaces**: router-wide rx/tx counters, used as a coarse fallback when
//!   no queue is configured for the customer.
//!
//! The two are never summed. All figures are GB rounded to two decimals.

use crate::models::{InterfaceCounters, InterfaceUsage, SimpleQueue, UsageBreakdown, UsageSource};
use ipnet::IpNet;
use std::net::IpAddr;

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Breakdown label used when usage came from a queue and no interface data exists.
pub const QUEUE_SOURCE_LABEL: &str = "QueueSimple";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GB)
}

/// Whether `ip` is covered by a queue target.
///
/// Targets without `/` must match exactly. Targets with `/` are CIDR networks
/// and host bits are ignored. Anything unparseable does not match.
pub fn ip_in_target(ip: &str, target: &str) -> bool {
    if !target.contains('/') {
        return ip == target;
    }

    let Ok(network) = target.parse::<IpNet>() else {
        return false;
    };
    ip.parse::<IpAddr>()
        .map(|addr| network.contains(&addr))
        .unwrap_or(false)
}

/// Sum the numeric parts of a `"<down>/<up>"` counter pair.
pub fn parse_byte_pair(bytes: &str) -> u64 {
    bytes
        .split('/')
        .map(str::trim)
        .filter(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|part| part.parse::<u64>().ok())
        .fold(0u64, |acc, n| acc.saturating_add(n))
}

/// Usage of one IP from the first queue whose target covers it, 0.0 when none does.
/// Queues without counters are skipped.
pub fn usage_for_ip(ip: &str, queues: &[SimpleQueue]) -> f64 {
    if ip.is_empty() {
        return 0.0;
    }

    queues
        .iter()
        .find(|q| !q.bytes.trim().is_empty() && ip_in_target(ip, &q.target))
        .map(|q| bytes_to_gb(parse_byte_pair(&q.bytes)))
        .unwrap_or(0.0)
}

/// Usage of every interface, in discovery order.
pub fn interface_usage(interfaces: &[InterfaceCounters]) -> Vec<InterfaceUsage> {
    let mut usage: Vec<InterfaceUsage> = Vec::with_capacity(interfaces.len());
    for iface in interfaces.iter().filter(|i| !i.name.is_empty()) {
        let gb = bytes_to_gb(iface.rx_byte.saturating_add(iface.tx_byte));
        match usage.iter_mut().find(|u| u.name == iface.name) {
            Some(existing) => existing.gb = gb,
            None => usage.push(InterfaceUsage {
                name: iface.name.clone(),
                gb,
            }),
        }
    }
    usage
}

/// Usage of a single named interface, 0.0 when it does not exist.
pub fn interface_usage_for(interfaces: &[InterfaceCounters], name: &str) -> f64 {
    interface_usage(interfaces)
        .into_iter()
        .find(|u| u.name == name)
        .map(|u| u.gb)
        .unwrap_or(0.0)
}

/// Usage of one customer: queue counters when they match, otherwise the total
/// over all interfaces.
pub fn combine(ip: &str, queues: &[SimpleQueue], interfaces: &[InterfaceCounters]) -> UsageBreakdown {
    let queue_gb = usage_for_ip(ip, queues);

    if queue_gb == 0.0 {
        let per_interface = interface_usage(interfaces);
        let total_gb = round2(per_interface.iter().map(|u| u.gb).sum());
        let source = if per_interface.is_empty() {
            UsageSource::None
        } else {
            UsageSource::Interfaces
        };
        return UsageBreakdown {
            total_gb,
            per_interface,
            source,
        };
    }

    UsageBreakdown {
        total_gb: queue_gb,
        per_interface: vec![InterfaceUsage {
            name: QUEUE_SOURCE_LABEL.to_string(),
            gb: queue_gb,
        }],
        source: UsageSource::Queue,
    }
}

/// `"1.23 GB"` from one GB up, `"512.00 MB"` below.
pub fn format_usage(gb: f64) -> String {
    if gb >= 1.0 {
        format!("{:.2} GB", gb)
    } else {
        format!("{:.2} MB", gb * 1024.0)
    }
}

/// Summary written into the lease comment: `"Total: <fmt>; <iface>: <fmt>; ..."`.
pub fn usage_summary(usage: &UsageBreakdown) -> String {
    let mut parts = vec![format!("Total: {}", format_usage(usage.total_gb))];
    parts.extend(
        usage
            .per_interface
            .iter()
            .map(|u| format!("{}: {}", u.name, format_usage(u.gb))),
    );
    parts.join("; ")
}
