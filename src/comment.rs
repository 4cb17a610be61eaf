//! Lease Comment Codec
//!
//! Billing metadata lives inside the free-text `comment` of a DHCP lease as a
//! semicolon-separated list of `key:value` segments:
//!
//! ```text
//! nama:Andi; paket:10Mbps; harga:100000; due:10/11/2025; no_hp:08123456789; Usage: Total: 2.34 GB
//! ```
//!
//! ## Wire rules
//!
//! - Segments are separated by `;` (written back as `"; "`)
//! - The first `:` separates key from value, values may contain more colons
//! - Keys are matched case-insensitively against [`RecognizedKey`]
//! - Segments without a colon are dropped on decode
//! - Unknown keys pass through with their original spelling and position
//!
//! Decoding produces a [`LeaseComment`]: typed fields for the recognized keys
//! and an ordered bag of pass-through fields for everything else. Encoding
//! writes recognized keys in a fixed canonical order, then the pass-through
//! fields.
//!
//! [`merge_usage`] is the one operation that works on raw segments instead of
//! decoded fields. It replaces the `Usage:` segment and leaves every other
//! segment untouched, even ones this codec does not understand.

use serde::Serialize;

/// Prefix of the segment rewritten by [`merge_usage`].
pub const USAGE_PREFIX: &str = "Usage:";

/// Separator used when writing segments back.
pub const SEGMENT_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizedKey {
    Name,
    Package,
    Price,
    DueDate,
    Phone,
    Interface,
    Usage,
}

impl RecognizedKey {
    /// Order in which recognized keys are encoded.
    pub const CANONICAL_ORDER: [RecognizedKey; 7] = [
        RecognizedKey::Name,
        RecognizedKey::Package,
        RecognizedKey::Price,
        RecognizedKey::DueDate,
        RecognizedKey::Phone,
        RecognizedKey::Interface,
        RecognizedKey::Usage,
    ];

    /// Match a comment key, ignoring case.
    pub fn from_wire(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "nama" => Some(RecognizedKey::Name),
            "paket" => Some(RecognizedKey::Package),
            "harga" => Some(RecognizedKey::Price),
            "due" | "jatuh_tempo" => Some(RecognizedKey::DueDate),
            "no_hp" => Some(RecognizedKey::Phone),
            "iface" => Some(RecognizedKey::Interface),
            "usage" => Some(RecognizedKey::Usage),
            _ => None,
        }
    }

    /// Spelling written to the router.
    pub fn wire_name(self) -> &'static str {
        match self {
            RecognizedKey::Name => "nama",
            RecognizedKey::Package => "paket",
            RecognizedKey::Price => "harga",
            RecognizedKey::DueDate => "due",
            RecognizedKey::Phone => "no_hp",
            RecognizedKey::Interface => "iface",
            RecognizedKey::Usage => "Usage",
        }
    }
}

/// One decoded `key:value` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentField {
    Recognized(RecognizedKey, String),
    Passthrough { key: String, value: String },
}

/// Split a raw comment into fields. Segments without a colon are skipped.
pub fn parse_fields(comment: &str) -> Vec<CommentField> {
    comment
        .split(';')
        .filter_map(|segment| segment.split_once(':'))
        .map(|(key, value)| {
            let key = key.trim();
            let value = value.trim().to_string();
            match RecognizedKey::from_wire(key) {
                Some(recognized) => CommentField::Recognized(recognized, value),
                None => CommentField::Passthrough {
                    key: key.to_string(),
                    value,
                },
            }
        })
        .collect()
}

/// Billing metadata decoded from a lease comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeaseComment {
    pub name: Option<String>,
    pub package: Option<String>,
    pub price: Option<String>,
    pub due_date: Option<String>,
    pub phone: Option<String>,
    pub interface: Option<String>,
    pub usage: Option<String>,
    /// Unrecognized fields in the order they were first seen.
    pub passthrough: Vec<(String, String)>,
}

impl LeaseComment {
    pub fn decode(comment: &str) -> Self {
        let mut decoded = LeaseComment::default();
        for field in parse_fields(comment) {
            match field {
                CommentField::Recognized(key, value) => decoded.set(key, value),
                CommentField::Passthrough { key, value } => decoded.set_passthrough(key, value),
            }
        }
        decoded
    }

    pub fn encode(&self) -> String {
        let recognized = RecognizedKey::CANONICAL_ORDER
            .iter()
            .filter_map(|key| self.get(*key).map(|value| format!("{}:{}", key.wire_name(), value)));
        let passthrough = self
            .passthrough
            .iter()
            .map(|(key, value)| format!("{}:{}", key, value));

        recognized
            .chain(passthrough)
            .collect::<Vec<_>>()
            .join(SEGMENT_SEPARATOR)
    }

    /// Value of a recognized key, `None` when absent or empty.
    pub fn get(&self, key: RecognizedKey) -> Option<&str> {
        self.slot(key).as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Set a recognized key. Empty values clear the field.
    pub fn set(&mut self, key: RecognizedKey, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        *self.slot_mut(key) = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Set a pass-through field, overwriting in place when the key exists.
    pub fn set_passthrough(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.passthrough.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.passthrough.push((key, value)),
        }
    }

    pub fn passthrough_value(&self, key: &str) -> Option<&str> {
        self.passthrough
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True when nothing was decoded, which callers treat as "not a billing lease".
    pub fn is_empty(&self) -> bool {
        RecognizedKey::CANONICAL_ORDER
            .iter()
            .all(|key| self.get(*key).is_none())
            && self.passthrough.is_empty()
    }

    fn slot(&self, key: RecognizedKey) -> &Option<String> {
        match key {
            RecognizedKey::Name => &self.name,
            RecognizedKey::Package => &self.package,
            RecognizedKey::Price => &self.price,
            RecognizedKey::DueDate => &self.due_date,
            RecognizedKey::Phone => &self.phone,
            RecognizedKey::Interface => &self.interface,
            RecognizedKey::Usage => &self.usage,
        }
    }

    fn slot_mut(&mut self, key: RecognizedKey) -> &mut Option<String> {
        match key {
            RecognizedKey::Name => &mut self.name,
            RecognizedKey::Package => &mut self.package,
            RecognizedKey::Price => &mut self.price,
            RecognizedKey::DueDate => &mut self.due_date,
            RecognizedKey::Phone => &mut self.phone,
            RecognizedKey::Interface => &mut self.interface,
            RecognizedKey::Usage => &mut self.usage,
        }
    }
}

/// Replace the usage segment of a raw comment.
///
/// Every segment starting with `Usage:` is removed and a single
/// `Usage: <summary>` segment is appended. All other non-empty segments are
/// kept verbatim (trimmed) and in order.
pub fn merge_usage(old_comment: &str, summary: &str) -> String {
    let mut segments: Vec<&str> = old_comment
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with(USAGE_PREFIX))
        .collect();

    let usage_segment = format!("{} {}", USAGE_PREFIX, summary);
    segments.push(&usage_segment);
    segments.join(SEGMENT_SEPARATOR)
}

/// True when a comment carries anything at all.
pub fn has_content(comment: &str) -> bool {
    !comment.trim().is_empty()
}

/// True when the router sent bytes that were not valid UTF-8. Such a comment
/// was decoded with replacement characters and must not be written back.
pub fn is_lossy(comment: &str) -> bool {
    comment.contains(char::REPLACEMENT_CHARACTER)
}
