use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Spelling a due date was written in. Lease comments written from the
/// router side use `dd/mm/yyyy`, the manual customer list uses ISO dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateStyle {
    DayMonthYear,
    Iso,
}

impl DateStyle {
    fn pattern(self) -> &'static str {
        match self {
            DateStyle::DayMonthYear => "%d/%m/%Y",
            DateStyle::Iso => "%Y-%m-%d",
        }
    }
}

/// A billing due date.
///
/// Parsed dates keep the spelling they came in with so that writing a record
/// back does not silently change the stored format. Text that is neither
/// spelling is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DueDate {
    Date { date: NaiveDate, style: DateStyle },
    Raw(String),
    #[default]
    Missing,
}

impl DueDate {
    /// Parse a due date, never failing. `""` and `"-"` mean no due date.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text == "-" {
            return DueDate::Missing;
        }

        match Self::parse_strict(text) {
            Ok(due) => due,
            Err(_) => DueDate::Raw(text.to_string()),
        }
    }

    /// Parse a due date in one of the two accepted spellings.
    pub fn parse_strict(text: &str) -> Result<Self> {
        let text = text.trim();
        for style in [DateStyle::DayMonthYear, DateStyle::Iso] {
            if let Ok(date) = NaiveDate::parse_from_str(text, style.pattern()) {
                return Ok(DueDate::Date { date, style });
            }
        }

        anyhow::bail!("Failed to parse due date '{}', expected dd/mm/yyyy or YYYY-MM-DD", text)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DueDate::Date { date, .. } => Some(*date),
            _ => None,
        }
    }

    /// Canonical `YYYY-MM-DD` form, when the date could be parsed.
    pub fn to_iso(&self) -> Option<String> {
        self.date().map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.date().map(|d| d < today).unwrap_or(false)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, DueDate::Missing)
    }
}

impl fmt::Display for DueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueDate::Date { date, style } => write!(f, "{}", date.format(style.pattern())),
            DueDate::Raw(text) => f.write_str(text),
            DueDate::Missing => f.write_str("-"),
        }
    }
}

impl Serialize for DueDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DueDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(DueDate::parse(&text))
    }
}
