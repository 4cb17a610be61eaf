//! Manual Customer Store
//!
//! Customers without a router lease live in a local JSON file. The file is the
//! only state this program persists. It is read and rewritten wholesale on every
//! mutation with no locking, so concurrent edits from elsewhere are lost (last
//! writer wins).
//!
//! Records are keyed by the `(name, ip)` pair; there is no surrogate id, so
//! renaming a customer or changing its IP makes it a different record.

use crate::due_date::DueDate;
use crate::models::{parse_price, CustomerRecord, CustomerSource, PLACEHOLDER};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ManualStoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid customer list in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no manual customer named '{name}' with IP '{ip}'")]
    NotFound { name: String, ip: String },

    #[error("manual customer '{name}' with IP '{ip}' already exists")]
    Duplicate { name: String, ip: String },
}

fn placeholder() -> String {
    PLACEHOLDER.to_string()
}

/// One entry of the persisted customer list. Field names match the file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCustomer {
    #[serde(rename = "nama_pelanggan")]
    pub name: String,
    #[serde(rename = "paket", default = "placeholder")]
    pub package: String,
    #[serde(rename = "harga", default, deserialize_with = "lenient_price")]
    pub price: u64,
    #[serde(rename = "no_hp", default = "placeholder")]
    pub phone: String,
    #[serde(rename = "jatuh_tempo", default = "placeholder")]
    pub due_date: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default = "placeholder")]
    pub usage_total: String,
}

/// Older files store the price as text when it was typed with separators.
fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => parse_price(&s).unwrap_or(0),
        _ => 0,
    })
}

impl ManualCustomer {
    pub fn new(name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: placeholder(),
            price: 0,
            phone: placeholder(),
            due_date: placeholder(),
            ip: ip.into(),
            usage_total: placeholder(),
        }
    }

    pub fn matches(&self, name: &str, ip: &str) -> bool {
        self.name == name && normalize_ip(&self.ip) == normalize_ip(ip)
    }

    pub fn to_record(&self) -> CustomerRecord {
        CustomerRecord {
            name: self.name.clone(),
            package: self.package.clone(),
            price: self.price,
            phone: self.phone.clone(),
            due_date: DueDate::parse(&self.due_date),
            ip_address: self.ip.clone(),
            usage_total: self.usage_total.clone(),
            usage_per_interface: Vec::new(),
            source: CustomerSource::Manual,
        }
    }
}

/// `""` and `"-"` both mean "no IP".
fn normalize_ip(ip: &str) -> &str {
    match ip.trim() {
        PLACEHOLDER => "",
        other => other,
    }
}

/// File-backed list of manual customers.
#[derive(Debug, Clone)]
pub struct ManualCustomerStore {
    path: PathBuf,
}

impl ManualCustomerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole list in file order. A missing file is an empty list.
    pub fn load(&self) -> Result<Vec<ManualCustomer>, ManualStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No manual customer file yet");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ManualStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|source| ManualStoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the file with `customers`.
    pub fn save(&self, customers: &[ManualCustomer]) -> Result<(), ManualStoreError> {
        let content = serde_json::to_string_pretty(customers).map_err(|source| ManualStoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        fs::write(&self.path, content).map_err(|source| ManualStoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!(path = %self.path.display(), count = customers.len(), "Manual customer list saved");
        Ok(())
    }

    pub fn find(&self, name: &str, ip: &str) -> Result<Option<ManualCustomer>, ManualStoreError> {
        Ok(self.load()?.into_iter().find(|c| c.matches(name, ip)))
    }

    pub fn add(&self, customer: ManualCustomer) -> Result<(), ManualStoreError> {
        let mut customers = self.load()?;
        if customers.iter().any(|c| c.matches(&customer.name, &customer.ip)) {
            return Err(ManualStoreError::Duplicate {
                name: customer.name,
                ip: customer.ip,
            });
        }
        customers.push(customer);
        self.save(&customers)
    }

    /// Apply `edit` to the record keyed by `(name, ip)` and persist the list.
    pub fn update<F>(&self, name: &str, ip: &str, edit: F) -> Result<ManualCustomer, ManualStoreError>
    where
        F: FnOnce(&mut ManualCustomer),
    {
        let mut customers = self.load()?;
        let customer = customers
            .iter_mut()
            .find(|c| c.matches(name, ip))
            .ok_or_else(|| ManualStoreError::NotFound {
                name: name.to_string(),
                ip: ip.to_string(),
            })?;
        edit(customer);
        let updated = customer.clone();
        self.save(&customers)?;
        Ok(updated)
    }

    pub fn delete(&self, name: &str, ip: &str) -> Result<ManualCustomer, ManualStoreError> {
        let mut customers = self.load()?;
        let index = customers
            .iter()
            .position(|c| c.matches(name, ip))
            .ok_or_else(|| ManualStoreError::NotFound {
                name: name.to_string(),
                ip: ip.to_string(),
            })?;
        let removed = customers.remove(index);
        self.save(&customers)?;
        Ok(removed)
    }
}
