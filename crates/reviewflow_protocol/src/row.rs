//! Logical review rows, keyed by field name.

use crate::fields::Field;
use crate::status::ReviewStatus;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timestamp format used in every table cell (RFC 3339, second precision, `Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// One row of a review table, independent of any physical column order.
///
/// Fields that were never set read as empty strings, matching how blank
/// cells come back from the table store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewRow {
    values: BTreeMap<Field, String>,
}

impl ReviewRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    /// Builder-style setter.
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Whether the field was present in the source row (even if blank).
    pub fn has(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Stable cross-table join key.
    pub fn file_id(&self) -> &str {
        self.get(Field::FileId)
    }

    pub fn file_name(&self) -> &str {
        self.get(Field::FileName)
    }

    pub fn status(&self) -> ReviewStatus {
        ReviewStatus::parse(self.get(Field::Status))
    }

    /// The routing idempotency marker, if set.
    pub fn routed_on(&self) -> Option<&str> {
        let value = self.get(Field::RoutedOn);
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn is_routed(&self) -> bool {
        self.routed_on().is_some()
    }
}
