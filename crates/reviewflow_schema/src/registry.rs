//! Canonical layouts per table variant.

use crate::error::Result;
use crate::schema::TableSchema;
use reviewflow_protocol::Field;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of review table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableVariant {
    Intake,
    SecondaryReview,
    Archive,
}

impl TableVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::SecondaryReview => "secondary_review",
            Self::Archive => "archive",
        }
    }

    /// Canonical physical column order for this variant.
    pub fn canonical_columns(&self) -> &'static [Field] {
        match self {
            Self::Intake => INTAKE_COLUMNS,
            Self::SecondaryReview => SECONDARY_REVIEW_COLUMNS,
            Self::Archive => ARCHIVE_COLUMNS,
        }
    }
}

impl fmt::Display for TableVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const INTAKE_COLUMNS: &[Field] = &[
    Field::FileId,
    Field::FileName,
    Field::FileUrl,
    Field::Purpose,
    Field::TargetAudience,
    Field::DescriptiveName,
    Field::VersionDate,
    Field::Version,
    Field::Uploader,
    Field::CreatedAt,
    Field::Priority,
    Field::Status,
    Field::ReviewerComment,
    Field::RoutedOn,
    Field::LastAction,
    Field::Error,
];

// Risk and second-stage comment columns sit between Status/ReviewerComment
// and the routing bookkeeping columns.
const SECONDARY_REVIEW_COLUMNS: &[Field] = &[
    Field::FileId,
    Field::FileName,
    Field::FileUrl,
    Field::Purpose,
    Field::TargetAudience,
    Field::DescriptiveName,
    Field::VersionDate,
    Field::Version,
    Field::Uploader,
    Field::CreatedAt,
    Field::Priority,
    Field::Status,
    Field::ReviewerComment,
    Field::MedicalRisk,
    Field::LegalRisk,
    Field::RegulatoryRisk,
    Field::SecondaryComment,
    Field::RoutedOn,
    Field::LastAction,
    Field::Error,
];

const ARCHIVE_COLUMNS: &[Field] = &[
    Field::FileId,
    Field::FileName,
    Field::FileUrl,
    Field::Purpose,
    Field::TargetAudience,
    Field::DescriptiveName,
    Field::VersionDate,
    Field::Version,
    Field::Uploader,
    Field::CreatedAt,
    Field::Priority,
    Field::Status,
    Field::ReviewerComment,
    Field::MedicalRisk,
    Field::LegalRisk,
    Field::RegulatoryRisk,
    Field::SecondaryComment,
    Field::SourceTable,
    Field::Sprint,
    Field::ArchivedOn,
    Field::RoutedOn,
    Field::LastAction,
    Field::Error,
];

/// Static name ↔ index maps for every table variant.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<TableVariant, TableSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let schemas = [
            TableVariant::Intake,
            TableVariant::SecondaryReview,
            TableVariant::Archive,
        ]
        .into_iter()
        .map(|variant| (variant, TableSchema::canonical(variant)))
        .collect();
        Self { schemas }
    }

    /// Canonical schema for a variant.
    pub fn get(&self, variant: TableVariant) -> &TableSchema {
        // Every variant is registered in new().
        &self.schemas[&variant]
    }

    /// Schema for a live table, built from its actual header row.
    ///
    /// Falls back to the canonical layout when the table reports no header.
    pub fn resolve(&self, variant: TableVariant, table: &str, header: &[String]) -> Result<TableSchema> {
        if header.iter().all(|h| h.trim().is_empty()) {
            return Ok(self.get(variant).clone());
        }
        TableSchema::from_header(variant, table, header)
    }
}
