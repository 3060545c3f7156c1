//! Shared fixtures: a pipeline wired to the in-memory stores.

#![allow(dead_code)]

use reviewflow::{Pipeline, ReviewflowConfig, Services};
use reviewflow_protocol::{Field, ProcessingLogEntry, ReviewRow};
use reviewflow_schema::{SchemaRegistry, TableVariant};
use reviewflow_store::{MemoryDocumentStore, MemoryEventLog, MemoryTableStore, RetryPolicy};
use std::sync::Arc;

pub const INTAKE: &str = "intake";
pub const SECONDARY: &str = "secondary_review";
pub const ARCHIVE: &str = "archive";

pub const INTAKE_FOLDER: &str = "intake";
pub const CLOSED_FOLDER: &str = "closed";
pub const ARCHIVE_FOLDER: &str = "archive";

pub struct Harness {
    pub tables: Arc<MemoryTableStore>,
    pub documents: Arc<MemoryDocumentStore>,
    pub events: Arc<MemoryEventLog>,
    pub pipeline: Pipeline,
    registry: SchemaRegistry,
}

pub fn test_config() -> ReviewflowConfig {
    let mut config = ReviewflowConfig::default();
    config.retry = RetryPolicy::immediate(5);
    config.archive.locate_attempts = 3;
    config.archive.locate_delay_ms = 0;
    config
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ReviewflowConfig) -> Self {
        let registry = SchemaRegistry::new();
        let tables = Arc::new(MemoryTableStore::new());
        for (id, variant) in [
            (INTAKE, TableVariant::Intake),
            (SECONDARY, TableVariant::SecondaryReview),
            (ARCHIVE, TableVariant::Archive),
        ] {
            tables.create_table(id, registry.get(variant).header());
        }

        let documents = Arc::new(MemoryDocumentStore::new());
        documents.add_folder(INTAKE_FOLDER, None, "Intake");
        documents.add_folder(CLOSED_FOLDER, None, "Closed Review");
        documents.add_folder(ARCHIVE_FOLDER, None, "Archive");

        let events = Arc::new(MemoryEventLog::new());
        let services = Services {
            tables: tables.clone(),
            documents: documents.clone(),
            events: events.clone(),
        };
        let pipeline = Pipeline::build(&config, services).await.unwrap();
        tables.reset_calls();

        Self {
            tables,
            documents,
            events,
            pipeline,
            registry,
        }
    }

    fn variant_of(table: &str) -> TableVariant {
        match table {
            INTAKE => TableVariant::Intake,
            SECONDARY => TableVariant::SecondaryReview,
            _ => TableVariant::Archive,
        }
    }

    /// Append rows to a table as a reviewer would, bypassing call counts.
    pub fn seed(&self, table: &str, rows: &[ReviewRow]) {
        let schema = self.registry.get(Self::variant_of(table));
        self.tables
            .seed_rows(table, rows.iter().map(|r| schema.encode(r)).collect());
    }

    /// Current rows of a table, decoded by name.
    pub fn rows(&self, table: &str) -> Vec<ReviewRow> {
        let schema = self.registry.get(Self::variant_of(table));
        self.tables
            .rows(table)
            .iter()
            .map(|cells| schema.decode(cells))
            .collect()
    }

    /// Upload a file into the intake folder.
    pub fn upload(&self, name: &str) -> String {
        self.documents.add_file(INTAKE_FOLDER, name, "alice@example.com", 2048)
    }

    pub fn log(&self) -> Vec<ProcessingLogEntry> {
        self.events.entries()
    }
}

/// An intake row as the intake monitor would have written it.
pub fn intake_row(file_id: &str, file_name: &str, status: &str) -> ReviewRow {
    ReviewRow::new()
        .with(Field::FileId, file_id)
        .with(Field::FileName, file_name)
        .with(Field::FileUrl, format!("memory://{file_id}"))
        .with(Field::Purpose, "FAQ")
        .with(Field::TargetAudience, "NonHCP")
        .with(Field::DescriptiveName, "OA")
        .with(Field::VersionDate, "2025-08-26")
        .with(Field::Version, "V2")
        .with(Field::Uploader, "alice@example.com")
        .with(Field::CreatedAt, "2025-08-26T09:00:00Z")
        .with(Field::Priority, "Normal")
        .with(Field::Status, status)
        .with(Field::ReviewerComment, "")
        .with(Field::RoutedOn, "")
        .with(Field::LastAction, "Registered")
        .with(Field::Error, "")
}
