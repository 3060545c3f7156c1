//! Wiring collaborator stores and configuration into the three components.

use crate::archive::{ArchiveProcessor, ArchiveSettings, ArchiveSource, Selection};
use crate::config::ReviewflowConfig;
use crate::error::Result;
use crate::intake::IntakeMonitor;
use crate::router::StatusRouter;
use crate::runner::PollingLoop;
use reviewflow_schema::{SchemaRegistry, TableVariant};
use reviewflow_store::{
    CsvWorkbook, DocumentStore, EventLog, LocalDocumentStore, SqliteEventLog, TableAdapter, TableStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The external systems the pipeline talks to.
#[derive(Clone)]
pub struct Services {
    pub tables: Arc<dyn TableStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub events: Arc<dyn EventLog>,
}

impl Services {
    /// Local backends: CSV workbook, directory tree, SQLite log.
    pub async fn local(config: &ReviewflowConfig) -> Result<Self> {
        let backends = &config.backends;
        let tables = CsvWorkbook::open(&backends.workbook_dir)?;
        let documents = LocalDocumentStore::open(&backends.documents_root)?;
        let events = SqliteEventLog::open(&backends.event_log_path).await?;
        Ok(Self {
            tables: Arc::new(tables),
            documents: Arc::new(documents),
            events: Arc::new(events),
        })
    }
}

async fn open_table(
    config: &ReviewflowConfig,
    services: &Services,
    registry: &SchemaRegistry,
    variant: TableVariant,
) -> Result<Arc<TableAdapter>> {
    let adapter = TableAdapter::open(
        Arc::clone(&services.tables),
        config.tables.id_for(variant),
        variant,
        registry,
        config.retry.clone(),
        config.timeouts.remote_call(),
    )
    .await?;
    Ok(Arc::new(adapter))
}

pub struct Pipeline {
    pub intake: Arc<IntakeMonitor>,
    pub router: Arc<StatusRouter>,
    pub archive: Arc<ArchiveProcessor>,
    pub services: Services,
    intake_interval: Duration,
    router_interval: Duration,
}

impl Pipeline {
    /// Open every configured table (verifying headers) and build the components.
    pub async fn build(config: &ReviewflowConfig, services: Services) -> Result<Self> {
        let registry = SchemaRegistry::new();
        let timeout = config.timeouts.remote_call();

        let intake_table = open_table(config, &services, &registry, TableVariant::Intake).await?;
        let secondary_table = open_table(config, &services, &registry, TableVariant::SecondaryReview).await?;
        let archive_table = open_table(config, &services, &registry, TableVariant::Archive).await?;

        let intake = IntakeMonitor::new(
            Arc::clone(&services.documents),
            Arc::clone(&intake_table),
            Arc::clone(&services.events),
            config.intake.folder_id.clone(),
            config.intake.default_priority.clone(),
            timeout,
        );
        let router = StatusRouter::new(
            Arc::clone(&services.documents),
            Arc::clone(&intake_table),
            Arc::clone(&secondary_table),
            Arc::clone(&services.events),
            config.router.closed_folder_id.clone(),
            timeout,
        );

        let sources = config
            .archive
            .sources
            .iter()
            .map(|s| ArchiveSource {
                name: s.name.clone(),
                table: match s.table {
                    TableVariant::Intake => Arc::clone(&intake_table),
                    _ => Arc::clone(&secondary_table),
                },
                selection: Selection::from_config(s.select_status.as_deref()),
            })
            .collect();
        let archive = ArchiveProcessor::new(
            Arc::clone(&services.documents),
            archive_table,
            sources,
            Arc::clone(&services.events),
            ArchiveSettings {
                root_folder_id: config.archive.root_folder_id.clone(),
                locate_attempts: config.archive.locate_attempts,
                locate_delay: config.archive.locate_delay(),
                timeout,
            },
        );

        info!("Pipeline ready");
        Ok(Self {
            intake: Arc::new(intake),
            router: Arc::new(router),
            archive: Arc::new(archive),
            services,
            intake_interval: Duration::from_secs(config.intake.poll_interval_secs),
            router_interval: Duration::from_secs(config.router.poll_interval_secs),
        })
    }

    pub fn intake_loop(&self) -> PollingLoop<IntakeMonitor> {
        PollingLoop::new(Arc::clone(&self.intake), self.intake_interval)
    }

    pub fn router_loop(&self) -> PollingLoop<StatusRouter> {
        PollingLoop::new(Arc::clone(&self.router), self.router_interval)
    }
}
