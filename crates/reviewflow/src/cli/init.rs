//! `reviewflow init`: default config, empty local tables, and folders.

use super::output::print_table;
use anyhow::{Context, Result};
use reviewflow::ReviewflowConfig;
use reviewflow_schema::{SchemaRegistry, TableVariant};
use reviewflow_store::CsvWorkbook;
use std::fs;
use std::path::Path;

const VARIANTS: [TableVariant; 3] = [
    TableVariant::Intake,
    TableVariant::SecondaryReview,
    TableVariant::Archive,
];

/// One thing `init` made sure exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub item: String,
    pub location: String,
    pub created: bool,
}

pub async fn run(config_path: &Path, config: &ReviewflowConfig, force: bool) -> Result<()> {
    let prepared = prepare(config_path, config, force).await?;
    let rows = prepared
        .into_iter()
        .map(|p| {
            let status = if p.created { "created" } else { "exists" };
            vec![p.item, p.location, status.to_string()]
        })
        .collect();
    print_table(&["Item", "Location", "Status"], rows);
    Ok(())
}

/// Create whatever is missing. Existing tables and folders are left alone.
pub async fn prepare(config_path: &Path, config: &ReviewflowConfig, force: bool) -> Result<Vec<Prepared>> {
    let mut prepared = Vec::new();

    let write_config = force || !config_path.exists();
    if write_config {
        config
            .save(config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }
    prepared.push(Prepared {
        item: "config".to_string(),
        location: config_path.display().to_string(),
        created: write_config,
    });

    let backends = &config.backends;
    let workbook = CsvWorkbook::open(&backends.workbook_dir)
        .with_context(|| format!("Failed to open workbook at {}", backends.workbook_dir.display()))?;
    let registry = SchemaRegistry::new();
    for variant in VARIANTS {
        let table_id = config.tables.id_for(variant);
        let created = workbook.create_table(table_id, &registry.get(variant).header())?;
        prepared.push(Prepared {
            item: format!("{} table", variant),
            location: workbook.table_path(table_id)?.display().to_string(),
            created,
        });
    }

    for (item, folder) in [
        ("intake folder", &config.intake.folder_id),
        ("closed folder", &config.router.closed_folder_id),
        ("archive folder", &config.archive.root_folder_id),
    ] {
        let path = backends.documents_root.join(folder);
        let created = !path.is_dir();
        fs::create_dir_all(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        prepared.push(Prepared {
            item: item.to_string(),
            location: path.display().to_string(),
            created,
        });
    }

    let log_existed = backends.event_log_path.exists();
    super::open_event_log(config).await?;
    prepared.push(Prepared {
        item: "event log".to_string(),
        location: backends.event_log_path.display().to_string(),
        created: !log_existed,
    });

    Ok(prepared)
}
