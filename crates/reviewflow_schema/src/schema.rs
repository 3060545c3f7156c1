//! Physical table layouts and name-based conversion.

use crate::error::{Result, SchemaError};
use crate::registry::TableVariant;
use reviewflow_protocol::defaults::NOT_ASSESSED;
use reviewflow_protocol::{Field, ReviewRow};
use std::collections::HashMap;

/// Documented default for a field that a source row does not carry.
pub fn default_for(field: Field) -> &'static str {
    match field {
        Field::MedicalRisk | Field::LegalRisk | Field::RegulatoryRisk => NOT_ASSESSED,
        _ => "",
    }
}

/// Column layout of one physical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    variant: TableVariant,
    /// One slot per physical column; None for columns the registry doesn't know
    slots: Vec<Option<Field>>,
    /// Known fields in physical order
    fields: Vec<Field>,
    index: HashMap<Field, usize>,
}

impl TableSchema {
    /// Registry layout for a variant.
    pub fn canonical(variant: TableVariant) -> Self {
        let fields = variant.canonical_columns().to_vec();
        let index = fields.iter().enumerate().map(|(i, f)| (*f, i)).collect();
        Self {
            variant,
            slots: fields.iter().copied().map(Some).collect(),
            fields,
            index,
        }
    }

    /// Layout read from a live header row.
    ///
    /// Columns may appear in any order and unknown columns are carried as
    /// opaque slots, but every canonical field of the variant must be present.
    pub fn from_header(variant: TableVariant, table: &str, header: &[String]) -> Result<Self> {
        let mut slots = Vec::with_capacity(header.len());
        let mut index = HashMap::new();
        for (i, cell) in header.iter().enumerate() {
            let field = Field::parse(cell.trim());
            if let Some(field) = field {
                if index.insert(field, i).is_some() {
                    return Err(SchemaError::DuplicateColumn {
                        table: table.to_string(),
                        field: field.as_str().to_string(),
                    });
                }
            }
            slots.push(field);
        }

        let missing: Vec<String> = variant
            .canonical_columns()
            .iter()
            .filter(|f| !index.contains_key(f))
            .map(|f| f.as_str().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns {
                table: table.to_string(),
                missing,
            });
        }

        let fields = slots.iter().flatten().copied().collect();
        Ok(Self {
            variant,
            slots,
            fields,
            index,
        })
    }

    pub fn variant(&self) -> TableVariant {
        self.variant
    }

    /// Known fields in physical order.
    pub fn columns(&self) -> &[Field] {
        &self.fields
    }

    /// Number of physical columns, including unknown ones.
    pub fn width(&self) -> usize {
        self.slots.len()
    }

    pub fn index_of(&self, field: Field) -> Option<usize> {
        self.index.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.index.contains_key(&field)
    }

    /// Header row for creating a table with this layout.
    pub fn header(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| slot.map(|f| f.as_str().to_string()).unwrap_or_default())
            .collect()
    }

    /// Read a physical row into named fields.
    ///
    /// Short rows (trailing blank cells trimmed by the store) read as empty.
    pub fn decode(&self, cells: &[String]) -> ReviewRow {
        let mut row = ReviewRow::new();
        for (field, idx) in &self.index {
            let value = cells.get(*idx).map(String::as_str).unwrap_or("");
            row.set(*field, value);
        }
        row
    }

    /// Lay out named fields physically.
    ///
    /// Fields the row does not carry are padded with their documented
    /// default at their own named position.
    pub fn encode(&self, row: &ReviewRow) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Some(field) if row.has(*field) => row.get(*field).to_string(),
                Some(field) => default_for(*field).to_string(),
                None => String::new(),
            })
            .collect()
    }

    /// Translate named updates into a column-index patch.
    pub fn patch(&self, updates: &[(Field, String)]) -> Result<Vec<(usize, String)>> {
        updates
            .iter()
            .map(|(field, value)| {
                self.index_of(*field)
                    .map(|idx| (idx, value.clone()))
                    .ok_or_else(|| SchemaError::UnknownField {
                        table: self.variant.as_str().to_string(),
                        field: field.as_str().to_string(),
                    })
            })
            .collect()
    }
}

/// Convert a physical row from one layout to another by field name.
pub fn remap(cells: &[String], from: &TableSchema, to: &TableSchema) -> Vec<String> {
    to.encode(&from.decode(cells))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake_cells() -> (TableSchema, Vec<String>) {
        let schema = TableSchema::canonical(TableVariant::Intake);
        let cells = schema
            .columns()
            .iter()
            .map(|f| format!("{}-value", f.as_str()))
            .collect();
        (schema, cells)
    }

    #[test]
    fn remap_preserves_every_named_value() {
        let (intake, cells) = intake_cells();
        let secondary = TableSchema::canonical(TableVariant::SecondaryReview);

        let remapped = remap(&cells, &intake, &secondary);
        assert_eq!(remapped.len(), secondary.width());

        let source = intake.decode(&cells);
        let dest = secondary.decode(&remapped);
        for field in intake.columns() {
            assert_eq!(dest.get(*field), source.get(*field), "field {field} drifted");
        }
    }

    #[test]
    fn remap_pads_inserted_columns_with_defaults() {
        let (intake, cells) = intake_cells();
        let secondary = TableSchema::canonical(TableVariant::SecondaryReview);
        let remapped = remap(&cells, &intake, &secondary);

        for risk in [Field::MedicalRisk, Field::LegalRisk, Field::RegulatoryRisk] {
            let idx = secondary.index_of(risk).unwrap();
            assert_eq!(remapped[idx], NOT_ASSESSED);
        }
        let comment = secondary.index_of(Field::SecondaryComment).unwrap();
        assert_eq!(remapped[comment], "");
        // Naive positional concatenation would have put RoutedOn's value here.
        assert_ne!(remapped[intake.index_of(Field::RoutedOn).unwrap()], "RoutedOn-value");
    }

    #[test]
    fn header_order_is_respected() {
        let header: Vec<String> = ["Status", "Extra", "FileID"]
            .iter()
            .map(|s| s.to_string())
            .chain(
                TableVariant::Intake
                    .canonical_columns()
                    .iter()
                    .filter(|f| !matches!(f, Field::Status | Field::FileId))
                    .map(|f| f.as_str().to_string()),
            )
            .collect();
        let schema = TableSchema::from_header(TableVariant::Intake, "intake", &header).unwrap();
        assert_eq!(schema.index_of(Field::Status), Some(0));
        assert_eq!(schema.index_of(Field::FileId), Some(2));
        assert_eq!(schema.width(), header.len());

        let row = ReviewRow::new()
            .with(Field::FileId, "id-9")
            .with(Field::Status, "pending");
        let cells = schema.encode(&row);
        assert_eq!(cells[0], "pending");
        assert_eq!(cells[1], "");
        assert_eq!(cells[2], "id-9");
    }

    #[test]
    fn missing_columns_are_reported_by_name() {
        let header = vec!["FileID".to_string(), "Status".to_string()];
        let err = TableSchema::from_header(TableVariant::Intake, "intake", &header).unwrap_err();
        match err {
            SchemaError::MissingColumns { missing, .. } => {
                assert!(missing.contains(&"RoutedOn".to_string()));
                assert!(!missing.contains(&"FileID".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let mut header = TableSchema::canonical(TableVariant::Intake).header();
        header.push("File ID".to_string());
        assert!(matches!(
            TableSchema::from_header(TableVariant::Intake, "intake", &header),
            Err(SchemaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn patch_addresses_columns_by_name() {
        let secondary = TableSchema::canonical(TableVariant::SecondaryReview);
        let patch = secondary
            .patch(&[
                (Field::RoutedOn, "2025-01-01T00:00:00Z".to_string()),
                (Field::LastAction, "moved".to_string()),
            ])
            .unwrap();
        assert_eq!(patch[0].0, 17);
        assert_eq!(patch[1].0, 18);

        let intake = TableSchema::canonical(TableVariant::Intake);
        assert!(intake.patch(&[(Field::MedicalRisk, "High".to_string())]).is_err());
    }

    #[test]
    fn short_rows_decode_as_blank() {
        let intake = TableSchema::canonical(TableVariant::Intake);
        let row = intake.decode(&["id-1".to_string(), "a.docx".to_string()]);
        assert_eq!(row.file_id(), "id-1");
        assert_eq!(row.get(Field::Error), "");
        assert!(!row.is_routed());
    }
}
