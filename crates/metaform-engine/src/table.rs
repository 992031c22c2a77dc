//! Table model
//!
//! Columns come from the fields that carry table display config, in field
//! order. Cells are derived from row records with each column's accessor;
//! row actions are gated by the operations the entity allows.

use metaform_meta::path::identifier;
use metaform_meta::{EntityMetadata, Operation};
use serde::Serialize;
use serde_json::Value;

/// Table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Field the column belongs to
    pub field: String,
    /// Header text
    pub header: String,
}

/// Action offered for a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    View,
    Edit,
    Delete,
}

impl RowAction {
    /// Operation the action needs
    #[must_use]
    pub fn operation(self) -> Operation {
        match self {
            Self::View => Operation::Read,
            Self::Edit => Operation::Update,
            Self::Delete => Operation::Delete,
        }
    }
}

/// Table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// Record identifier, when the record has one
    pub id: Option<String>,
    /// Cell text, one per column
    pub cells: Vec<String>,
    /// Offered actions
    pub actions: Vec<RowAction>,
}

/// Rendered table of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Entity name
    pub entity: String,
    /// Columns
    pub columns: Vec<Column>,
    /// Rows, in list order
    pub rows: Vec<Row>,
    /// Whether a list fetch is in flight
    pub loading: bool,
    /// Message of the last failed list fetch
    pub error: Option<String>,
}

impl Table {
    /// Build a table from fetched records
    #[must_use]
    pub fn build(meta: &EntityMetadata, records: &[Value]) -> Self {
        let columns = meta
            .columns()
            .map(|(field, display)| Column {
                field: field.name.clone(),
                header: display.header.clone(),
            })
            .collect();

        let allowed: Vec<RowAction> = [RowAction::View, RowAction::Edit, RowAction::Delete]
            .into_iter()
            .filter(|action| meta.allows(action.operation()))
            .collect();

        let rows = records
            .iter()
            .map(|record| {
                let id = record.get("id").and_then(identifier);
                Row {
                    cells: meta.columns().map(|(_, display)| display.cell(record)).collect(),
                    actions: if id.is_some() { allowed.clone() } else { Vec::new() },
                    id,
                }
            })
            .collect();

        Self {
            entity: meta.name().to_string(),
            columns,
            rows,
            loading: false,
            error: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaform_meta::{FieldDescriptor, Projection, ReferenceConfig};
    use metaform_test_utils::{bank, bank_records, project};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(records: &Value) -> &[Value] {
        records.as_array().map(Vec::as_slice).unwrap_or_default()
    }

    #[test]
    fn columns_follow_field_order() {
        let table = Table::build(&bank(), rows(&bank_records()));
        let headers: Vec<&str> = table.columns.iter().map(|c| c.header.as_str()).collect();
        assert_eq!(headers, vec!["Name", "Code"]);
        assert_eq!(table.rows[0].cells[0], "Commercial Bank");
        assert_eq!(table.rows[0].id.as_deref(), Some("b1"));
    }

    #[test]
    fn actions_gated_by_operations() {
        let table = Table::build(&project(), &[json!({"id": 1, "title": "Apollo", "members": []})]);
        assert_eq!(table.rows[0].actions, vec![RowAction::View, RowAction::Edit]);

        let table = Table::build(&bank(), rows(&bank_records()));
        assert_eq!(
            table.rows[0].actions,
            vec![RowAction::View, RowAction::Edit, RowAction::Delete]
        );
    }

    #[test]
    fn reference_list_column_joins_labels() {
        let reference = ReferenceConfig::new("/departments").with_label(Projection::parse("title"));
        let meta = EntityMetadata::builder("Employee", "/employees")
            .field(FieldDescriptor::text("name").column("Name"))
            .field(FieldDescriptor::reference_list("departments", reference).column("Departments"))
            .build()
            .unwrap();
        let records = json!([
            {"id": "e1", "name": "Ada", "departments": [{"id": 1, "title": "Research"}, {"id": 2, "title": "Ops"}]},
            {"id": "e2", "name": "Alan", "departments": []}
        ]);
        let table = Table::build(&meta, rows(&records));
        assert_eq!(table.columns[1].header, "Departments");
        assert_eq!(table.rows[0].cells, vec!["Ada", "Research, Ops"]);
        assert_eq!(table.rows[1].cells, vec!["Alan", ""]);
    }

    #[test]
    fn rows_without_id_get_no_actions() {
        let table = Table::build(&bank(), &[json!({"name": "Orphan"})]);
        assert!(table.rows[0].actions.is_empty());
        assert_eq!(table.rows[0].cells, vec!["Orphan", ""]);
    }
}
