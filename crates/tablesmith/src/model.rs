//! The per-table entity model.

use std::sync::Arc;

use convert_case::{Case, Casing};
use tracing::{info, warn};

use tablesmith_db_schema::{FieldType, TableSource};

use crate::{Error, Result};

/// The code-level projection of one column. Same ordinal index as the
/// column it projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The column name as it appears in the table.
    pub column_name: String,
    /// The derived code-level name.
    pub name: String,
    /// Ordinal index, aligned with the table's column order.
    pub index: usize,
    /// Representation and ownership mode.
    pub ty: FieldType,
}

/// The complete model of one table: ordered fields, key subsets, timestamp
/// roles. Built once per table at generation time, immutable afterwards,
/// shared via `Arc`.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub(crate) table_name: String,
    pub(crate) entity_name: String,
    pub(crate) fields: Vec<Field>,
    pub(crate) primary_key: Vec<usize>,
    pub(crate) uniques: Vec<Vec<usize>>,
    pub(crate) preferred_unique: Option<usize>,
    pub(crate) created_at: Option<usize>,
    pub(crate) updated_at: Option<usize>,
}

impl EntityDescriptor {
    /// Build the model for one table.
    ///
    /// Fails only for that table; callers building a whole schema collect
    /// failures per table (see [`crate::build_registry`]).
    pub async fn from_source(source: &impl TableSource) -> Result<Self> {
        let table_name = source.name().to_string();
        let entity_name = entity_name_of(&table_name);

        let columns = source.columns().await.map_err(Error::from)?;
        let primary_key_names = source.primary_key().await.map_err(Error::from)?;
        let unique_groups = source.unique_constraints().await.map_err(Error::from)?;
        let foreign_keys = source.foreign_keys().await.map_err(Error::from)?;
        if !foreign_keys.is_empty() {
            info!(
                table = %table_name,
                columns = ?foreign_keys,
                "foreign keys discovered, not modeled"
            );
        }

        let mut fields = Vec::with_capacity(columns.len());
        let mut created_at = None;
        let mut updated_at = None;
        for (index, column) in columns.iter().enumerate() {
            if column.is_creation_timestamp() {
                if created_at.replace(index).is_some() {
                    return Err(Error::Model {
                        table: table_name.clone(),
                        message: "more than one creation-timestamp column".into(),
                    });
                }
            }
            if column.is_update_timestamp() {
                if updated_at.replace(index).is_some() {
                    return Err(Error::Model {
                        table: table_name.clone(),
                        message: "more than one update-timestamp column".into(),
                    });
                }
            }
            fields.push(Field {
                column_name: column.name.clone(),
                name: column.name.to_case(Case::Snake),
                index,
                ty: FieldType::of(column.kind, column.nullable),
            });
        }

        let index_of = |name: &str| fields.iter().position(|f| f.column_name == name);

        let mut primary_key = Vec::with_capacity(primary_key_names.len());
        for name in &primary_key_names {
            match index_of(name) {
                Some(index) => primary_key.push(index),
                None => {
                    // A key over a column that was not modeled (skipped
                    // type) cannot identify a row.
                    warn!(table = %table_name, column = %name, "primary key column not modeled, dropping key");
                    primary_key.clear();
                    break;
                }
            }
        }

        // Each constraint stays a separate subset; overlapping constraints
        // are never merged.
        let mut uniques = Vec::with_capacity(unique_groups.len());
        for group in &unique_groups {
            let indices: Option<Vec<usize>> = group.iter().map(|name| index_of(name)).collect();
            match indices {
                Some(indices) if !indices.is_empty() => uniques.push(indices),
                _ => {
                    warn!(table = %table_name, columns = ?group, "unique constraint over unmodeled columns, dropping");
                }
            }
        }

        let preferred_unique = preferred_unique_of(&fields, &uniques);
        if let Some(index) = preferred_unique {
            info!(
                table = %table_name,
                column = %fields[index].column_name,
                "preferred unique column"
            );
        }

        Ok(Self {
            table_name,
            entity_name,
            fields,
            primary_key,
            uniques,
            preferred_unique,
            created_at,
            updated_at,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The code-level name of the entity, for diagnostics.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Look up a field by its column name.
    pub fn field_named(&self, column_name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.column_name == column_name)
    }

    /// Wrap in an `Arc`, the form every runtime consumer takes.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Singular PascalCase name derived from the table name.
fn entity_name_of(table_name: &str) -> String {
    let pascal = table_name.to_case(Case::Pascal);
    match pascal.strip_suffix('s') {
        Some(singular) if !singular.is_empty() => singular.to_string(),
        _ => pascal,
    }
}

/// The preferred unique field: cheapest single-column identity.
///
/// Only single-column constraints qualify. In column order: the first
/// integer-kind field wins, else the first declared.
fn preferred_unique_of(fields: &[Field], uniques: &[Vec<usize>]) -> Option<usize> {
    let mut singles: Vec<usize> = uniques
        .iter()
        .filter(|group| group.len() == 1)
        .map(|group| group[0])
        .collect();
    singles.sort_unstable();
    singles.dedup();

    singles
        .iter()
        .copied()
        .find(|&i| fields[i].ty.kind.is_integer())
        .or_else(|| singles.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesmith_db_schema::{FieldKind, SqlKind, StaticTable};

    fn trucks() -> StaticTable {
        StaticTable::new("trucks")
            .column("id", SqlKind::Integer, false)
            .column("make", SqlKind::Text, false)
            .column("model", SqlKind::Text, false)
            .column("tonnage", SqlKind::Real, false)
            .column("created_at", SqlKind::Timestamp, false)
            .column("updated_at", SqlKind::Timestamp, false)
            .primary_key(&["id"])
            .unique(&["id"])
    }

    #[tokio::test]
    async fn builds_fields_in_column_order() {
        let desc = EntityDescriptor::from_source(&trucks()).await.unwrap();
        assert_eq!(desc.table_name(), "trucks");
        assert_eq!(desc.entity_name(), "Truck");
        let names: Vec<&str> = desc.fields().iter().map(|f| f.column_name.as_str()).collect();
        assert_eq!(names, ["id", "make", "model", "tonnage", "created_at", "updated_at"]);
        for (i, field) in desc.fields().iter().enumerate() {
            assert_eq!(field.index, i);
        }
        assert_eq!(desc.field_named("tonnage").unwrap().ty.kind, FieldKind::Float32);
    }

    #[tokio::test]
    async fn detects_timestamp_roles_by_convention() {
        let desc = EntityDescriptor::from_source(&trucks()).await.unwrap();
        assert_eq!(desc.created_at, Some(4));
        assert_eq!(desc.updated_at, Some(5));
    }

    #[tokio::test]
    async fn preferred_unique_favors_integer_kinds() {
        let table = StaticTable::new("pizza_delivery_guys")
            .column("name", SqlKind::Text, false)
            .column("employee_no", SqlKind::BigInt, false)
            .unique(&["name"])
            .unique(&["employee_no"]);
        let desc = EntityDescriptor::from_source(&table).await.unwrap();
        // "name" is declared first, but the integer column wins.
        assert_eq!(desc.preferred_unique, Some(1));
    }

    #[tokio::test]
    async fn preferred_unique_falls_back_to_first_declared() {
        let table = StaticTable::new("pizza_delivery_guys")
            .column("name", SqlKind::Text, false)
            .column("route", SqlKind::Text, false)
            .unique(&["name"])
            .unique(&["route"]);
        let desc = EntityDescriptor::from_source(&table).await.unwrap();
        assert_eq!(desc.preferred_unique, Some(0));
    }

    #[tokio::test]
    async fn composite_uniques_stay_separate_and_never_qualify_as_preferred() {
        let table = StaticTable::new("cars")
            .column("make", SqlKind::Text, false)
            .column("model", SqlKind::Text, false)
            .column("vin", SqlKind::Text, false)
            .unique(&["make", "model"])
            .unique(&["vin"]);
        let desc = EntityDescriptor::from_source(&table).await.unwrap();
        assert_eq!(desc.uniques, vec![vec![0, 1], vec![2]]);
        assert_eq!(desc.preferred_unique, Some(2));
    }

    #[tokio::test]
    async fn foreign_keys_are_discovered_but_not_modeled() {
        let table = StaticTable::new("deliveries")
            .column("id", SqlKind::Integer, false)
            .column("truck_id", SqlKind::Integer, false)
            .primary_key(&["id"])
            .unique(&["id"])
            .foreign_key("truck_id");
        let desc = EntityDescriptor::from_source(&table).await.unwrap();
        // The referencing column is an ordinary field; the constraint adds
        // no key subset.
        assert_eq!(desc.fields().len(), 2);
        assert_eq!(desc.uniques, vec![vec![0]]);
        assert_eq!(desc.primary_key, vec![0]);
    }

    #[tokio::test]
    async fn duplicate_timestamp_roles_are_a_modeling_error() {
        // Two created_at columns cannot come out of a real catalog, but a
        // provider bug should not silently pick one.
        let table = StaticTable::new("events")
            .column("created_at", SqlKind::Timestamp, false)
            .column("created_at", SqlKind::Timestamp, true);
        let err = EntityDescriptor::from_source(&table).await.unwrap_err();
        assert!(matches!(err, Error::Model { .. }));
    }
}
