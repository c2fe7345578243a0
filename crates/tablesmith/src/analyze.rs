//! Result-set analysis: mapping result columns back onto the model.

use std::sync::Arc;

use crate::{ColumnAccess, ColumnSet, Entity, EntityDescriptor, Error, Result, RowData, Value};

/// Map result-set column names to accessors by exact name match.
///
/// A name the model does not know fails with the offending name and its
/// position: the schema and the built model disagree.
pub fn analyze_columns(desc: &Arc<EntityDescriptor>, names: &[String]) -> Result<ColumnSet> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            desc.column(name).ok_or_else(|| Error::UnknownColumn {
                name: name.clone(),
                index,
            })
        })
        .collect()
}

impl Entity {
    /// Scan one row's values into the instance and mark those columns
    /// Loaded. Set flags are untouched; writers clear them once persisted.
    pub fn load_with_columns(&mut self, columns: &ColumnSet, values: Vec<Value>) -> Result<()> {
        if columns.len() != values.len() {
            return Err(Error::RowShape {
                expected: columns.len(),
                got: values.len(),
            });
        }
        for (column, value) in columns.iter().zip(values) {
            *column.slot_mut(self) = value;
        }
        columns.set_loaded(self, true);
        Ok(())
    }
}

/// Load a whole result set into entities, one analysis pass for the set.
pub fn load_many(desc: &Arc<EntityDescriptor>, rows: Vec<RowData>) -> Result<Vec<Entity>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns = analyze_columns(desc, &first.columns)?;

    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let mut entity = Entity::new(Arc::clone(desc));
        entity.load_with_columns(&columns, row.values)?;
        result.push(entity);
    }
    Ok(result)
}
