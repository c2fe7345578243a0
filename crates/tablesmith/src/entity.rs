//! Entity instances: one value per row, plus per-column state.

use std::fmt;
use std::sync::Arc;

use crate::{Column, ColumnAccess, EntityDescriptor, Error, Result, Value};

/// One row's worth of values with per-column loaded/set state.
///
/// Freshly created instances are all-unset and not loaded. Setters mark
/// columns Set; load operations mark them Loaded and clear Set once the
/// value is persisted. The two bits are independent: a column can be
/// Loaded and then Set to a new value before a save.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) desc: Arc<EntityDescriptor>,
    pub(crate) values: Vec<Value>,
    pub(crate) loaded: Vec<bool>,
    pub(crate) set: Vec<bool>,
}

impl Entity {
    pub fn new(desc: Arc<EntityDescriptor>) -> Self {
        let n = desc.fields.len();
        Self {
            desc,
            values: vec![Value::Null; n],
            loaded: vec![false; n],
            set: vec![false; n],
        }
    }

    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.desc
    }

    /// Assign a column's value and mark it Set.
    ///
    /// Timestamp values are normalized to UTC by the `Value` conversion,
    /// whatever zone the caller supplies.
    pub fn set(&mut self, column: &Column, value: impl Into<Value>) {
        *column.slot_mut(self) = value.into();
        column.set_set(self, true);
    }

    /// Assign by column name.
    pub fn set_named(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let column = self
            .desc
            .column(name)
            .ok_or_else(|| Error::UnknownColumn {
                name: name.to_string(),
                index: 0,
            })?;
        self.set(&column, value);
        Ok(())
    }

    /// The current value of the named column.
    pub fn value_named(&self, name: &str) -> Option<Value> {
        self.desc
            .field_named(name)
            .map(|f| self.values[f.index].clone())
    }
}

// Renders the fields that are known (Loaded or Set); everything else is
// in-flight state not worth printing.
impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.desc.entity_name)?;
        let mut first = true;
        for field in &self.desc.fields {
            if !self.loaded[field.index] && !self.set[field.index] {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}:{}", field.name, self.values[field.index])?;
        }
        write!(f, "}}")
    }
}
