//! Column accessors: per-field capabilities over entity instances.
//!
//! A [`Column`] is a cheap handle (descriptor + ordinal index) exposing
//! name, index, value/slot access, and the per-instance loaded/set flags.
//! A [`ColumnSet`] is the ordered collection with the bulk operations the
//! statement synthesizer works in terms of.

use std::sync::Arc;

use tablesmith_db_schema::FieldType;

use crate::{Entity, EntityDescriptor, Value};

/// Accessor for one column of one entity type.
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) desc: Arc<EntityDescriptor>,
    pub(crate) index: usize,
}

impl Column {
    /// The column name as it appears in SQL.
    pub fn name(&self) -> &str {
        &self.desc.fields[self.index].column_name
    }

    /// Ordinal index within the table's column order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn field_type(&self) -> FieldType {
        self.desc.fields[self.index].ty
    }

    /// True when the instance's value reflects the persisted store.
    pub fn is_loaded(&self, entity: &Entity) -> bool {
        self.check(entity);
        entity.loaded[self.index]
    }

    /// True when the instance's value was locally assigned and is pending
    /// a write.
    pub fn is_set(&self, entity: &Entity) -> bool {
        self.check(entity);
        entity.set[self.index]
    }

    pub fn set_loaded(&self, entity: &mut Entity, loaded: bool) {
        self.check(entity);
        entity.loaded[self.index] = loaded;
    }

    pub fn set_set(&self, entity: &mut Entity, set: bool) {
        self.check(entity);
        entity.set[self.index] = set;
    }

    /// The instance's current value. `Null` for an unset nullable field.
    pub fn value_of(&self, entity: &Entity) -> Value {
        self.check(entity);
        entity.values[self.index].clone()
    }

    /// Write access to the instance's value slot. Does not touch flags.
    pub fn slot_mut<'e>(&self, entity: &'e mut Entity) -> &'e mut Value {
        self.check(entity);
        &mut entity.values[self.index]
    }

    fn check(&self, entity: &Entity) {
        debug_assert!(
            Arc::ptr_eq(&self.desc, &entity.desc),
            "column of table {:?} used with an entity of table {:?}",
            self.desc.table_name,
            entity.desc.table_name,
        );
    }
}

/// An ordered collection of column accessors.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Current values, in collection order.
    pub fn values_of(&self, entity: &Entity) -> Vec<Value> {
        self.columns.iter().map(|c| c.value_of(entity)).collect()
    }

    pub fn set_loaded(&self, entity: &mut Entity, loaded: bool) {
        for column in &self.columns {
            column.set_loaded(entity, loaded);
        }
    }

    pub fn set_set(&self, entity: &mut Entity, set: bool) {
        for column in &self.columns {
            column.set_set(entity, set);
        }
    }

    pub fn contains(&self, column: &Column) -> bool {
        self.columns.iter().any(|c| c.index == column.index)
    }

    pub fn push(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn as_slice(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl From<Vec<Column>> for ColumnSet {
    fn from(columns: Vec<Column>) -> Self {
        Self { columns }
    }
}

impl FromIterator<Column> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ColumnSet {
    type Item = Column;
    type IntoIter = std::vec::IntoIter<Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Accessor surface of a shared descriptor.
///
/// Column handles hold the descriptor they came from, so the handle
/// constructors live on `Arc<EntityDescriptor>` rather than the bare
/// descriptor.
pub trait ColumnAccess {
    /// Accessor for the named column.
    fn column(&self, name: &str) -> Option<Column>;

    /// Accessor for the column at `index`.
    fn column_at(&self, index: usize) -> Column;

    /// Every column, in ordinal order.
    fn all_columns(&self) -> ColumnSet;

    /// The primary-key columns, in key declaration order.
    fn primary_key_columns(&self) -> ColumnSet;

    /// One set per unique constraint, in declaration order.
    fn unique_column_sets(&self) -> Vec<ColumnSet>;

    /// The cheapest single-column identity, if the table has one.
    fn preferred_unique_column(&self) -> Option<Column>;

    fn created_at_column(&self) -> Option<Column>;

    fn updated_at_column(&self) -> Option<Column>;
}

impl ColumnAccess for Arc<EntityDescriptor> {
    fn column(&self, name: &str) -> Option<Column> {
        self.field_named(name).map(|f| Column {
            desc: Arc::clone(self),
            index: f.index,
        })
    }

    fn column_at(&self, index: usize) -> Column {
        debug_assert!(index < self.fields.len());
        Column {
            desc: Arc::clone(self),
            index,
        }
    }

    fn all_columns(&self) -> ColumnSet {
        (0..self.fields.len()).map(|i| self.column_at(i)).collect()
    }

    fn primary_key_columns(&self) -> ColumnSet {
        self.primary_key.iter().map(|&i| self.column_at(i)).collect()
    }

    fn unique_column_sets(&self) -> Vec<ColumnSet> {
        self.uniques
            .iter()
            .map(|group| group.iter().map(|&i| self.column_at(i)).collect())
            .collect()
    }

    fn preferred_unique_column(&self) -> Option<Column> {
        self.preferred_unique.map(|i| self.column_at(i))
    }

    fn created_at_column(&self) -> Option<Column> {
        self.created_at.map(|i| self.column_at(i))
    }

    fn updated_at_column(&self) -> Option<Column> {
        self.updated_at.map(|i| self.column_at(i))
    }
}
