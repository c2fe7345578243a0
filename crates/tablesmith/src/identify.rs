//! Identifying-column resolution.

use crate::{ColumnAccess, ColumnSet, Entity, Error, Result};

impl Entity {
    /// The minimal column set that uniquely determines this instance's row,
    /// chosen from columns whose values are known (Loaded or Set).
    ///
    /// Policy, first match wins:
    ///
    /// 1. each unique-constraint subset, in declaration order, with every
    ///    member known; a single unique column is cheaper in a WHERE
    ///    clause than a composite key;
    /// 2. the full primary key, if non-empty and every member known; a
    ///    partial primary key can never identify a row;
    /// 3. otherwise the row is not uniquely identifiable.
    pub fn identifying_columns(&self) -> Result<ColumnSet> {
        let desc = self.desc.clone();

        for unique in desc.unique_column_sets() {
            if !unique.is_empty()
                && unique.iter().all(|c| c.is_loaded(self) || c.is_set(self))
            {
                return Ok(unique);
            }
        }

        let pk = desc.primary_key_columns();
        if !pk.is_empty() && pk.iter().all(|c| c.is_loaded(self) || c.is_set(self)) {
            return Ok(pk);
        }

        Err(Error::RowNotUniquelyIdentifiable {
            instance: Box::new(self.clone()),
        })
    }
}
