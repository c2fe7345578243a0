//! Timestamp touch policy.

use chrono::Utc;

use crate::{ColumnAccess, Entity};

impl Entity {
    /// Assign `updated_at` to the current instant unless the caller
    /// already set it.
    pub fn touch_updated_at(&mut self) {
        if let Some(column) = self.desc.clone().updated_at_column() {
            if !column.is_set(self) {
                self.set(&column, Utc::now());
            }
        }
    }

    /// Assign `created_at` to the current instant unless it is already
    /// set or reflects a persisted value.
    pub fn touch_created_at(&mut self) {
        if let Some(column) = self.desc.clone().created_at_column() {
            if !column.is_set(self) && !column.is_loaded(self) {
                self.set(&column, Utc::now());
            }
        }
    }
}
