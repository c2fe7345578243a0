//! Per-entity operations: load, save, create, find-or-create, delete.
//!
//! Every operation issues exactly one statement in one round trip. Nothing
//! is retried internally and there is no client-side locking; failures go
//! straight back to the caller.

use std::sync::Arc;

use async_trait::async_trait;

use tablesmith_sql as template;

use crate::analyze::analyze_columns;
use crate::{Column, ColumnAccess, ColumnSet, Entity, Error, Result, RowData, Value};

/// The execution capability operations run against: a pooled connection,
/// or a scripted stand-in under test.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Run a statement, returning the affected row count.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run a query, returning all rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<RowData>>;
}

impl Entity {
    /// Load the requested columns (all, if none are given) unless already
    /// loaded. A no-op when nothing is missing.
    pub async fn get(&mut self, db: &impl Driver, columns: &[Column]) -> Result<()> {
        let desc = Arc::clone(&self.desc);
        let requested = if columns.is_empty() {
            desc.all_columns()
        } else {
            ColumnSet::from(columns.to_vec())
        };

        let unloaded: ColumnSet = requested
            .into_iter()
            .filter(|c| !c.is_loaded(self))
            .collect();
        if unloaded.is_empty() {
            return Ok(());
        }
        self.reload(db, unloaded.as_slice()).await
    }

    /// Re-read the requested columns (all, if none are given) by the
    /// identifying columns. Fetched columns become Loaded; Set flags are
    /// left alone.
    pub async fn reload(&mut self, db: &impl Driver, columns: &[Column]) -> Result<()> {
        let desc = Arc::clone(&self.desc);
        let to_load = if columns.is_empty() {
            desc.all_columns()
        } else {
            ColumnSet::from(columns.to_vec())
        };
        let key = self.identifying_columns()?;

        let stmt = template::select_by(desc.table_name(), &to_load.names(), &key.names());
        let params = self.bind_params(&stmt.params)?;
        let rows = db.query(&stmt.sql, &params).await?;
        let Some(row) = rows.into_iter().next() else {
            return Err(self.missing_row());
        };

        let scanned = analyze_columns(&desc, &row.columns)?;
        self.load_with_columns(&scanned, row.values)
    }

    /// Write the Set columns to the identified row.
    ///
    /// Touches `updated_at` first if the table has one. Zero Set columns
    /// is a no-op. The statement must affect exactly one row; anything
    /// else is a consistency violation, not success.
    pub async fn save(&mut self, db: &impl Driver) -> Result<()> {
        self.touch_updated_at();
        let desc = Arc::clone(&self.desc);
        let key = self.identifying_columns()?;

        let to_save = self.set_columns();
        if to_save.is_empty() {
            return Ok(());
        }

        let stmt = template::update_by(desc.table_name(), &to_save.names(), &key.names());
        let params = self.bind_params(&stmt.params)?;
        let affected = db.execute(&stmt.sql, &params).await?;
        if affected != 1 {
            return Err(self.missing_row());
        }

        to_save.set_loaded(self, true);
        to_save.set_set(self, false);
        Ok(())
    }

    /// Insert a new row from the Set columns and read back its identity.
    ///
    /// The load-back set is the preferred unique column, else the full
    /// primary key. With neither, the insert is refused up front: a row
    /// that could never be addressed again must not be created.
    pub async fn create(&mut self, db: &impl Driver) -> Result<()> {
        let desc = Arc::clone(&self.desc);
        self.touch_created_at();
        if let Some(updated) = desc.updated_at_column() {
            // A non-nullable update timestamp has to be written on insert.
            if !updated.field_type().nullable {
                self.touch_updated_at();
            }
        }

        let to_load: ColumnSet = match desc.preferred_unique_column() {
            Some(column) => ColumnSet::from(vec![column]),
            None => {
                let pk = desc.primary_key_columns();
                if pk.is_empty() {
                    return Err(Error::RowNotUniquelyIdentifiable {
                        instance: Box::new(self.clone()),
                    });
                }
                pk
            }
        };
        let to_create = self.set_columns();

        let stmt =
            template::insert_returning(desc.table_name(), &to_create.names(), &to_load.names());
        let params = self.bind_params(&stmt.params)?;
        let rows = db.query(&stmt.sql, &params).await?;
        let Some(row) = rows.into_iter().next() else {
            return Err(self.missing_row());
        };

        let scanned = analyze_columns(&desc, &row.columns)?;
        self.load_with_columns(&scanned, row.values)?;
        to_create.set_loaded(self, true);
        to_create.set_set(self, false);
        Ok(())
    }

    /// Return the row matching the identifying columns, creating it if no
    /// such row is visible, as one statement in one round trip.
    ///
    /// The statement pairs an `extant_row` CTE with an insert guarded by
    /// `NOT EXISTS` over it, so the check and the insert cannot be split
    /// by another caller between round trips. Below serializable
    /// isolation two racing callers can still both insert; keep a unique
    /// constraint on the identifying columns as the backstop.
    ///
    /// `columns` narrows what is loaded back (default: everything). Set
    /// columns are always loaded back, so a pre-existing row's values
    /// replace caller-supplied ones instead of being silently kept.
    pub async fn find_or_create(&mut self, db: &impl Driver, columns: &[Column]) -> Result<()> {
        let desc = Arc::clone(&self.desc);
        self.touch_created_at();
        if let Some(updated) = desc.updated_at_column() {
            if !updated.field_type().nullable {
                self.touch_updated_at();
            }
        }

        let key = self.identifying_columns()?;
        let to_save = self.set_columns();

        let mut to_load = if columns.is_empty() {
            desc.all_columns()
        } else {
            ColumnSet::from(columns.to_vec())
        };
        if !columns.is_empty() {
            for column in to_save.iter() {
                if !to_load.contains(column) {
                    to_load.push(column.clone());
                }
            }
        }

        let stmt = template::find_or_create(
            desc.table_name(),
            &key.names(),
            &to_save.names(),
            &to_load.names(),
        );
        let params = self.bind_params(&stmt.params)?;
        let rows = db.query(&stmt.sql, &params).await?;
        let Some(row) = rows.into_iter().next() else {
            return Err(self.missing_row());
        };

        let scanned = analyze_columns(&desc, &row.columns)?;
        self.load_with_columns(&scanned, row.values)?;
        to_load.set_set(self, false);
        Ok(())
    }

    /// Delete the identified row. Exactly one row must go away.
    pub async fn delete(&self, db: &impl Driver) -> Result<()> {
        let desc = Arc::clone(&self.desc);
        let key = self.identifying_columns()?;

        let stmt = template::delete_by(desc.table_name(), &key.names());
        let params = self.bind_params(&stmt.params)?;
        let affected = db.execute(&stmt.sql, &params).await?;
        if affected != 1 {
            return Err(self.missing_row());
        }
        Ok(())
    }

    /// Values for a statement's parameters, in placeholder order.
    fn bind_params(&self, names: &[String]) -> Result<Vec<Value>> {
        let desc = Arc::clone(&self.desc);
        names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                desc.column(name)
                    .map(|c| c.value_of(self))
                    .ok_or_else(|| Error::UnknownColumn {
                        name: name.clone(),
                        index,
                    })
            })
            .collect()
    }

    /// The columns currently flagged Set, in ordinal order.
    fn set_columns(&self) -> ColumnSet {
        Arc::clone(&self.desc)
            .all_columns()
            .into_iter()
            .filter(|c| c.is_set(self))
            .collect()
    }

    fn missing_row(&self) -> Error {
        Error::RowDoesNotExist {
            instance: Box::new(self.clone()),
        }
    }
}
