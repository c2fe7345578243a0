//! The descriptor registry and the parallel registry builder.
//!
//! Descriptors are built once, then handed around explicitly; there is no
//! global registration.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use tablesmith_db_schema::TableSource;

use crate::{Entity, EntityDescriptor, Error};

/// Table name → descriptor, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tables: IndexMap<String, Arc<EntityDescriptor>>,
}

impl Registry {
    pub fn new(descriptors: impl IntoIterator<Item = Arc<EntityDescriptor>>) -> Self {
        Self {
            tables: descriptors
                .into_iter()
                .map(|d| (d.table_name().to_string(), d))
                .collect(),
        }
    }

    pub fn descriptor(&self, table: &str) -> Option<&Arc<EntityDescriptor>> {
        self.tables.get(table)
    }

    /// A fresh, all-unset instance of the named table's entity.
    pub fn new_entity(&self, table: &str) -> Option<Entity> {
        self.descriptor(table).map(|d| Entity::new(Arc::clone(d)))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// One table that failed to build.
#[derive(Debug)]
pub struct TableFailure {
    pub table: String,
    pub error: Error,
}

/// Everything that came out of a build: the descriptors that succeeded and
/// every per-table failure.
#[derive(Debug)]
pub struct BuildOutcome {
    pub registry: Registry,
    pub failures: Vec<TableFailure>,
}

/// Build descriptors for all tables, one task per table on a bounded
/// worker pool.
///
/// Tables share no mutable state, so the fan-out is unordered; the join
/// barrier waits for every table and aggregates all failures instead of
/// cancelling the rest on the first one. The registry lists successful
/// tables sorted by name, independent of completion order.
pub async fn build_registry<S>(sources: Vec<S>, workers: usize) -> BuildOutcome
where
    S: TableSource + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();
    for source in sources {
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let table = source.name().to_string();
            let result = EntityDescriptor::from_source(&source).await;
            (table, result)
        });
    }

    let mut descriptors = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_table, Ok(descriptor))) => descriptors.push(descriptor),
            Ok((table, Err(error))) => {
                warn!(table = %table, %error, "failed to model table");
                failures.push(TableFailure { table, error });
            }
            Err(join_error) => failures.push(TableFailure {
                table: "<worker>".to_string(),
                error: Error::Worker(join_error.to_string()),
            }),
        }
    }

    descriptors.sort_by(|a, b| a.table_name().cmp(b.table_name()));
    BuildOutcome {
        registry: Registry::new(descriptors.into_iter().map(EntityDescriptor::shared)),
        failures,
    }
}
