use thiserror::Error;

use crate::Entity;
use tablesmith_db_schema::SchemaError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// No unique subset and no full primary key is known on the instance,
    /// so no WHERE clause can address exactly one row. Also raised by
    /// `create` when the table offers no way to identify the inserted row.
    #[error("row not uniquely identifiable: {instance}")]
    RowNotUniquelyIdentifiable { instance: Box<Entity> },

    /// A statement that must affect exactly one row affected zero (or
    /// several): a logical consistency violation, not a transport failure.
    #[error("row does not exist: {instance}")]
    RowDoesNotExist { instance: Box<Entity> },

    /// A result-set column name the entity does not recognize; the schema
    /// and the built model disagree.
    #[error("unknown column {name:?} at position {index}")]
    UnknownColumn { name: String, index: usize },

    #[error("cannot read column {column:?}: {message}")]
    ColumnRead { column: String, message: String },

    #[error("row has {got} values, expected {expected}")]
    RowShape { expected: usize, got: usize },

    #[error("invalid model for table {table:?}: {message}")]
    Model { table: String, message: String },

    #[error("worker task failed: {0}")]
    Worker(String),
}
