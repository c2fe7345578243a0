//! Schema-driven data-access contracts for Postgres tables.
//!
//! Given one table's metadata (columns, types, nullability, primary key,
//! unique constraints), this crate derives the complete runtime contract
//! for that table:
//!
//! - an [`EntityDescriptor`] with ordered fields, key subsets, and
//!   timestamp roles;
//! - [`Column`] accessors and [`ColumnSet`] collections with per-instance
//!   loaded/set state;
//! - identifying-column resolution over the live state of an [`Entity`];
//! - single-statement load, save, create, delete, and find-or-create
//!   operations, the latter as a race-collapsing conditional CTE.
//!
//! Descriptors are built once per table (see [`build_registry`]) and shared
//! via `Arc`; instances are plain values the caller owns.

mod analyze;
mod column;
mod entity;
mod error;
mod identify;
mod model;
mod ops;
mod pool;
mod registry;
mod row;
mod touch;
mod value;

pub use analyze::{analyze_columns, load_many};
pub use column::{Column, ColumnAccess, ColumnSet};
pub use entity::Entity;
pub use error::Error;
pub use model::{EntityDescriptor, Field};
pub use ops::Driver;
pub use pool::{TracedConn, TracedPool};
pub use registry::{BuildOutcome, Registry, TableFailure, build_registry};
pub use row::RowData;
pub use value::{SqlParam, Value};

// The schema-provider surface, re-exported for convenience.
pub use tablesmith_db_schema::{
    ColumnMeta, FieldKind, FieldType, IntrospectedTable, Introspector, SchemaError, SqlKind,
    StaticTable, TableSource, TypeOutcome,
};

/// Result type for tablesmith operations.
pub type Result<T> = std::result::Result<T, Error>;
