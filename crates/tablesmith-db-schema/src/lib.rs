//! Schema provider types for tablesmith.
//!
//! This crate defines what the entity model builder consumes: a scalar type
//! enumeration, the total mapper from scalar type + nullability to a field
//! type, per-column metadata, and the `TableSource` trait a schema provider
//! implements. The `information_schema` adapter lives in [`introspect`].

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

mod introspect;
pub use introspect::{Introspector, IntrospectedTable};

/// SQL scalar kinds understood by the mapper.
///
/// `TIMESTAMP` is the zone-less Postgres type and carries UTC semantics
/// throughout; `TIMESTAMPTZ` is deliberately not mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlKind {
    /// SMALLINT (2 bytes)
    SmallInt,
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// BOOLEAN
    Boolean,
    /// NUMERIC (arbitrary precision)
    Numeric,
    /// REAL (4 bytes floating point)
    Real,
    /// DOUBLE PRECISION (8 bytes floating point)
    DoublePrecision,
    /// CHARACTER VARYING
    Varchar,
    /// TEXT
    Text,
    /// BYTEA (binary)
    Bytea,
    /// TIMESTAMP WITHOUT TIME ZONE, treated as UTC
    Timestamp,
    /// DATE
    Date,
}

/// Outcome of parsing a catalog type name.
///
/// `Skip` is distinct from both success and failure: the type is recognized
/// and the column is deliberately left out of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOutcome {
    Kind(SqlKind),
    Skip,
    Unknown,
}

impl SqlKind {
    /// Parse a type name as reported by `information_schema.columns`.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    pub fn parse(type_name: &str) -> TypeOutcome {
        match type_name.trim().to_uppercase().as_str() {
            "SMALLINT" => TypeOutcome::Kind(SqlKind::SmallInt),
            "INT" | "INTEGER" => TypeOutcome::Kind(SqlKind::Integer),
            "BIGINT" => TypeOutcome::Kind(SqlKind::BigInt),
            "BOOLEAN" => TypeOutcome::Kind(SqlKind::Boolean),
            "NUMERIC" => TypeOutcome::Kind(SqlKind::Numeric),
            "REAL" => TypeOutcome::Kind(SqlKind::Real),
            "DOUBLE PRECISION" => TypeOutcome::Kind(SqlKind::DoublePrecision),
            "CHARACTER VARYING" => TypeOutcome::Kind(SqlKind::Varchar),
            "TEXT" => TypeOutcome::Kind(SqlKind::Text),
            "BYTEA" => TypeOutcome::Kind(SqlKind::Bytea),
            // TIMESTAMP WITH TIME ZONE / TIMESTAMPTZ are not mapped; the
            // model only carries zone-less timestamps with UTC semantics.
            "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => TypeOutcome::Kind(SqlKind::Timestamp),
            "DATE" => TypeOutcome::Kind(SqlKind::Date),
            // Full-text search vectors have no field representation.
            "TSVECTOR" => TypeOutcome::Skip,
            _ => TypeOutcome::Unknown,
        }
    }
}

/// The closed set of field representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int16,
    Int32,
    Int64,
    Bool,
    Decimal,
    Float32,
    Float64,
    Text,
    Bytes,
    Timestamp,
    Date,
}

impl FieldKind {
    /// The Rust type a field of this kind reads back as.
    pub fn rust_type(self) -> &'static str {
        match self {
            FieldKind::Int16 => "i16",
            FieldKind::Int32 => "i32",
            FieldKind::Int64 => "i64",
            FieldKind::Bool => "bool",
            FieldKind::Decimal => "Decimal",
            FieldKind::Float32 => "f32",
            FieldKind::Float64 => "f64",
            FieldKind::Text => "String",
            FieldKind::Bytes => "Vec<u8>",
            FieldKind::Timestamp => "DateTime<Utc>",
            FieldKind::Date => "NaiveDate",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, FieldKind::Int16 | FieldKind::Int32 | FieldKind::Int64)
    }
}

/// A field's representation plus ownership mode.
///
/// Nullable columns read back as optional values; non-nullable columns are
/// mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldType {
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldType {
    /// Map a SQL kind and nullability to a field type.
    ///
    /// Total over `SqlKind`; unrecognized catalog types never get this far
    /// (they fail or are skipped at [`SqlKind::parse`]).
    pub fn of(kind: SqlKind, nullable: bool) -> FieldType {
        let kind = match kind {
            SqlKind::SmallInt => FieldKind::Int16,
            SqlKind::Integer => FieldKind::Int32,
            SqlKind::BigInt => FieldKind::Int64,
            SqlKind::Boolean => FieldKind::Bool,
            SqlKind::Numeric => FieldKind::Decimal,
            SqlKind::Real => FieldKind::Float32,
            SqlKind::DoublePrecision => FieldKind::Float64,
            SqlKind::Varchar | SqlKind::Text => FieldKind::Text,
            SqlKind::Bytea => FieldKind::Bytes,
            SqlKind::Timestamp => FieldKind::Timestamp,
            SqlKind::Date => FieldKind::Date,
        };
        FieldType { kind, nullable }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Option<{}>", self.kind.rust_type())
        } else {
            write!(f, "{}", self.kind.rust_type())
        }
    }
}

/// One column's metadata, immutable once read from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub kind: SqlKind,
    pub nullable: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, kind: SqlKind, nullable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable,
        }
    }

    /// A TIMESTAMP column literally named `created_at`. Fixed convention,
    /// not configurable.
    pub fn is_creation_timestamp(&self) -> bool {
        self.name == "created_at" && self.kind == SqlKind::Timestamp
    }

    /// A TIMESTAMP column literally named `updated_at`. Fixed convention,
    /// not configurable.
    pub fn is_update_timestamp(&self) -> bool {
        self.name == "updated_at" && self.kind == SqlKind::Timestamp
    }
}

/// Errors reading schema metadata.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no such data type {sql_type:?} for column {column:?} of table {table:?}")]
    NoSuchDataType {
        table: String,
        column: String,
        sql_type: String,
    },

    #[error("bad is_nullable value {value:?} for column {column:?} of table {table:?}")]
    BadNullability {
        table: String,
        column: String,
        value: String,
    },

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

/// A table as seen by the entity model builder.
///
/// Unique constraints are reported grouped: each inner vector is one
/// constraint's column set, in declaration order. Overlapping constraints
/// stay separate; the builder never merges them.
#[async_trait]
pub trait TableSource: Send + Sync {
    fn name(&self) -> &str;

    async fn columns(&self) -> Result<Vec<ColumnMeta>, SchemaError>;

    async fn primary_key(&self) -> Result<Vec<String>, SchemaError>;

    async fn unique_constraints(&self) -> Result<Vec<Vec<String>>, SchemaError>;

    /// Foreign-key column names. Discovered and logged only; the model does
    /// not follow them.
    async fn foreign_keys(&self) -> Result<Vec<String>, SchemaError>;
}

/// An in-memory table source, for fixtures and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTable {
    name: String,
    columns: Vec<ColumnMeta>,
    primary_key: Vec<String>,
    uniques: Vec<Vec<String>>,
    foreign_keys: Vec<String>,
}

impl StaticTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn column(mut self, name: &str, kind: SqlKind, nullable: bool) -> Self {
        self.columns.push(ColumnMeta::new(name, kind, nullable));
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.uniques
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn foreign_key(mut self, column: &str) -> Self {
        self.foreign_keys.push(column.to_string());
        self
    }
}

#[async_trait]
impl TableSource for StaticTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn columns(&self) -> Result<Vec<ColumnMeta>, SchemaError> {
        Ok(self.columns.clone())
    }

    async fn primary_key(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self.primary_key.clone())
    }

    async fn unique_constraints(&self) -> Result<Vec<Vec<String>>, SchemaError> {
        Ok(self.uniques.clone())
    }

    async fn foreign_keys(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self.foreign_keys.clone())
    }
}
