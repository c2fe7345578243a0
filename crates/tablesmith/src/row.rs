//! Result rows, decoupled from the wire driver.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::Type as PgTypeInfo;

use crate::{Error, Value};

/// One result row: column names in result order, one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl RowData {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }
}

/// Convert a tokio-postgres row by its reported wire types.
pub fn from_pg_row(row: &tokio_postgres::Row) -> Result<RowData, Error> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(read_value(row, idx, column.name(), column.type_())?);
    }
    Ok(RowData { columns, values })
}

fn read_value(
    row: &tokio_postgres::Row,
    idx: usize,
    name: &str,
    ty: &PgTypeInfo,
) -> Result<Value, Error> {
    let read_error = |e: tokio_postgres::Error| Error::ColumnRead {
        column: name.to_string(),
        message: e.to_string(),
    };

    let value = match *ty {
        PgTypeInfo::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .map_err(read_error)?
            .map(Value::Bool),
        PgTypeInfo::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(read_error)?
            .map(Value::I16),
        PgTypeInfo::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(read_error)?
            .map(Value::I32),
        PgTypeInfo::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .map_err(read_error)?
            .map(Value::I64),
        PgTypeInfo::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(read_error)?
            .map(Value::F32),
        PgTypeInfo::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .map_err(read_error)?
            .map(Value::F64),
        PgTypeInfo::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)
            .map_err(read_error)?
            .map(Value::Decimal),
        PgTypeInfo::TEXT | PgTypeInfo::VARCHAR => row
            .try_get::<_, Option<String>>(idx)
            .map_err(read_error)?
            .map(Value::Text),
        PgTypeInfo::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .map_err(read_error)?
            .map(Value::Bytes),
        PgTypeInfo::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(read_error)?
            .map(|naive| Value::Timestamp(naive.and_utc())),
        PgTypeInfo::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(read_error)?
            .map(Value::Timestamp),
        PgTypeInfo::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .map_err(read_error)?
            .map(Value::Date),
        ref other => {
            return Err(Error::ColumnRead {
                column: name.to_string(),
                message: format!("unsupported result type {other}"),
            });
        }
    };

    Ok(value.unwrap_or(Value::Null))
}
