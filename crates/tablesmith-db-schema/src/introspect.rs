//! Live-catalog schema provider over `information_schema`.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use indexmap::IndexMap;
use tracing::warn;

use crate::{ColumnMeta, SchemaError, SqlKind, TableSource, TypeOutcome};

const TABLES_QUERY: &str = "SELECT table_name \
     FROM information_schema.tables \
     WHERE table_schema = $1 \
     ORDER BY table_name";

const COLUMNS_QUERY: &str = "SELECT column_name, data_type, is_nullable, udt_name \
     FROM information_schema.columns \
     WHERE table_name = $1 AND table_schema = $2 \
     ORDER BY ordinal_position";

const CONSTRAINT_COLUMNS_QUERY: &str = "SELECT tc.constraint_name, ccu.column_name \
     FROM information_schema.table_constraints tc \
     LEFT JOIN information_schema.constraint_column_usage ccu \
       ON ccu.constraint_name = tc.constraint_name \
     WHERE tc.table_schema = $1 \
       AND tc.table_name = $2 \
       AND tc.constraint_type = $3 \
     ORDER BY tc.constraint_name";

/// Reads table metadata from a live Postgres catalog.
#[derive(Clone)]
pub struct Introspector {
    pool: Pool,
    schema: String,
}

impl Introspector {
    pub fn new(pool: Pool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// List the tables of the configured schema.
    ///
    /// The returned sources are self-contained (each holds a pool handle),
    /// so per-table metadata reads can run on independent tasks.
    pub async fn tables(&self) -> Result<Vec<IntrospectedTable>, SchemaError> {
        let conn = self.pool.get().await?;
        let rows = conn.query(TABLES_QUERY, &[&self.schema]).await?;
        Ok(rows
            .iter()
            .map(|row| IntrospectedTable {
                pool: self.pool.clone(),
                schema: self.schema.clone(),
                name: row.get(0),
            })
            .collect())
    }
}

/// One table of the introspected schema.
#[derive(Clone)]
pub struct IntrospectedTable {
    pool: Pool,
    schema: String,
    name: String,
}

impl IntrospectedTable {
    /// Column names of every constraint of the given type, grouped by
    /// constraint name in catalog order.
    async fn constraint_columns(
        &self,
        constraint_type: &str,
    ) -> Result<Vec<Vec<String>>, SchemaError> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                CONSTRAINT_COLUMNS_QUERY,
                &[&self.schema, &self.name, &constraint_type],
            )
            .await?;

        let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
        for row in &rows {
            let constraint: String = row.get(0);
            let column: Option<String> = row.get(1);
            let group = groups.entry(constraint).or_default();
            if let Some(column) = column {
                group.push(column);
            }
        }
        Ok(groups.into_values().filter(|g| !g.is_empty()).collect())
    }
}

#[async_trait]
impl TableSource for IntrospectedTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn columns(&self) -> Result<Vec<ColumnMeta>, SchemaError> {
        let conn = self.pool.get().await?;
        let rows = conn.query(COLUMNS_QUERY, &[&self.name, &self.schema]).await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let column_name: String = row.get(0);
            let mut data_type: String = row.get(1);
            let is_nullable: String = row.get(2);
            let udt_name: String = row.get(3);

            // Domain and enum types report as USER-DEFINED; the underlying
            // type name is in udt_name.
            if data_type.eq_ignore_ascii_case("USER-DEFINED") {
                data_type = udt_name;
            }

            let kind = match SqlKind::parse(&data_type) {
                TypeOutcome::Kind(kind) => kind,
                TypeOutcome::Skip => {
                    warn!(
                        table = %self.name,
                        column = %column_name,
                        sql_type = %data_type,
                        "skipping column"
                    );
                    continue;
                }
                TypeOutcome::Unknown => {
                    return Err(SchemaError::NoSuchDataType {
                        table: self.name.clone(),
                        column: column_name,
                        sql_type: data_type,
                    });
                }
            };

            let nullable = match is_nullable.as_str() {
                "NO" => false,
                "YES" => true,
                other => {
                    return Err(SchemaError::BadNullability {
                        table: self.name.clone(),
                        column: column_name,
                        value: other.to_string(),
                    });
                }
            };

            result.push(ColumnMeta::new(column_name, kind, nullable));
        }
        Ok(result)
    }

    async fn primary_key(&self) -> Result<Vec<String>, SchemaError> {
        // A table has at most one primary-key constraint; flatten the group.
        Ok(self
            .constraint_columns("PRIMARY KEY")
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    async fn unique_constraints(&self) -> Result<Vec<Vec<String>>, SchemaError> {
        self.constraint_columns("UNIQUE").await
    }

    async fn foreign_keys(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self
            .constraint_columns("FOREIGN KEY")
            .await?
            .into_iter()
            .flatten()
            .collect())
    }
}
