//! Statement templates for the per-entity operations.
//!
//! Each template binds parameters by column name; callers supply values in
//! the order reported by [`RenderedSql::params`].

use crate::stmt::*;
use crate::{RenderedSql, render};

/// CTE name for the pre-existing row in a find-or-create statement.
pub const EXTANT_ROW: &str = "extant_row";

/// CTE name for the conditionally inserted row in a find-or-create
/// statement.
pub const NEW_ROW: &str = "new_row";

/// `SELECT <columns> FROM <table> WHERE <key columns> = <params>`.
pub fn select_by(table: &str, columns: &[&str], key: &[&str]) -> RenderedSql {
    let mut stmt = SelectStmt::new().columns(columns.iter().copied()).from(table);
    if let Some(clause) = key_equality(key) {
        stmt = stmt.where_(clause);
    }
    render(&stmt)
}

/// `UPDATE <table> SET <columns> = <params> WHERE <key columns> = <params>`.
///
/// A column present in both the SET list and the key binds a single
/// parameter; both positions carry the instance's current value.
pub fn update_by(table: &str, columns: &[&str], key: &[&str]) -> RenderedSql {
    let mut stmt = UpdateStmt::new(table);
    for col in columns {
        stmt = stmt.set(*col, Expr::param(*col));
    }
    if let Some(clause) = key_equality(key) {
        stmt = stmt.where_(clause);
    }
    render(&stmt)
}

/// `INSERT INTO <table> (<columns>) VALUES (<params>) RETURNING <returning>`.
///
/// With no columns to write, renders `DEFAULT VALUES`.
pub fn insert_returning(table: &str, columns: &[&str], returning: &[&str]) -> RenderedSql {
    let mut stmt = InsertStmt::new(table).returning(returning.iter().copied());
    if !columns.is_empty() {
        for col in columns {
            stmt = stmt.column(*col);
        }
        stmt = stmt.source(InsertSource::Values(
            columns.iter().map(|c| Expr::param(*c)).collect(),
        ));
    }
    render(&stmt)
}

/// `DELETE FROM <table> WHERE <key columns> = <params>`.
pub fn delete_by(table: &str, key: &[&str]) -> RenderedSql {
    let mut stmt = DeleteStmt::new(table);
    if let Some(clause) = key_equality(key) {
        stmt = stmt.where_(clause);
    }
    render(&stmt)
}

/// The single-statement find-or-create upsert.
///
/// Two CTEs: `extant_row` selects the load-back columns by the identifying
/// key; `new_row` inserts the write set via a parameter projection guarded
/// by `NOT EXISTS (SELECT 1 FROM extant_row LIMIT 1)`, returning the same
/// load-back columns. The final `UNION ALL` yields the one visible row,
/// whichever branch produced it.
///
/// This collapses check-then-insert into one round trip; it does not close
/// races below serializable isolation, so the key columns should carry a
/// unique constraint as a backstop.
pub fn find_or_create(table: &str, key: &[&str], columns: &[&str], load: &[&str]) -> RenderedSql {
    let mut extant = SelectStmt::new().columns(load.iter().copied()).from(table);
    if let Some(clause) = key_equality(key) {
        extant = extant.where_(clause);
    }

    let guard = Expr::NotExists(Box::new(
        SelectStmt::new().expr(Expr::Int(1)).from(EXTANT_ROW).limit(1),
    ));
    let mut projection = SelectStmt::new();
    for col in columns {
        projection = projection.expr(Expr::param(*col));
    }
    let mut insert = InsertStmt::new(table).returning(load.iter().copied());
    for col in columns {
        insert = insert.column(*col);
    }
    let insert = insert.source(InsertSource::Query(projection.where_(guard)));

    let query = WithQuery::new()
        .cte(EXTANT_ROW, CteBody::Select(extant))
        .cte(NEW_ROW, CteBody::Insert(insert))
        .branch(SelectStmt::new().star().from(EXTANT_ROW))
        .branch(SelectStmt::new().star().from(NEW_ROW));

    render(&query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_by_key() {
        let result = select_by("trucks", &["make", "model"], &["id"]);
        insta::assert_snapshot!(
            result.sql,
            @r#"SELECT "make", "model" FROM "trucks" WHERE "id" = $1"#
        );
        assert_eq!(result.params, vec!["id"]);
    }

    #[test]
    fn select_by_composite_key() {
        let result = select_by("cars", &["passengers"], &["make", "model"]);
        insta::assert_snapshot!(
            result.sql,
            @r#"SELECT "passengers" FROM "cars" WHERE "make" = $1 AND "model" = $2"#
        );
        assert_eq!(result.params, vec!["make", "model"]);
    }

    #[test]
    fn update_by_key() {
        let result = update_by("trucks", &["tonnage", "updated_at"], &["id"]);
        insta::assert_snapshot!(
            result.sql,
            @r#"UPDATE "trucks" SET "tonnage" = $1, "updated_at" = $2 WHERE "id" = $3"#
        );
        assert_eq!(result.params, vec!["tonnage", "updated_at", "id"]);
    }

    #[test]
    fn update_deduplicates_key_in_write_set() {
        // The key column also being written binds once.
        let result = update_by("pizza_delivery_guys", &["name", "gas_mileage"], &["name"]);
        insta::assert_snapshot!(
            result.sql,
            @r#"UPDATE "pizza_delivery_guys" SET "name" = $1, "gas_mileage" = $2 WHERE "name" = $1"#
        );
        assert_eq!(result.params, vec!["name", "gas_mileage"]);
    }

    #[test]
    fn insert_with_returning() {
        let result = insert_returning("trucks", &["make", "model"], &["id"]);
        insta::assert_snapshot!(
            result.sql,
            @r#"INSERT INTO "trucks" ("make", "model") VALUES ($1, $2) RETURNING "id""#
        );
        assert_eq!(result.params, vec!["make", "model"]);
    }

    #[test]
    fn insert_nothing_set_renders_default_values() {
        let result = insert_returning("incidents", &[], &["id"]);
        insta::assert_snapshot!(
            result.sql,
            @r#"INSERT INTO "incidents" DEFAULT VALUES RETURNING "id""#
        );
        assert!(result.params.is_empty());
    }

    #[test]
    fn delete_by_key() {
        let result = delete_by("trucks", &["id"]);
        insta::assert_snapshot!(result.sql, @r#"DELETE FROM "trucks" WHERE "id" = $1"#);
        assert_eq!(result.params, vec!["id"]);
    }

    #[test]
    fn find_or_create_is_one_guarded_statement() {
        let result = find_or_create(
            "trucks",
            &["make", "model"],
            &["make", "model", "tonnage"],
            &["id", "make", "model", "tonnage"],
        );
        insta::assert_snapshot!(
            result.sql,
            @r#"WITH "extant_row" AS (SELECT "id", "make", "model", "tonnage" FROM "trucks" WHERE "make" = $1 AND "model" = $2), "new_row" AS (INSERT INTO "trucks" ("make", "model", "tonnage") SELECT $1, $2, $3 WHERE NOT EXISTS (SELECT 1 FROM "extant_row" LIMIT 1) RETURNING "id", "make", "model", "tonnage") SELECT * FROM "extant_row" UNION ALL SELECT * FROM "new_row""#
        );
        // Key params and projection params share indices by name.
        assert_eq!(result.params, vec!["make", "model", "tonnage"]);
    }

    #[test]
    fn find_or_create_key_disjoint_from_write_set() {
        let result = find_or_create("numbers", &["id"], &["value"], &["id", "value"]);
        insta::assert_snapshot!(
            result.sql,
            @r#"WITH "extant_row" AS (SELECT "id", "value" FROM "numbers" WHERE "id" = $1), "new_row" AS (INSERT INTO "numbers" ("value") SELECT $2 WHERE NOT EXISTS (SELECT 1 FROM "extant_row" LIMIT 1) RETURNING "id", "value") SELECT * FROM "extant_row" UNION ALL SELECT * FROM "new_row""#
        );
        assert_eq!(result.params, vec!["id", "value"]);
    }
}
