//! Operation-level tests against a scripted driver.
//!
//! The driver records every statement and plays back scripted responses,
//! so each test can pin the exact SQL an operation issues and the flag
//! state it leaves behind.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone, Utc};
use tablesmith::{
    ColumnAccess, Driver, Entity, EntityDescriptor, Error, Result, RowData, SqlKind, StaticTable,
    Value, load_many,
};

enum Response {
    Rows(Vec<RowData>),
    Affected(u64),
}

#[derive(Debug, Clone)]
struct Statement {
    sql: String,
    params: Vec<Value>,
}

#[derive(Default)]
struct MockDriver {
    responses: Mutex<VecDeque<Response>>,
    statements: Mutex<Vec<Statement>>,
}

impl MockDriver {
    fn new() -> Self {
        Self::default()
    }

    fn push_rows(&self, rows: Vec<RowData>) {
        self.responses.lock().unwrap().push_back(Response::Rows(rows));
    }

    fn push_affected(&self, affected: u64) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Response::Affected(affected));
    }

    fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.statements.lock().unwrap().push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql, params);
        match self.responses.lock().unwrap().pop_front() {
            Some(Response::Affected(n)) => Ok(n),
            Some(Response::Rows(_)) => panic!("scripted rows for an execute: {sql}"),
            None => panic!("unscripted statement: {sql}"),
        }
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<RowData>> {
        self.record(sql, params);
        match self.responses.lock().unwrap().pop_front() {
            Some(Response::Rows(rows)) => Ok(rows),
            Some(Response::Affected(_)) => panic!("scripted a count for a query: {sql}"),
            None => panic!("unscripted statement: {sql}"),
        }
    }
}

fn row(columns: &[(&str, Value)]) -> RowData {
    RowData::new(
        columns.iter().map(|(n, _)| n.to_string()).collect(),
        columns.iter().map(|(_, v)| v.clone()).collect(),
    )
}

async fn build(table: StaticTable) -> Arc<EntityDescriptor> {
    EntityDescriptor::from_source(&table)
        .await
        .expect("model builds")
        .shared()
}

/// `trucks` with a serial unique id and a natural key on make+model.
async fn trucks() -> Arc<EntityDescriptor> {
    build(
        StaticTable::new("trucks")
            .column("id", SqlKind::Integer, false)
            .column("make", SqlKind::Text, false)
            .column("model", SqlKind::Text, false)
            .column("tonnage", SqlKind::Real, false)
            .column("created_at", SqlKind::Timestamp, false)
            .column("updated_at", SqlKind::Timestamp, false)
            .primary_key(&["id"])
            .unique(&["id"])
            .unique(&["make", "model"]),
    )
    .await
}

/// `trucks` where the serial id is the only identity.
async fn trucks_without_natural_key() -> Arc<EntityDescriptor> {
    build(
        StaticTable::new("trucks")
            .column("id", SqlKind::Integer, false)
            .column("make", SqlKind::Text, false)
            .column("model", SqlKind::Text, false)
            .column("tonnage", SqlKind::Real, false)
            .column("created_at", SqlKind::Timestamp, false)
            .column("updated_at", SqlKind::Timestamp, false)
            .primary_key(&["id"])
            .unique(&["id"]),
    )
    .await
}

async fn cars() -> Arc<EntityDescriptor> {
    build(
        StaticTable::new("cars")
            .column("id", SqlKind::Integer, false)
            .column("make", SqlKind::Text, false)
            .column("model", SqlKind::Text, false)
            .column("passengers", SqlKind::Integer, false)
            .primary_key(&["id"])
            .unique(&["id"]),
    )
    .await
}

fn ts(h: u32) -> Value {
    Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 4, h, 0, 0).unwrap())
}

#[tokio::test]
async fn get_is_a_noop_when_everything_is_loaded() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    desc.all_columns().set_loaded(&mut car, true);

    car.get(&db, &[]).await.unwrap();
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn get_fetches_only_unloaded_columns() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    car.set_named("id", 3).unwrap();
    let make = desc.column("make").unwrap();
    *make.slot_mut(&mut car) = Value::Text("kia".into());
    make.set_loaded(&mut car, true);

    db.push_rows(vec![row(&[
        ("model", Value::Text("rio".into())),
        ("passengers", Value::I32(5)),
    ])]);
    car.get(&db, &[desc.column("make").unwrap(), desc.column("model").unwrap(), desc.column("passengers").unwrap()])
        .await
        .unwrap();

    let stmts = db.statements();
    assert_eq!(stmts.len(), 1);
    assert_eq!(
        stmts[0].sql,
        r#"SELECT "model", "passengers" FROM "cars" WHERE "id" = $1"#
    );
    assert_eq!(stmts[0].params, vec![Value::I32(3)]);
    assert_eq!(car.value_named("model"), Some(Value::Text("rio".into())));
}

#[tokio::test]
async fn reload_marks_loaded_and_clears_no_set_flags() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    car.set_named("id", 3).unwrap();

    db.push_rows(vec![row(&[("make", Value::Text("mazda".into()))])]);
    car.reload(&db, &[desc.column("make").unwrap()]).await.unwrap();

    let make = desc.column("make").unwrap();
    let id = desc.column("id").unwrap();
    assert!(make.is_loaded(&car));
    // Reload never clears pending writes.
    assert!(id.is_set(&car));
    assert_eq!(make.value_of(&car), Value::Text("mazda".into()));
}

#[tokio::test]
async fn reload_on_a_missing_row_is_row_does_not_exist() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    car.set_named("id", 404).unwrap();

    db.push_rows(vec![]);
    assert!(matches!(
        car.reload(&db, &[]).await,
        Err(Error::RowDoesNotExist { .. })
    ));
}

#[tokio::test]
async fn save_writes_only_set_columns() {
    let desc = trucks().await;
    let db = MockDriver::new();
    let mut truck = Entity::new(desc.clone());
    let id = desc.column("id").unwrap();
    *id.slot_mut(&mut truck) = Value::I32(7);
    id.set_loaded(&mut truck, true);
    truck.set_named("tonnage", 0.5f32).unwrap();

    db.push_affected(1);
    truck.save(&db).await.unwrap();

    let stmts = db.statements();
    assert_eq!(stmts.len(), 1);
    // tonnage plus the touched update timestamp; never make or model.
    assert_eq!(
        stmts[0].sql,
        r#"UPDATE "trucks" SET "tonnage" = $1, "updated_at" = $2 WHERE "id" = $3"#
    );
    assert_eq!(stmts[0].params[0], Value::F32(0.5));
    assert_eq!(stmts[0].params[2], Value::I32(7));

    let tonnage = desc.column("tonnage").unwrap();
    let updated_at = desc.column("updated_at").unwrap();
    assert!(tonnage.is_loaded(&truck) && !tonnage.is_set(&truck));
    assert!(updated_at.is_loaded(&truck) && !updated_at.is_set(&truck));
}

#[tokio::test]
async fn save_requires_exactly_one_affected_row() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    car.set_named("id", 1).unwrap();
    car.set_named("passengers", 4).unwrap();

    db.push_affected(0);
    assert!(matches!(
        car.save(&db).await,
        Err(Error::RowDoesNotExist { .. })
    ));
}

#[tokio::test]
async fn save_with_nothing_set_issues_no_statement() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    let id = desc.column("id").unwrap();
    *id.slot_mut(&mut car) = Value::I32(1);
    id.set_loaded(&mut car, true);

    car.save(&db).await.unwrap();
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn create_refuses_unidentifiable_rows_before_any_statement() {
    let desc = build(
        StaticTable::new("not_uniquely_identifiables")
            .column("id", SqlKind::Integer, false)
            .column("age", SqlKind::Integer, false),
    )
    .await;
    let db = MockDriver::new();
    let mut entity = Entity::new(desc);
    entity.set_named("id", 44).unwrap();
    entity.set_named("age", 42).unwrap();

    assert!(matches!(
        entity.create(&db).await,
        Err(Error::RowNotUniquelyIdentifiable { .. })
    ));
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn create_inserts_set_columns_and_loads_back_the_preferred_unique() {
    let desc = trucks().await;
    let db = MockDriver::new();
    let mut truck = Entity::new(desc.clone());
    truck.set_named("make", "volvo").unwrap();
    truck.set_named("model", "t-1000").unwrap();
    truck.set_named("tonnage", 13.5f32).unwrap();

    db.push_rows(vec![row(&[("id", Value::I32(1))])]);
    truck.create(&db).await.unwrap();

    let stmts = db.statements();
    assert_eq!(stmts.len(), 1);
    assert_eq!(
        stmts[0].sql,
        r#"INSERT INTO "trucks" ("make", "model", "tonnage", "created_at", "updated_at") VALUES ($1, $2, $3, $4, $5) RETURNING "id""#
    );

    let id = desc.column("id").unwrap();
    let make = desc.column("make").unwrap();
    assert!(id.is_loaded(&truck));
    assert_eq!(id.value_of(&truck), Value::I32(1));
    assert!(make.is_loaded(&truck) && !make.is_set(&truck));
    // Both timestamps were touched and written.
    assert!(matches!(stmts[0].params[3], Value::Timestamp(_)));
    assert!(matches!(stmts[0].params[4], Value::Timestamp(_)));
}

#[tokio::test]
async fn create_with_nothing_set_inserts_default_values() {
    let desc = build(
        StaticTable::new("incidents")
            .column("id", SqlKind::Integer, false)
            .column("resolution", SqlKind::Text, true)
            .primary_key(&["id"])
            .unique(&["id"]),
    )
    .await;
    let db = MockDriver::new();
    let mut incident = Entity::new(desc.clone());

    db.push_rows(vec![row(&[("id", Value::I32(12))])]);
    incident.create(&db).await.unwrap();

    assert_eq!(
        db.statements()[0].sql,
        r#"INSERT INTO "incidents" DEFAULT VALUES RETURNING "id""#
    );
    assert_eq!(incident.value_named("id"), Some(Value::I32(12)));
}

#[tokio::test]
async fn create_falls_back_to_the_primary_key_for_load_back() {
    let desc = build(
        StaticTable::new("routes")
            .column("region", SqlKind::Text, false)
            .column("number", SqlKind::Integer, false)
            .column("length_km", SqlKind::DoublePrecision, false)
            .primary_key(&["region", "number"]),
    )
    .await;
    let db = MockDriver::new();
    let mut route = Entity::new(desc.clone());
    route.set_named("region", "north").unwrap();
    route.set_named("number", 12).unwrap();
    route.set_named("length_km", 140.5f64).unwrap();

    db.push_rows(vec![row(&[
        ("region", Value::Text("north".into())),
        ("number", Value::I32(12)),
    ])]);
    route.create(&db).await.unwrap();

    assert_eq!(
        db.statements()[0].sql,
        r#"INSERT INTO "routes" ("region", "number", "length_km") VALUES ($1, $2, $3) RETURNING "region", "number""#
    );
}

#[tokio::test]
async fn find_or_create_issues_one_guarded_statement_and_is_idempotent() {
    let desc = trucks().await;
    let db = MockDriver::new();

    let full_row = |tonnage: f32| {
        row(&[
            ("id", Value::I32(1)),
            ("make", Value::Text("ford".into())),
            ("model", Value::Text("f150".into())),
            ("tonnage", Value::F32(tonnage)),
            ("created_at", ts(8)),
            ("updated_at", ts(8)),
        ])
    };

    // First call: no matching row is visible, the guarded insert runs.
    let mut truck = Entity::new(desc.clone());
    truck.set_named("make", "ford").unwrap();
    truck.set_named("model", "f150").unwrap();
    truck.set_named("tonnage", 0.5f32).unwrap();
    db.push_rows(vec![full_row(0.5)]);
    truck.find_or_create(&db, &[]).await.unwrap();

    assert_eq!(truck.value_named("id"), Some(Value::I32(1)));
    assert_eq!(truck.value_named("created_at"), Some(ts(8)));
    let id = desc.column("id").unwrap();
    let make = desc.column("make").unwrap();
    assert!(id.is_loaded(&truck));
    assert!(make.is_loaded(&truck) && !make.is_set(&truck));

    // Second call, same natural key: the extant row comes back and the
    // caller's differing tonnage is replaced by the persisted value.
    let mut again = Entity::new(desc.clone());
    again.set_named("make", "ford").unwrap();
    again.set_named("model", "f150").unwrap();
    again.set_named("tonnage", 0.99f32).unwrap();
    db.push_rows(vec![full_row(0.5)]);
    again.find_or_create(&db, &[]).await.unwrap();

    assert_eq!(again.value_named("id"), Some(Value::I32(1)));
    assert_eq!(again.value_named("tonnage"), Some(Value::F32(0.5)));

    let stmts = db.statements();
    assert_eq!(stmts.len(), 2);
    // One statement per call, and both calls issue the identical guarded
    // CTE: the lookup and the conditional insert cannot be split apart.
    assert_eq!(stmts[0].sql, stmts[1].sql);
    assert!(stmts[0].sql.starts_with(r#"WITH "extant_row" AS (SELECT"#));
    assert!(
        stmts[0]
            .sql
            .contains(r#"WHERE NOT EXISTS (SELECT 1 FROM "extant_row" LIMIT 1)"#)
    );
    assert!(stmts[0].sql.ends_with(
        r#"SELECT * FROM "extant_row" UNION ALL SELECT * FROM "new_row""#
    ));
    assert_eq!(stmts[0].params[0], Value::Text("ford".into()));
    assert_eq!(stmts[0].params[1], Value::Text("f150".into()));
    assert_eq!(stmts[0].params[2], Value::F32(0.5));
    assert_eq!(stmts[1].params[2], Value::F32(0.99));
}

#[tokio::test]
async fn find_or_create_widens_an_explicit_load_list_with_set_columns() {
    let desc = trucks().await;
    let db = MockDriver::new();
    let mut truck = Entity::new(desc.clone());
    truck.set_named("make", "chevy").unwrap();
    truck.set_named("model", "k1500").unwrap();

    db.push_rows(vec![row(&[
        ("id", Value::I32(2)),
        ("make", Value::Text("chevy".into())),
        ("model", Value::Text("k1500".into())),
        ("created_at", ts(9)),
        ("updated_at", ts(9)),
    ])]);
    // Ask only for id; the set columns ride along so a pre-existing row
    // cannot leave the instance inconsistent with the store.
    truck
        .find_or_create(&db, &[desc.column("id").unwrap()])
        .await
        .unwrap();

    let sql = &db.statements()[0].sql;
    assert!(sql.contains(r#"RETURNING "id", "make", "model", "created_at", "updated_at""#));
    let make = desc.column("make").unwrap();
    assert!(make.is_loaded(&truck) && !make.is_set(&truck));
}

#[tokio::test]
async fn find_or_create_without_a_usable_identity_refuses() {
    // With the serial id as the only unique column and no id value known,
    // there is no natural key to find by; the operation refuses instead of
    // guessing.
    let desc = trucks_without_natural_key().await;
    let db = MockDriver::new();
    let mut truck = Entity::new(desc);
    truck.set_named("make", "ford").unwrap();
    truck.set_named("model", "f150").unwrap();
    truck.set_named("tonnage", 0.5f32).unwrap();

    assert!(matches!(
        truck.find_or_create(&db, &[]).await,
        Err(Error::RowNotUniquelyIdentifiable { .. })
    ));
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn create_then_get_round_trips_the_set_values() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    car.set_named("make", "kia").unwrap();
    car.set_named("model", "rio").unwrap();
    car.set_named("passengers", 5).unwrap();

    db.push_rows(vec![row(&[("id", Value::I32(31))])]);
    car.create(&db).await.unwrap();

    // A second instance addressed only by the returned identity.
    let mut same_car = Entity::new(desc.clone());
    same_car
        .set_named("id", car.value_named("id").unwrap())
        .unwrap();
    db.push_rows(vec![row(&[
        ("id", Value::I32(31)),
        ("make", Value::Text("kia".into())),
        ("model", Value::Text("rio".into())),
        ("passengers", Value::I32(5)),
    ])]);
    same_car.get(&db, &[]).await.unwrap();

    assert_eq!(same_car.value_named("make"), car.value_named("make"));
    assert_eq!(same_car.value_named("model"), car.value_named("model"));
    assert_eq!(
        same_car.value_named("passengers"),
        car.value_named("passengers")
    );
}

#[tokio::test]
async fn delete_addresses_exactly_one_row() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    car.set_named("id", 9).unwrap();

    db.push_affected(1);
    car.delete(&db).await.unwrap();
    assert_eq!(
        db.statements()[0].sql,
        r#"DELETE FROM "cars" WHERE "id" = $1"#
    );

    db.push_affected(0);
    assert!(matches!(
        car.delete(&db).await,
        Err(Error::RowDoesNotExist { .. })
    ));
}

#[tokio::test]
async fn unknown_result_columns_fail_with_name_and_position() {
    let desc = cars().await;
    let db = MockDriver::new();
    let mut car = Entity::new(desc.clone());
    car.set_named("id", 3).unwrap();

    db.push_rows(vec![row(&[
        ("id", Value::I32(3)),
        ("horsepower", Value::I32(130)),
    ])]);
    match car.reload(&db, &[]).await {
        Err(Error::UnknownColumn { name, index }) => {
            assert_eq!(name, "horsepower");
            assert_eq!(index, 1);
        }
        other => panic!("expected unknown column, got {other:?}"),
    }
}

#[tokio::test]
async fn load_many_folds_a_result_set() {
    let desc = cars().await;
    let rows = vec![
        row(&[("id", Value::I32(1)), ("make", Value::Text("kia".into()))]),
        row(&[("id", Value::I32(2)), ("make", Value::Text("mazda".into()))]),
    ];
    let cars = load_many(&desc, rows).unwrap();

    assert_eq!(cars.len(), 2);
    let id = desc.column("id").unwrap();
    let passengers = desc.column("passengers").unwrap();
    assert!(id.is_loaded(&cars[0]));
    assert!(!passengers.is_loaded(&cars[0]));
    assert_eq!(cars[1].value_named("make"), Some(Value::Text("mazda".into())));
}

#[tokio::test]
async fn touches_keep_caller_supplied_timestamps() {
    let desc = trucks().await;
    let db = MockDriver::new();
    let mut truck = Entity::new(desc.clone());
    truck.set_named("make", "chevy").unwrap();
    truck.set_named("model", "k1500").unwrap();
    truck.set_named("tonnage", 0.5f32).unwrap();

    // Caller-chosen instants, supplied in a non-UTC zone.
    let offset = FixedOffset::east_opt(2 * 3600).expect("valid offset");
    let chosen = offset.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap();
    truck.set_named("created_at", chosen).unwrap();
    truck.set_named("updated_at", chosen).unwrap();

    db.push_rows(vec![row(&[("id", Value::I32(5))])]);
    truck.create(&db).await.unwrap();

    let params = &db.statements()[0].params;
    let expected = Value::Timestamp(chosen.with_timezone(&Utc));
    assert_eq!(params[3], expected);
    assert_eq!(params[4], expected);
}
