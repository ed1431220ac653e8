//! Generated statements executed against an in-memory SQLite database.

use std::str::FromStr;

use pretty_assertions::assert_eq;
use sqlport::prelude::*;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

async fn memory_db() -> SqlitePool {
    // native FK enforcement off: the synthesized triggers do the work
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(false);
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap()
}

async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql)
        .execute(pool)
        .await
        .unwrap_or_else(|e| panic!("{sql}: {e}"));
}

async fn create_table(pool: &SqlitePool, sql: &str) -> usize {
    let (statement, extras) = Translator::new(Dialect::Sqlite).rewrite_create_table(sql);
    exec(pool, &statement).await;
    for extra in &extras {
        exec(pool, extra).await;
    }
    extras.len()
}

async fn ids(pool: &SqlitePool, sql: &str) -> Vec<i64> {
    sqlx::query(sql)
        .fetch_all(pool)
        .await
        .unwrap_or_else(|e| panic!("{sql}: {e}"))
        .iter()
        .map(|row| row.get::<i64, _>("id"))
        .collect()
}

#[tokio::test]
async fn test_cascade_triggers_delete_children() {
    let pool = memory_db().await;
    create_table(&pool, "CREATE TABLE parent (id integer PRIMARY KEY, name text)").await;
    let extras = create_table(
        &pool,
        "CREATE TABLE child (id integer PRIMARY KEY, parent_id integer NOT NULL REFERENCES parent(id) ON DELETE CASCADE)",
    )
    .await;
    assert_eq!(extras, 3);

    exec(&pool, "INSERT INTO parent (id, name) VALUES (1, 'a'), (2, 'b')").await;
    exec(&pool, "INSERT INTO child (id, parent_id) VALUES (10, 1), (11, 1), (12, 2)").await;

    let orphan = sqlx::query("INSERT INTO child (id, parent_id) VALUES (13, 99)")
        .execute(&pool)
        .await;
    assert!(orphan.is_err());

    exec(&pool, "DELETE FROM parent WHERE id = 1").await;
    assert_eq!(ids(&pool, "SELECT id FROM child ORDER BY id").await, vec![12]);
}

#[tokio::test]
async fn test_set_null_triggers_clear_references() {
    let pool = memory_db().await;
    create_table(&pool, "CREATE TABLE owner (id integer PRIMARY KEY)").await;
    create_table(
        &pool,
        "CREATE TABLE pet (id integer PRIMARY KEY, owner_id integer REFERENCES owner(id) ON DELETE SET NULL)",
    )
    .await;

    exec(&pool, "INSERT INTO owner (id) VALUES (1), (2)").await;
    exec(&pool, "INSERT INTO pet (id, owner_id) VALUES (1, 1), (2, 2), (3, NULL)").await;
    exec(&pool, "DELETE FROM owner WHERE id = 2").await;

    let rows = sqlx::query("SELECT id, owner_id FROM pet ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    let owners: Vec<Option<i64>> = rows.iter().map(|r| r.get("owner_id")).collect();
    assert_eq!(owners, vec![Some(1), None, None]);
}

#[tokio::test]
async fn test_restrict_blocks_parent_delete() {
    let pool = memory_db().await;
    create_table(&pool, "CREATE TABLE team (id integer PRIMARY KEY)").await;
    create_table(
        &pool,
        "CREATE TABLE player (id integer PRIMARY KEY, team_id integer REFERENCES team(id) ON DELETE RESTRICT)",
    )
    .await;

    exec(&pool, "INSERT INTO team (id) VALUES (1), (2)").await;
    exec(&pool, "INSERT INTO player (id, team_id) VALUES (1, 1)").await;

    let blocked = sqlx::query("DELETE FROM team WHERE id = 1").execute(&pool).await;
    assert!(blocked.is_err());
    exec(&pool, "DELETE FROM team WHERE id = 2").await;
    assert_eq!(ids(&pool, "SELECT id FROM team").await, vec![1]);
}

fn numbers() -> Schema {
    Schema::new().table("numbers", vec![ColumnInfo::primary("id", ColumnType::Integer)])
}

async fn numbers_db() -> SqlitePool {
    let pool = memory_db().await;
    exec(&pool, "CREATE TABLE numbers (id INTEGER PRIMARY KEY)").await;
    let values: Vec<String> = (1..=20).map(|n| format!("({})", n)).collect();
    exec(&pool, &format!("INSERT INTO numbers (id) VALUES {}", values.join(", "))).await;
    pool
}

#[tokio::test]
async fn test_limit_offset_selects_rows_11_to_15() {
    let pool = numbers_db().await;
    let query = Query::new("numbers").order_by("id", "asc").limit(5).offset(10);

    // SQLite runs both the native form and the ROW_NUMBER() window form
    for dialect in [Dialect::Sqlite, Dialect::Postgres, Dialect::MySql, Dialect::SqlServer] {
        let sql = query.to_sql(&Translator::new(dialect), &numbers()).unwrap();
        assert_eq!(ids(&pool, &sql).await, vec![11, 12, 13, 14, 15], "{dialect}: {sql}");
    }
}

#[tokio::test]
async fn test_offset_without_order_uses_primary_key() {
    let pool = numbers_db().await;
    let sql = Query::new("numbers")
        .limit(5)
        .offset(10)
        .to_sql(&Translator::new(Dialect::SqlServer), &numbers())
        .unwrap();
    assert_eq!(ids(&pool, &sql).await, vec![11, 12, 13, 14, 15]);
}

fn shop() -> Schema {
    Schema::new()
        .table(
            "users",
            vec![
                ColumnInfo::primary("id", ColumnType::Integer),
                ColumnInfo::new("name", ColumnType::String),
            ],
        )
        .table(
            "orders",
            vec![
                ColumnInfo::primary("id", ColumnType::Integer),
                ColumnInfo::new("user_id", ColumnType::Integer),
                ColumnInfo::new("total", ColumnType::Float),
            ],
        )
        .relationship(Relationship::one_to_many("users", "id", "orders", "user_id"))
}

async fn shop_db() -> SqlitePool {
    let pool = memory_db().await;
    exec(&pool, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").await;
    exec(&pool, "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, total REAL)").await;
    exec(&pool, "INSERT INTO users (id, name) VALUES (1, 'Alice'), (2, 'Bob'), (3, 'Malik')").await;
    exec(
        &pool,
        "INSERT INTO orders (id, user_id, total) VALUES (1, 1, 10.5), (2, 1, 99.0), (3, 2, 5.0)",
    )
    .await;
    pool
}

#[tokio::test]
async fn test_one_to_many_join_returns_one_row_per_base_key() {
    let pool = shop_db().await;
    let sql = Query::new("users")
        .columns(["users.*", "orders.total"])
        .order_by("id", "asc")
        .to_sql(&Translator::new(Dialect::Sqlite), &shop())
        .unwrap();

    let rows = sqlx::query(&sql).fetch_all(&pool).await.unwrap();
    let got: Vec<(i64, Option<f64>)> = rows
        .iter()
        .map(|r| (r.get("id"), r.get("total")))
        .collect();
    assert_eq!(got, vec![(1, Some(99.0)), (2, Some(5.0)), (3, None)]);
}

#[tokio::test]
async fn test_fuzzy_filter_is_case_insensitive() {
    let pool = shop_db().await;
    let sql = Query::new("users")
        .filter("name~", "ALI")
        .order_by("id", "asc")
        .to_sql(&Translator::new(Dialect::Sqlite), &shop())
        .unwrap();
    assert_eq!(ids(&pool, &sql).await, vec![1, 3]);
}
