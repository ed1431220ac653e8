use super::*;
use crate::dialect::Dialect;
use crate::schema::{ColumnInfo, Schema};
use pretty_assertions::assert_eq;

fn users() -> Schema {
    Schema::new().table(
        "users",
        vec![
            ColumnInfo::primary("id", ColumnType::Integer),
            ColumnInfo::new("name", ColumnType::String),
            ColumnInfo::new("email", ColumnType::String),
            ColumnInfo::new("age", ColumnType::Integer),
            ColumnInfo::new("active", ColumnType::Boolean),
            ColumnInfo::new("born", ColumnType::Date),
        ],
    )
}

fn where_sql(dialect: Dialect, conditions: &[(&str, ConditionValue)]) -> SqlportResult<String> {
    let translator = Translator::new(dialect);
    let schema = users();
    ClauseBuilder::new(&translator, &schema).build_where("users", conditions)
}

#[test]
fn test_comparison_operators() {
    assert_eq!(
        where_sql(Dialect::Postgres, &[("age>=", 21.into())]).unwrap(),
        "users.age >= 21"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("age!=", 30.into()), ("age<", 65.into())]).unwrap(),
        "users.age <> 30 AND users.age < 65"
    );
}

#[test]
fn test_values_follow_column_types() {
    assert_eq!(
        where_sql(Dialect::Postgres, &[("age", "21".into())]).unwrap(),
        "users.age = 21"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("name", 42.into())]).unwrap(),
        "users.name = '42'"
    );
    assert_eq!(
        where_sql(Dialect::Sqlite, &[("active", "true".into())]).unwrap(),
        "users.active = 1"
    );
    assert_eq!(
        where_sql(Dialect::Oracle, &[("born>", "2020-01-02".into())]).unwrap(),
        "users.born > DATE '2020-01-02'"
    );
}

#[test]
fn test_lists_become_membership_tests() {
    assert_eq!(
        where_sql(Dialect::Postgres, &[("id", vec![1, 2, 3].into())]).unwrap(),
        "users.id IN (1, 2, 3)"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("id!=", vec![1].into())]).unwrap(),
        "users.id NOT IN (1)"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("id", Vec::<i64>::new().into())]).unwrap(),
        "1 = 0"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("id!=", Vec::<i64>::new().into())]).unwrap(),
        "1 = 1"
    );
}

#[test]
fn test_null_comparisons() {
    assert_eq!(
        where_sql(Dialect::Postgres, &[("email", None::<String>.into())]).unwrap(),
        "users.email IS NULL"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("email!=", Value::Null.into())]).unwrap(),
        "users.email IS NOT NULL"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("id", vec![Some(1), None].into())]).unwrap(),
        "(users.id IN (1) OR users.id IS NULL)"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("id!=", vec![Some(1), None].into())]).unwrap(),
        "(users.id NOT IN (1) AND users.id IS NOT NULL)"
    );

    let err = where_sql(Dialect::Postgres, &[("age>", Value::Null.into())]).unwrap_err();
    assert!(matches!(err, SqlportError::InvalidValue { key, .. } if key == "age>"));
}

#[test]
fn test_fuzzy_single_column() {
    assert_eq!(
        where_sql(Dialect::Postgres, &[("name~", "john".into())]).unwrap(),
        "users.name ILIKE '%john%'"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("name~", "the smiths".into())]).unwrap(),
        "users.name ILIKE '%smiths%'"
    );
    assert_eq!(
        where_sql(Dialect::Db2, &[("name~", "Ann".into())]).unwrap(),
        "LOWER(users.name) LIKE LOWER('%Ann%')"
    );
}

#[test]
fn test_fuzzy_or_group() {
    assert_eq!(
        where_sql(Dialect::Sqlite, &[("name|email~", "john".into())]).unwrap(),
        "(users.name LIKE '%john%' OR users.email LIKE '%john%')"
    );
    assert_eq!(
        where_sql(Dialect::Postgres, &[("name|email~", "\"john smith\" acme".into())]).unwrap(),
        "((users.name ILIKE '%john smith%' OR users.email ILIKE '%john smith%') \
         AND (users.name ILIKE '%acme%' OR users.email ILIKE '%acme%'))"
    );
}

#[test]
fn test_stop_words_come_from_config() {
    let config = crate::config::TranslatorConfig::builder()
        .dialect(Dialect::Postgres)
        .stop_words(["acme"])
        .build();
    let translator = Translator::from_config(config);
    let schema = users();
    let sql = ClauseBuilder::new(&translator, &schema)
        .build_where("users", &[("name~", "acme the".into())])
        .unwrap();
    assert_eq!(sql, "users.name ILIKE '%the%'");
}

#[test]
fn test_uniform_or_group() {
    assert_eq!(
        where_sql(Dialect::Postgres, &[("age|score>", 5.into())]).unwrap(),
        "(users.age > 5 OR users.score > 5)"
    );
}

#[test]
fn test_mixed_or_group_needs_one_value_per_column() {
    assert_eq!(
        where_sql(
            Dialect::Postgres,
            &[("age>|name", vec![Value::from(18), Value::from("bob")].into())]
        )
        .unwrap(),
        "(users.age > 18 OR users.name = 'bob')"
    );

    let err = where_sql(Dialect::Postgres, &[("age>|name", "bob".into())]).unwrap_err();
    match err {
        SqlportError::OrGroupArity { key, columns, values } => {
            assert_eq!((key.as_str(), columns, values), ("age>|name", 2, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_dotted_names_and_expressions_are_kept() {
    let schema = users().table(
        "orders",
        vec![ColumnInfo::new("total", ColumnType::Float)],
    );
    let translator = Translator::new(Dialect::Postgres);
    let builder = ClauseBuilder::new(&translator, &schema);
    assert_eq!(
        builder
            .build_where("users", &[("orders.total>", "9.5".into())])
            .unwrap(),
        "orders.total > 9.5"
    );
    assert_eq!(
        builder
            .build_where("users", &[("LOWER(name)", "ann".into())])
            .unwrap(),
        "LOWER(name) = 'ann'"
    );
}

#[test]
fn test_invalid_operator() {
    let err = where_sql(Dialect::Postgres, &[("age=>", 1.into())]).unwrap_err();
    assert!(matches!(err, SqlportError::InvalidOperator { .. }));
}

#[test]
fn test_having() {
    let translator = Translator::new(Dialect::MySql);
    let schema = users();
    let sql = ClauseBuilder::new(&translator, &schema)
        .build_having(&[("COUNT(orders.id)>", 2.into())])
        .unwrap();
    assert_eq!(sql, "COUNT(orders.id) > 2");
}

#[test]
fn test_order_by() {
    let translator = Translator::new(Dialect::Postgres);
    let schema = users();
    let builder = ClauseBuilder::new(&translator, &schema);
    assert_eq!(
        builder
            .build_order_by("users", &[("name", "asc"), ("age", "DESC")])
            .unwrap(),
        "LOWER(users.name) ASC, users.age DESC"
    );

    let err = builder
        .build_order_by("users", &[("age", "upwards")])
        .unwrap_err();
    match err {
        SqlportError::InvalidDirection { column, direction } => {
            assert_eq!(column, "age");
            assert_eq!(direction, "upwards");
        }
        other => panic!("unexpected error: {other}"),
    }
}
