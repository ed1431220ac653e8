//! National-column projection tests (SQL Server)

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::TranslatorConfig;
use crate::dialect::Dialect;
use crate::error::SqlportError;
use crate::transpiler::{NationalColumns, Translator};

fn national() -> NationalColumns {
    NationalColumns::from([("Users".to_string(), vec!["Name".to_string(), "email".to_string()])])
}

fn translator() -> Translator {
    Translator::new(Dialect::SqlServer).with_national_columns(national())
}

#[test]
fn test_unqualified_column() {
    assert_eq!(
        translator().fix_national_columns("SELECT name, age FROM users").unwrap(),
        "SELECT name, age, CAST(name AS VARBINARY(MAX)) AS __bin_name FROM users"
    );
}

#[test]
fn test_wildcards() {
    let t = translator();
    assert_eq!(
        t.fix_national_columns("SELECT * FROM users u").unwrap(),
        "SELECT *, CAST(u.name AS VARBINARY(MAX)) AS __bin_name, CAST(u.email AS VARBINARY(MAX)) AS __bin_email FROM users u"
    );
    assert_eq!(
        t.fix_national_columns("SELECT u.*, o.total FROM users u JOIN orders o ON o.user_id = u.id").unwrap(),
        "SELECT u.*, o.total, CAST(u.name AS VARBINARY(MAX)) AS __bin_name, CAST(u.email AS VARBINARY(MAX)) AS __bin_email FROM users u JOIN orders o ON o.user_id = u.id"
    );
}

#[test]
fn test_function_wrapped_with_alias() {
    assert_eq!(
        translator().fix_national_columns("SELECT UPPER(u.name) AS shout FROM users u").unwrap(),
        "SELECT UPPER(u.name) AS shout, CAST(UPPER(u.name) AS VARBINARY(MAX)) AS __bin_shout FROM users u"
    );
}

#[test]
fn test_projections_are_deduplicated() {
    let t = translator();
    let once = t.fix_national_columns("SELECT name, users.name FROM users").unwrap();
    assert_eq!(
        once,
        "SELECT name, users.name, CAST(name AS VARBINARY(MAX)) AS __bin_name FROM users"
    );
    assert_eq!(t.fix_national_columns(&once).unwrap(), once);
}

#[test]
fn test_nested_select_in_from() {
    assert_eq!(
        translator().fix_national_columns("SELECT * FROM (SELECT name FROM users) AS sub").unwrap(),
        "SELECT * FROM (SELECT name, CAST(name AS VARBINARY(MAX)) AS __bin_name FROM users) AS sub"
    );
}

#[test]
fn test_literals_and_unparseable_statements_untouched() {
    let t = translator();
    for sql in ["SELECT 'name' FROM users", "UPDATE users SET name = 'x'", "SELECT age FROM users"] {
        assert_eq!(t.fix_national_columns(sql).unwrap(), sql);
    }
}

#[test]
fn test_configured_marker() {
    let config = TranslatorConfig::builder()
        .dialect(Dialect::SqlServer)
        .national_marker("raw_")
        .binary_type("VARBINARY(4000)")
        .build();
    let t = Translator::from_config(config).with_national_columns(national());
    assert_eq!(
        t.fix_national_columns("SELECT email FROM users").unwrap(),
        "SELECT email, CAST(email AS VARBINARY(4000)) AS raw_email FROM users"
    );
}

#[test]
fn test_other_dialects_never_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let t = Translator::new(Dialect::Postgres).with_national_loader(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(national())
    });
    assert_eq!(t.fix_national_columns("SELECT name FROM users").unwrap(), "SELECT name FROM users");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_loader_runs_once_and_errors_are_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let t = Translator::new(Dialect::SqlServer).with_national_loader(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(SqlportError::Metadata("connection refused".to_string()))
        } else {
            Ok(national())
        }
    });

    let err = t.fix_national_columns("SELECT name FROM users").unwrap_err();
    assert!(matches!(err, SqlportError::Metadata(_)));

    let expected = "SELECT name, CAST(name AS VARBINARY(MAX)) AS __bin_name FROM users";
    assert_eq!(t.fix_national_columns("SELECT name FROM users").unwrap(), expected);
    assert_eq!(t.fix_national_columns("SELECT name FROM users").unwrap(), expected);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
