//! LIMIT/OFFSET emulation tests

use pretty_assertions::assert_eq;

use crate::config::TranslatorConfig;
use crate::dialect::Dialect;
use crate::transpiler::Translator;

#[test]
fn test_native_dialects_pass_through() {
    let sql = "SELECT * FROM users ORDER BY id LIMIT 5 OFFSET 10";
    for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
        assert_eq!(Translator::new(dialect).rewrite_limit_offset(sql), sql);
    }
}

#[test]
fn test_sqlserver_top() {
    let t = Translator::new(Dialect::SqlServer);
    assert_eq!(
        t.rewrite_limit_offset("SELECT name FROM users ORDER BY name LIMIT 5"),
        "SELECT TOP 5 name FROM users ORDER BY name"
    );
    assert_eq!(
        t.rewrite_limit_offset("SELECT DISTINCT city FROM users LIMIT 3"),
        "SELECT DISTINCT TOP 3 city FROM users"
    );
    assert_eq!(
        t.rewrite_limit_offset("SELECT * FROM t LIMIT 1;"),
        "SELECT TOP 1 * FROM t"
    );
}

#[test]
fn test_sqlserver_row_number_with_order() {
    let t = Translator::new(Dialect::SqlServer);
    assert_eq!(
        t.rewrite_limit_offset("SELECT id, name FROM users WHERE active = 1 ORDER BY name LIMIT 10 OFFSET 20"),
        "SELECT * FROM (SELECT id, name, ROW_NUMBER() OVER (ORDER BY name) AS row_num FROM users WHERE active = 1) AS paged WHERE row_num > 20 AND row_num <= 30 ORDER BY row_num"
    );
}

#[test]
fn test_sqlserver_row_number_fallback_order() {
    let t = Translator::new(Dialect::SqlServer);
    assert_eq!(
        t.rewrite_limit_offset("SELECT * FROM users LIMIT 10 OFFSET 20"),
        "SELECT * FROM (SELECT *, ROW_NUMBER() OVER (ORDER BY (SELECT NULL)) AS row_num FROM users) AS paged WHERE row_num > 20 AND row_num <= 30 ORDER BY row_num"
    );

    let custom = Translator::from_config(
        TranslatorConfig::builder()
            .dialect(Dialect::SqlServer)
            .fallback_order("id")
            .build(),
    );
    assert_eq!(
        custom.rewrite_limit_offset("SELECT * FROM users LIMIT 10 OFFSET 20"),
        "SELECT * FROM (SELECT *, ROW_NUMBER() OVER (ORDER BY id) AS row_num FROM users) AS paged WHERE row_num > 20 AND row_num <= 30 ORDER BY row_num"
    );
}

#[test]
fn test_sqlserver_subselects_are_opaque() {
    let t = Translator::new(Dialect::SqlServer);
    assert_eq!(
        t.rewrite_limit_offset("SELECT a, (SELECT MAX(b) FROM t2 LIMIT 1) AS m FROM t LIMIT 2"),
        "SELECT TOP 2 a, (SELECT MAX(b) FROM t2 LIMIT 1) AS m FROM t"
    );
}

#[test]
fn test_oracle_rownum() {
    let t = Translator::new(Dialect::Oracle);
    assert_eq!(
        t.rewrite_limit_offset("SELECT * FROM users ORDER BY id LIMIT 5"),
        "SELECT * FROM (SELECT * FROM users ORDER BY id) WHERE rownum <= 5"
    );
    assert_eq!(
        t.rewrite_limit_offset("SELECT * FROM users ORDER BY id LIMIT 5 OFFSET 10"),
        "SELECT * FROM (SELECT paged.*, rownum AS row_num FROM (SELECT * FROM users ORDER BY id) paged WHERE rownum <= 15) WHERE row_num > 10"
    );
}

#[test]
fn test_huge_limit_drops_upper_bound() {
    let sql = "SELECT * FROM t ORDER BY id LIMIT 18446744073709551615 OFFSET 5";
    assert_eq!(
        Translator::new(Dialect::SqlServer).rewrite_limit_offset(sql),
        "SELECT * FROM (SELECT *, ROW_NUMBER() OVER (ORDER BY id) AS row_num FROM t) AS paged WHERE row_num > 5 ORDER BY row_num"
    );
    assert_eq!(
        Translator::new(Dialect::Oracle).rewrite_limit_offset(sql),
        "SELECT * FROM (SELECT paged.*, rownum AS row_num FROM (SELECT * FROM t ORDER BY id) paged) WHERE row_num > 5"
    );
}

#[test]
fn test_db2_fetch_first() {
    let t = Translator::new(Dialect::Db2);
    assert_eq!(
        t.rewrite_limit_offset("SELECT * FROM users ORDER BY id LIMIT 5"),
        "SELECT * FROM users ORDER BY id FETCH FIRST 5 ROWS ONLY"
    );
    let with_offset = "SELECT * FROM users ORDER BY id LIMIT 5 OFFSET 10";
    assert_eq!(t.rewrite_limit_offset(with_offset), with_offset);
}

#[test]
fn test_unrecognized_shapes_pass_through() {
    let t = Translator::new(Dialect::SqlServer);
    for sql in [
        "SELECT a FROM t UNION SELECT a FROM u LIMIT 5",
        "UPDATE t SET a = 1",
        "SELECT a FROM t",
        "SELECT a FROM t LIMIT :n",
    ] {
        assert_eq!(t.rewrite_limit_offset(sql), sql);
    }
}
