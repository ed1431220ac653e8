//! SQL dialect rewrite tests (MySQL, SQLite, SQL Server, Oracle, DB2)

use pretty_assertions::assert_eq;

use crate::dialect::Dialect;
use crate::transpiler::{Rule, Translator};
use crate::value::Value;

#[test]
fn test_mysql_dialect() {
    let t = Translator::new(Dialect::MySql);
    assert_eq!(
        t.translate("SELECT LENGTH(name), RANDOM() FROM users WHERE a ILIKE 'x%'"),
        "SELECT CHAR_LENGTH(name), RAND() FROM users WHERE a LIKE 'x%'"
    );
    assert_eq!(
        t.translate("SELECT first || ' ' || last FROM users"),
        "SELECT CONCAT(first, ' ', last) FROM users"
    );
}

#[test]
fn test_mysql_concat_keeps_function_operands() {
    let t = Translator::new(Dialect::MySql);
    assert_eq!(
        t.translate("SELECT UPPER(u.first) || '-' || COALESCE(u.last, '') AS label FROM users u"),
        "SELECT CONCAT(UPPER(u.first), '-', COALESCE(u.last, '')) AS label FROM users u"
    );
    assert_eq!(
        t.translate("SELECT CASE WHEN a THEN 'x' END || b, -1 || c FROM t"),
        "SELECT CONCAT(CASE WHEN a THEN 'x' END, b), CONCAT(-1, c) FROM t"
    );
    assert_eq!(
        t.translate("SELECT a || CASE WHEN b THEN CASE WHEN c THEN 'y' END END, a - 1 || d FROM t"),
        "SELECT CONCAT(a, CASE WHEN b THEN CASE WHEN c THEN 'y' END END), a - CONCAT(1, d) FROM t"
    );
}

#[test]
fn test_sqlite_dialect() {
    let t = Translator::new(Dialect::Sqlite);
    assert_eq!(
        t.translate("SELECT NOW(), SUBSTRING(a, 2) FROM t WHERE b = TRUE AND c ILIKE 'q'"),
        "SELECT CURRENT_TIMESTAMP, SUBSTR(a, 2) FROM t WHERE b = 1 AND c LIKE 'q'"
    );
}

#[test]
fn test_sqlserver_dialect() {
    let t = Translator::new(Dialect::SqlServer);
    assert_eq!(
        t.translate("SELECT NOW(), LENGTH(name), IFNULL(a, 0), first || last FROM t WHERE active = TRUE"),
        "SELECT GETDATE(), LEN(name), ISNULL(a, 0), first + last FROM t WHERE active = 1"
    );
    assert_eq!(
        t.translate("SELECT RANDOM() FROM t WHERE name ILIKE 'jo%'"),
        "SELECT NEWID() FROM t WHERE name LIKE 'jo%'"
    );
}

#[test]
fn test_oracle_dialect() {
    let t = Translator::new(Dialect::Oracle);
    assert_eq!(
        t.translate("SELECT SUBSTRING(name, 1, 2), RANDOM(), NOW() FROM t WHERE name ILIKE 'a%' AND flag = FALSE"),
        "SELECT SUBSTR(name, 1, 2), DBMS_RANDOM.VALUE, SYSTIMESTAMP FROM t WHERE LOWER(name) LIKE LOWER('a%') AND flag = 0"
    );
    assert_eq!(
        t.translate("SELECT IFNULL(a, b) FROM t"),
        "SELECT NVL(a, b) FROM t"
    );
}

#[test]
fn test_db2_dialect() {
    let t = Translator::new(Dialect::Db2);
    assert_eq!(
        t.translate("SELECT NOW(), IFNULL(a, b) FROM t WHERE x NOT ILIKE '%y'"),
        "SELECT CURRENT TIMESTAMP, COALESCE(a, b) FROM t WHERE LOWER(x) NOT LIKE LOWER('%y')"
    );
}

#[test]
fn test_postgres_dialect() {
    let t = Translator::new(Dialect::Postgres);
    assert_eq!(
        t.translate("SELECT IFNULL(a, 1), b ILIKE 'x' FROM t WHERE c = TRUE"),
        "SELECT COALESCE(a, 1), b ILIKE 'x' FROM t WHERE c = TRUE"
    );
}

#[test]
fn test_literals_are_never_rewritten() {
    let t = Translator::new(Dialect::SqlServer);
    let sql = "SELECT 'NOW() || TRUE', \"TRUE\" FROM t WHERE note = 'it''s LENGTH(x)'";
    assert_eq!(t.translate(sql), sql);
}

#[test]
fn test_apostrophe_in_comment_keeps_literals_intact() {
    let t = Translator::new(Dialect::Sqlite);
    let sql = "SELECT a -- don't\n, 'TRUE' AS flag FROM t WHERE b = TRUE";
    assert_eq!(
        t.translate(sql),
        "SELECT a -- don't\n, 'TRUE' AS flag FROM t WHERE b = 1"
    );
    let sql = "SELECT /* it's */ 'NOW()' FROM t WHERE c = FALSE";
    assert_eq!(t.translate(sql), "SELECT /* it's */ 'NOW()' FROM t WHERE c = 0");
}

#[test]
fn test_qualified_names_are_not_keywords() {
    let t = Translator::new(Dialect::Sqlite);
    assert_eq!(
        t.translate("SELECT flags.true, t.now() FROM flags"),
        "SELECT flags.true, t.now() FROM flags"
    );
}

#[test]
fn test_rules_are_idempotent() {
    let sql = "SELECT NOW(), LENGTH(a || b), RANDOM(), IFNULL(c, 0) FROM t WHERE d = TRUE AND e ILIKE 'x%'";
    for dialect in Dialect::ALL {
        let t = Translator::new(dialect);
        let once = t.translate(sql);
        assert_eq!(t.translate(&once), once, "{}", dialect);
    }
}

#[test]
fn test_with_rule() {
    let t = Translator::new(Dialect::Postgres).with_rule(Rule::function("LEN", "LENGTH"));
    assert_eq!(t.translate("SELECT LEN(a) FROM t"), "SELECT LENGTH(a) FROM t");
    assert_eq!(t.rules().len(), 2);
}

#[test]
fn test_translator_escape() {
    let t = Translator::new(Dialect::SqlServer);
    assert_eq!(t.escape(&Value::Bool(true)), "1");
    assert_eq!(t.escape(&"x'y".into()), "'x''y'");
}
