//! Target database dialects and their escaping primitive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SqlportError;
use crate::value::Value;

/// Supported SQL Dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    SqlServer,
    Oracle,
    Db2,
}

/// How a dialect expresses LIMIT/OFFSET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingStyle {
    /// `LIMIT n OFFSET m` understood as written.
    Native,
    /// `SELECT TOP n`, `ROW_NUMBER()` window for offsets.
    Top,
    /// `rownum` pseudo-column.
    RowNum,
    /// `FETCH FIRST n ROWS ONLY`, no offset support.
    FetchFirst,
}

/// How a dialect provides auto-increment columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoIncrementStyle {
    Serial,
    AutoIncrement,
    RowIdAlias,
    Identity,
    SequenceTrigger,
    GeneratedIdentity,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::Sqlite,
        Dialect::SqlServer,
        Dialect::Oracle,
        Dialect::Db2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::SqlServer => "sqlserver",
            Dialect::Oracle => "oracle",
            Dialect::Db2 => "db2",
        }
    }

    pub fn paging_style(&self) -> PagingStyle {
        match self {
            Dialect::Postgres | Dialect::MySql | Dialect::Sqlite => PagingStyle::Native,
            Dialect::SqlServer => PagingStyle::Top,
            Dialect::Oracle => PagingStyle::RowNum,
            Dialect::Db2 => PagingStyle::FetchFirst,
        }
    }

    pub fn auto_increment_style(&self) -> AutoIncrementStyle {
        match self {
            Dialect::Postgres => AutoIncrementStyle::Serial,
            Dialect::MySql => AutoIncrementStyle::AutoIncrement,
            Dialect::Sqlite => AutoIncrementStyle::RowIdAlias,
            Dialect::SqlServer => AutoIncrementStyle::Identity,
            Dialect::Oracle => AutoIncrementStyle::SequenceTrigger,
            Dialect::Db2 => AutoIncrementStyle::GeneratedIdentity,
        }
    }

    /// Engines that ignore (or lack) declarative FK enforcement and need triggers.
    pub fn synthesizes_fk_triggers(&self) -> bool {
        matches!(self, Dialect::Sqlite)
    }

    /// Engines that parse but silently ignore column-level `REFERENCES`.
    pub fn needs_table_level_fk(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Engines where string literals treat backslash as an escape.
    fn backslash_escapes(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    fn has_boolean_literals(&self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::MySql)
    }

    /// Case-insensitive pattern match in this dialect.
    ///
    /// PostgreSQL has `ILIKE`; MySQL, SQLite and SQL Server compare
    /// case-insensitively under their default collations; Oracle and DB2
    /// need both sides folded.
    pub fn case_insensitive_like(&self, lhs: &str, rhs: &str, negated: bool) -> String {
        let not = if negated { "NOT " } else { "" };
        match self {
            Dialect::Postgres => format!("{} {}ILIKE {}", lhs, not, rhs),
            Dialect::MySql | Dialect::Sqlite | Dialect::SqlServer => {
                format!("{} {}LIKE {}", lhs, not, rhs)
            }
            Dialect::Oracle | Dialect::Db2 => {
                format!("LOWER({}) {}LIKE LOWER({})", lhs, not, rhs)
            }
        }
    }

    /// Escape a string literal, quotes included.
    pub fn quote_string(&self, s: &str) -> String {
        let mut escaped = s.replace('\'', "''");
        if self.backslash_escapes() {
            escaped = escaped.replace('\\', "\\\\");
        }
        format!("'{}'", escaped)
    }

    /// Render a value as a dialect-correct SQL literal.
    pub fn escape(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => {
                if self.has_boolean_literals() {
                    if *b { "TRUE" } else { "FALSE" }.to_string()
                } else if *b {
                    "1".to_string()
                } else {
                    "0".to_string()
                }
            }
            Value::Int(n) => n.to_string(),
            Value::Float(f) => {
                if f.is_finite() {
                    f.to_string()
                } else {
                    "NULL".to_string()
                }
            }
            Value::String(s) => self.quote_string(s),
            Value::Blob(bytes) => {
                let hex = hex::encode_upper(bytes);
                match self {
                    Dialect::Postgres => format!("decode('{}', 'hex')", hex),
                    Dialect::MySql | Dialect::Sqlite => format!("X'{}'", hex),
                    Dialect::SqlServer => format!("0x{}", hex),
                    Dialect::Oracle => format!("HEXTORAW('{}')", hex),
                    Dialect::Db2 => format!("BLOB(X'{}')", hex),
                }
            }
            Value::Date(d) => {
                let text = d.format("%Y-%m-%d").to_string();
                match self {
                    Dialect::Oracle => format!("DATE '{}'", text),
                    _ => format!("'{}'", text),
                }
            }
            Value::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
            Value::Timestamp(ts) => match self {
                Dialect::Oracle => format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.f")),
                Dialect::SqlServer => format!("'{}'", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
                _ => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            },
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SqlportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" | "pgsql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "sqlserver" | "mssql" | "tsql" => Ok(Dialect::SqlServer),
            "oracle" | "oci" => Ok(Dialect::Oracle),
            "db2" | "ibm" => Ok(Dialect::Db2),
            other => Err(SqlportError::Config(format!(
                "Unknown dialect '{}'. Expected: postgres, mysql, sqlite, sqlserver, oracle, db2",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_escape_string() {
        assert_eq!(Dialect::Postgres.escape(&"O'Brien".into()), "'O''Brien'");
        assert_eq!(Dialect::MySql.escape(&"a\\b".into()), "'a\\\\b'");
    }

    #[test]
    fn test_escape_bool() {
        assert_eq!(Dialect::Postgres.escape(&true.into()), "TRUE");
        assert_eq!(Dialect::SqlServer.escape(&true.into()), "1");
        assert_eq!(Dialect::Oracle.escape(&false.into()), "0");
    }

    #[test]
    fn test_escape_blob() {
        let blob = Value::Blob(vec![0xde, 0xad]);
        assert_eq!(Dialect::SqlServer.escape(&blob), "0xDEAD");
        assert_eq!(Dialect::Sqlite.escape(&blob), "X'DEAD'");
        assert_eq!(Dialect::Oracle.escape(&blob), "HEXTORAW('DEAD')");
    }

    #[test]
    fn test_escape_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(Dialect::MySql.escape(&d.into()), "'2024-01-02'");
        assert_eq!(Dialect::Oracle.escape(&d.into()), "DATE '2024-01-02'");

        let ts = d.and_hms_opt(8, 5, 0).unwrap();
        assert_eq!(Dialect::Postgres.escape(&ts.into()), "'2024-01-02 08:05:00'");
        assert_eq!(Dialect::SqlServer.escape(&ts.into()), "'2024-01-02T08:05:00'");
    }

    #[test]
    fn test_escape_null_and_numbers() {
        assert_eq!(Dialect::Db2.escape(&Value::Null), "NULL");
        assert_eq!(Dialect::Db2.escape(&Value::Int(-7)), "-7");
        assert_eq!(Dialect::Db2.escape(&Value::Float(f64::NAN)), "NULL");
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("mssql".parse::<Dialect>().unwrap(), Dialect::SqlServer);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("access".parse::<Dialect>().is_err());
    }
}
