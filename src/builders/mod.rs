//! WHERE, HAVING and ORDER BY builders.
//!
//! Conditions are ordered `(key, value)` pairs; see [`conditions`] for the
//! key syntax. Every value goes through the translator's escaping after
//! coercion to the column's declared type, so the builders never emit a
//! bound parameter.

pub mod conditions;
pub mod search;

#[cfg(test)]
mod tests;

use crate::error::{SqlportError, SqlportResult};
use crate::joins::path::{self, ColumnPath};
use crate::schema::{ColumnType, SchemaSource};
use crate::transpiler::Translator;
use crate::value::Value;

pub use conditions::{ConditionKey, ConditionValue, Operator, Term};

/// Builds boolean and ordering clauses for one dialect and schema.
pub struct ClauseBuilder<'a> {
    translator: &'a Translator,
    schema: &'a dyn SchemaSource,
}

/// A resolved column: SQL text plus its declared type when known.
struct Column {
    sql: String,
    column_type: Option<ColumnType>,
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl<'a> ClauseBuilder<'a> {
    pub fn new(translator: &'a Translator, schema: &'a dyn SchemaSource) -> Self {
        Self { translator, schema }
    }

    /// WHERE body for `table`. Empty when there are no conditions.
    pub fn build_where<K: AsRef<str>>(
        &self,
        table: &str,
        conditions: &[(K, ConditionValue)],
    ) -> SqlportResult<String> {
        self.build_conditions(Some(table), conditions)
    }

    /// HAVING body. Keys are used as written.
    pub fn build_having<K: AsRef<str>>(&self, conditions: &[(K, ConditionValue)]) -> SqlportResult<String> {
        self.build_conditions(None, conditions)
    }

    /// ORDER BY body. Text columns sort case-insensitively.
    pub fn build_order_by<C, D>(&self, table: &str, order_bys: &[(C, D)]) -> SqlportResult<String>
    where
        C: AsRef<str>,
        D: AsRef<str>,
    {
        let mut items = Vec::with_capacity(order_bys.len());
        for (column, direction) in order_bys {
            let (column, direction) = (column.as_ref(), direction.as_ref());
            let dir = direction.trim().to_ascii_uppercase();
            if dir != "ASC" && dir != "DESC" {
                return Err(SqlportError::InvalidDirection {
                    column: column.to_string(),
                    direction: direction.to_string(),
                });
            }
            let trimmed = column.trim();
            if trimmed.is_empty() {
                return Err(SqlportError::InvalidCondition(column.to_string()));
            }
            let resolved = self.resolve(Some(table), trimmed)?;
            let sql = match resolved.column_type {
                Some(t) if t.is_textual() => format!("LOWER({})", resolved.sql),
                _ => resolved.sql,
            };
            items.push(format!("{} {}", sql, dir));
        }
        Ok(items.join(", "))
    }

    fn build_conditions<K: AsRef<str>>(
        &self,
        table: Option<&str>,
        conditions: &[(K, ConditionValue)],
    ) -> SqlportResult<String> {
        let mut parts = Vec::with_capacity(conditions.len());
        for (key, value) in conditions {
            let key = key.as_ref();
            let part = self.condition(table, key, value)?;
            tracing::debug!("condition {} -> {}", key, part);
            parts.push(part);
        }
        Ok(parts.join(" AND "))
    }

    fn condition(&self, table: Option<&str>, key: &str, value: &ConditionValue) -> SqlportResult<String> {
        let parsed = ConditionKey::parse(key)?;
        let columns = parsed
            .terms
            .iter()
            .map(|t| self.resolve(table, &t.column))
            .collect::<SqlportResult<Vec<_>>>()?;

        if let [column] = columns.as_slice() {
            return self.compare(key, column, parsed.terms[0].operator, value);
        }

        let parts = match (parsed.uniform_operator(), value) {
            (Some(Operator::Fuzzy), ConditionValue::Scalar(v)) => {
                return self.fuzzy(key, &columns, v);
            }
            (Some(op), ConditionValue::Scalar(_)) => columns
                .iter()
                .map(|c| self.compare(key, c, op, value))
                .collect::<SqlportResult<Vec<_>>>()?,
            (_, ConditionValue::List(values)) if values.len() == columns.len() => columns
                .iter()
                .zip(&parsed.terms)
                .zip(values)
                .map(|((c, term), v)| {
                    self.compare(key, c, term.operator, &ConditionValue::Scalar(v.clone()))
                })
                .collect::<SqlportResult<Vec<_>>>()?,
            _ => {
                return Err(SqlportError::OrGroupArity {
                    key: key.to_string(),
                    columns: columns.len(),
                    values: value.len(),
                });
            }
        };
        Ok(format!("({})", parts.join(" OR ")))
    }

    /// One column against one value or list.
    fn compare(
        &self,
        key: &str,
        column: &Column,
        op: Operator,
        value: &ConditionValue,
    ) -> SqlportResult<String> {
        let col = &column.sql;
        match value {
            ConditionValue::List(values) => match op {
                Operator::Eq | Operator::Ne => Ok(self.membership(column, op == Operator::Ne, values)),
                _ => Err(SqlportError::invalid_value(
                    key,
                    format!("a list can't be compared with '{}'", op),
                )),
            },
            ConditionValue::Scalar(Value::Null) => match op {
                Operator::Eq => Ok(format!("{} IS NULL", col)),
                Operator::Ne => Ok(format!("{} IS NOT NULL", col)),
                _ => Err(SqlportError::invalid_value(
                    key,
                    format!("NULL can't be compared with '{}'", op),
                )),
            },
            ConditionValue::Scalar(v) if op == Operator::Fuzzy => {
                self.fuzzy(key, std::slice::from_ref(column), v)
            }
            ConditionValue::Scalar(v) => Ok(format!("{} {} {}", col, op.sql(), self.escape(column, v))),
        }
    }

    /// `IN` / `NOT IN` with NULL members split out.
    fn membership(&self, column: &Column, negated: bool, values: &[Value]) -> String {
        let col = &column.sql;
        if values.is_empty() {
            return if negated { "1 = 1" } else { "1 = 0" }.to_string();
        }
        let has_null = values.iter().any(Value::is_null);
        let listed: Vec<String> = values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| self.escape(column, v))
            .collect();

        let (keyword, null_test, joiner) = if negated {
            ("NOT IN", "IS NOT NULL", " AND ")
        } else {
            ("IN", "IS NULL", " OR ")
        };
        let mut parts = Vec::new();
        if !listed.is_empty() {
            parts.push(format!("{} {} ({})", col, keyword, listed.join(", ")));
        }
        if has_null {
            parts.push(format!("{} {}", col, null_test));
        }
        if parts.len() == 1 {
            parts.join("")
        } else {
            format!("({})", parts.join(joiner))
        }
    }

    fn fuzzy(&self, key: &str, columns: &[Column], value: &Value) -> SqlportResult<String> {
        let Value::String(text) = value else {
            return Err(SqlportError::invalid_value(key, "fuzzy match needs a string"));
        };
        let terms = search::search_terms(text, |w| self.translator.is_stop_word(w));
        let columns: Vec<String> = columns.iter().map(|c| c.sql.clone()).collect();
        Ok(search::fuzzy_match(self.translator.dialect(), &columns, &terms))
    }

    fn escape(&self, column: &Column, value: &Value) -> String {
        match column.column_type {
            Some(t) => self.translator.escape(&value.clone().coerce(t)),
            None => self.translator.escape(value),
        }
    }

    /// Qualify bare identifiers with `table` and look up declared types.
    fn resolve(&self, table: Option<&str>, column: &str) -> SqlportResult<Column> {
        if is_identifier(column) {
            return Ok(match table {
                Some(table) => Column {
                    sql: format!("{}.{}", table, column),
                    column_type: self.column_type(table, column)?,
                },
                None => Column {
                    sql: column.to_string(),
                    column_type: None,
                },
            });
        }

        // dotted names and shorthand paths keep their text
        let column_type = match path::column_path(column) {
            Ok(("", found)) => {
                let owner = match found {
                    ColumnPath::Direct { table, .. } | ColumnPath::Routed { table, .. } => table,
                    ColumnPath::DoubleHop { second, .. } => second.table,
                };
                self.column_type(owner, found.column())?
            }
            _ => None,
        };
        Ok(Column {
            sql: column.to_string(),
            column_type,
        })
    }

    fn column_type(&self, table: &str, column: &str) -> SqlportResult<Option<ColumnType>> {
        Ok(self.schema.column(table, column)?.map(|c| c.column_type))
    }
}
