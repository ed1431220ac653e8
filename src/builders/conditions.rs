//! Condition keys and values.
//!
//! A key is a column or expression with a trailing operator glyph, or an
//! OR-group of them separated by `|`:
//!
//! ```text
//! age>=            users.age >= ?
//! name|email~      fuzzy match over both columns
//! age>|score<      one value per column, combined with OR
//! ```
//!
//! Members without their own glyph take the last member's operator, so
//! `name|email~` is uniform.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{SqlportError, SqlportResult};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `~`: tokenized case-insensitive search.
    Fuzzy,
}

impl Operator {
    /// Parse an operator glyph; the empty glyph means equality.
    pub fn from_glyph(glyph: &str) -> Option<Self> {
        match glyph {
            "" | "=" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "~" => Some(Operator::Fuzzy),
            _ => None,
        }
    }

    /// SQL spelling of the comparison.
    pub fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Fuzzy => "~",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql())
    }
}

/// One member of a condition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub column: String,
    pub operator: Operator,
}

/// A parsed condition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionKey {
    pub key: String,
    pub terms: Vec<Term>,
}

const GLYPH_CHARS: &[char] = &['=', '!', '<', '>', '~'];

impl ConditionKey {
    pub fn parse(key: &str) -> SqlportResult<Self> {
        let mut parts: Vec<(String, Option<Operator>)> = Vec::new();
        for part in split_or_group(key) {
            let part = part.trim();
            let column = part.trim_end_matches(GLYPH_CHARS).trim_end();
            let glyph = part[column.len()..].trim();
            if column.is_empty() {
                return Err(SqlportError::InvalidCondition(key.to_string()));
            }
            let operator = if glyph.is_empty() {
                None
            } else {
                Some(Operator::from_glyph(glyph).ok_or_else(|| SqlportError::InvalidOperator {
                    key: key.to_string(),
                    operator: glyph.to_string(),
                })?)
            };
            parts.push((column.to_string(), operator));
        }

        let fallback = parts
            .last()
            .and_then(|(_, op)| *op)
            .unwrap_or(Operator::Eq);
        let terms = parts
            .into_iter()
            .map(|(column, operator)| Term {
                column,
                operator: operator.unwrap_or(fallback),
            })
            .collect();
        Ok(Self {
            key: key.to_string(),
            terms,
        })
    }

    /// The shared operator when every member uses the same one.
    pub fn uniform_operator(&self) -> Option<Operator> {
        let first = self.terms.first()?.operator;
        self.terms
            .iter()
            .all(|t| t.operator == first)
            .then_some(first)
    }
}

/// Split on `|` outside parentheses, leaving `||` concatenation alone.
fn split_or_group(key: &str) -> Vec<&str> {
    let bytes = key.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b'|' if bytes.get(i + 1) == Some(&b'|') => i += 1,
            b'|' if depth == 0 => {
                parts.push(&key[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&key[start..]);
    parts
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Scalar(Value),
    List(Vec<Value>),
}

impl ConditionValue {
    /// Number of values supplied.
    pub fn len(&self) -> usize {
        match self {
            ConditionValue::Scalar(_) => 1,
            ConditionValue::List(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! scalar_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for ConditionValue {
                fn from(v: $t) -> Self {
                    ConditionValue::Scalar(v.into())
                }
            }
        )*
    };
}

scalar_from!(Value, bool, i32, i64, f64, &str, String, NaiveDate, NaiveTime, NaiveDateTime);

impl<T: Into<Value>> From<Option<T>> for ConditionValue {
    fn from(v: Option<T>) -> Self {
        ConditionValue::Scalar(v.into())
    }
}

impl<T: Into<Value>> From<Vec<T>> for ConditionValue {
    fn from(values: Vec<T>) -> Self {
        ConditionValue::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_key_operators() {
        let key = ConditionKey::parse("age>=").unwrap();
        assert_eq!(
            key.terms,
            vec![Term {
                column: "age".to_string(),
                operator: Operator::Ge
            }]
        );
        assert_eq!(ConditionKey::parse("name").unwrap().terms[0].operator, Operator::Eq);
        assert_eq!(ConditionKey::parse("name !=").unwrap().terms[0].column, "name");
    }

    #[test]
    fn test_parse_or_groups() {
        let key = ConditionKey::parse("name|email~").unwrap();
        assert_eq!(key.uniform_operator(), Some(Operator::Fuzzy));
        assert_eq!(key.terms.len(), 2);

        let key = ConditionKey::parse("age>|score<").unwrap();
        assert_eq!(key.uniform_operator(), None);

        let key = ConditionKey::parse("first_name || last_name~").unwrap();
        assert_eq!(key.terms.len(), 1);
        assert_eq!(key.terms[0].column, "first_name || last_name");
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(matches!(
            ConditionKey::parse("age=>"),
            Err(SqlportError::InvalidOperator { operator, .. }) if operator == "=>"
        ));
        assert!(matches!(
            ConditionKey::parse(">="),
            Err(SqlportError::InvalidCondition(_))
        ));
    }

    #[test]
    fn test_condition_value_from() {
        assert_eq!(ConditionValue::from(21), ConditionValue::Scalar(Value::Int(21)));
        assert_eq!(
            ConditionValue::from(vec!["a", "b"]),
            ConditionValue::List(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(ConditionValue::from(None::<i64>), ConditionValue::Scalar(Value::Null));
    }
}
