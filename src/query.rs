//! SELECT compilation.
//!
//! [`Query`] assembles a statement from its parts and runs it through the
//! join compiler, the paging rewriter, the national-column stage and the
//! dialect rules, in that order.
//!
//! ```
//! use sqlport::prelude::*;
//!
//! let schema = Schema::new().table(
//!     "users",
//!     vec![
//!         ColumnInfo::primary("id", ColumnType::Integer),
//!         ColumnInfo::new("age", ColumnType::Integer),
//!     ],
//! );
//! let translator = Translator::new(Dialect::Postgres);
//! let sql = Query::new("users")
//!     .filter("age>=", 21)
//!     .limit(10)
//!     .to_sql(&translator, &schema)
//!     .unwrap();
//! assert_eq!(sql, "SELECT users.* FROM users WHERE users.age >= 21 LIMIT 10");
//! ```

use crate::builders::{ClauseBuilder, ConditionValue};
use crate::error::{SqlportError, SqlportResult};
use crate::joins::{FROM_PLACEHOLDER, GROUP_BY_PLACEHOLDER, JoinCompiler};
use crate::schema::{KeyKind, SchemaSource};
use crate::transpiler::Translator;

#[derive(Debug, Clone, Default)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    filters: Vec<(String, ConditionValue)>,
    having: Vec<(String, ConditionValue)>,
    order_by: Vec<(String, String)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Select list items. Shorthand paths are allowed; defaults to `table.*`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn column(mut self, column: &str) -> Self {
        self.columns.push(column.to_string());
        self
    }

    pub fn filter(mut self, key: &str, value: impl Into<ConditionValue>) -> Self {
        self.filters.push((key.to_string(), value.into()));
        self
    }

    pub fn having(mut self, key: &str, value: impl Into<ConditionValue>) -> Self {
        self.having.push((key.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        self.order_by.push((column.to_string(), direction.to_string()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The common-dialect statement with join placeholders, before any
    /// compilation stage runs.
    pub fn statement(&self, translator: &Translator, schema: &dyn SchemaSource) -> SqlportResult<String> {
        if self.offset.is_some() && self.limit.is_none() {
            return Err(SqlportError::InvalidPaging(format!(
                "OFFSET without LIMIT on '{}'",
                self.table
            )));
        }

        let builder = ClauseBuilder::new(translator, schema);
        let columns = if self.columns.is_empty() {
            format!("{}.*", self.table)
        } else {
            self.columns.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, FROM_PLACEHOLDER);
        let filters = builder.build_where(&self.table, &self.filters)?;
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters);
        }
        sql.push(' ');
        sql.push_str(GROUP_BY_PLACEHOLDER);

        let having = builder.build_having(&self.having)?;
        if !having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&having);
        }

        let mut order = builder.build_order_by(&self.table, &self.order_by)?;
        if order.is_empty() && self.offset.is_some_and(|m| m > 0) {
            // stable pages need a total order
            let keys = schema.keys(&self.table, KeyKind::Primary)?;
            order = keys
                .iter()
                .map(|k| format!("{}.{} ASC", self.table, k))
                .collect::<Vec<_>>()
                .join(", ");
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        Ok(sql)
    }

    /// Compile to a statement for the translator's dialect.
    pub fn to_sql(&self, translator: &Translator, schema: &dyn SchemaSource) -> SqlportResult<String> {
        let statement = self.statement(translator, schema)?;
        let joined = JoinCompiler::new(schema).build_from_and_group_by(&self.table, &statement)?;
        let paged = translator.rewrite_limit_offset(&joined);
        let national = translator.fix_national_columns(&paged)?;
        let sql = translator.translate(&national);
        tracing::debug!("compiled query on {} for {}: {}", self.table, translator.dialect(), sql);
        Ok(sql)
    }
}
