//! Dialect translator.
//!
//! One [`Translator`] per target dialect owns the rule set, the paging and
//! DDL policy, and the national-column cache.

pub mod ddl;
pub mod national;
pub mod paging;
pub mod rules;

#[cfg(test)]
mod tests;

use crate::config::TranslatorConfig;
use crate::dialect::Dialect;
use crate::error::SqlportResult;
use crate::value::Value;

pub use national::{NationalCache, NationalColumns, NationalLoader};
pub use rules::Rule;

/// Rewrites common-dialect statements for one target database.
#[derive(Debug)]
pub struct Translator {
    dialect: Dialect,
    config: TranslatorConfig,
    rules: Vec<Rule>,
    national: NationalCache,
}

impl Translator {
    pub fn new(dialect: Dialect) -> Self {
        Self::from_config(TranslatorConfig::builder().dialect(dialect).build())
    }

    pub fn from_config(config: TranslatorConfig) -> Self {
        Self {
            dialect: config.dialect,
            rules: rules::default_rules(config.dialect),
            config,
            national: NationalCache::default(),
        }
    }

    /// Append a rule applied after the dialect's defaults.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Use a known national-column map.
    pub fn with_national_columns(mut self, columns: NationalColumns) -> Self {
        self.national = NationalCache::with_columns(columns);
        self
    }

    /// Load the national-column map on first use.
    pub fn with_national_loader<F>(mut self, loader: F) -> Self
    where
        F: Fn() -> SqlportResult<NationalColumns> + Send + Sync + 'static,
    {
        self.national = NationalCache::with_loader(Box::new(loader));
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Apply the rule set. Quoted literals are never touched.
    pub fn translate(&self, sql: &str) -> String {
        let mut out = sql.to_string();
        for rule in &self.rules {
            let next = rule.apply(&out, self.dialect);
            if next != out {
                tracing::debug!("{} rule {:?}: {}", self.dialect, rule, next);
                out = next;
            }
        }
        out
    }

    /// Rewrite `LIMIT n [OFFSET m]` into the dialect's paging syntax.
    pub fn rewrite_limit_offset(&self, sql: &str) -> String {
        paging::rewrite_limit_offset(sql, self.dialect, &self.config.fallback_order)
    }

    /// Translate a CREATE TABLE. Returns the statement plus extra statements
    /// (sequences, triggers) to execute after it, in order.
    pub fn rewrite_create_table(&self, sql: &str) -> (String, Vec<String>) {
        ddl::rewrite_create_table(sql, self.dialect)
    }

    /// Add binary-safe projections for unicode columns.
    ///
    /// Only SQL Server statements are touched; the column map is loaded on
    /// the first call that needs it.
    pub fn fix_national_columns(&self, sql: &str) -> SqlportResult<String> {
        if self.dialect != Dialect::SqlServer {
            return Ok(sql.to_string());
        }
        let columns = self.national.get()?;
        Ok(national::fix_national_columns(
            sql,
            &columns,
            &self.config.national_marker,
            &self.config.binary_type,
        ))
    }

    /// Render a value as a literal of this dialect.
    pub fn escape(&self, value: &Value) -> String {
        self.dialect.escape(value)
    }

    pub(crate) fn is_stop_word(&self, word: &str) -> bool {
        self.config.is_stop_word(word)
    }
}
