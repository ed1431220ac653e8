//! Binary-safe projections for unicode columns (SQL Server).
//!
//! Drivers that read `nchar`/`nvarchar`/`ntext` through a non-unicode
//! client charset mangle the text. For every such column in a SELECT list a
//! second projection is appended that carries the raw bytes:
//!
//! ```text
//! SELECT name FROM users
//!   -> SELECT name, CAST(name AS VARBINARY(MAX)) AS __bin_name FROM users
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{SqlportError, SqlportResult};
use crate::lexer::{self, Token, TokenKind};
use crate::parser::{self, ClauseKind};
use crate::transpiler::rules::splice;

/// Lowercased table name to its lowercased unicode column names.
pub type NationalColumns = HashMap<String, Vec<String>>;

/// Produces the national-column map on first use.
pub type NationalLoader = Box<dyn Fn() -> SqlportResult<NationalColumns> + Send + Sync>;

/// Functions whose result keeps the argument's string type.
const STRING_PRESERVING: &[&str] = &[
    "UPPER", "LOWER", "LTRIM", "RTRIM", "TRIM", "MAX", "MIN", "COALESCE", "ISNULL", "SUBSTRING",
    "LEFT", "RIGHT", "REPLACE",
];

/// Words that can't be a table alias in a FROM clause.
const FROM_KEYWORDS: &[&str] = &[
    "ON", "USING", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "WHERE", "WITH",
    "APPLY",
];

/// Lazily loaded, translator-owned national-column map.
#[derive(Default)]
pub struct NationalCache {
    map: Mutex<Option<Arc<NationalColumns>>>,
    loader: Option<NationalLoader>,
}

impl std::fmt::Debug for NationalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NationalCache")
            .field("loaded", &self.map.lock().map(|m| m.is_some()).unwrap_or(false))
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

fn normalize(map: NationalColumns) -> NationalColumns {
    map.into_iter()
        .map(|(table, columns)| {
            (
                table.to_lowercase(),
                columns.into_iter().map(|c| c.to_lowercase()).collect(),
            )
        })
        .collect()
}

impl NationalCache {
    /// Cache pre-populated with a known map.
    pub fn with_columns(columns: NationalColumns) -> Self {
        Self {
            map: Mutex::new(Some(Arc::new(normalize(columns)))),
            loader: None,
        }
    }

    /// Cache filled by `loader` on first use.
    pub fn with_loader(loader: NationalLoader) -> Self {
        Self {
            map: Mutex::new(None),
            loader: Some(loader),
        }
    }

    /// The map, loading it if needed. Failed loads are retried on the next call.
    pub fn get(&self) -> SqlportResult<Arc<NationalColumns>> {
        let mut guard = self
            .map
            .lock()
            .map_err(|_| SqlportError::Metadata("national column cache lock poisoned".to_string()))?;
        if let Some(map) = guard.as_ref() {
            return Ok(Arc::clone(map));
        }
        let loaded = match &self.loader {
            Some(loader) => normalize(loader()?),
            None => NationalColumns::new(),
        };
        tracing::info!("Loaded national columns for {} tables", loaded.len());
        let map = Arc::new(loaded);
        *guard = Some(Arc::clone(&map));
        Ok(map)
    }
}

/// A table in a FROM clause and the name it is referred to by.
#[derive(Debug)]
struct TableRef {
    table: Option<String>,
    alias: String,
}

fn is_from_keyword(token: &Token<'_>) -> bool {
    FROM_KEYWORDS.iter().any(|w| token.is_word(w))
}

/// Tables of a FROM clause, in order.
fn from_tables(from: &str) -> Vec<TableRef> {
    let tokens = lexer::tokenize(from);
    let significant: Vec<&Token<'_>> = tokens.iter().filter(|t| !t.is_trivia()).collect();
    let mut refs = Vec::new();
    let mut expect_table = true;
    let mut depth = 0i32;
    let mut i = 0;
    while i < significant.len() {
        let token = significant[i];
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => depth -= 1,
            _ => {}
        }
        if depth > 0 || (token.kind == TokenKind::Close && depth == 0 && !expect_table) {
            i += 1;
            continue;
        }
        if token.is_punct(",") || token.is_word("JOIN") || token.is_word("APPLY") {
            expect_table = true;
            i += 1;
            continue;
        }
        if !expect_table {
            i += 1;
            continue;
        }

        if token.kind == TokenKind::Close {
            // end of a derived table; alias follows
            let alias = alias_at(&significant, i + 1);
            if let Some((alias, next)) = alias {
                refs.push(TableRef { table: None, alias });
                i = next;
            } else {
                i += 1;
            }
            expect_table = false;
            continue;
        }
        if matches!(token.kind, TokenKind::Word | TokenKind::Literal) && !is_from_keyword(token) {
            let mut name = unquote(token.text);
            let mut j = i + 1;
            while j + 1 < significant.len() && significant[j].is_punct(".") {
                name = unquote(significant[j + 1].text);
                j += 2;
            }
            let (alias, next) = alias_at(&significant, j).unwrap_or((name.clone(), j));
            refs.push(TableRef {
                table: Some(name.to_lowercase()),
                alias,
            });
            i = next;
            expect_table = false;
            continue;
        }
        i += 1;
    }
    refs
}

fn alias_at(tokens: &[&Token<'_>], i: usize) -> Option<(String, usize)> {
    let mut i = i;
    if tokens.get(i)?.is_word("AS") {
        i += 1;
    }
    let token = tokens.get(i)?;
    (matches!(token.kind, TokenKind::Word | TokenKind::Literal) && !is_from_keyword(token))
        .then(|| (unquote(token.text), i + 1))
}

fn unquote(name: &str) -> String {
    let trimmed = name.trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']');
    trimmed.to_string()
}

/// A projection split into expression and alias.
struct Projection<'a> {
    expr: &'a [Token<'a>],
    alias: Option<String>,
}

fn split_alias<'t>(item: &'t [Token<'t>]) -> Projection<'t> {
    let idx: Vec<usize> = (0..item.len()).filter(|&i| !item[i].is_trivia()).collect();
    if idx.len() >= 2 {
        let last = idx[idx.len() - 1];
        let prev = idx[idx.len() - 2];
        let alias_token = &item[last];
        if matches!(alias_token.kind, TokenKind::Word | TokenKind::Literal) {
            if item[prev].is_word("AS") {
                return Projection {
                    expr: &item[..prev],
                    alias: Some(unquote(alias_token.text)),
                };
            }
            let ends_expression = matches!(item[prev].kind, TokenKind::Word | TokenKind::Close | TokenKind::Literal)
                && !item[prev].is_punct(".");
            if ends_expression && last > 0 && !item[last - 1].is_punct(".") {
                return Projection {
                    expr: &item[..last],
                    alias: Some(unquote(alias_token.text)),
                };
            }
        }
    }
    Projection {
        expr: item,
        alias: None,
    }
}

/// Column reference inside an expression: optional qualifier plus column.
fn column_ref(tokens: &[&Token<'_>]) -> Option<(Option<String>, String)> {
    match tokens {
        [column] if matches!(column.kind, TokenKind::Word | TokenKind::Literal) => {
            Some((None, unquote(column.text)))
        }
        [qualifier, dot, column]
            if dot.is_punct(".") && matches!(column.kind, TokenKind::Word | TokenKind::Literal) =>
        {
            Some((Some(unquote(qualifier.text)), unquote(column.text)))
        }
        _ => None,
    }
}

/// Column behind a possibly function-wrapped expression.
fn wrapped_column(tokens: &[&Token<'_>]) -> Option<(Option<String>, String)> {
    if let Some(found) = column_ref(tokens) {
        return Some(found);
    }
    let (name, rest) = tokens.split_first()?;
    if !STRING_PRESERVING.iter().any(|f| name.is_word(f)) {
        return None;
    }
    let (open, inner) = rest.split_first()?;
    let (close, inner) = inner.split_last()?;
    if open.kind != TokenKind::Open || close.kind != TokenKind::Close {
        return None;
    }
    // first argument
    let mut depth = 0;
    let end = inner
        .iter()
        .position(|t| {
            match t.kind {
                TokenKind::Open => depth += 1,
                TokenKind::Close => depth -= 1,
                _ => {}
            }
            depth == 0 && t.is_punct(",")
        })
        .unwrap_or(inner.len());
    wrapped_column(&inner[..end])
}

struct Rewriter<'m> {
    columns: &'m NationalColumns,
    marker: &'m str,
    binary_type: &'m str,
}

impl Rewriter<'_> {
    fn is_national(&self, table: &str, column: &str) -> bool {
        self.columns
            .get(table)
            .is_some_and(|cols| cols.iter().any(|c| c.eq_ignore_ascii_case(column)))
    }

    fn cast(&self, expr: &str, name: &str) -> (String, String) {
        let alias = format!("{}{}", self.marker, name);
        (
            alias.to_lowercase(),
            format!("CAST({} AS {}) AS {}", expr, self.binary_type, alias),
        )
    }

    fn rewrite(&self, sql: &str) -> String {
        let Some(select) = parser::parse_select(sql) else {
            return sql.to_string();
        };
        let (Some(columns_span), Some(from)) = (select.columns_span(), select.clause(ClauseKind::From)) else {
            return sql.to_string();
        };
        let mut edits = Vec::new();

        let from_text = &sql[from.body.clone()];
        let nested = self.rewrite_nested(from_text);
        if nested != from_text {
            edits.push((from.body.clone(), nested));
        }

        let tables = from_tables(from_text);
        let column_tokens = lexer::tokenize(&sql[columns_span.clone()]);
        let items = lexer::split_top_level_commas(&column_tokens);

        let mut seen: HashSet<String> = HashSet::new();
        let mut projections = Vec::new();
        for item in &items {
            let projection = split_alias(item);
            if let Some(alias) = &projection.alias {
                seen.insert(alias.to_lowercase());
            }
        }

        for item in &items {
            let projection = split_alias(item);
            let expr: Vec<&Token<'_>> = projection.expr.iter().filter(|t| !t.is_trivia()).collect();
            let Some(span) = lexer::trimmed_span(projection.expr) else {
                continue;
            };
            let expr_text = &sql[columns_span.start + span.start..columns_span.start + span.end];

            let mut casts: Vec<(String, String)> = Vec::new();
            match expr.as_slice() {
                [star] if star.is_punct("*") => {
                    for table in &tables {
                        casts.extend(self.table_casts(table));
                    }
                }
                [qualifier, dot, star] if dot.is_punct(".") && star.is_punct("*") => {
                    let qualifier = unquote(qualifier.text);
                    for table in tables.iter().filter(|t| t.alias.eq_ignore_ascii_case(&qualifier)) {
                        casts.extend(self.table_casts(table));
                    }
                }
                _ => {
                    if let Some((qualifier, column)) = wrapped_column(&expr) {
                        let owner = match &qualifier {
                            Some(q) => tables.iter().find(|t| t.alias.eq_ignore_ascii_case(q)),
                            None => tables
                                .iter()
                                .find(|t| t.table.as_deref().is_some_and(|name| self.is_national(name, &column))),
                        };
                        let national = owner
                            .and_then(|t| t.table.as_deref())
                            .is_some_and(|name| self.is_national(name, &column));
                        if national {
                            let name = projection.alias.clone().unwrap_or_else(|| column.clone());
                            casts.push(self.cast(expr_text, &name));
                        }
                    }
                }
            }
            for (alias, cast) in casts {
                if seen.insert(alias) {
                    projections.push(cast);
                }
            }
        }

        if !projections.is_empty() {
            let insert = format!(", {}", projections.join(", "));
            edits.push((columns_span.end..columns_span.end, insert));
        }
        splice(sql, edits)
    }

    fn table_casts(&self, table: &TableRef) -> Vec<(String, String)> {
        let Some(name) = &table.table else {
            return Vec::new();
        };
        self.columns
            .get(name)
            .map(|cols| {
                cols.iter()
                    .map(|c| self.cast(&format!("{}.{}", table.alias, c), c))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rewrite every `(SELECT ...)` group of a FROM clause.
    fn rewrite_nested(&self, from: &str) -> String {
        let tokens = lexer::tokenize(from);
        let mut edits = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if tokens[i].kind == TokenKind::Open
                && let Some(close) = lexer::matching_close(&tokens, i)
            {
                let starts_select = lexer::next_significant(&tokens, i).is_some_and(|j| tokens[j].is_word("SELECT"));
                if starts_select {
                    let inner = &from[tokens[i].end()..tokens[close].offset];
                    let rewritten = self.rewrite(inner);
                    if rewritten != inner {
                        edits.push((tokens[i].end()..tokens[close].offset, rewritten));
                    }
                }
                i = close + 1;
                continue;
            }
            i += 1;
        }
        splice(from, edits)
    }
}

/// Append binary projections for every unicode column a SELECT returns.
pub fn fix_national_columns(
    sql: &str,
    columns: &NationalColumns,
    marker: &str,
    binary_type: &str,
) -> String {
    if columns.is_empty() {
        return sql.to_string();
    }
    let rewriter = Rewriter {
        columns,
        marker,
        binary_type,
    };
    let out = rewriter.rewrite(sql);
    if out != sql {
        tracing::debug!("Added national column projections: {}", out);
    }
    out
}
