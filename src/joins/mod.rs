//! Schema-aware join compiler.
//!
//! Statements name related columns with shorthand paths and leave the FROM
//! and GROUP BY clauses to the compiler:
//!
//! ```text
//! SELECT users.name, orders.total FROM :from_clause :group_by_clause
//!
//! SELECT users.name, MAX(orders.total) AS total
//! FROM users LEFT JOIN orders ON orders.user_id = users.id
//! GROUP BY users.id, users.name
//! ```
//!
//! Paths are resolved through a [`SchemaSource`], every distinct join target
//! gets one step with a unique alias, and each path occurrence is rewritten
//! to `alias.column`.

pub mod path;


use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{SqlportError, SqlportResult};
use crate::lexer::{self, Token, TokenKind};
use crate::parser::{self, ClauseKind};
use crate::schema::{Relationship, RelationshipKind, SchemaSource};
use crate::transpiler::rules::splice;

pub use path::{ColumnPath, Hop, PathMatch, find_paths};

pub const FROM_PLACEHOLDER: &str = ":from_clause";
pub const GROUP_BY_PLACEHOLDER: &str = ":group_by_clause";

const AGGREGATES: &[&str] = &[
    "AVG",
    "COUNT",
    "GROUP_CONCAT",
    "LISTAGG",
    "MAX",
    "MIN",
    "STRING_AGG",
    "SUM",
];

/// Words that end a literal GROUP BY body.
const GROUP_BY_END: &[&str] = &[
    "HAVING", "ORDER", "LIMIT", "OFFSET", "UNION", "INTERSECT", "EXCEPT", "FETCH", "WINDOW",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// The root table.
    None,
    Left,
}

/// One table in the FROM clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStep {
    pub join_type: JoinType,
    pub table_name: String,
    pub table_alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_clause: Option<String>,
    /// Reached through a one-to-many or many-to-many relationship.
    #[serde(default)]
    pub to_many: bool,
}

impl JoinStep {
    fn root(table: &str) -> Self {
        Self {
            join_type: JoinType::None,
            table_name: table.to_string(),
            table_alias: table.to_string(),
            on_clause: None,
            to_many: false,
        }
    }

    fn left(table: &str, alias: &str, on: String, to_many: bool) -> Self {
        Self {
            join_type: JoinType::Left,
            table_name: table.to_string(),
            table_alias: alias.to_string(),
            on_clause: Some(on),
            to_many,
        }
    }
}

impl fmt::Display for JoinStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.join_type == JoinType::Left {
            write!(f, "LEFT JOIN ")?;
        }
        write!(f, "{}", self.table_name)?;
        if self.table_alias != self.table_name {
            write!(f, " {}", self.table_alias)?;
        }
        if let Some(on) = &self.on_clause {
            write!(f, " ON {}", on)?;
        }
        Ok(())
    }
}

/// Ordered join steps; step 0 is the base table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlan {
    pub steps: Vec<JoinStep>,
}

impl JoinPlan {
    /// Steps after the base table.
    pub fn joins(&self) -> &[JoinStep] {
        self.steps.get(1..).unwrap_or_default()
    }

    pub fn has_to_many(&self) -> bool {
        self.steps.iter().any(|s| s.to_many)
    }

    /// The FROM clause body.
    pub fn to_sql(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for JoinPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Plan state for one compilation.
struct Planner<'s> {
    schema: &'s dyn SchemaSource,
    base: String,
    steps: Vec<JoinStep>,
    taken: HashSet<String>,
    /// (parent alias, related table, route) -> alias of the joined table
    targets: HashMap<(String, String, String), String>,
}

impl<'s> Planner<'s> {
    fn new(schema: &'s dyn SchemaSource, base: &str) -> Self {
        Self {
            schema,
            base: base.to_string(),
            steps: vec![JoinStep::root(base)],
            taken: HashSet::from([base.to_lowercase()]),
            targets: HashMap::new(),
        }
    }

    fn alias(&mut self, table: &str) -> String {
        let mut candidate = table.to_string();
        let mut n = 2;
        while !self.taken.insert(candidate.to_lowercase()) {
            candidate = format!("{}{}", table, n);
            n += 1;
        }
        candidate
    }

    /// Resolve a hop from `from`. Unrelated tables are an error only when
    /// the path explicitly asks for a relationship.
    fn resolve(&self, from: &str, hop: Hop<'_>, explicit: bool) -> SqlportResult<Option<Relationship>> {
        let routes = self.schema.routes(from, hop.table)?;
        if routes.is_empty() {
            if explicit {
                return Err(SqlportError::NoRelationship {
                    table: from.to_string(),
                    related: hop.table.to_string(),
                });
            }
            return Ok(None);
        }
        self.schema.route(from, hop.table, hop.route, None)
    }

    fn resolve_required(&self, from: &str, hop: Hop<'_>) -> SqlportResult<Relationship> {
        self.resolve(from, hop, true)?
            .ok_or_else(|| SqlportError::NoRelationship {
                table: from.to_string(),
                related: hop.table.to_string(),
            })
    }

    /// Join `relationship` off `parent`, reusing an identical earlier join.
    fn join(&mut self, parent: &str, relationship: &Relationship) -> SqlportResult<String> {
        let key = (
            parent.to_lowercase(),
            relationship.related_table.to_lowercase(),
            relationship.route_key().to_lowercase(),
        );
        if let Some(alias) = self.targets.get(&key) {
            return Ok(alias.clone());
        }

        let to_many = relationship.kind.is_to_many();
        let alias = if relationship.kind == RelationshipKind::ManyToMany {
            let (join_table, join_column, join_related_column) = relationship.link()?;
            let link = self.alias(join_table);
            self.steps.push(JoinStep::left(
                join_table,
                &link,
                format!("{}.{} = {}.{}", link, join_column, parent, relationship.local_column),
                to_many,
            ));
            let alias = self.alias(&relationship.related_table);
            self.steps.push(JoinStep::left(
                &relationship.related_table,
                &alias,
                format!(
                    "{}.{} = {}.{}",
                    alias, relationship.related_column, link, join_related_column
                ),
                to_many,
            ));
            alias
        } else {
            let alias = self.alias(&relationship.related_table);
            self.steps.push(JoinStep::left(
                &relationship.related_table,
                &alias,
                format!(
                    "{}.{} = {}.{}",
                    alias, relationship.related_column, parent, relationship.local_column
                ),
                to_many,
            ));
            alias
        };

        tracing::debug!(
            "join {} -> {} via route {} as {}",
            parent,
            relationship.related_table,
            relationship.route_key(),
            alias
        );
        self.targets.insert(key, alias.clone());
        Ok(alias)
    }

    /// Replacement text for one path, or `None` to leave it as written.
    fn resolve_path(&mut self, path: ColumnPath<'_>) -> SqlportResult<Option<String>> {
        let base = self.base.clone();
        let alias = match path {
            ColumnPath::Direct { table, .. } => {
                if table.eq_ignore_ascii_case(&base) {
                    return Ok(None);
                }
                let hop = Hop { table, route: None };
                let Some(relationship) = self.resolve(&base, hop, false)? else {
                    return Ok(None);
                };
                self.join(&base, &relationship)?
            }
            ColumnPath::Routed { table, route, .. } => {
                let relationship = self.resolve_required(
                    &base,
                    Hop {
                        table,
                        route: Some(route),
                    },
                )?;
                self.join(&base, &relationship)?
            }
            ColumnPath::DoubleHop { first, second, .. } => {
                let head = self.resolve_required(&base, first)?;
                let head_alias = self.join(&base, &head)?;
                let tail = self.resolve_required(&head.related_table, second)?;
                self.join(&head_alias, &tail)?
            }
        };
        Ok(Some(format!("{}.{}", alias, path.column())))
    }
}

struct Compiled {
    plan: JoinPlan,
    edits: Vec<(Range<usize>, String)>,
}

/// Compiles shorthand relationship paths into joins.
pub struct JoinCompiler<'s> {
    schema: &'s dyn SchemaSource,
}

impl<'s> JoinCompiler<'s> {
    pub fn new(schema: &'s dyn SchemaSource) -> Self {
        Self { schema }
    }

    fn compile(&self, base: &str, statement: &str) -> SqlportResult<Compiled> {
        let mut planner = Planner::new(self.schema, base);
        let mut edits = Vec::new();
        for found in path::find_paths(statement) {
            if let Some(replacement) = planner.resolve_path(found.path)? {
                edits.push((found.span, replacement));
            }
        }
        Ok(Compiled {
            plan: JoinPlan {
                steps: planner.steps,
            },
            edits,
        })
    }

    /// The join plan for `statement` without rewriting it.
    pub fn plan(&self, base: &str, statement: &str) -> SqlportResult<JoinPlan> {
        Ok(self.compile(base, statement)?.plan)
    }

    /// Rewrite paths and fill in `:from_clause` and `:group_by_clause`.
    pub fn build_from_and_group_by(&self, base: &str, statement: &str) -> SqlportResult<String> {
        let tokens = lexer::tokenize(statement);
        let from = find_param(&tokens, FROM_PLACEHOLDER).ok_or_else(|| {
            SqlportError::MissingPlaceholder {
                placeholder: FROM_PLACEHOLDER,
                statement: statement.to_string(),
            }
        })?;
        let group_param = find_param(&tokens, GROUP_BY_PLACEHOLDER);
        let literal_group = literal_group_by(&tokens);
        if group_param.is_none() && literal_group.is_none() {
            return Err(SqlportError::MissingPlaceholder {
                placeholder: GROUP_BY_PLACEHOLDER,
                statement: statement.to_string(),
            });
        }

        let Compiled { plan, mut edits } = self.compile(base, statement)?;
        edits.push((tokens[from].offset..tokens[from].end(), plan.to_sql()));

        let group_columns = if plan.has_to_many() {
            Some(self.group_columns(base)?)
        } else {
            None
        };

        // appended before the placeholder removal that may start at the same offset
        if let (Some(columns), Some(range)) = (&group_columns, &literal_group) {
            let existing: Vec<String> = statement[range.clone()]
                .split(',')
                .map(|item| item.trim().to_lowercase())
                .collect();
            let missing: Vec<&str> = columns
                .iter()
                .filter(|c| !existing.contains(&c.to_lowercase()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                edits.push((range.end..range.end, format!(", {}", missing.join(", "))));
            }
        }

        if let Some(idx) = group_param {
            let token = &tokens[idx];
            match (&group_columns, &literal_group) {
                (Some(columns), None) => {
                    edits.push((token.offset..token.end(), format!("GROUP BY {}", columns.join(", "))));
                }
                _ => {
                    let start = statement[..token.offset].trim_end().len();
                    edits.push((start..token.end(), String::new()));
                }
            }
        }

        let mut out = splice(statement, edits);
        if plan.has_to_many() {
            let joined: HashSet<String> = plan
                .joins()
                .iter()
                .map(|s| s.table_alias.to_lowercase())
                .collect();
            out = wrap_joined_columns(&out, &joined);
        }
        tracing::debug!("compiled joins for {}: {}", base, out);
        Ok(out)
    }

    /// `base.column` for every base-table column.
    fn group_columns(&self, base: &str) -> SqlportResult<Vec<String>> {
        let columns = self.schema.column_info(base)?;
        if columns.is_empty() {
            return Err(SqlportError::UnknownTable(base.to_string()));
        }
        Ok(columns
            .iter()
            .map(|c| format!("{}.{}", base, c.name))
            .collect())
    }
}

fn find_param(tokens: &[Token<'_>], name: &str) -> Option<usize> {
    tokens
        .iter()
        .position(|t| t.kind == TokenKind::Param && t.text.eq_ignore_ascii_case(name))
}

/// Body range of a top-level `GROUP BY` already written in the statement.
fn literal_group_by(tokens: &[Token<'_>]) -> Option<Range<usize>> {
    let mut depth = 0i32;
    let mut start = None;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => depth -= 1,
            _ if depth != 0 => {}
            TokenKind::Word => match start {
                Some(s) if GROUP_BY_END.iter().any(|w| token.is_word(w)) => {
                    return lexer::trimmed_span(&tokens[s..i]);
                }
                Some(_) => {}
                None if token.is_word("GROUP") => {
                    if let Some(by) = lexer::next_significant(tokens, i)
                        && tokens[by].is_word("BY")
                    {
                        start = Some(by + 1);
                    }
                }
                None => {}
            },
            TokenKind::Param => {
                if let Some(s) = start {
                    return lexer::trimmed_span(&tokens[s..i]);
                }
            }
            TokenKind::Punct if token.text == ";" => {
                if let Some(s) = start {
                    return lexer::trimmed_span(&tokens[s..i]);
                }
            }
            _ => {}
        }
    }
    start.and_then(|s| lexer::trimmed_span(&tokens[s..]))
}

/// Wrap joined-table references in the SELECT list and ORDER BY with `MAX`.
fn wrap_joined_columns(sql: &str, joined: &HashSet<String>) -> String {
    let Some(select) = parser::parse_select(sql) else {
        tracing::warn!("cannot wrap grouped columns, statement not recognized: {}", sql);
        return sql.to_string();
    };
    let mut edits = Vec::new();
    if let Some(span) = select.columns_span() {
        edits.extend(wrap_clause(sql, span, joined, true));
    }
    if let Some(clause) = select.clause(ClauseKind::OrderBy) {
        edits.extend(wrap_clause(sql, clause.body.clone(), joined, false));
    }
    splice(sql, edits)
}

fn wrap_clause(
    sql: &str,
    range: Range<usize>,
    joined: &HashSet<String>,
    keep_name: bool,
) -> Vec<(Range<usize>, String)> {
    let body = &sql[range.clone()];
    let tokens = lexer::tokenize(body);
    let mut edits = Vec::new();

    for item in lexer::split_top_level_commas(&tokens) {
        let significant: Vec<&Token<'_>> = item.iter().filter(|t| !t.is_trivia()).collect();
        // one flag per open paren: is it an aggregate call
        let mut aggregate: Vec<bool> = Vec::new();
        for (k, token) in significant.iter().enumerate() {
            match token.kind {
                TokenKind::Open => {
                    let call = k
                        .checked_sub(1)
                        .map(|p| significant[p])
                        .is_some_and(|p| AGGREGATES.iter().any(|a| p.is_word(a)));
                    aggregate.push(call);
                }
                TokenKind::Close => {
                    aggregate.pop();
                }
                TokenKind::Word => {
                    let qualified = k > 0 && significant[k - 1].is_punct(".");
                    if qualified
                        || aggregate.contains(&true)
                        || !joined.contains(&token.text.to_lowercase())
                    {
                        continue;
                    }
                    let (Some(dot), Some(column)) = (significant.get(k + 1), significant.get(k + 2))
                    else {
                        continue;
                    };
                    let is_column = matches!(column.kind, TokenKind::Word | TokenKind::Literal);
                    let is_call = significant.get(k + 3).is_some_and(|t| t.kind == TokenKind::Open);
                    if !dot.is_punct(".") || !is_column || is_call {
                        continue;
                    }
                    let reference = &body[token.offset..column.end()];
                    let mut replacement = format!("MAX({})", reference);
                    if keep_name && significant.len() == 3 {
                        replacement.push_str(" AS ");
                        replacement.push_str(column.text);
                    }
                    edits.push((
                        range.start + token.offset..range.start + column.end(),
                        replacement,
                    ));
                }
                _ => {}
            }
        }
    }
    edits
}
