//! Shorthand column paths.
//!
//! ```text
//! orders.total                   Direct
//! orders{billing}.total          Routed
//! orders=>customers{owner}.name  DoubleHop (routes optional on both hops)
//! ```

use std::ops::Range;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    combinator::{map, opt, recognize},
    sequence::{delimited, pair, tuple},
    IResult,
};

use crate::lexer::{self, Run};

/// One relationship hop: a related table and an optional route name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop<'a> {
    pub table: &'a str,
    pub route: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPath<'a> {
    Direct {
        table: &'a str,
        column: &'a str,
    },
    Routed {
        table: &'a str,
        route: &'a str,
        column: &'a str,
    },
    DoubleHop {
        first: Hop<'a>,
        second: Hop<'a>,
        column: &'a str,
    },
}

impl<'a> ColumnPath<'a> {
    pub fn column(&self) -> &'a str {
        match self {
            ColumnPath::Direct { column, .. }
            | ColumnPath::Routed { column, .. }
            | ColumnPath::DoubleHop { column, .. } => column,
        }
    }
}

/// A path found in a statement and the byte range it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch<'a> {
    pub path: ColumnPath<'a>,
    pub span: Range<usize>,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_char)))(input)
}

fn route(input: &str) -> IResult<&str, &str> {
    delimited(char('{'), ident, char('}'))(input)
}

fn hop(input: &str) -> IResult<&str, Hop<'_>> {
    map(pair(ident, opt(route)), |(table, route)| Hop { table, route })(input)
}

fn double_hop(input: &str) -> IResult<&str, ColumnPath<'_>> {
    map(
        tuple((hop, tag("=>"), hop, char('.'), ident)),
        |(first, _, second, _, column)| ColumnPath::DoubleHop {
            first,
            second,
            column,
        },
    )(input)
}

fn routed(input: &str) -> IResult<&str, ColumnPath<'_>> {
    map(
        tuple((ident, route, char('.'), ident)),
        |(table, route, _, column)| ColumnPath::Routed {
            table,
            route,
            column,
        },
    )(input)
}

fn direct(input: &str) -> IResult<&str, ColumnPath<'_>> {
    map(tuple((ident, char('.'), ident)), |(table, _, column)| {
        ColumnPath::Direct { table, column }
    })(input)
}

/// Parse a path at the start of `input`.
pub fn column_path(input: &str) -> IResult<&str, ColumnPath<'_>> {
    alt((double_hop, routed, direct))(input)
}

/// Characters that make a preceding match part of a longer name.
fn continues_name(c: char) -> bool {
    is_ident_char(c) || matches!(c, '.' | '(' | '{' | '$' | '#')
}

fn precedes_name(c: char) -> bool {
    is_ident_char(c) || matches!(c, '.' | ':' | '@' | '$' | '#')
}

/// Find every shorthand path outside quoted literals.
pub fn find_paths(sql: &str) -> Vec<PathMatch<'_>> {
    let mut found = Vec::new();
    let mut offset = 0;
    for run in lexer::split_runs(sql) {
        let text = run.text();
        if let Run::Code(code) = run {
            scan_code(code, offset, &mut found);
        }
        offset += text.len();
    }
    found
}

fn scan_code<'a>(code: &'a str, base: usize, found: &mut Vec<PathMatch<'a>>) {
    let mut prev: Option<char> = None;
    let mut pos = 0;
    while pos < code.len() {
        let rest = &code[pos..];
        let Some(c) = rest.chars().next() else {
            break;
        };
        if let Ok((_, comment)) = lexer::comment(rest) {
            prev = None;
            pos += comment.len();
            continue;
        }
        let at_boundary = prev.is_none_or(|p| !precedes_name(p));
        if at_boundary
            && is_ident_start(c)
            && let Ok((remaining, path)) = column_path(rest)
        {
            let consumed = rest.len() - remaining.len();
            let standalone = remaining.chars().next().is_none_or(|n| !continues_name(n));
            if standalone {
                found.push(PathMatch {
                    path,
                    span: base + pos..base + pos + consumed,
                });
                prev = code[..pos + consumed].chars().next_back();
                pos += consumed;
                continue;
            }
        }
        // skip the rest of this word so matches only start at word boundaries
        let skip = if is_ident_char(c) {
            rest.find(|ch: char| !is_ident_char(ch)).unwrap_or(rest.len())
        } else {
            c.len_utf8()
        };
        prev = rest[..skip].chars().next_back();
        pos += skip;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            column_path("orders.total").unwrap().1,
            ColumnPath::Direct {
                table: "orders",
                column: "total"
            }
        );
        assert_eq!(
            column_path("orders{billing}.total").unwrap().1,
            ColumnPath::Routed {
                table: "orders",
                route: "billing",
                column: "total"
            }
        );
        assert_eq!(
            column_path("orders=>customers{owner}.name").unwrap().1,
            ColumnPath::DoubleHop {
                first: Hop {
                    table: "orders",
                    route: None
                },
                second: Hop {
                    table: "customers",
                    route: Some("owner")
                },
                column: "name"
            }
        );
    }

    #[test]
    fn test_find_paths_skips_literals_and_params() {
        let sql = "SELECT orders.total, 'users.name' FROM :from_clause WHERE x.y.z = 1 AND fn.call(a)";
        let found = find_paths(sql);
        assert_eq!(found.len(), 1);
        assert_eq!(&sql[found[0].span.clone()], "orders.total");
    }

    #[test]
    fn test_find_paths_around_comments() {
        let sql = "SELECT orders.total -- don't\nFROM :from_clause WHERE customers.name = 'x' /* users.id */";
        let found: Vec<&str> = find_paths(sql).iter().map(|m| &sql[m.span.clone()]).collect();
        assert_eq!(found, vec!["orders.total", "customers.name"]);
    }

    #[test]
    fn test_find_paths_spans() {
        let sql = "SELECT MAX(a{r}.b), c=>d.e FROM t";
        let found: Vec<&str> = find_paths(sql).iter().map(|m| &sql[m.span.clone()]).collect();
        assert_eq!(found, vec!["a{r}.b", "c=>d.e"]);
    }
}
