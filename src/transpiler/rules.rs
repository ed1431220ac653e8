//! Literal-safe rewrite rules.
//!
//! Rules work on the token stream, so quoted strings and identifiers are
//! single opaque tokens and can never be matched.

use std::ops::Range;

use crate::dialect::Dialect;
use crate::lexer::{self, Token, TokenKind};

/// Words that end an operand when scanning outward from an operator.
const OPERAND_STOP_WORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "END", "THEN", "ELSE", "WHEN", "CASE", "AS",
    "ON", "IN", "IS", "LIKE", "ILIKE", "BY", "HAVING", "LIMIT", "OFFSET", "JOIN", "UNION",
    "DISTINCT", "BETWEEN", "EXISTS",
];

/// A single rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Rename a function: `NAME(` becomes `REPLACEMENT(`.
    Function { name: String, replacement: String },
    /// Replace an argument-less call `NAME()` with an arbitrary expression.
    Call { name: String, replacement: String },
    /// Replace a bare keyword such as `TRUE`.
    Keyword { word: String, replacement: String },
    /// Replace an operator token.
    Operator { symbol: String, replacement: String },
    /// `a || b || c` becomes `CONCAT(a, b, c)`.
    ConcatCall,
    /// `a [NOT] ILIKE b` becomes the dialect's case-insensitive match.
    FoldLike,
}

impl Rule {
    pub fn function(name: &str, replacement: &str) -> Self {
        Rule::Function {
            name: name.to_string(),
            replacement: replacement.to_string(),
        }
    }

    pub fn call(name: &str, replacement: &str) -> Self {
        Rule::Call {
            name: name.to_string(),
            replacement: replacement.to_string(),
        }
    }

    pub fn keyword(word: &str, replacement: &str) -> Self {
        Rule::Keyword {
            word: word.to_string(),
            replacement: replacement.to_string(),
        }
    }

    pub fn operator(symbol: &str, replacement: &str) -> Self {
        Rule::Operator {
            symbol: symbol.to_string(),
            replacement: replacement.to_string(),
        }
    }

    /// Apply the rule to a whole statement.
    pub fn apply(&self, sql: &str, dialect: Dialect) -> String {
        match self {
            Rule::Function { name, replacement } => {
                let tokens = lexer::tokenize(sql);
                let edits = (0..tokens.len())
                    .filter(|&i| tokens[i].is_word(name) && is_call(&tokens, i) && !is_qualified(&tokens, i))
                    .map(|i| (tokens[i].offset..tokens[i].end(), replacement.clone()))
                    .collect();
                splice(sql, edits)
            }
            Rule::Call { name, replacement } => {
                let tokens = lexer::tokenize(sql);
                let edits = (0..tokens.len())
                    .filter(|&i| tokens[i].is_word(name) && !is_qualified(&tokens, i))
                    .filter_map(|i| {
                        let open = lexer::next_significant(&tokens, i)?;
                        let close = lexer::next_significant(&tokens, open)?;
                        (tokens[open].kind == TokenKind::Open && tokens[close].kind == TokenKind::Close)
                            .then(|| (tokens[i].offset..tokens[close].end(), replacement.clone()))
                    })
                    .collect();
                splice(sql, edits)
            }
            Rule::Keyword { word, replacement } => {
                let tokens = lexer::tokenize(sql);
                let edits = (0..tokens.len())
                    .filter(|&i| {
                        tokens[i].is_word(word)
                            && !is_call(&tokens, i)
                            && !is_qualified(&tokens, i)
                            && !lexer::next_significant(&tokens, i).is_some_and(|j| tokens[j].is_punct("."))
                    })
                    .map(|i| (tokens[i].offset..tokens[i].end(), replacement.clone()))
                    .collect();
                splice(sql, edits)
            }
            Rule::Operator { symbol, replacement } => {
                let tokens = lexer::tokenize(sql);
                let edits = tokens
                    .iter()
                    .filter(|t| t.is_punct(symbol))
                    .map(|t| (t.offset..t.end(), replacement.clone()))
                    .collect();
                splice(sql, edits)
            }
            Rule::ConcatCall => rewrite_each(sql, |tokens, text| concat_call(tokens, text, dialect)),
            Rule::FoldLike => rewrite_each(sql, |tokens, text| fold_like(tokens, text, dialect)),
        }
    }
}

/// Rule set for a dialect, in application order.
pub fn default_rules(dialect: Dialect) -> Vec<Rule> {
    let booleans = || vec![Rule::keyword("TRUE", "1"), Rule::keyword("FALSE", "0")];
    match dialect {
        Dialect::Postgres => vec![Rule::function("IFNULL", "COALESCE")],
        Dialect::MySql => vec![
            Rule::function("LENGTH", "CHAR_LENGTH"),
            Rule::call("RANDOM", "RAND()"),
            Rule::ConcatCall,
            Rule::FoldLike,
        ],
        Dialect::Sqlite => {
            let mut rules = vec![
                Rule::call("NOW", "CURRENT_TIMESTAMP"),
                Rule::function("SUBSTRING", "SUBSTR"),
            ];
            rules.extend(booleans());
            rules.push(Rule::FoldLike);
            rules
        }
        Dialect::SqlServer => {
            let mut rules = vec![
                Rule::call("NOW", "GETDATE()"),
                Rule::function("LENGTH", "LEN"),
                Rule::call("RANDOM", "NEWID()"),
                Rule::function("IFNULL", "ISNULL"),
            ];
            rules.extend(booleans());
            rules.push(Rule::operator("||", "+"));
            rules.push(Rule::FoldLike);
            rules
        }
        Dialect::Oracle => {
            let mut rules = vec![
                Rule::call("NOW", "SYSTIMESTAMP"),
                Rule::function("SUBSTRING", "SUBSTR"),
                Rule::call("RANDOM", "DBMS_RANDOM.VALUE"),
                Rule::function("IFNULL", "NVL"),
            ];
            rules.extend(booleans());
            rules.push(Rule::FoldLike);
            rules
        }
        Dialect::Db2 => {
            let mut rules = vec![
                Rule::call("NOW", "CURRENT TIMESTAMP"),
                Rule::function("SUBSTRING", "SUBSTR"),
                Rule::call("RANDOM", "RAND()"),
                Rule::function("IFNULL", "COALESCE"),
            ];
            rules.extend(booleans());
            rules.push(Rule::FoldLike);
            rules
        }
    }
}

/// Word at `i` is immediately used as a function name.
fn is_call(tokens: &[Token<'_>], i: usize) -> bool {
    lexer::next_significant(tokens, i).is_some_and(|j| tokens[j].kind == TokenKind::Open)
}

/// Word at `i` follows a `.` (column of a table, member of a package).
fn is_qualified(tokens: &[Token<'_>], i: usize) -> bool {
    i > 0 && tokens[i - 1].is_punct(".")
}

fn is_stop_word(token: &Token<'_>) -> bool {
    OPERAND_STOP_WORDS.iter().any(|w| token.is_word(w))
}

/// Apply non-overlapping `(byte range, replacement)` edits.
pub(crate) fn splice(sql: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    if edits.is_empty() {
        return sql.to_string();
    }
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&sql[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&sql[cursor..]);
    out
}

/// Repeatedly apply the first available structural rewrite until none is left.
fn rewrite_each<F>(sql: &str, find: F) -> String
where
    F: Fn(&[Token<'_>], &str) -> Option<(Range<usize>, String)>,
{
    let mut current = sql.to_string();
    loop {
        let tokens = lexer::tokenize(&current);
        let Some((range, replacement)) = find(&tokens, &current) else {
            return current;
        };
        current = splice(&current, vec![(range, replacement)]);
    }
}

/// Index of the last token of the operand starting at `start`.
pub(crate) fn operand_end(tokens: &[Token<'_>], start: usize) -> Option<usize> {
    // the operand follows an operator, so a leading sign is unary
    let mut i = if is_sign(&tokens[start]) {
        lexer::next_significant(tokens, start)?
    } else {
        start
    };
    loop {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Open => i = lexer::matching_close(tokens, i)?,
            TokenKind::Word if token.is_word("CASE") => i = case_end(tokens, i)?,
            TokenKind::Word if is_stop_word(token) => return None,
            TokenKind::Word => {
                if let Some(j) = lexer::next_significant(tokens, i)
                    && tokens[j].kind == TokenKind::Open
                {
                    i = lexer::matching_close(tokens, j)?;
                }
            }
            TokenKind::Literal | TokenKind::Number | TokenKind::Param => {}
            TokenKind::Punct if token.text == "*" && i > start => {}
            _ => return None,
        }
        match tokens.get(i + 1) {
            Some(next) if next.is_punct(".") || next.is_punct("::") => {
                if i + 2 >= tokens.len() {
                    return Some(i);
                }
                i += 2;
            }
            _ => return Some(i),
        }
    }
}

/// Index of the first token of the operand ending at `end`.
pub(crate) fn operand_start(tokens: &[Token<'_>], end: usize) -> Option<usize> {
    let mut i = end;
    loop {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Close => {
                i = lexer::matching_open(tokens, i)?;
                if let Some(j) = lexer::prev_significant(tokens, i)
                    && tokens[j].kind == TokenKind::Word
                    && !is_stop_word(&tokens[j])
                {
                    i = j;
                }
            }
            TokenKind::Word if token.is_word("END") => i = case_start(tokens, i)?,
            TokenKind::Word if is_stop_word(token) => return None,
            TokenKind::Word | TokenKind::Literal | TokenKind::Number | TokenKind::Param => {}
            TokenKind::Punct if token.text == "*" => {}
            _ => return None,
        }
        if i >= 2 && (tokens[i - 1].is_punct(".") || tokens[i - 1].is_punct("::")) {
            i -= 2;
        } else {
            return Some(with_unary_sign(tokens, i));
        }
    }
}

fn is_sign(token: &Token<'_>) -> bool {
    token.is_punct("-") || token.is_punct("+")
}

/// Extend an operand starting at `i` over a unary sign in front of it.
fn with_unary_sign(tokens: &[Token<'_>], i: usize) -> usize {
    let Some(sign) = lexer::prev_significant(tokens, i) else {
        return i;
    };
    if !is_sign(&tokens[sign]) {
        return i;
    }
    match lexer::prev_significant(tokens, sign) {
        None => sign,
        Some(j) => match tokens[j].kind {
            TokenKind::Open | TokenKind::Punct => sign,
            TokenKind::Word if is_stop_word(&tokens[j]) => sign,
            _ => i,
        },
    }
}

/// Index of the `END` closing the `CASE` at `case`.
fn case_end(tokens: &[Token<'_>], case: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(case) {
        if token.is_word("CASE") {
            depth += 1;
        } else if token.is_word("END") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Index of the `CASE` opened for the `END` at `end`.
fn case_start(tokens: &[Token<'_>], end: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..=end).rev() {
        if tokens[i].is_word("END") {
            depth += 1;
        } else if tokens[i].is_word("CASE") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn depth_of(tokens: &[Token<'_>]) -> Vec<usize> {
    let mut depth = 0usize;
    tokens
        .iter()
        .map(|t| {
            match t.kind {
                TokenKind::Open => depth += 1,
                TokenKind::Close => depth = depth.saturating_sub(1),
                _ => {}
            }
            depth
        })
        .collect()
}

/// Outermost rewritable `||` chain.
fn concat_call(tokens: &[Token<'_>], sql: &str, dialect: Dialect) -> Option<(Range<usize>, String)> {
    let depths = depth_of(tokens);
    let mut candidates: Vec<usize> = (0..tokens.len()).filter(|&i| tokens[i].is_punct("||")).collect();
    candidates.sort_by_key(|&i| depths[i]);

    candidates.into_iter().find_map(|op| {
        let first = operand_start(tokens, lexer::prev_significant(tokens, op)?)?;
        let mut operands = vec![first..lexer::prev_significant(tokens, op)?];
        let mut op = op;
        loop {
            let start = lexer::next_significant(tokens, op)?;
            let end = operand_end(tokens, start)?;
            operands.push(start..end);
            match lexer::next_significant(tokens, end) {
                Some(next) if tokens[next].is_punct("||") => op = next,
                _ => break,
            }
        }
        let last = operands.last()?.end;
        let parts: Vec<String> = operands
            .iter()
            .map(|r| {
                let text = &sql[tokens[r.start].offset..tokens[r.end].end()];
                Rule::ConcatCall.apply(text, dialect)
            })
            .collect();
        Some((
            tokens[first].offset..tokens[last].end(),
            format!("CONCAT({})", parts.join(", ")),
        ))
    })
}

/// First rewritable `ILIKE`.
fn fold_like(tokens: &[Token<'_>], sql: &str, dialect: Dialect) -> Option<(Range<usize>, String)> {
    (0..tokens.len())
        .filter(|&i| tokens[i].is_word("ILIKE"))
        .find_map(|i| {
            let mut before = lexer::prev_significant(tokens, i)?;
            let negated = tokens[before].is_word("NOT");
            if negated {
                before = lexer::prev_significant(tokens, before)?;
            }
            let lhs_start = operand_start(tokens, before)?;
            let rhs_start = lexer::next_significant(tokens, i)?;
            let rhs_end = operand_end(tokens, rhs_start)?;

            let lhs = &sql[tokens[lhs_start].offset..tokens[before].end()];
            let rhs = &sql[tokens[rhs_start].offset..tokens[rhs_end].end()];
            Some((
                tokens[lhs_start].offset..tokens[rhs_end].end(),
                dialect.case_insensitive_like(lhs, rhs, negated),
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operand_bounds() {
        let sql = "SELECT u.name || UPPER(x) FROM t";
        let tokens = lexer::tokenize(sql);
        let op = tokens.iter().position(|t| t.is_punct("||")).unwrap();
        let start = operand_start(&tokens, lexer::prev_significant(&tokens, op).unwrap()).unwrap();
        assert_eq!(tokens[start].text, "u");
        let rhs = lexer::next_significant(&tokens, op).unwrap();
        let end = operand_end(&tokens, rhs).unwrap();
        assert_eq!(tokens[end].text, ")");
    }

    #[test]
    fn test_splice_skips_overlaps() {
        assert_eq!(
            splice("abcdef", vec![(0..2, "X".into()), (1..3, "Y".into()), (4..5, "Z".into())]),
            "XcdZf"
        );
    }

    #[test]
    fn test_concat_nested() {
        assert_eq!(
            Rule::ConcatCall.apply("SELECT UPPER(a || b) || 'x' FROM t", Dialect::MySql),
            "SELECT CONCAT(UPPER(CONCAT(a, b)), 'x') FROM t"
        );
    }

    #[test]
    fn test_function_rule_ignores_qualified_names() {
        assert_eq!(
            Rule::function("LENGTH", "LEN").apply("SELECT pkg.length(a), length(b)", Dialect::SqlServer),
            "SELECT pkg.length(a), LEN(b)"
        );
    }
}
