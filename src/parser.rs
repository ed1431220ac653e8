//! Recursive-descent statement parser over the token stream.
//!
//! Only the shapes the rewriters need are recognized:
//!
//! ```text
//! SELECT [DISTINCT] [TOP n] <columns> FROM <from> [WHERE ..] [GROUP BY ..]
//!        [HAVING ..] [ORDER BY ..] [LIMIT n] [OFFSET m]
//!
//! CREATE TABLE [IF NOT EXISTS] <name> ( <column-def | constraint>, ... ) [suffix]
//! ```
//!
//! Parenthesized groups are opaque, so sub-selects and window clauses never
//! leak into the outer clause list. Anything outside these shapes yields
//! `None` and callers pass the statement through unchanged.

use std::ops::Range;

use crate::lexer::{self, Token, TokenKind};
use crate::schema::ReferentialAction;

/// Clause keywords of a SELECT statement in their required order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClauseKind {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
}

/// One clause: where its keyword starts and the byte range of its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub start: usize,
    pub body: Range<usize>,
}

/// A top-level SELECT statement split into clauses.
#[derive(Debug, Clone)]
pub struct SelectStatement<'a> {
    pub text: &'a str,
    pub distinct: bool,
    /// `TOP n` already present after SELECT.
    pub top: Option<u64>,
    pub clauses: Vec<Clause>,
}

impl<'a> SelectStatement<'a> {
    pub fn clause(&self, kind: ClauseKind) -> Option<&Clause> {
        self.clauses.iter().find(|c| c.kind == kind)
    }

    /// Trimmed body text of a clause.
    pub fn body(&self, kind: ClauseKind) -> Option<&'a str> {
        self.clause(kind).map(|c| self.text[c.body.clone()].trim())
    }

    pub fn has(&self, kind: ClauseKind) -> bool {
        self.clause(kind).is_some()
    }

    pub fn limit(&self) -> Option<u64> {
        self.body(ClauseKind::Limit)?.parse().ok()
    }

    pub fn offset(&self) -> Option<u64> {
        self.body(ClauseKind::Offset)?.parse().ok()
    }

    /// Statement text with the given clauses removed and trailing space trimmed.
    pub fn without(&self, kinds: &[ClauseKind]) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for clause in self.clauses.iter().filter(|c| kinds.contains(&c.kind)) {
            out.push_str(self.text[cursor..clause.start].trim_end());
            cursor = clause.body.end;
        }
        out.push_str(&self.text[cursor..]);
        out.trim_end().to_string()
    }

    /// Byte range of the SELECT list with surrounding whitespace trimmed.
    pub fn columns_span(&self) -> Option<Range<usize>> {
        let clause = self.clause(ClauseKind::Select)?;
        trim_range(self.text, clause.body.clone())
    }
}

/// Narrow a byte range so it excludes leading and trailing whitespace.
pub fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead + trail >= slice.len() {
        return None;
    }
    Some(range.start + lead..range.end - trail)
}

fn clause_keyword(tokens: &[Token<'_>], i: usize) -> Option<(ClauseKind, usize)> {
    let token = &tokens[i];
    if token.kind != TokenKind::Word {
        return None;
    }
    let followed_by_by = || {
        lexer::next_significant(tokens, i).filter(|&j| tokens[j].is_word("BY"))
    };
    match token.text.to_ascii_uppercase().as_str() {
        "FROM" => Some((ClauseKind::From, i)),
        "WHERE" => Some((ClauseKind::Where, i)),
        "GROUP" => followed_by_by().map(|j| (ClauseKind::GroupBy, j)),
        "HAVING" => Some((ClauseKind::Having, i)),
        "ORDER" => followed_by_by().map(|j| (ClauseKind::OrderBy, j)),
        "LIMIT" => Some((ClauseKind::Limit, i)),
        "OFFSET" => Some((ClauseKind::Offset, i)),
        _ => None,
    }
}

const SET_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT", "MINUS"];

/// Parse a top-level SELECT statement.
pub fn parse_select(text: &str) -> Option<SelectStatement<'_>> {
    let tokens = lexer::tokenize(text);
    let first = tokens.iter().position(|t| !t.is_trivia())?;
    if !tokens[first].is_word("SELECT") {
        return None;
    }

    let mut body_start = tokens[first].end();
    let mut distinct = false;
    let mut top = None;
    let mut cursor = first;

    if let Some(i) = lexer::next_significant(&tokens, cursor)
        && (tokens[i].is_word("DISTINCT") || tokens[i].is_word("ALL"))
    {
        distinct = tokens[i].is_word("DISTINCT");
        body_start = tokens[i].end();
        cursor = i;
    }
    if let Some(i) = lexer::next_significant(&tokens, cursor)
        && tokens[i].is_word("TOP")
    {
        let n = lexer::next_significant(&tokens, i)?;
        top = Some(tokens[n].text.parse().ok()?);
        body_start = tokens[n].end();
        cursor = n;
    }

    let mut clauses = vec![Clause {
        kind: ClauseKind::Select,
        start: tokens[first].offset,
        body: body_start..text.len(),
    }];
    let mut depth = 0i32;
    let mut i = cursor + 1;
    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            TokenKind::Word if depth == 0 => {
                if SET_OPERATORS.iter().any(|op| token.is_word(op)) {
                    return None;
                }
                if let Some((kind, last)) = clause_keyword(&tokens, i) {
                    let previous = clauses.last_mut()?;
                    if kind <= previous.kind {
                        return None;
                    }
                    previous.body.end = token.offset;
                    clauses.push(Clause {
                        kind,
                        start: token.offset,
                        body: tokens[last].end()..text.len(),
                    });
                    i = last;
                }
            }
            _ => {}
        }
        i += 1;
    }
    if depth != 0 {
        return None;
    }

    Some(SelectStatement {
        text,
        distinct,
        top,
        clauses,
    })
}

/// A `REFERENCES table (column) [ON DELETE ..] [ON UPDATE ..]` fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRef<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef<'a> {
    pub name: &'a str,
    /// Declared type, e.g. `integer` or `varchar(255)`.
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub references: Option<ForeignRef<'a>>,
    /// Remaining constraint fragments (`DEFAULT 0`, `UNIQUE`, ...) as written.
    pub extra: Vec<String>,
}

impl ColumnDef<'_> {
    pub fn nullable(&self) -> bool {
        !self.not_null && !self.primary_key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableItem<'a> {
    Column(ColumnDef<'a>),
    /// Single-column table-level foreign key.
    ForeignKey {
        name: Option<&'a str>,
        column: &'a str,
        references: ForeignRef<'a>,
    },
    /// Any other table constraint, kept verbatim.
    Constraint(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable<'a> {
    pub name: &'a str,
    pub if_not_exists: bool,
    pub items: Vec<TableItem<'a>>,
    /// Text after the closing parenthesis (table options).
    pub suffix: &'a str,
}

impl<'a> CreateTable<'a> {
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef<'a>> {
        self.items.iter().filter_map(|item| match item {
            TableItem::Column(c) => Some(c),
            _ => None,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef<'a>> {
        self.columns().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Cursor over the significant tokens of one definition.
struct Cursor<'t, 'a> {
    tokens: Vec<&'t Token<'a>>,
    pos: usize,
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Self {
        Self {
            tokens: tokens.iter().filter(|t| !t.is_trivia()).collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(word))
    }

    fn next(&mut self) -> Option<&'t Token<'a>> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.peek_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, word: &str) -> Option<()> {
        self.eat_word(word).then_some(())
    }

    fn name(&mut self) -> Option<&'a str> {
        let token = self.next()?;
        matches!(token.kind, TokenKind::Word | TokenKind::Literal).then_some(token.text)
    }

    /// A parenthesized group rendered with single spaces between tokens.
    fn group(&mut self) -> Option<String> {
        self.peek().filter(|t| t.kind == TokenKind::Open)?;
        let mut depth = 0;
        let mut text = String::new();
        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::Open => depth += 1,
                TokenKind::Close => depth -= 1,
                _ => {}
            }
            if !text.is_empty()
                && !text.ends_with('(')
                && token.kind != TokenKind::Close
                && !token.is_punct(",")
            {
                text.push(' ');
            }
            text.push_str(token.text);
            if depth == 0 {
                return Some(text);
            }
        }
        None
    }

    /// `( name )`
    fn single_name_group(&mut self) -> Option<&'a str> {
        if self.peek()?.kind != TokenKind::Open {
            return None;
        }
        self.pos += 1;
        let name = self.name()?;
        (self.next()?.kind == TokenKind::Close).then_some(name)
    }

    fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

const CONSTRAINT_WORDS: &[&str] = &[
    "NOT",
    "NULL",
    "PRIMARY",
    "UNIQUE",
    "DEFAULT",
    "REFERENCES",
    "AUTOINCREMENT",
    "AUTO_INCREMENT",
    "CHECK",
    "CONSTRAINT",
    "COLLATE",
];

const TABLE_CONSTRAINT_WORDS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "KEY", "INDEX",
];

fn parse_action(cursor: &mut Cursor<'_, '_>) -> Option<ReferentialAction> {
    if cursor.eat_word("CASCADE") {
        Some(ReferentialAction::Cascade)
    } else if cursor.eat_word("RESTRICT") {
        Some(ReferentialAction::Restrict)
    } else if cursor.eat_word("SET") {
        cursor.expect_word("NULL")?;
        Some(ReferentialAction::SetNull)
    } else if cursor.eat_word("NO") {
        cursor.expect_word("ACTION")?;
        Some(ReferentialAction::NoAction)
    } else {
        None
    }
}

fn parse_references<'a>(cursor: &mut Cursor<'_, 'a>) -> Option<ForeignRef<'a>> {
    let table = cursor.name()?;
    let column = cursor.single_name_group()?;
    let mut reference = ForeignRef {
        table,
        column,
        on_delete: None,
        on_update: None,
    };
    while cursor.eat_word("ON") {
        if cursor.eat_word("DELETE") {
            reference.on_delete = Some(parse_action(cursor)?);
        } else if cursor.eat_word("UPDATE") {
            reference.on_update = Some(parse_action(cursor)?);
        } else {
            return None;
        }
    }
    Some(reference)
}

fn parse_column<'a>(tokens: &[Token<'a>]) -> Option<ColumnDef<'a>> {
    let mut cursor = Cursor::new(tokens);
    let name = cursor.name()?;

    let mut data_type = String::new();
    while let Some(token) = cursor.peek() {
        if token.kind != TokenKind::Word || CONSTRAINT_WORDS.iter().any(|w| token.is_word(w)) {
            break;
        }
        if !data_type.is_empty() {
            data_type.push(' ');
        }
        data_type.push_str(token.text);
        cursor.pos += 1;
        if cursor.peek().is_some_and(|t| t.kind == TokenKind::Open) {
            data_type.push_str(&cursor.group()?);
        }
    }
    if data_type.is_empty() {
        return None;
    }

    let mut column = ColumnDef {
        name,
        data_type,
        not_null: false,
        primary_key: false,
        auto_increment: false,
        references: None,
        extra: Vec::new(),
    };

    while !cursor.is_done() {
        if cursor.eat_word("NOT") {
            cursor.expect_word("NULL")?;
            column.not_null = true;
        } else if cursor.eat_word("PRIMARY") {
            cursor.expect_word("KEY")?;
            column.primary_key = true;
        } else if cursor.eat_word("AUTOINCREMENT") || cursor.eat_word("AUTO_INCREMENT") {
            column.auto_increment = true;
        } else if cursor.eat_word("REFERENCES") {
            column.references = Some(parse_references(&mut cursor)?);
        } else if cursor.eat_word("DEFAULT") {
            let value = match cursor.peek()?.kind {
                TokenKind::Open => cursor.group()?,
                TokenKind::Punct => {
                    let sign = cursor.next()?.text;
                    format!("{}{}", sign, cursor.next()?.text)
                }
                _ => cursor.next()?.text.to_string(),
            };
            column.extra.push(format!("DEFAULT {}", value));
        } else if cursor.eat_word("CHECK") {
            column.extra.push(format!("CHECK {}", cursor.group()?));
        } else {
            let token = cursor.next()?;
            match column.extra.last_mut() {
                Some(last) if !CONSTRAINT_WORDS.iter().any(|w| token.is_word(w)) => {
                    last.push(' ');
                    last.push_str(token.text);
                }
                _ => column.extra.push(token.text.to_string()),
            }
        }
    }
    Some(column)
}

fn parse_table_item<'a>(tokens: &[Token<'a>]) -> Option<TableItem<'a>> {
    let first = tokens.iter().find(|t| !t.is_trivia())?;
    if !TABLE_CONSTRAINT_WORDS.iter().any(|w| first.is_word(w)) {
        return parse_column(tokens).map(TableItem::Column);
    }

    let raw = lexer::join(tokens).trim().to_string();
    let mut cursor = Cursor::new(tokens);
    let name = if cursor.eat_word("CONSTRAINT") {
        Some(cursor.name()?)
    } else {
        None
    };
    if cursor.eat_word("FOREIGN") {
        cursor.expect_word("KEY")?;
        let Some(column) = cursor.single_name_group() else {
            return Some(TableItem::Constraint(raw));
        };
        cursor.expect_word("REFERENCES")?;
        let references = parse_references(&mut cursor)?;
        if cursor.is_done() {
            return Some(TableItem::ForeignKey {
                name,
                column,
                references,
            });
        }
    }
    Some(TableItem::Constraint(raw))
}

/// Parse a `CREATE TABLE` statement.
pub fn parse_create_table(text: &str) -> Option<CreateTable<'_>> {
    let tokens = lexer::tokenize(text);
    let significant: Vec<usize> = (0..tokens.len()).filter(|&i| !tokens[i].is_trivia()).collect();
    let mut pos = 0;
    let expect = |word: &str, pos: &mut usize| -> Option<()> {
        let i = *significant.get(*pos)?;
        tokens[i].is_word(word).then(|| *pos += 1)
    };
    expect("CREATE", &mut pos)?;
    expect("TABLE", &mut pos)?;

    let mut if_not_exists = false;
    if tokens[*significant.get(pos)?].is_word("IF") {
        pos += 1;
        expect("NOT", &mut pos)?;
        expect("EXISTS", &mut pos)?;
        if_not_exists = true;
    }

    let name_token = &tokens[*significant.get(pos)?];
    if !matches!(name_token.kind, TokenKind::Word | TokenKind::Literal) {
        return None;
    }
    let name = name_token.text;
    pos += 1;

    let open = *significant.get(pos)?;
    if tokens[open].kind != TokenKind::Open {
        return None;
    }
    let close = lexer::matching_close(&tokens, open)?;

    let items = lexer::split_top_level_commas(&tokens[open + 1..close])
        .into_iter()
        .map(parse_table_item)
        .collect::<Option<Vec<_>>>()?;

    Some(CreateTable {
        name,
        if_not_exists,
        items,
        suffix: text[tokens[close].end()..].trim_end_matches([';', ' ', '\n', '\t', '\r']),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_clauses() {
        let sql = "SELECT a, (SELECT max(b) FROM t2 ORDER BY b) FROM t WHERE x = 1 ORDER BY a LIMIT 5 OFFSET 10";
        let select = parse_select(sql).unwrap();
        assert_eq!(select.body(ClauseKind::Select), Some("a, (SELECT max(b) FROM t2 ORDER BY b)"));
        assert_eq!(select.body(ClauseKind::From), Some("t"));
        assert_eq!(select.body(ClauseKind::Where), Some("x = 1"));
        assert_eq!(select.body(ClauseKind::OrderBy), Some("a"));
        assert_eq!(select.limit(), Some(5));
        assert_eq!(select.offset(), Some(10));
    }

    #[test]
    fn test_parse_select_distinct_top() {
        let select = parse_select("SELECT DISTINCT TOP 3 name FROM users").unwrap();
        assert!(select.distinct);
        assert_eq!(select.top, Some(3));
        assert_eq!(select.body(ClauseKind::Select), Some("name"));
    }

    #[test]
    fn test_parse_select_without() {
        let select = parse_select("SELECT * FROM t ORDER BY id LIMIT 5 OFFSET 10").unwrap();
        assert_eq!(
            select.without(&[ClauseKind::Limit, ClauseKind::Offset]),
            "SELECT * FROM t ORDER BY id"
        );
        assert_eq!(
            select.without(&[ClauseKind::OrderBy, ClauseKind::Limit, ClauseKind::Offset]),
            "SELECT * FROM t"
        );
    }

    #[test]
    fn test_parse_select_rejects_unions_and_disorder() {
        assert!(parse_select("SELECT a FROM t UNION SELECT a FROM u").is_none());
        assert!(parse_select("SELECT a FROM t LIMIT 1 WHERE a = 1").is_none());
        assert!(parse_select("UPDATE t SET a = 1").is_none());
    }

    #[test]
    fn test_parse_select_keywords_in_literals() {
        let select = parse_select("SELECT 'FROM' FROM t WHERE a = 'ORDER BY'").unwrap();
        assert_eq!(select.body(ClauseKind::Select), Some("'FROM'"));
        assert!(!select.has(ClauseKind::OrderBy));
    }

    #[test]
    fn test_parse_create_table() {
        let sql = "CREATE TABLE child (\n  id integer autoincrement PRIMARY KEY,\n  parent_id INTEGER NOT NULL REFERENCES parent(id) ON DELETE CASCADE,\n  name varchar(40) DEFAULT 'x',\n  UNIQUE (name)\n)";
        let table = parse_create_table(sql).unwrap();
        assert_eq!(table.name, "child");
        assert_eq!(table.items.len(), 4);

        let id = table.column("id").unwrap();
        assert!(id.auto_increment && id.primary_key);
        assert_eq!(id.data_type, "integer");

        let parent = table.column("parent_id").unwrap();
        assert!(parent.not_null);
        let reference = parent.references.as_ref().unwrap();
        assert_eq!(reference.table, "parent");
        assert_eq!(reference.column, "id");
        assert_eq!(reference.on_delete, Some(ReferentialAction::Cascade));
        assert_eq!(reference.on_update, None);

        let name = table.column("name").unwrap();
        assert_eq!(name.data_type, "varchar(40)");
        assert_eq!(name.extra, vec!["DEFAULT 'x'".to_string()]);

        assert_eq!(table.items[3], TableItem::Constraint("UNIQUE (name)".to_string()));
    }

    #[test]
    fn test_parse_table_level_foreign_key() {
        let sql = "CREATE TABLE IF NOT EXISTS a (b_id integer, CONSTRAINT fk_b FOREIGN KEY (b_id) REFERENCES b (id) ON UPDATE SET NULL)";
        let table = parse_create_table(sql).unwrap();
        assert!(table.if_not_exists);
        match &table.items[1] {
            TableItem::ForeignKey { name, column, references } => {
                assert_eq!(*name, Some("fk_b"));
                assert_eq!(*column, "b_id");
                assert_eq!(references.on_update, Some(ReferentialAction::SetNull));
            }
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_table_rejects_other_statements() {
        assert!(parse_create_table("CREATE INDEX i ON t (a)").is_none());
        assert!(parse_create_table("SELECT 1").is_none());
    }
}
