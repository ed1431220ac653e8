//! Statement lexer using nom.
//!
//! Two layers:
//!
//! ```text
//! SELECT name || ' (' || email || ')' FROM users
//! ├───────────┤├────┤├────────────┤├─┤├─────────┤
//!     code      lit       code      lit   code
//! ```
//!
//! [`split_runs`] separates quoted literals from code so rewrite rules never
//! see the inside of a literal. [`tokenize`] goes one step further and cuts
//! the code runs into words, numbers, parameters and punctuation. Every
//! token borrows from the input and carries its byte offset, so joining the
//! token texts reproduces the statement exactly.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_till, take_until, take_while, take_while1},
    character::complete::{anychar, char, digit1, multispace1, one_of},
    combinator::{map, opt, recognize, rest},
    multi::{many0, many0_count, many1_count},
    sequence::{pair, preceded, tuple},
    IResult,
};

/// A run of statement text: either a quoted literal or code between literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Run<'a> {
    Literal(&'a str),
    Code(&'a str),
}

impl<'a> Run<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Run::Literal(s) | Run::Code(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Whitespace and comments.
    Space,
    /// Quoted string or quoted identifier.
    Literal,
    Word,
    Number,
    /// Named placeholder such as `:from_clause`.
    Param,
    Open,
    Close,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    pub fn is_trivia(&self) -> bool {
        self.kind == TokenKind::Space
    }
}

const QUOTES: &str = "'\"`";

fn quoted(quote: char) -> impl Fn(&str) -> IResult<&str, &str> {
    move |input: &str| {
        let body = match quote {
            '\'' => "'",
            '"' => "\"",
            _ => "`",
        };
        recognize(tuple((
            char(quote),
            many0_count(alt((
                recognize(pair(char(quote), char(quote))),
                is_not(body),
            ))),
            char(quote),
        )))(input)
    }
}

/// A quoted run, or an unterminated quote swallowing the rest of the input.
fn literal(input: &str) -> IResult<&str, &str> {
    alt((
        quoted('\''),
        quoted('"'),
        quoted('`'),
        recognize(preceded(one_of(QUOTES), rest)),
    ))(input)
}

/// A `--` line comment or a `/* */` block comment. An unterminated block
/// comment runs to the end of the input.
pub fn comment(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(tag("--"), take_till(|c| c == '\n'))),
        recognize(tuple((tag("/*"), take_until("*/"), tag("*/")))),
        recognize(pair(tag("/*"), rest)),
    ))(input)
}

/// Code up to the next literal. Quotes inside comments don't open one.
fn code(input: &str) -> IResult<&str, &str> {
    recognize(many1_count(alt((
        comment,
        is_not("'\"`-/"),
        recognize(one_of("-/")),
    ))))(input)
}

/// Split a statement into literal and non-literal runs.
///
/// Concatenating the run texts always reproduces the input.
pub fn split_runs(input: &str) -> Vec<Run<'_>> {
    let parsed: IResult<&str, Vec<Run<'_>>> = many0(alt((
        map(literal, Run::Literal),
        map(code, Run::Code),
    )))(input);
    match parsed {
        Ok((_, runs)) => runs,
        Err(_) => vec![Run::Code(input)],
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '#'
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_word_start), take_while(is_word_char)))(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

fn trivia(input: &str) -> IResult<&str, &str> {
    alt((multispace1, comment))(input)
}

fn param(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(':'), word))(input)
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("::"),
        tag("||"),
        tag("<="),
        tag(">="),
        tag("<>"),
        tag("!="),
        tag("=>"),
        recognize(anychar),
    ))(input)
}

fn code_token(input: &str) -> IResult<&str, (TokenKind, &str)> {
    alt((
        map(trivia, |s| (TokenKind::Space, s)),
        map(word, |s| (TokenKind::Word, s)),
        map(number, |s| (TokenKind::Number, s)),
        map(tag("::"), |s| (TokenKind::Punct, s)),
        map(param, |s| (TokenKind::Param, s)),
        map(tag("("), |s| (TokenKind::Open, s)),
        map(tag(")"), |s| (TokenKind::Close, s)),
        map(operator, |s| (TokenKind::Punct, s)),
    ))(input)
}

/// Tokenize a whole statement. Literal runs become single `Literal` tokens.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut offset = 0;
    for run in split_runs(input) {
        match run {
            Run::Literal(text) => {
                tokens.push(Token {
                    kind: TokenKind::Literal,
                    text,
                    offset,
                });
                offset += text.len();
            }
            Run::Code(code) => {
                let mut remaining = code;
                while !remaining.is_empty() {
                    let Ok((next, (kind, text))) = code_token(remaining) else {
                        // anychar accepts any non-empty input
                        break;
                    };
                    tokens.push(Token { kind, text, offset });
                    offset += text.len();
                    remaining = next;
                }
            }
        }
    }
    tokens
}

/// Join token texts back into a string.
pub fn join(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(|t| t.text).collect()
}

/// Index of the previous non-trivia token.
pub fn prev_significant(tokens: &[Token<'_>], idx: usize) -> Option<usize> {
    (0..idx).rev().find(|&i| !tokens[i].is_trivia())
}

/// Index of the next non-trivia token.
pub fn next_significant(tokens: &[Token<'_>], idx: usize) -> Option<usize> {
    (idx + 1..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

/// Index of the `)` closing the `(` at `open`.
pub fn matching_close(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the `(` opening the `)` at `close`.
pub fn matching_open(tokens: &[Token<'_>], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match tokens[i].kind {
            TokenKind::Close => depth += 1,
            TokenKind::Open => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a token slice on commas at parenthesis depth zero.
pub fn split_top_level_commas<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<&'t [Token<'a>]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => depth -= 1,
            TokenKind::Punct if depth == 0 && token.text == "," => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Byte range covered by a token slice with leading/trailing trivia trimmed.
pub fn trimmed_span(tokens: &[Token<'_>]) -> Option<std::ops::Range<usize>> {
    let first = tokens.iter().find(|t| !t.is_trivia())?;
    let last = tokens.iter().rev().find(|t| !t.is_trivia())?;
    Some(first.offset..last.end())
}
