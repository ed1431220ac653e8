//! Fuzzy search terms.
//!
//! `john "new york" the` splits into `john`, `new york` and `the`; stop
//! words are then dropped unless that would leave nothing to search for.

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, rest},
    multi::many0,
    sequence::{delimited, preceded, terminated},
    IResult,
};

use crate::dialect::Dialect;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term<'a> {
    Word(&'a str),
    Phrase(&'a str),
}

fn phrase(input: &str) -> IResult<&str, Term<'_>> {
    alt((
        map(
            delimited(char('"'), opt(is_not("\"")), char('"')),
            |body: Option<&str>| Term::Phrase(body.unwrap_or_default()),
        ),
        // unterminated quote runs to the end
        map(preceded(char('"'), rest), Term::Phrase),
    ))(input)
}

fn word(input: &str) -> IResult<&str, Term<'_>> {
    map(take_while1(|c: char| !c.is_whitespace() && c != '"'), Term::Word)(input)
}

fn terms(input: &str) -> IResult<&str, Vec<Term<'_>>> {
    preceded(multispace0, many0(terminated(alt((phrase, word)), multispace0)))(input)
}

/// Split search text into terms, dropping stop words when something else
/// remains.
pub fn search_terms<F>(text: &str, is_stop_word: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let parsed = match terms(text) {
        Ok((_, parsed)) => parsed,
        Err(_) => Vec::new(),
    };

    let all: Vec<(String, bool)> = parsed
        .into_iter()
        .filter_map(|term| match term {
            Term::Word(w) => Some((w.to_string(), is_stop_word(w))),
            Term::Phrase(p) => {
                let p = p.trim();
                (!p.is_empty()).then(|| (p.to_string(), false))
            }
        })
        .collect();

    let kept: Vec<String> = all
        .iter()
        .filter(|(_, stop)| !stop)
        .map(|(t, _)| t.clone())
        .collect();
    if kept.is_empty() {
        all.into_iter().map(|(t, _)| t).collect()
    } else {
        kept
    }
}

/// AND of one OR-group per term, each matching `%term%` on every column.
pub fn fuzzy_match(dialect: Dialect, columns: &[String], terms: &[String]) -> String {
    if terms.is_empty() || columns.is_empty() {
        return "1 = 1".to_string();
    }
    let groups: Vec<String> = terms
        .iter()
        .map(|term| {
            let pattern = dialect.quote_string(&format!("%{}%", term));
            let likes: Vec<String> = columns
                .iter()
                .map(|c| dialect.case_insensitive_like(c, &pattern, false))
                .collect();
            if likes.len() == 1 {
                likes.join("")
            } else {
                format!("({})", likes.join(" OR "))
            }
        })
        .collect();
    if groups.len() == 1 {
        groups.join("")
    } else {
        format!("({})", groups.join(" AND "))
    }
}
