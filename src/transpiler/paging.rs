//! LIMIT/OFFSET emulation.

use crate::dialect::{Dialect, PagingStyle};
use crate::parser::{self, ClauseKind, SelectStatement};

/// Rewrite `LIMIT n [OFFSET m]` into the dialect's paging syntax.
///
/// Statements without paging, or that don't parse as a single SELECT, are
/// returned unchanged.
pub fn rewrite_limit_offset(sql: &str, dialect: Dialect, fallback_order: &str) -> String {
    let style = dialect.paging_style();
    if style == PagingStyle::Native {
        return sql.to_string();
    }

    let statement = sql.trim_end().trim_end_matches(';').trim_end();
    let Some(select) = parser::parse_select(statement) else {
        tracing::debug!("Paging left unchanged, not a simple SELECT: {}", sql);
        return sql.to_string();
    };
    if !select.has(ClauseKind::Limit) && !select.has(ClauseKind::Offset) {
        return sql.to_string();
    }

    let limit = match select.clause(ClauseKind::Limit) {
        Some(_) => match select.limit() {
            Some(n) => Some(n),
            None => {
                tracing::warn!("Non-numeric LIMIT left unchanged: {}", sql);
                return sql.to_string();
            }
        },
        None => None,
    };
    let offset = match select.clause(ClauseKind::Offset) {
        Some(_) => match select.offset() {
            Some(0) => None,
            Some(m) => Some(m),
            None => {
                tracing::warn!("Non-numeric OFFSET left unchanged: {}", sql);
                return sql.to_string();
            }
        },
        None => None,
    };

    // a window end past u64::MAX is no bound at all
    let limit = match (limit, offset) {
        (Some(n), Some(m)) if n.checked_add(m).is_none() => {
            tracing::warn!("LIMIT {} after OFFSET {} overflows, upper bound dropped", n, m);
            None
        }
        _ => limit,
    };

    let rewritten = match style {
        PagingStyle::Native => None,
        PagingStyle::Top => top(&select, limit, offset, fallback_order),
        PagingStyle::RowNum => Some(rownum(&select, limit, offset)),
        PagingStyle::FetchFirst => fetch_first(&select, limit, offset),
    };
    match rewritten {
        Some(out) => {
            tracing::debug!("Rewrote paging for {}: {}", dialect, out);
            out
        }
        None => sql.to_string(),
    }
}

/// `SELECT [DISTINCT] ` prefix.
fn head(select: &SelectStatement<'_>) -> &'static str {
    if select.distinct {
        "SELECT DISTINCT "
    } else {
        "SELECT "
    }
}

fn top(
    select: &SelectStatement<'_>,
    limit: Option<u64>,
    offset: Option<u64>,
    fallback_order: &str,
) -> Option<String> {
    if select.top.is_some() {
        tracing::warn!("Statement already has TOP, paging left unchanged");
        return None;
    }
    let columns = &select.text[select.columns_span()?];

    match (limit, offset) {
        (Some(n), None) => {
            let rest = select.without(&[ClauseKind::Limit, ClauseKind::Offset]);
            let from = select.clause(ClauseKind::From)?.start;
            let tail = rest.get(from..).unwrap_or_default();
            Some(format!("{}TOP {} {} {}", head(select), n, columns, tail).trim_end().to_string())
        }
        (limit, Some(m)) => {
            let order = select.body(ClauseKind::OrderBy).unwrap_or(fallback_order);
            let stripped = select.without(&[ClauseKind::OrderBy, ClauseKind::Limit, ClauseKind::Offset]);
            let from = select.clause(ClauseKind::From)?.start;
            let tail = stripped.get(from..).unwrap_or_default();
            let window = match limit {
                Some(n) => format!("row_num > {} AND row_num <= {}", m, m + n),
                None => format!("row_num > {}", m),
            };
            Some(format!(
                "SELECT * FROM ({}{}, ROW_NUMBER() OVER (ORDER BY {}) AS row_num {}) AS paged WHERE {} ORDER BY row_num",
                head(select),
                columns,
                order,
                tail,
                window
            ))
        }
        (None, None) => None,
    }
}

fn rownum(select: &SelectStatement<'_>, limit: Option<u64>, offset: Option<u64>) -> String {
    let inner = select.without(&[ClauseKind::Limit, ClauseKind::Offset]);
    match (limit, offset) {
        (Some(n), None) => format!("SELECT * FROM ({}) WHERE rownum <= {}", inner, n),
        (Some(n), Some(m)) => format!(
            "SELECT * FROM (SELECT paged.*, rownum AS row_num FROM ({}) paged WHERE rownum <= {}) WHERE row_num > {}",
            inner,
            n + m,
            m
        ),
        (None, Some(m)) => format!(
            "SELECT * FROM (SELECT paged.*, rownum AS row_num FROM ({}) paged) WHERE row_num > {}",
            inner, m
        ),
        (None, None) => inner,
    }
}

fn fetch_first(select: &SelectStatement<'_>, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
    if offset.is_some() {
        tracing::debug!("OFFSET has no FETCH FIRST form, paging left unchanged");
        return None;
    }
    let n = limit?;
    let inner = select.without(&[ClauseKind::Limit, ClauseKind::Offset]);
    Some(format!("{} FETCH FIRST {} ROWS ONLY", inner, n))
}
