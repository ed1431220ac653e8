//! # sqlport: Portable SQL
//!
//! > **Write it once. Run it on six databases.**
//!
//! sqlport rewrites statements written in a common SQL dialect for a target
//! database, and compiles shorthand relationship paths into joins.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlport::prelude::*;
//!
//! let schema = Schema::load("schema.toml")?;
//! let translator = Translator::new(Dialect::SqlServer);
//!
//! let sql = Query::new("users")
//!     .columns(["users.name", "orders.total"])
//!     .filter("name|email~", "john")
//!     .limit(10)
//!     .offset(20)
//!     .to_sql(&translator, &schema)?;
//! ```
//!
//! ## Stages
//!
//! | Stage        | Module                    | Does                                   |
//! |--------------|---------------------------|----------------------------------------|
//! | Joins        | [`joins`]                 | `orders{billing}.total` → LEFT JOINs   |
//! | Paging       | [`transpiler::paging`]    | `LIMIT/OFFSET` → TOP, ROWNUM, FETCH    |
//! | National     | [`transpiler::national`]  | binary-safe unicode projections        |
//! | Rules        | [`transpiler::rules`]     | functions, keywords, operators         |
//! | DDL          | [`transpiler::ddl`]       | types, identity, FK triggers           |

pub mod builders;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod joins;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod schema;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::builders::{ClauseBuilder, ConditionValue, Operator};
    pub use crate::config::TranslatorConfig;
    pub use crate::dialect::Dialect;
    pub use crate::error::*;
    pub use crate::joins::{JoinCompiler, JoinPlan, JoinStep, JoinType};
    pub use crate::query::Query;
    pub use crate::schema::{
        ColumnInfo, ColumnType, KeyKind, ReferentialAction, Relationship, RelationshipKind, Schema,
        SchemaSource,
    };
    pub use crate::transpiler::{NationalColumns, Rule, Translator};
    pub use crate::value::Value;
}

/// Translate a statement to `dialect` with the default rule set.
///
/// # Example
///
/// ```
/// use sqlport::{translate, dialect::Dialect};
///
/// let sql = translate("SELECT first || ' ' || last FROM users", Dialect::MySql);
/// assert_eq!(sql, "SELECT CONCAT(first, ' ', last) FROM users");
/// ```
pub fn translate(sql: &str, dialect: dialect::Dialect) -> String {
    transpiler::Translator::new(dialect).translate(sql)
}
