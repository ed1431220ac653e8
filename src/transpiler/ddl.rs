//! CREATE TABLE translation and synthesized companion statements.

use std::collections::HashSet;

use crate::dialect::{AutoIncrementStyle, Dialect};
use crate::parser::{self, ColumnDef, CreateTable, ForeignRef, TableItem};
use crate::schema::ReferentialAction;

/// Generic type name and its spelling per dialect, in [`Dialect::ALL`] order.
const TYPE_MAP: &[(&str, [&str; 6])] = &[
    ("text", ["TEXT", "LONGTEXT", "TEXT", "NVARCHAR(MAX)", "CLOB", "CLOB"]),
    ("boolean", ["BOOLEAN", "TINYINT(1)", "BOOLEAN", "BIT", "NUMBER(1)", "SMALLINT"]),
    ("bool", ["BOOLEAN", "TINYINT(1)", "BOOLEAN", "BIT", "NUMBER(1)", "SMALLINT"]),
    ("datetime", ["TIMESTAMP", "DATETIME", "DATETIME", "DATETIME2", "TIMESTAMP", "TIMESTAMP"]),
    ("timestamp", ["TIMESTAMP", "DATETIME", "DATETIME", "DATETIME2", "TIMESTAMP", "TIMESTAMP"]),
    ("blob", ["BYTEA", "BLOB", "BLOB", "VARBINARY(MAX)", "BLOB", "BLOB"]),
    ("integer", ["INTEGER", "INT", "INTEGER", "INT", "NUMBER(10)", "INTEGER"]),
    ("int", ["INTEGER", "INT", "INTEGER", "INT", "NUMBER(10)", "INTEGER"]),
];

fn dialect_index(dialect: Dialect) -> usize {
    Dialect::ALL.iter().position(|d| *d == dialect).unwrap_or(0)
}

/// Map a generic column type to the dialect's native type.
///
/// Unknown types are kept as written.
pub fn map_type(data_type: &str, dialect: Dialect) -> String {
    let lower = data_type.to_ascii_lowercase();
    if let Some((_, spellings)) = TYPE_MAP.iter().find(|(generic, _)| *generic == lower) {
        return spellings[dialect_index(dialect)].to_string();
    }
    if let Some(size) = lower.strip_prefix("varchar") {
        return match dialect {
            Dialect::Oracle => format!("VARCHAR2{}", size.to_ascii_uppercase()),
            _ => format!("VARCHAR{}", size.to_ascii_uppercase()),
        };
    }
    data_type.to_string()
}

/// Which side of a foreign key a trigger is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Referencing,
    Referenced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Insert,
    Update,
    Delete,
}

/// What the trigger body does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    /// Abort when the referenced row is missing.
    Validate,
    /// Abort while referencing rows exist.
    Restrict,
    SetNull,
    Cascade,
}

/// One row of the trigger matrix.
struct Template {
    prefix: &'static str,
    target: Target,
    timing: &'static str,
    event: Event,
    effect: Effect,
}

const TEMPLATES: &[Template] = &[
    Template { prefix: "fki", target: Target::Referencing, timing: "BEFORE", event: Event::Insert, effect: Effect::Validate },
    Template { prefix: "fku", target: Target::Referencing, timing: "BEFORE", event: Event::Update, effect: Effect::Validate },
    Template { prefix: "fkd", target: Target::Referenced, timing: "BEFORE", event: Event::Delete, effect: Effect::Restrict },
    Template { prefix: "fkd", target: Target::Referenced, timing: "BEFORE", event: Event::Delete, effect: Effect::SetNull },
    Template { prefix: "fkd", target: Target::Referenced, timing: "BEFORE", event: Event::Delete, effect: Effect::Cascade },
    Template { prefix: "fkup", target: Target::Referenced, timing: "BEFORE", event: Event::Update, effect: Effect::Restrict },
    Template { prefix: "fkup", target: Target::Referenced, timing: "BEFORE", event: Event::Update, effect: Effect::SetNull },
    // Cascaded keys must see the updated parent row to pass validation.
    Template { prefix: "fkup", target: Target::Referenced, timing: "AFTER", event: Event::Update, effect: Effect::Cascade },
];

fn effect_of(action: ReferentialAction) -> Effect {
    match action {
        ReferentialAction::Restrict | ReferentialAction::NoAction => Effect::Restrict,
        ReferentialAction::SetNull => Effect::SetNull,
        ReferentialAction::Cascade => Effect::Cascade,
    }
}

/// A foreign key as seen by the trigger synthesizer.
struct ForeignKey<'a> {
    table: &'a str,
    column: &'a str,
    nullable: bool,
    references: &'a ForeignRef<'a>,
}

impl ForeignKey<'_> {
    fn render(&self, template: &Template) -> String {
        let (parent, parent_key) = (self.references.table, self.references.column);
        let (child, col) = (self.table, self.column);
        let name = format!("{}_{}_{}", template.prefix, child, col);
        let on = match template.target {
            Target::Referencing => child,
            Target::Referenced => parent,
        };
        let event = match (template.event, template.target) {
            (Event::Insert, _) => "INSERT".to_string(),
            (Event::Delete, _) => "DELETE".to_string(),
            (Event::Update, Target::Referencing) => format!("UPDATE OF {}", col),
            (Event::Update, Target::Referenced) => format!("UPDATE OF {}", parent_key),
        };
        let when = match (template.event, template.target) {
            (Event::Update, Target::Referenced) => {
                format!(" WHEN OLD.{} <> NEW.{}", parent_key, parent_key)
            }
            _ => String::new(),
        };
        let verb = match template.event {
            Event::Insert => "insert",
            Event::Update => "update",
            Event::Delete => "delete",
        };
        let raise = format!(
            "SELECT RAISE(ABORT, '{} on table \"{}\" violates foreign key constraint \"{}\"')",
            verb, on, name
        );
        let body = match template.effect {
            Effect::Validate => {
                let guard = if self.nullable {
                    format!("NEW.{} IS NOT NULL AND ", col)
                } else {
                    String::new()
                };
                format!(
                    "{} WHERE {}(SELECT {} FROM {} WHERE {} = NEW.{}) IS NULL",
                    raise, guard, parent_key, parent, parent_key, col
                )
            }
            Effect::Restrict => format!(
                "{} WHERE (SELECT {} FROM {} WHERE {} = OLD.{} LIMIT 1) IS NOT NULL",
                raise, col, child, col, parent_key
            ),
            Effect::SetNull => format!(
                "UPDATE {} SET {} = NULL WHERE {} = OLD.{}",
                child, col, col, parent_key
            ),
            Effect::Cascade => match template.event {
                Event::Delete => format!("DELETE FROM {} WHERE {} = OLD.{}", child, col, parent_key),
                _ => format!(
                    "UPDATE {} SET {} = NEW.{} WHERE {} = OLD.{}",
                    child, col, parent_key, col, parent_key
                ),
            },
        };
        format!(
            "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW{} BEGIN {}; END",
            name, template.timing, event, on, when, body
        )
    }

    /// Validity pair plus the declared referential actions.
    fn triggers(&self) -> Vec<String> {
        let delete = self.references.on_delete.map(effect_of);
        let update = self.references.on_update.map(effect_of);
        TEMPLATES
            .iter()
            .filter(|t| match (t.target, t.event) {
                (Target::Referencing, _) => true,
                (Target::Referenced, Event::Delete) => delete == Some(t.effect),
                (Target::Referenced, _) => update == Some(t.effect),
            })
            .map(|t| self.render(t))
            .collect()
    }
}

/// Referential actions the dialect can express.
fn supported_actions(
    dialect: Dialect,
    references: &ForeignRef<'_>,
) -> (Option<ReferentialAction>, Option<ReferentialAction>) {
    let map = |action: Option<ReferentialAction>| match (dialect, action) {
        (Dialect::SqlServer, Some(ReferentialAction::Restrict)) => Some(ReferentialAction::NoAction),
        (_, action) => action,
    };
    match dialect {
        Dialect::Oracle => {
            let on_delete = references
                .on_delete
                .filter(|a| matches!(a, ReferentialAction::Cascade | ReferentialAction::SetNull));
            (on_delete, None)
        }
        _ => (map(references.on_delete), map(references.on_update)),
    }
}

fn render_references(dialect: Dialect, references: &ForeignRef<'_>) -> String {
    let (on_delete, on_update) = supported_actions(dialect, references);
    let mut sql = format!("REFERENCES {} ({})", references.table, references.column);
    if let Some(action) = on_delete {
        sql.push_str(&format!(" ON DELETE {}", action));
    }
    if let Some(action) = on_update {
        sql.push_str(&format!(" ON UPDATE {}", action));
    }
    sql
}

fn render_column(dialect: Dialect, column: &ColumnDef<'_>) -> String {
    let mut line = format!("{} ", column.name);
    let mut primary_key_done = false;

    if column.auto_increment {
        match dialect.auto_increment_style() {
            AutoIncrementStyle::Serial => {
                let serial = if column.data_type.eq_ignore_ascii_case("bigint") {
                    "BIGSERIAL"
                } else {
                    "SERIAL"
                };
                line.push_str(serial);
            }
            AutoIncrementStyle::AutoIncrement => {
                line.push_str(&map_type(&column.data_type, dialect));
                line.push_str(" AUTO_INCREMENT");
            }
            AutoIncrementStyle::RowIdAlias => {
                line.push_str("INTEGER PRIMARY KEY AUTOINCREMENT");
                primary_key_done = true;
            }
            AutoIncrementStyle::Identity => {
                line.push_str(&map_type(&column.data_type, dialect));
                line.push_str(" IDENTITY(1,1)");
            }
            AutoIncrementStyle::SequenceTrigger => line.push_str(&map_type(&column.data_type, dialect)),
            AutoIncrementStyle::GeneratedIdentity => {
                line.push_str(&map_type(&column.data_type, dialect));
                line.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            }
        }
    } else {
        line.push_str(&map_type(&column.data_type, dialect));
    }

    if column.not_null {
        line.push_str(" NOT NULL");
    }
    if column.primary_key && !primary_key_done {
        line.push_str(" PRIMARY KEY");
    }
    for extra in &column.extra {
        line.push(' ');
        line.push_str(extra);
    }
    if let Some(references) = &column.references
        && !dialect.needs_table_level_fk()
    {
        line.push(' ');
        line.push_str(&render_references(dialect, references));
    }
    line
}

fn supports_if_not_exists(dialect: Dialect) -> bool {
    matches!(dialect, Dialect::Postgres | Dialect::MySql | Dialect::Sqlite)
}

fn oracle_identity(table: &str, column: &str) -> [String; 2] {
    let sequence = format!("{}_{}_seq", table, column);
    [
        format!("CREATE SEQUENCE {} START WITH 1 INCREMENT BY 1", sequence),
        format!(
            "CREATE OR REPLACE TRIGGER {}_{}_trg BEFORE INSERT ON {} FOR EACH ROW WHEN (NEW.{} IS NULL) BEGIN SELECT {}.NEXTVAL INTO :NEW.{} FROM DUAL; END;",
            table, column, table, column, sequence, column
        ),
    ]
}

/// Translate a parsed CREATE TABLE. Returns the statement and the extra
/// statements to run after it, in order.
pub fn translate_create_table(table: &CreateTable<'_>, dialect: Dialect) -> (String, Vec<String>) {
    let mut defs = Vec::new();
    let mut relocated = Vec::new();
    let mut extras = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut foreign_keys = Vec::new();

    for item in &table.items {
        match item {
            TableItem::Column(column) => {
                defs.push(format!("    {}", render_column(dialect, column)));
                if column.auto_increment && dialect.auto_increment_style() == AutoIncrementStyle::SequenceTrigger {
                    extras.extend(oracle_identity(table.name, column.name));
                }
                if let Some(references) = &column.references {
                    if dialect.needs_table_level_fk() {
                        relocated.push(format!(
                            "    FOREIGN KEY ({}) {}",
                            column.name,
                            render_references(dialect, references)
                        ));
                    }
                    foreign_keys.push(ForeignKey {
                        table: table.name,
                        column: column.name,
                        nullable: column.nullable(),
                        references,
                    });
                }
            }
            TableItem::ForeignKey {
                name,
                column,
                references,
            } => {
                let constraint = name.map(|n| format!("CONSTRAINT {} ", n)).unwrap_or_default();
                defs.push(format!(
                    "    {}FOREIGN KEY ({}) {}",
                    constraint,
                    column,
                    render_references(dialect, references)
                ));
                let nullable = table.column(column).is_none_or(|c| c.nullable());
                foreign_keys.push(ForeignKey {
                    table: table.name,
                    column: *column,
                    nullable,
                    references,
                });
            }
            TableItem::Constraint(raw) => defs.push(format!("    {}", raw)),
        }
    }
    defs.extend(relocated);

    if dialect.synthesizes_fk_triggers() {
        for fk in &foreign_keys {
            let key = (fk.table.to_ascii_lowercase(), fk.column.to_ascii_lowercase());
            if !seen.insert(key) {
                tracing::debug!("Skipping duplicate foreign key on {}.{}", fk.table, fk.column);
                continue;
            }
            extras.extend(fk.triggers());
        }
    }

    let if_not_exists = if table.if_not_exists && supports_if_not_exists(dialect) {
        "IF NOT EXISTS "
    } else {
        ""
    };
    let mut sql = format!(
        "CREATE TABLE {}{} (\n{}\n)",
        if_not_exists,
        table.name,
        defs.join(",\n")
    );
    let suffix = table.suffix.trim();
    if !suffix.is_empty() {
        sql.push(' ');
        sql.push_str(suffix);
    }
    (sql, extras)
}

/// Translate CREATE TABLE text; anything else passes through with no extras.
pub fn rewrite_create_table(sql: &str, dialect: Dialect) -> (String, Vec<String>) {
    match parser::parse_create_table(sql) {
        Some(table) => {
            let (statement, extras) = translate_create_table(&table, dialect);
            tracing::debug!(
                "Translated CREATE TABLE {} for {} with {} extra statements",
                table.name,
                dialect,
                extras.len()
            );
            (statement, extras)
        }
        None => {
            let looks_like_ddl = sql
                .split_whitespace()
                .take(2)
                .map(|w| w.to_ascii_uppercase())
                .eq(["CREATE".to_string(), "TABLE".to_string()]);
            if looks_like_ddl {
                tracing::warn!("Unsupported CREATE TABLE passed through unchanged: {}", sql);
            }
            (sql.to_string(), Vec::new())
        }
    }
}
