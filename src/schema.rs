//! Relationship and column metadata.
//!
//! The join compiler and clause builders read metadata through the
//! [`SchemaSource`] trait. [`Schema`] is the in-memory implementation, loaded
//! from a TOML or JSON file:
//!
//! ```toml
//! [[tables]]
//! name = "users"
//! columns = [
//!     { name = "id", type = "integer", primary_key = true },
//!     { name = "name", type = "string" },
//! ]
//!
//! [[relationships]]
//! local_table = "orders"
//! local_column = "customer_id"
//! related_table = "users"
//! related_column = "id"
//! kind = "many_to_one"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{SqlportError, SqlportResult};

/// Cardinality of a relationship seen from its local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationshipKind {
    /// Whether following this relationship can multiply base rows.
    pub fn is_to_many(&self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    pub fn inverse(&self) -> Self {
        match self {
            Self::OneToOne => Self::OneToOne,
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToOne => Self::OneToMany,
            Self::ManyToMany => Self::ManyToMany,
        }
    }
}

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    Restrict,
    #[default]
    NoAction,
    SetNull,
    Cascade,
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
            Self::SetNull => "SET NULL",
            Self::Cascade => "CASCADE",
        })
    }
}

impl FromStr for ReferentialAction {
    type Err = SqlportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().replace('_', " ").as_str() {
            "RESTRICT" => Ok(Self::Restrict),
            "NO ACTION" => Ok(Self::NoAction),
            "SET NULL" => Ok(Self::SetNull),
            "CASCADE" => Ok(Self::Cascade),
            _ => Err(SqlportError::Config(format!(
                "Unknown referential action '{}'",
                s
            ))),
        }
    }
}

/// One directed relationship between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub local_table: String,
    pub local_column: String,
    pub related_table: String,
    pub related_column: String,
    /// Distinguishes several relationships between the same pair of tables.
    /// Empty means the related table's name.
    #[serde(rename = "route", default)]
    pub route_name: String,
    pub kind: RelationshipKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<String>,
    /// Join-table column pointing at the local table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_column: Option<String>,
    /// Join-table column pointing at the related table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_related_column: Option<String>,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
}

impl Relationship {
    fn new(
        kind: RelationshipKind,
        local_table: &str,
        local_column: &str,
        related_table: &str,
        related_column: &str,
    ) -> Self {
        Self {
            local_table: local_table.to_string(),
            local_column: local_column.to_string(),
            related_table: related_table.to_string(),
            related_column: related_column.to_string(),
            route_name: String::new(),
            kind,
            join_table: None,
            join_column: None,
            join_related_column: None,
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    /// `local_table.local_column` references `related_table.related_column`.
    pub fn many_to_one(
        local_table: &str,
        local_column: &str,
        related_table: &str,
        related_column: &str,
    ) -> Self {
        Self::new(
            RelationshipKind::ManyToOne,
            local_table,
            local_column,
            related_table,
            related_column,
        )
    }

    /// `related_table.related_column` references `local_table.local_column`.
    pub fn one_to_many(
        local_table: &str,
        local_column: &str,
        related_table: &str,
        related_column: &str,
    ) -> Self {
        Self::new(
            RelationshipKind::OneToMany,
            local_table,
            local_column,
            related_table,
            related_column,
        )
    }

    pub fn one_to_one(
        local_table: &str,
        local_column: &str,
        related_table: &str,
        related_column: &str,
    ) -> Self {
        Self::new(
            RelationshipKind::OneToOne,
            local_table,
            local_column,
            related_table,
            related_column,
        )
    }

    /// Link through `join_table(join_column -> local, join_related_column -> related)`.
    pub fn many_to_many(
        local_table: &str,
        local_column: &str,
        related_table: &str,
        related_column: &str,
        join_table: &str,
        join_column: &str,
        join_related_column: &str,
    ) -> Self {
        Self {
            join_table: Some(join_table.to_string()),
            join_column: Some(join_column.to_string()),
            join_related_column: Some(join_related_column.to_string()),
            ..Self::new(
                RelationshipKind::ManyToMany,
                local_table,
                local_column,
                related_table,
                related_column,
            )
        }
    }

    pub fn with_route(mut self, route: &str) -> Self {
        self.route_name = route.to_string();
        self
    }

    pub fn with_on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn with_on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }

    /// Route name, falling back to the related table.
    pub fn route_key(&self) -> &str {
        if self.route_name.is_empty() {
            &self.related_table
        } else {
            &self.route_name
        }
    }

    /// The same relationship seen from the related table.
    pub fn inverse(&self) -> Self {
        Self {
            local_table: self.related_table.clone(),
            local_column: self.related_column.clone(),
            related_table: self.local_table.clone(),
            related_column: self.local_column.clone(),
            route_name: self.route_name.clone(),
            kind: self.kind.inverse(),
            join_table: self.join_table.clone(),
            join_column: self.join_related_column.clone(),
            join_related_column: self.join_column.clone(),
            on_delete: self.on_delete,
            on_update: self.on_update,
        }
    }

    /// Join-table details of a many-to-many relationship.
    pub fn link(&self) -> SqlportResult<(&str, &str, &str)> {
        match (&self.join_table, &self.join_column, &self.join_related_column) {
            (Some(table), Some(column), Some(related)) => {
                Ok((table.as_str(), column.as_str(), related.as_str()))
            }
            _ => Err(SqlportError::InvalidRelationship {
                table: self.local_table.clone(),
                route: self.route_key().to_string(),
                message: "many-to-many relationship needs join_table, join_column and join_related_column".to_string(),
            }),
        }
    }
}

/// Declared type of a column, as far as value coercion cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Blob,
    Boolean,
    Date,
    Float,
    Integer,
    String,
    Text,
    Time,
    Timestamp,
}

impl ColumnType {
    /// Columns compared case-insensitively when sorting.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Text)
    }

    /// Classify a native SQL type name such as `varchar(40)` or `bigint`.
    pub fn from_sql_type(sql_type: &str) -> Option<Self> {
        let base = sql_type
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()?
            .to_ascii_lowercase();
        let ty = match base.as_str() {
            "blob" | "bytea" | "binary" | "varbinary" | "longblob" | "image" => Self::Blob,
            "bool" | "boolean" | "bit" => Self::Boolean,
            "date" => Self::Date,
            "float" | "double" | "real" | "decimal" | "numeric" | "number" | "money" => {
                Self::Float
            }
            "int" | "integer" | "smallint" | "bigint" | "tinyint" | "mediumint" | "serial"
            | "bigserial" => Self::Integer,
            "char" | "varchar" | "nchar" | "nvarchar" | "varchar2" | "nvarchar2" | "string" => {
                Self::String
            }
            "text" | "ntext" | "clob" | "longtext" | "mediumtext" | "tinytext" => Self::Text,
            "time" => Self::Time,
            "timestamp" | "datetime" | "datetime2" | "timestamptz" => Self::Timestamp,
            _ => return None,
        };
        Some(ty)
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnInfo {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: true,
            primary_key: false,
        }
    }

    pub fn primary(name: &str, column_type: ColumnType) -> Self {
        Self {
            nullable: false,
            primary_key: true,
            ..Self::new(name, column_type)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Primary,
    Foreign,
    Unique,
}

/// Metadata provider consumed by the join compiler and clause builders.
pub trait SchemaSource {
    /// All relationships from `table` to `related`, keyed by route name.
    fn routes(&self, table: &str, related: &str) -> SqlportResult<BTreeMap<String, Relationship>>;

    /// Key columns of `table`.
    fn keys(&self, table: &str, kind: KeyKind) -> SqlportResult<Vec<String>>;

    /// Columns of `table` in declaration order. Empty for unknown tables.
    fn column_info(&self, table: &str) -> SqlportResult<Vec<ColumnInfo>>;

    /// Resolve one relationship from `table` to `related`.
    ///
    /// A named route must exist. Without a name the pair must be unambiguous
    /// after applying the optional kind filter.
    fn route(
        &self,
        table: &str,
        related: &str,
        route: Option<&str>,
        kinds: Option<&[RelationshipKind]>,
    ) -> SqlportResult<Option<Relationship>> {
        let mut routes = self.routes(table, related)?;
        if let Some(kinds) = kinds {
            routes.retain(|_, r| kinds.contains(&r.kind));
        }

        if let Some(name) = route {
            return match routes.remove(name) {
                Some(r) => Ok(Some(r)),
                None => Err(SqlportError::UnknownRoute {
                    table: table.to_string(),
                    related: related.to_string(),
                    route: name.to_string(),
                }),
            };
        }

        match routes.len() {
            0 => Ok(None),
            1 => Ok(routes.into_values().next()),
            _ => Err(SqlportError::AmbiguousRoute {
                table: table.to_string(),
                related: related.to_string(),
                routes: routes.into_keys().collect(),
            }),
        }
    }

    fn column(&self, table: &str, name: &str) -> SqlportResult<Option<ColumnInfo>> {
        Ok(self
            .column_info(table)?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name)))
    }
}

/// Table definition in a schema file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique: Vec<String>,
}

/// In-memory [`SchemaSource`].
///
/// Relationships are declared once; the reverse direction is derived unless
/// the file declares it explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<TableSchema>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with its columns.
    pub fn table(mut self, name: &str, columns: Vec<ColumnInfo>) -> Self {
        self.tables.push(TableSchema {
            name: name.to_string(),
            columns,
            unique: Vec::new(),
        });
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn from_toml_str(content: &str) -> SqlportResult<Self> {
        let schema: Schema = toml::from_str(content)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json_str(content: &str) -> SqlportResult<Self> {
        let schema: Schema = serde_json::from_str(content)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema file; `.json` files are read as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> SqlportResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let schema = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        tracing::info!(
            "Loaded {} tables and {} relationships from {}",
            schema.tables.len(),
            schema.relationships.len(),
            path.display()
        );
        Ok(schema)
    }

    fn validate(&self) -> SqlportResult<()> {
        for relationship in &self.relationships {
            if relationship.kind == RelationshipKind::ManyToMany {
                relationship.link()?;
            }
        }
        Ok(())
    }

    fn find_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

impl SchemaSource for Schema {
    fn routes(&self, table: &str, related: &str) -> SqlportResult<BTreeMap<String, Relationship>> {
        let mut routes = BTreeMap::new();
        for r in &self.relationships {
            if r.local_table.eq_ignore_ascii_case(table) && r.related_table.eq_ignore_ascii_case(related) {
                routes.insert(r.route_key().to_string(), r.clone());
            }
        }
        for r in &self.relationships {
            if r.local_table.eq_ignore_ascii_case(related) && r.related_table.eq_ignore_ascii_case(table) {
                let inverse = r.inverse();
                routes
                    .entry(inverse.route_key().to_string())
                    .or_insert(inverse);
            }
        }
        Ok(routes)
    }

    fn keys(&self, table: &str, kind: KeyKind) -> SqlportResult<Vec<String>> {
        let keys = match kind {
            KeyKind::Primary => self
                .find_table(table)
                .map(|t| {
                    t.columns
                        .iter()
                        .filter(|c| c.primary_key)
                        .map(|c| c.name.clone())
                        .collect()
                })
                .unwrap_or_default(),
            KeyKind::Unique => self
                .find_table(table)
                .map(|t| t.unique.clone())
                .unwrap_or_default(),
            KeyKind::Foreign => {
                let mut keys: Vec<String> = Vec::new();
                for r in &self.relationships {
                    let column = if r.local_table.eq_ignore_ascii_case(table)
                        && r.kind == RelationshipKind::ManyToOne
                    {
                        &r.local_column
                    } else if r.related_table.eq_ignore_ascii_case(table)
                        && r.kind == RelationshipKind::OneToMany
                    {
                        &r.related_column
                    } else {
                        continue;
                    };
                    if !keys.contains(column) {
                        keys.push(column.clone());
                    }
                }
                keys
            }
        };
        Ok(keys)
    }

    fn column_info(&self, table: &str) -> SqlportResult<Vec<ColumnInfo>> {
        Ok(self
            .find_table(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }
}
