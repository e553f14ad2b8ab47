use serde::Serialize;
use std::collections::HashSet;

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Text,
    Boolean,
    /// UTC timestamp
    Timestamp,
    /// Closed set of text values
    Enum(&'static EnumType),
}

impl ColumnType {
    /// Predicate for values a STRICT column type still lets through, named
    /// like any other column check. NULL passes; `NOT NULL` covers required
    /// columns.
    pub fn domain_predicate(&self, column: &str) -> Option<String> {
        match self {
            ColumnType::Boolean => Some(format!("{column} IN (0, 1)")),
            ColumnType::Timestamp => Some(format!(
                "{column} IS NULL OR ({column} GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]*' \
                 AND datetime({column}) IS NOT NULL)"
            )),
            _ => None,
        }
    }
}

/// Name of the CHECK constraint guarding a column
pub fn check_name(column: &str) -> String {
    format!("check_{}", column)
}

/// A named, closed enumeration of allowed text values
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct EnumType {
    /// Constraint name used for the generated CHECK
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

impl EnumType {
    pub fn contains(&self, value: &str) -> bool {
        self.variants.contains(&value)
    }
}

/// Value constraint attached to a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// `column >= 0`
    NonNegative,
}

impl Check {
    /// Deterministic constraint name for a column
    pub fn name(&self, column: &str) -> String {
        match self {
            Check::NonNegative => check_name(column),
        }
    }

    /// SQL predicate for a column
    pub fn predicate(&self, column: &str) -> String {
        match self {
            Check::NonNegative => format!("{} >= 0", column),
        }
    }
}

/// Column definition
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
    /// Server-generated, strictly increasing key
    pub auto_increment: bool,
    pub check: Option<Check>,
}

impl Column {
    /// Create an optional (nullable) column
    pub const fn new(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
            auto_increment: false,
            check: None,
        }
    }

    /// Create a required (non-nullable) column
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
            auto_increment: false,
            check: None,
        }
    }

    /// Create a required column restricted to the values of `enum_type`
    pub const fn enumeration(name: &'static str, enum_type: &'static EnumType) -> Self {
        Self::required(name, ColumnType::Enum(enum_type))
    }

    pub const fn auto_increment(self) -> Self {
        Self {
            auto_increment: true,
            ..self
        }
    }

    pub const fn check(self, check: Check) -> Self {
        Self {
            check: Some(check),
            ..self
        }
    }
}

/// What the engine does to referencing rows when the referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    /// Reject the delete while referencing rows exist
    Restrict,
    /// Delete the referencing rows too
    Cascade,
}

impl OnDelete {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Restrict => "RESTRICT",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

/// Foreign key reference
#[derive(Debug, Clone, Serialize)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
    pub on_delete: OnDelete,
}

impl ForeignKey {
    /// Non-cascading reference to `references_table(id)`
    pub const fn new(column: &'static str, references_table: &'static str) -> Self {
        Self {
            column,
            references_table,
            references_column: "id",
            on_delete: OnDelete::Restrict,
        }
    }

    pub const fn on_delete(self, on_delete: OnDelete) -> Self {
        Self { on_delete, ..self }
    }
}

/// Shape of a relationship between two tables
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKind {
    /// Many-to-one: this table holds `column`, a foreign key to the target
    BelongsTo { column: &'static str },
    /// One-to-many where the target rows outlive their parent
    HasMany,
    /// One-to-many where the target rows are deleted with their parent
    /// or when removed from its collection
    OwnsMany,
    /// Many-to-many routed through a junction table
    Through {
        junction: &'static str,
        /// Junction column referencing this table
        local_column: &'static str,
        /// Junction column referencing the target table
        remote_column: &'static str,
    },
}

/// Relationship declaration on a table
#[derive(Debug, Clone, Serialize)]
pub struct Relationship {
    pub name: &'static str,
    pub target: &'static str,
    pub kind: RelationKind,
    /// Name of the matching relationship declared on the target
    pub inverse: Option<&'static str>,
    /// Derived view; never written through
    pub view_only: bool,
}

impl Relationship {
    pub const fn belongs_to(name: &'static str, target: &'static str, column: &'static str) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::BelongsTo { column },
            inverse: None,
            view_only: false,
        }
    }

    pub const fn through(
        name: &'static str,
        target: &'static str,
        junction: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::Through {
                junction,
                local_column,
                remote_column,
            },
            inverse: None,
            view_only: false,
        }
    }

    pub const fn with_inverse(self, inverse: &'static str) -> Self {
        Self {
            inverse: Some(inverse),
            ..self
        }
    }

    pub const fn view_only(self) -> Self {
        Self {
            view_only: true,
            ..self
        }
    }

    /// Whether deleting the owner (or detaching a row) deletes the target rows
    pub fn is_owning(&self) -> bool {
        matches!(self.kind, RelationKind::OwnsMany)
    }
}

/// Table schema definition
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// Primary key columns, in key order
    pub primary_key: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
    pub relationships: &'static [Relationship],
}

impl TableSchema {
    /// Get all tables this table depends on (FK parents)
    pub fn dependencies(&self) -> HashSet<&'static str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.references_table)
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&'static Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Foreign key held by `column`
    pub fn foreign_key(&self, column: &str) -> Option<&'static ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// Foreign keys in this table that point at `table`
    pub fn foreign_keys_to<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'static ForeignKey> + 'a {
        self.foreign_keys
            .iter()
            .filter(move |fk| fk.references_table == table)
    }

    /// Whether the primary key spans more than one column
    pub fn has_composite_key(&self) -> bool {
        self.primary_key.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_naming() {
        assert_eq!(Check::NonNegative.name("winner_id"), "check_winner_id");
        assert_eq!(Check::NonNegative.predicate("winner_id"), "winner_id >= 0");
    }

    #[test]
    fn test_domain_predicates() {
        assert_eq!(
            ColumnType::Boolean.domain_predicate("fow").as_deref(),
            Some("fow IN (0, 1)")
        );
        assert!(ColumnType::Timestamp
            .domain_predicate("ended")
            .unwrap()
            .contains("datetime(ended) IS NOT NULL"));
        assert_eq!(ColumnType::Integer.domain_predicate("elo"), None);
        assert_eq!(ColumnType::Text.domain_predicate("name"), None);
    }

    #[test]
    fn test_foreign_key_defaults_to_restrict() {
        let fk = ForeignKey::new("map_id", "maps");
        assert_eq!(fk.on_delete, OnDelete::Restrict);
        assert_eq!(fk.references_column, "id");
    }
}
