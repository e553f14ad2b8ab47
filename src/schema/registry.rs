//! Validated, immutable schema graph.
//!
//! A [`Schema`] is assembled once at startup from static [`TableSchema`]
//! definitions. Construction checks that every key, foreign key and
//! relationship refers to something that exists, so the rest of the crate can
//! look things up without re-validating. After that it is read-only and can be
//! shared across threads behind an `Arc`.

use super::dependencies::DependencyResolver;
use super::tables::ALL_TABLES;
use super::types::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Inconsistency in the schema definition itself. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown table `{0}`")]
    UnknownTable(String),
    #[error("table `{0}` is declared more than once")]
    DuplicateTable(String),
    #[error("column `{table}.{column}` is declared more than once")]
    DuplicateColumn { table: String, column: String },
    #[error("table `{0}` has no primary key")]
    MissingPrimaryKey(String),
    #[error("primary key of `{table}` names undeclared column `{column}`")]
    UnknownKeyColumn { table: String, column: String },
    #[error("auto-increment column `{table}.{column}` must be the table's only primary key column")]
    AutoIncrementNotKey { table: String, column: String },
    #[error("foreign key on `{table}` names undeclared column `{column}`")]
    UnknownForeignKeyColumn { table: String, column: String },
    #[error("foreign key `{table}.{column}` references undeclared `{target}`")]
    UnknownReference {
        table: String,
        column: String,
        target: String,
    },
    #[error("check on `{table}.{column}` requires an integer column")]
    InvalidCheck { table: String, column: String },
    #[error("enum column `{table}.{column}` has no variants")]
    EmptyEnum { table: String, column: String },
    #[error("relationship `{table}.{relationship}` targets undeclared table `{target}`")]
    UnknownRelationTarget {
        table: String,
        relationship: String,
        target: String,
    },
    #[error("relationship `{table}.{relationship}` needs a foreign key between `{table}` and `{target}`")]
    MissingRelationKey {
        table: String,
        relationship: String,
        target: String,
    },
    #[error("owned relationship `{table}.{relationship}` requires a non-nullable key on `{target}`")]
    NullableOwnerKey {
        table: String,
        relationship: String,
        target: String,
    },
    #[error("relationship `{table}.{relationship}` routes through invalid junction `{junction}`")]
    InvalidJunction {
        table: String,
        relationship: String,
        junction: String,
    },
    #[error("relationship `{table}.{relationship}` names inverse `{inverse}` which is not declared on `{target}`")]
    MissingInverse {
        table: String,
        relationship: String,
        target: String,
        inverse: String,
    },
    #[error("relationship `{table}.{relationship}` and its inverse `{target}.{inverse}` do not point at each other")]
    InverseMismatch {
        table: String,
        relationship: String,
        target: String,
        inverse: String,
    },
    #[error("circular foreign key dependency at `{0}`")]
    CircularDependency(String),
}

/// What a named constraint enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintKind {
    NonNegative {
        table: &'static str,
        column: &'static str,
    },
    Enum {
        table: &'static str,
        column: &'static str,
    },
    /// Boolean or timestamp shape
    Domain {
        table: &'static str,
        column: &'static str,
    },
}

/// The validated schema graph
#[derive(Debug, Serialize)]
pub struct Schema {
    /// Tables in dependency order
    tables: Vec<&'static TableSchema>,
    #[serde(skip)]
    constraints: HashMap<String, ConstraintKind>,
}

impl Schema {
    /// Validate `tables` and assemble the graph
    pub fn new(tables: &[&'static TableSchema]) -> Result<Self, SchemaError> {
        let mut names = HashSet::new();
        for table in tables {
            if !names.insert(table.name) {
                return Err(SchemaError::DuplicateTable(table.name.to_string()));
            }
        }

        let lookup = |name: &str| tables.iter().find(|t| t.name == name).copied();

        let mut constraints = HashMap::new();
        for table in tables {
            validate_columns(table, &mut constraints)?;
            validate_keys(table, &lookup)?;
            for rel in table.relationships {
                validate_relationship(table, rel, &lookup)?;
            }
        }

        let ordered = DependencyResolver::new(tables).all_tables_ordered()?;

        Ok(Self {
            tables: ordered,
            constraints,
        })
    }

    /// The match tracker's schema
    pub fn standard() -> Result<Self, SchemaError> {
        Self::new(ALL_TABLES)
    }

    /// Tables in dependency order (parents before children)
    pub fn tables(&self) -> &[&'static TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&'static TableSchema> {
        self.tables.iter().find(|t| t.name == name).copied()
    }

    pub fn table_names(&self) -> Vec<&'static str> {
        self.tables.iter().map(|t| t.name).collect()
    }

    /// Requested tables plus everything they reference, in dependency order
    pub fn with_dependencies(&self, requested: &[&str]) -> Result<Vec<&'static TableSchema>, SchemaError> {
        DependencyResolver::new(&self.tables).resolve_includes(requested)
    }

    pub fn relationship(&self, table: &str, name: &str) -> Option<&'static Relationship> {
        self.table(table).and_then(|t| t.relationship(name))
    }

    /// Owning relationships declared on `table`
    pub fn children_of(&self, table: &str) -> Vec<&'static Relationship> {
        self.table(table)
            .map(|t| t.relationships.iter().filter(|r| r.is_owning()).collect())
            .unwrap_or_default()
    }

    /// Resolve a constraint name reported by the engine
    pub fn constraint_kind(&self, name: &str) -> Option<ConstraintKind> {
        self.constraints.get(name).copied()
    }
}

fn validate_columns(
    table: &TableSchema,
    constraints: &mut HashMap<String, ConstraintKind>,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();

    for col in table.columns {
        if !seen.insert(col.name) {
            return Err(SchemaError::DuplicateColumn {
                table: table.name.to_string(),
                column: col.name.to_string(),
            });
        }

        if let Some(check) = col.check {
            if col.col_type != ColumnType::Integer {
                return Err(SchemaError::InvalidCheck {
                    table: table.name.to_string(),
                    column: col.name.to_string(),
                });
            }
            constraints.insert(
                check.name(col.name),
                ConstraintKind::NonNegative {
                    table: table.name,
                    column: col.name,
                },
            );
        }

        if col.col_type.domain_predicate(col.name).is_some() {
            constraints.insert(
                check_name(col.name),
                ConstraintKind::Domain {
                    table: table.name,
                    column: col.name,
                },
            );
        }

        if let ColumnType::Enum(enum_type) = col.col_type {
            if enum_type.variants.is_empty() {
                return Err(SchemaError::EmptyEnum {
                    table: table.name.to_string(),
                    column: col.name.to_string(),
                });
            }
            constraints.insert(
                enum_type.name.to_string(),
                ConstraintKind::Enum {
                    table: table.name,
                    column: col.name,
                },
            );
        }

        if col.auto_increment && table.primary_key != [col.name] {
            return Err(SchemaError::AutoIncrementNotKey {
                table: table.name.to_string(),
                column: col.name.to_string(),
            });
        }
    }

    Ok(())
}

fn validate_keys(
    table: &TableSchema,
    lookup: &impl Fn(&str) -> Option<&'static TableSchema>,
) -> Result<(), SchemaError> {
    if table.primary_key.is_empty() {
        return Err(SchemaError::MissingPrimaryKey(table.name.to_string()));
    }

    for key in table.primary_key {
        if table.column(key).is_none() {
            return Err(SchemaError::UnknownKeyColumn {
                table: table.name.to_string(),
                column: key.to_string(),
            });
        }
    }

    for fk in table.foreign_keys {
        if table.column(fk.column).is_none() {
            return Err(SchemaError::UnknownForeignKeyColumn {
                table: table.name.to_string(),
                column: fk.column.to_string(),
            });
        }

        let target_ok = lookup(fk.references_table)
            .map(|t| t.column(fk.references_column).is_some())
            .unwrap_or(false);
        if !target_ok {
            return Err(SchemaError::UnknownReference {
                table: table.name.to_string(),
                column: fk.column.to_string(),
                target: format!("{}({})", fk.references_table, fk.references_column),
            });
        }
    }

    Ok(())
}

fn validate_relationship(
    table: &TableSchema,
    rel: &Relationship,
    lookup: &impl Fn(&str) -> Option<&'static TableSchema>,
) -> Result<(), SchemaError> {
    let target = lookup(rel.target).ok_or_else(|| SchemaError::UnknownRelationTarget {
        table: table.name.to_string(),
        relationship: rel.name.to_string(),
        target: rel.target.to_string(),
    })?;

    let missing_key = || SchemaError::MissingRelationKey {
        table: table.name.to_string(),
        relationship: rel.name.to_string(),
        target: rel.target.to_string(),
    };

    match rel.kind {
        RelationKind::BelongsTo { column } => {
            let fk = table.foreign_key(column).ok_or_else(missing_key)?;
            if fk.references_table != target.name {
                return Err(missing_key());
            }
        }
        RelationKind::HasMany => {
            target
                .foreign_keys_to(table.name)
                .next()
                .ok_or_else(missing_key)?;
        }
        RelationKind::OwnsMany => {
            let fk = target
                .foreign_keys_to(table.name)
                .next()
                .ok_or_else(missing_key)?;
            let nullable = target.column(fk.column).map(|c| c.nullable).unwrap_or(true);
            if nullable {
                return Err(SchemaError::NullableOwnerKey {
                    table: table.name.to_string(),
                    relationship: rel.name.to_string(),
                    target: target.name.to_string(),
                });
            }
        }
        RelationKind::Through {
            junction,
            local_column,
            remote_column,
        } => {
            let links = lookup(junction)
                .map(|j| {
                    let local = j
                        .foreign_key(local_column)
                        .map(|fk| fk.references_table == table.name);
                    let remote = j
                        .foreign_key(remote_column)
                        .map(|fk| fk.references_table == target.name);
                    local == Some(true) && remote == Some(true)
                })
                .unwrap_or(false);
            if !links {
                return Err(SchemaError::InvalidJunction {
                    table: table.name.to_string(),
                    relationship: rel.name.to_string(),
                    junction: junction.to_string(),
                });
            }
        }
    }

    if let Some(inverse) = rel.inverse {
        let other = target
            .relationship(inverse)
            .ok_or_else(|| SchemaError::MissingInverse {
                table: table.name.to_string(),
                relationship: rel.name.to_string(),
                target: target.name.to_string(),
                inverse: inverse.to_string(),
            })?;

        let points_back =
            other.target == table.name && other.inverse.map_or(true, |name| name == rel.name);
        if !points_back {
            return Err(SchemaError::InverseMismatch {
                table: table.name.to_string(),
                relationship: rel.name.to_string(),
                target: target.name.to_string(),
                inverse: inverse.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::helpers::*;

    #[test]
    fn test_standard_schema_is_valid() {
        let schema = Schema::standard().unwrap();
        assert_eq!(
            schema.table_names(),
            vec!["users", "cos", "maps", "matches", "players", "bans"]
        );
    }

    #[test]
    fn test_constraint_lookup() {
        let schema = Schema::standard().unwrap();
        assert_eq!(
            schema.constraint_kind("check_winner_id"),
            Some(ConstraintKind::NonNegative {
                table: "matches",
                column: "winner_id"
            })
        );
        assert_eq!(
            schema.constraint_kind("mode_enum"),
            Some(ConstraintKind::Enum {
                table: "matches",
                column: "mode"
            })
        );
        assert!(schema.constraint_kind("check_id").is_some());
        assert!(schema.constraint_kind("check_resulting_elo").is_some());
        assert_eq!(
            schema.constraint_kind("check_fow"),
            Some(ConstraintKind::Domain {
                table: "matches",
                column: "fow"
            })
        );
        assert!(schema.constraint_kind("check_ended").is_some());
        assert!(schema.constraint_kind("check_nothing").is_none());
    }

    #[test]
    fn test_children_of_match() {
        let schema = Schema::standard().unwrap();
        let children: Vec<_> = schema.children_of("matches").iter().map(|r| r.name).collect();
        assert_eq!(children, vec!["players"]);
        assert!(schema.children_of("maps").is_empty());
    }

    #[test]
    fn test_schema_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
    }

    static PARENTS: TableSchema = TableSchema {
        name: "parents",
        columns: &[auto_primary_key("id")],
        primary_key: &["id"],
        foreign_keys: &[],
        relationships: &[owned_children("kids", "kids", "parent")],
    };

    static KIDS_WITHOUT_INVERSE: TableSchema = TableSchema {
        name: "kids",
        columns: &[
            auto_primary_key("id"),
            Column::required("parent_id", ColumnType::Integer),
        ],
        primary_key: &["id"],
        foreign_keys: &[ForeignKey::new("parent_id", "parents")],
        relationships: &[],
    };

    static NULLABLE_KIDS: TableSchema = TableSchema {
        name: "kids",
        columns: &[
            auto_primary_key("id"),
            Column::new("parent_id", ColumnType::Integer),
        ],
        primary_key: &["id"],
        foreign_keys: &[ForeignKey::new("parent_id", "parents")],
        relationships: &[Relationship::belongs_to("parent", "parents", "parent_id")
            .with_inverse("kids")],
    };

    static NO_KEY: TableSchema = TableSchema {
        name: "no_key",
        columns: &[Column::new("name", ColumnType::Text)],
        primary_key: &[],
        foreign_keys: &[],
        relationships: &[],
    };

    static AUTO_IN_COMPOSITE: TableSchema = TableSchema {
        name: "auto_in_composite",
        columns: &[
            auto_primary_key("id"),
            Column::required("slot", ColumnType::Integer),
        ],
        primary_key: &["id", "slot"],
        foreign_keys: &[],
        relationships: &[],
    };

    static DANGLING_FK: TableSchema = TableSchema {
        name: "dangling",
        columns: &[auto_primary_key("id"), Column::required("map_id", ColumnType::Integer)],
        primary_key: &["id"],
        foreign_keys: &[ForeignKey::new("map_id", "maps")],
        relationships: &[],
    };

    static TEXT_CHECK: TableSchema = TableSchema {
        name: "text_check",
        columns: &[
            auto_primary_key("id"),
            Column::required("label", ColumnType::Text).check(Check::NonNegative),
        ],
        primary_key: &["id"],
        foreign_keys: &[],
        relationships: &[],
    };

    #[test]
    fn test_missing_inverse_rejected() {
        let err = Schema::new(&[&PARENTS, &KIDS_WITHOUT_INVERSE]).unwrap_err();
        assert!(matches!(err, SchemaError::MissingInverse { .. }), "{err}");
    }

    #[test]
    fn test_nullable_owner_key_rejected() {
        let err = Schema::new(&[&PARENTS, &NULLABLE_KIDS]).unwrap_err();
        assert!(matches!(err, SchemaError::NullableOwnerKey { .. }), "{err}");
    }

    #[test]
    fn test_missing_primary_key_rejected() {
        assert_eq!(
            Schema::new(&[&NO_KEY]).unwrap_err(),
            SchemaError::MissingPrimaryKey("no_key".to_string())
        );
    }

    #[test]
    fn test_auto_increment_must_be_sole_key() {
        let err = Schema::new(&[&AUTO_IN_COMPOSITE]).unwrap_err();
        assert!(matches!(err, SchemaError::AutoIncrementNotKey { .. }), "{err}");
    }

    #[test]
    fn test_dangling_foreign_key_rejected() {
        let err = Schema::new(&[&DANGLING_FK]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownReference { .. }), "{err}");
    }

    #[test]
    fn test_check_on_text_rejected() {
        let err = Schema::new(&[&TEXT_CHECK]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidCheck { .. }), "{err}");
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let err = Schema::new(&[&NO_KEY, &NO_KEY]).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTable("no_key".to_string()));
    }
}
