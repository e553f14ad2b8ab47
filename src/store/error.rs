//! Write-time failures reported by the store.

use rusqlite::ffi;
use std::path::PathBuf;
use thiserror::Error;

use crate::schema::{ConstraintKind, Schema};

/// Any failure of a [`super::Store`] operation
#[derive(Debug, Error)]
#[rustfmt::skip]
pub enum StoreError {
    // --------
    // --- Integrity violations raised by the engine
    // --------

    /// A non-negative check failed.
    #[error("value rejected by constraint `{constraint}`")]
    ConstraintViolation {
        /// The constraint name, e.g. `check_winner_id`.
        constraint: String,
    },
    /// A value outside a closed enumeration.
    #[error("`{table}.{column}` must be one of the values allowed by `{constraint}`")]
    EnumViolation {
        constraint: String,
        table: String,
        column: String,
    },
    /// A duplicate primary key.
    #[error("duplicate key in `{table}` on ({})", .columns.join(", "))]
    UniquenessViolation {
        table: String,
        columns: Vec<String>,
    },
    /// A reference to a missing row, or a delete of a row still referenced.
    #[error("foreign key violated while writing `{table}`")]
    ReferentialViolation {
        table: String,
    },
    /// A value of the wrong storage class for its column.
    #[error("`{table}.{column}` can't hold that kind of value")]
    DatatypeViolation {
        table: String,
        column: String,
    },
    /// A required column was left empty.
    #[error("`{table}.{column}` is required")]
    NullViolation {
        table: String,
        column: String,
    },

    // --------
    // --- Misuse of the store
    // --------

    /// A write through a derived, read-only relationship.
    #[error("`{table}.{relationship}` is a read-only view")]
    ViewOnly {
        table: String,
        relationship: String,
    },
    /// The relationship kind can't be written through.
    #[error("`{table}.{relationship}` can't be attached or detached")]
    NotWritable {
        table: String,
        relationship: String,
    },
    #[error("unknown table `{0}`")]
    UnknownTable(String),
    #[error("unknown column `{table}.{column}`")]
    UnknownColumn {
        table: String,
        column: String,
    },
    #[error("unknown relationship `{table}.{relationship}`")]
    UnknownRelationship {
        table: String,
        relationship: String,
    },
    /// The key doesn't have one value per primary key column.
    #[error("key for `{table}` needs {expected} value(s), got {got}")]
    KeyArity {
        table: String,
        expected: usize,
        got: usize,
    },
    /// The requested row type doesn't belong to the relationship's target.
    #[error("`{relationship}` yields `{expected}` rows, not `{found}`")]
    TypeMismatch {
        relationship: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("database {0:?} already exists")]
    AlreadyExists(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Any other engine error.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Whether this is one of the integrity violations rather than misuse or
    /// an engine failure
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            StoreError::ConstraintViolation { .. }
                | StoreError::EnumViolation { .. }
                | StoreError::UniquenessViolation { .. }
                | StoreError::ReferentialViolation { .. }
                | StoreError::NullViolation { .. }
                | StoreError::DatatypeViolation { .. }
        )
    }
}

/// Map an engine error raised while writing `table` onto [`StoreError`]
pub fn classify(schema: &Schema, table: &str, err: rusqlite::Error) -> StoreError {
    let (code, message) = match err {
        rusqlite::Error::SqliteFailure(ref e, ref msg)
            if e.code == ffi::ErrorCode::ConstraintViolation =>
        {
            (e.extended_code, msg.clone().unwrap_or_default())
        }
        other => return StoreError::Sqlite(other),
    };

    match code {
        ffi::SQLITE_CONSTRAINT_CHECK => {
            let constraint = message
                .strip_prefix("CHECK constraint failed: ")
                .unwrap_or(&message)
                .to_string();
            match schema.constraint_kind(&constraint) {
                Some(ConstraintKind::Enum { table, column }) => StoreError::EnumViolation {
                    constraint,
                    table: table.to_string(),
                    column: column.to_string(),
                },
                _ => StoreError::ConstraintViolation { constraint },
            }
        }
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
            // "UNIQUE constraint failed: players.id, players.match_id"
            let columns = message
                .strip_prefix("UNIQUE constraint failed: ")
                .unwrap_or("")
                .split(", ")
                .filter(|c| !c.is_empty())
                .map(|c| c.rsplit('.').next().unwrap_or(c).to_string())
                .collect();
            StoreError::UniquenessViolation {
                table: table.to_string(),
                columns,
            }
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StoreError::ReferentialViolation {
            table: table.to_string(),
        },
        // ON DELETE RESTRICT fires as a trigger
        ffi::SQLITE_CONSTRAINT_TRIGGER if message == "FOREIGN KEY constraint failed" => {
            StoreError::ReferentialViolation {
                table: table.to_string(),
            }
        }
        ffi::SQLITE_CONSTRAINT_DATATYPE => {
            // "cannot store TEXT value in INTEGER column players.id"
            let qualified = message.rsplit(' ').next().unwrap_or("");
            let (table, column) = qualified.split_once('.').unwrap_or((table, qualified));
            StoreError::DatatypeViolation {
                table: table.to_string(),
                column: column.to_string(),
            }
        }
        ffi::SQLITE_CONSTRAINT_NOTNULL => {
            // "NOT NULL constraint failed: cos.name"
            let qualified = message
                .strip_prefix("NOT NULL constraint failed: ")
                .unwrap_or("");
            let (table, column) = qualified.split_once('.').unwrap_or((table, qualified));
            StoreError::NullViolation {
                table: table.to_string(),
                column: column.to_string(),
            }
        }
        _ => StoreError::Sqlite(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint_error(extended_code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(extended_code), Some(message.to_string()))
    }

    #[test]
    fn test_classify_named_checks() {
        let schema = Schema::standard().unwrap();

        let err = classify(
            &schema,
            "matches",
            constraint_error(ffi::SQLITE_CONSTRAINT_CHECK, "CHECK constraint failed: mode_enum"),
        );
        assert!(matches!(err, StoreError::EnumViolation { ref column, .. } if column == "mode"));

        let err = classify(
            &schema,
            "matches",
            constraint_error(
                ffi::SQLITE_CONSTRAINT_CHECK,
                "CHECK constraint failed: check_winner_id",
            ),
        );
        assert!(
            matches!(err, StoreError::ConstraintViolation { ref constraint } if constraint == "check_winner_id")
        );
    }

    #[test]
    fn test_classify_composite_key() {
        let schema = Schema::standard().unwrap();
        let err = classify(
            &schema,
            "players",
            constraint_error(
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
                "UNIQUE constraint failed: players.id, players.match_id",
            ),
        );
        match err {
            StoreError::UniquenessViolation { table, columns } => {
                assert_eq!(table, "players");
                assert_eq!(columns, vec!["id", "match_id"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_not_null() {
        let schema = Schema::standard().unwrap();
        let err = classify(
            &schema,
            "cos",
            constraint_error(ffi::SQLITE_CONSTRAINT_NOTNULL, "NOT NULL constraint failed: cos.name"),
        );
        assert!(err.is_integrity_violation());
        assert!(matches!(err, StoreError::NullViolation { ref column, .. } if column == "name"));
    }

    #[test]
    fn test_classify_restricted_delete() {
        let schema = Schema::standard().unwrap();
        let err = classify(
            &schema,
            "maps",
            constraint_error(ffi::SQLITE_CONSTRAINT_TRIGGER, "FOREIGN KEY constraint failed"),
        );
        assert!(matches!(err, StoreError::ReferentialViolation { ref table } if table == "maps"));

        // Any other trigger failure is left alone
        let err = classify(
            &schema,
            "maps",
            constraint_error(ffi::SQLITE_CONSTRAINT_TRIGGER, "raised by a trigger"),
        );
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn test_classify_datatype() {
        let schema = Schema::standard().unwrap();
        let err = classify(
            &schema,
            "players",
            constraint_error(
                ffi::SQLITE_CONSTRAINT_DATATYPE,
                "cannot store TEXT value in INTEGER column players.id",
            ),
        );
        assert!(err.is_integrity_violation());
        match err {
            StoreError::DatatypeViolation { table, column } => {
                assert_eq!(table, "players");
                assert_eq!(column, "id");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_domain_check() {
        let schema = Schema::standard().unwrap();
        let err = classify(
            &schema,
            "matches",
            constraint_error(ffi::SQLITE_CONSTRAINT_CHECK, "CHECK constraint failed: check_fow"),
        );
        assert!(matches!(err, StoreError::ConstraintViolation { ref constraint } if constraint == "check_fow"));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let schema = Schema::standard().unwrap();
        let err = classify(&schema, "users", rusqlite::Error::InvalidQuery);
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert!(!err.is_integrity_violation());
    }
}
