//! Reusable column and relationship shapes.
//!
//! Every table in [`super::tables`] builds its keys, checks and ownership
//! links through these constructors so the same policy applies everywhere.

use super::types::*;

/// Integer key generated by the engine, strictly increasing and unique.
///
/// The containing table must list the column as its only primary key column,
/// which [`super::Schema::new`] verifies.
pub const fn auto_primary_key(name: &'static str) -> Column {
    Column::required(name, ColumnType::Integer).auto_increment()
}

/// Required integer column constrained to `name >= 0`.
///
/// The constraint is named `check_<name>`.
pub const fn non_negative(name: &'static str) -> Column {
    Column::required(name, ColumnType::Integer).check(Check::NonNegative)
}

/// One-to-many link whose target rows are not owned by this table.
pub const fn back_reference(
    name: &'static str,
    target: &'static str,
    inverse: &'static str,
) -> Relationship {
    Relationship {
        name,
        target,
        kind: RelationKind::HasMany,
        inverse: Some(inverse),
        view_only: false,
    }
}

/// One-to-many link whose target rows only exist as part of this table's row.
///
/// Deleting the owner, or detaching a child from the collection, deletes the
/// child row.
pub const fn owned_children(
    name: &'static str,
    target: &'static str,
    inverse: &'static str,
) -> Relationship {
    Relationship {
        name,
        target,
        kind: RelationKind::OwnsMany,
        inverse: Some(inverse),
        view_only: false,
    }
}

/// Foreign key to `target(id)` that the engine cascades on delete.
pub const fn cascading_foreign_key(column: &'static str, target: &'static str) -> ForeignKey {
    ForeignKey::new(column, target).on_delete(OnDelete::Cascade)
}
