//! Typed rows for each table

mod entities;
mod value;

pub use entities::*;
pub use value::*;

use crate::schema::TableSchema;

/// A row type bound to one table
pub trait Entity: Sized {
    fn table() -> &'static TableSchema;

    /// Column values to write, in column order. Unset generated keys are omitted.
    fn values(&self) -> Vec<(&'static str, SqlValue)>;

    /// Read a row selected with every column of [`Entity::table`]
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self>;
}
