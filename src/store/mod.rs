mod error;
pub mod query_gen;
pub mod schema_gen;
mod sqlite;

pub use error::{classify, StoreError};
pub use schema_gen::{generate_create_table, generate_schema};
pub use sqlite::Store;
