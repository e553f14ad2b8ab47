pub mod cli;
pub mod config;
pub mod model;
pub mod schema;
pub mod store;

pub use cli::{Cli, Commands};
pub use schema::{Schema, SchemaError};
pub use store::{Store, StoreError};
