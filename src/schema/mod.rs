pub mod dependencies;
pub mod helpers;
pub mod registry;
pub mod tables;
pub mod types;

pub use dependencies::*;
pub use helpers::*;
pub use registry::*;
pub use tables::*;
pub use types::*;
