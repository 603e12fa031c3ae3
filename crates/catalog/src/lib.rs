//! catalog: static personas, scenarios and checklist objectives for the call trainer

mod types;
pub use types::*;

mod loader;
pub use loader::{load_catalog_dir, load_catalog_file, Catalog};

mod builtin;
pub use builtin::builtin_catalog;

/// Scenario used when none is requested.
pub const DEFAULT_SCENARIO: &str = "price";
