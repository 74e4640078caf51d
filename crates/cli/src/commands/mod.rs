//! Subcommand implementations.
//!
//! Each command returns a serializable output; `main` prints it as JSON.

pub mod get;
pub mod index;
pub mod stats;
pub mod validate;

pub use get::{GetParams, get_impl};
pub use index::{IndexParams, index_impl};
pub use stats::{StatsParams, stats_impl};
pub use validate::{ValidateParams, validate_impl};
