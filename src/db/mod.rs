//! Database module: entity models and SQL repositories.
//!
//! - `model`: typed entities returned by repositories.
//! - `repo`: SQL-only functions for profiles, the poll cursor and the
//!   processed-update set.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{CreateOutcome, Profile};
