//! Core runtime for cqlmodel: table models, values, clauses, statements,
//! query sets, batches, and the execution boundary they compile down to.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::Error;

///
/// CONSTANTS
///

/// Row cap applied to every query set that does not set its own limit.
///
/// Bounds accidental full scans; `limit(None)` lifts it explicitly.
pub const DEFAULT_LIMIT: u32 = 10_000;

/// Keyspace used when neither the table nor the session names one.
pub const DEFAULT_KEYSPACE: &str = "cqlmodel";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No executors, sessions, or statement internals are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::query::{ColumnRef, col},
        model::{ColumnKind, ColumnModel, Instance, Model, ScalarKind, TableModel},
        value::Value,
    };
}
