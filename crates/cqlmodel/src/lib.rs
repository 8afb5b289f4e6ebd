//! ## Crate layout
//! - `core`: table models, values, clauses, statements, query sets,
//!   DML, batches, and the executor boundary.
//!
//! The `prelude` module mirrors the surface used by application code:
//! model vocabulary, the filter builder, and the session entry points.

pub use cqlmodel_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::{DEFAULT_KEYSPACE, DEFAULT_LIMIT, Error, config, db, error, model, value};

///
/// Prelude
/// Everything needed to declare a model and run queries against it.
///

pub mod prelude {
    pub use crate::core::{
        config::SessionConfig,
        db::{
            AsyncExecutor, BatchQuery, BatchType, Consistency, Executor, ResultSet, Session,
            query::{ColumnRef, DmlQuery, NamedTable, QuerySet, Row, col, pk_token},
        },
        error::{Error, ErrorClass},
        model::{
            ClusteringOrder, ColumnKind, ColumnModel, Instance, Model, ScalarKind, TableModel,
        },
        value::Value,
    };
}
