//! Runtime table descriptors.
//!
//! A model type is described once, statically, by a `TableModel` holding
//! its ordered `ColumnModel`s. Query sets, statements, and DML read these
//! descriptors instead of reflecting over concrete row types.
//!
//! In general:
//! - `column` defines what a single column accepts
//! - `table` defines key layout and naming
//! - `instance` holds one row's values and their previous snapshots

pub mod column;
pub mod instance;
pub mod table;

pub use column::{ClusteringOrder, ColumnKind, ColumnModel, ScalarKind};
pub use instance::{FieldState, Instance};
pub use table::TableModel;

use crate::Error;

///
/// Model
///
/// Typed row bound to a static table descriptor.
/// `construct_instance` is the factory the query layer calls for every
/// materialized row.
///

pub trait Model: Sized {
    const TABLE: &'static TableModel;

    fn construct_instance(instance: Instance) -> Result<Self, Error>;
}
