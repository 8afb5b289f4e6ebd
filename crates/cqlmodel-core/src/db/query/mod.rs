//! Query-set builder and instance persistence.
//!
//! `QuerySet` describes reads and bulk writes against one model; every
//! mutator returns a new query set. `DmlQuery` saves, updates, and deletes
//! a single `Instance` from its tracked deltas. `NamedTable` addresses a
//! table by name alone and returns plain `Row` maps.

mod builder;
mod dml;
mod named;
mod queryset;
mod results;

pub use builder::{ColumnRef, PK_TOKEN, col, pk_token};
pub use dml::DmlQuery;
pub use named::{NamedKeyspace, NamedQuerySet, NamedTable, Row};
pub use queryset::{Projection, QuerySet};
