//! Statement compilation and execution.
//!
//! Leaves first: operators and filter functions, clauses and statements,
//! the query-set builder and DML on top, and the batch coordinator that
//! groups writes into one command. `Session` is the only path to the
//! executor.

pub mod batch;
pub mod executor;
pub mod function;
pub mod operator;
pub mod query;
pub mod session;
pub mod statement;

pub use batch::{BatchQuery, BatchType};
pub use executor::{AsyncExecutor, Consistency, Executor, ResultSet};
pub use session::Session;
