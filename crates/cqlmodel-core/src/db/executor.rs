use crate::{db::statement::Context, error::TransportError, value::Value};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future};

///
/// Consistency
/// Replica acknowledgement level requested for one command.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    Any,
    #[default]
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Any => "ANY",
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Quorum => "QUORUM",
            Self::All => "ALL",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::EachQuorum => "EACH_QUORUM",
            Self::Serial => "SERIAL",
            Self::LocalSerial => "LOCAL_SERIAL",
            Self::LocalOne => "LOCAL_ONE",
        };
        f.write_str(label)
    }
}

///
/// ResultSet
///
/// Rows returned by one command. `columns` names the stored columns in
/// row order; writes return an empty set.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

///
/// Executor
///
/// Synchronous execution collaborator. Receives rendered text, the
/// parameter map, and a consistency level; failures are returned as an
/// opaque `TransportError` that the core passes through unchanged.
///

pub trait Executor: Send + Sync {
    fn execute(
        &self,
        text: &str,
        parameters: &Context,
        consistency: Consistency,
    ) -> Result<ResultSet, TransportError>;
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn execute(
        &self,
        text: &str,
        parameters: &Context,
        consistency: Consistency,
    ) -> Result<ResultSet, TransportError> {
        (**self).execute(text, parameters, consistency)
    }
}

///
/// AsyncExecutor
///
/// Same contract as `Executor`, resolved through a future. The core awaits
/// it once and does no polling, timeout, or retry of its own.
///

pub trait AsyncExecutor: Send + Sync {
    fn execute(
        &self,
        text: &str,
        parameters: &Context,
        consistency: Consistency,
    ) -> impl Future<Output = Result<ResultSet, TransportError>> + Send;
}
