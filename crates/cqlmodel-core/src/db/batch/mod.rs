//! Grouped write execution.
//!
//! A `BatchQuery` is a shared handle: query sets and DML queries bound to it
//! append their writes instead of executing them. `execute` renumbers every
//! pending statement into one placeholder space and sends one command.
#[cfg(test)]
mod tests;

use crate::{
    db::{
        executor::{AsyncExecutor, Consistency},
        session::Session,
        statement::{Context, Statement},
    },
    error::{ConfigurationError, Error},
    value::epoch_millis,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::{fmt, sync::Arc};
use time::OffsetDateTime;
use tracing::{instrument, trace, warn};

///
/// BatchType
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    #[default]
    Logged,
    Unlogged,
    Counter,
}

impl BatchType {
    /// Keyword placed between `BEGIN` and `BATCH`, if any.
    #[must_use]
    pub const fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Logged => None,
            Self::Unlogged => Some("UNLOGGED"),
            Self::Counter => Some("COUNTER"),
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword().unwrap_or("LOGGED"))
    }
}

///
/// Pending
///
/// Queue shared by every clone of one batch. `in_flight` is set while an
/// asynchronous command holds the statements it took.
///

#[derive(Debug, Default)]
struct Pending {
    statements: Vec<Statement>,
    in_flight: bool,
}

///
/// InFlight
///
/// Statements taken out of the queue for one asynchronous command.
/// Unless committed they go back to the front of the queue on drop, so a
/// failed or cancelled send loses nothing.
///

struct InFlight {
    pending: Arc<Mutex<Pending>>,
    statements: Option<Vec<Statement>>,
}

impl InFlight {
    fn commit(mut self) {
        self.statements = None;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if let Some(statements) = self.statements.take() {
            pending.statements.splice(0..0, statements);
        }
        pending.in_flight = false;
    }
}

///
/// BatchQuery
///
/// Pending writes plus the options of the grouped command. Clones share
/// the pending list; the list is cleared only after a successful execute.
///

#[derive(Clone, Debug)]
pub struct BatchQuery {
    session: Session,
    batch_type: BatchType,
    timestamp: Option<i64>,
    consistency: Option<Consistency>,
    execute_on_exception: bool,
    pending: Arc<Mutex<Pending>>,
}

impl BatchQuery {
    #[must_use]
    pub fn new(session: Session, batch_type: BatchType) -> Self {
        Self {
            session,
            batch_type,
            timestamp: None,
            consistency: None,
            execute_on_exception: false,
            pending: Arc::default(),
        }
    }

    /// Shared write timestamp, rendered as epoch milliseconds.
    #[must_use]
    pub fn timestamp(mut self, at: OffsetDateTime) -> Self {
        self.timestamp = Some(epoch_millis(at));
        self
    }

    #[must_use]
    pub const fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    /// Execute from `run` even when the scope fails.
    #[must_use]
    pub const fn execute_on_exception(mut self) -> Self {
        self.execute_on_exception = true;
        self
    }

    #[must_use]
    pub const fn batch_type(&self) -> BatchType {
        self.batch_type
    }

    /// Queue a write. Selects are rejected; empty writes are dropped.
    pub fn add(&self, statement: impl Into<Statement>) -> Result<(), Error> {
        let statement = statement.into();
        if !statement.is_write() {
            return Err(ConfigurationError::SelectInBatch.into());
        }
        if statement.is_empty() {
            return Ok(());
        }

        self.pending.lock().statements.push(statement);

        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().statements.is_empty()
    }

    /// Rendered text of every pending statement, in queue order.
    #[must_use]
    pub fn pending_text(&self) -> Vec<String> {
        self.pending
            .lock()
            .statements
            .iter()
            .map(|s| s.text().to_string())
            .collect()
    }

    ///
    /// EXECUTION
    ///

    /// Send all pending writes as one command. No-op when empty.
    #[instrument(
        name = "cqlmodel::batch::execute",
        level = "debug",
        skip(self),
        fields(batch_type = %self.batch_type)
    )]
    pub fn execute(&self) -> Result<(), Error> {
        let mut pending = self.pending.lock();
        if pending.in_flight {
            return Err(ConfigurationError::BatchInFlight.into());
        }
        if pending.statements.is_empty() {
            return Ok(());
        }

        let (text, context) = self.render(&mut pending.statements);
        self.session.execute_raw(&text, &context, self.consistency)?;
        pending.statements.clear();

        Ok(())
    }

    /// Asynchronous `execute`. The pending statements are taken out of the
    /// queue before the await; writes queued while the command is in flight
    /// stay pending, and a second execute fails until it completes.
    #[instrument(
        name = "cqlmodel::batch::execute_async",
        level = "debug",
        skip(self, executor),
        fields(batch_type = %self.batch_type)
    )]
    pub async fn execute_async<X: AsyncExecutor>(&self, executor: &X) -> Result<(), Error> {
        let (text, context, flight) = {
            let mut pending = self.pending.lock();
            if pending.in_flight {
                return Err(ConfigurationError::BatchInFlight.into());
            }
            if pending.statements.is_empty() {
                return Ok(());
            }

            let mut statements = std::mem::take(&mut pending.statements);
            let (text, context) = self.render(&mut statements);
            pending.in_flight = true;

            let flight = InFlight {
                pending: Arc::clone(&self.pending),
                statements: Some(statements),
            };

            (text, context, flight)
        };

        self.session
            .execute_raw_async(executor, &text, &context, self.consistency)
            .await?;
        flight.commit();

        Ok(())
    }

    /// Run `scope` with this batch, then execute it. When the scope fails
    /// the batch executes only if `execute_on_exception` was set.
    pub fn run<T, E>(&self, scope: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<Error>,
    {
        match scope(self) {
            Ok(value) => {
                self.execute()?;
                Ok(value)
            }
            Err(err) => {
                if self.execute_on_exception {
                    self.execute()?;
                } else {
                    warn!(
                        pending = self.len(),
                        "batch scope failed, pending statements not executed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Renumber statements into one id space and join their text.
    fn render(&self, statements: &mut [Statement]) -> (String, Context) {
        let mut opener = String::from("BEGIN ");
        if let Some(keyword) = self.batch_type.keyword() {
            opener.push_str(keyword);
            opener.push(' ');
        }
        opener.push_str("BATCH");
        if let Some(timestamp) = self.timestamp {
            opener.push_str(&format!(" USING TIMESTAMP {timestamp}"));
        }

        let mut lines = vec![opener];
        let mut context = Context::new();
        let mut offset = 0;
        for statement in statements.iter_mut() {
            trace!(offset, size = statement.context_size(), "rebase statement");
            statement.rebase(offset);
            offset += statement.context_size();

            lines.push(format!("  {}", statement.text()));
            context.merge(statement.context().clone());
        }
        lines.push("APPLY BATCH;".to_string());

        (lines.join("\n"), context)
    }
}
