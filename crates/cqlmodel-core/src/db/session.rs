use crate::{
    config::{ConfigError, SessionConfig},
    db::{
        batch::{BatchQuery, BatchType},
        executor::{AsyncExecutor, Consistency, Executor, ResultSet},
        operator::OperatorRegistry,
        query::{DmlQuery, NamedKeyspace, NamedTable, QuerySet},
        statement::{Context, Statement},
    },
    error::Error,
    model::{Model, TableModel},
};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};

///
/// Session
///
/// Explicit execution context: the executor, per-session defaults, and the
/// operator registry. Cheap to clone; every query set, DML query, and batch
/// carries one instead of reaching for process-wide state.
///

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Clone)]
struct SessionInner {
    executor: Arc<dyn Executor>,
    config: SessionConfig,
    operators: OperatorRegistry,
}

impl Session {
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                executor: Arc::new(executor),
                config: SessionConfig::default(),
                operators: OperatorRegistry::standard(),
            }),
        }
    }

    pub fn with_config(
        executor: impl Executor + 'static,
        config: SessionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut session = Self::new(executor);
        Arc::make_mut(&mut session.inner).config = config;

        Ok(session)
    }

    /// Replace the operator registry used to resolve filter suffixes.
    #[must_use]
    pub fn with_operators(mut self, operators: OperatorRegistry) -> Self {
        Arc::make_mut(&mut self.inner).operators = operators;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn operators(&self) -> &OperatorRegistry {
        &self.inner.operators
    }

    #[must_use]
    pub fn column_family_name(&self, table: &TableModel) -> String {
        table.column_family_name(&self.inner.config.default_keyspace)
    }

    ///
    /// ENTRY POINTS
    ///

    #[must_use]
    pub fn objects<M: Model>(&self) -> QuerySet<M> {
        QuerySet::new(self.clone())
    }

    #[must_use]
    pub fn dml(&self) -> DmlQuery {
        DmlQuery::new(self.clone())
    }

    /// Keyspace addressed by name, for tables without a model.
    #[must_use]
    pub fn keyspace(&self, name: impl Into<String>) -> NamedKeyspace {
        NamedKeyspace::new(self.clone(), name.into())
    }

    /// Table in the default keyspace, addressed by name.
    #[must_use]
    pub fn table(&self, name: impl Into<String>) -> NamedTable {
        NamedTable::new(
            self.clone(),
            self.inner.config.default_keyspace.clone(),
            name.into(),
        )
    }

    #[must_use]
    pub fn batch(&self, batch_type: BatchType) -> BatchQuery {
        BatchQuery::new(self.clone(), batch_type)
    }

    ///
    /// EXECUTION
    ///

    fn consistency(&self, requested: Option<Consistency>) -> Consistency {
        requested.unwrap_or(self.inner.config.consistency)
    }

    /// Render and execute one statement. Empty writes are skipped.
    #[instrument(name = "cqlmodel::session::execute", level = "debug", skip(self, statement))]
    pub fn execute(
        &self,
        statement: &Statement,
        consistency: Option<Consistency>,
    ) -> Result<ResultSet, Error> {
        if statement.is_empty() {
            debug!(table = statement.table(), "skipping empty statement");
            return Ok(ResultSet::empty());
        }

        self.execute_raw(statement.text(), statement.context(), consistency)
    }

    /// Execute already-rendered text; the batch coordinator's entry point.
    pub fn execute_raw(
        &self,
        text: &str,
        parameters: &Context,
        consistency: Option<Consistency>,
    ) -> Result<ResultSet, Error> {
        let consistency = self.consistency(consistency);
        debug!(text, parameters = parameters.len(), %consistency, "execute");

        Ok(self.inner.executor.execute(text, parameters, consistency)?)
    }

    /// Render synchronously, then await the asynchronous collaborator once.
    #[instrument(
        name = "cqlmodel::session::execute_async",
        level = "debug",
        skip(self, executor, statement)
    )]
    pub async fn execute_async<X: AsyncExecutor>(
        &self,
        executor: &X,
        statement: &Statement,
        consistency: Option<Consistency>,
    ) -> Result<ResultSet, Error> {
        if statement.is_empty() {
            debug!(table = statement.table(), "skipping empty statement");
            return Ok(ResultSet::empty());
        }

        self.execute_raw_async(executor, statement.text(), statement.context(), consistency)
            .await
    }

    pub async fn execute_raw_async<X: AsyncExecutor>(
        &self,
        executor: &X,
        text: &str,
        parameters: &Context,
        consistency: Option<Consistency>,
    ) -> Result<ResultSet, Error> {
        let consistency = self.consistency(consistency);
        debug!(text, parameters = parameters.len(), %consistency, "execute async");

        Ok(executor.execute(text, parameters, consistency).await?)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
