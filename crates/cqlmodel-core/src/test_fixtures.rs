use crate::{
    db::{
        executor::{AsyncExecutor, Consistency, Executor, ResultSet},
        session::Session,
        statement::Context,
    },
    error::{Error, TransportError},
    model::{ClusteringOrder, ColumnKind, ColumnModel, Instance, Model, ScalarKind, TableModel},
};
use parking_lot::Mutex;
use std::{collections::VecDeque, future::Future, sync::Arc};

///
/// MODELS
///

const USER_COLUMNS: &[ColumnModel] = &[
    ColumnModel::scalar("org", ScalarKind::Text).partition_key(),
    ColumnModel::scalar("user_id", ScalarKind::Int)
        .primary_key()
        .clustering(ClusteringOrder::Asc),
    ColumnModel::scalar("email", ScalarKind::Text).indexed(),
    ColumnModel::scalar("name", ScalarKind::Text).db_field("full_name"),
    ColumnModel::scalar("age", ScalarKind::Int),
    ColumnModel::new("tags", ColumnKind::Set(ScalarKind::Text)),
    ColumnModel::new("history", ColumnKind::List(ScalarKind::Int)),
    ColumnModel::new(
        "prefs",
        ColumnKind::Map {
            key: ScalarKind::Text,
            value: ScalarKind::Text,
        },
    ),
    ColumnModel::scalar("created", ScalarKind::Timestamp),
];

pub(crate) const USERS: TableModel = TableModel::new("User", "users", USER_COLUMNS);

const PAGE_VIEW_COLUMNS: &[ColumnModel] = &[
    ColumnModel::scalar("page", ScalarKind::Text).partition_key(),
    ColumnModel::new("views", ColumnKind::Counter),
];

pub(crate) const PAGE_VIEWS: TableModel =
    TableModel::new("PageView", "page_views", PAGE_VIEW_COLUMNS).in_keyspace("analytics");

const EVENT_COLUMNS: &[ColumnModel] = &[
    ColumnModel::scalar("tenant", ScalarKind::Text).partition_key(),
    ColumnModel::scalar("bucket", ScalarKind::Int).partition_key(),
    ColumnModel::scalar("seq", ScalarKind::TimeUuid)
        .primary_key()
        .clustering(ClusteringOrder::Desc),
    ColumnModel::scalar("body", ScalarKind::Text),
];

pub(crate) const EVENTS: TableModel = TableModel::new("Event", "events", EVENT_COLUMNS);

///
/// User
///

#[derive(Debug)]
pub(crate) struct User(pub(crate) Instance);

impl Model for User {
    const TABLE: &'static TableModel = &USERS;

    fn construct_instance(instance: Instance) -> Result<Self, Error> {
        Ok(Self(instance))
    }
}

///
/// PageView
///

#[derive(Debug)]
pub(crate) struct PageView(pub(crate) Instance);

impl Model for PageView {
    const TABLE: &'static TableModel = &PAGE_VIEWS;

    fn construct_instance(instance: Instance) -> Result<Self, Error> {
        Ok(Self(instance))
    }
}

///
/// Event
///

#[derive(Debug)]
pub(crate) struct Event(pub(crate) Instance);

impl Model for Event {
    const TABLE: &'static TableModel = &EVENTS;

    fn construct_instance(instance: Instance) -> Result<Self, Error> {
        Ok(Self(instance))
    }
}

///
/// EXECUTOR
///

///
/// Call
/// One command as the executor received it.
///

#[derive(Clone, Debug)]
pub(crate) struct Call {
    pub(crate) text: String,
    pub(crate) context: Context,
    pub(crate) consistency: Consistency,
}

#[derive(Default)]
struct Recorder {
    calls: Vec<Call>,
    responses: VecDeque<Result<ResultSet, String>>,
}

///
/// RecordingExecutor
///
/// Captures every command and replays queued responses in order.
/// With nothing queued it answers with an empty result set.
///

#[derive(Clone, Default)]
pub(crate) struct RecordingExecutor {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next command.
    pub(crate) fn respond(&self, result: ResultSet) {
        self.inner.lock().responses.push_back(Ok(result));
    }

    /// Make the next command fail with a transport error.
    pub(crate) fn fail(&self, message: &str) {
        self.inner.lock().responses.push_back(Err(message.to_string()));
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.inner.lock().calls.iter().map(|c| c.text.clone()).collect()
    }

    pub(crate) fn last(&self) -> Call {
        self.inner
            .lock()
            .calls
            .last()
            .cloned()
            .expect("executor should have received a command")
    }

    fn record(
        &self,
        text: &str,
        parameters: &Context,
        consistency: Consistency,
    ) -> Result<ResultSet, TransportError> {
        let mut recorder = self.inner.lock();
        recorder.calls.push(Call {
            text: text.to_string(),
            context: parameters.clone(),
            consistency,
        });

        match recorder.responses.pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(TransportError::new(message)),
            None => Ok(ResultSet::empty()),
        }
    }
}

impl Executor for RecordingExecutor {
    fn execute(
        &self,
        text: &str,
        parameters: &Context,
        consistency: Consistency,
    ) -> Result<ResultSet, TransportError> {
        self.record(text, parameters, consistency)
    }
}

impl AsyncExecutor for RecordingExecutor {
    fn execute(
        &self,
        text: &str,
        parameters: &Context,
        consistency: Consistency,
    ) -> impl Future<Output = Result<ResultSet, TransportError>> + Send {
        let result = self.record(text, parameters, consistency);

        async move {
            tokio::task::yield_now().await;
            result
        }
    }
}

/// Session over a fresh recording executor.
pub(crate) fn session() -> (Session, RecordingExecutor) {
    let executor = RecordingExecutor::new();

    (Session::new(executor.clone()), executor)
}

/// Install a test subscriber once; later calls are no-ops.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}
