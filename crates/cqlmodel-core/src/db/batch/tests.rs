use super::*;
use crate::{
    db::{
        executor::ResultSet,
        operator::WhereOperator,
        query::col,
        statement::{AssignmentClause, Context, SelectStatement, UpdateStatement, WhereClause},
    },
    error::{ConfigurationError, QueryError, TransportError},
    model::Instance,
    test_fixtures::{RecordingExecutor, USERS, User, init_tracing, session},
    value::Value,
};
use proptest::prelude::*;
use std::{
    collections::BTreeSet,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use time::macros::datetime;

///
/// GatedExecutor
/// Records commands at once but holds each reply until the gate opens.
///

#[derive(Clone)]
struct GatedExecutor {
    open: Arc<AtomicBool>,
    recorder: RecordingExecutor,
}

impl GatedExecutor {
    fn new(recorder: RecordingExecutor) -> Self {
        Self {
            open: Arc::default(),
            recorder,
        }
    }

    fn open(&self) {
        self.open.store(true, Ordering::Release);
    }
}

impl AsyncExecutor for GatedExecutor {
    fn execute(
        &self,
        text: &str,
        parameters: &Context,
        consistency: Consistency,
    ) -> impl Future<Output = Result<ResultSet, TransportError>> + Send {
        let open = Arc::clone(&self.open);
        let reply = AsyncExecutor::execute(&self.recorder, text, parameters, consistency);

        async move {
            while !open.load(Ordering::Acquire) {
                tokio::task::yield_now().await;
            }
            reply.await
        }
    }
}

async fn until_sent(executor: &RecordingExecutor, count: usize) {
    while executor.calls().len() < count {
        tokio::task::yield_now().await;
    }
}

fn age_update(org: &str, age: i64) -> UpdateStatement {
    let mut update = UpdateStatement::new("cqlmodel.users");
    update
        .add_assignment_clause(AssignmentClause::new("age", age))
        .expect("assignment");
    update
        .add_where_clause(WhereClause::new("org", WhereOperator::Eq, org))
        .expect("where");
    update
}

#[test]
fn batch_renumbers_statements_into_one_id_space() {
    init_tracing();
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);

    batch.add(age_update("acme", 1)).expect("add");
    batch.add(age_update("globex", 2)).expect("add");
    batch.execute().expect("execute");

    let call = executor.last();
    assert_eq!(
        call.text,
        "BEGIN BATCH\n  \
         UPDATE cqlmodel.users SET \"age\" = :0 WHERE \"org\" = :1\n  \
         UPDATE cqlmodel.users SET \"age\" = :2 WHERE \"org\" = :3\n\
         APPLY BATCH;"
    );
    assert_eq!(call.context.len(), 4);
    assert_eq!(call.context.get(&2), Some(&Value::Int(2)));
    assert_eq!(call.context.get(&3), Some(&Value::from("globex")));
    assert!(batch.is_empty());
}

#[test]
fn opener_carries_type_and_timestamp() {
    let (session, executor) = session();
    let at = datetime!(2024-01-02 03:04:05.678 UTC);

    let unlogged = session.batch(BatchType::Unlogged).timestamp(at);
    unlogged.add(age_update("acme", 1)).expect("add");
    unlogged.execute().expect("execute");
    assert!(
        executor
            .last()
            .text
            .starts_with("BEGIN UNLOGGED BATCH USING TIMESTAMP 1704164645678\n")
    );

    let counter = session.batch(BatchType::Counter);
    counter.add(age_update("acme", 1)).expect("add");
    counter.execute().expect("execute");
    assert!(executor.last().text.starts_with("BEGIN COUNTER BATCH\n"));
}

#[test]
fn selects_are_refused() {
    let (session, _) = session();
    let batch = session.batch(BatchType::Logged);

    let err = batch
        .add(SelectStatement::new("cqlmodel.users"))
        .expect_err("select in batch");

    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::SelectInBatch)
    ));
    assert!(batch.is_empty());
}

#[test]
fn empty_batch_is_not_sent() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);

    batch.add(UpdateStatement::new("cqlmodel.users")).expect("add");
    batch.execute().expect("execute");

    assert!(batch.is_empty());
    assert!(executor.calls().is_empty());
}

#[test]
fn failed_execute_keeps_pending_statements() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);
    batch.add(age_update("acme", 1)).expect("add");
    batch.add(age_update("globex", 2)).expect("add");

    executor.fail("timeout");
    let err = batch.execute().expect_err("transport failure");
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(batch.len(), 2);

    batch.execute().expect("retry");
    let texts = executor.texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], texts[1]);
    let calls = executor.calls();
    assert_eq!(calls[0].context, calls[1].context);
    assert!(batch.is_empty());
}

#[test]
fn batch_consistency_is_forwarded() {
    let (session, executor) = session();
    let batch = session
        .batch(BatchType::Logged)
        .consistency(Consistency::LocalQuorum);
    batch.add(age_update("acme", 1)).expect("add");

    batch.execute().expect("execute");

    assert_eq!(executor.last().consistency, Consistency::LocalQuorum);
}

#[test]
fn run_executes_on_success() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);

    let value = batch
        .run(|b| {
            b.add(age_update("acme", 1))?;
            Ok::<_, Error>(7)
        })
        .expect("run");

    assert_eq!(value, 7);
    assert_eq!(executor.calls().len(), 1);
}

#[test]
fn run_skips_execution_when_scope_fails() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);

    let err = batch
        .run(|b| {
            b.add(age_update("acme", 1))?;
            Err::<(), Error>(QueryError::BatchRead.into())
        })
        .expect_err("scope failure");

    assert!(matches!(err, Error::Query(QueryError::BatchRead)));
    assert!(executor.calls().is_empty());
    assert_eq!(batch.len(), 1);
}

#[test]
fn run_executes_on_failure_when_configured() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged).execute_on_exception();

    let result = batch.run(|b| {
        b.add(age_update("acme", 1))?;
        Err::<(), Error>(QueryError::BatchRead.into())
    });

    assert!(result.is_err());
    assert_eq!(executor.calls().len(), 1);
}

#[test]
fn bound_query_set_queues_writes_and_refuses_reads() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);
    let query = session
        .objects::<User>()
        .batch(&batch)
        .filter([col("org").eq("acme")])
        .expect("filter");

    query.update([("age", 3)]).expect("update");
    query.delete().expect("delete");
    let read = query.len().expect_err("read on batch");

    assert!(matches!(read, Error::Query(QueryError::BatchRead)));
    assert!(executor.calls().is_empty());
    assert_eq!(batch.len(), 2);

    batch.execute().expect("execute");
    assert_eq!(
        executor.last().text,
        "BEGIN BATCH\n  \
         UPDATE cqlmodel.users SET \"age\" = :0 WHERE \"org\" = :1\n  \
         DELETE FROM cqlmodel.users WHERE \"org\" = :2\n\
         APPLY BATCH;"
    );
}

#[test]
fn bound_dml_queues_instance_writes() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);
    let dml = session.dml().batch(&batch);

    let mut first = Instance::from_values(
        &USERS,
        [("org", Value::from("acme")), ("user_id", Value::Int(1))],
    )
    .expect("instance");
    let mut second = Instance::from_values(
        &USERS,
        [("org", Value::from("acme")), ("user_id", Value::Int(2))],
    )
    .expect("instance");
    dml.save(&mut first).expect("save");
    dml.save(&mut second).expect("save");

    assert_eq!(
        batch.pending_text(),
        [
            "INSERT INTO cqlmodel.users (\"org\", \"user_id\") VALUES (:0, :1)",
            "INSERT INTO cqlmodel.users (\"org\", \"user_id\") VALUES (:0, :1)",
        ]
    );

    batch.execute().expect("execute");
    assert!(executor.last().text.contains("VALUES (:2, :3)"));
}

#[tokio::test]
async fn async_execute_awaits_collaborator_once() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Unlogged);
    batch.add(age_update("acme", 1)).expect("add");
    batch.add(age_update("globex", 2)).expect("add");

    batch.execute_async(&executor).await.expect("execute");

    assert_eq!(executor.calls().len(), 1);
    assert!(executor.last().text.starts_with("BEGIN UNLOGGED BATCH"));
    assert!(batch.is_empty());
}

#[tokio::test]
async fn async_failure_keeps_pending_statements() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);
    batch.add(age_update("acme", 1)).expect("add");

    executor.fail("down");
    let err = batch.execute_async(&executor).await.expect_err("failure");

    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn writes_queued_during_async_execute_stay_pending() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);
    batch.add(age_update("acme", 1)).expect("add");
    batch.add(age_update("globex", 2)).expect("add");
    let gate = GatedExecutor::new(executor.clone());
    let other = batch.clone();

    let (sent, ()) = tokio::join!(batch.execute_async(&gate), async {
        until_sent(&executor, 1).await;

        let err = other.execute().expect_err("execute while a command is in flight");
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::BatchInFlight)
        ));
        assert!(other.is_empty());

        other.add(age_update("initech", 3)).expect("add");
        other.add(age_update("umbrella", 4)).expect("add");
        gate.open();
    });
    sent.expect("async execute");

    assert_eq!(executor.calls().len(), 1);
    assert_eq!(batch.len(), 2);

    batch.execute().expect("flush later writes");
    let calls = executor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].context.get(&1), Some(&Value::from("acme")));
    assert_eq!(calls[0].context.get(&3), Some(&Value::from("globex")));
    assert_eq!(calls[1].context.get(&1), Some(&Value::from("initech")));
    assert_eq!(calls[1].context.get(&3), Some(&Value::from("umbrella")));
    assert!(batch.is_empty());
}

#[tokio::test]
async fn failed_async_execute_restores_statements_ahead_of_later_writes() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);
    batch.add(age_update("acme", 1)).expect("add");
    batch.add(age_update("globex", 2)).expect("add");
    let gate = GatedExecutor::new(executor.clone());
    let other = batch.clone();
    executor.fail("timeout");

    let (sent, ()) = tokio::join!(batch.execute_async(&gate), async {
        until_sent(&executor, 1).await;
        other.add(age_update("initech", 3)).expect("add");
        gate.open();
    });
    let err = sent.expect_err("transport failure");
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(batch.len(), 3);

    batch.execute().expect("retry");
    let retry = executor.last();
    assert_eq!(retry.context.get(&1), Some(&Value::from("acme")));
    assert_eq!(retry.context.get(&3), Some(&Value::from("globex")));
    assert_eq!(retry.context.get(&5), Some(&Value::from("initech")));

    let first = executor.calls()[0].text.clone();
    let head = |text: &str| text.lines().take(3).map(str::to_string).collect::<Vec<_>>();
    assert_eq!(head(&retry.text), head(&first));
}

#[tokio::test]
async fn dropped_async_execute_keeps_statements() {
    let (session, executor) = session();
    let batch = session.batch(BatchType::Logged);
    batch.add(age_update("acme", 1)).expect("add");
    let gate = GatedExecutor::new(executor.clone());

    let cancelled = tokio::select! {
        biased;
        result = batch.execute_async(&gate) => Some(result),
        () = until_sent(&executor, 1) => None,
    };
    assert!(cancelled.is_none());

    assert_eq!(batch.len(), 1);
    batch.execute().expect("execute after cancellation");
    assert_eq!(executor.calls().len(), 2);
    assert!(batch.is_empty());
}

proptest! {
    #[test]
    fn merged_context_is_contiguous(sizes in prop::collection::vec(0usize..4, 1..6)) {
        let (session, executor) = session();
        let batch = session.batch(BatchType::Logged);

        for (i, size) in sizes.iter().enumerate() {
            let mut update = UpdateStatement::new("cqlmodel.users");
            for k in 0..*size {
                update
                    .add_assignment_clause(AssignmentClause::new(format!("c{k}"), Value::Int(1)))
                    .expect("assignment");
            }
            update
                .add_where_clause(WhereClause::new("org", WhereOperator::Eq, format!("o{i}")))
                .expect("where");
            batch.add(update).expect("add");
        }
        batch.execute().expect("execute");

        let expected_len: usize = sizes.iter().filter(|s| **s > 0).map(|s| s + 1).sum();
        let keys: BTreeSet<usize> = if expected_len == 0 {
            BTreeSet::new()
        } else {
            executor.last().context.keys().copied().collect()
        };

        prop_assert_eq!(keys, (0..expected_len).collect::<BTreeSet<_>>());
    }
}
