use super::*;
use crate::{
    db::{batch::BatchType, function::QueryValue, operator::WhereOperator},
    error::{ConfigurationError, ValidationError},
    test_fixtures::session,
    value::Value,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use time::macros::datetime;

const TABLE: &str = "app.users";

fn eq(field: &str, value: impl Into<QueryValue>) -> WhereClause {
    WhereClause::new(field, WhereOperator::Eq, value)
}

fn context_of(pairs: Vec<(usize, Value)>) -> Context {
    let mut context = Context::new();
    for (id, value) in pairs {
        context.insert(id, value);
    }
    context
}

/// Placeholder ids referenced in rendered text, in order of appearance.
fn placeholders(text: &str) -> Vec<usize> {
    let mut ids = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(':') {
        rest = &rest[pos + 1..];
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(id) = digits.parse() {
            ids.push(id);
        }
    }
    ids
}

///
/// SELECT
///

#[test]
fn select_renders_every_section_in_order() {
    let mut select = SelectStatement::new(TABLE)
        .order_by(vec![OrderTerm::desc("user_id")])
        .limit(Some(10))
        .allow_filtering(true);
    select.add_where_clause(eq("org", "acme")).expect("where");
    select
        .add_where_clause(WhereClause::new("age", WhereOperator::Gt, 30))
        .expect("where");

    assert_eq!(
        select.text(),
        "SELECT * FROM app.users WHERE \"org\" = :0 AND \"age\" > :1 \
         ORDER BY \"user_id\" DESC LIMIT 10 ALLOW FILTERING"
    );
    assert_eq!(
        select.context(),
        &context_of(vec![(0, Value::from("acme")), (1, Value::Int(30))])
    );
}

#[test]
fn select_quotes_projected_fields() {
    let select = SelectStatement::new(TABLE).fields(["org", "full_name"]);

    assert_eq!(select.text(), "SELECT \"org\", \"full_name\" FROM app.users");
}

#[test]
fn count_select_drops_order_and_limit() {
    let mut select = SelectStatement::new(TABLE)
        .order_by(vec![OrderTerm::asc("user_id")])
        .limit(Some(5))
        .count();
    select.add_where_clause(eq("org", "acme")).expect("where");

    assert!(select.is_count());
    assert_eq!(
        select.text(),
        "SELECT COUNT(*) FROM app.users WHERE \"org\" = :0"
    );
}

#[test]
fn builder_after_render_invalidates_cached_text() {
    let select = SelectStatement::new(TABLE);
    assert_eq!(select.text(), "SELECT * FROM app.users");

    let select = select.limit(Some(3));
    assert_eq!(select.text(), "SELECT * FROM app.users LIMIT 3");
}

#[test]
fn adding_where_after_render_fails() {
    let mut select = SelectStatement::new(TABLE);
    let _ = select.text();

    let err = select
        .add_where_clause(eq("org", "acme"))
        .expect_err("rendered statement should be frozen");
    assert_eq!(err, ConfigurationError::StatementRendered);
}

#[test]
fn attaching_a_context_id_twice_fails() {
    let mut clause = eq("org", "acme");
    clause.attach(0).expect("first attach");

    let err = clause.attach(4).expect_err("second attach should fail");
    assert_eq!(err, ConfigurationError::ContextIdAttached { id: 0 });
}

#[test]
fn token_comparison_renders_partition_columns() {
    let mut select = SelectStatement::new("app.events");
    select
        .add_where_clause(WhereClause::token(
            vec!["tenant".to_string(), "bucket".to_string()],
            WhereOperator::Gt,
            QueryValue::token(["acme".into(), Value::Int(3)]),
        ))
        .expect("where");

    assert_eq!(
        select.text(),
        "SELECT * FROM app.events WHERE token(\"tenant\", \"bucket\") > token(:0, :1)"
    );
    assert_eq!(select.context_size(), 2);
}

#[test]
fn time_uuid_function_binds_timestamp() {
    let at = datetime!(2024-01-02 03:04:05.678 UTC);
    let mut select = SelectStatement::new("app.events");
    select
        .add_where_clause(WhereClause::new(
            "seq",
            WhereOperator::Gte,
            QueryValue::min_time_uuid(at),
        ))
        .expect("where");

    assert_eq!(
        select.text(),
        "SELECT * FROM app.events WHERE \"seq\" >= MinTimeUUID(:0)"
    );
    assert_eq!(select.context().get(&0), Some(&Value::timestamp(at)));
}

///
/// INSERT
///

#[test]
fn insert_renders_columns_values_ttl_and_condition() {
    let mut insert = InsertStatement::new(TABLE).ttl(Some(60)).if_not_exists(true);
    insert
        .add_assignment_clause(AssignmentClause::new("org", "acme"))
        .expect("assignment");
    insert
        .add_assignment_clause(AssignmentClause::new("age", 41))
        .expect("assignment");

    assert_eq!(
        insert.text(),
        "INSERT INTO app.users (\"org\", \"age\") VALUES (:0, :1) USING TTL 60 IF NOT EXISTS"
    );
}

#[test]
fn insert_rejects_where_clauses() {
    let mut insert = InsertStatement::new(TABLE);

    let err = insert
        .add_where_clause(eq("org", "acme"))
        .expect_err("insert has no where");
    assert_eq!(err, ConfigurationError::WhereClauseOnInsert);
}

#[test]
fn insert_rejects_container_deltas() {
    let mut insert = InsertStatement::new(TABLE);
    let clause = SetUpdateClause::new("tags", &Value::set(["a"]), &Value::Null).expect("clause");

    let err = insert
        .add_assignment_clause(clause)
        .expect_err("delta in insert should fail");
    assert!(matches!(err, ConfigurationError::ContainerInInsert { .. }));
}

#[test]
fn insert_without_assignments_is_empty() {
    let insert = InsertStatement::new(TABLE);

    assert!(insert.is_empty());
    assert!(Statement::from(insert).is_empty());
}

#[test]
fn empty_insert_is_never_executed() {
    let (session, executor) = session();
    let insert = Statement::from(InsertStatement::new(TABLE).ttl(Some(30)));

    let result = session.execute(&insert, None).expect("empty insert is skipped");

    assert!(result.is_empty());
    assert!(executor.calls().is_empty());

    let batch = session.batch(BatchType::Logged);
    batch.add(InsertStatement::new(TABLE)).expect("add");
    batch.execute().expect("execute");
    assert!(batch.is_empty());
    assert!(executor.calls().is_empty());
}

///
/// UPDATE
///

#[test]
fn update_renders_set_where_then_ttl() {
    let mut update = UpdateStatement::new(TABLE).ttl(Some(30));
    update
        .add_assignment_clause(AssignmentClause::new("age", 42))
        .expect("assignment");
    update.add_where_clause(eq("org", "acme")).expect("where");

    assert_eq!(
        update.text(),
        "UPDATE app.users SET \"age\" = :0 WHERE \"org\" = :1 USING TTL 30"
    );
    assert_eq!(update.context().len(), 2);
}

#[test]
fn set_delta_sends_added_and_removed_members() {
    let clause = SetUpdateClause::new("tags", &Value::set(["b", "c"]), &Value::set(["a", "b"]))
        .expect("clause");
    assert_eq!(clause.added(), &[Value::from("c")]);
    assert_eq!(clause.removed(), &[Value::from("a")]);

    let mut update = UpdateStatement::new(TABLE);
    update.add_assignment_clause(clause).expect("assignment");

    assert_eq!(
        update.text(),
        "UPDATE app.users SET \"tags\" = \"tags\" + :0, \"tags\" = \"tags\" - :1"
    );
    assert_eq!(
        update.context(),
        &context_of(vec![(0, Value::set(["c"])), (1, Value::set(["a"]))])
    );
}

#[test]
fn set_delta_replaces_when_nothing_survives() {
    let clause = SetUpdateClause::new("tags", &Value::set(["x"]), &Value::set(["a", "b"]))
        .expect("clause");

    assert!(clause.is_replace());
    assert_eq!(clause.render(), "\"tags\" = :0");
}

#[test]
fn unchanged_set_is_dropped_from_update() {
    let clause = SetUpdateClause::new("tags", &Value::set(["a", "b"]), &Value::set(["b", "a"]))
        .expect("clause");
    assert!(clause.is_noop());

    let mut update = UpdateStatement::new(TABLE);
    update.add_assignment_clause(clause).expect("assignment");

    assert!(update.is_empty());
    assert_eq!(update.context_size(), 0);
}

#[test]
fn map_delta_splits_updates_and_deletes() {
    let previous = Value::map([("k1", "v1"), ("k2", "v2")]);
    let current = Value::map([("k1", "v1"), ("k3", "v3")]);

    let update_clause = MapUpdateClause::new("prefs", &current, &previous).expect("clause");
    let delete_clause = MapDeleteClause::new("prefs", &current, &previous).expect("clause");

    assert_eq!(
        update_clause.updates(),
        &[(Value::from("k3"), Value::from("v3"))]
    );
    assert_eq!(delete_clause.keys(), &[Value::from("k2")]);

    let mut update = UpdateStatement::new(TABLE);
    update.add_assignment_clause(update_clause).expect("assignment");
    update.add_where_clause(eq("org", "acme")).expect("where");
    assert_eq!(
        update.text(),
        "UPDATE app.users SET \"prefs\"[:0] = :1 WHERE \"org\" = :2"
    );

    let mut delete = DeleteStatement::new(TABLE);
    delete.add_field(delete_clause).expect("target");
    delete.add_where_clause(eq("org", "acme")).expect("where");
    assert_eq!(
        delete.text(),
        "DELETE \"prefs\"[:0] FROM app.users WHERE \"org\" = :1"
    );
    assert_eq!(delete.context().get(&0), Some(&Value::from("k2")));
}

#[test]
fn map_delta_rejects_non_map_values() {
    let err = MapUpdateClause::new("prefs", &Value::list([1]), &Value::Null)
        .expect_err("list is not a map");

    assert_eq!(
        err,
        ConfigurationError::ContainerKindMismatch {
            field: "prefs".to_string(),
            expected: "map",
        }
    );
}

#[test]
fn counter_delta_binds_magnitude_with_sign_in_text() {
    let mut update = UpdateStatement::new("analytics.page_views");
    update
        .add_assignment_clause(CounterUpdateClause::new("views", 8, 5).expect("clause"))
        .expect("assignment");

    assert_eq!(
        update.text(),
        "UPDATE analytics.page_views SET \"views\" = \"views\" + :0"
    );
    assert_eq!(update.context().get(&0), Some(&Value::Int(3)));

    let decrement = CounterUpdateClause::new("views", 2, 5).expect("clause");
    assert_eq!(decrement.delta(), -3);
    assert_eq!(decrement.render(), "\"views\" = \"views\" - :0");
}

#[test]
fn counter_delta_overflow_is_rejected() {
    let err = CounterUpdateClause::new("views", i64::MIN, 1).expect_err("overflow");

    assert_eq!(
        err,
        ValidationError::CounterOverflow {
            column: "views".to_string()
        }
    );
}

#[test]
fn list_delta_prepends_and_appends_around_previous() {
    let previous = Value::list([2, 3]);
    let current = Value::list([0, 1, 2, 3, 4]);
    let clause = ListUpdateClause::new("history", &current, &previous).expect("clause");

    assert!(!clause.is_replace());
    assert_eq!(clause.prepended(), &[Value::Int(1), Value::Int(0)]);
    assert_eq!(clause.appended(), &[Value::Int(4)]);

    let mut update = UpdateStatement::new(TABLE);
    update.add_assignment_clause(clause).expect("assignment");
    assert_eq!(
        update.text(),
        "UPDATE app.users SET \"history\" = :0 + \"history\", \"history\" = \"history\" + :1"
    );
    assert_eq!(
        update.context(),
        &context_of(vec![(0, Value::list([1, 0])), (1, Value::list([4]))])
    );
}

#[test]
fn list_delta_replaces_on_shrink_or_reorder() {
    let shrunk =
        ListUpdateClause::new("history", &Value::list([1]), &Value::list([1, 2])).expect("clause");
    let reordered = ListUpdateClause::new("history", &Value::list([3, 2, 1]), &Value::list([1, 2]))
        .expect("clause");
    let fresh = ListUpdateClause::new("history", &Value::list([1]), &Value::Null).expect("clause");

    assert!(shrunk.is_replace());
    assert!(reordered.is_replace());
    assert!(fresh.is_replace());
    assert_eq!(fresh.render(), "\"history\" = :0");
}

#[test]
fn update_without_assignments_is_empty() {
    let mut update = UpdateStatement::new(TABLE);
    update.add_where_clause(eq("org", "acme")).expect("where");

    assert!(update.is_empty());
}

///
/// DELETE
///

#[test]
fn delete_renders_fields_and_where() {
    let mut delete = DeleteStatement::new(TABLE);
    delete.add_field(FieldDeleteClause::new("email")).expect("target");
    delete.add_field(FieldDeleteClause::new("age")).expect("target");
    delete.add_where_clause(eq("org", "acme")).expect("where");

    assert_eq!(
        delete.text(),
        "DELETE \"email\", \"age\" FROM app.users WHERE \"org\" = :0"
    );
    assert_eq!(delete.context_size(), 1);
}

#[test]
fn delete_without_fields_removes_row() {
    let mut delete = DeleteStatement::new(TABLE);
    delete.add_where_clause(eq("org", "acme")).expect("where");

    assert_eq!(delete.text(), "DELETE FROM app.users WHERE \"org\" = :0");
}

///
/// REBASE
///

#[test]
fn rebase_shifts_every_placeholder() {
    let mut update = UpdateStatement::new(TABLE);
    update
        .add_assignment_clause(AssignmentClause::new("age", 1))
        .expect("assignment");
    update.add_where_clause(eq("org", "acme")).expect("where");
    let _ = update.text();

    let mut statement = Statement::from(update);
    statement.rebase(5);

    assert_eq!(
        statement.text(),
        "UPDATE app.users SET \"age\" = :5 WHERE \"org\" = :6"
    );
    assert_eq!(statement.context().keys().copied().collect::<Vec<_>>(), [5, 6]);

    statement.rebase(0);
    assert_eq!(placeholders(statement.text()), [0, 1]);
}

#[test]
fn context_serializes_with_string_keys() {
    let mut select = SelectStatement::new(TABLE);
    select.add_where_clause(eq("org", "acme")).expect("where");
    select
        .add_where_clause(WhereClause::new("age", WhereOperator::Lt, 9))
        .expect("where");

    let json = serde_json::to_value(select.context()).expect("context should serialize");

    assert_eq!(json, serde_json::json!({ "0": "acme", "1": 9 }));
}

///
/// PROPERTIES
///

/// One clause of an arbitrary statement: a where clause binding `n`
/// token values, or a set delta.
#[derive(Clone, Debug)]
enum Part {
    Where(u8),
    SetDelta(Vec<i64>, Vec<i64>),
}

fn part() -> impl Strategy<Value = Part> {
    prop_oneof![
        (1u8..4).prop_map(Part::Where),
        (
            prop::collection::vec(0i64..6, 0..4),
            prop::collection::vec(0i64..6, 0..4)
        )
            .prop_map(|(current, previous)| Part::SetDelta(current, previous)),
    ]
}

fn build(parts: &[Part]) -> UpdateStatement {
    let mut update = UpdateStatement::new(TABLE);
    for (i, part) in parts.iter().enumerate() {
        match part {
            Part::Where(1) => update
                .add_where_clause(eq(&format!("c{i}"), Value::Int(1)))
                .expect("where"),
            Part::Where(n) => update
                .add_where_clause(WhereClause::token(
                    (0..*n).map(|k| format!("p{k}")).collect(),
                    WhereOperator::Gte,
                    QueryValue::token((0..*n).map(|k| Value::Int(i64::from(k)))),
                ))
                .expect("where"),
            Part::SetDelta(current, previous) => {
                let clause = SetUpdateClause::new(
                    format!("s{i}"),
                    &Value::set(current.iter().copied()),
                    &Value::set(previous.iter().copied()),
                )
                .expect("clause");
                update.add_assignment_clause(clause).expect("assignment");
            }
        }
    }
    update
}

proptest! {
    #[test]
    fn placeholders_are_unique_and_contiguous(parts in prop::collection::vec(part(), 0..8)) {
        let update = build(&parts);
        let size = update.context_size();

        let in_text: BTreeSet<usize> = placeholders(update.text()).into_iter().collect();
        let in_context: BTreeSet<usize> = update.context().keys().copied().collect();
        let expected: BTreeSet<usize> = (0..size).collect();

        prop_assert_eq!(placeholders(update.text()).len(), size);
        prop_assert_eq!(&in_text, &expected);
        prop_assert_eq!(&in_context, &expected);
    }

    #[test]
    fn rebase_preserves_contiguity(parts in prop::collection::vec(part(), 0..8), base in 0usize..50) {
        let mut statement = Statement::from(build(&parts));
        let size = statement.context_size();
        statement.rebase(base);

        let in_context: BTreeSet<usize> = statement.context().keys().copied().collect();
        let expected: BTreeSet<usize> = (base..base + size).collect();

        prop_assert_eq!(statement.context_size(), size);
        prop_assert_eq!(in_context, expected);
    }

    #[test]
    fn set_delta_reconstructs_current(
        current in prop::collection::btree_set(0i64..8, 0..6),
        previous in prop::collection::btree_set(0i64..8, 1..6),
    ) {
        let clause = SetUpdateClause::new(
            "s",
            &Value::set(current.iter().copied()),
            &Value::set(previous.iter().copied()),
        )
        .expect("clause");

        if !clause.is_replace() {
            let mut rebuilt: BTreeSet<i64> = previous.clone();
            for v in clause.added() {
                rebuilt.insert(v.as_int().expect("int member"));
            }
            for v in clause.removed() {
                rebuilt.remove(&v.as_int().expect("int member"));
            }
            prop_assert_eq!(rebuilt, current);
        }
    }
}
