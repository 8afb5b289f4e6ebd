use crate::{
    db::{
        batch::BatchQuery,
        executor::Consistency,
        operator::WhereOperator,
        session::Session,
        statement::{
            Assignment, AssignmentClause, CounterUpdateClause, DeleteStatement, FieldDeleteClause,
            InsertStatement, ListUpdateClause, MapDeleteClause, MapUpdateClause, SetUpdateClause,
            Statement, UpdateStatement, WhereClause,
        },
    },
    error::{Error, QueryError},
    model::{ColumnKind, ColumnModel, FieldState, Instance},
};
use tracing::{debug, instrument};

///
/// DmlQuery
///
/// Persists one `Instance` from its tracked deltas: insert or update on
/// save, column and map-key deletes for nulled data, row delete by key.
/// Writes go to the bound batch when one is set.
///

#[derive(Clone, Debug)]
pub struct DmlQuery {
    session: Session,
    batch: Option<BatchQuery>,
    ttl: Option<u32>,
    consistency: Option<Consistency>,
    if_not_exists: bool,
}

impl DmlQuery {
    pub(crate) const fn new(session: Session) -> Self {
        Self {
            session,
            batch: None,
            ttl: None,
            consistency: None,
            if_not_exists: false,
        }
    }

    #[must_use]
    pub fn batch(mut self, batch: &BatchQuery) -> Self {
        self.batch = Some(batch.clone());
        self
    }

    #[must_use]
    pub const fn ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    #[must_use]
    pub const fn if_not_exists(mut self, if_not_exists: bool) -> Self {
        self.if_not_exists = if_not_exists;
        self
    }

    fn execute(&self, statement: Statement) -> Result<(), Error> {
        match &self.batch {
            Some(batch) => batch.add(statement),
            None => self.session.execute(&statement, self.consistency).map(|_| ()),
        }
    }

    ///
    /// SAVE
    ///

    /// Insert a new row, or update a persisted one by key. Counter tables
    /// always update. Nulled columns and removed map keys are deleted
    /// afterwards, then the previous snapshot is reset.
    #[instrument(
        name = "cqlmodel::dml::save",
        level = "debug",
        skip(self, instance),
        fields(table = instance.table().name)
    )]
    pub fn save(&self, instance: &mut Instance) -> Result<(), Error> {
        let table = instance.table();
        table.validate()?;
        if self.if_not_exists && table.has_counter() {
            return Err(QueryError::IfNotExistsWithCounter {
                table: table.name.to_string(),
            }
            .into());
        }
        instance.validate()?;

        if table.has_counter() || instance.can_update() {
            self.write_changes(instance)?;
        } else {
            self.insert(instance)?;
        }
        self.delete_null_columns(instance)?;
        instance.reset_previous();

        Ok(())
    }

    fn insert(&self, instance: &Instance) -> Result<(), Error> {
        let table = instance.table();
        let mut insert = InsertStatement::new(self.session.column_family_name(table))
            .ttl(self.ttl)
            .if_not_exists(self.if_not_exists);

        for (column, state) in instance.fields() {
            if state.value.is_null() {
                continue;
            }
            insert.add_assignment_clause(AssignmentClause::new(
                column.db_field_name(),
                state.value.clone(),
            ))?;
        }

        self.execute(insert.into())
    }

    /// Update a persisted row in place, then delete nulled columns and
    /// reset the previous snapshot.
    #[instrument(
        name = "cqlmodel::dml::update",
        level = "debug",
        skip(self, instance),
        fields(table = instance.table().name)
    )]
    pub fn update(&self, instance: &mut Instance) -> Result<(), Error> {
        instance.table().validate()?;
        instance.validate()?;
        self.write_changes(instance)?;
        self.delete_null_columns(instance)?;
        instance.reset_previous();

        Ok(())
    }

    /// Changed columns only. Nothing is sent when no column changed.
    fn write_changes(&self, instance: &Instance) -> Result<(), Error> {
        let table = instance.table();
        let mut update = UpdateStatement::new(self.session.column_family_name(table)).ttl(self.ttl);

        for (column, state) in instance.fields() {
            if column.is_primary_key || state.value.is_null() {
                continue;
            }
            if !column.kind.is_counter() && !state.changed() {
                continue;
            }
            update.add_assignment_clause(assignment(column, state)?)?;
        }

        if update.is_empty() {
            debug!(table = table.name, "no changed columns, update skipped");
            return Ok(());
        }

        add_primary_key(&mut update, instance)?;
        self.execute(update.into())
    }

    fn delete_null_columns(&self, instance: &Instance) -> Result<(), Error> {
        let table = instance.table();
        let mut delete = DeleteStatement::new(self.session.column_family_name(table));

        for (column, state) in instance.fields() {
            let field = column.db_field_name();
            if state.deleted() {
                delete.add_field(FieldDeleteClause::new(field))?;
            } else if matches!(column.kind, ColumnKind::Map { .. }) {
                delete.add_field(MapDeleteClause::new(field, &state.value, &state.previous)?)?;
            }
        }

        if delete.targets().is_empty() {
            return Ok(());
        }

        let mut statement = Statement::Delete(delete);
        add_primary_key(&mut statement, instance)?;
        self.execute(statement)
    }

    ///
    /// DELETE
    ///

    /// Delete the row by primary key.
    #[instrument(
        name = "cqlmodel::dml::delete",
        level = "debug",
        skip(self, instance),
        fields(table = instance.table().name)
    )]
    pub fn delete(&self, instance: &mut Instance) -> Result<(), Error> {
        let table = instance.table();
        table.validate()?;
        let mut statement = Statement::Delete(DeleteStatement::new(
            self.session.column_family_name(table),
        ));
        add_primary_key(&mut statement, instance)?;
        self.execute(statement)?;
        instance.mark_deleted();

        Ok(())
    }
}

/// Delta assignment matching the column kind.
fn assignment(column: &ColumnModel, state: &FieldState) -> Result<Assignment, Error> {
    let field = column.db_field_name();
    let (value, previous) = (&state.value, &state.previous);

    let assignment = match column.kind {
        ColumnKind::Scalar(_) => AssignmentClause::new(field, value.clone()).into(),
        ColumnKind::List(_) => ListUpdateClause::new(field, value, previous)?.into(),
        ColumnKind::Set(_) => SetUpdateClause::new(field, value, previous)?.into(),
        ColumnKind::Map { .. } => MapUpdateClause::new(field, value, previous)?.into(),
        ColumnKind::Counter => CounterUpdateClause::new(
            field,
            value.as_int().unwrap_or_default(),
            previous.as_int().unwrap_or_default(),
        )?
        .into(),
    };

    Ok(assignment)
}

///
/// KeyedStatement
/// Writes addressed by primary key equality.
///

trait KeyedStatement {
    fn add_key_clause(&mut self, clause: WhereClause) -> Result<(), Error>;
}

impl KeyedStatement for UpdateStatement {
    fn add_key_clause(&mut self, clause: WhereClause) -> Result<(), Error> {
        Ok(self.add_where_clause(clause)?)
    }
}

impl KeyedStatement for Statement {
    fn add_key_clause(&mut self, clause: WhereClause) -> Result<(), Error> {
        match self {
            Self::Update(s) => s.add_where_clause(clause)?,
            Self::Delete(s) => s.add_where_clause(clause)?,
            Self::Select(s) => s.add_where_clause(clause)?,
            Self::Insert(s) => s.add_where_clause(clause)?,
        }

        Ok(())
    }
}

fn add_primary_key(statement: &mut impl KeyedStatement, instance: &Instance) -> Result<(), Error> {
    for (column, state) in instance.fields().filter(|(c, _)| c.is_primary_key) {
        statement.add_key_clause(WhereClause::new(
            column.db_field_name(),
            WhereOperator::Eq,
            state.value.clone(),
        ))?;
    }

    Ok(())
}
