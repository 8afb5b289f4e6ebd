use crate::{
    db::statement::{
        Assignment, AssignmentClause, Clause, Context, Rendered, StatementCore, WhereClause,
        clause::quote,
    },
    error::ConfigurationError,
};

///
/// InsertStatement
///
/// `INSERT INTO t ("c1", ...) VALUES (:0, ...) [USING TTL n] [IF NOT EXISTS]`
/// Takes plain assignments only; an insert has no where clause.
///

#[derive(Clone, Debug)]
pub struct InsertStatement {
    pub(crate) core: StatementCore,
    assignments: Vec<AssignmentClause>,
    ttl: Option<u32>,
    if_not_exists: bool,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            core: StatementCore::new(table),
            assignments: Vec::new(),
            ttl: None,
            if_not_exists: false,
        }
    }

    #[must_use]
    pub fn ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self.core.invalidate();
        self
    }

    #[must_use]
    pub fn if_not_exists(mut self, if_not_exists: bool) -> Self {
        self.if_not_exists = if_not_exists;
        self.core.invalidate();
        self
    }

    /// Always fails: inserts address rows by their assigned key columns.
    pub fn add_where_clause(&mut self, _clause: WhereClause) -> Result<(), ConfigurationError> {
        Err(ConfigurationError::WhereClauseOnInsert)
    }

    pub fn add_assignment_clause(
        &mut self,
        clause: impl Into<Assignment>,
    ) -> Result<(), ConfigurationError> {
        let mut clause = match clause.into() {
            Assignment::Value(clause) => clause,
            other => {
                return Err(ConfigurationError::ContainerInInsert {
                    field: other.field().to_string(),
                });
            }
        };

        if self.core.mint(&mut clause)? {
            self.assignments.push(clause);
        }

        Ok(())
    }

    /// An insert with no assignments is a no-op; callers skip execution.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.rendered().text
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.rendered().context
    }

    #[must_use]
    pub const fn context_size(&self) -> usize {
        self.core.context_size()
    }

    pub(crate) fn rebase(&mut self, new_base: usize) {
        self.core
            .rebase(new_base, self.assignments.iter_mut().map(|a| &mut a.slot));
    }

    fn rendered(&self) -> &Rendered {
        self.core.rendered(|| self.render())
    }

    fn render(&self) -> Rendered {
        let (columns, ids): (Vec<_>, Vec<_>) = self
            .assignments
            .iter()
            .map(|a| {
                let (field, id) = a.insert_tuple();
                (quote(field), format!(":{id}"))
            })
            .unzip();

        let mut parts = vec![
            format!("INSERT INTO {}", self.core.table),
            format!("({})", columns.join(", ")),
            "VALUES".to_string(),
            format!("({})", ids.join(", ")),
        ];
        if let Some(ttl) = self.ttl {
            parts.push(format!("USING TTL {ttl}"));
        }
        if self.if_not_exists {
            parts.push("IF NOT EXISTS".to_string());
        }

        let mut context = Context::new();
        for assignment in &self.assignments {
            assignment.contribute(&mut context);
        }

        Rendered {
            text: parts.join(" "),
            context,
        }
    }
}
