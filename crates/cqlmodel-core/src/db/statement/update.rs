use crate::{
    db::statement::{Assignment, Clause, Context, Rendered, StatementCore, WhereClause},
    error::ConfigurationError,
};

///
/// UpdateStatement
/// `UPDATE t SET a, b [WHERE ...] [USING TTL n]`
///

#[derive(Clone, Debug)]
pub struct UpdateStatement {
    pub(crate) core: StatementCore,
    assignments: Vec<Assignment>,
    ttl: Option<u32>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            core: StatementCore::new(table),
            assignments: Vec::new(),
            ttl: None,
        }
    }

    #[must_use]
    pub fn ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self.core.invalidate();
        self
    }

    pub fn add_where_clause(&mut self, clause: WhereClause) -> Result<(), ConfigurationError> {
        self.core.add_where(clause)
    }

    /// Attach an assignment; deltas with nothing to change are dropped.
    pub fn add_assignment_clause(
        &mut self,
        clause: impl Into<Assignment>,
    ) -> Result<(), ConfigurationError> {
        let mut clause = clause.into();
        if self.core.mint(&mut clause)? {
            self.assignments.push(clause);
        }

        Ok(())
    }

    #[must_use]
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

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
            .rebase(new_base, self.assignments.iter_mut().map(Assignment::slot_mut));
    }

    fn rendered(&self) -> &Rendered {
        self.core.rendered(|| self.render())
    }

    fn render(&self) -> Rendered {
        let assignments: Vec<_> = self.assignments.iter().map(Clause::render).collect();

        let mut parts = vec![
            format!("UPDATE {}", self.core.table),
            format!("SET {}", assignments.join(", ")),
        ];
        parts.extend(self.core.where_text());
        if let Some(ttl) = self.ttl {
            parts.push(format!("USING TTL {ttl}"));
        }

        let mut context = Context::new();
        self.core.where_context(&mut context);
        for assignment in &self.assignments {
            assignment.contribute(&mut context);
        }

        Rendered {
            text: parts.join(" "),
            context,
        }
    }
}
