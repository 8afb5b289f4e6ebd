use crate::{
    db::statement::{Clause, Context, DeleteTarget, Rendered, StatementCore, WhereClause},
    error::ConfigurationError,
};

///
/// DeleteStatement
///
/// `DELETE ["f1", "m"[:k], ...] FROM t [WHERE ...]`
/// With no targets the whole row is deleted.
///

#[derive(Clone, Debug)]
pub struct DeleteStatement {
    pub(crate) core: StatementCore,
    targets: Vec<DeleteTarget>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            core: StatementCore::new(table),
            targets: Vec::new(),
        }
    }

    pub fn add_where_clause(&mut self, clause: WhereClause) -> Result<(), ConfigurationError> {
        self.core.add_where(clause)
    }

    /// Add a column or map-key target; map deletes with no keys are dropped.
    pub fn add_field(&mut self, target: impl Into<DeleteTarget>) -> Result<(), ConfigurationError> {
        let mut target = target.into();
        if self.core.mint(&mut target)? {
            self.targets.push(target);
        }

        Ok(())
    }

    #[must_use]
    pub fn targets(&self) -> &[DeleteTarget] {
        &self.targets
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
            .rebase(new_base, self.targets.iter_mut().map(DeleteTarget::slot_mut));
    }

    fn rendered(&self) -> &Rendered {
        self.core.rendered(|| self.render())
    }

    fn render(&self) -> Rendered {
        let mut parts = vec!["DELETE".to_string()];
        if !self.targets.is_empty() {
            let targets: Vec<_> = self.targets.iter().map(Clause::render).collect();
            parts.push(targets.join(", "));
        }
        parts.push(format!("FROM {}", self.core.table));
        parts.extend(self.core.where_text());

        let mut context = Context::new();
        self.core.where_context(&mut context);
        for target in &self.targets {
            target.contribute(&mut context);
        }

        Rendered {
            text: parts.join(" "),
            context,
        }
    }
}
