//! Statement layer: clauses composed into one command plus its parameters.
//!
//! A statement is *Building* until its text or context is first read, then
//! *Rendered*. Rendering is cached and idempotent; adding clauses to a
//! rendered statement fails. Execution happens outside the statement.
#[cfg(test)]
mod tests;

mod clause;
mod container;
mod context;
mod delete;
mod insert;
mod select;
mod update;

pub use clause::{
    Assignment, AssignmentClause, Clause, DeleteTarget, FieldDeleteClause, WhereClause, WhereTarget,
};
pub use container::{
    CounterUpdateClause, ListUpdateClause, MapDeleteClause, MapUpdateClause, SetUpdateClause,
};
pub use context::Context;
pub use delete::DeleteStatement;
pub use insert::InsertStatement;
pub use select::{OrderTerm, SelectStatement};
pub use update::UpdateStatement;

use crate::error::ConfigurationError;
use clause::Slot;
use std::{fmt, sync::OnceLock};

///
/// Rendered
/// Final text and parameter map of one statement.
///

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Rendered {
    pub(crate) text: String,
    pub(crate) context: Context,
}

///
/// StatementCore
///
/// State shared by every statement kind: target table, where clauses,
/// the running context-id counter, and the render cache.
///

#[derive(Clone, Debug)]
pub(crate) struct StatementCore {
    table: String,
    where_clauses: Vec<WhereClause>,
    base: usize,
    next_id: usize,
    rendered: OnceLock<Rendered>,
}

impl StatementCore {
    fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clauses: Vec::new(),
            base: 0,
            next_id: 0,
            rendered: OnceLock::new(),
        }
    }

    fn ensure_building(&self) -> Result<(), ConfigurationError> {
        if self.rendered.get().is_some() {
            return Err(ConfigurationError::StatementRendered);
        }

        Ok(())
    }

    /// Attach a clause at the running counter. No-op deltas are refused
    /// (returns `false`) without consuming ids.
    fn mint(&mut self, clause: &mut dyn Clause) -> Result<bool, ConfigurationError> {
        self.ensure_building()?;
        if clause.is_noop() {
            return Ok(false);
        }

        clause.attach(self.next_id)?;
        self.next_id += clause.context_footprint();

        Ok(true)
    }

    fn add_where(&mut self, mut clause: WhereClause) -> Result<(), ConfigurationError> {
        self.mint(&mut clause)?;
        self.where_clauses.push(clause);

        Ok(())
    }

    fn where_text(&self) -> Option<String> {
        if self.where_clauses.is_empty() {
            return None;
        }
        let clauses: Vec<_> = self.where_clauses.iter().map(Clause::render).collect();

        Some(format!("WHERE {}", clauses.join(" AND ")))
    }

    fn where_context(&self, context: &mut Context) {
        for clause in &self.where_clauses {
            clause.contribute(context);
        }
    }

    const fn context_size(&self) -> usize {
        self.next_id - self.base
    }

    /// Shift every minted id so this statement's ids start at `new_base`.
    fn rebase<'a>(&mut self, new_base: usize, slots: impl Iterator<Item = &'a mut Slot>) {
        let old_base = self.base;
        for clause in &mut self.where_clauses {
            clause.rebase(old_base, new_base);
        }
        for slot in slots {
            slot.rebase(old_base, new_base);
        }

        self.next_id = self.next_id - old_base + new_base;
        self.base = new_base;
        self.rendered.take();
    }

    fn rendered(&self, render: impl FnOnce() -> Rendered) -> &Rendered {
        self.rendered.get_or_init(render)
    }

    fn invalidate(&mut self) {
        self.rendered.take();
    }
}

///
/// Statement
///
/// Any of the four statement kinds, as queued in batches and handed to
/// the session for execution.
///

#[derive(Clone, Debug)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Select(s) => s.text(),
            Self::Insert(s) => s.text(),
            Self::Update(s) => s.text(),
            Self::Delete(s) => s.text(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        match self {
            Self::Select(s) => s.context(),
            Self::Insert(s) => s.context(),
            Self::Update(s) => s.context(),
            Self::Delete(s) => s.context(),
        }
    }

    #[must_use]
    pub const fn context_size(&self) -> usize {
        self.core().context_size()
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.core().table
    }

    #[must_use]
    pub fn where_clauses(&self) -> &[WhereClause] {
        &self.core().where_clauses
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::Select(_))
    }

    /// True for writes that would change nothing and should not be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Select(_) | Self::Delete(_) => false,
            Self::Insert(s) => s.is_empty(),
            Self::Update(s) => s.is_empty(),
        }
    }

    pub(crate) fn rebase(&mut self, new_base: usize) {
        match self {
            Self::Select(s) => s.rebase(new_base),
            Self::Insert(s) => s.rebase(new_base),
            Self::Update(s) => s.rebase(new_base),
            Self::Delete(s) => s.rebase(new_base),
        }
    }

    const fn core(&self) -> &StatementCore {
        match self {
            Self::Select(s) => &s.core,
            Self::Insert(s) => &s.core,
            Self::Update(s) => &s.core,
            Self::Delete(s) => &s.core,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl From<SelectStatement> for Statement {
    fn from(s: SelectStatement) -> Self {
        Self::Select(s)
    }
}

impl From<InsertStatement> for Statement {
    fn from(s: InsertStatement) -> Self {
        Self::Insert(s)
    }
}

impl From<UpdateStatement> for Statement {
    fn from(s: UpdateStatement) -> Self {
        Self::Update(s)
    }
}

impl From<DeleteStatement> for Statement {
    fn from(s: DeleteStatement) -> Self {
        Self::Delete(s)
    }
}
