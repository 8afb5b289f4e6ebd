use crate::{
    db::statement::{Context, Rendered, StatementCore, WhereClause, clause::quote},
    error::ConfigurationError,
};
use std::fmt;

///
/// OrderTerm
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderTerm {
    pub column: String,
    pub descending: bool,
}

impl OrderTerm {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.descending { "DESC" } else { "ASC" };

        write!(f, "{} {direction}", quote(&self.column))
    }
}

///
/// SelectStatement
///
/// `SELECT [COUNT(*) | fields | *] FROM t [WHERE] [ORDER BY] [LIMIT] [ALLOW FILTERING]`
/// Ordering and limit are dropped in count mode.
///

#[derive(Clone, Debug)]
pub struct SelectStatement {
    pub(crate) core: StatementCore,
    fields: Vec<String>,
    count: bool,
    order_by: Vec<OrderTerm>,
    limit: Option<u32>,
    allow_filtering: bool,
}

impl SelectStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            core: StatementCore::new(table),
            fields: Vec::new(),
            count: false,
            order_by: Vec::new(),
            limit: None,
            allow_filtering: false,
        }
    }

    ///
    /// BUILDER
    ///

    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self.core.invalidate();
        self
    }

    #[must_use]
    pub fn count(mut self) -> Self {
        self.count = true;
        self.core.invalidate();
        self
    }

    #[must_use]
    pub fn order_by(mut self, terms: Vec<OrderTerm>) -> Self {
        self.order_by = terms;
        self.core.invalidate();
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self.core.invalidate();
        self
    }

    #[must_use]
    pub fn allow_filtering(mut self, allow: bool) -> Self {
        self.allow_filtering = allow;
        self.core.invalidate();
        self
    }

    pub fn add_where_clause(&mut self, clause: WhereClause) -> Result<(), ConfigurationError> {
        self.core.add_where(clause)
    }

    ///
    /// ACCESSORS
    ///

    #[must_use]
    pub const fn is_count(&self) -> bool {
        self.count
    }

    #[must_use]
    pub fn where_clauses(&self) -> &[WhereClause] {
        &self.core.where_clauses
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
        self.core.rebase(new_base, std::iter::empty());
    }

    ///
    /// RENDERING
    ///

    fn rendered(&self) -> &Rendered {
        self.core.rendered(|| self.render())
    }

    fn render(&self) -> Rendered {
        let mut parts = vec!["SELECT".to_string()];

        if self.count {
            parts.push("COUNT(*)".to_string());
        } else if self.fields.is_empty() {
            parts.push("*".to_string());
        } else {
            let fields: Vec<_> = self.fields.iter().map(|f| quote(f)).collect();
            parts.push(fields.join(", "));
        }

        parts.push(format!("FROM {}", self.core.table));
        parts.extend(self.core.where_text());

        if !self.count {
            if !self.order_by.is_empty() {
                let terms: Vec<_> = self.order_by.iter().map(ToString::to_string).collect();
                parts.push(format!("ORDER BY {}", terms.join(", ")));
            }
            if let Some(limit) = self.limit {
                parts.push(format!("LIMIT {limit}"));
            }
        }

        if self.allow_filtering {
            parts.push("ALLOW FILTERING".to_string());
        }

        let mut context = Context::new();
        self.core.where_context(&mut context);

        Rendered {
            text: parts.join(" "),
            context,
        }
    }
}
