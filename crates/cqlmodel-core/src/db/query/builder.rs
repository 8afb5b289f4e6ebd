use crate::{
    db::{function::QueryValue, operator::WhereOperator, statement::WhereClause},
    value::Value,
};

/// Virtual column comparing the partition token.
pub const PK_TOKEN: &str = "pk__token";

///
/// ColumnRef
///
/// Zero-cost wrapper around a static field name used in filters.
/// Builds where clauses by method instead of operator overloading.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ColumnRef(&'static str);

/// Shorthand for `ColumnRef::new`.
#[must_use]
pub const fn col(name: &'static str) -> ColumnRef {
    ColumnRef::new(name)
}

/// The partition token of the queried table.
#[must_use]
pub const fn pk_token() -> ColumnRef {
    ColumnRef::new(PK_TOKEN)
}

impl ColumnRef {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    // ------------------------------------------------------------------
    // Comparisons
    // ------------------------------------------------------------------

    #[must_use]
    pub fn eq(self, value: impl Into<QueryValue>) -> WhereClause {
        self.compare(WhereOperator::Eq, value.into())
    }

    #[must_use]
    pub fn gt(self, value: impl Into<QueryValue>) -> WhereClause {
        self.compare(WhereOperator::Gt, value.into())
    }

    #[must_use]
    pub fn gte(self, value: impl Into<QueryValue>) -> WhereClause {
        self.compare(WhereOperator::Gte, value.into())
    }

    #[must_use]
    pub fn lt(self, value: impl Into<QueryValue>) -> WhereClause {
        self.compare(WhereOperator::Lt, value.into())
    }

    #[must_use]
    pub fn lte(self, value: impl Into<QueryValue>) -> WhereClause {
        self.compare(WhereOperator::Lte, value.into())
    }

    /// Membership test against a fixed list, bound as one placeholder.
    #[must_use]
    pub fn in_list<I, V>(self, values: I) -> WhereClause
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.compare(WhereOperator::In, QueryValue::Value(Value::list(values)))
    }

    pub(crate) fn compare(self, operator: WhereOperator, value: QueryValue) -> WhereClause {
        if self.0 == PK_TOKEN {
            // partition columns are filled in when the query set resolves it
            WhereClause::token(Vec::new(), operator, value)
        } else {
            WhereClause::new(self.0, operator, value)
        }
    }
}
