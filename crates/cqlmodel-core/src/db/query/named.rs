use crate::{
    db::{
        executor::{Consistency, ResultSet},
        function::QueryValue,
        operator::WhereOperator,
        query::{builder::PK_TOKEN, queryset::parse_filter_arg, results::resolve_index},
        session::Session,
        statement::{OrderTerm, SelectStatement, WhereClause, WhereTarget},
    },
    error::{Error, QueryError},
    value::Value,
};
use derive_more::{Deref, IntoIterator};
use parking_lot::Mutex;
use std::{collections::BTreeMap, fmt, sync::OnceLock};
use tracing::instrument;

///
/// NamedKeyspace
/// A keyspace addressed by name, with no models declared for it.
///

#[derive(Clone, Debug)]
pub struct NamedKeyspace {
    session: Session,
    name: String,
}

impl NamedKeyspace {
    pub(crate) const fn new(session: Session, name: String) -> Self {
        Self { session, name }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn table(&self, name: impl Into<String>) -> NamedTable {
        NamedTable::new(self.session.clone(), self.name.clone(), name.into())
    }
}

///
/// NamedTable
///
/// A table addressed by keyspace and name instead of a `TableModel`.
/// Columns are taken as written and values are bound unchanged; rows come
/// back as `Row` maps keyed by stored column name.
///

#[derive(Clone, Debug)]
pub struct NamedTable {
    session: Session,
    keyspace: String,
    name: String,
}

impl NamedTable {
    pub(crate) const fn new(session: Session, keyspace: String, name: String) -> Self {
        Self {
            session,
            keyspace,
            name,
        }
    }

    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn column_family_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.name)
    }

    #[must_use]
    pub fn objects(&self) -> NamedQuerySet {
        NamedQuerySet::new(self)
    }

    #[must_use]
    pub fn all(&self) -> NamedQuerySet {
        self.objects()
    }

    pub fn filter(
        &self,
        clauses: impl IntoIterator<Item = WhereClause>,
    ) -> Result<NamedQuerySet, Error> {
        self.objects().filter(clauses)
    }

    /// The single row matching `clauses`.
    pub fn get(&self, clauses: impl IntoIterator<Item = WhereClause>) -> Result<Row, Error> {
        self.filter(clauses)?.get().cloned()
    }
}

///
/// Row
/// One result row of a named table, keyed by stored column name.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    fn from_result(columns: &[String], values: Vec<Value>) -> Self {
        Self(columns.iter().cloned().zip(values).collect())
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

///
/// NamedQuerySet
///
/// Immutable query description over a `NamedTable`. There is no column
/// metadata to check against, so the key and index guardrails of
/// `QuerySet` do not apply here; filters, ordering, and projections are
/// rendered as given. Reads are cached like `QuerySet`.
///

pub struct NamedQuerySet {
    session: Session,
    column_family: String,
    table: String,
    where_clauses: Vec<WhereClause>,
    order: Vec<OrderTerm>,
    limit: Option<u32>,
    allow_filtering: bool,
    fields: Vec<String>,
    consistency: Option<Consistency>,
    cache: OnceLock<Vec<Row>>,
    fetching: Mutex<()>,
}

impl NamedQuerySet {
    fn new(table: &NamedTable) -> Self {
        Self {
            session: table.session.clone(),
            column_family: table.column_family_name(),
            table: table.name.clone(),
            where_clauses: Vec::new(),
            order: Vec::new(),
            limit: table.session.config().default_limit,
            allow_filtering: false,
            fields: Vec::new(),
            consistency: None,
            cache: OnceLock::new(),
            fetching: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn column_family_name(&self) -> &str {
        &self.column_family
    }

    #[must_use]
    pub fn where_clauses(&self) -> &[WhereClause] {
        &self.where_clauses
    }

    fn derive(&self, apply: impl FnOnce(&mut Self)) -> Self {
        let mut clone = self.clone();
        apply(&mut clone);
        clone
    }

    ///
    /// FILTERING
    ///

    pub fn filter(&self, clauses: impl IntoIterator<Item = WhereClause>) -> Result<Self, Error> {
        let mut clone = self.clone();
        for clause in clauses {
            clone.where_clauses.push(self.resolve_clause(&clause)?);
        }

        Ok(clone)
    }

    /// Append one `column[__operator]` filter.
    pub fn filter_by(&self, arg: &str, value: impl Into<QueryValue>) -> Result<Self, Error> {
        let (name, operator) = parse_filter_arg(arg)?;
        let operator = self.session.operators().resolve(operator)?;

        self.filter([WhereClause::new(name, operator, value.into())])
    }

    pub fn filters<'a, I, V>(&self, args: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<QueryValue>,
    {
        let mut clone = self.clone();
        for (arg, value) in args {
            clone = clone.filter_by(arg, value)?;
        }

        Ok(clone)
    }

    // Values pass through unchanged; only the clause shape is checked.
    fn resolve_clause(&self, clause: &WhereClause) -> Result<WhereClause, QueryError> {
        let name = match clause.target() {
            WhereTarget::Column(name) if name != PK_TOKEN => name,
            _ => {
                return Err(QueryError::TokenOnNamedTable {
                    table: self.table.clone(),
                });
            }
        };
        let operator = clause.operator();

        let value = match clause.value() {
            QueryValue::Token(_) => {
                return Err(QueryError::TokenOnColumn {
                    column: name.clone(),
                });
            }
            QueryValue::Value(value) if operator == WhereOperator::In => {
                let items = value.as_items().ok_or_else(|| QueryError::NonListInValue {
                    column: name.clone(),
                })?;

                QueryValue::Value(Value::List(items.to_vec()))
            }
            other => other.clone(),
        };

        Ok(WhereClause::new(name.clone(), operator, value))
    }

    ///
    /// SHAPING
    ///

    /// Order by the given columns; a `-` prefix sorts descending.
    pub fn order_by(&self, columns: &[&str]) -> Result<Self, QueryError> {
        let mut terms = Vec::with_capacity(columns.len());
        for column in columns {
            let term = match column.strip_prefix('-') {
                Some(name) => OrderTerm::desc(name),
                None => OrderTerm::asc(*column),
            };
            if term.column.is_empty() {
                return Err(QueryError::UnknownColumn {
                    column: (*column).to_string(),
                });
            }
            terms.push(term);
        }

        Ok(self.derive(|q| q.order = terms))
    }

    pub fn limit(&self, limit: Option<i64>) -> Result<Self, QueryError> {
        let limit = match limit {
            Some(n) if n < 0 => return Err(QueryError::NegativeLimit { limit: n }),
            Some(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
            None => None,
        };

        Ok(self.derive(|q| q.limit = limit))
    }

    #[must_use]
    pub fn allow_filtering(&self) -> Self {
        self.derive(|q| q.allow_filtering = true)
    }

    /// Select only these columns.
    pub fn only(&self, columns: &[&str]) -> Result<Self, QueryError> {
        if !self.fields.is_empty() {
            return Err(QueryError::ProjectionAlreadySet);
        }
        let fields = columns.iter().map(ToString::to_string).collect();

        Ok(self.derive(|q| q.fields = fields))
    }

    #[must_use]
    pub fn consistency(&self, consistency: Consistency) -> Self {
        self.derive(|q| q.consistency = Some(consistency))
    }

    /// Fresh copy with an empty result cache.
    #[must_use]
    pub fn all(&self) -> Self {
        self.clone()
    }

    pub fn select_query(&self) -> Result<SelectStatement, Error> {
        let mut select = SelectStatement::new(self.column_family.clone())
            .fields(self.fields.clone())
            .order_by(self.order.clone())
            .limit(self.limit)
            .allow_filtering(self.allow_filtering);
        for clause in &self.where_clauses {
            select.add_where_clause(clause.detached())?;
        }

        Ok(select)
    }

    ///
    /// READS
    ///

    fn results(&self) -> Result<&[Row], Error> {
        if let Some(rows) = self.cache.get() {
            return Ok(rows);
        }

        let _first = self.fetching.lock();
        if let Some(rows) = self.cache.get() {
            return Ok(rows);
        }
        let ResultSet { columns, rows } = self.fetch()?;
        let rows = rows
            .into_iter()
            .map(|values| Row::from_result(&columns, values))
            .collect();

        Ok(self.cache.get_or_init(|| rows))
    }

    #[instrument(name = "cqlmodel::named::fetch", level = "debug", skip(self))]
    fn fetch(&self) -> Result<ResultSet, Error> {
        let select = self.select_query()?;

        self.session.execute(&select.into(), self.consistency)
    }

    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.results()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Row at `index`; negative values count from the end.
    pub fn row(&self, index: isize) -> Result<&Row, Error> {
        let rows = self.results()?;

        Ok(&rows[resolve_index(index, rows.len())?])
    }

    pub fn iter(&self) -> Result<impl Iterator<Item = &Row>, Error> {
        Ok(self.results()?.iter())
    }

    pub fn first(&self) -> Result<Option<&Row>, Error> {
        Ok(self.results()?.first())
    }

    /// The single matching row.
    pub fn get(&self) -> Result<&Row, Error> {
        match self.results()? {
            [] => Err(Error::DoesNotExist {
                table: self.table.clone(),
            }),
            [row] => Ok(row),
            rows => Err(Error::MultipleObjectsReturned {
                table: self.table.clone(),
                count: rows.len(),
            }),
        }
    }

    /// Row count from the cache, or a `COUNT(*)` select.
    #[instrument(name = "cqlmodel::named::count", level = "debug", skip(self))]
    pub fn count(&self) -> Result<u64, Error> {
        if let Some(rows) = self.cache.get() {
            return Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX));
        }

        let select = self.select_query()?.count();
        let result = self.session.execute(&select.into(), self.consistency)?;

        result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_int)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| QueryError::UnexpectedCountResult.into())
    }
}

impl Clone for NamedQuerySet {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            column_family: self.column_family.clone(),
            table: self.table.clone(),
            where_clauses: self.where_clauses.clone(),
            order: self.order.clone(),
            limit: self.limit,
            allow_filtering: self.allow_filtering,
            fields: self.fields.clone(),
            consistency: self.consistency,
            cache: OnceLock::new(),
            fetching: Mutex::new(()),
        }
    }
}

impl fmt::Debug for NamedQuerySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedQuerySet")
            .field("table", &self.column_family)
            .field("where_clauses", &self.where_clauses)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
