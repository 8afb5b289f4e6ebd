use crate::{
    db::{
        batch::BatchQuery,
        executor::{Consistency, ResultSet},
        function::QueryValue,
        operator::WhereOperator,
        query::{
            builder::PK_TOKEN,
            dml::DmlQuery,
            results::{ResultCache, resolve_index},
        },
        session::Session,
        statement::{
            AssignmentClause, CounterUpdateClause, DeleteStatement, FieldDeleteClause, OrderTerm,
            SelectStatement, Statement, UpdateStatement, WhereClause, WhereTarget,
        },
    },
    error::{ConfigurationError, Error, QueryError, ValidationError},
    model::{ColumnKind, ColumnModel, Instance, Model, TableModel},
    value::Value,
};
use parking_lot::Mutex;
use std::{fmt, ops::Range, sync::OnceLock};
use tracing::instrument;

///
/// Projection
/// Column restriction applied to selects.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Projection {
    #[default]
    All,
    Only(Vec<&'static str>),
    Defer(Vec<&'static str>),
}

///
/// QuerySet
///
/// Immutable description of a read or bulk write against model `M`.
/// Every mutator returns a new query set; the receiver is never changed.
///
/// The first read executes one select and caches its rows; later reads
/// reuse the cache, including reads racing on a shared query set. Clones
/// start with an empty cache.
///

pub struct QuerySet<M: Model> {
    session: Session,
    where_clauses: Vec<WhereClause>,
    order: Vec<OrderTerm>,
    limit: Option<u32>,
    allow_filtering: bool,
    projection: Projection,
    batch: Option<BatchQuery>,
    ttl: Option<u32>,
    consistency: Option<Consistency>,
    if_not_exists: bool,
    invalid_table: Option<ConfigurationError>,
    cache: OnceLock<ResultCache<M>>,
    fetching: Mutex<()>,
}

impl<M: Model> QuerySet<M> {
    pub(crate) fn new(session: Session) -> Self {
        let limit = session.config().default_limit;

        Self {
            session,
            where_clauses: Vec::new(),
            order: Vec::new(),
            limit,
            allow_filtering: false,
            projection: Projection::All,
            batch: None,
            ttl: None,
            consistency: None,
            if_not_exists: false,
            invalid_table: Self::table().validate().err(),
            cache: OnceLock::new(),
            fetching: Mutex::new(()),
        }
    }

    const fn table() -> &'static TableModel {
        M::TABLE
    }

    #[must_use]
    pub fn column_family_name(&self) -> String {
        self.session.column_family_name(Self::table())
    }

    #[must_use]
    pub fn where_clauses(&self) -> &[WhereClause] {
        &self.where_clauses
    }

    #[must_use]
    pub const fn limit_value(&self) -> Option<u32> {
        self.limit
    }

    #[must_use]
    pub const fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Table model errors found when the query set was created.
    fn check_table(&self) -> Result<(), ConfigurationError> {
        self.invalid_table.clone().map_or(Ok(()), Err)
    }

    fn derive(&self, apply: impl FnOnce(&mut Self)) -> Self {
        let mut clone = self.clone();
        apply(&mut clone);
        clone
    }

    ///
    /// FILTERING
    ///

    /// Append where clauses built with `col(..)`.
    pub fn filter(&self, clauses: impl IntoIterator<Item = WhereClause>) -> Result<Self, Error> {
        self.check_table()?;

        let mut clone = self.clone();
        for clause in clauses {
            clone.where_clauses.push(Self::resolve_clause(&clause)?);
        }

        Ok(clone)
    }

    /// Append one `field[__operator]` filter.
    pub fn filter_by(&self, arg: &str, value: impl Into<QueryValue>) -> Result<Self, Error> {
        let (name, operator) = parse_filter_arg(arg)?;
        let operator = self.session.operators().resolve(operator)?;
        let clause = if name == PK_TOKEN {
            WhereClause::token(Vec::new(), operator, value.into())
        } else {
            WhereClause::new(name, operator, value.into())
        };

        self.filter([clause])
    }

    /// Append several `field[__operator]` filters in order.
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

    /// Resolve field names to stored columns and values to database shape.
    fn resolve_clause(clause: &WhereClause) -> Result<WhereClause, Error> {
        let table = Self::table();
        let operator = clause.operator();

        match clause.target() {
            WhereTarget::Token(_) => {
                let QueryValue::Token(values) = clause.value() else {
                    return Err(QueryError::TokenRequiresTokenValue.into());
                };

                let partition = table.partition_keys();
                if partition.len() != values.len() {
                    return Err(QueryError::TokenArity {
                        expected: partition.len(),
                        found: values.len(),
                    }
                    .into());
                }

                let values = partition
                    .iter()
                    .zip(values)
                    .map(|(column, value)| column.to_database(value.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                let columns = partition
                    .iter()
                    .map(|c| c.db_field_name().to_string())
                    .collect();

                Ok(WhereClause::token(columns, operator, QueryValue::Token(values)))
            }

            WhereTarget::Column(name) => {
                let column = table.column(name).ok_or_else(|| QueryError::UnknownColumn {
                    column: name.clone(),
                })?;

                let value = match clause.value() {
                    QueryValue::Token(_) => {
                        return Err(QueryError::TokenOnColumn {
                            column: name.clone(),
                        }
                        .into());
                    }
                    QueryValue::Value(value) if operator == WhereOperator::In => {
                        let Some(items) = value.as_items() else {
                            return Err(QueryError::NonListInValue {
                                column: name.clone(),
                            }
                            .into());
                        };
                        let items = items
                            .iter()
                            .map(|item| column.to_database(item.clone()))
                            .collect::<Result<Vec<_>, _>>()?;

                        QueryValue::Value(Value::List(items))
                    }
                    QueryValue::Value(value) => QueryValue::Value(column.to_database(value.clone())?),
                    function => function.clone(),
                };

                Ok(WhereClause::new(column.db_field_name(), operator, value))
            }
        }
    }

    /// Guard against full-cluster scans.
    ///
    /// A filtered select needs an equality or IN comparison on a primary
    /// key or indexed column (or a token comparison). Without
    /// `allow_filtering()` it additionally needs the equality to pin an
    /// indexed column or the partition key.
    fn validate_select_where(&self) -> Result<(), QueryError> {
        if self.where_clauses.is_empty() {
            return Ok(());
        }

        let table = Self::table();
        let token = self.where_clauses.iter().any(WhereClause::is_token);
        let equal: Vec<&ColumnModel> = self
            .where_clauses
            .iter()
            .filter(|w| w.operator().is_equality())
            .filter_map(|w| w.field().and_then(|f| table.column(f)))
            .collect();

        if !token && !equal.iter().any(|c| c.is_primary_key || c.is_indexed) {
            return Err(QueryError::MissingEqualityFilter);
        }

        if !self.allow_filtering
            && !token
            && !equal
                .iter()
                .any(|c| c.is_indexed || table.is_partition_key(c))
        {
            return Err(QueryError::ClusteringWithoutPartition);
        }

        Ok(())
    }

    /// Bulk update and delete must pin the partition.
    fn require_partition_filter(&self, operation: &'static str) -> Result<(), QueryError> {
        let table = Self::table();
        let pinned = self.where_clauses.iter().any(|w| {
            w.is_token()
                || (w.operator().is_equality()
                    && w.field()
                        .and_then(|f| table.column(f))
                        .is_some_and(|c| table.is_partition_key(c)))
        });

        if pinned {
            Ok(())
        } else {
            Err(QueryError::MissingPartitionKey { operation })
        }
    }

    ///
    /// SHAPING
    ///

    /// Order by clustering columns; a `-` prefix sorts descending.
    /// An empty list clears the ordering.
    pub fn order_by(&self, fields: &[&str]) -> Result<Self, Error> {
        if fields.is_empty() {
            return Ok(self.derive(|q| q.order.clear()));
        }

        let table = Self::table();
        let mut terms = Vec::with_capacity(fields.len());
        for field in fields {
            let (name, descending) = match field.strip_prefix('-') {
                Some(name) => (name, true),
                None => (*field, false),
            };

            let column = table.column(name).ok_or_else(|| QueryError::UnknownColumn {
                column: name.to_string(),
            })?;
            if !column.is_primary_key {
                return Err(QueryError::OrderOnNonPrimaryKey {
                    column: name.to_string(),
                }
                .into());
            }
            if table.is_partition_key(column) {
                return Err(QueryError::OrderOnPartitionKey {
                    column: name.to_string(),
                }
                .into());
            }

            terms.push(OrderTerm {
                column: column.db_field_name().to_string(),
                descending,
            });
        }

        Ok(self.derive(|q| q.order.extend(terms)))
    }

    /// Row cap; `None` removes it. Negative values are rejected.
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

    /// Select only these fields.
    pub fn only(&self, fields: &[&str]) -> Result<Self, QueryError> {
        let fields = self.projection_fields(fields)?;

        Ok(self.derive(|q| q.projection = Projection::Only(fields)))
    }

    /// Select every field except these.
    pub fn defer(&self, fields: &[&str]) -> Result<Self, QueryError> {
        let fields = self.projection_fields(fields)?;

        Ok(self.derive(|q| q.projection = Projection::Defer(fields)))
    }

    fn projection_fields(&self, fields: &[&str]) -> Result<Vec<&'static str>, QueryError> {
        if self.projection != Projection::All {
            return Err(QueryError::ProjectionAlreadySet);
        }

        Self::known_fields(fields)
    }

    fn known_fields(fields: &[&str]) -> Result<Vec<&'static str>, QueryError> {
        let table = Self::table();
        let missing: Vec<&str> = fields
            .iter()
            .copied()
            .filter(|f| table.column(f).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(QueryError::UnknownFields {
                fields: missing.join(", "),
                table: table.name.to_string(),
            });
        }

        Ok(fields
            .iter()
            .filter_map(|f| table.column(f))
            .map(|c| c.name)
            .collect())
    }

    fn select_fields(&self) -> Vec<&'static str> {
        let table = Self::table();
        let db_name = |name: &str| table.column(name).map(ColumnModel::db_field_name);

        match &self.projection {
            Projection::All => Vec::new(),
            Projection::Only(fields) => fields.iter().filter_map(|f| db_name(f)).collect(),
            Projection::Defer(fields) => table
                .columns
                .iter()
                .filter(|c| !fields.contains(&c.name))
                .map(ColumnModel::db_field_name)
                .collect(),
        }
    }

    ///
    /// WRITE OPTIONS
    ///

    #[must_use]
    pub fn consistency(&self, consistency: Consistency) -> Self {
        self.derive(|q| q.consistency = Some(consistency))
    }

    #[must_use]
    pub fn ttl(&self, ttl: Option<u32>) -> Self {
        self.derive(|q| q.ttl = ttl)
    }

    /// Conditional insert for `create`; not available on counter tables.
    pub fn if_not_exists(&self) -> Result<Self, QueryError> {
        if Self::table().has_counter() {
            return Err(QueryError::IfNotExistsWithCounter {
                table: Self::table().name.to_string(),
            });
        }

        Ok(self.derive(|q| q.if_not_exists = true))
    }

    /// Route writes into `batch`. Reads on the result fail.
    #[must_use]
    pub fn batch(&self, batch: &BatchQuery) -> Self {
        let batch = batch.clone();

        self.derive(|q| q.batch = Some(batch))
    }

    /// Fresh copy with an empty result cache.
    #[must_use]
    pub fn all(&self) -> Self {
        self.clone()
    }

    ///
    /// STATEMENTS
    ///

    /// Select statement for the current description.
    pub fn select_query(&self) -> Result<SelectStatement, Error> {
        self.check_table()?;
        self.validate_select_where()?;

        let mut select = SelectStatement::new(self.column_family_name())
            .fields(self.select_fields())
            .order_by(self.order.clone())
            .limit(self.limit)
            .allow_filtering(self.allow_filtering);
        for clause in &self.where_clauses {
            select.add_where_clause(clause.detached())?;
        }

        Ok(select)
    }

    fn add_where(&self, statement: &mut Statement) -> Result<(), Error> {
        for clause in &self.where_clauses {
            let clause = clause.detached();
            match statement {
                Statement::Select(s) => s.add_where_clause(clause)?,
                Statement::Insert(s) => s.add_where_clause(clause)?,
                Statement::Update(s) => s.add_where_clause(clause)?,
                Statement::Delete(s) => s.add_where_clause(clause)?,
            }
        }

        Ok(())
    }

    fn execute(&self, statement: Statement) -> Result<ResultSet, Error> {
        match &self.batch {
            Some(batch) => {
                batch.add(statement)?;
                Ok(ResultSet::empty())
            }
            None => self.session.execute(&statement, self.consistency),
        }
    }

    ///
    /// READS
    ///

    fn ensure_readable(&self) -> Result<(), QueryError> {
        if self.batch.is_some() {
            return Err(QueryError::BatchRead);
        }

        Ok(())
    }

    fn results(&self) -> Result<&ResultCache<M>, Error> {
        self.ensure_readable()?;
        if let Some(cache) = self.cache.get() {
            return Ok(cache);
        }

        let _first = self.fetching.lock();
        if let Some(cache) = self.cache.get() {
            return Ok(cache);
        }
        let result = self.fetch()?;

        Ok(self.cache.get_or_init(|| ResultCache::new(result)))
    }

    #[instrument(name = "cqlmodel::query::fetch", level = "debug", skip(self))]
    fn fetch(&self) -> Result<ResultSet, Error> {
        let select = self.select_query()?;

        self.session.execute(&select.into(), self.consistency)
    }

    /// Number of rows; executes the select on first use.
    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.results()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Row at `index`; negative values count from the end.
    pub fn row(&self, index: isize) -> Result<&M, Error> {
        let cache = self.results()?;

        cache.get(resolve_index(index, cache.len())?)
    }

    /// Rows in `range`, clamped to the result length.
    pub fn slice(&self, range: Range<usize>) -> Result<Vec<&M>, Error> {
        let cache = self.results()?;
        let end = range.end.min(cache.len());
        let start = range.start.min(end);

        (start..end).map(|i| cache.get(i)).collect()
    }

    /// Lazily converted rows in result order.
    pub fn iter(&self) -> Result<impl Iterator<Item = Result<&M, Error>>, Error> {
        let cache = self.results()?;

        Ok((0..cache.len()).map(move |i| cache.get(i)))
    }

    pub fn first(&self) -> Result<Option<&M>, Error> {
        let cache = self.results()?;
        if cache.len() == 0 {
            return Ok(None);
        }

        cache.get(0).map(Some)
    }

    /// The single matching row.
    pub fn get(&self) -> Result<&M, Error> {
        let cache = self.results()?;

        match cache.len() {
            0 => Err(Error::DoesNotExist {
                table: Self::table().name.to_string(),
            }),
            1 => cache.get(0),
            count => Err(Error::MultipleObjectsReturned {
                table: Self::table().name.to_string(),
                count,
            }),
        }
    }

    /// Row count. Uses the cached rows when present, otherwise issues a
    /// `COUNT(*)` select.
    #[instrument(name = "cqlmodel::query::count", level = "debug", skip(self))]
    pub fn count(&self) -> Result<u64, Error> {
        self.ensure_readable()?;
        if let Some(cache) = self.cache.get() {
            return Ok(u64::try_from(cache.len()).unwrap_or(u64::MAX));
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

    /// Rows as converted value tuples for `fields`, in field order.
    pub fn values_list(&self, fields: &[&str]) -> Result<Vec<Vec<Value>>, Error> {
        self.ensure_readable()?;

        let mut projected = self.clone();
        projected.projection = Projection::Only(Self::known_fields(fields)?);
        let result = projected.fetch()?;
        let table = Self::table();
        let columns: Vec<Option<&ColumnModel>> =
            result.columns.iter().map(|c| table.column(c)).collect();

        Ok(result
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&columns)
                    .map(|(raw, column)| match column {
                        Some(column) => column.decode(raw),
                        None => raw,
                    })
                    .collect()
            })
            .collect())
    }

    /// Single-field variant of `values_list`.
    pub fn flat_values_list(&self, field: &str) -> Result<Vec<Value>, Error> {
        let rows = self.values_list(&[field])?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    ///
    /// WRITES
    ///

    fn dml(&self) -> DmlQuery {
        let mut dml = DmlQuery::new(self.session.clone())
            .ttl(self.ttl)
            .if_not_exists(self.if_not_exists);
        if let Some(consistency) = self.consistency {
            dml = dml.consistency(consistency);
        }
        if let Some(batch) = &self.batch {
            dml = dml.batch(batch);
        }

        dml
    }

    /// Build, save, and return a new row.
    pub fn create<'a, I, V>(&self, values: I) -> Result<M, Error>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Value>,
    {
        self.check_table()?;

        let mut instance = Instance::from_values(Self::table(), values)?;
        self.dml().save(&mut instance)?;

        M::construct_instance(instance)
    }

    /// Update every matching row. Null values delete the column in a
    /// second statement. Counter values are applied as increments.
    pub fn update<'a, I, V>(&self, values: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Value>,
    {
        self.check_table()?;

        let table = Self::table();
        let mut assignments = Vec::new();
        let mut nulled = Vec::new();

        for (name, value) in values {
            let value = value.into();
            let column = table.column(name).ok_or_else(|| ValidationError::UnknownColumn {
                table: table.name.to_string(),
                column: name.to_string(),
            })?;
            if column.is_primary_key {
                return Err(ValidationError::PrimaryKeyUpdate {
                    column: name.to_string(),
                }
                .into());
            }

            column.validate(&value)?;
            if value.is_null() {
                nulled.push(column.db_field_name());
                continue;
            }
            assignments.push((column, column.to_database(value)?));
        }

        if assignments.is_empty() && nulled.is_empty() {
            return Ok(());
        }
        self.require_partition_filter("update")?;

        if !assignments.is_empty() {
            let mut update = UpdateStatement::new(self.column_family_name()).ttl(self.ttl);
            for (column, value) in assignments {
                let field = column.db_field_name();
                if column.kind == ColumnKind::Counter {
                    let delta = value.as_int().unwrap_or_default();
                    update.add_assignment_clause(CounterUpdateClause::new(field, delta, 0)?)?;
                } else {
                    update.add_assignment_clause(AssignmentClause::new(field, value))?;
                }
            }

            let mut statement = Statement::Update(update);
            self.add_where(&mut statement)?;
            self.execute(statement)?;
        }

        if !nulled.is_empty() {
            let mut delete = DeleteStatement::new(self.column_family_name());
            for field in nulled {
                delete.add_field(FieldDeleteClause::new(field))?;
            }

            let mut statement = Statement::Delete(delete);
            self.add_where(&mut statement)?;
            self.execute(statement)?;
        }

        Ok(())
    }

    /// Delete every matching row.
    pub fn delete(&self) -> Result<(), Error> {
        self.check_table()?;
        self.require_partition_filter("delete")?;

        let mut statement = Statement::Delete(DeleteStatement::new(self.column_family_name()));
        self.add_where(&mut statement)?;
        self.execute(statement)?;

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn converted_rows(&self) -> usize {
        self.cache.get().map_or(0, ResultCache::converted)
    }
}

impl<M: Model> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            where_clauses: self.where_clauses.clone(),
            order: self.order.clone(),
            limit: self.limit,
            allow_filtering: self.allow_filtering,
            projection: self.projection.clone(),
            batch: self.batch.clone(),
            ttl: self.ttl,
            consistency: self.consistency,
            if_not_exists: self.if_not_exists,
            invalid_table: self.invalid_table.clone(),
            cache: OnceLock::new(),
            fetching: Mutex::new(()),
        }
    }
}

impl<M: Model> fmt::Debug for QuerySet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("table", &Self::table().name)
            .field("where_clauses", &self.where_clauses)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("allow_filtering", &self.allow_filtering)
            .field("projection", &self.projection)
            .field("batched", &self.batch.is_some())
            .finish_non_exhaustive()
    }
}

/// Split `field__op` on the last `__`; the token pseudo-column keeps its
/// own double underscore.
pub(super) fn parse_filter_arg(arg: &str) -> Result<(&str, Option<&str>), QueryError> {
    let unparsable = || QueryError::UnparsableFilter {
        filter: arg.to_string(),
    };

    let (name, operator) = match arg.strip_prefix(PK_TOKEN) {
        Some("") => (PK_TOKEN, None),
        Some(rest) => match rest.strip_prefix("__") {
            Some(op) => (PK_TOKEN, Some(op)),
            None => (arg, None),
        },
        None => match arg.rsplit_once("__") {
            Some((name, op)) => (name, Some(op)),
            None => (arg, None),
        },
    };

    if name.is_empty() || operator.is_some_and(str::is_empty) {
        return Err(unparsable());
    }

    Ok((name, operator))
}

