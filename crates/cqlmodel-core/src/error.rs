use crate::{config::ConfigError, db::operator::WhereOperator};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level error surfaced by query sets, DML queries, batches, and the
/// session. Every layer error converts into it with `?`.
///

#[remain::sorted]
#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{table} matching query does not exist")]
    DoesNotExist { table: String },

    #[error("{count} objects found in {table}")]
    MultipleObjectsReturned { table: String, count: usize },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Stable classification of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::Configuration(_) => ErrorClass::Configuration,
            Self::DoesNotExist { .. } | Self::MultipleObjectsReturned { .. } => {
                ErrorClass::Cardinality
            }
            Self::Query(_) => ErrorClass::Query,
            Self::Transport(_) => ErrorClass::Transport,
            Self::Validation(_) => ErrorClass::Validation,
        }
    }
}

///
/// ErrorClass
/// Error taxonomy for caller-side classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Configuration,
    Query,
    Validation,
    Cardinality,
    Transport,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Query => "query",
            Self::Validation => "validation",
            Self::Cardinality => "cardinality",
            Self::Transport => "transport",
        };
        write!(f, "{label}")
    }
}

///
/// ConfigurationError
///
/// Programmer misuse of statements, clauses, batches, or table models.
/// Never retried; raised at the call that misused the API.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ConfigurationError {
    #[error("batch is already executing; wait for the command in flight")]
    BatchInFlight,

    #[error("container delta clause for '{field}' cannot be used in an insert statement")]
    ContainerInInsert { field: String },

    #[error("column '{field}' is not a {expected} column")]
    ContainerKindMismatch { field: String, expected: &'static str },

    #[error("clause already has context id {id}")]
    ContextIdAttached { id: usize },

    #[error("{table} defines the column '{column}' more than once")]
    DuplicateColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table} does not define a primary key")]
    MissingPrimaryKey { table: &'static str },

    #[error("operator name '{name}' is already registered to {existing:?}, not {requested:?}")]
    OperatorCollision {
        name: String,
        existing: WhereOperator,
        requested: WhereOperator,
    },

    #[error("select statements cannot be added to a batch")]
    SelectInBatch,

    #[error("statement has already been rendered and can no longer be modified")]
    StatementRendered,

    #[error("cannot add where clauses to insert statements")]
    WhereClauseOnInsert,
}

///
/// QueryError
///
/// Invalid query construction. Messages name the offending field or operator.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("only inserts, updates, and deletes are available in batch mode")]
    BatchRead,

    #[error(
        "filtering on a clustering key without a partition key is not allowed unless allow_filtering() is called"
    )]
    ClusteringWithoutPartition,

    #[error("if_not_exists cannot be used with counter columns ({table})")]
    IfNotExistsWithCounter { table: String },

    #[error("index {index} out of range for {len} rows")]
    IndexOutOfRange { index: isize, len: usize },

    #[error(
        "where clauses require either a \"=\" or \"IN\" comparison with either a primary key or indexed field"
    )]
    MissingEqualityFilter,

    #[error("the partition key must be defined on {operation} queries")]
    MissingPartitionKey { operation: &'static str },

    #[error("negative limit {limit} is not allowed")]
    NegativeLimit { limit: i64 },

    #[error("IN queries on '{column}' must use a list value")]
    NonListInValue { column: String },

    #[error("can't order on '{column}', can only order on (clustered) primary keys")]
    OrderOnNonPrimaryKey { column: String },

    #[error("can't order by the partition key '{column}', clustering keys only")]
    OrderOnPartitionKey { column: String },

    #[error("query set already has only or defer fields defined")]
    ProjectionAlreadySet,

    #[error("Token() received {found} arguments but the model has {expected} partition keys")]
    TokenArity { expected: usize, found: usize },

    #[error("Token() values may only be compared to the 'pk__token' virtual column, not '{column}'")]
    TokenOnColumn { column: String },

    #[error("Token() needs partition keys, which the named table '{table}' does not declare")]
    TokenOnNamedTable { table: String },

    #[error("virtual column 'pk__token' may only be compared to Token() values")]
    TokenRequiresTokenValue,

    #[error("count query returned no integer result")]
    UnexpectedCountResult,

    #[error("can't resolve column name: '{column}'")]
    UnknownColumn { column: String },

    #[error("can't resolve fields {fields} in {table}")]
    UnknownFields { fields: String, table: String },

    #[error("'{operator}' doesn't map to a query operator")]
    UnknownOperator { operator: String },

    #[error("can't parse filter '{filter}'")]
    UnparsableFilter { filter: String },
}

///
/// ValidationError
///
/// Value-level rejection: which columns are mutable and which value
/// shapes a column accepts.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ValidationError {
    #[error("counter delta for '{column}' overflows")]
    CounterOverflow { column: String },

    #[error("column '{column}' expects {expected}, got {found}")]
    KindMismatch {
        column: String,
        expected: String,
        found: &'static str,
    },

    #[error("cannot apply update to primary key '{column}'")]
    PrimaryKeyUpdate { column: String },

    #[error("'{column}' - none values are not allowed")]
    Required { column: String },

    #[error("{table} has no column named: {column}")]
    UnknownColumn { table: String, column: String },
}

///
/// TransportError
///
/// Opaque failure reported by the execution collaborator.
/// Passed through unchanged; the core never inspects or retries it.
///

#[derive(Debug, ThisError)]
#[error(transparent)]
pub struct TransportError(Box<dyn std::error::Error + Send + Sync>);

impl TransportError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }

    /// Borrow the underlying transport failure.
    #[must_use]
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}
