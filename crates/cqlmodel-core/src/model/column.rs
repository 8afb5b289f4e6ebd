use crate::{error::ValidationError, value::Value};
use std::fmt;

///
/// ScalarKind
///
/// Element type of a scalar column or of a container's members.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScalarKind {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Double,
    Float,
    Int,
    Text,
    TimeUuid,
    Timestamp,
    Uuid,
    VarInt,
}

impl ScalarKind {
    #[must_use]
    pub const fn cql_type(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::BigInt => "bigint",
            Self::Blob => "blob",
            Self::Boolean => "boolean",
            Self::Double => "double",
            Self::Float => "float",
            Self::Int => "int",
            Self::Text => "text",
            Self::TimeUuid => "timeuuid",
            Self::Timestamp => "timestamp",
            Self::Uuid => "uuid",
            Self::VarInt => "varint",
        }
    }

    /// Coerce a non-null value into this kind's database shape.
    ///
    /// Integers widen into floating kinds and into timestamps (epoch millis).
    /// Everything else must already match.
    fn coerce(self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (Self::Ascii | Self::Text, v @ Value::Text(_))
            | (Self::BigInt | Self::Int | Self::VarInt, v @ Value::Int(_))
            | (Self::Double | Self::Float, v @ Value::Float(_))
            | (Self::Boolean, v @ Value::Bool(_))
            | (Self::Blob, v @ Value::Blob(_))
            | (Self::TimeUuid | Self::Uuid, v @ Value::Uuid(_))
            | (Self::Timestamp, v @ Value::Timestamp(_)) => Ok(v),

            #[allow(clippy::cast_precision_loss)]
            (Self::Double | Self::Float, Value::Int(v)) => Ok(Value::Float(v as f64)),
            (Self::Timestamp, Value::Int(v)) => Ok(Value::Timestamp(v)),

            (_, other) => Err(other),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cql_type())
    }
}

///
/// ColumnKind
///
/// Storage shape of a column. Containers and counters select the delta
/// clauses used when an update is computed from previous and current values.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnKind {
    Scalar(ScalarKind),
    Counter,
    List(ScalarKind),
    Set(ScalarKind),
    Map { key: ScalarKind, value: ScalarKind },
}

impl ColumnKind {
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Map { .. })
    }

    #[must_use]
    pub const fn is_counter(self) -> bool {
        matches!(self, Self::Counter)
    }

    /// Empty value of this kind, used where the store returns null.
    #[must_use]
    pub const fn empty_value(self) -> Value {
        match self {
            Self::List(_) => Value::List(Vec::new()),
            Self::Set(_) => Value::Set(Vec::new()),
            Self::Map { .. } => Value::Map(Vec::new()),
            Self::Counter => Value::Int(0),
            Self::Scalar(_) => Value::Null,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Counter => write!(f, "counter"),
            Self::List(kind) => write!(f, "list<{kind}>"),
            Self::Set(kind) => write!(f, "set<{kind}>"),
            Self::Map { key, value } => write!(f, "map<{key}, {value}>"),
        }
    }
}

///
/// ClusteringOrder
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClusteringOrder {
    Asc,
    Desc,
}

///
/// ColumnModel
///
/// Static metadata and value conversion for one column.
/// Built with `const` builder calls so table descriptors can live in statics.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnModel {
    /// Field name used by filters, assignments, and instances.
    pub name: &'static str,
    /// Stored column name when it differs from `name`.
    pub db_field: Option<&'static str>,
    pub kind: ColumnKind,
    pub is_primary_key: bool,
    pub is_partition_key: bool,
    pub is_indexed: bool,
    pub is_required: bool,
    pub clustering_order: Option<ClusteringOrder>,
}

impl ColumnModel {
    #[must_use]
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            db_field: None,
            kind,
            is_primary_key: false,
            is_partition_key: false,
            is_indexed: false,
            is_required: false,
            clustering_order: None,
        }
    }

    #[must_use]
    pub const fn scalar(name: &'static str, kind: ScalarKind) -> Self {
        Self::new(name, ColumnKind::Scalar(kind))
    }

    /// Mark as a partition key (implies primary key and required).
    #[must_use]
    pub const fn partition_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_partition_key = true;
        self.is_required = true;
        self
    }

    /// Mark as a primary key. Unless some column is flagged as a partition
    /// key, the first primary key is the partition key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_required = true;
        self
    }

    #[must_use]
    pub const fn clustering(mut self, order: ClusteringOrder) -> Self {
        self.is_primary_key = true;
        self.is_required = true;
        self.clustering_order = Some(order);
        self
    }

    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.is_indexed = true;
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    #[must_use]
    pub const fn db_field(mut self, db_field: &'static str) -> Self {
        self.db_field = Some(db_field);
        self
    }

    /// Column name as stored and rendered in statement text.
    #[must_use]
    pub const fn db_field_name(&self) -> &'static str {
        match self.db_field {
            Some(name) => name,
            None => self.name,
        }
    }

    ///
    /// CONVERSION
    ///

    /// Convert a value to its database shape, rejecting mismatched kinds.
    /// Null passes through; set members are deduplicated.
    pub fn to_database(&self, value: Value) -> Result<Value, ValidationError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let found = value.kind_label();
        let mismatch = || ValidationError::KindMismatch {
            column: self.name.to_string(),
            expected: self.kind.to_string(),
            found,
        };

        match (self.kind, value) {
            (ColumnKind::Scalar(kind), value) => kind.coerce(value).map_err(|_| mismatch()),
            (ColumnKind::Counter, v @ Value::Int(_)) => Ok(v),
            (ColumnKind::List(kind), Value::List(items)) => items
                .into_iter()
                .map(|item| kind.coerce(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
                .map_err(|_| mismatch()),
            (ColumnKind::Set(kind), Value::Set(items) | Value::List(items)) => items
                .into_iter()
                .map(|item| kind.coerce(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::set)
                .map_err(|_| mismatch()),
            (ColumnKind::Map { key, value }, Value::Map(entries)) => entries
                .into_iter()
                .map(|(k, v)| Ok((key.coerce(k)?, value.coerce(v)?)))
                .collect::<Result<Vec<_>, Value>>()
                .map(Value::map)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }

    /// Convert a raw stored value back to its in-memory shape.
    /// The store reports empty containers as null.
    #[must_use]
    pub fn decode(&self, raw: Value) -> Value {
        match raw {
            Value::Null if self.kind.is_container() => self.kind.empty_value(),
            Value::List(items) if matches!(self.kind, ColumnKind::Set(_)) => Value::set(items),
            other => other,
        }
    }

    /// Check a value for assignment to this column.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if value.is_null() {
            if self.is_required {
                return Err(ValidationError::Required {
                    column: self.name.to_string(),
                });
            }
            return Ok(());
        }

        self.to_database(value.clone()).map(|_| ())
    }
}
