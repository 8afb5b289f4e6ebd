use crate::{
    db::statement::Context,
    value::{Value, epoch_millis},
};
use time::OffsetDateTime;

///
/// QueryValue
///
/// Right-hand side of a where clause: a bound value or a dialect function
/// wrapping one or more bound values.
///
/// Value        → `:n`
/// MinTimeUuid  → `MinTimeUUID(:n)` bound to epoch millis
/// MaxTimeUuid  → `MaxTimeUUID(:n)` bound to epoch millis
/// Token        → `token(:n, :n+1, ...)`, one slot per partition key
///

#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    Value(Value),
    MinTimeUuid(i64),
    MaxTimeUuid(i64),
    Token(Vec<Value>),
}

impl QueryValue {
    #[must_use]
    pub fn min_time_uuid(at: OffsetDateTime) -> Self {
        Self::MinTimeUuid(epoch_millis(at))
    }

    #[must_use]
    pub fn max_time_uuid(at: OffsetDateTime) -> Self {
        Self::MaxTimeUuid(epoch_millis(at))
    }

    pub fn token<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::Token(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub const fn is_token(&self) -> bool {
        matches!(self, Self::Token(_))
    }

    /// Placeholder slots this value binds.
    #[must_use]
    pub const fn footprint(&self) -> usize {
        match self {
            Self::Token(values) => values.len(),
            _ => 1,
        }
    }

    pub(crate) fn render(&self, first_id: usize) -> String {
        match self {
            Self::Value(_) => format!(":{first_id}"),
            Self::MinTimeUuid(_) => format!("MinTimeUUID(:{first_id})"),
            Self::MaxTimeUuid(_) => format!("MaxTimeUUID(:{first_id})"),
            Self::Token(values) => {
                let args: Vec<_> = (0..values.len())
                    .map(|i| format!(":{}", first_id + i))
                    .collect();

                format!("token({})", args.join(", "))
            }
        }
    }

    pub(crate) fn contribute(&self, first_id: usize, context: &mut Context) {
        match self {
            Self::Value(value) => context.insert(first_id, value.clone()),
            Self::MinTimeUuid(ms) | Self::MaxTimeUuid(ms) => {
                context.insert(first_id, Value::Timestamp(*ms));
            }
            Self::Token(values) => {
                for (i, value) in values.iter().enumerate() {
                    context.insert(first_id + i, value.clone());
                }
            }
        }
    }
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

macro_rules! impl_query_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    Self::Value(value.into())
                }
            }
        )*
    };
}

impl_query_value_from!(
    bool,
    i32,
    i64,
    u32,
    f64,
    &str,
    String,
    uuid::Uuid,
    OffsetDateTime
);

///
/// TESTS
///
