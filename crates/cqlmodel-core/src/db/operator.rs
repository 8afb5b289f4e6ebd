use crate::error::{ConfigurationError, QueryError};
use std::{collections::BTreeMap, fmt, sync::LazyLock};

///
/// WhereOperator
///
/// Closed set of comparison kinds a where clause can carry.
/// Token comparisons reuse these against the virtual token target.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum WhereOperator {
    Eq,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl WhereOperator {
    pub const ALL: [Self; 6] = [Self::Eq, Self::In, Self::Gt, Self::Gte, Self::Lt, Self::Lte];

    /// Filter-suffix name (`age__gte`).
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::In => "in",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }

    /// Dialect symbol; only produced when statement text is rendered.
    #[must_use]
    pub const fn cql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::In => "IN",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    /// Equality and IN both pin rows to exact key values.
    #[must_use]
    pub const fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::In)
    }
}

impl fmt::Display for WhereOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cql())
    }
}

///
/// OperatorRegistry
///
/// Name → operator lookup used to resolve filter suffixes.
/// Names are case-insensitive; registering the same pair twice is a no-op.
///

#[derive(Clone, Debug, Default)]
pub struct OperatorRegistry {
    operators: BTreeMap<String, WhereOperator>,
}

static STANDARD: LazyLock<OperatorRegistry> = LazyLock::new(OperatorRegistry::standard);

impl OperatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in operator under its symbol.
    #[must_use]
    pub fn standard() -> Self {
        let operators = WhereOperator::ALL
            .into_iter()
            .map(|op| (op.symbol().to_string(), op))
            .collect();

        Self { operators }
    }

    /// Shared read-only standard registry.
    #[must_use]
    pub fn global() -> &'static Self {
        &STANDARD
    }

    pub fn register(
        &mut self,
        name: &str,
        operator: WhereOperator,
    ) -> Result<(), ConfigurationError> {
        let key = name.to_ascii_lowercase();

        match self.operators.get(&key) {
            Some(existing) if *existing != operator => Err(ConfigurationError::OperatorCollision {
                name: key,
                existing: *existing,
                requested: operator,
            }),
            Some(_) => Ok(()),
            None => {
                self.operators.insert(key, operator);
                Ok(())
            }
        }
    }

    /// Resolve a suffix; `None` means equality.
    pub fn resolve(&self, name: Option<&str>) -> Result<WhereOperator, QueryError> {
        let Some(name) = name else {
            return Ok(WhereOperator::Eq);
        };

        self.operators
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| QueryError::UnknownOperator {
                operator: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(&name.to_ascii_lowercase())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_suffix_resolves_to_equality() {
        let op = OperatorRegistry::global().resolve(None).expect("resolve default");

        assert_eq!(op, WhereOperator::Eq);
    }

    #[test]
    fn suffixes_resolve_case_insensitively() {
        let registry = OperatorRegistry::global();

        assert_eq!(registry.resolve(Some("GTE")), Ok(WhereOperator::Gte));
        assert_eq!(registry.resolve(Some("in")), Ok(WhereOperator::In));
    }

    #[test]
    fn unknown_suffix_names_the_operator() {
        let err = OperatorRegistry::global()
            .resolve(Some("near"))
            .expect_err("unknown operator should fail");

        assert_eq!(
            err,
            QueryError::UnknownOperator {
                operator: "near".to_string()
            }
        );
        assert!(err.to_string().contains("near"));
    }

    #[test]
    fn registration_is_idempotent() {
        let mut registry = OperatorRegistry::standard();

        registry
            .register("gte", WhereOperator::Gte)
            .expect("same pair registers twice");
        registry
            .register("ge", WhereOperator::Gte)
            .expect("alias registers");

        assert_eq!(registry.resolve(Some("ge")), Ok(WhereOperator::Gte));
    }

    #[test]
    fn registration_rejects_name_collision() {
        let mut registry = OperatorRegistry::standard();

        let err = registry
            .register("GT", WhereOperator::Lt)
            .expect_err("collision should fail");

        assert!(matches!(
            err,
            ConfigurationError::OperatorCollision {
                existing: WhereOperator::Gt,
                requested: WhereOperator::Lt,
                ..
            }
        ));
    }

    #[test]
    fn operators_render_dialect_symbols() {
        let rendered: Vec<_> = WhereOperator::ALL.iter().map(ToString::to_string).collect();

        assert_eq!(rendered, ["=", "IN", ">", ">=", "<", "<="]);
    }
}
