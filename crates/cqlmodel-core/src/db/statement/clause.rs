use crate::{
    db::{
        function::QueryValue,
        operator::WhereOperator,
        statement::{
            Context,
            container::{
                CounterUpdateClause, ListUpdateClause, MapDeleteClause, MapUpdateClause,
                SetUpdateClause,
            },
        },
    },
    error::ConfigurationError,
    value::Value,
};

///
/// Clause
///
/// Smallest statement unit. A clause binds `context_footprint()` placeholder
/// slots starting at the id minted for it when it is attached.
///
/// Unattached clauses render from slot 0.
///

pub trait Clause {
    fn context_id(&self) -> Option<usize>;

    /// One-time id assignment; a second call is a programmer error.
    fn attach(&mut self, context_id: usize) -> Result<(), ConfigurationError>;

    fn context_footprint(&self) -> usize {
        1
    }

    /// True when the clause would change nothing and must not be emitted.
    fn is_noop(&self) -> bool {
        false
    }

    fn render(&self) -> String;

    fn contribute(&self, context: &mut Context);
}

///
/// Slot
/// First placeholder id owned by a clause.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Slot(Option<usize>);

impl Slot {
    pub(crate) const fn get(self) -> Option<usize> {
        self.0
    }

    pub(crate) fn first(self) -> usize {
        self.0.unwrap_or_default()
    }

    pub(crate) fn attach(&mut self, id: usize) -> Result<(), ConfigurationError> {
        if let Some(existing) = self.0 {
            return Err(ConfigurationError::ContextIdAttached { id: existing });
        }
        self.0 = Some(id);

        Ok(())
    }

    /// Move from one statement base to another, keeping the relative id.
    pub(crate) const fn rebase(&mut self, old_base: usize, new_base: usize) {
        if let Some(id) = self.0 {
            self.0 = Some(id - old_base + new_base);
        }
    }
}

// Implements the id bookkeeping half of `Clause` for a struct with a `slot`.
macro_rules! impl_slot_accessors {
    () => {
        fn context_id(&self) -> Option<usize> {
            self.slot.get()
        }

        fn attach(
            &mut self,
            context_id: usize,
        ) -> Result<(), $crate::error::ConfigurationError> {
            self.slot.attach(context_id)
        }
    };
}
pub(crate) use impl_slot_accessors;

/// Double-quoted column identifier.
pub(crate) fn quote(field: &str) -> String {
    format!("\"{field}\"")
}

///
/// WhereTarget
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WhereTarget {
    Column(String),
    /// `token("pk1", "pk2")` over the partition key columns.
    Token(Vec<String>),
}

impl WhereTarget {
    fn render(&self) -> String {
        match self {
            Self::Column(name) => quote(name),
            Self::Token(columns) => {
                let columns: Vec<_> = columns.iter().map(|c| quote(c)).collect();
                format!("token({})", columns.join(", "))
            }
        }
    }
}

///
/// WhereClause
///

#[derive(Clone, Debug)]
pub struct WhereClause {
    target: WhereTarget,
    operator: WhereOperator,
    value: QueryValue,
    pub(crate) slot: Slot,
}

impl WhereClause {
    pub fn new(field: impl Into<String>, operator: WhereOperator, value: impl Into<QueryValue>) -> Self {
        Self {
            target: WhereTarget::Column(field.into()),
            operator,
            value: value.into(),
            slot: Slot::default(),
        }
    }

    /// Comparison of the partition token against `token(values...)`.
    #[must_use]
    pub fn token(partition_columns: Vec<String>, operator: WhereOperator, value: QueryValue) -> Self {
        Self {
            target: WhereTarget::Token(partition_columns),
            operator,
            value,
            slot: Slot::default(),
        }
    }

    /// Filtered column; `None` for token comparisons.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match &self.target {
            WhereTarget::Column(name) => Some(name),
            WhereTarget::Token(_) => None,
        }
    }

    #[must_use]
    pub const fn target(&self) -> &WhereTarget {
        &self.target
    }

    #[must_use]
    pub const fn operator(&self) -> WhereOperator {
        self.operator
    }

    #[must_use]
    pub const fn value(&self) -> &QueryValue {
        &self.value
    }

    #[must_use]
    pub const fn is_token(&self) -> bool {
        matches!(self.target, WhereTarget::Token(_))
    }

    /// Copy without a context id, for reuse in another statement.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            slot: Slot::default(),
            ..self.clone()
        }
    }

    pub(crate) const fn rebase(&mut self, old_base: usize, new_base: usize) {
        self.slot.rebase(old_base, new_base);
    }
}

// Slots are statement-local; two clauses filter the same way regardless.
impl PartialEq for WhereClause {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.operator == other.operator && self.value == other.value
    }
}

impl Clause for WhereClause {
    impl_slot_accessors!();

    fn context_footprint(&self) -> usize {
        self.value.footprint()
    }

    fn render(&self) -> String {
        format!(
            "{} {} {}",
            self.target.render(),
            self.operator,
            self.value.render(self.slot.first())
        )
    }

    fn contribute(&self, context: &mut Context) {
        self.value.contribute(self.slot.first(), context);
    }
}

///
/// AssignmentClause
/// Plain `"field" = :n` assignment; the only kind an insert accepts.
///

#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentClause {
    field: String,
    value: Value,
    pub(crate) slot: Slot,
}

impl AssignmentClause {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            slot: Slot::default(),
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Column and placeholder pair for the insert column/value lists.
    #[must_use]
    pub fn insert_tuple(&self) -> (&str, usize) {
        (&self.field, self.slot.first())
    }
}

impl Clause for AssignmentClause {
    impl_slot_accessors!();

    fn render(&self) -> String {
        format!("{} = :{}", quote(&self.field), self.slot.first())
    }

    fn contribute(&self, context: &mut Context) {
        context.insert(self.slot.first(), self.value.clone());
    }
}

///
/// FieldDeleteClause
/// Column named in a `DELETE "f" FROM ...` list. Binds nothing.
///

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDeleteClause {
    field: String,
    pub(crate) slot: Slot,
}

impl FieldDeleteClause {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            slot: Slot::default(),
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Clause for FieldDeleteClause {
    impl_slot_accessors!();

    fn context_footprint(&self) -> usize {
        0
    }

    fn render(&self) -> String {
        quote(&self.field)
    }

    fn contribute(&self, _context: &mut Context) {}
}

///
/// Assignment
///
/// Any clause that may appear in an update's SET list.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Assignment {
    Value(AssignmentClause),
    List(ListUpdateClause),
    Set(SetUpdateClause),
    Map(MapUpdateClause),
    Counter(CounterUpdateClause),
}

impl Assignment {
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Value(c) => c.field(),
            Self::List(c) => c.field(),
            Self::Set(c) => c.field(),
            Self::Map(c) => c.field(),
            Self::Counter(c) => c.field(),
        }
    }

    fn clause(&self) -> &dyn Clause {
        match self {
            Self::Value(c) => c,
            Self::List(c) => c,
            Self::Set(c) => c,
            Self::Map(c) => c,
            Self::Counter(c) => c,
        }
    }

    fn clause_mut(&mut self) -> &mut dyn Clause {
        match self {
            Self::Value(c) => c,
            Self::List(c) => c,
            Self::Set(c) => c,
            Self::Map(c) => c,
            Self::Counter(c) => c,
        }
    }

    pub(crate) const fn slot_mut(&mut self) -> &mut Slot {
        match self {
            Self::Value(c) => &mut c.slot,
            Self::List(c) => &mut c.slot,
            Self::Set(c) => &mut c.slot,
            Self::Map(c) => &mut c.slot,
            Self::Counter(c) => &mut c.slot,
        }
    }
}

impl Clause for Assignment {
    fn context_id(&self) -> Option<usize> {
        self.clause().context_id()
    }

    fn attach(&mut self, context_id: usize) -> Result<(), ConfigurationError> {
        self.clause_mut().attach(context_id)
    }

    fn context_footprint(&self) -> usize {
        self.clause().context_footprint()
    }

    fn is_noop(&self) -> bool {
        self.clause().is_noop()
    }

    fn render(&self) -> String {
        self.clause().render()
    }

    fn contribute(&self, context: &mut Context) {
        self.clause().contribute(context);
    }
}

///
/// DeleteTarget
/// Entry in a delete statement's field list.
///

#[derive(Clone, Debug, PartialEq)]
pub enum DeleteTarget {
    Field(FieldDeleteClause),
    MapKeys(MapDeleteClause),
}

impl DeleteTarget {
    fn clause(&self) -> &dyn Clause {
        match self {
            Self::Field(c) => c,
            Self::MapKeys(c) => c,
        }
    }

    fn clause_mut(&mut self) -> &mut dyn Clause {
        match self {
            Self::Field(c) => c,
            Self::MapKeys(c) => c,
        }
    }

    pub(crate) const fn slot_mut(&mut self) -> &mut Slot {
        match self {
            Self::Field(c) => &mut c.slot,
            Self::MapKeys(c) => &mut c.slot,
        }
    }
}

impl Clause for DeleteTarget {
    fn context_id(&self) -> Option<usize> {
        self.clause().context_id()
    }

    fn attach(&mut self, context_id: usize) -> Result<(), ConfigurationError> {
        self.clause_mut().attach(context_id)
    }

    fn context_footprint(&self) -> usize {
        self.clause().context_footprint()
    }

    fn is_noop(&self) -> bool {
        self.clause().is_noop()
    }

    fn render(&self) -> String {
        self.clause().render()
    }

    fn contribute(&self, context: &mut Context) {
        self.clause().contribute(context);
    }
}

// ----------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------

macro_rules! impl_into_variant {
    ($target:ident, $($variant:ident => $clause:ty),* $(,)?) => {
        $(
            impl From<$clause> for $target {
                fn from(clause: $clause) -> Self {
                    Self::$variant(clause)
                }
            }
        )*
    };
}

impl_into_variant!(
    Assignment,
    Value => AssignmentClause,
    List => ListUpdateClause,
    Set => SetUpdateClause,
    Map => MapUpdateClause,
    Counter => CounterUpdateClause,
);

impl_into_variant!(
    DeleteTarget,
    Field => FieldDeleteClause,
    MapKeys => MapDeleteClause,
);
