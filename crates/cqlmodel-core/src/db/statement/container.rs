//! Delta assignments for list, set, map, and counter columns.
//!
//! Each clause is computed once from `(current, previous)` when it is built.
//! A clause with nothing to change reports `is_noop()` and a footprint of 0;
//! statements drop it on attach so it never reaches the rendered text.

use crate::{
    db::statement::{
        Context,
        clause::{Clause, Slot, impl_slot_accessors, quote},
    },
    error::{ConfigurationError, ValidationError},
    value::Value,
};

fn members<'a>(
    field: &str,
    value: &'a Value,
    expected: &'static str,
) -> Result<Option<&'a [Value]>, ConfigurationError> {
    match value {
        Value::Null => Ok(None),
        Value::List(items) | Value::Set(items) => Ok(Some(items)),
        _ => Err(ConfigurationError::ContainerKindMismatch {
            field: field.to_string(),
            expected,
        }),
    }
}

fn entries<'a>(field: &str, value: &'a Value) -> Result<&'a [(Value, Value)], ConfigurationError> {
    match value {
        Value::Null => Ok(&[]),
        Value::Map(entries) => Ok(entries),
        _ => Err(ConfigurationError::ContainerKindMismatch {
            field: field.to_string(),
            expected: "map",
        }),
    }
}

///
/// ListDelta
///

#[derive(Clone, Debug, PartialEq)]
enum ListDelta {
    Unchanged,
    Replace(Vec<Value>),
    /// `prepend` is stored reversed: the store prepends one item at a time.
    Extend {
        prepend: Vec<Value>,
        append: Vec<Value>,
    },
}

///
/// ListUpdateClause
///
/// Full replace unless the previous list survives intact as a contiguous
/// run inside the current one, in which case only the items before and
/// after it are sent.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ListUpdateClause {
    field: String,
    delta: ListDelta,
    pub(crate) slot: Slot,
}

impl ListUpdateClause {
    pub fn new(
        field: impl Into<String>,
        current: &Value,
        previous: &Value,
    ) -> Result<Self, ConfigurationError> {
        let field = field.into();
        let current = members(&field, current, "list")?;
        let previous = members(&field, previous, "list")?;

        Ok(Self {
            delta: Self::analyze(current, previous),
            field,
            slot: Slot::default(),
        })
    }

    fn analyze(current: Option<&[Value]>, previous: Option<&[Value]>) -> ListDelta {
        let Some(current) = current else {
            return ListDelta::Unchanged;
        };
        let previous = match previous {
            Some(previous) if previous == current => return ListDelta::Unchanged,
            Some(previous) if !previous.is_empty() && current.len() >= previous.len() => previous,
            _ => return ListDelta::Replace(current.to_vec()),
        };

        let width = previous.len();
        let found = current
            .windows(width)
            .position(|window| window == previous);

        match found {
            Some(start) => ListDelta::Extend {
                prepend: current[..start].iter().rev().cloned().collect(),
                append: current[start + width..].to_vec(),
            },
            None => ListDelta::Replace(current.to_vec()),
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Items sent ahead of the stored list, in send order.
    #[must_use]
    pub fn prepended(&self) -> &[Value] {
        match &self.delta {
            ListDelta::Extend { prepend, .. } => prepend,
            _ => &[],
        }
    }

    #[must_use]
    pub fn appended(&self) -> &[Value] {
        match &self.delta {
            ListDelta::Extend { append, .. } => append,
            _ => &[],
        }
    }

    #[must_use]
    pub const fn is_replace(&self) -> bool {
        matches!(self.delta, ListDelta::Replace(_))
    }

    // (fragment, value) pairs in slot order.
    fn parts(&self) -> Vec<(String, Value)> {
        let name = quote(&self.field);
        let mut id = self.slot.first();
        let mut parts = Vec::new();

        match &self.delta {
            ListDelta::Unchanged => {}
            ListDelta::Replace(items) => {
                parts.push((format!("{name} = :{id}"), Value::List(items.clone())));
            }
            ListDelta::Extend { prepend, append } => {
                if !prepend.is_empty() {
                    parts.push((format!("{name} = :{id} + {name}"), Value::List(prepend.clone())));
                    id += 1;
                }
                if !append.is_empty() {
                    parts.push((format!("{name} = {name} + :{id}"), Value::List(append.clone())));
                }
            }
        }

        parts
    }
}

impl Clause for ListUpdateClause {
    impl_slot_accessors!();

    fn context_footprint(&self) -> usize {
        match &self.delta {
            ListDelta::Unchanged => 0,
            ListDelta::Replace(_) => 1,
            ListDelta::Extend { prepend, append } => {
                usize::from(!prepend.is_empty()) + usize::from(!append.is_empty())
            }
        }
    }

    fn is_noop(&self) -> bool {
        self.context_footprint() == 0
    }

    fn render(&self) -> String {
        let fragments: Vec<_> = self.parts().into_iter().map(|(text, _)| text).collect();

        fragments.join(", ")
    }

    fn contribute(&self, context: &mut Context) {
        for (offset, (_, value)) in self.parts().into_iter().enumerate() {
            context.insert(self.slot.first() + offset, value);
        }
    }
}

///
/// SetUpdateClause
///
/// Sends added and removed members separately. Falls back to a full
/// replace when nothing of the previous set survives.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SetUpdateClause {
    field: String,
    replace: Option<Vec<Value>>,
    added: Vec<Value>,
    removed: Vec<Value>,
    pub(crate) slot: Slot,
}

impl SetUpdateClause {
    pub fn new(
        field: impl Into<String>,
        current: &Value,
        previous: &Value,
    ) -> Result<Self, ConfigurationError> {
        let field = field.into();
        let current = members(&field, current, "set")?;
        let previous = members(&field, previous, "set")?;

        let mut clause = Self {
            field,
            replace: None,
            added: Vec::new(),
            removed: Vec::new(),
            slot: Slot::default(),
        };

        let Some(current) = current else {
            return Ok(clause);
        };
        let current = dedupe(current);
        let previous = previous.map(dedupe).unwrap_or_default();

        if Value::Set(current.clone()) == Value::Set(previous.clone()) {
            return Ok(clause);
        }

        if previous.is_empty() || !current.iter().any(|v| previous.contains(v)) {
            clause.replace = Some(current);
        } else {
            clause.added = current
                .iter()
                .filter(|v| !previous.contains(v))
                .cloned()
                .collect();
            clause.removed = previous
                .iter()
                .filter(|v| !current.contains(v))
                .cloned()
                .collect();
        }

        Ok(clause)
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn added(&self) -> &[Value] {
        &self.added
    }

    #[must_use]
    pub fn removed(&self) -> &[Value] {
        &self.removed
    }

    #[must_use]
    pub const fn is_replace(&self) -> bool {
        self.replace.is_some()
    }

    fn parts(&self) -> Vec<(String, Value)> {
        let name = quote(&self.field);
        let mut id = self.slot.first();

        if let Some(members) = &self.replace {
            return vec![(format!("{name} = :{id}"), Value::Set(members.clone()))];
        }

        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push((format!("{name} = {name} + :{id}"), Value::Set(self.added.clone())));
            id += 1;
        }
        if !self.removed.is_empty() {
            parts.push((format!("{name} = {name} - :{id}"), Value::Set(self.removed.clone())));
        }

        parts
    }
}

fn dedupe(items: &[Value]) -> Vec<Value> {
    match Value::set(items.iter().cloned()) {
        Value::Set(members) => members,
        _ => Vec::new(),
    }
}

impl Clause for SetUpdateClause {
    impl_slot_accessors!();

    fn context_footprint(&self) -> usize {
        if self.replace.is_some() {
            return 1;
        }

        usize::from(!self.added.is_empty()) + usize::from(!self.removed.is_empty())
    }

    fn is_noop(&self) -> bool {
        self.context_footprint() == 0
    }

    fn render(&self) -> String {
        let fragments: Vec<_> = self.parts().into_iter().map(|(text, _)| text).collect();

        fragments.join(", ")
    }

    fn contribute(&self, context: &mut Context) {
        for (offset, (_, value)) in self.parts().into_iter().enumerate() {
            context.insert(self.slot.first() + offset, value);
        }
    }
}

///
/// MapUpdateClause
/// One `"m"[:k] = :v` entry per key that is new or whose value changed.
///

#[derive(Clone, Debug, PartialEq)]
pub struct MapUpdateClause {
    field: String,
    updates: Vec<(Value, Value)>,
    pub(crate) slot: Slot,
}

impl MapUpdateClause {
    pub fn new(
        field: impl Into<String>,
        current: &Value,
        previous: &Value,
    ) -> Result<Self, ConfigurationError> {
        let field = field.into();
        let current = entries(&field, current)?;
        let previous = entries(&field, previous)?;

        let updates = current
            .iter()
            .filter(|(key, value)| {
                previous
                    .iter()
                    .find(|(k, _)| k == key)
                    .is_none_or(|(_, old)| old != value)
            })
            .cloned()
            .collect();

        Ok(Self {
            field,
            updates,
            slot: Slot::default(),
        })
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn updates(&self) -> &[(Value, Value)] {
        &self.updates
    }
}

impl Clause for MapUpdateClause {
    impl_slot_accessors!();

    fn context_footprint(&self) -> usize {
        self.updates.len() * 2
    }

    fn is_noop(&self) -> bool {
        self.updates.is_empty()
    }

    fn render(&self) -> String {
        let name = quote(&self.field);
        let first = self.slot.first();
        let fragments: Vec<_> = (0..self.updates.len())
            .map(|i| {
                let key_id = first + i * 2;
                format!("{name}[:{key_id}] = :{}", key_id + 1)
            })
            .collect();

        fragments.join(", ")
    }

    fn contribute(&self, context: &mut Context) {
        let first = self.slot.first();
        for (i, (key, value)) in self.updates.iter().enumerate() {
            context.insert(first + i * 2, key.clone());
            context.insert(first + i * 2 + 1, value.clone());
        }
    }
}

///
/// MapDeleteClause
/// One `"m"[:k]` entry per key present before and absent now.
///

#[derive(Clone, Debug, PartialEq)]
pub struct MapDeleteClause {
    field: String,
    keys: Vec<Value>,
    pub(crate) slot: Slot,
}

impl MapDeleteClause {
    pub fn new(
        field: impl Into<String>,
        current: &Value,
        previous: &Value,
    ) -> Result<Self, ConfigurationError> {
        let field = field.into();
        let current = entries(&field, current)?;
        let previous = entries(&field, previous)?;

        let keys = previous
            .iter()
            .filter(|(key, _)| !current.iter().any(|(k, _)| k == key))
            .map(|(key, _)| key.clone())
            .collect();

        Ok(Self {
            field,
            keys,
            slot: Slot::default(),
        })
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn keys(&self) -> &[Value] {
        &self.keys
    }
}

impl Clause for MapDeleteClause {
    impl_slot_accessors!();

    fn context_footprint(&self) -> usize {
        self.keys.len()
    }

    fn is_noop(&self) -> bool {
        self.keys.is_empty()
    }

    fn render(&self) -> String {
        let name = quote(&self.field);
        let first = self.slot.first();
        let fragments: Vec<_> = (0..self.keys.len())
            .map(|i| format!("{name}[:{}]", first + i))
            .collect();

        fragments.join(", ")
    }

    fn contribute(&self, context: &mut Context) {
        for (i, key) in self.keys.iter().enumerate() {
            context.insert(self.slot.first() + i, key.clone());
        }
    }
}

///
/// CounterUpdateClause
///
/// Relative counter change. The bound value is the magnitude; the sign
/// selects `+` or `-` in the text.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CounterUpdateClause {
    field: String,
    delta: i64,
    pub(crate) slot: Slot,
}

impl CounterUpdateClause {
    pub fn new(field: impl Into<String>, current: i64, previous: i64) -> Result<Self, ValidationError> {
        let field = field.into();
        let Some(delta) = current.checked_sub(previous).filter(|d| d.checked_abs().is_some()) else {
            return Err(ValidationError::CounterOverflow { column: field });
        };

        Ok(Self {
            field,
            delta,
            slot: Slot::default(),
        })
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn delta(&self) -> i64 {
        self.delta
    }
}

impl Clause for CounterUpdateClause {
    impl_slot_accessors!();

    fn context_footprint(&self) -> usize {
        usize::from(self.delta != 0)
    }

    fn is_noop(&self) -> bool {
        self.delta == 0
    }

    fn render(&self) -> String {
        let name = quote(&self.field);
        let sign = if self.delta < 0 { '-' } else { '+' };

        format!("{name} = {name} {sign} :{}", self.slot.first())
    }

    fn contribute(&self, context: &mut Context) {
        context.insert(self.slot.first(), Value::Int(self.delta.abs()));
    }
}
