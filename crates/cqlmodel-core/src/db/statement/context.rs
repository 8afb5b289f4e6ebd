use crate::value::Value;
use derive_more::{Deref, IntoIterator};
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::collections::BTreeMap;

///
/// Context
///
/// Placeholder id → database-ready value for one rendered command.
/// Keys are exactly the ids minted by the owning statement's clauses.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
#[into_iterator(owned, ref)]
pub struct Context(BTreeMap<usize, Value>);

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: usize, value: Value) {
        self.0.insert(id, value);
    }

    /// Merge another command's parameters; ids must not overlap.
    pub(crate) fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Placeholder names as the executor receives them.
    pub fn named(&self) -> impl Iterator<Item = (String, &Value)> {
        self.0.iter().map(|(id, value)| (id.to_string(), value))
    }
}

// The wire contract keys parameters by string.
impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, value) in self.named() {
            map.serialize_entry(&id, value)?;
        }
        map.end()
    }
}
