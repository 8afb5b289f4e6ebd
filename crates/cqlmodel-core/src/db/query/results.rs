use crate::{
    db::executor::ResultSet,
    error::{Error, QueryError},
    model::{Instance, Model},
    value::Value,
};
use std::sync::OnceLock;

///
/// ResultCache
///
/// Raw rows of one executed select. Each row is converted to its model
/// type on first access and kept, so partial iteration converts only the
/// rows it touches.
///

pub(crate) struct ResultCache<M> {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    instances: Vec<OnceLock<M>>,
}

impl<M: Model> ResultCache<M> {
    pub(crate) fn new(result: ResultSet) -> Self {
        let instances = result.rows.iter().map(|_| OnceLock::new()).collect();

        Self {
            columns: result.columns,
            rows: result.rows,
            instances,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn get(&self, index: usize) -> Result<&M, Error> {
        let slot = &self.instances[index];
        if let Some(model) = slot.get() {
            return Ok(model);
        }

        let instance = Instance::from_row(M::TABLE, &self.columns, self.rows[index].clone())?;
        let model = M::construct_instance(instance)?;

        Ok(slot.get_or_init(|| model))
    }

    /// Rows converted so far.
    #[cfg(test)]
    pub(crate) fn converted(&self) -> usize {
        self.instances.iter().filter(|slot| slot.get().is_some()).count()
    }
}

/// Resolve a possibly negative row index against `len` rows.
pub(crate) fn resolve_index(index: isize, len: usize) -> Result<usize, QueryError> {
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        Some(index.unsigned_abs())
    };

    match resolved {
        Some(i) if i < len => Ok(i),
        _ => Err(QueryError::IndexOutOfRange { index, len }),
    }
}
