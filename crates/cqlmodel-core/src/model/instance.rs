use crate::{
    error::{Error, ValidationError},
    model::{column::ColumnModel, table::TableModel},
    value::Value,
};

///
/// FieldState
///
/// Current value of one column plus the snapshot taken at load or last
/// save. Deltas for containers and counters are computed from the pair.
///

#[derive(Clone, Debug, PartialEq)]
pub struct FieldState {
    pub value: Value,
    pub previous: Value,
    pub explicit_delete: bool,
}

impl FieldState {
    const fn new(value: Value) -> Self {
        Self {
            value,
            previous: Value::Null,
            explicit_delete: false,
        }
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.value != self.previous
    }

    /// A null that must be written as a column deletion.
    #[must_use]
    pub fn deleted(&self) -> bool {
        self.value.is_null() && (!self.previous.is_null() || self.explicit_delete)
    }
}

///
/// Instance
///
/// One row's values keyed by the table's column order.
/// Accessors resolve by field name or stored column name.
///

#[derive(Clone, Debug)]
pub struct Instance {
    table: &'static TableModel,
    fields: Vec<FieldState>,
    persisted: bool,
}

impl Instance {
    /// Empty, unsaved row. Counters start at zero.
    #[must_use]
    pub fn new(table: &'static TableModel) -> Self {
        let fields = table
            .columns
            .iter()
            .map(|c| {
                let mut state = FieldState::new(Value::Null);
                if c.kind.is_counter() {
                    state.value = Value::Int(0);
                    state.previous = Value::Int(0);
                }
                state
            })
            .collect();

        Self {
            table,
            fields,
            persisted: false,
        }
    }

    /// Unsaved row populated from `(field, value)` pairs.
    pub fn from_values<I, K, V>(table: &'static TableModel, values: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut instance = Self::new(table);
        for (field, value) in values {
            instance.set(field.as_ref(), value)?;
        }

        Ok(instance)
    }

    /// Persisted row built from a result row; stored values become the
    /// previous snapshot.
    pub fn from_row(
        table: &'static TableModel,
        columns: &[String],
        row: Vec<Value>,
    ) -> Result<Self, Error> {
        let mut instance = Self::new(table);
        for (name, raw) in columns.iter().zip(row) {
            let index = instance.index_of(name)?;
            let value = table.columns[index].decode(raw);
            instance.fields[index] = FieldState {
                previous: value.clone(),
                value,
                explicit_delete: false,
            };
        }
        instance.persisted = true;

        Ok(instance)
    }

    fn index_of(&self, field: &str) -> Result<usize, ValidationError> {
        self.table
            .columns
            .iter()
            .position(|c| c.name == field)
            .or_else(|| {
                self.table
                    .columns
                    .iter()
                    .position(|c| c.db_field_name() == field)
            })
            .ok_or_else(|| ValidationError::UnknownColumn {
                table: self.table.name.to_string(),
                column: field.to_string(),
            })
    }

    ///
    /// ACCESSORS
    ///

    #[must_use]
    pub const fn table(&self) -> &'static TableModel {
        self.table
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persisted
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.state(field).map(|s| &s.value)
    }

    #[must_use]
    pub fn state(&self, field: &str) -> Option<&FieldState> {
        self.index_of(field).ok().map(|i| &self.fields[i])
    }

    /// Columns paired with their state, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static ColumnModel, &FieldState)> {
        let columns: &'static [ColumnModel] = self.table.columns;

        columns.iter().zip(self.fields.iter())
    }

    ///
    /// MUTATION
    ///

    /// Assign a value; shape is checked against the column kind.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), ValidationError> {
        let index = self.index_of(field)?;
        let value = self.table.columns[index].to_database(value.into())?;

        let state = &mut self.fields[index];
        state.value = value;
        state.explicit_delete = false;

        Ok(())
    }

    /// Null a field and force its deletion on the next save.
    pub fn clear(&mut self, field: &str) -> Result<(), ValidationError> {
        let index = self.index_of(field)?;

        let state = &mut self.fields[index];
        state.value = Value::Null;
        state.explicit_delete = true;

        Ok(())
    }

    /// True when the row exists and its primary key is unchanged, so a
    /// save may be expressed as an update.
    #[must_use]
    pub fn can_update(&self) -> bool {
        self.persisted
            && self
                .fields()
                .filter(|(column, _)| column.is_primary_key)
                .all(|(_, state)| !state.changed())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (column, state) in self.fields() {
            column.validate(&state.value)?;
        }

        Ok(())
    }

    /// Snapshot current values as previous; called after a successful save.
    pub fn reset_previous(&mut self) {
        for state in &mut self.fields {
            state.previous = state.value.clone();
            state.explicit_delete = false;
        }
        self.persisted = true;
    }

    /// Mark the row as gone; the next save inserts it again.
    pub const fn mark_deleted(&mut self) {
        self.persisted = false;
    }
}
