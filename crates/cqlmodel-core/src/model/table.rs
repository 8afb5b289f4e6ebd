use crate::{error::ConfigurationError, model::column::ColumnModel};

///
/// TableModel
/// Static descriptor for one model type and the table it maps to.
///

#[derive(Debug)]
pub struct TableModel {
    /// Model name used in diagnostics.
    pub name: &'static str,
    /// Keyspace override; the session default applies when unset.
    pub keyspace: Option<&'static str>,
    pub table_name: &'static str,
    /// Ordered column list (authoritative for key order and projection).
    pub columns: &'static [ColumnModel],
}

impl TableModel {
    #[must_use]
    pub const fn new(
        name: &'static str,
        table_name: &'static str,
        columns: &'static [ColumnModel],
    ) -> Self {
        Self {
            name,
            keyspace: None,
            table_name,
            columns,
        }
    }

    #[must_use]
    pub const fn in_keyspace(mut self, keyspace: &'static str) -> Self {
        self.keyspace = Some(keyspace);
        self
    }

    /// Resolve a column by field name or stored column name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'static ColumnModel> {
        let columns: &'static [ColumnModel] = self.columns;

        columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| columns.iter().find(|c| c.db_field_name() == name))
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &'static ColumnModel> {
        let columns: &'static [ColumnModel] = self.columns;

        columns.iter().filter(|c| c.is_primary_key)
    }

    /// Partition key columns in declaration order.
    /// Falls back to the first primary key when none is flagged.
    #[must_use]
    pub fn partition_keys(&self) -> Vec<&'static ColumnModel> {
        let flagged: Vec<_> = self.primary_keys().filter(|c| c.is_partition_key).collect();
        if !flagged.is_empty() {
            return flagged;
        }

        self.primary_keys().take(1).collect()
    }

    #[must_use]
    pub fn is_partition_key(&self, column: &ColumnModel) -> bool {
        self.partition_keys()
            .iter()
            .any(|pk| pk.name == column.name)
    }

    /// Primary keys that are not part of the partition key.
    #[must_use]
    pub fn clustering_keys(&self) -> Vec<&'static ColumnModel> {
        self.primary_keys()
            .filter(|c| !self.is_partition_key(c))
            .collect()
    }

    #[must_use]
    pub fn has_counter(&self) -> bool {
        self.columns.iter().any(|c| c.kind.is_counter())
    }

    /// Qualified `keyspace.table` name as rendered in statements.
    #[must_use]
    pub fn column_family_name(&self, default_keyspace: &str) -> String {
        let keyspace = self.keyspace.unwrap_or(default_keyspace);

        format!("{keyspace}.{}", self.table_name)
    }

    /// Structural checks run once per model: a primary key exists and no
    /// two columns share a stored name.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.primary_keys().next().is_none() {
            return Err(ConfigurationError::MissingPrimaryKey { table: self.name });
        }

        for (i, column) in self.columns.iter().enumerate() {
            let name = column.db_field_name();
            if self.columns[..i].iter().any(|c| c.db_field_name() == name) {
                return Err(ConfigurationError::DuplicateColumn {
                    table: self.name,
                    column: name,
                });
            }
        }

        Ok(())
    }
}
