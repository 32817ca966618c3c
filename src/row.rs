//! A decoded row: one `ColumnValue` per column, alongside the metadata
//! that describes them.

use std::sync::Arc;

use crate::catalog::ColumnValue;
use crate::error::{Error, Result};
use crate::protocol::message::ColumnMetadata;

/// One row of a result set.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<ColumnMetadata>>,
    values: Vec<ColumnValue>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<ColumnMetadata>>, values: Vec<ColumnValue>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&ColumnValue> {
        self.values.get(index)
    }

    /// Look up a column by name, erroring on an ambiguous or missing name
    /// rather than silently picking the first match.
    pub fn get_by_name(&self, name: &str) -> Result<&ColumnValue> {
        let mut found: Option<usize> = None;
        for (i, column) in self.columns.iter().enumerate() {
            if column.name == name {
                if found.is_some() {
                    return Err(Error::Contract(format!(
                        "column name {name:?} is ambiguous: more than one column has this name"
                    )));
                }
                found = Some(i);
            }
        }
        match found {
            Some(i) => Ok(&self.values[i]),
            None => Err(Error::Contract(format!("no column named {name:?}"))),
        }
    }

    /// Consume the row, asserting it has exactly one column.
    pub fn into_only_value(mut self) -> Result<ColumnValue> {
        match self.values.len() {
            1 => Ok(self.values.remove(0)),
            n => Err(Error::Contract(format!(
                "expected a single-column row, got {n} columns"
            ))),
        }
    }

    /// Consume the row into its raw values, in column order.
    pub fn into_values(self) -> Vec<ColumnValue> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::FormatCode;

    fn column(name: &str) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            table_oid: 0,
            column_attnum: 0,
            type_oid: 25,
            type_size: -1,
            type_mod: -1,
            format: FormatCode::Binary,
        }
    }

    #[test]
    fn get_by_name_finds_match() {
        let columns = Arc::new(vec![column("id"), column("name")]);
        let row = Row::new(columns, vec![ColumnValue::I32(1), ColumnValue::Text("a".into())]);
        assert_eq!(row.get_by_name("name").unwrap(), &ColumnValue::Text("a".into()));
    }

    #[test]
    fn get_by_name_rejects_ambiguous() {
        let columns = Arc::new(vec![column("id"), column("id")]);
        let row = Row::new(columns, vec![ColumnValue::I32(1), ColumnValue::I32(2)]);
        assert!(row.get_by_name("id").is_err());
    }

    #[test]
    fn into_only_value_requires_single_column() {
        let columns = Arc::new(vec![column("id"), column("name")]);
        let row = Row::new(columns, vec![ColumnValue::I32(1), ColumnValue::Text("a".into())]);
        assert!(row.into_only_value().is_err());
    }
}
