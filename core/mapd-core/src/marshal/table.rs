//! In-process tables: the decoded output of a query and the input of a load.

use super::value::Value;
use crate::error::{MapdError, MapdResult};
use crate::types::ColumnDesc;

/// Named, ordered columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Table {
    /// Build from columns; every column must have the same length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<Value>>) -> MapdResult<Self> {
        if names.len() != columns.len() {
            return Err(MapdError::SchemaMismatch(format!(
                "{} names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        if let Some(first) = columns.first() {
            let rows = first.len();
            if let Some((i, _)) = columns.iter().enumerate().find(|(_, c)| c.len() != rows) {
                return Err(MapdError::SchemaMismatch(format!(
                    "column '{}' has {} rows, expected {rows}",
                    names[i],
                    columns[i].len()
                )));
            }
        }
        Ok(Self { names, columns })
    }

    /// Build from row tuples.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> MapdResult<Self> {
        let width = names.len();
        let mut columns: Vec<Vec<Value>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(MapdError::SchemaMismatch(format!(
                    "row {r} has {} values, expected {width}",
                    row.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(value);
            }
        }
        Ok(Self { names, columns })
    }

    /// Convenience builder: `Table::builder().column("a", vec![...])`.
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Vec<Value>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.index_of(name).map(|i| self.columns[i].as_slice())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn row(&self, idx: usize) -> Option<Vec<Value>> {
        if idx >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| c[idx].clone()).collect())
    }

    pub fn rows(&self) -> Vec<Vec<Value>> {
        (0..self.num_rows())
            .map(|i| self.columns.iter().map(|c| c[i].clone()).collect())
            .collect()
    }

    /// Append the rows of `other`, which must have the same column names.
    pub fn append(&mut self, other: Table) -> MapdResult<()> {
        if self.names != other.names {
            return Err(MapdError::SchemaMismatch(format!(
                "cannot append columns {:?} to {:?}",
                other.names, self.names
            )));
        }
        for (col, more) in self.columns.iter_mut().zip(other.columns) {
            col.extend(more);
        }
        Ok(())
    }

    pub(crate) fn into_columns(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.names, self.columns)
    }

    /// Consume into row tuples without cloning values.
    pub fn into_rows(self) -> Vec<Vec<Value>> {
        let rows = self.num_rows();
        let mut iters: Vec<_> = self.columns.into_iter().map(Vec::into_iter).collect();
        (0..rows)
            .map(|_| iters.iter_mut().filter_map(Iterator::next).collect())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct TableBuilder {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl TableBuilder {
    pub fn column<V: Into<Value>>(mut self, name: impl Into<String>, values: Vec<V>) -> Self {
        self.names.push(name.into());
        self.columns.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> MapdResult<Table> {
        Table::new(self.names, self.columns)
    }
}

/// Load input: row tuples matched to the schema by position, or a table
/// matched by column name.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Rows(Vec<Vec<Value>>),
    Columns(Table),
}

impl Batch {
    pub fn num_rows(&self) -> usize {
        match self {
            Batch::Rows(rows) => rows.len(),
            Batch::Columns(table) => table.num_rows(),
        }
    }

    /// Values of each schema column, in schema order.
    pub(crate) fn aligned<'a>(&'a self, schema: &[ColumnDesc]) -> MapdResult<Vec<Vec<&'a Value>>> {
        match self {
            Batch::Rows(rows) => {
                let mut columns: Vec<Vec<&Value>> =
                    (0..schema.len()).map(|_| Vec::with_capacity(rows.len())).collect();
                for (r, row) in rows.iter().enumerate() {
                    if row.len() != schema.len() {
                        return Err(MapdError::SchemaMismatch(format!(
                            "row {r} has {} values but the schema has {} columns",
                            row.len(),
                            schema.len()
                        )));
                    }
                    for (col, value) in columns.iter_mut().zip(row) {
                        col.push(value);
                    }
                }
                Ok(columns)
            }
            Batch::Columns(table) => {
                if table.num_columns() != schema.len() {
                    return Err(MapdError::SchemaMismatch(format!(
                        "batch has {} columns but the schema has {}",
                        table.num_columns(),
                        schema.len()
                    )));
                }
                schema
                    .iter()
                    .map(|desc| {
                        table
                            .column(&desc.name)
                            .map(|values| values.iter().collect())
                            .ok_or_else(|| {
                                MapdError::SchemaMismatch(format!(
                                    "column '{}' missing from batch",
                                    desc.name
                                ))
                            })
                    })
                    .collect()
            }
        }
    }
}

impl From<Table> for Batch {
    fn from(table: Table) -> Self {
        Batch::Columns(table)
    }
}

impl From<Vec<Vec<Value>>> for Batch {
    fn from(rows: Vec<Vec<Value>>) -> Self {
        Batch::Rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnType, DatumType};

    #[test]
    fn rows_and_columns_agree() {
        let rows = vec![
            vec![Value::Int(1), Value::from("x")],
            vec![Value::Null, Value::from("y")],
        ];
        let table = Table::from_rows(vec!["a".into(), "b".into()], rows.clone()).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.rows(), rows);
        assert_eq!(table.clone().into_rows(), rows);
        assert_eq!(table.column("b").unwrap()[1], Value::from("y"));
    }

    #[test]
    fn ragged_columns_rejected() {
        let err = Table::builder()
            .column("a", vec![1i64, 2])
            .column("b", vec![1i64])
            .build();
        assert!(matches!(err, Err(MapdError::SchemaMismatch(_))));
    }

    #[test]
    fn aligned_by_name() {
        let table = Table::builder()
            .column("b", vec!["x"])
            .column("a", vec![1i64])
            .build()
            .unwrap();
        let schema = vec![
            ColumnDesc::new("a", ColumnType::new(DatumType::Int)),
            ColumnDesc::new("b", ColumnType::new(DatumType::Str)),
        ];
        let batch = Batch::Columns(table);
        let cols = batch.aligned(&schema).unwrap();
        assert_eq!(cols[0], vec![&Value::Int(1)]);
        assert_eq!(cols[1], vec![&Value::from("x")]);

        let wrong = vec![ColumnDesc::new("c", ColumnType::new(DatumType::Int)), schema[1].clone()];
        assert!(batch.aligned(&wrong).is_err());
    }
}
