//! Bulk loading.
//!
//! Every loader fetches the target's row descriptor with
//! `get_table_details`, encodes the batch against it and sends one (or, for
//! chunked columnar loads, several) load RPCs.

use super::Connection;
use crate::api::IntoRow;
use crate::error::{MapdError, MapdResult};
use crate::marshal::{
    Batch, Table, WireFormat, WirePayload, build_row_desc, encode, encode_columns_chunked,
};
use crate::rpc::{CreateParams, FileType, MapdClient};
use crate::types::ColumnDesc;
use tracing::{debug, info};

/// How [`Connection::load_table`] ships the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMethod {
    /// Arrow for column batches (columnar when the table has array
    /// columns), row-wise binary for row batches
    #[default]
    Infer,
    Arrow,
    Columnar,
    Rows,
    /// Plain text rows (`load_table`)
    Text,
}

impl LoadMethod {
    fn resolve(self, batch: &Batch, schema: &[ColumnDesc]) -> LoadMethod {
        match (self, batch) {
            (LoadMethod::Infer, Batch::Rows(_)) => LoadMethod::Rows,
            (LoadMethod::Infer, Batch::Columns(_)) => {
                if schema.iter().any(|d| d.col_type.is_array) {
                    LoadMethod::Columnar
                } else {
                    LoadMethod::Arrow
                }
            }
            (method, _) => method,
        }
    }
}

impl<C: MapdClient> Connection<C> {
    /// Load `batch` into `table_name`.
    ///
    /// With `create`, a missing table is first created from the batch's
    /// inferred row descriptor (column batches only).
    pub fn load_table(
        &mut self,
        table_name: &str,
        batch: impl Into<Batch>,
        method: LoadMethod,
        create: bool,
    ) -> MapdResult<()> {
        let batch = batch.into();
        if create && !self.table_exists(table_name)? {
            match &batch {
                Batch::Columns(table) => self.create_table(table_name, table)?,
                Batch::Rows(_) => {
                    return Err(MapdError::Interface(format!(
                        "cannot create '{table_name}' from row tuples; pass a column batch"
                    )));
                }
            }
        }

        let schema = self.row_desc(table_name)?;
        match method.resolve(&batch, &schema) {
            LoadMethod::Arrow => self.send(table_name, &batch, &schema, WireFormat::Arrow),
            LoadMethod::Columnar => self.send_columnar(table_name, &batch, &schema, 0),
            LoadMethod::Rows | LoadMethod::Infer => {
                self.send(table_name, &batch, &schema, WireFormat::Rows)
            }
            LoadMethod::Text => self.send(table_name, &batch, &schema, WireFormat::Text),
        }
    }

    /// Row-wise binary load (`load_table_binary`).
    pub fn load_table_rowwise(&mut self, table_name: &str, batch: impl Into<Batch>) -> MapdResult<()> {
        let schema = self.row_desc(table_name)?;
        self.send(table_name, &batch.into(), &schema, WireFormat::Rows)
    }

    /// Columnar load, split into requests of about `chunk_size_bytes`
    /// (`0` sends everything at once).
    pub fn load_table_columnar(
        &mut self,
        table_name: &str,
        batch: impl Into<Batch>,
        chunk_size_bytes: usize,
    ) -> MapdResult<()> {
        let schema = self.row_desc(table_name)?;
        self.send_columnar(table_name, &batch.into(), &schema, chunk_size_bytes)
    }

    /// Arrow stream load. Array columns are not supported by this path.
    pub fn load_table_arrow(&mut self, table_name: &str, batch: impl Into<Batch>) -> MapdResult<()> {
        let schema = self.row_desc(table_name)?;
        self.send(table_name, &batch.into(), &schema, WireFormat::Arrow)
    }

    /// Text load (`load_table`); every value is sent in its display form.
    pub fn load_table_text(&mut self, table_name: &str, batch: impl Into<Batch>) -> MapdResult<()> {
        let schema = self.row_desc(table_name)?;
        self.send(table_name, &batch.into(), &schema, WireFormat::Text)
    }

    /// Create `table_name` with a row descriptor inferred from `table`.
    pub fn create_table(&mut self, table_name: &str, table: &Table) -> MapdResult<()> {
        let row_desc = build_row_desc(table)?;
        self.create_table_with(table_name, &row_desc)
    }

    /// Create `table_name` with an explicit row descriptor.
    pub fn create_table_with(&mut self, table_name: &str, row_desc: &[ColumnDesc]) -> MapdResult<()> {
        self.call(|c, s| {
            c.create_table(
                s,
                table_name,
                row_desc,
                FileType::Delimited,
                &CreateParams::default(),
            )
        })?;
        info!(target: "load", table = table_name, columns = row_desc.len(), "created table");
        Ok(())
    }

    /// Load typed rows into `T::table_name()`, creating the table from
    /// `T::row_desc()` when it does not exist.
    pub fn load_rows<T: IntoRow>(&mut self, rows: impl IntoIterator<Item = T>) -> MapdResult<()> {
        let table_name = T::table_name().ok_or_else(|| {
            MapdError::Interface(
                "type has no table name; use load_rows_into or #[mapd(table_name = ...)]"
                    .to_string(),
            )
        })?;
        self.load_rows_into(table_name, rows)
    }

    pub fn load_rows_into<T: IntoRow>(
        &mut self,
        table_name: &str,
        rows: impl IntoIterator<Item = T>,
    ) -> MapdResult<()> {
        let row_desc = T::row_desc();
        if !self.table_exists(table_name)? {
            self.create_table_with(table_name, &row_desc)?;
        }
        let names = row_desc.into_iter().map(|d| d.name).collect();
        let table = Table::from_rows(names, rows.into_iter().map(IntoRow::into_row).collect())?;
        self.load_table(table_name, table, LoadMethod::Infer, false)
    }

    fn table_exists(&mut self, table_name: &str) -> MapdResult<bool> {
        Ok(self.get_tables()?.iter().any(|t| t == table_name))
    }

    fn send(
        &mut self,
        table_name: &str,
        batch: &Batch,
        schema: &[ColumnDesc],
        format: WireFormat,
    ) -> MapdResult<()> {
        let rows = batch.num_rows();
        match encode(batch, schema, format)? {
            WirePayload::Rows(wire) => self.call(|c, s| c.load_table_binary(s, table_name, &wire))?,
            WirePayload::Text(wire) => self.call(|c, s| c.load_table(s, table_name, &wire))?,
            WirePayload::Arrow(bytes) => {
                self.call(|c, s| c.load_table_binary_arrow(s, table_name, &bytes))?
            }
            WirePayload::Columnar(wire) => {
                self.call(|c, s| c.load_table_binary_columnar(s, table_name, &wire))?
            }
        }
        info!(target: "load", table = table_name, rows, ?format, "loaded");
        Ok(())
    }

    fn send_columnar(
        &mut self,
        table_name: &str,
        batch: &Batch,
        schema: &[ColumnDesc],
        chunk_size_bytes: usize,
    ) -> MapdResult<()> {
        let chunks = encode_columns_chunked(batch, schema, chunk_size_bytes)?;
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            self.call(|c, s| c.load_table_binary_columnar(s, table_name, chunk))?;
            debug!(target: "load", table = table_name, chunk = i + 1, total, "sent columnar chunk");
        }
        info!(target: "load", table = table_name, rows = batch.num_rows(), chunks = total, "loaded columnar");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Value;
    use crate::types::{ColumnType, DatumType};

    #[test]
    fn infer_picks_format_from_batch_shape() {
        let flat = vec![ColumnDesc::new("a", ColumnType::new(DatumType::Int))];
        let nested = vec![ColumnDesc::new("a", ColumnType::new(DatumType::Int).array())];
        let rows = Batch::Rows(vec![vec![Value::Int(1)]]);
        let cols = Batch::Columns(Table::builder().column("a", vec![1i64]).build().unwrap());

        assert_eq!(LoadMethod::Infer.resolve(&rows, &flat), LoadMethod::Rows);
        assert_eq!(LoadMethod::Infer.resolve(&cols, &flat), LoadMethod::Arrow);
        assert_eq!(LoadMethod::Infer.resolve(&cols, &nested), LoadMethod::Columnar);
        assert_eq!(LoadMethod::Text.resolve(&cols, &flat), LoadMethod::Text);
    }
}
