//! Queries: cursors, shared-memory (IPC) results, catalog lookups.

use super::Connection;
use super::cursor::Cursor;
use super::params::{Params, bind_parameters};
use crate::error::MapdResult;
use crate::ipc;
use crate::marshal::{Table, record_batch_to_table};
use crate::rpc::{DataFrame, DeviceType, MapdClient};
use crate::stream::StreamSchema;
use crate::types::{ColumnDesc, DatumType, Encoding, display_name_for};
use arrow::record_batch::RecordBatch;
use tracing::{debug, info};

/// Options of [`Connection::select_ipc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcOptions {
    /// Row limit passed to the server, `-1` for none
    pub first_n: i32,
    /// Send `deallocate_df` once the result has been read
    pub release_memory: bool,
}

impl Default for IpcOptions {
    fn default() -> Self {
        Self {
            first_n: -1,
            release_memory: true,
        }
    }
}

/// Result of an IPC select.
///
/// The record batches read the data segment in place; it stays attached
/// until the last batch (or buffer slice) is dropped.
#[derive(Debug, Clone)]
pub struct IpcFrame {
    pub schema: StreamSchema,
    pub batches: Vec<RecordBatch>,
    /// Server-side dataframe, present when it was not released yet
    pub handle: Option<DataFrame>,
}

impl IpcFrame {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Copy the result out into a [`Table`].
    pub fn to_table(&self) -> MapdResult<Table> {
        let names = self.schema.field_names();
        let mut table = Table::new(names.clone(), names.iter().map(|_| Vec::new()).collect())?;
        for batch in &self.batches {
            table.append(record_batch_to_table(batch)?)?;
        }
        Ok(table)
    }
}

/// One column of [`Connection::get_table_details`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDetails {
    pub name: String,
    pub type_name: &'static str,
    pub datum: DatumType,
    pub nullable: bool,
    pub precision: i32,
    pub scale: i32,
    pub comp_param: i32,
    pub encoding: Encoding,
    pub is_array: bool,
}

impl From<&ColumnDesc> for ColumnDetails {
    fn from(desc: &ColumnDesc) -> Self {
        let t = &desc.col_type;
        Self {
            name: desc.name.clone(),
            type_name: display_name_for(t.datum),
            datum: t.datum,
            nullable: t.nullable,
            precision: t.precision,
            scale: t.scale,
            comp_param: t.comp_param,
            encoding: t.encoding,
            is_array: t.is_array,
        }
    }
}

fn bound(sql: &str, params: Option<&Params>) -> MapdResult<String> {
    match params {
        Some(p) => bind_parameters(sql, p),
        None => Ok(sql.to_string()),
    }
}

impl<C: MapdClient> Connection<C> {
    /// A fresh cursor on this connection.
    pub fn cursor(&mut self) -> Cursor<'_, C> {
        Cursor::new(self)
    }

    /// Execute `sql` on a new cursor and return it, positioned before the
    /// first row.
    pub fn execute(&mut self, sql: &str, params: Option<&Params>) -> MapdResult<Cursor<'_, C>> {
        let mut cursor = Cursor::new(self);
        cursor.execute(sql, params)?;
        Ok(cursor)
    }

    /// Execute a `SELECT` whose result the server leaves in CPU shared
    /// memory, and read it without copying.
    ///
    /// With `release_memory` the server-side dataframe is deallocated after
    /// the read (also when the read fails); otherwise its handle is returned
    /// in the frame and must be passed to [`Self::deallocate_ipc`].
    pub fn select_ipc(
        &mut self,
        sql: &str,
        params: Option<&Params>,
        options: IpcOptions,
    ) -> MapdResult<IpcFrame> {
        let sql = bound(sql, params)?;
        let df = self.call(|c, s| c.sql_execute_df(s, &sql, DeviceType::Cpu, 0, options.first_n))?;
        debug!(target: "ipc", sm_size = df.sm_size, df_size = df.df_size, "dataframe allocated");

        let read = df
            .schema_handle()
            .and_then(|sm| Ok((sm, df.data_handle()?)))
            .and_then(|(sm, data)| ipc::read_cpu_result(&sm, &data));
        self.finish_ipc(read, df, options.release_memory, DeviceType::Cpu, 0)
    }

    /// Like [`Self::select_ipc`], with the result in GPU memory on
    /// `device_id`. The bytes are copied to host memory.
    pub fn select_ipc_gpu(
        &mut self,
        sql: &str,
        params: Option<&Params>,
        device_id: i32,
        options: IpcOptions,
    ) -> MapdResult<IpcFrame> {
        #[cfg(not(feature = "gpu"))]
        {
            let _ = (sql, params, device_id, options);
            Err(crate::error::MapdError::NotImplemented(
                "select_ipc_gpu requires the `gpu` feature".to_string(),
            ))
        }

        #[cfg(feature = "gpu")]
        {
            let sql = bound(sql, params)?;
            let df = self.call(|c, s| c.sql_execute_gdf(s, &sql, device_id, options.first_n))?;
            let read = df
                .schema_handle()
                .and_then(|sm| Ok((sm, df.gpu_handle(device_id)?)))
                .and_then(|(sm, gpu)| ipc::read_gpu_result(&sm, &gpu));
            self.finish_ipc(read, df, options.release_memory, DeviceType::Gpu, device_id)
        }
    }

    fn finish_ipc(
        &mut self,
        read: MapdResult<(StreamSchema, Vec<RecordBatch>)>,
        df: DataFrame,
        release: bool,
        device: DeviceType,
        device_id: i32,
    ) -> MapdResult<IpcFrame> {
        if !release {
            let (schema, batches) = read?;
            return Ok(IpcFrame {
                schema,
                batches,
                handle: Some(df),
            });
        }
        let released = self.call(|c, s| c.deallocate_df(s, &df, device, device_id));
        let (schema, batches) = read?;
        released?;
        Ok(IpcFrame {
            schema,
            batches,
            handle: None,
        })
    }

    /// Release a CPU dataframe returned by `select_ipc`. A second release of
    /// the same handle fails with the server's "already released" error.
    pub fn deallocate_ipc(&mut self, df: &DataFrame) -> MapdResult<()> {
        self.call(|c, s| c.deallocate_df(s, df, DeviceType::Cpu, 0))?;
        info!(target: "ipc", "released dataframe");
        Ok(())
    }

    pub fn deallocate_ipc_gpu(&mut self, df: &DataFrame, device_id: i32) -> MapdResult<()> {
        self.call(|c, s| c.deallocate_df(s, df, DeviceType::Gpu, device_id))?;
        info!(target: "ipc", device_id, "released GPU dataframe");
        Ok(())
    }

    pub fn get_tables(&mut self) -> MapdResult<Vec<String>> {
        self.call(|c, s| c.get_tables(s))
    }

    pub fn get_table_details(&mut self, table_name: &str) -> MapdResult<Vec<ColumnDetails>> {
        let details = self.call(|c, s| c.get_table_details(s, table_name))?;
        Ok(details.row_desc.iter().map(ColumnDetails::from).collect())
    }

    /// Row descriptor of an existing table.
    pub(crate) fn row_desc(&mut self, table_name: &str) -> MapdResult<Vec<ColumnDesc>> {
        Ok(self.call(|c, s| c.get_table_details(s, table_name))?.row_desc)
    }
}
