//! The server contract.
//!
//! Implemented by the host's transport (Thrift binary or HTTP). Every call
//! blocks and takes `&mut self`; one client serves one session at a time.

use super::RpcResult;
use super::types::{
    CreateParams, Dashboard, DataFrame, DeviceType, FileType, QueryResult, SessionId, TableDetails,
};
use crate::marshal::{StringRow, WireColumn, WireRow};
use crate::types::ColumnDesc;

pub trait MapdClient {
    fn connect(&mut self, user: &str, password: &str, dbname: &str) -> RpcResult<SessionId>;

    fn disconnect(&mut self, session: &str) -> RpcResult<()>;

    /// `first_n` / `at_most_n` of `-1` mean no limit.
    fn sql_execute(
        &mut self,
        session: &str,
        query: &str,
        column_format: bool,
        nonce: &str,
        first_n: i32,
        at_most_n: i32,
    ) -> RpcResult<QueryResult>;

    /// Result left in CPU shared memory.
    fn sql_execute_df(
        &mut self,
        session: &str,
        query: &str,
        device_type: DeviceType,
        device_id: i32,
        first_n: i32,
    ) -> RpcResult<DataFrame>;

    /// Result left in GPU memory.
    fn sql_execute_gdf(
        &mut self,
        session: &str,
        query: &str,
        device_id: i32,
        first_n: i32,
    ) -> RpcResult<DataFrame>;

    /// Release the server-side bookkeeping of a dataframe. Not idempotent.
    fn deallocate_df(
        &mut self,
        session: &str,
        df: &DataFrame,
        device_type: DeviceType,
        device_id: i32,
    ) -> RpcResult<()>;

    fn get_tables(&mut self, session: &str) -> RpcResult<Vec<String>>;

    fn get_table_details(&mut self, session: &str, table_name: &str) -> RpcResult<TableDetails>;

    fn load_table(&mut self, session: &str, table_name: &str, rows: &[StringRow]) -> RpcResult<()>;

    fn load_table_binary(&mut self, session: &str, table_name: &str, rows: &[WireRow])
    -> RpcResult<()>;

    fn load_table_binary_columnar(
        &mut self,
        session: &str,
        table_name: &str,
        columns: &[WireColumn],
    ) -> RpcResult<()>;

    /// `arrow_stream` is a complete Arrow IPC stream.
    fn load_table_binary_arrow(
        &mut self,
        session: &str,
        table_name: &str,
        arrow_stream: &[u8],
    ) -> RpcResult<()>;

    fn create_table(
        &mut self,
        session: &str,
        table_name: &str,
        row_desc: &[ColumnDesc],
        file_type: FileType,
        params: &CreateParams,
    ) -> RpcResult<()>;

    fn get_dashboards(&mut self, session: &str) -> RpcResult<Vec<Dashboard>>;

    fn get_dashboard(&mut self, session: &str, dashboard_id: i32) -> RpcResult<Dashboard>;

    /// Returns the new dashboard id.
    fn create_dashboard(
        &mut self,
        session: &str,
        name: &str,
        state: &str,
        image_hash: &str,
        metadata: &str,
    ) -> RpcResult<i32>;

    fn delete_dashboard(&mut self, session: &str, dashboard_id: i32) -> RpcResult<()>;
}
