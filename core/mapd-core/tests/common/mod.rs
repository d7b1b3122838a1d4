// Shared integration-test fixture: an in-process fake server
//
// FakeServer implements MapdClient. Each sql_execute_df request creates real
// SysV shared-memory segments and writes the Arrow stream into them.

#![allow(dead_code)]

use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use mapd_core::marshal::{
    Batch, StringRow, Table, WireColumn, WireRow, encode_columns, encode_rows,
};
use mapd_core::rpc::{
    CreateParams, Dashboard, DataFrame, DeviceType, FileType, MapdClient, QueryResult, RowSet,
    RpcError, RpcResult, SessionId, TableDetails,
};
use mapd_core::stream::write_stream;
use mapd_core::types::ColumnDesc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

pub const USER: &str = "mapd";
pub const PASSWORD: &str = "HyperInteractive";
pub const DEALLOCATE_TWICE: &str =
    "Exception: current data frame handle is not bookkept or been inserted twice";

/// What a load RPC carried.
#[derive(Debug, Clone, PartialEq)]
pub enum Load {
    Text(Vec<StringRow>),
    Rows(Vec<WireRow>),
    Columnar(Vec<WireColumn>),
    Arrow(Vec<u8>),
}

struct Segments {
    schema_id: i32,
    data_id: i32,
}

#[derive(Default)]
pub struct FakeServer {
    sessions: u32,
    pub disconnects: u32,
    pub fail_disconnect: bool,
    pub queries: Vec<String>,
    pub result: Option<(Vec<ColumnDesc>, Table)>,
    pub ipc_result: Option<RecordBatch>,
    pub tables: BTreeMap<String, Vec<ColumnDesc>>,
    pub loads: Vec<(String, Load)>,
    pub dashboards: BTreeMap<i32, Dashboard>,
    pub deallocations: u32,
    dataframes: BTreeMap<Vec<u8>, Segments>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, row_desc: Vec<ColumnDesc>) -> Self {
        self.tables.insert(name.to_string(), row_desc);
        self
    }

    pub fn with_result(mut self, row_desc: Vec<ColumnDesc>, table: Table) -> Self {
        self.result = Some((row_desc, table));
        self
    }

    pub fn with_ipc_result(mut self, batch: RecordBatch) -> Self {
        self.ipc_result = Some(batch);
        self
    }

    /// Dataframes allocated and not yet deallocated.
    pub fn live_dataframes(&self) -> usize {
        self.dataframes.len()
    }

    fn session_ok(&self, session: &str) -> RpcResult<()> {
        if self.sessions > 0 && session.starts_with("session-") {
            Ok(())
        } else {
            Err(RpcError::Server(format!("Exception: Session not valid: {session}")))
        }
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        for seg in self.dataframes.values() {
            remove_segment(seg.schema_id);
            remove_segment(seg.data_id);
        }
    }
}

// ─── SysV helpers ───────────────────────────────────────

static NEXT_KEY: AtomicI32 = AtomicI32::new(1);

/// Whether this host lets us create SysV segments at all.
pub fn shm_available() -> bool {
    // SAFETY: create and immediately remove a private segment.
    unsafe {
        let id = libc::shmget(libc::IPC_PRIVATE, 64, libc::IPC_CREAT | 0o600);
        if id == -1 {
            return false;
        }
        libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut());
    }
    true
}

/// Create a segment under a fresh key and fill it with `bytes`.
/// Returns `(key, id)`.
pub fn create_segment(bytes: &[u8]) -> (i32, i32) {
    let pid = std::process::id() as i32;
    loop {
        let key = ((pid & 0x7fff) << 16) | (NEXT_KEY.fetch_add(1, Ordering::SeqCst) & 0xffff);
        // SAFETY: fresh segment of exactly bytes.len(); mapped only here.
        unsafe {
            let id = libc::shmget(
                key,
                bytes.len().max(1),
                libc::IPC_CREAT | libc::IPC_EXCL | 0o600,
            );
            if id == -1 {
                if std::io::Error::last_os_error().raw_os_error() == Some(libc::EEXIST) {
                    continue;
                }
                panic!("shmget failed: {}", std::io::Error::last_os_error());
            }
            let addr = libc::shmat(id, std::ptr::null(), 0);
            assert_ne!(addr as isize, -1, "shmat failed");
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), addr as *mut u8, bytes.len());
            libc::shmdt(addr);
            return (key, id);
        }
    }
}

pub fn remove_segment(id: i32) {
    // SAFETY: IPC_RMID on an id we created; the segment goes away after the
    // last detach.
    unsafe {
        libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut());
    }
}

/// Arrow stream holding only the schema message.
pub fn schema_stream(batch: &RecordBatch) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, &batch.schema()).unwrap();
        writer.finish().unwrap();
    }
    buffer
}

// ─── MapdClient ─────────────────────────────────────────

impl MapdClient for FakeServer {
    fn connect(&mut self, user: &str, password: &str, _dbname: &str) -> RpcResult<SessionId> {
        if user != USER || password != PASSWORD {
            return Err(RpcError::Server(
                "Exception: Invalid credentials.".to_string(),
            ));
        }
        self.sessions += 1;
        Ok(format!("session-{}", self.sessions))
    }

    fn disconnect(&mut self, session: &str) -> RpcResult<()> {
        self.disconnects += 1;
        if self.fail_disconnect {
            return Err(RpcError::Transport("broken pipe".to_string()));
        }
        self.session_ok(session)
    }

    fn sql_execute(
        &mut self,
        session: &str,
        query: &str,
        column_format: bool,
        nonce: &str,
        _first_n: i32,
        _at_most_n: i32,
    ) -> RpcResult<QueryResult> {
        self.session_ok(session)?;
        self.queries.push(query.to_string());
        let (row_desc, table) = self
            .result
            .clone()
            .ok_or_else(|| RpcError::Server("Exception: SQL Error: no result".to_string()))?;
        let batch: Batch = table.into();
        let row_set = if column_format {
            RowSet {
                columns: encode_columns(&batch, &row_desc)
                    .map_err(|e| RpcError::Application(e.to_string()))?,
                row_desc,
                rows: Vec::new(),
                is_columnar: true,
            }
        } else {
            RowSet {
                rows: encode_rows(&batch, &row_desc)
                    .map_err(|e| RpcError::Application(e.to_string()))?,
                row_desc,
                columns: Vec::new(),
                is_columnar: false,
            }
        };
        Ok(QueryResult {
            row_set,
            execution_time_ms: 1,
            total_time_ms: 2,
            nonce: nonce.to_string(),
        })
    }

    fn sql_execute_df(
        &mut self,
        session: &str,
        query: &str,
        _device_type: DeviceType,
        _device_id: i32,
        _first_n: i32,
    ) -> RpcResult<DataFrame> {
        self.session_ok(session)?;
        self.queries.push(query.to_string());
        let batch = self
            .ipc_result
            .clone()
            .ok_or_else(|| RpcError::Server("Exception: SQL Error: no result".to_string()))?;
        let schema_bytes = schema_stream(&batch);
        let data_bytes = write_stream(&batch).map_err(|e| RpcError::Application(e.to_string()))?;
        let (sm_key, schema_id) = create_segment(&schema_bytes);
        let (df_key, data_id) = create_segment(&data_bytes);
        let df = DataFrame {
            sm_handle: sm_key.to_le_bytes().to_vec(),
            sm_size: schema_bytes.len() as i64,
            df_handle: df_key.to_le_bytes().to_vec(),
            df_size: data_bytes.len() as i64,
        };
        self.dataframes
            .insert(df.df_handle.clone(), Segments { schema_id, data_id });
        Ok(df)
    }

    fn sql_execute_gdf(
        &mut self,
        session: &str,
        _query: &str,
        _device_id: i32,
        _first_n: i32,
    ) -> RpcResult<DataFrame> {
        self.session_ok(session)?;
        Err(RpcError::Server("Exception: no GPU available".to_string()))
    }

    fn deallocate_df(
        &mut self,
        session: &str,
        df: &DataFrame,
        _device_type: DeviceType,
        _device_id: i32,
    ) -> RpcResult<()> {
        self.session_ok(session)?;
        let seg = self
            .dataframes
            .remove(&df.df_handle)
            .ok_or_else(|| RpcError::Server(DEALLOCATE_TWICE.to_string()))?;
        remove_segment(seg.schema_id);
        remove_segment(seg.data_id);
        self.deallocations += 1;
        Ok(())
    }

    fn get_tables(&mut self, session: &str) -> RpcResult<Vec<String>> {
        self.session_ok(session)?;
        Ok(self.tables.keys().cloned().collect())
    }

    fn get_table_details(&mut self, session: &str, table_name: &str) -> RpcResult<TableDetails> {
        self.session_ok(session)?;
        let row_desc = self.tables.get(table_name).cloned().ok_or_else(|| {
            RpcError::Server(format!("Exception: Table/View {table_name} does not exist."))
        })?;
        Ok(TableDetails {
            row_desc,
            fragment_size: 32_000_000,
            page_size: 2_097_152,
            max_rows: i64::MAX,
            ..TableDetails::default()
        })
    }

    fn load_table(&mut self, session: &str, table_name: &str, rows: &[StringRow]) -> RpcResult<()> {
        self.session_ok(session)?;
        self.loads
            .push((table_name.to_string(), Load::Text(rows.to_vec())));
        Ok(())
    }

    fn load_table_binary(&mut self, session: &str, table_name: &str, rows: &[WireRow]) -> RpcResult<()> {
        self.session_ok(session)?;
        self.loads
            .push((table_name.to_string(), Load::Rows(rows.to_vec())));
        Ok(())
    }

    fn load_table_binary_columnar(
        &mut self,
        session: &str,
        table_name: &str,
        columns: &[WireColumn],
    ) -> RpcResult<()> {
        self.session_ok(session)?;
        self.loads
            .push((table_name.to_string(), Load::Columnar(columns.to_vec())));
        Ok(())
    }

    fn load_table_binary_arrow(
        &mut self,
        session: &str,
        table_name: &str,
        arrow_stream: &[u8],
    ) -> RpcResult<()> {
        self.session_ok(session)?;
        self.loads
            .push((table_name.to_string(), Load::Arrow(arrow_stream.to_vec())));
        Ok(())
    }

    fn create_table(
        &mut self,
        session: &str,
        table_name: &str,
        row_desc: &[ColumnDesc],
        _file_type: FileType,
        _params: &CreateParams,
    ) -> RpcResult<()> {
        self.session_ok(session)?;
        if self.tables.contains_key(table_name) {
            return Err(RpcError::Server(format!(
                "Exception: Table {table_name} already exists."
            )));
        }
        self.tables.insert(table_name.to_string(), row_desc.to_vec());
        Ok(())
    }

    fn get_dashboards(&mut self, session: &str) -> RpcResult<Vec<Dashboard>> {
        self.session_ok(session)?;
        Ok(self.dashboards.values().cloned().collect())
    }

    fn get_dashboard(&mut self, session: &str, dashboard_id: i32) -> RpcResult<Dashboard> {
        self.session_ok(session)?;
        self.dashboards.get(&dashboard_id).cloned().ok_or_else(|| {
            RpcError::Server(format!("Exception: Dashboard id {dashboard_id} does not exist"))
        })
    }

    fn create_dashboard(
        &mut self,
        session: &str,
        name: &str,
        state: &str,
        image_hash: &str,
        metadata: &str,
    ) -> RpcResult<i32> {
        self.session_ok(session)?;
        let id = self.dashboards.keys().max().copied().unwrap_or(0) + 1;
        self.dashboards.insert(
            id,
            Dashboard {
                dashboard_id: id,
                dashboard_name: name.to_string(),
                dashboard_state: state.to_string(),
                image_hash: image_hash.to_string(),
                dashboard_metadata: metadata.to_string(),
                dashboard_owner: USER.to_string(),
                ..Dashboard::default()
            },
        );
        Ok(id)
    }

    fn delete_dashboard(&mut self, session: &str, dashboard_id: i32) -> RpcResult<()> {
        self.session_ok(session)?;
        self.dashboards
            .remove(&dashboard_id)
            .map(|_| ())
            .ok_or_else(|| {
                RpcError::Server(format!("Exception: Dashboard id {dashboard_id} does not exist"))
            })
    }
}
