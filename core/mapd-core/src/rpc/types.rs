//! Request and response structures of the server contract.

use crate::ipc::{GpuIpcHandle, SharedMemoryHandle};
use crate::error::MapdResult;
use crate::marshal::{WireColumn, WireRow};
use crate::types::ColumnDesc;
use serde::{Deserialize, Serialize};

pub type SessionId = String;

/// Where a dataframe result lives (`TDeviceType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    Cpu = 0,
    Gpu = 1,
}

/// `sql_execute` result rows, row-wise or columnar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    pub row_desc: Vec<ColumnDesc>,
    pub rows: Vec<WireRow>,
    pub columns: Vec<WireColumn>,
    pub is_columnar: bool,
}

/// `TQueryResult`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub row_set: RowSet,
    pub execution_time_ms: i64,
    pub total_time_ms: i64,
    pub nonce: String,
}

/// `TDataFrame`: schema and data handles of an IPC result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataFrame {
    pub sm_handle: Vec<u8>,
    pub sm_size: i64,
    pub df_handle: Vec<u8>,
    pub df_size: i64,
}

impl DataFrame {
    fn size(value: i64, what: &str) -> MapdResult<usize> {
        usize::try_from(value).map_err(|_| {
            crate::error::MapdError::InvalidHandle(format!("negative {what} size {value}"))
        })
    }

    pub fn schema_handle(&self) -> MapdResult<SharedMemoryHandle> {
        Ok(SharedMemoryHandle::new(
            self.sm_handle.clone(),
            Self::size(self.sm_size, "schema")?,
        ))
    }

    pub fn data_handle(&self) -> MapdResult<SharedMemoryHandle> {
        Ok(SharedMemoryHandle::new(
            self.df_handle.clone(),
            Self::size(self.df_size, "data")?,
        ))
    }

    pub fn gpu_handle(&self, device_id: i32) -> MapdResult<GpuIpcHandle> {
        GpuIpcHandle::new(
            self.df_handle.clone(),
            Self::size(self.df_size, "data")?,
            device_id,
        )
    }
}

/// `TTableDetails`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableDetails {
    pub row_desc: Vec<ColumnDesc>,
    pub fragment_size: i64,
    pub page_size: i64,
    pub max_rows: i64,
    pub view_sql: String,
    pub shard_count: i64,
    pub is_temporary: bool,
}

/// `TFileType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileType {
    #[default]
    Delimited = 0,
    Polygon = 1,
}

/// `TCreateParams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateParams {
    pub is_replicated: bool,
}

/// `TDashboard`. State is base64-encoded JSON, metadata is JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dashboard {
    pub dashboard_id: i32,
    pub dashboard_name: String,
    pub dashboard_state: String,
    pub image_hash: String,
    pub update_time: String,
    pub dashboard_metadata: String,
    pub dashboard_owner: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataframe_handles() {
        let df = DataFrame {
            sm_handle: vec![1, 0, 0, 0],
            sm_size: 10,
            df_handle: vec![2, 0, 0, 0],
            df_size: 20,
        };
        assert_eq!(df.schema_handle().unwrap().sysv_key().unwrap(), 1);
        assert_eq!(df.data_handle().unwrap().size(), 20);
        assert!(df.gpu_handle(0).is_err());

        let bad = DataFrame { sm_size: -1, ..df };
        assert!(bad.schema_handle().is_err());
    }
}
