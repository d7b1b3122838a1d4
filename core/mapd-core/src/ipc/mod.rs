//! Shared-memory result transfer.
//!
//! `sql_execute_df` leaves the result in two SysV segments (schema, data);
//! `sql_execute_gdf` leaves the data in GPU memory behind a CUDA IPC handle.
//! Either way the client attaches, reads the result stream in place, then
//! detaches. Releasing the server-side dataframe is a separate RPC made by
//! the connection.

pub mod gpu;
pub mod handle;
pub mod shm;

pub use gpu::{CUDA_IPC_HANDLE_LEN, GpuIpcHandle, import_to_host};
pub use handle::SharedMemoryHandle;
pub use shm::{SharedMemorySegment, attached_segments, detach_raw, is_attached};

use crate::error::MapdResult;
use crate::stream::{StreamSchema, parse_batch, parse_schema};
use arrow::record_batch::RecordBatch;

/// Attach the schema and data segments of a CPU result and decode them.
///
/// Record batches borrow the data segment, which stays attached until the
/// last of them is dropped. The schema segment is detached before return.
pub fn read_cpu_result(
    schema_handle: &SharedMemoryHandle,
    data_handle: &SharedMemoryHandle,
) -> MapdResult<(StreamSchema, Vec<RecordBatch>)> {
    let schema_segment = SharedMemorySegment::attach(schema_handle)?;
    let schema = {
        let buffer = arrow::buffer::Buffer::from(schema_segment.as_slice());
        parse_schema(&buffer)?
    };
    schema_segment.detach()?;

    let data = SharedMemorySegment::attach(data_handle)?.into_buffer();
    let batches = parse_batch(&data, &schema)?;
    Ok((schema, batches))
}

/// Schema from shared memory, data imported from the GPU.
pub fn read_gpu_result(
    schema_handle: &SharedMemoryHandle,
    data_handle: &GpuIpcHandle,
) -> MapdResult<(StreamSchema, Vec<RecordBatch>)> {
    let schema_segment = SharedMemorySegment::attach(schema_handle)?;
    let schema = {
        let buffer = arrow::buffer::Buffer::from(schema_segment.as_slice());
        parse_schema(&buffer)?
    };
    schema_segment.detach()?;

    let data = import_to_host(data_handle)?;
    let batches = parse_batch(&data, &schema)?;
    Ok((schema, batches))
}
