//! Arrow IPC stream serialization for `load_table_binary_arrow`.

use crate::error::MapdResult;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;

/// Serialize a record batch as a complete Arrow IPC stream (schema message,
/// any dictionaries, the batch, end-of-stream marker).
pub fn write_stream(batch: &RecordBatch) -> MapdResult<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, &batch.schema())?;
        writer.write(batch)?;
        writer.finish()?;
    }
    Ok(buffer)
}
