//! Result stream decoding.
//!
//! The server answers `sql_execute_df` with two shared-memory buffers: one
//! holding the Arrow schema message, one holding dictionary batches followed
//! by record batches. Both are read in place through [`MessageReader`];
//! message bodies are slices of the source buffer, never copies.
//!
//! Dictionary batches must precede the record batches that reference them.

pub mod message;
pub mod writer;

pub use message::{MessageReader, StreamMessage};
pub use writer::write_stream;

use crate::error::{MapdError, MapdResult};
use arrow::array::ArrayRef;
use arrow::buffer::Buffer;
use arrow::datatypes::SchemaRef;
use arrow::ipc::convert::fb_to_schema;
use arrow::ipc::reader::{read_dictionary, read_record_batch};
use arrow::ipc::{Field as FbField, MessageHeader};
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Schema of a result stream.
#[derive(Debug, Clone)]
pub struct StreamSchema {
    pub schema: SchemaRef,
    /// Ids of dictionaries referenced by dictionary-encoded fields
    pub dictionary_ids: Vec<i64>,
}

impl StreamSchema {
    pub fn field_names(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }
}

fn collect_dictionary_ids(field: FbField<'_>, out: &mut Vec<i64>) {
    if let Some(dict) = field.dictionary() {
        out.push(dict.id());
    }
    if let Some(children) = field.children() {
        for child in children.iter() {
            collect_dictionary_ids(child, out);
        }
    }
}

fn schema_from_message(message: &StreamMessage) -> MapdResult<StreamSchema> {
    let parsed = message.message()?;
    let fb_schema = parsed
        .header_as_schema()
        .ok_or_else(|| MapdError::CorruptStream("schema message without a schema header".into()))?;
    let mut dictionary_ids = Vec::new();
    if let Some(fields) = fb_schema.fields() {
        for field in fields.iter() {
            collect_dictionary_ids(field, &mut dictionary_ids);
        }
    }
    Ok(StreamSchema {
        schema: Arc::new(fb_to_schema(fb_schema)),
        dictionary_ids,
    })
}

/// Read the schema message at the start of `buffer`.
pub fn parse_schema(buffer: &Buffer) -> MapdResult<StreamSchema> {
    let first = MessageReader::new(buffer.clone())
        .next()
        .ok_or_else(|| MapdError::CorruptStream("empty schema buffer".into()))??;
    if first.header() != MessageHeader::Schema {
        return Err(MapdError::CorruptStream(format!(
            "expected a schema message, found {:?}",
            first.header()
        )));
    }
    let schema = schema_from_message(&first)?;
    debug!(
        target: "stream",
        fields = schema.schema.fields().len(),
        dictionaries = schema.dictionary_ids.len(),
        "parsed result schema"
    );
    Ok(schema)
}

/// Read every record batch in `buffer`, resolving dictionaries as they
/// arrive. Schema messages are skipped, so a complete stream is accepted.
pub fn parse_batch(buffer: &Buffer, schema: &StreamSchema) -> MapdResult<Vec<RecordBatch>> {
    let mut dictionaries: HashMap<i64, ArrayRef> = HashMap::new();
    let mut batches = Vec::new();
    for message in MessageReader::new(buffer.clone()) {
        let message = message?;
        match message.header() {
            MessageHeader::Schema => continue,
            MessageHeader::DictionaryBatch => {
                let parsed = message.message()?;
                let dict = parsed.header_as_dictionary_batch().ok_or_else(|| {
                    MapdError::CorruptStream("dictionary message without a dictionary header".into())
                })?;
                read_dictionary(
                    message.body(),
                    dict,
                    &schema.schema,
                    &mut dictionaries,
                    &parsed.version(),
                )
                .map_err(|e| MapdError::CorruptStream(format!("bad dictionary batch: {e}")))?;
            }
            MessageHeader::RecordBatch => {
                if let Some(missing) = schema
                    .dictionary_ids
                    .iter()
                    .find(|id| !dictionaries.contains_key(id))
                {
                    return Err(MapdError::CorruptStream(format!(
                        "record batch references dictionary {missing} before it was sent"
                    )));
                }
                let parsed = message.message()?;
                let fb_batch = parsed.header_as_record_batch().ok_or_else(|| {
                    MapdError::CorruptStream("record batch message without a batch header".into())
                })?;
                let batch = read_record_batch(
                    message.body(),
                    fb_batch,
                    schema.schema.clone(),
                    &dictionaries,
                    None,
                    &parsed.version(),
                )
                .map_err(|e| MapdError::CorruptStream(format!("bad record batch: {e}")))?;
                batches.push(batch);
            }
            other => {
                return Err(MapdError::CorruptStream(format!(
                    "unexpected message type {other:?}"
                )));
            }
        }
    }
    debug!(
        target: "stream",
        batches = batches.len(),
        rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
        "parsed result batches"
    );
    Ok(batches)
}

/// Schema and batches of a single self-contained stream.
pub fn read_stream(buffer: &Buffer) -> MapdResult<(StreamSchema, Vec<RecordBatch>)> {
    let schema = parse_schema(buffer)?;
    let batches = parse_batch(buffer, &schema)?;
    Ok((schema, batches))
}
