//! Encapsulated Arrow IPC message framing.
//!
//! ```text
//! [0xFFFFFFFF][i32 metadata_len][flatbuffer Message][body: bodyLength bytes]
//! ```
//!
//! Streams from older servers omit the continuation marker and start with
//! the bare `i32` length. A zero length marks end-of-stream.

use crate::error::{MapdError, MapdResult};
use arrow::buffer::Buffer;
use arrow::ipc::{Message, MessageHeader, root_as_message};
use std::ops::Range;

const CONTINUATION: u32 = 0xFFFF_FFFF;

/// One framed message. Metadata and body are slices of the source buffer.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    metadata: Buffer,
    body: Buffer,
    header: MessageHeader,
    span: Range<usize>,
}

impl StreamMessage {
    pub fn header(&self) -> MessageHeader {
        self.header
    }

    /// Parsed flatbuffer metadata.
    pub fn message(&self) -> MapdResult<Message<'_>> {
        root_as_message(self.metadata.as_slice())
            .map_err(|e| MapdError::CorruptStream(format!("invalid message flatbuffer: {e}")))
    }

    pub fn body(&self) -> &Buffer {
        &self.body
    }

    /// Byte range of the whole framed message within the source buffer.
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }
}

/// Iterator over the messages of a stream buffer. Stops at end-of-stream or
/// at the end of the buffer.
pub struct MessageReader {
    buffer: Buffer,
    offset: usize,
    done: bool,
}

impl MessageReader {
    pub fn new(buffer: Buffer) -> Self {
        Self {
            buffer,
            offset: 0,
            done: false,
        }
    }

    fn read_u32(&self, at: usize) -> MapdResult<u32> {
        let bytes = self
            .buffer
            .as_slice()
            .get(at..at + 4)
            .ok_or_else(|| MapdError::CorruptStream(format!("truncated length prefix at byte {at}")))?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn next_message(&mut self) -> MapdResult<Option<StreamMessage>> {
        let start = self.offset;
        if start >= self.buffer.len() {
            return Ok(None);
        }
        let mut cursor = start;
        let mut len = self.read_u32(cursor)?;
        cursor += 4;
        if len == CONTINUATION {
            len = self.read_u32(cursor)?;
            cursor += 4;
        }
        let meta_len = i32::from_le_bytes(len.to_le_bytes());
        if meta_len == 0 {
            return Ok(None);
        }
        let meta_len = usize::try_from(meta_len)
            .map_err(|_| MapdError::CorruptStream(format!("negative metadata length {meta_len}")))?;
        if cursor + meta_len > self.buffer.len() {
            return Err(MapdError::CorruptStream(format!(
                "metadata of {meta_len} bytes at byte {cursor} runs past the buffer"
            )));
        }
        let metadata = self.buffer.slice_with_length(cursor, meta_len);
        cursor += meta_len;

        let (header, body_len) = {
            let message = root_as_message(metadata.as_slice())
                .map_err(|e| MapdError::CorruptStream(format!("invalid message flatbuffer: {e}")))?;
            let body_len = usize::try_from(message.bodyLength()).map_err(|_| {
                MapdError::CorruptStream(format!("negative body length {}", message.bodyLength()))
            })?;
            (message.header_type(), body_len)
        };
        if cursor + body_len > self.buffer.len() {
            return Err(MapdError::CorruptStream(format!(
                "body of {body_len} bytes at byte {cursor} runs past the buffer"
            )));
        }
        let body = self.buffer.slice_with_length(cursor, body_len);
        cursor += body_len;
        self.offset = cursor;
        Ok(Some(StreamMessage {
            metadata,
            body,
            header,
            span: start..cursor,
        }))
    }
}

impl Iterator for MessageReader {
    type Item = MapdResult<StreamMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
