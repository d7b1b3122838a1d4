//! Column marshalling: in-process values ↔ server wire representations.
//!
//! - [`encode`]: `Batch` + row descriptor → columnar / row-wise / text / Arrow
//! - [`decode`]: wire results → [`Table`]
//! - [`infer`]: row descriptor inference for `create_table`
//! - [`arrow`]: `Table` ↔ `RecordBatch`

pub mod arrow;
pub mod decode;
pub mod encode;
pub mod geometry;
pub mod infer;
pub mod numeric;
pub mod table;
pub mod temporal;
pub mod value;
pub mod wire;

pub use self::arrow::{arrow_schema, record_batch_to_table, table_to_record_batch};
pub use decode::{decode, decode_column, decode_columns, decode_rows, decode_text};
pub use encode::{
    WireFormat, WirePayload, encode, encode_column, encode_columns, encode_columns_chunked,
    encode_rows, encode_text,
};
pub use geometry::{Coord, Geometry};
pub use infer::{build_row_desc, infer_column_type};
pub use table::{Batch, Table, TableBuilder};
pub use value::Value;
pub use wire::{
    DatumVal, StringRow, StringValue, WireColumn, WireData, WireDatum, WireRow, validate_columns,
};
