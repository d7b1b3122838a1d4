//! Type catalog and column descriptors.

pub mod catalog;
pub mod column;

pub use catalog::{DatumType, NullSentinel, SlotKind, display_name_for, null_sentinel_for, slot_for};
pub use column::{ColumnDesc, ColumnType, Encoding};
