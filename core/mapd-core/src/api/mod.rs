//! Typed row mapping.
//!
//! `#[derive(Row)]` implements [`IntoRow`] and [`FromRow`] for plain
//! structs, so they can be loaded with
//! [`Connection::load_rows`](crate::connection::Connection::load_rows) and
//! fetched with [`Cursor::fetch_as`](crate::connection::Cursor::fetch_as).

pub mod traits;

pub use traits::{FromRow, FromValue, IntoColumnType, IntoRow, IntoValue, take_column};
