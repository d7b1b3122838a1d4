//! # mapd: DB-API style client for OmniSci/MapD
//!
//! Server RPCs go through the [`rpc::MapdClient`] trait, implemented by the
//! host. On top of it this crate provides sessions, cursors, loads and
//! zero-copy result transfer over shared memory.
//!
//! ## Features
//!
//! - **Column marshalling**: row/column batches ↔ server wire formats (columnar, row-wise, text, Arrow)
//! - **Shared-memory IPC**: attach SysV segments and read Arrow streams without copying
//! - **GPU IPC**: CUDA IPC handle import (`gpu` feature)
//! - **Typed rows**: load and fetch structs with `#[derive(Row)]`
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use mapd_core::connection::{Connection, ConnectionInfo, IpcOptions};
//!
//! # fn main() -> mapd_core::MapdResult<()> {
//! let info = ConnectionInfo::from_env()?;
//! let mut con = Connection::connect(ThriftClient::new(&info)?, &info)?;
//!
//! // results over shared memory
//! let frame = con.select_ipc("SELECT * FROM flights", None, IpcOptions::default())?;
//! println!("{} rows", frame.num_rows());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: type catalog (slot, null sentinel, display name)
//! - [`marshal`]: encoding/decoding, type inference, Arrow conversion
//! - [`stream`]: Arrow IPC stream messages
//! - [`ipc`]: shared-memory / GPU result transfer
//! - [`rpc`]: server contract ([`rpc::MapdClient`])
//! - [`connection`]: [`Connection`], [`Cursor`], loads, dashboards
//! - [`api`]: type mapping traits

pub mod api;
pub mod connection;
pub mod error;
pub mod ipc;
pub mod marshal;
pub mod rpc;
pub mod stream;
pub mod types;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use connection::{Connection, ConnectionInfo, Cursor, IpcFrame, IpcOptions, LoadMethod};
pub use error::{MapdError, MapdResult, ServerErrorKind};
pub use marshal::{Batch, Table, Value};

// Re-export derive macros
pub use mapd_derive::Row;
