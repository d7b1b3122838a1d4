//! RPC contract between the client and the server.
//!
//! This crate does not ship a transport. Hosts implement [`MapdClient`] over
//! their Thrift binding and hand it to
//! [`Connection::connect`](crate::connection::Connection::connect).

pub mod client;
pub mod types;

pub use client::MapdClient;
pub use types::{
    CreateParams, Dashboard, DataFrame, DeviceType, FileType, QueryResult, RowSet, SessionId,
    TableDetails,
};

use crate::error::{MapdError, ServerErrorKind};
use thiserror::Error;

/// Failure of a single RPC call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// `TMapDException` raised by the server
    #[error("{0}")]
    Server(String),

    /// Framework-level application error (unknown method, bad reply)
    #[error("application error: {0}")]
    Application(String),

    /// Socket or HTTP failure
    #[error("transport error: {0}")]
    Transport(String),
}

pub type RpcResult<T> = Result<T, RpcError>;

impl From<RpcError> for MapdError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Server(message) => MapdError::server(message),
            RpcError::Application(message) => MapdError::Server {
                kind: ServerErrorKind::Internal,
                message,
            },
            RpcError::Transport(message) => MapdError::Operational(message),
        }
    }
}
