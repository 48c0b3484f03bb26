//! Error types for Portwire core.

use std::path::PathBuf;

use thiserror::Error;

use crate::port::{Link, PortDirection};
use crate::server::ServerError;

/// Core error type for Portwire operations.
///
/// Every variant is recoverable at the level of a single command.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid port number: {0}")]
    InvalidIndex(usize),

    #[error(
        "One port has to be input, the other output ({first} and {second} are both {direction})"
    )]
    DirectionMismatch { first: String, second: String, direction: PortDirection },

    #[error("{operation} failed for {link}: {source}")]
    ServerOperationFailed {
        operation: &'static str,
        link: Link,
        #[source]
        source: ServerError,
    },

    #[error("Could not open file {path:?}: {source}")]
    FileOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Port graph is incomplete: {peer} appeared while the graph was being built")]
    PartialTopologyBuild { peer: String },

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Portwire core operations.
pub type Result<T> = std::result::Result<T, Error>;
