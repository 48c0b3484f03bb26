//! Portwire PipeWire - registry cache and link control.
//!
//! This crate implements the core's server contract on top of PipeWire:
//! - Connecting to the PipeWire daemon on a dedicated thread
//! - Caching nodes, ports and links from the registry
//! - Creating and destroying links between ports

pub mod error;
pub mod graph;
pub mod link;
pub mod node;
pub mod runtime;

pub use error::{PwError, PwResult};
pub use graph::GraphManager;
pub use runtime::{PipeWireOptions, PipeWireServer};
