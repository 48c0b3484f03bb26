//! Portwire Core - port snapshots, connection orchestration and setup files.
//!
//! This crate holds everything that does not depend on a particular audio
//! server: the port model, the server contract, the indexed port graph,
//! the connect/disconnect logic and the setup file format.

pub mod command;
pub mod error;
pub mod memory;
pub mod port;
pub mod server;
pub mod session;
pub mod setup;
pub mod topology;

pub use command::{Command, ParseError, Tokens};
pub use error::{Error, Result};
pub use memory::MemoryServer;
pub use port::{LatencyRange, Link, Port, PortDirection, PortFlags};
pub use server::{PortFilter, PortServer, ServerError, ServerStats};
pub use session::{DisconnectReport, Session};
pub use setup::{RestoreReport, SavedPort, SavedSetup};
pub use topology::Topology;
