//! The audio server as seen by the core.
//!
//! Every call blocks until the server answers. Backends hold whatever
//! session state they need and use interior mutability, so the whole
//! contract takes `&self`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::port::{Port, PortDirection};

/// Errors reported by a server backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("connection already exists")]
    AlreadyConnected,

    #[error("port not found: {0}")]
    PortNotFound(String),

    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("server unavailable: {0}")]
    Unavailable(String),

    #[error("not supported by this server: {0}")]
    Unsupported(String),
}

/// Selects ports in [`PortServer::list_ports`].
///
/// Patterns are unanchored regular expressions matched against the full
/// port name and the type label.
#[derive(Debug, Clone, Default)]
pub struct PortFilter {
    pub name_pattern: Option<Regex>,
    pub type_pattern: Option<Regex>,
    pub direction: Option<PortDirection>,
}

impl PortFilter {
    /// Matches every port.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches output (capture) ports only.
    #[must_use]
    pub fn outputs() -> Self {
        Self { direction: Some(PortDirection::Output), ..Self::default() }
    }

    /// Check whether a port passes the filter.
    #[must_use]
    pub fn matches(&self, port: &Port) -> bool {
        self.direction.is_none_or(|d| d == port.direction)
            && self.name_pattern.as_ref().is_none_or(|re| re.is_match(&port.name))
            && self.type_pattern.as_ref().is_none_or(|re| re.is_match(&port.port_type))
    }
}

/// Server information shown by the stats command.
///
/// Fields a backend cannot report stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    pub name: Option<String>,
    pub version: Option<String>,
    pub realtime: Option<bool>,
    pub sample_rate: Option<u32>,
    pub buffer_size: Option<u32>,
    pub cpu_load: Option<f32>,
    pub max_delay_usecs: Option<f32>,
}

/// Session with a running audio server.
#[cfg_attr(test, mockall::automock)]
pub trait PortServer {
    /// Names of the ports passing `filter`, in server order.
    ///
    /// # Errors
    /// Returns an error if the server cannot be queried.
    fn list_ports(&self, filter: &PortFilter) -> Result<Vec<String>, ServerError>;

    /// Look up a port by its full name.
    fn port(&self, name: &str) -> Option<Port>;

    /// Names of the ports currently connected to `name`.
    ///
    /// # Errors
    /// Returns [`ServerError::PortNotFound`] if the port is gone.
    fn connections(&self, name: &str) -> Result<Vec<String>, ServerError>;

    /// Connect an output port to an input port.
    ///
    /// # Errors
    /// Returns [`ServerError::AlreadyConnected`] if the pair is linked already,
    /// or another error if the server refused.
    fn connect(&self, output: &str, input: &str) -> Result<(), ServerError>;

    /// Disconnect an output port from an input port.
    ///
    /// # Errors
    /// Returns an error if the server refused.
    fn disconnect(&self, output: &str, input: &str) -> Result<(), ServerError>;

    /// Current server information.
    ///
    /// # Errors
    /// Returns an error if the server cannot be queried.
    fn stats(&self) -> Result<ServerStats, ServerError>;

    /// Reset the maximum delay counter.
    ///
    /// # Errors
    /// Returns [`ServerError::Unsupported`] on servers without such a counter.
    fn reset_max_delay(&self) -> Result<(), ServerError>;
}
