//! In-process audio server.
//!
//! Holds ports and links in memory and enforces the same rules a real
//! server does. Used to exercise the core without a running server.

use parking_lot::RwLock;
use tracing::debug;

use crate::port::{Link, Port};
use crate::server::{PortFilter, PortServer, ServerError, ServerStats};

#[derive(Debug, Default)]
struct MemoryState {
    ports: Vec<Port>,
    links: Vec<Link>,
    stats: ServerStats,
}

/// Audio server kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryServer {
    state: RwLock<MemoryState>,
}

impl MemoryServer {
    /// Create an empty server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a server with the given ports, in enumeration order.
    #[must_use]
    pub fn with_ports(ports: impl IntoIterator<Item = Port>) -> Self {
        let server = Self::new();
        for port in ports {
            server.add_port(port);
        }
        server
    }

    /// Register a port at the end of the enumeration order.
    pub fn add_port(&self, port: Port) {
        debug!(name = %port.name, direction = %port.direction, "Port registered");
        self.state.write().ports.push(port);
    }

    /// Unregister a port and every link it takes part in.
    pub fn remove_port(&self, name: &str) {
        let mut state = self.state.write();
        state.ports.retain(|p| p.name != name);
        state.links.retain(|l| l.output != name && l.input != name);
    }

    /// Replace the reported server information.
    pub fn set_stats(&self, stats: ServerStats) {
        self.state.write().stats = stats;
    }

    /// All links, in creation order.
    #[must_use]
    pub fn links(&self) -> Vec<Link> {
        self.state.read().links.clone()
    }
}

impl PortServer for MemoryServer {
    fn list_ports(&self, filter: &PortFilter) -> Result<Vec<String>, ServerError> {
        Ok(self
            .state
            .read()
            .ports
            .iter()
            .filter(|p| filter.matches(p))
            .map(|p| p.name.clone())
            .collect())
    }

    fn port(&self, name: &str) -> Option<Port> {
        self.state.read().ports.iter().find(|p| p.name == name).cloned()
    }

    fn connections(&self, name: &str) -> Result<Vec<String>, ServerError> {
        let state = self.state.read();
        if !state.ports.iter().any(|p| p.name == name) {
            return Err(ServerError::PortNotFound(name.to_string()));
        }
        Ok(state
            .links
            .iter()
            .filter_map(|l| {
                if l.output == name {
                    Some(l.input.clone())
                } else if l.input == name {
                    Some(l.output.clone())
                } else {
                    None
                }
            })
            .collect())
    }

    fn connect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        let mut state = self.state.write();
        let find = |name: &str| {
            state
                .ports
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .ok_or_else(|| ServerError::PortNotFound(name.to_string()))
        };
        let source = find(output)?;
        let destination = find(input)?;

        if !source.is_output() || !destination.is_input() {
            return Err(ServerError::Rejected(format!(
                "cannot link {} port to {} port",
                source.direction, destination.direction
            )));
        }

        let link = Link::new(output, input);
        if state.links.contains(&link) {
            return Err(ServerError::AlreadyConnected);
        }
        debug!(%link, "Link created");
        state.links.push(link);
        Ok(())
    }

    fn disconnect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        let mut state = self.state.write();
        let before = state.links.len();
        state.links.retain(|l| !(l.output == output && l.input == input));
        if state.links.len() == before {
            return Err(ServerError::Rejected("not connected".to_string()));
        }
        debug!(output, input, "Link removed");
        Ok(())
    }

    fn stats(&self) -> Result<ServerStats, ServerError> {
        Ok(self.state.read().stats.clone())
    }

    fn reset_max_delay(&self) -> Result<(), ServerError> {
        self.state.write().stats.max_delay_usecs = Some(0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortDirection;
    use assert_matches::assert_matches;

    fn server() -> MemoryServer {
        MemoryServer::with_ports([
            Port::new("A", PortDirection::Output, "audio"),
            Port::new("B", PortDirection::Input, "audio"),
        ])
    }

    #[test]
    fn test_connect_twice_reports_already_connected() {
        let server = server();
        server.connect("A", "B").expect("first connect");
        assert_matches!(server.connect("A", "B"), Err(ServerError::AlreadyConnected));
        assert_eq!(server.links().len(), 1);
    }

    #[test]
    fn test_connect_requires_output_then_input() {
        let server = server();
        assert_matches!(server.connect("B", "A"), Err(ServerError::Rejected(_)));
        assert_matches!(
            server.connect("A", "Z"),
            Err(ServerError::PortNotFound(name)) if name == "Z"
        );
    }

    #[test]
    fn test_remove_port_drops_its_links() {
        let server = server();
        server.connect("A", "B").unwrap();
        server.remove_port("B");

        assert!(server.links().is_empty());
        assert_eq!(server.connections("A").unwrap(), Vec::<String>::new());
        assert_matches!(server.connections("B"), Err(ServerError::PortNotFound(_)));
    }

    #[test]
    fn test_disconnect_unlinked_pair_is_rejected() {
        let server = server();
        assert_matches!(server.disconnect("A", "B"), Err(ServerError::Rejected(_)));
    }

    #[test]
    fn test_reset_max_delay() {
        let server = server();
        server.set_stats(ServerStats { max_delay_usecs: Some(120.5), ..ServerStats::default() });
        server.reset_max_delay().unwrap();
        assert_eq!(server.stats().unwrap().max_delay_usecs, Some(0.0));
    }
}
