//! Connection orchestration against a live server.
//!
//! A [`Session`] owns the server handle and the current [`Topology`].
//! Index-based commands are resolved against that snapshot; anything
//! that may change the server's connections drops it so the next
//! lookup captures a fresh one.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::port::{Link, Port};
use crate::server::{PortFilter, PortServer, ServerError, ServerStats};
use crate::setup::{RestoreReport, SavedSetup};
use crate::topology::Topology;

/// Result of a best-effort disconnect of every connection.
#[derive(Debug, Default)]
pub struct DisconnectReport {
    /// Links that were severed
    pub severed: usize,
    /// Links the server refused to sever
    pub failures: Vec<(Link, ServerError)>,
}

/// A working session with one audio server.
pub struct Session<S> {
    server: S,
    topology: Option<Topology>,
}

impl<S: PortServer> Session<S> {
    /// Create a session; the first snapshot is captured lazily.
    #[must_use]
    pub fn new(server: S) -> Self {
        Self { server, topology: None }
    }

    /// The underlying server.
    #[must_use]
    pub fn server(&self) -> &S {
        &self.server
    }

    /// Current snapshot, capturing one if there is none.
    ///
    /// # Errors
    /// Returns an error if the ports cannot be enumerated.
    pub fn topology(&mut self) -> Result<&Topology> {
        let topology = match self.topology.take() {
            Some(topology) => topology,
            None => Topology::build(&self.server)?,
        };
        Ok(&*self.topology.insert(topology))
    }

    /// Discard the current snapshot and capture a new one.
    ///
    /// # Errors
    /// Returns an error if the ports cannot be enumerated.
    pub fn refresh(&mut self) -> Result<&Topology> {
        self.invalidate();
        self.topology()
    }

    /// Discard the current snapshot.
    pub fn invalidate(&mut self) {
        self.topology = None;
    }

    /// Connect the ports at indices `a` and `b`, in either order.
    ///
    /// Connecting an already connected pair succeeds.
    ///
    /// # Errors
    /// Returns [`Error::InvalidIndex`], [`Error::DirectionMismatch`] or
    /// [`Error::ServerOperationFailed`].
    pub fn connect(&mut self, a: usize, b: usize) -> Result<Link> {
        let link = self.resolve(a, b)?;
        match self.server.connect(&link.output, &link.input) {
            Ok(()) => info!(%link, "Connected"),
            Err(ServerError::AlreadyConnected) => debug!(%link, "Already connected"),
            Err(source) => {
                return Err(Error::ServerOperationFailed { operation: "Connect", link, source });
            }
        }
        self.invalidate();
        Ok(link)
    }

    /// Disconnect the ports at indices `a` and `b`, in either order.
    ///
    /// # Errors
    /// Returns [`Error::InvalidIndex`], [`Error::DirectionMismatch`] or
    /// [`Error::ServerOperationFailed`].
    pub fn disconnect(&mut self, a: usize, b: usize) -> Result<Link> {
        let link = self.resolve(a, b)?;
        if let Err(source) = self.server.disconnect(&link.output, &link.input) {
            return Err(Error::ServerOperationFailed { operation: "Disconnect", link, source });
        }
        info!(%link, "Disconnected");
        self.invalidate();
        Ok(link)
    }

    /// Sever every connection of every output port.
    ///
    /// A failure on one link is recorded and the rest are still processed.
    ///
    /// # Errors
    /// Returns an error only if the output ports cannot be enumerated.
    pub fn disconnect_all(&mut self) -> Result<DisconnectReport> {
        self.invalidate();
        let mut report = DisconnectReport::default();

        for output in self.server.list_ports(&PortFilter::outputs())? {
            let peers = match self.server.connections(&output) {
                Ok(peers) => peers,
                Err(e) => {
                    debug!(port = %output, error = %e, "Skipping port");
                    continue;
                }
            };
            for input in peers {
                let link = Link::new(output.clone(), input);
                match self.server.disconnect(&link.output, &link.input) {
                    Ok(()) => report.severed += 1,
                    Err(e) => {
                        warn!(%link, error = %e, "Failed to disconnect");
                        report.failures.push((link, e));
                    }
                }
            }
        }

        info!(severed = report.severed, failed = report.failures.len(), "Disconnected all");
        Ok(report)
    }

    /// Write the current connection setup to `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileOpenFailed`] if the file cannot be created, or
    /// an error if the server cannot be queried.
    pub fn save(&self, path: &Path) -> Result<SavedSetup> {
        let setup = SavedSetup::capture(&self.server)?;
        setup.save_to_path(path, chrono::Local::now())?;
        info!(?path, ports = setup.entries.len(), "Saved connection setup");
        Ok(setup)
    }

    /// Restore a connection setup from `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileOpenFailed`] if the file cannot be read.
    /// Individual refused connections are reported, not returned.
    pub fn restore(&mut self, path: &Path) -> Result<RestoreReport> {
        let setup = SavedSetup::load_from_path(path)?;
        self.invalidate();
        Ok(setup.restore(&self.server))
    }

    /// Current server information.
    ///
    /// # Errors
    /// Returns an error if the server cannot be queried.
    pub fn stats(&self) -> Result<ServerStats> {
        Ok(self.server.stats()?)
    }

    /// Reset the server's max delay counter.
    ///
    /// # Errors
    /// Returns an error if the server refuses or has no such counter.
    pub fn reset_max_delay(&self) -> Result<()> {
        Ok(self.server.reset_max_delay()?)
    }

    /// Resolve two indices of the current snapshot into an output-first link.
    fn resolve(&mut self, a: usize, b: usize) -> Result<Link> {
        let topology = self.topology()?;
        let first = topology.port_at(a).ok_or(Error::InvalidIndex(a))?;
        let second = topology.port_at(b).ok_or(Error::InvalidIndex(b))?;
        orient(first, second)
    }
}

/// Order two ports as (output, input).
fn orient(first: &Port, second: &Port) -> Result<Link> {
    if first.direction == second.direction {
        return Err(Error::DirectionMismatch {
            first: first.name.clone(),
            second: second.name.clone(),
            direction: first.direction,
        });
    }
    if first.is_output() {
        Ok(Link::new(first.name.clone(), second.name.clone()))
    } else {
        Ok(Link::new(second.name.clone(), first.name.clone()))
    }
}
