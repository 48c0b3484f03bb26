//! Port graph snapshots.
//!
//! A [`Topology`] is captured wholesale from the server: vertices are the
//! ports in enumeration order, edges are the live connections. Its
//! indices are only meaningful until the next capture.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::server::{PortFilter, PortServer};

/// Snapshot of the server's ports and connections.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Ports in enumeration order; position is the display index
    ports: Vec<Port>,
    /// Port name -> index
    by_name: HashMap<String, usize>,
    /// Neighbours of each vertex, ascending by index
    adjacency: Vec<BTreeSet<usize>>,
    /// Peer that cut edge insertion short, if any
    missing_peer: Option<String>,
}

/// Outcome of looking a vertex up during edge insertion.
enum Vertex {
    Found(usize),
    /// The server no longer knows the port; nothing to link.
    Gone,
    /// The port exists but was not enumerated in the first pass.
    Unindexed,
}

impl Topology {
    /// Capture the current ports and connections from the server.
    ///
    /// Ports are inserted first, in enumeration order, then each port's
    /// connections are queried and added as edges. If a connection names
    /// a port that appeared after enumeration, edge insertion stops there
    /// and the snapshot is kept as is; [`Topology::check_complete`]
    /// reports it.
    ///
    /// # Errors
    /// Returns an error if the port enumeration itself fails.
    pub fn build<S: PortServer + ?Sized>(server: &S) -> Result<Self> {
        let names = server.list_ports(&PortFilter::all())?;

        let mut topology = Self::default();
        for name in &names {
            // Ports that vanish between listing and lookup are skipped.
            if let Some(port) = server.port(name) {
                topology.insert_port(port);
            }
        }

        'ports: for name in &names {
            let Ok(peers) = server.connections(name) else {
                continue;
            };
            if peers.is_empty() {
                continue;
            }
            let source = match topology.vertex(server, name) {
                Vertex::Found(index) => index,
                Vertex::Gone => continue,
                Vertex::Unindexed => {
                    topology.mark_partial(name);
                    break;
                }
            };
            for peer in &peers {
                match topology.vertex(server, peer) {
                    Vertex::Found(target) => topology.insert_edge(source, target),
                    Vertex::Gone => {}
                    Vertex::Unindexed => {
                        topology.mark_partial(peer);
                        break 'ports;
                    }
                }
            }
        }

        debug!(ports = topology.len(), edges = topology.edge_count(), "Port graph built");
        Ok(topology)
    }

    /// Add a vertex. A second port with an already indexed name is dropped.
    fn insert_port(&mut self, port: Port) {
        if self.by_name.contains_key(&port.name) {
            warn!(port = %port.name, "Server listed the same port name twice, keeping the first");
            return;
        }
        self.by_name.insert(port.name.clone(), self.ports.len());
        self.ports.push(port);
        self.adjacency.push(BTreeSet::new());
    }

    fn insert_edge(&mut self, a: usize, b: usize) {
        self.adjacency[a].insert(b);
        self.adjacency[b].insert(a);
    }

    fn vertex<S: PortServer + ?Sized>(&self, server: &S, name: &str) -> Vertex {
        match self.by_name.get(name) {
            Some(&index) => Vertex::Found(index),
            None if server.port(name).is_some() => Vertex::Unindexed,
            None => Vertex::Gone,
        }
    }

    fn mark_partial(&mut self, peer: &str) {
        warn!(peer, "Port appeared while building the port graph, connection list is incomplete");
        self.missing_peer = Some(peer.to_string());
    }

    /// Report whether edge insertion ran to completion.
    ///
    /// # Errors
    /// Returns [`Error::PartialTopologyBuild`] if the server changed
    /// underneath the build. The snapshot is still usable.
    pub fn check_complete(&self) -> Result<()> {
        match &self.missing_peer {
            Some(peer) => Err(Error::PartialTopologyBuild { peer: peer.clone() }),
            None => Ok(()),
        }
    }

    /// Number of ports in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// All ports, in index order.
    #[must_use]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Index of the named port in this snapshot.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Port at `index`, or `None` if out of range.
    #[must_use]
    pub fn port_at(&self, index: usize) -> Option<&Port> {
        self.ports.get(index)
    }

    /// Indices of the ports connected to `index`, ascending.
    #[must_use]
    pub fn peers(&self, index: usize) -> Vec<usize> {
        self.adjacency.get(index).map(|set| set.iter().copied().collect()).unwrap_or_default()
    }

    /// Check whether two indices are connected.
    #[must_use]
    pub fn is_connected(&self, a: usize, b: usize) -> bool {
        self.adjacency.get(a).is_some_and(|set| set.contains(&b))
    }

    /// Every connection once, as `(lower, higher)` index pairs.
    #[must_use]
    pub fn edges(&self) -> BTreeSet<(usize, usize)> {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(a, set)| set.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
            .collect()
    }

    /// Every connection once, by port name, ordered.
    #[must_use]
    pub fn edge_names(&self) -> BTreeSet<(String, String)> {
        self.edges()
            .into_iter()
            .map(|(a, b)| {
                let (x, y) = (&self.ports[a].name, &self.ports[b].name);
                if x <= y { (x.clone(), y.clone()) } else { (y.clone(), x.clone()) }
            })
            .collect()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum::<usize>() / 2
    }
}
