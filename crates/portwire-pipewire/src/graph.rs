//! Cached view of the PipeWire registry.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::debug;

use portwire_core::{LatencyRange, Port, PortFlags};

use crate::link::LinkInfo;
use crate::node::{NodeInfo, PortInfo};

/// Core information published by the PipeWire daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreSummary {
    pub name: String,
    pub version: String,
    pub sample_rate: Option<u32>,
    pub quantum: Option<u32>,
}

/// Registry cache shared between the PipeWire thread and the caller.
///
/// Written by the registry listener, read by the server facade. Maps are
/// keyed by registry id, which is also the port enumeration order.
#[derive(Debug, Default)]
pub struct GraphManager {
    /// Cached nodes by ID
    nodes: RwLock<BTreeMap<u32, NodeInfo>>,
    /// Cached ports by ID
    ports: RwLock<BTreeMap<u32, PortInfo>>,
    /// Cached links by ID
    links: RwLock<BTreeMap<u32, LinkInfo>>,
    /// Core info, once received
    core: RwLock<Option<CoreSummary>>,
}

impl GraphManager {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the cache.
    pub fn add_node(&self, node: NodeInfo) {
        debug!(id = node.id, name = %node.name, "Node added to graph");
        self.nodes.write().insert(node.id, node);
    }

    /// Add a port to the cache.
    pub fn add_port(&self, port: PortInfo) {
        debug!(id = port.id, name = %port.name, node_id = port.node_id, "Port added");
        self.ports.write().insert(port.id, port);
    }

    /// Add a link to the cache.
    pub fn add_link(&self, link: LinkInfo) {
        debug!(id = link.id, output = link.output_port, input = link.input_port, "Link added");
        self.links.write().insert(link.id, link);
    }

    /// Remove whatever object has this registry id.
    pub fn remove(&self, id: u32) {
        if self.links.write().remove(&id).is_some() {
            debug!(id, "Link removed");
        } else if self.ports.write().remove(&id).is_some() {
            debug!(id, "Port removed");
        } else if let Some(node) = self.nodes.write().remove(&id) {
            debug!(id, name = %node.name, "Node removed");
        }
    }

    /// Record the core info.
    pub fn set_core(&self, core: CoreSummary) {
        *self.core.write() = Some(core);
    }

    /// Core info, if received.
    #[must_use]
    pub fn core(&self) -> Option<CoreSummary> {
        self.core.read().clone()
    }

    /// Unique label of every node.
    ///
    /// `node.name` is not unique in PipeWire. The oldest node keeps the
    /// plain name, later nodes with the same name get `-<id>` appended.
    /// Registry ids are stable for a node's lifetime, so a label does not
    /// change while its node exists.
    fn node_labels(nodes: &BTreeMap<u32, NodeInfo>) -> HashMap<u32, String> {
        let mut owners: HashMap<&str, u32> = HashMap::new();
        nodes
            .values()
            .map(|node| {
                let owner = *owners.entry(node.name.as_str()).or_insert(node.id);
                let label = if owner == node.id {
                    node.name.clone()
                } else {
                    format!("{}-{}", node.name, node.id)
                };
                (node.id, label)
            })
            .collect()
    }

    /// Full `<node>:<port>` name of a port.
    fn full_name(labels: &HashMap<u32, String>, port: &PortInfo) -> String {
        match labels.get(&port.node_id) {
            Some(label) => format!("{label}:{}", port.name),
            None => format!("{}:{}", port.node_id, port.name),
        }
    }

    /// Convert a cached port into the core's port model.
    fn describe(
        nodes: &BTreeMap<u32, NodeInfo>,
        labels: &HashMap<u32, String>,
        port: &PortInfo,
    ) -> Port {
        let frames = nodes.get(&port.node_id).and_then(NodeInfo::latency_frames).unwrap_or(0);
        Port {
            name: Self::full_name(labels, port),
            direction: port.direction,
            aliases: port.alias.iter().chain(port.object_path.iter()).cloned().collect(),
            latency: LatencyRange { min: frames, max: frames },
            flags: PortFlags {
                can_monitor: port.monitor,
                is_physical: port.physical,
                is_terminal: port.terminal,
            },
            port_type: port.format.clone().unwrap_or_else(|| "unknown".to_string()),
        }
    }

    /// All ports in registry order.
    #[must_use]
    pub fn ports(&self) -> Vec<Port> {
        let nodes = self.nodes.read();
        let labels = Self::node_labels(&nodes);
        self.ports.read().values().map(|p| Self::describe(&nodes, &labels, p)).collect()
    }

    /// Registry id of the port with this full name.
    #[must_use]
    pub fn port_id(&self, name: &str) -> Option<u32> {
        let labels = Self::node_labels(&self.nodes.read());
        self.ports.read().values().find(|p| Self::full_name(&labels, p) == name).map(|p| p.id)
    }

    /// Port with this full name.
    #[must_use]
    pub fn port(&self, name: &str) -> Option<Port> {
        let nodes = self.nodes.read();
        let labels = Self::node_labels(&nodes);
        self.ports
            .read()
            .values()
            .map(|p| Self::describe(&nodes, &labels, p))
            .find(|p| p.name == name)
    }

    /// Full names of the ports linked to `port_id`, in link order.
    #[must_use]
    pub fn peers(&self, port_id: u32) -> Vec<String> {
        let labels = Self::node_labels(&self.nodes.read());
        let ports = self.ports.read();
        self.links
            .read()
            .values()
            .filter_map(|l| l.peer_of(port_id))
            .filter_map(|id| ports.get(&id))
            .map(|p| Self::full_name(&labels, p))
            .collect()
    }

    /// Link from `output_port` to `input_port`, if any.
    #[must_use]
    pub fn link_between(&self, output_port: u32, input_port: u32) -> Option<LinkInfo> {
        self.links
            .read()
            .values()
            .find(|l| l.output_port == output_port && l.input_port == input_port)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portwire_core::PortDirection;

    fn port(id: u32, node_id: u32, name: &str, direction: PortDirection) -> PortInfo {
        PortInfo {
            id,
            name: name.to_string(),
            direction,
            node_id,
            alias: None,
            object_path: None,
            monitor: false,
            physical: false,
            terminal: false,
            format: Some("32 bit float mono audio".to_string()),
        }
    }

    fn graph() -> GraphManager {
        let graph = GraphManager::new();
        graph.add_node(NodeInfo {
            id: 40,
            name: "system".into(),
            latency: Some("512/48000".into()),
        });
        graph.add_node(NodeInfo { id: 50, name: "synth".into(), latency: None });
        graph.add_port(port(52, 50, "out_l", PortDirection::Output));
        graph.add_port(port(41, 40, "playback_FL", PortDirection::Input));
        graph.add_port(port(42, 40, "playback_FR", PortDirection::Input));
        graph.add_link(LinkInfo { id: 60, output_port: 52, input_port: 41 });
        graph
    }

    #[test]
    fn test_ports_in_registry_order_with_full_names() {
        let names: Vec<_> = graph().ports().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["system:playback_FL", "system:playback_FR", "synth:out_l"]);
    }

    #[test]
    fn test_describe_maps_properties() {
        let graph = graph();
        let mut info = port(43, 40, "capture_1", PortDirection::Output);
        info.alias = Some("Built-in:capture_1".into());
        info.object_path = Some("alsa:pcm:0:capture_1".into());
        info.physical = true;
        info.terminal = true;
        info.format = None;
        graph.add_port(info);

        let port = graph.port("system:capture_1").expect("port should be cached");
        assert_eq!(port.aliases, ["Built-in:capture_1", "alsa:pcm:0:capture_1"]);
        assert_eq!(port.flags.abbreviation(), "Pt");
        assert_eq!(port.latency, LatencyRange { min: 512, max: 512 });
        assert_eq!(port.port_type, "unknown");
    }

    #[test]
    fn test_peers_and_links() {
        let graph = graph();
        assert_eq!(graph.peers(52), ["system:playback_FL"]);
        assert_eq!(graph.peers(41), ["synth:out_l"]);
        assert!(graph.peers(42).is_empty());
        assert_eq!(graph.link_between(52, 41).map(|l| l.id), Some(60));
        assert!(graph.link_between(41, 52).is_none());
    }

    #[test]
    fn test_nodes_sharing_a_name_get_distinct_port_names() {
        let graph = graph();
        graph.add_node(NodeInfo { id: 70, name: "Chromium".into(), latency: None });
        graph.add_node(NodeInfo { id: 80, name: "Chromium".into(), latency: None });
        graph.add_port(port(71, 70, "output_FL", PortDirection::Output));
        graph.add_port(port(81, 80, "output_FL", PortDirection::Output));
        graph.add_link(LinkInfo { id: 90, output_port: 81, input_port: 42 });

        let names: Vec<_> = graph.ports().into_iter().map(|p| p.name).collect();
        assert!(names.contains(&"Chromium:output_FL".to_string()));
        assert!(names.contains(&"Chromium-80:output_FL".to_string()));

        assert_eq!(graph.port_id("Chromium:output_FL"), Some(71));
        assert_eq!(graph.port_id("Chromium-80:output_FL"), Some(81));
        let second = graph.port("Chromium-80:output_FL").expect("second stream should be cached");
        assert_eq!(second.name, "Chromium-80:output_FL");
        assert_eq!(graph.peers(42), ["Chromium-80:output_FL"]);
        assert!(graph.peers(71).is_empty());
    }

    #[test]
    fn test_label_survives_unrelated_changes() {
        let graph = graph();
        graph.add_node(NodeInfo { id: 70, name: "Chromium".into(), latency: None });
        graph.add_node(NodeInfo { id: 80, name: "Chromium".into(), latency: None });
        graph.add_port(port(81, 80, "output_FL", PortDirection::Output));

        graph.remove(52);
        graph.add_node(NodeInfo { id: 95, name: "Chromium".into(), latency: None });

        assert_eq!(graph.port_id("Chromium-80:output_FL"), Some(81));
    }

    #[test]
    fn test_remove_by_id() {
        let graph = graph();
        graph.remove(60);
        assert!(graph.peers(52).is_empty());

        graph.remove(42);
        assert_eq!(graph.ports().len(), 2);
        assert_eq!(graph.port_id("system:playback_FR"), None);
        assert_eq!(graph.port_id("synth:out_l"), Some(52));
    }
}
