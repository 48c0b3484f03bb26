//! PipeWire node and port records.

use portwire_core::PortDirection;

/// Information about a PipeWire node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// PipeWire object ID
    pub id: u32,
    /// Node name
    pub name: String,
    /// Node latency property (`<frames>/<rate>`)
    pub latency: Option<String>,
}

impl NodeInfo {
    /// Latency in frames parsed from the `node.latency` property.
    #[must_use]
    pub fn latency_frames(&self) -> Option<u32> {
        let latency = self.latency.as_deref()?;
        let frames = latency.split_once('/').map_or(latency, |(frames, _)| frames);
        frames.trim().parse().ok()
    }
}

/// Information about a PipeWire port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// PipeWire object ID
    pub id: u32,
    /// Port name within its node
    pub name: String,
    /// Port direction (in/out)
    pub direction: PortDirection,
    /// Parent node ID
    pub node_id: u32,
    /// `port.alias` property
    pub alias: Option<String>,
    /// `object.path` property
    pub object_path: Option<String>,
    /// `port.monitor` property
    pub monitor: bool,
    /// `port.physical` property
    pub physical: bool,
    /// `port.terminal` property
    pub terminal: bool,
    /// `format.dsp` property (e.g. "32 bit float mono audio")
    pub format: Option<String>,
}

/// Parse a PipeWire boolean property.
#[must_use]
pub fn parse_bool(value: Option<&str>) -> bool {
    matches!(value, Some("true" | "1"))
}

/// Parse a PipeWire `port.direction` property.
#[must_use]
pub fn parse_direction(value: Option<&str>) -> PortDirection {
    match value {
        Some("in") => PortDirection::Input,
        _ => PortDirection::Output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(latency: Option<&str>) -> NodeInfo {
        NodeInfo { id: 30, name: "alsa_output.pci".into(), latency: latency.map(String::from) }
    }

    #[test]
    fn test_latency_frames() {
        assert_eq!(node(Some("1024/48000")).latency_frames(), Some(1024));
        assert_eq!(node(Some("256")).latency_frames(), Some(256));
        assert_eq!(node(Some("fast")).latency_frames(), None);
        assert_eq!(node(None).latency_frames(), None);
    }

    #[test]
    fn test_property_parsing() {
        assert!(parse_bool(Some("true")));
        assert!(!parse_bool(Some("false")));
        assert!(!parse_bool(None));
        assert_eq!(parse_direction(Some("in")), PortDirection::Input);
        assert_eq!(parse_direction(Some("out")), PortDirection::Output);
    }
}
