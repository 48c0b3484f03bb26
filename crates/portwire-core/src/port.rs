//! Ports and links as reported by the audio server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Port direction.
///
/// A port is exactly one of these, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Input port (playback, receives audio)
    Input,
    /// Output port (capture, sends audio)
    Output,
}

impl PortDirection {
    /// The direction a peer must have to be linked with this one.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Auxiliary port flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFlags {
    /// Port can be monitored
    pub can_monitor: bool,
    /// Port corresponds to a physical I/O connector
    pub is_physical: bool,
    /// Data does not flow beyond this port
    pub is_terminal: bool,
}

impl PortFlags {
    /// Short flag string as shown in the detailed listing (`m`, `P`, `t`).
    #[must_use]
    pub fn abbreviation(&self) -> String {
        let mut out = String::new();
        if self.can_monitor {
            out.push('m');
        }
        if self.is_physical {
            out.push('P');
        }
        if self.is_terminal {
            out.push('t');
        }
        out
    }
}

/// Latency range in frames for the port's active direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRange {
    pub min: u32,
    pub max: u32,
}

impl fmt::Display for LatencyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Information about a server port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Full port name, unique on the server
    pub name: String,
    /// Port direction (in/out)
    pub direction: PortDirection,
    /// Alternate display names (at most two)
    pub aliases: Vec<String>,
    /// Latency range for the active direction
    pub latency: LatencyRange,
    /// Monitor/physical/terminal flags
    pub flags: PortFlags,
    /// Free-form type label (audio, MIDI, ...)
    pub port_type: String,
}

impl Port {
    /// Create a port with no aliases, flags or latency.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        direction: PortDirection,
        port_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            aliases: Vec::new(),
            latency: LatencyRange::default(),
            flags: PortFlags::default(),
            port_type: port_type.into(),
        }
    }

    #[must_use]
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

/// A connection between an output port and an input port, by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Output (source) port name
    pub output: String,
    /// Input (destination) port name
    pub input: String,
}

impl Link {
    #[must_use]
    pub fn new(output: impl Into<String>, input: impl Into<String>) -> Self {
        Self { output: output.into(), input: input.into() }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.output, self.input)
    }
}
