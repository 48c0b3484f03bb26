//! PipeWire link records.

/// Information about a PipeWire link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    /// PipeWire object ID
    pub id: u32,
    /// Output port ID
    pub output_port: u32,
    /// Input port ID
    pub input_port: u32,
}

impl LinkInfo {
    /// The port on the other end of this link, if `port` is one of its ends.
    #[must_use]
    pub fn peer_of(&self, port: u32) -> Option<u32> {
        if self.output_port == port {
            Some(self.input_port)
        } else if self.input_port == port {
            Some(self.output_port)
        } else {
            None
        }
    }
}
