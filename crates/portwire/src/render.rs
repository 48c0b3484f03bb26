//! Text output for port listings, server info and help.

use std::io::{self, Write};

use colored::{ColoredString, Colorize};
use serde::Serialize;

use portwire_core::command::COMMAND_HELP;
use portwire_core::{Port, ServerStats, Topology};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Column headers of the detailed listing.
const DETAIL_HEADERS: [&str; 5] = ["Port ID & name ", "aliases ", "ltncy-rng ", "flgs ", "type"];

/// Writes listings, optionally colorized.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub color: bool,
    pub clear_screen: bool,
}

/// A port with its index and connections, for JSON output.
#[derive(Debug, Serialize)]
struct PortEntry<'a> {
    index: usize,
    #[serde(flatten)]
    port: &'a Port,
    connections: Vec<usize>,
}

impl Renderer {
    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.color { style(text).to_string() } else { text.to_string() }
    }

    fn port_label(&self, port: &Port, label: &str) -> String {
        if port.is_input() {
            self.paint(label, |s| s.green().on_black())
        } else {
            self.paint(label, |s| s.red().on_black())
        }
    }

    /// The connection listing.
    ///
    /// Input ports show their peers on the left, output ports on the right.
    pub fn connections<W: Write>(&self, out: &mut W, topology: &Topology) -> io::Result<()> {
        let rows: Vec<(String, String, String)> = topology
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let peers = join_indices(&topology.peers(index));
                let label = format!("[{index}] {}", port.name);
                match (port.is_input(), peers.is_empty()) {
                    (true, true) => (String::new(), label, String::new()),
                    (true, false) => (format!("{peers}--> "), label, String::new()),
                    (false, true) => (String::new(), label, String::new()),
                    (false, false) => (String::new(), label, format!(" -->{peers}")),
                }
            })
            .collect();

        let left_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0);
        let label_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0);

        if self.clear_screen {
            write!(out, "{CLEAR_SCREEN}")?;
        }
        for ((left, label, right), port) in rows.iter().zip(topology.ports()) {
            let padded = format!("{label:<label_width$}");
            let line = format!("{left:>left_width$}{}{right}", self.port_label(port, &padded));
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    /// The detailed port listing.
    pub fn details<W: Write>(&self, out: &mut W, topology: &Topology) -> io::Result<()> {
        let rows: Vec<[String; 5]> = topology
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                [
                    format!("[{index}] {} ", port.name),
                    if port.aliases.is_empty() {
                        "--".to_string()
                    } else {
                        port.aliases.join(", ")
                    },
                    port.latency.to_string(),
                    port.flags.abbreviation(),
                    port.port_type.clone(),
                ]
            })
            .collect();

        let mut widths: [usize; 4] = [0; 4];
        for (width, header) in widths.iter_mut().zip(DETAIL_HEADERS) {
            *width = header.len();
        }
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                if cell.len() > *width {
                    *width = cell.len() + 2;
                }
            }
        }

        for (&width, header) in widths.iter().zip(DETAIL_HEADERS) {
            write!(out, "{header:<width$}")?;
        }
        writeln!(out, "{}", DETAIL_HEADERS[4])?;

        for (row, port) in rows.iter().zip(topology.ports()) {
            let name = format!("{:<width$}", row[0], width = widths[0]);
            write!(out, "{}", self.port_label(port, &name))?;
            for (cell, &width) in row[1..4].iter().zip(&widths[1..]) {
                write!(out, "{cell:<width$}")?;
            }
            writeln!(out, "{}", row[4])?;
        }
        Ok(())
    }

    /// Server information.
    pub fn stats<W: Write>(&self, out: &mut W, stats: &ServerStats) -> io::Result<()> {
        fn or_na<T: ToString>(value: Option<T>) -> String {
            value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
        }

        writeln!(out, "{}", self.paint("**Server info**", |s| s.blue().on_black()))?;
        if let Some(name) = &stats.name {
            writeln!(out, "Server: {}", self.paint(name, |s| s.cyan().on_black()))?;
        }
        if let Some(version) = &stats.version {
            writeln!(out, "Version: {}", self.paint(version, |s| s.cyan().on_black()))?;
        }
        let realtime = match stats.realtime {
            Some(true) => self.paint("yes", |s| s.blue().on_black()),
            Some(false) => self.paint("no", |s| s.magenta().on_black()),
            None => "n/a".to_string(),
        };
        writeln!(out, "Running realtime: {realtime}")?;

        let rows = [
            ("Samplerate", or_na(stats.sample_rate.map(|r| format!("{r} Hz")))),
            ("Buffer size", or_na(stats.buffer_size.map(|b| format!("{b} b")))),
            ("CPU load", or_na(stats.cpu_load)),
            ("Max delay", or_na(stats.max_delay_usecs.map(|d| format!("{d} microseconds")))),
        ];
        for (label, value) in rows {
            writeln!(out, "{label}: {}", self.paint(&value, |s| s.cyan().on_black()))?;
        }
        Ok(())
    }

    /// The help text.
    pub fn help<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "portwire version {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(
            out,
            "Port colours: {}, {}",
            self.paint("playback", |s| s.green().on_black()),
            self.paint("capture", |s| s.red().on_black())
        )?;
        writeln!(out, "Commands:")?;
        for (key, description) in COMMAND_HELP {
            writeln!(out, "{}\t{description}", self.paint(key, |s| s.cyan().on_black()))?;
        }
        writeln!(
            out,
            "In the detailed view, the following abbreviations are used for port flags:"
        )?;
        for (flag, meaning) in [
            ("P", "corresponds to a physical I/O connector"),
            ("m", "can be monitored"),
            ("t", "is a terminal port"),
        ] {
            writeln!(out, "{}: {meaning}", self.paint(flag, |s| s.blue().on_black()))?;
        }
        Ok(())
    }
}

/// The ports of a snapshot with their indices and connections, as JSON.
pub fn json_listing(topology: &Topology) -> serde_json::Result<String> {
    let entries: Vec<_> = topology
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| PortEntry { index, port, connections: topology.peers(index) })
        .collect();
    serde_json::to_string_pretty(&entries)
}

fn join_indices(indices: &[usize]) -> String {
    indices.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use portwire_core::{LatencyRange, MemoryServer, PortDirection, PortFlags, PortServer};

    const PLAIN: Renderer = Renderer { color: false, clear_screen: false };

    fn topology() -> Topology {
        let mut capture =
            Port::new("system:capture_1", PortDirection::Output, "32 bit float mono audio");
        capture.aliases = vec!["alsa:capture_1".into()];
        capture.flags = PortFlags { is_physical: true, is_terminal: true, ..PortFlags::default() };
        capture.latency = LatencyRange { min: 256, max: 256 };

        let server = MemoryServer::with_ports([
            capture,
            Port::new("system:playback_1", PortDirection::Input, "32 bit float mono audio"),
            Port::new("app:in", PortDirection::Input, "32 bit float mono audio"),
        ]);
        server.connect("system:capture_1", "system:playback_1").unwrap();
        server.connect("system:capture_1", "app:in").unwrap();
        Topology::build(&server).unwrap()
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_connection_listing_layout() {
        let topology = topology();
        let text = render(|out| PLAIN.connections(out, &topology));

        assert_eq!(
            text,
            "     [0] system:capture_1  -->1,2\n\
             0--> [1] system:playback_1\n\
             0--> [2] app:in\n"
        );
    }

    #[test]
    fn test_clear_screen_prefix() {
        let topology = topology();
        let renderer = Renderer { color: false, clear_screen: true };
        let text = render(|out| renderer.connections(out, &topology));
        assert!(text.starts_with(CLEAR_SCREEN));
    }

    #[test]
    fn test_details_columns() {
        let topology = topology();
        let text = render(|out| PLAIN.details(out, &topology));
        let lines: Vec<_> = text.lines().collect();

        assert!(lines[0].starts_with("Port ID & name"));
        assert!(lines[0].ends_with("type"));
        assert!(lines[1].starts_with("[0] system:capture_1"));
        assert!(lines[1].contains("alsa:capture_1"));
        assert!(lines[1].contains("256-256"));
        assert!(lines[1].contains("Pt"));
        assert!(lines[2].contains("--"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_stats_marks_unknown_values() {
        let stats = ServerStats {
            sample_rate: Some(48000),
            realtime: Some(true),
            ..ServerStats::default()
        };
        let text = render(|out| PLAIN.stats(out, &stats));

        assert!(text.contains("Running realtime: yes"));
        assert!(text.contains("Samplerate: 48000 Hz"));
        assert!(text.contains("Buffer size: n/a"));
    }

    #[test]
    fn test_json_listing() {
        let json = json_listing(&topology()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["name"], "system:capture_1");
        assert_eq!(value[0]["direction"], "output");
        assert_eq!(value[0]["connections"], serde_json::json!([1, 2]));
        assert_eq!(value[2]["index"], 2);
    }
}
