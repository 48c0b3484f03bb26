//! Connection setup files.
//!
//! The format is line oriented:
//!
//! ```text
//! # portwire generated connection setup file, Fri Oct 17 09:12:44 2026
//! system:capture_1
//! 	app:in_left
//! 	app:in_right
//! ```
//!
//! A line without a leading tab names an output port, each following
//! tab-prefixed line names a port it is connected to. Lines starting
//! with `#` and blank lines are ignored. Ports are referenced by name
//! only, so a file can be restored in any later session.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, TimeZone};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::port::Link;
use crate::server::{PortFilter, PortServer, ServerError};

/// Header written before the port blocks.
const HEADER: &str = "portwire generated connection setup file";

/// `asctime(3)` layout.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// An output port and the ports connected to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPort {
    pub name: String,
    pub peers: Vec<String>,
}

/// A saved connection setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedSetup {
    pub entries: Vec<SavedPort>,
    /// Peer lines read before any port line; never written back
    pub orphans: Vec<String>,
}

/// Result of restoring a setup.
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Connections made
    pub connected: usize,
    /// Connections that already existed
    pub already_present: usize,
    /// Connections the server refused
    pub failures: Vec<(Link, ServerError)>,
    /// Peers listed without a port to connect them to
    pub orphans: Vec<String>,
}

impl SavedSetup {
    /// Record the connections of every connected output port.
    ///
    /// # Errors
    /// Returns an error if the output ports cannot be enumerated.
    pub fn capture<S: PortServer + ?Sized>(server: &S) -> Result<Self> {
        let mut entries = Vec::new();
        for name in server.list_ports(&PortFilter::outputs())? {
            match server.connections(&name) {
                Ok(peers) if !peers.is_empty() => entries.push(SavedPort { name, peers }),
                Ok(_) => {}
                Err(e) => debug!(port = %name, error = %e, "Port vanished while saving"),
            }
        }
        Ok(Self { entries, orphans: Vec::new() })
    }

    /// Write the setup in file format.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_to<W: Write, Tz: TimeZone>(
        &self,
        out: &mut W,
        generated: DateTime<Tz>,
    ) -> Result<()>
    where
        Tz::Offset: std::fmt::Display,
    {
        writeln!(out, "# {HEADER}, {}", generated.format(TIMESTAMP_FORMAT))?;
        for entry in &self.entries {
            writeln!(out, "{}", entry.name)?;
            for peer in &entry.peers {
                writeln!(out, "\t{peer}")?;
            }
        }
        Ok(())
    }

    /// Parse a setup in file format.
    ///
    /// Peer lines that appear before any port line are kept aside in
    /// `orphans` and never connected.
    ///
    /// # Errors
    /// Returns an error if reading fails.
    pub fn read_from<R: BufRead>(input: R) -> Result<Self> {
        let mut entries: Vec<SavedPort> = Vec::new();
        let mut orphans = Vec::new();
        for (number, line) in input.lines().enumerate() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix('\t') {
                None => entries.push(SavedPort { name: line, peers: Vec::new() }),
                Some(peer) => match entries.last_mut() {
                    Some(entry) => entry.peers.push(peer.to_string()),
                    None => {
                        warn!(
                            line = number + 1,
                            peer,
                            "Connected port listed before any port, skipping"
                        );
                        orphans.push(peer.to_string());
                    }
                },
            }
        }
        Ok(Self { entries, orphans })
    }

    /// Create or truncate `path` and write the setup to it.
    ///
    /// # Errors
    /// Returns [`Error::FileOpenFailed`] if the file cannot be created.
    pub fn save_to_path<Tz: TimeZone>(&self, path: &Path, generated: DateTime<Tz>) -> Result<()>
    where
        Tz::Offset: std::fmt::Display,
    {
        let file = File::create(path)
            .map_err(|source| Error::FileOpenFailed { path: path.to_path_buf(), source })?;
        let mut out = BufWriter::new(file);
        self.write_to(&mut out, generated)?;
        out.flush()?;
        Ok(())
    }

    /// Read a setup from `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileOpenFailed`] if the file cannot be opened.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|source| Error::FileOpenFailed { path: path.to_path_buf(), source })?;
        Self::read_from(BufReader::new(file))
    }

    /// Connect every saved pair by name.
    ///
    /// Pairs that are already connected count as restored; any other
    /// refusal is recorded and the remaining pairs are still attempted.
    pub fn restore<S: PortServer + ?Sized>(&self, server: &S) -> RestoreReport {
        let mut report =
            RestoreReport { orphans: self.orphans.clone(), ..RestoreReport::default() };
        for entry in &self.entries {
            for peer in &entry.peers {
                let link = Link::new(entry.name.clone(), peer.clone());
                match server.connect(&link.output, &link.input) {
                    Ok(()) => report.connected += 1,
                    Err(ServerError::AlreadyConnected) => report.already_present += 1,
                    Err(e) => {
                        warn!(%link, error = %e, "Could not restore connection");
                        report.failures.push((link, e));
                    }
                }
            }
        }
        info!(
            connected = report.connected,
            already_present = report.already_present,
            failed = report.failures.len(),
            orphans = report.orphans.len(),
            "Restored connection setup"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryServer;
    use crate::port::{Port, PortDirection};
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn generated() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, 7, 8, 9).unwrap()
    }

    fn server() -> MemoryServer {
        let server = MemoryServer::with_ports([
            Port::new("system:capture_1", PortDirection::Output, "audio"),
            Port::new("system:capture_2", PortDirection::Output, "audio"),
            Port::new("system:playback_1", PortDirection::Input, "audio"),
            Port::new("synth:out", PortDirection::Output, "audio"),
            Port::new("app:in", PortDirection::Input, "audio"),
        ]);
        server.connect("system:capture_1", "app:in").unwrap();
        server.connect("system:capture_1", "system:playback_1").unwrap();
        server.connect("synth:out", "system:playback_1").unwrap();
        server
    }

    #[test]
    fn test_write_format() {
        let setup = SavedSetup::capture(&server()).unwrap();
        let mut out = Vec::new();
        setup.write_to(&mut out, generated()).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "# portwire generated connection setup file, Thu Mar  5 07:08:09 2026\n\
             system:capture_1\n\
             \tapp:in\n\
             \tsystem:playback_1\n\
             synth:out\n\
             \tsystem:playback_1\n"
        );
    }

    #[test]
    fn test_capture_skips_unconnected_and_input_ports() {
        let setup = SavedSetup::capture(&server()).unwrap();
        let names: Vec<_> = setup.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["system:capture_1", "synth:out"]);
    }

    #[test]
    fn test_read_ignores_comments_and_blank_lines() {
        let text =
            "# header\n\nsystem:capture_1\n\tapp:in\n# note\n\n\tsystem:playback_1\nsynth:out\n";
        let setup = SavedSetup::read_from(text.as_bytes()).unwrap();

        assert_eq!(
            setup.entries,
            vec![
                SavedPort {
                    name: "system:capture_1".into(),
                    peers: vec!["app:in".into(), "system:playback_1".into()],
                },
                SavedPort { name: "synth:out".into(), peers: vec![] },
            ]
        );
    }

    #[test]
    fn test_read_keeps_names_literally() {
        // Only the single leading tab is structure.
        let text = "a port:with spaces \n\t\tpeer\twith tab\n";
        let setup = SavedSetup::read_from(text.as_bytes()).unwrap();

        assert_eq!(setup.entries[0].name, "a port:with spaces ");
        assert_eq!(setup.entries[0].peers, ["\tpeer\twith tab"]);
    }

    #[test]
    fn test_read_skips_orphan_peer_lines() {
        let setup = SavedSetup::read_from("\torphan\nA\n\tB\n".as_bytes()).unwrap();
        assert_eq!(setup.entries, vec![SavedPort { name: "A".into(), peers: vec!["B".into()] }]);
        assert_eq!(setup.orphans, ["orphan"]);
    }

    #[test]
    fn test_restore_reports_orphan_peers() {
        let target = MemoryServer::with_ports([
            Port::new("A", PortDirection::Output, "audio"),
            Port::new("B", PortDirection::Input, "audio"),
        ]);
        let setup = SavedSetup::read_from("\tB\nA\n\tB\n".as_bytes()).unwrap();

        let report = setup.restore(&target);

        assert_eq!(report.connected, 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.orphans, ["B"]);
    }

    #[test]
    fn test_restore_continues_after_failure() {
        let target = MemoryServer::with_ports([
            Port::new("A", PortDirection::Output, "audio"),
            Port::new("B", PortDirection::Input, "audio"),
            Port::new("C", PortDirection::Input, "audio"),
        ]);
        let setup = SavedSetup::read_from("A\n\tmissing\n\tB\n\tC\n".as_bytes()).unwrap();

        let report = setup.restore(&target);

        assert_eq!(report.connected, 2);
        assert_eq!(report.failures.len(), 1);
        assert_matches!(
            &report.failures[0],
            (link, ServerError::PortNotFound(_)) if link.input == "missing"
        );
        assert_eq!(target.links(), vec![Link::new("A", "B"), Link::new("A", "C")]);
    }

    #[test]
    fn test_file_round_trip_reproduces_links() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.conf");
        let source = server();

        SavedSetup::capture(&source).unwrap().save_to_path(&path, generated()).unwrap();

        let target = MemoryServer::with_ports([
            Port::new("app:in", PortDirection::Input, "audio"),
            Port::new("synth:out", PortDirection::Output, "audio"),
            Port::new("system:playback_1", PortDirection::Input, "audio"),
            Port::new("system:capture_1", PortDirection::Output, "audio"),
        ]);
        let loaded = SavedSetup::load_from_path(&path).unwrap();
        let first = loaded.restore(&target);
        let second = loaded.restore(&target);

        let mut expected = source.links();
        let mut actual = target.links();
        expected.sort_by(|a, b| (&a.output, &a.input).cmp(&(&b.output, &b.input)));
        actual.sort_by(|a, b| (&a.output, &a.input).cmp(&(&b.output, &b.input)));
        assert_eq!(actual, expected);
        assert!(first.failures.is_empty());
        assert!(second.failures.is_empty());
        assert_eq!(second.already_present, 3);
    }

    #[test]
    fn test_save_to_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/setup.conf");

        assert_matches!(
            SavedSetup::default().save_to_path(&path, generated()),
            Err(Error::FileOpenFailed { path: p, .. }) if p == path
        );
    }
}
