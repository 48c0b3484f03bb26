//! Interactive command loop.

use std::io::{self, BufRead, Write};

use tracing::debug;

use portwire_core::{Command, Error, PortServer, Session, Tokens};

use crate::render::Renderer;

/// Whether the loop should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Reads commands and runs them against a session, one at a time.
pub struct Dispatcher<S, W> {
    session: Session<S>,
    renderer: Renderer,
    out: W,
}

impl<S: PortServer, W: Write> Dispatcher<S, W> {
    #[must_use]
    pub fn new(session: Session<S>, renderer: Renderer, out: W) -> Self {
        Self { session, renderer, out }
    }

    /// Consume the dispatcher, returning its output.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Show the connections, then execute commands until `Q` or end of input.
    ///
    /// # Errors
    /// Returns an error if writing the output fails.
    pub fn run<R: BufRead>(&mut self, input: R) -> io::Result<()> {
        self.show_connections()?;
        writeln!(self.out, "(enter 'h' for help)")?;

        let mut tokens = Tokens::new(input);
        loop {
            if tokens.at_line_start() {
                write!(self.out, "> ")?;
                self.out.flush()?;
            }
            let Some(parsed) = Command::next_from(&mut tokens) else {
                break;
            };
            let flow = match parsed {
                Ok(command) => self.execute(command)?,
                Err(e) => {
                    writeln!(self.out, "{e}")?;
                    Flow::Continue
                }
            };
            if flow == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Execute a single command.
    ///
    /// # Errors
    /// Returns an error if writing the output fails.
    pub fn execute(&mut self, command: Command) -> io::Result<Flow> {
        debug!(?command, "Executing command");
        match command {
            Command::Quit => return Ok(Flow::Quit),
            Command::Help => self.renderer.help(&mut self.out)?,
            Command::Refresh => self.show_connections()?,
            Command::Details => match self.session.refresh() {
                Ok(topology) => self.renderer.details(&mut self.out, topology)?,
                Err(e) => writeln!(self.out, "{e}")?,
            },
            Command::Connect(a, b) => match self.session.connect(a, b) {
                Ok(_) => self.show_connections()?,
                Err(e) => self.report(&e)?,
            },
            Command::Disconnect(a, b) => match self.session.disconnect(a, b) {
                Ok(_) => self.show_connections()?,
                Err(e) => self.report(&e)?,
            },
            Command::DisconnectAll => {
                match self.session.disconnect_all() {
                    Ok(report) => {
                        for (link, e) in &report.failures {
                            writeln!(
                                self.out,
                                "Could not disconnect '{}' from '{}': {e}",
                                link.input, link.output
                            )?;
                        }
                    }
                    Err(e) => self.report(&e)?,
                }
                self.show_connections()?;
            }
            Command::Save(path) => match self.session.save(&path) {
                Ok(_) => {
                    writeln!(self.out, "Saved connection setup to '{}'.", path.display())?;
                }
                Err(e) => self.report(&e)?,
            },
            Command::Restore(path) => match self.session.restore(&path) {
                Ok(report) => {
                    for (link, e) in &report.failures {
                        writeln!(
                            self.out,
                            "Could not connect '{}' to '{}': {e}",
                            link.input, link.output
                        )?;
                    }
                    for peer in &report.orphans {
                        writeln!(
                            self.out,
                            "Could not connect '{peer}': no port listed before it."
                        )?;
                    }
                    self.show_connections()?;
                }
                Err(e) => self.report(&e)?,
            },
            Command::Stats => match self.session.stats() {
                Ok(stats) => self.renderer.stats(&mut self.out, &stats)?,
                Err(e) => self.report(&e)?,
            },
            Command::ResetMaxDelay => match self.session.reset_max_delay() {
                Ok(()) => writeln!(self.out, "Max delay counter reset.")?,
                Err(e) => self.report(&e)?,
            },
        }
        Ok(Flow::Continue)
    }

    /// Capture a fresh snapshot and show it.
    fn show_connections(&mut self) -> io::Result<()> {
        let topology = match self.session.refresh() {
            Ok(topology) => topology,
            Err(e) => return writeln!(self.out, "{e}"),
        };
        self.renderer.connections(&mut self.out, topology)?;
        if let Err(e) = topology.check_complete() {
            writeln!(self.out, "Warning! {e}")?;
        }
        Ok(())
    }

    fn report(&mut self, error: &Error) -> io::Result<()> {
        writeln!(self.out, "{error}")
    }
}
