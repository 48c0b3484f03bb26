//! Portwire - interactive port connection manager.
//!
//! Lists the ports of the audio server with their connections and lets the
//! user connect, disconnect, save and restore them by index.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod dispatch;
mod render;

use portwire_core::{PortServer, Session};
use portwire_pipewire::{PipeWireOptions, PipeWireServer};

use crate::dispatch::Dispatcher;
use crate::render::Renderer;

#[derive(Parser)]
#[command(name = "portwire", version, about = "Interactive port connection manager")]
struct Cli {
    /// Remote server name (defaults to the configured one)
    #[arg(short, long)]
    remote: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the ports and their connections, then exit
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save the current connections to a file
    Save { file: PathBuf },
    /// Restore connections from a file
    Restore { file: PathBuf },
    /// Remove every connection
    DisconnectAll,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    let level = match cli.verbose {
        0 => config.log.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("portwire={level}").parse()?)
                .add_directive(format!("portwire_core={level}").parse()?)
                .add_directive(format!("portwire_pipewire={level}").parse()?),
        )
        .with_writer(io::stderr)
        .init();

    debug!(?config, "Configuration loaded");

    let options = PipeWireOptions {
        remote: cli.remote.or_else(|| config.server.remote.clone()),
        timeout: config.server.timeout(),
    };
    let server =
        PipeWireServer::connect(&options).context("Could not connect to the audio server")?;
    info!(remote = ?options.remote, "Connected to audio server");

    let renderer = Renderer {
        color: config.display.color && !cli.no_color,
        clear_screen: config.display.clear_screen,
    };
    let session = Session::new(server);

    match cli.command {
        None => {
            let stdin = io::stdin().lock();
            let mut dispatcher = Dispatcher::new(session, renderer, io::stdout().lock());
            dispatcher.run(stdin)?;
        }
        Some(command) => run_once(session, Renderer { clear_screen: false, ..renderer }, command)?,
    }

    Ok(())
}

/// Run one non-interactive command.
fn run_once<S: PortServer>(
    mut session: Session<S>,
    renderer: Renderer,
    command: Cmd,
) -> Result<()> {
    let mut out = io::stdout().lock();
    match command {
        Cmd::List { json } => {
            let topology = session.refresh()?;
            if let Err(e) = topology.check_complete() {
                warn!(error = %e, "Listing may be incomplete");
            }
            if json {
                writeln!(out, "{}", render::json_listing(topology)?)?;
            } else {
                renderer.connections(&mut out, topology)?;
            }
        }
        Cmd::Save { file } => {
            let setup = session.save(&file)?;
            writeln!(out, "Saved {} ports to '{}'.", setup.entries.len(), file.display())?;
        }
        Cmd::Restore { file } => {
            let report = session.restore(&file)?;
            for (link, e) in &report.failures {
                writeln!(out, "Could not connect '{}' to '{}': {e}", link.input, link.output)?;
            }
            for peer in &report.orphans {
                writeln!(out, "Could not connect '{peer}': no port listed before it.")?;
            }
            writeln!(
                out,
                "{} connections made, {} already present.",
                report.connected, report.already_present
            )?;
        }
        Cmd::DisconnectAll => {
            let report = session.disconnect_all()?;
            for (link, e) in &report.failures {
                writeln!(
                    out,
                    "Could not disconnect '{}' from '{}': {e}",
                    link.input, link.output
                )?;
            }
            writeln!(out, "{} connections removed.", report.severed)?;
        }
    }
    Ok(())
}
