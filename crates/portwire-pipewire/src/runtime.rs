//! PipeWire thread and the synchronous server facade.
//!
//! PipeWire objects are not thread-safe, so the main loop runs on a
//! dedicated thread that keeps the [`GraphManager`] cache up to date.
//! Mutations are sent to that thread as requests; each one is followed by
//! a core sync round-trip so the cache already reflects the change when
//! the caller gets its reply.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use libspa::utils::dict::DictRef;
use parking_lot::Mutex;
use pipewire::context::ContextRc;
use pipewire::core::PW_ID_CORE;
use pipewire::main_loop::MainLoopRc;
use pipewire::properties::properties;
use pipewire::registry::GlobalObject;
use pipewire::types::ObjectType;
use tracing::{debug, error, info, warn};

use portwire_core::{Port, PortFilter, PortServer, ServerError, ServerStats};

use crate::error::{PwError, PwResult};
use crate::graph::{CoreSummary, GraphManager};
use crate::link::LinkInfo;
use crate::node::{NodeInfo, PortInfo, parse_bool, parse_direction};

/// Request handled on the PipeWire thread.
#[derive(Debug, Clone, Copy)]
enum Request {
    /// Link two ports by registry id
    CreateLink { output_port: u32, input_port: u32 },
    /// Destroy a link by registry id
    DestroyLink(u32),
    /// Stop the main loop
    Shutdown,
}

/// Reply from the PipeWire thread.
#[derive(Debug)]
enum Reply {
    /// Request handled and sync round-trip completed
    Done,
    /// Request could not be issued
    Failed(PwError),
}

/// Settings for attaching to a PipeWire daemon.
#[derive(Debug, Clone)]
pub struct PipeWireOptions {
    /// Remote name, `None` for the default daemon
    pub remote: Option<String>,
    /// How long to wait for the daemon to answer a request
    pub timeout: Duration,
}

impl Default for PipeWireOptions {
    fn default() -> Self {
        Self { remote: None, timeout: Duration::from_secs(5) }
    }
}

/// A session with a PipeWire daemon.
pub struct PipeWireServer {
    /// Channel to send requests to the loop
    request_tx: pipewire::channel::Sender<Request>,
    /// Channel to receive replies; one request is in flight at a time
    reply_rx: Mutex<std_mpsc::Receiver<Reply>>,
    /// Registry cache (written by the PipeWire thread)
    graph: Arc<GraphManager>,
    timeout: Duration,
    thread: Option<JoinHandle<()>>,
}

impl PipeWireServer {
    /// Spawn the PipeWire thread and wait until the initial registry
    /// contents have been received.
    ///
    /// # Errors
    /// Returns an error if the daemon cannot be reached.
    pub fn connect(options: &PipeWireOptions) -> PwResult<Self> {
        let graph = Arc::new(GraphManager::new());
        let (request_tx, request_rx) = pipewire::channel::channel();
        let (reply_tx, reply_rx) = std_mpsc::channel();

        let graph_clone = Arc::clone(&graph);
        let remote = options.remote.clone();

        let thread = std::thread::Builder::new()
            .name("portwire-pipewire".to_string())
            .spawn(move || {
                let failure_tx = reply_tx.clone();
                if let Err(e) = run_pipewire_thread(remote, graph_clone, request_rx, reply_tx) {
                    error!(error = %e, "PipeWire thread failed");
                    let _ = failure_tx.send(Reply::Failed(e));
                }
            })
            .map_err(|e| PwError::MainLoopError(format!("Failed to spawn PipeWire thread: {e}")))?;

        let server = Self {
            request_tx,
            reply_rx: Mutex::new(reply_rx),
            graph,
            timeout: options.timeout,
            thread: Some(thread),
        };

        // The first reply marks the end of the initial registry dump.
        server.wait(&server.reply_rx.lock())?;
        info!(ports = server.graph.ports().len(), "Connected to PipeWire");
        Ok(server)
    }

    fn wait(&self, reply_rx: &std_mpsc::Receiver<Reply>) -> PwResult<()> {
        match reply_rx.recv_timeout(self.timeout) {
            Ok(Reply::Done) => Ok(()),
            Ok(Reply::Failed(e)) => Err(e),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(PwError::Timeout),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                Err(PwError::MainLoopError("PipeWire thread exited".to_string()))
            }
        }
    }

    fn request(&self, request: Request) -> PwResult<()> {
        let reply_rx = self.reply_rx.lock();
        // Late replies to requests that timed out
        while reply_rx.try_recv().is_ok() {}

        self.request_tx
            .send(request)
            .map_err(|_| PwError::MainLoopError("Request channel closed".to_string()))?;
        self.wait(&reply_rx)
    }

    fn port_id(&self, name: &str) -> Result<u32, ServerError> {
        self.graph.port_id(name).ok_or_else(|| ServerError::PortNotFound(name.to_string()))
    }
}

impl PortServer for PipeWireServer {
    fn list_ports(&self, filter: &PortFilter) -> Result<Vec<String>, ServerError> {
        Ok(self
            .graph
            .ports()
            .into_iter()
            .filter(|p| filter.matches(p))
            .map(|p| p.name)
            .collect())
    }

    fn port(&self, name: &str) -> Option<Port> {
        self.graph.port(name)
    }

    fn connections(&self, name: &str) -> Result<Vec<String>, ServerError> {
        Ok(self.graph.peers(self.port_id(name)?))
    }

    fn connect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        let output_port = self.port_id(output)?;
        let input_port = self.port_id(input)?;
        if self.graph.link_between(output_port, input_port).is_some() {
            return Err(ServerError::AlreadyConnected);
        }

        self.request(Request::CreateLink { output_port, input_port })?;

        if self.graph.link_between(output_port, input_port).is_none() {
            return Err(ServerError::Rejected("link was not established".to_string()));
        }
        Ok(())
    }

    fn disconnect(&self, output: &str, input: &str) -> Result<(), ServerError> {
        let output_port = self.port_id(output)?;
        let input_port = self.port_id(input)?;
        let link = self
            .graph
            .link_between(output_port, input_port)
            .ok_or_else(|| ServerError::Rejected("not connected".to_string()))?;

        self.request(Request::DestroyLink(link.id))?;

        if self.graph.link_between(output_port, input_port).is_some() {
            return Err(ServerError::Rejected("link is still present".to_string()));
        }
        Ok(())
    }

    fn stats(&self) -> Result<ServerStats, ServerError> {
        let core = self.graph.core().unwrap_or_default();
        Ok(ServerStats {
            name: Some(core.name),
            version: Some(core.version),
            sample_rate: core.sample_rate,
            buffer_size: core.quantum,
            ..ServerStats::default()
        })
    }

    fn reset_max_delay(&self) -> Result<(), ServerError> {
        Err(ServerError::Unsupported("max delay counter".to_string()))
    }
}

impl Drop for PipeWireServer {
    fn drop(&mut self) {
        let _ = self.request_tx.send(Request::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("PipeWire thread panicked");
            }
        }
    }
}

/// Run the PipeWire main loop until shutdown.
fn run_pipewire_thread(
    remote: Option<String>,
    graph: Arc<GraphManager>,
    request_rx: pipewire::channel::Receiver<Request>,
    reply_tx: std_mpsc::Sender<Reply>,
) -> PwResult<()> {
    pipewire::init();

    let main_loop = MainLoopRc::new(None)
        .map_err(|e| PwError::MainLoopError(format!("Failed to create main loop: {e}")))?;

    let context = ContextRc::new(&main_loop, None)
        .map_err(|e| PwError::ConnectionFailed(format!("Failed to create context: {e}")))?;

    let connect_props = remote.as_deref().map(|name| properties! { "remote.name" => name });
    let core = context
        .connect_rc(connect_props)
        .map_err(|e| PwError::ConnectionFailed(format!("Failed to connect: {e}")))?;

    let registry = core
        .get_registry_rc()
        .map_err(|e| PwError::RegistryError(format!("Failed to get registry: {e}")))?;

    // Sequence number of the sync round-trip we are waiting for
    let pending: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));

    let graph_info = Arc::clone(&graph);
    let pending_done = Rc::clone(&pending);
    let reply_done = reply_tx.clone();
    let _core_listener = core
        .add_listener_local()
        .info(move |info| {
            let props = info.props();
            let clock = |key: &str| props.and_then(|p| p.get(key)).and_then(|v| v.parse().ok());
            graph_info.set_core(CoreSummary {
                name: info.name().to_string(),
                version: info.version().to_string(),
                sample_rate: clock("default.clock.rate"),
                quantum: clock("default.clock.quantum"),
            });
        })
        .done(move |id, seq| {
            if id == PW_ID_CORE && pending_done.get() == Some(seq.seq()) {
                pending_done.set(None);
                let _ = reply_done.send(Reply::Done);
            }
        })
        .error(|id, seq, res, message| {
            warn!(id, seq, res, message, "PipeWire error");
        })
        .register();

    let graph_global = Arc::clone(&graph);
    let graph_remove = Arc::clone(&graph);
    let _registry_listener = registry
        .add_listener_local()
        .global(move |global| handle_global(&graph_global, global))
        .global_remove(move |id| graph_remove.remove(id))
        .register();

    // Link proxies must stay alive until the daemon has taken ownership
    let link_proxies: Rc<RefCell<Vec<pipewire::link::Link>>> = Rc::new(RefCell::new(Vec::new()));

    let sync = {
        let core = core.clone();
        let pending = Rc::clone(&pending);
        move || -> PwResult<()> {
            let seq = core
                .sync(0)
                .map_err(|e| PwError::MainLoopError(format!("Failed to sync: {e}")))?;
            pending.set(Some(seq.seq()));
            Ok(())
        }
    };

    // Initial round-trip: the reply marks the end of the registry dump
    sync()?;

    let main_loop_for_shutdown = main_loop.clone();
    let core_for_links = core.clone();
    let registry_for_links = registry.clone();
    let link_proxies_clone = Rc::clone(&link_proxies);
    let _request_receiver = request_rx.attach(main_loop.loop_(), move |request| {
        let issued = match request {
            Request::CreateLink { output_port, input_port } => {
                create_link(&core_for_links, output_port, input_port, &link_proxies_clone)
            }
            Request::DestroyLink(id) => {
                debug!(id, "Destroying link");
                removal_outcome(id, registry_for_links.destroy_global(id).into_result())
            }
            Request::Shutdown => {
                info!("PipeWire thread received shutdown request");
                main_loop_for_shutdown.quit();
                return;
            }
        };
        if let Err(e) = issued.and_then(|()| sync()) {
            let _ = reply_tx.send(Reply::Failed(e));
        }
    });

    main_loop.run();

    debug!("PipeWire main loop exited");
    Ok(())
}

fn create_link(
    core: &pipewire::core::CoreRc,
    output_port: u32,
    input_port: u32,
    proxies: &Rc<RefCell<Vec<pipewire::link::Link>>>,
) -> PwResult<()> {
    debug!(output_port, input_port, "Creating link");

    let link_props = properties! {
        "link.output.port" => output_port.to_string().as_str(),
        "link.input.port" => input_port.to_string().as_str(),
        "object.linger" => "true",
    };

    let proxy = core
        .create_object::<pipewire::link::Link>("link-factory", &link_props)
        .map_err(|e| PwError::LinkCreationFailed(format!("Failed to create link: {e}")))?;

    proxies.borrow_mut().push(proxy);
    Ok(())
}

/// Map the result of a `destroy_global` call.
fn removal_outcome<T, E: std::fmt::Display>(id: u32, result: Result<T, E>) -> PwResult<()> {
    result
        .map(|_| ())
        .map_err(|e| PwError::LinkRemovalFailed(format!("Failed to destroy link {id}: {e}")))
}

fn handle_global(graph: &GraphManager, global: &GlobalObject<&DictRef>) {
    let props = global.props.as_ref();
    let get = |key: &str| props.and_then(|p| p.get(key));
    let get_id = |key: &str| get(key).and_then(|s| s.parse::<u32>().ok());

    match global.type_ {
        ObjectType::Node => {
            graph.add_node(NodeInfo {
                id: global.id,
                name: get("node.name").unwrap_or("unknown").to_string(),
                latency: get("node.latency").map(String::from),
            });
        }

        ObjectType::Port => {
            graph.add_port(PortInfo {
                id: global.id,
                name: get("port.name").unwrap_or("unknown").to_string(),
                direction: parse_direction(get("port.direction")),
                node_id: get_id("node.id").unwrap_or(0),
                alias: get("port.alias").map(String::from),
                object_path: get("object.path").map(String::from),
                monitor: parse_bool(get("port.monitor")),
                physical: parse_bool(get("port.physical")),
                terminal: parse_bool(get("port.terminal")),
                format: get("format.dsp").map(String::from),
            });
        }

        ObjectType::Link => {
            if let (Some(output_port), Some(input_port)) =
                (get_id("link.output.port"), get_id("link.input.port"))
            {
                graph.add_link(LinkInfo { id: global.id, output_port, input_port });
            }
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_refused_removal_is_reported() {
        let result: Result<(), &str> = Err("Operation not permitted");
        let error = removal_outcome(60, result).expect_err("removal should fail");

        assert_matches!(&error, PwError::LinkRemovalFailed(reason) if reason.contains("link 60"));
        assert_matches!(ServerError::from(error), ServerError::Rejected(_));
    }

    #[test]
    fn test_accepted_removal() {
        assert!(removal_outcome(60, Ok::<i32, &str>(3)).is_ok());
    }
}
