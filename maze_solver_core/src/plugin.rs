//! The pathfinding plugin contract.
//!
//! A plugin receives the maze graph and nothing else, and must return a
//! route from node 0 (start) to node 1 (end). What it returns is untrusted
//! JSON; [`crate::validate`] decides whether it is a usable path.
//!
//! External plugins are executables driven over stdin/stdout. Each call
//! starts a fresh process, writes one newline-terminated JSON request and
//! reads one JSON document back:
//!
//! ```text
//! -> {"call":"describe"}
//! <- {"entry_points":["find_shortest_path"]}
//!
//! -> {"call":"find_shortest_path","graph":{"0":[2],"1":[2],"2":[1,0]}}
//! <- [0,2,1]
//! ```
//!
//! JSON object keys are strings, so graph keys arrive as `"0"`, `"1"`, ...
//! A reply of the form `{"error":"..."}` reports a failure inside the plugin.
//!
//! Plain Python modules defining `find_shortest_path(graph)` need not speak
//! the protocol: with [`PluginConfig::python_module`] set they are hosted by
//! a bundled runner that imports the file, restores integer keys and calls
//! the function.
//!
//! Each run lives in its own process group. The whole group is killed when
//! the run ends or times out, and output is only awaited until the deadline.

use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Sender},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{END_NODE, START_NODE, graph::Graph};

/// Name of the single function every plugin must provide.
pub const ENTRY_POINT: &str = "find_shortest_path";

/// Default wall-clock limit for one plugin process run.
pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Interpreter used for [`PluginConfig::python_module`] when none is configured.
pub const DEFAULT_PYTHON: &str = "python3";

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Time allowed for pipes to close once the process group is gone.
const PIPE_GRACE: Duration = Duration::from_millis(100);

const PYTHON_RUNNER: &str = include_str!("runner.py");

/// Trait implemented by anything that can route through a maze graph.
pub trait PathFinder {
    /// Human readable name shown in status messages.
    fn name(&self) -> &str;

    /// Returns a route from node 0 to node 1 as raw JSON.
    ///
    /// `&mut self` lets implementations keep state between solves.
    fn find_shortest_path(&mut self, graph: &Graph) -> Result<Value, PluginRuntimeError>;
}

/// Failures while loading a plugin. The previously loaded plugin stays active.
#[derive(Debug, thiserror::Error)]
pub enum PluginLoadError {
    #[error("plugin file {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("failed to start plugin {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("plugin handshake failed: {0}")]
    Handshake(#[source] PluginRuntimeError),
    #[error("plugin describe reply is malformed: {0}")]
    BadDescribe(#[source] serde_json::Error),
    #[error("plugin does not provide `find_shortest_path` (found {found:?})")]
    MissingEntryPoint { found: Vec<String> },
}

/// Failures raised while a plugin computes a path.
#[derive(Debug, thiserror::Error)]
pub enum PluginRuntimeError {
    #[error("failed to start plugin: {0}")]
    Spawn(#[source] io::Error),
    #[error("plugin i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("plugin did not finish within {limit:?}")]
    Timeout { limit: Duration },
    #[error("plugin exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("plugin output is not valid JSON: {0}")]
    MalformedOutput(#[from] serde_json::Error),
    #[error("plugin raised {0}")]
    Raised(String),
}

/// How external plugin processes are started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Program used to run the plugin file, e.g. `python3`. When `None` the
    /// plugin file is executed directly.
    pub interpreter: Option<String>,
    /// Extra arguments placed between the interpreter and the plugin path.
    pub interpreter_args: Vec<String>,
    /// The file is a Python module exposing `find_shortest_path(graph)`
    /// rather than a protocol speaker. `interpreter` then names the Python
    /// executable, defaulting to [`DEFAULT_PYTHON`].
    pub python_module: bool,
    /// Limit for each process run; the child is killed when it expires.
    pub timeout: Duration,
}

impl Default for PluginConfig {
    fn default() -> Self {
        PluginConfig {
            interpreter: None,
            interpreter_args: Vec::new(),
            python_module: false,
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
enum Request<'a> {
    Describe,
    FindShortestPath { graph: &'a Graph },
}

#[derive(Deserialize)]
struct DescribeReply {
    entry_points: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorReply {
    error: String,
}

enum Pipe {
    Stdin,
    Stdout,
    Stderr,
}

/// A plugin living in its own process.
#[derive(Debug)]
pub struct ProcessPlugin {
    name: String,
    path: PathBuf,
    config: PluginConfig,
}

impl ProcessPlugin {
    /// Resolves the plugin at `path` and checks that it exposes the entry point.
    pub fn load(path: impl Into<PathBuf>, config: PluginConfig) -> Result<Self, PluginLoadError> {
        let path = path.into();
        if !path.is_file() {
            return Err(PluginLoadError::NotFound(path));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let plugin = ProcessPlugin { name, path, config };

        let reply = match plugin.exchange(&Request::Describe) {
            Ok(reply) => reply,
            Err(PluginRuntimeError::Spawn(source)) => {
                return Err(PluginLoadError::Spawn {
                    path: plugin.path,
                    source,
                });
            }
            Err(err) => return Err(PluginLoadError::Handshake(err)),
        };
        let describe: DescribeReply =
            serde_json::from_value(reply).map_err(PluginLoadError::BadDescribe)?;
        if !describe.entry_points.iter().any(|e| e == ENTRY_POINT) {
            return Err(PluginLoadError::MissingEntryPoint {
                found: describe.entry_points,
            });
        }

        info!("loaded plugin {}", plugin.path.display());
        Ok(plugin)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self) -> Command {
        let mut cmd = if self.config.python_module {
            let python = self.config.interpreter.as_deref().unwrap_or(DEFAULT_PYTHON);
            let mut cmd = Command::new(python);
            cmd.args(&self.config.interpreter_args)
                .arg("-c")
                .arg(PYTHON_RUNNER)
                .arg(&self.path);
            cmd
        } else {
            match &self.config.interpreter {
                Some(interpreter) => {
                    let mut cmd = Command::new(interpreter);
                    cmd.args(&self.config.interpreter_args).arg(&self.path);
                    cmd
                }
                None => Command::new(&self.path),
            }
        };
        own_process_group(&mut cmd);
        cmd
    }

    /// Runs the plugin once: sends `request`, waits for exit, parses stdout.
    ///
    /// The whole exchange, including collecting output, is bounded by the
    /// configured timeout.
    fn exchange(&self, request: &Request<'_>) -> Result<Value, PluginRuntimeError> {
        let limit = self.config.timeout;
        let deadline = Instant::now() + limit;
        let mut payload = serde_json::to_vec(request).map_err(io::Error::from)?;
        payload.push(b'\n');

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(PluginRuntimeError::Spawn)?;
        debug!("started plugin process {}", child.id());

        // All three pipes are serviced off-thread so a chatty or
        // non-reading child cannot stall the deadline checks below.
        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(mut stdin) = child.stdin.take() {
            let tx = tx.clone();
            thread::spawn(move || {
                let result = match stdin.write_all(&payload) {
                    Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                };
                let _ = tx.send((Pipe::Stdin, result.map(|()| Vec::new())));
            });
            pending += 1;
        }
        if let Some(stdout) = child.stdout.take() {
            drain(stdout, Pipe::Stdout, tx.clone());
            pending += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            drain(stderr, Pipe::Stderr, tx.clone());
            pending += 1;
        }
        drop(tx);

        let status = wait_with_deadline(&mut child, deadline, limit)?;
        // Background processes left by the plugin would hold the pipes open.
        kill_process_group(&child);

        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        for _ in 0..pending {
            let wait = deadline
                .saturating_duration_since(Instant::now())
                .max(PIPE_GRACE);
            let Ok((pipe, bytes)) = rx.recv_timeout(wait) else {
                warn!("plugin output still open after {limit:?}");
                return Err(PluginRuntimeError::Timeout { limit });
            };
            match pipe {
                Pipe::Stdin => {
                    bytes?;
                }
                Pipe::Stdout => stdout = bytes?,
                Pipe::Stderr => stderr = bytes?,
            }
        }

        if !status.success() {
            return Err(PluginRuntimeError::Failed {
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        let reply: Value = serde_json::from_slice(&stdout)?;
        match ErrorReply::deserialize(&reply) {
            Ok(ErrorReply { error }) => Err(PluginRuntimeError::Raised(error)),
            Err(_) => Ok(reply),
        }
    }
}

impl PathFinder for ProcessPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_shortest_path(&mut self, graph: &Graph) -> Result<Value, PluginRuntimeError> {
        self.exchange(&Request::FindShortestPath { graph })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R, which: Pipe, tx: Sender<(Pipe, io::Result<Vec<u8>>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = pipe.read_to_end(&mut buf).map(|_| buf);
        // The receiver is gone once the exchange has given up.
        let _ = tx.send((which, result));
    });
}

fn wait_with_deadline(
    child: &mut Child,
    deadline: Instant,
    limit: Duration,
) -> Result<ExitStatus, PluginRuntimeError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            warn!("plugin process {} timed out after {limit:?}", child.id());
            kill_process_group(child);
            let _ = child.kill();
            let _ = child.wait();
            return Err(PluginRuntimeError::Timeout { limit });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kills every process in the child's group. The group id is the child's
/// pid because of [`own_process_group`].
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; a stale group id yields ESRCH.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Built-in breadth-first solver, used as a reference plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct BreadthFirst;

impl PathFinder for BreadthFirst {
    fn name(&self) -> &str {
        "built-in breadth-first search"
    }

    fn find_shortest_path(&mut self, graph: &Graph) -> Result<Value, PluginRuntimeError> {
        let path = graph.shortest_path(START_NODE, END_NODE).unwrap_or_default();
        Ok(Value::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::build_graph, maze::parse_maze};
    use std::ffi::OsStr;

    #[test]
    fn requests_follow_the_wire_format() {
        let (graph, _) = build_graph(&parse_maze("11\n01\n").unwrap());
        let describe = serde_json::to_value(Request::Describe).unwrap();
        assert_eq!(describe, serde_json::json!({"call": "describe"}));
        let solve = serde_json::to_value(Request::FindShortestPath { graph: &graph }).unwrap();
        assert_eq!(
            solve,
            serde_json::json!({
                "call": "find_shortest_path",
                "graph": {"0": [2], "1": [2], "2": [1, 0]}
            })
        );
    }

    #[test]
    fn breadth_first_finds_route() {
        let (graph, _) = build_graph(&parse_maze("111\n111\n111\n").unwrap());
        let path = BreadthFirst.find_shortest_path(&graph).unwrap();
        let nodes: Vec<usize> = serde_json::from_value(path).unwrap();
        assert_eq!(nodes.len(), 5);
        assert_eq!((nodes[0], nodes[4]), (START_NODE, END_NODE));
    }

    #[test]
    fn breadth_first_returns_empty_when_unreachable() {
        let (graph, _) = build_graph(&parse_maze("10\n01\n").unwrap());
        let path = BreadthFirst.find_shortest_path(&graph).unwrap();
        assert_eq!(path, serde_json::json!([]));
    }

    #[test]
    fn python_modules_run_through_the_bundled_runner() {
        let config = PluginConfig {
            python_module: true,
            interpreter_args: vec!["-u".to_string()],
            ..PluginConfig::default()
        };
        let plugin = ProcessPlugin {
            name: "solver.py".to_string(),
            path: PathBuf::from("solver.py"),
            config,
        };
        let cmd = plugin.command();
        assert_eq!(cmd.get_program(), OsStr::new(DEFAULT_PYTHON));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        let expected: Vec<&OsStr> = ["-u", "-c", PYTHON_RUNNER, "solver.py"]
            .into_iter()
            .map(OsStr::new)
            .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn error_reply_only_matches_a_lone_error_field() {
        assert!(ErrorReply::deserialize(&serde_json::json!({"error": "boom"})).is_ok());
        assert!(ErrorReply::deserialize(&serde_json::json!({"error": "x", "path": []})).is_err());
        assert!(ErrorReply::deserialize(&serde_json::json!([0, 1])).is_err());
    }

    #[test]
    fn missing_plugin_file_is_not_found() {
        let err = ProcessPlugin::load("/nonexistent/solver.py", PluginConfig::default()).unwrap_err();
        assert!(matches!(err, PluginLoadError::NotFound(_)));
    }
}
