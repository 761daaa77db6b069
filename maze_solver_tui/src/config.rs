use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result, ensure};
use maze_solver_core::{
    animation::DEFAULT_TICK_INTERVAL,
    maze::{DEFAULT_MAZE_SIZE, MAX_MAZE_SIZE},
    plugin::{DEFAULT_PLUGIN_TIMEOUT, DEFAULT_PYTHON, PluginConfig},
    validate::ValidationOptions,
};
use serde::Deserialize;

/// Settings read from an optional TOML file. Every field has a default, so
/// an empty file is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Delay between animation steps, in milliseconds.
    pub tick_ms: u64,
    /// Wall-clock limit for each plugin process run, in milliseconds.
    pub plugin_timeout_ms: u64,
    /// Program used to run protocol plugin files, e.g. `node`. Setting it
    /// also makes `.py` files speak the protocol themselves.
    pub interpreter: Option<String>,
    pub interpreter_args: Vec<String>,
    /// Python used to host `.py` modules defining `find_shortest_path`.
    pub python: String,
    /// Reject paths longer than the shortest route.
    pub require_shortest: bool,
    /// Where log records go while the terminal UI owns the screen.
    pub log_file: PathBuf,
    pub maze_rows: usize,
    pub maze_cols: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            plugin_timeout_ms: DEFAULT_PLUGIN_TIMEOUT.as_millis() as u64,
            interpreter: None,
            interpreter_args: Vec::new(),
            python: DEFAULT_PYTHON.to_string(),
            require_shortest: false,
            log_file: PathBuf::from("maze_solver.log"),
            maze_rows: DEFAULT_MAZE_SIZE,
            maze_cols: DEFAULT_MAZE_SIZE,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [("maze_rows", self.maze_rows), ("maze_cols", self.maze_cols)] {
            ensure!(
                (2..=MAX_MAZE_SIZE).contains(&value),
                "{key} = {value} is outside 2..={MAX_MAZE_SIZE}"
            );
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Launch settings for the plugin at `path`. Without an explicit
    /// interpreter, `.py` files are treated as plain Python modules.
    pub fn plugin_config(&self, path: &Path) -> PluginConfig {
        let python_module =
            self.interpreter.is_none() && path.extension().is_some_and(|ext| ext == "py");
        let interpreter = if python_module {
            Some(self.python.clone())
        } else {
            self.interpreter.clone()
        };
        PluginConfig {
            interpreter,
            interpreter_args: self.interpreter_args.clone(),
            python_module,
            timeout: Duration::from_millis(self.plugin_timeout_ms),
        }
    }

    pub fn validation(&self) -> ValidationOptions {
        ValidationOptions {
            require_shortest: self.require_shortest,
        }
    }
}
