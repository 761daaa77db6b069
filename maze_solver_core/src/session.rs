use std::{fmt::Display, path::Path, time::Instant};

use log::{info, warn};
use rand::Rng;

use crate::{
    animation::{AnimationScheduler, AnimationState, NoticeKind, Renderer},
    graph::{Graph, NodeMap, build_graph},
    maze::{self, GridMaze, MazeError},
    plugin::{PathFinder, PluginConfig, PluginLoadError, PluginRuntimeError, ProcessPlugin},
    validate::{PathValidationError, ValidatedPath, ValidationOptions, validate_path_with},
};

/// Failures of a solve request.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("no plugin loaded")]
    NoPlugin,
    #[error("plugin failed: {0}")]
    Runtime(#[from] PluginRuntimeError),
    #[error("invalid path: {0}")]
    Validation(#[from] PathValidationError),
}

/// Everything the application knows about the current maze and solver.
///
/// Each operation is a user action: on failure it sends exactly one
/// notification to the renderer, returns the error and leaves the session
/// as it was.
pub struct Session {
    maze: GridMaze,
    graph: Graph,
    node_map: NodeMap,
    plugin: Option<Box<dyn PathFinder>>,
    path: Option<ValidatedPath>,
    animation: AnimationScheduler,
    validation: ValidationOptions,
}

impl Session {
    /// Creates a session around `maze` and draws it.
    pub fn new(maze: GridMaze, renderer: &mut dyn Renderer) -> Self {
        let (graph, node_map) = build_graph(&maze);
        let session = Session {
            maze,
            graph,
            node_map,
            plugin: None,
            path: None,
            animation: AnimationScheduler::default(),
            validation: ValidationOptions::default(),
        };
        session.redraw(renderer);
        session
    }

    /// Creates a session around a freshly generated maze.
    pub fn generate<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        rng: &mut R,
        renderer: &mut dyn Renderer,
    ) -> Result<Self, MazeError> {
        let maze = report(maze::generate_maze(rows, cols, rng), renderer)?;
        Ok(Self::new(maze, renderer))
    }

    pub fn maze(&self) -> &GridMaze {
        &self.maze
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn node_map(&self) -> &NodeMap {
        &self.node_map
    }

    /// The last successfully validated path for the current maze.
    pub fn path(&self) -> Option<&ValidatedPath> {
        self.path.as_ref()
    }

    pub fn plugin_name(&self) -> Option<&str> {
        self.plugin.as_deref().map(|plugin| plugin.name())
    }

    pub fn animation(&self) -> &AnimationScheduler {
        &self.animation
    }

    pub fn animation_state(&self) -> AnimationState {
        self.animation.state()
    }

    pub fn animation_mut(&mut self) -> &mut AnimationScheduler {
        &mut self.animation
    }

    pub fn validation(&self) -> ValidationOptions {
        self.validation
    }

    pub fn set_validation(&mut self, options: ValidationOptions) {
        self.validation = options;
    }

    /// Re-sends the maze and the token at the start cell.
    pub fn redraw(&self, renderer: &mut dyn Renderer) {
        renderer.draw_grid(&self.maze);
        renderer.draw_token(self.maze.start());
    }

    /// Replaces the maze, rebuilding the graph and dropping the old path.
    pub fn set_maze(&mut self, maze: GridMaze, renderer: &mut dyn Renderer) {
        let (graph, node_map) = build_graph(&maze);
        info!(
            "maze set to {}x{} with {} open cells",
            maze.rows(),
            maze.cols(),
            node_map.len()
        );
        self.animation.cancel();
        self.maze = maze;
        self.graph = graph;
        self.node_map = node_map;
        self.path = None;
        self.redraw(renderer);
    }

    pub fn load_maze_file(
        &mut self,
        path: impl AsRef<Path>,
        renderer: &mut dyn Renderer,
    ) -> Result<(), MazeError> {
        let path = path.as_ref();
        let maze = report(maze::load_maze_file(path), renderer)?;
        self.set_maze(maze, renderer);
        let name = path.file_name().unwrap_or(path.as_os_str());
        renderer.notify(
            NoticeKind::Info,
            &format!("Loaded maze: {}", name.to_string_lossy()),
        );
        Ok(())
    }

    pub fn load_maze_text(&mut self, text: &str, renderer: &mut dyn Renderer) -> Result<(), MazeError> {
        let maze = report(maze::parse_maze(text), renderer)?;
        self.set_maze(maze, renderer);
        renderer.notify(NoticeKind::Info, "Maze loaded.");
        Ok(())
    }

    pub fn generate_maze<R: Rng + ?Sized>(
        &mut self,
        rows: usize,
        cols: usize,
        rng: &mut R,
        renderer: &mut dyn Renderer,
    ) -> Result<(), MazeError> {
        let maze = report(maze::generate_maze(rows, cols, rng), renderer)?;
        self.set_maze(maze, renderer);
        renderer.notify(NoticeKind::Info, "Random maze generated.");
        Ok(())
    }

    /// Installs an in-process path finder.
    pub fn set_plugin(&mut self, plugin: Box<dyn PathFinder>, renderer: &mut dyn Renderer) {
        info!("using path finder {}", plugin.name());
        renderer.notify(
            NoticeKind::Info,
            &format!("Solver ready: {}", plugin.name()),
        );
        self.plugin = Some(plugin);
    }

    /// Loads an external plugin. A failed load keeps the previous plugin.
    pub fn load_plugin(
        &mut self,
        path: impl AsRef<Path>,
        config: PluginConfig,
        renderer: &mut dyn Renderer,
    ) -> Result<(), PluginLoadError> {
        let plugin = report(ProcessPlugin::load(path.as_ref(), config), renderer)?;
        self.set_plugin(Box::new(plugin), renderer);
        Ok(())
    }

    /// Runs the plugin on the current graph, validates its answer and starts
    /// the animation. A running animation is only replaced once the new path
    /// has been validated.
    pub fn solve(&mut self, renderer: &mut dyn Renderer) -> Result<(), SolveError> {
        let Some(plugin) = self.plugin.as_mut() else {
            warn!("solve requested without a plugin");
            renderer.notify(NoticeKind::Warning, "Please load a plugin first.");
            return Err(SolveError::NoPlugin);
        };

        info!("solving with {}", plugin.name());
        let outcome = plugin
            .find_shortest_path(&self.graph)
            .map_err(SolveError::from)
            .and_then(|raw| {
                validate_path_with(&raw, &self.graph, self.validation).map_err(SolveError::from)
            });
        let path = report(outcome, renderer)?;

        info!("accepted path with {} moves", path.moves());
        self.animation.cancel();
        self.animation.start(&path);
        self.path = Some(path);
        Ok(())
    }

    pub fn cancel_animation(&mut self) {
        self.animation.cancel();
    }

    /// Advances the animation by one step.
    pub fn tick(&mut self, renderer: &mut dyn Renderer) -> AnimationState {
        self.animation.tick(&self.node_map, renderer)
    }

    /// Advances the animation if its interval has elapsed.
    pub fn poll(&mut self, now: Instant, renderer: &mut dyn Renderer) -> AnimationState {
        self.animation.poll(now, &self.node_map, renderer)
    }
}

/// Surfaces a failed result as a single error notification.
fn report<T, E: Display>(result: Result<T, E>, renderer: &mut dyn Renderer) -> Result<T, E> {
    result.inspect_err(|err| {
        warn!("{err}");
        renderer.notify(NoticeKind::Error, &err.to_string());
    })
}
