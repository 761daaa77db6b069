use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::{Cell, NodeId, graph::NodeMap, maze::GridMaze, validate::ValidatedPath};

/// Reference delay between two animation steps.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Notice shown once the replay reaches the end cell.
pub const SOLVED_MESSAGE: &str = "Maze solved!";

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Drawing surface driven by the session and the animation.
pub trait Renderer {
    fn draw_grid(&mut self, maze: &GridMaze);
    fn draw_token(&mut self, cell: Cell);
    fn draw_trail(&mut self, cell: Cell);
    fn notify(&mut self, kind: NoticeKind, message: &str);
}

/// One call made on a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    DrawGrid { rows: usize, cols: usize },
    DrawToken(Cell),
    DrawTrail(Cell),
    Notify(NoticeKind, String),
}

/// Renderer that records every call, for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub events: Vec<RenderEvent>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far, in order.
    pub fn notices(&self) -> impl Iterator<Item = (NoticeKind, &str)> + '_ {
        self.events.iter().filter_map(|event| match event {
            RenderEvent::Notify(kind, message) => Some((*kind, message.as_str())),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Renderer for RecordingRenderer {
    fn draw_grid(&mut self, maze: &GridMaze) {
        self.events.push(RenderEvent::DrawGrid {
            rows: maze.rows(),
            cols: maze.cols(),
        });
    }

    fn draw_token(&mut self, cell: Cell) {
        self.events.push(RenderEvent::DrawToken(cell));
    }

    fn draw_trail(&mut self, cell: Cell) {
        self.events.push(RenderEvent::DrawTrail(cell));
    }

    fn notify(&mut self, kind: NoticeKind, message: &str) {
        self.events.push(RenderEvent::Notify(kind, message.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    Idle,
    Running,
    Done,
}

/// Replays a validated path one node per tick.
///
/// The scheduler owns no timer. Callers either invoke [`tick`](Self::tick)
/// from their own timer or call [`poll`](Self::poll) from an event loop,
/// which ticks at most once per [`interval`](Self::interval).
#[derive(Debug)]
pub struct AnimationScheduler {
    state: AnimationState,
    path: Vec<NodeId>,
    step: usize,
    interval: Duration,
    last_tick: Option<Instant>,
}

impl Default for AnimationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl AnimationScheduler {
    pub fn new(interval: Duration) -> Self {
        AnimationScheduler {
            state: AnimationState::Idle,
            path: Vec::new(),
            step: 0,
            interval,
            last_tick: None,
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Steps emitted so far and total steps of the current run.
    pub fn progress(&self) -> (usize, usize) {
        (self.step, self.path.len())
    }

    /// Begins replaying `path`, replacing any run in flight.
    pub fn start(&mut self, path: &ValidatedPath) {
        if self.state == AnimationState::Running {
            debug!("restarting animation at step {}", self.step);
        }
        self.path = path.nodes().to_vec();
        self.step = 0;
        self.last_tick = None;
        self.state = AnimationState::Running;
    }

    /// Stops the current run; further ticks do nothing.
    pub fn cancel(&mut self) {
        self.path.clear();
        self.step = 0;
        self.last_tick = None;
        self.state = AnimationState::Idle;
    }

    /// Emits the next step. After the last node a single solved notice is
    /// sent and the scheduler moves to [`AnimationState::Done`].
    pub fn tick(&mut self, node_map: &NodeMap, renderer: &mut dyn Renderer) -> AnimationState {
        if self.state != AnimationState::Running {
            return self.state;
        }
        if let Some(&id) = self.path.get(self.step) {
            match node_map.cell(id) {
                Some(cell) => {
                    renderer.draw_token(cell);
                    renderer.draw_trail(cell);
                }
                None => warn!("node {id} has no cell in the current maze"),
            }
            self.step += 1;
        }
        if self.step >= self.path.len() {
            self.state = AnimationState::Done;
            info!("animation finished after {} steps", self.step);
            renderer.notify(NoticeKind::Info, SOLVED_MESSAGE);
        }
        self.state
    }

    /// Ticks when the interval has elapsed since the previous tick. The first
    /// tick after [`start`](Self::start) is due immediately.
    pub fn poll(
        &mut self,
        now: Instant,
        node_map: &NodeMap,
        renderer: &mut dyn Renderer,
    ) -> AnimationState {
        if self.state != AnimationState::Running {
            return self.state;
        }
        let due = self
            .last_tick
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            return self.state;
        }
        self.last_tick = Some(now);
        self.tick(node_map, renderer)
    }
}
