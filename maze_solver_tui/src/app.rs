use std::{
    collections::{HashSet, VecDeque},
    path::PathBuf,
    time::Instant,
};

use log::debug;
use maze_solver_core::{
    Cell,
    animation::{NoticeKind, Renderer},
    maze::GridMaze,
    plugin::BreadthFirst,
    session::Session,
};
use rand::rngs::StdRng;

use crate::config::Config;

const NOTICE_HISTORY: usize = 50;

/// What a map cell currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Wall,
    Floor,
    Start,
    End,
    Trail,
    Token,
}

impl Tile {
    pub fn glyph(self) -> char {
        match self {
            Tile::Wall => '#',
            Tile::Floor => ' ',
            Tile::Start => 'S',
            Tile::End => 'E',
            Tile::Trail => '·',
            Tile::Token => '@',
        }
    }
}

/// In-memory picture of what the session asked to draw.
#[derive(Debug, Default)]
pub struct Canvas {
    maze: Option<GridMaze>,
    token: Option<Cell>,
    trail: HashSet<Cell>,
    notices: VecDeque<(NoticeKind, String)>,
}

impl Canvas {
    pub fn dimensions(&self) -> (usize, usize) {
        self.maze
            .as_ref()
            .map_or((0, 0), |maze| (maze.rows(), maze.cols()))
    }

    pub fn tile(&self, cell: Cell) -> Tile {
        let Some(maze) = &self.maze else {
            return Tile::Wall;
        };
        if self.token == Some(cell) {
            Tile::Token
        } else if !maze.is_passable(cell) {
            Tile::Wall
        } else if cell == maze.start() {
            Tile::Start
        } else if cell == maze.end() {
            Tile::End
        } else if self.trail.contains(&cell) {
            Tile::Trail
        } else {
            Tile::Floor
        }
    }

    /// The map as plain text, one string per row.
    pub fn text_lines(&self) -> Vec<String> {
        let (rows, cols) = self.dimensions();
        (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| self.tile(Cell::new(row, col)).glyph())
                    .collect()
            })
            .collect()
    }

    /// Notifications, oldest first.
    pub fn notices(&self) -> impl DoubleEndedIterator<Item = &(NoticeKind, String)> {
        self.notices.iter()
    }
}

impl Renderer for Canvas {
    fn draw_grid(&mut self, maze: &GridMaze) {
        self.maze = Some(maze.clone());
        self.token = None;
        self.trail.clear();
    }

    fn draw_token(&mut self, cell: Cell) {
        self.token = Some(cell);
    }

    fn draw_trail(&mut self, cell: Cell) {
        self.trail.insert(cell);
    }

    fn notify(&mut self, kind: NoticeKind, message: &str) {
        if self.notices.len() == NOTICE_HISTORY {
            self.notices.pop_front();
        }
        self.notices.push_back((kind, message.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    MazeFile,
    PluginFile,
}

impl PromptKind {
    pub fn label(self) -> &'static str {
        match self {
            PromptKind::MazeFile => "Maze file",
            PromptKind::PluginFile => "Plugin file",
        }
    }
}

/// A one-line path input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
}

/// Input understood by [`App::handle_key`], decoupled from the terminal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    Esc,
}

pub struct App {
    pub session: Session,
    pub canvas: Canvas,
    pub config: Config,
    pub prompt: Option<Prompt>,
    pub should_quit: bool,
    rng: StdRng,
}

impl App {
    pub fn new(session: Session, canvas: Canvas, config: Config, rng: StdRng) -> Self {
        App {
            session,
            canvas,
            config,
            prompt: None,
            should_quit: false,
            rng,
        }
    }

    /// Advances the animation when its interval has elapsed.
    pub fn tick(&mut self, now: Instant) {
        self.session.poll(now, &mut self.canvas);
    }

    pub fn handle_key(&mut self, key: Key) {
        if let Some(prompt) = self.prompt.as_mut() {
            match key {
                Key::Char(ch) => prompt.input.push(ch),
                Key::Backspace => {
                    prompt.input.pop();
                }
                Key::Esc => self.prompt = None,
                Key::Enter => {
                    if let Some(prompt) = self.prompt.take() {
                        self.submit(prompt);
                    }
                }
            }
            return;
        }

        match key {
            Key::Char('q') | Key::Esc => self.should_quit = true,
            Key::Char('g') => self.generate(),
            Key::Char('o') => self.open_prompt(PromptKind::MazeFile),
            Key::Char('p') => self.open_prompt(PromptKind::PluginFile),
            Key::Char('b') => self
                .session
                .set_plugin(Box::new(BreadthFirst), &mut self.canvas),
            Key::Char('s') => self.solve(),
            Key::Char('c') => {
                self.session.cancel_animation();
                self.session.redraw(&mut self.canvas);
            }
            _ => {}
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        self.prompt = Some(Prompt {
            kind,
            input: String::new(),
        });
    }

    // Failures below have already been turned into a notice by the session.

    fn submit(&mut self, prompt: Prompt) {
        let path = PathBuf::from(prompt.input.trim());
        debug!("{} submitted: {}", prompt.kind.label(), path.display());
        match prompt.kind {
            PromptKind::MazeFile => {
                let _ = self.session.load_maze_file(&path, &mut self.canvas);
            }
            PromptKind::PluginFile => {
                let plugin_config = self.config.plugin_config(&path);
                let _ = self
                    .session
                    .load_plugin(&path, plugin_config, &mut self.canvas);
            }
        }
    }

    fn generate(&mut self) {
        let (rows, cols) = (self.config.maze_rows, self.config.maze_cols);
        let _ = self
            .session
            .generate_maze(rows, cols, &mut self.rng, &mut self.canvas);
    }

    fn solve(&mut self) {
        if self.session.solve(&mut self.canvas).is_ok() {
            // Start the replay on a clean board.
            self.session.redraw(&mut self.canvas);
        }
    }
}
