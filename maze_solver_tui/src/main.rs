mod app;
mod config;

use anyhow::{Context, Result};
use app::{App, Canvas, Key, Tile};
use clap::Parser;
use config::Config;
use log::info;
use maze_solver_core::{
    Cell,
    animation::{AnimationState, NoticeKind},
    maze::load_maze_file,
    plugin::BreadthFirst,
    session::Session,
};
use rand::{SeedableRng, rngs::StdRng};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Maze file to load; a random maze is generated when omitted
    #[arg(short, long, value_name = "MAZE_FILE")]
    maze: Option<PathBuf>,

    /// Plugin executable providing `find_shortest_path`
    #[arg(short, long, value_name = "PLUGIN_FILE", conflicts_with = "builtin")]
    plugin: Option<PathBuf>,

    /// Use the built-in breadth-first solver
    #[arg(long)]
    builtin: bool,

    /// Program used to run a protocol plugin file; `.py` files are then no
    /// longer hosted as modules
    #[arg(long, value_name = "PROGRAM")]
    interpreter: Option<String>,

    /// Python used to host `.py` plugin modules
    #[arg(long, value_name = "PROGRAM")]
    python: Option<String>,

    /// Plugin time limit in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Delay between animation steps in milliseconds
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Reject paths that are longer than the shortest route
    #[arg(long)]
    require_shortest: bool,

    /// Seed for maze generation
    #[arg(long)]
    seed: Option<u64>,

    /// Solve once and print the result instead of opening the UI
    #[arg(long)]
    headless: bool,

    /// TOML settings file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = resolve_config(&args)?;
    init_logging(&args, &config)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut canvas = Canvas::default();
    let session = build_session(&args, &config, &mut rng, &mut canvas)?;

    if args.headless {
        return run_headless(session, canvas);
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Run the main application loop
    let mut app = App::new(session, canvas, config, rng);
    let result = run_app(&mut terminal, &mut app);

    // Restore the terminal state
    restore_terminal(&mut terminal)?;

    result
}

/// Reads the optional config file and applies command line overrides.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(interpreter) = &args.interpreter {
        config.interpreter = Some(interpreter.clone());
    }
    if let Some(python) = &args.python {
        config.python = python.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.plugin_timeout_ms = timeout_ms;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
    }
    config.require_shortest |= args.require_shortest;
    Ok(config)
}

/// Logs go to stderr in headless mode and to the configured file otherwise,
/// since the terminal UI owns the screen.
fn init_logging(args: &Args, config: &Config) -> Result<()> {
    let default_level = if args.headless { "warn" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    if !args.headless {
        let file = File::create(&config.log_file)
            .with_context(|| format!("failed to create log file {}", config.log_file.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("failed to initialise logging")?;
    Ok(())
}

fn build_session(
    args: &Args,
    config: &Config,
    rng: &mut StdRng,
    canvas: &mut Canvas,
) -> Result<Session> {
    let mut session = match &args.maze {
        Some(path) => {
            let maze = load_maze_file(path)
                .with_context(|| format!("failed to load maze {}", path.display()))?;
            Session::new(maze, canvas)
        }
        None => Session::generate(config.maze_rows, config.maze_cols, rng, canvas)
            .context("failed to generate maze")?,
    };
    session
        .animation_mut()
        .set_interval(config.tick_interval());
    session.set_validation(config.validation());

    if args.builtin {
        session.set_plugin(Box::new(BreadthFirst), canvas);
    } else if let Some(path) = &args.plugin {
        session
            .load_plugin(path, config.plugin_config(path), canvas)
            .with_context(|| format!("failed to load plugin {}", path.display()))?;
    }
    info!(
        "session ready: {}x{} maze",
        session.maze().rows(),
        session.maze().cols()
    );
    Ok(session)
}

/// Solves once, replays the animation without delay and prints the result.
fn run_headless(mut session: Session, mut canvas: Canvas) -> Result<()> {
    session.solve(&mut canvas).context("solve failed")?;
    session.redraw(&mut canvas);
    while session.tick(&mut canvas) == AnimationState::Running {}

    for line in canvas.text_lines() {
        println!("{line}");
    }
    if let Some(path) = session.path() {
        let nodes: Vec<String> = path.nodes().iter().map(ToString::to_string).collect();
        println!("path ({} moves): {}", path.moves(), nodes.join(" "));
    }
    for (kind, message) in canvas.notices() {
        println!("[{kind:?}] {message}");
    }
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    // Input is polled well below the animation interval so steps stay on time.
    let frame_rate = Duration::from_millis(25);

    loop {
        terminal.draw(|f| ui(f, app))?;

        if crossterm::event::poll(frame_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(key) = translate_key(key.code) {
                        app.handle_key(key);
                    }
                }
            }
        }

        app.tick(Instant::now());

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn translate_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Char(ch) => Some(Key::Char(ch)),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Esc => Some(Key::Esc),
        _ => None,
    }
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70), // Area for the maze
            Constraint::Percentage(20), // Area for notifications
            Constraint::Percentage(10), // Area for help or the path prompt
        ])
        .split(frame.area());

    render_maze(frame, main_layout[0], &app.canvas);
    render_status(frame, main_layout[1], app);

    let footer = match &app.prompt {
        Some(prompt) => Paragraph::new(format!("{}: {}_", prompt.kind.label(), prompt.input))
            .alignment(Alignment::Left),
        None => Paragraph::new(
            "g: random maze  o: open maze  p: load plugin  b: built-in solver  s: solve  c: cancel  q/Esc: quit",
        )
        .alignment(Alignment::Center),
    };
    frame.render_widget(footer.block(Block::default().borders(Borders::TOP)), main_layout[2]);
}

fn tile_style(tile: Tile) -> Style {
    match tile {
        Tile::Wall => Style::default().fg(Color::DarkGray),
        Tile::Floor => Style::default(),
        Tile::Start => Style::default().fg(Color::Red).bold(),
        Tile::End => Style::default().fg(Color::Yellow).bold(),
        Tile::Trail => Style::default().fg(Color::Green),
        Tile::Token => Style::default().fg(Color::Blue).bold(),
    }
}

/// Renders the maze, trail and token onto the frame.
fn render_maze(frame: &mut Frame, area: Rect, canvas: &Canvas) {
    let (rows, cols) = canvas.dimensions();
    let mut lines: Vec<Line> = Vec::with_capacity(rows);

    for row in 0..rows {
        let mut spans: Vec<Span> = Vec::with_capacity(cols);
        for col in 0..cols {
            let tile = canvas.tile(Cell::new(row, col));
            // Cells are drawn two columns wide to look roughly square.
            let glyph: String = [tile.glyph(), tile.glyph()].iter().collect();
            spans.push(Span::styled(glyph, tile_style(tile)));
        }
        lines.push(Line::from(spans));
    }

    let maze_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Maze Solver").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(maze_paragraph, area);
}

/// Renders the solver state and the most recent notifications.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let solver = app.session.plugin_name().unwrap_or("none");
    let (step, total) = app.session.animation().progress();
    let animation = match app.session.animation_state() {
        AnimationState::Idle => "idle".to_string(),
        AnimationState::Running => format!("running {step}/{total}"),
        AnimationState::Done => format!("done in {} moves", total.saturating_sub(1)),
    };
    let mut items = vec![ListItem::from(Line::from(format!(
        "Solver: {solver}   Animation: {animation}"
    )))];

    let visible = usize::from(area.height.saturating_sub(3));
    items.extend(app.canvas.notices().rev().take(visible).map(|(kind, message)| {
        let style = match kind {
            NoticeKind::Info => Style::default().fg(Color::Green),
            NoticeKind::Warning => Style::default().fg(Color::Yellow),
            NoticeKind::Error => Style::default().fg(Color::Red),
        };
        ListItem::from(Line::from(Span::styled(message.clone(), style)))
    }));

    let status_widget =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status_widget, area);
}
