mod app;
mod ui;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange,
        Event, KeyEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use editbored_config::Config;
use editbored_engine::{Collaborators, EditorSession, FileStore};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    env,
    fs::OpenOptions,
    io::{Stdout, stdout},
    path::{Path, PathBuf},
    process,
    time::{Duration, Instant},
};

use crate::app::{App, editor_options};

/// Longest wait for input before checking timers again.
const IDLE_POLL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config_path = Config::config_path();

    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Fix or remove {}", config_path.display());
            process::exit(1);
        }
    };

    let storage_path = match args.len() {
        1 => config.storage_path.clone(),
        2 => PathBuf::from(&args[1]),
        _ => {
            eprintln!("Usage: {} [storage-folder-path]", args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&storage_path) {
        eprintln!(
            "Error: Storage path '{}' is not usable: {e}",
            storage_path.display()
        );
        process::exit(1);
    }

    init_logging(&storage_path)?;
    log::info!("editbored starting up!");
    log::info!("Config path: {}", config_path.display());
    log::info!("Storage path: {}", storage_path.display());

    let session = EditorSession::load(
        FileStore::new(&storage_path),
        editor_options(&config),
        Collaborators::default(),
    )?;
    let mut app = App::new(session);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableBracketedPaste,
        EnableFocusChange
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

/// Log to a file beside the document; stderr would draw over the editor.
fn init_logging(storage_path: &Path) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(storage_path.join("editbored.log"))?;
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App<FileStore>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = app
            .session
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .map_or(IDLE_POLL, |wait| wait.min(IDLE_POLL));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Paste(text) => app.session.paste(&text),
                Event::FocusLost => app.session.blur(),
                _ => {}
            }
        }

        for (block, outcome) in app.session.tick(Instant::now()) {
            log::debug!("embed {block:?}: {outcome:?}");
        }

        if app.should_quit {
            app.session.blur();
            return Ok(());
        }
    }
}
