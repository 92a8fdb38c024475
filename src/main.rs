use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use pagenotes::event_source::KeyboardEventSource;
use pagenotes::panic_handler::initialize_panic_handler;
use pagenotes::settings;
use pagenotes::{App, run_app_with_event_source};

#[derive(Parser, Debug)]
#[command(name = "pagenotes", version, about = "Keep page-synchronized notes next to a document")]
struct Args {
    /// Org notes file; created on first save if missing
    notes_file: PathBuf,

    /// Put the cursor on the first heading with this title
    #[arg(long)]
    heading: Option<String>,

    /// Log level written to pagenotes.log (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Configuration file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = args.log_level.parse().unwrap_or(LevelFilter::Info);
    WriteLogger::init(
        level,
        Config::default(),
        File::create("pagenotes.log").context("Failed to create pagenotes.log")?,
    )?;
    info!("Starting pagenotes");

    match &args.config {
        Some(path) => settings::load_settings_from(path),
        None => settings::load_settings(),
    }

    let mut app = App::open(&args.notes_file)?;
    if let Some(title) = &args.heading {
        if !app.goto_heading(title) {
            warn!("No heading titled {title:?}");
            app.notifications.warn(format!("No heading titled \"{title}\""));
        }
    }

    initialize_panic_handler();
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_with_event_source(&mut terminal, &mut app, &mut KeyboardEventSource);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down pagenotes");
    Ok(())
}
