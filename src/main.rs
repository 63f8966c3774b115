//! edterm - a terminal code editor with a file tree and an embedded shell
//!
//! The screen is split into three panes: a directory browser on the left,
//! the editor in the middle, and a shell running in a pseudo-terminal at the
//! bottom. Each pane can be hidden and focused independently.
//!
//! # Quick Start
//!
//! ```text
//! edterm                    # Browse the working directory
//! edterm src/main.rs        # Open a file
//! edterm ~/project          # Browse another directory
//! edterm -s /bin/zsh        # Use a specific shell
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | F2 / F3 / F4 | Focus editor / file tree / terminal |
//! | Ctrl+Tab | Next pane |
//! | Ctrl+B | Toggle file tree |
//! | Ctrl+T | Toggle terminal |
//! | Ctrl+S | Save |
//! | Ctrl+F | Find |
//! | Ctrl+Q | Quit |

mod app;
mod clipboard;
mod config;
mod core;
mod editor;
mod filetree;
mod input;
mod ui;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::app::{App, StartupOptions};
use crate::config::Config;
use crate::ui::Renderer;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the log filter
const LOG_ENV: &str = "EDTERM_LOG";

fn print_version() {
    eprintln!("edterm {}", VERSION);
}

fn print_help() {
    eprintln!("edterm {} - A terminal code editor", VERSION);
    eprintln!();
    eprintln!("Usage: edterm [OPTIONS] [PATH]...");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  PATH                  File to open, or directory to browse");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Shell for the terminal pane");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keybindings:");
    eprintln!("  F2 / F3 / F4          Focus editor / file tree / terminal");
    eprintln!("  Ctrl+Tab, Shift+Tab   Cycle focus");
    eprintln!("  Ctrl+B / Ctrl+T       Toggle file tree / terminal");
    eprintln!("  Ctrl+S, Ctrl+Shift+S  Save, save as");
    eprintln!("  Ctrl+N / Ctrl+W       New / close document");
    eprintln!("  Ctrl+PgUp / Ctrl+PgDn Previous / next document");
    eprintln!("  Ctrl+Z / Ctrl+Y       Undo / redo");
    eprintln!("  Ctrl+X / C / V        Cut / copy / paste");
    eprintln!("  Ctrl+F, Ctrl+G        Find, find next");
    eprintln!("  Ctrl+H                Replace all");
    eprintln!("  Insert                Toggle overwrite mode");
    eprintln!("  Shift+PgUp / PgDn    Scroll terminal history");
    eprintln!("  Ctrl+Shift+C / V      Copy / paste in the terminal");
    eprintln!("  Ctrl+Q                Quit");
    eprintln!();
    match Config::config_path() {
        Some(path) => eprintln!("Configuration: {}", path.display()),
        None => eprintln!("Configuration: none (no config directory)"),
    }
    eprintln!("Log filter: {}=debug", LOG_ENV);
}

/// What the command line asked for
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(StartupOptions),
    Help,
    Version,
}

fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = StartupOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-s" | "--shell" => {
                let shell = args.next().ok_or("Missing shell argument")?;
                options.shell = Some(shell);
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("Unknown argument: {}. Use -h for help.", flag));
            }
            path => {
                let path = PathBuf::from(path);
                if path.is_dir() {
                    if options.root.is_some() {
                        return Err("Only one directory can be browsed".to_string());
                    }
                    options.root = Some(path);
                } else {
                    options.files.push(path);
                }
            }
        }
    }
    Ok(Command::Run(options))
}

/// Log to a file next to the config; the screen belongs to the editor
fn init_logging() {
    let Some(dir) = dirs::config_dir().map(|d| d.join("edterm")) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("edterm.log"));

    if let Ok(file) = log_file {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args(env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Version) => {
            print_version();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("edterm {} starting", VERSION);

    let config = Config::load();
    let (width, height) = Renderer::size()?;

    let mut renderer = Renderer::new();
    renderer.init()?;

    let mut app = App::new(config, options, width, height);
    let result = run_main_loop(&mut app, &mut renderer);

    app.shutdown();
    renderer.cleanup()?;

    if let Err(e) = &result {
        error!("Main loop failed: {:#}", e);
    }
    info!("edterm exiting");
    result
}

fn run_main_loop(app: &mut App, renderer: &mut Renderer) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);

    while !app.should_quit() {
        app.tick();
        if app.take_redraw() {
            app.render(renderer)?;
        }

        if event::poll(poll_timeout)? {
            // Drain everything queued before drawing again
            loop {
                app.handle_event(event::read()?);
                if app.should_quit() || !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, String> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_flags() {
        assert_eq!(parse(&["-h"]), Ok(Command::Help));
        assert_eq!(parse(&["--version"]), Ok(Command::Version));
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["-s"]).is_err());

        let Ok(Command::Run(options)) = parse(&["-s", "/bin/zsh", "notes.txt"]) else {
            panic!("expected run");
        };
        assert_eq!(options.shell.as_deref(), Some("/bin/zsh"));
        assert_eq!(options.files, [PathBuf::from("notes.txt")]);
        assert_eq!(options.root, None);
    }

    #[test]
    fn test_directory_becomes_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().into_owned();
        let Ok(Command::Run(options)) = parse(&[&path]) else {
            panic!("expected run");
        };
        assert_eq!(options.root.as_deref(), Some(dir.path()));
        assert!(options.files.is_empty());

        assert!(parse(&[&path, &path]).is_err());
    }
}
