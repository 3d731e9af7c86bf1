use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backlogwatch::cache::FileCache;
use backlogwatch::command::{self, CheckOptions, ExitStatus};
use backlogwatch::data::duration::parse_duration;
use backlogwatch::{events, ui, App, Settings};

#[derive(Parser, Debug)]
#[command(name = "backlogwatch", version)]
#[command(about = "Detect campaign processing backlogs and report them to a status page")]
struct Args {
    /// Configuration file (default: backlogwatch.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print fatal errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// More output; repeat for debug logs (-vv) and traces (-vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one health check pass
    Check(CheckArgs),

    /// Print the latest cached snapshot
    Show {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the latest snapshot in a terminal dashboard
    Dashboard {
        /// How often to re-read the cache (e.g., "5s", "1m")
        #[arg(short, long, default_value = "5s", value_parser = parse_refresh)]
        refresh: Duration,

        /// Widget height in pixels (minimum 330)
        #[arg(long)]
        height: Option<u32>,
    },
}

#[derive(ClapArgs, Debug)]
struct CheckArgs {
    /// Maximum average kickoff delay in seconds
    #[arg(long)]
    kickoff_delay_seconds: Option<u64>,

    /// Maximum average scheduled event delay in seconds
    #[arg(long)]
    scheduled_delay_seconds: Option<u64>,

    /// Maximum number of contacts awaiting kickoff per campaign
    #[arg(long)]
    kickoff_max_count: Option<u64>,

    /// Maximum number of contacts queued per scheduled event
    #[arg(long)]
    scheduled_max_count: Option<u64>,

    /// Store the snapshot but do not update the status page
    #[arg(long)]
    dry_run: bool,

    /// Read measurements from a JSON fixture instead of the database
    #[arg(long)]
    fixture: Option<PathBuf>,
}

impl CheckArgs {
    fn into_options(self, quiet: bool, verbose: bool) -> CheckOptions {
        CheckOptions {
            kickoff_delay_seconds: self.kickoff_delay_seconds,
            scheduled_delay_seconds: self.scheduled_delay_seconds,
            kickoff_max_count: self.kickoff_max_count,
            scheduled_max_count: self.scheduled_max_count,
            quiet,
            verbose,
            dry_run: self.dry_run,
            fixture: self.fixture,
        }
    }
}

fn parse_refresh(s: &str) -> Result<Duration, String> {
    match parse_duration(s) {
        Ok(d) if d.is_zero() => Err("refresh interval must be greater than zero".to_string()),
        Ok(d) => Ok(d),
        Err(e) => Err(e.to_string()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logs would tear through the alternate screen, so the dashboard only
    // logs when RUST_LOG asks for it.
    let default_level = match (&args.command, args.quiet, args.verbose) {
        (Command::Dashboard { .. }, _, _) => "off",
        (_, true, _) => "error",
        (_, _, 0) => "warn",
        (_, _, 1) => "info",
        (_, _, 2) => "debug",
        _ => "trace",
    };
    init_tracing(default_level);

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("[FAIL] {:#}", e);
            return ExitStatus::Failure.into();
        }
    };

    let result = match args.command {
        Command::Check(check) => {
            let options = check.into_options(args.quiet, args.verbose > 0);
            run_check(&settings, &options)
        }
        Command::Show { json } => command::show_snapshot(&settings, json, &mut io::stdout().lock()),
        Command::Dashboard { refresh, height } => {
            run_dashboard(&settings, refresh, height).map(|()| ExitStatus::Success)
        }
    };

    match result {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("[FAIL] {:#}", e);
            ExitStatus::Failure.into()
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Run one pass on a multi-threaded runtime, cancelling it on Ctrl-C.
fn run_check(settings: &Settings, options: &CheckOptions) -> Result<ExitStatus> {
    let rt = tokio::runtime::Runtime::new()?;

    let status = rt.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling pass");
                let _ = shutdown_tx.send(true);
            }
        });

        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        command::run_health_check(settings, options, &mut stdout, &mut stderr, shutdown_rx).await
    });

    info!(?status, "Health check finished");
    Ok(status)
}

/// Run the dashboard until the user quits.
fn run_dashboard(settings: &Settings, refresh: Duration, height: Option<u32>) -> Result<()> {
    let cache = Box::new(FileCache::new(&settings.cache.path));
    let mut app = App::new(cache, settings.dashboard.clone(), height, ui::Theme::auto_detect());
    app.reload_data();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app, refresh);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_refresh = Instant::now();

    while app.running {
        terminal.draw(|frame| ui::draw(frame, app))?;

        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(200))? {
            events::handle_key_event(app, key);
        }

        if last_refresh.elapsed() >= refresh_interval {
            app.reload_data();
            last_refresh = Instant::now();
        }
    }

    Ok(())
}
