mod app;
mod constants;
mod highlight;
mod input;
mod tui;

use anyhow::{anyhow, bail, Context, Result};
use app::{App, JobSpec};
use clap::Parser;
use constants::POLL_INTERVAL_MS;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use jobtail::config::ViewerConfig;
use jobtail::coordinator::Coordinator;
use jobtail::deep_link::DeepLink;
use jobtail::stream::{HttpTransport, Transport};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobtail")]
#[command(about = "Tail the live logs of one or more CI jobs")]
struct Cli {
    #[arg(
        required = true,
        help = "Jobs to follow, as JOB=STREAM_URL, or bare job ids with --base-url"
    )]
    jobs: Vec<String>,

    #[arg(short = 'b', long = "base-url", help = "Log server URL; streams are read from <base-url>/<job>")]
    base_url: Option<String>,

    #[arg(short = 's', long = "select", help = "Deep link to open at, JOB or JOB:LINE")]
    select: Option<String>,

    #[arg(short = 'd', long = "show-debug", help = "Show debug and trace records")]
    show_debug: bool,

    #[arg(short = 'c', long = "config", help = "JSON file with viewer tunables")]
    config: Option<PathBuf>,

    #[arg(long = "log-file", help = "Write diagnostics to this file")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    config.show_debug |= cli.show_debug;

    let jobs = cli
        .jobs
        .iter()
        .map(|spec| parse_job(spec, cli.base_url.as_deref()))
        .collect::<Result<Vec<_>>>()?;
    let select = cli
        .select
        .as_deref()
        .map(str::parse::<DeepLink>)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let coordinator = Coordinator::new(HttpTransport::default(), runtime.handle().clone(), config.clone());
    let mut app = App::new(coordinator, jobs, config.row_height, select);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Some(viewer) = app.focused_viewer() {
        println!("#{}", viewer.deep_link());
    }
    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!(e))?;
        }
        // The terminal belongs to the UI.
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init()
                .map_err(|e| anyhow!(e))?;
        }
    }
    Ok(())
}

fn parse_job(spec: &str, base_url: Option<&str>) -> Result<JobSpec> {
    if let Some((job_id, url)) = spec.split_once('=') {
        if job_id.is_empty() || url.is_empty() {
            bail!("invalid job '{spec}', expected JOB=STREAM_URL");
        }
        return Ok(JobSpec {
            job_id: job_id.to_string(),
            url: url.to_string(),
        });
    }
    let base = base_url.ok_or_else(|| anyhow!("job '{spec}' has no stream URL and no --base-url was given"))?;
    Ok(JobSpec {
        job_id: spec.to_string(),
        url: format!("{}/{}", base.trim_end_matches('/'), spec),
    })
}

fn run_app<T: Transport>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<T>,
) -> Result<()> {
    loop {
        app.tick(Instant::now());

        terminal.draw(|f| tui::draw(f, app))?;

        if event::poll(Duration::from_millis(POLL_INTERVAL_MS))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key, Instant::now()) {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse, Instant::now()),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_pairs_and_base_url() {
        let job = parse_job("42=http://logs:3000/abc", None).unwrap();
        assert_eq!(job.job_id, "42");
        assert_eq!(job.url, "http://logs:3000/abc");

        let job = parse_job("abc", Some("http://logs:3000/")).unwrap();
        assert_eq!(job.url, "http://logs:3000/abc");

        assert!(parse_job("abc", None).is_err());
        assert!(parse_job("=http://x", None).is_err());
    }

    #[test]
    fn test_second_tracing_init_is_reported() {
        let _ = init_tracing(None);
        assert!(init_tracing(None).is_err());
    }
}
