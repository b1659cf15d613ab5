use crate::{
    config::Config,
    driver::{DriverFactory, PageDriver, chrome::ChromeDriver},
    progress::{JobState, ProgressStore},
    runner::BatchRunner,
    server::{self, AppState},
    util::{ensure_dir, parse_plates},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "simit-check")]
#[command(about = "Batch traffic-fine lookup for vehicle plates with an xlsx evidence report")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./simit-check.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the web UI and JSON endpoints.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one batch in the foreground from a newline-separated plates file.
    Run {
        #[arg(long)]
        plates: PathBuf,
    },
    /// Launch and close the browser to check the environment.
    Doctor {},
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = Config::load_or_default(cfg_path.as_deref())?;
    let _guard = init_logging(&args, &cfg)?;
    if let Some(p) = &cfg_path {
        info!("config={}", p.display());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    match &args.cmd {
        Command::Serve { port } => runtime.block_on(serve(&cfg, *port)),
        Command::Run { plates } => runtime.block_on(run(&cfg, plates)),
        Command::Doctor {} => runtime.block_on(doctor(&cfg)),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["simit-check.toml", "simit-check.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        let path = Path::new(&cfg.logging.file_path);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn chrome_factory(cfg: &Config) -> DriverFactory {
    let cfg = cfg.clone();
    Arc::new(move || Box::new(ChromeDriver::new(&cfg)) as Box<dyn PageDriver>)
}

async fn serve(cfg: &Config, port: Option<u16>) -> Result<()> {
    let env_port = std::env::var("PORT").ok();
    let port = cfg.server.resolve_port(port, env_port.as_deref());
    let state = AppState::new(cfg.clone(), ProgressStore::new(), chrome_factory(cfg));
    server::serve(state, &cfg.server.host, port).await?;
    Ok(())
}

async fn run(cfg: &Config, plates_file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(plates_file)
        .with_context(|| format!("reading plates: {}", plates_file.display()))?;
    let plates = parse_plates(&raw);
    if plates.is_empty() {
        return Err(anyhow!("no valid plates in {}", plates_file.display()));
    }

    let progress = ProgressStore::new();
    progress.try_begin(plates.len())?;
    let runner = BatchRunner::new(cfg, Box::new(ChromeDriver::new(cfg)), progress.clone());
    runner.run(plates).await;

    let snapshot = progress.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if snapshot.state != JobState::Completed {
        return Err(anyhow!("{}", snapshot.message));
    }
    Ok(())
}

async fn doctor(cfg: &Config) -> Result<()> {
    let mut driver = ChromeDriver::new(cfg);
    let opened = driver.open().await;
    let closed = driver.close().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "headless": cfg.browser.headless.is_headless(),
            "executable": cfg.browser.executable,
            "ok": opened.is_ok(),
            "error": opened.as_ref().err().map(|e| e.to_string()),
            "teardown_error": closed.as_ref().err().map(|e| e.to_string()),
        }))?
    );
    opened.context("launching browser")?;
    Ok(())
}
