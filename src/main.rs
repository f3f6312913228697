use clap::Parser;
use color_eyre::Result;
use painboard::api::HttpBackend;
use painboard::app::App;
use painboard::builder::{load_stored_credentials, ConfigBuilder};
use painboard::config::{BackendConfig, Config};
use painboard::db::LocalStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "painboard")]
#[command(about = "A terminal dashboard for painminer analysis jobs")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/painboard/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, overriding the config file
  #[arg(short, long)]
  backend: Option<String>,

  /// YAML job draft to open in the editor
  #[arg(short, long)]
  job: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Logs go to a file; the terminal belongs to the UI
  let _log_guard = init_logging()?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override backend if specified on command line
  let config = if let Some(url) = args.backend {
    Config {
      backend: BackendConfig {
        url,
        ..config.backend
      },
      ..config
    }
  } else {
    config
  };

  let local_store = match LocalStore::open() {
    Ok(store) => Some(store),
    Err(e) => {
      warn!(error = %e, "credential store unavailable");
      None
    }
  };

  let mut draft = match &args.job {
    Some(path) => ConfigBuilder::load_draft(path)?,
    None => ConfigBuilder::new(),
  };
  if let Some(stored) = local_store
    .as_ref()
    .and_then(|store| load_stored_credentials(store))
  {
    draft.seed_credentials(&stored);
  }
  draft.apply_env_overrides();

  let backend = Arc::new(HttpBackend::new(&config.backend)?);

  // Initialize and run the app
  let mut app = App::new(&config, backend, draft, local_store);
  if args.job.is_some() {
    app.open_draft();
  }
  app.run().await?;

  Ok(())
}

/// Daily-rotated log file under the data directory, filtered by `PAINBOARD_LOG`
fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let dir = LocalStore::data_dir()?.join("logs");
  std::fs::create_dir_all(&dir)?;

  let appender = tracing_appender::rolling::daily(dir, "painboard.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("PAINBOARD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
