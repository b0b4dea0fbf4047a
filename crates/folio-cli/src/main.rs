//! `folio`: terminal client for the Folio review board.
//!
//! # Usage
//!
//! ```text
//! folio --url http://localhost:8080
//! folio --admin-email owner@example.com --admin-password secret
//! folio --config ~/.config/folio/config.toml --log-file /tmp/folio.log
//! ```

mod app;
mod board;
mod client;
mod ui;

use std::{io, path::PathBuf, sync::Mutex, time::Duration};

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use client::{ApiClient, ApiConfig};
use crossterm::{
  event::{self, Event, KeyEventKind},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// How long teardown waits for the server to release the session.
const SIGN_OUT_WAIT: Duration = Duration::from_secs(2);

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "folio", about = "Terminal client for the Folio review board")]
struct Args {
  /// Path to a TOML config file (url, admin_email, admin_password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the folio server (default: http://localhost:8080).
  #[arg(long, env = "FOLIO_URL")]
  url: Option<String>,

  /// Sign in as the administrator with this email.
  #[arg(long, env = "FOLIO_ADMIN_EMAIL")]
  admin_email: Option<String>,

  /// Administrator password (plaintext).
  #[arg(long, env = "FOLIO_ADMIN_PASSWORD")]
  admin_password: Option<String>,

  /// Write logs to this file; nothing is logged otherwise.
  #[arg(long, value_name = "FILE")]
  log_file: Option<PathBuf>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:            String,
  #[serde(default)]
  admin_email:    String,
  #[serde(default)]
  admin_password: String,
}

fn pick(flag: Option<String>, file: &str) -> Option<String> {
  flag.or_else(|| (!file.is_empty()).then(|| file.to_string()))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // The terminal belongs to the UI, so logs only ever go to a file.
  if let Some(path) = &args.log_file {
    let file = std::fs::File::create(path)
      .with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
      .with_env_filter(
        EnvFilter::builder()
          .with_default_directive(LevelFilter::INFO.into())
          .from_env_lossy(),
      )
      .with_ansi(false)
      .with_writer(Mutex::new(file))
      .init();
  }

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags and env override the config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url:       pick(args.url, &file_cfg.url)
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    admin_email:    pick(args.admin_email, &file_cfg.admin_email).unwrap_or_default(),
    admin_password: pick(args.admin_password, &file_cfg.admin_password).unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;
  let (events_tx, events_rx) = mpsc::unbounded_channel();
  let mut app = App::new(client, events_tx);

  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  app.start();
  let run_result = run_event_loop(&mut terminal, &mut app, events_rx).await;

  // Stops the feed task before the terminal is handed back.
  let client = app.client().clone();
  drop(app);

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  let signed_out = tokio::time::timeout(SIGN_OUT_WAIT, client.sign_out())
    .await
    .map_err(anyhow::Error::from)
    .and_then(|result| result);
  if let Err(e) = signed_out {
    let message = format!("{e:#}");
    tracing::warn!(error = %message, "sign-out failed");
  }

  run_result
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
  mut events: mpsc::UnboundedReceiver<app::AppEvent>,
) -> Result<()> {
  loop {
    while let Ok(evt) = events.try_recv() {
      app.handle_event(evt);
    }
    app.tick();

    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for input, yielding to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && key.kind == KeyEventKind::Press
      && !app.handle_key(key)
    {
      break;
    }
  }

  Ok(())
}
