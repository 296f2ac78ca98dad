use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hubchat_core::{ChatClient, Config};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "hubchat")]
#[command(about = "Terminal chat client for the travel hub assistant", version)]
struct Cli {
    /// Backend base URL
    #[arg(short, long)]
    url: Option<String>,

    /// Request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Chat endpoint path, e.g. /api/test for the echo endpoint
    #[arg(long)]
    chat_path: Option<String>,

    /// Log file (defaults to hubchat.log in the config directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Flags win over env vars, which win over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(secs) = self.timeout {
            config.request_timeout_secs = secs;
        }
        if let Some(path) = &self.chat_path {
            config.chat_path = path.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, load_error) = match Config::load_or_init() {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };
    config.apply_env();
    cli.apply(&mut config);

    let log_path = match &cli.log_file {
        Some(path) => path.clone(),
        None => Config::config_dir()?.join("hubchat.log"),
    };
    let _log_guard = logging::init(&log_path)?;

    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Could not load or write config file, using defaults");
    }
    tracing::info!(
        base_url = %config.base_url,
        chat_path = %config.chat_path,
        timeout_secs = config.request_timeout_secs,
        "Starting hubchat"
    );

    let client = ChatClient::new(&config.base_url, config.request_timeout())?
        .with_chat_path(&config.chat_path);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(client, events.sender());

    app.check_health();
    app.load_stats();
    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    tracing::info!("Exiting");
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
