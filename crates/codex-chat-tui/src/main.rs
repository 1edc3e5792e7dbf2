use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use codex_chat_core::{Config, Conversation, GeminiClient, Theme};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

const TICK_RATE: Duration = Duration::from_millis(300);

#[derive(Parser)]
#[command(name = "codex-chat")]
#[command(about = "Chat with Gemini from the terminal")]
struct Cli {
    /// Config file to read instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Gemini model to use
    #[arg(short, long)]
    model: Option<String>,
    /// Start with the dark theme
    #[arg(long)]
    dark: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not read config, using defaults");
        Config::new()
    });
    config.apply_env();
    if let Some(model) = cli.model {
        config.model = model;
    }
    if cli.dark {
        config.theme = Theme::Dark;
    }

    let client = GeminiClient::new(config.api_key.as_deref(), &config.model)
        .with_base_url(&config.base_url);
    tracing::info!(model = client.model(), "starting codex-chat");

    let conversation = Conversation::from_config(Arc::new(client), &config);
    let mut app = App::new(conversation, &config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    if let Err(err) = &result {
        tracing::error!(error = %err, "exiting with error");
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);
    app.start();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => break,
            },
            outcome = app.conversation.next_outcome() => app.apply(outcome),
        }
    }

    Ok(())
}
