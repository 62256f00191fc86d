//! `preloved` -- swipe-to-like shopping in the terminal.
//!
//! Logs in against a Gorse recommender, shows one recommended item at a
//! time and sends likes back in batches.
//!
//! # Environment variables
//!
//! | Variable        | Default                 | Description                     |
//! |-----------------|-------------------------|---------------------------------|
//! | `GORSE_API_URL` | `http://localhost:8088` | Recommender base URL            |
//! | `GORSE_API_KEY` | --                      | Sent as `X-API-Key` when set    |
//! | `RUST_LOG`      | `preloved=info,...`     | Log filter for `preloved.log`   |

mod app;
mod handler;
mod tui;
mod ui;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use preloved_core::{Config, GorseClient};

use crate::app::App;
use crate::tui::EventHandler;

const TICK_RATE: Duration = Duration::from_millis(300);

/// Log to a file; the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    fs::create_dir_all(&dir)?;
    let path = dir.join("preloved.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {:?}", path))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "preloved=info,preloved_core=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default config");
        Config::default()
    });
    let client = GorseClient::from_config(&config).context("Invalid recommender configuration")?;
    tracing::info!(url = %client.base_url(), "Starting preloved");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(TICK_RATE);
    let mut app = App::new(config, client, events.sender());

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;

    // Last chance to deliver likes before the session state is dropped.
    // A periodic flush may still be running; wait for it rather than giving up.
    if app.feed.pending_likes() > 0 && !app.feed.flush_likes_when_idle().await {
        eprintln!(
            "Could not save {} likes; they will be lost.",
            app.feed.pending_likes()
        );
    }

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
