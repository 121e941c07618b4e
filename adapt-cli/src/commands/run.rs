//! Run the host against a recorded event stream

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use adapt_core::session::read_events;
use adapt_core::{GatewayEvent, LocalSession, Session};
use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::info;

use super::build_host;
use crate::config::{AdaptConfig, ConfigLoader};

#[derive(Args)]
pub struct RunArgs {
    /// Newline-delimited JSON events to replay (reads stdin when omitted)
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Store this bot token in Settings.json before connecting
    #[arg(long)]
    pub token: Option<String>,
}

/// What a replay did
#[derive(Debug)]
pub struct ReplaySummary {
    pub events: usize,
    pub plugins: usize,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load()?;

    let events = match &args.events {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            read_events(BufReader::new(file))?
        }
        None => read_events(std::io::stdin().lock())?,
    };

    let session = Arc::new(LocalSession::new());
    let summary = replay(&config, session, events, args.token).await?;
    println!(
        "Replayed {} events through {} plugins",
        summary.events, summary.plugins
    );
    Ok(())
}

/// Connect a host to `session`, replay `events` and run until they are drained
pub async fn replay(
    config: &AdaptConfig,
    session: Arc<LocalSession>,
    events: Vec<GatewayEvent>,
    token: Option<String>,
) -> Result<ReplaySummary> {
    let mut host = build_host(config);

    if let Some(token) = token {
        host.settings().set_bot_token(token);
        let report = host.settings().save_all();
        if !report.is_ok() {
            bail!("Failed to store the bot token");
        }
    }

    let factory_session = Arc::clone(&session);
    let factory = move || -> Arc<dyn Session> { factory_session.clone() };
    if !host.initialize_connection(&factory).await? {
        bail!(
            "No bot token configured; set Discord.BotToken in {} or pass --token",
            host.settings().layout().global_file.display()
        );
    }

    let plugins = host
        .registry()
        .map(|registry| registry.present_count())
        .unwrap_or_default();

    let count = session.emit_all(events);
    session.close();
    info!(events = count, "Replaying recorded events");

    host.run().await?;

    Ok(ReplaySummary {
        events: count,
        plugins,
    })
}
