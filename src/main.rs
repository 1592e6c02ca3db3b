//! Gerrit Notifier CLI
//!
//! Listens to a Gerrit review-event stream and posts batched notifications
//! to Slack channels.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gerrit_notifier::{
    classify, development_mode, CommandSource, Config, Event, FlushScheduler,
    NotificationBuffer, ChannelMap, Pipeline, SlackWebhook, StreamListener,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "gerrit-notifier")]
#[command(about = "Post batched Gerrit review notifications to Slack")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/gerrit-notifier/config.json)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the listener and flush scheduler; runs until killed
    Run,
    /// Load and validate the config file, then print a summary
    CheckConfig,
    /// Read raw event JSON lines from stdin and print the resulting
    /// notifications (dry classification, nothing is delivered)
    Classify,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log level via RUST_LOG, default info.
    // e.g. RUST_LOG=gerrit_notifier=debug gerrit-notifier run
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gerrit_notifier=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Run => {
            let config = Config::load(&config_path)?;
            run(config).await
        }
        Commands::CheckConfig => {
            let config = Config::load(&config_path)?;
            println!("config ok: {}", config_path.display());
            println!("  stream command: {}", config.stream_command);
            println!("  flush interval: {}s", config.flush_interval_secs);
            println!("  channels: {}", config.channels.len());
            for (name, rule) in &config.channels {
                println!(
                    "    #{} ({} projects, {} owners)",
                    name,
                    rule.projects.len(),
                    rule.owners.len()
                );
            }
            println!("  users: {}", config.users.len());
            Ok(())
        }
        Commands::Classify => {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match Event::parse(&line) {
                    Ok(event) => {
                        for notification in classify(&event) {
                            println!(
                                "{:?} -> {:?}: {}",
                                notification.rule, notification.audience, notification.text
                            );
                        }
                    }
                    Err(e) => eprintln!("skipping malformed line: {e}"),
                }
            }
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let development = development_mode();
    if development {
        info!("DEVELOPMENT set: delivery suppressed, dry-run only");
    }

    let routing = Arc::new(ChannelMap::new(config.channels, config.users));
    let buffer = Arc::new(NotificationBuffer::new());
    let sink = Arc::new(SlackWebhook::new(config.webhook_url)?);

    let pipeline = Arc::new(Pipeline::new(routing, Arc::clone(&buffer), development));
    let scheduler = FlushScheduler::new(
        buffer,
        sink,
        Duration::from_secs(config.flush_interval_secs),
        development,
    );
    let listener = StreamListener::new(
        Box::new(CommandSource::new(config.stream_command.clone())),
        pipeline,
    );

    info!(stream = %config.stream_command, "listening to stream");

    let flush_task = tokio::spawn(async move { scheduler.run().await });
    let listen_task = tokio::spawn(async move { listener.run().await });

    // Both tasks run forever; exiting means one of them panicked.
    let (flush_result, listen_result) = tokio::join!(flush_task, listen_task);
    flush_result?;
    listen_result?;
    Ok(())
}
