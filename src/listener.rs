//! Stream listener - consumes the Gerrit event feed and reconnects forever

use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{info, warn};

/// Delay before reopening a dead stream. The upstream feed is long-lived;
/// outages are treated as transient, always.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// One open connection to the event feed.
#[async_trait]
pub trait EventStream: Send {
    /// Next raw line, or `None` at end of stream.
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Something that can (re)open the event feed.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self) -> Result<Box<dyn EventStream>>;
}

/// Feed read from a long-lived subprocess, typically
/// `ssh -p 29418 review.example.com gerrit stream-events`.
pub struct CommandSource {
    command: String,
}

impl CommandSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl EventSource for CommandSource {
    async fn open(&self) -> Result<Box<dyn EventStream>> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdout(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn stream command: {}", self.command))?;

        let stdout = child
            .stdout
            .take()
            .context("stream command has no stdout")?;

        Ok(Box::new(CommandStream {
            _child: child,
            lines: BufReader::new(stdout).lines(),
        }))
    }
}

struct CommandStream {
    // Held so the subprocess lives exactly as long as the stream.
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

#[async_trait]
impl EventStream for CommandStream {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }
}

/// Pulls raw records from the source and feeds them through the pipeline.
///
/// `{Connecting -> Streaming -> Reconnecting -> Connecting}`, no terminal
/// state: the listener only stops when the process does.
pub struct StreamListener {
    source: Box<dyn EventSource>,
    pipeline: Arc<Pipeline>,
    reconnect_delay: Duration,
}

impl StreamListener {
    pub fn new(source: Box<dyn EventSource>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            source,
            pipeline,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Run forever, reopening the stream after every EOF or failure.
    pub async fn run(&self) {
        loop {
            match self.source.open().await {
                Ok(mut stream) => {
                    info!("listening to event stream");
                    self.drain_stream(stream.as_mut()).await;
                }
                Err(e) => warn!(error = %e, "failed to open event stream"),
            }

            info!(
                delay_secs = self.reconnect_delay.as_secs(),
                "stream ended, reconnecting"
            );
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Consume one open stream to exhaustion.
    async fn drain_stream(&self, stream: &mut dyn EventStream) {
        loop {
            match stream.next_line().await {
                Ok(Some(line)) => self.pipeline.process_line(&line),
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "stream read failed");
                    return;
                }
            }
        }
    }
}
