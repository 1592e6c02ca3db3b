//! Flush scheduler - drains the buffer on a fixed cadence and hands batches
//! to the delivery sink

use crate::buffer::NotificationBuffer;
use crate::sink::DeliverySink;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default flush period. Batching per cycle keeps the destination system's
/// message log quiet instead of posting one message per event.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// Drains the shared buffer every interval and posts one combined message
/// per destination.
pub struct FlushScheduler {
    buffer: Arc<NotificationBuffer>,
    sink: Arc<dyn DeliverySink>,
    interval: Duration,
    /// Dry-run: classify, buffer, and log, but never actually deliver.
    development: bool,
}

impl FlushScheduler {
    pub fn new(
        buffer: Arc<NotificationBuffer>,
        sink: Arc<dyn DeliverySink>,
        interval: Duration,
        development: bool,
    ) -> Self {
        Self {
            buffer,
            sink,
            interval,
            development,
        }
    }

    /// Run forever. Delivery happens strictly after the drain, so a slow
    /// sink never blocks the listener's appends.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        // First tick fires immediately; skip it so the first cycle runs a
        // full interval after startup.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One flush cycle: snapshot, log, deliver. The drain clears the buffer
    /// up front, so failed deliveries drop that cycle's batch instead of
    /// piling up.
    pub async fn run_cycle(&self) {
        let snapshot = self.buffer.drain_all();

        if snapshot.is_empty() {
            info!("buffer is empty");
            return;
        }

        info!(destinations = snapshot.len(), "flushing buffer");
        for (destination, messages) in &snapshot {
            debug!(%destination, count = messages.len(), ?messages, "pending batch");
        }

        if self.development {
            info!("development mode, skipping delivery");
            return;
        }

        for (destination, messages) in snapshot {
            let batch = messages.join("\n\n");
            if let Err(e) = self.sink.deliver(&destination, &batch).await {
                warn!(%destination, error = %e, "delivery failed, dropping batch");
            }
        }
    }
}
