//! Notification pipeline - routes classified events into the shared buffer

use crate::buffer::NotificationBuffer;
use crate::classify::{classify, Audience, Notification};
use crate::event::Event;
use crate::routing::Routing;
use std::sync::Arc;
use tracing::{debug, warn};

/// Glue between the classifier, the routing table, and the buffer.
///
/// Constructed once at startup and handed to the stream listener; holds no
/// mutable state of its own.
pub struct Pipeline {
    routing: Arc<dyn Routing>,
    buffer: Arc<NotificationBuffer>,
    development: bool,
}

impl Pipeline {
    pub fn new(
        routing: Arc<dyn Routing>,
        buffer: Arc<NotificationBuffer>,
        development: bool,
    ) -> Self {
        Self {
            routing,
            buffer,
            development,
        }
    }

    pub fn buffer(&self) -> &Arc<NotificationBuffer> {
        &self.buffer
    }

    /// Handle one raw stream line. A malformed line is logged and skipped;
    /// it never takes the stream down.
    pub fn process_line(&self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        match Event::parse(trimmed) {
            Ok(event) => self.process(&event),
            Err(e) => warn!(error = %e, "skipping malformed event line"),
        }
    }

    /// Classify one event and queue every resulting notification.
    pub fn process(&self, event: &Event) {
        if self.development {
            debug!(?event, "incoming event");
        }

        let project = event.project().unwrap_or("");
        let owner = event.owner().unwrap_or("");

        // Nobody subscribed to this project/owner: skip classification
        // entirely rather than classify into the void.
        let destinations = self.routing.destinations_for(project, owner);
        if destinations.is_empty() {
            debug!(project, owner, "no destinations, skipping event");
            return;
        }

        for notification in classify(event) {
            self.enqueue(&destinations, notification);
        }
    }

    fn enqueue(&self, destinations: &[String], notification: Notification) {
        match notification.audience {
            Audience::Broadcast => {
                for destination in destinations {
                    let text = self.routing.format(
                        destination,
                        &notification.text,
                        notification.decoration.as_deref(),
                    );
                    self.buffer.append(destination.clone(), text);
                }
            }
            Audience::Direct(ref owner) => {
                let destination = self.routing.direct_destination_for(owner);
                self.buffer.append(destination, notification.text.clone());
            }
        }
    }

    /// System-wide announcement to every broadcast channel.
    pub fn announce(&self, text: &str) {
        for destination in self.routing.all_broadcast_destinations() {
            let formatted = self.routing.format(&destination, text, None);
            self.buffer.append(destination, formatted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{ChannelMap, ChannelRule};
    use std::collections::BTreeMap;

    fn pipeline() -> Pipeline {
        let mut channels = BTreeMap::new();
        channels.insert(
            "backend".to_string(),
            ChannelRule {
                projects: vec!["api".to_string()],
                owners: vec![],
            },
        );
        let mut users = BTreeMap::new();
        users.insert("Kim Park".to_string(), "kim".to_string());

        Pipeline::new(
            Arc::new(ChannelMap::new(channels, users)),
            Arc::new(NotificationBuffer::new()),
            false,
        )
    }

    #[test]
    fn test_unrouted_event_leaves_buffer_untouched() {
        let p = pipeline();
        p.process_line(
            r#"{"type": "change-merged",
                "change": {"project": "unsubscribed", "subject": "x", "url": "http://g/1",
                           "owner": {"name": "Kim Park"}}}"#,
        );
        assert!(p.buffer().is_empty());
    }

    #[test]
    fn test_broadcast_lands_in_every_subscribed_channel() {
        let p = pipeline();
        p.process_line(
            r#"{"type": "change-merged",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim Park"}}}"#,
        );

        let snapshot = p.buffer().drain_all();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot["#backend"][0].contains("was merged!"));
    }

    #[test]
    fn test_direct_notification_goes_to_owner_alias() {
        let p = pipeline();
        p.process_line(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim Park"}},
                "author": {"name": "Hudson CI", "username": "hudson"},
                "comment": "Patch Set 1: Build Failed"}"#,
        );

        let snapshot = p.buffer().drain_all();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot["@kim"][0].contains("*failed* on CI"));
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let p = pipeline();
        p.process_line("{{{{ definitely not json");
        p.process_line("");
        assert!(p.buffer().is_empty());
    }

    #[test]
    fn test_announce_reaches_all_channels() {
        let p = pipeline();
        p.announce("maintenance window at noon");

        let snapshot = p.buffer().drain_all();
        assert_eq!(snapshot["#backend"], vec!["maintenance window at noon"]);
    }
}
