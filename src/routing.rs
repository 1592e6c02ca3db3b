//! Destination routing - decides which channels care about an event and how
//! messages are rendered per destination

use serde::Deserialize;
use std::collections::BTreeMap;

/// Routing collaborator consumed by the pipeline.
///
/// Destination identifiers are opaque to the rest of the system: channels
/// carry a `#` prefix, direct-message aliases an `@` prefix.
pub trait Routing: Send + Sync {
    /// Every broadcast channel, for system-wide announcements.
    fn all_broadcast_destinations(&self) -> Vec<String>;

    /// Channels subscribed to a project or a change owner. Empty means
    /// nobody cares about this event.
    fn destinations_for(&self, project: &str, owner: &str) -> Vec<String>;

    /// Render a message for one destination, applying any decoration.
    fn format(&self, destination: &str, text: &str, decoration: Option<&str>) -> String;

    /// Direct-message destination for a change owner's display name.
    fn direct_destination_for(&self, owner: &str) -> String;
}

/// One channel's subscription rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelRule {
    /// Projects this channel follows.
    #[serde(default)]
    pub projects: Vec<String>,
    /// Change owners this channel follows regardless of project.
    #[serde(default)]
    pub owners: Vec<String>,
}

/// Config-backed routing table.
///
/// BTreeMap keeps destination ordering deterministic, which the tests and
/// the flush logs both rely on.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    channels: BTreeMap<String, ChannelRule>,
    users: BTreeMap<String, String>,
}

impl ChannelMap {
    pub fn new(
        channels: BTreeMap<String, ChannelRule>,
        users: BTreeMap<String, String>,
    ) -> Self {
        Self { channels, users }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Routing for ChannelMap {
    fn all_broadcast_destinations(&self) -> Vec<String> {
        self.channels.keys().map(|name| format!("#{name}")).collect()
    }

    fn destinations_for(&self, project: &str, owner: &str) -> Vec<String> {
        self.channels
            .iter()
            .filter(|(_, rule)| {
                rule.projects.iter().any(|p| p == project)
                    || rule.owners.iter().any(|o| o == owner)
            })
            .map(|(name, _)| format!("#{name}"))
            .collect()
    }

    fn format(&self, _destination: &str, text: &str, decoration: Option<&str>) -> String {
        match decoration {
            Some(decoration) if !decoration.is_empty() => format!("{decoration} {text}"),
            _ => text.to_string(),
        }
    }

    fn direct_destination_for(&self, owner: &str) -> String {
        let handle = self.users.get(owner).map(String::as_str).unwrap_or(owner);
        format!("@{handle}")
    }
}
