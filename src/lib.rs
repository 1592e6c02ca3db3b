//! Gerrit Notifier - watch a Gerrit review-event stream and post batched
//! notifications to Slack channels

pub mod buffer;
pub mod classify;
pub mod config;
pub mod event;
pub mod flush;
pub mod listener;
pub mod pipeline;
pub mod routing;
pub mod sink;

pub use buffer::NotificationBuffer;
pub use classify::{classify, Audience, Notification, Rule};
pub use config::{development_mode, Config};
pub use event::{escape_markup, Event, EventKind, RawEvent};
pub use flush::{FlushScheduler, DEFAULT_FLUSH_INTERVAL};
pub use listener::{CommandSource, EventSource, EventStream, StreamListener, RECONNECT_DELAY};
pub use pipeline::Pipeline;
pub use routing::{ChannelMap, ChannelRule, Routing};
pub use sink::{DeliverySink, SlackWebhook};
