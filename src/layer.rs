// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// gelf-tracing is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with gelf-tracing.  If
// not, see <http://www.gnu.org/licenses/>.

//! [gelf-tracing](crate) [`Layer`] implementation.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! [`Layer`](crate::layer::Layer) turns each [`tracing`] [`Event`] into a GELF [`Message`] & hands
//! it to a [`GelfWriter`]:
//!
//! - the event's `message` field becomes the short message (and, if it spans several lines, the
//!   full message as well)
//! - every other field becomes an additional field, named for the field with a leading `_`
//! - the level is mapped onto syslog severities ([`Level`])
//! - the event's source location & target are recorded as `_file`, `_line` & `_target`
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//!
//! Events emitted by this crate itself (target `gelf_tracing::...`) are dropped, so that a writer
//! never ends up reporting on its own failures through itself.

use crate::{
    level::Level,
    message::Message,
    origin::Origin,
    writer::GelfWriter,
};

use serde_json::{Map, Value};
use tracing::{field::Field, Event};
use tracing_subscriber::layer::Context;

// When the tracing-log feature is enabled, use NormalizeEvent to extract file/line metadata
// from events that originated from the `log` crate.
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

/// Events whose target begins with this are never forwarded
const OWN_TARGET: &str = "gelf_tracing";
const RESERVED_ID: &str = "_id";

fn default_level_mapping(level: &tracing::Level) -> Level {
    Level::from(level)
}

/// Collects an [`Event`]'s fields.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    extra: Map<String, Value>,
}

impl FieldVisitor {
    fn record_value(&mut self, field: &Field, value: Value) {
        let name = field.name();
        // Bridged `log` records carry their metadata as fields; it's picked-up from the
        // (normalized) metadata instead.
        if name.starts_with("log.") {
            return;
        }
        let mut key = if name.starts_with('_') {
            name.to_string()
        } else {
            format!("_{}", name)
        };
        // Graylog reserves `_id` & rejects messages that carry it
        if key == RESERVED_ID {
            key.insert(0, '_');
        }
        self.extra.insert(key, value);
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            // The tracing macros pre-format `message` as `std::fmt::Arguments`, whose `Debug`
            // output carries no enclosing quotes.
            self.message = Some(format!("{:?}", value));
        } else {
            self.record_value(field, Value::from(format!("{:?}", value)));
        }
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.record_value(field, Value::from(value));
        }
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, Value::from(value));
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, Value::from(value));
    }
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, Value::from(value));
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, Value::from(value));
    }
}

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that will send [`Event`]s to a
/// GELF server via any [`GelfWriter`].
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
///
/// ```rust
/// use gelf_tracing::{layer::Layer, udp::UdpWriter};
/// use tracing_subscriber::{layer::SubscriberExt, registry::Registry};
///
/// let subscriber = Registry::default()
///     .with(Layer::new(UdpWriter::new("127.0.0.1:12201").unwrap()));
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!(user = "sp1ff", "Hello, 世界!");
/// });
/// ```
pub struct Layer<W: GelfWriter> {
    writer: W,
    map_level: Box<dyn Fn(&tracing::Level) -> Level + Send + Sync>,
}

impl<W: GelfWriter> Layer<W> {
    pub fn new(writer: W) -> Self {
        Layer {
            writer,
            map_level: Box::new(default_level_mapping),
        }
    }
    /// Replace the default mapping from [`tracing`] levels to GELF (syslog) levels
    ///
    /// [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
    pub fn with_level_mapping<F>(mut self, map_level: F) -> Self
    where
        F: Fn(&tracing::Level) -> Level + Send + Sync + 'static,
    {
        self.map_level = Box::new(map_level);
        self
    }
    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn to_message(&self, event: &Event<'_>, meta: &tracing::Metadata<'_>) -> Message {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let origin = match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => Some(Origin {
                file: file.to_string(),
                line,
            }),
            _ => None,
        };
        let text = visitor.message.unwrap_or_default();
        let mut msg = Message::from_text(text.as_bytes(), self.writer.identity().host(), origin)
            .with_level((self.map_level)(meta.level()))
            .with_timestamp(chrono::Utc::now().timestamp_millis() as f64 / 1000.0)
            .with_extra("_target", meta.target());
        msg.extra.extend(visitor.extra);
        msg
    }
}

impl<S, W> tracing_subscriber::layer::Layer<S> for Layer<W>
where
    S: tracing::Subscriber,
    W: GelfWriter + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // For native tracing events, normalized_metadata() returns None and we use the event's
        // own metadata.
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        if meta.target().starts_with(OWN_TARGET) {
            return;
        }

        self.writer
            .write_message(&self.to_message(event, meta))
            .unwrap_or_else(|err| {
                ::tracing::error!("failed to send a GELF message: {}", err);
            })
    }
}

#[cfg(test)]
mod smoke {
    use super::*;

    use crate::{error::Result, origin::NoOrigin, writer::Identity};

    use tracing::{debug, error, info, warn};
    use tracing_subscriber::{
        layer::SubscriberExt, // Needed to get `with()`
        registry::Registry,
    };

    use std::sync::{Arc, Mutex};

    struct Collector {
        identity: Identity,
        sent: Mutex<Vec<Message>>,
    }

    impl Collector {
        fn new() -> Arc<Collector> {
            Arc::new(Collector {
                identity: Identity::new("bree.local", Box::new(NoOrigin)),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    impl GelfWriter for Collector {
        fn write_message(&self, msg: &Message) -> Result<()> {
            self.sent.lock().unwrap().push(msg.clone());
            Ok(())
        }
        fn identity(&self) -> &Identity {
            &self.identity
        }
    }

    #[test]
    fn test_events() {
        let collector = Collector::new();
        let subscriber = Registry::default().with(Layer::new(collector.clone()));

        tracing::subscriber::with_default(subscriber, || {
            info!(target: "my_app", answer = 42, ok = true, user = "frodo", "Hello, {}!", "世界");
            warn!(target: "my_app::db", "line one\nline two");
            debug!(target: "my_app", ratio = 0.5, "");
            // Our own diagnostics don't come back to us
            error!(target: "gelf_tracing::tcp", "write failed");
        });

        let sent = collector.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);

        assert_eq!(sent[0].host, "bree.local");
        assert_eq!(sent[0].short, "Hello, 世界!");
        assert_eq!(sent[0].full, "");
        assert_eq!(sent[0].level, Level::LOG_INFO);
        assert_eq!(sent[0].extra["_answer"], 42);
        assert_eq!(sent[0].extra["_ok"], true);
        assert_eq!(sent[0].extra["_user"], "frodo");
        assert_eq!(sent[0].extra["_target"], "my_app");
        assert!(sent[0].extra["_file"].as_str().unwrap().ends_with("layer.rs"));
        assert!(sent[0].extra["_line"].as_u64().unwrap() > 0);

        assert_eq!(sent[1].short, "line one");
        assert_eq!(sent[1].full, "line one\nline two");
        assert_eq!(sent[1].level, Level::LOG_WARNING);
        assert_eq!(sent[1].extra["_target"], "my_app::db");

        assert_eq!(sent[2].level, Level::LOG_DEBUG);
        assert_eq!(sent[2].extra["_ratio"], 0.5);
    }

    #[test]
    fn test_reserved_id_renamed() {
        let collector = Collector::new();
        let subscriber = Registry::default().with(Layer::new(collector.clone()));

        tracing::subscriber::with_default(subscriber, || {
            info!(target: "my_app", id = 7, request_id = 8, "lookup");
        });

        let sent = collector.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].extra.contains_key("_id"));
        assert_eq!(sent[0].extra["__id"], 7);
        assert_eq!(sent[0].extra["_request_id"], 8);
    }

    #[test]
    fn test_level_mapping() {
        let collector = Collector::new();
        let subscriber = Registry::default()
            .with(Layer::new(collector.clone()).with_level_mapping(|_| Level::LOG_NOTICE));

        tracing::subscriber::with_default(subscriber, || {
            error!(target: "my_app", "oops");
        });

        let sent = collector.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, Level::LOG_NOTICE);
        // Encodes cleanly, too
        let json: Value = serde_json::from_slice(&sent[0].to_bytes().unwrap()).unwrap();
        assert_eq!(json["level"], 5);
        assert_eq!(json["short_message"], "oops");
    }
}
