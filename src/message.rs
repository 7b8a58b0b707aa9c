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

//! The GELF message model.
//!
//! A [`Message`] is one log event: six fixed fields plus any number of "additional" fields. On the
//! wire it's a flat JSON object:
//!
//! ```text
//! {"version":"1.1","host":"bree","short_message":"hi","timestamp":1499411227,"level":6,"_line":12}
//! ```
//!
//! # Encoding
//!
//! The fixed fields are serialized by [`serde`]; the additional fields are serialized separately and
//! spliced into the fixed object just before its closing brace. Pre-encoded additional fields
//! ([`Message::raw_extra`]) are spliced in the same way, after those. Nothing is ever re-parsed.
//!
//! # Decoding
//!
//! Keys beginning with `_` land in [`Message::extra`]; the six fixed keys are assigned to their
//! typed fields (a value of the wrong JSON type is an error, not silently coerced); anything else is
//! dropped, since GELF requires that additional fields be prefixed.
//!
//! Unlike some GELF libraries, integers in additional fields come back as integers: [`serde_json`]
//! keeps the distinction between `186` and `186.0`. A value written as a float is read back as a
//! float.

use crate::{
    error::{Error, Result},
    level::Level,
    origin::Origin,
};

use backtrace::Backtrace;
use bytes::BufMut;
use serde::{de::Unexpected, Deserialize, Serialize};
use serde_json::{Map, Value};

type StdResult<T, E> = std::result::Result<T, E>;

/// The GELF version we speak
pub const GELF_VERSION: &str = "1.1";

/// One GELF event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    pub version: String,
    pub host: String,
    #[serde(rename = "short_message")]
    pub short: String,
    /// Omitted from the encoding when empty
    #[serde(rename = "full_message", skip_serializing_if = "String::is_empty")]
    pub full: String,
    /// Seconds since the Unix epoch
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: f64,
    /// Omitted from the encoding when zero
    #[serde(skip_serializing_if = "Level::is_zero")]
    pub level: Level,
    /// Additional fields; keys should begin with `_`. Serialized in key order.
    #[serde(skip)]
    pub extra: Map<String, Value>,
    /// Additional fields that have already been serialized, as a JSON object
    #[serde(skip)]
    pub raw_extra: Option<Vec<u8>>,
}

/// Whole-second timestamps go out as integers (`1499411227`, not `1499411227.0`); non-finite
/// values have no JSON representation at all.
fn serialize_timestamp<S: serde::Serializer>(
    timestamp: &f64,
    serializer: S,
) -> StdResult<S::Ok, S::Error> {
    // 2^53: beyond this not every integer is representable as an f64
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if !timestamp.is_finite() {
        return Err(serde::ser::Error::custom(format!(
            "timestamp {} is not representable in JSON",
            timestamp
        )));
    }
    if timestamp.fract() == 0.0 && timestamp.abs() < MAX_EXACT {
        serializer.serialize_i64(*timestamp as i64)
    } else {
        serializer.serialize_f64(*timestamp)
    }
}

impl Message {
    /// Construct a [`Message`] with the given host & short message; the remaining fields take
    /// their defaults (no full message, the current time, [`Level::LOG_INFO`], no additional
    /// fields).
    pub fn new<H: Into<String>, S: Into<String>>(host: H, short: S) -> Message {
        Message {
            version: GELF_VERSION.to_string(),
            host: host.into(),
            short: short.into(),
            full: String::new(),
            timestamp: chrono::Utc::now().timestamp() as f64,
            level: Level::LOG_INFO,
            extra: Map::new(),
            raw_extra: None,
        }
    }

    /// Construct a [`Message`] from a chunk of text, as handed to a writer's
    /// [`std::io::Write`] implementation.
    ///
    /// Leading & trailing whitespace is removed. If what remains spans several lines, the first
    /// line becomes the short message & the whole text the full message; otherwise it's all
    /// short message. If `origin` is given, it's recorded as `_file` & `_line`.
    pub fn from_text(p: &[u8], host: &str, origin: Option<Origin>) -> Message {
        let text = String::from_utf8_lossy(p);
        let text = text.trim();

        let (short, full) = match text.find('\n') {
            Some(i) => (&text[..i], text),
            None => (text, ""),
        };

        let mut msg = Message::new(host, short).with_full(full);
        if let Some(origin) = origin {
            msg.extra.insert("_file".to_string(), Value::from(origin.file));
            msg.extra.insert("_line".to_string(), Value::from(origin.line));
        }
        msg
    }

    pub fn with_full<S: Into<String>>(mut self, full: S) -> Self {
        self.full = full.into();
        self
    }
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
    /// Add an additional field. By convention `key` should begin with `_`; that is not enforced.
    pub fn with_extra<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
    /// Attach additional fields that have already been serialized as a JSON object
    pub fn with_raw_extra<B: Into<Vec<u8>>>(mut self, raw: B) -> Self {
        self.raw_extra = Some(raw.into());
        self
    }

    /// The key/value pairs of [`Message::raw_extra`], braces removed; `None` if there's nothing
    /// to splice.
    fn raw_extra_members(&self) -> Result<Option<&[u8]>> {
        let raw = match &self.raw_extra {
            Some(raw) => trim_ascii(raw),
            None => return Ok(None),
        };
        if raw.is_empty() {
            return Ok(None);
        }
        if raw.len() < 2 || raw[0] != b'{' || raw[raw.len() - 1] != b'}' {
            return Err(Error::BadRawExtra {
                back: Backtrace::new(),
            });
        }
        let members = trim_ascii(&raw[1..raw.len() - 1]);
        Ok(if members.is_empty() {
            None
        } else {
            Some(members)
        })
    }

    /// Append the JSON encoding of this message to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        let raw_members = self.raw_extra_members()?;
        let has_extra = !self.extra.is_empty();

        let extra = if has_extra {
            Some(serde_json::to_vec(&self.extra).map_err(Error::serialization)?)
        } else {
            None
        };

        serde_json::to_writer(&mut *buf, self).map_err(Error::serialization)?;
        if extra.is_none() && raw_members.is_none() {
            return Ok(());
        }

        // The fixed-field object ends in its closing brace & nothing else; that's the splice point.
        debug_assert_eq!(buf.last(), Some(&b'}'));
        buf.truncate(buf.len() - 1);

        if let Some(extra) = extra {
            buf.put_u8(b',');
            buf.put_slice(&extra[1..extra.len() - 1]);
        }
        if let Some(members) = raw_members {
            buf.put_u8(b',');
            buf.put_slice(members);
        }
        buf.put_u8(b'}');
        Ok(())
    }

    /// The JSON encoding of this message
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Decode a GELF JSON document
    pub fn from_bytes(p: &[u8]) -> Result<Message> {
        serde_json::from_slice(p).map_err(|err| Error::Deserialization {
            source: Box::new(err),
            back: Backtrace::new(),
        })
    }
}

fn trim_ascii(mut p: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = p {
        if first.is_ascii_whitespace() {
            p = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = p {
        if last.is_ascii_whitespace() {
            p = rest;
        } else {
            break;
        }
    }
    p
}

fn unexpected(v: &Value) -> Unexpected<'_> {
    match v {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(n) => Unexpected::Float(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

fn expect_string<E: serde::de::Error>(v: Value) -> StdResult<String, E> {
    match v {
        Value::String(s) => Ok(s),
        other => Err(E::invalid_type(unexpected(&other), &"a string")),
    }
}

fn expect_number<E: serde::de::Error>(v: &Value) -> StdResult<f64, E> {
    v.as_f64()
        .ok_or_else(|| E::invalid_type(unexpected(v), &"a number"))
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> StdResult<Self, D::Error> {
        use serde::de::Error as _;

        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let mut msg = Message {
            version: String::new(),
            host: String::new(),
            short: String::new(),
            full: String::new(),
            timestamp: 0.0,
            level: Level::LOG_EMERG,
            extra: Map::new(),
            raw_extra: None,
        };
        for (k, v) in fields {
            if k.starts_with('_') {
                msg.extra.insert(k, v);
                continue;
            }
            match k.as_str() {
                "version" => msg.version = expect_string::<D::Error>(v)?,
                "host" => msg.host = expect_string::<D::Error>(v)?,
                "short_message" => msg.short = expect_string::<D::Error>(v)?,
                "full_message" => msg.full = expect_string::<D::Error>(v)?,
                "timestamp" => msg.timestamp = expect_number::<D::Error>(&v)?,
                "level" => {
                    let n = expect_number::<D::Error>(&v)?;
                    if n.fract() != 0.0 || !(0.0..=7.0).contains(&n) {
                        return Err(D::Error::invalid_value(
                            Unexpected::Float(n),
                            &"a syslog level between 0 & 7",
                        ));
                    }
                    // Range-checked above
                    msg.level = Level::try_from(n as u8).unwrap_or(Level::LOG_EMERG);
                }
                _ => (),
            }
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Message {
        Message::new("test-host", "short message")
            .with_full("full message")
            .with_timestamp(1499411227.0)
            .with_level(Level::LOG_INFO)
            .with_extra("_file", "1234")
            .with_extra("_line", "3456")
    }

    #[test]
    fn test_encoding() {
        assert_eq!(
            std::str::from_utf8(&sample().to_bytes().unwrap()).unwrap(),
            r#"{"version":"1.1","host":"test-host","short_message":"short message","full_message":"full message","timestamp":1499411227,"level":6,"_file":"1234","_line":"3456"}"#
        );
    }

    #[test]
    fn test_omit_empty_fields() {
        let msg = Message::new("h", "s")
            .with_timestamp(1.5)
            .with_level(Level::LOG_EMERG);
        assert_eq!(
            std::str::from_utf8(&msg.to_bytes().unwrap()).unwrap(),
            r#"{"version":"1.1","host":"h","short_message":"s","timestamp":1.5}"#
        );
    }

    #[test]
    fn test_raw_extra_splicing() {
        // Both sources are spliced, in order, without de-duplication
        let msg = sample().with_raw_extra(&br#" {"_file": "x", "woo": "hoo"} "#[..]);
        let text = String::from_utf8(msg.to_bytes().unwrap()).unwrap();
        assert!(text.ends_with(r#""_file":"1234","_line":"3456","_file": "x", "woo": "hoo"}"#));

        // Raw extra alone
        let mut msg = sample().with_raw_extra(&b"{\"_a\":1}"[..]);
        msg.extra.clear();
        let text = String::from_utf8(msg.to_bytes().unwrap()).unwrap();
        assert!(text.ends_with(r#""level":6,"_a":1}"#));

        // An empty object contributes nothing
        let msg = sample().with_raw_extra(&b"{ }"[..]);
        assert_eq!(msg.to_bytes().unwrap(), sample().to_bytes().unwrap());

        let msg = sample().with_raw_extra(&b"[1,2]"[..]);
        assert!(matches!(msg.to_bytes(), Err(Error::BadRawExtra { .. })));
    }

    #[test]
    fn test_unrepresentable_timestamp() {
        let msg = sample().with_timestamp(f64::NAN);
        assert!(matches!(msg.to_bytes(), Err(Error::Serialization { .. })));
        let msg = sample().with_timestamp(f64::INFINITY);
        assert!(matches!(msg.to_bytes(), Err(Error::Serialization { .. })));
    }

    #[test]
    fn test_from_text() {
        let msg = Message::from_text(b"  some awesome thing\n", "h", None);
        assert_eq!(msg.short, "some awesome thing");
        assert_eq!(msg.full, "");
        assert!(msg.extra.is_empty());

        let msg = Message::from_text(
            b"awesomesauce\nbananas",
            "h",
            Some(Origin {
                file: "main.rs".to_string(),
                line: 12,
            }),
        );
        assert_eq!(msg.short, "awesomesauce");
        assert_eq!(msg.full, "awesomesauce\nbananas");
        assert_eq!(msg.version, GELF_VERSION);
        assert_eq!(msg.level, Level::LOG_INFO);
        assert_eq!(msg.extra["_file"], Value::from("main.rs"));
        assert_eq!(msg.extra["_line"], Value::from(12));
    }

    #[test]
    fn test_round_trip() {
        let msg = Message::new("fake-host", "quick")
            .with_full("quick\nwith more detail")
            .with_timestamp(1499411227.25)
            .with_level(Level::LOG_WARNING);
        let back = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_round_trip_extra() {
        let now = chrono::Utc::now().timestamp();
        let msg = Message::new("fake-host", "quick")
            .with_extra("_a", 10 * now)
            .with_extra("C", 9)
            .with_extra("_file", "message.rs")
            .with_extra("_line", 186)
            .with_extra("_ratio", 0.5)
            .with_raw_extra(&br#"{"woo": "hoo"}"#[..]);
        let back = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();

        // "C" & "woo" aren't prefixed, and so are dropped
        assert_eq!(back.extra.len(), 4);
        assert_eq!(back.extra["_a"].as_i64(), Some(10 * now));
        assert_eq!(back.extra["_file"], Value::from("message.rs"));
        assert_eq!(back.extra["_line"].as_f64(), Some(186.0));
        assert_eq!(back.extra["_ratio"].as_f64(), Some(0.5));
    }

    #[test]
    fn test_decode_type_mismatch() {
        assert!(matches!(
            Message::from_bytes(br#"{"version":1.1,"host":"h","short_message":"s"}"#),
            Err(Error::Deserialization { .. })
        ));
        assert!(matches!(
            Message::from_bytes(br#"{"version":"1.1","timestamp":"yesterday"}"#),
            Err(Error::Deserialization { .. })
        ));
        assert!(matches!(
            Message::from_bytes(br#"{"version":"1.1","level":9}"#),
            Err(Error::Deserialization { .. })
        ));
        assert!(matches!(
            Message::from_bytes(b"[]"),
            Err(Error::Deserialization { .. })
        ));
        let msg = Message::from_bytes(br#"{"version":"1.1","level":3}"#).unwrap();
        assert_eq!(msg.level, Level::LOG_ERR);
    }
}
