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

//! A [GELF] client: encoding, compressing & chunking log messages for [Graylog], over UDP or TCP,
//! along with a [`tracing-subscriber`] [`Layer`] that sends [`tracing`] [`Event`]s the same way.
//!
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//! [Graylog]: https://graylog.org
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//!
//! # Introduction
//!
//! The Graylog Extended Log Format is a JSON document with a handful of fixed fields (`version`,
//! `host`, `short_message`, `full_message`, `timestamp` & `level`) plus any number of additional
//! fields whose names begin with an underscore. Over UDP, a message is sent as a single datagram,
//! optionally compressed; a message too large for one datagram is split into as many as 128
//! "chunks". Over TCP, messages are sent uncompressed, each terminated by a zero byte.
//!
//! This crate is organized as a pipeline:
//!
//! 1. a [`Message`](message::Message) is encoded to JSON; additional fields are spliced into the
//!    encoding of the fixed fields rather than re-serializing the whole thing
//! 2. the [`Compressor`](compress::Compressor) (optionally) compresses the result
//! 3. the [`PacketWriter`](packet::PacketWriter) decides whether the packet fits in a datagram, and
//!    if not hands it to the [chunker](chunk)
//! 4. a [`Transport`](transport::Transport) puts each datagram on the wire
//!
//! [`UdpWriter`](udp::UdpWriter) strings these together. [`TcpWriter`](tcp::TcpWriter) skips
//! steps 2 & 3, and adds a bounded reconnect-and-retry loop for when the connection drops.
//!
//! # Usage
//!
//! Both writers implement [`std::io::Write`]: each write becomes one message, its first line being
//! the short message, and its source location recorded as `_file` & `_line`:
//!
//! ```rust
//! use gelf_tracing::udp::UdpWriter;
//! use std::io::Write;
//!
//! let mut w = UdpWriter::new("127.0.0.1:12201").unwrap();
//! let _ = writeln!(w, "Hello, world!");
//! ```
//!
//! Messages may also be built directly:
//!
//! ```rust
//! use gelf_tracing::{level::Level, message::Message, udp::UdpWriter, writer::GelfWriter};
//!
//! let w = UdpWriter::new("127.0.0.1:12201").unwrap();
//! let msg = Message::new("bree.local", "disk full")
//!     .with_level(Level::LOG_CRIT)
//!     .with_extra("_mount", "/var");
//! let _ = w.write_message(&msg);
//! ```
//!
//! Or, to send [`tracing`] events to Graylog:
//!
//! ```rust
//! use gelf_tracing::{layer::Layer, udp::UdpWriter};
//! use tracing::info;
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! let subscriber = Registry::default()
//!     .with(Layer::new(UdpWriter::new("127.0.0.1:12201").unwrap()));
//! let _guard = tracing::subscriber::set_default(subscriber);
//!
//! info!(answer = 42, "Hello, world!");
//! ```
//!
//! This crate's own diagnostics are emitted through [`tracing`] under the `gelf_tracing` target;
//! the [`Layer`](layer::Layer) never forwards those.

pub mod chunk;
pub mod compress;
pub mod error;
pub mod hostname;
pub mod layer;
pub mod level;
pub mod message;
pub mod origin;
pub mod packet;
pub mod pool;
pub mod tcp;
pub mod transport;
pub mod udp;
pub mod writer;
