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

//! What the UDP & TCP writers have in common.
//!
//! Both writers accept either a fully-formed [`Message`] (through [`GelfWriter::write_message`]) or
//! a chunk of text (through [`GelfWriter::write_text`] or their [`std::io::Write`]
//! implementations). In the latter case the message is assembled from the text, the writer's
//! [`Identity`] (host name) & the location of the caller.

use crate::{
    error::Result,
    hostname,
    message::Message,
    origin::{BacktraceResolver, OriginResolver},
};

use std::sync::Arc;

/// Who's writing: the `host` field of outgoing messages & the means of finding the caller's
/// location.
pub struct Identity {
    host: String,
    origin: Box<dyn OriginResolver>,
}

impl std::default::Default for Identity {
    /// Discover the host name; resolve callers by walking the stack.
    fn default() -> Self {
        Identity {
            host: hostname::discover_or_localhost(),
            origin: Box::new(BacktraceResolver::default()),
        }
    }
}

impl Identity {
    pub fn new<S: Into<String>>(host: S, origin: Box<dyn OriginResolver>) -> Identity {
        Identity {
            host: host.into(),
            origin,
        }
    }
    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn set_host<S: Into<String>>(&mut self, host: S) {
        self.host = host.into();
    }
    pub fn set_origin(&mut self, origin: Box<dyn OriginResolver>) {
        self.origin = origin;
    }
    /// Build a [`Message`] from `p`, stamped with our host name & the caller's location.
    pub fn message_from_text(&self, p: &[u8]) -> Message {
        Message::from_text(p, &self.host, self.origin.resolve())
    }
}

/// Operations all GELF writers support.
pub trait GelfWriter {
    /// Send `msg`, in its entirety, or fail.
    fn write_message(&self, msg: &Message) -> Result<()>;
    fn identity(&self) -> &Identity;
    /// Send `p` as a message built by [`Identity::message_from_text`]. On success, all of `p` has
    /// been consumed.
    fn write_text(&self, p: &[u8]) -> Result<usize> {
        let msg = self.identity().message_from_text(p);
        self.write_message(&msg)?;
        Ok(p.len())
    }
}

impl<W: GelfWriter + ?Sized> GelfWriter for Arc<W> {
    fn write_message(&self, msg: &Message) -> Result<()> {
        (**self).write_message(msg)
    }
    fn identity(&self) -> &Identity {
        (**self).identity()
    }
}
