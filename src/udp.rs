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

//! Sending GELF messages over UDP.
//!
//! Each message is encoded, compressed (gzip by default, at [`BEST_SPEED`]) and sent as a single
//! datagram if it fits, or as up to 128 [chunks](crate::chunk) if it doesn't. There is no
//! retry; a failed send loses the message.
//!
//! # Examples
//!
//! ```rust
//! use gelf_tracing::{compress::CompressType, udp::UdpWriter};
//! use std::io::Write;
//!
//! let mut w = UdpWriter::builder()
//!     .compression(CompressType::Zlib)
//!     .host("bree.local")
//!     .build("127.0.0.1:12201")
//!     .unwrap();
//! // Nobody's listening, but then UDP doesn't care.
//! let _ = w.write_all(b"Hello, world!");
//! ```

use crate::{
    compress::{CompressType, Compressor, BEST_SPEED},
    error::Result,
    hostname,
    message::Message,
    origin::{BacktraceResolver, OriginResolver},
    packet::PacketWriter,
    transport::UdpTransport,
    writer::{GelfWriter, Identity},
};

use std::net::{SocketAddr, ToSocketAddrs};

/// A GELF writer over UDP.
pub struct UdpWriter {
    transport: UdpTransport,
    packet_writer: PacketWriter,
    identity: Identity,
}

pub struct UdpWriterBuilder {
    compression: CompressType,
    compression_level: i32,
    host: Option<String>,
    origin: Option<Box<dyn OriginResolver>>,
}

impl UdpWriterBuilder {
    pub fn compression(mut self, compression: CompressType) -> Self {
        self.compression = compression;
        self
    }
    /// -1 for the DEFLATE default, else 0-9; checked in [`build`](UdpWriterBuilder::build)
    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }
    /// Override the discovered host name
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }
    pub fn origin(mut self, origin: Box<dyn OriginResolver>) -> Self {
        self.origin = Some(origin);
        self
    }
    /// Bind a local socket & connect it to the GELF server at `addr`.
    pub fn build<A: ToSocketAddrs>(self, addr: A) -> Result<UdpWriter> {
        let compressor = Compressor::new(self.compression, self.compression_level)?;
        let transport = UdpTransport::new(addr)?;
        Ok(UdpWriter {
            transport,
            packet_writer: PacketWriter::new(compressor),
            identity: Identity::new(
                self.host.unwrap_or_else(hostname::discover_or_localhost),
                self.origin
                    .unwrap_or_else(|| Box::new(BacktraceResolver::default())),
            ),
        })
    }
}

impl UdpWriter {
    pub fn builder() -> UdpWriterBuilder {
        UdpWriterBuilder {
            compression: CompressType::Gzip,
            compression_level: BEST_SPEED,
            host: None,
            origin: None,
        }
    }
    /// A writer with the default settings, sending to `addr`
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<UdpWriter> {
        UdpWriter::builder().build(addr)
    }
    pub fn compressor(&self) -> &Compressor {
        self.packet_writer.compressor()
    }
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }
}

impl GelfWriter for UdpWriter {
    fn write_message(&self, msg: &Message) -> Result<()> {
        self.packet_writer.write_message(&self.transport, msg)
    }
    fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl std::io::Write for UdpWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.write_text(buf)?)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
