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

//! The GELF transport layer.
//!
//! This module defines the [`Transport`] trait through which packets (or chunks of packets) leave
//! the process, its UDP implementation, and the [`Dial`] trait with which the TCP writer
//! (re-)establishes its connection.
//!
//! # Examples
//!
//! To send GELF packets over UDP to a server listening on port 12201 (the default) on localhost:
//!
//! ```rust
//! use gelf_tracing::transport::UdpTransport;
//! let transpo = UdpTransport::local().unwrap();
//! ```
//!
//! On a non-standard port on another host:
//!
//! ```rust
//! use gelf_tracing::transport::UdpTransport;
//! let transpo = UdpTransport::new("some-host.invalid:5514");
//! assert!(transpo.is_err()); // no such host, after all
//! ```

use crate::error::{Error, Result};

use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};

/// Default GELF port, for both UDP & TCP
pub const DEFAULT_PORT: u16 = 12201;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
pub trait Transport {
    /// Send a slice of bytes on this transport mechanism as a single unit (one datagram, for UDP),
    /// returning the number of bytes accepted.
    ///
    /// Implementations should *not* loop on short writes; whether a short write is fatal is the
    /// caller's decision.
    fn send(&self, buf: &[u8]) -> Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        (**self).send(buf)
    }
}

/// Sending GELF packets via UDP datagrams.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Construct a [`Transport`] implementation via UDP at `addr`.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<UdpTransport> {
        let peer = addr
            .to_socket_addrs()
            .map_err(Error::connection)?
            .next()
            .ok_or_else(|| {
                Error::connection(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "address resolved to nothing",
                ))
            })?;
        // Bind to any available port of the same address family...
        let local: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).map_err(Error::connection)?;
        // and connect to the GELF server at `peer`:
        socket.connect(peer).map_err(Error::connection)?;
        Ok(UdpTransport { socket })
    }
    /// Construct a [`Transport`] implementation via UDP at 127.0.0.1:12201
    pub fn local() -> Result<UdpTransport> {
        UdpTransport::new((std::net::Ipv4Addr::LOCALHOST, DEFAULT_PORT))
    }
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Error::transport)
    }
}

impl Transport for UdpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        self.socket.send(buf).map_err(Error::transport)
    }
}

/// How the TCP writer obtains a stream, initially & after each failure.
///
/// The production implementation is [`TcpDialer`]; tests substitute streams that fail on cue.
pub trait Dial: Send + Sync {
    type Stream: std::io::Write + Send;
    fn dial(&self) -> std::io::Result<Self::Stream>;
}

/// Dial a fixed address over TCP
pub struct TcpDialer {
    addrs: Vec<SocketAddr>,
}

impl TcpDialer {
    /// Resolve `addr` once, up-front; each reconnection tries the same addresses.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<TcpDialer> {
        let addrs: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(Error::connection)?
            .collect();
        if addrs.is_empty() {
            return Err(Error::connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "address resolved to nothing",
            )));
        }
        Ok(TcpDialer { addrs })
    }
}

impl Dial for TcpDialer {
    type Stream = TcpStream;
    fn dial(&self) -> std::io::Result<TcpStream> {
        TcpStream::connect(&self.addrs[..])
    }
}
