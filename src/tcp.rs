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

//! Sending GELF messages over TCP.
//!
//! Each message is sent as its (uncompressed) JSON encoding followed by a single `0x00` byte. When
//! a write fails, the writer sleeps for a while, reconnects & tries again, up to a configurable
//! number of times. The whole write/reconnect sequence runs under one lock, so concurrent
//! messages never interleave on the wire.
//!
//! # Examples
//!
//! ```rust,no_run
//! use gelf_tracing::{message::Message, tcp::TcpWriter, writer::GelfWriter};
//! use std::time::Duration;
//!
//! let w = TcpWriter::builder()
//!     .max_reconnect(5)
//!     .reconnect_delay(Duration::from_millis(250))
//!     .build("graylog.local:12201")
//!     .unwrap();
//! w.write_message(&Message::new("bree.local", "Hello, world!")).unwrap();
//! ```

use crate::{
    error::{Error, Result},
    hostname,
    message::Message,
    origin::{BacktraceResolver, OriginResolver},
    transport::{Dial, TcpDialer},
    writer::{GelfWriter, Identity},
};

use backtrace::Backtrace;
use tracing::{debug, warn};

use std::{
    io::Write,
    net::ToSocketAddrs,
    sync::Mutex,
    time::Duration,
};

pub const DEFAULT_MAX_RECONNECT: usize = 3;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// The live stream (if any) & how many times it's been replaced.
struct ConnectionState<S> {
    stream: Option<S>,
    reconnects: u64,
}

/// A GELF writer over TCP.
pub struct TcpWriter<D: Dial = TcpDialer> {
    state: Mutex<ConnectionState<D::Stream>>,
    dialer: D,
    max_reconnect: usize,
    reconnect_delay: Duration,
    identity: Identity,
}

pub struct TcpWriterBuilder {
    max_reconnect: usize,
    reconnect_delay: Duration,
    host: Option<String>,
    origin: Option<Box<dyn OriginResolver>>,
}

impl TcpWriterBuilder {
    pub fn max_reconnect(mut self, max_reconnect: usize) -> Self {
        self.max_reconnect = max_reconnect;
        self
    }
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
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
    /// Connect to the GELF server at `addr`; failing to do so is an error.
    pub fn build<A: ToSocketAddrs>(self, addr: A) -> Result<TcpWriter> {
        self.build_with_dialer(TcpDialer::new(addr)?)
    }
    /// Connect using `dialer`, which will also be used for each reconnection.
    pub fn build_with_dialer<D: Dial>(self, dialer: D) -> Result<TcpWriter<D>> {
        let stream = dialer.dial().map_err(Error::connection)?;
        Ok(TcpWriter {
            state: Mutex::new(ConnectionState {
                stream: Some(stream),
                reconnects: 0,
            }),
            dialer,
            max_reconnect: self.max_reconnect,
            reconnect_delay: self.reconnect_delay,
            identity: Identity::new(
                self.host.unwrap_or_else(hostname::discover_or_localhost),
                self.origin
                    .unwrap_or_else(|| Box::new(BacktraceResolver::default())),
            ),
        })
    }
}

impl TcpWriter {
    pub fn builder() -> TcpWriterBuilder {
        TcpWriterBuilder {
            max_reconnect: DEFAULT_MAX_RECONNECT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            host: None,
            origin: None,
        }
    }
    /// A writer with the default settings, connected to `addr`
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<TcpWriter> {
        TcpWriter::builder().build(addr)
    }
}

/// Like [`Write::write_all`], but report how far we got before failing.
fn write_counting<S: Write>(stream: &mut S, p: &[u8]) -> (usize, std::io::Result<()>) {
    let mut written = 0;
    while written < p.len() {
        match stream.write(&p[written..]) {
            Ok(0) => {
                return (
                    written,
                    Err(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    )),
                )
            }
            Ok(n) => written += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return (written, Err(err)),
        }
    }
    (written, Ok(()))
}

impl<D: Dial> TcpWriter<D> {
    /// The number of times this writer has successfully reconnected
    pub fn reconnect_count(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .reconnects
    }

    /// Write `p` to the current connection, reconnecting & retrying on failure.
    ///
    /// Every failed write is followed by a reconnection, so a half-written frame never stays on
    /// the live connection. The write is then retried while the failed attempt wrote no more than
    /// `max_reconnect` bytes, with at most `max_reconnect + 1` writes in all. A write that fails
    /// part-way through (beyond that many bytes) is therefore not retried; the partial count is
    /// returned for the caller to deal with. If the last reconnection failed, both errors are
    /// reported.
    pub fn write_with_reconnect(&self, p: &[u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut attempts = 0;
        let mut written;
        let mut write_err;
        let mut reconnect_err: Option<std::io::Error> = None;
        loop {
            let (n, res) = match state.stream.as_mut() {
                Some(stream) => write_counting(stream, p),
                None => (
                    0,
                    Err(std::io::Error::new(
                        std::io::ErrorKind::NotConnected,
                        "no connection",
                    )),
                ),
            };
            written = n;
            match res {
                Ok(()) => {
                    write_err = None;
                    break;
                }
                Err(err) => write_err = Some(err),
            }

            attempts += 1;
            std::thread::sleep(self.reconnect_delay);
            match self.dialer.dial() {
                Ok(stream) => {
                    *state = ConnectionState {
                        stream: Some(stream),
                        reconnects: state.reconnects + 1,
                    };
                    reconnect_err = None;
                }
                Err(err) => {
                    state.stream = None;
                    reconnect_err = Some(err);
                }
            }

            if written > self.max_reconnect || attempts > self.max_reconnect {
                break;
            }
        }
        drop(state);

        match (write_err, reconnect_err) {
            (None, _) => {
                if attempts > 0 {
                    debug!("wrote {} bytes after {} reconnection(s)", written, attempts);
                }
                Ok(written)
            }
            (Some(write), Some(reconnect)) => {
                warn!(
                    "write failed ({}); reconnection failed ({}) after {} attempt(s)",
                    write, reconnect, attempts
                );
                Err(Error::Reconnect {
                    write: Box::new(write),
                    reconnect: Box::new(reconnect),
                    back: Backtrace::new(),
                })
            }
            (Some(write), None) => {
                warn!(
                    "write failed after {} of {} bytes ({}); giving up",
                    written,
                    p.len(),
                    write
                );
                if written > 0 {
                    Ok(written)
                } else {
                    Err(Error::transport(write))
                }
            }
        }
    }
}

impl<D: Dial> GelfWriter for TcpWriter<D> {
    /// Send `msg` as null-terminated JSON.
    fn write_message(&self, msg: &Message) -> Result<()> {
        let mut frame = msg.to_bytes()?;
        frame.push(0);

        let written = self.write_with_reconnect(&frame)?;
        if written != frame.len() {
            return Err(Error::ShortWrite {
                written,
                expected: frame.len(),
                back: Backtrace::new(),
            });
        }
        Ok(())
    }
    fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl<D: Dial> std::io::Write for TcpWriter<D> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.write_text(buf)?)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod smoke {
    use super::*;

    use crate::{level::Level, origin::NoOrigin};

    use std::{
        collections::VecDeque,
        io::Read,
        net::TcpListener,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    /// A stream that fails its first `failures` writes, then accepts everything (or only
    /// `accept` bytes per stream, if set, failing thereafter).
    struct ScriptedStream {
        failures: usize,
        accept: Option<usize>,
        sink: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            let n = match self.accept {
                Some(0) => return Err(std::io::ErrorKind::ConnectionReset.into()),
                Some(m) => m.min(buf.len()),
                None => buf.len(),
            };
            if let Some(m) = self.accept.as_mut() {
                *m -= n;
            }
            self.sink.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Hands out the scripted results of successive dials, in order.
    struct ScriptedDialer {
        script: Mutex<VecDeque<std::io::Result<ScriptedStream>>>,
        dials: AtomicUsize,
    }

    impl ScriptedDialer {
        fn new(script: Vec<std::io::Result<ScriptedStream>>) -> ScriptedDialer {
            ScriptedDialer {
                script: Mutex::new(script.into()),
                dials: AtomicUsize::new(0),
            }
        }
    }

    impl Dial for ScriptedDialer {
        type Stream = ScriptedStream;
        fn dial(&self) -> std::io::Result<ScriptedStream> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(std::io::ErrorKind::ConnectionRefused.into()))
        }
    }

    fn stream(failures: usize, sink: &Arc<Mutex<Vec<u8>>>) -> std::io::Result<ScriptedStream> {
        Ok(ScriptedStream {
            failures,
            accept: None,
            sink: sink.clone(),
        })
    }

    fn writer(dialer: ScriptedDialer) -> TcpWriter<ScriptedDialer> {
        TcpWriter::builder()
            .reconnect_delay(Duration::from_millis(0))
            .host("bree.local")
            .origin(Box::new(NoOrigin))
            .build_with_dialer(dialer)
            .unwrap()
    }

    #[test]
    fn test_reconnect_then_succeed() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let w = writer(ScriptedDialer::new(vec![
            stream(1, &first),
            stream(0, &second),
        ]));

        let msg = Message::new("bree.local", "Hello, world!").with_timestamp(1499411227.0);
        w.write_message(&msg).unwrap();
        assert_eq!(w.reconnect_count(), 1);
        assert_eq!(w.dialer.dials.load(Ordering::SeqCst), 2);

        assert!(first.lock().unwrap().is_empty());
        let mut expected = msg.to_bytes().unwrap();
        expected.push(0);
        assert_eq!(*second.lock().unwrap(), expected);
    }

    #[test]
    fn test_reconnect_fails() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let w = TcpWriter::builder()
            .max_reconnect(2)
            .reconnect_delay(Duration::from_millis(0))
            .host("bree.local")
            .build_with_dialer(ScriptedDialer::new(vec![stream(usize::MAX, &sink)]))
            .unwrap();

        assert!(matches!(
            w.write_message(&Message::new("bree.local", "Hello, world!")),
            Err(Error::Reconnect { .. })
        ));
        // The initial connection, plus a redial after each of the three failed writes
        assert_eq!(w.dialer.dials.load(Ordering::SeqCst), 4);
        assert_eq!(w.reconnect_count(), 0);
        assert!(sink.lock().unwrap().is_empty());
    }

    #[test]
    fn test_partial_write_not_retried() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let w = writer(ScriptedDialer::new(vec![
            Ok(ScriptedStream {
                failures: 0,
                accept: Some(10),
                sink: first.clone(),
            }),
            stream(0, &second),
        ]));

        assert!(matches!(
            w.write_message(&Message::new("bree.local", "Hello, world!")),
            Err(Error::ShortWrite { written: 10, .. })
        ));
        // The broken connection was replaced, even though the write wasn't retried...
        assert_eq!(w.dialer.dials.load(Ordering::SeqCst), 2);
        assert_eq!(w.reconnect_count(), 1);
        assert_eq!(first.lock().unwrap().len(), 10);
        assert!(second.lock().unwrap().is_empty());

        // so the next message starts on a clean stream.
        let msg = Message::new("bree.local", "second").with_timestamp(1499411227.0);
        w.write_message(&msg).unwrap();
        assert_eq!(first.lock().unwrap().len(), 10);
        let sent = second.lock().unwrap();
        assert_eq!(sent.last(), Some(&0));
        assert_eq!(Message::from_bytes(&sent[..sent.len() - 1]).unwrap(), msg);
    }

    #[test]
    fn test_no_retries_still_reconnects() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let w = TcpWriter::builder()
            .max_reconnect(0)
            .reconnect_delay(Duration::from_millis(0))
            .host("bree.local")
            .origin(Box::new(NoOrigin))
            .build_with_dialer(ScriptedDialer::new(vec![
                stream(usize::MAX, &first),
                stream(0, &second),
            ]))
            .unwrap();

        assert!(matches!(
            w.write_message(&Message::new("bree.local", "lost")),
            Err(Error::Transport { .. })
        ));
        assert_eq!(w.dialer.dials.load(Ordering::SeqCst), 2);
        assert_eq!(w.reconnect_count(), 1);

        w.write_message(&Message::new("bree.local", "delivered"))
            .unwrap();
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().last(), Some(&0));
    }

    #[test]
    fn test_initial_connection_fails() {
        assert!(matches!(
            TcpWriter::builder().build_with_dialer(ScriptedDialer::new(vec![])),
            Err(Error::Connection { .. })
        ));
    }

    #[test]
    fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut w = TcpWriter::builder()
            .host("bree.local")
            .origin(Box::new(NoOrigin))
            .build(listener.local_addr().unwrap())
            .unwrap();
        let (mut conn, _) = listener.accept().unwrap();

        let msg = Message::new("bree.local", "short message")
            .with_full("full message")
            .with_level(Level::LOG_WARNING)
            .with_extra("_k", "v");
        w.write_message(&msg).unwrap();
        w.write_all(b"second\nmessage").unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        while received.iter().filter(|&&b| b == 0).count() < 2 {
            let n = conn.read(&mut buf).unwrap();
            assert!(n > 0);
            received.extend_from_slice(&buf[..n]);
        }
        let frames: Vec<&[u8]> = received.split(|&b| b == 0).collect();
        assert_eq!(Message::from_bytes(frames[0]).unwrap(), msg);
        let second = Message::from_bytes(frames[1]).unwrap();
        assert_eq!(second.short, "second");
        assert_eq!(second.full, "second\nmessage");
        assert_eq!(w.reconnect_count(), 0);
    }
}
