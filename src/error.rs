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

//! [gelf-tracing](crate) errors

use backtrace::Backtrace;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// [gelf-tracing](crate) error type
///
/// A straightforward enumeration with match arms chosen on the basis of what the caller will need
/// to respond. Every error aborts the send attempt during which it occurred; nothing here is
/// retried on the caller's behalf save for the write/reconnect pair in
/// [`TcpWriter`](crate::tcp::TcpWriter).
#[non_exhaustive]
pub enum Error {
    /// A compression selector named no known algorithm
    UnknownCompression { selector: String, back: Backtrace },
    /// A compression level outside the DEFLATE range (-1 for the default, else 0 through 9)
    BadCompressionLevel { level: i32, back: Backtrace },
    /// A message could not be represented as JSON
    Serialization { source: BoxedError, back: Backtrace },
    /// The DEFLATE encoder failed
    Compression { source: BoxedError, back: Backtrace },
    /// The pre-encoded extra fields were not a JSON object
    BadRawExtra { back: Backtrace },
    /// A GELF document could not be decoded into a message
    Deserialization { source: BoxedError, back: Backtrace },
    /// The packet would need more than 128 chunks
    Oversize { chunks: usize, back: Backtrace },
    /// A single write call accepted fewer bytes than requested
    ShortWrite {
        written: usize,
        expected: usize,
        back: Backtrace,
    },
    /// A chunked send finished with bytes unaccounted for; this is a bug in the framer
    ChunkAccounting { remaining: usize, back: Backtrace },
    /// The random source could not produce a message identifier
    RandomSource { source: BoxedError, back: Backtrace },
    /// Failed to establish a connection
    Connection { source: BoxedError, back: Backtrace },
    /// A write failed, and so did the last attempt to reconnect
    Reconnect {
        write: BoxedError,
        reconnect: BoxedError,
        back: Backtrace,
    },
    /// General transport layer error
    Transport { source: BoxedError, back: Backtrace },
    /// Failed to fetch the hostname (via libc) and could not fall back to an IP address
    NoHostname { source: BoxedError, back: Backtrace },
}

impl Error {
    pub(crate) fn serialization(err: serde_json::Error) -> Error {
        Error::Serialization {
            source: Box::new(err),
            back: Backtrace::new(),
        }
    }
    pub(crate) fn compression(err: std::io::Error) -> Error {
        Error::Compression {
            source: Box::new(err),
            back: Backtrace::new(),
        }
    }
    pub(crate) fn transport(err: std::io::Error) -> Error {
        Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        }
    }
    pub(crate) fn connection(err: std::io::Error) -> Error {
        Error::Connection {
            source: Box::new(err),
            back: Backtrace::new(),
        }
    }
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::UnknownCompression { selector, .. } => {
                write!(f, "Unknown compression type {}", selector)
            }
            Error::BadCompressionLevel { level, .. } => {
                write!(f, "Invalid compression level {} (expected -1..=9)", level)
            }
            Error::Serialization { source, .. } => {
                write!(f, "While encoding a GELF message, got {}", source)
            }
            Error::Compression { source, .. } => write!(f, "Compression failed: {}", source),
            Error::BadRawExtra { .. } => {
                write!(f, "Pre-encoded extra fields must be a JSON object")
            }
            Error::Deserialization { source, .. } => {
                write!(f, "While decoding a GELF message, got {}", source)
            }
            Error::Oversize { chunks, .. } => {
                write!(f, "msg too large, would need {} chunks", chunks)
            }
            Error::ShortWrite {
                written, expected, ..
            } => write!(f, "bad write ({}/{})", written, expected),
            Error::ChunkAccounting { remaining, .. } => {
                write!(f, "{} bytes left after sending", remaining)
            }
            Error::RandomSource { source, .. } => {
                write!(f, "Failed to read a random message id: {}", source)
            }
            Error::Connection { source, .. } => write!(f, "Connection failed: {}", source),
            Error::Reconnect {
                write, reconnect, ..
            } => write!(
                f,
                "Write failed: {}; reconnection failed: {}",
                write, reconnect
            ),
            Error::Transport { source, .. } => write!(f, "Transport error: {}", source),
            Error::NoHostname { source, .. } => {
                write!(f, "Couldn't determine a hostname: {}", source)
            }
            _ => write!(f, "Other gelf-tracing error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::UnknownCompression { back, .. }
            | Error::BadCompressionLevel { back, .. }
            | Error::Serialization { back, .. }
            | Error::Compression { back, .. }
            | Error::BadRawExtra { back }
            | Error::Deserialization { back, .. }
            | Error::Oversize { back, .. }
            | Error::ShortWrite { back, .. }
            | Error::ChunkAccounting { back, .. }
            | Error::RandomSource { back, .. }
            | Error::Connection { back, .. }
            | Error::Reconnect { back, .. }
            | Error::Transport { back, .. }
            | Error::NoHostname { back, .. } => write!(f, "{}\n{:?}", self, back),
            err => write!(f, "gelf-tracing error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl std::convert::From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
