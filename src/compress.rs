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

//! Compressing GELF packets.
//!
//! Graylog accepts UDP packets that are raw JSON, zlib-compressed or gzip-compressed (it sniffs the
//! first two bytes). This module decides *whether* & *how hard* to compress; the DEFLATE work itself
//! is [`flate2`]'s.
//!
//! [`flate2`]: https://docs.rs/flate2
//!
//! Note that [`CompressType::Gzip`] currently produces a zlib-framed stream, exactly as
//! [`CompressType::Zlib`] does. Graylog accepts either, and existing deployments have come to rely
//! on the framing actually sent, so this is preserved.

use crate::error::{Error, Result};

use backtrace::Backtrace;
use flate2::{write::ZlibEncoder, Compression};

type StdResult<T, E> = std::result::Result<T, E>;

/// What compression the writer should use when sending messages to the Graylog server
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CompressType {
    /// "gzip"-- zlib framing, in practice
    #[default]
    Gzip,
    Zlib,
    /// Send the JSON as-is
    None,
}

impl std::fmt::Display for CompressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                CompressType::Gzip => "gzip",
                CompressType::Zlib => "zlib",
                CompressType::None => "none",
            }
        )
    }
}

impl std::str::FromStr for CompressType {
    type Err = Error;
    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" => Ok(CompressType::Gzip),
            "zlib" => Ok(CompressType::Zlib),
            "none" => Ok(CompressType::None),
            _ => Err(Error::UnknownCompression {
                selector: s.to_string(),
                back: Backtrace::new(),
            }),
        }
    }
}

/// The numeric selectors used by other GELF clients: 0 for gzip, 1 for zlib & 2 for none.
impl std::convert::TryFrom<u8> for CompressType {
    type Error = Error;
    fn try_from(x: u8) -> StdResult<Self, Self::Error> {
        match x {
            0 => Ok(CompressType::Gzip),
            1 => Ok(CompressType::Zlib),
            2 => Ok(CompressType::None),
            n => Err(Error::UnknownCompression {
                selector: n.to_string(),
                back: Backtrace::new(),
            }),
        }
    }
}

/// Use the DEFLATE implementation's default level
pub const DEFAULT_COMPRESSION: i32 = -1;
/// Store, don't compress
pub const NO_COMPRESSION: i32 = 0;
pub const BEST_SPEED: i32 = 1;
pub const BEST_COMPRESSION: i32 = 9;

/// An algorithm & a level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Compressor {
    kind: CompressType,
    level: i32,
}

impl std::default::Default for Compressor {
    /// gzip (or what passes for it) at [`BEST_SPEED`]
    fn default() -> Self {
        Compressor {
            kind: CompressType::Gzip,
            level: BEST_SPEED,
        }
    }
}

fn check_level(level: i32) -> Result<Compression> {
    match level {
        DEFAULT_COMPRESSION => Ok(Compression::default()),
        NO_COMPRESSION..=BEST_COMPRESSION => Ok(Compression::new(level as u32)),
        _ => Err(Error::BadCompressionLevel {
            level,
            back: Backtrace::new(),
        }),
    }
}

impl Compressor {
    /// `level` is [`DEFAULT_COMPRESSION`], or 0 ([`NO_COMPRESSION`]) through 9
    /// ([`BEST_COMPRESSION`]); anything else is refused here, rather than on first use.
    pub fn new(kind: CompressType, level: i32) -> Result<Compressor> {
        check_level(level)?;
        Ok(Compressor { kind, level })
    }
    pub fn kind(&self) -> CompressType {
        self.kind
    }
    pub fn level(&self) -> i32 {
        self.level
    }
    /// Wrap `sink` in a streaming compressor, or return `None` if this [`Compressor`] doesn't
    /// compress-- in which case the caller should write to `sink` directly.
    ///
    /// The caller must [`finish`](ZlibEncoder::finish) the returned encoder, on every path, before
    /// looking at what's been written to `sink`; until then output may still be buffered.
    pub fn writer<W: std::io::Write>(&self, sink: W) -> Result<Option<ZlibEncoder<W>>> {
        let level = check_level(self.level)?;
        match self.kind {
            CompressType::Gzip | CompressType::Zlib => Ok(Some(ZlibEncoder::new(sink, level))),
            CompressType::None => Ok(None),
        }
    }
}
