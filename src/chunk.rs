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

//! GELF chunking.
//!
//! A packet too large for one datagram is split into (at most 128) chunks, each prefixed by a
//! twelve byte header. The format is documented [here] as:
//!
//! [here]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//!
//! ```text
//! +--------+--------+------------------+--------+--------+----------------
//! | 0x1e   | 0x0f   | message id (8)   | seq    | total  | chunk data...
//! +--------+--------+------------------+--------+--------+----------------
//! ```
//!
//! The message id is drawn from the OS' CSPRNG, once per packet. Every field is a single byte or an
//! opaque blob, so byte order never comes into it.

use crate::{
    error::{Error, Result},
    transport::Transport,
};

use backtrace::Backtrace;
use bytes::BufMut;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use tracing::trace;

/// Packets up to this size go out whole. Should be less than (MTU - len(UDP header)).
pub const CHUNK_SIZE: usize = 1420;
pub const CHUNKED_HEADER_LEN: usize = 12;
/// The chunk data each chunk carries (all but the last, that is)
pub const CHUNKED_DATA_LEN: usize = CHUNK_SIZE - CHUNKED_HEADER_LEN;
/// Graylog discards packets with more chunks than this
pub const MAX_CHUNKS: usize = 128;
pub const MAGIC_CHUNKED: [u8; 2] = [0x1e, 0x0f];

/// The number of GELF chunks needed to transmit a packet of `len` bytes.
///
/// Note that when `len` exceeds [`CHUNK_SIZE`] and is an exact multiple of [`CHUNKED_DATA_LEN`],
/// this comes out one greater than strictly necessary, and the final chunk carries a header and no
/// data. Receivers in the wild cope, so the arithmetic is left as-is.
pub fn num_chunks(len: usize) -> usize {
    if len <= CHUNK_SIZE {
        1
    } else {
        len / CHUNKED_DATA_LEN + 1
    }
}

/// The eight-byte identifier shared by all chunks of one packet
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub [u8; 8]);

impl MessageId {
    /// Draw a fresh id from the operating system's random source
    pub fn generate() -> Result<MessageId> {
        MessageId::generate_from(&mut OsRng)
    }
    /// Draw a fresh id from `rng`; failing to fill all eight bytes is an error, never papered
    /// over.
    pub fn generate_from<R: RngCore + CryptoRng>(rng: &mut R) -> Result<MessageId> {
        let mut id = [0u8; 8];
        rng.try_fill_bytes(&mut id)
            .map_err(|err| Error::RandomSource {
                source: Box::new(err),
                back: Backtrace::new(),
            })?;
        Ok(MessageId(id))
    }
}

/// Write `packet` to `transport` as a series of GELF chunks, one [`Transport::send`] per chunk.
///
/// Fails without sending anything if more than [`MAX_CHUNKS`] chunks would be needed. Any failed
/// or short send aborts the whole packet; since receivers discard incomplete packets, there is no
/// point in carrying on.
pub fn write_chunked<T: Transport + ?Sized>(transport: &T, packet: &[u8]) -> Result<()> {
    write_chunked_with(transport, packet, &mut OsRng)
}

pub(crate) fn write_chunked_with<T, R>(transport: &T, packet: &[u8], rng: &mut R) -> Result<()>
where
    T: Transport + ?Sized,
    R: RngCore + CryptoRng,
{
    let n_chunks = num_chunks(packet.len());
    if n_chunks > MAX_CHUNKS {
        return Err(Error::Oversize {
            chunks: n_chunks,
            back: Backtrace::new(),
        });
    }
    let msg_id = MessageId::generate_from(rng)?;
    trace!(
        "sending {} bytes in {} chunks (id {:02x?})",
        packet.len(),
        n_chunks,
        msg_id.0
    );

    let mut chunk = Vec::with_capacity(CHUNK_SIZE);
    let mut bytes_left = packet.len();
    for seq in 0..n_chunks {
        chunk.clear();
        chunk.put_slice(&MAGIC_CHUNKED);
        chunk.put_slice(&msg_id.0);
        chunk.put_u8(seq as u8);
        chunk.put_u8(n_chunks as u8);

        let chunk_len = std::cmp::min(CHUNKED_DATA_LEN, bytes_left);
        let off = seq * CHUNKED_DATA_LEN;
        chunk.put_slice(&packet[off..off + chunk_len]);

        let written = transport.send(&chunk)?;
        if written != chunk.len() {
            return Err(Error::ShortWrite {
                written,
                expected: chunk.len(),
                back: Backtrace::new(),
            });
        }

        bytes_left -= chunk_len;
    }

    if bytes_left != 0 {
        return Err(Error::ChunkAccounting {
            remaining: bytes_left,
            back: Backtrace::new(),
        });
    }
    Ok(())
}
