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

//! From [`Message`] to datagrams.

use crate::{
    chunk::{num_chunks, write_chunked},
    compress::Compressor,
    error::{Error, Result},
    message::Message,
    pool::BufferPool,
    transport::Transport,
};

use backtrace::Backtrace;

use std::io::Write;

/// Encodes, compresses & (if need be) chunks messages onto a [`Transport`].
#[derive(Default)]
pub struct PacketWriter {
    compressor: Compressor,
    pool: BufferPool,
}

impl PacketWriter {
    pub fn new(compressor: Compressor) -> PacketWriter {
        PacketWriter {
            compressor,
            pool: BufferPool::default(),
        }
    }
    pub fn with_pool(compressor: Compressor, pool: BufferPool) -> PacketWriter {
        PacketWriter { compressor, pool }
    }
    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Send `msg` on `transport`: a single datagram if the (possibly compressed) encoding fits,
    /// chunks otherwise.
    ///
    /// Any failure along the way abandons the packet; nothing is retried or resumed.
    pub fn write_message<T: Transport + ?Sized>(&self, transport: &T, msg: &Message) -> Result<()> {
        let mut encoded = self.pool.get();
        let mut compressed = self.pool.get();
        let res = self.write_with_buffers(transport, msg, &mut encoded, &mut compressed);
        self.pool.put(encoded);
        self.pool.put(compressed);
        res
    }

    fn write_with_buffers<T: Transport + ?Sized>(
        &self,
        transport: &T,
        msg: &Message,
        encoded: &mut Vec<u8>,
        compressed: &mut Vec<u8>,
    ) -> Result<()> {
        msg.encode_into(encoded)?;

        let used_compression = match self.compressor.writer(&mut *compressed)? {
            Some(mut enc) => {
                // Finish the encoder even if the write failed, so nothing is left half-flushed.
                let wrote = enc.write_all(encoded);
                let finished = enc.finish().map(|_| ());
                wrote.map_err(Error::compression)?;
                finished.map_err(Error::compression)?;
                true
            }
            None => false,
        };
        let packet: &[u8] = if used_compression {
            &compressed[..]
        } else {
            &encoded[..]
        };

        if num_chunks(packet.len()) > 1 {
            return write_chunked(transport, packet);
        }

        let written = transport.send(packet)?;
        if written != packet.len() {
            return Err(Error::ShortWrite {
                written,
                expected: packet.len(),
                back: Backtrace::new(),
            });
        }
        Ok(())
    }
}
