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

//! A small cache of reusable byte buffers, so that each packet doesn't start with a fresh
//! allocation.

use std::sync::Mutex;

use tracing::trace;

/// Initial capacity of pooled buffers
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
/// How many idle buffers a pool will hold on to
pub const DEFAULT_POOL_SIZE: usize = 16;
/// Returned buffers larger than this multiple of the buffer size are shrunk
const MAX_GROWTH: usize = 4;

pub struct BufferPool {
    buf_size: usize,
    max_idle: usize,
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl std::default::Default for BufferPool {
    fn default() -> Self {
        BufferPool::new(DEFAULT_BUFFER_SIZE, DEFAULT_POOL_SIZE)
    }
}

impl BufferPool {
    pub fn new(buf_size: usize, max_idle: usize) -> Self {
        BufferPool {
            buf_size,
            max_idle,
            buffers: Mutex::new(Vec::with_capacity(max_idle)),
        }
    }

    /// Take an empty buffer from the pool, allocating one if none are idle.
    pub fn get(&self) -> Vec<u8> {
        // A poisoned pool is still a perfectly good pool of empty buffers.
        let idle = self
            .buffers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop();
        match idle {
            Some(buf) => buf,
            None => {
                trace!("no buffer in pool: creating new buffer");
                Vec::with_capacity(self.buf_size)
            }
        }
    }

    /// Return `buf` to the pool; it's dropped if the pool is full. A buffer that grew well past
    /// the pool's buffer size is shrunk back first, so one outsized message doesn't pin its
    /// memory for the life of the pool.
    pub fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        if buf.capacity() > self.buf_size.saturating_mul(MAX_GROWTH) {
            buf.shrink_to(self.buf_size);
        }
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        if buffers.len() < self.max_idle {
            buffers.push(buf);
        } else {
            drop(buffers);
            trace!("pool is full: discarding returned buffer");
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }
}
