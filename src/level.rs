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

//! GELF severity levels.
//!
//! GELF borrows its `level` field from syslog: [`Level`] replicates the names used in
//! `<syslog.h>`, with the same numeric values (0 through 7).

type StdResult<T, E> = std::result::Result<T, E>;

/// The eight syslog severities. The enumeration values duplicate the constants documented in the
/// `syslog()` manual [page] & defined in `<syslog.h>`.
///
/// [page]: https://man7.org/linux/man-pages/man3/syslog.3.html
///
/// A GELF message at [`Level::LOG_EMERG`] is sent without a `level` key at all: the field is
/// treated as "empty" when zero, and receivers fill in their own default.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// system is unusable
    LOG_EMERG,
    /// action must be take immediately
    LOG_ALERT,
    /// critical conditions
    LOG_CRIT,
    /// error conditions
    LOG_ERR,
    /// warning conditions
    LOG_WARNING,
    /// normal, but significant condition
    LOG_NOTICE,
    /// informational message
    #[default]
    LOG_INFO,
    /// debug-level message
    LOG_DEBUG,
}

impl Level {
    /// True for the zero-valued level, which the encoder omits
    pub fn is_zero(&self) -> bool {
        *self == Level::LOG_EMERG
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Level::LOG_EMERG => "LOG_EMERG",
                Level::LOG_ALERT => "LOG_ALERT",
                Level::LOG_CRIT => "LOG_CRIT",
                Level::LOG_ERR => "LOG_ERR",
                Level::LOG_WARNING => "LOG_WARNING",
                Level::LOG_NOTICE => "LOG_NOTICE",
                Level::LOG_INFO => "LOG_INFO",
                Level::LOG_DEBUG => "LOG_DEBUG",
            }
        )
    }
}

impl std::convert::TryFrom<u8> for Level {
    type Error = u8;
    fn try_from(x: u8) -> StdResult<Self, Self::Error> {
        match x {
            0 => Ok(Level::LOG_EMERG),
            1 => Ok(Level::LOG_ALERT),
            2 => Ok(Level::LOG_CRIT),
            3 => Ok(Level::LOG_ERR),
            4 => Ok(Level::LOG_WARNING),
            5 => Ok(Level::LOG_NOTICE),
            6 => Ok(Level::LOG_INFO),
            7 => Ok(Level::LOG_DEBUG),
            n => Err(n),
        }
    }
}

impl serde::Serialize for Level {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Map a [`tracing`] level onto syslog severities.
///
/// [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
impl std::convert::From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::LOG_DEBUG,
            tracing::Level::INFO => Level::LOG_INFO,
            tracing::Level::WARN => Level::LOG_WARNING,
            tracing::Level::ERROR => Level::LOG_ERR,
        }
    }
}
