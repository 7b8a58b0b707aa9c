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

//! Figuring-out the `host` field of outgoing messages.

use crate::error::{Error, Result};

use backtrace::Backtrace;

/// Produce a [`String`] from an [`OsString`](std::ffi::OsString), replacing anything that isn't
/// UTF-8.
#[cfg(unix)]
fn string_from_os_str(s: std::ffi::OsString) -> String {
    use std::os::unix::ffi::OsStringExt;
    String::from_utf8_lossy(&s.into_vec()).into_owned()
}

#[cfg(not(unix))]
fn string_from_os_str(s: std::ffi::OsString) -> String {
    s.to_string_lossy().into_owned()
}

/// Attempt to figure-out a name for this host.
///
/// This will first simply try [gethostname()], then use [netlink] to try & find an IP address.
///
/// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
/// [netlink]: https://man7.org/linux/man-pages/man7/netlink.7.html
pub fn discover() -> Result<String> {
    hostname::get()
        .map_err(|err| Error::NoHostname {
            source: Box::new(err),
            back: Backtrace::new(),
        })
        .map(string_from_os_str)
        .and_then(|hn| {
            if hn.is_empty() {
                Err(Error::NoHostname {
                    source: "empty hostname".into(),
                    back: Backtrace::new(),
                })
            } else {
                Ok(hn)
            }
        })
        .or_else(|_err| {
            local_ip_address::local_ip()
                .map(|ip| ip.to_string())
                .map_err(|err| Error::NoHostname {
                    source: Box::new(err),
                    back: Backtrace::new(),
                })
        })
}

/// Like [`discover`], but can't fail; settles for "localhost" when nothing better turns up.
pub fn discover_or_localhost() -> String {
    discover().unwrap_or_else(|_| "localhost".to_string())
}
