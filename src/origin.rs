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

//! Where did this log line come from?
//!
//! When a writer is handed plain text (through [`std::io::Write`]) it decorates the resulting
//! message with the `_file` & `_line` of the code that wrote it. Finding that location is the job
//! of an [`OriginResolver`]; the writers never walk the stack themselves.

/// A source location
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    pub file: String,
    pub line: u32,
}

/// Operations all origin resolvers must support.
pub trait OriginResolver: Send + Sync {
    /// Locate the caller, or return `None` to send the message without `_file`/`_line`.
    fn resolve(&self) -> Option<Origin>;
}

/// Resolve nothing; messages built from text carry no location.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOrigin;

impl OriginResolver for NoOrigin {
    fn resolve(&self) -> Option<Origin> {
        None
    }
}

/// Always report the same location. Mostly useful in tests.
#[derive(Clone, Debug)]
pub struct FixedOrigin(pub Origin);

impl OriginResolver for FixedOrigin {
    fn resolve(&self) -> Option<Origin> {
        Some(self.0.clone())
    }
}

const DEFAULT_IGNORED: &[&str] = &[
    "backtrace::",
    "gelf_tracing::origin",
    "gelf_tracing::writer",
    "gelf_tracing::udp::UdpWriter",
    "gelf_tracing::tcp::TcpWriter",
    "std::",
    "core::",
    "alloc::",
];

/// Walk the stack with [`backtrace`], reporting the first frame that doesn't belong to this
/// crate's writers, the standard library, or anything else the caller asked to ignore (a logging
/// facade sitting in front of the writer, say).
///
/// [`backtrace`]: https://docs.rs/backtrace
///
/// If no such frame can be resolved (no debug info, for instance) the location is reported as
/// `???:0` rather than omitted, so that receivers see a consistent set of fields.
pub struct BacktraceResolver {
    ignored: Vec<String>,
}

impl std::default::Default for BacktraceResolver {
    fn default() -> Self {
        BacktraceResolver {
            ignored: DEFAULT_IGNORED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BacktraceResolver {
    /// Also skip frames whose symbol names contain `pattern`
    pub fn ignoring<S: Into<String>>(mut self, pattern: S) -> Self {
        self.ignored.push(pattern.into());
        self
    }
    fn is_ignored(&self, name: &str) -> bool {
        self.ignored.iter().any(|pat| name.contains(pat.as_str()))
    }
}

impl OriginResolver for BacktraceResolver {
    fn resolve(&self) -> Option<Origin> {
        let mut found: Option<Origin> = None;
        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                if found.is_some() {
                    return;
                }
                let name = match symbol.name() {
                    Some(name) => format!("{:#}", name),
                    None => return,
                };
                if self.is_ignored(&name) {
                    return;
                }
                if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                    found = Some(Origin {
                        file: file.display().to_string(),
                        line,
                    });
                }
            });
            found.is_none()
        });
        Some(found.unwrap_or_else(|| Origin {
            file: "???".to_string(),
            line: 0,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ignore_list() {
        let r = BacktraceResolver::default().ignoring("my_log_facade::");
        assert!(r.is_ignored("gelf_tracing::writer::Identity::message_from_text"));
        assert!(r.is_ignored("<gelf_tracing::udp::UdpWriter as std::io::Write>::write"));
        assert!(r.is_ignored("my_log_facade::info"));
        assert!(!r.is_ignored("gelf_tracing::packet::test::caller"));
        assert!(!r.is_ignored("my_app::main"));
    }

    #[test]
    fn test_resolution_never_fails() {
        // Whether or not debug info is available, we get *some* location back.
        let origin = BacktraceResolver::default().resolve().unwrap();
        assert!(!origin.file.is_empty());
        assert_eq!(NoOrigin.resolve(), None);
    }
}
