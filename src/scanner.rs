//! Incremental session log scanning
//!
//! The stats cache already accounts for everything written before it was last
//! recomputed, and session logs are append-only. A refresh therefore only reads
//! log files modified after the cache file itself, which keeps the cost of a
//! scrape proportional to recent activity instead of lifetime activity.
//!
//! ## Failure Policy
//!
//! Nothing in here fails the scan. A file that cannot be opened or read is
//! counted in [`LiveResult::files_skipped`]; a line that is not JSON, or that
//! exceeds [`MAX_LINE_BYTES`], is counted in [`LiveResult::malformed_lines`].

use crate::file_discovery::{FileDiscovery, SessionLog};
use crate::models::{LiveResult, ParsedLine, SessionStats};
use crate::parser::parse_line;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Lines longer than this are skipped instead of parsed.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

const READ_BUFFER_BYTES: usize = 1024 * 1024;

pub struct SessionScanner {
    discovery: FileDiscovery,
    max_line_bytes: usize,
}

impl SessionScanner {
    /// `projects_dir` is the directory holding one sub-directory per project.
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            discovery: FileDiscovery::new(projects_dir),
            max_line_bytes: MAX_LINE_BYTES,
        }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn projects_dir(&self) -> &Path {
        self.discovery.projects_dir()
    }

    /// Summarize every session log modified strictly after `cutoff`.
    pub fn scan(&self, cutoff: SystemTime) -> LiveResult {
        let mut result = LiveResult::default();

        let logs = match self.discovery.changed_since(cutoff) {
            Ok(logs) => logs,
            Err(e) => {
                warn!(
                    projects_dir = %self.projects_dir().display(),
                    error = %e,
                    "Failed to list session logs"
                );
                return result;
            }
        };

        for log in &logs {
            match self.scan_file(log) {
                Ok(file_result) => result.absorb(file_result),
                Err(e) => {
                    debug!(file = %log.path.display(), error = %e, "Skipping unreadable session log");
                    result.files_skipped += 1;
                }
            }
        }

        debug!(
            files_scanned = result.files_scanned,
            files_skipped = result.files_skipped,
            malformed_lines = result.malformed_lines,
            "Scanned live session logs"
        );

        result
    }

    /// Scan a single log. An I/O error at any point discards the whole file.
    pub fn scan_file(&self, log: &SessionLog) -> io::Result<LiveResult> {
        let file = File::open(&log.path)?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);

        let mut result = LiveResult {
            files_scanned: 1,
            ..Default::default()
        };
        let mut session = SessionStats {
            session_id: log.session_id(),
            project: log.project(),
            ..Default::default()
        };

        let mut buf = Vec::new();
        let mut line_number = 0usize;
        loop {
            let line = match read_bounded_line(&mut reader, &mut buf, self.max_line_bytes)? {
                LineRead::Eof => break,
                LineRead::Oversized => {
                    line_number += 1;
                    debug!(
                        file = %log.path.display(),
                        line = line_number,
                        "Skipping oversized line"
                    );
                    result.malformed_lines += 1;
                    continue;
                }
                LineRead::Line => {
                    line_number += 1;
                    trim_ascii(&buf)
                }
            };

            if line.is_empty() {
                continue;
            }

            match parse_line(line) {
                ParsedLine::Usage(event) => {
                    if result.record_usage(&event) {
                        session.message_count += 1;
                        session.tokens.add(&event.tokens);
                    }
                }
                ParsedLine::System(event) => result.record_system(&event),
                ParsedLine::Unrecognized => {}
                ParsedLine::Malformed(reason) => {
                    debug!(
                        file = %log.path.display(),
                        line = line_number,
                        reason = %reason,
                        "Skipping malformed line"
                    );
                    result.malformed_lines += 1;
                }
            }
        }

        if session.message_count > 0 {
            result.session_count = 1;
            result.sessions.push(session);
        }

        Ok(result)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    Oversized,
    Eof,
}

/// Read one `\n`-terminated line into `buf`, without the terminator.
///
/// Once a line grows past `cap` the rest of it is consumed without buffering and
/// [`LineRead::Oversized`] is returned, so memory stays bounded by `cap`.
fn read_bounded_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    cap: usize,
) -> io::Result<LineRead> {
    buf.clear();
    let mut oversized = false;
    let mut read_any = false;

    loop {
        let (consumed, line_done) = {
            let available = match reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if available.is_empty() {
                return Ok(match (read_any, oversized) {
                    (false, _) => LineRead::Eof,
                    (true, true) => LineRead::Oversized,
                    (true, false) => LineRead::Line,
                });
            }
            read_any = true;

            let newline = available.iter().position(|b| *b == b'\n');
            let chunk = &available[..newline.unwrap_or(available.len())];

            if !oversized {
                if buf.len() + chunk.len() > cap {
                    oversized = true;
                    buf.clear();
                } else {
                    buf.extend_from_slice(chunk);
                }
            }

            match newline {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            }
        };

        reader.consume(consumed);
        if line_done {
            return Ok(if oversized {
                LineRead::Oversized
            } else {
                LineRead::Line
            });
        }
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
