//! Claude Usage Exporter Library
//!
//! Turns the local usage data of the Claude coding assistant into a set of
//! Prometheus series. Two sources are combined on every refresh:
//!
//! - the **stats cache**, a JSON summary the assistant recomputes now and then
//! - the **session logs**, JSONL files under `<claude_dir>/projects/*/` that
//!   grow while sessions are active
//!
//! Only logs modified after the stats cache was last written are scanned, so
//! nothing the cache already accounts for is counted twice.
//!
//! ## Architecture Overview
//!
//! - [`models`] - Stats cache schema, live aggregates and the merged report
//! - [`parser`] - Schema-tolerant decoding of one session log line
//! - [`file_discovery`] - Locating session logs and filtering them by mtime
//! - [`scanner`] - Streaming session logs into a [`LiveResult`]
//! - [`snapshot`] - Loading the stats cache and its modification time
//! - [`merge`] - Combining historical and live data into a [`MergedReport`]
//! - [`metrics`] - The published [`MetricsSnapshot`] and its text exposition
//! - [`analyzer`] - One refresh end to end
//! - [`server`] - The HTTP surface
//! - [`config`] - Configuration with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use claude_usage_exporter::ClaudeUsageAnalyzer;
//!
//! # fn example() -> anyhow::Result<()> {
//! let analyzer = ClaudeUsageAnalyzer::new("/data/claude/stats-cache.json", "/data/claude");
//! let report = analyzer.refresh()?;
//! println!("{} sessions", report.total_sessions);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod file_discovery;
pub mod logging;
pub mod merge;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod scanner;
pub mod server;
pub mod snapshot;

pub use analyzer::ClaudeUsageAnalyzer;
pub use metrics::MetricsSnapshot;
pub use models::*;
pub use snapshot::SnapshotError;
