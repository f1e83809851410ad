//! Refresh Engine
//!
//! The [`ClaudeUsageAnalyzer`] runs one refresh end to end:
//!
//! 1. **Load**: [`SnapshotLoader`] reads the stats cache and its modification time
//! 2. **Scan**: [`SessionScanner`] folds in every session log newer than that time
//! 3. **Merge**: [`merge`] combines both into a [`MergedReport`]
//! 4. **Publish**: [`MetricsSnapshot::from_report`] builds the exposed series
//!
//! A refresh holds no state between calls beyond the two source locations, and
//! it is safe to run several at once: each one only reads the files.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use claude_usage_exporter::ClaudeUsageAnalyzer;
//!
//! # fn example() -> anyhow::Result<()> {
//! let analyzer = ClaudeUsageAnalyzer::new("/data/claude/stats-cache.json", "/data/claude");
//! let metrics = analyzer.refresh_metrics()?;
//! print!("{}", metrics.encode_text());
//! # Ok(())
//! # }
//! ```

use crate::config::SourcesConfig;
use crate::merge::merge;
use crate::metrics::{MetricsSnapshot, SourceInfo};
use crate::models::MergedReport;
use crate::scanner::SessionScanner;
use crate::snapshot::{SnapshotError, SnapshotLoader};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct ClaudeUsageAnalyzer {
    loader: SnapshotLoader,
    scanner: SessionScanner,
    claude_dir: PathBuf,
}

impl ClaudeUsageAnalyzer {
    /// `claude_dir` is the assistant's data directory; session logs live under its `projects/`.
    pub fn new(stats_file: impl Into<PathBuf>, claude_dir: impl Into<PathBuf>) -> Self {
        let claude_dir = claude_dir.into();
        Self {
            loader: SnapshotLoader::new(stats_file),
            scanner: SessionScanner::new(claude_dir.join("projects")),
            claude_dir,
        }
    }

    pub fn from_config(sources: &SourcesConfig) -> Self {
        Self::new(&sources.stats_file, &sources.claude_dir)
    }

    pub fn stats_file(&self) -> &Path {
        self.loader.path()
    }

    pub fn source_info(&self) -> SourceInfo {
        SourceInfo {
            stats_file: self.stats_file().display().to_string(),
            claude_dir: self.claude_dir.display().to_string(),
        }
    }

    /// Build the merged report with "today" taken as the current UTC date.
    pub fn refresh(&self) -> Result<MergedReport, SnapshotError> {
        self.refresh_for(Utc::now().date_naive())
    }

    pub fn refresh_for(&self, today: NaiveDate) -> Result<MergedReport, SnapshotError> {
        let snapshot = self.loader.load()?;
        let live = self.scanner.scan(snapshot.modified);

        info!(
            live_sessions = live.session_count,
            live_messages = live.message_count,
            "Scanned live sessions"
        );

        let today_label = today.format("%Y-%m-%d").to_string();
        if snapshot.stats.last_computed_date == today_label {
            // Files appended to after the cache was written are rescanned in full
            debug!(
                last_computed_date = %snapshot.stats.last_computed_date,
                "Stats cache was recomputed today, today's figures may overlap live data"
            );
        }

        let report = merge(&snapshot.stats, live, today);

        info!(
            last_computed_date = %report.last_computed_date,
            live_sessions = report.live.session_count,
            "Metrics updated"
        );

        Ok(report)
    }

    pub fn refresh_metrics(&self) -> Result<MetricsSnapshot, SnapshotError> {
        let report = self.refresh()?;
        let metrics = MetricsSnapshot::from_report(&report, &self.source_info());
        debug!(series = metrics.series_count(), "Built metrics snapshot");
        Ok(metrics)
    }
}
