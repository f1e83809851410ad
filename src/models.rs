//! Core Data Models
//!
//! This module defines the data structures that flow through one refresh of the
//! exporter, from the two on-disk sources to the merged report.
//!
//! ## Data Flow
//!
//! 1. **Historical Data**: [`StatsCache`] - The periodically recomputed stats cache
//! 2. **Raw Events**: [`ParsedLine`] - One normalized line of a session log
//! 3. **Live Data**: [`LiveResult`] - Everything found in logs newer than the cache
//! 4. **Output**: [`MergedReport`] - Historical and live figures combined
//!
//! ## Features
//!
//! - **Serde Integration**: The stats cache deserializes with every field optional,
//!   reports serialize for `snapshot --json`
//! - **Deterministic Ordering**: Keyed collections in live and merged data are
//!   `BTreeMap`s so output series come out sorted
//! - **Zero Defaults**: Missing numeric fields are zero, never absent

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Model name used when a record carries no usable model identifier.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Vendor namespace some producers prepend to model identifiers.
pub const VENDOR_PREFIX: &str = "anthropic/";

/// Canonicalize a raw model identifier into the series key used everywhere else.
///
/// `anthropic/claude-x` and `claude-x` collapse to `claude-x`; an empty identifier
/// becomes [`UNKNOWN_MODEL`].
pub fn normalize_model(raw: &str) -> String {
    let trimmed = raw.trim();
    let name = trimmed.strip_prefix(VENDOR_PREFIX).unwrap_or(trimmed).trim();
    if name.is_empty() {
        UNKNOWN_MODEL.to_string()
    } else {
        name.to_string()
    }
}

// --- stats cache ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsCache {
    pub model_usage: HashMap<String, ModelUsage>,
    pub total_sessions: u64,
    pub total_messages: u64,
    pub daily_activity: Vec<DailyActivity>,
    pub daily_model_tokens: Vec<DailyModelTokens>,
    pub hour_counts: HashMap<String, f64>,
    pub last_computed_date: String,
    pub first_session_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelUsage {
    pub input_tokens: f64,
    pub output_tokens: f64,
    pub cache_read_input_tokens: f64,
    pub cache_creation_input_tokens: f64,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyActivity {
    pub date: String,
    pub message_count: u64,
    pub session_count: u64,
    pub tool_call_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyModelTokens {
    pub date: String,
    pub tokens_by_model: HashMap<String, f64>,
}

// --- canonical log events ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TokenCounts {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_creation: f64,
}

impl TokenCounts {
    pub fn add(&mut self, other: &TokenCounts) {
        self.input += other.input;
        self.output += other.output;
        self.cache_read += other.cache_read;
        self.cache_creation += other.cache_creation;
    }

    /// Whether the event moved any input or output tokens.
    pub fn is_active(&self) -> bool {
        self.input > 0.0 || self.output > 0.0
    }
}

/// Token-usage record extracted from one log line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageEvent {
    /// Already normalized with [`normalize_model`].
    pub model: String,
    pub stop_reason: Option<String>,
    pub tokens: TokenCounts,
    pub cost_usd: f64,
    pub prompt_cost_usd: f64,
    pub completion_cost_usd: f64,
    pub tool_names: Vec<String>,
    pub web_search_requests: u64,
    pub web_fetch_requests: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    TurnDuration { duration_ms: f64 },
    ApiError { retry_attempt: u64 },
    CompactBoundary { pre_tokens: f64 },
}

/// Outcome of normalizing a single log line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Usage(UsageEvent),
    System(SystemEvent),
    /// Valid JSON that carries nothing this exporter measures (user turns, summaries, ...).
    Unrecognized,
    /// Not JSON, or JSON that is not an object.
    Malformed(String),
}

// --- live aggregation ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveModelUsage {
    pub tokens: TokenCounts,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub project: String,
    pub message_count: u64,
    pub tokens: TokenCounts,
}

/// Activity found in session logs written after the stats cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveResult {
    pub models: BTreeMap<String, LiveModelUsage>,
    pub session_count: u64,
    pub message_count: u64,
    pub prompt_cost_usd: f64,
    pub completion_cost_usd: f64,
    pub turn_durations_secs: Vec<f64>,
    pub tool_calls: BTreeMap<String, u64>,
    pub stop_reasons: BTreeMap<String, u64>,
    pub api_errors: u64,
    pub api_retries: u64,
    pub compactions: u64,
    pub compaction_pre_tokens: Vec<f64>,
    pub web_search_requests: u64,
    pub web_fetch_requests: u64,
    pub malformed_lines: u64,
    pub files_scanned: u64,
    pub files_skipped: u64,
    pub sessions: Vec<SessionStats>,
}

impl LiveResult {
    /// Fold one usage event in.
    ///
    /// Tools, stop reasons, costs and server tool requests are always recorded.
    /// Tokens and the message count only move for events with input or output
    /// tokens, and only those return `true`.
    pub fn record_usage(&mut self, event: &UsageEvent) -> bool {
        let active = event.tokens.is_active();
        if active {
            let model = self.models.entry(event.model.clone()).or_default();
            model.tokens.add(&event.tokens);
            self.message_count += 1;
        }
        if event.cost_usd > 0.0 {
            self.models.entry(event.model.clone()).or_default().cost_usd += event.cost_usd;
        }
        if event.prompt_cost_usd > 0.0 {
            self.prompt_cost_usd += event.prompt_cost_usd;
        }
        if event.completion_cost_usd > 0.0 {
            self.completion_cost_usd += event.completion_cost_usd;
        }

        for tool in &event.tool_names {
            *self.tool_calls.entry(tool.clone()).or_insert(0) += 1;
        }
        if let Some(reason) = &event.stop_reason {
            *self.stop_reasons.entry(reason.clone()).or_insert(0) += 1;
        }
        self.web_search_requests += event.web_search_requests;
        self.web_fetch_requests += event.web_fetch_requests;
        active
    }

    pub fn record_system(&mut self, event: &SystemEvent) {
        match *event {
            SystemEvent::TurnDuration { duration_ms } => {
                self.turn_durations_secs.push(duration_ms / 1000.0);
            }
            SystemEvent::ApiError { retry_attempt } => {
                self.api_errors += 1;
                if retry_attempt > 0 {
                    self.api_retries += 1;
                }
            }
            SystemEvent::CompactBoundary { pre_tokens } => {
                self.compactions += 1;
                self.compaction_pre_tokens.push(pre_tokens);
            }
        }
    }

    /// Merge the result of another scan (typically one file) into this one.
    pub fn absorb(&mut self, other: LiveResult) {
        for (name, usage) in other.models {
            let model = self.models.entry(name).or_default();
            model.tokens.add(&usage.tokens);
            model.cost_usd += usage.cost_usd;
        }
        for (tool, count) in other.tool_calls {
            *self.tool_calls.entry(tool).or_insert(0) += count;
        }
        for (reason, count) in other.stop_reasons {
            *self.stop_reasons.entry(reason).or_insert(0) += count;
        }
        self.session_count += other.session_count;
        self.message_count += other.message_count;
        self.prompt_cost_usd += other.prompt_cost_usd;
        self.completion_cost_usd += other.completion_cost_usd;
        self.turn_durations_secs.extend(other.turn_durations_secs);
        self.api_errors += other.api_errors;
        self.api_retries += other.api_retries;
        self.compactions += other.compactions;
        self.compaction_pre_tokens.extend(other.compaction_pre_tokens);
        self.web_search_requests += other.web_search_requests;
        self.web_fetch_requests += other.web_fetch_requests;
        self.malformed_lines += other.malformed_lines;
        self.files_scanned += other.files_scanned;
        self.files_skipped += other.files_skipped;
        self.sessions.extend(other.sessions);
    }

    pub fn tool_call_total(&self) -> u64 {
        self.tool_calls.values().sum()
    }

    pub fn model_tokens(&self, model: &str) -> TokenCounts {
        self.models
            .get(model)
            .map(|usage| usage.tokens)
            .unwrap_or_default()
    }
}

// --- merged output ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelTotals {
    pub tokens: TokenCounts,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyTokens {
    pub date: String,
    pub tokens_by_model: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TodaySummary {
    pub date: String,
    pub messages: u64,
    pub sessions: u64,
    pub tool_calls: u64,
    pub tokens_by_model: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedReport {
    pub models: BTreeMap<String, ModelTotals>,
    pub total_sessions: u64,
    pub total_messages: u64,
    pub today: TodaySummary,
    pub daily_activity: Vec<DailyActivity>,
    pub daily_tokens: Vec<DailyTokens>,
    pub hour_sessions: BTreeMap<String, f64>,
    pub last_computed_date: String,
    pub first_session_date: String,
    pub live: LiveResult,
}
