//! Metrics snapshot and Prometheus text exposition
//!
//! A [`MetricsSnapshot`] is a plain value: a map from metric name and label set to
//! a number, plus two histograms. It is rebuilt from scratch from a
//! [`MergedReport`] on every refresh and handed wholesale to the HTTP layer, so
//! a label that disappears from the sources disappears from the output on the
//! next scrape without any reset step.

use crate::models::MergedReport;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Ordered label pairs identifying one series inside a family.
pub type Labels = Vec<(&'static str, String)>;

pub const TURN_DURATION_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0];

pub const PRE_COMPACTION_BUCKETS: &[f64] = &[
    25_000.0, 50_000.0, 100_000.0, 150_000.0, 200_000.0, 300_000.0, 500_000.0, 1_000_000.0,
];

const HELP: &[(&str, &str)] = &[
    ("claude_model_input_tokens_total", "Total input tokens by model"),
    ("claude_model_output_tokens_total", "Total output tokens by model"),
    ("claude_model_cache_read_tokens_total", "Total cache-read input tokens by model"),
    ("claude_model_cache_creation_tokens_total", "Total cache-creation input tokens by model"),
    ("claude_model_cost_usd", "Total cost in USD by model"),
    ("claude_live_input_tokens", "Input tokens from active sessions (not yet in cache)"),
    ("claude_live_output_tokens", "Output tokens from active sessions (not yet in cache)"),
    ("claude_live_cost_usd", "Cost in USD from active sessions by model"),
    ("claude_live_sessions", "Number of active sessions (not yet in cache)"),
    ("claude_live_messages", "Messages in active sessions (not yet in cache)"),
    ("claude_live_prompt_cost_usd", "Prompt cost in USD from active sessions"),
    ("claude_live_completion_cost_usd", "Completion cost in USD from active sessions"),
    ("claude_live_tool_calls", "Tool invocations in active sessions by tool"),
    ("claude_live_stop_reasons", "Assistant stop reasons in active sessions"),
    ("claude_live_api_errors", "API errors logged by active sessions"),
    ("claude_live_api_retries", "API errors that were retried in active sessions"),
    ("claude_live_compactions", "Context compactions in active sessions"),
    ("claude_live_web_search_requests", "Web search requests in active sessions"),
    ("claude_live_web_fetch_requests", "Web fetch requests in active sessions"),
    ("claude_live_malformed_lines", "Session log lines skipped as unparsable"),
    ("claude_sessions_total", "Total number of sessions"),
    ("claude_messages_total", "Total number of messages"),
    ("claude_today_messages", "Messages sent today"),
    ("claude_today_sessions", "Sessions started today"),
    ("claude_today_tool_calls", "Tool calls today"),
    ("claude_today_tokens", "Tokens used today by model"),
    ("claude_daily_messages", "Daily message count"),
    ("claude_daily_sessions", "Daily session count"),
    ("claude_daily_tool_calls", "Daily tool call count"),
    ("claude_daily_tokens", "Daily tokens by model"),
    ("claude_hour_sessions", "Session count by hour of day"),
    ("claude_exporter_info", "Claude Code exporter metadata"),
    ("claude_turn_duration_seconds", "Duration of assistant turns in active sessions"),
    ("claude_compaction_pre_tokens", "Context size in tokens before each compaction"),
];

/// Where the report's data came from, for the info series.
#[derive(Debug, Clone, Default)]
pub struct SourceInfo {
    pub stats_file: String,
    pub claude_dir: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bounds: &'static [f64],
    /// Per-bucket counts, one extra slot for `+Inf`.
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    pub fn new(bounds: &'static [f64]) -> Self {
        Self {
            bounds,
            counts: vec![0; bounds.len() + 1],
            sum: 0.0,
            count: 0,
        }
    }

    pub fn observe(&mut self, value: f64) {
        let slot = self
            .bounds
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(self.bounds.len());
        self.counts[slot] += 1;
        self.sum += value;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// `(upper bound, cumulative count)` pairs, ending with `+Inf`.
    pub fn cumulative(&self) -> Vec<(f64, u64)> {
        let mut running = 0;
        self.bounds
            .iter()
            .copied()
            .chain(std::iter::once(f64::INFINITY))
            .zip(&self.counts)
            .map(|(bound, count)| {
                running += count;
                (bound, running)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    series: BTreeMap<&'static str, BTreeMap<Labels, f64>>,
    histograms: BTreeMap<&'static str, Histogram>,
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, labels: Labels, value: f64) {
        self.series.entry(name).or_default().insert(labels, value);
    }

    /// Look up one series; `labels` must list every label of the series in order.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.series.get(name)?.iter().find_map(|(key, value)| {
            let matches = key.len() == labels.len()
                && key
                    .iter()
                    .zip(labels)
                    .all(|((k, v), (lk, lv))| k == lk && v == lv);
            matches.then_some(*value)
        })
    }

    pub fn histogram(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name)
    }

    /// Number of gauge samples, histograms excluded.
    pub fn series_count(&self) -> usize {
        self.series.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty() && self.histograms.is_empty()
    }

    /// Translate a merged report into the full exposed series set.
    pub fn from_report(report: &MergedReport, sources: &SourceInfo) -> Self {
        let mut m = Self::new();
        let live = &report.live;

        for (name, totals) in &report.models {
            let labels = || vec![("model", name.clone())];
            m.set("claude_model_input_tokens_total", labels(), totals.tokens.input);
            m.set("claude_model_output_tokens_total", labels(), totals.tokens.output);
            m.set("claude_model_cache_read_tokens_total", labels(), totals.tokens.cache_read);
            m.set("claude_model_cache_creation_tokens_total", labels(), totals.tokens.cache_creation);
            m.set("claude_model_cost_usd", labels(), totals.cost_usd);
        }

        for (name, usage) in &live.models {
            if !usage.tokens.is_active() {
                continue;
            }
            let labels = || vec![("model", name.clone())];
            m.set("claude_live_input_tokens", labels(), usage.tokens.input);
            m.set("claude_live_output_tokens", labels(), usage.tokens.output);
            m.set("claude_live_cost_usd", labels(), usage.cost_usd);
        }

        m.set("claude_live_sessions", vec![], live.session_count as f64);
        m.set("claude_live_messages", vec![], live.message_count as f64);
        m.set("claude_live_prompt_cost_usd", vec![], live.prompt_cost_usd);
        m.set("claude_live_completion_cost_usd", vec![], live.completion_cost_usd);
        m.set("claude_live_api_errors", vec![], live.api_errors as f64);
        m.set("claude_live_api_retries", vec![], live.api_retries as f64);
        m.set("claude_live_compactions", vec![], live.compactions as f64);
        m.set("claude_live_web_search_requests", vec![], live.web_search_requests as f64);
        m.set("claude_live_web_fetch_requests", vec![], live.web_fetch_requests as f64);
        m.set("claude_live_malformed_lines", vec![], live.malformed_lines as f64);

        for (tool, count) in &live.tool_calls {
            m.set("claude_live_tool_calls", vec![("tool", tool.clone())], *count as f64);
        }
        for (reason, count) in &live.stop_reasons {
            m.set("claude_live_stop_reasons", vec![("reason", reason.clone())], *count as f64);
        }

        m.set("claude_sessions_total", vec![], report.total_sessions as f64);
        m.set("claude_messages_total", vec![], report.total_messages as f64);

        m.set("claude_today_messages", vec![], report.today.messages as f64);
        m.set("claude_today_sessions", vec![], report.today.sessions as f64);
        m.set("claude_today_tool_calls", vec![], report.today.tool_calls as f64);
        for (model, tokens) in &report.today.tokens_by_model {
            m.set("claude_today_tokens", vec![("model", model.clone())], *tokens);
        }

        for entry in &report.daily_activity {
            let labels = || vec![("date", entry.date.clone())];
            m.set("claude_daily_messages", labels(), entry.message_count as f64);
            m.set("claude_daily_sessions", labels(), entry.session_count as f64);
            m.set("claude_daily_tool_calls", labels(), entry.tool_call_count as f64);
        }
        for entry in &report.daily_tokens {
            for (model, tokens) in &entry.tokens_by_model {
                m.set(
                    "claude_daily_tokens",
                    vec![("date", entry.date.clone()), ("model", model.clone())],
                    *tokens,
                );
            }
        }

        for (hour, count) in &report.hour_sessions {
            m.set("claude_hour_sessions", vec![("hour", hour.clone())], *count);
        }

        let mut durations = Histogram::new(TURN_DURATION_BUCKETS);
        live.turn_durations_secs.iter().for_each(|v| durations.observe(*v));
        m.histograms.insert("claude_turn_duration_seconds", durations);

        let mut pre_tokens = Histogram::new(PRE_COMPACTION_BUCKETS);
        live.compaction_pre_tokens.iter().for_each(|v| pre_tokens.observe(*v));
        m.histograms.insert("claude_compaction_pre_tokens", pre_tokens);

        m.set(
            "claude_exporter_info",
            vec![
                ("stats_file", sources.stats_file.clone()),
                ("claude_dir", sources.claude_dir.clone()),
                ("last_computed_date", report.last_computed_date.clone()),
                ("first_session_date", report.first_session_date.clone()),
                ("live_sessions", live.session_count.to_string()),
            ],
            1.0,
        );

        m
    }

    /// Render in the Prometheus text exposition format (version 0.0.4).
    pub fn encode_text(&self) -> String {
        let mut out = String::new();

        for (name, family) in &self.series {
            write_header(&mut out, name, "gauge");
            for (labels, value) in family {
                let _ = writeln!(out, "{}{} {}", name, format_labels(labels, None), format_value(*value));
            }
        }

        for (name, histogram) in &self.histograms {
            write_header(&mut out, name, "histogram");
            for (bound, count) in histogram.cumulative() {
                let le = format_value(bound);
                let _ = writeln!(
                    out,
                    "{}_bucket{} {}",
                    name,
                    format_labels(&[], Some(le.as_str())),
                    count
                );
            }
            let _ = writeln!(out, "{}_sum {}", name, format_value(histogram.sum));
            let _ = writeln!(out, "{}_count {}", name, histogram.count);
        }

        out
    }
}

fn write_header(out: &mut String, name: &str, kind: &str) {
    let help = HELP
        .iter()
        .find(|(metric, _)| *metric == name)
        .map(|(_, help)| *help)
        .unwrap_or(name);
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn format_labels(labels: &[(&'static str, String)], le: Option<&str>) -> String {
    let mut pairs: Vec<String> = labels
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, escape_label(value)))
        .collect();
    if let Some(le) = le {
        pairs.push(format!("le=\"{}\"", le));
    }

    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let inf = if value > 0.0 { "+Inf" } else { "-Inf" };
        inf.to_string()
    } else {
        value.to_string()
    }
}
