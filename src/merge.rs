//! Historical + live aggregation
//!
//! [`merge`] combines a [`StatsCache`] with the [`LiveResult`] of one scan. It
//! cannot fail: every lookup that misses contributes zero.
//!
//! ## Rules
//!
//! - Model keys from both sides go through [`normalize_model`] before matching,
//!   so `anthropic/claude-x` and `claude-x` are one series. Several raw cache
//!   entries collapsing onto one key are summed.
//! - Cumulative counters and all-time totals are historical plus live.
//! - Today's bucket is the cache entry for `today` plus live figures, or live
//!   figures alone when the cache has no entry for that date. Activity and
//!   per-model tokens are handled independently.
//! - Daily trends keep at most [`TREND_WINDOW`] entries, oldest first.
//! - Hour keys are zero-padded to two digits.

use crate::models::{
    normalize_model, DailyTokens, LiveResult, MergedReport, ModelTotals, StatsCache,
    TodaySummary,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Number of most recent daily entries exposed as trend series.
pub const TREND_WINDOW: usize = 30;

pub fn merge(stats: &StatsCache, live: LiveResult, today: NaiveDate) -> MergedReport {
    let today = today.format("%Y-%m-%d").to_string();

    let historical = normalized_model_usage(stats);
    let model_names: BTreeSet<&String> = historical.keys().chain(live.models.keys()).collect();

    let models = model_names
        .into_iter()
        .map(|name| {
            let mut totals = historical.get(name).cloned().unwrap_or_default();
            if let Some(usage) = live.models.get(name) {
                totals.tokens.add(&usage.tokens);
                totals.cost_usd += usage.cost_usd;
            }
            (name.clone(), totals)
        })
        .collect();

    let today_summary = today_summary(stats, &live, &today);

    let daily_activity = window(&stats.daily_activity).to_vec();
    let mut daily_tokens: Vec<DailyTokens> = window(&stats.daily_model_tokens)
        .iter()
        .map(|entry| DailyTokens {
            date: entry.date.clone(),
            tokens_by_model: normalize_keys(&entry.tokens_by_model),
        })
        .collect();
    // The trend entry for today carries the live additions too
    if let Some(entry) = daily_tokens.iter_mut().find(|entry| entry.date == today) {
        entry.tokens_by_model = today_summary.tokens_by_model.clone();
    } else if !today_summary.tokens_by_model.is_empty() {
        daily_tokens.push(DailyTokens {
            date: today.clone(),
            tokens_by_model: today_summary.tokens_by_model.clone(),
        });
        let excess = daily_tokens.len().saturating_sub(TREND_WINDOW);
        daily_tokens.drain(..excess);
    }

    MergedReport {
        models,
        total_sessions: stats.total_sessions + live.session_count,
        total_messages: stats.total_messages + live.message_count,
        today: today_summary,
        daily_activity,
        daily_tokens,
        hour_sessions: pad_hours(&stats.hour_counts),
        last_computed_date: stats.last_computed_date.clone(),
        first_session_date: stats.first_session_date.clone(),
        live,
    }
}

/// Cache model usage keyed by normalized name.
fn normalized_model_usage(stats: &StatsCache) -> BTreeMap<String, ModelTotals> {
    let mut models: BTreeMap<String, ModelTotals> = BTreeMap::new();
    for (raw, usage) in &stats.model_usage {
        let totals = models.entry(normalize_model(raw)).or_default();
        totals.tokens.input += usage.input_tokens;
        totals.tokens.output += usage.output_tokens;
        totals.tokens.cache_read += usage.cache_read_input_tokens;
        totals.tokens.cache_creation += usage.cache_creation_input_tokens;
        totals.cost_usd += usage.cost_usd;
    }
    models
}

fn today_summary(stats: &StatsCache, live: &LiveResult, today: &str) -> TodaySummary {
    let activity = stats
        .daily_activity
        .iter()
        .find(|entry| entry.date == today)
        .cloned()
        .unwrap_or_default();

    let mut tokens_by_model = stats
        .daily_model_tokens
        .iter()
        .find(|entry| entry.date == today)
        .map(|entry| normalize_keys(&entry.tokens_by_model))
        .unwrap_or_default();
    for (model, usage) in &live.models {
        *tokens_by_model.entry(model.clone()).or_insert(0.0) += usage.tokens.input;
    }

    TodaySummary {
        date: today.to_string(),
        messages: activity.message_count + live.message_count,
        sessions: activity.session_count + live.session_count,
        tool_calls: activity.tool_call_count + live.tool_call_total(),
        tokens_by_model,
    }
}

/// The last [`TREND_WINDOW`] entries, oldest first.
pub fn window<T>(entries: &[T]) -> &[T] {
    &entries[entries.len().saturating_sub(TREND_WINDOW)..]
}

fn normalize_keys(tokens: &HashMap<String, f64>) -> BTreeMap<String, f64> {
    let mut normalized = BTreeMap::new();
    for (raw, count) in tokens {
        *normalized.entry(normalize_model(raw)).or_insert(0.0) += count;
    }
    normalized
}

/// Zero-pad a numeric hour key: `"5"` becomes `"05"`. Other keys pass through trimmed.
pub fn pad_hour(hour: &str) -> String {
    let hour = hour.trim();
    match hour.parse::<u32>() {
        Ok(h) => format!("{:02}", h),
        Err(_) => hour.to_string(),
    }
}

fn pad_hours(hours: &HashMap<String, f64>) -> BTreeMap<String, f64> {
    let mut padded = BTreeMap::new();
    for (hour, count) in hours {
        *padded.entry(pad_hour(hour)).or_insert(0.0) += count;
    }
    padded
}
