//! End-to-end refreshes over a stats cache plus live session logs

mod common;

use chrono::NaiveDate;
use claude_usage_exporter::{ClaudeUsageAnalyzer, MetricsSnapshot, SnapshotError};
use common::{assistant_line, assistant_line_with_cost, at_offset, stats_json, t0, ClaudeHome};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 11, 15).unwrap()
}

fn analyzer(home: &ClaudeHome) -> ClaudeUsageAnalyzer {
    ClaudeUsageAnalyzer::new(home.stats_file(), home.root())
}

#[test]
fn test_prefixed_history_merges_with_live_model() {
    let home = ClaudeHome::new();
    home.write_stats(&stats_json("anthropic/claude-x", 100, 3, 30), t0());
    home.write_log("proj", "s1", &[assistant_line("claude-x", 50, 5)], at_offset(1));

    let analyzer = analyzer(&home);
    let report = analyzer.refresh_for(today()).unwrap();
    let metrics = MetricsSnapshot::from_report(&report, &analyzer.source_info());

    assert_eq!(
        metrics.get("claude_model_input_tokens_total", &[("model", "claude-x")]),
        Some(150.0)
    );
    assert_eq!(
        metrics.get("claude_model_input_tokens_total", &[("model", "anthropic/claude-x")]),
        None
    );
    assert_eq!(metrics.get("claude_sessions_total", &[]), Some(4.0));
    assert_eq!(metrics.get("claude_messages_total", &[]), Some(31.0));
    assert_eq!(metrics.get("claude_live_sessions", &[]), Some(1.0));
}

#[test]
fn test_log_older_than_snapshot_is_ignored() {
    let home = ClaudeHome::new();
    home.write_stats(&stats_json("claude-x", 100, 3, 30), t0());
    home.write_log("proj", "s1", &[assistant_line("claude-x", 50, 5)], at_offset(-1));

    let report = analyzer(&home).refresh_for(today()).unwrap();

    assert_eq!(report.models["claude-x"].tokens.input, 100.0);
    assert_eq!(report.total_sessions, 3);
    assert_eq!(report.live.session_count, 0);
}

#[test]
fn test_cost_threshold() {
    let home = ClaudeHome::new();
    home.write_stats(&stats_json("claude-x", 0, 0, 0), t0());
    home.write_log(
        "proj",
        "s1",
        &[
            assistant_line_with_cost("claude-free", 10, 1, 0.0),
            assistant_line_with_cost("claude-paid", 10, 1, 0.01),
        ],
        at_offset(1),
    );

    let report = analyzer(&home).refresh_for(today()).unwrap();

    assert_eq!(report.live.models["claude-free"].cost_usd, 0.0);
    assert!((report.live.models["claude-paid"].cost_usd - 0.01).abs() < 1e-12);
}

#[test]
fn test_today_bucket_is_live_only_without_cache_entry() {
    let home = ClaudeHome::new();
    home.write_stats(&stats_json("claude-x", 100, 3, 30), t0());
    home.write_log(
        "proj",
        "s1",
        &[assistant_line("claude-x", 50, 5), assistant_line("claude-x", 25, 5)],
        at_offset(1),
    );

    let report = analyzer(&home).refresh_for(today()).unwrap();

    assert_eq!(report.today.date, "2023-11-15");
    assert_eq!(report.today.messages, 2);
    assert_eq!(report.today.sessions, 1);
    assert_eq!(report.today.tokens_by_model["claude-x"], 75.0);
}

#[test]
fn test_missing_snapshot_fails_refresh() {
    let home = ClaudeHome::new();
    let err = analyzer(&home).refresh_for(today()).unwrap_err();
    assert!(matches!(err, SnapshotError::Unavailable { .. }));
}

#[test]
fn test_malformed_snapshot_fails_refresh() {
    let home = ClaudeHome::new();
    home.write_stats("[1, 2", t0());
    let err = analyzer(&home).refresh_metrics().unwrap_err();
    assert!(matches!(err, SnapshotError::Malformed { .. }));
}

#[test]
fn test_exposition_contains_info_series() {
    let home = ClaudeHome::new();
    home.write_stats(&stats_json("claude-x", 100, 3, 30), t0());

    let analyzer = analyzer(&home);
    let text = analyzer.refresh_metrics().unwrap().encode_text();

    assert!(text.contains("# TYPE claude_exporter_info gauge"));
    assert!(text.contains("last_computed_date=\"2023-11-13\""));
    assert!(text.contains("claude_model_input_tokens_total{model=\"claude-x\"} 100"));
}
