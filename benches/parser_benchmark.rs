//! Performance benchmarks for line decoding and session scanning
//!
//! Run with: cargo bench

use claude_usage_exporter::parser::parse_line;
use claude_usage_exporter::scanner::SessionScanner;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use std::time::SystemTime;
use tempfile::TempDir;

/// Generate session log lines, with every 10th line broken when `include_errors` is set
fn generate_test_jsonl(num_lines: usize, include_errors: bool) -> String {
    let mut lines = Vec::new();

    for i in 0..num_lines {
        if include_errors && i % 10 == 5 {
            lines.push("{broken json}".to_string());
        } else if i % 4 == 3 {
            lines.push(format!(
                r#"{{"type":"system","subtype":"turn_duration","durationMs":{}}}"#,
                1000 + i
            ));
        } else {
            lines.push(format!(
                r#"{{"type":"assistant","costUSD":{},"message":{{"id":"msg_{}","model":"anthropic/claude-sonnet-4","role":"assistant","stop_reason":"end_turn","usage":{{"input_tokens":{},"output_tokens":{},"cache_creation_input_tokens":{},"cache_read_input_tokens":{}}}}}}}"#,
                0.001 * (i as f64),
                i,
                100 + i,
                200 + i,
                i % 50,
                i % 100
            ));
        }
    }

    lines.join("\n")
}

/// A projects tree with `files` logs of `lines` lines each
fn create_projects_tree(files: usize, lines: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    let content = generate_test_jsonl(lines, true);
    for f in 0..files {
        let project = dir.path().join(format!("project-{}", f % 4));
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join(format!("session-{}.jsonl", f)), &content).unwrap();
    }
    dir
}

fn benchmark_parse_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_line");

    let content = generate_test_jsonl(100, true);
    let lines: Vec<&[u8]> = content.lines().map(str::as_bytes).collect();

    group.bench_function("mixed_lines", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(parse_line(black_box(line)));
            }
        });
    });

    group.finish();
}

fn benchmark_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_scanner");

    for files in [1, 10, 50].iter() {
        let tree = create_projects_tree(*files, 1000);
        let scanner = SessionScanner::new(tree.path());

        group.bench_with_input(BenchmarkId::new("files", files), files, |b, _| {
            b.iter(|| scanner.scan(black_box(SystemTime::UNIX_EPOCH)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_parse_line, benchmark_scanner);
criterion_main!(benches);
