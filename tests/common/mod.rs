#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Fixed reference time for snapshot files.
pub fn t0() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

pub fn at_offset(secs: i64) -> SystemTime {
    if secs >= 0 {
        t0() + Duration::from_secs(secs as u64)
    } else {
        t0() - Duration::from_secs(secs.unsigned_abs())
    }
}

pub fn set_mtime(path: &Path, mtime: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

/// A throwaway data directory with the `<claude_dir>/projects` layout.
pub struct ClaudeHome {
    pub dir: TempDir,
}

impl ClaudeHome {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("projects")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn stats_file(&self) -> PathBuf {
        self.root().join("stats-cache.json")
    }

    pub fn write_stats(&self, json: &str, mtime: SystemTime) -> PathBuf {
        let path = self.stats_file();
        fs::write(&path, json).unwrap();
        set_mtime(&path, mtime);
        path
    }

    pub fn write_log(&self, project: &str, session: &str, lines: &[String], mtime: SystemTime) -> PathBuf {
        let project_dir = self.root().join("projects").join(project);
        fs::create_dir_all(&project_dir).unwrap();
        let path = project_dir.join(format!("{}.jsonl", session));
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&path, content).unwrap();
        set_mtime(&path, mtime);
        path
    }
}

pub fn assistant_line(model: &str, input: u64, output: u64) -> String {
    format!(
        r#"{{"type":"assistant","message":{{"model":"{}","role":"assistant","usage":{{"input_tokens":{},"output_tokens":{}}}}}}}"#,
        model, input, output
    )
}

pub fn assistant_line_with_cost(model: &str, input: u64, output: u64, cost: f64) -> String {
    format!(
        r#"{{"type":"assistant","costUSD":{},"message":{{"model":"{}","role":"assistant","usage":{{"input_tokens":{},"output_tokens":{}}}}}}}"#,
        cost, model, input, output
    )
}

pub fn tool_use_line(model: &str, tool: &str) -> String {
    format!(
        r#"{{"type":"assistant","message":{{"model":"{}","role":"assistant","stop_reason":"tool_use","content":[{{"type":"tool_use","name":"{}","input":{{}}}}],"usage":{{"input_tokens":10,"output_tokens":5}}}}}}"#,
        model, tool
    )
}

pub fn turn_duration_line(ms: u64) -> String {
    format!(r#"{{"type":"system","subtype":"turn_duration","durationMs":{}}}"#, ms)
}

pub fn stats_json(model: &str, input: u64, sessions: u64, messages: u64) -> String {
    format!(
        r#"{{"modelUsage":{{"{}":{{"inputTokens":{},"outputTokens":0,"cacheReadInputTokens":0,"cacheCreationInputTokens":0,"costUSD":0}}}},"totalSessions":{},"totalMessages":{},"lastComputedDate":"2023-11-13","firstSessionDate":"2023-10-01"}}"#,
        model, input, sessions, messages
    )
}
