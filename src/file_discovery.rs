use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::fs::metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A session log found on disk together with its last-write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLog {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl SessionLog {
    /// File stem, which the assistant uses as the session id.
    pub fn session_id(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Name of the project directory holding the log.
    pub fn project(&self) -> String {
        self.path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Handles file system traversal of the `projects/` tree
pub struct FileDiscovery {
    projects_dir: PathBuf,
}

impl FileDiscovery {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Find every top-level session log (`projects/*/*.jsonl`).
    ///
    /// A missing projects directory is not an error, there is just nothing to scan.
    pub fn find_session_logs(&self) -> Result<Vec<PathBuf>> {
        if !self.projects_dir.is_dir() {
            return Ok(Vec::new());
        }

        // Session directories may contain glob metacharacters
        let root = Pattern::escape(&self.projects_dir.to_string_lossy());
        let pattern = Path::new(&root).join("*").join("*.jsonl");
        let pattern = pattern.to_string_lossy();

        let mut files: Vec<PathBuf> = glob(&pattern)
            .with_context(|| format!("Invalid session log pattern: {}", pattern))?
            .flatten()
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Session logs whose modification time is strictly after `cutoff`.
    ///
    /// Files whose metadata cannot be read are left out.
    pub fn changed_since(&self, cutoff: SystemTime) -> Result<Vec<SessionLog>> {
        let logs = self
            .find_session_logs()?
            .into_iter()
            .filter_map(|path| {
                let modified = metadata(&path).and_then(|m| m.modified()).ok()?;
                (modified > cutoff).then_some(SessionLog { path, modified })
            })
            .collect();
        Ok(logs)
    }
}
