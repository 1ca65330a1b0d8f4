//! Persisted results of a QA run.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::plan::{Step, Summary, TestRun, summarize};

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The JSON document written at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaReport {
    /// Plan text the run executed
    pub plan: String,

    /// Executed steps in plan order
    pub results: Vec<Step>,

    /// Aggregate counts, when computed
    pub summary: Option<Summary>,
}

impl QaReport {
    /// Report for a run, with its summary filled in
    pub fn from_run(run: TestRun) -> Self {
        let summary = summarize(&run);
        Self {
            plan: run.plan_text,
            results: run.steps,
            summary: Some(summary),
        }
    }

    /// The summary, computing it if the report was saved without one
    pub fn summary(&self) -> Summary {
        match &self.summary {
            Some(summary) => summary.clone(),
            None => summarize(&TestRun::new(self.plan.clone(), self.results.clone())),
        }
    }

    /// Write the report as pretty JSON, replacing any existing file
    pub fn save(&self, path: &Path) -> ReportResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "results saved");
        Ok(())
    }

    pub fn load(path: &Path) -> ReportResult<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Render a summary for terminal output
pub fn format_summary(summary: &Summary) -> String {
    let mut out = format!(
        "Test summary:\n  Total steps:     {}\n  Completed:       {}\n  \
         Failed:          {}\n  Issues found:    {}",
        summary.total_steps,
        summary.completed_steps,
        summary.failed_steps,
        summary.total_issues_found
    );
    for (i, issue) in summary.issues.iter().enumerate() {
        // Only the first line of each issue; full text is in the report
        let first = issue.lines().next().unwrap_or_default();
        let preview: String = first.chars().take(160).collect();
        out.push_str(&format!("\n    {}. {}", i + 1, preview));
    }
    out
}
