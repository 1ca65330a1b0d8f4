//! Aggregation of a test run into summary counts.

use super::types::{Summary, TestRun};

/// Summarize a run. Pure; an empty run gives an all-zero summary.
pub fn summarize(run: &TestRun) -> Summary {
    let total_steps = run.steps.len();
    let completed_steps = run.steps.iter().filter(|s| s.completed).count();
    let issues: Vec<String> = run
        .steps
        .iter()
        .flat_map(|s| s.issues_found.iter().cloned())
        .collect();

    Summary {
        total_steps,
        completed_steps,
        failed_steps: total_steps - completed_steps,
        total_issues_found: issues.len(),
        issues,
    }
}
