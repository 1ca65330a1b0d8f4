//! Types for test plans and their execution records.

use serde::{Deserialize, Serialize};

/// One numbered item of a test plan and its execution state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Plan line exactly as written, numbering included
    pub description: String,

    /// Whether execution finished without an error
    pub completed: bool,

    /// Execution report or error message (None until executed)
    pub result: Option<String>,

    /// Issues observed while executing; empty means clean
    pub issues_found: Vec<String>,
}

impl Step {
    /// A not-yet-executed step
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            completed: false,
            result: None,
            issues_found: Vec::new(),
        }
    }

    /// Whether the step has been through execution, successfully or not
    pub fn executed(&self) -> bool {
        self.result.is_some()
    }

    /// Record a successful execution
    pub fn complete(&mut self, output: String, issues: Vec<String>) {
        self.completed = true;
        self.result = Some(output);
        self.issues_found = issues;
    }

    /// Record an execution that raised an error
    pub fn fail(&mut self, error: &str) {
        self.completed = false;
        self.result = Some(format!("Error: {}", error));
        self.issues_found.push(format!("Execution error: {}", error));
    }
}

/// Execution record of one plan against one page session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    /// Raw plan text as produced by the planner
    pub plan_text: String,

    /// Steps in plan order
    pub steps: Vec<Step>,
}

impl TestRun {
    pub fn new(plan_text: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            plan_text: plan_text.into(),
            steps,
        }
    }
}

/// Aggregate counts over a [`TestRun`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub total_issues_found: usize,

    /// Every step's issues, flattened in step order
    pub issues: Vec<String>,
}

impl Summary {
    /// Whether every step completed and nothing was flagged
    pub fn is_clean(&self) -> bool {
        self.failed_steps == 0 && self.total_issues_found == 0
    }
}
