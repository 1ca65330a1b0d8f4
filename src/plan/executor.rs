//! Executes single plan steps through an agent.

use tracing::{debug, info};

use super::types::Step;
use crate::agent::{Agent, AgentResult};
use crate::prompts;

/// Words whose presence in an execution report marks the step as issue-bearing
pub const ISSUE_KEYWORDS: [&str; 6] =
    ["bug", "issue", "error", "failed", "incorrect", "unexpected"];

/// Decides which issues an execution report describes
pub trait IssueClassifier {
    /// Issues found in `output`; empty means the step is clean
    fn classify(&self, output: &str) -> Vec<String>;
}

impl<F> IssueClassifier for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn classify(&self, output: &str) -> Vec<String> {
        self(output)
    }
}

/// Case-insensitive substring match against a keyword list.
///
/// A flagged report is recorded whole as a single issue. Matching is plain
/// substring search, so "no errors" still counts.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn matches(&self, output: &str) -> bool {
        let lowered = output.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(ISSUE_KEYWORDS)
    }
}

impl IssueClassifier for KeywordClassifier {
    fn classify(&self, output: &str) -> Vec<String> {
        if self.matches(output) {
            vec![output.trim().to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Runs one step at a time through an agent
pub struct StepExecutor<A, C = KeywordClassifier> {
    agent: A,
    classifier: C,
}

impl<A: Agent> StepExecutor<A, KeywordClassifier> {
    pub fn new(agent: A) -> Self {
        Self {
            agent,
            classifier: KeywordClassifier::default(),
        }
    }
}

impl<A: Agent, C: IssueClassifier> StepExecutor<A, C> {
    /// Swap the issue classifier
    pub fn with_classifier<C2: IssueClassifier>(self, classifier: C2) -> StepExecutor<A, C2> {
        StepExecutor {
            agent: self.agent,
            classifier,
        }
    }

    pub fn into_agent(self) -> A {
        self.agent
    }

    /// Execute `step` (1-based `step_index`) and return it updated.
    ///
    /// Agent errors are returned as is; the caller decides what a failed step
    /// means for the run.
    pub fn execute(&mut self, mut step: Step, step_index: usize) -> AgentResult<Step> {
        info!(step = step_index, description = %step.description, "executing step");

        let prompt = prompts::step_prompt(&step.description, step_index);
        let output = self.agent.invoke(&prompt)?.output;
        let issues = self.classifier.classify(&output);
        debug!(step = step_index, issues = issues.len(), "step classified");

        step.complete(output, issues);
        Ok(step)
    }
}
