//! Drives a whole plan through the step executor.

use tracing::{error, info, warn};

use super::executor::{IssueClassifier, StepExecutor};
use super::parser::parse_plan;
use super::types::TestRun;
use crate::agent::{Agent, AgentResult};

/// Parses a plan and executes its steps in order.
///
/// A step whose execution errors is recorded as failed and the run moves on.
/// Only fatal errors (the page session is gone) end the run early, and those
/// are returned to the caller.
pub struct PlanRunner<A, C> {
    executor: StepExecutor<A, C>,
}

impl<A: Agent, C: IssueClassifier> PlanRunner<A, C> {
    pub fn new(executor: StepExecutor<A, C>) -> Self {
        Self { executor }
    }

    pub fn into_executor(self) -> StepExecutor<A, C> {
        self.executor
    }

    pub fn run(&mut self, plan_text: &str) -> AgentResult<TestRun> {
        let steps = parse_plan(plan_text);
        if steps.is_empty() {
            warn!("plan contains no numbered steps; nothing to run");
            return Ok(TestRun::new(plan_text, steps));
        }

        let total = steps.len();
        info!(steps = total, "running test plan");

        let mut executed = Vec::with_capacity(total);
        for (i, step) in steps.into_iter().enumerate() {
            let index = i + 1;
            let pending = step.clone();

            match self.executor.execute(step, index) {
                Ok(done) => {
                    info!(
                        step = index,
                        total,
                        issues = done.issues_found.len(),
                        "step completed"
                    );
                    executed.push(done);
                }
                Err(e) if e.is_fatal() => {
                    error!(step = index, "page session lost: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(step = index, "step failed: {}", e);
                    let mut failed = pending;
                    failed.fail(&e.to_string());
                    executed.push(failed);
                }
            }
        }

        Ok(TestRun::new(plan_text, executed))
    }
}

impl<A: Agent> PlanRunner<A, super::executor::KeywordClassifier> {
    /// Runner with the default keyword classifier
    pub fn with_agent(agent: A) -> Self {
        Self::new(StepExecutor::new(agent))
    }
}
