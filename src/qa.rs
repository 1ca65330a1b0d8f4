//! The LLM-backed stages around the plan runner: planning, bug analysis and
//! bug fixing. Each stage is a single agent request.

use tracing::info;

use crate::agent::{Agent, AgentResult};
use crate::plan::Summary;
use crate::prompts;

/// Ask the agent for a numbered test plan for the loaded page
pub fn generate_plan<A: Agent + ?Sized>(agent: &mut A, target: &str) -> AgentResult<String> {
    info!(url = target, "generating test plan");
    let plan = agent.invoke(&prompts::plan_prompt(target))?.output;
    info!(lines = plan.lines().count(), "test plan received");
    Ok(plan)
}

/// Root-cause report for the issues of a run
pub fn analyze_bugs<A: Agent + ?Sized>(
    agent: &mut A,
    summary: &Summary,
    original_html: &str,
) -> AgentResult<String> {
    info!(issues = summary.total_issues_found, "analyzing issues");
    Ok(agent
        .invoke(&prompts::analysis_prompt(&summary.issues, original_html))?
        .output)
}

/// Full corrected HTML document for the page
pub fn fix_bugs<A: Agent + ?Sized>(
    agent: &mut A,
    summary: &Summary,
    analysis: &str,
    original_html: &str,
) -> AgentResult<String> {
    info!("requesting corrected HTML");
    let answer = agent
        .invoke(&prompts::fix_prompt(&summary.issues, analysis, original_html))?
        .output;
    Ok(prompts::extract_html(&answer))
}
