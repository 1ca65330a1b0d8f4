//! web-qa - LLM-planned functional testing of web applications.
//!
//! This crate provides:
//! - A plan parser turning numbered free-text plans into steps
//! - A step executor and plan runner with per-step failure isolation
//! - Run summaries and a JSON results report
//! - A tool-calling agent that operates a browser page for the model
//! - A WebDriver-backed page session with labeled screenshots
//! - Planning, bug analysis and bug fixing stages
//!
//! # Example
//!
//! ```rust,no_run
//! use web_qa::agent::ToolAgent;
//! use web_qa::llm::{CurlTransport, LlmConfig};
//! use web_qa::page::{PageSession, WebDriverConfig, WebDriverPage};
//! use web_qa::plan::{PlanRunner, summarize};
//! use web_qa::session::Session;
//!
//! let shots = Session::with_name("demo");
//! let mut page = WebDriverPage::open(WebDriverConfig::default(), shots).unwrap();
//! page.navigate("https://example.com").unwrap();
//!
//! let config = LlmConfig::default();
//! let agent = ToolAgent::new(&mut page, CurlTransport::new(config.clone()), config);
//! let run = PlanRunner::with_agent(agent).run("1. Click the first link").unwrap();
//! println!("{:?}", summarize(&run));
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod page;
pub mod plan;
pub mod prompts;
pub mod qa;
pub mod report;
pub mod session;

// Re-export the core plan lifecycle
pub use plan::{
    IssueClassifier, KeywordClassifier, PlanRunner, Step, StepExecutor, Summary, TestRun,
    is_step_line, parse_plan, summarize,
};

// Re-export agent and page seams
pub use agent::{Agent, AgentError, AgentOutput, AgentResult, ToolAgent};
pub use page::{PageError, PageResult, PageSession, WebDriverConfig, WebDriverPage};

// Re-export model client
pub use llm::{ChatTransport, CurlTransport, LlmConfig, LlmError, LlmResult, check_health};

// Re-export pipeline stages and report
pub use qa::{analyze_bugs, fix_bugs, generate_plan};
pub use report::{QaReport, ReportError, ReportResult, format_summary};

// Re-export session management
pub use session::{Session, cleanup_old_sessions, list_sessions};
