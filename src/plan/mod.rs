pub mod executor;
pub mod parser;
pub mod runner;
pub mod summary;
pub mod types;

pub use executor::{ISSUE_KEYWORDS, IssueClassifier, KeywordClassifier, StepExecutor};
pub use parser::{is_step_line, parse_plan};
pub use runner::PlanRunner;
pub use summary::summarize;
pub use types::{Step, Summary, TestRun};
