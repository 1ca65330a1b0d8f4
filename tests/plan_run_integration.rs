//! End-to-end runs of the plan lifecycle against an in-memory page

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use web_qa::llm::{ChatTransport, LlmConfig, LlmError, LlmResult};
use web_qa::page::{PageError, PageResult, PageSession};
use web_qa::{PlanRunner, QaReport, ToolAgent, summarize};

/// A counter page: `#inc` increments `#count`
#[derive(Default)]
struct CounterPage {
    count: i32,
    fields: HashMap<String, String>,
    screenshots: Vec<String>,
    closed: bool,
}

impl PageSession for CounterPage {
    fn navigate(&mut self, _url: &str) -> PageResult<()> {
        self.count = 0;
        Ok(())
    }

    fn title(&mut self) -> PageResult<String> {
        Ok("Counter".to_string())
    }

    fn screenshot(&mut self, label: &str) -> PageResult<PathBuf> {
        self.screenshots.push(label.to_string());
        Ok(PathBuf::from(format!("/shots/counter_{}.png", label)))
    }

    fn content(&mut self) -> PageResult<String> {
        Ok(format!(
            "<button id=\"inc\">+</button><span id=\"count\">{}</span><input id=\"name\">",
            self.count
        ))
    }

    fn click(&mut self, selector: &str) -> PageResult<()> {
        match selector {
            "#inc" => {
                self.count += 1;
                Ok(())
            }
            other => Err(PageError::ElementNotFound(other.to_string())),
        }
    }

    fn fill(&mut self, selector: &str, value: &str) -> PageResult<()> {
        if selector != "#name" {
            return Err(PageError::ElementNotFound(selector.to_string()));
        }
        self.fields.insert(selector.to_string(), value.to_string());
        Ok(())
    }

    fn get_text(&mut self, selector: &str) -> PageResult<String> {
        match selector {
            "#count" => Ok(self.count.to_string()),
            other => Err(PageError::ElementNotFound(other.to_string())),
        }
    }

    fn close(&mut self) -> PageResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Scripted model: each entry is either a reply or a transport failure
struct ScriptedModel {
    script: RefCell<VecDeque<Result<Value, String>>>,
    seen_tool_results: RefCell<Vec<String>>,
}

impl ScriptedModel {
    fn new(script: Vec<Result<Value, String>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            seen_tool_results: RefCell::new(Vec::new()),
        }
    }
}

impl ChatTransport for ScriptedModel {
    fn send(&self, request: &Value) -> LlmResult<Value> {
        if let Some(last) = request["messages"].as_array().and_then(|m| m.last()) {
            if last["role"] == "tool" {
                let text = last["content"].as_str().unwrap_or_default().to_string();
                self.seen_tool_results.borrow_mut().push(text);
            }
        }
        match self.script.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(msg)) => Err(LlmError::ConnectionFailed(msg)),
            None => Err(LlmError::ConnectionFailed("script exhausted".to_string())),
        }
    }
}

fn call(tool: &str, args: Value) -> Result<Value, String> {
    Ok(json!({"choices": [{"message": {
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": format!("call_{}", tool),
            "type": "function",
            "function": {"name": tool, "arguments": args.to_string()}
        }]
    }}]}))
}

fn answer(text: &str) -> Result<Value, String> {
    Ok(json!({"choices": [{"message": {"role": "assistant", "content": text}}]}))
}

fn config() -> LlmConfig {
    LlmConfig::new("http://model.test/v1/chat/completions").model("scripted")
}

const PLAN: &str = "Test plan for the counter page:\n\
    1. Click the '+' button and verify the count becomes 1\n\
    2. Click the reset button and verify the count returns to 0\n\
    3. Type 'Ada' into the name field\n\
    \n\
    Notes: the page has no persistence.";

#[test]
fn test_full_run_with_mixed_outcomes() {
    let model = ScriptedModel::new(vec![
        // Step 1: screenshot, click, answer clean
        call("screenshot", json!({"label": "step_1_before"})),
        call("click", json!({"selector": "#inc"})),
        answer("PASSED: the count changed from 0 to 1."),
        // Step 2: the reset button does not exist
        call("click", json!({"selector": "#reset"})),
        answer("FAILED: there is no reset button, this is a bug."),
        // Step 3: the model endpoint drops
        Err("connection reset by peer".to_string()),
    ]);

    let mut page = CounterPage::default();
    let agent = ToolAgent::new(&mut page, &model, config());
    let mut runner = PlanRunner::with_agent(agent);

    let run = runner.run(PLAN).unwrap();
    drop(runner);

    let descriptions: Vec<&str> = run.steps.iter().map(|s| s.description.as_str()).collect();
    assert_eq!(
        descriptions,
        vec![
            "1. Click the '+' button and verify the count becomes 1",
            "2. Click the reset button and verify the count returns to 0",
            "3. Type 'Ada' into the name field",
        ]
    );

    let completed: Vec<bool> = run.steps.iter().map(|s| s.completed).collect();
    assert_eq!(completed, vec![true, true, false]);

    assert!(run.steps[0].issues_found.is_empty());
    assert_eq!(run.steps[1].issues_found.len(), 1);
    assert!(run.steps[2].issues_found[0].starts_with("Execution error:"));
    assert!(run.steps[2].issues_found[0].contains("connection reset by peer"));

    // Page state reflects the tool calls that actually ran
    assert_eq!(page.count, 1);
    assert_eq!(page.screenshots, vec!["step_1_before"]);

    // Tool failures were reported to the model as text
    let seen = model.seen_tool_results.borrow();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].contains("/shots/counter_step_1_before.png"));
    assert_eq!(seen[1], "Clicked #inc");
    assert!(seen[2].contains("no element matches selector '#reset'"));

    let summary = summarize(&run);
    assert_eq!(summary.total_steps, 3);
    assert_eq!(summary.completed_steps, 2);
    assert_eq!(summary.failed_steps, 1);
    assert_eq!(summary.total_issues_found, 2);
}

#[test]
fn test_report_round_trip_through_file() {
    let model = ScriptedModel::new(vec![
        call("fill", json!({"selector": "#name", "value": "Ada"})),
        answer("PASSED: the field shows Ada."),
    ]);

    let mut page = CounterPage::default();
    let run = PlanRunner::with_agent(ToolAgent::new(&mut page, &model, config()))
        .run("1. Type 'Ada' into the name field")
        .unwrap();
    assert_eq!(page.fields.get("#name").map(String::as_str), Some("Ada"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qa_results.json");
    let report = QaReport::from_run(run);
    report.save(&path).unwrap();

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["plan"], "1. Type 'Ada' into the name field");
    assert_eq!(raw["results"].as_array().unwrap().len(), 1);
    assert_eq!(raw["summary"]["completed_steps"], 1);
    assert_eq!(raw["summary"]["issues"], json!([]));

    assert_eq!(QaReport::load(&path).unwrap(), report);
}

#[test]
fn test_plan_without_steps_makes_no_requests() {
    let model = ScriptedModel::new(vec![]);
    let mut page = CounterPage::default();
    let run = PlanRunner::with_agent(ToolAgent::new(&mut page, &model, config()))
        .run("I could not find anything to test on this page.")
        .unwrap();

    assert!(run.steps.is_empty());
    assert_eq!(summarize(&run), web_qa::Summary::default());
    assert!(page.screenshots.is_empty());
    assert!(!page.closed);
}
