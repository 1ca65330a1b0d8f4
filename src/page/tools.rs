//! Page actions exposed to the model as callable tools.
//!
//! Failures are folded into the returned text so the model can react to them;
//! only a closed session is returned as an error.

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{PageError, PageResult, PageSession};

/// Names of the tools, in the order they are offered
pub const TOOL_NAMES: [&str; 5] = ["screenshot", "get_html", "click", "fill", "get_text"];

/// Markup longer than this is cut before being handed back to the model
const MAX_HTML_CHARS: usize = 60_000;

/// Tool definitions in the chat completions `tools` format
pub fn tool_definitions() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": "screenshot",
                "description": "Screenshot the visible part of the page and save it. Returns the file path.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "label": { "type": "string", "description": "Short label for the file, e.g. 'step_2_before'" }
                    },
                    "required": ["label"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "get_html",
                "description": "Return the current HTML markup of the page.",
                "parameters": { "type": "object", "properties": {} }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "click",
                "description": "Click the first element matching a CSS selector.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "CSS selector" }
                    },
                    "required": ["selector"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "fill",
                "description": "Replace the value of an input or textarea matching a CSS selector.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "CSS selector" },
                        "value": { "type": "string", "description": "Text to enter" }
                    },
                    "required": ["selector", "value"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "get_text",
                "description": "Return the visible text of the first element matching a CSS selector.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "CSS selector" }
                    },
                    "required": ["selector"]
                }
            }
        }
    ])
}

/// Run one tool call against the page and describe the outcome as text.
///
/// Returns `Err` only when the page session is gone.
pub fn dispatch<P: PageSession + ?Sized>(
    page: &mut P,
    name: &str,
    args: &Value,
) -> PageResult<String> {
    debug!(tool = name, %args, "dispatching tool call");

    let outcome = match name {
        "screenshot" => {
            let label = str_arg(args, "label").unwrap_or("screenshot");
            page.screenshot(label).map(|path| format!("Screenshot saved to {}", path.display()))
        }
        "get_html" => page.content().map(|html| truncate_html(&html)),
        "click" => match str_arg(args, "selector") {
            Some(selector) => page.click(selector).map(|_| format!("Clicked {}", selector)),
            None => return Ok(missing_argument(name, "selector")),
        },
        "fill" => match (str_arg(args, "selector"), str_arg(args, "value")) {
            (Some(selector), Some(value)) => page
                .fill(selector, value)
                .map(|_| format!("Filled {} with '{}'", selector, value)),
            (None, _) => return Ok(missing_argument(name, "selector")),
            (_, None) => return Ok(missing_argument(name, "value")),
        },
        "get_text" => match str_arg(args, "selector") {
            Some(selector) => page.get_text(selector),
            None => return Ok(missing_argument(name, "selector")),
        },
        other => {
            return Ok(format!(
                "Error: unknown tool '{}'. Available tools: {}",
                other,
                TOOL_NAMES.join(", ")
            ));
        }
    };

    match outcome {
        Ok(text) => Ok(text),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(tool = name, "tool call failed: {}", e);
            Ok(describe_failure(name, &e))
        }
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn missing_argument(tool: &str, arg: &str) -> String {
    format!("Error: {} requires a '{}' argument", tool, arg)
}

fn describe_failure(tool: &str, error: &PageError) -> String {
    format!("Error running {}: {}", tool, error)
}

fn truncate_html(html: &str) -> String {
    if html.chars().count() <= MAX_HTML_CHARS {
        return html.to_string();
    }
    let cut: String = html.chars().take(MAX_HTML_CHARS).collect();
    format!("{}\n<!-- truncated after {} characters -->", cut, MAX_HTML_CHARS)
}
