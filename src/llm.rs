//! Chat completions client for OpenAI-compatible endpoints.
//!
//! Provides:
//! - Request building with optional tool definitions
//! - Reply parsing into text content and tool calls
//! - A [`ChatTransport`] seam; [`CurlTransport`] is the production transport
//! - Connection health checks
//!
//! # Configuration
//!
//! Settings come from the environment (see [`crate::config`]):
//! - `WEB_QA_LLM_ENDPOINT`: API endpoint URL
//! - `WEB_QA_LLM_MODEL`: Model name
//! - `WEB_QA_LLM_API_KEY` / `GEMINI_API_KEY`: Bearer token
//! - `WEB_QA_LLM_MAX_TOKENS`: Max tokens in response
//! - `WEB_QA_LLM_TIMEOUT`: Whole-request timeout (seconds)
//! - `WEB_QA_LLM_CONNECT_TIMEOUT`: Connection timeout (seconds)

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use serde_json::{Value, json};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::config;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// curl's exit code for "operation timed out"
const CURL_TIMEOUT_EXIT: i32 = 28;

/// Errors that can occur talking to the model endpoint
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to connect to the endpoint
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete within the configured time
    #[error("no response within {0}s")]
    Timeout(u64),

    /// The endpoint answered with an error object
    #[error("API error: {0}")]
    Api(String),

    /// The reply could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the chat client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name to use
    pub model: String,
    /// Bearer token, if the endpoint needs one
    pub api_key: Option<String>,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Timeout for initial connection (seconds)
    pub connect_timeout: u64,
    /// Timeout for the whole request (seconds)
    pub request_timeout: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            endpoint: cfg.llm.endpoint.clone(),
            model: cfg.llm.model.clone(),
            api_key: cfg.llm.api_key.clone(),
            max_tokens: cfg.llm.max_tokens,
            connect_timeout: cfg.llm.connect_timeout,
            request_timeout: cfg.llm.request_timeout,
        }
    }
}

impl LlmConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = seconds;
        self
    }
}

/// Sends one chat completions request and returns the decoded JSON reply
pub trait ChatTransport {
    fn send(&self, request: &Value) -> LlmResult<Value>;
}

impl<T: ChatTransport + ?Sized> ChatTransport for &T {
    fn send(&self, request: &Value) -> LlmResult<Value> {
        (**self).send(request)
    }
}

/// Posts requests through a `curl` subprocess.
///
/// The API key is handed to curl in a private config file (`-K`), never on
/// the command line.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    config: LlmConfig,
    program: PathBuf,
}

impl CurlTransport {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            program: PathBuf::from("curl"),
        }
    }

    /// Use another curl-compatible executable
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

impl ChatTransport for CurlTransport {
    fn send(&self, request: &Value) -> LlmResult<Value> {
        let body =
            serde_json::to_vec(request).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let started = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-s",
            "-X", "POST",
            &self.config.endpoint,
            "-H", "Content-Type: application/json",
            "--data-binary", "@-",
            "--connect-timeout", &self.config.connect_timeout.to_string(),
            "--max-time", &self.config.request_timeout.to_string(),
        ]);
        let auth_file = match &self.config.api_key {
            Some(key) => {
                let file = auth_config(key)?;
                cmd.arg("-K").arg(file.path());
                Some(file)
            }
            None => None,
        };

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&body) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
        let output = child.wait_with_output()?;
        drop(auth_file);

        debug!(
            model = %self.config.model,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completion round trip"
        );

        if output.status.code() == Some(CURL_TIMEOUT_EXIT) {
            return Err(LlmError::Timeout(self.config.request_timeout));
        }
        if !output.status.success() {
            return Err(LlmError::ConnectionFailed(format!(
                "{} ({})",
                self.config.endpoint,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let response: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        if let Some(error) = api_error(&response) {
            return Err(LlmError::Api(error));
        }
        Ok(response)
    }
}

/// curl config file carrying the bearer header, readable only by this user
fn auth_config(key: &str) -> std::io::Result<NamedTempFile> {
    let escaped = key.replace('\\', "\\\\").replace('"', "\\\"");
    let mut file = tempfile::Builder::new().prefix("web-qa-auth-").tempfile()?;
    writeln!(file, "header = \"Authorization: Bearer {}\"", escaped)?;
    file.flush()?;
    Ok(file)
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The assistant message of one completion
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Text content, if any
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// The message exactly as returned, for replaying into the conversation
    pub raw: Value,
}

impl ChatReply {
    /// Extract the first choice's message from a completion response
    pub fn from_response(response: &Value) -> LlmResult<Self> {
        let message = response.pointer("/choices/0/message").ok_or_else(|| {
            LlmError::InvalidResponse(format!("no choices in {}", preview(response)))
        })?;

        let content = match &message["content"] {
            Value::String(s) => Some(s.clone()),
            // Some servers return content as a list of text parts
            Value::Array(parts) => Some(
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join(""),
            ),
            _ => None,
        };

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
            .unwrap_or_default();

        Ok(Self {
            content,
            tool_calls,
            raw: message.clone(),
        })
    }
}

/// A tool call entry, or `None` when it names no function
pub(crate) fn parse_tool_call(call: &Value) -> Option<ToolCall> {
    let function = call.get("function")?;
    let name = function["name"].as_str()?.to_string();
    let arguments = match &function["arguments"] {
        Value::String(raw) if raw.trim().is_empty() => json!({}),
        Value::String(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
        Value::Null => json!({}),
        other => other.clone(),
    };
    Some(ToolCall {
        id: call["id"].as_str().unwrap_or_default().to_string(),
        name,
        arguments,
    })
}

/// Build a chat completions request
pub fn build_request(config: &LlmConfig, messages: &[Value], tools: Option<&Value>) -> Value {
    let mut request = json!({
        "model": config.model,
        "messages": messages,
        "max_tokens": config.max_tokens,
    });
    if let Some(tools) = tools {
        request["tools"] = tools.clone();
    }
    request
}

/// Error message carried in a response body, if any
fn api_error(response: &Value) -> Option<String> {
    // Some gateways wrap errors in a one-element array
    let error = response
        .get("error")
        .or_else(|| response.get(0).and_then(|v| v.get("error")))?;
    Some(
        error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    )
}

fn preview(value: &Value) -> String {
    value.to_string().chars().take(200).collect()
}

/// Check if an endpoint is reachable (connection-only check).
///
/// This only verifies the server accepts connections; it does not wait for a
/// completion.
pub fn check_health(endpoint: &str, timeout_secs: u64) -> LlmResult<bool> {
    let output = Command::new("curl")
        .args([
            "-s",
            "-o", "/dev/null",
            "-w", "%{http_code}",
            "--connect-timeout", &timeout_secs.to_string(),
            "--max-time", &timeout_secs.to_string(),
            "-I",
            endpoint,
        ])
        .output()?;

    let status = String::from_utf8_lossy(&output.stdout);
    // Any response (even 4xx/5xx) means server is reachable; 000 means it is not
    let code: u16 = status.trim().parse().unwrap_or(0);
    Ok(code > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config_builder() {
        let config = LlmConfig::new("http://localhost:8080/v1/chat/completions")
            .model("qwen3")
            .api_key(Some("k".into()))
            .max_tokens(200)
            .request_timeout(30);

        assert_eq!(config.endpoint, "http://localhost:8080/v1/chat/completions");
        assert_eq!(config.model, "qwen3");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.max_tokens, 200);
        assert_eq!(config.request_timeout, 30);
    }

    #[test]
    fn test_build_request_with_tools() {
        let config = LlmConfig::new("http://x").model("m").max_tokens(10);
        let messages = vec![json!({"role": "user", "content": "hi"})];
        let tools = json!([{"type": "function"}]);

        let request = build_request(&config, &messages, Some(&tools));
        assert_eq!(request["model"], "m");
        assert_eq!(request["max_tokens"], 10);
        assert_eq!(request["messages"][0]["content"], "hi");
        assert_eq!(request["tools"], tools);

        let request = build_request(&config, &messages, None);
        assert!(request.get("tools").is_none());
    }

    #[test]
    fn test_reply_with_tool_calls() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "click", "arguments": "{\"selector\": \"#add\"}" }
                    }]
                }
            }]
        });

        let reply = ChatReply::from_response(&response).unwrap();
        assert_eq!(reply.content, None);
        assert_eq!(
            reply.tool_calls,
            vec![ToolCall {
                id: "call_1".into(),
                name: "click".into(),
                arguments: json!({"selector": "#add"}),
            }]
        );
    }

    #[test]
    fn test_reply_with_text_parts() {
        let response = json!({
            "choices": [{
                "message": {
                    "content": [
                        { "type": "text", "text": "Step " },
                        { "type": "text", "text": "passed" }
                    ]
                }
            }]
        });
        let reply = ChatReply::from_response(&response).unwrap();
        assert_eq!(reply.content.as_deref(), Some("Step passed"));
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn test_reply_without_choices() {
        let err = ChatReply::from_response(&json!({"object": "list"})).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_api_key_is_not_passed_on_the_command_line() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let argv_path = dir.path().join("argv");
        let config_path = dir.path().join("config");
        let script = dir.path().join("fake-curl");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n\
                 printf '%s\\n' \"$@\" > '{argv}'\n\
                 while [ $# -gt 0 ]; do\n\
                 if [ \"$1\" = \"-K\" ]; then cat \"$2\" > '{config}'; fi\n\
                 shift\n\
                 done\n\
                 cat > /dev/null\n\
                 printf '%s' '{{\"choices\":[{{\"message\":{{\"content\":\"ok\"}}}}]}}'\n",
                argv = argv_path.display(),
                config = config_path.display(),
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = LlmConfig::new("http://model.test/v1/chat/completions")
            .api_key(Some("sk-SECRET-123".into()));
        let transport = CurlTransport::new(config).program(&script);
        let response = transport.send(&json!({"model": "m"})).unwrap();
        let reply = ChatReply::from_response(&response).unwrap();
        assert_eq!(reply.content.as_deref(), Some("ok"));

        let argv = std::fs::read_to_string(&argv_path).unwrap();
        assert!(!argv.contains("sk-SECRET-123"));
        assert!(argv.lines().any(|arg| arg == "-K"));

        let curl_config = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(
            curl_config.trim(),
            "header = \"Authorization: Bearer sk-SECRET-123\""
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_body_write_failure_returns_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("early-exit");
        std::fs::write(&script, "#!/bin/sh\nexec 0<&-\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Larger than a pipe buffer, so the write sees the closed pipe
        let request = json!({"model": "m", "padding": "x".repeat(4 * 1024 * 1024)});
        let transport = CurlTransport::new(LlmConfig::new("http://model.test")).program(&script);
        let err = transport.send(&request).unwrap_err();
        assert!(matches!(err, LlmError::Io(_)));
    }

    #[test]
    fn test_api_error_shapes() {
        assert_eq!(
            api_error(&json!({"error": {"message": "bad key"}})).as_deref(),
            Some("bad key")
        );
        assert_eq!(
            api_error(&json!([{"error": {"message": "quota"}}])).as_deref(),
            Some("quota")
        );
        assert_eq!(api_error(&json!({"choices": []})), None);
    }
}
