//! Tool-calling agent over a page session.
//!
//! The QA core only needs [`Agent::invoke`]: one prompt in, one output string
//! out. [`ToolAgent`] fulfils that by letting the model call page tools until it
//! answers in plain text.

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config;
use crate::llm::{ChatReply, ChatTransport, LlmConfig, LlmError, build_request, parse_tool_call};
use crate::page::{self, PageError, PageSession};
use crate::prompts;

/// Result type for agent requests
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors ending an agent request
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("page error: {0}")]
    Page(#[from] PageError),

    /// The model kept calling tools past the turn cap
    #[error("no final answer after {0} tool turns")]
    TurnLimit(usize),

    /// The model ended its turn with neither text nor tool calls
    #[error("model returned an empty answer")]
    EmptyAnswer,
}

impl AgentError {
    /// Whether the page behind the agent is unusable after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::Page(e) if e.is_fatal())
    }
}

/// Final answer of an agent request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    pub output: String,
}

/// Anything that can answer a natural-language request, possibly by acting
/// on a page first.
pub trait Agent {
    fn invoke(&mut self, prompt: &str) -> AgentResult<AgentOutput>;
}

impl<A: Agent + ?Sized> Agent for &mut A {
    fn invoke(&mut self, prompt: &str) -> AgentResult<AgentOutput> {
        (**self).invoke(prompt)
    }
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn invoke(&mut self, prompt: &str) -> AgentResult<AgentOutput> {
        (**self).invoke(prompt)
    }
}

/// Agent that exposes the page tools to a chat model.
///
/// Each [`invoke`](Agent::invoke) starts a fresh conversation made of the
/// system prompt and the request; the page itself carries state between calls.
pub struct ToolAgent<P, T> {
    page: P,
    transport: T,
    config: LlmConfig,
    max_turns: usize,
    system_prompt: String,
}

impl<P: PageSession, T: ChatTransport> ToolAgent<P, T> {
    pub fn new(page: P, transport: T, config: LlmConfig) -> Self {
        Self {
            page,
            transport,
            config,
            max_turns: config::get().llm.max_turns,
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn page(&mut self) -> &mut P {
        &mut self.page
    }
}

impl<P: PageSession, T: ChatTransport> Agent for ToolAgent<P, T> {
    fn invoke(&mut self, prompt: &str) -> AgentResult<AgentOutput> {
        let tools = page::tool_definitions();
        let mut messages = vec![
            json!({ "role": "system", "content": self.system_prompt }),
            json!({ "role": "user", "content": prompt }),
        ];

        for turn in 1..=self.max_turns {
            let request = build_request(&self.config, &messages, Some(&tools));
            let reply = ChatReply::from_response(&self.transport.send(&request)?)?;

            if reply.tool_calls.is_empty() {
                let output = reply.content.unwrap_or_default();
                if output.trim().is_empty() {
                    return Err(AgentError::EmptyAnswer);
                }
                info!(turn, chars = output.len(), "agent answered");
                return Ok(AgentOutput { output });
            }

            messages.push(assistant_message(&reply));
            for call in &reply.tool_calls {
                info!(turn, tool = %call.name, "tool call");
                let result = page::dispatch(&mut self.page, &call.name, &call.arguments)?;
                debug!(tool = %call.name, result = %preview(&result), "tool result");
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": result,
                }));
            }
        }

        warn!(max_turns = self.max_turns, "agent hit the tool turn limit");
        Err(AgentError::TurnLimit(self.max_turns))
    }
}

/// Assistant message to replay, with `content` normalised for strict servers.
///
/// Tool calls that could not be parsed get no tool response, so they are left
/// out of the replayed message.
fn assistant_message(reply: &ChatReply) -> Value {
    let mut message = reply.raw.clone();
    message["role"] = json!("assistant");
    if message["content"].is_null() {
        message["content"] = json!("");
    }
    if let Some(calls) = message["tool_calls"].as_array() {
        let answered: Vec<Value> = calls
            .iter()
            .filter(|call| parse_tool_call(call).is_some())
            .cloned()
            .collect();
        message["tool_calls"] = Value::Array(answered);
    }
    message
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
