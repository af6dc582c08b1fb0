//! Conversation session - one model/shell dialogue with tool calling
//!
//! The session owns the message log and drives the tool-call protocol: each
//! turn sends the full log plus the catalog's tool definitions, executes any
//! requested calls against the shell, and keeps requesting completions until
//! the model answers with plain text.

use serde_json::{Map, Value};
use shellpilot_error::{Error, Result};
use shellpilot_shell::{
    ChatMessage, CommandShell, CompletionRequest, LlmProvider, ToolCall, ToolChoice, UsageTracker,
};

/// Configuration for a conversation session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Print role banners and tool activity to stdout
    pub verbose: bool,
    /// Override the provider's default model
    pub model: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            model: None,
        }
    }
}

/// A stateful conversation between one provider and one shell.
///
/// Message log invariants, maintained by `run_turn`:
/// - an assistant message carrying tool calls is appended verbatim before any
///   of its calls execute
/// - every tool call gets exactly one tool message, with the matching
///   `tool_call_id`, in the order the calls were issued
/// - no completion is requested while a tool call is still unanswered
pub struct ConversationSession<'a, P: LlmProvider> {
    provider: &'a P,
    shell: &'a mut CommandShell,
    messages: Vec<ChatMessage>,
    usage: UsageTracker,
    config: SessionConfig,
}

impl<'a, P: LlmProvider> ConversationSession<'a, P> {
    pub fn new(
        provider: &'a P,
        shell: &'a mut CommandShell,
        system_prompt: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            provider,
            shell,
            messages: vec![ChatMessage::system(system_prompt)],
            usage: UsageTracker::new(),
            config,
        }
    }

    /// The full message log, system message included.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Run one user turn to completion and return the model's final text.
    ///
    /// Shell failures never abort the turn: they become `Error: ...` tool
    /// results the model can react to. Provider failures do abort, as
    /// `InferenceFailed`.
    pub async fn run_turn(&mut self, user_text: &str) -> Result<String> {
        self.messages.push(ChatMessage::user(user_text));

        loop {
            let mut request = CompletionRequest::new(self.messages.clone())
                .with_tools(self.shell.catalog().to_definitions())
                .with_tool_choice(ToolChoice::Auto);
            if let Some(model) = &self.config.model {
                request = request.with_model(model.clone());
            }

            let response = self.provider.complete(request).await.map_err(|e| {
                Error::inference_failed(e.to_string()).with_operation("session::run_turn")
            })?;
            self.usage.track(&response.model, &response.usage);

            if response.tool_calls.is_empty() {
                let text = response.content.unwrap_or_default();
                self.messages.push(ChatMessage::assistant(text.clone()));
                if self.config.verbose {
                    println!("[assistant] {}", text.trim());
                }
                return Ok(text);
            }

            self.messages.push(ChatMessage::assistant_with_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let output = match self.execute_call(call).await {
                    Ok(out) => out,
                    Err(e) => format!("Error: {}", e),
                };
                if self.config.verbose {
                    println!("[tool] {}({}) -> {}", call.name, call.arguments, preview(&output));
                }
                self.messages.push(ChatMessage::tool_result(&call.id, output));
            }
        }
    }

    async fn execute_call(&mut self, call: &ToolCall) -> Result<String> {
        let args = decode_arguments(call)?;
        self.shell.dispatch(&call.name, &args).await
    }
}

/// Decode a tool call's argument string into a JSON object.
fn decode_arguments(call: &ToolCall) -> Result<Map<String, Value>> {
    let raw = call.arguments.trim();
    if raw.is_empty() {
        return Ok(Map::new());
    }

    let value: Value = serde_json::from_str(raw).map_err(|e| {
        Error::protocol_invalid(format!(
            "arguments for '{}' are not valid JSON: {}",
            call.name, e
        ))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::protocol_invalid(format!(
            "arguments for '{}' must be a JSON object, got {}",
            call.name, other
        ))),
    }
}

fn preview(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(120) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}

// ============================================================================
// Tests
// ============================================================================
