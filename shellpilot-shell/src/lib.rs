//! # Shellpilot Shell
//!
//! The command layer of shellpilot: a tool catalog an LLM can call into, and
//! the stateful shell that executes those calls.
//!
//! ## Core Concepts
//! - **ToolCatalog**: Static schema for the 15 command families, rendered as
//!   tool definitions for the model and as a help screen for humans
//! - **CommandShell**: Stateful interpreter (current directory, filesystem,
//!   subprocesses, HTTP fetch)
//! - **Provider**: Trait-based LLM communication over OpenAI-compatible APIs

pub mod catalog;
pub mod provider;
pub mod shell;

pub use catalog::{CommandSpec, ParamKind, ParamSpec, ToolCatalog};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, OpenAIProvider,
    ProviderConfig, ProviderError, Role, ToolCall, ToolChoice, ToolDefinition, Usage, UsageTracker,
};
pub use shell::CommandShell;
