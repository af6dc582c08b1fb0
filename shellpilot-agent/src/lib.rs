//! # Shellpilot Agent
//!
//! The conversation layer: a tool-calling session between one LLM provider
//! and one command shell, and a Builder/Tester orchestrator that iterates a
//! natural-language plan into a working project.

pub mod orchestrator;
pub mod session;

pub use orchestrator::{AgentOrchestrator, OrchestratorConfig, PlanOutcome};
pub use session::{ConversationSession, SessionConfig};
