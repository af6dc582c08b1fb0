//! Build/test orchestration - two roles iterating toward a working project
//!
//! The orchestrator drives a Builder session that produces code in a shared
//! workspace and a Tester session that verifies it, feeding the Tester's
//! findings back into the next Builder round until the Tester signs off or
//! the iteration budget runs out.

use crate::session::{ConversationSession, SessionConfig};
use serde_json::{Map, Value};
use shellpilot_error::Result;
use shellpilot_shell::{CommandShell, LlmProvider};
use std::path::PathBuf;

/// Configuration for a Builder/Tester run
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum Builder/Tester rounds before giving up
    pub max_iterations: usize,
    /// Directory all generated code lives in, created if absent
    pub workspace: PathBuf,
    /// Print iteration banners and role replies to stdout
    pub verbose: bool,
    /// Override the provider's default model
    pub model: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            workspace: PathBuf::from("workspace"),
            verbose: false,
            model: None,
        }
    }
}

/// How a plan run ended.
///
/// Running out of iterations is a normal outcome, not an error: the caller
/// gets the last Tester feedback and decides what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The Tester approved the project
    Success { iterations: usize },
    /// The iteration budget ran out with the Tester still unsatisfied
    Unresolved { iterations: usize, feedback: String },
}

/// Drives the Builder/Tester loop over one shared shell.
///
/// Both roles work in the same workspace directory so the Tester sees exactly
/// what the Builder produced; each role gets a fresh session every iteration,
/// only the feedback text carries over.
pub struct AgentOrchestrator<'a, P: LlmProvider> {
    provider: &'a P,
    shell: CommandShell,
    config: OrchestratorConfig,
}

impl<'a, P: LlmProvider> AgentOrchestrator<'a, P> {
    pub fn new(provider: &'a P, shell: CommandShell, config: OrchestratorConfig) -> Self {
        Self {
            provider,
            shell,
            config,
        }
    }

    /// Run the Builder/Tester loop for one natural-language plan.
    pub async fn run_plan(&mut self, plan: &str) -> Result<PlanOutcome> {
        self.enter_workspace().await?;

        let session_config = SessionConfig {
            verbose: self.config.verbose,
            model: self.config.model.clone(),
        };

        let mut feedback = String::new();
        for iteration in 1..=self.config.max_iterations {
            if self.config.verbose {
                println!("\n===== iteration {} =====", iteration);
            }

            let builder_user = if feedback.is_empty() {
                format!("Plan:\n{}", plan)
            } else {
                format!("Problems to fix:\n{}", feedback)
            };

            let builder_reply = {
                let mut session = ConversationSession::new(
                    self.provider,
                    &mut self.shell,
                    BUILDER_PROMPT,
                    session_config.clone(),
                );
                session.run_turn(&builder_user).await?
            };
            if self.config.verbose {
                println!("Builder:\n{}", builder_reply.trim());
            }

            let tester_reply = {
                let mut session = ConversationSession::new(
                    self.provider,
                    &mut self.shell,
                    tester_prompt(),
                    session_config.clone(),
                );
                session.run_turn("Test the project.").await?
            };
            if self.config.verbose {
                println!("Tester:\n{}", tester_reply.trim());
            }

            let trimmed = tester_reply.trim();
            if trimmed.starts_with("SUCCESS") {
                return Ok(PlanOutcome::Success { iterations: iteration });
            }

            let detail = trimmed
                .strip_prefix("FAIL")
                .map(str::trim)
                .unwrap_or(trimmed);
            feedback = if detail.is_empty() {
                "Unknown failure".to_string()
            } else {
                detail.to_string()
            };
        }

        Ok(PlanOutcome::Unresolved {
            iterations: self.config.max_iterations,
            feedback,
        })
    }

    /// Create the workspace directory if needed and move the shell into it.
    async fn enter_workspace(&mut self) -> Result<()> {
        let workspace = self.config.workspace.display().to_string();
        let mut args = Map::new();
        args.insert("path".to_string(), Value::String(workspace));
        self.shell.dispatch("mkdir", &args).await?;
        self.shell.dispatch("cd", &args).await?;
        Ok(())
    }
}

const BUILDER_PROMPT: &str = "\
You are the BUILDER. Your goal is to PRODUCE code in the current working \
directory that fulfills the plan.
- Use mkdir, write, touch, rm, exec and the other tools; you are already \
positioned inside the project workspace.
- Create any manifest or entry point the project needs before writing the \
rest of the code.
- Install dependencies with exec (for example 'exec npm install express \
--silent --yes' for a Node project).
- Run the program with exec ('exec npm start' or 'exec node index.js') to \
check it before handing off to the TESTER.
- Add log output at strategic points to ease debugging.";

/// The Tester prompt, with the stop-the-server instruction rendered for the
/// platform the shell actually runs on.
fn tester_prompt() -> String {
    let kill = if cfg!(windows) {
        "exec taskkill /IM node.exe /F"
    } else {
        "exec pkill -f node"
    };

    format!(
        "\
You are the TESTER. Your mission is to GUARANTEE that the project implements \
the plan faithfully and that it actually runs.

Mandatory procedure each iteration:
1. Map the files
   - Use 'tree' to list the structure of the current directory.
   - Read the key files with 'read': manifest, entry point, routes, models.
   - Check that the code covers EVERY entity and feature the plan asks for.
2. Check dependencies and scripts
   - If a manifest exists but lacks a start script, reply FAIL explaining why.
   - If dependencies are missing, install them with exec.
   - If there is no manifest at all, reply FAIL.
3. Start the project
   - Try 'exec npm start'; if there is no script, try 'exec node index.js'.
   - If the port is busy, stop the previous process first ('{kill}').
4. Functional probe
   - Give the server a moment to come up, then probe it:
       'exec curl http://localhost:3000/ --max-time 5'
     (adjust the endpoint to what the plan requires).
   - Expect HTTP 200 or valid JSON. A 404, 500 or timeout is a failure.
5. Shut the server down
   - After the probe, free the port: '{kill}'.
6. Verdict
   - Reply exactly SUCCESS (uppercase, nothing else on the first line) only \
when every point above passes.
   - Otherwise reply FAIL, then a newline, then a detailed description of the \
problems found (console errors, missing routes, missing dependencies, ...).

Expected output examples:
  SUCCESS
or
  FAIL
  Route /api/posts returns 404",
        kill = kill
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shellpilot_shell::provider::{
        CompletionRequest, CompletionResponse, FinishReason, ProviderError, Usage,
    };
    use shellpilot_shell::Role;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Provider that replays fixed responses and records every request.
    struct ScriptedProvider {
        responses: Mutex<Vec<CompletionResponse>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(mut responses: Vec<CompletionResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted-1"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::Other("script exhausted".into()))
        }
    }

    fn text_response(content: &str) -> CompletionResponse {
        CompletionResponse {
            id: "resp".into(),
            model: "scripted-1".into(),
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    fn config(dir: &TempDir) -> OrchestratorConfig {
        OrchestratorConfig {
            workspace: dir.path().join("project"),
            ..OrchestratorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_success_on_first_iteration() {
        let dir = TempDir::new().unwrap();
        let shell = CommandShell::with_cwd(dir.path());
        let provider = ScriptedProvider::new(vec![
            text_response("built it"),
            text_response("SUCCESS"),
        ]);

        let mut orchestrator = AgentOrchestrator::new(&provider, shell, config(&dir));
        let outcome = orchestrator.run_plan("make a project").await.unwrap();

        assert_eq!(outcome, PlanOutcome::Success { iterations: 1 });
        assert!(dir.path().join("project").is_dir());
    }

    #[tokio::test]
    async fn test_tester_feedback_reaches_next_builder() {
        let dir = TempDir::new().unwrap();
        let shell = CommandShell::with_cwd(dir.path());
        let provider = ScriptedProvider::new(vec![
            text_response("built it"),
            text_response("FAIL\nroute /api/users returns 404"),
            text_response("fixed it"),
            text_response("SUCCESS"),
        ]);

        let mut orchestrator = AgentOrchestrator::new(&provider, shell, config(&dir));
        let outcome = orchestrator.run_plan("make a project").await.unwrap();
        assert_eq!(outcome, PlanOutcome::Success { iterations: 2 });

        // The second Builder round opens with the Tester's findings, not the
        // original plan.
        let requests = provider.requests.lock().unwrap();
        let second_builder_user = requests[2]
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.clone())
            .unwrap();
        assert!(second_builder_user.contains("route /api/users returns 404"));
        assert!(!second_builder_user.contains("make a project"));
    }

    #[tokio::test]
    async fn test_iteration_budget_exhaustion_is_unresolved() {
        let dir = TempDir::new().unwrap();
        let shell = CommandShell::with_cwd(dir.path());
        let provider = ScriptedProvider::new(vec![
            text_response("built it"),
            text_response("FAIL\nstill broken"),
            text_response("tried again"),
            text_response("FAIL\nstill broken"),
        ]);

        let mut orchestrator = AgentOrchestrator::new(
            &provider,
            shell,
            OrchestratorConfig {
                max_iterations: 2,
                ..config(&dir)
            },
        );
        let outcome = orchestrator.run_plan("make a project").await.unwrap();

        assert_eq!(
            outcome,
            PlanOutcome::Unresolved {
                iterations: 2,
                feedback: "still broken".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_fresh_sessions_per_role() {
        let dir = TempDir::new().unwrap();
        let shell = CommandShell::with_cwd(dir.path());
        let provider = ScriptedProvider::new(vec![
            text_response("built it"),
            text_response("SUCCESS"),
        ]);

        let mut orchestrator = AgentOrchestrator::new(&provider, shell, config(&dir));
        orchestrator.run_plan("make a project").await.unwrap();

        // Each role starts from its own system prompt plus one user message.
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        for request in requests.iter() {
            assert_eq!(request.messages[0].role, Role::System);
            assert_eq!(request.messages.len(), 2);
        }
        assert_ne!(
            requests[0].messages[0].content,
            requests[1].messages[0].content
        );
    }

    #[test]
    fn test_tester_prompt_names_platform_kill_command() {
        let prompt = tester_prompt();
        if cfg!(windows) {
            assert!(prompt.contains("taskkill"));
        } else {
            assert!(prompt.contains("pkill"));
        }
        assert!(prompt.contains("SUCCESS"));
        assert!(prompt.contains("--max-time 5"));
    }
}
