//! # Shellpilot CLI
//!
//! Command-line interface for the shellpilot agent.
//!
//! Usage:
//!   shellpilot                         # natural-language chat (default)
//!   shellpilot plan "<plan>"           # Builder/Tester loop on a plan
//!   shellpilot shell                   # raw command shell, no model
//!   shellpilot tools                   # list the tool catalog
//!
//! Examples:
//!   shellpilot
//!   shellpilot plan "an express server with CRUD routes for User and Post"
//!   shellpilot -m gpt-4o plan "a static site generator in node"

use clap::{Parser, Subcommand};
use shellpilot_agent::{
    AgentOrchestrator, ConversationSession, OrchestratorConfig, PlanOutcome, SessionConfig,
};
use shellpilot_shell::{CommandShell, OpenAIProvider, ProviderConfig};
use std::io::{BufRead, Write};

const CHAT_PROMPT: &str = "You are a command-line assistant. When needed, use \
the available tools to create directories and files, write, read, or run \
commands. Briefly report to the user what you are doing.";

#[derive(Parser)]
#[command(name = "shellpilot")]
#[command(author, version, about = "Shellpilot - natural-language shell and build agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Model to use (defaults to the provider's default)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Enable verbose output (tool activity, iteration banners)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant over stdin (default)
    Chat,
    /// Run the Builder/Tester loop on a natural-language plan
    Plan {
        /// The plan description
        #[arg(trailing_var_arg = true, required = true)]
        plan: Vec<String>,

        /// Maximum Builder/Tester iterations
        #[arg(long, default_value = "10")]
        max_iterations: usize,

        /// Directory generated code lives in
        #[arg(long, default_value = "workspace")]
        workspace: String,
    },
    /// Interactive raw command shell (no model involved)
    Shell,
    /// Print the tool catalog
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let shell = match CommandShell::new() {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Catalog and dispatch table are declared in two places; refuse to start
    // if they have drifted apart.
    if let Err(e) = shell.verify_catalog() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Tools => {
            println!("{}", shell.catalog().help_text());
        }
        Commands::Shell => run_shell(shell).await,
        Commands::Chat => {
            let provider = build_provider();
            run_chat(&provider, shell, cli.model, cli.verbose).await;
        }
        Commands::Plan {
            plan,
            max_iterations,
            workspace,
        } => {
            let provider = build_provider();
            let config = OrchestratorConfig {
                max_iterations,
                workspace: workspace.into(),
                verbose: true,
                model: cli.model,
            };
            run_plan(&provider, shell, config, &plan.join(" ")).await;
        }
    }
}

fn build_provider() -> OpenAIProvider {
    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        eprintln!("warning: OPENAI_API_KEY is not set");
    }

    let mut config = ProviderConfig::openai(api_key);
    if let Ok(base_url) = std::env::var("SHELLPILOT_BASE_URL") {
        config = config.with_base_url(base_url);
    }

    OpenAIProvider::new(config)
}

/// Natural-language chat: one persistent session, history preserved across
/// turns, until the user types `exit`.
async fn run_chat(
    provider: &OpenAIProvider,
    mut shell: CommandShell,
    model: Option<String>,
    verbose: bool,
) {
    let config = SessionConfig { verbose, model };
    let mut session = ConversationSession::new(provider, &mut shell, CHAT_PROMPT, config);

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        match session.run_turn(line).await {
            Ok(reply) => println!("{}", reply.trim()),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}

/// Raw command REPL over the shell's human surface.
async fn run_shell(mut shell: CommandShell) {
    let stdin = std::io::stdin();
    loop {
        print!("{} $ ", shell.cwd().display());
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        match shell.run_line(line).await {
            Ok(out) => {
                if !out.is_empty() {
                    println!("{}", out);
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}

async fn run_plan(
    provider: &OpenAIProvider,
    shell: CommandShell,
    config: OrchestratorConfig,
    plan: &str,
) {
    let mut orchestrator = AgentOrchestrator::new(provider, shell, config);
    match orchestrator.run_plan(plan).await {
        Ok(PlanOutcome::Success { iterations }) => {
            println!("\nProject approved by the tester after {} iteration(s).", iterations);
        }
        Ok(PlanOutcome::Unresolved {
            iterations,
            feedback,
        }) => {
            println!("\nIteration limit reached after {} round(s).", iterations);
            println!("Last tester feedback:\n{}", feedback);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
