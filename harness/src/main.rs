//! Phase-gated workflow harness CLI.
//!
//! Hook subcommands read one JSON payload from stdin and print one JSON
//! response to stdout. They never fail the host: errors are folded into the
//! response and the exit status stays 0.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;

use harness::compact::{CompactEvent, current_phase, handle_pre_compact};
use harness::core::gate::{GateAction, GateName, check};
use harness::core::types::Event;
use harness::env::HookEnv;
use harness::exit_codes;
use harness::io::init::{InitOptions, init_harness};
use harness::logging;
use harness::post_tool::handle_post_tool;
use harness::pre_tool::handle_pre_tool;
use harness::response::{HookResponse, fail_open};
use harness::status::{SessionStartEvent, handle_session_start, workflow_status};
use harness::subagent::{SubagentEvent, handle_subagent_stop};
use harness::user_prompt::{PromptEvent, handle_user_prompt};

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Phase-gated workflow harness for coding agents"
)]
struct Cli {
    /// Project root containing `.harness/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.harness/` scaffolding and the default config.
    Init {
        /// Overwrite the config and `.gitignore` of an existing harness.
        #[arg(short, long)]
        force: bool,
    },
    /// Hook: consult the edit/write gate before a tool runs.
    PreToolUse,
    /// Hook: track context, changes, and tests after a tool ran.
    PostToolUse,
    /// Hook: preserve phase and essential context before compaction.
    PreCompact,
    /// Hook: fold subagent research or plan validation into artifacts.
    SubagentStop,
    /// Hook: summarize workflow state at session start.
    SessionStart,
    /// Hook: suggest delegation or the next phase step for a new prompt.
    UserPromptSubmit,
    /// Print the derived phase as JSON.
    Phase,
    /// Check a phase-transition gate; exits 2 when it blocks.
    Gate {
        #[arg(value_enum)]
        transition: Transition,
    },
    /// Print a human-readable workflow summary.
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transition {
    /// Research to planning.
    Planning,
    /// Planning to implementation.
    Implementation,
    /// Implementation to commit.
    Commit,
}

impl Transition {
    fn gate(self) -> GateName {
        match self {
            Transition::Planning => GateName::ResearchToPlanning,
            Transition::Implementation => GateName::PlanningToImplementation,
            Transition::Commit => GateName::ImplementationToCommit,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli.root.as_path();
    match cli.command {
        Command::Init { force } => {
            init_harness(root, &InitOptions { force })?;
            Ok(exit_codes::OK)
        }
        Command::PreToolUse => run_hook::<Event>(root, "pre-tool-use", handle_pre_tool),
        Command::PostToolUse => run_hook::<Event>(root, "post-tool-use", handle_post_tool),
        Command::PreCompact => run_hook::<CompactEvent>(root, "pre-compact", handle_pre_compact),
        Command::SubagentStop => {
            run_hook::<SubagentEvent>(root, "subagent-stop", handle_subagent_stop)
        }
        Command::SessionStart => {
            run_hook::<SessionStartEvent>(root, "session-start", handle_session_start)
        }
        Command::UserPromptSubmit => {
            run_hook::<PromptEvent>(root, "user-prompt-submit", handle_user_prompt)
        }
        Command::Phase => {
            let env = require_env(root)?;
            let info = current_phase(&env);
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("serialize phase")?
            );
            Ok(exit_codes::OK)
        }
        Command::Gate { transition } => {
            let env = require_env(root)?;
            let result = check(
                transition.gate(),
                env.artifacts(),
                &env.config.gate_settings(),
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("serialize gate result")?
            );
            Ok(match result.action {
                GateAction::Block => exit_codes::BLOCKED,
                GateAction::Allow | GateAction::Warn => exit_codes::OK,
            })
        }
        Command::Status => {
            let env = require_env(root)?;
            println!("{}", workflow_status(&env, false)?);
            Ok(exit_codes::OK)
        }
    }
}

fn require_env(root: &Path) -> Result<HookEnv> {
    HookEnv::open(root)?.ok_or_else(|| {
        anyhow!(
            "{} is not initialized (run `harness init`)",
            root.join(".harness").display()
        )
    })
}

type Handler<E> = fn(&HookEnv, &E) -> Result<HookResponse>;

/// Run one hook and print its response; always exits 0.
fn run_hook<E: DeserializeOwned>(root: &Path, hook: &str, handler: Handler<E>) -> Result<i32> {
    let response = fail_open(hook, dispatch(root, handler));
    println!("{}", response.to_json());
    Ok(exit_codes::OK)
}

fn dispatch<E: DeserializeOwned>(root: &Path, handler: Handler<E>) -> Result<HookResponse> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("read hook payload from stdin")?;
    let Some(env) = HookEnv::open(root)? else {
        return Ok(HookResponse::empty());
    };
    let raw = if raw.trim().is_empty() { "{}" } else { raw.as_str() };
    let event: E = serde_json::from_str(raw).context("parse hook payload")?;
    handler(&env, &event)
}
