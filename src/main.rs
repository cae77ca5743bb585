//! Poke Arena - Decision CLI
//!
//! Loads a battle snapshot, compiles the prompt an agent would send for it, and
//! either prints that prompt or runs one full decision turn against an offline
//! room.

use clap::{Parser, ValueEnum};
use poke_arena::agent::LlmAgent;
use poke_arena::battle::{BattleSnapshot, OfflineRoom};
use poke_arena::core::config::{AgentConfig, BackendKind, SystemPrompt};
use poke_arena::core::error::{ArenaError, Result};
use poke_arena::llm::compile_prompt;
use std::fs;
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Local,
    Router,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Local => BackendKind::Local,
            Backend::Router => BackendKind::Router,
        }
    }
}

/// Ask a model for one battle decision
#[derive(Parser, Debug)]
#[command(name = "poke-arena")]
#[command(about = "Compile a battle prompt and resolve one model decision")]
struct Args {
    /// Battle snapshot as JSON
    #[arg(long)]
    snapshot: PathBuf,

    /// TOML file with the `system_prompt` key
    #[arg(long, default_value = "data/prompts.toml")]
    prompts: PathBuf,

    /// Which model backend to call
    #[arg(long, value_enum, default_value = "local")]
    backend: Backend,

    /// Model identifier understood by the backend
    #[arg(long, default_value = "qwen3:8b")]
    model: String,

    /// Recent event lines to include (backend default when omitted)
    #[arg(long)]
    history: Option<usize>,

    /// Forfeit once the battle passes this turn
    #[arg(long, default_value_t = 25)]
    max_turns: u32,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Directory for interaction logs
    #[arg(long, default_value = "battle_logs")]
    log_dir: PathBuf,

    /// Print the compiled prompt and exit without calling a model
    #[arg(long)]
    dry_run: bool,

    /// Random seed for the fallback order
    #[arg(long)]
    seed: Option<u64>,

    /// Echo reasoning, scratchpad and chosen action
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("poke_arena=info")),
        )
        .init();

    let args = Args::parse();

    let text = fs::read_to_string(&args.snapshot).map_err(|e| {
        ArenaError::Config(format!("Failed to read snapshot {:?}: {}", args.snapshot, e))
    })?;
    let snapshot = BattleSnapshot::from_json(&text)?;
    let system_prompt = SystemPrompt::load(&args.prompts)?;

    let mut config = AgentConfig::new("cli", args.model.clone(), args.backend.into());
    config.verbosity = args.verbose;
    config.history_len = args.history;
    config.max_turns = args.max_turns;
    config.request_timeout_secs = args.timeout;

    if args.dry_run {
        let prompt = compile_prompt(&system_prompt, &snapshot, config.history_len(), None);
        println!("{}", serde_json::to_string_pretty(&prompt)?);
        return Ok(());
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(
        "Deciding {} turn {} with {} (seed {})",
        snapshot.battle_tag,
        snapshot.turn,
        config.model,
        seed
    );

    let agent = LlmAgent::from_config(config, system_prompt, args.log_dir.clone())?;
    let room = OfflineRoom::new(seed);

    let rt = Runtime::new()?;
    let resolution = rt.block_on(agent.take_turn(&snapshot, &room));

    for (_, message) in room.transcript() {
        println!("chat: {}", message);
    }
    println!("{}", resolution.order);
    tracing::info!("Resolved via {:?}", resolution.path);

    // A single turn has no outcome to log against
    agent.abandon_battle(&snapshot.battle_tag);
    Ok(())
}
