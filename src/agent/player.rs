//! Players: the language-model agent and the shared player interface
//!
//! A player is asked for one order per turn and told once how each battle
//! ended. [`LlmAgent`] owns all per-battle state (scratchpads, buffered
//! interactions, turn gates) so separate agent instances never share anything.

use crate::agent::recorder::{InteractionRecorder, PendingInteraction};
use crate::agent::scratchpad::ScratchpadStore;
use crate::battle::order::BattleOrder;
use crate::battle::room::{notify_best_effort, BattleRoom};
use crate::battle::snapshot::BattleSnapshot;
use crate::core::config::{AgentConfig, SystemPrompt};
use crate::core::error::Result;
use crate::core::types::{BattleOutcome, BattleTag, BoxFuture};
use crate::llm::client::{build_backend, DecisionBackend};
use crate::llm::parser::{resolve, Resolution, ResolutionPath};
use crate::llm::prompt::compile_prompt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Anything that can play a side of a battle
pub trait Player: Send + Sync {
    fn username(&self) -> &str;

    /// Pick this turn's order; never fails, the worst case is a random legal order
    fn choose_order<'a>(
        &'a self,
        snapshot: &'a BattleSnapshot,
        room: &'a dyn BattleRoom,
    ) -> BoxFuture<'a, BattleOrder>;

    /// Completion callback, invoked once per battle
    fn battle_finished(&self, battle: &BattleTag, outcome: BattleOutcome);

    fn record(&self) -> BattleRecord;
}

/// Win/loss/tie counts of one player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BattleRecord {
    pub won: u32,
    pub lost: u32,
    pub tied: u32,
}

impl BattleRecord {
    pub fn finished(&self) -> u32 {
        self.won + self.lost + self.tied
    }

    /// Wins over finished battles; 0.0 before any battle finished
    pub fn win_rate(&self) -> f64 {
        match self.finished() {
            0 => 0.0,
            n => f64::from(self.won) / f64::from(n),
        }
    }
}

/// Thread-safe outcome counter shared by every player implementation
#[derive(Debug, Default)]
pub struct Tally {
    won: AtomicU32,
    lost: AtomicU32,
    tied: AtomicU32,
}

impl Tally {
    pub fn note(&self, outcome: BattleOutcome) {
        let counter = match outcome {
            BattleOutcome::Win => &self.won,
            BattleOutcome::Loss => &self.lost,
            BattleOutcome::Tie => &self.tied,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self) -> BattleRecord {
        BattleRecord {
            won: self.won.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            tied: self.tied.load(Ordering::Relaxed),
        }
    }
}

type TurnGate = Arc<tokio::sync::Mutex<()>>;

/// A player whose orders come from a language model
pub struct LlmAgent {
    config: AgentConfig,
    system_prompt: SystemPrompt,
    backend: Box<dyn DecisionBackend>,
    scratchpads: ScratchpadStore,
    recorder: InteractionRecorder,
    /// One decision in flight per battle
    turn_gates: Mutex<HashMap<BattleTag, TurnGate>>,
    tally: Tally,
}

impl LlmAgent {
    pub fn new(
        config: AgentConfig,
        system_prompt: SystemPrompt,
        backend: Box<dyn DecisionBackend>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        let recorder = InteractionRecorder::new(config.model.clone(), log_dir);
        Self {
            config,
            system_prompt,
            backend,
            scratchpads: ScratchpadStore::new(),
            recorder,
            turn_gates: Mutex::new(HashMap::new()),
            tally: Tally::default(),
        }
    }

    /// Build the agent with the backend its configuration selects
    pub fn from_config(
        config: AgentConfig,
        system_prompt: SystemPrompt,
        log_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let backend = build_backend(&config)?;
        Ok(Self::new(config, system_prompt, backend, log_dir))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one full turn: turn limit, prompt, model call, resolution, side effects
    pub async fn take_turn(&self, snapshot: &BattleSnapshot, room: &dyn BattleRoom) -> Resolution {
        let battle = &snapshot.battle_tag;
        let gate = self.turn_gate(battle);
        let _turn = gate.lock().await;

        if snapshot.turn > self.config.max_turns {
            tracing::info!(
                "{} forfeits {} at turn {} (limit {})",
                self.config.username,
                battle,
                snapshot.turn,
                self.config.max_turns
            );
            self.scratchpads.clear(battle);
            return Resolution::forfeit();
        }

        let notes = self.scratchpads.get(battle);
        let prompt = compile_prompt(
            &self.system_prompt,
            snapshot,
            self.config.history_len(),
            notes.as_deref(),
        );

        let reply = match self.backend.submit(&prompt, &self.config.model).await {
            Ok(text) => Some(text),
            Err(err) if err.is_transport() => {
                tracing::warn!(
                    "Decision request for {} turn {} failed ({}): {}",
                    battle,
                    snapshot.turn,
                    self.config.model,
                    err
                );
                None
            }
            Err(err) => {
                tracing::error!(
                    "{} backend error outside the model call for {} turn {}: {}",
                    self.config.model,
                    battle,
                    snapshot.turn,
                    err
                );
                None
            }
        };

        let resolution = resolve(reply.as_deref(), snapshot, room);

        if let Some(decision) = &resolution.decision {
            if let Some(reasoning) = decision.reasoning.as_deref().filter(|r| !r.trim().is_empty()) {
                notify_best_effort(room, battle, reasoning).await;
            }
            if let Some(note) = decision.scratchpad.as_deref() {
                self.scratchpads.append(battle, note);
            }
        }

        if self.config.verbosity {
            self.print_turn(snapshot, &resolution);
        }

        let response = match (&resolution.decision, reply) {
            (Some(decision), _) => decision.raw.clone(),
            (None, Some(text)) => Value::String(text),
            (None, None) => Value::Null,
        };
        self.recorder.record(
            battle,
            PendingInteraction {
                prompt,
                response,
                is_valid: resolution.is_valid(),
            },
        );

        resolution
    }

    /// Release everything held for a battle that ended without an outcome
    pub fn abandon_battle(&self, battle: &BattleTag) {
        self.scratchpads.clear(battle);
        self.lock_gates().remove(battle);
        let dropped = self.recorder.discard(battle);
        tracing::info!(
            "{} abandoned {} ({} buffered turns dropped)",
            self.config.username,
            battle,
            dropped
        );
    }

    pub fn scratchpad(&self, battle: &BattleTag) -> Option<String> {
        self.scratchpads.get(battle)
    }

    pub fn pending_interactions(&self, battle: &BattleTag) -> usize {
        self.recorder.pending_count(battle)
    }

    /// Battles that still hold any per-battle state
    pub fn open_battles(&self) -> usize {
        self.lock_gates().len()
    }

    fn turn_gate(&self, battle: &BattleTag) -> TurnGate {
        self.lock_gates().entry(battle.clone()).or_default().clone()
    }

    fn lock_gates(&self) -> MutexGuard<'_, HashMap<BattleTag, TurnGate>> {
        match self.turn_gates.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn print_turn(&self, snapshot: &BattleSnapshot, resolution: &Resolution) {
        println!("=== {} | {} turn {} ===", self.config.username, snapshot.battle_tag, snapshot.turn);
        if let Some(decision) = &resolution.decision {
            if let Some(reasoning) = &decision.reasoning {
                println!("Reasoning: {}", reasoning);
            }
        }
        if let Some(notes) = self.scratchpads.get(&snapshot.battle_tag) {
            println!("Scratchpad:\n{}", notes);
        }
        match resolution.path {
            ResolutionPath::Fallback(reason) => {
                println!("Action: {} (random fallback: {})", resolution.order, reason)
            }
            _ => println!("Action: {}", resolution.order),
        }
    }
}

impl Player for LlmAgent {
    fn username(&self) -> &str {
        &self.config.username
    }

    fn choose_order<'a>(
        &'a self,
        snapshot: &'a BattleSnapshot,
        room: &'a dyn BattleRoom,
    ) -> BoxFuture<'a, BattleOrder> {
        Box::pin(async move { self.take_turn(snapshot, room).await.order })
    }

    fn battle_finished(&self, battle: &BattleTag, outcome: BattleOutcome) {
        self.tally.note(outcome);
        self.scratchpads.clear(battle);
        self.lock_gates().remove(battle);

        match self.recorder.flush(battle, outcome) {
            Ok(summary) => tracing::info!(
                "{} finished {} with a {}: {} turns logged",
                self.config.username,
                battle,
                outcome.as_str(),
                summary.written
            ),
            Err(err) => tracing::warn!(
                "Failed to write interaction log for {} ({}): {}",
                battle,
                self.config.model,
                err
            ),
        }
    }

    fn record(&self) -> BattleRecord {
        self.tally.record()
    }
}
