//! Agent turn loop integration tests

use poke_arena::agent::{LlmAgent, Player};
use poke_arena::battle::{BattleOrder, BattleSnapshot, MoveSlot, OfflineRoom, Pokemon};
use poke_arena::core::config::{AgentConfig, BackendKind, SystemPrompt};
use poke_arena::core::error::{ArenaError, Result};
use poke_arena::core::types::{BattleOutcome, BattleTag, BoxFuture, ModelId};
use poke_arena::llm::{DecisionBackend, FallbackReason, PromptRecord, ResolutionPath};
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Hands out queued replies in order and remembers every prompt it saw
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<Option<String>>>,
    prompts: Arc<Mutex<Vec<PromptRecord>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    fn new(replies: &[Option<&str>]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.map(str::to_string)).collect()),
            ..Self::default()
        }
    }
}

impl DecisionBackend for ScriptedBackend {
    fn submit<'a>(
        &'a self,
        prompt: &'a PromptRecord,
        _model: &'a ModelId,
    ) -> BoxFuture<'a, Result<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        let reply = self.replies.lock().unwrap().pop_front().flatten();
        Box::pin(async move { reply.ok_or_else(|| ArenaError::Transport("connection reset".into())) })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Router
    }
}

/// Writes a note naming whichever battle's active unit it was shown
struct EchoBackend {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl EchoBackend {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl DecisionBackend for EchoBackend {
    fn submit<'a>(
        &'a self,
        prompt: &'a PromptRecord,
        _model: &'a ModelId,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let owner = if prompt.user().contains("Pikachu") { "pikachu" } else { "eevee" };
            Ok(serde_json::json!({
                "reasoning": "keep attacking",
                "action": "tackle",
                "scratchpad": format!("seen by {}", owner),
            })
            .to_string())
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}

fn config() -> AgentConfig {
    AgentConfig::new("tester", "openai/gpt-5", BackendKind::Router)
}

fn system() -> SystemPrompt {
    SystemPrompt::new("Choose one legal action and answer in JSON.")
}

fn snapshot(tag: &str, turn: u32, active: &str) -> BattleSnapshot {
    let mut snapshot = BattleSnapshot::new(tag, turn);
    snapshot.active = Some(Pokemon::new(active));
    snapshot.available_moves = vec![
        MoveSlot::new("quickattack", 40, 30),
        MoveSlot::new("tackle", 40, 35),
    ];
    snapshot.available_switches = vec![Pokemon::new("Charizard")];
    snapshot
}

fn read_lines(path: &std::path::Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_move_resolved_and_reasoning_sent_to_chat() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[Some(r#"{"reasoning":"go fast","action":"quickattack"}"#)]);
    let agent = LlmAgent::new(config(), system(), Box::new(backend), dir.path());
    let room = OfflineRoom::new(1);

    let snap = snapshot("battle-1", 2, "Pikachu");
    let resolution = agent.take_turn(&snap, &room).await;

    assert_eq!(resolution.order, BattleOrder::use_move("quickattack"));
    assert_eq!(resolution.path, ResolutionPath::Move);
    assert_eq!(
        room.transcript(),
        vec![(BattleTag::new("battle-1"), "go fast".to_string())]
    );
}

#[tokio::test]
async fn test_switch_without_reasoning_sends_no_chat() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[Some(r#"{"action":"Charizard"}"#)]);
    let agent = LlmAgent::new(config(), system(), Box::new(backend), dir.path());
    let room = OfflineRoom::new(1);

    let resolution = agent.take_turn(&snapshot("battle-1", 2, "Pikachu"), &room).await;
    assert_eq!(resolution.order, BattleOrder::switch_to("Charizard"));
    assert!(room.transcript().is_empty());
}

#[tokio::test]
async fn test_chat_failure_does_not_block_resolution() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[Some(r#"{"reasoning":"hi","action":"tackle"}"#)]);
    let agent = LlmAgent::new(config(), system(), Box::new(backend), dir.path());
    let room = OfflineRoom::without_chat(1);

    let resolution = agent.take_turn(&snapshot("battle-1", 2, "Pikachu"), &room).await;
    assert_eq!(resolution.order, BattleOrder::use_move("tackle"));
}

#[tokio::test]
async fn test_not_json_falls_back_and_logs_invalid() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[
        Some("not json"),
        Some(r#"{"reasoning":"finish it","action":"tackle"}"#),
    ]);
    let agent = LlmAgent::new(config(), system(), Box::new(backend), dir.path());
    let room = OfflineRoom::new(5);
    let tag = BattleTag::new("battle-1");

    let first = snapshot("battle-1", 1, "Pikachu");
    let resolution = agent.take_turn(&first, &room).await;
    assert_eq!(
        resolution.path,
        ResolutionPath::Fallback(FallbackReason::Unparsable)
    );
    assert!(resolution.order.is_legal_in(&first));

    agent.take_turn(&snapshot("battle-1", 2, "Pikachu"), &room).await;
    agent.battle_finished(&tag, BattleOutcome::Loss);

    let invalid = read_lines(&dir.path().join("openai_gpt-5_invalid.jsonl"));
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0]["outcome"], "invalid");
    assert_eq!(invalid[0]["is_valid_response"], false);
    assert_eq!(invalid[0]["response"], "not json");
    assert_eq!(invalid[0]["model"], "openai/gpt-5");
    assert_eq!(invalid[0]["messages"][0]["role"], "system");

    let losses = read_lines(&dir.path().join("openai_gpt-5_losses.jsonl"));
    assert_eq!(losses.len(), 1);
    assert_eq!(losses[0]["outcome"], "loss");
    assert_eq!(losses[0]["response"]["action"], "tackle");
}

#[tokio::test]
async fn test_backend_failure_logs_null_response() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[None]);
    let agent = LlmAgent::new(config(), system(), Box::new(backend), dir.path());
    let room = OfflineRoom::new(5);

    let resolution = agent.take_turn(&snapshot("battle-1", 1, "Pikachu"), &room).await;
    assert_eq!(resolution.path, ResolutionPath::Fallback(FallbackReason::NoReply));

    agent.battle_finished(&BattleTag::new("battle-1"), BattleOutcome::Win);
    let invalid = read_lines(&dir.path().join("openai_gpt-5_invalid.jsonl"));
    assert_eq!(invalid[0]["response"], Value::Null);
}

#[tokio::test]
async fn test_turn_limit_forfeits_without_calling_backend() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[Some(r#"{"action":"tackle"}"#)]);
    let calls = backend.calls.clone();
    let mut config = config();
    config.max_turns = 25;
    let agent = LlmAgent::new(config, system(), Box::new(backend), dir.path());

    let resolution = agent
        .take_turn(&snapshot("battle-1", 26, "Pikachu"), &OfflineRoom::new(1))
        .await;
    assert_eq!(resolution.order, BattleOrder::Forfeit);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(agent.pending_interactions(&BattleTag::new("battle-1")), 0);
}

#[tokio::test]
async fn test_scratchpad_reaches_next_prompt() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(&[
        Some(r#"{"action":"tackle","scratchpad":"foe carries choice band"}"#),
        Some(r#"{"action":"tackle"}"#),
    ]);
    let prompts = backend.prompts.clone();
    let agent = LlmAgent::new(config(), system(), Box::new(backend), dir.path());
    let room = OfflineRoom::new(1);

    agent.take_turn(&snapshot("battle-1", 1, "Pikachu"), &room).await;
    agent.take_turn(&snapshot("battle-1", 2, "Pikachu"), &room).await;

    let prompts = prompts.lock().unwrap();
    assert!(!prompts[0].user().contains("[SCRATCHPAD]"));
    assert!(prompts[1]
        .user()
        .ends_with("[SCRATCHPAD]\nfoe carries choice band"));
}

#[tokio::test]
async fn test_concurrent_battles_keep_separate_scratchpads() {
    let dir = TempDir::new().unwrap();
    let agent = LlmAgent::new(config(), system(), Box::new(EchoBackend::new()), dir.path());
    let room = OfflineRoom::new(1);

    let one = async {
        for turn in 1..=3 {
            agent.take_turn(&snapshot("battle-1", turn, "Pikachu"), &room).await;
        }
    };
    let two = async {
        for turn in 1..=3 {
            agent.take_turn(&snapshot("battle-2", turn, "Eevee"), &room).await;
        }
    };
    tokio::join!(one, two);

    let first = agent.scratchpad(&BattleTag::new("battle-1")).unwrap();
    let second = agent.scratchpad(&BattleTag::new("battle-2")).unwrap();
    assert_eq!(first.lines().count(), 3);
    assert!(first.lines().all(|l| l == "seen by pikachu"));
    assert!(!first.contains("eevee"));
    assert!(second.lines().all(|l| l == "seen by eevee"));
}

#[tokio::test]
async fn test_one_decision_in_flight_per_battle() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(EchoBackend::new());
    let agent = LlmAgent::new(
        config(),
        system(),
        Box::new(SharedEcho(backend.clone())),
        dir.path(),
    );
    let room = OfflineRoom::new(1);

    let a = snapshot("battle-1", 1, "Pikachu");
    let b = snapshot("battle-1", 2, "Pikachu");
    tokio::join!(agent.take_turn(&a, &room), agent.take_turn(&b, &room));
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);

    // Different battles do progress side by side
    let c = snapshot("battle-2", 1, "Eevee");
    let d = snapshot("battle-3", 1, "Eevee");
    tokio::join!(agent.take_turn(&c, &room), agent.take_turn(&d, &room));
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 2);
}

struct SharedEcho(Arc<EchoBackend>);

impl DecisionBackend for SharedEcho {
    fn submit<'a>(
        &'a self,
        prompt: &'a PromptRecord,
        model: &'a ModelId,
    ) -> BoxFuture<'a, Result<String>> {
        self.0.submit(prompt, model)
    }

    fn kind(&self) -> BackendKind {
        self.0.kind()
    }
}

#[tokio::test]
async fn test_finished_battle_releases_state() {
    let dir = TempDir::new().unwrap();
    let agent = LlmAgent::new(config(), system(), Box::new(EchoBackend::new()), dir.path());
    let room = OfflineRoom::new(1);
    let tag = BattleTag::new("battle-1");

    agent.take_turn(&snapshot("battle-1", 1, "Pikachu"), &room).await;
    assert!(agent.scratchpad(&tag).is_some());
    assert_eq!(agent.open_battles(), 1);

    agent.battle_finished(&tag, BattleOutcome::Tie);
    assert!(agent.scratchpad(&tag).is_none());
    assert_eq!(agent.pending_interactions(&tag), 0);
    assert_eq!(agent.open_battles(), 0);
    assert_eq!(agent.record().tied, 1);
    // Valid turns of a tie are not kept
    assert!(!dir.path().join("openai_gpt-5_wins.jsonl").exists());
    assert!(!dir.path().join("openai_gpt-5_losses.jsonl").exists());
}
