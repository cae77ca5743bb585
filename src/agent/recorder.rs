//! Interaction Recorder
//!
//! Every turn's prompt and answer is buffered per battle and written out only
//! once the battle's outcome is known. Logs are append-only JSONL files split
//! by model and by outcome class, so winning and losing transcripts can be
//! mined separately and invalid answers never pollute either.

use crate::core::error::Result;
use crate::core::types::{BattleOutcome, BattleTag, ModelId};
use crate::llm::prompt::{Message, PromptRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// One turn awaiting its battle's outcome
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInteraction {
    pub prompt: PromptRecord,
    /// Parsed object, raw text as a string, or null when nothing came back
    pub response: Value,
    pub is_valid: bool,
}

/// One line of a log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionLogEntry {
    pub model: String,
    pub messages: Vec<Message>,
    pub response: Value,
    pub outcome: String,
    pub is_valid_response: bool,
}

/// Which file of a model's log set an entry belongs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogClass {
    Wins,
    Losses,
    Invalid,
}

impl LogClass {
    fn suffix(&self) -> &'static str {
        match self {
            LogClass::Wins => "wins",
            LogClass::Losses => "losses",
            LogClass::Invalid => "invalid",
        }
    }

    /// `None` for valid turns of a tied battle, which are not kept
    fn classify(is_valid: bool, outcome: BattleOutcome) -> Option<LogClass> {
        match (is_valid, outcome) {
            (false, _) => Some(LogClass::Invalid),
            (true, BattleOutcome::Win) => Some(LogClass::Wins),
            (true, BattleOutcome::Loss) => Some(LogClass::Losses),
            (true, BattleOutcome::Tie) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub written: usize,
    pub discarded: usize,
}

pub struct InteractionRecorder {
    model: ModelId,
    log_dir: PathBuf,
    pending: Mutex<HashMap<BattleTag, Vec<PendingInteraction>>>,
}

impl InteractionRecorder {
    pub fn new(model: ModelId, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            log_dir: log_dir.into(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, battle: &BattleTag, interaction: PendingInteraction) {
        self.lock()
            .entry(battle.clone())
            .or_default()
            .push(interaction);
    }

    /// Write every buffered turn of `battle` to its log file and drop the buffer.
    ///
    /// The buffer is released even if writing fails.
    pub fn flush(&self, battle: &BattleTag, outcome: BattleOutcome) -> Result<FlushSummary> {
        let entries = self.lock().remove(battle).unwrap_or_default();
        let mut summary = FlushSummary::default();
        if entries.is_empty() {
            return Ok(summary);
        }

        let mut by_class: HashMap<LogClass, Vec<InteractionLogEntry>> = HashMap::new();
        for entry in entries {
            match LogClass::classify(entry.is_valid, outcome) {
                Some(class) => by_class.entry(class).or_default().push(self.log_entry(entry, outcome)),
                None => summary.discarded += 1,
            }
        }

        fs::create_dir_all(&self.log_dir)?;
        for (class, lines) in by_class {
            append_lines(&self.log_path(class), &lines)?;
            summary.written += lines.len();
        }

        tracing::debug!(
            "Flushed {} interactions of {} for {} ({} discarded)",
            summary.written,
            battle,
            self.model,
            summary.discarded
        );
        Ok(summary)
    }

    /// Drop a battle's buffer without writing anything
    pub fn discard(&self, battle: &BattleTag) -> usize {
        self.lock().remove(battle).map(|e| e.len()).unwrap_or(0)
    }

    pub fn pending_count(&self, battle: &BattleTag) -> usize {
        self.lock().get(battle).map(Vec::len).unwrap_or(0)
    }

    /// Number of battles with buffered turns
    pub fn open_battles(&self) -> usize {
        self.lock().len()
    }

    pub fn log_path(&self, class: LogClass) -> PathBuf {
        self.log_dir
            .join(format!("{}_{}.jsonl", self.model.sanitized(), class.suffix()))
    }

    fn log_entry(&self, pending: PendingInteraction, outcome: BattleOutcome) -> InteractionLogEntry {
        InteractionLogEntry {
            model: self.model.to_string(),
            messages: pending.prompt.messages().to_vec(),
            response: pending.response,
            outcome: if pending.is_valid {
                outcome.as_str().to_string()
            } else {
                "invalid".to_string()
            },
            is_valid_response: pending.is_valid,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BattleTag, Vec<PendingInteraction>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn append_lines(path: &Path, lines: &[InteractionLogEntry]) -> Result<()> {
    let mut text = String::new();
    for line in lines {
        text.push_str(&serde_json::to_string(line)?);
        text.push('\n');
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn turn(valid: bool, response: Value) -> PendingInteraction {
        PendingInteraction {
            prompt: PromptRecord::new("sys", "state"),
            response,
            is_valid: valid,
        }
    }

    fn read_entries(path: &Path) -> Vec<InteractionLogEntry> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_flush_partitions_by_outcome_and_validity() {
        let dir = TempDir::new().unwrap();
        let recorder = InteractionRecorder::new(ModelId::new("openai/gpt-5"), dir.path());
        let tag = BattleTag::new("battle-1");
        recorder.record(&tag, turn(true, json!({"action": "surf"})));
        recorder.record(&tag, turn(false, json!("not json")));
        recorder.record(&tag, turn(true, json!({"action": "icebeam"})));

        let summary = recorder.flush(&tag, BattleOutcome::Win).unwrap();
        assert_eq!(summary, FlushSummary { written: 3, discarded: 0 });
        assert_eq!(recorder.pending_count(&tag), 0);

        let wins = read_entries(&dir.path().join("openai_gpt-5_wins.jsonl"));
        assert_eq!(wins.len(), 2);
        assert_eq!(wins[0].model, "openai/gpt-5");
        assert_eq!(wins[0].outcome, "win");
        assert_eq!(wins[0].messages.len(), 2);

        let invalid = read_entries(&recorder.log_path(LogClass::Invalid));
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].outcome, "invalid");
        assert!(!invalid[0].is_valid_response);
        assert_eq!(invalid[0].response, json!("not json"));
        assert!(!recorder.log_path(LogClass::Losses).exists());
    }

    #[test]
    fn test_flush_appends() {
        let dir = TempDir::new().unwrap();
        let recorder = InteractionRecorder::new(ModelId::new("qwen3:8b"), dir.path());
        for n in 0..2 {
            let tag = BattleTag::new(format!("battle-{}", n));
            recorder.record(&tag, turn(true, json!({"action": "tackle"})));
            recorder.flush(&tag, BattleOutcome::Loss).unwrap();
        }
        let losses = read_entries(&dir.path().join("qwen3_8b_losses.jsonl"));
        assert_eq!(losses.len(), 2);
    }

    #[test]
    fn test_tie_keeps_only_invalid() {
        let dir = TempDir::new().unwrap();
        let recorder = InteractionRecorder::new(ModelId::new("m"), dir.path());
        let tag = BattleTag::new("battle-1");
        recorder.record(&tag, turn(true, json!({})));
        recorder.record(&tag, turn(false, Value::Null));

        let summary = recorder.flush(&tag, BattleOutcome::Tie).unwrap();
        assert_eq!(summary, FlushSummary { written: 1, discarded: 1 });
        assert_eq!(read_entries(&recorder.log_path(LogClass::Invalid)).len(), 1);
    }

    #[test]
    fn test_battles_buffer_independently() {
        let dir = TempDir::new().unwrap();
        let recorder = InteractionRecorder::new(ModelId::new("m"), dir.path());
        let one = BattleTag::new("battle-1");
        let two = BattleTag::new("battle-2");
        recorder.record(&one, turn(true, json!({})));
        recorder.record(&two, turn(true, json!({})));
        recorder.record(&two, turn(true, json!({})));

        recorder.flush(&one, BattleOutcome::Win).unwrap();
        assert_eq!(recorder.pending_count(&two), 2);
        assert_eq!(recorder.discard(&two), 2);
        assert_eq!(recorder.open_battles(), 0);
    }

    #[test]
    fn test_flush_without_entries_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let recorder = InteractionRecorder::new(ModelId::new("m"), dir.path().join("logs"));
        let summary = recorder.flush(&BattleTag::new("battle-1"), BattleOutcome::Win).unwrap();
        assert_eq!(summary, FlushSummary::default());
        assert!(!dir.path().join("logs").exists());
    }
}
