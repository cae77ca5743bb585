//! Per-battle free-text notes a model carries across its own turns

use crate::core::types::BattleTag;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scratchpad text keyed by battle, owned by one agent instance
#[derive(Debug, Default)]
pub struct ScratchpadStore {
    notes: Mutex<HashMap<BattleTag, String>>,
}

impl ScratchpadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a note, newline-separated from what is already there
    pub fn append(&self, battle: &BattleTag, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        let mut notes = self.lock();
        let entry = notes.entry(battle.clone()).or_default();
        if !entry.is_empty() {
            entry.push('\n');
        }
        entry.push_str(note);
    }

    pub fn get(&self, battle: &BattleTag) -> Option<String> {
        self.lock().get(battle).cloned()
    }

    pub fn clear(&self, battle: &BattleTag) {
        self.lock().remove(battle);
    }

    /// Number of battles currently holding notes
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BattleTag, String>> {
        match self.notes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
