//! Read-only view of one battle at one turn
//!
//! Snapshots are produced by the battle engine and never mutated here.
//! Opponent units use the same shape with unrevealed fields left empty.
//! Maps are ordered so that anything derived from a snapshot is stable.

use crate::core::types::BattleTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One move slot of a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveSlot {
    /// Engine identifier, e.g. `quickattack`
    pub id: String,
    #[serde(default)]
    pub move_type: Option<String>,
    #[serde(default)]
    pub base_power: u32,
    #[serde(default)]
    pub current_pp: u32,
    #[serde(default)]
    pub max_pp: u32,
}

impl MoveSlot {
    pub fn new(id: impl Into<String>, base_power: u32, max_pp: u32) -> Self {
        Self {
            id: id.into(),
            move_type: None,
            base_power,
            current_pp: max_pp,
            max_pp,
        }
    }

    pub fn has_full_pp(&self) -> bool {
        self.current_pp >= self.max_pp
    }
}

/// One unit as seen by the observing player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    pub species: String,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub ability: Option<String>,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Remaining health in `0.0..=1.0`
    #[serde(default = "full_health")]
    pub hp_fraction: f32,
    #[serde(default)]
    pub current_hp: Option<u32>,
    #[serde(default)]
    pub max_hp: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub boosts: BTreeMap<String, i32>,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub stats: BTreeMap<String, u32>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub moves: Vec<MoveSlot>,
    #[serde(default)]
    pub fainted: bool,
    #[serde(default)]
    pub active: bool,
}

fn full_health() -> f32 {
    1.0
}

impl Pokemon {
    pub fn new(species: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            level: None,
            ability: None,
            item: None,
            gender: None,
            hp_fraction: 1.0,
            current_hp: None,
            max_hp: None,
            status: None,
            boosts: BTreeMap::new(),
            effects: Vec::new(),
            stats: BTreeMap::new(),
            types: Vec::new(),
            moves: Vec::new(),
            fainted: false,
            active: false,
        }
    }
}

/// Everything the engine exposes about a battle at the current turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub battle_tag: BattleTag,
    pub turn: u32,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub side_conditions: BTreeMap<String, u32>,
    #[serde(default)]
    pub opponent_side_conditions: BTreeMap<String, u32>,
    /// `None` while the active slot is empty (e.g. after a faint)
    #[serde(default)]
    pub active: Option<Pokemon>,
    #[serde(default)]
    pub opponent_active: Option<Pokemon>,
    #[serde(default)]
    pub team: Vec<Pokemon>,
    #[serde(default)]
    pub opponent_team: Vec<Pokemon>,
    #[serde(default)]
    pub available_moves: Vec<MoveSlot>,
    /// Units that may be switched in this turn
    #[serde(default)]
    pub available_switches: Vec<Pokemon>,
    /// Protocol event lines recorded so far, oldest first
    #[serde(default)]
    pub events: Vec<String>,
}

impl BattleSnapshot {
    pub fn new(battle_tag: impl Into<BattleTag>, turn: u32) -> Self {
        Self {
            battle_tag: battle_tag.into(),
            turn,
            weather: None,
            fields: Vec::new(),
            side_conditions: BTreeMap::new(),
            opponent_side_conditions: BTreeMap::new(),
            active: None,
            opponent_active: None,
            team: Vec::new(),
            opponent_team: Vec::new(),
            available_moves: Vec::new(),
            available_switches: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn has_legal_orders(&self) -> bool {
        !self.available_moves.is_empty() || !self.available_switches.is_empty()
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
