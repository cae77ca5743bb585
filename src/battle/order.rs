//! Orders submitted to the battle engine

use crate::battle::snapshot::BattleSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One action the engine accepts for the current turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BattleOrder {
    /// Use the move with this engine identifier
    Move { id: String },
    /// Switch to the unit with this species name
    Switch { species: String },
    /// Let the engine pick; used when nothing else is legal
    Default,
    Forfeit,
}

impl BattleOrder {
    pub fn use_move(id: impl Into<String>) -> Self {
        BattleOrder::Move { id: id.into() }
    }

    pub fn switch_to(species: impl Into<String>) -> Self {
        BattleOrder::Switch {
            species: species.into(),
        }
    }

    /// Whether the engine would accept this order for the snapshot's turn
    pub fn is_legal_in(&self, snapshot: &BattleSnapshot) -> bool {
        match self {
            BattleOrder::Move { id } => snapshot.available_moves.iter().any(|m| &m.id == id),
            BattleOrder::Switch { species } => snapshot
                .available_switches
                .iter()
                .any(|p| &p.species == species),
            BattleOrder::Default | BattleOrder::Forfeit => true,
        }
    }

    /// Every move and switch legal this turn, moves first
    pub fn legal_orders(snapshot: &BattleSnapshot) -> Vec<BattleOrder> {
        snapshot
            .available_moves
            .iter()
            .map(|m| BattleOrder::use_move(m.id.clone()))
            .chain(
                snapshot
                    .available_switches
                    .iter()
                    .map(|p| BattleOrder::switch_to(p.species.clone())),
            )
            .collect()
    }
}

impl fmt::Display for BattleOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattleOrder::Move { id } => write!(f, "/choose move {}", id),
            BattleOrder::Switch { species } => write!(f, "/choose switch {}", species),
            BattleOrder::Default => f.write_str("/choose default"),
            BattleOrder::Forfeit => f.write_str("/forfeit"),
        }
    }
}
