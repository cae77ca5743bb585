//! Fixed-strategy players used as reference points in tournaments

use crate::agent::player::{BattleRecord, Player, Tally};
use crate::battle::order::BattleOrder;
use crate::battle::room::BattleRoom;
use crate::battle::snapshot::BattleSnapshot;
use crate::core::types::{BattleOutcome, BattleTag, BoxFuture};

/// Always plays the engine's random legal order
pub struct RandomBot {
    username: String,
    tally: Tally,
}

impl RandomBot {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            tally: Tally::default(),
        }
    }
}

impl Player for RandomBot {
    fn username(&self) -> &str {
        &self.username
    }

    fn choose_order<'a>(
        &'a self,
        snapshot: &'a BattleSnapshot,
        room: &'a dyn BattleRoom,
    ) -> BoxFuture<'a, BattleOrder> {
        let order = room.random_order(snapshot);
        Box::pin(async move { order })
    }

    fn battle_finished(&self, _battle: &BattleTag, outcome: BattleOutcome) {
        self.tally.note(outcome);
    }

    fn record(&self) -> BattleRecord {
        self.tally.record()
    }
}

/// Uses the legal move with the highest base power; random when no move is legal
pub struct MaxPowerBot {
    username: String,
    tally: Tally,
}

impl MaxPowerBot {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            tally: Tally::default(),
        }
    }

    /// Highest-power move, earliest slot on ties
    pub fn strongest_move(snapshot: &BattleSnapshot) -> Option<BattleOrder> {
        snapshot
            .available_moves
            .iter()
            .rev()
            .max_by_key(|m| m.base_power)
            .map(|m| BattleOrder::use_move(m.id.clone()))
    }
}

impl Player for MaxPowerBot {
    fn username(&self) -> &str {
        &self.username
    }

    fn choose_order<'a>(
        &'a self,
        snapshot: &'a BattleSnapshot,
        room: &'a dyn BattleRoom,
    ) -> BoxFuture<'a, BattleOrder> {
        let order = Self::strongest_move(snapshot).unwrap_or_else(|| room.random_order(snapshot));
        Box::pin(async move { order })
    }

    fn battle_finished(&self, _battle: &BattleTag, outcome: BattleOutcome) {
        self.tally.note(outcome);
    }

    fn record(&self) -> BattleRecord {
        self.tally.record()
    }
}
