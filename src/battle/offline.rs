//! In-process battle room without a server connection
//!
//! Chat messages are kept in a transcript instead of being sent, and random
//! orders come from a seeded RNG so runs are reproducible.

use crate::battle::order::BattleOrder;
use crate::battle::room::BattleRoom;
use crate::battle::snapshot::BattleSnapshot;
use crate::core::error::{ArenaError, Result};
use crate::core::types::{BattleTag, BoxFuture};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Mutex;

pub struct OfflineRoom {
    rng: Mutex<StdRng>,
    transcript: Mutex<Vec<(BattleTag, String)>>,
    chat_enabled: bool,
}

impl OfflineRoom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            transcript: Mutex::new(Vec::new()),
            chat_enabled: true,
        }
    }

    /// A room that rejects every chat message, like an unauthenticated sender
    pub fn without_chat(seed: u64) -> Self {
        Self {
            chat_enabled: false,
            ..Self::new(seed)
        }
    }

    /// Messages posted so far, in order
    pub fn transcript(&self) -> Vec<(BattleTag, String)> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

impl BattleRoom for OfflineRoom {
    fn send_message<'a>(
        &'a self,
        battle: &'a BattleTag,
        text: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !self.chat_enabled {
                return Err(ArenaError::Transport("chat is disabled for this room".into()));
            }
            let mut transcript = self
                .transcript
                .lock()
                .map_err(|_| ArenaError::Transport("transcript lock poisoned".into()))?;
            transcript.push((battle.clone(), text.to_string()));
            Ok(())
        })
    }

    fn random_order(&self, snapshot: &BattleSnapshot) -> BattleOrder {
        let legal = BattleOrder::legal_orders(snapshot);
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        legal
            .choose(&mut *rng)
            .cloned()
            .unwrap_or(BattleOrder::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::snapshot::{MoveSlot, Pokemon};

    #[test]
    fn test_random_order_is_legal() {
        let room = OfflineRoom::new(7);
        let mut snapshot = BattleSnapshot::new("battle-1", 1);
        snapshot.available_moves = vec![MoveSlot::new("surf", 90, 15), MoveSlot::new("ice beam", 90, 10)];
        snapshot.available_switches = vec![Pokemon::new("Latios")];

        for _ in 0..50 {
            assert!(room.random_order(&snapshot).is_legal_in(&snapshot));
        }
    }

    #[test]
    fn test_random_order_without_legal_actions() {
        let room = OfflineRoom::new(7);
        let snapshot = BattleSnapshot::new("battle-1", 1);
        assert_eq!(room.random_order(&snapshot), BattleOrder::Default);
    }

    #[test]
    fn test_same_seed_same_choices() {
        let mut snapshot = BattleSnapshot::new("battle-1", 1);
        snapshot.available_moves = (0..4)
            .map(|i| MoveSlot::new(format!("move{}", i), 50, 10))
            .collect();

        let a = OfflineRoom::new(42);
        let b = OfflineRoom::new(42);
        let picks_a: Vec<_> = (0..10).map(|_| a.random_order(&snapshot)).collect();
        let picks_b: Vec<_> = (0..10).map(|_| b.random_order(&snapshot)).collect();
        assert_eq!(picks_a, picks_b);
    }

    #[tokio::test]
    async fn test_transcript_records_messages() {
        let room = OfflineRoom::new(1);
        let tag = BattleTag::new("battle-9");
        room.send_message(&tag, "gl hf").await.unwrap();
        assert_eq!(room.transcript(), vec![(tag, "gl hf".to_string())]);

        let muted = OfflineRoom::without_chat(1);
        assert!(muted.send_message(&BattleTag::new("battle-9"), "hi").await.is_err());
        assert!(muted.transcript().is_empty());
    }
}
