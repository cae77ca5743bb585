//! Capabilities the battle engine lends to a player during a battle

use crate::battle::order::BattleOrder;
use crate::battle::snapshot::BattleSnapshot;
use crate::core::error::Result;
use crate::core::types::{BattleTag, BoxFuture};

/// The engine side of one player's connection
///
/// Order submission is the return value of a player's turn; this trait only
/// covers the side channels a player may use while deciding.
pub trait BattleRoom: Send + Sync {
    /// Post a chat message to the battle's room
    fn send_message<'a>(
        &'a self,
        battle: &'a BattleTag,
        text: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    /// A uniformly random order among this turn's legal moves and switches
    fn random_order(&self, snapshot: &BattleSnapshot) -> BattleOrder;
}

/// Send a chat message, logging and discarding any delivery failure.
///
/// Returns whether the message went out.
pub async fn notify_best_effort(room: &dyn BattleRoom, battle: &BattleTag, text: &str) -> bool {
    match room.send_message(battle, text).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("Chat delivery to {} failed: {}", battle, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ArenaError;

    struct DeafRoom;

    impl BattleRoom for DeafRoom {
        fn send_message<'a>(
            &'a self,
            _battle: &'a BattleTag,
            _text: &'a str,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Err(ArenaError::Transport("not logged in".into())) })
        }

        fn random_order(&self, _snapshot: &BattleSnapshot) -> BattleOrder {
            BattleOrder::Default
        }
    }

    #[tokio::test]
    async fn test_notify_swallows_failure() {
        let delivered = notify_best_effort(&DeafRoom, &BattleTag::new("battle-1"), "hi").await;
        assert!(!delivered);
    }
}
