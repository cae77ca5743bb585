//! Battle engine boundary
//!
//! The rules engine, protocol client and matchmaking live outside this crate.
//! This module only describes what a player can see (snapshots), what it can
//! submit (orders), and the side channels the engine lends it (rooms).

pub mod offline;
pub mod order;
pub mod room;
pub mod snapshot;

pub use offline::OfflineRoom;
pub use order::BattleOrder;
pub use room::{notify_best_effort, BattleRoom};
pub use snapshot::{BattleSnapshot, MoveSlot, Pokemon};
