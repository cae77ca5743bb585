//! Battle-playing agents and their per-battle state

pub mod baseline;
pub mod player;
pub mod recorder;
pub mod scratchpad;

pub use baseline::{MaxPowerBot, RandomBot};
pub use player::{BattleRecord, LlmAgent, Player};
pub use recorder::InteractionRecorder;
pub use scratchpad::ScratchpadStore;
