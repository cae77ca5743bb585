//! Poke Arena - language-model driven Pokemon battle agents

pub mod agent;
pub mod battle;
pub mod core;
pub mod llm;
pub mod tournament;
