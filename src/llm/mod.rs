//! Model-facing pipeline: summarize, compile, submit, resolve

pub mod client;
pub mod compact;
pub mod context;
pub mod parser;
pub mod prompt;

pub use client::{build_backend, DecisionBackend, LocalBackend, RouterBackend};
pub use parser::{resolve, Decision, FallbackReason, Resolution, ResolutionPath};
pub use prompt::{compile_prompt, PromptRecord};
