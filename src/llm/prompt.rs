//! Compile a battle snapshot into the messages sent to a model
//!
//! The user message is assembled in a fixed order: recent events, the
//! battle summary, the flattened roster, this turn's options, and the
//! battle's scratchpad. Structured sections use the compact encoding.

use crate::battle::snapshot::BattleSnapshot;
use crate::core::config::SystemPrompt;
use crate::llm::compact;
use crate::llm::context::{roster, summarize};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Protocol message types that carry HTML or other rich payloads
const RICH_MEDIA_PREFIXES: [&str; 4] = ["|html|", "|uhtml|", "|uhtmlchange|", "|raw|"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// The exact input of one model invocation: system instruction, then user content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PromptRecord {
    messages: Vec<Message>,
}

impl PromptRecord {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![
                Message {
                    role: Role::System,
                    content: system.into(),
                },
                Message {
                    role: Role::User,
                    content: user.into(),
                },
            ],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system(&self) -> &str {
        &self.messages[0].content
    }

    pub fn user(&self) -> &str {
        &self.messages[1].content
    }
}

/// Build the prompt for the snapshot's turn
///
/// # Arguments
/// * `system` - Fixed instruction prepended as the system message
/// * `snapshot` - Battle state at the turn being decided
/// * `history_len` - How many of the most recent event lines to include
/// * `scratchpad` - Notes carried over from earlier turns of this battle
pub fn compile_prompt(
    system: &SystemPrompt,
    snapshot: &BattleSnapshot,
    history_len: usize,
    scratchpad: Option<&str>,
) -> PromptRecord {
    let mut sections = Vec::new();

    let events = recent_events(&snapshot.events, history_len);
    if !events.is_empty() {
        sections.push(format!("[RECENT EVENTS]\n{}", events.join("\n")));
    }

    sections.push(format!(
        "[BATTLE STATE]\n{}",
        compact::encode_or_plain(&summarize(snapshot))
    ));

    let team = roster(snapshot);
    if team.as_array().is_some_and(|t| !t.is_empty()) {
        sections.push(format!(
            "[TEAM]\n{}",
            compact::encode_or_plain(&json!({ "team": team }))
        ));
    }

    sections.push(format!(
        "[OPTIONS]\n{}",
        compact::encode_or_plain(&options(snapshot))
    ));

    if let Some(notes) = scratchpad.map(str::trim).filter(|n| !n.is_empty()) {
        sections.push(format!("[SCRATCHPAD]\n{}", notes));
    }

    PromptRecord::new(system.text(), sections.join("\n\n"))
}

/// The last `n` event lines, oldest first, one physical line each,
/// without rich-media entries
pub fn recent_events(events: &[String], n: usize) -> Vec<String> {
    let kept: Vec<String> = events
        .iter()
        .filter(|line| !is_rich_media(line))
        .map(|line| flatten_line(line))
        .filter(|line| !line.is_empty())
        .collect();
    let start = kept.len().saturating_sub(n);
    kept[start..].to_vec()
}

pub fn is_rich_media(line: &str) -> bool {
    let line = line.trim_start();
    RICH_MEDIA_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Collapse embedded line breaks and runs of whitespace to single spaces
pub fn flatten_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn options(snapshot: &BattleSnapshot) -> Value {
    let moves: Vec<Value> = snapshot
        .available_moves
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "type": m.move_type.as_deref().unwrap_or("unknown"),
                "power": m.base_power,
                "pp": format!("{}/{}", m.current_pp, m.max_pp),
            })
        })
        .collect();
    let switches: Vec<&str> = snapshot
        .available_switches
        .iter()
        .map(|p| p.species.as_str())
        .collect();
    json!({ "moves": moves, "switches": switches })
}
