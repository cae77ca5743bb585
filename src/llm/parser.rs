//! Resolve raw model text into a legal battle order
//!
//! The model's answer is untrusted. It is parsed into a [`Decision`], then its
//! action token is matched against the moves and switches the engine offers at
//! this exact turn. Anything that does not match ends in the room's random
//! legal order, which is the normal degradation path and never an error.

use crate::battle::order::BattleOrder;
use crate::battle::room::BattleRoom;
use crate::battle::snapshot::BattleSnapshot;
use serde_json::{Map, Value};
use std::fmt;

/// The action a model named, with the category it committed to (if any)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionToken {
    /// Plain string: may name either a move or a switch target
    Any(String),
    Move(String),
    Switch(String),
}

impl ActionToken {
    pub fn text(&self) -> &str {
        match self {
            ActionToken::Any(t) | ActionToken::Move(t) | ActionToken::Switch(t) => t,
        }
    }
}

/// A well-formed answer object
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub reasoning: Option<String>,
    pub action: Option<ActionToken>,
    pub scratchpad: Option<String>,
    /// The parsed object exactly as received
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The backend failed and produced no text at all
    NoReply,
    Unparsable,
    WrongShape,
    MissingAction,
    /// Well-formed, but the named action is not legal this turn
    NoMatch,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FallbackReason::NoReply => "no reply",
            FallbackReason::Unparsable => "unparsable",
            FallbackReason::WrongShape => "wrong shape",
            FallbackReason::MissingAction => "missing action",
            FallbackReason::NoMatch => "no match",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    Move,
    Switch,
    Fallback(FallbackReason),
    Forfeit,
}

/// Outcome of one turn's resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub order: BattleOrder,
    pub path: ResolutionPath,
    pub decision: Option<Decision>,
}

impl Resolution {
    pub fn forfeit() -> Self {
        Self {
            order: BattleOrder::Forfeit,
            path: ResolutionPath::Forfeit,
            decision: None,
        }
    }

    /// True only when the model's own token matched a legal move or switch
    pub fn is_valid(&self) -> bool {
        matches!(self.path, ResolutionPath::Move | ResolutionPath::Switch)
    }
}

/// Parse raw text into a decision object.
///
/// Strict JSON first; failing that, the span from the first `{` to the last
/// `}` (models like to wrap JSON in prose or code fences).
pub fn parse_decision(raw: &str) -> Result<Decision, FallbackReason> {
    let value = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => value,
        Err(_) => {
            let embedded = extract_json(raw).ok_or(FallbackReason::Unparsable)?;
            serde_json::from_str::<Value>(embedded).map_err(|_| FallbackReason::Unparsable)?
        }
    };

    let object = value.as_object().ok_or(FallbackReason::WrongShape)?;

    Ok(Decision {
        reasoning: string_field(object, "reasoning"),
        action: action_token(object),
        scratchpad: string_field(object, "scratchpad"),
        raw: value.clone(),
    })
}

/// Extract JSON object from a response with surrounding text
fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn action_token(object: &Map<String, Value>) -> Option<ActionToken> {
    match object.get("action") {
        Some(Value::String(token)) => Some(ActionToken::Any(token.clone())),
        Some(Value::Object(inner)) => structured_action(inner),
        _ => structured_action(object),
    }
}

/// `{"action_type": "move", "move_name": ..}` or
/// `{"action_type": "switch", "pokemon_species": ..}`
fn structured_action(object: &Map<String, Value>) -> Option<ActionToken> {
    match object.get("action_type").and_then(Value::as_str)? {
        "move" => string_field(object, "move_name").map(ActionToken::Move),
        "switch" => string_field(object, "pokemon_species").map(ActionToken::Switch),
        _ => None,
    }
}

/// Lowercase alphanumerics only, so `Quick Attack`, `quick-attack` and
/// `quickattack` compare equal
pub fn normalize_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Match a token against this turn's legal moves, then its legal switches
pub fn match_order(token: &ActionToken, snapshot: &BattleSnapshot) -> Option<(BattleOrder, ResolutionPath)> {
    let wanted = normalize_token(token.text());
    if wanted.is_empty() {
        return None;
    }

    if matches!(token, ActionToken::Any(_) | ActionToken::Move(_)) {
        if let Some(slot) = snapshot
            .available_moves
            .iter()
            .find(|m| normalize_token(&m.id) == wanted)
        {
            return Some((BattleOrder::use_move(slot.id.clone()), ResolutionPath::Move));
        }
    }

    if matches!(token, ActionToken::Any(_) | ActionToken::Switch(_)) {
        if let Some(unit) = snapshot
            .available_switches
            .iter()
            .find(|p| normalize_token(&p.species) == wanted)
        {
            return Some((
                BattleOrder::switch_to(unit.species.clone()),
                ResolutionPath::Switch,
            ));
        }
    }

    None
}

/// Resolve a raw reply (or its absence) into an order legal at `snapshot`
pub fn resolve(raw: Option<&str>, snapshot: &BattleSnapshot, room: &dyn BattleRoom) -> Resolution {
    let fallback = |reason: FallbackReason, decision: Option<Decision>| {
        tracing::debug!(
            "Turn {} of {} falls back to a random order: {}",
            snapshot.turn,
            snapshot.battle_tag,
            reason
        );
        Resolution {
            order: room.random_order(snapshot),
            path: ResolutionPath::Fallback(reason),
            decision,
        }
    };

    let Some(raw) = raw else {
        return fallback(FallbackReason::NoReply, None);
    };

    let decision = match parse_decision(raw) {
        Ok(decision) => decision,
        Err(reason) => return fallback(reason, None),
    };

    let Some(token) = decision.action.as_ref() else {
        return fallback(FallbackReason::MissingAction, Some(decision));
    };

    match match_order(token, snapshot) {
        Some((order, path)) => Resolution {
            order,
            path,
            decision: Some(decision),
        },
        None => fallback(FallbackReason::NoMatch, Some(decision)),
    }
}
