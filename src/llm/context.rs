//! Gather battle context for LLM prompts
//!
//! Turns a snapshot into a nested map of primitives. Null, empty and
//! all-zero entries are pruned: zero boosts, full PP and a missing status are
//! the common case and are implied by absence. Units that are not on the field
//! (an empty active slot after a faint) are simply left out.

use crate::battle::snapshot::{BattleSnapshot, MoveSlot, Pokemon};
use serde_json::{json, Map, Value};

/// Compact structured summary of the battle at the snapshot's turn
pub fn summarize(snapshot: &BattleSnapshot) -> Value {
    let summary = json!({
        "turn": snapshot.turn,
        "weather": snapshot.weather,
        "fields": snapshot.fields,
        "side_conditions": snapshot.side_conditions,
        "opponent_side_conditions": snapshot.opponent_side_conditions,
        "active_pokemon": snapshot.active.as_ref().map(own_unit),
        "team": roster_status(&snapshot.team),
        "opponent_active_pokemon": snapshot.opponent_active.as_ref().map(opponent_unit),
        "opponent_team": roster_status(&snapshot.opponent_team),
    });
    prune(summary).unwrap_or_else(|| Value::Object(Map::new()))
}

/// One flattened entry per owned unit: identity, health, stats at the same
/// level, non-zero boosts and move PP only where it has been spent
pub fn roster(snapshot: &BattleSnapshot) -> Value {
    let entries: Vec<Value> = snapshot
        .team
        .iter()
        .filter_map(|unit| prune(roster_entry(unit)))
        .collect();
    Value::Array(entries)
}

fn own_unit(unit: &Pokemon) -> Value {
    json!({
        "species": unit.species,
        "level": unit.level,
        "ability": unit.ability,
        "item": unit.item,
        "gender": unit.gender,
        "hp": format_hp(unit.hp_fraction),
        "status": unit.status,
        "boosts": unit.boosts,
        "moves": unit.moves.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
        "effects": unit.effects,
        "stats": unit.stats,
    })
}

/// Only what the opponent has revealed; no stats or PP
fn opponent_unit(unit: &Pokemon) -> Value {
    json!({
        "species": unit.species,
        "level": unit.level,
        "ability": unit.ability,
        "item": unit.item,
        "hp": format_hp(unit.hp_fraction),
        "status": unit.status,
        "boosts": unit.boosts,
        "moves": unit.moves.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
        "effects": unit.effects,
    })
}

/// Species mapped to status, `null` when healthy
fn roster_status(units: &[Pokemon]) -> Value {
    let map: Map<String, Value> = units
        .iter()
        .map(|unit| {
            let status = match (&unit.status, unit.fainted) {
                (_, true) => json!("fnt"),
                (Some(status), false) => json!(status),
                (None, false) => Value::Null,
            };
            (unit.species.clone(), status)
        })
        .collect();
    Value::Object(map)
}

fn roster_entry(unit: &Pokemon) -> Value {
    let mut entry = Map::new();
    entry.insert("species".into(), json!(unit.species));
    entry.insert("level".into(), json!(unit.level));
    entry.insert("hp".into(), json!(format_hp(unit.hp_fraction)));
    if let (Some(current), Some(max)) = (unit.current_hp, unit.max_hp) {
        entry.insert("hp_points".into(), json!(format!("{}/{}", current, max)));
    }
    entry.insert("status".into(), json!(unit.status));
    entry.insert("ability".into(), json!(unit.ability));
    entry.insert("item".into(), json!(unit.item));
    entry.insert("types".into(), json!(unit.types));
    if unit.active {
        entry.insert("active".into(), json!(true));
    }
    if unit.fainted {
        entry.insert("fainted".into(), json!(true));
    }
    // A stat named like a fixed field (`hp`) keeps a suffix so health survives
    for (stat, value) in &unit.stats {
        let key = if entry.contains_key(stat) {
            format!("{}_stat", stat)
        } else {
            stat.clone()
        };
        entry.insert(key, json!(value));
    }

    let boosts: Map<String, Value> = unit
        .boosts
        .iter()
        .filter(|(_, stage)| **stage != 0)
        .map(|(stat, stage)| (stat.clone(), json!(stage)))
        .collect();
    entry.insert("boosts".into(), Value::Object(boosts));
    entry.insert(
        "moves".into(),
        Value::Array(unit.moves.iter().map(move_label).collect()),
    );
    entry.insert("effects".into(), json!(unit.effects));

    Value::Object(entry)
}

/// `surf` at full PP, `surf 3/15` once PP has been spent
fn move_label(slot: &MoveSlot) -> Value {
    if slot.has_full_pp() {
        json!(slot.id)
    } else {
        json!(format!("{} {}/{}", slot.id, slot.current_pp, slot.max_pp))
    }
}

pub fn format_hp(fraction: f32) -> String {
    format!("{:.1}%", (fraction.clamp(0.0, 1.0) * 100.0))
}

/// Drop null, empty and all-zero entries, bottom-up.
///
/// Returns `None` when the value itself should be omitted by its parent.
pub fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let kept: Vec<Value> = items.into_iter().filter_map(prune).collect();
            if kept.is_empty() {
                None
            } else {
                Some(Value::Array(kept))
            }
        }
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, value)| prune(value).map(|v| (key, v)))
                .collect();
            if kept.is_empty() || kept.values().all(is_zero) {
                None
            } else {
                Some(Value::Object(kept))
            }
        }
        other => Some(other),
    }
}

fn is_zero(value: &Value) -> bool {
    value.as_f64() == Some(0.0)
}

/// True when no entry anywhere in `value` would be removed by [`prune`]
pub fn is_pruned(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty() && items.iter().all(is_pruned),
        Value::Object(map) => {
            !map.is_empty() && !map.values().all(is_zero) && map.values().all(is_pruned)
        }
        _ => true,
    }
}
