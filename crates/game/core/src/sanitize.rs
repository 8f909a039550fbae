//! Per-viewer sanitization of serialized states.
//!
//! Rules operate on the JSON form of a [`State`](crate::state::State):
//! `{"Game": {..}, "Players": [{..}, ..]}`. The admin sees everything;
//! every other viewer sees each property through the policy of the first
//! rule that applies to it. Later rules for the same property are ignored.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::player::PlayerIndex;

/// Which sub-state a rule targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SanitizationScope {
    Game,
    Players,
}

/// Which viewers a rule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Group {
    /// Every non-admin viewer.
    All,
    /// Viewers that do not own the sub-state. Game scope has no owner.
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Policy {
    Visible,
    /// Component ids become salted hashes: order is kept, identity is not.
    Order,
    /// Only the number of entries survives.
    Len,
    /// Only whether the collection is empty survives.
    Nonempty,
    /// Replaced by the zero value of its type.
    Hidden,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationRule {
    pub scope: SanitizationScope,
    /// Serialized (PascalCase) property name.
    pub property: String,
    pub group: Group,
    pub policy: Policy,
}

impl SanitizationRule {
    pub fn game(property: impl Into<String>, policy: Policy) -> Self {
        Self {
            scope: SanitizationScope::Game,
            property: property.into(),
            group: Group::All,
            policy,
        }
    }

    pub fn players(property: impl Into<String>, group: Group, policy: Policy) -> Self {
        Self {
            scope: SanitizationScope::Players,
            property: property.into(),
            group,
            policy,
        }
    }
}

const STACK_COMPONENTS: &str = "Components";

/// Returns the view of `state` that `viewer` may see.
pub fn sanitize_state(
    state: &Value,
    rules: &[SanitizationRule],
    viewer: PlayerIndex,
    salt: &[u8],
) -> Value {
    let mut out = state.clone();
    if viewer.is_admin() || rules.is_empty() {
        return out;
    }

    // (player seat, property) pairs already handled; `None` is the game.
    let mut handled: HashSet<(Option<usize>, &str)> = HashSet::new();
    for rule in rules {
        match rule.scope {
            SanitizationScope::Game => {
                if !handled.insert((None, rule.property.as_str())) {
                    continue;
                }
                if let Some(game) = out.get_mut("Game").and_then(Value::as_object_mut) {
                    apply_to_property(game, rule, salt);
                }
            }
            SanitizationScope::Players => {
                let Some(players) = out.get_mut("Players").and_then(Value::as_array_mut) else {
                    continue;
                };
                for (index, player) in players.iter_mut().enumerate() {
                    let owned = viewer.index() == Some(index);
                    if rule.group == Group::Other && owned {
                        continue;
                    }
                    if !handled.insert((Some(index), rule.property.as_str())) {
                        continue;
                    }
                    if let Some(player) = player.as_object_mut() {
                        apply_to_property(player, rule, salt);
                    }
                }
            }
        }
    }
    out
}

fn apply_to_property(object: &mut Map<String, Value>, rule: &SanitizationRule, salt: &[u8]) {
    if let Some(value) = object.get_mut(&rule.property) {
        *value = apply_policy(value, rule.policy, salt);
    }
}

/// Applies one policy to a single value.
pub fn apply_policy(value: &Value, policy: Policy, salt: &[u8]) -> Value {
    match policy {
        Policy::Visible => value.clone(),
        Policy::Hidden => zero_value(value),
        Policy::Len => map_collection(value, |items| vec![Value::Null; items.len()]),
        Policy::Nonempty => map_collection(value, |items| {
            if items.is_empty() {
                Vec::new()
            } else {
                vec![Value::Null]
            }
        }),
        Policy::Order => map_collection(value, |items| {
            items.iter().map(|item| hash_identity(item, salt)).collect()
        }),
    }
}

/// Rewrites the entries of an array or of a serialized stack. Anything else
/// is hidden.
fn map_collection(value: &Value, f: impl Fn(&[Value]) -> Vec<Value>) -> Value {
    match value {
        Value::Array(items) => Value::Array(f(items)),
        Value::Object(map) => match map.get(STACK_COMPONENTS) {
            Some(Value::Array(items)) => {
                let mut out = map.clone();
                out.insert(STACK_COMPONENTS.to_string(), Value::Array(f(items)));
                Value::Object(out)
            }
            _ => zero_value(value),
        },
        _ => zero_value(value),
    }
}

fn zero_value(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) => Value::Bool(false),
        Value::Number(_) => Value::from(0),
        Value::String(_) => Value::String(String::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), zero_value(v)))
                .collect(),
        ),
    }
}

fn hash_identity(item: &Value, salt: &[u8]) -> Value {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(item.to_string().as_bytes());
    let digest = hasher.finalize();
    Value::String(hex::encode(&digest[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> Value {
        json!({
            "Game": { "Deck": { "Components": [3, 1, 2] }, "Round": 4 },
            "Players": [
                { "Hand": { "Components": [5, 6] }, "Secret": "abc", "Score": 10 },
                { "Hand": { "Components": [] }, "Secret": "xyz", "Score": 7 }
            ]
        })
    }

    fn rules() -> Vec<SanitizationRule> {
        vec![
            SanitizationRule::game("Deck", Policy::Len),
            SanitizationRule::players("Hand", Group::Other, Policy::Nonempty),
            SanitizationRule::players("Secret", Group::All, Policy::Hidden),
        ]
    }

    #[test]
    fn test_admin_sees_everything() {
        assert_eq!(
            sanitize_state(&state(), &rules(), PlayerIndex::ADMIN, b"s"),
            state()
        );
    }

    #[test]
    fn test_player_sees_own_hand_only() {
        let view = sanitize_state(&state(), &rules(), PlayerIndex::seat(0), b"s");
        assert_eq!(view["Game"]["Deck"]["Components"], json!([null, null, null]));
        assert_eq!(view["Game"]["Round"], 4);
        assert_eq!(view["Players"][0]["Hand"]["Components"], json!([5, 6]));
        assert_eq!(view["Players"][1]["Hand"]["Components"], json!([]));
        assert_eq!(view["Players"][0]["Secret"], "");
        assert_eq!(view["Players"][1]["Score"], 7);
    }

    #[test]
    fn test_observer_is_other_for_everyone() {
        let view = sanitize_state(&state(), &rules(), PlayerIndex::OBSERVER, b"s");
        assert_eq!(view["Players"][0]["Hand"]["Components"], json!([null]));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = vec![
            SanitizationRule::game("Round", Policy::Visible),
            SanitizationRule::game("Round", Policy::Hidden),
            SanitizationRule::players("Hand", Group::Other, Policy::Visible),
            SanitizationRule::players("Hand", Group::All, Policy::Len),
        ];
        let view = sanitize_state(&state(), &rules, PlayerIndex::seat(1), b"s");
        assert_eq!(view["Game"]["Round"], 4);
        // Seat 0 is "other" for seat 1, so the first rule keeps it visible.
        assert_eq!(view["Players"][0]["Hand"]["Components"], json!([5, 6]));
        assert_eq!(view["Players"][1]["Hand"], state()["Players"][1]["Hand"]);
    }

    #[test]
    fn test_order_hashes_are_salted_and_stable() {
        let stack = json!({ "Components": [1, 2] });
        let a = apply_policy(&stack, Policy::Order, b"one");
        let b = apply_policy(&stack, Policy::Order, b"one");
        let c = apply_policy(&stack, Policy::Order, b"two");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a["Components"][0], a["Components"][1]);
        assert!(a["Components"][0].is_string());
    }
}
