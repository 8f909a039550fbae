//! Components and the ordered stacks that hold them.
//!
//! Components are static definitions owned by the rule set and addressed by
//! [`ComponentId`]. States never embed components directly; they hold ids
//! inside [`Stack`] values so that the serialized tree stays acyclic.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SetupError;
use crate::player::PlayerIndex;
use crate::rng::StateRng;

/// Stable identity of a component within one rule set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A static game component (card, die, token).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Component {
    pub id: ComponentId,
    /// Name of the deck the component belongs to.
    pub deck: String,
    /// Rule-set specific static values.
    #[serde(default)]
    pub values: Value,
}

impl Component {
    pub fn new(id: u32, deck: impl Into<String>) -> Self {
        Self {
            id: ComponentId(id),
            deck: deck.into(),
            values: Value::Null,
        }
    }

    #[must_use]
    pub fn with_values(mut self, values: Value) -> Self {
        self.values = values;
        self
    }
}

/// Ordered pile of component ids. Index 0 is the bottom.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    #[serde(default)]
    pub components: Vec<ComponentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack that refuses pushes beyond `max_size` entries.
    pub fn bounded(max_size: usize) -> Self {
        Self {
            components: Vec::new(),
            max_size: Some(max_size),
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.max_size.is_some_and(|max| self.components.len() >= max)
    }

    pub fn push(&mut self, id: ComponentId) -> Result<(), StackFull> {
        if self.is_full() {
            return Err(StackFull(id));
        }
        self.components.push(id);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<ComponentId> {
        self.components.pop()
    }

    pub fn top(&self) -> Option<ComponentId> {
        self.components.last().copied()
    }

    /// Removes the first occurrence of `id`, returning whether it was present.
    pub fn remove(&mut self, id: ComponentId) -> bool {
        match self.components.iter().position(|c| *c == id) {
            Some(pos) => {
                self.components.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Moves the top component onto `other`. Leaves both stacks unchanged on
    /// failure.
    pub fn move_top_to(&mut self, other: &mut Stack) -> Result<ComponentId, StackError> {
        let id = self.top().ok_or(StackError::Empty)?;
        other.push(id).map_err(StackError::Full)?;
        self.components.pop();
        Ok(id)
    }

    pub fn shuffle(&mut self, rng: &mut StateRng) {
        rng.shuffle(&mut self.components);
    }

    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.iter().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stack is full, cannot push component {0}")]
pub struct StackFull(pub ComponentId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error("stack is empty")]
    Empty,
    #[error(transparent)]
    Full(StackFull),
}

/// Which sub-state owns a stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackOwner {
    Game,
    Player(PlayerIndex),
}

/// Addresses one named stack inside a state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRef {
    pub owner: StackOwner,
    pub name: String,
}

impl StackRef {
    pub fn game(name: impl Into<String>) -> Self {
        Self {
            owner: StackOwner::Game,
            name: name.into(),
        }
    }

    pub fn player(player: PlayerIndex, name: impl Into<String>) -> Self {
        Self {
            owner: StackOwner::Player(player),
            name: name.into(),
        }
    }
}

impl fmt::Display for StackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            StackOwner::Game => write!(f, "game.{}", self.name),
            StackOwner::Player(p) => write!(f, "{}.{}", p, self.name),
        }
    }
}

/// Name-based access to the stacks a sub-state declares.
///
/// Sub-states without stacks implement this with an empty body.
pub trait StackHolder {
    fn stack(&self, _name: &str) -> Option<&Stack> {
        None
    }

    fn stack_mut(&mut self, _name: &str) -> Option<&mut Stack> {
        None
    }
}

/// Pushes `id` onto the referenced stack of `holder`.
pub(crate) fn push_into<H: StackHolder>(
    holder: &mut H,
    target: &StackRef,
    id: ComponentId,
) -> Result<(), SetupError> {
    let stack = holder
        .stack_mut(&target.name)
        .ok_or_else(|| SetupError::UnknownStack(target.to_string()))?;
    stack.push(id).map_err(|_| SetupError::StackFull {
        stack: target.to_string(),
        component: id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_stack_rejects_overflow() {
        let mut stack = Stack::bounded(1);
        stack.push(ComponentId(1)).unwrap();
        assert_eq!(stack.push(ComponentId(2)), Err(StackFull(ComponentId(2))));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_move_top_to_leaves_source_on_failure() {
        let mut from = Stack::new();
        from.push(ComponentId(7)).unwrap();
        let mut to = Stack::bounded(0);
        assert!(from.move_top_to(&mut to).is_err());
        assert_eq!(from.top(), Some(ComponentId(7)));

        let mut to = Stack::new();
        assert_eq!(from.move_top_to(&mut to), Ok(ComponentId(7)));
        assert!(from.is_empty());
        assert_eq!(to.top(), Some(ComponentId(7)));
    }

    #[test]
    fn test_remove_and_serialization() {
        let mut stack = Stack::new();
        for id in 0..3 {
            stack.push(ComponentId(id)).unwrap();
        }
        assert!(stack.remove(ComponentId(1)));
        assert!(!stack.remove(ComponentId(1)));
        let json = serde_json::to_value(&stack).unwrap();
        assert_eq!(json, serde_json::json!({ "Components": [0, 2] }));
    }
}
