//! Authoritative game state representation.
//!
//! A state is one game-wide sub-state plus one sub-state per seat. Runtime
//! layers clone or query it but mutate it exclusively through the engine.
mod stack;

pub use stack::{
    Component, ComponentId, Stack, StackError, StackFull, StackHolder, StackOwner, StackRef,
};

use core::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::player::PlayerIndex;

/// Bounds every game or player sub-state must satisfy.
pub trait SubState:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + StackHolder + Send + Sync + 'static
{
}

impl<T> SubState for T where
    T: Clone
        + Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + StackHolder
        + Send
        + Sync
        + 'static
{
}

/// Canonical snapshot of one game at one version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
#[serde(bound(
    serialize = "G: Serialize, P: Serialize",
    deserialize = "G: DeserializeOwned, P: DeserializeOwned"
))]
pub struct State<G, P> {
    pub game: G,
    pub players: Vec<P>,
}

impl<G: SubState, P: SubState> State<G, P> {
    pub fn new(game: G, players: Vec<P>) -> Self {
        Self { game, players }
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, index: PlayerIndex) -> Option<&P> {
        index.index().and_then(|i| self.players.get(i))
    }

    pub fn player_mut(&mut self, index: PlayerIndex) -> Option<&mut P> {
        index.index().and_then(move |i| self.players.get_mut(i))
    }

    pub fn stack(&self, target: &StackRef) -> Option<&Stack> {
        match target.owner {
            StackOwner::Game => self.game.stack(&target.name),
            StackOwner::Player(p) => self.player(p)?.stack(&target.name),
        }
    }

    pub fn stack_mut(&mut self, target: &StackRef) -> Option<&mut Stack> {
        match target.owner {
            StackOwner::Game => self.game.stack_mut(&target.name),
            StackOwner::Player(p) => self.player_mut(p)?.stack_mut(&target.name),
        }
    }

    /// Places a component on the referenced stack during setup.
    pub fn deal(&mut self, target: &StackRef, id: ComponentId) -> Result<(), SetupError> {
        match target.owner {
            StackOwner::Game => stack::push_into(&mut self.game, target, id),
            StackOwner::Player(p) => {
                let player = self
                    .player_mut(p)
                    .ok_or_else(|| SetupError::UnknownStack(target.to_string()))?;
                stack::push_into(player, target, id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Table {
        deck: Stack,
    }

    impl StackHolder for Table {
        fn stack(&self, name: &str) -> Option<&Stack> {
            (name == "Deck").then_some(&self.deck)
        }

        fn stack_mut(&mut self, name: &str) -> Option<&mut Stack> {
            (name == "Deck").then_some(&mut self.deck)
        }
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Seat {
        score: i64,
    }

    impl StackHolder for Seat {}

    #[test]
    fn test_deal_to_game_stack() {
        let mut state = State::new(Table::default(), vec![Seat::default(); 2]);
        state.deal(&StackRef::game("Deck"), ComponentId(4)).unwrap();
        assert_eq!(state.stack(&StackRef::game("Deck")).and_then(Stack::top), Some(ComponentId(4)));
    }

    #[test]
    fn test_deal_to_missing_stack_fails() {
        let mut state = State::new(Table::default(), vec![Seat::default(); 2]);
        let err = state
            .deal(&StackRef::player(PlayerIndex::seat(0), "Hand"), ComponentId(1))
            .unwrap_err();
        assert!(matches!(err, SetupError::UnknownStack(_)));
    }

    #[test]
    fn test_state_serializes_pascal_case() {
        let state = State::new(Table::default(), vec![Seat { score: 3 }]);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["Players"][0]["Score"], 3);
        assert!(json["Game"]["Deck"].is_object());
    }
}
