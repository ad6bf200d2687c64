//! Room state schema.
//!
//! The room service owns a keyed collection of players. Changes travel as
//! full-value add/change/remove entries; the client mirrors them with
//! [`RoomState::apply`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{math::Vec2, net::SessionId};

/// Authoritative per-player state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Player {
    pub x: f32,
    pub y: f32,
}

impl Player {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// One entry of a state patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateChange {
    Add { session_id: SessionId, player: Player },
    Change { session_id: SessionId, player: Player },
    Remove { session_id: SessionId },
}

impl StateChange {
    pub fn session_id(&self) -> &SessionId {
        match self {
            StateChange::Add { session_id, .. }
            | StateChange::Change { session_id, .. }
            | StateChange::Remove { session_id } => session_id,
        }
    }
}

/// Whole room state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoomState {
    pub players: BTreeMap<SessionId, Player>,
}

impl RoomState {
    pub fn player(&self, id: &SessionId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Applies one change. Returns false when the change doesn't fit the
    /// current state (change or removal of an unknown player); an `Add` for
    /// a known player overwrites it.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        match change {
            StateChange::Add { session_id, player } => {
                self.players.insert(session_id.clone(), *player);
                true
            }
            StateChange::Change { session_id, player } => match self.players.get_mut(session_id) {
                Some(p) => {
                    *p = *player;
                    true
                }
                None => false,
            },
            StateChange::Remove { session_id } => self.players.remove(session_id).is_some(),
        }
    }

    /// Changes turning `old` into `new`: removals first, then additions and
    /// changes, each in session-id order. Unchanged players produce nothing.
    pub fn diff(old: &RoomState, new: &RoomState) -> Vec<StateChange> {
        let mut changes: Vec<StateChange> = old
            .players
            .keys()
            .filter(|id| !new.players.contains_key(*id))
            .map(|id| StateChange::Remove {
                session_id: id.clone(),
            })
            .collect();

        for (id, player) in &new.players {
            match old.players.get(id) {
                None => changes.push(StateChange::Add {
                    session_id: id.clone(),
                    player: *player,
                }),
                Some(prev) if prev != player => changes.push(StateChange::Change {
                    session_id: id.clone(),
                    player: *player,
                }),
                Some(_) => {}
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    #[test]
    fn diff_reports_add_change_remove() {
        let mut old = RoomState::default();
        old.players.insert(sid("a"), Player::new(0.0, 0.0));
        old.players.insert(sid("b"), Player::new(5.0, 5.0));
        old.players.insert(sid("c"), Player::new(1.0, 1.0));

        let mut new = old.clone();
        new.players.remove(&sid("a"));
        new.players.get_mut(&sid("b")).unwrap().x = 6.0;
        new.players.insert(sid("d"), Player::new(9.0, 9.0));

        let changes = RoomState::diff(&old, &new);
        assert_eq!(
            changes,
            vec![
                StateChange::Remove { session_id: sid("a") },
                StateChange::Change {
                    session_id: sid("b"),
                    player: Player::new(6.0, 5.0)
                },
                StateChange::Add {
                    session_id: sid("d"),
                    player: Player::new(9.0, 9.0)
                },
            ]
        );
    }

    #[test]
    fn diff_of_identical_states_is_empty() {
        let mut s = RoomState::default();
        s.players.insert(sid("a"), Player::new(3.0, 4.0));
        assert!(RoomState::diff(&s, &s.clone()).is_empty());
    }

    #[test]
    fn applying_a_diff_reproduces_the_target() {
        let mut old = RoomState::default();
        old.players.insert(sid("a"), Player::new(0.0, 0.0));
        let mut new = RoomState::default();
        new.players.insert(sid("b"), Player::new(2.0, 2.0));

        let mut mirror = old.clone();
        for change in RoomState::diff(&old, &new) {
            assert!(mirror.apply(&change));
        }
        assert_eq!(mirror, new);
    }

    #[test]
    fn change_for_unknown_player_is_rejected() {
        let mut s = RoomState::default();
        let ok = s.apply(&StateChange::Change {
            session_id: sid("ghost"),
            player: Player::new(1.0, 1.0),
        });
        assert!(!ok);
        assert!(s.players.is_empty());
        assert!(!s.apply(&StateChange::Remove { session_id: sid("ghost") }));
    }
}
