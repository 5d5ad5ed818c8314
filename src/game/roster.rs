use std::fmt::Write as _;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// One player inside a single session. Identity is the VK user id; the
/// display name is the `@screen_name` used in every outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: i64,
    pub display_name: String,
    pub score: u32,
    pub eliminated: bool,
    pub is_winner: bool,
}

impl Participant {
    pub fn new(user_id: i64, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            score: 0,
            eliminated: false,
            is_winner: false,
        }
    }
}

/// Ordered participant list; the order is fixed at creation and defines the
/// turn rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster(Vec<Participant>);

impl Roster {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self(participants)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.0.iter()
    }

    pub fn active(&self) -> impl Iterator<Item = &Participant> {
        self.0.iter().filter(|p| !p.eliminated)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Next non-eliminated index after `from`, wrapping around. Callers keep
    /// the invariant that at least one participant is still active, which
    /// bounds the scan to one full cycle.
    pub fn advance_turn(&self, from: usize) -> usize {
        debug_assert!(self.active_count() > 0);
        let len = self.0.len();
        let mut idx = (from + 1) % len;
        while self.0[idx].eliminated {
            idx = (idx + 1) % len;
        }
        idx
    }

    /// Flips the elimination flag only; adjusting the turn index is the
    /// caller's responsibility.
    pub fn eliminate(&mut self, index: usize) {
        self.0[index].eliminated = true;
    }

    pub fn position_of(&self, user_id: i64) -> Option<usize> {
        self.0.iter().position(|p| p.user_id == user_id)
    }

    /// The numbered score block used by every outbound summary.
    pub fn scoreboard(&self) -> String {
        let mut out = String::new();
        for (i, player) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(out, "{}) {}: {}", i + 1, player.display_name, player.score);
        }
        out
    }
}

impl Index<usize> for Roster {
    type Output = Participant;

    fn index(&self, index: usize) -> &Participant {
        &self.0[index]
    }
}

impl IndexMut<usize> for Roster {
    fn index_mut(&mut self, index: usize) -> &mut Participant {
        &mut self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_of(names: &[&str]) -> Roster {
        Roster::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| Participant::new(i as i64 + 1, format!("@{name}")))
                .collect(),
        )
    }

    #[test]
    fn advance_turn_cycles_in_order() {
        let roster = roster_of(&["anna", "boris", "vera"]);
        assert_eq!(roster.advance_turn(0), 1);
        assert_eq!(roster.advance_turn(1), 2);
        assert_eq!(roster.advance_turn(2), 0);
    }

    #[test]
    fn advance_turn_skips_eliminated() {
        let mut roster = roster_of(&["anna", "boris", "vera"]);
        roster.eliminate(1);
        assert_eq!(roster.advance_turn(0), 2);
        assert_eq!(roster.advance_turn(2), 0);
    }

    #[test]
    fn advance_turn_with_single_active_returns_it() {
        let mut roster = roster_of(&["anna", "boris", "vera"]);
        roster.eliminate(0);
        roster.eliminate(2);
        assert_eq!(roster.advance_turn(1), 1);
        assert_eq!(roster.advance_turn(0), 1);
    }

    #[test]
    fn eliminate_does_not_touch_other_fields() {
        let mut roster = roster_of(&["anna", "boris"]);
        roster[0].score = 30;
        roster.eliminate(0);
        assert!(roster[0].eliminated);
        assert_eq!(roster[0].score, 30);
        assert_eq!(roster.active_count(), 1);
    }

    #[test]
    fn scoreboard_numbers_all_participants() {
        let mut roster = roster_of(&["anna", "boris"]);
        roster[1].score = 50;
        assert_eq!(roster.scoreboard(), "1) @anna: 0\n2) @boris: 50");
    }
}
