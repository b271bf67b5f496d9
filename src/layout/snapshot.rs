//! Geometry snapshots: the "home" layout bubbles return to

use super::{Card, CardId, Rect};

/// Ordered `(card, rect)` pairs for every visible card at capture time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometrySnapshot {
    entries: Vec<(CardId, Rect)>,
}

impl GeometrySnapshot {
    /// Capture the visible subset of `cards`, in card order
    pub fn capture(cards: &[Card]) -> Self {
        Self {
            entries: cards
                .iter()
                .filter(|c| c.visible)
                .map(|c| (c.id, c.rect))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(CardId, Rect)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rect_of(&self, id: CardId) -> Option<Rect> {
        self.entries
            .iter()
            .find(|(card, _)| *card == id)
            .map(|(_, rect)| *rect)
    }

    /// Whether the snapshot covers exactly `ids` (order-insensitive)
    pub fn matches_ids(&self, ids: &[CardId]) -> bool {
        if ids.len() != self.entries.len() {
            return false;
        }
        let mut mine: Vec<CardId> = self.entries.iter().map(|(id, _)| *id).collect();
        let mut theirs = ids.to_vec();
        mine.sort_unstable();
        theirs.sort_unstable();
        mine == theirs
    }
}
