//! Tag filtering
//!
//! At most one tag is active. Clicking the active tag's button clears the
//! filter and shows every card.

use super::{Card, CardId, normalize_tag};

/// Result of applying a filter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterOutcome {
    /// Active tag after the change (`None` = show all)
    pub active: Option<String>,
    /// Cards whose visibility flipped, with their new visibility
    pub changed: Vec<(CardId, bool)>,
}

impl FilterOutcome {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    active: Option<String>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Whether `card` passes the current filter
    pub fn admits(&self, card: &Card) -> bool {
        match &self.active {
            None => true,
            Some(tag) => card.has_tag(tag),
        }
    }

    /// Handle a click on a filter button carrying `tag`
    ///
    /// The "all" button (empty tag or `all`) and the active tag both clear
    /// the filter.
    pub fn click(&mut self, cards: &mut [Card], tag: &str) -> FilterOutcome {
        let tag = normalize_tag(tag).filter(|t| t != "all");
        let next = match (&self.active, tag) {
            (Some(current), Some(tag)) if *current == tag => None,
            (_, tag) => tag,
        };
        self.apply(cards, next)
    }

    /// Set the active tag and recompute visibility of every card
    pub fn apply(&mut self, cards: &mut [Card], tag: Option<String>) -> FilterOutcome {
        self.active = tag.and_then(|t| normalize_tag(&t));
        let mut changed = Vec::new();
        for card in cards.iter_mut() {
            let visible = self.admits(card);
            if card.visible != visible {
                card.visible = visible;
                changed.push((card.id, visible));
            }
        }
        log::debug!(
            "Filter {:?}: {} cards changed visibility",
            self.active,
            changed.len()
        );
        FilterOutcome {
            active: self.active.clone(),
            changed,
        }
    }
}
