//! Grid layout model
//!
//! Value-typed stand-ins for the page's project cards. The core never holds
//! DOM references; the adapter maps [`CardId`]s back to elements.

pub mod filter;
pub mod rect;
pub mod snapshot;

pub use filter::{FilterEngine, FilterOutcome};
pub use rect::Rect;
pub use snapshot::GeometrySnapshot;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Stable card identity (document order index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(pub u32);

/// Body shape used for a card while in bubble mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CardShape {
    /// Round cards: radius is half the card width
    #[default]
    Circle,
    /// Rectangular cards keep their full extents
    Box,
}

/// A project card as seen by the core
#[derive(Debug, Clone)]
pub struct Card {
    pub id: CardId,
    /// Lowercased, trimmed tags
    pub tags: BTreeSet<String>,
    pub visible: bool,
    /// Last measured viewport rectangle
    pub rect: Rect,
}

impl Card {
    pub fn new<I, S>(id: CardId, tags: I, rect: Rect) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            tags: tags
                .into_iter()
                .filter_map(|t| normalize_tag(t.as_ref()))
                .collect(),
            visible: true,
            rect,
        }
    }

    /// Parse the comma separated `data-tags` attribute
    pub fn from_tag_list(id: CardId, tag_list: &str, rect: Rect) -> Self {
        Self::new(id, tag_list.split(','), rect)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Lowercase and trim a tag; empty tags are dropped
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_lowercase())
    }
}
