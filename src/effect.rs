//! Page mutations requested by the core
//!
//! The controller queues effects in order; the adapter drains and applies
//! them. Keeping them as plain values lets tests assert on exactly what the
//! page would see.

use crate::input::InputSource;
use crate::layout::{CardId, Rect};
use crate::settings::Theme;

/// CSS properties eased by [`Effect::AnimateReturn`]
pub const RETURN_PROPERTIES: [&str; 3] = ["left", "top", "transform"];

/// Whether a finished transition on `property` belongs to the return trip
pub fn is_return_transition(property: &str) -> bool {
    RETURN_PROPERTIES.contains(&property)
}

/// Visual placement of a card mirrored from its body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardTransform {
    pub card: CardId,
    pub left: f32,
    pub top: f32,
    /// Rotation in radians
    pub rotation: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    // === Filter ===
    /// Fade a card in or out and toggle its interactivity
    SetCardVisibility {
        card: CardId,
        visible: bool,
        fade_ms: f32,
    },
    /// Highlight the button for `tag` (none = no highlight)
    MarkActiveFilter { tag: Option<String> },
    /// Re-measure card rectangles and report them back
    MeasureCards,

    // === Scroll / touch lock ===
    LockScroll { offset: f32 },
    UnlockScroll { offset: f32 },
    InstallTouchGuard,
    RemoveTouchGuard,

    // === Physics session ===
    /// Pin the container over the viewport and take cards out of flow
    EnterBubbleLayout { cards: Vec<(CardId, Rect)> },
    /// Create the drag surface covering the viewport
    MountSurface { width: f32, height: f32 },
    UnmountSurface,
    ListenInput(InputSource),
    UnlistenInput(InputSource),
    PlaceCard(CardTransform),
    /// Ease a card back to its grid rectangle
    AnimateReturn {
        card: CardId,
        rect: Rect,
        duration_ms: f32,
    },
    /// Drop every inline style bubble mode added to cards and container
    ClearTransientStyles,

    // === Controls ===
    SetToggle { checked: bool },
    ApplyTheme(Theme),
}

impl Effect {
    /// Effects that install something the page must later remove
    pub fn acquires(&self) -> bool {
        matches!(
            self,
            Effect::LockScroll { .. }
                | Effect::InstallTouchGuard
                | Effect::MountSurface { .. }
                | Effect::ListenInput(_)
                | Effect::EnterBubbleLayout { .. }
        )
    }

    /// Counterparts of [`Effect::acquires`]
    pub fn releases(&self) -> bool {
        matches!(
            self,
            Effect::UnlockScroll { .. }
                | Effect::RemoveTouchGuard
                | Effect::UnmountSurface
                | Effect::UnlistenInput(_)
                | Effect::ClearTransientStyles
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_transition_properties() {
        assert!(is_return_transition("left"));
        assert!(is_return_transition("top"));
        assert!(is_return_transition("transform"));
        // Filter fades and hover effects inside a card do not count
        assert!(!is_return_transition("opacity"));
        assert!(!is_return_transition("color"));
        assert!(!is_return_transition(""));
    }

    #[test]
    fn test_acquire_release_pairs() {
        assert!(Effect::LockScroll { offset: 0.0 }.acquires());
        assert!(Effect::UnlockScroll { offset: 0.0 }.releases());
        assert!(Effect::MountSurface { width: 1.0, height: 1.0 }.acquires());
        assert!(Effect::UnmountSurface.releases());
        assert!(!Effect::MeasureCards.acquires() && !Effect::MeasureCards.releases());
    }
}
