//! Page scroll and touch lock
//!
//! Acquire is idempotent, so a single release always unlocks. Release
//! without a prior acquire does nothing.

/// What the page must do after a lock transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockChange {
    /// Pin the page at this vertical offset and install the touch guard
    Engage { offset: f32 },
    /// Restore scrolling, jump back to this offset and drop the touch guard
    Disengage { offset: f32 },
}

#[derive(Debug, Clone, Default)]
pub struct ScrollLock {
    saved_offset: f32,
    active: bool,
}

impl ScrollLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn saved_offset(&self) -> f32 {
        self.saved_offset
    }

    /// Lock at the current scroll offset; `None` if already locked
    pub fn acquire(&mut self, scroll_offset: f32) -> Option<LockChange> {
        if self.active {
            log::debug!("Scroll lock already held at {}", self.saved_offset);
            return None;
        }
        self.active = true;
        self.saved_offset = if scroll_offset.is_finite() {
            scroll_offset.max(0.0)
        } else {
            0.0
        };
        Some(LockChange::Engage {
            offset: self.saved_offset,
        })
    }

    /// Unlock and report the offset to restore; `None` if not locked
    pub fn release(&mut self) -> Option<LockChange> {
        if !self.active {
            return None;
        }
        self.active = false;
        Some(LockChange::Disengage {
            offset: self.saved_offset,
        })
    }
}
