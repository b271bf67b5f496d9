//! Bubble Grid - a filterable project grid with a physics "bubble" mode
//!
//! Core modules:
//! - `layout`: Cards, rectangles, geometry snapshots and tag filtering
//! - `lock`: Page scroll / touch lock bookkeeping
//! - `sim`: Small 2D rigid-body world (circles and boxes, drag spring)
//! - `session`: Physics session lifecycle (Idle -> Starting -> Running -> Stopping)
//! - `controller`: Top-level mode state machine driven by page events
//! - `effect`: Page mutations requested by the core, applied by the adapter
//! - `web`: Browser adapter (wasm32 only)

pub mod controller;
pub mod effect;
pub mod error;
pub mod input;
pub mod layout;
pub mod lock;
pub mod session;
pub mod settings;
pub mod sim;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use controller::ModeController;
pub use effect::Effect;
pub use error::BubbleError;
pub use settings::{InputPreference, Settings, Theme};

/// Interaction constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Frames longer than this are clamped (tab switches, debugger pauses)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Number of static boundary bodies around the viewport
    pub const WALL_COUNT: usize = 4;

    /// Easing used for the return-to-grid animation
    pub const RETURN_EASING: &str = "cubic-bezier(0.4, 2, 0.6, 1)";

    /// Stacking order of cards and container while in bubble mode
    pub const BUBBLE_Z_INDEX: i32 = 100;
    pub const CARD_Z_INDEX: i32 = 10;
}
