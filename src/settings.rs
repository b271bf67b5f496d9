//! Interaction settings and theme selection
//!
//! Defaults are tuned so bubbles damp within a few seconds. A page can
//! override any subset through a JSON blob (see [`Settings::from_json`]).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layout::CardShape;

/// Visual theme offered by the page's style selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Bubbly,
    Classic,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Bubbly => "bubbly",
            Theme::Classic => "classic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bubbly" | "bubble" | "playful" => Some(Theme::Bubbly),
            "classic" | "plain" => Some(Theme::Classic),
            _ => None,
        }
    }

    /// Only the bubbly theme lets cards turn into bubbles
    pub fn allows_bubbles(&self) -> bool {
        matches!(self, Theme::Bubbly)
    }
}

/// Which input steers gravity while bubbles are live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputPreference {
    /// Coarse pointer devices use orientation, everything else the pointer
    #[default]
    Auto,
    Pointer,
    Orientation,
}

impl InputPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputPreference::Auto => "auto",
            InputPreference::Pointer => "pointer",
            InputPreference::Orientation => "orientation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(InputPreference::Auto),
            "pointer" | "mouse" => Some(InputPreference::Pointer),
            "orientation" | "tilt" => Some(InputPreference::Orientation),
            _ => None,
        }
    }
}

/// Interaction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Bodies ===
    /// Bounciness of card bodies (0..1)
    pub restitution: f32,
    /// Contact friction of card bodies
    pub friction: f32,
    /// Velocity damping per 1/60 s
    pub air_friction: f32,
    /// Shape used for card bodies
    pub card_shape: CardShape,

    // === World ===
    /// Thickness of the static walls just outside each viewport edge
    pub wall_thickness: f32,
    /// Gravity acceleration for a unit gravity vector (px/s²)
    pub gravity_accel: f32,
    /// Stiffness of the pointer drag spring (0..1)
    pub drag_stiffness: f32,

    // === Kick ===
    /// Delay between session start and the outward kick
    pub kick_delay_ms: f32,
    /// Kick speed range (px/s)
    pub kick_speed_min: f32,
    pub kick_speed_max: f32,
    /// Maximum random spin applied with the kick (rad/s)
    pub kick_spin: f32,

    // === Timing ===
    /// Filter opacity fade
    pub filter_fade_ms: f32,
    /// Return-to-grid animation
    pub return_duration_ms: f32,
    /// Extra time allowed for transition events before forcing cleanup
    pub return_grace_ms: f32,

    // === Input ===
    /// Tilt (degrees) mapped to a full unit of gravity
    pub orientation_scale: f32,
    pub input: InputPreference,

    /// Theme selected when the page has no selector
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            restitution: 0.8,
            friction: 0.01,
            air_friction: 0.01,
            card_shape: CardShape::Circle,

            wall_thickness: 100.0,
            gravity_accel: 1000.0,
            drag_stiffness: 0.2,

            kick_delay_ms: 100.0,
            kick_speed_min: 300.0,
            kick_speed_max: 560.0,
            kick_spin: 0.6,

            filter_fade_ms: 300.0,
            return_duration_ms: 1000.0,
            return_grace_ms: 250.0,

            orientation_scale: 45.0,
            input: InputPreference::Auto,

            theme: Theme::Bubbly,
        }
    }
}

// Upper bounds for user overrides
const MAX_FRICTION: f32 = 10.0;
const MAX_LENGTH: f32 = 10_000.0;
const MAX_ACCEL: f32 = 100_000.0;
const MAX_SPEED: f32 = 20_000.0;
const MAX_SPIN: f32 = 100.0;
const MAX_MS: f32 = 60_000.0;

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

impl Settings {
    /// Parse a partial JSON override on top of the defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Clamp values into ranges the simulation can handle
    ///
    /// Non-finite numbers (JSON like `1e39` overflows `f32`) fall back to
    /// their defaults before clamping.
    pub fn sanitized(mut self) -> Self {
        let d = Settings::default();
        self.restitution = finite_or(self.restitution, d.restitution).clamp(0.0, 1.0);
        self.friction = finite_or(self.friction, d.friction).clamp(0.0, MAX_FRICTION);
        self.air_friction = finite_or(self.air_friction, d.air_friction).clamp(0.0, 1.0);
        self.wall_thickness = finite_or(self.wall_thickness, d.wall_thickness).clamp(1.0, MAX_LENGTH);
        self.gravity_accel = finite_or(self.gravity_accel, d.gravity_accel).clamp(0.0, MAX_ACCEL);
        self.drag_stiffness = finite_or(self.drag_stiffness, d.drag_stiffness).clamp(0.0, 1.0);

        self.kick_delay_ms = finite_or(self.kick_delay_ms, d.kick_delay_ms).clamp(0.0, MAX_MS);
        self.kick_speed_min = finite_or(self.kick_speed_min, d.kick_speed_min).clamp(0.0, MAX_SPEED);
        self.kick_speed_max = finite_or(self.kick_speed_max, d.kick_speed_max)
            .clamp(self.kick_speed_min, MAX_SPEED);
        self.kick_spin = finite_or(self.kick_spin, d.kick_spin).abs().min(MAX_SPIN);

        self.filter_fade_ms = finite_or(self.filter_fade_ms, d.filter_fade_ms).clamp(0.0, MAX_MS);
        self.return_duration_ms =
            finite_or(self.return_duration_ms, d.return_duration_ms).clamp(0.0, MAX_MS);
        self.return_grace_ms = finite_or(self.return_grace_ms, d.return_grace_ms).clamp(0.0, MAX_MS);
        if !(self.orientation_scale.is_finite() && self.orientation_scale > 0.0) {
            self.orientation_scale = d.orientation_scale;
        }
        self
    }

    /// Return animation deadline including grace
    pub fn return_deadline_ms(&self) -> f32 {
        self.return_duration_ms + self.return_grace_ms
    }
}
