//! Gravity input mapping
//!
//! Exactly one source steers gravity during a session: the pointer on
//! fine-pointer devices, device tilt on coarse-pointer (touch) devices.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::settings::InputPreference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    Pointer,
    Orientation,
}

impl InputSource {
    /// Pick the source from the configured preference and device capability
    pub fn choose(preference: InputPreference, coarse_pointer: bool) -> Self {
        match preference {
            InputPreference::Pointer => InputSource::Pointer,
            InputPreference::Orientation => InputSource::Orientation,
            InputPreference::Auto if coarse_pointer => InputSource::Orientation,
            InputPreference::Auto => InputSource::Pointer,
        }
    }

    /// DOM event that feeds this source
    pub fn event_name(&self) -> &'static str {
        match self {
            InputSource::Pointer => "mousemove",
            InputSource::Orientation => "deviceorientation",
        }
    }
}

/// Map a cursor position to gravity
///
/// The viewport center maps to (0, 0), the top-left corner to (-1, -1) and
/// the bottom-right corner to (1, 1).
pub fn pointer_gravity(x: f32, y: f32, viewport: Vec2) -> Vec2 {
    if !(viewport.x > 0.0 && viewport.y > 0.0) || !x.is_finite() || !y.is_finite() {
        return Vec2::ZERO;
    }
    let g = Vec2::new((x / viewport.x - 0.5) * 2.0, (y / viewport.y - 0.5) * 2.0);
    g.clamp(Vec2::NEG_ONE, Vec2::ONE)
}

/// Map device tilt to gravity
///
/// `gamma` tilts left/right, `beta` front/back, both in degrees. Missing or
/// non-numeric readings count as level.
pub fn orientation_gravity(gamma: Option<f64>, beta: Option<f64>, scale: f32) -> Vec2 {
    let axis = |reading: Option<f64>| -> f32 {
        match reading {
            Some(deg) if deg.is_finite() && scale > 0.0 => {
                (deg as f32 / scale).clamp(-1.0, 1.0)
            }
            _ => 0.0,
        }
    };
    Vec2::new(axis(gamma), axis(beta))
}
