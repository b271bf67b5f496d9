//! Physics world
//!
//! A thin layer over rapier2d: fixed boxes for the viewport walls, dynamic
//! circles or boxes for cards, a pointer drag spring and a step counter.
//! No rendering or platform dependencies.

pub mod world;

pub use world::{BodyId, BodyOptions, BodyShape, BodyState, World};
