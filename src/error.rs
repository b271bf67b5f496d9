//! Error taxonomy for the interaction layer
//!
//! Nothing here is fatal to the page: the worst case is bubble mode not
//! activating while the grid stays in its filtered state.

use crate::session::SessionPhase;

#[derive(Debug, thiserror::Error)]
pub enum BubbleError {
    /// A required page control is absent; the layer disables itself.
    #[error("missing required control: {0}")]
    MissingControl(&'static str),
    #[error("physics session busy ({phase:?})")]
    SessionBusy { phase: SessionPhase },
    #[error("current theme does not allow bubble mode")]
    ThemeForbidsBubbles,
    #[error("no visible cards to simulate")]
    NoVisibleCards,
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BubbleError>;
