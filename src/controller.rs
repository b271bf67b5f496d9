//! Mode controller
//!
//! Top-level state machine for the page. Reacts to the bubble toggle, filter
//! buttons, theme selector, resize, input and animation frames, and queues
//! [`Effect`]s for the adapter to apply.

use glam::Vec2;

use crate::effect::Effect;
use crate::error::{BubbleError, Result};
use crate::input::{InputSource, orientation_gravity, pointer_gravity};
use crate::layout::{Card, CardId, FilterEngine, GeometrySnapshot, Rect};
use crate::lock::{LockChange, ScrollLock};
use crate::session::{PhysicsSession, SessionPhase, StopOutcome};
use crate::settings::{Settings, Theme};

pub struct ModeController {
    settings: Settings,
    cards: Vec<Card>,
    filter: FilterEngine,
    snapshot: GeometrySnapshot,
    /// Layout changed since the snapshot was taken
    snapshot_stale: bool,
    /// Time left on an in-flight filter fade
    fade_remaining_ms: Option<f32>,
    lock: ScrollLock,
    session: PhysicsSession,
    theme: Theme,
    viewport: Vec2,
    coarse_pointer: bool,
    effects: Vec<Effect>,
}

impl ModeController {
    pub fn new(
        settings: Settings,
        cards: Vec<Card>,
        viewport: Vec2,
        coarse_pointer: bool,
        seed: u64,
    ) -> Self {
        let settings = settings.sanitized();
        let snapshot = GeometrySnapshot::capture(&cards);
        Self {
            theme: settings.theme,
            session: PhysicsSession::new(settings.clone(), seed),
            settings,
            cards,
            filter: FilterEngine::new(),
            snapshot,
            snapshot_stale: false,
            fade_remaining_ms: None,
            lock: ScrollLock::new(),
            viewport,
            coarse_pointer,
            effects: Vec::new(),
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn snapshot(&self) -> &GeometrySnapshot {
        &self.snapshot
    }

    pub fn session(&self) -> &PhysicsSession {
        &self.session
    }

    pub fn lock(&self) -> &ScrollLock {
        &self.lock
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn active_filter(&self) -> Option<&str> {
        self.filter.active()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Take every queued effect, oldest first
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn visible_ids(&self) -> Vec<CardId> {
        self.cards.iter().filter(|c| c.visible).map(|c| c.id).collect()
    }

    // === Geometry ===

    /// Fresh measurements from the page
    ///
    /// The snapshot is only recaptured while no session is active and no
    /// filter fade is running; otherwise it is marked stale.
    pub fn update_geometry(&mut self, rects: &[(CardId, Rect)]) {
        for &(id, rect) in rects {
            if let Some(card) = self.cards.iter_mut().find(|c| c.id == id) {
                card.rect = rect;
            }
        }
        if self.session.is_active() || self.fade_remaining_ms.is_some() {
            self.snapshot_stale = true;
        } else {
            self.snapshot = GeometrySnapshot::capture(&self.cards);
            self.snapshot_stale = false;
        }
    }

    pub fn resize(&mut self, viewport: Vec2, rects: &[(CardId, Rect)]) {
        self.viewport = viewport;
        if self.session.is_active() {
            log::debug!("Resize during bubble mode, deferring snapshot");
        }
        self.update_geometry(rects);
    }

    // === Filter ===

    pub fn click_filter(&mut self, tag: &str) {
        let outcome = self.filter.click(&mut self.cards, tag);
        let fade_ms = self.settings.filter_fade_ms;
        for &(card, visible) in &outcome.changed {
            self.effects.push(Effect::SetCardVisibility {
                card,
                visible,
                fade_ms,
            });
        }
        self.effects.push(Effect::MarkActiveFilter {
            tag: outcome.active.clone(),
        });

        if outcome.is_noop() {
            return;
        }
        self.snapshot_stale = true;
        if self.session.is_active() {
            log::info!("Filter changed during bubble mode; bodies keep their cards until restart");
        }
        self.fade_remaining_ms = Some(fade_ms);
    }

    // === Mode ===

    /// React to the bubble toggle
    ///
    /// `rects` are measurements taken just now; `scroll_offset` is the
    /// page's vertical scroll position.
    pub fn set_bubble_mode(
        &mut self,
        enabled: bool,
        scroll_offset: f32,
        rects: &[(CardId, Rect)],
    ) -> Result<()> {
        if enabled {
            self.enter(scroll_offset, rects)
        } else {
            self.exit();
            Ok(())
        }
    }

    fn enter(&mut self, scroll_offset: f32, rects: &[(CardId, Rect)]) -> Result<()> {
        let result = self.try_enter(scroll_offset, rects);
        if let Err(err) = &result {
            log::warn!("Bubble mode not started: {}", err);
            // Leave the toggle matching reality, except for a duplicate
            // request against an already running session
            if !self.session.is_live() {
                self.effects.push(Effect::SetToggle { checked: false });
            }
        }
        result
    }

    fn try_enter(&mut self, scroll_offset: f32, rects: &[(CardId, Rect)]) -> Result<()> {
        if !self.theme.allows_bubbles() {
            return Err(BubbleError::ThemeForbidsBubbles);
        }
        let phase = self.session.phase();
        if phase != SessionPhase::Idle {
            return Err(BubbleError::SessionBusy { phase });
        }

        // Refresh the home layout from fresh measurements
        for &(id, rect) in rects {
            if let Some(card) = self.cards.iter_mut().find(|c| c.id == id) {
                card.rect = rect;
            }
        }
        self.snapshot = GeometrySnapshot::capture(&self.cards);
        // Hidden cards still hold their grid slots until the fade ends
        self.snapshot_stale = self.fade_remaining_ms.is_some();
        if self.snapshot.is_empty() {
            return Err(BubbleError::NoVisibleCards);
        }

        self.acquire_lock(scroll_offset);
        let input = InputSource::choose(self.settings.input, self.coarse_pointer);
        if let Err(err) = self
            .session
            .start(&self.snapshot, self.viewport, input, &mut self.effects)
        {
            self.release_lock();
            return Err(err);
        }
        Ok(())
    }

    fn exit(&mut self) {
        let visible = self.visible_ids();
        match self.session.stop(&visible, &mut self.effects) {
            StopOutcome::Settled => self.on_settled(),
            StopOutcome::Returning => {}
            StopOutcome::AlreadyIdle => {
                // Nothing running, but never leave the page locked
                self.release_lock();
            }
            StopOutcome::AlreadyStopping => {
                log::debug!("Exit requested while already returning");
            }
        }
    }

    /// Theme selector changed; `None` means no selection
    pub fn select_theme(&mut self, theme: Option<Theme>) {
        let Some(theme) = theme else {
            return;
        };
        if theme == self.theme {
            return;
        }
        self.theme = theme;
        self.effects.push(Effect::ApplyTheme(theme));
        log::info!("Theme switched to {}", theme.as_str());

        if !theme.allows_bubbles() && self.session.is_live() {
            self.effects.push(Effect::SetToggle { checked: false });
            self.exit();
        }
    }

    // === Input ===

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        if self.session.input_source() == Some(InputSource::Pointer) {
            self.session
                .set_gravity(pointer_gravity(x, y, self.viewport));
        }
    }

    pub fn orientation_changed(&mut self, gamma: Option<f64>, beta: Option<f64>) {
        if self.session.input_source() == Some(InputSource::Orientation) {
            let gravity = orientation_gravity(gamma, beta, self.settings.orientation_scale);
            self.session.set_gravity(gravity);
        }
    }

    pub fn drag_start(&mut self, x: f32, y: f32) -> Option<CardId> {
        self.session.drag_start(Vec2::new(x, y))
    }

    pub fn drag_move(&mut self, x: f32, y: f32) {
        self.session.drag_move(Vec2::new(x, y));
    }

    pub fn drag_end(&mut self) {
        self.session.drag_end();
    }

    /// A card's return transition completed
    pub fn return_finished(&mut self, card: CardId) {
        if self.session.return_finished(card, &mut self.effects) {
            self.on_settled();
        }
    }

    // === Frame ===

    /// Advance timers and physics by `dt` seconds, then sync card placement
    pub fn tick(&mut self, dt: f32) {
        if let Some(remaining) = self.fade_remaining_ms.as_mut() {
            *remaining -= dt * 1000.0;
            if *remaining <= 0.0 {
                self.fade_remaining_ms = None;
                if self.session.is_active() {
                    // Collapse and re-measure once the session settles
                    self.snapshot_stale = true;
                } else {
                    self.effects.push(Effect::MeasureCards);
                }
            }
        }

        if self.session.advance(dt, &mut self.effects) {
            self.on_settled();
        }
        self.session.frame_sync(&mut self.effects);
    }

    fn on_settled(&mut self) {
        self.release_lock();
        if self.snapshot_stale {
            self.effects.push(Effect::MeasureCards);
        }
    }

    fn acquire_lock(&mut self, scroll_offset: f32) {
        if let Some(LockChange::Engage { offset }) = self.lock.acquire(scroll_offset) {
            self.effects.push(Effect::LockScroll { offset });
            self.effects.push(Effect::InstallTouchGuard);
        }
    }

    fn release_lock(&mut self) {
        if let Some(LockChange::Disengage { offset }) = self.lock.release() {
            self.effects.push(Effect::UnlockScroll { offset });
            self.effects.push(Effect::RemoveTouchGuard);
        }
    }
}
