//! Physics session lifecycle
//!
//! ```text
//! Idle -> Starting -> Running -> Stopping -> Idle
//! ```
//!
//! A session owns one world, the render surface, four boundary walls and one
//! body per visible card. All of it lives in a single [`ActiveSession`] value
//! so it is either fully present or fully gone. The start-phase kick lives
//! inside that value too, so stopping discards it with everything else.

use std::collections::BTreeSet;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::consts::*;
use crate::effect::{CardTransform, Effect};
use crate::error::{BubbleError, Result};
use crate::input::InputSource;
use crate::layout::{CardId, CardShape, GeometrySnapshot, Rect};
use crate::settings::Settings;
use crate::sim::{BodyId, BodyOptions, BodyShape, World};

/// Externally visible lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// World live, waiting for the first step and the kick delay
    Starting,
    /// Kick applied, gravity follows input
    Running,
    /// World gone, cards easing back to the grid
    Stopping,
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Cards are animating home; wait for [`PhysicsSession::return_finished`]
    Returning,
    /// Transient styles cleared immediately (card set changed mid-session)
    Settled,
    /// Nothing to stop
    AlreadyIdle,
    AlreadyStopping,
}

/// A card and the body mirroring it
#[derive(Debug, Clone, Copy)]
struct CardBody {
    card: CardId,
    body: BodyId,
    /// Half of the card's rendered size
    half: Vec2,
}

#[derive(Debug)]
struct ActiveSession {
    world: World,
    walls: [BodyId; WALL_COUNT],
    cards: Vec<CardBody>,
    input: InputSource,
    snapshot: GeometrySnapshot,
    accumulator: f32,
    elapsed_ms: f32,
    kicked: bool,
    /// Set by every physics step, cleared by the next frame sync
    sync_pending: bool,
}

#[derive(Debug)]
struct ReturnTrip {
    outstanding: BTreeSet<CardId>,
    elapsed_ms: f32,
    deadline_ms: f32,
}

#[derive(Debug)]
enum State {
    Idle,
    Live(Box<ActiveSession>),
    Returning(ReturnTrip),
}

pub struct PhysicsSession {
    state: State,
    settings: Settings,
    rng: Pcg32,
    worlds_created: u64,
}

impl PhysicsSession {
    pub fn new(settings: Settings, seed: u64) -> Self {
        Self {
            state: State::Idle,
            settings: settings.sanitized(),
            rng: Pcg32::seed_from_u64(seed),
            worlds_created: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.state {
            State::Idle => SessionPhase::Idle,
            State::Live(live) if live.kicked => SessionPhase::Running,
            State::Live(_) => SessionPhase::Starting,
            State::Returning(_) => SessionPhase::Stopping,
        }
    }

    /// Whether any phase other than Idle is in progress
    pub fn is_active(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    /// Whether a world is currently simulating
    pub fn is_live(&self) -> bool {
        matches!(self.state, State::Live(_))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Total number of worlds ever created by this session object
    pub fn worlds_created(&self) -> u64 {
        self.worlds_created
    }

    pub fn world(&self) -> Option<&World> {
        match &self.state {
            State::Live(live) => Some(&live.world),
            _ => None,
        }
    }

    pub fn input_source(&self) -> Option<InputSource> {
        match &self.state {
            State::Live(live) => Some(live.input),
            _ => None,
        }
    }

    /// Idle -> Starting
    ///
    /// `snapshot` must reflect the currently visible cards.
    pub fn start(
        &mut self,
        snapshot: &GeometrySnapshot,
        viewport: Vec2,
        input: InputSource,
        out: &mut Vec<Effect>,
    ) -> Result<()> {
        let phase = self.phase();
        if phase != SessionPhase::Idle {
            return Err(BubbleError::SessionBusy { phase });
        }
        if snapshot.is_empty() {
            return Err(BubbleError::NoVisibleCards);
        }

        let settings = &self.settings;
        let mut world = World::new(settings.gravity_accel, settings.drag_stiffness);
        let walls = build_walls(&mut world, viewport, settings.wall_thickness);

        let options = BodyOptions {
            restitution: settings.restitution,
            friction: settings.friction,
            air_friction: settings.air_friction,
            ..Default::default()
        };
        let cards: Vec<CardBody> = snapshot
            .entries()
            .iter()
            .map(|&(card, rect)| {
                let shape = card_shape(settings.card_shape, rect);
                let body = world.add_dynamic(shape, rect.center(), options);
                CardBody {
                    card,
                    body,
                    half: rect.half_extents(),
                }
            })
            .collect();

        out.push(Effect::MountSurface {
            width: viewport.x,
            height: viewport.y,
        });
        out.push(Effect::EnterBubbleLayout {
            cards: snapshot.entries().to_vec(),
        });
        for &(card, rect) in snapshot.entries() {
            out.push(Effect::PlaceCard(CardTransform {
                card,
                left: rect.left,
                top: rect.top,
                rotation: 0.0,
            }));
        }
        out.push(Effect::ListenInput(input));

        self.worlds_created += 1;
        log::info!(
            "Bubble session started: {} cards, {:?} input, viewport {}x{}",
            cards.len(),
            input,
            viewport.x,
            viewport.y
        );

        self.state = State::Live(Box::new(ActiveSession {
            world,
            walls,
            cards,
            input,
            snapshot: snapshot.clone(),
            accumulator: 0.0,
            elapsed_ms: 0.0,
            kicked: false,
            sync_pending: false,
        }));
        Ok(())
    }

    /// Advance by one animation frame
    ///
    /// Returns `true` when a pending return trip timed out and the session
    /// settled back to Idle.
    pub fn advance(&mut self, dt: f32, out: &mut Vec<Effect>) -> bool {
        let dt = dt.clamp(0.0, MAX_FRAME_DT);
        match &mut self.state {
            State::Idle => false,
            State::Live(live) => {
                live.accumulator += dt;
                let mut substeps = 0;
                while live.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                    live.world.step(SIM_DT);
                    live.accumulator -= SIM_DT;
                    live.elapsed_ms += SIM_DT * 1000.0;
                    live.sync_pending = true;
                    substeps += 1;
                }
                if substeps == MAX_SUBSTEPS {
                    // Drop the backlog rather than spiral
                    live.accumulator = live.accumulator.min(SIM_DT);
                }

                let first_step_done = live.world.step_count() > 0;
                if !live.kicked && first_step_done && live.elapsed_ms >= self.settings.kick_delay_ms
                {
                    kick(live, &self.settings, &mut self.rng);
                }
                false
            }
            State::Returning(trip) => {
                trip.elapsed_ms += dt * 1000.0;
                if trip.elapsed_ms >= trip.deadline_ms {
                    log::warn!(
                        "Return animation deadline passed with {} cards outstanding",
                        trip.outstanding.len()
                    );
                    self.settle(out);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Emit at most one placement per card if a step ran since the last frame
    pub fn frame_sync(&mut self, out: &mut Vec<Effect>) {
        let State::Live(live) = &mut self.state else {
            return;
        };
        if !live.sync_pending {
            return;
        }
        live.sync_pending = false;
        for card in &live.cards {
            if let Some(body) = live.world.body(card.body) {
                out.push(Effect::PlaceCard(CardTransform {
                    card: card.card,
                    left: body.pos.x - card.half.x,
                    top: body.pos.y - card.half.y,
                    rotation: wrap_angle(body.angle),
                }));
            }
        }
    }

    /// Set the gravity vector; ignored unless a world is live
    pub fn set_gravity(&mut self, gravity: Vec2) {
        if let State::Live(live) = &mut self.state {
            live.world.gravity = gravity;
        }
    }

    pub fn gravity(&self) -> Option<Vec2> {
        self.world().map(|w| w.gravity)
    }

    // === Drag ===

    pub fn drag_start(&mut self, point: Vec2) -> Option<CardId> {
        let State::Live(live) = &mut self.state else {
            return None;
        };
        let body = live.world.begin_drag(point)?;
        live.cards.iter().find(|c| c.body == body).map(|c| c.card)
    }

    pub fn drag_move(&mut self, point: Vec2) {
        if let State::Live(live) = &mut self.state {
            live.world.drag_to(point);
        }
    }

    pub fn drag_end(&mut self) {
        if let State::Live(live) = &mut self.state {
            live.world.end_drag();
        }
    }

    /// Running/Starting -> Stopping (or straight to Idle on a card mismatch)
    ///
    /// `visible` lists the cards visible right now.
    pub fn stop(&mut self, visible: &[CardId], out: &mut Vec<Effect>) -> StopOutcome {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {
                log::debug!("Stop requested with no session running");
                StopOutcome::AlreadyIdle
            }
            State::Returning(trip) => {
                self.state = State::Returning(trip);
                StopOutcome::AlreadyStopping
            }
            State::Live(live) => {
                let ActiveSession {
                    world,
                    walls,
                    cards,
                    input,
                    snapshot,
                    ..
                } = *live;

                out.push(Effect::UnlistenInput(input));
                out.push(Effect::UnmountSurface);
                log::debug!(
                    "Discarding world after {} steps ({} walls, {} cards)",
                    world.step_count(),
                    walls.len(),
                    cards.len()
                );
                drop(world);

                if !snapshot.matches_ids(visible) {
                    log::info!(
                        "Card set changed during session ({} -> {}), skipping return animation",
                        snapshot.len(),
                        visible.len()
                    );
                    out.push(Effect::ClearTransientStyles);
                    return StopOutcome::Settled;
                }

                let duration_ms = self.settings.return_duration_ms;
                for &(card, rect) in snapshot.entries() {
                    out.push(Effect::AnimateReturn {
                        card,
                        rect,
                        duration_ms,
                    });
                }
                log::info!("Bubble session stopping, returning {} cards", snapshot.len());
                self.state = State::Returning(ReturnTrip {
                    outstanding: snapshot.entries().iter().map(|(id, _)| *id).collect(),
                    elapsed_ms: 0.0,
                    deadline_ms: self.settings.return_deadline_ms(),
                });
                StopOutcome::Returning
            }
        }
    }

    /// A card finished its return animation; `true` once the session is Idle
    pub fn return_finished(&mut self, card: CardId, out: &mut Vec<Effect>) -> bool {
        let State::Returning(trip) = &mut self.state else {
            return false;
        };
        if !trip.outstanding.remove(&card) {
            return false;
        }
        if trip.outstanding.is_empty() {
            self.settle(out);
            true
        } else {
            false
        }
    }

    fn settle(&mut self, out: &mut Vec<Effect>) {
        out.push(Effect::ClearTransientStyles);
        self.state = State::Idle;
        log::info!("Bubble session idle");
    }
}

/// Four static walls just outside the viewport edges
fn build_walls(world: &mut World, viewport: Vec2, thickness: f32) -> [BodyId; WALL_COUNT] {
    let Vec2 { x: w, y: h } = viewport;
    let t = thickness;
    [
        // Top and bottom span the corners too
        world.add_static_box(Vec2::new(w / 2.0, -t / 2.0), Vec2::new(w + 2.0 * t, t)),
        world.add_static_box(Vec2::new(w / 2.0, h + t / 2.0), Vec2::new(w + 2.0 * t, t)),
        world.add_static_box(Vec2::new(-t / 2.0, h / 2.0), Vec2::new(t, h)),
        world.add_static_box(Vec2::new(w + t / 2.0, h / 2.0), Vec2::new(t, h)),
    ]
}

fn card_shape(shape: CardShape, rect: Rect) -> BodyShape {
    match shape {
        CardShape::Circle => BodyShape::Circle {
            radius: (rect.width / 2.0).max(1.0),
        },
        CardShape::Box => BodyShape::Box {
            half: rect.half_extents().max(Vec2::ONE),
        },
    }
}

/// Fold an accumulated rotation into (-π, π] so the return ease takes the
/// short way round
fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI { PI } else { wrapped }
}

/// One-time outward impulse with a little spin
fn kick(live: &mut ActiveSession, settings: &Settings, rng: &mut Pcg32) {
    for card in &live.cards {
        let angle = rng.random_range(0.0..std::f32::consts::TAU);
        let speed = rng.random_range(settings.kick_speed_min..=settings.kick_speed_max);
        let spin = rng.random_range(-settings.kick_spin..=settings.kick_spin);
        if let Some(body) = live.world.body(card.body) {
            let impulse = Vec2::from_angle(angle) * speed * body.mass;
            live.world.apply_impulse(card.body, impulse);
            live.world.set_angular_velocity(card.body, spin);
        }
    }
    live.kicked = true;
    log::debug!("Kicked {} bodies", live.cards.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Card;

    const VIEWPORT: Vec2 = Vec2::new(1200.0, 800.0);

    fn snapshot(n: u32) -> GeometrySnapshot {
        let cards: Vec<Card> = (0..n)
            .map(|i| {
                Card::new(
                    CardId(i),
                    ["demo"],
                    Rect::new(40.0 + i as f32 * 220.0, 100.0, 200.0, 200.0),
                )
            })
            .collect();
        GeometrySnapshot::capture(&cards)
    }

    fn run_frames(session: &mut PhysicsSession, frames: usize, out: &mut Vec<Effect>) {
        for _ in 0..frames {
            session.advance(1.0 / 60.0, out);
            session.frame_sync(out);
        }
    }

    #[test]
    fn test_start_creates_walls_and_bodies() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(3), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();

        assert_eq!(session.phase(), SessionPhase::Starting);
        let world = session.world().unwrap();
        assert_eq!(world.static_count(), WALL_COUNT);
        assert_eq!(world.dynamic_count(), 3);
        assert!(out.contains(&Effect::ListenInput(InputSource::Pointer)));
        assert!(matches!(out[0], Effect::MountSurface { .. }));
    }

    #[test]
    fn test_start_rejected_while_busy() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(2), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        run_frames(&mut session, 30, &mut out);
        assert_eq!(session.phase(), SessionPhase::Running);

        let err = session
            .start(&snapshot(2), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            BubbleError::SessionBusy {
                phase: SessionPhase::Running
            }
        ));
        assert_eq!(session.worlds_created(), 1);
        assert_eq!(session.world().unwrap().dynamic_count(), 2);
    }

    #[test]
    fn test_empty_snapshot_rejected() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        let err = session
            .start(&GeometrySnapshot::default(), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap_err();
        assert!(matches!(err, BubbleError::NoVisibleCards));
        assert!(out.is_empty());
        assert!(!session.is_active());
    }

    #[test]
    fn test_kick_waits_for_first_step_and_delay() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(2), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();

        // No time has passed: still Starting, bodies at rest
        session.advance(0.0, &mut out);
        assert_eq!(session.phase(), SessionPhase::Starting);

        // 50 ms is below the 100 ms delay
        run_frames(&mut session, 3, &mut out);
        assert_eq!(session.phase(), SessionPhase::Starting);

        run_frames(&mut session, 4, &mut out);
        assert_eq!(session.phase(), SessionPhase::Running);
        let moving = session
            .world()
            .unwrap()
            .bodies()
            .filter(|b| !b.is_static && b.vel.length() > 100.0)
            .count();
        assert_eq!(moving, 2);
    }

    #[test]
    fn test_one_sync_per_frame() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(3), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        out.clear();

        // A long frame runs several physics steps
        session.advance(0.05, &mut out);
        session.frame_sync(&mut out);
        session.frame_sync(&mut out);
        let placements = out
            .iter()
            .filter(|e| matches!(e, Effect::PlaceCard(_)))
            .count();
        assert_eq!(placements, 3);
    }

    #[test]
    fn test_stop_returns_to_snapshot() {
        let snap = snapshot(3);
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snap, VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        run_frames(&mut session, 90, &mut out);
        out.clear();

        let visible = [CardId(0), CardId(1), CardId(2)];
        assert_eq!(session.stop(&visible, &mut out), StopOutcome::Returning);
        assert_eq!(session.phase(), SessionPhase::Stopping);
        assert!(session.world().is_none());
        assert_eq!(out[0], Effect::UnlistenInput(InputSource::Pointer));
        assert_eq!(out[1], Effect::UnmountSurface);
        for &(card, rect) in snap.entries() {
            assert!(out.contains(&Effect::AnimateReturn {
                card,
                rect,
                duration_ms: 1000.0
            }));
        }

        out.clear();
        assert!(!session.return_finished(CardId(0), &mut out));
        assert!(!session.return_finished(CardId(0), &mut out));
        assert!(!session.return_finished(CardId(1), &mut out));
        assert!(session.return_finished(CardId(2), &mut out));
        assert_eq!(out, vec![Effect::ClearTransientStyles]);
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_stop_with_changed_cards_settles_immediately() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(3), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        out.clear();

        assert_eq!(
            session.stop(&[CardId(0), CardId(2)], &mut out),
            StopOutcome::Settled
        );
        assert!(!out.iter().any(|e| matches!(e, Effect::AnimateReturn { .. })));
        assert_eq!(out.last(), Some(&Effect::ClearTransientStyles));
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_return_deadline_forces_idle() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(1), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        session.stop(&[CardId(0)], &mut out);
        out.clear();

        // 1000 ms duration + 250 ms grace
        let mut settled = false;
        for _ in 0..80 {
            settled |= session.advance(1.0 / 60.0, &mut out);
        }
        assert!(settled);
        assert_eq!(out, vec![Effect::ClearTransientStyles]);
        assert!(!session.is_active());
    }

    #[test]
    fn test_stop_during_starting_discards_kick() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(2), VIEWPORT, InputSource::Orientation, &mut out)
            .unwrap();
        session.stop(&[CardId(0), CardId(1)], &mut out);
        run_frames(&mut session, 120, &mut out);

        // A fresh session starts unkicked
        let mut session_out = Vec::new();
        assert!(!session.is_active());
        session
            .start(&snapshot(2), VIEWPORT, InputSource::Pointer, &mut session_out)
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::Starting);
        assert_eq!(session.worlds_created(), 2);
    }

    #[test]
    fn test_stop_when_idle_is_harmless() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        assert_eq!(session.stop(&[], &mut out), StopOutcome::AlreadyIdle);
        assert!(out.is_empty());
    }

    #[test]
    fn test_bodies_stay_inside_viewport() {
        let mut session = PhysicsSession::new(Settings::default(), 99);
        let mut out = Vec::new();
        session
            .start(&snapshot(5), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        session.set_gravity(Vec2::new(1.0, 1.0));
        run_frames(&mut session, 600, &mut out);

        for body in session.world().unwrap().bodies().filter(|b| !b.is_static) {
            assert!(body.pos.x > -10.0 && body.pos.x < VIEWPORT.x + 10.0, "{:?}", body.pos);
            assert!(body.pos.y > -10.0 && body.pos.y < VIEWPORT.y + 10.0, "{:?}", body.pos);
        }
    }

    #[test]
    fn test_drag_picks_card() {
        let mut session = PhysicsSession::new(Settings::default(), 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(2), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        // Card 1 is centered at (360, 200)
        assert_eq!(session.drag_start(Vec2::new(360.0, 200.0)), Some(CardId(1)));
        session.drag_move(Vec2::new(600.0, 600.0));
        session.drag_end();
        assert_eq!(session.drag_start(Vec2::new(1190.0, 790.0)), None);
    }

    #[test]
    fn test_overflowing_config_still_kicks() {
        let settings = Settings::from_json(
            r#"{"kick_spin": 1e39, "kick_speed_max": 1e39, "gravity_accel": 1e39}"#,
        )
        .unwrap();
        let mut session = PhysicsSession::new(settings, 7);
        let mut out = Vec::new();
        session
            .start(&snapshot(3), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        session.set_gravity(Vec2::new(0.5, 1.0));
        run_frames(&mut session, 30, &mut out);

        assert_eq!(session.phase(), SessionPhase::Running);
        for body in session.world().unwrap().bodies() {
            assert!(body.pos.is_finite() && body.vel.is_finite(), "{:?}", body);
        }
    }

    #[test]
    fn test_rotation_is_wrapped_for_placement() {
        use std::f32::consts::{PI, TAU};
        assert!((wrap_angle(40.0) - (40.0 - 6.0 * TAU)).abs() < 1e-3);
        assert!((wrap_angle(-3.5) - (TAU - 3.5)).abs() < 1e-4);
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), PI);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-6);

        let mut session = PhysicsSession::new(Settings::default(), 3);
        let mut out = Vec::new();
        session
            .start(&snapshot(2), VIEWPORT, InputSource::Pointer, &mut out)
            .unwrap();
        run_frames(&mut session, 240, &mut out);
        for effect in &out {
            if let Effect::PlaceCard(t) = effect {
                assert!(t.rotation > -PI && t.rotation <= PI, "{:?}", t);
            }
        }
    }
}
