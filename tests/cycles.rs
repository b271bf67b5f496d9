//! Repeated bubble sessions must leave nothing behind

use bubble_grid::consts::WALL_COUNT;
use bubble_grid::layout::{Card, CardId, Rect};
use bubble_grid::session::SessionPhase;
use bubble_grid::{Effect, ModeController, Settings};
use glam::Vec2;
use proptest::prelude::*;

const VIEWPORT: Vec2 = Vec2::new(1024.0, 768.0);

fn grid() -> Vec<Card> {
    ["rust web", "rust", "web", "design cli", "cli"]
        .iter()
        .enumerate()
        .map(|(i, tags)| {
            let (col, row) = ((i % 3) as f32, (i / 3) as f32);
            let rect = Rect::new(20.0 + col * 320.0, 40.0 + row * 260.0, 300.0, 220.0);
            Card::from_tag_list(CardId(i as u32), tags, rect)
        })
        .collect()
}

fn home_rects(c: &ModeController) -> Vec<(CardId, Rect)> {
    c.cards().iter().map(|card| (card.id, card.rect)).collect()
}

/// Tally of outstanding page resources, by effect kind
#[derive(Default, Debug)]
struct Ledger {
    scroll: i32,
    touch_guard: i32,
    surface: i32,
    input: i32,
    layout: i32,
    /// Acquires minus releases over every effect seen
    net: i32,
}

impl Ledger {
    fn record(&mut self, effects: &[Effect]) {
        for effect in effects {
            if effect.acquires() {
                self.net += 1;
            }
            if effect.releases() {
                self.net -= 1;
            }
            match effect {
                Effect::LockScroll { .. } => self.scroll += 1,
                Effect::UnlockScroll { .. } => self.scroll -= 1,
                Effect::InstallTouchGuard => self.touch_guard += 1,
                Effect::RemoveTouchGuard => self.touch_guard -= 1,
                Effect::MountSurface { .. } => self.surface += 1,
                Effect::UnmountSurface => self.surface -= 1,
                Effect::ListenInput(_) => self.input += 1,
                Effect::UnlistenInput(_) => self.input -= 1,
                Effect::EnterBubbleLayout { .. } => self.layout += 1,
                Effect::ClearTransientStyles => self.layout = (self.layout - 1).max(0),
                _ => {}
            }
            assert!(self.scroll <= 1, "scroll locked twice");
            assert!(self.surface <= 1, "two drag surfaces mounted");
            assert!(self.input <= 1, "two input listeners");
            assert!(self.scroll >= 0 && self.surface >= 0 && self.input >= 0);
        }
    }

    fn balanced(&self) -> bool {
        self.scroll == 0
            && self.touch_guard == 0
            && self.surface == 0
            && self.input == 0
            && self.layout == 0
            && self.net == 0
    }
}

fn run_frames(c: &mut ModeController, ledger: &mut Ledger, frames: usize) {
    for _ in 0..frames {
        c.tick(1.0 / 60.0);
        ledger.record(&c.drain_effects());
    }
}

fn full_cycle(c: &mut ModeController, ledger: &mut Ledger, finish_by_events: bool) {
    let rects = home_rects(c);
    c.set_bubble_mode(true, 120.0, &rects).unwrap();
    ledger.record(&c.drain_effects());
    assert!(c.lock().is_active());

    run_frames(c, ledger, 30);
    let world = c.session().world().expect("live world");
    assert_eq!(world.static_count(), WALL_COUNT);
    assert_eq!(world.dynamic_count(), c.visible_ids().len());

    c.set_bubble_mode(false, 0.0, &rects).unwrap();
    ledger.record(&c.drain_effects());
    assert_eq!(c.phase(), SessionPhase::Stopping);
    assert!(c.session().world().is_none());

    if finish_by_events {
        for card in c.visible_ids() {
            c.return_finished(card);
        }
        ledger.record(&c.drain_effects());
    } else {
        // No transitionend ever arrives; the deadline settles it
        run_frames(c, ledger, 90);
    }
    assert_eq!(c.phase(), SessionPhase::Idle);
    assert!(!c.lock().is_active());
}

#[test]
fn test_repeated_cycles_release_everything() {
    let mut c = ModeController::new(Settings::default(), grid(), VIEWPORT, false, 3);
    let mut ledger = Ledger::default();

    for i in 0..4 {
        full_cycle(&mut c, &mut ledger, i % 2 == 0);
        assert!(ledger.balanced(), "cycle {}: {:?}", i, ledger);
    }
    assert_eq!(c.session().worlds_created(), 4);
}

#[test]
fn test_cycles_with_filter_changes_in_between() {
    let mut c = ModeController::new(Settings::default(), grid(), VIEWPORT, false, 11);
    let mut ledger = Ledger::default();

    full_cycle(&mut c, &mut ledger, true);

    c.click_filter("rust");
    run_frames(&mut c, &mut ledger, 30);
    assert_eq!(c.visible_ids().len(), 2);

    full_cycle(&mut c, &mut ledger, true);
    assert!(ledger.balanced(), "{:?}", ledger);
    assert_eq!(c.snapshot().len(), 2);
}

#[test]
fn test_filter_mid_session_then_exit_clears_styles() {
    let mut c = ModeController::new(Settings::default(), grid(), VIEWPORT, false, 5);
    let mut ledger = Ledger::default();
    let rects = home_rects(&c);

    c.set_bubble_mode(true, 0.0, &rects).unwrap();
    ledger.record(&c.drain_effects());
    run_frames(&mut c, &mut ledger, 10);

    c.click_filter("web");
    ledger.record(&c.drain_effects());
    c.set_bubble_mode(false, 0.0, &rects).unwrap();
    let effects = c.drain_effects();
    ledger.record(&effects);

    assert!(effects.contains(&Effect::ClearTransientStyles));
    assert!(!effects.iter().any(|e| matches!(e, Effect::AnimateReturn { .. })));
    assert_eq!(c.phase(), SessionPhase::Idle);
    assert!(ledger.balanced(), "{:?}", ledger);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_toggle_sequences_stay_balanced(
        steps in prop::collection::vec((any::<bool>(), 0usize..20), 1..12),
    ) {
        let mut c = ModeController::new(Settings::default(), grid(), VIEWPORT, false, 1);
        let mut ledger = Ledger::default();

        for (enabled, frames) in steps {
            let rects = home_rects(&c);
            let _ = c.set_bubble_mode(enabled, 0.0, &rects);
            ledger.record(&c.drain_effects());
            run_frames(&mut c, &mut ledger, frames);
        }

        // Wind down whatever is left
        let rects = home_rects(&c);
        let _ = c.set_bubble_mode(false, 0.0, &rects);
        ledger.record(&c.drain_effects());
        run_frames(&mut c, &mut ledger, 120);

        prop_assert_eq!(c.phase(), SessionPhase::Idle);
        prop_assert!(!c.lock().is_active());
        prop_assert!(ledger.balanced(), "{:?}", ledger);
    }
}
