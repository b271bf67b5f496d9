//! Bubble Grid entry point

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    bubble_grid::web::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Bubble Grid (native) starting...");
    log::info!("The page layer needs a browser - run with `trunk serve` for the web version");

    println!("\nRunning headless bubble cycle...");
    headless_cycle();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Drive one filter + bubble session against a synthetic grid
#[cfg(not(target_arch = "wasm32"))]
fn headless_cycle() {
    use bubble_grid::layout::{Card, CardId, Rect};
    use bubble_grid::{Effect, ModeController, Settings};
    use glam::Vec2;

    let viewport = Vec2::new(1280.0, 800.0);
    let tags = ["rust web", "rust cli", "web design", "cli", "design"];
    let cards: Vec<Card> = tags
        .iter()
        .enumerate()
        .map(|(i, tags)| {
            let col = (i % 3) as f32;
            let row = (i / 3) as f32;
            let rect = Rect::new(40.0 + col * 400.0, 60.0 + row * 300.0, 360.0, 260.0);
            Card::from_tag_list(CardId(i as u32), tags, rect)
        })
        .collect();
    let rects: Vec<(CardId, Rect)> = cards.iter().map(|c| (c.id, c.rect)).collect();

    let mut controller = ModeController::new(Settings::default(), cards, viewport, false, 7);

    controller.click_filter("rust");
    println!("Filter 'rust' shows {:?}", controller.visible_ids());
    for _ in 0..60 {
        controller.tick(1.0 / 60.0);
    }
    controller.drain_effects();
    controller.update_geometry(&rects);

    if let Err(e) = controller.set_bubble_mode(true, 0.0, &rects) {
        println!("Bubble mode refused: {}", e);
        return;
    }
    for frame in 0..120 {
        controller.pointer_moved(viewport.x, viewport.y * (frame as f32 / 120.0));
        controller.tick(1.0 / 60.0);
    }
    let placed = controller
        .drain_effects()
        .iter()
        .filter(|e| matches!(e, Effect::PlaceCard(_)))
        .count();
    println!("{} card placements over 2s", placed);

    controller.set_bubble_mode(false, 0.0, &rects).ok();
    for card in controller.visible_ids() {
        controller.return_finished(card);
    }
    println!(
        "Session phase after return: {:?}, scroll locked: {}",
        controller.phase(),
        controller.lock().is_active()
    );
    println!("✓ Headless cycle finished");
}
