//! Browser adapter
//!
//! Owns the [`ModeController`], feeds it page events and animation frames,
//! and applies the effects it queues. Page-lifetime handlers are leaked with
//! `forget()`; session handlers live in [`SessionListeners`] and are removed
//! on teardown.

mod listener;
mod page;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    DeviceOrientationEvent, Event, EventTarget, MouseEvent, Node, PointerEvent, TransitionEvent,
};

use crate::ModeController;
use crate::consts::MAX_FRAME_DT;
use crate::effect::{Effect, is_return_transition};
use crate::input::InputSource;
use crate::layout::CardId;

use listener::{Listener, SessionListeners};
use page::Page;

struct App {
    controller: ModeController,
    page: Page,
    listeners: SessionListeners,
    last_time: f64,
}

type Shared = Rc<RefCell<App>>;

pub fn run() {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&format!("Logger already set: {}", e).into());
    }

    log::info!("Bubble grid starting...");

    let page = match Page::discover() {
        Ok(page) => page,
        Err(e) => {
            log::error!("{}; interaction layer disabled", e);
            return;
        }
    };

    let settings = page.read_settings();
    let cards = page.read_cards();
    let viewport = page.viewport();
    let coarse = page.coarse_pointer();
    let seed = js_sys::Date::now() as u64;

    let mut page = page;
    page.apply(&Effect::ApplyTheme(settings.theme));
    // Browsers may restore a checked box from the form cache
    page.toggle.set_checked(false);

    let mut controller = ModeController::new(settings, cards, viewport, coarse, seed);
    controller.select_theme(page.selected_theme());

    log::info!(
        "Initialized with seed {} ({} cards, coarse pointer: {})",
        seed,
        controller.cards().len(),
        coarse
    );

    let app = Rc::new(RefCell::new(App {
        controller,
        page,
        listeners: SessionListeners::default(),
        last_time: 0.0,
    }));
    flush(&app);

    setup_toggle(app.clone());
    setup_filters(app.clone());
    setup_theme_select(app.clone());
    setup_resize(app.clone());
    setup_return_listeners(app.clone());

    request_animation_frame(app);

    log::info!("Bubble grid running");
}

/// Apply queued effects until the controller stops producing them
fn flush(app: &Shared) {
    loop {
        let effects = app.borrow_mut().controller.drain_effects();
        if effects.is_empty() {
            break;
        }
        for effect in effects {
            apply_effect(app, effect);
        }
    }
}

fn apply_effect(app: &Shared, effect: Effect) {
    match effect {
        Effect::MeasureCards => {
            let mut a = app.borrow_mut();
            a.page.collapse_hidden();
            let rects = a.page.measure();
            a.controller.update_geometry(&rects);
        }
        Effect::InstallTouchGuard => install_touch_guard(app),
        Effect::RemoveTouchGuard => app.borrow_mut().listeners.detach_touch_guard(),
        Effect::MountSurface { width, height } => mount_surface(app, width, height),
        Effect::UnmountSurface => {
            let mut a = app.borrow_mut();
            a.listeners.detach_surface();
            a.page.apply(&Effect::UnmountSurface);
        }
        Effect::ListenInput(source) => listen_input(app, source),
        Effect::UnlistenInput(_) => app.borrow_mut().listeners.detach_input(),
        other => app.borrow_mut().page.apply(&other),
    }
}

/// Run `f` against the app if it still exists, then apply its effects
fn with_app(weak: &Weak<RefCell<App>>, f: impl FnOnce(&mut App)) {
    let Some(app) = weak.upgrade() else {
        return;
    };
    f(&mut app.borrow_mut());
    flush(&app);
}

// === Session listeners ===

fn listen_input(app: &Shared, source: InputSource) {
    let weak = Rc::downgrade(app);
    let window: EventTarget = app.borrow().page.window.clone().into();

    let attached = match source {
        InputSource::Pointer => Listener::attach(&window, source.event_name(), move |event| {
            let Some(event) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            let (x, y) = (event.client_x() as f32, event.client_y() as f32);
            with_app(&weak, |a| a.controller.pointer_moved(x, y));
        }),
        InputSource::Orientation => {
            Listener::attach(&window, source.event_name(), move |event| {
                let Some(event) = event.dyn_ref::<DeviceOrientationEvent>() else {
                    return;
                };
                let (gamma, beta) = (event.gamma(), event.beta());
                with_app(&weak, |a| a.controller.orientation_changed(gamma, beta));
            })
        }
    };

    match attached {
        Ok(listener) => {
            let mut a = app.borrow_mut();
            a.listeners.detach_input();
            a.listeners.input = Some(listener);
            log::info!("Gravity follows {:?} input", source);
        }
        Err(e) => log::error!("Failed to listen for {}: {:?}", source.event_name(), e),
    }
}

fn install_touch_guard(app: &Shared) {
    let (body, zone) = {
        let a = app.borrow();
        (a.page.document.body(), a.page.toggle_zone.clone())
    };
    let Some(body) = body else {
        log::warn!("No body to guard against touch scrolling");
        return;
    };

    let zone: Node = zone.into();
    let body: EventTarget = body.into();
    let attached = Listener::attach_active(&body, "touchmove", move |event: Event| {
        let inside_toggle = event
            .target()
            .and_then(|t| t.dyn_into::<Node>().ok())
            .is_some_and(|node| zone.contains(Some(&node)));
        if !inside_toggle {
            event.prevent_default();
        }
    });

    match attached {
        Ok(listener) => {
            let mut a = app.borrow_mut();
            a.listeners.detach_touch_guard();
            a.listeners.touch_guard = Some(listener);
        }
        Err(e) => log::error!("Failed to install touch guard: {:?}", e),
    }
}

fn mount_surface(app: &Shared, width: f32, height: f32) {
    let canvas = {
        let mut a = app.borrow_mut();
        a.listeners.detach_surface();
        a.page.mount_surface(width, height)
    };
    let Some(canvas) = canvas else {
        log::error!("Drag surface unavailable; cards will not be draggable");
        return;
    };
    let target: EventTarget = canvas.clone().into();
    let mut listeners = Vec::with_capacity(4);

    {
        let weak = Rc::downgrade(app);
        let canvas = canvas.clone();
        let down = Listener::attach(&target, "pointerdown", move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else {
                return;
            };
            let (x, y) = (event.client_x() as f32, event.client_y() as f32);
            let pointer_id = event.pointer_id();
            with_app(&weak, |a| {
                if let Some(card) = a.controller.drag_start(x, y) {
                    log::debug!("Dragging card {}", card.0);
                    let _ = canvas.set_pointer_capture(pointer_id);
                }
            });
        });
        listeners.push(down);
    }
    {
        let weak = Rc::downgrade(app);
        let moved = Listener::attach(&target, "pointermove", move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else {
                return;
            };
            let (x, y) = (event.client_x() as f32, event.client_y() as f32);
            with_app(&weak, |a| a.controller.drag_move(x, y));
        });
        listeners.push(moved);
    }
    for kind in ["pointerup", "pointercancel"] {
        let weak = Rc::downgrade(app);
        let up = Listener::attach(&target, kind, move |_event| {
            with_app(&weak, |a| a.controller.drag_end());
        });
        listeners.push(up);
    }

    let mut a = app.borrow_mut();
    for listener in listeners {
        match listener {
            Ok(listener) => a.listeners.surface.push(listener),
            Err(e) => log::error!("Failed to attach drag listener: {:?}", e),
        }
    }
}

// === Page-lifetime handlers ===

fn setup_toggle(app: Shared) {
    let toggle = app.borrow().page.toggle.clone();
    let closure = Closure::<dyn FnMut(_)>::new(move |_event: Event| {
        {
            let mut a = app.borrow_mut();
            let enabled = a.page.toggle.checked();
            let offset = a.page.scroll_offset();
            let rects = a.page.measure();
            // Refusals are logged and the toggle reset by the controller
            let _ = a.controller.set_bubble_mode(enabled, offset, &rects);
        }
        flush(&app);
    });
    if let Err(e) =
        toggle.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref())
    {
        log::error!("Failed to listen on bubble toggle: {:?}", e);
    }
    closure.forget();
}

fn setup_filters(app: Shared) {
    let buttons = app.borrow().page.filter_buttons.clone();
    for button in buttons {
        let tag = button.get_attribute("data-filter").unwrap_or_default();
        let app = app.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: Event| {
            event.prevent_default();
            app.borrow_mut().controller.click_filter(&tag);
            flush(&app);
        });
        if let Err(e) =
            button.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
        {
            log::warn!("Failed to listen on filter button: {:?}", e);
        }
        closure.forget();
    }
}

fn setup_theme_select(app: Shared) {
    let Some(select) = app.borrow().page.theme_select.clone() else {
        return;
    };
    let closure = Closure::<dyn FnMut(_)>::new(move |_event: Event| {
        {
            let mut a = app.borrow_mut();
            let theme = a.page.selected_theme();
            a.controller.select_theme(theme);
        }
        flush(&app);
    });
    if let Err(e) =
        select.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref())
    {
        log::warn!("Failed to listen on theme selector: {:?}", e);
    }
    closure.forget();
}

fn setup_resize(app: Shared) {
    let window = app.borrow().page.window.clone();
    let closure = Closure::<dyn FnMut(_)>::new(move |_event: Event| {
        {
            let mut a = app.borrow_mut();
            let viewport = a.page.viewport();
            let rects = a.page.measure();
            a.controller.resize(viewport, &rects);
        }
        flush(&app);
    });
    if let Err(e) =
        window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())
    {
        log::warn!("Failed to listen for resize: {:?}", e);
    }
    closure.forget();
}

/// One `transitionend` handler per card reports finished return trips
///
/// The event bubbles, so transitions on a card's children and on properties
/// the return trip does not ease are ignored.
fn setup_return_listeners(app: Shared) {
    let cards: Vec<(CardId, web_sys::HtmlElement)> = app.borrow().page.cards.clone();
    for (card, el) in cards {
        let app = app.clone();
        let card_value: JsValue = el.clone().into();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: Event| {
            if event.target().map(JsValue::from).as_ref() != Some(&card_value) {
                return;
            }
            let Some(event) = event.dyn_ref::<TransitionEvent>() else {
                return;
            };
            if !is_return_transition(&event.property_name()) {
                return;
            }
            app.borrow_mut().controller.return_finished(card);
            flush(&app);
        });
        if let Err(e) =
            el.add_event_listener_with_callback("transitionend", closure.as_ref().unchecked_ref())
        {
            log::warn!("Failed to listen for card transitions: {:?}", e);
        }
        closure.forget();
    }
}

// === Frame loop ===

fn request_animation_frame(app: Shared) {
    let window = app.borrow().page.window.clone();
    let closure = Closure::once(move |time: f64| {
        frame(app, time);
    });
    let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
    closure.forget();
}

fn frame(app: Shared, time: f64) {
    {
        let mut a = app.borrow_mut();
        let dt = if a.last_time > 0.0 {
            (((time - a.last_time) / 1000.0) as f32).min(MAX_FRAME_DT)
        } else {
            0.0
        };
        a.last_time = time;
        a.controller.tick(dt);
    }
    flush(&app);

    request_animation_frame(app);
}
