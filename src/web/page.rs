//! DOM side of the interaction: element discovery, measurement and the
//! style mutations behind each [`Effect`].

use glam::Vec2;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlCanvasElement, HtmlElement, HtmlInputElement, HtmlLinkElement,
    HtmlSelectElement, Window,
};

use crate::consts::*;
use crate::effect::{CardTransform, Effect, RETURN_PROPERTIES};
use crate::error::BubbleError;
use crate::layout::{Card, CardId, Rect, normalize_tag};
use crate::settings::{Settings, Theme};

/// Inline properties bubble mode puts on cards
const CARD_TRANSIENT: [&str; 8] = [
    "position",
    "left",
    "top",
    "width",
    "height",
    "transition",
    "z-index",
    "transform",
];

/// Inline properties bubble mode puts on the grid container
const GRID_TRANSIENT: [&str; 7] = [
    "position",
    "left",
    "top",
    "width",
    "height",
    "z-index",
    "pointer-events",
];

/// Inline properties the scroll lock puts on the body
const BODY_LOCK: [&str; 4] = ["overflow", "position", "top", "width"];

pub(crate) struct Page {
    pub(crate) window: Window,
    pub(crate) document: Document,
    pub(crate) grid: HtmlElement,
    pub(crate) toggle: HtmlInputElement,
    /// Region that stays touchable while the touch guard is installed
    pub(crate) toggle_zone: Element,
    pub(crate) cards: Vec<(CardId, HtmlElement)>,
    pub(crate) filter_buttons: Vec<HtmlElement>,
    pub(crate) theme_select: Option<HtmlSelectElement>,
    theme_link: Option<HtmlLinkElement>,
    pub(crate) surface: Option<HtmlCanvasElement>,
    visible: Vec<bool>,
    in_bubble_layout: bool,
}

impl Page {
    /// Find the page controls; the grid and toggle are required
    pub(crate) fn discover() -> Result<Self, BubbleError> {
        let window = web_sys::window().ok_or(BubbleError::MissingControl("window"))?;
        let document = window
            .document()
            .ok_or(BubbleError::MissingControl("document"))?;

        let grid = document
            .get_element_by_id("projectGrid")
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
            .ok_or(BubbleError::MissingControl("#projectGrid"))?;
        let toggle = document
            .get_element_by_id("bubbleToggle")
            .and_then(|e| e.dyn_into::<HtmlInputElement>().ok())
            .ok_or(BubbleError::MissingControl("#bubbleToggle"))?;

        let toggle_zone = toggle
            .closest(".center-toggle")
            .ok()
            .flatten()
            .unwrap_or_else(|| toggle.clone().into());

        let cards: Vec<(CardId, HtmlElement)> = query_all(&document, ".project")
            .into_iter()
            .enumerate()
            .map(|(i, el)| (CardId(i as u32), el))
            .collect();
        let filter_buttons = query_all(&document, "[data-filter]");

        let theme_select = document
            .get_element_by_id("themeSelect")
            .and_then(|e| e.dyn_into::<HtmlSelectElement>().ok());
        let theme_link = document
            .get_element_by_id("themeStylesheet")
            .and_then(|e| e.dyn_into::<HtmlLinkElement>().ok());

        log::info!(
            "Found {} cards, {} filter buttons, theme selector: {}",
            cards.len(),
            filter_buttons.len(),
            theme_select.is_some()
        );

        Ok(Self {
            window,
            document,
            grid,
            toggle,
            toggle_zone,
            visible: vec![true; cards.len()],
            cards,
            filter_buttons,
            theme_select,
            theme_link,
            surface: None,
            in_bubble_layout: false,
        })
    }

    /// Settings from the optional `#bubbleConfig` JSON block
    pub(crate) fn read_settings(&self) -> Settings {
        let Some(json) = self
            .document
            .get_element_by_id("bubbleConfig")
            .and_then(|e| e.text_content())
        else {
            return Settings::default();
        };
        match Settings::from_json(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from #bubbleConfig");
                settings
            }
            Err(e) => {
                log::error!("{}; using defaults", e);
                Settings::default()
            }
        }
    }

    pub(crate) fn read_cards(&self) -> Vec<Card> {
        let rects = self.measure();
        self.cards
            .iter()
            .zip(rects)
            .map(|((id, el), (_, rect))| {
                let tags = el.get_attribute("data-tags").unwrap_or_default();
                Card::from_tag_list(*id, &tags, rect)
            })
            .collect()
    }

    pub(crate) fn measure(&self) -> Vec<(CardId, Rect)> {
        self.cards
            .iter()
            .map(|(id, el)| {
                let r = el.get_bounding_client_rect();
                (
                    *id,
                    Rect::new(
                        r.left() as f32,
                        r.top() as f32,
                        r.width() as f32,
                        r.height() as f32,
                    ),
                )
            })
            .collect()
    }

    pub(crate) fn viewport(&self) -> Vec2 {
        let w = self
            .window
            .inner_width()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let h = self
            .window
            .inner_height()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        Vec2::new(w as f32, h as f32)
    }

    pub(crate) fn scroll_offset(&self) -> f32 {
        self.window.scroll_y().unwrap_or(0.0) as f32
    }

    pub(crate) fn coarse_pointer(&self) -> bool {
        self.window
            .match_media("(pointer: coarse)")
            .ok()
            .flatten()
            .is_some_and(|mq| mq.matches())
    }

    pub(crate) fn selected_theme(&self) -> Option<Theme> {
        self.theme_select
            .as_ref()
            .and_then(|select| Theme::from_str(&select.value()))
    }

    fn card(&self, id: CardId) -> Option<&HtmlElement> {
        self.cards.iter().find(|(card, _)| *card == id).map(|(_, el)| el)
    }

    /// Apply an effect that needs no event listeners
    pub(crate) fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::SetCardVisibility {
                card,
                visible,
                fade_ms,
            } => self.set_card_visibility(*card, *visible, *fade_ms),
            Effect::MarkActiveFilter { tag } => self.mark_active_filter(tag.as_deref()),
            Effect::LockScroll { offset } => self.lock_scroll(*offset),
            Effect::UnlockScroll { offset } => self.unlock_scroll(*offset),
            Effect::EnterBubbleLayout { cards } => self.enter_bubble_layout(cards),
            Effect::PlaceCard(transform) => self.place_card(transform),
            Effect::AnimateReturn {
                card,
                rect,
                duration_ms,
            } => self.animate_return(*card, *rect, *duration_ms),
            Effect::ClearTransientStyles => self.clear_transient_styles(),
            Effect::SetToggle { checked } => self.toggle.set_checked(*checked),
            Effect::ApplyTheme(theme) => self.apply_theme(*theme),
            Effect::UnmountSurface => self.unmount_surface(),
            // Listener and measurement effects are handled by the app
            Effect::MeasureCards
            | Effect::InstallTouchGuard
            | Effect::RemoveTouchGuard
            | Effect::MountSurface { .. }
            | Effect::ListenInput(_)
            | Effect::UnlistenInput(_) => {}
        }
    }

    fn set_card_visibility(&mut self, id: CardId, visible: bool, fade_ms: f32) {
        if let Some(slot) = self.visible.get_mut(id.0 as usize) {
            *slot = visible;
        }
        let Some(el) = self.card(id) else {
            return;
        };
        let transition = format!("opacity {}ms ease", fade_ms);
        if visible {
            // Back into the flow before fading in
            remove_styles(el, &["display"]);
        }
        if !self.in_bubble_layout {
            set_styles(el, &[("transition", &transition)]);
        }
        set_styles(
            el,
            &[
                ("opacity", if visible { "1" } else { "0" }),
                ("pointer-events", if visible { "auto" } else { "none" }),
            ],
        );
        let _ = el.set_attribute("aria-hidden", if visible { "false" } else { "true" });
    }

    /// Take faded-out cards out of the flow so the grid closes up
    pub(crate) fn collapse_hidden(&self) {
        if self.in_bubble_layout {
            return;
        }
        for ((_, el), visible) in self.cards.iter().zip(&self.visible) {
            if *visible {
                remove_styles(el, &["display"]);
            } else {
                set_styles(el, &[("display", "none")]);
            }
        }
    }

    fn mark_active_filter(&self, tag: Option<&str>) {
        for button in &self.filter_buttons {
            let button_tag = button
                .get_attribute("data-filter")
                .and_then(|t| normalize_tag(&t));
            let active = tag.is_some() && button_tag.as_deref() == tag;
            if let Err(e) = button.class_list().toggle_with_force("active", active) {
                log::warn!("Failed to mark filter button: {:?}", e);
            }
            let _ = button.set_attribute("aria-pressed", if active { "true" } else { "false" });
        }
    }

    fn lock_scroll(&self, offset: f32) {
        let Some(body) = self.document.body() else {
            return;
        };
        let top = format!("-{}px", offset);
        set_styles(
            &body,
            &[
                ("overflow", "hidden"),
                ("position", "fixed"),
                ("top", &top),
                ("width", "100%"),
            ],
        );
    }

    fn unlock_scroll(&self, offset: f32) {
        if let Some(body) = self.document.body() {
            remove_styles(&body, &BODY_LOCK);
        }
        self.window.scroll_to_with_x_and_y(0.0, offset as f64);
    }

    fn enter_bubble_layout(&mut self, cards: &[(CardId, Rect)]) {
        self.in_bubble_layout = true;
        if let Err(e) = self.grid.class_list().add_1("bubble-mode") {
            log::warn!("Failed to add bubble-mode class: {:?}", e);
        }
        let z = BUBBLE_Z_INDEX.to_string();
        set_styles(
            &self.grid,
            &[
                ("position", "fixed"),
                ("left", "0"),
                ("top", "0"),
                ("width", "100vw"),
                ("height", "100vh"),
                ("z-index", &z),
                ("pointer-events", "none"),
            ],
        );

        let z = CARD_Z_INDEX.to_string();
        for &(id, rect) in cards {
            if let Some(el) = self.card(id) {
                let width = format!("{}px", rect.width);
                let height = format!("{}px", rect.height);
                set_styles(
                    el,
                    &[
                        ("position", "absolute"),
                        ("transition", "none"),
                        ("z-index", &z),
                        ("width", &width),
                        ("height", &height),
                    ],
                );
            }
        }

        // The toggle must stay reachable above the drag surface
        if let Some(zone) = self.toggle_zone.dyn_ref::<HtmlElement>() {
            let z = (BUBBLE_Z_INDEX + 2).to_string();
            set_styles(zone, &[("pointer-events", "auto"), ("z-index", &z)]);
        }
    }

    fn place_card(&self, t: &CardTransform) {
        let Some(el) = self.card(t.card) else {
            return;
        };
        let left = format!("{}px", t.left);
        let top = format!("{}px", t.top);
        let transform = format!("rotate({}rad)", t.rotation);
        set_styles(
            el,
            &[("left", &left), ("top", &top), ("transform", &transform)],
        );
    }

    fn animate_return(&self, id: CardId, rect: Rect, duration_ms: f32) {
        let Some(el) = self.card(id) else {
            return;
        };
        let transition = RETURN_PROPERTIES
            .iter()
            .map(|p| format!("{} {}ms {}", p, duration_ms, RETURN_EASING))
            .collect::<Vec<_>>()
            .join(", ");
        let left = format!("{}px", rect.left);
        let top = format!("{}px", rect.top);
        set_styles(
            el,
            &[
                ("transition", &transition),
                ("left", &left),
                ("top", &top),
                ("transform", "rotate(0rad)"),
            ],
        );
    }

    fn clear_transient_styles(&mut self) {
        self.in_bubble_layout = false;
        for (_, el) in &self.cards {
            remove_styles(el, &CARD_TRANSIENT);
        }
        if let Err(e) = self.grid.class_list().remove_1("bubble-mode") {
            log::warn!("Failed to remove bubble-mode class: {:?}", e);
        }
        remove_styles(&self.grid, &GRID_TRANSIENT);
        if let Some(zone) = self.toggle_zone.dyn_ref::<HtmlElement>() {
            remove_styles(zone, &["pointer-events", "z-index"]);
        }
    }

    fn apply_theme(&self, theme: Theme) {
        if let Some(body) = self.document.body() {
            let classes = body.class_list();
            let _ = classes.remove_2("theme-bubbly", "theme-classic");
            let _ = classes.add_1(&format!("theme-{}", theme.as_str()));
        }
        if let Some(link) = &self.theme_link {
            let attr = format!("data-{}-href", theme.as_str());
            if let Some(href) = link.get_attribute(&attr) {
                link.set_href(&href);
            }
        }
    }

    /// Create the transparent drag surface over the viewport
    pub(crate) fn mount_surface(&mut self, width: f32, height: f32) -> Option<HtmlCanvasElement> {
        // A stale surface from an interrupted session goes first
        self.unmount_surface();

        let canvas = self
            .document
            .create_element("canvas")
            .ok()?
            .dyn_into::<HtmlCanvasElement>()
            .ok()?;
        let dpr = self.window.device_pixel_ratio();
        canvas.set_width((width as f64 * dpr) as u32);
        canvas.set_height((height as f64 * dpr) as u32);
        canvas.set_id("bubbleSurface");
        let z = (BUBBLE_Z_INDEX + 1).to_string();
        set_styles(
            &canvas,
            &[
                ("position", "fixed"),
                ("left", "0"),
                ("top", "0"),
                ("width", "100vw"),
                ("height", "100vh"),
                ("z-index", &z),
                ("background", "transparent"),
                ("touch-action", "none"),
            ],
        );

        let body = self.document.body()?;
        if let Err(e) = body.append_child(&canvas) {
            log::error!("Failed to mount drag surface: {:?}", e);
            return None;
        }
        self.surface = Some(canvas.clone());
        Some(canvas)
    }

    fn unmount_surface(&mut self) {
        if let Some(canvas) = self.surface.take() {
            canvas.remove();
        }
    }
}

fn query_all(document: &Document, selector: &str) -> Vec<HtmlElement> {
    let Ok(list) = document.query_selector_all(selector) else {
        log::warn!("Bad selector {}", selector);
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<HtmlElement>().ok())
        .collect()
}

fn set_styles(el: &HtmlElement, props: &[(&str, &str)]) {
    let style = el.style();
    for (name, value) in props {
        if let Err(e) = style.set_property(name, value) {
            log::warn!("Failed to set {}: {:?}", name, e);
        }
    }
}

fn remove_styles(el: &HtmlElement, names: &[&str]) {
    let style = el.style();
    for name in names {
        if let Err(e) = style.remove_property(name) {
            log::warn!("Failed to clear {}: {:?}", name, e);
        }
    }
}
