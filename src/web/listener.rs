//! Removable DOM event listeners
//!
//! Session-scoped listeners must come off again on teardown, so unlike the
//! page-lifetime handlers they keep their closure instead of forgetting it.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{AddEventListenerOptions, Event, EventTarget};

pub(crate) struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl Listener {
    pub(crate) fn attach<F>(
        target: &EventTarget,
        kind: &'static str,
        handler: F,
    ) -> Result<Self, JsValue>
    where
        F: FnMut(Event) + 'static,
    {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            kind,
            closure,
        })
    }

    /// Attach with `passive: false` so the handler may call `preventDefault`
    pub(crate) fn attach_active<F>(
        target: &EventTarget,
        kind: &'static str,
        handler: F,
    ) -> Result<Self, JsValue>
    where
        F: FnMut(Event) + 'static,
    {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        let options = AddEventListenerOptions::new();
        options.set_passive(false);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            kind,
            closure.as_ref().unchecked_ref(),
            &options,
        )?;
        Ok(Self {
            target: target.clone(),
            kind,
            closure,
        })
    }

    /// Remove the listener; failures are logged, never raised
    pub(crate) fn detach(self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref())
        {
            log::warn!("Failed to remove {} listener: {:?}", self.kind, e);
        }
    }
}

/// Listeners that exist only while a session is live
#[derive(Default)]
pub(crate) struct SessionListeners {
    pub(crate) input: Option<Listener>,
    pub(crate) touch_guard: Option<Listener>,
    pub(crate) surface: Vec<Listener>,
}

impl SessionListeners {
    pub(crate) fn detach_input(&mut self) {
        if let Some(listener) = self.input.take() {
            listener.detach();
        }
    }

    pub(crate) fn detach_touch_guard(&mut self) {
        if let Some(listener) = self.touch_guard.take() {
            listener.detach();
        }
    }

    pub(crate) fn detach_surface(&mut self) {
        for listener in self.surface.drain(..) {
            listener.detach();
        }
    }
}
