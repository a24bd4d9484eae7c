//! Browser bindings: wires the agent to `postMessage`, scroll/resize,
//! animation frames, debounce timeouts and a `MutationObserver`.

mod document;
mod observer;
mod overlay;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{AddEventListenerOptions, Event, EventTarget, MessageEvent, MutationObserver, Window};

use neo_heatmap_shared::{Envelope, Response};

use crate::agent::{Agent, Dispatch, InitTicket};
use crate::config::{
    AgentConfig, CONFIG_GLOBAL, MUTATION_DEBOUNCE_MS, VIEWPORT_NOTIFY_DEBOUNCE_MS,
};
use crate::gateway::{Admission, Gateway, Request};
use crate::logging;

pub use document::WebDocument;
pub use observer::{ObserverSlot, observe_subtree, summarize_records};
pub use overlay::WebOverlay;

pub type WebAgent = Agent<WebDocument, WebOverlay>;

/// Last controller a command was accepted from; target of viewport pushes.
struct Controller {
    window: Window,
    origin: String,
}

struct Listener {
    target: EventTarget,
    event: &'static str,
    capture: bool,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn attach(
        target: &EventTarget,
        event: &'static str,
        capture: bool,
        passive: bool,
        callback: Closure<dyn FnMut(Event)>,
    ) -> Option<Self> {
        let options = AddEventListenerOptions::new();
        options.set_capture(capture);
        options.set_passive(passive);
        target
            .add_event_listener_with_callback_and_add_event_listener_options(
                event,
                callback.as_ref().unchecked_ref(),
                &options,
            )
            .ok()?;
        Some(Self {
            target: target.clone(),
            event,
            capture,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self.target.remove_event_listener_with_callback_and_bool(
            self.event,
            self.callback.as_ref().unchecked_ref(),
            self.capture,
        );
    }
}

struct Runtime {
    agent: WebAgent,
    gateway: Gateway,
    window: Window,
    document: WebDocument,
    observer: ObserverSlot,
    observer_callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
    frame_callback: Closure<dyn FnMut()>,
    frame_id: Option<i32>,
    rebuild_timeout: Option<Timeout>,
    viewport_timeout: Option<Timeout>,
    controller: Option<Controller>,
    listeners: Vec<Listener>,
}

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> Option<R> {
    RUNTIME.with(|slot| {
        let mut slot = slot.try_borrow_mut().ok()?;
        slot.as_mut().map(f)
    })
}

fn read_config(window: &Window) -> (AgentConfig, Option<String>) {
    let raw = js_sys::Reflect::get(window, &JsValue::from_str(CONFIG_GLOBAL))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null());
    let Some(raw) = raw else {
        return (AgentConfig::default(), None);
    };
    let parsed = serde_wasm_bindgen::from_value::<Value>(raw)
        .map_err(|e| format!("unreadable config: {e}"))
        .and_then(|value| AgentConfig::from_override(Some(value)));
    match parsed {
        Ok(config) => (config, None),
        Err(e) => (AgentConfig::default(), Some(e)),
    }
}

fn post(target: &Window, origin: &str, envelope: &Envelope) {
    let value = match envelope.serialize(&serde_wasm_bindgen::Serializer::json_compatible()) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(kind = %envelope.kind, error = %e, "failed to encode message");
            return;
        }
    };
    if target.post_message(&value, origin).is_ok() {
        return;
    }
    if let Err(e) = target.post_message(&value, "*") {
        tracing::warn!(kind = %envelope.kind, error = ?e, "failed to post message");
    }
}

/// Start the agent in the current window. Replaces any earlier instance.
pub fn boot() {
    console_error_panic_hook::set_once();
    let Some(window) = web_sys::window() else {
        return;
    };
    let (config, config_error) = read_config(&window);
    logging::init(&config.log_level);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "ignoring page config override");
    }

    let document = match WebDocument::new(window.clone()) {
        Ok(document) => document,
        Err(e) => {
            tracing::error!(error = %e, "agent has no document to attach to");
            return;
        }
    };

    let observer: ObserverSlot = Rc::new(RefCell::new(None));
    let overlay = WebOverlay::new(document.document().clone(), Rc::clone(&observer));
    let agent = Agent::new(config.clone(), document.clone(), overlay);

    let observer_callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        |records: js_sys::Array, _observer: MutationObserver| {
            with_runtime(|rt| rt.on_records(&records));
        },
    );
    let frame_callback = Closure::<dyn FnMut()>::new(|| {
        with_runtime(|rt| {
            rt.frame_id = None;
            rt.agent.on_frame();
        });
    });

    let mut runtime = Runtime {
        agent,
        gateway: Gateway::new(&config),
        window: window.clone(),
        document,
        observer,
        observer_callback,
        frame_callback,
        frame_id: None,
        rebuild_timeout: None,
        viewport_timeout: None,
        controller: None,
        listeners: Vec::new(),
    };
    runtime.attach_listeners();

    RUNTIME.with(|slot| {
        // Dropping the old runtime detaches its listeners and observer.
        let _old = slot.borrow_mut().take();
        *slot.borrow_mut() = Some(runtime);
    });

    tracing::info!(
        render_mode = ?config.render_mode,
        origins = config.allowed_origins.len(),
        "neo heatmap agent ready"
    );
}

impl Runtime {
    fn attach_listeners(&mut self) {
        let target: &EventTarget = self.window.as_ref();

        let on_message = Closure::<dyn FnMut(Event)>::new(|event: Event| {
            let Ok(event) = event.dyn_into::<MessageEvent>() else {
                return;
            };
            with_runtime(|rt| rt.on_message(&event));
        });
        let on_scroll = Closure::<dyn FnMut(Event)>::new(|_event: Event| {
            with_runtime(|rt| rt.on_viewport_event());
        });
        let on_resize = Closure::<dyn FnMut(Event)>::new(|_event: Event| {
            with_runtime(|rt| rt.on_viewport_event());
        });

        // Scroll does not bubble; capturing on the window also sees nested scrollers.
        let bindings = [
            Listener::attach(target, "message", false, false, on_message),
            Listener::attach(target, "scroll", true, true, on_scroll),
            Listener::attach(target, "resize", false, true, on_resize),
        ];
        for binding in bindings {
            match binding {
                Some(listener) => self.listeners.push(listener),
                None => tracing::warn!("failed to attach window listener"),
            }
        }
    }

    fn on_message(&mut self, event: &MessageEvent) {
        let Ok(data) = serde_wasm_bindgen::from_value::<Value>(event.data()) else {
            return;
        };
        let origin = event.origin();
        match self.gateway.admit(&origin, &data) {
            Admission::Rejected(reason) => {
                tracing::trace!(?reason, %origin, "message dropped");
            }
            Admission::Unrecognized(kind) => {
                tracing::debug!(%kind, "ignoring unrecognized command");
            }
            Admission::Accepted(request) => {
                let source = event
                    .source()
                    .and_then(|source| source.dyn_into::<Window>().ok());
                self.handle(request, source);
            }
        }
    }

    fn handle(&mut self, request: Request, source: Option<Window>) {
        let Request {
            origin,
            request_id,
            command,
        } = request;
        tracing::debug!(command = command.tag(), %origin, "command accepted");
        if let Some(window) = &source {
            self.controller = Some(Controller {
                window: window.clone(),
                origin: origin.clone(),
            });
        }

        match self.agent.dispatch(command) {
            Dispatch::Reply(response) => self.reply(source.as_ref(), &origin, request_id, &response),
            Dispatch::DeferredInit(ticket) => self.defer_init(ticket, source, origin, request_id),
            Dispatch::Ignore => {}
        }
        self.sync_observer();
    }

    fn reply(&self, source: Option<&Window>, origin: &str, request_id: Option<Value>, response: &Response) {
        let Some(source) = source else {
            tracing::debug!(kind = response.tag(), "no source window to reply to");
            return;
        };
        post(source, origin, &self.gateway.reply(request_id, response));
    }

    fn defer_init(
        &self,
        ticket: InitTicket,
        source: Option<Window>,
        origin: String,
        request_id: Option<Value>,
    ) {
        let on_loaded = Closure::once_into_js(move || {
            with_runtime(|rt| {
                let Some(response) = rt.agent.complete_init(ticket) else {
                    return;
                };
                rt.sync_observer();
                rt.reply(source.as_ref(), &origin, request_id, &response);
            });
        });
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        let attached = self
            .document
            .document()
            .add_event_listener_with_callback_and_add_event_listener_options(
                "DOMContentLoaded",
                on_loaded.unchecked_ref(),
                &options,
            );
        if let Err(e) = attached {
            tracing::warn!(error = ?e, "failed to wait for DOMContentLoaded");
        }
    }

    /// Keep the observer's lifetime in step with the scheduler's.
    fn sync_observer(&mut self) {
        if !self.agent.is_observing() {
            if let Some(observer) = self.observer.borrow_mut().take() {
                observer.disconnect();
            }
            self.rebuild_timeout = None;
            if let Some(id) = self.frame_id.take() {
                let _ = self.window.cancel_animation_frame(id);
            }
            return;
        }
        if self.observer.borrow().is_some() {
            return;
        }
        let Some(body) = self.document.document().body() else {
            tracing::debug!("no body to observe yet");
            return;
        };
        let observer = match MutationObserver::new(self.observer_callback.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(e) => {
                tracing::warn!(error = ?e, "failed to create mutation observer");
                return;
            }
        };
        if let Err(e) = observe_subtree(&observer, &body) {
            tracing::warn!(error = %e, "failed to observe host document");
            return;
        }
        *self.observer.borrow_mut() = Some(observer);
    }

    fn on_records(&mut self, records: &js_sys::Array) {
        let batch = summarize_records(records);
        if !self.agent.on_mutations(&batch) {
            return;
        }
        // Replacing the handle drops, and so cancels, the previous timeout.
        self.rebuild_timeout = Some(Timeout::new(MUTATION_DEBOUNCE_MS, || {
            with_runtime(|rt| {
                rt.rebuild_timeout = None;
                rt.agent.on_debounce_elapsed();
            });
        }));
    }

    fn on_viewport_event(&mut self) {
        if self.agent.on_viewport_event() {
            match self
                .window
                .request_animation_frame(self.frame_callback.as_ref().unchecked_ref())
            {
                Ok(id) => self.frame_id = Some(id),
                Err(e) => {
                    tracing::warn!(error = ?e, "failed to request animation frame");
                    self.agent.on_frame();
                }
            }
        }

        if self.agent.config().viewport_notifications && self.controller.is_some() {
            self.viewport_timeout = Some(Timeout::new(VIEWPORT_NOTIFY_DEBOUNCE_MS, || {
                with_runtime(|rt| {
                    rt.viewport_timeout = None;
                    rt.push_viewport();
                });
            }));
        }
    }

    fn push_viewport(&self) {
        let Some(controller) = &self.controller else {
            return;
        };
        let response = Response::ViewportChanged(self.agent.viewport());
        post(
            &controller.window,
            &controller.origin,
            &self.gateway.notification(&response),
        );
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
        if let Some(id) = self.frame_id.take() {
            let _ = self.window.cancel_animation_frame(id);
        }
        self.listeners.clear();
    }
}
