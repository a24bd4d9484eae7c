//! Heatmap overlay agent. Runs inside a host page, takes commands from an
//! embedding controller window over `postMessage` and paints heat spots
//! anchored to page elements.
//!
//! The core ([`Agent`]) is written against the [`dom::HostDocument`] and
//! [`dom::OverlaySurface`] traits so it can be driven without a browser;
//! [`web`] binds it to the real DOM.

pub mod agent;
pub mod config;
pub mod dom;
pub mod gateway;
pub mod logging;
pub mod renderer;
pub mod resolver;
pub mod scheduler;
pub mod session;
#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Agent, Dispatch, InitTicket};
pub use config::{AgentConfig, RenderMode};

/// Install the agent in the current browser window.
#[cfg(target_arch = "wasm32")]
pub fn boot() {
    web::boot();
}

#[cfg(not(target_arch = "wasm32"))]
pub fn boot() {
    logging::init(config::DEFAULT_LOG_LEVEL);
    tracing::warn!("the heatmap agent only runs inside a browser window");
}
