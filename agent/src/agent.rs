use neo_heatmap_shared::protocol::{PointPosition, PositionsReport};
use neo_heatmap_shared::{Command, PointDescriptor, Response, ViewportMetrics};

use crate::config::AgentConfig;
use crate::dom::{HostDocument, MutationSummary, OverlaySurface};
use crate::renderer::{MarkerSlot, OverlayRenderer};
use crate::resolver::{Located, locate, resolve_element};
use crate::scheduler::{MutationVerdict, ReactiveScheduler, SchedulerStats};
use crate::session::SessionState;

/// What the caller must do after dispatching a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Reply(Response),
    /// The document is still loading. Call [`Agent::complete_init`] with
    /// this ticket once it has loaded and send its response, if any.
    DeferredInit(InitTicket),
    Ignore,
}

/// Identifies one deferred INIT. A later INIT or CLEAR makes it stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitTicket(u64);

/// One overlay instance: session data, renderer and scheduler over a page.
pub struct Agent<D: HostDocument, S: OverlaySurface> {
    config: AgentConfig,
    document: D,
    renderer: OverlayRenderer<S>,
    session: SessionState,
    scheduler: ReactiveScheduler,
    init_generation: u64,
    pending_init: Option<InitTicket>,
}

impl<D: HostDocument, S: OverlaySurface> Agent<D, S> {
    pub fn new(config: AgentConfig, document: D, surface: S) -> Self {
        Self {
            config,
            document,
            renderer: OverlayRenderer::new(surface),
            session: SessionState::default(),
            scheduler: ReactiveScheduler::new(),
            init_generation: 0,
            pending_init: None,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn markers(&self) -> &[Option<MarkerSlot<S::Marker>>] {
        self.renderer.markers()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Whether host mutations and viewport events are currently tracked.
    pub fn is_observing(&self) -> bool {
        self.scheduler.is_installed()
    }

    pub fn dispatch(&mut self, command: Command) -> Dispatch {
        match command {
            Command::Ping => Dispatch::Reply(Response::Pong),
            Command::GetPositions { points, .. } => {
                Dispatch::Reply(Response::Positions(self.positions(&points)))
            }
            Command::ReplayStep { xpath } => Dispatch::Reply(Response::ReplayResult {
                ok: self.replay(&xpath),
            }),
            _ if !self.config.renders_locally() => Dispatch::Ignore,
            Command::Init(init) => {
                self.supersede_pending_init();
                self.session = SessionState::from(init);
                tracing::info!(
                    points = self.session.points.len(),
                    session_max = self.session.session_max,
                    cursor = self.session.cursor.to_wire(),
                    "session initialized"
                );
                if self.document.is_loading() {
                    tracing::debug!("document still loading, deferring first render");
                    self.scheduler.uninstall();
                    let ticket = InitTicket(self.init_generation);
                    self.pending_init = Some(ticket);
                    return Dispatch::DeferredInit(ticket);
                }
                Dispatch::Reply(self.start_session())
            }
            Command::SetStep(cursor) => {
                self.session.cursor = cursor;
                self.renderer
                    .apply_step_visibility(&self.session, self.config.step_gating);
                Dispatch::Reply(Response::SetStepOk)
            }
            Command::Clear => {
                self.clear();
                Dispatch::Reply(Response::ClearOk)
            }
        }
    }

    /// Finish a deferred INIT after the document loaded. Returns `None` when
    /// a later INIT or CLEAR superseded it; nothing is rendered then.
    pub fn complete_init(&mut self, ticket: InitTicket) -> Option<Response> {
        if self.pending_init != Some(ticket) {
            tracing::debug!("deferred INIT was superseded, skipping render");
            return None;
        }
        self.pending_init = None;
        Some(self.start_session())
    }

    /// Whether an INIT is waiting for the document to load.
    pub fn has_pending_init(&self) -> bool {
        self.pending_init.is_some()
    }

    /// Install the scheduler and render the current session.
    fn start_session(&mut self) -> Response {
        self.scheduler.uninstall();
        self.scheduler.install();
        self.rebuild();
        Response::InitOk
    }

    fn supersede_pending_init(&mut self) {
        self.init_generation += 1;
        self.pending_init = None;
    }

    pub fn clear(&mut self) {
        self.supersede_pending_init();
        self.scheduler.uninstall();
        self.renderer.clear();
        self.session = SessionState::default();
        tracing::info!("session cleared");
    }

    /// Full render pass under the render guard.
    pub fn rebuild(&mut self) {
        if !self.scheduler.begin_render() {
            return;
        }
        self.renderer
            .render_all(&self.document, &self.session, self.config.step_gating);
        let echoes = self.renderer.surface_mut().take_pending_mutations();
        if !echoes.is_empty() {
            self.scheduler.on_mutations(&echoes);
        }
        self.scheduler.end_render();
    }

    /// Returns `true` when the caller must request an animation frame.
    pub fn on_viewport_event(&mut self) -> bool {
        self.scheduler.on_viewport_event()
    }

    pub fn on_frame(&mut self) {
        if self.scheduler.on_frame() {
            self.renderer
                .reposition_all(&self.document, &self.session, self.config.step_gating);
        }
    }

    /// Returns `true` when the caller must (re)start the rebuild debounce.
    pub fn on_mutations(&mut self, batch: &[MutationSummary]) -> bool {
        let verdict = self.scheduler.on_mutations(batch);
        if verdict == MutationVerdict::ScheduleRebuild {
            tracing::debug!(records = batch.len(), "host mutated, rebuild scheduled");
        }
        verdict == MutationVerdict::ScheduleRebuild
    }

    pub fn on_debounce_elapsed(&mut self) {
        if self.scheduler.take_rebuild() {
            self.rebuild();
        }
    }

    pub fn viewport(&self) -> ViewportMetrics {
        self.document.viewport()
    }

    /// Stateless position query; independent of session and overlay.
    pub fn positions(&self, points: &[PointDescriptor]) -> PositionsReport {
        let viewport = self.document.viewport();
        let positions = points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let located = locate(&self.document, &point.xpath);
                let mut position = PointPosition {
                    index,
                    xpath: point.xpath.clone(),
                    found: located.element().is_some(),
                    visible: false,
                    rect: None,
                    x: None,
                    y: None,
                    page_x: None,
                    page_y: None,
                };
                match located {
                    Located::Missing => {}
                    Located::Hidden { rect, .. } => position.rect = rect,
                    Located::Visible { rect, .. } => {
                        let (x, y) = rect.anchor(point.x_ratio, point.y_ratio);
                        let (page_x, page_y) = viewport.to_page(x, y);
                        position.visible = true;
                        position.rect = Some(rect);
                        position.x = Some(x);
                        position.y = Some(y);
                        position.page_x = Some(page_x);
                        position.page_y = Some(page_y);
                    }
                }
                position
            })
            .collect();
        PositionsReport {
            positions,
            viewport,
        }
    }

    /// Fire a synthetic click at the element behind `xpath`. Best effort.
    pub fn replay(&self, xpath: &str) -> bool {
        let Some(element) = resolve_element(&self.document, xpath) else {
            tracing::debug!(%xpath, "replay target not found");
            return false;
        };
        match self.document.activate(&element) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%xpath, error = %e, "replay activation failed");
                false
            }
        }
    }
}
