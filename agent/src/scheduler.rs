use crate::dom::MutationSummary;

/// What the scheduler decided about a batch of mutation notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationVerdict {
    /// Nothing is being tracked.
    Inactive,
    /// A render pass is in flight; the batch is its own echo.
    DuringRender,
    /// Every record in the batch came from the overlay layer.
    OverlayOnly,
    /// Host content changed: (re)arm the trailing debounce.
    ScheduleRebuild,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_requested: u64,
    pub viewport_events_coalesced: u64,
    pub batches_during_render: u64,
    pub batches_overlay_only: u64,
    pub rebuilds_scheduled: u64,
    pub rebuilds_run: u64,
}

/// Decides when markers are repositioned or rebuilt.
///
/// The scheduler holds no timers itself. Callers translate its answers into
/// animation frames and debounce timeouts, and report back when those fire.
/// Scroll and resize coalesce into at most one pending frame; host mutations
/// re-arm a trailing debounce; notifications raised while a render pass is in
/// flight or raised purely by the overlay are dropped.
#[derive(Debug, Default)]
pub struct ReactiveScheduler {
    installed: bool,
    rendering: bool,
    frame_pending: bool,
    rebuild_pending: bool,
    stats: SchedulerStats,
}

impl ReactiveScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self) {
        self.installed = true;
    }

    pub fn uninstall(&mut self) {
        self.installed = false;
        self.frame_pending = false;
        self.rebuild_pending = false;
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Enter a render pass. Returns `false` if one is already running.
    pub fn begin_render(&mut self) -> bool {
        if self.rendering {
            return false;
        }
        self.rendering = true;
        true
    }

    pub fn end_render(&mut self) {
        self.rendering = false;
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// A scroll or resize happened. Returns `true` when the caller must
    /// request an animation frame; extra events before it fires are dropped.
    pub fn on_viewport_event(&mut self) -> bool {
        if !self.installed {
            return false;
        }
        if self.frame_pending {
            self.stats.viewport_events_coalesced += 1;
            return false;
        }
        self.frame_pending = true;
        self.stats.frames_requested += 1;
        true
    }

    /// The requested frame fired. Returns `true` when a reposition should run.
    pub fn on_frame(&mut self) -> bool {
        let was_pending = std::mem::replace(&mut self.frame_pending, false);
        was_pending && self.installed
    }

    pub fn on_mutations(&mut self, batch: &[MutationSummary]) -> MutationVerdict {
        if self.rendering {
            self.stats.batches_during_render += 1;
            return MutationVerdict::DuringRender;
        }
        if !self.installed {
            return MutationVerdict::Inactive;
        }
        if batch.iter().all(MutationSummary::is_overlay_owned) {
            self.stats.batches_overlay_only += 1;
            return MutationVerdict::OverlayOnly;
        }
        self.rebuild_pending = true;
        self.stats.rebuilds_scheduled += 1;
        MutationVerdict::ScheduleRebuild
    }

    /// The debounce window closed. Returns `true` when a rebuild should run.
    pub fn take_rebuild(&mut self) -> bool {
        if !std::mem::replace(&mut self.rebuild_pending, false) || !self.installed {
            return false;
        }
        self.stats.rebuilds_run += 1;
        true
    }
}
