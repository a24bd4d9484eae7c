//! Seams between the agent core and the page it lives in.
//!
//! The core never touches `web_sys` directly. `HostDocument` is the read side
//! (resolution, geometry, computed style), `OverlaySurface` the write side
//! (the overlay layer and its markers). The browser implementations live in
//! `crate::web`; tests drive the core with `crate::testing::FakePage`.

use neo_heatmap_shared::{ElementRect, HeatStyle, ViewportMetrics};

/// Failure of a single DOM operation. Never surfaced to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// A call into the page threw.
    Js(String),
    /// The window has no document, or the document has no root element.
    MissingDocument,
    /// The embedding context does not support the operation.
    Unsupported(&'static str),
}

impl core::fmt::Display for DomError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Js(msg) => write!(f, "page threw: {msg}"),
            Self::MissingDocument => write!(f, "document is not available"),
            Self::Unsupported(what) => write!(f, "unsupported: {what}"),
        }
    }
}

impl std::error::Error for DomError {}

/// The three computed-style properties the visibility predicate reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSnapshot {
    pub display: String,
    pub visibility: String,
    pub opacity: String,
}

impl StyleSnapshot {
    pub fn hides_element(&self) -> bool {
        self.display == "none" || self.visibility == "hidden" || self.opacity.trim() == "0"
    }
}

/// Read-only view of the host document.
pub trait HostDocument {
    type Element: Clone + PartialEq;

    /// `true` while the document is still parsing.
    fn is_loading(&self) -> bool;

    /// `true` once there is a body or root element to hang the overlay on.
    fn has_root(&self) -> bool;

    fn element_by_id(&self, id: &str) -> Option<Self::Element>;

    /// First element in document order matching a location path.
    fn evaluate_path(&self, path: &str) -> Result<Option<Self::Element>, DomError>;

    fn parent_element(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Whether `element` is the body or the root element. Ancestor walks stop there.
    fn is_top_container(&self, element: &Self::Element) -> bool;

    fn computed_style(&self, element: &Self::Element) -> Result<StyleSnapshot, DomError>;

    fn bounding_rect(&self, element: &Self::Element) -> Result<ElementRect, DomError>;

    fn viewport(&self) -> ViewportMetrics;

    /// Fire a synthetic activation at `element`. Best effort: embedding
    /// contexts may refuse, in which case an error comes back.
    fn activate(&self, element: &Self::Element) -> Result<(), DomError>;
}

/// Write side: the overlay layer and the markers it owns.
pub trait OverlaySurface {
    type Marker;

    /// Create the layer if it does not exist yet.
    fn ensure_layer(&mut self) -> Result<(), DomError>;

    /// Remove every marker from the layer, keeping the layer itself.
    fn clear_markers(&mut self);

    fn create_marker(&mut self, style: &HeatStyle) -> Result<Self::Marker, DomError>;

    /// Center `marker` on the viewport point `(x, y)`.
    fn place_marker(&mut self, marker: &Self::Marker, x: f64, y: f64);

    fn set_marker_opacity(&mut self, marker: &Self::Marker, opacity: f64);

    fn remove_layer(&mut self);

    /// Host-mutation notifications queued but not yet delivered. Called at the
    /// end of a render pass so the render's own notifications can be dropped
    /// while the render guard is still up.
    fn take_pending_mutations(&mut self) -> Vec<MutationSummary> {
        Vec::new()
    }
}

/// What the scheduler needs to know about one mutation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationSummary {
    /// The record's target sits inside the overlay layer.
    pub target_in_overlay: bool,
    /// Child-list record whose added and removed nodes all carry the overlay attribute.
    pub nodes_all_overlay: bool,
    pub child_list: bool,
}

impl MutationSummary {
    pub const fn host() -> Self {
        Self {
            target_in_overlay: false,
            nodes_all_overlay: false,
            child_list: false,
        }
    }

    pub const fn overlay() -> Self {
        Self {
            target_in_overlay: true,
            nodes_all_overlay: false,
            child_list: false,
        }
    }

    pub fn is_overlay_owned(&self) -> bool {
        self.target_in_overlay || (self.child_list && self.nodes_all_overlay)
    }
}
