//! In-memory page used by the native tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use neo_heatmap_shared::{ElementRect, HeatStyle, ViewportMetrics};

use crate::dom::{DomError, HostDocument, MutationSummary, OverlaySurface, StyleSnapshot};

pub type FakeElement = usize;
pub type FakeMarker = usize;

const HTML: FakeElement = 0;
const BODY: FakeElement = 1;

#[derive(Debug, Clone)]
struct FakeNode {
    id: String,
    parent: Option<FakeElement>,
    style: StyleSnapshot,
    rect: ElementRect,
    style_fails: bool,
    activations: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerState {
    pub x: f64,
    pub y: f64,
    pub opacity: f64,
    pub size: f64,
    pub alive: bool,
}

#[derive(Debug, Default)]
struct OverlayState {
    layer: bool,
    layer_creations: usize,
    markers: Vec<MarkerState>,
    writes: usize,
    fail_markers: bool,
}

#[derive(Debug)]
struct PageState {
    nodes: Vec<FakeNode>,
    routes: HashMap<String, FakeElement>,
    failing_paths: HashSet<String>,
    loading: bool,
    has_root: bool,
    activation_blocked: bool,
    viewport: ViewportMetrics,
    overlay: OverlayState,
    pending: Vec<MutationSummary>,
}

fn node(id: &str, parent: Option<FakeElement>, rect: ElementRect) -> FakeNode {
    FakeNode {
        id: id.to_owned(),
        parent,
        style: StyleSnapshot {
            display: "block".into(),
            visibility: "visible".into(),
            opacity: "1".into(),
        },
        rect,
        style_fails: false,
        activations: 0,
    }
}

/// Shared handle to a fake document; clones observe the same page.
#[derive(Debug, Clone)]
pub struct FakePage {
    state: Rc<RefCell<PageState>>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        let viewport_rect = ElementRect::new(0.0, 0.0, 1024.0, 768.0);
        Self {
            state: Rc::new(RefCell::new(PageState {
                nodes: vec![
                    node("", None, viewport_rect),
                    node("", Some(HTML), viewport_rect),
                ],
                routes: HashMap::new(),
                failing_paths: HashSet::new(),
                loading: false,
                has_root: true,
                activation_blocked: false,
                viewport: ViewportMetrics {
                    width: 1024.0,
                    height: 768.0,
                    scroll_x: 0.0,
                    scroll_y: 0.0,
                    device_pixel_ratio: 1.0,
                },
                overlay: OverlayState::default(),
                pending: Vec::new(),
            })),
        }
    }

    pub fn body(&self) -> FakeElement {
        BODY
    }

    pub fn overlay(&self) -> FakeOverlay {
        FakeOverlay {
            state: Rc::clone(&self.state),
        }
    }

    pub fn add_element(
        &self,
        id: &str,
        parent: FakeElement,
        (left, top, width, height): (f64, f64, f64, f64),
    ) -> FakeElement {
        let mut state = self.state.borrow_mut();
        state
            .nodes
            .push(node(id, Some(parent), ElementRect::new(left, top, width, height)));
        state.nodes.len() - 1
    }

    /// Make `path` evaluate to `element`.
    pub fn route(&self, path: &str, element: FakeElement) {
        self.state.borrow_mut().routes.insert(path.to_owned(), element);
    }

    pub fn unroute(&self, path: &str) {
        self.state.borrow_mut().routes.remove(path);
    }

    pub fn fail_path(&self, path: &str) {
        self.state.borrow_mut().failing_paths.insert(path.to_owned());
    }

    pub fn set_style(&self, element: FakeElement, property: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        let style = &mut state.nodes[element].style;
        match property {
            "display" => style.display = value.to_owned(),
            "visibility" => style.visibility = value.to_owned(),
            "opacity" => style.opacity = value.to_owned(),
            other => panic!("fake page does not model {other}"),
        }
    }

    pub fn fail_style(&self, element: FakeElement) {
        self.state.borrow_mut().nodes[element].style_fails = true;
    }

    pub fn set_rect(&self, element: FakeElement, (left, top, width, height): (f64, f64, f64, f64)) {
        self.state.borrow_mut().nodes[element].rect = ElementRect::new(left, top, width, height);
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.borrow_mut().loading = loading;
    }

    pub fn remove_root(&self) {
        self.state.borrow_mut().has_root = false;
    }

    pub fn scroll_to(&self, x: f64, y: f64) {
        let mut state = self.state.borrow_mut();
        state.viewport.scroll_x = x;
        state.viewport.scroll_y = y;
    }

    pub fn block_activation(&self) {
        self.state.borrow_mut().activation_blocked = true;
    }

    pub fn fail_marker_creation(&self) {
        self.state.borrow_mut().overlay.fail_markers = true;
    }

    pub fn activations(&self, element: FakeElement) -> u32 {
        self.state.borrow().nodes[element].activations
    }

    /// Number of writes the overlay has made to the page.
    pub fn mutation_count(&self) -> usize {
        self.state.borrow().overlay.writes
    }

    pub fn layer_present(&self) -> bool {
        self.state.borrow().overlay.layer
    }

    pub fn layer_creations(&self) -> usize {
        self.state.borrow().overlay.layer_creations
    }

    pub fn marker(&self, marker: FakeMarker) -> MarkerState {
        self.state.borrow().overlay.markers[marker].clone()
    }

    pub fn live_marker_count(&self) -> usize {
        self.state
            .borrow()
            .overlay
            .markers
            .iter()
            .filter(|m| m.alive)
            .count()
    }

    pub fn pending_mutations(&self) -> usize {
        self.state.borrow().pending.len()
    }
}

impl HostDocument for FakePage {
    type Element = FakeElement;

    fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    fn has_root(&self) -> bool {
        self.state.borrow().has_root
    }

    fn element_by_id(&self, id: &str) -> Option<FakeElement> {
        self.state.borrow().nodes.iter().position(|n| n.id == id)
    }

    fn evaluate_path(&self, path: &str) -> Result<Option<FakeElement>, DomError> {
        let state = self.state.borrow();
        if state.failing_paths.contains(path) {
            return Err(DomError::Js(format!("SyntaxError: bad path {path}")));
        }
        Ok(state.routes.get(path).copied())
    }

    fn parent_element(&self, element: &FakeElement) -> Option<FakeElement> {
        self.state.borrow().nodes.get(*element)?.parent
    }

    fn is_top_container(&self, element: &FakeElement) -> bool {
        *element == HTML || *element == BODY
    }

    fn computed_style(&self, element: &FakeElement) -> Result<StyleSnapshot, DomError> {
        let state = self.state.borrow();
        let node = state.nodes.get(*element).ok_or(DomError::MissingDocument)?;
        if node.style_fails {
            return Err(DomError::Js("getComputedStyle threw".into()));
        }
        Ok(node.style.clone())
    }

    fn bounding_rect(&self, element: &FakeElement) -> Result<ElementRect, DomError> {
        let state = self.state.borrow();
        state
            .nodes
            .get(*element)
            .map(|n| n.rect)
            .ok_or(DomError::MissingDocument)
    }

    fn viewport(&self) -> ViewportMetrics {
        self.state.borrow().viewport
    }

    fn activate(&self, element: &FakeElement) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        if state.activation_blocked {
            return Err(DomError::Unsupported("synthetic click"));
        }
        let node = state.nodes.get_mut(*element).ok_or(DomError::MissingDocument)?;
        node.activations += 1;
        Ok(())
    }
}

/// Overlay half of the fake page. Every write queues an overlay-owned
/// mutation notification, the way a real observer would see it.
#[derive(Debug, Clone)]
pub struct FakeOverlay {
    state: Rc<RefCell<PageState>>,
}

impl FakeOverlay {
    fn record_write(state: &mut PageState, summary: MutationSummary) {
        state.overlay.writes += 1;
        state.pending.push(summary);
    }
}

impl OverlaySurface for FakeOverlay {
    type Marker = FakeMarker;

    fn ensure_layer(&mut self) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        if !state.has_root {
            return Err(DomError::MissingDocument);
        }
        if !state.overlay.layer {
            state.overlay.layer = true;
            state.overlay.layer_creations += 1;
            Self::record_write(
                &mut state,
                MutationSummary {
                    target_in_overlay: false,
                    nodes_all_overlay: true,
                    child_list: true,
                },
            );
        }
        Ok(())
    }

    fn clear_markers(&mut self) {
        let mut state = self.state.borrow_mut();
        for marker in &mut state.overlay.markers {
            marker.alive = false;
        }
        Self::record_write(&mut state, MutationSummary::overlay());
    }

    fn create_marker(&mut self, style: &HeatStyle) -> Result<FakeMarker, DomError> {
        let mut state = self.state.borrow_mut();
        if state.overlay.fail_markers {
            return Err(DomError::Js("createElement threw".into()));
        }
        state.overlay.markers.push(MarkerState {
            x: 0.0,
            y: 0.0,
            opacity: 1.0,
            size: style.size,
            alive: true,
        });
        Self::record_write(&mut state, MutationSummary::overlay());
        Ok(state.overlay.markers.len() - 1)
    }

    fn place_marker(&mut self, marker: &FakeMarker, x: f64, y: f64) {
        let mut state = self.state.borrow_mut();
        if let Some(m) = state.overlay.markers.get_mut(*marker) {
            m.x = x;
            m.y = y;
        }
        Self::record_write(&mut state, MutationSummary::overlay());
    }

    fn set_marker_opacity(&mut self, marker: &FakeMarker, opacity: f64) {
        let mut state = self.state.borrow_mut();
        if let Some(m) = state.overlay.markers.get_mut(*marker) {
            m.opacity = opacity;
        }
        Self::record_write(&mut state, MutationSummary::overlay());
    }

    fn remove_layer(&mut self) {
        let mut state = self.state.borrow_mut();
        if !state.overlay.layer {
            return;
        }
        state.overlay.layer = false;
        for marker in &mut state.overlay.markers {
            marker.alive = false;
        }
        Self::record_write(
            &mut state,
            MutationSummary {
                target_in_overlay: false,
                nodes_all_overlay: true,
                child_list: true,
            },
        );
    }

    fn take_pending_mutations(&mut self) -> Vec<MutationSummary> {
        std::mem::take(&mut self.state.borrow_mut().pending)
    }
}
