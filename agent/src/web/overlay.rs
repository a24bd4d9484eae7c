use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, Node};

use neo_heatmap_shared::HeatStyle;

use crate::config::{OVERLAY_ATTR, OVERLAY_ROOT_ID, SPOT_CLASS};
use crate::dom::{DomError, MutationSummary, OverlaySurface};

use super::document::js_error;
use super::observer::{ObserverSlot, take_pending};

const LAYER_CSS: &[&str] = &[
    "position: fixed",
    "left: 0",
    "top: 0",
    "width: 100vw",
    "height: 100vh",
    "pointer-events: none",
    "z-index: 2147483647",
    "mix-blend-mode: multiply",
    "overflow: visible",
];

fn spot_css(style: &HeatStyle) -> String {
    let size = style.size_css();
    [
        "position: fixed".to_owned(),
        "pointer-events: none".to_owned(),
        "left: 0px".to_owned(),
        "top: 0px".to_owned(),
        "transform: translate(-50%, -50%)".to_owned(),
        format!("width: {size}"),
        format!("height: {size}"),
        format!("background: {}", style.background_css()),
        "opacity: 1".to_owned(),
        "border-radius: 50%".to_owned(),
        "filter: blur(10px)".to_owned(),
        "transition: opacity 0.3s ease".to_owned(),
    ]
    .join(";")
}

/// The overlay layer in the live page.
pub struct WebOverlay {
    document: Document,
    layer: Option<HtmlElement>,
    observer: ObserverSlot,
}

impl WebOverlay {
    pub fn new(document: Document, observer: ObserverSlot) -> Self {
        Self {
            document,
            layer: None,
            observer,
        }
    }

    fn create_div(&self) -> Result<HtmlElement, DomError> {
        self.document
            .create_element("div")
            .map_err(js_error)?
            .dyn_into::<HtmlElement>()
            .map_err(|_| DomError::Unsupported("HTMLDivElement"))
    }

    fn layer(&self) -> Result<&HtmlElement, DomError> {
        self.layer.as_ref().ok_or(DomError::MissingDocument)
    }
}

impl OverlaySurface for WebOverlay {
    type Marker = HtmlElement;

    fn ensure_layer(&mut self) -> Result<(), DomError> {
        if self.layer.as_ref().is_some_and(|layer| layer.is_connected()) {
            return Ok(());
        }
        if let Some(existing) = self
            .document
            .get_element_by_id(OVERLAY_ROOT_ID)
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        {
            self.layer = Some(existing);
            return Ok(());
        }

        let parent: Node = match (self.document.body(), self.document.document_element()) {
            (Some(body), _) => body.into(),
            (None, Some(root)) => root.into(),
            (None, None) => return Err(DomError::MissingDocument),
        };
        let layer = self.create_div()?;
        layer.set_id(OVERLAY_ROOT_ID);
        layer.set_attribute(OVERLAY_ATTR, "1").map_err(js_error)?;
        layer.style().set_css_text(&LAYER_CSS.join(";"));
        parent.append_child(&layer).map_err(js_error)?;
        self.layer = Some(layer);
        Ok(())
    }

    fn clear_markers(&mut self) {
        if let Some(layer) = &self.layer {
            layer.set_inner_html("");
        }
    }

    fn create_marker(&mut self, style: &HeatStyle) -> Result<HtmlElement, DomError> {
        let spot = self.create_div()?;
        spot.set_class_name(SPOT_CLASS);
        spot.set_attribute(OVERLAY_ATTR, "1").map_err(js_error)?;
        spot.style().set_css_text(&spot_css(style));
        self.layer()?.append_child(&spot).map_err(js_error)?;
        Ok(spot)
    }

    fn place_marker(&mut self, marker: &HtmlElement, x: f64, y: f64) {
        let style = marker.style();
        let _ = style.set_property("left", &format!("{x}px"));
        let _ = style.set_property("top", &format!("{y}px"));
    }

    fn set_marker_opacity(&mut self, marker: &HtmlElement, opacity: f64) {
        let _ = marker.style().set_property("opacity", &opacity.to_string());
    }

    fn remove_layer(&mut self) {
        if let Some(layer) = self.document.get_element_by_id(OVERLAY_ROOT_ID) {
            layer.remove();
        }
        if let Some(layer) = self.layer.take() {
            layer.remove();
        }
    }

    fn take_pending_mutations(&mut self) -> Vec<MutationSummary> {
        take_pending(&self.observer)
    }
}
