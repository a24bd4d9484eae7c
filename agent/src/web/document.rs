use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement, MouseEvent, MouseEventInit, Window};

use neo_heatmap_shared::{ElementRect, ViewportMetrics};

use crate::dom::{DomError, HostDocument, StyleSnapshot};

// XPathResult.FIRST_ORDERED_NODE_TYPE
const FIRST_ORDERED_NODE_TYPE: u16 = 9;

pub(crate) fn js_error(value: JsValue) -> DomError {
    let message = value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    DomError::Js(message)
}

/// The live page the agent is embedded in.
#[derive(Clone)]
pub struct WebDocument {
    window: Window,
    document: Document,
}

impl WebDocument {
    pub fn new(window: Window) -> Result<Self, DomError> {
        let document = window.document().ok_or(DomError::MissingDocument)?;
        Ok(Self { window, document })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    // `evaluate` is looked up at runtime so documents without XPath support
    // report `Unsupported` and fall back to the id lookup.
    fn evaluate_first(&self, path: &str) -> Result<Option<Element>, DomError> {
        let evaluate = js_sys::Reflect::get(&self.document, &JsValue::from_str("evaluate"))
            .map_err(js_error)?
            .dyn_into::<js_sys::Function>()
            .map_err(|_| DomError::Unsupported("document.evaluate"))?;
        let args = js_sys::Array::of5(
            &JsValue::from_str(path),
            &self.document,
            &JsValue::NULL,
            &JsValue::from(FIRST_ORDERED_NODE_TYPE),
            &JsValue::NULL,
        );
        let result = evaluate
            .apply(&self.document, &args)
            .map_err(js_error)?
            .dyn_into::<web_sys::XPathResult>()
            .map_err(|_| DomError::Unsupported("XPathResult"))?;
        let node = result.single_node_value().map_err(js_error)?;
        Ok(node.and_then(|node| node.dyn_into::<Element>().ok()))
    }
}

impl HostDocument for WebDocument {
    type Element = Element;

    fn is_loading(&self) -> bool {
        self.document.ready_state() == "loading"
    }

    fn has_root(&self) -> bool {
        self.document.body().is_some() || self.document.document_element().is_some()
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn evaluate_path(&self, path: &str) -> Result<Option<Element>, DomError> {
        self.evaluate_first(path)
    }

    fn parent_element(&self, element: &Element) -> Option<Element> {
        element.parent_element()
    }

    fn is_top_container(&self, element: &Element) -> bool {
        let is_body = self
            .document
            .body()
            .is_some_and(|body| AsRef::<Element>::as_ref(&body) == element);
        is_body
            || self
                .document
                .document_element()
                .is_some_and(|root| &root == element)
    }

    fn computed_style(&self, element: &Element) -> Result<StyleSnapshot, DomError> {
        let style = self
            .window
            .get_computed_style(element)
            .map_err(js_error)?
            .ok_or(DomError::Unsupported("getComputedStyle"))?;
        let read = |property: &str| style.get_property_value(property).map_err(js_error);
        Ok(StyleSnapshot {
            display: read("display")?,
            visibility: read("visibility")?,
            opacity: read("opacity")?,
        })
    }

    fn bounding_rect(&self, element: &Element) -> Result<ElementRect, DomError> {
        let rect = element.get_bounding_client_rect();
        Ok(ElementRect::new(rect.left(), rect.top(), rect.width(), rect.height()))
    }

    fn viewport(&self) -> ViewportMetrics {
        let number = |value: Result<JsValue, JsValue>| value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        ViewportMetrics {
            width: number(self.window.inner_width()),
            height: number(self.window.inner_height()),
            scroll_x: self.window.scroll_x().unwrap_or(0.0),
            scroll_y: self.window.scroll_y().unwrap_or(0.0),
            device_pixel_ratio: self.window.device_pixel_ratio(),
        }
    }

    fn activate(&self, element: &Element) -> Result<(), DomError> {
        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            html.click();
            return Ok(());
        }
        let init = MouseEventInit::new();
        init.set_bubbles(true);
        init.set_cancelable(true);
        init.set_view(Some(&self.window));
        let event = MouseEvent::new_with_mouse_event_init_dict("click", &init).map_err(js_error)?;
        element.dispatch_event(&event).map_err(js_error)?;
        Ok(())
    }
}
