use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, MutationObserver, MutationObserverInit, MutationRecord, Node, NodeList};

use crate::config::{OBSERVED_ATTRIBUTES, OVERLAY_ATTR};
use crate::dom::{DomError, MutationSummary};

use super::document::js_error;

/// Shared between the runtime, which owns the observer, and the overlay
/// surface, which drains it at the end of each render pass.
pub type ObserverSlot = Rc<RefCell<Option<MutationObserver>>>;

pub fn observe_subtree(observer: &MutationObserver, root: &Node) -> Result<(), DomError> {
    let filter = js_sys::Array::new();
    for attribute in OBSERVED_ATTRIBUTES {
        filter.push(&JsValue::from_str(attribute));
    }
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);
    options.set_attributes(true);
    options.set_attribute_filter(&filter);
    observer.observe_with_options(root, &options).map_err(js_error)
}

pub fn summarize_records(records: &js_sys::Array) -> Vec<MutationSummary> {
    records
        .iter()
        .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
        .map(|record| summarize(&record))
        .collect()
}

pub fn take_pending(slot: &ObserverSlot) -> Vec<MutationSummary> {
    match slot.borrow().as_ref() {
        Some(observer) => summarize_records(&observer.take_records()),
        None => Vec::new(),
    }
}

fn summarize(record: &MutationRecord) -> MutationSummary {
    let child_list = record.type_() == "childList";
    let added = record.added_nodes();
    let removed = record.removed_nodes();
    let touched = added.length() + removed.length();
    MutationSummary {
        target_in_overlay: record.target().is_some_and(|node| inside_overlay(&node)),
        nodes_all_overlay: child_list && touched > 0 && all_tagged(&added) && all_tagged(&removed),
        child_list,
    }
}

fn inside_overlay(node: &Node) -> bool {
    let element = match node.dyn_ref::<Element>() {
        Some(element) => Some(element.clone()),
        None => node.parent_element(),
    };
    element
        .and_then(|element| element.closest(&format!("[{OVERLAY_ATTR}]")).ok().flatten())
        .is_some()
}

fn all_tagged(nodes: &NodeList) -> bool {
    (0..nodes.length()).all(|i| {
        nodes
            .item(i)
            .and_then(|node| node.dyn_into::<Element>().ok())
            .is_some_and(|element| element.has_attribute(OVERLAY_ATTR))
    })
}
