use neo_heatmap_shared::ElementRect;

use crate::dom::HostDocument;

const ID_HINT_OPEN: &str = "@id=\"";
const ROOT_PREFIX: &str = "/html/body";

/// Outcome of resolving a path and testing its visibility.
#[derive(Debug, Clone, PartialEq)]
pub enum Located<E> {
    Missing,
    Hidden { element: E, rect: Option<ElementRect> },
    Visible { element: E, rect: ElementRect },
}

impl<E> Located<E> {
    pub fn element(&self) -> Option<&E> {
        match self {
            Self::Missing => None,
            Self::Hidden { element, .. } | Self::Visible { element, .. } => Some(element),
        }
    }

    pub fn visible_rect(&self) -> Option<ElementRect> {
        match self {
            Self::Visible { rect, .. } => Some(*rect),
            _ => None,
        }
    }
}

/// Identifier embedded in a path as `@id="..."`, if any.
pub fn id_hint(path: &str) -> Option<&str> {
    let start = path.find(ID_HINT_OPEN)? + ID_HINT_OPEN.len();
    let rest = &path[start..];
    let end = rest.find('"')?;
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}

/// `/body/...` or `//body/...` rewritten to start at the document root.
pub fn rooted_path(path: &str) -> Option<String> {
    if !path.starts_with("/body") && !path.starts_with("//body") {
        return None;
    }
    let tail = path.trim_start_matches('/').strip_prefix("body")?;
    Some(format!("{ROOT_PREFIX}{tail}"))
}

/// Map a structural path to a live element. Never fails: evaluation errors
/// are treated as "not found".
pub fn resolve_element<D: HostDocument>(document: &D, path: &str) -> Option<D::Element> {
    if path.is_empty() {
        return None;
    }

    if let Some(id) = id_hint(path)
        && let Some(element) = document.element_by_id(id)
    {
        return Some(element);
    }

    match document.evaluate_path(path) {
        Ok(Some(element)) => return Some(element),
        Ok(None) => {}
        Err(e) => {
            tracing::debug!(%path, error = %e, "path evaluation failed");
        }
    }

    let rooted = rooted_path(path)?;
    match document.evaluate_path(&rooted) {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(path = %rooted, error = %e, "rooted path evaluation failed");
            None
        }
    }
}

/// An element is visible when no ancestor below the top containers hides it
/// and its own box has area. Any DOM failure reads as hidden.
pub fn is_element_visible<D: HostDocument>(document: &D, element: &D::Element) -> bool {
    visible_rect(document, element).is_some()
}

fn visible_rect<D: HostDocument>(document: &D, element: &D::Element) -> Option<ElementRect> {
    let mut current = Some(element.clone());
    while let Some(node) = current {
        if document.is_top_container(&node) {
            break;
        }
        match document.computed_style(&node) {
            Ok(style) if !style.hides_element() => {}
            _ => return None,
        }
        current = document.parent_element(&node);
    }

    document
        .bounding_rect(element)
        .ok()
        .filter(ElementRect::has_area)
}

/// Resolve `path` and classify the result in one pass.
pub fn locate<D: HostDocument>(document: &D, path: &str) -> Located<D::Element> {
    let Some(element) = resolve_element(document, path) else {
        return Located::Missing;
    };
    match visible_rect(document, &element) {
        Some(rect) => Located::Visible { element, rect },
        None => {
            let rect = document.bounding_rect(&element).ok();
            Located::Hidden { element, rect }
        }
    }
}
