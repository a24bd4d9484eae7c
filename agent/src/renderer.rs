use neo_heatmap_shared::{HeatStyle, StepGating};

use crate::dom::{HostDocument, OverlaySurface};
use crate::resolver::locate;
use crate::session::SessionState;

const SHOWN: f64 = 1.0;
const HIDDEN: f64 = 0.0;

/// A marker plus what the renderer last wrote to it.
#[derive(Debug)]
pub struct MarkerSlot<M> {
    pub marker: M,
    /// Target element resolved and visible at the last reposition.
    pub tracking: bool,
    pub opacity: f64,
}

/// Owns the overlay surface and the marker registry. The registry is
/// index-aligned with the session's points after every render pass; `None`
/// marks a point whose element was missing or hidden at render time.
pub struct OverlayRenderer<S: OverlaySurface> {
    surface: S,
    markers: Vec<Option<MarkerSlot<S::Marker>>>,
}

impl<S: OverlaySurface> OverlayRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            markers: Vec::new(),
        }
    }

    pub fn markers(&self) -> &[Option<MarkerSlot<S::Marker>>] {
        &self.markers
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Drop every marker and build the registry again from scratch.
    pub fn render_all<D: HostDocument>(
        &mut self,
        document: &D,
        session: &SessionState,
        gating: StepGating,
    ) {
        self.markers = std::iter::repeat_with(|| None)
            .take(session.points.len())
            .collect();

        if !document.has_root() {
            tracing::debug!("document has no root yet, skipping render");
            return;
        }
        if let Err(e) = self.surface.ensure_layer() {
            tracing::warn!(error = %e, "failed to create overlay layer");
            return;
        }
        self.surface.clear_markers();

        for (index, point) in session.points.iter().enumerate() {
            if locate(document, &point.xpath).visible_rect().is_none() {
                continue;
            }
            let style = HeatStyle::for_count(point.count, session.session_max);
            match self.surface.create_marker(&style) {
                Ok(marker) => {
                    self.markers[index] = Some(MarkerSlot {
                        marker,
                        tracking: true,
                        opacity: SHOWN,
                    });
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "failed to create marker");
                }
            }
        }

        let rendered = self.markers.iter().filter(|m| m.is_some()).count();
        tracing::debug!(points = session.points.len(), rendered, "overlay rendered");

        self.reposition_all(document, session, gating);
        self.apply_step_visibility(session, gating);
    }

    /// Re-resolve every marked point and move its marker onto the element.
    /// Markers whose element went away are hidden, never removed.
    pub fn reposition_all<D: HostDocument>(
        &mut self,
        document: &D,
        session: &SessionState,
        gating: StepGating,
    ) {
        for (index, slot) in self.markers.iter_mut().enumerate() {
            let Some(slot) = slot else {
                continue;
            };
            let Some(point) = session.points.get(index) else {
                continue;
            };

            match locate(document, &point.xpath).visible_rect() {
                Some(rect) => {
                    let (x, y) = rect.anchor(point.x_ratio, point.y_ratio);
                    self.surface.place_marker(&slot.marker, x, y);
                    slot.tracking = true;
                }
                None => slot.tracking = false,
            }
            let target = target_opacity(slot, session, gating, index);
            write_opacity(&mut self.surface, slot, target);
        }
    }

    /// Apply the session's step cursor to every existing marker.
    pub fn apply_step_visibility(&mut self, session: &SessionState, gating: StepGating) {
        for (index, slot) in self.markers.iter_mut().enumerate() {
            let Some(slot) = slot else {
                continue;
            };
            let target = target_opacity(slot, session, gating, index);
            write_opacity(&mut self.surface, slot, target);
        }
    }

    /// Remove the layer and forget every marker.
    pub fn clear(&mut self) {
        self.surface.remove_layer();
        self.markers.clear();
    }
}

fn target_opacity<M>(
    slot: &MarkerSlot<M>,
    session: &SessionState,
    gating: StepGating,
    index: usize,
) -> f64 {
    let allowed = session
        .points
        .get(index)
        .is_some_and(|point| session.cursor.allows(gating, index, point));
    if slot.tracking && allowed { SHOWN } else { HIDDEN }
}

fn write_opacity<S: OverlaySurface>(surface: &mut S, slot: &mut MarkerSlot<S::Marker>, opacity: f64) {
    if slot.opacity != opacity {
        surface.set_marker_opacity(&slot.marker, opacity);
        slot.opacity = opacity;
    }
}

#[cfg(test)]
mod tests {
    use neo_heatmap_shared::{PointDescriptor, StepCursor};

    use super::*;
    use crate::testing::{FakeOverlay, FakePage};

    fn session(points: Vec<PointDescriptor>, cursor: StepCursor) -> SessionState {
        SessionState {
            points,
            session_max: 10.0,
            cursor,
        }
    }

    fn marker_ids(renderer: &OverlayRenderer<FakeOverlay>) -> Vec<Option<usize>> {
        renderer
            .markers()
            .iter()
            .map(|slot| slot.as_ref().map(|s| s.marker))
            .collect()
    }

    #[test]
    fn marker_is_centered_on_ratio_anchor() {
        let page = FakePage::new();
        let target = page.add_element("", page.body(), (100.0, 200.0, 40.0, 20.0));
        page.route("/html/body/button", target);

        let mut renderer = OverlayRenderer::new(page.overlay());
        let session = session(
            vec![PointDescriptor::new("/html/body/button", 0.5, 0.5, 3.0)],
            StepCursor::ShowAll,
        );
        renderer.render_all(&page, &session, StepGating::SequenceIndex);

        let marker = page.marker(renderer.markers()[0].as_ref().expect("marker").marker);
        assert_eq!((marker.x, marker.y), (120.0, 210.0));
        assert_eq!(marker.opacity, 1.0);
        assert!(page.layer_present());
    }

    #[test]
    fn registry_stays_aligned_with_unresolved_points() {
        let page = FakePage::new();
        let shown = page.add_element("", page.body(), (0.0, 0.0, 10.0, 10.0));
        let hidden = page.add_element("", page.body(), (0.0, 0.0, 10.0, 10.0));
        page.set_style(hidden, "visibility", "hidden");
        page.route("/a", shown);
        page.route("/b", hidden);

        let mut renderer = OverlayRenderer::new(page.overlay());
        let session = session(
            vec![
                PointDescriptor::new("/missing", 0.5, 0.5, 1.0),
                PointDescriptor::new("/a", 0.5, 0.5, 1.0),
                PointDescriptor::new("/b", 0.5, 0.5, 1.0),
            ],
            StepCursor::ShowAll,
        );
        renderer.render_all(&page, &session, StepGating::SequenceIndex);

        let ids = marker_ids(&renderer);
        assert_eq!(ids.len(), 3);
        assert!(ids[0].is_none());
        assert!(ids[1].is_some());
        assert!(ids[2].is_none());
    }

    #[test]
    fn rebuild_replaces_previous_markers() {
        let page = FakePage::new();
        let target = page.add_element("", page.body(), (0.0, 0.0, 10.0, 10.0));
        page.route("/a", target);
        let mut renderer = OverlayRenderer::new(page.overlay());
        let session = session(
            vec![PointDescriptor::new("/a", 0.5, 0.5, 1.0)],
            StepCursor::ShowAll,
        );

        renderer.render_all(&page, &session, StepGating::SequenceIndex);
        renderer.render_all(&page, &session, StepGating::SequenceIndex);

        assert_eq!(page.live_marker_count(), 1);
        assert_eq!(page.layer_creations(), 1);
    }

    #[test]
    fn reposition_follows_moved_element_and_hides_vanished_one() {
        let page = FakePage::new();
        let target = page.add_element("", page.body(), (0.0, 0.0, 10.0, 10.0));
        page.route("/a", target);
        let mut renderer = OverlayRenderer::new(page.overlay());
        let session = session(
            vec![PointDescriptor::new("/a", 0.0, 0.0, 1.0)],
            StepCursor::ShowAll,
        );
        renderer.render_all(&page, &session, StepGating::SequenceIndex);
        let marker = renderer.markers()[0].as_ref().expect("marker").marker;

        page.set_rect(target, (30.0, 40.0, 10.0, 10.0));
        renderer.reposition_all(&page, &session, StepGating::SequenceIndex);
        let state = page.marker(marker);
        assert_eq!((state.x, state.y), (30.0, 40.0));

        page.unroute("/a");
        renderer.reposition_all(&page, &session, StepGating::SequenceIndex);
        assert_eq!(page.marker(marker).opacity, 0.0);
        assert_eq!(renderer.markers().len(), 1);
        assert!(renderer.markers()[0].is_some());

        page.route("/a", target);
        renderer.reposition_all(&page, &session, StepGating::SequenceIndex);
        assert_eq!(page.marker(marker).opacity, 1.0);
    }

    #[test]
    fn step_visibility_covers_all_regimes() {
        let page = FakePage::new();
        let mut points = Vec::new();
        for i in 0..4 {
            let el = page.add_element("", page.body(), (i as f64 * 20.0, 0.0, 10.0, 10.0));
            let path = format!("/html/body/div[{i}]");
            page.route(&path, el);
            points.push(PointDescriptor::new(path, 0.5, 0.5, 1.0));
        }
        let mut renderer = OverlayRenderer::new(page.overlay());
        let mut session = session(points, StepCursor::ShowAll);
        renderer.render_all(&page, &session, StepGating::SequenceIndex);

        let opacities = |renderer: &OverlayRenderer<FakeOverlay>| -> Vec<f64> {
            renderer
                .markers()
                .iter()
                .map(|slot| page.marker(slot.as_ref().expect("marker").marker).opacity)
                .collect()
        };
        assert_eq!(opacities(&renderer), [1.0, 1.0, 1.0, 1.0]);

        session.cursor = StepCursor::HideAll;
        renderer.apply_step_visibility(&session, StepGating::SequenceIndex);
        assert_eq!(opacities(&renderer), [0.0, 0.0, 0.0, 0.0]);

        session.cursor = StepCursor::UpTo(1);
        renderer.apply_step_visibility(&session, StepGating::SequenceIndex);
        assert_eq!(opacities(&renderer), [1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn unchanged_opacity_is_not_rewritten() {
        let page = FakePage::new();
        let target = page.add_element("", page.body(), (0.0, 0.0, 10.0, 10.0));
        page.route("/a", target);
        let mut renderer = OverlayRenderer::new(page.overlay());
        let session = session(
            vec![PointDescriptor::new("/a", 0.5, 0.5, 1.0)],
            StepCursor::ShowAll,
        );
        renderer.render_all(&page, &session, StepGating::SequenceIndex);

        let before = page.mutation_count();
        renderer.apply_step_visibility(&session, StepGating::SequenceIndex);
        assert_eq!(page.mutation_count(), before);
    }

    #[test]
    fn missing_root_leaves_null_registry() {
        let page = FakePage::new();
        page.remove_root();
        let mut renderer = OverlayRenderer::new(page.overlay());
        let session = session(
            vec![PointDescriptor::new("/a", 0.5, 0.5, 1.0)],
            StepCursor::ShowAll,
        );
        renderer.render_all(&page, &session, StepGating::SequenceIndex);
        assert_eq!(marker_ids(&renderer), [None]);
        assert!(!page.layer_present());
    }

    #[test]
    fn marker_creation_failure_becomes_null_entry() {
        let page = FakePage::new();
        let target = page.add_element("", page.body(), (0.0, 0.0, 10.0, 10.0));
        page.route("/a", target);
        page.fail_marker_creation();
        let mut renderer = OverlayRenderer::new(page.overlay());
        let session = session(
            vec![PointDescriptor::new("/a", 0.5, 0.5, 1.0)],
            StepCursor::ShowAll,
        );
        renderer.render_all(&page, &session, StepGating::SequenceIndex);
        assert_eq!(marker_ids(&renderer), [None]);
    }

    #[test]
    fn clear_removes_layer_and_registry() {
        let page = FakePage::new();
        let target = page.add_element("", page.body(), (0.0, 0.0, 10.0, 10.0));
        page.route("/a", target);
        let mut renderer = OverlayRenderer::new(page.overlay());
        let session = session(
            vec![PointDescriptor::new("/a", 0.5, 0.5, 1.0)],
            StepCursor::ShowAll,
        );
        renderer.render_all(&page, &session, StepGating::SequenceIndex);
        renderer.clear();
        assert!(renderer.markers().is_empty());
        assert!(!page.layer_present());
        assert_eq!(page.live_marker_count(), 0);
    }
}
