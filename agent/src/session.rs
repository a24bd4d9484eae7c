use neo_heatmap_shared::protocol::InitPayload;
use neo_heatmap_shared::{PointDescriptor, StepCursor};

/// Data the controller handed over with the latest `INIT`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub points: Vec<PointDescriptor>,
    pub session_max: f64,
    pub cursor: StepCursor,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            session_max: 1.0,
            cursor: StepCursor::ShowAll,
        }
    }
}

impl From<InitPayload> for SessionState {
    fn from(init: InitPayload) -> Self {
        Self {
            points: init.points,
            session_max: init.session_max,
            cursor: init.cursor,
        }
    }
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
