pub mod colors;
pub mod geometry;
pub mod heat;
pub mod point;
pub mod protocol;

pub use geometry::{ElementRect, ViewportMetrics, clamp_ratio};
pub use heat::HeatStyle;
pub use point::{PointDescriptor, StepCursor, StepGating};
pub use protocol::{Command, Envelope, NAMESPACE, Response};
