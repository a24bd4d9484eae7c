use serde::{Deserialize, Serialize};

/// Ratio used when a point carries no usable offset.
pub const CENTER_RATIO: f64 = 0.5;

/// Clamp a fractional offset into `[0, 1]`. Non-finite input snaps to the center.
pub fn clamp_ratio(value: f64) -> f64 {
    if !value.is_finite() {
        return CENTER_RATIO;
    }
    value.clamp(0.0, 1.0)
}

/// Viewport-relative bounding box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementRect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A rect only counts as rendered when both sides are non-zero.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Point inside the rect at the given fractional offset from its top-left corner.
    pub fn anchor(&self, x_ratio: f64, y_ratio: f64) -> (f64, f64) {
        (
            self.left + self.width * clamp_ratio(x_ratio),
            self.top + self.height * clamp_ratio(y_ratio),
        )
    }
}

/// Visible viewport size and scroll offsets of the host window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportMetrics {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub device_pixel_ratio: f64,
}

impl Default for ViewportMetrics {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl ViewportMetrics {
    /// Convert a viewport-relative point into document coordinates.
    pub fn to_page(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.scroll_x, y + self.scroll_y)
    }
}
