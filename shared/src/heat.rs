use crate::colors::{lerp_u8, rgba_css};

/// Session maxima below this value still normalize against it, so a sparse
/// session does not paint its busiest point fully red.
pub const HEAT_SATURATION_THRESHOLD: f64 = 20.0;
pub const MIN_SPOT_SIZE: f64 = 40.0;
pub const MAX_SPOT_SIZE: f64 = 150.0;

const STOPS: &[(f64, (u8, u8, u8))] = &[
    (0.0, (0, 0, 255)),
    (0.3, (0, 255, 255)),
    (0.5, (0, 255, 0)),
    (0.7, (255, 255, 0)),
    (1.0, (255, 0, 0)),
];

/// Normalized heat `t` in `[0, 1]` for a count within a session.
pub fn heat_fraction(count: f64, session_max: f64) -> f64 {
    let session_max = if session_max.is_finite() {
        session_max
    } else {
        0.0
    };
    let denom = HEAT_SATURATION_THRESHOLD.max(session_max);
    if !count.is_finite() || denom <= 0.0 {
        return 0.0;
    }
    (count / denom).clamp(0.0, 1.0)
}

/// Blue → cyan → green → yellow → red gradient sampled at `t`.
pub fn color_at(t: f64) -> (u8, u8, u8) {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    for window in STOPS.windows(2) {
        let (left_pos, left_color) = window[0];
        let (right_pos, right_color) = window[1];
        if t >= left_pos && t <= right_pos {
            let span = (right_pos - left_pos).max(f64::EPSILON);
            let local = (t - left_pos) / span;
            return (
                lerp_u8(left_color.0, right_color.0, local),
                lerp_u8(left_color.1, right_color.1, local),
                lerp_u8(left_color.2, right_color.2, local),
            );
        }
    }

    STOPS
        .last()
        .map(|(_, color)| *color)
        .unwrap_or((255, 0, 0))
}

/// Spot diameter for `t`. Square-root curve keeps faint points legible.
pub fn spot_size(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    MIN_SPOT_SIZE + t.sqrt() * (MAX_SPOT_SIZE - MIN_SPOT_SIZE)
}

/// Fully resolved visual profile of one heat spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatStyle {
    pub t: f64,
    pub color: (u8, u8, u8),
    pub size: f64,
    pub center_alpha: f64,
    pub mid_alpha: f64,
    pub outer_alpha: f64,
}

impl HeatStyle {
    pub fn for_count(count: f64, session_max: f64) -> Self {
        let t = heat_fraction(count, session_max);
        Self {
            t,
            color: color_at(t),
            size: spot_size(t),
            center_alpha: 0.35 + 0.65 * t,
            mid_alpha: 0.18 + 0.42 * t,
            outer_alpha: 0.0,
        }
    }

    /// Radial glow used as the spot's CSS `background`.
    pub fn background_css(&self) -> String {
        format!(
            "radial-gradient(circle, {} 0%, {} 55%, {} 100%)",
            rgba_css(self.color, self.center_alpha),
            rgba_css(self.color, self.mid_alpha),
            rgba_css(self.color, self.outer_alpha),
        )
    }

    pub fn size_css(&self) -> String {
        format!("{}px", self.size)
    }
}
