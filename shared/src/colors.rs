/// Format RGBA as a CSS color string.
pub fn rgba_css(color: (u8, u8, u8), alpha: f64) -> String {
    let (r, g, b) = color;
    format!("rgba({r}, {g}, {b}, {})", round_alpha(alpha))
}

/// Linear interpolation between two channel values, rounded to the nearest integer.
pub fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    let t = t.clamp(0.0, 1.0);
    let value = a as f64 + (b as f64 - a as f64) * t;
    value.round().clamp(0.0, 255.0) as u8
}

// Keeps float noise like 0.35000000000000003 out of generated CSS.
fn round_alpha(alpha: f64) -> f64 {
    (alpha.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}
