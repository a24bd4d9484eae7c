use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::geometry::{CENTER_RATIO, clamp_ratio};

/// One heat sample: a structural path to an element, a fractional offset
/// inside its box, an intensity count and the step at which it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointDescriptor {
    #[serde(default, alias = "structuralPath")]
    pub xpath: String,
    #[serde(default = "centered", deserialize_with = "lenient_ratio")]
    pub x_ratio: f64,
    #[serde(default = "centered", deserialize_with = "lenient_ratio")]
    pub y_ratio: f64,
    #[serde(default = "unit_count", alias = "intensity", deserialize_with = "lenient_count")]
    pub count: f64,
    #[serde(
        default,
        alias = "stepIndex",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_step"
    )]
    pub step: Option<i64>,
}

impl PointDescriptor {
    pub fn new(xpath: impl Into<String>, x_ratio: f64, y_ratio: f64, count: f64) -> Self {
        Self {
            xpath: xpath.into(),
            x_ratio: clamp_ratio(x_ratio),
            y_ratio: clamp_ratio(y_ratio),
            count,
            step: None,
        }
    }

    /// Stand-in for a malformed wire entry. The empty path never resolves.
    pub fn unresolvable() -> Self {
        Self::new("", CENTER_RATIO, CENTER_RATIO, 1.0)
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }
}

/// Decode a list of points. Entries that are not objects or carry mistyped
/// fields become placeholders with an empty path, which never resolve, so
/// every later point keeps its sequence position. Returns the points and how
/// many entries were malformed.
pub fn decode_points(raw: Option<&Value>) -> (Vec<PointDescriptor>, usize) {
    let Some(Value::Array(items)) = raw else {
        return (Vec::new(), 0);
    };
    let mut malformed = 0;
    let points: Vec<_> = items
        .iter()
        .map(|item| {
            PointDescriptor::deserialize(item).unwrap_or_else(|_| {
                malformed += 1;
                PointDescriptor::unresolvable()
            })
        })
        .collect();
    (points, malformed)
}

fn centered() -> f64 {
    CENTER_RATIO
}

fn unit_count() -> f64 {
    1.0
}

fn lenient_ratio<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_like)
        .map(clamp_ratio)
        .unwrap_or(CENTER_RATIO))
}

// A zero or missing count still renders as the faintest visible spot.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value.as_ref().and_then(number_like) {
        Some(count) if count.is_finite() && count != 0.0 => count,
        _ => 1.0,
    })
}

fn lenient_step<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_i64))
}

fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// How a step cursor is compared against a point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepGating {
    /// Compare against the point's position in the session sequence.
    #[default]
    SequenceIndex,
    /// Compare against the point's recorded step, falling back to its position.
    StepIndex,
}

/// Progressive-playback cursor over the session's points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepCursor {
    #[default]
    ShowAll,
    HideAll,
    UpTo(u64),
}

impl StepCursor {
    pub const SHOW_ALL: i64 = -1;
    pub const HIDE_ALL: i64 = -2;

    /// Interpret a raw wire value. Anything that is not `-1` or a non-negative
    /// integer hides every marker.
    pub fn from_wire(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_i64) {
            Some(Self::SHOW_ALL) => Self::ShowAll,
            Some(n) if n >= 0 => Self::UpTo(n as u64),
            _ => Self::HideAll,
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            Self::ShowAll => Self::SHOW_ALL,
            Self::HideAll => Self::HIDE_ALL,
            Self::UpTo(n) => n.min(i64::MAX as u64) as i64,
        }
    }

    pub fn allows(self, gating: StepGating, position: usize, point: &PointDescriptor) -> bool {
        match self {
            Self::ShowAll => true,
            Self::HideAll => false,
            Self::UpTo(limit) => {
                let ordinal = match gating {
                    StepGating::SequenceIndex => position as i64,
                    StepGating::StepIndex => point.step.unwrap_or(position as i64),
                };
                ordinal <= limit.min(i64::MAX as u64) as i64
            }
        }
    }
}
