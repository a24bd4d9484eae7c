use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::{ElementRect, ViewportMetrics};
use crate::point::{PointDescriptor, StepCursor, decode_points};

/// Namespace tag carried by every message in both directions.
pub const NAMESPACE: &str = "NEO_HEATMAP";

/// Wire envelope shared by commands and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ns: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    /// Pull the envelope fields out of an arbitrary inbound value. Returns
    /// `None` unless the value is an object with string `ns` and `type`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let ns = object.get("ns")?.as_str()?.to_owned();
        let kind = object.get("type")?.as_str()?.to_owned();
        let request_id = object.get("requestId").filter(|v| !v.is_null()).cloned();
        let payload = object.get("payload").filter(|v| !v.is_null()).cloned();
        Some(Self {
            ns,
            kind,
            request_id,
            payload,
        })
    }

    /// Build the reply to a request, echoing its correlation id.
    pub fn reply(namespace: &str, request_id: Option<Value>, response: &Response) -> Self {
        Self {
            ns: namespace.to_owned(),
            kind: response.tag().to_owned(),
            request_id,
            payload: response.payload(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Payload of `INIT`.
#[derive(Debug, Clone, PartialEq)]
pub struct InitPayload {
    pub points: Vec<PointDescriptor>,
    pub session_max: f64,
    pub cursor: StepCursor,
    pub malformed: usize,
}

/// Recognized inbound commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    Init(InitPayload),
    SetStep(StepCursor),
    Clear,
    GetPositions {
        points: Vec<PointDescriptor>,
        malformed: usize,
    },
    ReplayStep {
        xpath: String,
    },
}

impl Command {
    /// Decode a command from its tag and payload. Unknown tags yield `None`.
    /// Payload fields are decoded leniently so that a recognized command
    /// always produces exactly one reply.
    pub fn decode(kind: &str, payload: Option<&Value>) -> Option<Self> {
        let empty = Map::new();
        let fields = payload.and_then(Value::as_object).unwrap_or(&empty);
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| fields.get(*name))
                .filter(|v| !v.is_null())
        };

        let command = match kind {
            "PING" => Self::Ping,
            "INIT" => {
                let (points, malformed) = decode_points(field(&["items", "points"]));
                let session_max = field(&["maxCount", "sessionMax"])
                    .and_then(Value::as_f64)
                    .filter(|max| max.is_finite() && *max != 0.0)
                    .unwrap_or(1.0);
                let cursor = match field(&["currentStep"]) {
                    Some(raw) if raw.is_number() => StepCursor::from_wire(Some(raw)),
                    _ => StepCursor::ShowAll,
                };
                Self::Init(InitPayload {
                    points,
                    session_max,
                    cursor,
                    malformed,
                })
            }
            "SET_STEP" => Self::SetStep(StepCursor::from_wire(field(&["currentStep"]))),
            "CLEAR" => Self::Clear,
            "GET_POSITIONS" => {
                let (points, malformed) = decode_points(field(&["items", "points"]));
                Self::GetPositions { points, malformed }
            }
            "REPLAY_STEP" => {
                let xpath = field(&["xpath", "structuralPath"])
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                Self::ReplayStep { xpath }
            }
            _ => return None,
        };
        Some(command)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Init(_) => "INIT",
            Self::SetStep(_) => "SET_STEP",
            Self::Clear => "CLEAR",
            Self::GetPositions { .. } => "GET_POSITIONS",
            Self::ReplayStep { .. } => "REPLAY_STEP",
        }
    }
}

/// Resolution result for one point of a `GET_POSITIONS` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointPosition {
    pub index: usize,
    pub xpath: String,
    pub found: bool,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<ElementRect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_y: Option<f64>,
}

/// Payload of `POSITIONS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionsReport {
    pub positions: Vec<PointPosition>,
    pub viewport: ViewportMetrics,
}

/// Outbound messages: replies to commands plus the unsolicited viewport push.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Pong,
    InitOk,
    SetStepOk,
    ClearOk,
    Positions(PositionsReport),
    ReplayResult { ok: bool },
    ViewportChanged(ViewportMetrics),
}

impl Response {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Pong => "PONG",
            Self::InitOk => "INIT_OK",
            Self::SetStepOk => "SET_STEP_OK",
            Self::ClearOk => "CLEAR_OK",
            Self::Positions(_) => "POSITIONS",
            Self::ReplayResult { .. } => "REPLAY_RESULT",
            Self::ViewportChanged(_) => "VIEWPORT_CHANGED",
        }
    }

    pub fn payload(&self) -> Option<Value> {
        match self {
            Self::Pong | Self::InitOk | Self::SetStepOk | Self::ClearOk => None,
            Self::Positions(report) => serde_json::to_value(report).ok(),
            Self::ReplayResult { ok } => Some(serde_json::json!({ "ok": ok })),
            Self::ViewportChanged(metrics) => serde_json::to_value(metrics).ok(),
        }
    }
}
