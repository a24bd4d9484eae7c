use serde_json::Value;

use neo_heatmap_shared::{Command, Envelope, NAMESPACE, Response};

use crate::config::{AgentConfig, RenderMode, WILDCARD_ORIGIN};

/// Why an inbound message was dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotAnEnvelope,
    ForeignNamespace,
    OriginNotAllowed,
}

/// A command accepted from an allowed controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub origin: String,
    pub request_id: Option<Value>,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Rejected(Rejection),
    /// Well-formed and allowed, but not a verb this agent answers.
    Unrecognized(String),
    Accepted(Request),
}

/// Filters inbound messages and frames outbound ones.
#[derive(Debug, Clone)]
pub struct Gateway {
    allowed_origins: Vec<String>,
    render_mode: RenderMode,
}

impl Gateway {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            render_mode: config.render_mode,
        }
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == WILDCARD_ORIGIN || allowed == origin)
    }

    pub fn admit(&self, origin: &str, data: &Value) -> Admission {
        let Some(envelope) = Envelope::from_value(data) else {
            return Admission::Rejected(Rejection::NotAnEnvelope);
        };
        if envelope.ns != NAMESPACE {
            return Admission::Rejected(Rejection::ForeignNamespace);
        }
        if !self.origin_allowed(origin) {
            return Admission::Rejected(Rejection::OriginNotAllowed);
        }

        let Some(command) = Command::decode(&envelope.kind, envelope.payload.as_ref()) else {
            return Admission::Unrecognized(envelope.kind);
        };
        if !self.serves(&command) {
            return Admission::Unrecognized(envelope.kind);
        }

        match &command {
            Command::Init(init) if init.malformed > 0 => {
                tracing::warn!(malformed = init.malformed, "INIT carried malformed items");
            }
            Command::GetPositions { malformed, .. } if *malformed > 0 => {
                tracing::warn!(malformed = *malformed, "GET_POSITIONS carried malformed items");
            }
            _ => {}
        }

        Admission::Accepted(Request {
            origin: origin.to_owned(),
            request_id: envelope.request_id,
            command,
        })
    }

    fn serves(&self, command: &Command) -> bool {
        match self.render_mode {
            RenderMode::Local => true,
            RenderMode::QueryOnly => matches!(
                command,
                Command::Ping | Command::GetPositions { .. } | Command::ReplayStep { .. }
            ),
        }
    }

    pub fn reply(&self, request_id: Option<Value>, response: &Response) -> Envelope {
        Envelope::reply(NAMESPACE, request_id, response)
    }

    /// Unsolicited message; carries no correlation id.
    pub fn notification(&self, response: &Response) -> Envelope {
        Envelope::reply(NAMESPACE, None, response)
    }
}
