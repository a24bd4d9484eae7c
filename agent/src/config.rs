use serde::Deserialize;
use serde_json::Value;

use neo_heatmap_shared::StepGating;

pub use neo_heatmap_shared::NAMESPACE;

pub const OVERLAY_ROOT_ID: &str = "neo-heatmap-overlay-root";
pub const OVERLAY_ATTR: &str = "data-neo-heatmap-overlay";
pub const SPOT_CLASS: &str = "neo-heatmap-spot";

/// Page global that may carry an `AgentConfig` override object.
pub const CONFIG_GLOBAL: &str = "NEO_HEATMAP_CONFIG";

pub const DEFAULT_ALLOWED_PARENTS: &[&str] = &["http://localhost:8080"];
/// Allow-list entry that disables the origin check. Local development only.
pub const WILDCARD_ORIGIN: &str = "*";

pub const MUTATION_DEBOUNCE_MS: u32 = 120;
pub const VIEWPORT_NOTIFY_DEBOUNCE_MS: u32 = 80;
pub const OBSERVED_ATTRIBUTES: &[&str] = &["style", "class", "hidden", "disabled"];
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Where rendering authority lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    /// The agent draws and maintains the overlay itself.
    #[default]
    Local,
    /// The agent only answers position queries; the controller draws.
    QueryOnly,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub allowed_origins: Vec<String>,
    pub render_mode: RenderMode,
    pub step_gating: StepGating,
    pub viewport_notifications: bool,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_PARENTS
                .iter()
                .map(|origin| (*origin).to_owned())
                .collect(),
            render_mode: RenderMode::Local,
            step_gating: StepGating::SequenceIndex,
            viewport_notifications: false,
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
        }
    }
}

impl AgentConfig {
    /// Apply a page-supplied override object. `null`/absent means defaults.
    pub fn from_override(value: Option<Value>) -> Result<Self, String> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value).map_err(|e| format!("invalid config: {e}")),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == WILDCARD_ORIGIN)
    }

    pub fn renders_locally(&self) -> bool {
        self.render_mode == RenderMode::Local
    }
}
