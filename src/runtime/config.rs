use serde::{Deserialize, Serialize};

/// What the evaluator does with a branch that has static errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticErrorPolicy {
    /// Return `EvalError::Static` without evaluating anything.
    #[default]
    Refuse,
    /// Mark affected terms and their dependents as errored and keep going.
    SkipAffected,
}

impl StaticErrorPolicy {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "refuse" => Some(StaticErrorPolicy::Refuse),
            "skip" | "skip_affected" => Some(StaticErrorPolicy::SkipAffected),
            _ => None,
        }
    }
}

pub const DEFAULT_MAX_FRAME_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub static_error_policy: StaticErrorPolicy,
    pub max_frame_depth: usize,
    /// Log every evaluated term at trace level.
    pub trace: bool,
    /// Log every migrated or discarded state value at debug level.
    pub log_migration: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            static_error_policy: StaticErrorPolicy::Refuse,
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
            trace: false,
            log_migration: false,
        }
    }
}

impl WorldConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Defaults with `CIRCA_TRACE`, `CIRCA_MAX_FRAMES` and
    /// `CIRCA_STATIC_ERRORS` applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("CIRCA_TRACE") {
            self.trace = !matches!(value.as_str(), "" | "0" | "false");
        }
        if let Some(depth) = lookup("CIRCA_MAX_FRAMES").and_then(|v| v.parse().ok()) {
            self.max_frame_depth = depth;
        }
        if let Some(policy) = lookup("CIRCA_STATIC_ERRORS").and_then(|v| StaticErrorPolicy::parse(&v)) {
            self.static_error_policy = policy;
        }
        self
    }
}
