//! HTTP layer configuration.

use pulse_core::limits::DEFAULT_MAX_BODY_SIZE;
use serde::Deserialize;

/// HTTP layer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Allowed CORS origins; `*` allows any origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Request body cap in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ApiConfig {
    /// Parses a comma-separated origin list, ignoring blanks.
    pub fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// True if any origin is allowed.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}
