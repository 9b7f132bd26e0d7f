//! Environment classification

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind of environment caseflow is pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    #[default]
    Dev,
    Test,
    Uat,
    Prod,
    Local,
}

impl EnvironmentKind {
    /// Parse a profile name. Unknown profiles fall back to `Dev`.
    pub fn from_profile(profile: &str) -> Self {
        match profile.trim().to_ascii_lowercase().as_str() {
            "test" => EnvironmentKind::Test,
            "uat" => EnvironmentKind::Uat,
            "prod" => EnvironmentKind::Prod,
            "local" => EnvironmentKind::Local,
            _ => EnvironmentKind::Dev,
        }
    }

    pub fn profile(&self) -> &'static str {
        match self {
            EnvironmentKind::Dev => "dev",
            EnvironmentKind::Test => "test",
            EnvironmentKind::Uat => "uat",
            EnvironmentKind::Prod => "prod",
            EnvironmentKind::Local => "local",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EnvironmentKind::Dev => "Development",
            EnvironmentKind::Test => "Testing",
            EnvironmentKind::Uat => "User Acceptance Testing",
            EnvironmentKind::Prod => "Production",
            EnvironmentKind::Local => "Local Development",
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, EnvironmentKind::Dev | EnvironmentKind::Local)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, EnvironmentKind::Prod)
    }

    /// Passes over the acquisition strategy list at session setup
    pub fn max_retry_count(&self) -> u32 {
        match self {
            EnvironmentKind::Dev | EnvironmentKind::Local => 1,
            EnvironmentKind::Prod => 5,
            EnvironmentKind::Test | EnvironmentKind::Uat => 3,
        }
    }

    /// Default budget for waiting on case completion
    pub fn default_timeout(&self) -> Duration {
        match self {
            EnvironmentKind::Dev | EnvironmentKind::Local => Duration::from_secs(60),
            EnvironmentKind::Prod => Duration::from_secs(300),
            EnvironmentKind::Test | EnvironmentKind::Uat => Duration::from_secs(120),
        }
    }
}

impl std::fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.profile().to_ascii_uppercase())
    }
}
