//! Layered caseflow settings

use crate::{mask_connection_string, mask_url, ConfigError, ConfigResult, ConnectionParams, EnvironmentKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main caseflow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseflowConfig {
    /// Environment profile and display name
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Platform connection
    #[serde(default)]
    pub connection: ConnectionParams,

    /// Transaction policy
    #[serde(default)]
    pub transactions: TransactionConfig,

    /// Poll cadences
    #[serde(default)]
    pub polling: PollingConfig,

    /// Approval chain defaults
    #[serde(default)]
    pub approvals: ApprovalConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// One of dev, test, uat, prod, local. Anything else is treated as dev.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Human-readable environment name
    #[serde(default = "default_environment_name")]
    pub name: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            name: default_environment_name(),
        }
    }
}

/// Transaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Roll back policy-mode transactions instead of committing them.
    /// Ignored in production.
    #[serde(default = "default_true")]
    pub rollback: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self { rollback: true }
    }
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between work-item polls
    #[serde(default = "default_work_item_interval")]
    pub work_item_interval_ms: u64,

    /// Interval between case completion polls
    #[serde(default = "default_case_interval")]
    pub case_interval_ms: u64,

    /// Pause after each approval so the engine can advance
    #[serde(default = "default_level_settle")]
    pub level_settle_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            work_item_interval_ms: default_work_item_interval(),
            case_interval_ms: default_case_interval(),
            level_settle_ms: default_level_settle(),
        }
    }
}

impl PollingConfig {
    pub fn work_item_interval(&self) -> Duration {
        Duration::from_millis(self.work_item_interval_ms)
    }

    pub fn case_interval(&self) -> Duration {
        Duration::from_millis(self.case_interval_ms)
    }

    pub fn level_settle(&self) -> Duration {
        Duration::from_millis(self.level_settle_ms)
    }
}

/// Approval chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// How long to wait for each level's item to appear
    #[serde(default = "default_per_level_timeout")]
    pub per_level_timeout_secs: u64,

    /// Upper bound on levels processed in one run
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,

    /// Optional budget for a whole chain run
    #[serde(default)]
    pub overall_budget_secs: Option<u64>,

    #[serde(default = "default_approve_comments")]
    pub approve_comments: String,

    #[serde(default = "default_reject_comments")]
    pub reject_comments: String,

    #[serde(default = "default_form_comments")]
    pub form_comments: String,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            per_level_timeout_secs: default_per_level_timeout(),
            max_levels: default_max_levels(),
            overall_budget_secs: None,
            approve_comments: default_approve_comments(),
            reject_comments: default_reject_comments(),
            form_comments: default_form_comments(),
        }
    }
}

impl ApprovalConfig {
    pub fn per_level_timeout(&self) -> Duration {
        Duration::from_secs(self.per_level_timeout_secs)
    }

    pub fn overall_budget(&self) -> Option<Duration> {
        self.overall_budget_secs.map(Duration::from_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_profile() -> String {
    "dev".to_string()
}

fn default_environment_name() -> String {
    "Development".to_string()
}

fn default_work_item_interval() -> u64 {
    1_000
}

fn default_case_interval() -> u64 {
    2_000
}

fn default_level_settle() -> u64 {
    2_000
}

fn default_per_level_timeout() -> u64 {
    10
}

fn default_max_levels() -> usize {
    5
}

fn default_approve_comments() -> String {
    "Approved programmatically by caseflow".to_string()
}

fn default_reject_comments() -> String {
    "Rejected programmatically by caseflow".to_string()
}

fn default_form_comments() -> String {
    "Completed programmatically by caseflow".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CaseflowConfig {
    /// Load configuration: defaults, then an optional file, then
    /// `CASEFLOW__SECTION__KEY` environment variables.
    pub fn load(path: Option<&str>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CaseflowConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CASEFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config: CaseflowConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        config.log_summary();
        Ok(config)
    }

    /// Configuration for a profile, with every other setting defaulted
    pub fn for_profile(kind: EnvironmentKind) -> Self {
        Self {
            environment: EnvironmentConfig {
                profile: kind.profile().to_string(),
                name: kind.description().to_string(),
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.polling.work_item_interval_ms == 0 || self.polling.case_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll intervals must be greater than zero".into(),
            ));
        }
        if self.approvals.max_levels == 0 {
            return Err(ConfigError::Invalid("approvals.max_levels must be at least 1".into()));
        }
        if self.connection.username.trim().is_empty() {
            return Err(ConfigError::Invalid("connection.username is empty".into()));
        }
        Ok(())
    }

    // ── Policies ─────────────────────────────────────────────────────

    pub fn kind(&self) -> EnvironmentKind {
        EnvironmentKind::from_profile(&self.environment.profile)
    }

    pub fn is_development(&self) -> bool {
        self.kind().is_development()
    }

    pub fn is_production(&self) -> bool {
        self.kind().is_production()
    }

    /// Policy-mode transactions roll back unless disabled or in production
    pub fn should_rollback_transactions(&self) -> bool {
        !self.is_production() && self.transactions.rollback
    }

    /// Lookup caching is only enabled for development profiles
    pub fn caching_enabled(&self) -> bool {
        self.is_development()
    }

    pub fn max_retry_count(&self) -> u32 {
        self.kind().max_retry_count()
    }

    pub fn default_timeout(&self) -> Duration {
        self.kind().default_timeout()
    }

    /// Log the effective settings with credentials masked
    pub fn log_summary(&self) {
        let kind = self.kind();
        tracing::info!(
            profile = %kind,
            name = %self.environment.name,
            server = %mask_url(&self.connection.server_url),
            database = %mask_connection_string(&self.connection.database_url),
            database_account = %self.connection.database_summary(),
            rollback = self.should_rollback_transactions(),
            caching = self.caching_enabled(),
            max_retries = self.max_retry_count(),
            default_timeout_secs = self.default_timeout().as_secs(),
            "Caseflow configuration loaded"
        );

        if self.connection.password.is_empty() {
            tracing::warn!(username = %self.connection.username, "No platform password configured");
        }
        if kind.is_production() {
            tracing::warn!("Running against PRODUCTION: writes are committed and never rolled back");
        }
    }
}
