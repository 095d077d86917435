//! Run configuration: [`RunOptions`], its [`Mode`], and the
//! observability/behavior knobs `run()` recognizes.
//!
//! Buildable programmatically (the common path); with the `env-config`
//! feature, also loadable from environment variables via `figment`'s `Env`
//! provider — here `Env`-only, since the core has no on-disk config
//! surface of its own.

use serde::{Deserialize, Serialize};

/// Initialization strategy for non-root resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Sequential,
    Parallel,
    Test,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Sequential
    }
}

/// Log verbosity knobs for the `logs` section of [`RunOptions`]. The core
/// never installs a subscriber itself; these are forwarded to the
/// caller's own `tracing` setup rather than interpreted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogOptions {
    pub print_threshold: Option<String>,
    pub print_strategy: Option<String>,
    #[serde(default)]
    pub buffer_logs: bool,
}

/// Runtime behavior toggles: event-cycle detection and dispose-ordering
/// strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default = "default_true")]
    pub runtime_event_cycle_detection: bool,
    #[serde(default = "default_true")]
    pub prefer_init_order_fast_path: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            runtime_event_cycle_detection: true,
            prefer_init_order_fast_path: true,
        }
    }
}

/// Options accepted by [`crate::orchestrator::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub logs: LogOptions,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub parallel_startup_only: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            logs: LogOptions::default(),
            debug: DebugConfig::default(),
            parallel_startup_only: false,
        }
    }
}

#[cfg(feature = "env-config")]
impl RunOptions {
    /// Layer `RUNNER_CORE_`-prefixed environment variables over the
    /// programmatic defaults.
    ///
    /// # Errors
    /// Returns [`crate::errors::CoreError::ValidationFailed`] if figment
    /// cannot extract a [`RunOptions`] from the environment.
    pub fn from_env() -> Result<Self, crate::errors::CoreError> {
        use figment::providers::{Env, Serialized};
        figment::Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("RUNNER_CORE_").split("__"))
            .extract()
            .map_err(|e| crate::errors::CoreError::ValidationFailed {
                owner_id: "RunOptions".to_string(),
                message: e.to_string(),
            })
    }
}
