//! Configuration for a paygate deployment.
//!
//! Everything the core consumes but does not own: the fee, session TTLs,
//! stage timeouts, informational key-server endpoints and where the
//! ledger lives. Every field has a default, so an empty file is a valid
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use paygate_core::Amount;
use paygate_ledger::GateConfig;
use paygate_pipeline::PipelineConfig;
use paygate_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PaygateError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaygateConfig {
    /// Fixed fee, in the smallest unit.
    #[serde(default = "default_fee")]
    pub fee: u64,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Decryption service endpoints, for deployments that plug in an
    /// external [`DecryptionService`](paygate_pipeline::DecryptionService).
    ///
    /// Informational only: the in-process key server built by
    /// [`Paygate`](crate::Paygate) does not read it, and it is logged at
    /// startup so operators can see which endpoints a deployment expects.
    #[serde(default)]
    pub key_servers: Vec<String>,

    #[serde(default)]
    pub ledger: LedgerSection,
}

/// Session credential lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u32,

    #[serde(default = "default_max_ttl_minutes")]
    pub max_ttl_minutes: u32,
}

/// Stage timeouts and key-release retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default = "default_authorize_timeout_ms")]
    pub authorize_timeout_ms: u64,

    #[serde(default = "default_release_timeout_ms")]
    pub release_timeout_ms: u64,

    #[serde(default = "default_release_retries")]
    pub release_retries: u32,

    #[serde(default = "default_release_retry_delay_ms")]
    pub release_retry_delay_ms: u64,
}

/// Ledger location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSection {
    /// SQLite database file. In-memory when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_fee() -> u64 {
    paygate_ledger::gate::DEFAULT_FEE.units()
}

fn default_ttl_minutes() -> u32 {
    10
}

fn default_max_ttl_minutes() -> u32 {
    30
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_authorize_timeout_ms() -> u64 {
    120_000
}

fn default_release_timeout_ms() -> u64 {
    30_000
}

fn default_release_retries() -> u32 {
    2
}

fn default_release_retry_delay_ms() -> u64 {
    500
}

impl Default for PaygateConfig {
    fn default() -> Self {
        Self {
            fee: default_fee(),
            session: SessionSection::default(),
            pipeline: PipelineSection::default(),
            key_servers: Vec::new(),
            ledger: LedgerSection::default(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            max_ttl_minutes: default_max_ttl_minutes(),
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
            authorize_timeout_ms: default_authorize_timeout_ms(),
            release_timeout_ms: default_release_timeout_ms(),
            release_retries: default_release_retries(),
            release_retry_delay_ms: default_release_retry_delay_ms(),
        }
    }
}

impl PaygateConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PaygateError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PaygateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.fee == 0 {
            return Err(PaygateError::Config("fee must be positive".into()));
        }
        if self.session.ttl_minutes == 0 {
            return Err(PaygateError::Config("session ttl must be positive".into()));
        }
        if self.session.ttl_minutes > self.session.max_ttl_minutes {
            return Err(PaygateError::Config(format!(
                "session ttl {}m exceeds max {}m",
                self.session.ttl_minutes, self.session.max_ttl_minutes
            )));
        }
        let p = &self.pipeline;
        for (name, value) in [
            ("fetch_timeout_ms", p.fetch_timeout_ms),
            ("authorize_timeout_ms", p.authorize_timeout_ms),
            ("release_timeout_ms", p.release_timeout_ms),
        ] {
            if value == 0 {
                return Err(PaygateError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            fee: Amount(self.fee),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ttl_minutes: self.session.ttl_minutes,
            max_ttl_minutes: self.session.max_ttl_minutes,
            ..SessionConfig::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            fetch_timeout: Duration::from_millis(p.fetch_timeout_ms),
            authorize_timeout: Duration::from_millis(p.authorize_timeout_ms),
            release_timeout: Duration::from_millis(p.release_timeout_ms),
            release_retries: p.release_retries,
            release_retry_delay: Duration::from_millis(p.release_retry_delay_ms),
        }
    }
}
