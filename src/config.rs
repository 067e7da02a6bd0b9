//! Configuration for the relay and the command-line client
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields take the defaults below. Command-line flags and `INKLESS_*`
//! environment variables override file values in the binaries.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::{FingerprintAlgorithm, SchemePreference};
use crate::error::{InklessError, Result};

/// Name of the per-user state directory under `$HOME`
pub const STATE_DIR_NAME: &str = ".inkless";

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .map_err(|e| InklessError::Config(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map_err(|e| InklessError::Config(format!("{}: {}", path.display(), e)))
}

/// Relay server settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Authority the relay writes to the ledger as
    pub authority: String,
    /// Simulated ledger confirmation latency, in milliseconds
    pub confirmation_delay_ms: u64,
    /// How long to wait for a confirmation before answering `pending`
    pub confirmation_timeout_ms: u64,
    /// Interval between confirmation polls
    pub poll_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            host: "0.0.0.0".to_string(),
            port: 8765,
            authority: "inkless-relay".to_string(),
            confirmation_delay_ms: 0,
            confirmation_timeout_ms: 30_000,
            poll_interval_ms: 250,
        }
    }
}

impl RelayConfig {
    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: RelayConfig = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.authority.trim().is_empty() {
            return Err(InklessError::Config("authority must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(InklessError::Config("poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Simulated ledger confirmation latency
    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }

    /// Bound on waiting for a confirmation
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    /// Interval between confirmation polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Command-line client settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay WebSocket URL
    pub relay_url: String,
    /// Per-request timeout, in milliseconds
    pub request_timeout_ms: u64,
    /// Fingerprint algorithm
    pub fingerprint_algorithm: FingerprintAlgorithm,
    /// Which signature schemes to accept
    pub scheme_preference: SchemePreference,
    /// State directory; `~/.inkless` when unset
    pub state_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            relay_url: "ws://127.0.0.1:8765".to_string(),
            request_timeout_ms: 30_000,
            fingerprint_algorithm: FingerprintAlgorithm::default(),
            scheme_preference: SchemePreference::default(),
            state_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }

    /// Load `config.json` from the state directory if present, defaults otherwise
    pub fn load_or_default(state_dir: Option<&Path>) -> Result<Self> {
        let dir = match state_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_state_dir()?,
        };
        let path = dir.join("config.json");
        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            ClientConfig::default()
        };
        if config.state_dir.is_none() {
            config.state_dir = Some(dir);
        }
        Ok(config)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// State directory
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_state_dir(),
        }
    }

    /// Where `keygen` stores the signing key
    pub fn key_path(&self) -> Result<PathBuf> {
        Ok(self.state_dir()?.join("signing.key"))
    }

    /// Where offline signatures are queued
    pub fn queue_path(&self) -> Result<PathBuf> {
        Ok(self.state_dir()?.join("offline_queue.json"))
    }
}

/// `~/.inkless`
pub fn default_state_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(STATE_DIR_NAME))
        .ok_or_else(|| InklessError::Config("could not find home directory".to_string()))
}
