//! `<data_dir>/config.yaml` (spec §6). Every key is optional; an absent
//! file is equivalent to every key at its default.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: PathBuf, #[source] source: serde_yaml::Error },
    #[error("invalid duration {0:?}: expected a plain integer (seconds) or a suffixed value like \"30s\", \"5m\", \"1h\"")]
    InvalidDuration(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub signer_port: u16,
    pub ipc_path: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub passphrase_timeout: Duration,
    pub store: Option<PathBuf>,
    pub lock_on_disconnect: bool,
    pub require_memory_protection: bool,
    pub txn_auto_approve: bool,
    pub group_auto_approve: bool,
    pub allow_group_modification: bool,
    pub passphrase_command_argv: Option<Vec<String>>,
    /// Not in the distilled config key list; the per-request approval
    /// deadline is tunable per `apsigner_broker::ApprovalPolicy` so it's
    /// exposed here the same way.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signer_port: 8787,
            ipc_path: None,
            passphrase_timeout: Duration::ZERO,
            store: None,
            lock_on_disconnect: false,
            require_memory_protection: false,
            txn_auto_approve: false,
            group_auto_approve: false,
            allow_group_modification: true,
            passphrase_command_argv: None,
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl Config {
    pub fn load(data_dir: &std::path::Path) -> Result<Self, ConfigError> {
        let path = data_dir.join("config.yaml");
        if !path.is_file() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(&path).map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        serde_yaml::from_slice(&bytes).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn approval_policy(&self) -> apsigner_broker::ApprovalPolicy {
        apsigner_broker::ApprovalPolicy {
            txn_auto_approve: self.txn_auto_approve,
            group_auto_approve: self.group_auto_approve,
            allow_group_modification: self.allow_group_modification,
            passphrase_timeout: self.passphrase_timeout,
            lock_on_disconnect: self.lock_on_disconnect,
            request_timeout: self.request_timeout,
        }
    }

    /// Default admin socket path (spec §6: `$XDG_RUNTIME_DIR/aplane.sock`
    /// or fallback) unless overridden by `ipc_path`.
    pub fn resolved_ipc_path(&self, data_dir: &std::path::Path) -> PathBuf {
        if let Some(path) = &self.ipc_path {
            return path.clone();
        }
        if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
            return PathBuf::from(runtime_dir).join("aplane.sock");
        }
        data_dir.join("aplane.sock")
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Parses a plain integer (seconds) or a single suffixed value (`s`, `m`,
/// `h`, `d`). `"0"` / `"0s"` disables whatever timeout it configures.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let (digits, unit_secs) = match raw.chars().last() {
        Some('s') => (&raw[..raw.len() - 1], 1),
        Some('m') => (&raw[..raw.len() - 1], 60),
        Some('h') => (&raw[..raw.len() - 1], 3600),
        Some('d') => (&raw[..raw.len() - 1], 86400),
        _ => (raw, 1),
    };
    let value: u64 = digits.parse().map_err(|_| ConfigError::InvalidDuration(raw.to_string()))?;
    Ok(Duration::from_secs(value * unit_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parses_suffixed_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_disables() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn default_config_matches_approval_policy_default() {
        let policy = Config::default().approval_policy();
        assert_eq!(policy.passphrase_timeout, Duration::ZERO);
        assert!(policy.allow_group_modification);
    }
}
