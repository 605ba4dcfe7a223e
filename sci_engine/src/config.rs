use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchConfig, SignaturePolicy};
use crate::version::{GameId, SciVersion};

/// Host settings for one game. Loaded from JSON; command-line flags
/// override individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "unknown_game")]
    pub game: GameId,
    pub version: SciVersion,
    /// Must be set explicitly before a dispatcher can be built.
    #[serde(default)]
    pub signature_policy: Option<SignaturePolicy>,
    /// Directory holding vocab.997 / vocab.999 patch files.
    #[serde(default)]
    pub resource_dir: Option<PathBuf>,
    #[serde(default)]
    pub trace_calls: bool,
    /// Kernel functions (or `Prefix*` patterns) whose calls are logged even
    /// without `trace_calls`.
    #[serde(default)]
    pub log_kernels: Vec<String>,
    /// Fixed seed for kRandom; entropy when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn unknown_game() -> GameId {
    GameId::Unknown
}

impl EngineConfig {
    pub fn new(game: GameId, version: SciVersion) -> Self {
        EngineConfig {
            game,
            version,
            signature_policy: None,
            resource_dir: None,
            trace_calls: false,
            log_kernels: Vec::new(),
            random_seed: None,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config json: {}", path.display()))
    }

    pub fn dispatch_config(&self) -> Result<DispatchConfig> {
        let Some(policy) = self.signature_policy else {
            bail!("no signature policy configured (pass --strict or --permissive, or set signature_policy)");
        };
        Ok(DispatchConfig {
            policy,
            trace_calls: self.trace_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_reads_json_with_defaults() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{ "game": "kq5", "version": "sci1_late", "signature_policy": "permissive", "random_seed": 3 }}"#
        )?;

        let config = EngineConfig::from_json_file(file.path())?;
        assert_eq!(config.game, GameId::Kq5);
        assert_eq!(config.version, SciVersion::Sci1Late);
        assert_eq!(config.random_seed, Some(3));
        assert!(config.resource_dir.is_none());
        assert!(config.log_kernels.is_empty());

        let dispatch = config.dispatch_config()?;
        assert_eq!(dispatch.policy, SignaturePolicy::Permissive);
        assert!(!dispatch.trace_calls);
        Ok(())
    }

    #[test]
    fn config_lists_kernels_to_log() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{ "version": "sci0_late", "log_kernels": ["DoSound*", "Wait"] }}"#
        )?;
        let config = EngineConfig::from_json_file(file.path())?;
        assert_eq!(config.game, GameId::Unknown);
        assert_eq!(config.log_kernels, vec!["DoSound*", "Wait"]);
        Ok(())
    }

    #[test]
    fn missing_policy_is_an_error() {
        let config = EngineConfig::new(GameId::Sq3, SciVersion::Sci0Late);
        let err = config.dispatch_config().unwrap_err();
        assert!(err.to_string().contains("signature policy"));
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = EngineConfig::from_json_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
