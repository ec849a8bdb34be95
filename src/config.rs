//! Configuration file support for the registration tools.
//!
//! Settings are read from TOML. Every section and field has a default, so an
//! empty file (or no file) is a valid configuration. `ZKREG_CHAIN_ID` and
//! `ZKREG_REGISTRY_PATH` override the file.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::proof::ProofBackend;

/// Avalanche Fuji.
const DEFAULT_CHAIN_ID: u64 = 43113;
const DEFAULT_PROVER_TIMEOUT_SECS: u64 = 120;
const DEFAULT_VERIFIER_TIMEOUT_SECS: u64 = 30;

pub const CHAIN_ID_ENV: &str = "ZKREG_CHAIN_ID";
pub const REGISTRY_PATH_ENV: &str = "ZKREG_REGISTRY_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub proof: ProofConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProverConfig {
    #[serde(default = "default_prover_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_verifier_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_verification_key")]
    pub verification_key: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofConfig {
    #[serde(default)]
    pub backend: ProofBackend,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_CHAIN_ID,
        }
    }
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_PROVER_TIMEOUT_SECS,
        }
    }
}

impl ProverConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_VERIFIER_TIMEOUT_SECS,
            verification_key: default_verification_key(),
        }
    }
}

impl VerifierConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_prover_timeout_secs() -> u64 {
    DEFAULT_PROVER_TIMEOUT_SECS
}

fn default_verifier_timeout_secs() -> u64 {
    DEFAULT_VERIFIER_TIMEOUT_SECS
}

fn default_verification_key() -> PathBuf {
    PathBuf::from("verification_key.json")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("registry.json")
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_from_file_or_default(path: &Path) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Applies `ZKREG_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(CHAIN_ID_ENV).ok(),
            std::env::var(REGISTRY_PATH_ENV).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        chain_id: Option<String>,
        registry_path: Option<String>,
    ) -> Result<()> {
        if let Some(raw) = chain_id {
            self.chain.id = raw
                .trim()
                .parse()
                .with_context(|| format!("{CHAIN_ID_ENV} must be an unsigned integer, got '{raw}'"))?;
            debug!("Chain id overridden to {}", self.chain.id);
        }
        if let Some(path) = registry_path {
            self.registry.path = PathBuf::from(path);
            debug!("Registry path overridden to {}", self.registry.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chain.id, DEFAULT_CHAIN_ID);
        assert_eq!(config.prover.timeout(), Duration::from_secs(120));
        assert_eq!(config.verifier.timeout_secs, DEFAULT_VERIFIER_TIMEOUT_SECS);
        assert_eq!(config.registry.path, PathBuf::from("registry.json"));
        assert_eq!(config.proof.backend, ProofBackend::Snarkjs);
    }

    #[test]
    fn test_serialize_deserialize_config() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.chain.id, deserialized.chain.id);
        assert_eq!(
            config.verifier.verification_key,
            deserialized.verifier.verification_key
        );
    }

    #[test]
    fn test_custom_config() {
        let config_toml = r#"
            [chain]
            id = 1

            [verifier]
            timeout_secs = 5

            [proof]
            backend = "gnark"
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.chain.id, 1);
        assert_eq!(config.verifier.timeout_secs, 5);
        assert_eq!(
            config.verifier.verification_key,
            PathBuf::from("verification_key.json")
        );
        assert_eq!(config.proof.backend, ProofBackend::Gnark);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(Some("2".into()), Some("/tmp/reg.json".into()))
            .unwrap();
        assert_eq!(config.chain.id, 2);
        assert_eq!(config.registry.path, PathBuf::from("/tmp/reg.json"));

        assert!(config.apply_overrides(Some("fuji".into()), None).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("zkreg.toml");
        let mut config = Config::default();
        config.chain.id = 99;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.chain.id, 99);
        assert_eq!(
            Config::load_from_file_or_default(&dir.path().join("missing.toml")).chain.id,
            DEFAULT_CHAIN_ID
        );
    }
}
