//! Cache configuration and config-file locations
//!
//! `CacheConfig` is plain serde JSON. Defaults: prefetch radius 30, safe
//! radius 20, full-resolution float RGBA.
//!
//! Config directory priority:
//! 1. CLI `--config-dir`
//! 2. `SEQCACHE_CONFIG_DIR` environment variable
//! 3. Local folder IF `seqcache.json` exists there
//! 4. Platform config directory from dirs-next

use anyhow::{Context, Result, bail};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::catalog::HeaderPolicy;
use crate::entities::DecodeParams;

/// Default config file name
pub const CONFIG_FILE: &str = "seqcache.json";

/// Environment override for the config directory
pub const CONFIG_DIR_ENV: &str = "SEQCACHE_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Half-width of the window loaded in the background
    pub prefetch_radius: usize,
    /// Half-width of the window that never triggers a reload (<= prefetch_radius)
    pub safe_radius: usize,
    /// Decode parameters used for every store key
    pub decode: DecodeParams,
    /// Maximum resident images in the store
    pub max_entries: usize,
    /// Fraction of available memory the store may use
    pub mem_fraction: f64,
    /// Memory left to the system (GB)
    pub reserve_gb: f64,
    /// Worker threads (0 = 75% of CPU cores)
    pub workers: usize,
    /// Unreadable headers in set_sequence: fail the call or skip the frame
    pub header_policy: HeaderPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefetch_radius: 30,
            safe_radius: 20,
            decode: DecodeParams::default(),
            max_entries: 1024,
            mem_fraction: 0.5,
            reserve_gb: 2.0,
            workers: 0,
            header_policy: HeaderPolicy::Fail,
        }
    }
}

impl CacheConfig {
    /// Load from JSON; missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        info!("Loaded config: {}", path.display());
        Ok(config)
    }

    /// Load if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.safe_radius > self.prefetch_radius {
            bail!(
                "safe_radius ({}) must not exceed prefetch_radius ({})",
                self.safe_radius,
                self.prefetch_radius
            );
        }
        if self.decode.downscale == 0 {
            bail!("decode.downscale must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.mem_fraction) {
            bail!("mem_fraction must be within 0.0..=1.0, got {}", self.mem_fraction);
        }
        if self.max_entries == 0 {
            bail!("max_entries must be >= 1");
        }
        Ok(())
    }

    /// Same config with safe_radius clamped to prefetch_radius
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if config.safe_radius > config.prefetch_radius {
            warn!(
                "safe_radius {} > prefetch_radius {}, clamping",
                config.safe_radius, config.prefetch_radius
            );
            config.safe_radius = config.prefetch_radius;
        }
        config.decode.downscale = config.decode.downscale.max(1);
        config
    }

    /// Effective worker thread count
    pub fn worker_threads(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            (num_cpus::get() * 3 / 4).max(1)
        }
    }
}

/// Overrides for default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }

    pub fn config_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }

        if let Some(current_dir) = std::env::current_dir()
            .ok()
            .filter(|dir| dir.join(CONFIG_FILE).exists())
        {
            return current_dir;
        }

        if let Some(dir) = dirs_next::config_dir() {
            return dir.join("seqcache");
        }

        PathBuf::from(".")
    }

    /// Path of a file inside the config directory
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir().join(name)
    }

    /// Create the config directory if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        let dir = self.config_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        Ok(())
    }
}
