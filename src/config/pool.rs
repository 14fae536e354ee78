//! Pool and pipeline configuration structures.

use serde::{Deserialize, Serialize};

use crate::minify::MinifyOptions;

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum worker threads alive at once. Workers are spawned lazily;
    /// demand beyond this queues instead of spawning.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl PoolConfig {
    /// Create a configuration sized to the host's parallelism.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }

    /// Set the worker capacity.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".into());
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Root configuration for the file-granular minification pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker pool sizing.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Batch admission limit as a multiple of host parallelism. Jobs are
    /// I/O-bound, so oversubscribing the core count is acceptable.
    #[serde(default = "default_batch_multiplier")]
    pub batch_multiplier: usize,
    /// Minifier behavior.
    #[serde(default)]
    pub minify: MinifyOptions,
}

impl PipelineConfig {
    /// Create a configuration with default sizing and minifier options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: PoolConfig::new(),
            batch_multiplier: default_batch_multiplier(),
            minify: MinifyOptions::default(),
        }
    }

    /// Concurrency limit handed to the batch admission controller.
    #[must_use]
    pub fn batch_limit(&self) -> usize {
        host_parallelism() * self.batch_multiplier.max(1)
    }

    /// Validate all sections.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate()?;
        if self.batch_multiplier == 0 {
            return Err("batch_multiplier must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse pipeline configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message for parse failures or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn host_parallelism() -> usize {
    num_cpus::get().max(1)
}

fn default_max_workers() -> usize {
    host_parallelism()
}

const fn default_batch_multiplier() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_invalid() {
        let cfg = PoolConfig::new().with_max_workers(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_validate() {
        PipelineConfig::new().validate().unwrap();
        assert!(PipelineConfig::new().batch_limit() >= 4);
    }

    #[test]
    fn from_json_round_trip() {
        let cfg = PipelineConfig::from_json_str(
            r#"{
                "pool": { "max_workers": 2 },
                "batch_multiplier": 1,
                "minify": { "remove_comments": false, "collapse_whitespace": true }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.pool.max_workers, 2);
        assert_eq!(cfg.batch_multiplier, 1);
        assert!(!cfg.minify.remove_comments);
    }

    #[test]
    fn from_json_rejects_invalid() {
        let err = PipelineConfig::from_json_str(r#"{ "pool": { "max_workers": 0 } }"#)
            .unwrap_err();
        assert!(err.contains("max_workers"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg = PipelineConfig::from_json_str("{}").unwrap();
        assert!(cfg.pool.max_workers >= 1);
        assert_eq!(cfg.batch_multiplier, 4);
        assert!(cfg.minify.remove_comments);
    }
}
