//! # Render Configuration
//!
//! Tunables for the render core plus a small file-backed configuration trait.
//!
//! [`RenderConfig`] is the one type loaded through [`Config`]: the transparent
//! depth tie tolerance, the batch size (which also sizes the sprite batch
//! buffer), whether same-material sprites are merged into one draw, sorter
//! pre-allocation, contract strictness, mesh search paths and the periodic
//! stats dump.
//!
//! ## Formats
//!
//! - **TOML**: selected by the `.toml` extension
//! - **RON**: selected by the `.ron` extension
//!
//! Every field of [`RenderConfig`] has a default, so partial files are valid.

pub use serde::{Deserialize, Serialize};

/// File-backed settings, format picked from the extension
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # Render Manager Configuration
///
/// Sorting, batching and diagnostics settings consumed by
/// [`RenderManager`](crate::render_manager::RenderManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Two transparent depths closer than this are treated as equal
    pub depth_tolerance: f32,

    /// Maximum number of draws grouped into one batch
    pub max_batch_size: usize,

    /// Merge runs of same-material opaque sprites into one draw
    pub sprite_batching: bool,

    /// Pre-allocated capacity of each sorter
    pub initial_capacity: usize,

    /// Whether contract violations panic. `None` picks strict mode in debug builds.
    pub strict_contracts: Option<bool>,

    /// Directories searched by [`FileMeshSource`](crate::assets::FileMeshSource)
    pub mesh_search_paths: Vec<String>,

    /// Dump debug stats every N rendered frames
    pub stats_log_interval: Option<u32>,
}

impl RenderConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            depth_tolerance: 1.0e-4,
            max_batch_size: 128,
            sprite_batching: true,
            initial_capacity: 256,
            strict_contracts: None,
            mesh_search_paths: vec!["assets/meshes".to_string(), ".".to_string()],
            stats_log_interval: None,
        }
    }

    /// Set the transparent depth tie tolerance
    pub fn with_depth_tolerance(mut self, tolerance: f32) -> Self {
        self.depth_tolerance = tolerance;
        self
    }

    /// Set the maximum batch size
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Enable or disable sprite batching
    pub fn with_sprite_batching(mut self, enabled: bool) -> Self {
        self.sprite_batching = enabled;
        self
    }

    /// Set the sorter pre-allocation
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Force strict (panicking) or lenient contract checks
    pub fn with_strict_contracts(mut self, strict: bool) -> Self {
        self.strict_contracts = Some(strict);
        self
    }

    /// Replace the mesh search paths
    pub fn with_mesh_search_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mesh_search_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Log debug stats every `frames` frames
    pub fn with_stats_log_interval(mut self, frames: u32) -> Self {
        self.stats_log_interval = Some(frames);
        self
    }

    /// Resolve the effective strictness for this build
    pub fn contracts_are_strict(&self) -> bool {
        self.strict_contracts.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.depth_tolerance.is_finite() || self.depth_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "depth_tolerance must be finite and non-negative, got {}",
                self.depth_tolerance
            )));
        }

        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be at least 1".to_string()));
        }

        if self.mesh_search_paths.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid("mesh search paths cannot be empty strings".to_string()));
        }

        if self.stats_log_interval == Some(0) {
            return Err(ConfigError::Invalid("stats_log_interval must be at least 1".to_string()));
        }

        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RenderConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("bane_render_{}_{}", std::process::id(), name));
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_batch_size, 128);
        assert!(config.sprite_batching);
        assert_eq!(config.contracts_are_strict(), cfg!(debug_assertions));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(RenderConfig::new().with_max_batch_size(0).validate().is_err());
        assert!(RenderConfig::new().with_depth_tolerance(-1.0).validate().is_err());
        assert!(RenderConfig::new().with_depth_tolerance(f32::NAN).validate().is_err());
        assert!(RenderConfig::new().with_stats_log_interval(0).validate().is_err());
        assert!(RenderConfig::new().with_mesh_search_paths([""]).validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let path = temp_path("render.toml");
        let config = RenderConfig::new()
            .with_max_batch_size(16)
            .with_sprite_batching(false)
            .with_strict_contracts(false)
            .with_mesh_search_paths(["meshes"]);

        config.save_to_file(&path).unwrap();
        let loaded = RenderConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_roundtrip() {
        let path = temp_path("render.ron");
        let config = RenderConfig::new().with_depth_tolerance(0.01).with_stats_log_interval(60);

        config.save_to_file(&path).unwrap();
        let loaded = RenderConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RenderConfig = toml::from_str("max_batch_size = 8").unwrap();
        assert_eq!(config.max_batch_size, 8);
        assert_eq!(config.initial_capacity, RenderConfig::default().initial_capacity);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = RenderConfig::default().save_to_file("render.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
