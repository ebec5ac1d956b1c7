//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON graph files
//! - Validate node names and wiring
//! - Generate `GraphBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("quad.toml")).unwrap();
//! println!("Graph: {} @ {} Hz", blueprint.graph.name, blueprint.graph.tick_rate_hz);
//! ```

mod parser;
mod validator;

pub use contracts::GraphBlueprint;
pub use parser::ConfigFormat;

use contracts::GraphError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<GraphBlueprint, GraphError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<GraphBlueprint, GraphError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Serialize GraphBlueprint to TOML string
    pub fn to_toml(blueprint: &GraphBlueprint) -> Result<String, GraphError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| GraphError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize GraphBlueprint to JSON string
    pub fn to_json(blueprint: &GraphBlueprint) -> Result<String, GraphError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| GraphError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, GraphError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            GraphError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| GraphError::config_parse(format!("unsupported config format: .{ext}")))
    }

    fn read_file(path: &Path) -> Result<String, GraphError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
