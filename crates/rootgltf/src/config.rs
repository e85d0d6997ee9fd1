//! TOML conversion configs.
//!
//! ```toml
//! input = "lhcb.json"
//! output = "lhcb.gltf"
//! hide = ["Pipe", { pattern = "^Magnet.*Yoke$" }]
//!
//! [[subpart]]
//! menu = "VP > Modules"
//! paths = ["VPLeft", { pattern = "Module[0-9]+" }]
//! visible = 0.5
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::convert::{
    BuildOptions, ConvertRequest, DEFAULT_FACES_PER_CIRCLE, DEFAULT_MAX_DEPTH, DEFAULT_OBJECT,
};
use crate::error::ConfigError;
use crate::matcher::MatchList;
use crate::subpart::SubpartSpec;

fn default_object() -> String {
    DEFAULT_OBJECT.to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_faces_per_circle() -> u32 {
    DEFAULT_FACES_PER_CIRCLE
}

/// A conversion described in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionConfig {
    /// Geometry dump to read.
    pub input: String,
    /// Output file name.
    pub output: String,
    /// Object inside the input.
    #[serde(default = "default_object")]
    pub object: String,
    /// Placements at this depth or deeper are dropped.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Segments of a full circle.
    #[serde(default = "default_faces_per_circle")]
    pub faces_per_circle: u32,
    /// Placements dropped before any subpart is built.
    #[serde(default)]
    pub hide: MatchList,
    /// Builder settings.
    #[serde(default)]
    pub build: BuildOptions,
    /// Subparts, in menu order.
    #[serde(default, rename = "subpart")]
    pub subparts: Vec<SubpartSpec>,
}

impl ConversionConfig {
    /// Parse and validate a config.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ConversionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Check what the format alone does not enforce. Patterns and opacities
    /// are already checked while parsing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.faces_per_circle < 3 {
            return Err(ConfigError::FacesPerCircle(self.faces_per_circle));
        }
        if self.subparts.is_empty() {
            return Err(ConfigError::NoSubparts);
        }
        let mut seen = HashSet::new();
        for subpart in &self.subparts {
            let name = subpart.menu.to_string();
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateSubpart(name));
            }
        }
        Ok(())
    }

    /// Validate and turn into a pipeline request.
    pub fn into_request(self) -> Result<ConvertRequest, ConfigError> {
        self.validate()?;
        Ok(ConvertRequest {
            input: self.input,
            output: self.output,
            object: self.object,
            max_depth: self.max_depth,
            faces_per_circle: self.faces_per_circle,
            hide: self.hide,
            subparts: self.subparts,
            build: self.build,
        })
    }
}
