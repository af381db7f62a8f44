use std::{fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{color::Color, geometry::Region, ChromaError, Result};

/// Components smaller than or equal to this many pixels are treated as noise.
pub const DEFAULT_MIN_AREA: usize = 10;
pub const DEFAULT_TOLERANCE: u32 = 20;

/// Pixel adjacency used when grouping matched pixels into blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

/// Accepts `4`/`four` and `8`/`eight`.
impl FromStr for Connectivity {
    type Err = ChromaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "4" | "four" => Ok(Connectivity::Four),
            "8" | "eight" => Ok(Connectivity::Eight),
            other => Err(ChromaError::Configuration(format!(
                "connectivity must be 4 or 8, got '{other}'"
            ))),
        }
    }
}

/// Inputs for a single detection cycle, already decoded from the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSettings {
    pub color: Color,
    pub tolerance: u32,
    pub region: Option<Region>,
    pub min_area: usize,
    pub connectivity: Connectivity,
}

impl DetectionSettings {
    pub fn new(color: Color, tolerance: u32) -> Self {
        Self {
            color,
            tolerance,
            region: None,
            min_area: DEFAULT_MIN_AREA,
            connectivity: Connectivity::default(),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub color: Color,
    #[serde(default = "default_tolerance")]
    pub tolerance: u32,
    #[serde(default)]
    pub use_region: bool,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default = "default_min_area")]
    pub min_area: usize,
    #[serde(default)]
    pub connectivity: Connectivity,
}

impl DetectionConfig {
    /// The region only applies when `use_region` is set.
    pub fn settings(&self) -> DetectionSettings {
        DetectionSettings {
            color: self.color,
            tolerance: self.tolerance,
            region: self.region.filter(|_| self.use_region),
            min_area: self.min_area,
            connectivity: self.connectivity,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            color: Color::RED,
            tolerance: DEFAULT_TOLERANCE,
            use_region: false,
            region: None,
            min_area: DEFAULT_MIN_AREA,
            connectivity: Connectivity::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerBackend {
    /// Static frames and a recording pointer; nothing touches the host.
    Mock,
    #[default]
    Desktop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub backend: ControllerBackend,
    #[serde(default = "default_click_settle_ms")]
    pub click_settle_ms: u64,
    /// Read frames from this PNG instead of the screen.
    #[serde(default)]
    pub image: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backend: ControllerBackend::Desktop,
            click_settle_ms: default_click_settle_ms(),
            image: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    #[serde(default = "default_profiles_path")]
    pub profiles_path: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            profiles_path: default_profiles_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChromaConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub ops: OpsConfig,
}

impl ChromaConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            ChromaError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            ChromaError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.detection.min_area == 0 {
            return Err(ChromaError::Configuration(
                "detection.min_area must be greater than zero".into(),
            ));
        }
        if self.detection.use_region {
            match self.detection.region {
                None => {
                    return Err(ChromaError::Configuration(
                        "detection.use_region is set but detection.region is missing".into(),
                    ))
                }
                Some(region) if region.is_degenerate() => {
                    return Err(ChromaError::Configuration(format!(
                        "detection.region {region} must satisfy x1 < x2 and y1 < y2"
                    )))
                }
                Some(_) => {}
            }
        }
        if self.ops.profiles_path.trim().is_empty() {
            return Err(ChromaError::Configuration(
                "ops.profiles_path must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_tolerance() -> u32 {
    DEFAULT_TOLERANCE
}

fn default_min_area() -> usize {
    DEFAULT_MIN_AREA
}

fn default_click_settle_ms() -> u64 {
    20
}

fn default_profiles_path() -> String {
    "color_profiles.json".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_config_from_file() {
        let temp_path = std::env::temp_dir().join("chromaclick-config-test.toml");
        let doc = r##"
[detection]
color = "#00FF7F"
tolerance = 35
use_region = true
region = [0, 0, 800, 600]

[controller]
backend = "mock"

[ops]
log_level = "debug"
"##;
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = ChromaConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.detection.color, Color::new(0, 255, 127));
        assert_eq!(loaded.detection.tolerance, 35);
        assert_eq!(loaded.detection.min_area, DEFAULT_MIN_AREA);
        assert_eq!(loaded.detection.connectivity, Connectivity::Eight);
        assert_eq!(loaded.controller.backend, ControllerBackend::Mock);
        assert_eq!(loaded.controller.click_settle_ms, 20);
        assert_eq!(loaded.ops.profiles_path, "color_profiles.json");
        assert_eq!(
            loaded.detection.settings().region,
            Some(Region::new(0, 0, 800, 600))
        );
        assert!(loaded.validate().is_ok());
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn serialized_config_loads_back() {
        let temp_path = std::env::temp_dir().join("chromaclick-config-roundtrip.toml");
        let mut config = ChromaConfig::default();
        config.detection.region = Some(Region::new(1, 2, 3, 4));
        fs::write(&temp_path, toml::to_string(&config).expect("serialize")).expect("write");
        let loaded = ChromaConfig::from_file(&temp_path).expect("load");
        assert_eq!(loaded.detection.region, config.detection.region);
        assert_eq!(loaded.detection.color, Color::RED);
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn connectivity_is_read_from_config() {
        let doc = r##"
[detection]
color = "#FFFFFF"
connectivity = "four"
"##;
        let config: ChromaConfig = toml::from_str(doc).expect("parse");
        assert_eq!(config.detection.connectivity, Connectivity::Four);
        assert_eq!(config.detection.settings().connectivity, Connectivity::Four);
        assert!(toml::from_str::<ChromaConfig>(
            "[detection]\ncolor = \"#FFFFFF\"\nconnectivity = \"six\"\n"
        )
        .is_err());
    }

    #[test]
    fn parse_connectivity_names() {
        assert_eq!("4".parse::<Connectivity>().unwrap(), Connectivity::Four);
        assert_eq!("Eight".parse::<Connectivity>().unwrap(), Connectivity::Eight);
        assert!("6".parse::<Connectivity>().is_err());
    }

    #[test]
    fn region_ignored_unless_enabled() {
        let detection = DetectionConfig {
            region: Some(Region::new(0, 0, 10, 10)),
            ..Default::default()
        };
        assert_eq!(detection.settings().region, None);
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = ChromaConfig::from_file("/nonexistent/chromaclick.toml").unwrap_err();
        assert!(matches!(err, ChromaError::Configuration(_)));
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = ChromaConfig::default();
        assert!(config.validate().is_ok());

        config.detection.min_area = 0;
        assert!(config.validate().is_err());
        config.detection.min_area = 10;

        config.detection.use_region = true;
        assert!(config.validate().is_err());
        config.detection.region = Some(Region::new(50, 0, 50, 10));
        assert!(config.validate().is_err());
        config.detection.region = Some(Region::new(0, 0, 50, 10));
        assert!(config.validate().is_ok());

        config.ops.profiles_path = " ".into();
        assert!(config.validate().is_err());
    }
}
