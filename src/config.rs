//! Pipeline configuration loaded from YAML.
//!
//! Every field has a default, so an empty or partial file is valid. Unknown
//! top level keys are kept in `extra` and otherwise ignored.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::*;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Keeyask / Gillam reservoir area, lon/lat.
pub const DEFAULT_AOI: [[f64; 2]; 5] = [
    [-94.799, 56.32],
    [-94.799, 56.05],
    [-94.30, 56.05],
    [-94.30, 56.32],
    [-94.799, 56.32],
];

const LANDSAT_SCENES: [&str; 6] = [
    "LC08_L2SP_034020_20160711_20200905_02_T1",
    "LC08_L2SP_034020_20170730_20200902_02_T1",
    "LC08_L2SP_034020_20180816_20200822_02_T1",
    "LC08_L2SP_034020_20190719_20200820_02_T1",
    "LC08_L2SP_034020_20200705_20200912_02_T1",
    "LC08_L2SP_034020_20210724_20220128_02_T1",
];

const SENTINEL_SCENES: [&str; 6] = [
    "S2A_MSIL2A_20160720T165911_N0204_R112_T15XVS",
    "S2A_MSIL2A_20170809T165921_N0205_R112_T15XVS",
    "S2A_MSIL2A_20180818T165921_N0208_R112_T15XVS",
    "S2B_MSIL2A_20190722T165919_N0213_R112_T15XVS",
    "S2A_MSIL2A_20200802T165901_N0214_R112_T15XVS",
    "S2B_MSIL2A_20210725T165919_N0301_R112_T15XVS",
];

const LANDSAT_URL_TEMPLATE: &str = "https://landsatlook.usgs.gov/data/collection02/level-2/standard/oli-tirs/{year}/{path}/{row}/{scene}/{scene}_{band}.TIF";
const SENTINEL_URL_TEMPLATE: &str = "https://sentinel-cogs.s3.us-west-2.amazonaws.com/sentinel-s2-l2a-cogs/{utm_zone}/{lat_band}/{grid_square}/{year}/{month}/{mission}_{tile}_{date}_0_L2A/{band}.tif";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("invalid YAML in {0}: {1}")]
    Yaml(PathBuf, serde_yaml::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    Landsat,
    Sentinel,
}

impl Sensor {
    pub const ALL: [Sensor; 2] = [Sensor::Landsat, Sensor::Sentinel];
}

impl Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensor::Landsat => write!(f, "landsat"),
            Sensor::Sentinel => write!(f, "sentinel"),
        }
    }
}

/// Per-sensor acquisition and clipping settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub raw_dir: PathBuf,
    pub scenes: Vec<String>,
    /// Band names substituted into `url_template`.
    pub bands: Vec<String>,
    pub url_template: String,
    /// Wildcard file name patterns picked up by the clip batch.
    pub clip_patterns: Vec<String>,
    /// Dataset name passed to the bulk download tool.
    pub dataset: Option<String>,
    pub credentials: CredentialSpec,
    /// Whether direct HTTP downloads send credentials. Public buckets
    /// reject an unexpected `Authorization` header.
    pub auth: bool,
}

impl SensorConfig {
    pub fn landsat() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw/landsat"),
            scenes: LANDSAT_SCENES.iter().map(|s| s.to_string()).collect(),
            bands: vec!["SR_B3".into(), "SR_B5".into(), "QA_PIXEL".into()],
            url_template: LANDSAT_URL_TEMPLATE.to_string(),
            clip_patterns: vec![
                "*B3*.TIF".into(),
                "*B5*.TIF".into(),
                "*QA_PIXEL*.TIF".into(),
                "*DSWE*.TIF".into(),
            ],
            dataset: Some("landsat_ot_c2_l2".into()),
            credentials: CredentialSpec::usgs(),
            auth: true,
        }
    }

    pub fn sentinel() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw/sentinel"),
            scenes: SENTINEL_SCENES.iter().map(|s| s.to_string()).collect(),
            bands: vec!["B03".into(), "B08".into()],
            url_template: SENTINEL_URL_TEMPLATE.to_string(),
            clip_patterns: vec!["*B03*.tif".into(), "*B08*.tif".into()],
            dataset: None,
            credentials: CredentialSpec::copernicus(),
            auth: false,
        }
    }
}

/// Partial sensor sections override the given defaults key by key.
fn overlay<'de, D: Deserializer<'de>>(
    base: SensorConfig,
    deserializer: D,
) -> Result<SensorConfig, D::Error> {
    let overrides = Mapping::deserialize(deserializer)?;
    let mut merged = serde_yaml::to_value(base).map_err(D::Error::custom)?;
    if let Value::Mapping(fields) = &mut merged {
        fields.extend(overrides);
    }
    serde_yaml::from_value(merged).map_err(D::Error::custom)
}

fn landsat_section<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SensorConfig, D::Error> {
    overlay(SensorConfig::landsat(), deserializer)
}

fn sentinel_section<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SensorConfig, D::Error> {
    overlay(SensorConfig::sentinel(), deserializer)
}

/// Where a pair of credentials comes from, and how to ask for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialSpec {
    pub username_key: String,
    pub password_key: String,
    /// Shown when prompting.
    pub service: String,
}

impl CredentialSpec {
    pub fn usgs() -> Self {
        Self {
            username_key: "USGS_USERNAME".into(),
            password_key: "USGS_PASSWORD".into(),
            service: "USGS EarthExplorer".into(),
        }
    }

    pub fn copernicus() -> Self {
        Self {
            username_key: "COPERNICUS_USERNAME".into(),
            password_key: "COPERNICUS_PASSWORD".into(),
            service: "Copernicus".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// AOI ring in WGS84 lon/lat.
    pub aoi: Vec<[f64; 2]>,
    pub clipped_dir: PathBuf,
    #[serde(deserialize_with = "landsat_section")]
    pub landsat: SensorConfig,
    #[serde(deserialize_with = "sentinel_section")]
    pub sentinel: SensorConfig,
    /// Program run by the `cli` acquisition method.
    pub download_command: String,
    pub http_timeout_secs: Option<u64>,
    /// YAML file of secrets consulted before prompting.
    pub secrets_file: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aoi: DEFAULT_AOI.to_vec(),
            clipped_dir: PathBuf::from("data/processed/clipped"),
            landsat: SensorConfig::landsat(),
            sentinel: SensorConfig::sentinel(),
            download_command: "usgsm2m".into(),
            http_timeout_secs: None,
            secrets_file: None,
            extra: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str::<Option<Self>>(text)
            .map(Option::unwrap_or_default)
            .map_err(|e| ConfigError::Yaml(origin.to_path_buf(), e))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config = Self::from_yaml(&text, path)?;
        if !config.extra.is_empty() {
            debug!(
                "Ignoring config keys: {:?}",
                config.extra.keys().collect::<Vec<_>>()
            );
        }
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            info!("Loading config from {}", path.display());
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn sensor(&self, sensor: Sensor) -> &SensorConfig {
        match sensor {
            Sensor::Landsat => &self.landsat,
            Sensor::Sentinel => &self.sentinel,
        }
    }

    /// `clipped_dir/<sensor>`
    pub fn clipped_dir_for(&self, sensor: Sensor) -> PathBuf {
        self.clipped_dir.join(sensor.to_string())
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.aoi.len(), 5);
        assert_eq!(config.landsat.scenes.len(), 6);
        assert_eq!(config.sentinel.scenes[0], "S2A_MSIL2A_20160720T165911_N0204_R112_T15XVS");
        assert_eq!(config.landsat.dataset.as_deref(), Some("landsat_ot_c2_l2"));
        assert_eq!(config.sentinel.credentials.username_key, "COPERNICUS_USERNAME");
        assert!(config.landsat.auth);
        assert!(!config.sentinel.auth);
        assert_eq!(
            config.clipped_dir_for(Sensor::Sentinel),
            PathBuf::from("data/processed/clipped/sentinel")
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults_and_extra() {
        let yaml = r#"
clipped_dir: out/clipped
http_timeout_secs: 30
sentinel:
  scenes: [S2B_MSIL2A_20210725T165919_N0301_R112_T15XVS]
  auth: true
project: keeyask
"#;
        let config = PipelineConfig::from_yaml(yaml, Path::new("test.yaml")).unwrap();
        assert_eq!(config.clipped_dir, PathBuf::from("out/clipped"));
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.sentinel.scenes.len(), 1);
        assert_eq!(config.sentinel.raw_dir, PathBuf::from("data/raw/sentinel"));
        assert_eq!(config.sentinel.bands, vec!["B03", "B08"]);
        assert!(config.sentinel.auth);
        assert_eq!(config.landsat, SensorConfig::landsat());
        assert_eq!(
            config.extra.get("project"),
            Some(&Value::String("keeyask".into()))
        );
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = PipelineConfig::from_yaml("", Path::new("empty.yaml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_missing_file_is_default_but_bad_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.yaml");
        assert_eq!(
            PipelineConfig::load_or_default(&missing).unwrap(),
            PipelineConfig::default()
        );

        fs::write(&missing, "aoi: [1, 2").unwrap();
        assert!(matches!(
            PipelineConfig::load_or_default(&missing),
            Err(ConfigError::Yaml(..))
        ));
    }
}
