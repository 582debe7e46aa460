use serde::{Deserialize, Serialize};

use crate::analyzers::hab::HabThresholds;
use crate::analyzers::impute::ClimatologyJoin;
use crate::analyzers::under_detect::DEFAULT_UNDER_DETECT;
use crate::error::ConfigurationError;
use crate::geo::BoundingBox;
use crate::product::decoder::BINNED_GROUP;
use crate::product::{DEFAULT_BASE_URL, ProductSelector};

/// Settings shared by every pipeline stage, handed to each at construction.
///
/// Stored as a JSON object on disk; every field is optional:
/// ```json
/// {
///   "product": { "instrument": "OLCI", "resolution": "DAY", "suffix": "CYAN" },
///   "region": { "lat_min": 43.05, "lat_max": 43.16, "lon_min": -89.48, "lon_max": -89.35 },
///   "under_detect_floor": 0.00005
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub product: ProductSelector,
    pub base_url: String,
    pub group: String,
    pub region: Option<BoundingBox>,
    pub hab: HabThresholds,
    /// Value substituted for missing readings; `None` disables substitution.
    pub under_detect_floor: Option<f64>,
    pub climatology_join: ClimatologyJoin,
    pub forecast_weeks: usize,
    pub season_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            product: ProductSelector::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            group: BINNED_GROUP.to_string(),
            region: None,
            hab: HabThresholds::default(),
            under_detect_floor: Some(DEFAULT_UNDER_DETECT),
            climatology_join: ClimatologyJoin::default(),
            forecast_weeks: 12,
            season_length: 52,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.hab.medium < self.hab.high) {
            return Err(ConfigurationError::Invalid(format!(
                "HAB medium threshold {} must be below high threshold {}",
                self.hab.medium, self.hab.high
            )));
        }
        if let Some(floor) = self.under_detect_floor {
            if !(floor > 0.0 && floor.is_finite()) {
                return Err(ConfigurationError::Invalid(format!(
                    "under-detection floor must be positive, got {floor}"
                )));
            }
        }
        if let Some(region) = &self.region {
            if !region.is_valid() {
                return Err(ConfigurationError::Invalid(format!(
                    "empty region {region:?}"
                )));
            }
        }
        if self.season_length == 0 {
            return Err(ConfigurationError::Invalid(
                "season length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
