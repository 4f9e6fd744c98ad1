//! Repair configuration. Defaults match the US LCI cleanup; a YAML file named
//! by `LCI_QAQC_CONFIG` (or passed explicitly) overrides any subset of fields.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::graph::LocationRecord;

pub const CONFIG_ENV_VAR: &str = "LCI_QAQC_CONFIG";
pub const DEFAULT_WASTE_CUTOFF_MARKER: &str = "CUTOFF Waste Flows";
pub const DEFAULT_EXPORT_LOCATION_SENTINEL: &str = "no location";
pub const DEFAULT_DOCUMENTATION_SHEET: &str = "Documentation";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Location record written onto physical processes that have none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultLocation {
    pub id: String,
    pub name: String,
}

impl Default for DefaultLocation {
    fn default() -> Self {
        Self {
            id: "0b3b97fa-6688-3c56-88ee-4ae80ec0c3c2".to_string(),
            name: "United States".to_string(),
        }
    }
}

impl DefaultLocation {
    pub fn to_record(&self) -> LocationRecord {
        LocationRecord {
            id: Some(self.id.clone()),
            kind: Some("Location".to_string()),
            name: Some(self.name.clone()),
            extra: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub default_location: DefaultLocation,
    /// Waste flows whose category contains this marker are left alone by the
    /// opposite-direction transform.
    pub waste_cutoff_marker: String,
    /// Flow categories whose input exchanges are deleted before repair.
    pub delete_categories: Vec<String>,
    pub normalize_locations_for_export: bool,
    pub export_location_sentinel: String,
    pub documentation_sheet: String,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            default_location: DefaultLocation::default(),
            waste_cutoff_marker: DEFAULT_WASTE_CUTOFF_MARKER.to_string(),
            delete_categories: Vec::new(),
            normalize_locations_for_export: false,
            export_location_sentinel: DEFAULT_EXPORT_LOCATION_SENTINEL.to_string(),
            documentation_sheet: DEFAULT_DOCUMENTATION_SHEET.to_string(),
        }
    }
}

impl RepairConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Config from the file named by `LCI_QAQC_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => Ok(Self::default()),
        }
    }
}
