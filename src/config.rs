use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::achievements::AchievementThresholds;
use crate::error::IngestError;
use crate::insights::InsightThresholds;
use crate::root_cause::RootCauseThresholds;

/// Tunable heuristics. Every field falls back to its default, so a config
/// file only needs the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub insights: InsightThresholds,
    pub achievements: AchievementThresholds,
    pub root_cause: RootCauseThresholds,
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| IngestError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, IngestError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
