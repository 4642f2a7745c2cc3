//! Configuration for the resolver and the capability cache
//!
//! Settings come from a preset profile or from JSON; every configuration is
//! validated before a resolver accepts it.

use crate::{
    core::constants::{
        DEFAULT_WORLDPOP_YEAR, INSTRUMENT_ERA_START, PREVIEW_BUFFER_DEGREES, TILE_SIZE,
    },
    LayerError, Result,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Order of the row and column placeholders in generated tile templates.
///
/// `{x}` is always the tile column and `{y}` the tile row; this only decides
/// which one comes first in the path of statically built templates. WMTS REST
/// endpoints such as GIBS address tiles as TileMatrix/TileRow/TileCol, which
/// is `RowColumn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderOrder {
    /// `{z}/{y}/{x}`, matching templates read from capability documents
    #[default]
    RowColumn,
    /// `{z}/{x}/{y}`, for mirrors that serve XYZ-style paths
    ColumnRow,
}

impl PlaceholderOrder {
    pub fn tile_path(&self) -> &'static str {
        match self {
            Self::RowColumn => "{z}/{y}/{x}",
            Self::ColumnRow => "{z}/{x}/{y}",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub placeholder_order: PlaceholderOrder,
    /// Consult capability documents for layers that declare an endpoint
    pub use_capabilities: bool,
    /// Reject dates before `era_start` or after today
    pub enforce_date_bounds: bool,
    pub era_start: NaiveDate,
    /// How long a capability fetch may take before the static template wins
    pub capability_timeout_ms: u64,
    pub capability_cache_capacity: usize,
    /// Unset means capability documents live as long as the cache
    pub capability_ttl_secs: Option<u64>,
    pub worldpop_year: u16,
    pub wms_tile_size: u32,
    pub wms_crs: String,
    pub preview_buffer_degrees: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            placeholder_order: PlaceholderOrder::default(),
            use_capabilities: true,
            enforce_date_bounds: true,
            era_start: NaiveDate::parse_from_str(INSTRUMENT_ERA_START, "%Y-%m-%d")
                .unwrap_or(NaiveDate::MIN),
            capability_timeout_ms: 8_000,
            capability_cache_capacity: 16,
            capability_ttl_secs: None,
            worldpop_year: DEFAULT_WORLDPOP_YEAR,
            wms_tile_size: TILE_SIZE,
            wms_crs: "EPSG:3857".to_string(),
            preview_buffer_degrees: PREVIEW_BUFFER_DEGREES,
        }
    }
}

impl ResolverConfig {
    /// Static templates only; never touches the network
    pub fn offline() -> Self {
        Self {
            use_capabilities: false,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn capability_timeout(&self) -> Duration {
        Duration::from_millis(self.capability_timeout_ms)
    }

    pub fn capability_ttl(&self) -> Option<Duration> {
        self.capability_ttl_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(LayerError::configuration("resolver", reason));

        if self.capability_cache_capacity == 0 {
            return invalid("capability_cache_capacity must be at least 1");
        }
        if self.wms_tile_size == 0 {
            return invalid("wms_tile_size must be positive");
        }
        if self.wms_crs.trim().is_empty() {
            return invalid("wms_crs must not be empty");
        }
        if self.preview_buffer_degrees.is_nan() || self.preview_buffer_degrees <= 0.0 {
            return invalid("preview_buffer_degrees must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverProfile {
    Live,
    Offline,
    Custom(ResolverConfig),
}

impl ResolverProfile {
    pub fn resolve(&self) -> ResolverConfig {
        match self {
            Self::Live => ResolverConfig::default(),
            Self::Offline => ResolverConfig::offline(),
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for ResolverProfile {
    fn default() -> Self {
        Self::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.placeholder_order.tile_path(), "{z}/{y}/{x}");
        assert_eq!(config.era_start, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert_eq!(config.worldpop_year, 2020);
        assert!(config.capability_ttl().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ResolverConfig::from_json(
            r#"{"placeholder_order": "column_row", "capability_timeout_ms": 250, "era_start": "2002-07-04"}"#,
        )
        .unwrap();

        assert_eq!(config.placeholder_order, PlaceholderOrder::ColumnRow);
        assert_eq!(config.capability_timeout(), Duration::from_millis(250));
        assert_eq!(config.era_start, NaiveDate::from_ymd_opt(2002, 7, 4).unwrap());
        assert!(config.use_capabilities);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(ResolverConfig::from_json(r#"{"capability_cache_capacity": 0}"#).is_err());
        assert!(ResolverConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_profiles() {
        assert!(!ResolverProfile::Offline.resolve().use_capabilities);
        assert!(ResolverProfile::default().resolve().use_capabilities);

        let custom = ResolverConfig {
            worldpop_year: 2019,
            ..ResolverConfig::default()
        };
        assert_eq!(ResolverProfile::Custom(custom).resolve().worldpop_year, 2019);
    }
}
