//! The static layer catalog.
//!
//! Every layer the dashboard can show is described once here: how its
//! imagery is addressed (a WMTS tile template, a WMS GetMap service or a
//! plain XYZ template) and how it should be displayed. Descriptors are
//! immutable once the catalog has been validated.

use crate::{
    core::constants::{
        CARTO_DARK_URL, GHSL_WMS_URL, GIBS_BASE_URL, GIBS_CAPABILITIES_URL,
        GIBS_TILE_MATRIX_SET, SEDAC_WMS_URL, WORLDPOP_WMS_URL,
    },
    prelude::{HashMap, HashSet},
    tiles::{capabilities::CapabilityEndpoint, source::TileTemplate},
    LayerError, Result,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Heat & Greenspace")]
    HeatGreenspace,
    #[serde(rename = "Air & Mobility")]
    AirMobility,
    #[serde(rename = "Water & Flood")]
    WaterFlood,
    #[serde(rename = "Urbanization & Equity")]
    UrbanizationEquity,
    #[serde(rename = "Basemap")]
    Basemap,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HeatGreenspace => "Heat & Greenspace",
            Self::AirMobility => "Air & Mobility",
            Self::WaterFlood => "Water & Flood",
            Self::UrbanizationEquity => "Urbanization & Equity",
            Self::Basemap => "Basemap",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How a layer's imagery is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Pre-rendered WMTS pyramid addressed by a date-substituted template
    TileTemplate,
    /// WMS GetMap service rendering each tile on request
    #[serde(rename = "parametrized-map-service")]
    MapService,
    /// Undated XYZ template used verbatim
    StaticTile,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TileTemplate => "tile-template",
            Self::MapService => "parametrized-map-service",
            Self::StaticTile => "static-tile",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WMS layer name, either fixed or composed per region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerName {
    Fixed(String),
    /// Per-country mosaic; `pattern` holds `{iso}` and optionally `{year}`.
    /// A missing year takes the resolver's configured mosaic year.
    RegionalMosaic { pattern: String, year: Option<u16> },
}

impl LayerName {
    /// Concrete layer name, or `None` if a mosaic has no country code to use
    pub fn compose(&self, iso: Option<&str>, default_year: u16) -> Option<String> {
        match self {
            Self::Fixed(name) => Some(name.clone()),
            Self::RegionalMosaic { pattern, year } => {
                let iso = iso.map(str::trim).filter(|iso| !iso.is_empty())?;
                let year = year.unwrap_or(default_year);
                Some(
                    pattern
                        .replace("{iso}", &iso.to_ascii_uppercase())
                        .replace("{year}", &year.to_string()),
                )
            }
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Self::Fixed(name) => name.trim().is_empty(),
            Self::RegionalMosaic { pattern, .. } => pattern.trim().is_empty(),
        }
    }
}

fn default_format() -> String {
    "png".to_string()
}

fn default_image_format() -> String {
    "image/png".to_string()
}

fn default_true() -> bool {
    true
}

/// Addressing parameters; the provider kind follows from the variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Addressing {
    TileTemplate {
        base_url: String,
        product: String,
        #[serde(default = "default_format")]
        format: String,
        tile_matrix_set: String,
        /// Put the selected date in the time slot; otherwise `default`
        #[serde(default = "default_true")]
        date_substitution: bool,
        #[serde(default)]
        min_zoom: u8,
        #[serde(default)]
        max_zoom: Option<u8>,
        #[serde(default)]
        max_native_zoom: Option<u8>,
        #[serde(default)]
        capabilities: Option<CapabilityEndpoint>,
    },
    #[serde(rename = "parametrized-map-service")]
    MapService {
        base_url: String,
        layer_name: LayerName,
        #[serde(default)]
        style: Option<String>,
        #[serde(default = "default_image_format")]
        format: String,
        #[serde(default = "default_true")]
        transparent: bool,
        #[serde(default)]
        time_enabled: bool,
        #[serde(default)]
        min_zoom: u8,
        #[serde(default)]
        max_zoom: Option<u8>,
        #[serde(default)]
        max_native_zoom: Option<u8>,
    },
    StaticTile {
        url_template: String,
        #[serde(default)]
        min_zoom: u8,
        #[serde(default)]
        max_zoom: Option<u8>,
    },
}

impl Addressing {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::TileTemplate { .. } => ProviderKind::TileTemplate,
            Self::MapService { .. } => ProviderKind::MapService,
            Self::StaticTile { .. } => ProviderKind::StaticTile,
        }
    }

    pub fn min_zoom(&self) -> u8 {
        match self {
            Self::TileTemplate { min_zoom, .. }
            | Self::MapService { min_zoom, .. }
            | Self::StaticTile { min_zoom, .. } => *min_zoom,
        }
    }

    /// Declared maximum zoom; `None` defers to the host map
    pub fn max_zoom(&self) -> Option<u8> {
        match self {
            Self::TileTemplate { max_zoom, .. }
            | Self::MapService { max_zoom, .. }
            | Self::StaticTile { max_zoom, .. } => *max_zoom,
        }
    }

    pub fn max_native_zoom(&self) -> Option<u8> {
        match self {
            Self::TileTemplate {
                max_native_zoom, ..
            }
            | Self::MapService {
                max_native_zoom, ..
            } => *max_native_zoom,
            Self::StaticTile { .. } => None,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let blank = |value: &str| value.trim().is_empty();
        match self {
            Self::TileTemplate {
                base_url,
                product,
                format,
                tile_matrix_set,
                ..
            } => {
                if blank(base_url) || blank(product) || blank(format) || blank(tile_matrix_set) {
                    return Err("tile template needs base_url, product, format and tile_matrix_set".into());
                }
            }
            Self::MapService {
                base_url,
                layer_name,
                ..
            } => {
                if blank(base_url) || layer_name.is_blank() {
                    return Err("map service needs base_url and layer_name".into());
                }
                if let LayerName::RegionalMosaic { pattern, .. } = layer_name {
                    if !pattern.contains("{iso}") {
                        return Err(format!("regional mosaic pattern {:?} has no {{iso}}", pattern));
                    }
                }
            }
            Self::StaticTile { url_template, .. } => {
                if blank(url_template) {
                    return Err("static tile needs url_template".into());
                }
                let template = TileTemplate::new(url_template.as_str());
                let unresolved = template.unresolved_placeholders();
                if !unresolved.is_empty() {
                    return Err(format!("static tile template has unknown placeholders {:?}", unresolved));
                }
            }
        }

        if let Some(max) = self.max_zoom() {
            if self.min_zoom() > max {
                return Err(format!("min_zoom {} exceeds max_zoom {}", self.min_zoom(), max));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayHints {
    pub opacity: f64,
    pub z_index: i32,
    #[serde(default)]
    pub attribution: Option<String>,
}

/// One entry of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub category: Category,
    /// Human readable data source, e.g. `NASA GIBS (OMI)`
    pub provider: String,
    pub description: String,
    pub addressing: Addressing,
    pub display: DisplayHints,
}

impl LayerDescriptor {
    pub fn provider_kind(&self) -> ProviderKind {
        self.addressing.kind()
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LayerError::configuration("<empty>", "layer id must not be empty"));
        }
        let opacity = self.display.opacity;
        if opacity.is_nan() || !(0.0..=1.0).contains(&opacity) {
            return Err(LayerError::configuration(
                &self.id,
                format!("opacity {} outside 0..=1", opacity),
            ));
        }
        self.addressing
            .validate()
            .map_err(|reason| LayerError::configuration(&self.id, reason))
    }
}

/// Validated, id-indexed collection of layer descriptors
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    layers: Vec<LayerDescriptor>,
    index: HashMap<String, usize>,
}

impl LayerCatalog {
    pub fn new(layers: Vec<LayerDescriptor>) -> Result<Self> {
        let mut index = HashMap::default();
        for (pos, layer) in layers.iter().enumerate() {
            layer.validate()?;
            if index.insert(layer.id.clone(), pos).is_some() {
                return Err(LayerError::configuration(&layer.id, "duplicate layer id"));
            }
        }
        log::debug!("layer catalog with {} layers", layers.len());
        Ok(Self { layers, index })
    }

    /// Load a JSON array of descriptors
    pub fn from_json(json: &str) -> Result<Self> {
        let layers: Vec<LayerDescriptor> = serde_json::from_str(json)?;
        Self::new(layers)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.layers)?)
    }

    pub fn lookup(&self, id: &str) -> Result<&LayerDescriptor> {
        self.get(id)
            .ok_or_else(|| LayerError::UnknownLayer(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&LayerDescriptor> {
        self.index.get(id).map(|&pos| &self.layers[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Descriptors in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    /// Ordered by category label, then by name
    pub fn sorted(&self) -> Vec<&LayerDescriptor> {
        let mut sorted: Vec<&LayerDescriptor> = self.layers.iter().collect();
        sorted.sort_by(|a, b| {
            a.category
                .label()
                .cmp(b.category.label())
                .then_with(|| a.name.cmp(&b.name))
        });
        sorted
    }

    pub fn grouped(&self) -> Vec<(Category, Vec<&LayerDescriptor>)> {
        let mut groups: Vec<(Category, Vec<&LayerDescriptor>)> = Vec::new();
        for layer in self.sorted() {
            match groups.last_mut() {
                Some((category, members)) if *category == layer.category => members.push(layer),
                _ => groups.push((layer.category, vec![layer])),
            }
        }
        groups
    }

    /// Distinct provider labels of `ids`, first seen first
    pub fn providers_for<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&str> {
        let mut seen = HashSet::default();
        ids.iter()
            .filter_map(|id| self.get(id.as_ref()))
            .map(|layer| layer.provider.as_str())
            .filter(|provider| seen.insert(*provider))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The dashboard's layers
    pub fn builtin() -> Self {
        // Static data; validation cannot fail for these descriptors.
        Self::new(builtin_layers()).unwrap_or_else(|e| {
            log::error!("builtin catalog rejected: {}", e);
            Self {
                layers: Vec::new(),
                index: HashMap::default(),
            }
        })
    }
}

impl Default for LayerCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

const GIBS_ATTRIBUTION: &str = "Imagery: NASA EOSDIS GIBS";

fn gibs(product: &str, max_native_zoom: Option<u8>) -> Addressing {
    Addressing::TileTemplate {
        base_url: GIBS_BASE_URL.to_string(),
        product: product.to_string(),
        format: default_format(),
        tile_matrix_set: GIBS_TILE_MATRIX_SET.to_string(),
        date_substitution: true,
        min_zoom: 0,
        max_zoom: None,
        max_native_zoom,
        capabilities: Some(CapabilityEndpoint::new(
            "nasa-gibs",
            "epsg3857",
            GIBS_CAPABILITIES_URL,
        )),
    }
}

fn wms(base_url: &str, layer_name: LayerName, style: Option<&str>, max_zoom: u8, native: u8) -> Addressing {
    Addressing::MapService {
        base_url: base_url.to_string(),
        layer_name,
        style: style.map(str::to_string),
        format: default_image_format(),
        transparent: true,
        time_enabled: false,
        min_zoom: 0,
        max_zoom: Some(max_zoom),
        max_native_zoom: Some(native),
    }
}

fn builtin_layers() -> Vec<LayerDescriptor> {
    struct Entry {
        id: &'static str,
        name: &'static str,
        short_name: &'static str,
        category: Category,
        provider: &'static str,
        description: &'static str,
        addressing: Addressing,
        opacity: f64,
        z_index: i32,
        attribution: &'static str,
    }

    let entries = vec![
        Entry {
            id: "lst",
            name: "Land Surface Temperature",
            short_name: "LST",
            category: Category::HeatGreenspace,
            provider: "NASA GIBS (MOD11A1)",
            description: "Daily daytime land surface temperature from MODIS Terra (1 km).",
            addressing: gibs("MODIS_Terra_Land_Surface_Temp_Day", None),
            opacity: 0.75,
            z_index: 400,
            attribution: GIBS_ATTRIBUTION,
        },
        Entry {
            id: "ndvi",
            name: "Vegetation Index (NDVI)",
            short_name: "NDVI",
            category: Category::HeatGreenspace,
            provider: "NASA GIBS (MOD13A1)",
            description: "8-day MODIS NDVI composite for vegetation vigor.",
            addressing: gibs("MODIS_Terra_NDVI_8Day", None),
            opacity: 0.65,
            z_index: 410,
            attribution: GIBS_ATTRIBUTION,
        },
        Entry {
            id: "precipitation",
            name: "Precipitation (IMERG)",
            short_name: "IMERG",
            category: Category::WaterFlood,
            provider: "NASA GIBS (GPM IMERG)",
            description: "Half-hourly GPM IMERG precipitation estimate.",
            addressing: gibs("GPM_3IMERGHH_06_precipitation", Some(6)),
            opacity: 0.65,
            z_index: 420,
            attribution: GIBS_ATTRIBUTION,
        },
        Entry {
            id: "aod",
            name: "Aerosol Optical Depth",
            short_name: "AOD",
            category: Category::AirMobility,
            provider: "NASA GIBS (MAIAC)",
            description: "Daily aerosol optical depth, a proxy for particulate pollution.",
            addressing: gibs("MODIS_Combined_Value_Added_AOD", None),
            opacity: 0.7,
            z_index: 430,
            attribution: GIBS_ATTRIBUTION,
        },
        Entry {
            id: "no2",
            name: "NO₂ Tropospheric Column",
            short_name: "NO₂",
            category: Category::AirMobility,
            provider: "NASA GIBS (OMI)",
            description: "Daily tropospheric nitrogen dioxide from Aura OMI.",
            addressing: gibs("OMI_Nitrogen_Dioxide_Tropo_Column", None),
            opacity: 0.7,
            z_index: 440,
            attribution: GIBS_ATTRIBUTION,
        },
        Entry {
            id: "nightlights",
            name: "Night Lights (VIIRS)",
            short_name: "Night Lights",
            category: Category::UrbanizationEquity,
            provider: "NASA GIBS (VIIRS DNB)",
            description: "Nighttime lights from the VIIRS Day/Night Band.",
            addressing: gibs("VIIRS_SNPP_DayNightBand_ENCC", None),
            opacity: 0.6,
            z_index: 450,
            attribution: GIBS_ATTRIBUTION,
        },
        Entry {
            id: "sedac_flood",
            name: "Flood Hazard Frequency",
            short_name: "Flood Hazard",
            category: Category::WaterFlood,
            provider: "NASA SEDAC",
            description: "Flood hazard frequency from SEDAC Natural Disaster Hotspots.",
            addressing: wms(
                SEDAC_WMS_URL,
                LayerName::Fixed("ndh:ndh-flood-hazard-frequency-distribution".to_string()),
                Some("default"),
                12,
                10,
            ),
            opacity: 0.55,
            z_index: 460,
            attribution: "NASA SEDAC / CIESIN",
        },
        Entry {
            id: "ghsl_built",
            name: "Built-up Surface (GHSL)",
            short_name: "Built-up",
            category: Category::UrbanizationEquity,
            provider: "JRC GHSL",
            description: "Global Human Settlement Layer built-up surface (2018).",
            addressing: wms(
                GHSL_WMS_URL,
                LayerName::Fixed("GHS_BUILT_S_E2018_GLOBE_R2019A".to_string()),
                None,
                13,
                12,
            ),
            opacity: 0.65,
            z_index: 470,
            attribution: "European Commission JRC GHSL",
        },
        Entry {
            id: "worldpop_population",
            name: "Population Density (WorldPop)",
            short_name: "Population",
            category: Category::UrbanizationEquity,
            provider: "WorldPop",
            description: "WorldPop 1 km population density, national mosaic.",
            addressing: wms(
                WORLDPOP_WMS_URL,
                LayerName::RegionalMosaic {
                    pattern: "worldpop:ppp_{year}_{iso}_1km_Aggregated".to_string(),
                    year: None,
                },
                None,
                12,
                10,
            ),
            opacity: 0.6,
            z_index: 480,
            attribution: "WorldPop (www.worldpop.org)",
        },
        Entry {
            id: "dark_basemap",
            name: "Dark Basemap",
            short_name: "Dark",
            category: Category::Basemap,
            provider: "CARTO",
            description: "Dark CARTO basemap over OpenStreetMap data.",
            addressing: Addressing::StaticTile {
                url_template: CARTO_DARK_URL.to_string(),
                min_zoom: 0,
                max_zoom: None,
            },
            opacity: 1.0,
            z_index: 100,
            attribution: "© OpenStreetMap contributors © CARTO",
        },
    ];

    entries
        .into_iter()
        .map(|e| LayerDescriptor {
            id: e.id.to_string(),
            name: e.name.to_string(),
            short_name: e.short_name.to_string(),
            category: e.category,
            provider: e.provider.to_string(),
            description: e.description.to_string(),
            addressing: e.addressing,
            display: DisplayHints {
                opacity: e.opacity,
                z_index: e.z_index,
                attribution: Some(e.attribution.to_string()),
            },
        })
        .collect()
}
