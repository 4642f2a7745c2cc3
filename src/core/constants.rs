//! Core constants for the public imagery services CitySense talks to.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// NASA GIBS WMTS REST endpoint, Web Mercator "best available" imagery.
pub const GIBS_BASE_URL: &str = "https://gibs.earthdata.nasa.gov/wmts/epsg3857/best";

/// GIBS capabilities document for the same projection.
pub const GIBS_CAPABILITIES_URL: &str =
    "https://gibs.earthdata.nasa.gov/wmts/epsg3857/best/1.0.0/WMTSCapabilities.xml";

/// GIBS tile matrix set used by every CitySense GIBS product.
pub const GIBS_TILE_MATRIX_SET: &str = "GoogleMapsCompatible_Level9";

pub const SEDAC_WMS_URL: &str = "https://sedac.ciesin.columbia.edu/geoserver/wms";
pub const GHSL_WMS_URL: &str = "https://ghsl.jrc.ec.europa.eu/ghs_wms";
pub const WORLDPOP_WMS_URL: &str = "https://sdi.worldpop.org/geoserver/worldpop/wms";
pub const CARTO_DARK_URL: &str = "https://a.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png";

/// WMS protocol version sent with every GetMap request.
pub const WMS_VERSION: &str = "1.3.0";

/// Bounding-box placeholder filled per tile by WMS-aware map surfaces.
pub const WMS_BBOX_PLACEHOLDER: &str = "{bbox-epsg-3857}";

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Literal time value GIBS interprets as "the layer's default date".
pub const DEFAULT_TIME: &str = "default";

/// First day of the MODIS era; older dates have no GIBS imagery.
pub const INSTRUMENT_ERA_START: &str = "2000-01-01";

/// Year of the WorldPop national mosaics.
pub const DEFAULT_WORLDPOP_YEAR: u16 = 2020;

/// Buffer, in degrees, around a city centre for single-image previews.
pub const PREVIEW_BUFFER_DEGREES: f64 = 1.0;

/// Highest zoom used for sample tile requests.
pub const SAMPLE_TILE_MAX_ZOOM: u8 = 11;

/// Pixel size of single-image GetMap previews.
pub const PREVIEW_WIDTH: u32 = 1024;
pub const PREVIEW_HEIGHT: u32 = 512;

/// Copernicus Data Space OData product search.
pub const COPERNICUS_ODATA_URL: &str = "https://catalogue.dataspace.copernicus.eu/odata/v1/Products";
