//! Layer id + map context → ready-to-render target.
//!
//! Resolution is a pure function of the descriptor, the context and, for
//! tile-template layers that name a capability endpoint, the provider's
//! capability document. A capability lookup that fails or does not answer
//! within the configured timeout never fails the layer: the static template
//! built from the descriptor is used instead.

use crate::{
    core::{
        config::ResolverConfig,
        constants::{DEFAULT_TIME, WMS_BBOX_PLACEHOLDER, WMS_VERSION},
        context::{format_date, MapContext},
    },
    layers::{
        catalog::{Addressing, LayerCatalog, LayerDescriptor, LayerName, ProviderKind},
        surface::ZoomBounds,
    },
    tiles::{
        capabilities::CapabilityEndpoint,
        loader::{CapabilitySource, NoCapabilities},
        source::{MapServiceRequest, TileTemplate},
        time::select_date,
    },
    traits::Configurable,
    LayerError, Result,
};
use chrono::NaiveDate;
use std::sync::Arc;

#[cfg(feature = "live-capabilities")]
use crate::tiles::{cache::CapabilityCache, loader::LiveCapabilities};

/// The parts of the context a layer's resolution depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextFingerprint {
    pub layer_id: String,
    pub date: NaiveDate,
    pub region: String,
}

impl ContextFingerprint {
    pub fn new(layer_id: &str, ctx: &MapContext) -> Self {
        Self {
            layer_id: layer_id.to_string(),
            date: ctx.date,
            region: ctx.region.name.clone(),
        }
    }
}

impl std::fmt::Display for ContextFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}/{}", self.layer_id, format_date(self.date), self.region)
    }
}

/// What the surface is pointed at
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSource {
    Template(TileTemplate),
    MapService(MapServiceRequest),
}

impl TargetSource {
    /// Template string, or the GetMap URL with the bbox placeholder
    pub fn url(&self) -> String {
        match self {
            Self::Template(template) => template.to_string(),
            Self::MapService(request) => request.url_for_bbox(WMS_BBOX_PLACEHOLDER),
        }
    }

    /// Placeholders the surface could not fill
    pub fn unresolved_placeholders(&self) -> Vec<String> {
        match self {
            Self::Template(template) => template
                .unresolved_placeholders()
                .into_iter()
                .map(str::to_string)
                .collect(),
            Self::MapService(request) => {
                let url = request.url_for_bbox(WMS_BBOX_PLACEHOLDER);
                let bbox = WMS_BBOX_PLACEHOLDER.trim_matches(|c| c == '{' || c == '}');
                TileTemplate::new(url)
                    .placeholders()
                    .into_iter()
                    .filter(|p| *p != bbox)
                    .map(str::to_string)
                    .collect()
            }
        }
    }
}

/// Whether capability data shaped the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityStatus {
    Live,
    /// A lookup was attempted and the static template was used
    Fallback(String),
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub layer_id: String,
    pub kind: ProviderKind,
    pub source: TargetSource,
    pub zoom: ZoomBounds,
    pub opacity: f64,
    pub z_index: i32,
    pub attribution: Option<String>,
    pub fingerprint: ContextFingerprint,
    pub capability_status: CapabilityStatus,
}

pub struct Resolver {
    catalog: Arc<LayerCatalog>,
    config: ResolverConfig,
    capabilities: Arc<dyn CapabilitySource>,
}

impl Resolver {
    /// Resolver that only ever uses static templates until a source is
    /// installed with [`Resolver::with_capabilities`]
    pub fn new(catalog: Arc<LayerCatalog>, config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog,
            config,
            capabilities: Arc::new(NoCapabilities),
        })
    }

    /// Resolver consulting live capabilities over HTTP
    #[cfg(feature = "live-capabilities")]
    pub fn live(catalog: Arc<LayerCatalog>, config: ResolverConfig) -> Result<Self> {
        let cache = CapabilityCache::new(config.capability_cache_capacity)
            .with_ttl(config.capability_ttl());
        Ok(Self::new(catalog, config)?.with_capabilities(Arc::new(LiveCapabilities::reqwest(cache))))
    }

    pub fn with_capabilities(mut self, capabilities: Arc<dyn CapabilitySource>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    /// Resolve `layer_id` for `ctx`. Layers without a declared max zoom take
    /// `host_max_zoom`.
    ///
    /// Capability lookups run as tokio tasks, so a resolver with an enabled
    /// [`CapabilitySource`] must be driven from inside a tokio runtime.
    pub async fn resolve(
        &self,
        layer_id: &str,
        ctx: &MapContext,
        host_max_zoom: u8,
    ) -> Result<ResolvedTarget> {
        let layer = self.catalog.lookup(layer_id)?;
        let addressing = &layer.addressing;
        let zoom = |max_native: Option<u8>| {
            let min = addressing.min_zoom();
            let max = addressing.max_zoom().unwrap_or(host_max_zoom).max(min);
            ZoomBounds::new(min, max, max_native)
        };

        let (source, zoom, capability_status) = match addressing {
            Addressing::TileTemplate { .. } => {
                let (template, native, status) = self.resolve_tiles(layer, ctx).await?;
                (TargetSource::Template(template), zoom(native), status)
            }
            Addressing::MapService { .. } => (
                TargetSource::MapService(self.resolve_map_service(layer, ctx)?),
                zoom(addressing.max_native_zoom()),
                CapabilityStatus::NotApplicable,
            ),
            Addressing::StaticTile { url_template, .. } => (
                TargetSource::Template(TileTemplate::new(url_template.as_str())),
                zoom(None),
                CapabilityStatus::NotApplicable,
            ),
        };

        log::debug!("resolved {} -> {}", layer_id, source.url());

        Ok(ResolvedTarget {
            layer_id: layer.id.clone(),
            kind: layer.provider_kind(),
            source,
            zoom,
            opacity: layer.display.opacity,
            z_index: layer.display.z_index,
            attribution: layer.display.attribution.clone(),
            fingerprint: ContextFingerprint::new(&layer.id, ctx),
            capability_status,
        })
    }

    async fn resolve_tiles(
        &self,
        layer: &LayerDescriptor,
        ctx: &MapContext,
    ) -> Result<(TileTemplate, Option<u8>, CapabilityStatus)> {
        let Addressing::TileTemplate {
            base_url,
            product,
            format,
            tile_matrix_set,
            date_substitution,
            max_native_zoom,
            capabilities,
            ..
        } = &layer.addressing
        else {
            return Err(LayerError::resolution(&layer.id, "not a tile-template layer"));
        };

        if *date_substitution {
            self.check_date(&layer.id, ctx)?;
        }
        let time = if *date_substitution {
            ctx.date_string()
        } else {
            DEFAULT_TIME.to_string()
        };

        let static_template = TileTemplate::wmts_rest(
            base_url,
            product,
            &time,
            tile_matrix_set,
            format,
            self.config.placeholder_order,
        );
        let static_native = max_native_zoom.or_else(|| level_suffix(tile_matrix_set));

        let endpoint = match capabilities {
            Some(endpoint) if self.config.use_capabilities && self.capabilities.is_enabled() => {
                endpoint
            }
            _ => return Ok((static_template, static_native, CapabilityStatus::NotApplicable)),
        };

        match self
            .live_template(product, tile_matrix_set, endpoint, ctx.date, *date_substitution)
            .await
        {
            Ok((template, native)) => Ok((
                template,
                native.or(static_native),
                CapabilityStatus::Live,
            )),
            Err(reason) => {
                log::warn!(
                    "capabilities unavailable for {} ({}), using static template",
                    layer.id,
                    reason
                );
                Ok((static_template, static_native, CapabilityStatus::Fallback(reason)))
            }
        }
    }

    async fn live_template(
        &self,
        product: &str,
        tile_matrix_set: &str,
        endpoint: &CapabilityEndpoint,
        date: NaiveDate,
        date_substitution: bool,
    ) -> std::result::Result<(TileTemplate, Option<u8>), String> {
        let timeout = self.config.capability_timeout();
        let source = Arc::clone(&self.capabilities);
        let key = endpoint.clone();
        // Detached: a lookup that outlives the timeout still fills the cache
        let lookup = tokio::spawn(async move { source.document(&key).await });
        let document = match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(Ok(document))) => document,
            Ok(Ok(Err(e))) => return Err(e.to_string()),
            Ok(Err(e)) => return Err(format!("lookup for {} aborted: {}", endpoint, e)),
            Err(_) => return Err(format!("{} did not answer within {:?}", endpoint, timeout)),
        };

        let layer = document
            .layer(product)
            .ok_or_else(|| format!("{} is not listed by {}", product, endpoint))?;
        let resource = layer
            .tile_template()
            .ok_or_else(|| format!("{} publishes no tile template", product))?;

        let time = match (&layer.time, date_substitution) {
            (_, false) => DEFAULT_TIME.to_string(),
            (Some(dimension), true) => select_date(date, dimension),
            (None, true) => format_date(date),
        };

        let matrix_set = layer
            .tile_matrix_sets
            .iter()
            .find(|set| set.as_str() == tile_matrix_set)
            .or_else(|| layer.tile_matrix_sets.first())
            .map(String::as_str)
            .unwrap_or(tile_matrix_set);

        let template = TileTemplate::from_wmts_resource(resource, matrix_set, &time);
        let unresolved = template.unresolved_placeholders();
        if !unresolved.is_empty() {
            return Err(format!("template keeps placeholders {:?}", unresolved));
        }

        Ok((template, document.max_zoom(matrix_set)))
    }

    fn resolve_map_service(&self, layer: &LayerDescriptor, ctx: &MapContext) -> Result<MapServiceRequest> {
        let Addressing::MapService {
            base_url,
            layer_name,
            style,
            format,
            transparent,
            time_enabled,
            ..
        } = &layer.addressing
        else {
            return Err(LayerError::resolution(&layer.id, "not a map-service layer"));
        };

        let name = layer_name
            .compose(ctx.region.iso.as_deref(), self.config.worldpop_year)
            .ok_or_else(|| {
                LayerError::configuration(
                    &layer.id,
                    format!("region {} has no country code", ctx.region.name),
                )
            })?;
        if let LayerName::RegionalMosaic { .. } = layer_name {
            log::debug!("{} uses mosaic {}", layer.id, name);
        }

        let size = self.config.wms_tile_size.to_string();
        let mut request = MapServiceRequest::new(base_url.as_str())
            .with_param("service", "WMS")
            .with_param("version", WMS_VERSION)
            .with_param("request", "GetMap")
            .with_param("layers", name)
            .with_param("styles", style.clone().unwrap_or_default())
            .with_param("format", format.as_str())
            .with_param("transparent", transparent.to_string())
            .with_param("crs", self.config.wms_crs.as_str())
            .with_param("width", size.clone())
            .with_param("height", size);
        if *time_enabled {
            request.set_param("time", ctx.date_string());
        }
        Ok(request)
    }

    fn check_date(&self, layer_id: &str, ctx: &MapContext) -> Result<()> {
        if !self.config.enforce_date_bounds {
            return Ok(());
        }
        if ctx.date < self.config.era_start || ctx.date > ctx.today {
            return Err(LayerError::resolution(
                layer_id,
                format!(
                    "date {} outside {}..={}",
                    ctx.date_string(),
                    format_date(self.config.era_start),
                    format_date(ctx.today)
                ),
            ));
        }
        Ok(())
    }
}

impl Configurable for Resolver {
    type Config = ResolverConfig;

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn set_config(&mut self, config: Self::Config) -> Result<()> {
        Self::validate_config(&config)?;
        self.config = config;
        Ok(())
    }

    fn validate_config(config: &Self::Config) -> Result<()> {
        config.validate()
    }
}

/// `GoogleMapsCompatible_Level9` → 9
fn level_suffix(tile_matrix_set: &str) -> Option<u8> {
    tile_matrix_set.rsplit_once("_Level")?.1.parse().ok()
}
