//! Concrete example requests for the active layers.
//!
//! Each layer gets one URL a user can paste into a browser: a single tile at
//! the region centre for tile layers, a GetMap image over the region
//! envelope for map services. A Sentinel-2 scene search over the same
//! envelope is appended.

use crate::{
    core::{
        constants::{
            COPERNICUS_ODATA_URL, PREVIEW_HEIGHT, PREVIEW_WIDTH, SAMPLE_TILE_MAX_ZOOM,
        },
        context::MapContext,
        geo::TileCoord,
    },
    layers::resolver::{ResolvedTarget, Resolver, TargetSource},
    tiles::source::TileTemplate,
    traits::Configurable,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRequest {
    pub id: String,
    pub label: String,
    pub provider: String,
    pub url: String,
}

/// Sample requests for `layer_ids`; layers that fail to resolve are left out
pub async fn sample_requests<I: AsRef<str>>(
    resolver: &Resolver,
    ctx: &MapContext,
    layer_ids: &[I],
) -> Vec<SampleRequest> {
    let mut samples = Vec::new();

    for id in layer_ids.iter().map(|id| id.as_ref()) {
        let target = match resolver.resolve(id, ctx, SAMPLE_TILE_MAX_ZOOM).await {
            Ok(target) => target,
            Err(e) => {
                log::debug!("no sample for {}: {}", id, e);
                continue;
            }
        };
        let Ok(layer) = resolver.catalog().lookup(id) else {
            continue;
        };

        let (label, url) = match &target.source {
            TargetSource::Template(template) => (
                format!("{} tile", layer.name),
                sample_tile_url(template, &target, ctx),
            ),
            TargetSource::MapService(_) => (
                format!("{} GetMap preview", layer.name),
                preview_url(resolver, &target, ctx),
            ),
        };

        samples.push(SampleRequest {
            id: id.to_string(),
            label,
            provider: layer.provider.clone(),
            url,
        });
    }

    samples.push(scene_search(ctx, resolver.config().preview_buffer_degrees));
    samples
}

/// Tile at the region centre, at the view zoom capped to what the layer serves
fn sample_tile_url(template: &TileTemplate, target: &ResolvedTarget, ctx: &MapContext) -> String {
    let mut zoom = ctx.zoom.round().clamp(0.0, SAMPLE_TILE_MAX_ZOOM as f64) as u8;
    if let Some(native) = target.zoom.max_native {
        zoom = zoom.min(native);
    }
    zoom = zoom.max(target.zoom.min);

    template.expand(TileCoord::from_lat_lng(&ctx.region.center, zoom))
}

fn preview_url(resolver: &Resolver, target: &ResolvedTarget, ctx: &MapContext) -> String {
    let TargetSource::MapService(request) = &target.source else {
        return target.source.url();
    };
    let config = resolver.config();
    let envelope = ctx.envelope(config.preview_buffer_degrees);
    let bbox = if config.wms_crs.eq_ignore_ascii_case("EPSG:3857") {
        envelope.to_mercator_bbox_param()
    } else {
        envelope.to_bbox_param(4)
    };

    let mut request = request.clone();
    request.set_param("width", PREVIEW_WIDTH.to_string());
    request.set_param("height", PREVIEW_HEIGHT.to_string());
    request.url_for_bbox(&bbox)
}

/// Sentinel-2 products intersecting the view envelope since the selected date
pub fn scene_search(ctx: &MapContext, buffer_degrees: f64) -> SampleRequest {
    let envelope = ctx.envelope(buffer_degrees);
    let filter = format!(
        "Collection/Name eq 'SENTINEL-2' and OData.CSC.Intersects(area=geography'SRID=4326;{}') \
         and ContentDate/Start ge {}T00:00:00.000Z",
        envelope.to_wkt_polygon(4),
        ctx.date_string()
    );
    let url = url::Url::parse_with_params(COPERNICUS_ODATA_URL, &[("$filter", filter.as_str())])
        .map(String::from)
        .unwrap_or_else(|_| COPERNICUS_ODATA_URL.to_string());

    SampleRequest {
        id: "copernicus_sentinel2".to_string(),
        label: "Sentinel-2 scene search".to_string(),
        provider: "Copernicus Data Space".to_string(),
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{cities::CityRegistry, config::ResolverConfig, geo::LatLngBounds};
    use crate::layers::catalog::LayerCatalog;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(LayerCatalog::builtin()), ResolverConfig::offline()).unwrap()
    }

    fn manila(zoom: f64) -> MapContext {
        MapContext::for_city(&CityRegistry::builtin(), "Metro Manila", "2024-03-10")
            .unwrap()
            .with_today(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .with_zoom(zoom)
    }

    #[tokio::test]
    async fn test_tile_samples_cap_zoom() {
        let samples = sample_requests(&resolver(), &manila(12.0), &["lst", "precipitation"]).await;
        assert_eq!(samples.len(), 3);

        assert_eq!(
            samples[0].url,
            "https://gibs.earthdata.nasa.gov/wmts/epsg3857/best/MODIS_Terra_Land_Surface_Temp_Day/default/2024-03-10/GoogleMapsCompatible_Level9/9/235/428.png"
        );
        assert!(samples[1].url.ends_with("/GoogleMapsCompatible_Level9/6/29/53.png"));
        assert_eq!(samples[1].provider, "NASA GIBS (GPM IMERG)");
        assert_eq!(samples[2].id, "copernicus_sentinel2");
    }

    #[tokio::test]
    async fn test_map_service_preview() {
        let samples = sample_requests(&resolver(), &manila(10.0), &["sedac_flood", "bogus"]).await;
        assert_eq!(samples.len(), 2);

        let url = &samples[0].url;
        assert!(url.starts_with("https://sedac.ciesin.columbia.edu/geoserver/wms?service=WMS"));
        assert!(url.contains("width=1024"));
        assert!(url.contains("height=512"));
        assert!(url.contains("&bbox=13356580."));
        assert!(!url.contains('{'));
    }

    #[tokio::test]
    async fn test_preview_covers_viewport() {
        let viewport = LatLngBounds::from_coords(14.0, 120.5, 15.0, 121.5);
        let ctx = manila(10.0).with_viewport(viewport);
        let samples = sample_requests(&resolver(), &ctx, &["sedac_flood"]).await;

        assert!(samples[0].url.ends_with(&format!("&bbox={}", viewport.to_mercator_bbox_param())));
        assert!(samples[1].url.contains("120.5000"));
    }

    #[test]
    fn test_scene_search_is_encoded() {
        let sample = scene_search(&manila(10.0), 1.0);
        assert!(sample.url.starts_with(
            "https://catalogue.dataspace.copernicus.eu/odata/v1/Products?%24filter="
        ));
        assert!(sample.url.contains("POLYGON"));
        assert!(!sample.url.contains(' '));
    }
}
