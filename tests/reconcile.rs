mod common;

use citysense::prelude::*;
use common::*;

/// Reconciling the same list and context twice touches nothing the second time
#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let sync = synchronizer(offline_resolver(), 18);
    let ctx = context("New York", "2024-03-10");
    let layers = ["lst", "aod", "ghsl_built", "dark_basemap"];

    let first = sync.reconcile(&layers, &ctx).await;
    assert_eq!(first.added().len(), 4);
    sync.with_surface_mut(|s| s.take_ops());

    let second = sync.reconcile(&layers, &ctx).await;
    assert!(second.is_noop());
    assert!(second
        .outcomes
        .iter()
        .all(|(_, outcome)| *outcome == LayerOutcome::Unchanged));
    assert!(sync.with_surface(|s| s.ops().is_empty()));
}

/// {A, B} → {B, C}: A is removed before C is added and B is not touched
#[tokio::test]
async fn test_removal_happens_before_addition() {
    let sync = synchronizer(offline_resolver(), 18);
    let ctx = context("London", "2024-03-10");

    sync.reconcile(&["lst", "ndvi"], &ctx).await;
    let (lst_handle, ndvi_handle) = sync.with_surface(|s| {
        (
            s.overlay_for("lst").unwrap().0,
            s.overlay_for("ndvi").unwrap().0,
        )
    });
    sync.with_surface_mut(|s| s.take_ops());

    let report = sync.reconcile(&["ndvi", "no2"], &ctx).await;
    assert_eq!(report.removed(), vec!["lst"]);
    assert_eq!(report.added(), vec!["no2"]);
    assert_eq!(report.outcome("ndvi"), Some(&LayerOutcome::Unchanged));

    let ops = sync.with_surface(|s| s.ops().to_vec());
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0], OverlayOp::Remove { handle: lst_handle });
    assert!(matches!(&ops[1], OverlayOp::Add { layer_id, .. } if layer_id == "no2"));
    assert!(ops.iter().all(|op| op.handle() != ndvi_handle));
}

/// Unknown ids are skipped without affecting the rest of the pass
#[tokio::test]
async fn test_unknown_layer_is_skipped() {
    let sync = synchronizer(offline_resolver(), 18);
    let report = sync
        .reconcile(
            &["lst", "unknown_layer_xyz", "sedac_flood"],
            &context("Tokyo", "2024-03-10"),
        )
        .await;

    assert_eq!(report.added(), vec!["lst", "sedac_flood"]);
    assert_eq!(report.skipped(), vec!["unknown_layer_xyz"]);
    assert_eq!(sync.with_surface(|s| s.len()), 2);
}

/// Overlays stack by catalog priority whatever order they were activated in
#[tokio::test]
async fn test_overlays_stack_by_priority() {
    let sync = synchronizer(offline_resolver(), 18);
    sync.reconcile(
        &["worldpop_population", "lst", "dark_basemap", "no2"],
        &context("Tokyo", "2024-03-10"),
    )
    .await;

    let expected = vec!["dark_basemap", "lst", "no2", "worldpop_population"];
    assert_eq!(sync.active_ids(), expected);
    assert_eq!(sync.with_surface(|s| s.stacking().join(",")), expected.join(","));
}

/// A layer whose new context cannot be resolved leaves the map
#[tokio::test]
async fn test_region_without_country_code_drops_mosaic() {
    let sync = synchronizer(offline_resolver(), 18);
    sync.reconcile(&["worldpop_population", "lst"], &context("Tokyo", "2024-03-10"))
        .await;

    let nowhere = MapContext::new(
        Region::new("Open Ocean", LatLng::new(0.0, -30.0)),
        chrono::NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
    )
    .with_today(today());
    let report = sync.reconcile(&["worldpop_population", "lst"], &nowhere).await;

    assert!(matches!(
        report.outcome("worldpop_population"),
        Some(LayerOutcome::Skipped(reason)) if reason.contains("country code")
    ));
    // same template and zoom for the new region: nothing to patch
    assert_eq!(report.outcome("lst"), Some(&LayerOutcome::Unchanged));
    assert_eq!(sync.active_ids(), vec!["lst"]);
}

/// A late result for an older date is discarded once a newer date was applied
#[tokio::test]
async fn test_stale_resolution_is_superseded() {
    let source = Arc::new(GatedCapabilities::new());
    let resolver = Arc::new(
        Resolver::new(Arc::new(LayerCatalog::builtin()), ResolverConfig::default())
            .unwrap()
            .with_capabilities(source.clone()),
    );
    let sync = synchronizer(resolver, 18);

    let older = context("Tokyo", "2024-01-10");
    let newer = context("Tokyo", "2024-01-20");

    let slow_pass = sync.reconcile(&["lst"], &older);
    let fast_pass = async {
        let report = sync.reconcile(&["lst"], &newer).await;
        source.release();
        report
    };
    let (slow, fast) = tokio::join!(slow_pass, fast_pass);

    assert_eq!(fast.outcome("lst"), Some(&LayerOutcome::Added));
    assert_eq!(slow.outcome("lst"), Some(&LayerOutcome::Superseded));

    let target = sync.active_target("lst").unwrap();
    assert!(target.source.url().contains("/2024-01-20/"));
    assert_eq!(sync.with_surface(|s| s.len()), 1);
}

/// Time-enabled map services patch only their `time` parameter
#[tokio::test]
async fn test_time_enabled_service_patches_time() {
    let catalog = LayerCatalog::from_json(
        r#"[{
            "id": "flood", "name": "Flood", "short_name": "Flood", "category": "Water & Flood",
            "provider": "Test", "description": "",
            "addressing": {"kind": "parametrized-map-service", "base_url": "https://flood.test/wms",
                           "layer_name": {"fixed": "flood:freq"}, "time_enabled": true},
            "display": {"opacity": 0.5, "z_index": 10}
        }]"#,
    )
    .unwrap();
    let resolver = Resolver::new(Arc::new(catalog), ResolverConfig::offline()).unwrap();
    let sync = synchronizer(Arc::new(resolver), 18);

    sync.reconcile(&["flood"], &context("Tokyo", "2024-03-10")).await;
    let report = sync
        .reconcile(&["flood"], &context("Tokyo", "2024-03-11"))
        .await;

    assert_eq!(
        report.outcome("flood"),
        Some(&LayerOutcome::Patched(vec!["params"]))
    );
    let target = sync.active_target("flood").unwrap();
    assert!(target.source.url().contains("time=2024-03-11"));
    assert_eq!(target.zoom, ZoomBounds::new(0, 18, None));
}

/// Surface that cannot retarget tile overlays in place
struct FrozenUrlSurface(RecordingSurface);

impl MapSurface for FrozenUrlSurface {
    fn max_zoom(&self) -> u8 {
        self.0.max_zoom()
    }

    fn add_overlay(&mut self, spec: &OverlaySpec) -> Result<OverlayHandle> {
        self.0.add_overlay(spec)
    }

    fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<()> {
        self.0.remove_overlay(handle)
    }

    fn set_url(&mut self, _handle: OverlayHandle, _template: &TileTemplate) -> Result<()> {
        Err(LayerError::Resolution {
            layer: "surface".to_string(),
            reason: "url is fixed".to_string(),
        })
    }

    fn set_params(&mut self, handle: OverlayHandle, params: &[(String, String)]) -> Result<()> {
        self.0.set_params(handle, params)
    }

    fn set_opacity(&mut self, handle: OverlayHandle, opacity: f64) -> Result<()> {
        self.0.set_opacity(handle, opacity)
    }

    fn set_z_index(&mut self, handle: OverlayHandle, z_index: i32) -> Result<()> {
        self.0.set_z_index(handle, z_index)
    }

    fn set_zoom_bounds(&mut self, handle: OverlayHandle, zoom: ZoomBounds) -> Result<()> {
        self.0.set_zoom_bounds(handle, zoom)
    }
}

/// A patch the surface rejects falls back to replacing the overlay
#[tokio::test]
async fn test_rejected_patch_replaces_overlay() {
    let sync = OverlaySynchronizer::new(offline_resolver(), FrozenUrlSurface(RecordingSurface::new(18)));

    sync.reconcile(&["ndvi"], &context("Tokyo", "2024-03-10")).await;
    let before = sync.with_surface(|s| s.0.overlay_for("ndvi").unwrap().0);

    let report = sync.reconcile(&["ndvi"], &context("Tokyo", "2024-03-11")).await;
    assert_eq!(report.outcome("ndvi"), Some(&LayerOutcome::Replaced));

    sync.with_surface(|s| {
        assert_eq!(s.0.len(), 1);
        let (after, spec) = s.0.overlay_for("ndvi").unwrap();
        assert_ne!(after, before);
        assert!(spec.source.url().contains("/2024-03-11/"));
    });
}

/// Raising the host maximum zoom widens undeclared bounds on the next pass
#[tokio::test]
async fn test_host_max_zoom_change_patches_bounds() {
    let sync = synchronizer(offline_resolver(), 18);
    let ctx = context("London", "2024-03-10");
    let layers = ["dark_basemap", "sedac_flood"];

    sync.reconcile(&layers, &ctx).await;
    sync.with_surface_mut(|s| {
        s.take_ops();
        s.set_max_zoom(22);
    });

    let report = sync.reconcile(&layers, &ctx).await;
    assert_eq!(
        report.outcome("dark_basemap"),
        Some(&LayerOutcome::Patched(vec!["zoom"]))
    );
    // declares its own max zoom
    assert_eq!(report.outcome("sedac_flood"), Some(&LayerOutcome::Unchanged));

    assert_eq!(sync.active_target("dark_basemap").unwrap().zoom.max, 22);
    sync.with_surface(|s| {
        let (handle, spec) = s.overlay_for("dark_basemap").unwrap();
        assert_eq!(spec.zoom, ZoomBounds::new(0, 22, None));
        assert_eq!(
            s.ops(),
            &[OverlayOp::SetZoomBounds {
                handle,
                zoom: ZoomBounds::new(0, 22, None)
            }]
        );
    });

    let again = sync.reconcile(&layers, &ctx).await;
    assert!(again.is_noop());
}

/// The sources footer lists each provider once, in activation order
#[tokio::test]
async fn test_sources_footer() {
    let catalog = LayerCatalog::builtin();
    let providers = catalog.providers_for(&["lst", "ndvi", "sedac_flood", "lst"]);
    assert_eq!(
        providers,
        vec!["NASA GIBS (MOD11A1)", "NASA GIBS (MOD13A1)", "NASA SEDAC"]
    );
}
