use anyhow::Context as _;
use citysense::{
    core::config::ResolverProfile,
    layers::{explorer::sample_requests, surface::RecordingSurface, sync::LayerOutcome},
    CityRegistry, LayerCatalog, MapContext, OverlaySynchronizer, ResolverConfig, Resolver,
};
use std::sync::Arc;

const DEFAULT_LAYERS: &str = "dark_basemap,lst,no2,worldpop_population";

/// Headless dashboard session
///
/// Usage: `citysense-app [CITY] [YYYY-MM-DD] [LAYER,LAYER,...] [--offline]`
///
/// `CITYSENSE_CONFIG` may point at a JSON resolver configuration.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    citysense::init_logging();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let offline = match args.iter().position(|a| a == "--offline") {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    };
    let mut args = args.into_iter();
    let city = args.next().unwrap_or_else(|| "Metro Manila".to_string());
    let date = args
        .next()
        .unwrap_or_else(|| chrono::Utc::now().date_naive().pred_opt().unwrap_or_default().to_string());
    let layers: Vec<String> = args
        .next()
        .unwrap_or_else(|| DEFAULT_LAYERS.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let profile = match std::env::var("CITYSENSE_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading resolver config {}", path))?;
            ResolverProfile::Custom(ResolverConfig::from_json(&json)?)
        }
        Err(_) if offline => ResolverProfile::Offline,
        Err(_) => ResolverProfile::Live,
    };
    let mut config = profile.resolve();
    if offline {
        config.use_capabilities = false;
    }

    let catalog = Arc::new(LayerCatalog::builtin());
    let resolver = if config.use_capabilities {
        Resolver::live(catalog.clone(), config)?
    } else {
        Resolver::new(catalog.clone(), config)?
    };
    let resolver = Arc::new(resolver);

    let registry = CityRegistry::builtin();
    let ctx = MapContext::for_city(&registry, &city, &date)?;
    log::info!("session: {} on {}", ctx.region.name, ctx.date_string());

    let sync = OverlaySynchronizer::new(resolver.clone(), RecordingSurface::new(18));

    let report = sync.reconcile(&layers, &ctx).await;
    print_report("initial", &report.outcomes);

    // Step to the previous day the way the date picker does
    if let Some(previous) = ctx.date.pred_opt() {
        let report = sync.reconcile(&layers, &ctx.clone().with_date(previous)).await;
        print_report("previous day", &report.outcomes);
    }

    println!("\noverlays (bottom to top):");
    sync.with_surface(|surface| {
        for layer_id in surface.stacking() {
            if let Some((handle, spec)) = surface.overlay_for(layer_id) {
                println!("  {} {:<22} z={} {}", handle, layer_id, spec.z_index, spec.source.url());
            }
        }
    });

    println!("\nsources: {}", catalog.providers_for(&layers).join(", "));

    let samples = sample_requests(&resolver, &ctx, &layers).await;
    println!("\nsample requests:\n{}", serde_json::to_string_pretty(&samples)?);

    Ok(())
}

fn print_report(title: &str, outcomes: &[(String, LayerOutcome)]) {
    println!("\n{}:", title);
    for (layer_id, outcome) in outcomes {
        println!("  {:<22} {:?}", layer_id, outcome);
    }
}
