#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use citysense::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Trimmed GIBS-style capabilities with one dated layer and one undated one
pub const CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1" version="1.0.0">
  <ows:ServiceIdentification><ows:Title>Test WMTS</ows:Title></ows:ServiceIdentification>
  <Contents>
    <Layer>
      <ows:Identifier>MODIS_Terra_Land_Surface_Temp_Day</ows:Identifier>
      <Dimension>
        <ows:Identifier>Time</ows:Identifier>
        <Default>2024-01-31</Default>
        <Value>2024-01-01/2024-01-31/P1D</Value>
      </Dimension>
      <TileMatrixSetLink><TileMatrixSet>GoogleMapsCompatible_Level9</TileMatrixSet></TileMatrixSetLink>
      <ResourceURL format="image/png" resourceType="tile" template="https://gibs.test/LST/default/{Time}/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.png"/>
    </Layer>
    <Layer>
      <ows:Identifier>VIIRS_SNPP_DayNightBand_ENCC</ows:Identifier>
      <Dimension>
        <ows:Identifier>Time</ows:Identifier>
        <Value>2023-05-01</Value>
        <Value>2023-06-01</Value>
      </Dimension>
      <TileMatrixSetLink><TileMatrixSet>GoogleMapsCompatible_Level9</TileMatrixSet></TileMatrixSetLink>
      <ResourceURL format="image/png" resourceType="tile" template="https://gibs.test/VIIRS/default/{Time}/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.png"/>
    </Layer>
    <TileMatrixSet>
      <ows:Identifier>GoogleMapsCompatible_Level9</ows:Identifier>
      <TileMatrix><ows:Identifier>0</ows:Identifier></TileMatrix>
      <TileMatrix><ows:Identifier>8</ows:Identifier></TileMatrix>
    </TileMatrixSet>
  </Contents>
</Capabilities>"#;

/// Serves a fixed body and counts requests
pub struct StaticFetch {
    body: &'static str,
    calls: AtomicUsize,
}

impl StaticFetch {
    pub fn new(body: &'static str) -> Self {
        Self {
            body,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetch for StaticFetch {
    async fn get_text(&self, _url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.to_string())
    }
}

/// Every request fails like an unreachable host
#[derive(Default)]
pub struct FailingFetch {
    calls: AtomicUsize,
}

impl FailingFetch {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetch for FailingFetch {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LayerError::CapabilityFetch {
            provider: url.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

/// Answers with [`CAPABILITIES`] after a fixed delay
pub struct SlowFetch {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowFetch {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetch for SlowFetch {
    async fn get_text(&self, _url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(CAPABILITIES.to_string())
    }
}

/// The first lookup blocks until `release` is called; later ones answer at once
pub struct GatedCapabilities {
    document: Arc<CapabilityDocument>,
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedCapabilities {
    pub fn new() -> Self {
        Self {
            document: Arc::new(CapabilityDocument::parse(CAPABILITIES).unwrap()),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl CapabilitySource for GatedCapabilities {
    async fn document(&self, _endpoint: &CapabilityEndpoint) -> Result<Arc<CapabilityDocument>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
        }
        Ok(Arc::clone(&self.document))
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

pub fn context(city: &str, date: &str) -> MapContext {
    MapContext::for_city(&CityRegistry::builtin(), city, date)
        .unwrap()
        .with_today(today())
}

pub fn offline_resolver() -> Arc<Resolver> {
    Arc::new(Resolver::new(Arc::new(LayerCatalog::builtin()), ResolverConfig::offline()).unwrap())
}

pub fn live_resolver(fetch: Arc<dyn HttpFetch>) -> Arc<Resolver> {
    let source = LiveCapabilities::new(fetch, CapabilityCache::default());
    Arc::new(
        Resolver::new(Arc::new(LayerCatalog::builtin()), ResolverConfig::default())
            .unwrap()
            .with_capabilities(Arc::new(source)),
    )
}

pub fn synchronizer(resolver: Arc<Resolver>, host_max_zoom: u8) -> OverlaySynchronizer<RecordingSurface> {
    OverlaySynchronizer::new(resolver, RecordingSurface::new(host_max_zoom))
}
