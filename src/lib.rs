//! # CitySense
//!
//! Layer resolution core of the CitySense urban dashboard.
//!
//! The crate turns a static catalog of earth-observation layers (NASA GIBS
//! WMTS tiles, SEDAC / GHSL / WorldPop WMS services, plain XYZ tiles) plus the
//! current application state (selected city, selected date, active layers)
//! into ready-to-fetch tile templates and map-service requests, and keeps a
//! set of rendered map overlays in sync with that state.
//!
//! The map surface, the HTTP transport and the capability provider are
//! collaborators expressed as traits, see [`layers::surface::MapSurface`],
//! [`tiles::loader::HttpFetch`] and [`tiles::loader::CapabilitySource`].

pub mod core;
pub mod layers;
pub mod prelude;
pub mod tiles;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    cities::{CityRegistry, Region},
    config::ResolverConfig,
    context::MapContext,
    geo::{LatLng, LatLngBounds, TileCoord},
};

pub use layers::{
    catalog::{Category, LayerCatalog, LayerDescriptor, ProviderKind},
    resolver::{ContextFingerprint, ResolvedTarget, Resolver},
    surface::{MapSurface, OverlayHandle, OverlaySpec},
    sync::{LayerOutcome, OverlaySynchronizer, ReconcileReport},
};

pub use tiles::{
    cache::CapabilityCache,
    capabilities::CapabilityDocument,
    loader::{CapabilitySource, HttpFetch, LiveCapabilities, NoCapabilities},
};

/// Install an `env_logger` backend honouring `RUST_LOG`.
///
/// Calling it more than once is harmless.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, LayerError>;

/// Errors raised while resolving or reconciling layers.
///
/// Every variant is scoped to a single layer id: the synchronizer logs it,
/// skips that layer and carries on with the others.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    #[error("configuration error for layer {layer}: {reason}")]
    Configuration { layer: String, reason: String },

    #[error("capability fetch failed for {provider}: {reason}")]
    CapabilityFetch { provider: String, reason: String },

    #[error("resolution error for layer {layer}: {reason}")]
    Resolution { layer: String, reason: String },

    #[cfg(feature = "live-capabilities")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LayerError {
    pub(crate) fn configuration(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            layer: layer.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn resolution(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            layer: layer.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn capability(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CapabilityFetch {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only affects the layer that raised it.
    ///
    /// Transport and parse errors never reach the synchronizer directly: the
    /// resolver folds them into a capability fallback first.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::UnknownLayer(_)
                | Self::Configuration { .. }
                | Self::Resolution { .. }
                | Self::CapabilityFetch { .. }
        )
    }
}

/// Error type alias for convenience
pub type Error = LayerError;
