//! Prelude module for common citysense types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use citysense::prelude::*;`

pub use crate::core::{
    cities::{City, CityRegistry, Region},
    config::{PlaceholderOrder, ResolverConfig},
    context::MapContext,
    geo::{LatLng, LatLngBounds, TileCoord},
};

pub use crate::layers::{
    catalog::{
        Addressing, Category, DisplayHints, LayerCatalog, LayerDescriptor, LayerName,
        ProviderKind,
    },
    explorer::{sample_requests, SampleRequest},
    resolver::{CapabilityStatus, ContextFingerprint, ResolvedTarget, Resolver, TargetSource},
    surface::{MapSurface, OverlayHandle, OverlayOp, OverlaySpec, RecordingSurface, ZoomBounds},
    sync::{ActiveOverlaySet, LayerOutcome, OverlaySynchronizer, ReconcileReport},
};

pub use crate::tiles::{
    cache::CapabilityCache,
    capabilities::{CapabilityDocument, CapabilityEndpoint, LayerCapabilities},
    loader::{CapabilitySource, HttpFetch, LiveCapabilities, NoCapabilities},
    source::{MapServiceRequest, TileTemplate},
    time::{select_date, TimeDimension, TimeValue},
};

pub use crate::traits::Configurable;

pub use crate::{Error as LayerError, Result};

pub use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
