//! The map surface the synchronizer drives.
//!
//! A surface owns rendered overlays and hands back opaque handles. It fills
//! `{z}`/`{x}`/`{y}` (and the map-service bbox placeholder) itself for every
//! tile it draws.

use crate::{
    layers::{catalog::ProviderKind, resolver::{ResolvedTarget, TargetSource}},
    prelude::HashMap,
    tiles::source::TileTemplate,
    LayerError, Result,
};
use serde::{Deserialize, Serialize};

/// Opaque reference to an overlay owned by a [`MapSurface`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayHandle(pub u64);

impl std::fmt::Display for OverlayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

/// Zoom range an overlay is drawn for; above `max_native` tiles are upscaled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomBounds {
    pub min: u8,
    pub max: u8,
    pub max_native: Option<u8>,
}

impl ZoomBounds {
    pub fn new(min: u8, max: u8, max_native: Option<u8>) -> Self {
        Self {
            min,
            max,
            max_native,
        }
    }
}

/// Everything a surface needs to create an overlay
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    pub layer_id: String,
    pub kind: ProviderKind,
    pub source: TargetSource,
    pub opacity: f64,
    pub z_index: i32,
    pub zoom: ZoomBounds,
    pub attribution: Option<String>,
}

impl From<&ResolvedTarget> for OverlaySpec {
    fn from(target: &ResolvedTarget) -> Self {
        Self {
            layer_id: target.layer_id.clone(),
            kind: target.kind,
            source: target.source.clone(),
            opacity: target.opacity,
            z_index: target.z_index,
            zoom: target.zoom,
            attribution: target.attribution.clone(),
        }
    }
}

/// Host map the overlays are rendered on
pub trait MapSurface: Send {
    /// Highest zoom level the host map allows
    fn max_zoom(&self) -> u8;

    fn add_overlay(&mut self, spec: &OverlaySpec) -> Result<OverlayHandle>;

    fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<()>;

    /// Point a tile overlay at a new template
    fn set_url(&mut self, handle: OverlayHandle, template: &TileTemplate) -> Result<()>;

    /// Update only the given map-service query parameters
    fn set_params(&mut self, handle: OverlayHandle, params: &[(String, String)]) -> Result<()>;

    fn set_opacity(&mut self, handle: OverlayHandle, opacity: f64) -> Result<()>;

    fn set_z_index(&mut self, handle: OverlayHandle, z_index: i32) -> Result<()>;

    fn set_zoom_bounds(&mut self, handle: OverlayHandle, zoom: ZoomBounds) -> Result<()>;
}

/// One call made on a [`RecordingSurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayOp {
    Add { handle: OverlayHandle, layer_id: String },
    Remove { handle: OverlayHandle },
    SetUrl { handle: OverlayHandle, url: String },
    SetParams { handle: OverlayHandle, params: Vec<(String, String)> },
    SetOpacity { handle: OverlayHandle, opacity: f64 },
    SetZIndex { handle: OverlayHandle, z_index: i32 },
    SetZoomBounds { handle: OverlayHandle, zoom: ZoomBounds },
}

impl OverlayOp {
    pub fn handle(&self) -> OverlayHandle {
        match self {
            Self::Add { handle, .. }
            | Self::Remove { handle }
            | Self::SetUrl { handle, .. }
            | Self::SetParams { handle, .. }
            | Self::SetOpacity { handle, .. }
            | Self::SetZIndex { handle, .. }
            | Self::SetZoomBounds { handle, .. } => *handle,
        }
    }
}

/// In-memory surface that applies and records every call
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    max_zoom: u8,
    next_handle: u64,
    overlays: HashMap<OverlayHandle, OverlaySpec>,
    ops: Vec<OverlayOp>,
}

impl RecordingSurface {
    pub fn new(max_zoom: u8) -> Self {
        Self {
            max_zoom,
            next_handle: 1,
            overlays: HashMap::default(),
            ops: Vec::new(),
        }
    }

    pub fn set_max_zoom(&mut self, max_zoom: u8) {
        self.max_zoom = max_zoom;
    }

    pub fn ops(&self) -> &[OverlayOp] {
        &self.ops
    }

    /// Drain the recorded calls
    pub fn take_ops(&mut self) -> Vec<OverlayOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn overlay(&self, handle: OverlayHandle) -> Option<&OverlaySpec> {
        self.overlays.get(&handle)
    }

    /// Current overlay for `layer_id`, if one is on the map
    pub fn overlay_for(&self, layer_id: &str) -> Option<(OverlayHandle, &OverlaySpec)> {
        self.overlays
            .iter()
            .find(|(_, spec)| spec.layer_id == layer_id)
            .map(|(handle, spec)| (*handle, spec))
    }

    /// Layer ids bottom to top
    pub fn stacking(&self) -> Vec<&str> {
        let mut specs: Vec<&OverlaySpec> = self.overlays.values().collect();
        specs.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.layer_id.cmp(&b.layer_id)));
        specs.into_iter().map(|s| s.layer_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    fn spec_mut(&mut self, handle: OverlayHandle) -> Result<&mut OverlaySpec> {
        self.overlays
            .get_mut(&handle)
            .ok_or_else(|| LayerError::resolution("surface", format!("no such overlay {}", handle)))
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new(18)
    }
}

impl MapSurface for RecordingSurface {
    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn add_overlay(&mut self, spec: &OverlaySpec) -> Result<OverlayHandle> {
        let handle = OverlayHandle(self.next_handle);
        self.next_handle += 1;
        self.overlays.insert(handle, spec.clone());
        self.ops.push(OverlayOp::Add {
            handle,
            layer_id: spec.layer_id.clone(),
        });
        Ok(handle)
    }

    fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<()> {
        self.overlays.remove(&handle);
        self.ops.push(OverlayOp::Remove { handle });
        Ok(())
    }

    fn set_url(&mut self, handle: OverlayHandle, template: &TileTemplate) -> Result<()> {
        self.spec_mut(handle)?.source = TargetSource::Template(template.clone());
        self.ops.push(OverlayOp::SetUrl {
            handle,
            url: template.to_string(),
        });
        Ok(())
    }

    fn set_params(&mut self, handle: OverlayHandle, params: &[(String, String)]) -> Result<()> {
        let spec = self.spec_mut(handle)?;
        match &mut spec.source {
            TargetSource::MapService(request) => {
                for (key, value) in params {
                    request.set_param(key, value.as_str());
                }
            }
            TargetSource::Template(_) => {
                return Err(LayerError::resolution(
                    spec.layer_id.clone(),
                    "cannot set query parameters on a tile template overlay",
                ))
            }
        }
        self.ops.push(OverlayOp::SetParams {
            handle,
            params: params.to_vec(),
        });
        Ok(())
    }

    fn set_opacity(&mut self, handle: OverlayHandle, opacity: f64) -> Result<()> {
        self.spec_mut(handle)?.opacity = opacity;
        self.ops.push(OverlayOp::SetOpacity { handle, opacity });
        Ok(())
    }

    fn set_z_index(&mut self, handle: OverlayHandle, z_index: i32) -> Result<()> {
        self.spec_mut(handle)?.z_index = z_index;
        self.ops.push(OverlayOp::SetZIndex { handle, z_index });
        Ok(())
    }

    fn set_zoom_bounds(&mut self, handle: OverlayHandle, zoom: ZoomBounds) -> Result<()> {
        self.spec_mut(handle)?.zoom = zoom;
        self.ops.push(OverlayOp::SetZoomBounds { handle, zoom });
        Ok(())
    }
}
