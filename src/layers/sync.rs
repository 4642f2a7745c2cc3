//! Keeping the map surface in step with the active layer list.
//!
//! Each [`OverlaySynchronizer::reconcile`] pass removes overlays that left
//! the list, resolves every layer whose context or host maximum zoom changed
//! and applies the results as additions, in-place patches or replacements.
//! Resolutions of one
//! pass run concurrently; the overlay state is only touched while no
//! resolution is pending on this pass, and a result whose context is no
//! longer the latest one requested is dropped.

use crate::{
    core::context::MapContext,
    layers::{
        resolver::{ContextFingerprint, ResolvedTarget, Resolver, TargetSource},
        surface::{MapSurface, OverlayHandle, OverlaySpec},
    },
    prelude::{HashMap, HashSet},
    LayerError, Result,
};
use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard};

/// An overlay currently on the surface
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOverlay {
    pub handle: OverlayHandle,
    pub target: ResolvedTarget,
    /// Surface maximum zoom the target was resolved against
    pub host_max_zoom: u8,
}

impl ActiveOverlay {
    pub fn fingerprint(&self) -> &ContextFingerprint {
        &self.target.fingerprint
    }

    pub fn z_index(&self) -> i32 {
        self.target.z_index
    }
}

/// Overlays by layer id, with a render order sorted by z-index
#[derive(Debug, Clone, Default)]
pub struct ActiveOverlaySet {
    overlays: HashMap<String, ActiveOverlay>,
    render_order: Vec<String>,
}

impl ActiveOverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the overlay for `layer_id`
    pub fn insert(&mut self, layer_id: &str, overlay: ActiveOverlay) {
        let z_index = overlay.z_index();
        self.render_order.retain(|id| id != layer_id);
        self.overlays.insert(layer_id.to_string(), overlay);

        // Insert in sorted order by z-index
        let insert_pos = self
            .render_order
            .iter()
            .position(|id| {
                self.overlays
                    .get(id)
                    .map(|o| o.z_index() > z_index)
                    .unwrap_or(false)
            })
            .unwrap_or(self.render_order.len());

        self.render_order.insert(insert_pos, layer_id.to_string());
    }

    pub fn remove(&mut self, layer_id: &str) -> Option<ActiveOverlay> {
        self.render_order.retain(|id| id != layer_id);
        self.overlays.remove(layer_id)
    }

    pub fn get(&self, layer_id: &str) -> Option<&ActiveOverlay> {
        self.overlays.get(layer_id)
    }

    pub fn contains(&self, layer_id: &str) -> bool {
        self.overlays.contains_key(layer_id)
    }

    /// Layer ids bottom to top
    pub fn render_order(&self) -> &[String] {
        &self.render_order
    }

    /// Overlays bottom to top
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActiveOverlay)> {
        self.render_order
            .iter()
            .filter_map(|id| self.overlays.get(id).map(|o| (id.as_str(), o)))
    }

    /// Re-sort after z-index changes
    pub fn update_render_order(&mut self) {
        let overlays = &self.overlays;
        self.render_order.sort_by(|a, b| {
            let z_a = overlays.get(a).map(|o| o.z_index()).unwrap_or(0);
            let z_b = overlays.get(b).map(|o| o.z_index()).unwrap_or(0);
            z_a.cmp(&z_b)
        });
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}

/// What a pass did to one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOutcome {
    Added,
    /// Updated in place; lists the parts that changed
    Patched(Vec<&'static str>),
    /// Removed and re-added, e.g. after a provider kind change
    Replaced,
    Unchanged,
    Removed,
    Skipped(String),
    /// Resolved for a context that is no longer the latest request
    Superseded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcomes: Vec<(String, LayerOutcome)>,
}

impl ReconcileReport {
    fn push(&mut self, layer_id: &str, outcome: LayerOutcome) {
        self.outcomes.push((layer_id.to_string(), outcome));
    }

    pub fn outcome(&self, layer_id: &str) -> Option<&LayerOutcome> {
        self.outcomes
            .iter()
            .rev()
            .find(|(id, _)| id == layer_id)
            .map(|(_, outcome)| outcome)
    }

    /// Ids whose outcome satisfies `pred`, in report order
    pub fn ids_where(&self, pred: impl Fn(&LayerOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn added(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, LayerOutcome::Added))
    }

    pub fn removed(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, LayerOutcome::Removed))
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, LayerOutcome::Skipped(_)))
    }

    /// True if the pass left the surface untouched
    pub fn is_noop(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, o)| matches!(o, LayerOutcome::Unchanged | LayerOutcome::Superseded))
    }
}

struct SyncState<S> {
    surface: S,
    active: ActiveOverlaySet,
    /// Latest fingerprint requested per layer id
    requested: HashMap<String, ContextFingerprint>,
}

/// Reconciles a [`MapSurface`] against the active layer list
pub struct OverlaySynchronizer<S: MapSurface> {
    resolver: Arc<Resolver>,
    state: Mutex<SyncState<S>>,
}

impl<S: MapSurface> OverlaySynchronizer<S> {
    pub fn new(resolver: Arc<Resolver>, surface: S) -> Self {
        Self {
            resolver,
            state: Mutex::new(SyncState {
                surface,
                active: ActiveOverlaySet::new(),
                requested: HashMap::default(),
            }),
        }
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    fn lock(&self) -> MutexGuard<'_, SyncState<S>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("overlay state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Bring the surface in line with `active_ids` under `ctx`
    pub async fn reconcile<I: AsRef<str>>(&self, active_ids: &[I], ctx: &MapContext) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let mut seen = HashSet::default();
        let wanted: Vec<&str> = active_ids
            .iter()
            .map(AsRef::as_ref)
            .filter(|id| seen.insert(*id))
            .collect();

        let (pending, host_max_zoom) = {
            let mut state = self.lock();
            state.remove_inactive(&seen, &mut report);
            let host_max_zoom = state.surface.max_zoom();

            let mut pending = Vec::new();
            for id in &wanted {
                let fingerprint = ContextFingerprint::new(id, ctx);
                state.requested.insert(id.to_string(), fingerprint.clone());
                let unchanged = state
                    .active
                    .get(id)
                    .map(|overlay| {
                        *overlay.fingerprint() == fingerprint
                            && overlay.host_max_zoom == host_max_zoom
                    })
                    .unwrap_or(false);
                if unchanged {
                    report.push(id, LayerOutcome::Unchanged);
                } else {
                    pending.push((*id, fingerprint));
                }
            }
            (pending, host_max_zoom)
        };

        if !pending.is_empty() {
            log::debug!("resolving {} layers", pending.len());
        }
        let results = join_all(
            pending
                .iter()
                .map(|(id, _)| self.resolver.resolve(id, ctx, host_max_zoom)),
        )
        .await;

        let mut state = self.lock();
        for ((id, fingerprint), result) in pending.into_iter().zip(results) {
            let outcome = state.apply(id, &fingerprint, result, host_max_zoom);
            report.push(id, outcome);
        }
        state.active.update_render_order();

        log::info!(
            "reconciled {} layers: {} added, {} removed, {} skipped",
            wanted.len(),
            report.added().len(),
            report.removed().len(),
            report.skipped().len()
        );
        report
    }

    /// Remove every overlay
    pub fn clear(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut state = self.lock();
        state.remove_inactive(&HashSet::default(), &mut report);
        report
    }

    /// Active layer ids bottom to top
    pub fn active_ids(&self) -> Vec<String> {
        self.lock().active.render_order().to_vec()
    }

    pub fn active_target(&self, layer_id: &str) -> Option<ResolvedTarget> {
        self.lock().active.get(layer_id).map(|o| o.target.clone())
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().surface)
    }

    pub fn with_surface_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock().surface)
    }

    pub fn with_active<R>(&self, f: impl FnOnce(&ActiveOverlaySet) -> R) -> R {
        f(&self.lock().active)
    }

    pub fn into_surface(self) -> S {
        match self.state.into_inner() {
            Ok(state) => state.surface,
            Err(poisoned) => poisoned.into_inner().surface,
        }
    }
}

impl<S: MapSurface> SyncState<S> {
    /// Drop overlays and pending requests for ids outside `keep`
    fn remove_inactive(&mut self, keep: &HashSet<&str>, report: &mut ReconcileReport) {
        self.requested.retain(|id, _| keep.contains(id.as_str()));

        let leaving: Vec<String> = self
            .active
            .render_order()
            .iter()
            .filter(|id| !keep.contains(id.as_str()))
            .cloned()
            .collect();

        for id in leaving {
            if let Some(overlay) = self.active.remove(&id) {
                if let Err(e) = self.surface.remove_overlay(overlay.handle) {
                    log::warn!("surface refused to remove {}: {}", id, e);
                }
                report.push(&id, LayerOutcome::Removed);
            }
        }
    }

    fn apply(
        &mut self,
        layer_id: &str,
        fingerprint: &ContextFingerprint,
        result: Result<ResolvedTarget>,
        host_max_zoom: u8,
    ) -> LayerOutcome {
        if self.requested.get(layer_id) != Some(fingerprint) {
            log::debug!("discarding stale resolution {}", fingerprint);
            return LayerOutcome::Superseded;
        }

        let target = match result {
            Ok(target) => target,
            Err(e) => return self.fail(layer_id, e),
        };

        let Some(existing) = self.active.get(layer_id).cloned() else {
            return self.add(layer_id, target, host_max_zoom, LayerOutcome::Added);
        };

        if !same_addressing_shape(&existing.target, &target) {
            self.detach(layer_id, existing.handle);
            return self.add(layer_id, target, host_max_zoom, LayerOutcome::Replaced);
        }

        match self.patch(existing.handle, &existing.target, &target) {
            Ok(changed) => {
                self.active.insert(
                    layer_id,
                    ActiveOverlay {
                        handle: existing.handle,
                        target,
                        host_max_zoom,
                    },
                );
                if changed.is_empty() {
                    LayerOutcome::Unchanged
                } else {
                    LayerOutcome::Patched(changed)
                }
            }
            Err(e) => {
                log::warn!("patching {} failed ({}), re-adding", layer_id, e);
                self.detach(layer_id, existing.handle);
                self.add(layer_id, target, host_max_zoom, LayerOutcome::Replaced)
            }
        }
    }

    fn fail(&mut self, layer_id: &str, error: LayerError) -> LayerOutcome {
        if error.is_skippable() {
            log::warn!("skipping layer {}: {}", layer_id, error);
        } else {
            log::error!("layer {} failed: {}", layer_id, error);
        }
        self.requested.remove(layer_id);
        if let Some(existing) = self.active.get(layer_id).map(|o| o.handle) {
            self.detach(layer_id, existing);
        }
        LayerOutcome::Skipped(error.to_string())
    }

    fn add(
        &mut self,
        layer_id: &str,
        target: ResolvedTarget,
        host_max_zoom: u8,
        outcome: LayerOutcome,
    ) -> LayerOutcome {
        match self.surface.add_overlay(&OverlaySpec::from(&target)) {
            Ok(handle) => {
                log::debug!("added {} as {}", layer_id, handle);
                self.active.insert(
                    layer_id,
                    ActiveOverlay {
                        handle,
                        target,
                        host_max_zoom,
                    },
                );
                outcome
            }
            Err(e) => {
                log::warn!("surface refused overlay {}: {}", layer_id, e);
                self.requested.remove(layer_id);
                LayerOutcome::Skipped(e.to_string())
            }
        }
    }

    fn detach(&mut self, layer_id: &str, handle: OverlayHandle) {
        self.active.remove(layer_id);
        if let Err(e) = self.surface.remove_overlay(handle) {
            log::warn!("surface refused to remove {}: {}", layer_id, e);
        }
    }

    /// Apply only the differences between `old` and `new`
    fn patch(
        &mut self,
        handle: OverlayHandle,
        old: &ResolvedTarget,
        new: &ResolvedTarget,
    ) -> Result<Vec<&'static str>> {
        let mut changed = Vec::new();

        match (&old.source, &new.source) {
            (TargetSource::Template(before), TargetSource::Template(after)) => {
                if before != after {
                    self.surface.set_url(handle, after)?;
                    changed.push("url");
                }
            }
            (TargetSource::MapService(before), TargetSource::MapService(after)) => {
                let params: Vec<(String, String)> = after
                    .changed_params(before)
                    .into_iter()
                    .map(|key| {
                        let value = after.param(&key).unwrap_or_default().to_string();
                        (key, value)
                    })
                    .collect();
                if !params.is_empty() {
                    self.surface.set_params(handle, &params)?;
                    changed.push("params");
                }
            }
            _ => {
                return Err(LayerError::resolution(&new.layer_id, "source shape changed"));
            }
        }

        if old.opacity != new.opacity {
            self.surface.set_opacity(handle, new.opacity)?;
            changed.push("opacity");
        }
        if old.z_index != new.z_index {
            self.surface.set_z_index(handle, new.z_index)?;
            changed.push("z_index");
        }
        if old.zoom != new.zoom {
            self.surface.set_zoom_bounds(handle, new.zoom)?;
            changed.push("zoom");
        }
        Ok(changed)
    }
}

/// Whether `new` can be applied to `old`'s overlay in place
fn same_addressing_shape(old: &ResolvedTarget, new: &ResolvedTarget) -> bool {
    if old.kind != new.kind {
        return false;
    }
    match (&old.source, &new.source) {
        (TargetSource::Template(_), TargetSource::Template(_)) => true,
        (TargetSource::MapService(a), TargetSource::MapService(b)) => a.base_url == b.base_url,
        _ => false,
    }
}
