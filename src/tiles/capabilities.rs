//! WMTS capabilities documents
//!
//! Only the parts the resolver needs are kept: per-layer time dimensions,
//! tile `ResourceURL` templates, tile matrix set links, and the zoom levels
//! each tile matrix set enumerates. Elements are matched by local name so the
//! `wmts` / `ows` namespace prefixes do not matter.

use crate::{prelude::HashMap, tiles::time::TimeDimension, LayerError, Result};
use roxmltree::Node;
use serde::{Deserialize, Serialize};

/// Where a provider publishes its capabilities, keyed by provider/projection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityEndpoint {
    pub provider: String,
    pub projection: String,
    pub url: String,
}

impl CapabilityEndpoint {
    pub fn new(
        provider: impl Into<String>,
        projection: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            projection: projection.into(),
            url: url.into(),
        }
    }

    /// Cache key: one document per provider and projection
    pub fn key(&self) -> (String, String) {
        (self.provider.clone(), self.projection.clone())
    }
}

impl std::fmt::Display for CapabilityEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.projection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTemplate {
    pub format: Option<String>,
    pub resource_type: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerCapabilities {
    pub identifier: String,
    pub time: Option<TimeDimension>,
    pub resources: Vec<ResourceTemplate>,
    pub tile_matrix_sets: Vec<String>,
}

impl LayerCapabilities {
    /// Best tile template: one carrying a `{Time}` placeholder if published
    pub fn tile_template(&self) -> Option<&str> {
        let tiles = || {
            self.resources
                .iter()
                .filter(|r| r.resource_type.eq_ignore_ascii_case("tile"))
        };
        tiles()
            .find(|r| r.template.contains("{Time}"))
            .or_else(|| tiles().next())
            .map(|r| r.template.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityDocument {
    layers: HashMap<String, LayerCapabilities>,
    /// Tile matrix set identifier → tile matrix identifiers
    tile_matrix_sets: HashMap<String, Vec<String>>,
}

impl CapabilityDocument {
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "Capabilities" {
            return Err(LayerError::capability(
                "wmts",
                format!("unexpected root element <{}>", root.tag_name().name()),
            ));
        }
        let contents = child(root, "Contents")
            .ok_or_else(|| LayerError::capability("wmts", "document has no Contents section"))?;

        let mut document = Self::default();

        for node in children(contents, "Layer") {
            let layer = parse_layer(node);
            if layer.identifier.is_empty() {
                log::debug!("skipping capabilities layer without identifier");
                continue;
            }
            document.layers.insert(layer.identifier.clone(), layer);
        }

        for node in children(contents, "TileMatrixSet") {
            let Some(identifier) = child_text(node, "Identifier") else {
                continue;
            };
            let matrices = children(node, "TileMatrix")
                .filter_map(|m| child_text(m, "Identifier"))
                .collect();
            document.tile_matrix_sets.insert(identifier, matrices);
        }

        log::debug!(
            "parsed capabilities: {} layers, {} tile matrix sets",
            document.layers.len(),
            document.tile_matrix_sets.len()
        );
        Ok(document)
    }

    pub fn layer(&self, identifier: &str) -> Option<&LayerCapabilities> {
        self.layers.get(identifier)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Highest enumerated zoom level of a tile matrix set.
    ///
    /// Identifiers such as `EPSG:3857:9` count by their last segment;
    /// non-numeric identifiers are ignored.
    pub fn max_zoom(&self, tile_matrix_set: &str) -> Option<u8> {
        self.tile_matrix_sets
            .get(tile_matrix_set)?
            .iter()
            .filter_map(|id| id.rsplit(':').next()?.trim().parse::<u8>().ok())
            .max()
    }
}

fn parse_layer(node: Node<'_, '_>) -> LayerCapabilities {
    let identifier = child_text(node, "Identifier").unwrap_or_default();

    let time = children(node, "Dimension")
        .find(|d| {
            child_text(*d, "Identifier")
                .map(|id| id.eq_ignore_ascii_case("time"))
                .unwrap_or(false)
        })
        .map(|d| {
            let values: Vec<String> = children(d, "Value").filter_map(text).collect();
            let default = child_text(d, "Default");
            TimeDimension::from_raw(values.iter().map(String::as_str), default.as_deref())
        });

    let resources = children(node, "ResourceURL")
        .filter_map(|r| {
            Some(ResourceTemplate {
                format: r.attribute("format").map(str::to_string),
                resource_type: r.attribute("resourceType").unwrap_or("tile").to_string(),
                template: r.attribute("template")?.to_string(),
            })
        })
        .collect();

    let tile_matrix_sets = children(node, "TileMatrixSetLink")
        .filter_map(|link| child_text(link, "TileMatrixSet"))
        .collect();

    LayerCapabilities {
        identifier,
        time,
        resources,
        tile_matrix_sets,
    }
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn text(node: Node<'_, '_>) -> Option<String> {
    let value = node.text()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).and_then(text)
}
