use crate::core::{config::PlaceholderOrder, geo::TileCoord};
use url::form_urlencoded;

/// Placeholders a map surface is expected to fill in itself.
pub const SURFACE_PLACEHOLDERS: [&str; 3] = ["z", "x", "y"];

/// A tile URL template with `{z}`, `{x}` (column) and `{y}` (row) placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileTemplate(String);

impl TileTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// `{base}/{product}/default/{time}/{tms}/{z}/{y}/{x}.{format}` in the default order
    pub fn wmts_rest(
        base_url: &str,
        product: &str,
        time: &str,
        tile_matrix_set: &str,
        format: &str,
        order: PlaceholderOrder,
    ) -> Self {
        Self(format!(
            "{}/{}/default/{}/{}/{}.{}",
            base_url.trim_end_matches('/'),
            product,
            time,
            tile_matrix_set,
            order.tile_path(),
            format
        ))
    }

    /// Converts a WMTS `ResourceURL` template into surface placeholders.
    ///
    /// `{TileRow}` and `{TileCol}` keep their positions, so the result is
    /// correct whatever order the service publishes.
    pub fn from_wmts_resource(resource: &str, tile_matrix_set: &str, time: &str) -> Self {
        Self(
            resource
                .replace("{TileMatrixSet}", tile_matrix_set)
                .replace("{TileMatrix}", "{z}")
                .replace("{TileRow}", "{y}")
                .replace("{TileCol}", "{x}")
                .replace("{Time}", time),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Every `{name}` token in the template
    pub fn placeholders(&self) -> Vec<&str> {
        let mut found = Vec::new();
        let mut rest = self.0.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    found.push(&after[..end]);
                    rest = &after[end + 1..];
                }
                None => break,
            }
        }
        found
    }

    /// Tokens the map surface would not know how to fill
    pub fn unresolved_placeholders(&self) -> Vec<&str> {
        self.placeholders()
            .into_iter()
            .filter(|p| !SURFACE_PLACEHOLDERS.contains(p))
            .collect()
    }

    /// Concrete tile URL, filling placeholders the way the surface does
    pub fn expand(&self, coord: TileCoord) -> String {
        self.0
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}

impl std::fmt::Display for TileTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parametrized map-service (WMS GetMap) request without its bounding box.
///
/// Parameters keep insertion order so generated URLs are stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapServiceRequest {
    pub base_url: String,
    params: Vec<(String, String)>,
}

impl MapServiceRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_param(key, value);
        self
    }

    /// Insert or replace `key` (case-insensitive, like WMS servers)
    pub fn set_param(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .params
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
    }

    pub fn remove_param(&mut self, key: &str) -> Option<String> {
        let pos = self
            .params
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.params.remove(pos).1)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Keys whose values differ from `other`, including keys only one side has
    pub fn changed_params(&self, other: &MapServiceRequest) -> Vec<String> {
        let mut changed: Vec<String> = self
            .params
            .iter()
            .filter(|(k, v)| other.param(k) != Some(v.as_str()))
            .map(|(k, _)| k.clone())
            .collect();
        changed.extend(
            other
                .params
                .iter()
                .filter(|(k, _)| self.param(k).is_none())
                .map(|(k, _)| k.clone()),
        );
        changed
    }

    /// URL with an explicit `bbox` value
    pub fn url_for_bbox(&self, bbox: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}&bbox={}", self.base_url, separator, query, bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wmts_rest_column_row() {
        let template = TileTemplate::wmts_rest(
            "https://example.test/wmts/",
            "PRODUCT",
            "2024-03-10",
            "GoogleMapsCompatible_Level9",
            "png",
            PlaceholderOrder::ColumnRow,
        );

        assert_eq!(
            template.as_str(),
            "https://example.test/wmts/PRODUCT/default/2024-03-10/GoogleMapsCompatible_Level9/{z}/{x}/{y}.png"
        );
        assert!(template.unresolved_placeholders().is_empty());
    }

    #[test]
    fn test_expand_fills_column_then_row() {
        let column_row = TileTemplate::new("https://t.test/{z}/{x}/{y}.png");
        let row_column = TileTemplate::new("https://t.test/{z}/{y}/{x}.png");
        let coord = TileCoord::new(856, 470, 10);

        assert_eq!(column_row.expand(coord), "https://t.test/10/856/470.png");
        assert_eq!(row_column.expand(coord), "https://t.test/10/470/856.png");
    }

    #[test]
    fn test_from_wmts_resource() {
        let resource = "https://gibs.test/LST/default/{Time}/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.png";
        let template = TileTemplate::from_wmts_resource(resource, "GoogleMapsCompatible_Level9", "2024-01-15");

        assert_eq!(
            template.as_str(),
            "https://gibs.test/LST/default/2024-01-15/GoogleMapsCompatible_Level9/{z}/{y}/{x}.png"
        );
        assert!(template.unresolved_placeholders().is_empty());
    }

    #[test]
    fn test_unresolved_placeholders() {
        let template = TileTemplate::new("https://{s}.tiles.test/{z}/{x}/{y}{r}.png");
        assert_eq!(template.placeholders(), vec!["s", "z", "x", "y", "r"]);
        assert_eq!(template.unresolved_placeholders(), vec!["s", "r"]);
    }

    #[test]
    fn test_map_service_params() {
        let mut request = MapServiceRequest::new("https://wms.test/wms")
            .with_param("service", "WMS")
            .with_param("layers", "a:b");

        request.set_param("LAYERS", "c:d");
        assert_eq!(request.param("layers"), Some("c:d"));
        assert_eq!(request.params().len(), 2);

        let other = request.clone().with_param("time", "2024-01-01");
        assert_eq!(request.changed_params(&other), vec!["time".to_string()]);

        assert_eq!(request.remove_param("service").as_deref(), Some("WMS"));
        assert_eq!(
            request.url_for_bbox("{bbox-epsg-3857}"),
            "https://wms.test/wms?layers=c%3Ad&bbox={bbox-epsg-3857}"
        );
    }
}
