use crate::{
    core::{
        cities::{CityRegistry, Region},
        geo::LatLngBounds,
    },
    LayerError, Result,
};
use chrono::{NaiveDate, Utc};

/// Application state a layer is resolved against.
#[derive(Debug, Clone, PartialEq)]
pub struct MapContext {
    pub region: Region,
    pub date: NaiveDate,
    /// Upper bound for the instrument-era date check
    pub today: NaiveDate,
    pub zoom: f64,
    /// Visible map extent, when the host reports one
    pub viewport: Option<LatLngBounds>,
}

impl MapContext {
    pub fn new(region: Region, date: NaiveDate) -> Self {
        Self {
            region,
            date,
            today: Utc::now().date_naive(),
            zoom: 10.0,
            viewport: None,
        }
    }

    /// Context for a registered city and a `YYYY-MM-DD` date.
    ///
    /// An unknown city falls back to the registry's first city.
    pub fn for_city(registry: &CityRegistry, city: &str, date: &str) -> Result<Self> {
        let region = match registry.region(city) {
            Some(region) => region,
            None => {
                let fallback = registry
                    .default_city()
                    .ok_or_else(|| LayerError::configuration(city, "city registry is empty"))?;
                log::warn!("unknown city {:?}, using {}", city, fallback.name);
                Region::from(fallback)
            }
        };
        Ok(Self::new(region, parse_date(date)?))
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_viewport(mut self, viewport: LatLngBounds) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Area previews and scene searches cover: the viewport if known,
    /// otherwise `buffer_degrees` around the region centre
    pub fn envelope(&self, buffer_degrees: f64) -> LatLngBounds {
        self.viewport
            .unwrap_or_else(|| LatLngBounds::around(self.region.center, buffer_degrees))
    }

    /// Selected date as `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        format_date(self.date)
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        LayerError::Configuration {
            layer: "*".to_string(),
            reason: format!("invalid date {:?}: {}", value, e),
        }
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
