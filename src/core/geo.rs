use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Web Mercator projection constants
const EARTH_RADIUS: f64 = 6378137.0;
const MAX_LATITUDE: f64 = 85.0511287798;

/// A geographical coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Clamps latitude to the Web Mercator range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Projects to Web Mercator metres (EPSG:3857)
    pub fn to_mercator(&self) -> (f64, f64) {
        let lat = Self::clamp_lat(self.lat);
        let x = self.lng.to_radians() * EARTH_RADIUS;
        let y = ((PI / 4.0 + lat.to_radians() / 2.0).tan().ln()) * EARTH_RADIUS;
        (x, y)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A bounding box of geographical coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Square envelope of `buffer` degrees around `center`
    pub fn around(center: LatLng, buffer: f64) -> Self {
        Self::from_coords(
            center.lat - buffer,
            center.lng - buffer,
            center.lat + buffer,
            center.lng + buffer,
        )
    }

    pub fn west(&self) -> f64 {
        self.south_west.lng
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn east(&self) -> f64 {
        self.north_east.lng
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    /// `west,south,east,north` with fixed precision, the axis order WMS 1.3.0
    /// expects for CRS:84-style longitude-first requests.
    pub fn to_bbox_param(&self, precision: usize) -> String {
        [self.west(), self.south(), self.east(), self.north()]
            .iter()
            .map(|v| format!("{:.*}", precision, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Same envelope in EPSG:3857 metres, `minx,miny,maxx,maxy`
    pub fn to_mercator_bbox_param(&self) -> String {
        let (min_x, min_y) = self.south_west.to_mercator();
        let (max_x, max_y) = self.north_east.to_mercator();
        format!("{:.2},{:.2},{:.2},{:.2}", min_x, min_y, max_x, max_y)
    }

    /// Closed WKT polygon ring, clockwise from the north-west corner
    pub fn to_wkt_polygon(&self, precision: usize) -> String {
        let fmt = |v: f64| format!("{:.*}", precision, v);
        let corners = [
            (self.west(), self.north()),
            (self.east(), self.north()),
            (self.east(), self.south()),
            (self.west(), self.south()),
            (self.west(), self.north()),
        ];
        let ring = corners
            .iter()
            .map(|(x, y)| format!("{} {}", fmt(*x), fmt(*y)))
            .collect::<Vec<_>>()
            .join(",");
        format!("POLYGON(({}))", ring)
    }
}

/// A tile coordinate in the slippy map tile system (x = column, y = row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Tile containing `lat_lng` at `zoom` (GoogleMapsCompatible tiling)
    pub fn from_lat_lng(lat_lng: &LatLng, zoom: u8) -> Self {
        let lat_rad = LatLng::clamp_lat(lat_lng.lat).to_radians();
        let n = 2_f64.powi(zoom as i32);
        let max_index = n as u32 - 1;

        let x = ((lat_lng.lng + 180.0) / 360.0 * n).floor() as u32;
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor() as u32;

        Self::new(x.min(max_index), y.min(max_index), zoom)
    }
}
