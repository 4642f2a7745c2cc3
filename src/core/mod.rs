pub mod cities;
pub mod config;
pub mod constants;
pub mod context;
pub mod geo;
