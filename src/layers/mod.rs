pub mod catalog;
pub mod explorer;
pub mod resolver;
pub mod surface;
pub mod sync;
