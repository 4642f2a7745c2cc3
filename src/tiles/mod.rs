pub mod cache;
pub mod capabilities;
pub mod loader;
pub mod source;
pub mod time;

// Re-exports for convenience
pub use cache::CapabilityCache;
pub use capabilities::{CapabilityDocument, CapabilityEndpoint};
pub use loader::{CapabilitySource, HttpFetch, LiveCapabilities, NoCapabilities};
pub use source::{MapServiceRequest, TileTemplate};
