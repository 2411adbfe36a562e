mod stream_client;
mod stream_registry;

pub use stream_client::{StreamClient, StreamMetrics};
pub use stream_registry::{RegistryConfig, StreamRegistry};
