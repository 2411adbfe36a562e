pub use sightline_core::model::{ClientId, Envelope, SignalMessage};

pub mod model {
    pub use sightline_core::model::*;
}

pub mod metrics {
    pub use sightline_core::metrics::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use sightline_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use sightline_client::*;
}
