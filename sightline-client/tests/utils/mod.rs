pub mod memory_connector;

pub use fake_transport::*;
pub use fake_uploader::*;
pub use memory_connector::*;
pub use mock_signaling::*;
pub use test_server::*;
