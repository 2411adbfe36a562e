
pub use test_server::*;
pub use ws_client::*;
