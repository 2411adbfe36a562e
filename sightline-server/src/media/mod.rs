mod error;
mod media_router;
mod room;
mod router;
mod transport;
mod worker;
mod worker_command;

pub use error::MediaError;
pub use media_router::{MediaRouter, RouterHandle};
pub use worker::WorkerDeath;
