mod frames;
mod health;
mod rooms;

pub use frames::{CLIENT_ID_HEADER, latest_frame, upload_frame};
pub use health::health;
pub use rooms::{create_room, join_room};
