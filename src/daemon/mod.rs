mod service;

pub use service::{handle_payload, serve, wait_for_shutdown};
