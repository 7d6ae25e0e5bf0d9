#[cfg(target_os = "macos")]
pub mod ax;
pub mod geometry;
pub mod screen;
pub mod transport;
pub mod window_server;
