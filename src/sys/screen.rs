//! Screen and Mission Control space identity.

use serde::{Deserialize, Serialize};

use crate::sys::geometry::Frame;

/// A Mission Control space id. All managed windows share one active space at
/// a time; virtual workspaces are layered on top of it.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(u64);

impl SpaceId {
    pub const fn new(id: u64) -> Self { SpaceId(id) }

    pub fn get(&self) -> u64 { self.0 }
}

impl std::fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "space#{}", self.0)
    }
}

/// Snapshot of the screen the manager lays out on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Screen {
    pub frame: Frame,
    pub space: SpaceId,
}

impl Screen {
    /// The park position: one pixel inside the bottom-right corner, so macOS
    /// does not clamp the window back on screen.
    pub fn park_point(&self) -> (f64, f64) { (self.frame.x2() - 1.0, self.frame.y2() - 1.0) }
}
