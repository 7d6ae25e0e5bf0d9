//! The seam between the manager and the windowing host.
//!
//! Window handles are owned by the OS and can go stale at any moment, so
//! every identity or geometry read returns a `Result`; traversals drop
//! windows whose handle no longer answers.

#[cfg(target_os = "macos")]
pub mod mac;

use std::rc::Rc;

use crate::sys::geometry::Frame;
use crate::sys::screen::Screen;
use crate::sys::window_server::{WindowId, pid_t};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("window handle is stale")]
pub struct StaleWindow;

/// An opaque OS window handle with stable identity.
pub trait WindowHandle {
    fn id(&self) -> Result<WindowId, StaleWindow>;
    fn pid(&self) -> Result<pid_t, StaleWindow>;
    fn frame(&self) -> Result<Frame, StaleWindow>;
    fn set_frame(&self, frame: Frame) -> Result<(), StaleWindow>;
    fn focus(&self) -> Result<(), StaleWindow>;
    fn title(&self) -> Option<String>;
    fn app_name(&self) -> Option<String>;
    /// A standard, resizable, zoomable document window. Palettes, sheets and
    /// panels fail this and stay out of the grid.
    fn is_standard(&self) -> bool;
    /// Native macOS tab groups share one AX window; tiling them corrupts the
    /// grid, so they are skipped.
    fn is_tabbed(&self) -> bool;
}

pub type WindowRef = Rc<dyn WindowHandle>;

/// The id of a handle, or `None` once it has gone stale.
pub fn live_id(window: &WindowRef) -> Option<WindowId> { window.id().ok() }

/// Listens for OS-initiated moves/resizes of one window. Stopped around
/// every programmatic write so the manager does not react to its own moves.
pub trait UiWatcher {
    fn start(&self);
    fn stop(&self);
}

/// Host-provided collaborators the manager consumes.
pub trait Host {
    fn focused_window(&self) -> Option<WindowRef>;
    fn window_by_id(&self, wid: WindowId) -> Option<WindowRef>;
    /// Every standard on-screen window, used by the startup scan and
    /// `refresh_windows`.
    fn list_windows(&self) -> Vec<WindowRef>;
    fn screen(&self) -> Option<Screen>;
    fn launch_or_focus(&self, app: &str);
    fn spawn(&self, argv: &[String]);
    fn new_watcher(&self, window: &WindowRef) -> Option<Box<dyn UiWatcher>>;
}
