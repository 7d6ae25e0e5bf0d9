//! The cooperative core of the manager.
//!
//! `Wm` owns the state store and the workspace tables and reacts to one
//! event at a time: OS window events, user commands, and its own delayed
//! events. While `paused` is set the tiling handlers are no-ops, so a
//! workspace switch can mutate state without the event storm observing
//! intermediate shapes; the workspace hooks run regardless and carry their
//! own `switching` guard.

use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::actor::events::{Command, Event, Scheduler};
use crate::common::config::Config;
use crate::host::{Host, live_id};
use crate::layout_engine::{FocusContext, TileOutcome, tile_space};
use crate::model::state::StateStore;
use crate::model::virtual_workspace::VirtualWorkspaces;
use crate::sys::screen::{Screen, SpaceId};
use crate::sys::transport::{MoveOp, Transport};
use crate::sys::window_server::WindowId;

/// Focus history: the last focus event and the one before it. The pair feeds
/// the tiling engine's scroll-direction inference, so the shift must happen
/// before the newest id overwrites the slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct FocusHistory {
    last: Option<WindowId>,
    before_last: Option<WindowId>,
}

impl FocusHistory {
    pub fn note(&mut self, wid: WindowId) {
        if self.last == Some(wid) {
            return;
        }
        self.before_last = self.last;
        self.last = Some(wid);
    }

    pub fn forget(&mut self, wid: WindowId) {
        if self.last == Some(wid) {
            self.last = None;
        }
        if self.before_last == Some(wid) {
            self.before_last = None;
        }
    }

    pub fn last(&self) -> Option<WindowId> { self.last }

    pub fn before_last(&self) -> Option<WindowId> { self.before_last }
}

pub struct Wm {
    pub config: Config,
    pub state: StateStore,
    pub workspaces: VirtualWorkspaces,
    pub focus: FocusHistory,
    /// Tiling handlers are no-ops while set.
    pub paused: bool,
    /// Set by screen reconfiguration; consumed by the next switch.
    pub screen_changed: bool,
    pub(crate) host: Rc<dyn Host>,
    pub(crate) transport: Rc<dyn Transport>,
    pub(crate) scheduler: Rc<dyn Scheduler>,
    pub(crate) debounce_token: u64,
    pub(crate) refreshing: bool,
    on_switch: Option<Box<dyn Fn(&str)>>,
}

impl Wm {
    pub fn new(
        config: Config,
        host: Rc<dyn Host>,
        transport: Rc<dyn Transport>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Wm {
        let workspaces = VirtualWorkspaces::new(&config.workspaces);
        Wm {
            config,
            state: StateStore::new(),
            workspaces,
            focus: FocusHistory::default(),
            paused: false,
            screen_changed: false,
            host,
            transport,
            scheduler,
            debounce_token: 0,
            refreshing: false,
            on_switch: None,
        }
    }

    /// Hook invoked after every completed workspace switch, for status bars
    /// and the like.
    pub fn set_on_switch(&mut self, hook: impl Fn(&str) + 'static) {
        self.on_switch = Some(Box::new(hook));
    }

    pub(crate) fn notify_switch(&self, name: &str) {
        if let Some(hook) = &self.on_switch {
            hook(name);
        }
    }

    pub fn screen(&self) -> Option<Screen> { self.host.screen() }

    pub fn current_space(&self) -> Option<SpaceId> { self.host.screen().map(|s| s.space) }

    pub fn focused_wid(&self) -> Option<WindowId> {
        self.host.focused_window().and_then(|w| live_id(&w))
    }

    pub fn handle_event(&mut self, event: Event) {
        trace!(?event, paused = self.paused);
        match event {
            Event::WindowVisible(window) => {
                if !self.paused {
                    self.add_window(&window);
                    self.retile_current();
                }
                self.ws_on_window_created(&window);
            }
            Event::WindowNotVisible(wid) => {
                if !self.paused && self.state.window_index(wid).is_some() {
                    self.remove_window(wid, false);
                    self.retile_current();
                }
            }
            Event::WindowDestroyed(wid) => {
                if !self.paused && self.state.window_index(wid).is_some() {
                    self.remove_window(wid, false);
                    self.retile_current();
                }
                self.state.delete_watcher(wid);
                self.state.set_hidden(wid, false);
                self.state.set_floating(wid, false);
                self.focus.forget(wid);
                self.ws_on_window_destroyed(wid);
            }
            Event::WindowFocused(window) => {
                if !self.paused
                    && let Some(wid) = live_id(&window)
                    && !self.state.is_hidden(wid)
                {
                    self.focus.note(wid);
                }
                self.ws_on_window_focused(&window);
            }
            Event::WindowFrameChanged(wid) => {
                if self.paused || self.state.is_hidden(wid) {
                    return;
                }
                if let Some(index) = self.state.window_index(wid) {
                    self.retile(index.space);
                }
            }
            Event::ScreenParametersChanged => self.ws_on_screen_changed(),
            Event::SettleElapsed => self.ws_finish_setup(),
            Event::FocusDebounceElapsed { wid, token } => self.ws_on_focus_debounce(wid, token),
            Event::DeferredPark(wid) => self.ws_on_deferred_park(wid),
            Event::RestartWatchers(wids) => {
                for wid in wids {
                    if !self.state.is_hidden(wid) && self.state.window_index(wid).is_some() {
                        self.state.start_watcher(wid);
                    }
                }
            }
            Event::Refocus(wid) => {
                if self.focused_wid() != Some(wid)
                    && let Some(window) = self.host.window_by_id(wid)
                {
                    let _ = window.focus();
                }
            }
            Event::Command(command) => self.handle_command(command),
        }
    }

    pub fn handle_command(&mut self, command: Command) {
        debug!(?command);
        match command {
            Command::FocusDirection(direction) => self.focus_direction(direction),
            Command::NextWindow => self.focus_next(),
            Command::PrevWindow => self.focus_previous(),
            Command::SwapDirection(direction) => self.swap_direction(direction),
            Command::Slurp => self.slurp(),
            Command::Barf => self.barf(),
            Command::SwitchWorkspace(name) => self.switch_to(&name, true),
            Command::MoveWindowToWorkspace(name) => self.move_window_to(&name),
            Command::JumpToApp(category) => self.jump_to_app(&category),
            Command::ToggleJump => self.toggle_jump(),
            Command::RefreshWindows => self.refresh_windows(),
        }
    }

    // ---- tiling ----

    pub fn retile_current(&mut self) {
        if let Some(space) = self.current_space() {
            self.retile(space);
        }
    }

    pub fn retile(&mut self, space: SpaceId) { self.retile_with(space, &[]); }

    pub(crate) fn retile_with(&mut self, space: SpaceId, equalize_cols: &[usize]) {
        let Some(screen) = self.screen() else {
            return;
        };
        let focus = FocusContext {
            focused: self.focused_wid().filter(|wid| !self.state.is_hidden(*wid)),
            prior_focused: self.focus.before_last(),
        };
        let outcome = tile_space(
            &mut self.state,
            &self.config.layout,
            &screen.frame,
            space,
            &focus,
            equalize_cols,
        );
        match outcome {
            TileOutcome::Empty => {}
            TileOutcome::AnchorMissing => {
                warn!(?space, "no usable anchor, rescanning windows");
                if !self.refreshing {
                    self.refresh_windows();
                }
            }
            TileOutcome::Tiled(ops) => self.apply_ops(ops),
        }
    }

    /// Apply a move batch with watcher feedback suppression: stop every
    /// affected watcher, move, re-arm after the animation has finished.
    pub(crate) fn apply_ops(&mut self, ops: Vec<MoveOp>) {
        if ops.is_empty() {
            return;
        }
        let wids: Vec<WindowId> = ops.iter().map(|op| WindowId::new(op.wid)).collect();
        for wid in &wids {
            self.state.stop_watcher(*wid);
        }
        self.transport.move_windows(ops);
        self.scheduler.post_after(
            self.config.layout.watcher_restart_delay(),
            Event::RestartWatchers(wids),
        );
    }

    pub(crate) fn post_after(&self, delay: Duration, event: Event) {
        self.scheduler.post_after(delay, event);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::FocusHistory;
    use crate::actor::events::Event;
    use crate::actor::testing::TestRig;
    use crate::sys::geometry::Frame;
    use crate::sys::window_server::WindowId;

    #[test]
    fn focus_history_shifts_before_overwriting() {
        let mut history = FocusHistory::default();
        history.note(WindowId::new(1));
        history.note(WindowId::new(2));
        assert_eq!(history.last(), Some(WindowId::new(2)));
        assert_eq!(history.before_last(), Some(WindowId::new(1)));

        // Repeated focus of the same window must not clobber the pair.
        history.note(WindowId::new(2));
        assert_eq!(history.before_last(), Some(WindowId::new(1)));

        history.note(WindowId::new(3));
        assert_eq!(history.last(), Some(WindowId::new(3)));
        assert_eq!(history.before_last(), Some(WindowId::new(2)));
    }

    #[test]
    fn paused_router_drops_window_events() {
        let mut rig = TestRig::new();
        rig.wm.paused = true;
        let window = rig.host.add_window(1, 100, Frame::new(0.0, 0.0, 400.0, 400.0));
        rig.wm.handle_event(Event::WindowVisible(window));
        assert_eq!(rig.wm.state.window_index(WindowId::new(1)), None);

        rig.wm.paused = false;
        let window = rig.host.window(1).expect("window").handle();
        rig.wm.handle_event(Event::WindowVisible(window));
        assert!(rig.wm.state.window_index(WindowId::new(1)).is_some());
    }

    #[test]
    fn destroy_clears_every_trace() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.focus(1);
        rig.destroy(1);
        assert_eq!(rig.wm.state.window_index(WindowId::new(1)), None);
        assert!(!rig.wm.state.is_hidden(WindowId::new(1)));
        assert_eq!(rig.wm.focus.last(), None);
        assert!(!rig.wm.workspaces.is_tracked(WindowId::new(1)));
    }

    #[test]
    fn refocus_pass_reasserts_a_stolen_focus() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.add_window(2, 100);
        rig.focus(1);
        // macOS stole focus back to window 2 after the animation.
        rig.host.set_focused(Some(WindowId::new(2)));
        rig.wm.handle_event(Event::Refocus(WindowId::new(1)));
        assert_eq!(rig.host.focused_id(), Some(WindowId::new(1)));
    }

    #[test]
    fn frame_changes_of_hidden_windows_are_ignored() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.wm.state.set_hidden(WindowId::new(1), true);
        let batches_before = rig.transport.sync_batches.borrow().len();
        rig.wm.handle_event(Event::WindowFrameChanged(WindowId::new(1)));
        assert_eq!(rig.transport.sync_batches.borrow().len(), batches_before);
    }
}
