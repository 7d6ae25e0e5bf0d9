//! The workspace manager: partitioning one physical space into named
//! virtual workspaces.
//!
//! Inactive workspaces exist only as parked windows plus snapshot state.
//! Switching never touches Mission Control: the target's windows are moved
//! back to their saved frames synchronously, the old ones are flung to the
//! bottom-right pixel asynchronously, and the grid is swapped from the
//! target's snapshot. The whole protocol runs between one pause/resume pair
//! with the `switching` guard held.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::actor::events::Event;
use crate::host::{WindowRef, live_id};
use crate::model::virtual_workspace::JumpPoint;
use crate::sys::screen::Screen;
use crate::sys::transport::{FrameEntry, MoveOp};
use crate::sys::window_server::WindowId;

use super::wm::Wm;

/// Let macOS settle window placement after launch before partitioning.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);
/// Focus resting on another workspace's window this long triggers a switch.
pub const FOCUS_DEBOUNCE: Duration = Duration::from_millis(300);
/// A window created onto an inactive workspace is parked after the app has
/// finished placing it.
pub const CREATE_PARK_DELAY: Duration = Duration::from_millis(100);

impl Wm {
    /// Assign every existing window to a workspace via the rules and kick
    /// off the deferred partition. Focus-triggered switches stay blocked
    /// until the partition has run.
    pub fn setup_workspaces(&mut self) {
        self.workspaces.switching = true;
        let current = self.workspaces.current().to_string();
        for window in self.host.list_windows() {
            let Some(wid) = live_id(&window) else { continue };
            let name = self
                .workspaces
                .resolve_workspace(&window)
                .unwrap_or_else(|| current.clone());
            self.workspaces.assign(wid, &name, window.pid().ok());
            if self.workspaces.is_scratch(&name) {
                self.state.set_floating(wid, true);
            }
        }
        info!(%current, "workspaces configured, waiting to settle");
        self.post_after(SETTLE_DELAY, Event::SettleElapsed);
    }

    /// The deferred half of setup: split the grid into per-workspace
    /// snapshots, park everything off the current workspace, retile.
    pub(crate) fn ws_finish_setup(&mut self) {
        let Some(screen) = self.screen() else {
            self.workspaces.switching = false;
            return;
        };
        let space = screen.space;
        self.paused = true;
        let current = self.workspaces.current().to_string();

        let full = self.state.snapshot_space(space);
        for name in self.workspaces.names().to_vec() {
            if name == current {
                continue;
            }
            let mut snapshot = full.clone();
            snapshot.retain(|wid| self.workspaces.member_of(&name, wid));
            if !snapshot.is_empty() {
                self.workspaces.set_snapshot(&name, snapshot);
            }
        }

        let offstage: Vec<WindowId> = self
            .workspaces
            .tracked_ids()
            .into_iter()
            .filter(|wid| self.workspaces.workspace_of(*wid) != Some(current.as_str()))
            .collect();

        let entries: Vec<FrameEntry> = offstage
            .iter()
            .filter_map(|wid| self.workspaces.pid_of(*wid).map(|pid| FrameEntry { wid: *wid, pid }))
            .collect();
        for (wid, frame) in self.transport.read_frames(entries) {
            self.workspaces.save_frame(wid, frame);
        }

        for wid in &offstage {
            if self.state.window_index(*wid).is_some() {
                self.state.remove_from_grid(*wid);
            }
            self.state.stop_watcher(*wid);
            self.state.set_hidden(*wid, true);
        }
        let park = self.park_ops(&offstage, &screen);
        self.transport.move_windows(park);

        self.workspaces.set_snapshot(&current, self.state.snapshot_space(space));
        self.paused = false;
        self.retile(space);
        self.workspaces.switching = false;
        info!(%current, parked = offstage.len(), "workspace partition complete");
    }

    /// The switch protocol. `save_jump` is false for focus-triggered
    /// switches, which are not user-initiated jumps.
    pub fn switch_to(&mut self, name: &str, save_jump: bool) {
        if self.workspaces.switching {
            return;
        }
        if !self.workspaces.contains(name) {
            debug!(name, "unknown workspace");
            return;
        }
        let mut target = name.to_string();
        if target == self.workspaces.current() {
            let redirect = self
                .workspaces
                .toggle_back
                .then(|| self.workspaces.prev_jump().map(|jump| jump.workspace.clone()))
                .flatten();
            match redirect {
                Some(back) if back != self.workspaces.current() => target = back,
                _ => return,
            }
        }
        let Some(screen) = self.screen() else {
            warn!("no screen, not switching");
            return;
        };
        let space = screen.space;

        if save_jump {
            self.workspaces.set_prev_jump(Some(JumpPoint {
                workspace: self.workspaces.current().to_string(),
                window_id: self.focused_wid(),
            }));
        }
        self.workspaces.switching = true;
        self.paused = true;
        let old = self.workspaces.current().to_string();
        self.workspaces.set_current(&target);
        info!(from = %old, to = %target, "switching workspace");

        if let Some(wid) = self.focused_wid() {
            self.workspaces.set_focused(&old, wid);
        }

        let old_members = self.workspaces.members(&old);
        for wid in &old_members {
            self.state.stop_watcher(*wid);
        }

        let entries: Vec<FrameEntry> = old_members
            .iter()
            .filter_map(|wid| self.workspaces.pid_of(*wid).map(|pid| FrameEntry { wid: *wid, pid }))
            .collect();
        for (wid, frame) in self.transport.read_frames(entries) {
            self.workspaces.save_frame(wid, frame);
        }

        self.workspaces.set_snapshot(&old, self.state.snapshot_space(space));

        let new_members = self.workspaces.members(&target);
        for wid in &new_members {
            self.state.set_hidden(*wid, false);
        }
        for wid in &old_members {
            self.state.set_hidden(*wid, true);
        }

        // Restores are synchronous: the user is waiting on these frames. The
        // park batch is fire-and-forget, nobody sees it land.
        let mut restore_ops = Vec::new();
        for wid in &new_members {
            let Some(frame) = self.workspaces.take_frame(*wid) else { continue };
            let Some(pid) = self.workspaces.pid_of(*wid) else { continue };
            restore_ops.push(MoveOp::place(*wid, pid, frame));
        }
        let park_ops = self.park_ops(&old_members, &screen);
        self.transport.move_windows(restore_ops);
        self.transport.move_windows_async(park_ops);

        let focus_target = if self.workspaces.is_scratch(&target) {
            self.state.restore_space(space, None);
            for wid in &new_members {
                self.state.set_floating(*wid, true);
            }
            self.workspaces
                .focused_in(&target)
                .and_then(|wid| self.host.window_by_id(wid))
                .or_else(|| new_members.iter().find_map(|wid| self.host.window_by_id(*wid)))
        } else {
            self.restore_tiling_workspace(&target, space)
        };

        if let Some(window) = focus_target {
            let _ = window.focus();
            if let Some(wid) = live_id(&window) {
                self.focus.note(wid);
                let current = self.workspaces.current().to_string();
                self.workspaces.set_focused(&current, wid);
            }
        }

        // Scratch stays paused so floats do not retile under the user.
        self.paused = self.workspaces.is_scratch(&target);
        self.workspaces.switching = false;
        self.notify_switch(&target);
    }

    fn restore_tiling_workspace(
        &mut self,
        target: &str,
        space: crate::sys::screen::SpaceId,
    ) -> Option<WindowRef> {
        let snapshot = self
            .workspaces
            .take_snapshot(target)
            .map(|mut snapshot| {
                snapshot.retain(|wid| self.workspaces.member_of(target, wid));
                snapshot
            })
            .filter(|snapshot| !snapshot.is_empty());
        let snapshot_was_empty = snapshot.is_none();
        self.state.restore_space(space, snapshot);
        let host = std::rc::Rc::clone(&self.host);
        self.state.ensure_watchers(space, host.as_ref());

        // Materialize windows that were moved here while we were away.
        let remembered = self.workspaces.focused_in(target);
        let mut pending_focus: Option<WindowRef> = None;
        let mut pended = false;
        for entry in self.workspaces.take_pending(target) {
            let Ok(wid) = entry.window.id() else { continue };
            if wid != entry.wid
                || self.state.is_floating(wid)
                || self.state.window_index(wid).is_some()
                || !self.workspaces.member_of(target, wid)
            {
                continue;
            }
            self.add_window(&entry.window);
            pended = true;
            if remembered == Some(wid) {
                pending_focus = Some(entry.window.clone());
            }
        }

        if self.screen_changed {
            self.refresh_windows();
        }
        if snapshot_was_empty || self.screen_changed || pended {
            self.retile(space);
        }
        self.screen_changed = false;

        pending_focus
            .or_else(|| {
                let index = self.state.window_index(remembered?)?;
                self.state.window_by_index(index)
            })
            .or_else(|| self.state.windows_in_space(space).first().cloned())
    }

    /// Move the focused window to another workspace without switching. The
    /// window is parked immediately and materialized on the next switch.
    pub fn move_window_to(&mut self, name: &str) {
        if !self.workspaces.contains(name) {
            return;
        }
        let Some(window) = self.host.focused_window() else { return };
        let Some(wid) = live_id(&window) else { return };
        if self.workspaces.member_of(name, wid) {
            return;
        }
        let pid = window.pid().ok().or_else(|| self.workspaces.pid_of(wid));
        let source = self.workspaces.workspace_of(wid).map(str::to_string);
        self.workspaces.assign(wid, name, pid);
        if self.workspaces.is_scratch(name) {
            self.state.set_floating(wid, true);
        } else if source.as_deref().is_some_and(|s| self.workspaces.is_scratch(s)) {
            self.state.set_floating(wid, false);
        }
        self.workspaces.push_pending(name, wid, window.clone());
        // The moved window takes focus when its new workspace is shown.
        self.workspaces.set_focused(name, wid);
        debug!(%wid, to = name, "moved window");

        if name == self.workspaces.current() {
            return;
        }
        let Some(screen) = self.screen() else { return };
        let space = screen.space;
        let neighbor = self.state.window_index(wid).and_then(|index| {
            self.state
                .window_at(space, index.col, index.row + 1)
                .or_else(|| {
                    index.row.checked_sub(1).and_then(|r| self.state.window_at(space, index.col, r))
                })
                .or_else(|| {
                    index.col.checked_sub(1).and_then(|c| self.state.window_at(space, c, 0))
                })
                .or_else(|| self.state.window_at(space, index.col + 1, 0))
        });
        self.remove_window(wid, true);
        self.state.set_hidden(wid, true);
        if let Ok(frame) = window.frame() {
            self.workspaces.save_frame(wid, frame);
        }
        if let Some(pid) = pid {
            let (px, py) = screen.park_point();
            self.transport.move_windows(vec![MoveOp::park(wid, pid, px, py)]);
        }
        if let Some(neighbor) = neighbor {
            let _ = neighbor.focus();
        }
        let current = self.workspaces.current().to_string();
        self.workspaces.set_snapshot(&current, self.state.snapshot_space(space));
        if self.state.column_count(space) > 0 {
            self.retile(space);
        }
    }

    // ---- event hooks ----

    pub(crate) fn ws_on_window_created(&mut self, window: &WindowRef) {
        let Some(wid) = live_id(window) else { return };
        if self.workspaces.is_tracked(wid) {
            return;
        }
        if !window.is_standard() {
            return;
        }
        let name = self
            .workspaces
            .resolve_workspace(window)
            .unwrap_or_else(|| self.workspaces.current().to_string());
        self.workspaces.assign(wid, &name, window.pid().ok());
        if self.workspaces.is_scratch(&name) {
            self.state.set_floating(wid, true);
        }
        self.cache_jump_candidate(&name, window);
        debug!(%wid, workspace = %name, "tracked new window");
        if name != self.workspaces.current() {
            self.workspaces.push_pending(&name, wid, window.clone());
            self.post_after(CREATE_PARK_DELAY, Event::DeferredPark(wid));
        }
    }

    pub(crate) fn ws_on_deferred_park(&mut self, wid: WindowId) {
        let Some(workspace) = self.workspaces.workspace_of(wid).map(str::to_string) else {
            return;
        };
        if workspace == self.workspaces.current() {
            return;
        }
        let Some(screen) = self.screen() else { return };
        if self.state.window_index(wid).is_some() {
            self.remove_window(wid, false);
        }
        self.state.set_hidden(wid, true);
        self.state.stop_watcher(wid);
        if let Some(window) = self.host.window_by_id(wid)
            && let Ok(frame) = window.frame()
        {
            self.workspaces.save_frame(wid, frame);
        }
        if let Some(pid) = self.workspaces.pid_of(wid) {
            let (px, py) = screen.park_point();
            self.transport.move_windows(vec![MoveOp::park(wid, pid, px, py)]);
        }
        debug!(%wid, %workspace, "parked window created off the active workspace");
        self.retile(screen.space);
    }

    pub(crate) fn ws_on_window_destroyed(&mut self, wid: WindowId) {
        self.workspaces.purge_window(wid);
    }

    pub(crate) fn ws_on_window_focused(&mut self, window: &WindowRef) {
        if self.workspaces.switching {
            return;
        }
        let Some(wid) = live_id(window) else { return };
        // Any focus change cancels a pending debounced switch.
        self.debounce_token += 1;
        match self.workspaces.workspace_of(wid).map(str::to_string) {
            Some(workspace) if workspace == self.workspaces.current() => {
                if !self.state.is_hidden(wid) {
                    self.workspaces.set_focused(&workspace, wid);
                }
            }
            Some(_) => {
                // A parked window can take focus through cmd-tab; resting
                // there pulls its whole workspace in.
                self.post_after(FOCUS_DEBOUNCE, Event::FocusDebounceElapsed {
                    wid,
                    token: self.debounce_token,
                });
            }
            None => {}
        }
    }

    pub(crate) fn ws_on_focus_debounce(&mut self, wid: WindowId, token: u64) {
        if token != self.debounce_token || self.workspaces.switching {
            return;
        }
        if self.focused_wid() != Some(wid) {
            return;
        }
        let Some(workspace) = self.workspaces.workspace_of(wid).map(str::to_string) else {
            return;
        };
        if workspace == self.workspaces.current() {
            return;
        }
        debug!(%wid, %workspace, "focus settled on another workspace, following");
        self.switch_to(&workspace, false);
    }

    /// Screen geometry changed: remember it for the next switch and push
    /// every parked window to the new park point so nothing strands in the
    /// middle of the new arrangement.
    pub(crate) fn ws_on_screen_changed(&mut self) {
        self.screen_changed = true;
        let Some(screen) = self.screen() else { return };
        let hidden = self.state.hidden_ids();
        let ops = self.park_ops(&hidden, &screen);
        self.transport.move_windows_async(ops);
    }

    /// Evict tracked windows whose handles no longer resolve. A missed
    /// destroy event would otherwise strand a wid in its workspace forever.
    pub(crate) fn ws_reconcile_members(&mut self) {
        for wid in self.workspaces.tracked_ids() {
            let gone = match self.host.window_by_id(wid) {
                None => true,
                Some(window) => window.id().is_err(),
            };
            if !gone {
                continue;
            }
            debug!(%wid, "tracked window no longer resolves, evicting");
            if self.state.window_index(wid).is_some() {
                self.remove_window(wid, true);
            }
            self.state.delete_watcher(wid);
            self.state.set_hidden(wid, false);
            self.state.set_floating(wid, false);
            self.focus.forget(wid);
            self.workspaces.purge_window(wid);
        }
    }

    pub(crate) fn park_ops(&self, wids: &[WindowId], screen: &Screen) -> Vec<MoveOp> {
        let (px, py) = screen.park_point();
        wids.iter()
            .filter_map(|wid| {
                self.workspaces.pid_of(*wid).map(|pid| MoveOp::park(*wid, pid, px, py))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::actor::events::{Command, Event};
    use crate::actor::testing::{TestRig, grid_ids, work_personal_config};
    use crate::sys::geometry::Frame;
    use crate::sys::window_server::WindowId;

    fn wid(n: u32) -> WindowId { WindowId::new(n) }

    /// W1 resolves to personal (default), W2 to work (app rule), then the
    /// startup partition runs.
    fn setup_two_workspaces() -> TestRig {
        let mut rig = TestRig::with_config(work_personal_config());
        rig.host
            .make_window(1, 100, Frame::new(8.0, 8.0, 480.0, 752.0))
            .with_app("Safari");
        rig.host
            .make_window(2, 200, Frame::new(496.0, 8.0, 480.0, 752.0))
            .with_app("Slack");
        rig.wm.refresh_windows();
        rig.wm.setup_workspaces();
        rig.fire(|event| matches!(event, Event::SettleElapsed));
        rig
    }

    #[test]
    fn setup_partitions_and_parks_other_workspaces() {
        let rig = setup_two_workspaces();
        assert_eq!(rig.wm.workspaces.current(), "personal");
        assert_eq!(grid_ids(&rig.wm), vec![vec![wid(1)]]);
        assert!(rig.wm.state.is_hidden(wid(2)));
        // Parked one pixel inside the bottom-right corner.
        let parked = rig.host.window(2).expect("window").frame();
        assert_eq!((parked.x, parked.y), (999.0, 767.0));
        assert!(!rig.wm.workspaces.switching);
    }

    #[test_log::test]
    fn switch_round_trip_restores_frames_and_membership() {
        let mut rig = setup_two_workspaces();
        let w1_frame = rig.host.window(1).expect("window").frame();

        rig.wm.switch_to("work", true);
        assert_eq!(rig.wm.workspaces.current(), "work");
        assert!(rig.wm.state.is_hidden(wid(1)));
        assert!(!rig.wm.state.is_hidden(wid(2)));
        // W2 came back at the frame it was parked from.
        let restored = rig.host.window(2).expect("window").frame();
        assert_eq!((restored.x, restored.y), (496.0, 8.0));

        rig.wm.switch_to("personal", true);
        assert_eq!(rig.wm.workspaces.current(), "personal");
        assert_eq!(grid_ids(&rig.wm), vec![vec![wid(1)]]);
        assert_eq!(rig.host.window(1).expect("window").frame(), w1_frame);
        let parked = rig.host.window(2).expect("window").frame();
        assert_eq!((parked.x, parked.y), (999.0, 767.0));
    }

    #[test]
    fn switch_restores_the_remembered_focus() {
        let mut rig = setup_two_workspaces();
        rig.focus(1);
        rig.wm.switch_to("work", true);
        assert_eq!(rig.host.focused_id(), Some(wid(2)));
        rig.wm.switch_to("personal", true);
        assert_eq!(rig.host.focused_id(), Some(wid(1)));
    }

    #[test]
    fn switching_is_reentrancy_guarded() {
        let mut rig = setup_two_workspaces();
        rig.wm.workspaces.switching = true;
        rig.wm.switch_to("work", true);
        assert_eq!(rig.wm.workspaces.current(), "personal");
        rig.wm.workspaces.switching = false;
    }

    #[test]
    fn unknown_workspace_is_a_silent_noop() {
        let mut rig = setup_two_workspaces();
        rig.wm.switch_to("does-not-exist", true);
        assert_eq!(rig.wm.workspaces.current(), "personal");
    }

    #[test]
    fn membership_stays_a_partition() {
        let mut rig = setup_two_workspaces();
        rig.wm.switch_to("work", true);
        rig.wm.switch_to("personal", true);
        for n in [1u32, 2] {
            let ws = rig.wm.workspaces.workspace_of(wid(n)).expect("tracked");
            assert!(rig.wm.workspaces.member_of(ws, wid(n)));
            let elsewhere = ["personal", "work"]
                .iter()
                .filter(|name| **name != ws)
                .any(|name| rig.wm.workspaces.member_of(name, wid(n)));
            assert!(!elsewhere, "window {n} in more than one workspace");
        }
    }

    #[test]
    fn debounced_focus_on_another_workspace_switches() {
        let mut rig = setup_two_workspaces();
        rig.focus(2);
        rig.fire(|event| matches!(event, Event::FocusDebounceElapsed { .. }));
        assert_eq!(rig.wm.workspaces.current(), "work");
    }

    #[test]
    fn refocusing_home_before_the_debounce_cancels_the_switch() {
        let mut rig = setup_two_workspaces();
        rig.focus(2);
        rig.focus(1);
        rig.fire(|event| matches!(event, Event::FocusDebounceElapsed { .. }));
        assert_eq!(rig.wm.workspaces.current(), "personal");
    }

    #[test_log::test]
    fn move_then_switch_materializes_the_pending_window() {
        let mut rig = setup_two_workspaces();
        rig.focus(1);
        rig.wm.move_window_to("work");
        assert!(rig.wm.state.is_hidden(wid(1)));
        assert!(rig.wm.workspaces.pending_contains("work", wid(1)));

        rig.wm.switch_to("work", true);
        assert!(rig.wm.state.window_index(wid(1)).is_some());
        assert!(!rig.wm.state.is_hidden(wid(1)));
        assert_eq!(rig.host.focused_id(), Some(wid(1)));
        // Materialized, not parked: the window was retiled onto the canvas.
        let frame = rig.host.window(1).expect("window").frame();
        assert!(frame.x < 999.0);
        assert!(!rig.wm.workspaces.pending_contains("work", wid(1)));
    }

    #[test]
    fn move_round_trip_restores_membership() {
        let mut rig = setup_two_workspaces();
        rig.focus(1);
        rig.wm.move_window_to("work");
        rig.wm.move_window_to("personal");
        // Un-parking happens on the next switch to personal; membership and
        // pending state are already home.
        assert_eq!(rig.wm.workspaces.workspace_of(wid(1)), Some("personal"));
        assert!(!rig.wm.workspaces.pending_contains("work", wid(1)));
        assert!(rig.wm.workspaces.pending_contains("personal", wid(1)));
    }

    #[test]
    fn destroy_after_move_is_survivable() {
        let mut rig = setup_two_workspaces();
        rig.focus(1);
        rig.wm.move_window_to("work");
        rig.destroy(1);
        rig.wm.switch_to("work", true);
        assert_eq!(rig.wm.workspaces.current(), "work");
        assert!(!rig.wm.workspaces.is_tracked(wid(1)));
        assert_eq!(rig.wm.state.window_index(wid(1)), None);
    }

    #[test]
    fn created_window_for_inactive_workspace_is_parked_after_the_delay() {
        let mut rig = setup_two_workspaces();
        let w3 = rig
            .host
            .make_window(3, 200, Frame::new(100.0, 100.0, 400.0, 400.0))
            .with_app("Slack");
        rig.wm.handle_event(Event::WindowVisible(w3.handle()));
        assert_eq!(rig.wm.workspaces.workspace_of(wid(3)), Some("work"));

        rig.fire(|event| matches!(event, Event::DeferredPark(_)));
        assert!(rig.wm.state.is_hidden(wid(3)));
        let frame = rig.host.window(3).expect("window").frame();
        assert_eq!((frame.x, frame.y), (999.0, 767.0));
        // It materializes on the next switch.
        rig.wm.switch_to("work", true);
        assert!(rig.wm.state.window_index(wid(3)).is_some());
    }

    #[test_log::test]
    fn scratch_workspace_floats_and_keeps_events_paused() {
        let mut rig = TestRig::with_config({
            let mut config = work_personal_config();
            config.workspaces.workspaces.push("scratch".into());
            config.workspaces.scratch_workspace = Some("scratch".into());
            config
        });
        rig.host.make_window(1, 100, Frame::new(8.0, 8.0, 480.0, 752.0));
        rig.wm.refresh_windows();
        rig.wm.setup_workspaces();
        rig.fire(|event| matches!(event, Event::SettleElapsed));

        rig.focus(1);
        rig.wm.move_window_to("scratch");
        assert!(rig.wm.state.is_floating(wid(1)));

        rig.wm.switch_to("scratch", true);
        assert_eq!(rig.wm.workspaces.current(), "scratch");
        assert!(rig.wm.paused);
        assert_eq!(rig.wm.state.column_count(rig.space()), 0);

        rig.wm.switch_to("personal", true);
        assert!(!rig.wm.paused);
    }

    #[test]
    fn toggle_back_redirects_a_switch_to_the_current_workspace() {
        let mut rig = TestRig::with_config({
            let mut config = work_personal_config();
            config.workspaces.toggle_back = true;
            config
        });
        rig.host.make_window(1, 100, Frame::new(8.0, 8.0, 480.0, 752.0)).with_app("Safari");
        rig.host.make_window(2, 200, Frame::new(496.0, 8.0, 480.0, 752.0)).with_app("Slack");
        rig.wm.refresh_windows();
        rig.wm.setup_workspaces();
        rig.fire(|event| matches!(event, Event::SettleElapsed));

        rig.wm.switch_to("work", true);
        assert_eq!(rig.wm.workspaces.current(), "work");
        // Asking for work again bounces back to the jump origin.
        rig.wm.handle_event(Event::Command(Command::SwitchWorkspace("work".into())));
        assert_eq!(rig.wm.workspaces.current(), "personal");
    }

    #[test]
    fn reconcile_evicts_windows_with_no_live_handle() {
        let mut rig = setup_two_workspaces();
        rig.host.remove_window(wid(1));
        rig.wm.refresh_windows();
        assert!(!rig.wm.workspaces.is_tracked(wid(1)));
        assert_eq!(rig.wm.state.window_index(wid(1)), None);
    }
}
