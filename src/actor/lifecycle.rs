//! Window lifecycle: add, remove, focus traversal, swap, slurp/barf, the
//! programmatic single-window move, and the rescan.
//!
//! These mutate the store and leave retiling to their caller (the router or
//! the workspace manager), except for the ops that change column structure
//! under the user's hands, which retile immediately.

use tracing::{debug, warn};

use crate::actor::events::Event;
use crate::host::{WindowRef, live_id};
use crate::layout_engine::Direction;
use crate::model::state::WindowIndex;
use crate::sys::geometry::Frame;
use crate::sys::screen::SpaceId;
use crate::sys::transport::MoveOp;
use crate::sys::window_server::WindowId;

use super::wm::Wm;

impl Wm {
    /// Insert a newly visible window into the grid. Position: right of the
    /// previously focused window when that is on the same space, else by the
    /// window's current x-center relative to the existing columns.
    pub fn add_window(&mut self, window: &WindowRef) {
        let Some(wid) = live_id(window) else { return };
        if self.state.is_hidden(wid) || self.state.is_floating(wid) {
            return;
        }
        if self.state.window_index(wid).is_some() {
            return;
        }
        if !window.is_standard() {
            debug!(%wid, "not a standard window, leaving alone");
            return;
        }
        if window.is_tabbed() {
            warn!(%wid, "window is part of a native tab group and cannot be tiled");
            return;
        }
        let Some(space) = self.current_space() else { return };

        let column_count = self.state.column_count(space);
        let insert_at = self
            .focus
            .last()
            .filter(|prev| *prev != wid)
            .and_then(|prev| self.state.window_index(prev))
            .filter(|index| index.space == space)
            .map(|index| index.col + 1)
            .or_else(|| self.column_for_center(space, window))
            .unwrap_or(column_count);

        self.state.update_columns(space, |columns| {
            let at = insert_at.min(columns.len());
            columns.insert(at, vec![window.clone()]);
        });
        if !self.state.has_watcher(wid)
            && let Some(watcher) = self.host.new_watcher(window)
        {
            self.state.add_watcher(wid, watcher);
        }
        debug!(%wid, ?space, insert_at, "added window");
    }

    fn column_left_edge(&self, space: SpaceId, col: usize) -> Option<f64> {
        let column = self.state.column(space, col)?;
        let first = column.first()?;
        let wid = live_id(first)?;
        self.state
            .x_position(space, wid)
            .or_else(|| first.frame().ok().map(|f| f.x))
    }

    fn column_for_center(&self, space: SpaceId, window: &WindowRef) -> Option<usize> {
        let center = window.frame().ok()?.center_x();
        for col in 0..self.state.column_count(space) {
            if self.column_left_edge(space, col).is_some_and(|x| x > center) {
                return Some(col);
            }
        }
        None
    }

    /// Remove a window from the grid. Unless `skip_focus`, a neighbor takes
    /// focus first so focus does not fall back to another app.
    pub fn remove_window(&mut self, wid: WindowId, skip_focus: bool) {
        let Some(index) = self.state.window_index(wid) else { return };
        let neighbor = if skip_focus { None } else { self.neighbor_for_removal(index) };
        self.state.remove_from_grid(wid);
        self.state.delete_watcher(wid);
        self.focus.forget(wid);
        if let Some(neighbor) = neighbor {
            let _ = neighbor.focus();
        }
        debug!(%wid, "removed window");
    }

    fn neighbor_for_removal(&self, index: WindowIndex) -> Option<WindowRef> {
        let WindowIndex { space, col, row } = index;
        let nearest = |target_col: usize| -> Option<WindowRef> {
            let column = self.state.column(space, target_col)?;
            column.get(row.min(column.len().saturating_sub(1))).cloned()
        };
        self.state
            .window_at(space, col, row + 1)
            .or_else(|| row.checked_sub(1).and_then(|r| self.state.window_at(space, col, r)))
            .or_else(|| col.checked_sub(1).and_then(&nearest))
            .or_else(|| nearest(col + 1))
    }

    // ---- focus traversal ----

    fn focused_index(&self) -> Option<WindowIndex> {
        self.state.window_index(self.focused_wid()?)
    }

    fn focus_cell(&self, space: SpaceId, col: usize, row: usize) {
        if let Some(target) = self.state.window_at(space, col, row) {
            self.focus_with_refocus(&target);
        }
    }

    /// Focus and schedule a second pass after the window animation, because
    /// macOS occasionally hands focus back to the app that was active.
    pub(crate) fn focus_with_refocus(&self, window: &WindowRef) {
        let _ = window.focus();
        if let Some(wid) = live_id(window) {
            self.post_after(self.config.layout.refocus_delay(), Event::Refocus(wid));
        }
    }

    pub fn focus_direction(&mut self, direction: Direction) {
        let Some(WindowIndex { space, col, row }) = self.focused_index() else {
            return;
        };
        match direction {
            Direction::Up => {
                if let Some(r) = row.checked_sub(1) {
                    self.focus_cell(space, col, r);
                }
            }
            Direction::Down => self.focus_cell(space, col, row + 1),
            Direction::Left => {
                if let Some(c) = col.checked_sub(1) {
                    self.focus_nearest_row(space, c, row);
                }
            }
            Direction::Right => {
                if col + 1 < self.state.column_count(space) {
                    self.focus_nearest_row(space, col + 1, row);
                }
            }
        }
    }

    fn focus_nearest_row(&self, space: SpaceId, col: usize, row: usize) {
        let Some(column) = self.state.column(space, col) else { return };
        let target = row.min(column.len().saturating_sub(1));
        self.focus_cell(space, col, target);
    }

    /// Next window in reading order, wrapping across columns and around the
    /// strip.
    pub fn focus_next(&mut self) {
        let Some(WindowIndex { space, col, row }) = self.focused_index() else {
            return;
        };
        let col_len = self.state.column(space, col).map_or(0, <[_]>::len);
        if row + 1 < col_len {
            self.focus_cell(space, col, row + 1);
        } else {
            let next_col = (col + 1) % self.state.column_count(space).max(1);
            self.focus_cell(space, next_col, 0);
        }
    }

    pub fn focus_previous(&mut self) {
        let Some(WindowIndex { space, col, row }) = self.focused_index() else {
            return;
        };
        if let Some(r) = row.checked_sub(1) {
            self.focus_cell(space, col, r);
        } else {
            let count = self.state.column_count(space).max(1);
            let prev_col = (col + count - 1) % count;
            let last = self.state.column(space, prev_col).map_or(0, |c| c.len().saturating_sub(1));
            self.focus_cell(space, prev_col, last);
        }
    }

    // ---- structural ops ----

    pub fn swap_direction(&mut self, direction: Direction) {
        let Some(focused) = self.focused_wid() else { return };
        let Some(WindowIndex { space, col, row }) = self.state.window_index(focused) else {
            return;
        };
        if direction.horizontal() {
            let target = match direction {
                Direction::Left => {
                    let Some(t) = col.checked_sub(1) else { return };
                    t
                }
                _ => {
                    if col + 1 >= self.state.column_count(space) {
                        return;
                    }
                    col + 1
                }
            };
            // Adopt the target column's strip position so the next tile pass
            // anchors where the swap visually lands.
            let target_x = self.column_left_edge(space, target);
            self.state.update_columns(space, |columns| columns.swap(col, target));
            if let Some(x) = target_x {
                self.state.set_x_position(space, focused, x);
            }
        } else {
            let target = match direction {
                Direction::Up => {
                    let Some(t) = row.checked_sub(1) else { return };
                    t
                }
                _ => row + 1,
            };
            let col_len = self.state.column(space, col).map_or(0, <[_]>::len);
            if target >= col_len {
                return;
            }
            self.state.update_columns(space, |columns| columns[col].swap(row, target));
        }
        self.retile(space);
    }

    /// Pull the focused window into the bottom of the column to its left.
    pub fn slurp(&mut self) {
        let Some(WindowIndex { space, col, row }) = self.focused_index() else {
            return;
        };
        let Some(target) = col.checked_sub(1) else { return };
        self.state.update_columns(space, |columns| {
            let window = columns[col].remove(row);
            columns[target].push(window);
        });
        self.retile_with(space, &[target]);
    }

    /// Push the focused window out of its stack into a new column on the
    /// right.
    pub fn barf(&mut self) {
        let Some(WindowIndex { space, col, row }) = self.focused_index() else {
            return;
        };
        if self.state.column(space, col).map_or(0, <[_]>::len) <= 1 {
            return;
        }
        self.state.update_columns(space, |columns| {
            let window = columns[col].remove(row);
            columns.insert(col + 1, vec![window]);
        });
        self.retile_with(space, &[col, col + 1]);
    }

    /// Programmatic single-window move with watcher feedback suppression.
    pub fn move_window(&mut self, window: &WindowRef, frame: Frame) {
        let Some(wid) = live_id(window) else { return };
        if self.state.is_hidden(wid) {
            return;
        }
        if window.frame().is_ok_and(|current| current.same_as(&frame)) {
            return;
        }
        let Ok(pid) = window.pid() else { return };
        self.state.stop_watcher(wid);
        self.transport.move_windows(vec![MoveOp::place(wid, pid, frame)]);
        self.post_after(
            self.config.layout.watcher_restart_delay(),
            Event::RestartWatchers(vec![wid]),
        );
    }

    /// Rescan the live window set: pick up windows the event stream missed,
    /// re-home windows whose space changed, and evict tracked ids whose
    /// handles no longer resolve.
    pub fn refresh_windows(&mut self) {
        if self.refreshing {
            return;
        }
        self.refreshing = true;
        let Some(space) = self.current_space() else {
            self.refreshing = false;
            return;
        };
        let mut touched = false;
        for window in self.host.list_windows() {
            let Some(wid) = live_id(&window) else { continue };
            if self.state.is_hidden(wid) || self.state.is_floating(wid) {
                continue;
            }
            match self.state.window_index(wid) {
                None => {
                    self.add_window(&window);
                    touched |= self.state.window_index(wid).is_some();
                }
                Some(index) if index.space != space => {
                    self.remove_window(wid, true);
                    self.add_window(&window);
                    touched = true;
                }
                Some(_) => {}
            }
        }
        self.ws_reconcile_members();
        if touched {
            self.retile(space);
        }
        self.refreshing = false;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::actor::testing::{TestRig, grid_ids};
    use crate::layout_engine::Direction;
    use crate::sys::geometry::Frame;
    use crate::sys::window_server::WindowId;

    fn wid(n: u32) -> WindowId { WindowId::new(n) }

    #[test]
    fn windows_insert_right_of_the_focused_column() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.focus(1);
        rig.add_window(2, 100);
        rig.focus(2);
        assert_eq!(grid_ids(&rig.wm), vec![vec![wid(1)], vec![wid(2)]]);

        rig.focus(1);
        rig.add_window(3, 100);
        assert_eq!(grid_ids(&rig.wm), vec![vec![wid(1)], vec![wid(3)], vec![wid(2)]]);
    }

    #[test]
    fn unknown_focus_inserts_by_x_center() {
        let mut rig = TestRig::new();
        rig.add_window_at(1, 100, Frame::new(8.0, 48.0, 480.0, 712.0));
        rig.add_window_at(2, 100, Frame::new(496.0, 48.0, 480.0, 712.0));
        // No focus history; a window sitting left of both columns leads the
        // strip.
        rig.add_window_at(3, 100, Frame::new(-300.0, 48.0, 100.0, 400.0));
        assert_eq!(grid_ids(&rig.wm)[0], vec![wid(3)]);
    }

    #[test]
    fn non_standard_windows_stay_out_of_the_grid() {
        let mut rig = TestRig::new();
        let palette = rig.host.make_window(9, 100, Frame::default()).non_standard();
        rig.wm
            .handle_event(crate::actor::events::Event::WindowVisible(palette.handle()));
        assert_eq!(rig.wm.state.window_index(wid(9)), None);
    }

    #[test]
    fn removal_hands_focus_to_the_row_below() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.focus(1);
        rig.add_window(2, 100);
        rig.focus(2);
        rig.wm.slurp();
        // Column 0 now stacks [1, 2]; destroying 1 focuses 2.
        rig.destroy(1);
        assert_eq!(rig.host.focused_id(), Some(wid(2)));
        assert_eq!(grid_ids(&rig.wm), vec![vec![wid(2)]]);
    }

    #[test]
    fn directional_focus_picks_the_nearest_row() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.focus(1);
        rig.add_window(2, 100);
        rig.focus(2);
        rig.add_window(3, 100);
        rig.focus(3);
        rig.wm.slurp(); // [1] [2,3]
        rig.focus(3);
        rig.wm.focus_direction(Direction::Left);
        assert_eq!(rig.host.focused_id(), Some(wid(1)));

        rig.pump();
        rig.wm.focus_direction(Direction::Right);
        assert_eq!(rig.host.focused_id(), Some(wid(2)));
    }

    #[test]
    fn next_and_previous_wrap_around_the_strip() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.focus(1);
        rig.add_window(2, 100);
        rig.focus(2);

        rig.wm.focus_next();
        assert_eq!(rig.host.focused_id(), Some(wid(1)));
        rig.pump();
        rig.wm.focus_previous();
        assert_eq!(rig.host.focused_id(), Some(wid(2)));
    }

    #[test]
    fn horizontal_swap_exchanges_columns_and_adopts_strip_position() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.focus(1);
        rig.add_window(2, 100);
        rig.focus(2);
        let space = rig.space();
        let left_x = rig.wm.state.x_position(space, wid(1));

        rig.wm.swap_direction(Direction::Left);
        assert_eq!(grid_ids(&rig.wm), vec![vec![wid(2)], vec![wid(1)]]);
        assert_eq!(rig.wm.state.x_position(space, wid(2)), left_x);
    }

    #[test]
    fn vertical_swap_reorders_rows_in_place() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.focus(1);
        rig.add_window(2, 100);
        rig.focus(2);
        rig.wm.slurp(); // [1, 2]
        rig.focus(2);
        rig.wm.swap_direction(Direction::Up);
        assert_eq!(grid_ids(&rig.wm), vec![vec![wid(2), wid(1)]]);
    }

    #[test]
    fn barf_splits_a_stack_back_into_columns() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        rig.focus(1);
        rig.add_window(2, 100);
        rig.focus(2);
        rig.wm.slurp(); // [1, 2]
        rig.focus(2);
        rig.wm.barf();
        assert_eq!(grid_ids(&rig.wm), vec![vec![wid(1)], vec![wid(2)]]);
    }

    #[test]
    fn refresh_adopts_windows_the_event_stream_missed() {
        let mut rig = TestRig::new();
        rig.add_window(1, 100);
        // This one never produced a visibility event.
        rig.host.add_window(2, 100, Frame::new(600.0, 48.0, 300.0, 400.0));
        rig.wm.refresh_windows();
        assert!(rig.wm.state.window_index(wid(2)).is_some());
    }
}
