//! The authoritative in-memory tiling state.
//!
//! One column grid per space, a reverse index kept coherent with every
//! mutation, the x-position memo that reconstructs scroll state across
//! retiles and workspace switches, the hidden and floating sets, and the
//! watcher registry. Grid edits go through [`StateStore::update_columns`],
//! which prunes empty containers and rebuilds the index transactionally, so
//! callers never see a half-updated structure.

use tracing::trace;

use crate::common::collections::{HashMap, HashSet};
use crate::host::{Host, UiWatcher, WindowRef, live_id};
use crate::sys::screen::SpaceId;
use crate::sys::window_server::WindowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowIndex {
    pub space: SpaceId,
    pub col: usize,
    pub row: usize,
}

/// A cloned-enough copy of one space's tiling state. Window handles are
/// shared, the container structure is not.
pub struct Snapshot {
    pub columns: Vec<Vec<WindowRef>>,
    pub x_positions: HashMap<WindowId, f64>,
}

impl Clone for Snapshot {
    fn clone(&self) -> Self {
        Snapshot {
            columns: self.columns.clone(),
            x_positions: self.x_positions.clone(),
        }
    }
}

impl Snapshot {
    pub fn is_empty(&self) -> bool { self.columns.iter().all(Vec::is_empty) }

    /// Drop entries that fail `keep`, along with stale handles.
    pub fn retain(&mut self, mut keep: impl FnMut(WindowId) -> bool) {
        for column in &mut self.columns {
            column.retain(|w| live_id(w).is_some_and(&mut keep));
        }
        self.columns.retain(|column| !column.is_empty());
        self.x_positions.retain(|wid, _| keep(*wid));
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.columns.iter().flatten().filter_map(live_id).collect()
    }

    pub fn find(&self, wid: WindowId) -> Option<WindowRef> {
        self.columns
            .iter()
            .flatten()
            .find(|w| live_id(w) == Some(wid))
            .cloned()
    }

    pub fn first_window(&self) -> Option<WindowRef> {
        self.columns.iter().flatten().next().cloned()
    }
}

#[derive(Default)]
pub struct StateStore {
    grids: HashMap<SpaceId, Vec<Vec<WindowRef>>>,
    index: HashMap<WindowId, WindowIndex>,
    x_positions: HashMap<SpaceId, HashMap<WindowId, f64>>,
    hidden: HashSet<WindowId>,
    floating: HashSet<WindowId>,
    watchers: HashMap<WindowId, Box<dyn UiWatcher>>,
}

impl StateStore {
    pub fn new() -> StateStore { StateStore::default() }

    // ---- column grid ----

    pub fn columns(&self, space: SpaceId) -> &[Vec<WindowRef>] {
        self.grids.get(&space).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn column(&self, space: SpaceId, col: usize) -> Option<&[WindowRef]> {
        self.grids.get(&space)?.get(col).map(Vec::as_slice)
    }

    pub fn window_at(&self, space: SpaceId, col: usize, row: usize) -> Option<WindowRef> {
        self.grids.get(&space)?.get(col)?.get(row).cloned()
    }

    pub fn column_count(&self, space: SpaceId) -> usize {
        self.grids.get(&space).map_or(0, Vec::len)
    }

    /// Edit a space's columns in place. Afterwards empty columns are pruned,
    /// an empty space drops its entry, stale handles are evicted and the
    /// reverse index for the space is rebuilt.
    pub fn update_columns(
        &mut self,
        space: SpaceId,
        edit: impl FnOnce(&mut Vec<Vec<WindowRef>>),
    ) {
        let columns = self.grids.entry(space).or_default();
        edit(columns);
        for column in columns.iter_mut() {
            column.retain(|w| live_id(w).is_some());
        }
        columns.retain(|column| !column.is_empty());
        if columns.is_empty() {
            self.grids.remove(&space);
        }
        self.reindex(space);
    }

    fn reindex(&mut self, space: SpaceId) {
        self.index.retain(|_, entry| entry.space != space);
        let Some(columns) = self.grids.get(&space) else {
            return;
        };
        for (col, column) in columns.iter().enumerate() {
            for (row, window) in column.iter().enumerate() {
                if let Some(wid) = live_id(window) {
                    self.index.insert(wid, WindowIndex { space, col, row });
                }
            }
        }
    }

    pub fn window_index(&self, wid: WindowId) -> Option<WindowIndex> {
        self.index.get(&wid).copied()
    }

    pub fn window_by_index(&self, index: WindowIndex) -> Option<WindowRef> {
        self.window_at(index.space, index.col, index.row)
    }

    /// Remove a window from the grid and its x-memo. Returns where it was.
    pub fn remove_from_grid(&mut self, wid: WindowId) -> Option<WindowIndex> {
        let entry = self.index.get(&wid).copied()?;
        self.update_columns(entry.space, |columns| {
            if let Some(column) = columns.get_mut(entry.col) {
                if entry.row < column.len() {
                    column.remove(entry.row);
                }
            }
        });
        if let Some(memo) = self.x_positions.get_mut(&entry.space) {
            memo.remove(&wid);
            if memo.is_empty() {
                self.x_positions.remove(&entry.space);
            }
        }
        Some(entry)
    }

    pub fn window_ids_in_space(&self, space: SpaceId) -> HashSet<WindowId> {
        self.index
            .iter()
            .filter(|(_, entry)| entry.space == space)
            .map(|(wid, _)| *wid)
            .collect()
    }

    pub fn windows_in_space(&self, space: SpaceId) -> Vec<WindowRef> {
        self.columns(space).iter().flatten().cloned().collect()
    }

    // ---- x-position memo ----

    pub fn x_position(&self, space: SpaceId, wid: WindowId) -> Option<f64> {
        self.x_positions.get(&space)?.get(&wid).copied()
    }

    pub fn set_x_position(&mut self, space: SpaceId, wid: WindowId, x: f64) {
        self.x_positions.entry(space).or_default().insert(wid, x);
    }

    pub fn x_positions(&self, space: SpaceId) -> Option<&HashMap<WindowId, f64>> {
        self.x_positions.get(&space)
    }

    // ---- hidden / floating ----

    pub fn set_hidden(&mut self, wid: WindowId, hidden: bool) {
        if hidden {
            self.hidden.insert(wid);
        } else {
            self.hidden.remove(&wid);
        }
    }

    pub fn is_hidden(&self, wid: WindowId) -> bool { self.hidden.contains(&wid) }

    pub fn hidden_ids(&self) -> Vec<WindowId> { self.hidden.iter().copied().collect() }

    pub fn set_floating(&mut self, wid: WindowId, floating: bool) {
        if floating {
            self.floating.insert(wid);
        } else {
            self.floating.remove(&wid);
        }
    }

    pub fn is_floating(&self, wid: WindowId) -> bool { self.floating.contains(&wid) }

    // ---- watchers ----

    pub fn add_watcher(&mut self, wid: WindowId, watcher: Box<dyn UiWatcher>) {
        watcher.start();
        self.watchers.insert(wid, watcher);
    }

    pub fn has_watcher(&self, wid: WindowId) -> bool { self.watchers.contains_key(&wid) }

    pub fn start_watcher(&self, wid: WindowId) {
        if let Some(watcher) = self.watchers.get(&wid) {
            watcher.start();
        }
    }

    pub fn stop_watcher(&self, wid: WindowId) {
        if let Some(watcher) = self.watchers.get(&wid) {
            watcher.stop();
        }
    }

    pub fn delete_watcher(&mut self, wid: WindowId) {
        if let Some(watcher) = self.watchers.remove(&wid) {
            watcher.stop();
        }
    }

    pub fn stop_all_watchers(&self) {
        for watcher in self.watchers.values() {
            watcher.stop();
        }
    }

    /// Create watchers for any window in the space lacking one, and re-arm
    /// the ones that were stopped while their window was parked.
    pub fn ensure_watchers(&mut self, space: SpaceId, host: &dyn Host) {
        for window in self.windows_in_space(space) {
            let Some(wid) = live_id(&window) else { continue };
            if self.watchers.contains_key(&wid) {
                self.start_watcher(wid);
            } else if let Some(watcher) = host.new_watcher(&window) {
                self.add_watcher(wid, watcher);
            }
        }
    }

    // ---- snapshot / restore ----

    pub fn snapshot_space(&self, space: SpaceId) -> Snapshot {
        Snapshot {
            columns: self.grids.get(&space).cloned().unwrap_or_default(),
            x_positions: self.x_positions.get(&space).cloned().unwrap_or_default(),
        }
    }

    /// Replace a space's grid and x-memo wholesale. `None` clears the space.
    pub fn restore_space(&mut self, space: SpaceId, snapshot: Option<Snapshot>) {
        self.index.retain(|_, entry| entry.space != space);
        self.grids.remove(&space);
        self.x_positions.remove(&space);
        let Some(snapshot) = snapshot else {
            trace!(?space, "cleared");
            return;
        };
        for wid in snapshot.window_ids() {
            if self.index.contains_key(&wid) {
                self.remove_from_grid(wid);
            }
        }
        if !snapshot.x_positions.is_empty() {
            self.x_positions.insert(space, snapshot.x_positions);
        }
        self.update_columns(space, |columns| *columns = snapshot.columns);
    }

    pub fn clear(&mut self) {
        self.stop_all_watchers();
        self.grids.clear();
        self.index.clear();
        self.x_positions.clear();
        self.hidden.clear();
        self.floating.clear();
        self.watchers.clear();
    }

    #[cfg(test)]
    pub fn check_invariants(&self) {
        for (wid, entry) in &self.index {
            let window = self
                .window_at(entry.space, entry.col, entry.row)
                .unwrap_or_else(|| panic!("index points at missing cell for {wid:?}"));
            assert_eq!(live_id(&window), Some(*wid), "index disagrees with grid");
        }
        for (space, columns) in &self.grids {
            assert!(!columns.is_empty(), "empty space {space:?} lingers");
            for column in columns {
                assert!(!column.is_empty(), "empty column lingers in {space:?}");
                for window in column {
                    let wid = live_id(window).expect("stale handle in grid");
                    assert!(self.index.contains_key(&wid), "grid window missing from index");
                    assert!(!self.hidden.contains(&wid), "hidden window in grid");
                }
            }
        }
    }
}
