//! Virtual workspace tables.
//!
//! Workspaces partition the tracked windows of one physical space. This
//! module owns membership, per-workspace snapshots, parked frames, focus
//! memory, pending windows, the jump point and the jump-target cache; the
//! switch protocol itself lives in the workspace actor.

use regex::Regex;
use tracing::warn;

use crate::common::collections::{HashMap, HashSet};
use crate::common::config::WorkspaceSettings;
use crate::host::WindowRef;
use crate::model::state::Snapshot;
use crate::sys::geometry::Frame;
use crate::sys::window_server::{WindowId, pid_t};

/// A window moved into a workspace while that workspace was inactive. The
/// direct handle is kept so the window can be re-added without an AX lookup;
/// the id validates it on use.
pub struct PendingWindow {
    pub wid: WindowId,
    pub window: WindowRef,
}

/// Where a user-initiated switch or jump started, for `toggle_jump`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JumpPoint {
    pub workspace: String,
    pub window_id: Option<WindowId>,
}

struct CompiledTitleRule {
    pattern: Regex,
    workspace: String,
}

pub struct VirtualWorkspaces {
    names: Vec<String>,
    current: String,
    /// Re-entrancy guard: while true, switches and focus-triggered switches
    /// are dropped.
    pub switching: bool,
    windows: HashMap<String, HashSet<WindowId>>,
    snapshots: HashMap<String, Snapshot>,
    frames: HashMap<WindowId, Frame>,
    focused: HashMap<String, WindowId>,
    pending: HashMap<String, Vec<PendingWindow>>,
    win_ws: HashMap<WindowId, String>,
    win_pid: HashMap<WindowId, pid_t>,
    prev_jump: Option<JumpPoint>,
    jump_cache: HashMap<String, WindowRef>,
    title_rules: Vec<CompiledTitleRule>,
    app_rules: HashMap<String, String>,
    scratch: Option<String>,
    pub toggle_back: bool,
}

impl VirtualWorkspaces {
    pub fn new(settings: &WorkspaceSettings) -> VirtualWorkspaces {
        let names: Vec<String> = if settings.workspaces.is_empty() {
            vec!["main".to_string()]
        } else {
            settings.workspaces.clone()
        };
        let mut windows = HashMap::default();
        for name in &names {
            windows.insert(name.clone(), HashSet::default());
        }
        let title_rules = settings
            .title_rules
            .iter()
            .filter_map(|rule| match Regex::new(&rule.pattern) {
                Ok(pattern) => Some(CompiledTitleRule {
                    pattern,
                    workspace: rule.workspace.clone(),
                }),
                Err(err) => {
                    warn!(pattern = %rule.pattern, %err, "ignoring unparsable title rule");
                    None
                }
            })
            .collect();
        VirtualWorkspaces {
            current: names[0].clone(),
            names,
            switching: false,
            windows,
            snapshots: HashMap::default(),
            frames: HashMap::default(),
            focused: HashMap::default(),
            pending: HashMap::default(),
            win_ws: HashMap::default(),
            win_pid: HashMap::default(),
            prev_jump: None,
            jump_cache: HashMap::default(),
            title_rules,
            app_rules: settings.app_rules.clone(),
            scratch: settings.scratch_workspace.clone(),
            toggle_back: settings.toggle_back,
        }
    }

    pub fn names(&self) -> &[String] { &self.names }

    pub fn current(&self) -> &str { &self.current }

    pub fn set_current(&mut self, name: &str) { self.current = name.to_string(); }

    pub fn contains(&self, name: &str) -> bool { self.names.iter().any(|n| n == name) }

    pub fn is_scratch(&self, name: &str) -> bool { self.scratch.as_deref() == Some(name) }

    /// First matching title rule, else the app rule, else nothing.
    pub fn resolve_workspace(&self, window: &WindowRef) -> Option<String> {
        if let Some(title) = window.title() {
            for rule in &self.title_rules {
                if rule.pattern.is_match(&title) && self.contains(&rule.workspace) {
                    return Some(rule.workspace.clone());
                }
            }
        }
        let app = window.app_name()?;
        self.app_rules.get(&app).filter(|ws| self.contains(ws)).cloned()
    }

    // ---- membership ----

    pub fn assign(&mut self, wid: WindowId, workspace: &str, pid: Option<pid_t>) {
        if let Some(old) = self.win_ws.get(&wid).cloned() {
            if let Some(set) = self.windows.get_mut(&old) {
                set.remove(&wid);
            }
            self.remove_pending(&old, wid);
        }
        self.windows.entry(workspace.to_string()).or_default().insert(wid);
        self.win_ws.insert(wid, workspace.to_string());
        if let Some(pid) = pid {
            self.win_pid.insert(wid, pid);
        }
    }

    pub fn workspace_of(&self, wid: WindowId) -> Option<&str> {
        self.win_ws.get(&wid).map(String::as_str)
    }

    pub fn is_tracked(&self, wid: WindowId) -> bool { self.win_ws.contains_key(&wid) }

    pub fn members(&self, workspace: &str) -> Vec<WindowId> {
        self.windows
            .get(workspace)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn member_of(&self, workspace: &str, wid: WindowId) -> bool {
        self.windows.get(workspace).is_some_and(|set| set.contains(&wid))
    }

    pub fn tracked_ids(&self) -> Vec<WindowId> { self.win_ws.keys().copied().collect() }

    pub fn pid_of(&self, wid: WindowId) -> Option<pid_t> { self.win_pid.get(&wid).copied() }

    // ---- pending ----

    pub fn push_pending(&mut self, workspace: &str, wid: WindowId, window: WindowRef) {
        let list = self.pending.entry(workspace.to_string()).or_default();
        if !list.iter().any(|p| p.wid == wid) {
            list.push(PendingWindow { wid, window });
        }
    }

    pub fn take_pending(&mut self, workspace: &str) -> Vec<PendingWindow> {
        self.pending.remove(workspace).unwrap_or_default()
    }

    pub fn remove_pending(&mut self, workspace: &str, wid: WindowId) {
        if let Some(list) = self.pending.get_mut(workspace) {
            list.retain(|p| p.wid != wid);
        }
    }

    pub fn pending_contains(&self, workspace: &str, wid: WindowId) -> bool {
        self.pending
            .get(workspace)
            .is_some_and(|list| list.iter().any(|p| p.wid == wid))
    }

    // ---- focus memory ----

    pub fn set_focused(&mut self, workspace: &str, wid: WindowId) {
        self.focused.insert(workspace.to_string(), wid);
    }

    pub fn focused_in(&self, workspace: &str) -> Option<WindowId> {
        self.focused.get(workspace).copied()
    }

    // ---- parked frames ----

    pub fn save_frame(&mut self, wid: WindowId, frame: Frame) { self.frames.insert(wid, frame); }

    pub fn take_frame(&mut self, wid: WindowId) -> Option<Frame> { self.frames.remove(&wid) }

    // ---- snapshots ----

    pub fn set_snapshot(&mut self, workspace: &str, snapshot: Snapshot) {
        self.snapshots.insert(workspace.to_string(), snapshot);
    }

    pub fn take_snapshot(&mut self, workspace: &str) -> Option<Snapshot> {
        self.snapshots.remove(workspace)
    }

    // ---- jump ----

    pub fn prev_jump(&self) -> Option<&JumpPoint> { self.prev_jump.as_ref() }

    pub fn set_prev_jump(&mut self, jump: Option<JumpPoint>) { self.prev_jump = jump; }

    pub fn take_prev_jump(&mut self) -> Option<JumpPoint> { self.prev_jump.take() }

    pub fn cache_jump_window(&mut self, key: String, window: WindowRef) {
        self.jump_cache.insert(key, window);
    }

    pub fn cached_jump_window(&self, key: &str) -> Option<&WindowRef> { self.jump_cache.get(key) }

    pub fn evict_jump_window(&mut self, key: &str) { self.jump_cache.remove(key); }

    /// Remove every trace of a destroyed window.
    pub fn purge_window(&mut self, wid: WindowId) {
        if let Some(workspace) = self.win_ws.remove(&wid) {
            if let Some(set) = self.windows.get_mut(&workspace) {
                set.remove(&wid);
            }
            self.remove_pending(&workspace, wid);
            if self.focused.get(&workspace) == Some(&wid) {
                self.focused.remove(&workspace);
            }
        }
        self.win_pid.remove(&wid);
        self.frames.remove(&wid);
        for snapshot in self.snapshots.values_mut() {
            snapshot.retain(|w| w != wid);
        }
        if self
            .prev_jump
            .as_ref()
            .is_some_and(|jump| jump.window_id == Some(wid))
        {
            self.prev_jump = None;
        }
        self.jump_cache.retain(|_, window| window.id().ok() != Some(wid));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::VirtualWorkspaces;
    use crate::actor::testing::FakeWindow;
    use crate::common::config::{TitleRule, WorkspaceSettings};
    use crate::sys::geometry::Frame;
    use crate::sys::window_server::WindowId;

    fn settings() -> WorkspaceSettings {
        let mut settings = WorkspaceSettings::default();
        settings.workspaces = vec!["personal".into(), "work".into()];
        settings.app_rules.insert("Slack".into(), "work".into());
        settings.title_rules.push(TitleRule {
            pattern: " - Notes$".into(),
            workspace: "personal".into(),
        });
        settings
    }

    #[test]
    fn title_rules_win_over_app_rules() {
        let ws = VirtualWorkspaces::new(&settings());
        let slack = FakeWindow::new(1, 100, Frame::default())
            .with_app("Slack")
            .with_title("general - Slack");
        assert_eq!(ws.resolve_workspace(&slack.handle()).as_deref(), Some("work"));

        let notes = FakeWindow::new(2, 100, Frame::default())
            .with_app("Slack")
            .with_title("standup - Notes");
        assert_eq!(ws.resolve_workspace(&notes.handle()).as_deref(), Some("personal"));

        let other = FakeWindow::new(3, 100, Frame::default()).with_app("Safari");
        assert_eq!(ws.resolve_workspace(&other.handle()), None);
    }

    #[test]
    fn assign_moves_membership_between_workspaces() {
        let mut ws = VirtualWorkspaces::new(&settings());
        let wid = WindowId::new(9);
        ws.assign(wid, "personal", Some(100));
        assert!(ws.member_of("personal", wid));
        ws.assign(wid, "work", None);
        assert!(!ws.member_of("personal", wid));
        assert!(ws.member_of("work", wid));
        assert_eq!(ws.workspace_of(wid), Some("work"));
        assert_eq!(ws.pid_of(wid), Some(100));
    }

    #[test]
    fn pending_deduplicates() {
        let mut ws = VirtualWorkspaces::new(&settings());
        let w = FakeWindow::new(5, 100, Frame::default());
        ws.push_pending("work", WindowId::new(5), w.handle());
        ws.push_pending("work", WindowId::new(5), w.handle());
        assert_eq!(ws.take_pending("work").len(), 1);
        assert_eq!(ws.take_pending("work").len(), 0);
    }

    #[test]
    fn purge_clears_every_table() {
        let mut ws = VirtualWorkspaces::new(&settings());
        let wid = WindowId::new(5);
        let w = FakeWindow::new(5, 100, Frame::default());
        ws.assign(wid, "work", Some(100));
        ws.push_pending("work", wid, w.handle());
        ws.set_focused("work", wid);
        ws.save_frame(wid, Frame::new(1.0, 2.0, 3.0, 4.0));
        ws.set_prev_jump(Some(super::JumpPoint {
            workspace: "personal".into(),
            window_id: Some(wid),
        }));

        ws.purge_window(wid);
        assert!(!ws.is_tracked(wid));
        assert!(!ws.member_of("work", wid));
        assert!(!ws.pending_contains("work", wid));
        assert_eq!(ws.focused_in("work"), None);
        assert_eq!(ws.take_frame(wid), None);
        assert_eq!(ws.prev_jump(), None);
    }
}
