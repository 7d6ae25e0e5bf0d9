//! Category jumps: "take me to my terminal on this workspace".
//!
//! A category resolves per-workspace to an app name or an (app, title
//! pattern, launch command) triple. Title-pattern targets are served from a
//! cache filled when a matching window is created, so a hit costs one
//! membership check and zero AX calls; the title is re-checked on hit
//! because windows rename themselves at runtime.

use regex::Regex;
use tracing::debug;

use crate::common::config::JumpTarget;
use crate::host::{WindowRef, live_id};
use crate::model::virtual_workspace::JumpPoint;

use super::wm::Wm;

fn title_matches(window: &WindowRef, pattern: Option<&str>) -> bool {
    let Some(pattern) = pattern else { return true };
    let Ok(regex) = Regex::new(pattern) else { return false };
    window.title().is_some_and(|title| regex.is_match(&title))
}

fn matches_target(window: &WindowRef, target: &JumpTarget) -> bool {
    window.app_name().as_deref() == Some(target.app())
        && title_matches(window, target.title_pattern())
}

impl Wm {
    pub fn save_jump_point(&mut self) {
        let jump = JumpPoint {
            workspace: self.workspaces.current().to_string(),
            window_id: self.focused_wid(),
        };
        self.workspaces.set_prev_jump(Some(jump));
    }

    /// Fill the jump cache when a created window matches a title-pattern
    /// target for its workspace.
    pub(crate) fn cache_jump_candidate(&mut self, workspace: &str, window: &WindowRef) {
        let Some(app) = window.app_name() else { return };
        let mut hits: Vec<String> = Vec::new();
        for (category, per_workspace) in &self.config.workspaces.jump_targets {
            let Some(target) = per_workspace.get(workspace) else {
                continue;
            };
            if target.title_pattern().is_none() || target.app() != app {
                continue;
            }
            if title_matches(window, target.title_pattern()) {
                hits.push(format!("{category}:{workspace}"));
            }
        }
        for key in hits {
            debug!(%key, "cached jump window");
            self.workspaces.cache_jump_window(key, window.clone());
        }
    }

    pub fn jump_to_app(&mut self, category: &str) {
        let current = self.workspaces.current().to_string();
        let Some(target) = self
            .config
            .workspaces
            .jump_targets
            .get(category)
            .and_then(|per_workspace| per_workspace.get(&current))
            .cloned()
        else {
            return;
        };

        if self.workspaces.toggle_back
            && let Some(focused) = self.host.focused_window()
            && matches_target(&focused, &target)
        {
            self.toggle_jump();
            return;
        }
        self.save_jump_point();

        let key = format!("{category}:{current}");
        if let Some(window) = self.workspaces.cached_jump_window(&key).cloned() {
            let valid = window
                .id()
                .ok()
                .is_some_and(|wid| self.workspaces.member_of(&current, wid))
                && title_matches(&window, target.title_pattern());
            if valid {
                let _ = window.focus();
                return;
            }
            self.workspaces.evict_jump_window(&key);
        }

        for window in self.host.list_windows() {
            let Some(wid) = live_id(&window) else { continue };
            if !self.workspaces.member_of(&current, wid) {
                continue;
            }
            if !matches_target(&window, &target) {
                continue;
            }
            if target.title_pattern().is_some() {
                self.workspaces.cache_jump_window(key.clone(), window.clone());
            }
            let _ = window.focus();
            return;
        }

        debug!(category, app = target.app(), "jump target not open, launching");
        if let Some(launch) = target.launch() {
            self.host.spawn(launch);
        } else {
            self.host.launch_or_focus(target.app());
        }
    }

    /// Ping-pong between the current position and the saved jump point.
    pub fn toggle_jump(&mut self) {
        let Some(jump) = self.workspaces.take_prev_jump() else { return };
        let here = JumpPoint {
            workspace: self.workspaces.current().to_string(),
            window_id: self.focused_wid(),
        };
        if jump.workspace != self.workspaces.current() {
            if let Some(wid) = jump.window_id {
                self.workspaces.set_focused(&jump.workspace, wid);
            }
            self.workspaces.set_prev_jump(Some(here));
            self.switch_to(&jump.workspace, false);
        } else {
            self.workspaces.set_prev_jump(Some(here));
            if let Some(wid) = jump.window_id
                && self.workspaces.member_of(&jump.workspace, wid)
                && let Some(window) = self.host.window_by_id(wid)
            {
                let _ = window.focus();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::actor::events::Event;
    use crate::actor::testing::{TestRig, work_personal_config};
    use crate::common::config::JumpTarget;
    use crate::sys::geometry::Frame;
    use crate::sys::window_server::WindowId;

    fn jump_config() -> crate::common::config::Config {
        let mut config = work_personal_config();
        let mut per_workspace = crate::common::collections::HashMap::default();
        per_workspace.insert("personal".to_string(), JumpTarget::Window {
            app: "Terminal".into(),
            title: Some("^notes".into()),
            launch: Some(vec!["open".into(), "-a".into(), "Terminal".into()]),
        });
        per_workspace.insert("work".to_string(), JumpTarget::App("Slack".into()));
        config.workspaces.jump_targets.insert("comms".into(), per_workspace);
        config
    }

    fn rig_with_jumps() -> TestRig {
        let mut rig = TestRig::with_config(jump_config());
        rig.host
            .make_window(1, 100, Frame::new(8.0, 8.0, 480.0, 752.0))
            .with_app("Safari");
        rig.wm.refresh_windows();
        rig.wm.setup_workspaces();
        rig.fire(|event| matches!(event, Event::SettleElapsed));
        rig
    }

    #[test]
    fn jump_uses_the_cache_populated_at_creation() {
        let mut rig = rig_with_jumps();
        let terminal = rig
            .host
            .make_window(2, 200, Frame::new(100.0, 100.0, 400.0, 400.0))
            .with_app("Terminal")
            .with_title("notes: scratchpad");
        rig.wm.handle_event(Event::WindowVisible(terminal.handle()));

        rig.wm.jump_to_app("comms");
        assert_eq!(rig.host.focused_id(), Some(WindowId::new(2)));
        assert!(rig.host.launched.borrow().is_empty());
        assert!(rig.host.spawned.borrow().is_empty());
    }

    #[test]
    fn renamed_cache_entries_fall_through_to_the_scan() {
        let mut rig = rig_with_jumps();
        let terminal = rig
            .host
            .make_window(2, 200, Frame::new(100.0, 100.0, 400.0, 400.0))
            .with_app("Terminal")
            .with_title("notes: scratchpad");
        rig.wm.handle_event(Event::WindowVisible(terminal.handle()));
        terminal.set_title("htop");

        rig.wm.jump_to_app("comms");
        // Cache hit was rejected on the title re-check and nothing else
        // matches, so the launch command ran.
        assert_eq!(rig.host.focused_id(), None);
        assert_eq!(rig.host.spawned.borrow().len(), 1);
    }

    #[test]
    fn missing_target_spawns_the_launch_command() {
        let mut rig = rig_with_jumps();
        rig.wm.jump_to_app("comms");
        assert_eq!(rig.host.spawned.borrow()[0][0], "open");
    }

    #[test]
    fn bare_app_targets_launch_or_focus() {
        let mut rig = rig_with_jumps();
        rig.wm.switch_to("work", true);
        rig.wm.jump_to_app("comms");
        assert_eq!(rig.host.launched.borrow().as_slice(), ["Slack".to_string()]);
    }

    #[test]
    fn toggle_jump_ping_pongs_across_workspaces() {
        let mut rig = rig_with_jumps();
        rig.host
            .make_window(2, 200, Frame::new(496.0, 8.0, 480.0, 752.0))
            .with_app("Slack");
        rig.wm.handle_event(Event::WindowVisible(rig.host.window(2).expect("w2").handle()));
        rig.focus(1);

        rig.wm.switch_to("work", true);
        assert_eq!(rig.wm.workspaces.current(), "work");

        rig.wm.toggle_jump();
        assert_eq!(rig.wm.workspaces.current(), "personal");
        assert_eq!(rig.host.focused_id(), Some(WindowId::new(1)));

        rig.wm.toggle_jump();
        assert_eq!(rig.wm.workspaces.current(), "work");
    }
}
