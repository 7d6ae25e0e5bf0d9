//! Configuration for layout and workspaces.
//!
//! The binary loads `~/.config/ribbon/config.toml`; everything has a default
//! so a missing file yields a usable single-workspace setup. The engine only
//! ever sees the deserialized structs, so embedders can construct them
//! directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::common::collections::HashMap;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct GapSettings {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for GapSettings {
    fn default() -> Self {
        GapSettings {
            top: 8.0,
            bottom: 8.0,
            left: 8.0,
            right: 8.0,
        }
    }
}

/// Extra insets for a bar the manager does not own (menu-bar replacements
/// and the like).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ExternalBarSettings {
    pub top: f64,
    pub bottom: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LayoutSettings {
    pub gaps: GapSettings,
    pub external_bar: ExternalBarSettings,
    /// Keep the anchor's left neighbor on screen by shifting the anchor
    /// right when both fit.
    pub sticky_pairs: bool,
    /// Flush the last column against the right canvas edge when it is the
    /// anchor.
    pub right_anchor_last: bool,
    /// How long macOS animates a window move. Watcher restarts and refocus
    /// passes are scheduled just past this.
    pub animation_duration_ms: u64,
    /// Slack added after the animation before a watcher is re-armed.
    pub watcher_padding_ms: u64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            gaps: GapSettings::default(),
            external_bar: ExternalBarSettings::default(),
            sticky_pairs: true,
            right_anchor_last: false,
            animation_duration_ms: 200,
            watcher_padding_ms: 50,
        }
    }
}

impl LayoutSettings {
    pub fn watcher_restart_delay(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms + self.watcher_padding_ms)
    }

    pub fn refocus_delay(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }
}

/// A title rule: first regex match wins, before app rules are consulted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TitleRule {
    pub pattern: String,
    pub workspace: String,
}

/// A jump target for one category on one workspace. A bare string names a
/// single-process app; the structured form adds a title pattern and an
/// optional launch command for apps that need one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum JumpTarget {
    App(String),
    Window {
        app: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        launch: Option<Vec<String>>,
    },
}

impl JumpTarget {
    pub fn app(&self) -> &str {
        match self {
            JumpTarget::App(app) => app,
            JumpTarget::Window { app, .. } => app,
        }
    }

    pub fn title_pattern(&self) -> Option<&str> {
        match self {
            JumpTarget::App(_) => None,
            JumpTarget::Window { title, .. } => title.as_deref(),
        }
    }

    pub fn launch(&self) -> Option<&[String]> {
        match self {
            JumpTarget::App(_) => None,
            JumpTarget::Window { launch, .. } => launch.as_deref(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Ordered workspace names; the first is active at startup.
    pub workspaces: Vec<String>,
    /// App title → workspace, consulted after title rules.
    pub app_rules: HashMap<String, String>,
    pub title_rules: Vec<TitleRule>,
    /// category → workspace → target.
    pub jump_targets: HashMap<String, HashMap<String, JumpTarget>>,
    /// Repeating a jump (or switching to the current workspace) bounces back
    /// to the previous jump point.
    pub toggle_back: bool,
    /// Windows on this workspace float instead of tiling.
    pub scratch_workspace: Option<String>,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        WorkspaceSettings {
            workspaces: vec!["main".to_string()],
            app_rules: HashMap::default(),
            title_rules: Vec::new(),
            jump_targets: HashMap::default(),
            toggle_back: false,
            scratch_workspace: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutSettings,
    pub workspaces: WorkspaceSettings,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("ribbon").join("config.toml"))
    }

    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// The binary's loading policy: explicit path must parse; the default
    /// path may be absent, and a broken file falls back to defaults with a
    /// warning so a typo cannot take the session's window manager down.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Config> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let Some(path) = Self::default_path() else {
            return Ok(Config::default());
        };
        if !path.exists() {
            return Ok(Config::default());
        }
        match Self::load(&path) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("config unusable, falling back to defaults: {err:#}");
                Ok(Config::default())
            }
        }
    }
}
