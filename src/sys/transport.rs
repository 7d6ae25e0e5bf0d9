//! Batched window moves and frame reads over the Accessibility API.
//!
//! Ops are grouped by owning process and each group is dispatched on its own
//! worker thread, so per-app AX round-trips run in parallel. Every failure is
//! per-window: a missing window or a wedged app is logged and skipped, never
//! fatal to the batch.

use serde::{Deserialize, Serialize};

use crate::common::collections::HashMap;
use crate::sys::geometry::Frame;
use crate::sys::window_server::{WindowId, pid_t};

/// One move/resize/read operation. `w == 0 && h == 0` means position-only.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct MoveOp {
    pub wid: u32,
    pub pid: pid_t,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// Include this window's pre-move frame in the result set.
    #[serde(default, skip_serializing_if = "is_false")]
    pub save: bool,
    /// Skip the move; always include the frame in the result set.
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
}

fn is_false(b: &bool) -> bool { !*b }

impl MoveOp {
    pub fn place(wid: WindowId, pid: pid_t, frame: Frame) -> MoveOp {
        MoveOp {
            wid: wid.get(),
            pid,
            x: frame.x,
            y: frame.y,
            w: frame.w,
            h: frame.h,
            save: false,
            read_only: false,
        }
    }

    /// A position-only op, used for parking.
    pub fn park(wid: WindowId, pid: pid_t, x: f64, y: f64) -> MoveOp {
        MoveOp {
            wid: wid.get(),
            pid,
            x,
            y,
            w: 0.0,
            h: 0.0,
            save: false,
            read_only: false,
        }
    }

    pub fn position_only(&self) -> bool { self.w == 0.0 && self.h == 0.0 }

    pub fn target_frame(&self) -> Frame { Frame::new(self.x, self.y, self.w, self.h) }
}

/// Identifies a window to `read_frames`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameEntry {
    pub wid: WindowId,
    pub pid: pid_t,
}

/// A frame reported back for a `save` or `read_only` op.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct SavedFrame {
    pub wid: u32,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl SavedFrame {
    pub fn frame(&self) -> Frame { Frame::new(self.x, self.y, self.w, self.h) }
}

/// Per-app batch statistics, one stderr line each in wire mode.
#[derive(Clone, Copy, Debug)]
pub struct AppStats {
    pub pid: pid_t,
    pub ops: usize,
    pub skipped: usize,
    pub elapsed_ms: u128,
}

impl AppStats {
    pub fn summary_line(&self) -> String {
        if self.skipped > 0 {
            format!(
                "pid {} {} ops {}ms skipped={}",
                self.pid, self.ops, self.elapsed_ms, self.skipped
            )
        } else {
            format!("pid {} {} ops {}ms", self.pid, self.ops, self.elapsed_ms)
        }
    }
}

/// The transport the manager issues window placement through.
pub trait Transport {
    /// Apply a batch synchronously; returns when every per-app worker has
    /// joined.
    fn move_windows(&self, ops: Vec<MoveOp>);

    /// Fire-and-forget variant, used for parking the previous workspace
    /// during a switch: the user never sees those frames land.
    fn move_windows_async(&self, ops: Vec<MoveOp>);

    /// Read current frames; missing windows are omitted silently.
    fn read_frames(&self, entries: Vec<FrameEntry>) -> HashMap<WindowId, Frame>;
}

pub fn group_by_pid(ops: Vec<MoveOp>) -> HashMap<pid_t, Vec<MoveOp>> {
    let mut groups: HashMap<pid_t, Vec<MoveOp>> = HashMap::default();
    for op in ops {
        groups.entry(op.pid).or_default().push(op);
    }
    groups
}

pub mod wire {
    //! The JSON wire format of the `mover` subcommand: an op array on
    //! stdin (or a file argument), result frames on stdout, per-app summary
    //! lines on stderr. Exit 0 on success including per-window skips, 1 on a
    //! parse failure.

    use super::{MoveOp, SavedFrame};

    pub fn parse_ops(text: &str) -> Result<Vec<MoveOp>, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Stdout payload; `None` when nothing was saved or read, which prints as
    /// empty stdout.
    pub fn render_results(saved: &[SavedFrame]) -> Option<String> {
        if saved.is_empty() {
            return None;
        }
        Some(serde_json::to_string(saved).expect("saved frames serialize"))
    }

    #[cfg(target_os = "macos")]
    pub fn run(input: Option<&std::path::Path>) -> i32 {
        use std::io::Read;

        let mut text = String::new();
        let read = match input {
            Some(path) => std::fs::read_to_string(path).map(|s| text = s),
            None => std::io::stdin().read_to_string(&mut text).map(|_| ()),
        };
        if let Err(err) = read {
            eprintln!("failed to read input: {err}");
            return 1;
        }
        let ops = match parse_ops(&text) {
            Ok(ops) => ops,
            Err(err) => {
                eprintln!("bad op array: {err}");
                return 1;
            }
        };
        let (saved, stats) = super::macos::execute(ops);
        for app in stats {
            eprintln!("{}", app.summary_line());
        }
        if let Some(out) = render_results(&saved) {
            println!("{out}");
        }
        0
    }
}

#[cfg(target_os = "macos")]
pub use macos::AxTransport;

#[cfg(target_os = "macos")]
mod macos {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;

    use once_cell::sync::Lazy;
    use parking_lot::Mutex;
    use tracing::{debug, warn};

    use super::{AppStats, FrameEntry, MoveOp, SavedFrame, Transport, group_by_pid};
    use crate::common::collections::HashMap;
    use crate::sys::ax::{AX_MESSAGING_TIMEOUT_S, AxElement, AxError};
    use crate::sys::geometry::Frame;
    use crate::sys::window_server::{WindowId, pid_t};

    const ENHANCED_UI_ATTR: &str = "AXEnhancedUserInterface";

    /// Detached async batches, keyed by a monotonic id. Handles stay
    /// reachable here until their thread finishes; the thread reaps its own
    /// entry on completion.
    static IN_FLIGHT: Lazy<Mutex<HashMap<u64, std::thread::JoinHandle<()>>>> =
        Lazy::new(|| Mutex::new(HashMap::default()));
    static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

    /// Restores `AXEnhancedUserInterface` when a batch is done with an app.
    /// The attribute makes every AX move animate, which turns a 40-window
    /// batch into seconds of visible churn.
    struct EnhancedUiGuard<'a> {
        app: &'a AxElement,
        was_set: bool,
    }

    impl<'a> EnhancedUiGuard<'a> {
        fn suppress(app: &'a AxElement) -> EnhancedUiGuard<'a> {
            let was_set = app.bool_attr(ENHANCED_UI_ATTR).unwrap_or(false);
            if was_set {
                let _ = app.set_bool_attr(ENHANCED_UI_ATTR, false);
            }
            EnhancedUiGuard { app, was_set }
        }
    }

    impl Drop for EnhancedUiGuard<'_> {
        fn drop(&mut self) {
            if self.was_set {
                let _ = self.app.set_bool_attr(ENHANCED_UI_ATTR, true);
            }
        }
    }

    /// AX window elements of one app keyed by window id.
    fn window_elements(app: &AxElement) -> Result<HashMap<WindowId, AxElement>, AxError> {
        let mut out = HashMap::default();
        for element in app.windows()? {
            if let Ok(wid) = element.window_id() {
                out.insert(wid, element);
            }
        }
        Ok(out)
    }

    fn apply_app_ops(pid: pid_t, ops: &[MoveOp], saved: &Mutex<Vec<SavedFrame>>) -> AppStats {
        let started = Instant::now();
        let mut skipped = 0usize;

        let app = AxElement::application(pid);
        app.set_messaging_timeout(AX_MESSAGING_TIMEOUT_S);
        let _animations = EnhancedUiGuard::suppress(&app);

        let elements = match window_elements(&app) {
            Ok(elements) => elements,
            Err(err) => {
                warn!(pid, ?err, "could not list app windows, skipping batch");
                return AppStats {
                    pid,
                    ops: ops.len(),
                    skipped: ops.len(),
                    elapsed_ms: started.elapsed().as_millis(),
                };
            }
        };

        for op in ops {
            let wid = WindowId::new(op.wid);
            let Some(element) = elements.get(&wid) else {
                warn!(pid, %wid, "window not found, skipping op");
                skipped += 1;
                continue;
            };
            if op.save || op.read_only {
                match element.frame() {
                    Ok(frame) => saved.lock().push(SavedFrame {
                        wid: op.wid,
                        x: frame.x,
                        y: frame.y,
                        w: frame.w,
                        h: frame.h,
                    }),
                    Err(err) => {
                        warn!(pid, %wid, ?err, "could not read frame");
                        skipped += 1;
                        continue;
                    }
                }
            }
            if op.read_only {
                continue;
            }
            let result = if op.position_only() {
                element.set_position(op.x, op.y)
            } else {
                element.apply_frame(&op.target_frame())
            };
            if let Err(err) = result {
                warn!(pid, %wid, ?err, "move failed, skipping op");
                skipped += 1;
            }
        }

        AppStats {
            pid,
            ops: ops.len(),
            skipped,
            elapsed_ms: started.elapsed().as_millis(),
        }
    }

    /// Run a batch to completion: one worker per app, joined before return.
    pub fn execute(ops: Vec<MoveOp>) -> (Vec<SavedFrame>, Vec<AppStats>) {
        let groups = group_by_pid(ops);
        let saved = Mutex::new(Vec::new());
        let stats = Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for (pid, group) in &groups {
                let saved = &saved;
                let stats = &stats;
                scope.spawn(move || {
                    let app_stats = apply_app_ops(*pid, group, saved);
                    debug!("{}", app_stats.summary_line());
                    stats.lock().push(app_stats);
                });
            }
        });
        (saved.into_inner(), stats.into_inner())
    }

    pub struct AxTransport;

    impl Transport for AxTransport {
        fn move_windows(&self, ops: Vec<MoveOp>) {
            if ops.is_empty() {
                return;
            }
            let _ = execute(ops);
        }

        fn move_windows_async(&self, ops: Vec<MoveOp>) {
            if ops.is_empty() {
                return;
            }
            let task_id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
            // Hold the registry lock across the spawn so the worker's
            // self-removal cannot run before its handle is registered.
            let mut tasks = IN_FLIGHT.lock();
            let handle = std::thread::spawn(move || {
                let _ = execute(ops);
                IN_FLIGHT.lock().remove(&task_id);
            });
            tasks.insert(task_id, handle);
        }

        fn read_frames(&self, entries: Vec<FrameEntry>) -> HashMap<WindowId, Frame> {
            let ops = entries
                .into_iter()
                .map(|entry| MoveOp {
                    wid: entry.wid.get(),
                    pid: entry.pid,
                    x: 0.0,
                    y: 0.0,
                    w: 0.0,
                    h: 0.0,
                    save: false,
                    read_only: true,
                })
                .collect();
            let (saved, _) = execute(ops);
            saved
                .into_iter()
                .map(|s| (WindowId::new(s.wid), s.frame()))
                .collect()
        }
    }
}
