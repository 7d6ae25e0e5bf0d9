//! Fake collaborators for exercising the core off-macOS: an in-memory host
//! with killable window handles, a transport that applies batches straight
//! to the fake windows, and a scheduler that hands timers back to the test.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::actor::events::{Event, Scheduler};
use crate::actor::wm::Wm;
use crate::common::collections::HashMap;
use crate::common::config::Config;
use crate::host::{Host, StaleWindow, UiWatcher, WindowHandle, WindowRef};
use crate::sys::geometry::Frame;
use crate::sys::screen::{Screen, SpaceId};
use crate::sys::transport::{FrameEntry, MoveOp, Transport};
use crate::sys::window_server::{WindowId, pid_t};

struct FakeWindowInner {
    wid: u32,
    pid: pid_t,
    frame: Cell<Frame>,
    title: RefCell<String>,
    app: RefCell<String>,
    alive: Cell<bool>,
    standard: Cell<bool>,
    tabbed: Cell<bool>,
    focus_slot: RefCell<Option<Rc<Cell<Option<WindowId>>>>>,
}

#[derive(Clone)]
pub struct FakeWindow {
    inner: Rc<FakeWindowInner>,
}

impl FakeWindow {
    pub fn new(wid: u32, pid: pid_t, frame: Frame) -> FakeWindow {
        FakeWindow {
            inner: Rc::new(FakeWindowInner {
                wid,
                pid,
                frame: Cell::new(frame),
                title: RefCell::new(String::new()),
                app: RefCell::new(String::new()),
                alive: Cell::new(true),
                standard: Cell::new(true),
                tabbed: Cell::new(false),
                focus_slot: RefCell::new(None),
            }),
        }
    }

    pub fn handle(&self) -> WindowRef { Rc::new(self.clone()) }

    pub fn kill(&self) { self.inner.alive.set(false); }

    pub fn with_app(self, app: &str) -> FakeWindow {
        *self.inner.app.borrow_mut() = app.to_string();
        self
    }

    pub fn with_title(self, title: &str) -> FakeWindow {
        *self.inner.title.borrow_mut() = title.to_string();
        self
    }

    pub fn non_standard(self) -> FakeWindow {
        self.inner.standard.set(false);
        self
    }

    pub fn tabbed(self) -> FakeWindow {
        self.inner.tabbed.set(true);
        self
    }

    pub fn set_title(&self, title: &str) { *self.inner.title.borrow_mut() = title.to_string(); }

    pub fn frame(&self) -> Frame { self.inner.frame.get() }

    pub fn place(&self, frame: Frame) { self.inner.frame.set(frame); }

    fn bind_focus(&self, slot: Rc<Cell<Option<WindowId>>>) {
        *self.inner.focus_slot.borrow_mut() = Some(slot);
    }

    fn live(&self) -> Result<(), StaleWindow> {
        if self.inner.alive.get() { Ok(()) } else { Err(StaleWindow) }
    }
}

impl WindowHandle for FakeWindow {
    fn id(&self) -> Result<WindowId, StaleWindow> {
        self.live()?;
        Ok(WindowId::new(self.inner.wid))
    }

    fn pid(&self) -> Result<pid_t, StaleWindow> {
        self.live()?;
        Ok(self.inner.pid)
    }

    fn frame(&self) -> Result<Frame, StaleWindow> {
        self.live()?;
        Ok(self.inner.frame.get())
    }

    fn set_frame(&self, frame: Frame) -> Result<(), StaleWindow> {
        self.live()?;
        self.inner.frame.set(frame);
        Ok(())
    }

    fn focus(&self) -> Result<(), StaleWindow> {
        self.live()?;
        if let Some(slot) = self.inner.focus_slot.borrow().as_ref() {
            slot.set(Some(WindowId::new(self.inner.wid)));
        }
        Ok(())
    }

    fn title(&self) -> Option<String> {
        self.live().ok()?;
        Some(self.inner.title.borrow().clone())
    }

    fn app_name(&self) -> Option<String> {
        self.live().ok()?;
        Some(self.inner.app.borrow().clone())
    }

    fn is_standard(&self) -> bool { self.inner.standard.get() }

    fn is_tabbed(&self) -> bool { self.inner.tabbed.get() }
}

/// Standalone handle for store-level tests.
pub fn fake_window(wid: u32, pid: pid_t) -> WindowRef {
    FakeWindow::new(wid, pid, Frame::default()).handle()
}

pub fn fake_window_with_frame(wid: u32, pid: pid_t, frame: Frame) -> WindowRef {
    FakeWindow::new(wid, pid, frame).handle()
}

struct FakeWatcher {
    running: Rc<Cell<bool>>,
}

impl UiWatcher for FakeWatcher {
    fn start(&self) { self.running.set(true); }

    fn stop(&self) { self.running.set(false); }
}

pub struct FakeHost {
    windows: RefCell<Vec<FakeWindow>>,
    focused: Rc<Cell<Option<WindowId>>>,
    pub screen_frame: Cell<Frame>,
    pub space: Cell<u64>,
    pub launched: RefCell<Vec<String>>,
    pub spawned: RefCell<Vec<Vec<String>>>,
    watcher_flags: RefCell<HashMap<WindowId, Rc<Cell<bool>>>>,
}

impl FakeHost {
    pub fn new() -> Rc<FakeHost> {
        Rc::new(FakeHost {
            windows: RefCell::new(Vec::new()),
            focused: Rc::new(Cell::new(None)),
            screen_frame: Cell::new(Frame::new(0.0, 0.0, 1000.0, 768.0)),
            space: Cell::new(1),
            launched: RefCell::new(Vec::new()),
            spawned: RefCell::new(Vec::new()),
            watcher_flags: RefCell::new(HashMap::default()),
        })
    }

    pub fn make_window(&self, wid: u32, pid: pid_t, frame: Frame) -> FakeWindow {
        let window = FakeWindow::new(wid, pid, frame);
        window.bind_focus(Rc::clone(&self.focused));
        self.windows.borrow_mut().push(window.clone());
        window
    }

    pub fn add_window(&self, wid: u32, pid: pid_t, frame: Frame) -> WindowRef {
        self.make_window(wid, pid, frame).handle()
    }

    pub fn window(&self, wid: u32) -> Option<FakeWindow> {
        self.windows.borrow().iter().find(|w| w.inner.wid == wid).cloned()
    }

    pub fn remove_window(&self, wid: WindowId) {
        let mut windows = self.windows.borrow_mut();
        if let Some(window) = windows.iter().find(|w| w.inner.wid == wid.get()) {
            window.kill();
        }
        windows.retain(|w| w.inner.wid != wid.get());
        if self.focused.get() == Some(wid) {
            self.focused.set(None);
        }
    }

    pub fn set_focused(&self, wid: Option<WindowId>) { self.focused.set(wid); }

    pub fn focused_id(&self) -> Option<WindowId> { self.focused.get() }

    pub fn watcher_running(&self, wid: WindowId) -> bool {
        self.watcher_flags.borrow().get(&wid).is_some_and(|flag| flag.get())
    }

    fn apply_op(&self, op: &MoveOp) {
        if let Some(window) = self.window(op.wid) {
            let current = window.frame();
            if op.position_only() {
                window.place(Frame::new(op.x, op.y, current.w, current.h));
            } else {
                window.place(op.target_frame());
            }
        }
    }
}

impl Host for FakeHost {
    fn focused_window(&self) -> Option<WindowRef> {
        let wid = self.focused.get()?;
        self.window(wid.get()).map(|w| w.handle())
    }

    fn window_by_id(&self, wid: WindowId) -> Option<WindowRef> {
        self.window(wid.get()).map(|w| w.handle())
    }

    fn list_windows(&self) -> Vec<WindowRef> {
        self.windows.borrow().iter().map(FakeWindow::handle).collect()
    }

    fn screen(&self) -> Option<Screen> {
        Some(Screen {
            frame: self.screen_frame.get(),
            space: SpaceId::new(self.space.get()),
        })
    }

    fn launch_or_focus(&self, app: &str) { self.launched.borrow_mut().push(app.to_string()); }

    fn spawn(&self, argv: &[String]) { self.spawned.borrow_mut().push(argv.to_vec()); }

    fn new_watcher(&self, window: &WindowRef) -> Option<Box<dyn UiWatcher>> {
        let wid = window.id().ok()?;
        let running = Rc::new(Cell::new(false));
        self.watcher_flags.borrow_mut().insert(wid, Rc::clone(&running));
        Some(Box::new(FakeWatcher { running }))
    }
}

/// Applies batches straight to the fake windows, like the window server
/// would, and records them for assertions.
pub struct FakeTransport {
    host: Rc<FakeHost>,
    pub sync_batches: RefCell<Vec<Vec<MoveOp>>>,
    pub async_batches: RefCell<Vec<Vec<MoveOp>>>,
}

impl FakeTransport {
    pub fn new(host: Rc<FakeHost>) -> Rc<FakeTransport> {
        Rc::new(FakeTransport {
            host,
            sync_batches: RefCell::new(Vec::new()),
            async_batches: RefCell::new(Vec::new()),
        })
    }
}

impl Transport for FakeTransport {
    fn move_windows(&self, ops: Vec<MoveOp>) {
        for op in &ops {
            self.host.apply_op(op);
        }
        self.sync_batches.borrow_mut().push(ops);
    }

    fn move_windows_async(&self, ops: Vec<MoveOp>) {
        for op in &ops {
            self.host.apply_op(op);
        }
        self.async_batches.borrow_mut().push(ops);
    }

    fn read_frames(&self, entries: Vec<FrameEntry>) -> HashMap<WindowId, Frame> {
        entries
            .into_iter()
            .filter_map(|entry| {
                let window = self.host.window(entry.wid.get())?;
                window.live().ok()?;
                Some((entry.wid, window.frame()))
            })
            .collect()
    }
}

#[derive(Default)]
pub struct ManualScheduler {
    pub scheduled: RefCell<VecDeque<(Duration, Event)>>,
}

impl ManualScheduler {
    pub fn new() -> Rc<ManualScheduler> { Rc::new(ManualScheduler::default()) }

    pub fn pop(&self) -> Option<(Duration, Event)> { self.scheduled.borrow_mut().pop_front() }

    /// Remove the first scheduled event matching `pred`, if any.
    pub fn take_matching(&self, pred: impl Fn(&Event) -> bool) -> Option<Event> {
        let mut scheduled = self.scheduled.borrow_mut();
        let at = scheduled.iter().position(|(_, event)| pred(event))?;
        scheduled.remove(at).map(|(_, event)| event)
    }
}

impl Scheduler for ManualScheduler {
    fn post_after(&self, delay: Duration, event: Event) {
        self.scheduled.borrow_mut().push_back((delay, event));
    }
}

pub struct TestRig {
    pub wm: Wm,
    pub host: Rc<FakeHost>,
    pub transport: Rc<FakeTransport>,
    pub scheduler: Rc<ManualScheduler>,
}

impl TestRig {
    pub fn new() -> TestRig { TestRig::with_config(Config::default()) }

    pub fn with_config(config: Config) -> TestRig {
        let host = FakeHost::new();
        let transport = FakeTransport::new(Rc::clone(&host));
        let scheduler = ManualScheduler::new();
        let wm = Wm::new(
            config,
            Rc::clone(&host) as Rc<dyn Host>,
            Rc::clone(&transport) as Rc<dyn Transport>,
            Rc::clone(&scheduler) as Rc<dyn Scheduler>,
        );
        TestRig {
            wm,
            host,
            transport,
            scheduler,
        }
    }

    pub fn space(&self) -> SpaceId { SpaceId::new(self.host.space.get()) }

    /// Create a window and run it through the visibility event, like the
    /// window filter would.
    pub fn add_window_at(&mut self, wid: u32, pid: pid_t, frame: Frame) -> WindowRef {
        let window = self.host.add_window(wid, pid, frame);
        self.wm.handle_event(Event::WindowVisible(Rc::clone(&window)));
        window
    }

    pub fn add_window(&mut self, wid: u32, pid: pid_t) -> WindowRef {
        let x = 100.0 * wid as f64;
        self.add_window_at(wid, pid, Frame::new(x, 48.0, 480.0, 700.0))
    }

    pub fn focus(&mut self, wid: u32) {
        let window = self.host.window(wid).expect("focus target exists");
        self.host.set_focused(Some(WindowId::new(wid)));
        self.wm.handle_event(Event::WindowFocused(window.handle()));
    }

    pub fn destroy(&mut self, wid: u32) {
        self.host.remove_window(WindowId::new(wid));
        self.wm.handle_event(Event::WindowDestroyed(WindowId::new(wid)));
    }

    /// Fire the first scheduled event matching `pred` through the manager.
    pub fn fire(&mut self, pred: impl Fn(&Event) -> bool) {
        if let Some(event) = self.scheduler.take_matching(pred) {
            self.wm.handle_event(event);
        }
    }

    /// Drain every scheduled event in order.
    pub fn pump(&mut self) {
        while let Some((_, event)) = self.scheduler.pop() {
            self.wm.handle_event(event);
        }
    }
}

pub fn grid_ids(wm: &Wm) -> Vec<Vec<WindowId>> {
    let Some(space) = wm.current_space() else { return Vec::new() };
    wm.state
        .columns(space)
        .iter()
        .map(|column| column.iter().filter_map(crate::host::live_id).collect())
        .collect()
}

pub fn work_personal_config() -> Config {
    let mut config = Config::default();
    config.workspaces.workspaces = vec!["personal".into(), "work".into()];
    config.workspaces.app_rules.insert("Slack".into(), "work".into());
    config
}
