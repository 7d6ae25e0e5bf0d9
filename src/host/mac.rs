//! The macOS host: AX-backed window handles, the window-server diff poll
//! that feeds the event queue, and per-window move watchers.
//!
//! Window discovery is a cheap CGWindowList diff each loop iteration rather
//! than a per-app notification mesh; move/resize watching stays on AX
//! observers because those must interleave with programmatic writes.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::rc::Rc;

use objc2_app_kit::{NSRunningApplication, NSScreen, NSWorkspace};
use objc2_foundation::MainThreadMarker;
use tracing::{debug, warn};

use crate::actor::events::{Event, EventSender};
use crate::common::collections::HashMap;
use crate::host::{Host, StaleWindow, UiWatcher, WindowHandle, WindowRef};
use crate::sys::ax::{AX_MESSAGING_TIMEOUT_S, AXObserverRef, AxElement, AxObserver, CFTypeRef};
use crate::sys::geometry::Frame;
use crate::sys::screen::{Screen, SpaceId};
use crate::sys::window_server::{self, WindowId, pid_t};

#[link(name = "SkyLight", kind = "framework")]
unsafe extern "C" {
    fn SLSMainConnectionID() -> i32;
    fn SLSGetActiveSpace(cid: i32) -> u64;
}

fn active_space() -> SpaceId {
    SpaceId::new(unsafe { SLSGetActiveSpace(SLSMainConnectionID()) })
}

pub struct MacWindow {
    element: AxElement,
    wid: WindowId,
    pid: pid_t,
    app: RefCell<Option<AxElement>>,
}

impl MacWindow {
    fn new(element: AxElement, wid: WindowId, pid: pid_t) -> MacWindow {
        MacWindow {
            element,
            wid,
            pid,
            app: RefCell::new(None),
        }
    }

    fn app_element(&self) -> AxElement {
        self.app
            .borrow_mut()
            .get_or_insert_with(|| {
                let app = AxElement::application(self.pid);
                app.set_messaging_timeout(AX_MESSAGING_TIMEOUT_S);
                app
            })
            .clone()
    }
}

impl WindowHandle for MacWindow {
    fn id(&self) -> Result<WindowId, StaleWindow> {
        // The cached id is only trusted while the element still answers.
        match self.element.window_id() {
            Ok(wid) => Ok(wid),
            Err(_) => Err(StaleWindow),
        }
    }

    fn pid(&self) -> Result<pid_t, StaleWindow> { Ok(self.pid) }

    fn frame(&self) -> Result<Frame, StaleWindow> {
        self.element.frame().map_err(|_| StaleWindow)
    }

    fn set_frame(&self, frame: Frame) -> Result<(), StaleWindow> {
        self.element.apply_frame(&frame).map_err(|_| StaleWindow)
    }

    fn focus(&self) -> Result<(), StaleWindow> {
        let app = self.app_element();
        let _ = app.set_bool_attr("AXFrontmost", true);
        self.element.raise().map_err(|_| StaleWindow)
    }

    fn title(&self) -> Option<String> { self.element.string_attr("AXTitle") }

    fn app_name(&self) -> Option<String> {
        let app = unsafe { NSRunningApplication::runningApplicationWithProcessIdentifier(self.pid) }?;
        unsafe { app.localizedName() }.map(|name| name.to_string())
    }

    fn is_standard(&self) -> bool {
        self.element.string_attr("AXSubrole").as_deref() == Some("AXStandardWindow")
    }

    fn is_tabbed(&self) -> bool {
        self.element.array_attr_len("AXTabs").is_some_and(|count| count > 1)
    }
}

struct WatcherContext {
    sender: EventSender,
    wid: WindowId,
}

unsafe extern "C" fn watcher_callback(
    _observer: AXObserverRef,
    _element: CFTypeRef,
    _notification: *const c_void,
    refcon: *mut c_void,
) {
    if refcon.is_null() {
        return;
    }
    let context = unsafe { &*refcon.cast::<WatcherContext>() };
    context.sender.send(Event::WindowFrameChanged(context.wid));
}

struct MacWatcher {
    observer: RefCell<AxObserver>,
    _context: Box<WatcherContext>,
}

impl UiWatcher for MacWatcher {
    fn start(&self) { self.observer.borrow_mut().install(); }

    fn stop(&self) { self.observer.borrow_mut().uninstall(); }
}

pub struct MacHost {
    events: EventSender,
    app_elements: RefCell<HashMap<pid_t, AxElement>>,
    known_windows: RefCell<HashMap<WindowId, pid_t>>,
    last_focus: Cell<Option<WindowId>>,
    last_screen: Cell<Option<Frame>>,
}

impl MacHost {
    pub fn new(events: EventSender) -> Rc<MacHost> {
        Rc::new(MacHost {
            events,
            app_elements: RefCell::new(HashMap::default()),
            known_windows: RefCell::new(HashMap::default()),
            last_focus: Cell::new(None),
            last_screen: Cell::new(None),
        })
    }

    fn app_element(&self, pid: pid_t) -> AxElement {
        self.app_elements
            .borrow_mut()
            .entry(pid)
            .or_insert_with(|| {
                let app = AxElement::application(pid);
                app.set_messaging_timeout(AX_MESSAGING_TIMEOUT_S);
                app
            })
            .clone()
    }

    fn window_for_element(&self, element: AxElement, pid: pid_t) -> Option<MacWindow> {
        let wid = element.window_id().ok()?;
        Some(MacWindow::new(element, wid, pid))
    }

    fn lookup(&self, wid: WindowId, pid: pid_t) -> Option<MacWindow> {
        let app = self.app_element(pid);
        for element in app.windows().ok()? {
            if element.window_id().ok() == Some(wid) {
                return Some(MacWindow::new(element, wid, pid));
            }
        }
        None
    }

    fn onscreen_app_windows(&self) -> Vec<(WindowId, pid_t)> {
        window_server::onscreen_windows()
            .into_iter()
            .filter(|info| info.layer == 0)
            .map(|info| (info.wid, info.pid))
            .collect()
    }

    /// Diff the window server against the last poll and emit events. Called
    /// from every main-loop iteration.
    pub fn poll(&self) {
        let current = self.onscreen_app_windows();

        let mut known = self.known_windows.borrow_mut();
        let mut seen: HashMap<WindowId, pid_t> = HashMap::default();
        for (wid, pid) in &current {
            seen.insert(*wid, *pid);
            if !known.contains_key(wid) {
                if let Some(window) = self.lookup(*wid, *pid) {
                    debug!(%wid, pid, "window appeared");
                    self.events.send(Event::WindowVisible(Rc::new(window)));
                }
            }
        }
        for (wid, _) in known.iter() {
            if !seen.contains_key(wid) {
                debug!(%wid, "window gone");
                self.events.send(Event::WindowDestroyed(*wid));
            }
        }
        *known = seen;
        drop(known);

        let focused = self.focused_window().and_then(|w| w.id().ok());
        if focused != self.last_focus.get() {
            self.last_focus.set(focused);
            if let Some(window) = self.focused_window() {
                self.events.send(Event::WindowFocused(window));
            }
        }

        let screen = self.screen().map(|s| s.frame);
        if let Some(frame) = screen {
            let previous = self.last_screen.replace(Some(frame));
            if previous.is_some_and(|p| !p.same_as(&frame)) {
                warn!(?frame, "screen geometry changed");
                self.events.send(Event::ScreenParametersChanged);
            }
        }
    }
}

impl Host for MacHost {
    fn focused_window(&self) -> Option<WindowRef> {
        let app = unsafe { NSWorkspace::sharedWorkspace().frontmostApplication() }?;
        let pid = unsafe { app.processIdentifier() };
        let element = self.app_element(pid).focused_window().ok()?;
        let window = self.window_for_element(element, pid)?;
        Some(Rc::new(window))
    }

    fn window_by_id(&self, wid: WindowId) -> Option<WindowRef> {
        let pid = self.known_windows.borrow().get(&wid).copied().or_else(|| {
            self.onscreen_app_windows()
                .into_iter()
                .find(|(w, _)| *w == wid)
                .map(|(_, pid)| pid)
        })?;
        self.lookup(wid, pid).map(|window| Rc::new(window) as WindowRef)
    }

    fn list_windows(&self) -> Vec<WindowRef> {
        let mut by_pid: HashMap<pid_t, Vec<WindowId>> = HashMap::default();
        for (wid, pid) in self.onscreen_app_windows() {
            by_pid.entry(pid).or_default().push(wid);
        }
        let mut out: Vec<WindowRef> = Vec::new();
        for (pid, wids) in by_pid {
            let app = self.app_element(pid);
            let Ok(elements) = app.windows() else { continue };
            for element in elements {
                let Ok(wid) = element.window_id() else { continue };
                if wids.contains(&wid) {
                    out.push(Rc::new(MacWindow::new(element, wid, pid)));
                }
            }
        }
        out
    }

    fn screen(&self) -> Option<Screen> {
        let mtm = MainThreadMarker::new()?;
        let screen = NSScreen::mainScreen(mtm)?;
        let full = screen.frame();
        let visible = screen.visibleFrame();
        // AppKit rects are bottom-left; the AX plane is top-left.
        let frame = Frame::new(
            visible.origin.x,
            full.size.height - (visible.origin.y + visible.size.height),
            visible.size.width,
            visible.size.height,
        );
        Some(Screen {
            frame,
            space: active_space(),
        })
    }

    fn launch_or_focus(&self, app: &str) {
        let result = std::process::Command::new("/usr/bin/open").args(["-a", app]).spawn();
        if let Err(err) = result {
            warn!(app, %err, "could not launch app");
        }
    }

    fn spawn(&self, argv: &[String]) {
        let Some((program, args)) = argv.split_first() else { return };
        if let Err(err) = std::process::Command::new(program).args(args).spawn() {
            warn!(%program, %err, "could not spawn process");
        }
    }

    fn new_watcher(&self, window: &WindowRef) -> Option<Box<dyn UiWatcher>> {
        let wid = window.id().ok()?;
        let pid = window.pid().ok()?;
        let element = self.lookup(wid, pid)?.element;
        let context = Box::new(WatcherContext {
            sender: self.events.clone(),
            wid,
        });
        let refcon = (&raw const *context) as *mut c_void;
        let observer = AxObserver::create(
            pid,
            element,
            vec!["AXMoved", "AXResized"],
            watcher_callback,
            refcon,
        )
        .map_err(|err| warn!(%wid, ?err, "could not create move watcher"))
        .ok()?;
        Some(Box::new(MacWatcher {
            observer: RefCell::new(observer),
            _context: context,
        }))
    }
}
