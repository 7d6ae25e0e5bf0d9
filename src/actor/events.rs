//! Events, commands and one-shot timers for the cooperative thread.
//!
//! Everything the manager reacts to arrives through one queue: OS window
//! events from the host, user commands from the hotkey surface, and the
//! manager's own delayed events. Debounce cancellation is modeled with
//! generation tokens carried inside the delayed event; a stale token is
//! ignored on arrival, which is cheaper than actually unscheduling.

use std::cell::RefCell;
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::host::{WindowRef, live_id};
use crate::layout_engine::Direction;
use crate::sys::window_server::WindowId;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    FocusDirection(Direction),
    NextWindow,
    PrevWindow,
    SwapDirection(Direction),
    Slurp,
    Barf,
    SwitchWorkspace(String),
    MoveWindowToWorkspace(String),
    JumpToApp(String),
    ToggleJump,
    RefreshWindows,
}

pub enum Event {
    /// A window became visible (created, unhidden, or discovered at
    /// startup).
    WindowVisible(WindowRef),
    /// A window left the visible set without being destroyed (hidden,
    /// minimized, native fullscreen).
    WindowNotVisible(WindowId),
    WindowDestroyed(WindowId),
    WindowFocused(WindowRef),
    /// A watcher saw an OS-initiated move or resize.
    WindowFrameChanged(WindowId),
    /// Screen geometry changed (resolution, display set).
    ScreenParametersChanged,
    Command(Command),

    /// The post-startup settle delay expired; workspaces partition now.
    SettleElapsed,
    /// The cross-workspace focus debounce fired.
    FocusDebounceElapsed { wid: WindowId, token: u64 },
    /// A window assigned to an inactive workspace at creation gets parked
    /// shortly after, once the app has finished placing it.
    DeferredPark(WindowId),
    /// Re-arm watchers stopped around a programmatic move batch.
    RestartWatchers(Vec<WindowId>),
    /// Second focus pass to counter macOS focus-stealing after animations.
    Refocus(WindowId),
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::WindowVisible(w) => write!(f, "WindowVisible({:?})", live_id(w)),
            Event::WindowNotVisible(wid) => write!(f, "WindowNotVisible({wid:?})"),
            Event::WindowDestroyed(wid) => write!(f, "WindowDestroyed({wid:?})"),
            Event::WindowFocused(w) => write!(f, "WindowFocused({:?})", live_id(w)),
            Event::WindowFrameChanged(wid) => write!(f, "WindowFrameChanged({wid:?})"),
            Event::ScreenParametersChanged => write!(f, "ScreenParametersChanged"),
            Event::Command(command) => write!(f, "Command({command:?})"),
            Event::SettleElapsed => write!(f, "SettleElapsed"),
            Event::FocusDebounceElapsed { wid, token } => {
                write!(f, "FocusDebounceElapsed({wid:?}, token {token})")
            }
            Event::DeferredPark(wid) => write!(f, "DeferredPark({wid:?})"),
            Event::RestartWatchers(wids) => write!(f, "RestartWatchers({wids:?})"),
            Event::Refocus(wid) => write!(f, "Refocus({wid:?})"),
        }
    }
}

/// Hand into host callbacks; events land on the queue the main loop drains.
#[derive(Clone, Default)]
pub struct EventSender {
    queue: Rc<RefCell<VecDeque<Event>>>,
}

impl EventSender {
    pub fn new() -> EventSender { EventSender::default() }

    pub fn send(&self, event: Event) { self.queue.borrow_mut().push_back(event); }

    pub fn pop(&self) -> Option<Event> { self.queue.borrow_mut().pop_front() }

    pub fn is_empty(&self) -> bool { self.queue.borrow().is_empty() }
}

/// Schedules one-shot delayed events back onto the cooperative thread.
pub trait Scheduler {
    fn post_after(&self, delay: Duration, event: Event);
}

struct TimerEntry {
    due: Instant,
    seq: u64,
    event: Event,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for TimerEntry {
    // Reversed so the heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.due.cmp(&self.due).then(other.seq.cmp(&self.seq))
    }
}

/// The production scheduler: a due-time heap the main loop polls between
/// queue drains and run-loop pumps.
#[derive(Default)]
pub struct TimerQueue {
    heap: RefCell<BinaryHeap<TimerEntry>>,
    next_seq: std::cell::Cell<u64>,
}

impl TimerQueue {
    pub fn new() -> TimerQueue { TimerQueue::default() }

    /// Pop one due event; call until `None` each loop iteration.
    pub fn pop_due(&self, now: Instant) -> Option<Event> {
        let mut heap = self.heap.borrow_mut();
        if heap.peek().is_some_and(|entry| entry.due <= now) {
            return heap.pop().map(|entry| entry.event);
        }
        None
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.heap.borrow().peek().map(|entry| entry.due)
    }
}

impl Scheduler for TimerQueue {
    fn post_after(&self, delay: Duration, event: Event) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.heap.borrow_mut().push(TimerEntry {
            due: Instant::now() + delay,
            seq,
            event,
        });
    }
}
