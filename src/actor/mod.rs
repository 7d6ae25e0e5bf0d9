pub mod events;
pub mod jump;
pub mod lifecycle;
pub mod wm;
pub mod workspace;

#[cfg(test)]
pub mod testing;

/// Drive the manager on the main thread: drain the event queue, fire due
/// timers, poll the host for window-server changes, then give the CFRunLoop
/// a slice so AX observer callbacks can land.
#[cfg(target_os = "macos")]
pub fn run(config: crate::common::config::Config) -> anyhow::Result<()> {
    use std::rc::Rc;
    use std::time::Instant;

    use crate::actor::events::{EventSender, Scheduler, TimerQueue};
    use crate::actor::wm::Wm;
    use crate::host::Host;
    use crate::host::mac::MacHost;
    use crate::sys::transport::{AxTransport, Transport};

    const RUN_LOOP_SLICE_S: f64 = 0.05;

    if !crate::sys::ax::process_trusted() {
        anyhow::bail!(
            "accessibility permission missing; grant it in System Settings > Privacy & Security"
        );
    }

    let events = EventSender::new();
    let host = MacHost::new(events.clone());
    let timers = Rc::new(TimerQueue::new());
    let transport = Rc::new(AxTransport);
    let mut wm = Wm::new(
        config,
        Rc::clone(&host) as Rc<dyn Host>,
        transport as Rc<dyn Transport>,
        Rc::clone(&timers) as Rc<dyn Scheduler>,
    );
    wm.setup_workspaces();
    host.poll();

    loop {
        while let Some(event) = events.pop() {
            wm.handle_event(event);
        }
        let now = Instant::now();
        while let Some(event) = timers.pop_due(now) {
            wm.handle_event(event);
        }
        host.poll();
        crate::sys::ax::pump_run_loop(RUN_LOOP_SLICE_S);
    }
}
