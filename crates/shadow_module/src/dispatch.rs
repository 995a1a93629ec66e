//! Platform event dispatch
//!
//! Between frames the runtime drains its event source and forwards every
//! event to the enabled modules before frame logic runs.

use std::collections::VecDeque;

use crate::manager::{ModuleManager, PhaseFailure};
use crate::module::PlatformEvent;

/// Anything that produces platform events
pub trait EventSource {
    /// Next pending event, `None` when drained for this frame
    fn poll_event(&mut self) -> Option<PlatformEvent>;
}

/// A FIFO of events pushed by the application or by tests
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<PlatformEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PlatformEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for EventQueue {
    fn poll_event(&mut self) -> Option<PlatformEvent> {
        self.events.pop_front()
    }
}

/// What happened while pumping events
#[derive(Debug, Default)]
pub struct DispatchSummary {
    /// Events forwarded
    pub events: usize,
    /// A [`PlatformEvent::Quit`] was seen
    pub quit_requested: bool,
    pub failures: Vec<PhaseFailure>,
}

/// Drain `source`, forwarding each event to every enabled module
///
/// A quit event is forwarded like any other and flagged in the summary;
/// events after it in the same pump are still delivered.
pub fn pump_events(source: &mut dyn EventSource, manager: &mut ModuleManager) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    while let Some(event) = source.poll_event() {
        if event.is_quit() {
            log::info!("Quit requested");
            summary.quit_requested = true;
        }
        let report = manager.event(&event);
        summary.events += 1;
        summary.failures.extend(report.failures);
    }
    summary
}
