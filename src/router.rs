//! The event router: one queue, one consumer
//!
//! Signals, pointer input, control requests and due timers are all handled on
//! the router thread, each to completion before the next one starts.

use chrono::{DateTime, FixedOffset};
use std::ops::ControlFlow;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::timing;
use crate::display::DisplaySink;
use crate::event::{Event, Signal};
use crate::ipc::{ControlRequest, ControlResponse};
use crate::level::Level;
use crate::schedule::Clock;
use crate::store::KeyValueStore;
use crate::tracker::Tracker;

/// Detects wall-clock changes by comparing it with the monotonic clock
#[derive(Debug, Clone, Copy)]
pub struct ClockWatch {
    wall: DateTime<FixedOffset>,
    instant: Instant,
}

impl ClockWatch {
    pub fn new(clock: &dyn Clock) -> Self {
        Self {
            wall: clock.now(),
            instant: clock.instant(),
        }
    }

    /// Signals implied by the change since the previous sample
    pub fn sample(&mut self, wall: DateTime<FixedOffset>, instant: Instant) -> Vec<Signal> {
        let mut signals = Vec::new();
        let elapsed = instant.saturating_duration_since(self.instant);
        let drift = (wall - self.wall).to_std().map_or_else(
            // Wall clock went backwards
            |_| elapsed + (self.wall - wall).to_std().unwrap_or_default(),
            |forward| forward.abs_diff(elapsed),
        );

        if wall.offset() != self.wall.offset() {
            signals.push(Signal::TimezoneChanged);
        }
        if drift > timing::CLOCK_JUMP_TOLERANCE {
            signals.push(Signal::TimeChanged);
        } else if wall.date_naive() != self.wall.date_naive() {
            signals.push(Signal::DateChanged);
        }

        self.wall = wall;
        self.instant = instant;
        signals
    }
}

pub struct Router<S: KeyValueStore, D: DisplaySink> {
    tracker: Tracker<S, D>,
    events: Receiver<Event>,
    watch: ClockWatch,
}

impl<S: KeyValueStore, D: DisplaySink> Router<S, D> {
    pub fn new(tracker: Tracker<S, D>, events: Receiver<Event>) -> Self {
        let watch = ClockWatch::new(tracker.clock());
        Self {
            tracker,
            events,
            watch,
        }
    }

    /// Serve events until shutdown, then stop the tracker and hand it back
    pub fn run(mut self) -> Tracker<S, D> {
        info!("Event router started");
        loop {
            let now = self.tracker.now_instant();
            let wait = self
                .tracker
                .next_deadline()
                .map_or(timing::CLOCK_WATCH_INTERVAL, |deadline| {
                    deadline.saturating_duration_since(now)
                })
                .min(timing::CLOCK_WATCH_INTERVAL);

            match self.events.recv_timeout(wait) {
                Ok(event) => {
                    if self.dispatch(event).is_break() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("All event sources closed");
                    break;
                }
            }

            self.watch_clock();
            self.tracker.run_due();
        }

        info!("Event router stopping");
        self.tracker.stop();
        self.tracker
    }

    fn watch_clock(&mut self) {
        let clock = self.tracker.clock();
        let (wall, instant) = (clock.now(), clock.instant());
        for signal in self.watch.sample(wall, instant) {
            info!(%signal, "Wall clock changed");
            self.tracker.handle_signal(signal);
        }
    }

    pub fn dispatch(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::Signal(signal) => self.tracker.handle_signal(signal),
            Event::Pointer(pointer) => self.tracker.handle_pointer(pointer),
            Event::Redraw => self.tracker.redraw(),
            Event::Control { request, reply } => {
                let shutdown = request == ControlRequest::Shutdown;
                let response = self.handle_control(request);
                if reply.send(response).is_err() {
                    debug!("Control client went away before the reply");
                }
                if shutdown {
                    return ControlFlow::Break(());
                }
            }
            Event::Shutdown => {
                info!("Shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_control(&mut self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::Signal(signal) => {
                info!(%signal, "Signal via control socket");
                self.tracker.handle_signal(signal);
                ControlResponse::Ack
            }
            ControlRequest::Status => ControlResponse::Status(self.tracker.status()),
            ControlRequest::SetSetting { key, value } => {
                match self.tracker.apply_setting(&key, value) {
                    Ok(()) => ControlResponse::Ack,
                    Err(e) => ControlResponse::Error(format!("{e:#}")),
                }
            }
            ControlRequest::SelectPosition { level, position } => {
                let Some(level) = Level::from_number(level) else {
                    return ControlResponse::Error(format!("No level {level}, expected 1-3"));
                };
                match self.tracker.select_position(level, &position) {
                    Ok(()) => ControlResponse::Ack,
                    Err(e) => ControlResponse::Error(format!("{e:#}")),
                }
            }
            ControlRequest::Ping => ControlResponse::Pong,
            ControlRequest::Shutdown => {
                info!("Shutdown requested via control socket");
                ControlResponse::Ack
            }
        }
    }

    pub fn tracker(&self) -> &Tracker<S, D> {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::LogDisplay;
    use crate::event::PointerEvent;
    use crate::schedule::testing::ManualClock;
    use crate::store::{MemoryStore, Value};
    use crate::types::Point;
    use std::sync::mpsc;
    use std::time::Duration;

    fn sample_at(watch: &mut ClockWatch, wall: &str, instant: Instant) -> Vec<Signal> {
        watch.sample(DateTime::parse_from_rfc3339(wall).unwrap(), instant)
    }

    #[test]
    fn test_clock_watch_ignores_normal_progress() {
        let clock = ManualClock::at("2026-06-15T10:00:00Z");
        let mut watch = ClockWatch::new(&clock);
        let start = clock.instant();
        assert!(sample_at(&mut watch, "2026-06-15T10:00:01Z", start + Duration::from_secs(1)).is_empty());
        assert!(
            sample_at(&mut watch, "2026-06-15T10:00:03Z", start + Duration::from_millis(2500))
                .is_empty()
        );
    }

    #[test]
    fn test_clock_watch_detects_jumps_both_ways() {
        let clock = ManualClock::at("2026-06-15T10:00:00Z");
        let mut watch = ClockWatch::new(&clock);
        let start = clock.instant();
        assert_eq!(
            sample_at(&mut watch, "2026-06-15T12:00:00Z", start + Duration::from_secs(1)),
            vec![Signal::TimeChanged]
        );
        assert_eq!(
            sample_at(&mut watch, "2026-06-15T09:00:00Z", start + Duration::from_secs(2)),
            vec![Signal::TimeChanged]
        );
    }

    #[test]
    fn test_clock_watch_detects_zone_and_date() {
        let clock = ManualClock::at("2026-06-15T23:59:59Z");
        let mut watch = ClockWatch::new(&clock);
        let start = clock.instant();
        assert_eq!(
            sample_at(&mut watch, "2026-06-16T00:00:00Z", start + Duration::from_secs(1)),
            vec![Signal::DateChanged]
        );
        assert_eq!(
            sample_at(&mut watch, "2026-06-16T02:00:01+02:00", start + Duration::from_secs(2)),
            vec![Signal::TimezoneChanged]
        );
    }

    fn router() -> (Router<MemoryStore, LogDisplay>, mpsc::Sender<Event>, ManualClock) {
        let clock = ManualClock::at("2026-06-15T10:00:00Z");
        let mut tracker = Tracker::new(MemoryStore::new(), LogDisplay::new(), Box::new(clock.clone()));
        tracker.start();
        let (tx, rx) = mpsc::channel();
        (Router::new(tracker, rx), tx, clock)
    }

    fn control(router: &mut Router<MemoryStore, LogDisplay>, request: ControlRequest) -> ControlResponse {
        let (reply, answer) = mpsc::channel();
        let flow = router.dispatch(Event::Control { request, reply });
        assert!(flow.is_continue());
        answer.recv().unwrap()
    }

    #[test]
    fn test_control_requests() {
        let (mut router, _tx, _clock) = router();
        assert_eq!(control(&mut router, ControlRequest::Ping), ControlResponse::Pong);
        assert_eq!(
            control(
                &mut router,
                ControlRequest::SetSetting {
                    key: "level_1_font_size".into(),
                    value: Value::Int(33),
                }
            ),
            ControlResponse::Ack
        );
        assert_eq!(router.tracker().display().state().font_size, 33);

        assert!(matches!(
            control(
                &mut router,
                ControlRequest::SelectPosition {
                    level: 4,
                    position: "Top Left".into(),
                }
            ),
            ControlResponse::Error(_)
        ));

        match control(&mut router, ControlRequest::Status) {
            ControlResponse::Status(status) => assert!(status.running),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_events_are_handled_in_order_until_shutdown() {
        let (router, tx, _clock) = router();
        tx.send(Event::Pointer(PointerEvent::Down(Point::new(0, 0)))).unwrap();
        tx.send(Event::Pointer(PointerEvent::Up(Point::new(0, 0)))).unwrap();
        tx.send(Event::Signal(Signal::ScreenOff)).unwrap();
        let (reply, answer) = mpsc::channel();
        tx.send(Event::Control {
            request: ControlRequest::Shutdown,
            reply,
        })
        .unwrap();
        tx.send(Event::Signal(Signal::UserPresent)).unwrap();

        let tracker = router.run();
        assert_eq!(answer.recv().unwrap(), ControlResponse::Ack);
        assert!(!tracker.is_running());
        assert!(tracker.state().is_manually_hidden);
        // Shutdown came first, so the unlock was never handled
        assert!(!tracker.state().is_unlocked);
        assert_eq!(tracker.next_deadline(), None);
    }
}
