//! The tracking core
//!
//! [`Tracker`] owns the configuration snapshot, the live tracking state and
//! every deferred callback. It is driven from one thread (the router) and
//! never blocks: waits are deadlines in its [`TimerQueue`] that the router
//! turns back into calls to [`Tracker::run_due`].
//!
//! Display and store failures are logged and swallowed. Counting continues
//! whether or not the overlay is on screen.

use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::color::Color;
use crate::config::{Anchor, ConfigSnapshot, PositionChoice};
use crate::constants::{keys, palette, timing};
use crate::display::DisplaySink;
use crate::drag::{DragController, DragOutcome};
use crate::event::{PointerEvent, Signal};
use crate::ipc::StatusReport;
use crate::level::{self, BlinkPhase, Level};
use crate::position::{self, Placement};
use crate::schedule::{self, Clock, ResetSchedule};
use crate::store::{KeyValueStore, Value};
use crate::timers::{TimerKind, TimerQueue};

/// Authoritative screen and lock state, when the platform can report it
pub trait DeviceProbe: Send {
    fn is_screen_on(&self) -> bool;
    fn is_unlocked(&self) -> bool;
}

/// Live state of the current period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingState {
    pub accumulated_seconds: u64,
    pub is_screen_on: bool,
    pub is_unlocked: bool,
    pub current_level: Level,
    pub is_timer_visible: bool,
    pub is_manually_hidden: bool,
    /// Interval-mode phase; always true in "always" mode
    pub interval_visible: bool,
    pub blinking: bool,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            accumulated_seconds: 0,
            is_screen_on: false,
            is_unlocked: false,
            current_level: Level::One,
            is_timer_visible: false,
            is_manually_hidden: false,
            interval_visible: true,
            blinking: false,
        }
    }
}

pub struct Tracker<S: KeyValueStore, D: DisplaySink> {
    store: S,
    display: D,
    clock: Box<dyn Clock>,
    probe: Option<Box<dyn DeviceProbe>>,
    config: ConfigSnapshot,
    state: TrackingState,
    timers: TimerQueue,
    drag: DragController,
    running: bool,
    counter_key: String,
    next_reset: Option<DateTime<FixedOffset>>,
    /// Level whose placement was last pushed to the display
    placed_level: Option<Level>,
    display_healthy: bool,
}

impl<S: KeyValueStore, D: DisplaySink> Tracker<S, D> {
    pub fn new(store: S, display: D, clock: Box<dyn Clock>) -> Self {
        let config = ConfigSnapshot::load(&store);
        let counter_key =
            schedule::counter_key(&clock.period_start(config.reset_hour, config.reset_minute));
        Self {
            store,
            display,
            clock,
            probe: None,
            config,
            state: TrackingState::default(),
            timers: TimerQueue::new(),
            drag: DragController::new(),
            running: false,
            counter_key,
            next_reset: None,
            placed_level: None,
            display_healthy: true,
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn DeviceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn counter_key(&self) -> &str {
        &self.counter_key
    }

    pub fn next_reset(&self) -> Option<DateTime<FixedOffset>> {
        self.next_reset
    }

    /// Earliest pending deferred callback
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Monotonic "now" of the tracker's clock
    pub fn now_instant(&self) -> Instant {
        self.clock.instant()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Load the counter for the current period, arm the reset and start ticking
    pub fn start(&mut self) {
        self.timers.clear();
        self.drag.cancel();
        self.config = ConfigSnapshot::load(&self.store);
        self.counter_key = schedule::counter_key(
            &self
                .clock
                .period_start(self.config.reset_hour, self.config.reset_minute),
        );
        self.state = TrackingState {
            accumulated_seconds: self
                .store
                .get_int(&self.counter_key)
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(0),
            is_screen_on: true,
            is_unlocked: true,
            ..TrackingState::default()
        };
        if let Some(probe) = &self.probe {
            self.state.is_screen_on = probe.is_screen_on();
            self.state.is_unlocked = probe.is_unlocked();
        }
        self.running = true;
        self.placed_level = None;

        self.check_date_change_and_reset();
        self.schedule_reset();
        self.refresh_display(true);
        self.persist();
        self.post(TimerKind::Tick, timing::ACTIVE_TICK);

        info!(
            seconds = self.state.accumulated_seconds,
            key = %self.counter_key,
            level = %self.state.current_level,
            "Tracker started"
        );
    }

    /// Cancel every pending callback, persist one final time and drop the overlay
    pub fn stop(&mut self) {
        self.timers.clear();
        self.drag.cancel();
        self.state.blinking = false;
        if self.running {
            self.persist();
        }
        self.running = false;
        let result = self.display.detach();
        self.check_display("detach", result);
        info!(seconds = self.state.accumulated_seconds, "Tracker stopped");
    }

    pub fn handle_signal(&mut self, signal: Signal) {
        debug!(%signal, "Handling signal");
        if signal == Signal::BootCompleted {
            self.boot();
            return;
        }
        if !self.running {
            debug!(%signal, "Tracker not running, ignoring signal");
            return;
        }
        match signal {
            Signal::ScreenOff => {
                self.timers.cancel(TimerKind::Tick);
                self.stop_blink();
                self.state.is_screen_on = false;
                self.state.is_unlocked = false;
                self.persist();
                info!(seconds = self.state.accumulated_seconds, "Screen off, counting paused");
            }
            Signal::ScreenOn => {
                self.state.is_screen_on = true;
                if self.check_date_change_and_reset() {
                    self.refresh_display(false);
                }
            }
            Signal::UserPresent => {
                self.state.is_screen_on = true;
                self.state.is_unlocked = true;
                self.check_date_change_and_reset();
                self.refresh_display(false);
                self.post(TimerKind::Tick, timing::ACTIVE_TICK);
                info!(seconds = self.state.accumulated_seconds, "User present, counting resumed");
            }
            Signal::SettingsChanged => {
                self.reload_config();
                self.rekey_period();
                self.schedule_reset();
                self.refresh_display(true);
                self.persist();
            }
            Signal::TimeChanged | Signal::DateChanged | Signal::TimezoneChanged => {
                self.reload_config();
                // The guard must see the old deadline before it is replaced
                self.check_date_change_and_reset();
                self.rekey_period();
                self.schedule_reset();
                self.refresh_display(false);
                self.persist();
            }
            Signal::BootCompleted => {}
        }
    }

    fn boot(&mut self) {
        if !self.display.is_permitted() {
            warn!("Overlay permission missing, not starting tracker on boot");
            return;
        }
        info!("Boot completed, starting tracker");
        if self.running {
            self.persist();
        }
        self.start();
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if !self.running {
            return;
        }
        let now = self.clock.instant();
        match event {
            PointerEvent::Down(at) => {
                let origin = self.display.origin().unwrap_or_default();
                self.drag.press(at, origin, now);
            }
            PointerEvent::Move(at) => {
                if let DragOutcome::Moved(corner) = self.drag.motion(at) {
                    let result = self.display.set_placement(Placement::Offset(corner));
                    self.check_display("set_placement", result);
                }
            }
            PointerEvent::Up(at) => match self.drag.release(at, now) {
                DragOutcome::Tap => self.toggle_hidden(),
                DragOutcome::DragEnded(corner) => {
                    let result = self.display.set_placement(Placement::Offset(corner));
                    self.check_display("set_placement", result);
                    let level = self.state.current_level;
                    position::save_custom(&mut self.store, level, corner);
                    self.placed_level = Some(level);
                    self.flush();
                }
                DragOutcome::Moved(_) | DragOutcome::None => {}
            },
        }
    }

    /// Run every deferred callback whose deadline has passed
    pub fn run_due(&mut self) {
        // Each kind re-arms at most once per run, so this bounds the loop
        for _ in 0..8 {
            let Some(kind) = self.timers.pop_due(self.clock.instant()) else {
                return;
            };
            match kind {
                TimerKind::Tick => self.tick(),
                TimerKind::Blink => self.blink(),
                TimerKind::Reset => self.fire_reset(),
                TimerKind::Unhide => self.unhide(),
            }
        }
    }

    /// One second of accounting. A tick after `stop` does nothing.
    pub fn tick(&mut self) {
        if !self.running {
            debug!("Late tick after stop ignored");
            return;
        }
        let (screen_on, unlocked) = self.device_state();
        if screen_on && unlocked {
            self.check_date_change_and_reset();
            self.state.accumulated_seconds += 1;
            self.refresh_display(false);
            self.record_analytics();
            self.persist();
            self.post(TimerKind::Tick, timing::ACTIVE_TICK);
        } else {
            self.stop_blink();
            self.persist();
            self.post(TimerKind::Tick, timing::IDLE_TICK);
        }
    }

    fn device_state(&mut self) -> (bool, bool) {
        if let Some(probe) = &self.probe {
            self.state.is_screen_on = probe.is_screen_on();
            self.state.is_unlocked = probe.is_unlocked();
        }
        (self.state.is_screen_on, self.state.is_unlocked)
    }

    fn blink(&mut self) {
        if !self.running || !self.state.blinking {
            return;
        }
        self.apply_blink_colors();
        self.post(TimerKind::Blink, timing::BLINK_INTERVAL);
    }

    fn apply_blink_colors(&mut self) {
        let color = self.config.style(self.state.current_level).color;
        let (text, background) =
            BlinkPhase::for_seconds(self.state.accumulated_seconds).colors(color);
        self.push_colors(text, background);
    }

    fn stop_blink(&mut self) {
        self.timers.cancel(TimerKind::Blink);
        if self.state.blinking {
            self.state.blinking = false;
            let color = self.config.style(self.state.current_level).color;
            self.push_colors(color, palette::OVERLAY_BACKGROUND);
            debug!(level = %self.state.current_level, "Blinking stopped");
        }
    }

    fn push_colors(&mut self, text: Color, background: Color) {
        let result = self.display.set_text_color(text);
        self.check_display("set_text_color", result);
        let result = self.display.set_background_color(background);
        self.check_display("set_background_color", result);
    }

    fn fire_reset(&mut self) {
        if !self.running {
            return;
        }
        let now = self.clock.now();
        if let Some(next) = self.next_reset {
            if now < next {
                // Fired ahead of the wall clock; wait out the rest
                self.post(TimerKind::Reset, schedule::delay_until(&now, &next));
                return;
            }
        }
        info!(
            seconds = self.state.accumulated_seconds,
            key = %self.counter_key,
            "Daily reset"
        );
        self.reload_config();
        self.begin_period();
        self.refresh_display(true);
        self.schedule_reset();
        self.persist();
    }

    fn unhide(&mut self) {
        if self.state.is_manually_hidden {
            self.state.is_manually_hidden = false;
            debug!("Auto-unhiding overlay");
            self.apply_visibility();
        }
    }

    fn toggle_hidden(&mut self) {
        self.state.is_manually_hidden = !self.state.is_manually_hidden;
        if self.state.is_manually_hidden {
            self.post(TimerKind::Unhide, timing::AUTO_UNHIDE_DELAY);
        } else {
            self.timers.cancel(TimerKind::Unhide);
        }
        debug!(hidden = self.state.is_manually_hidden, "Overlay tapped");
        self.apply_visibility();
    }

    /// Zero the counter if the persisted reset deadline has passed.
    /// Returns whether a reset happened.
    pub fn check_date_change_and_reset(&mut self) -> bool {
        let now = self.clock.now();
        match ResetSchedule::from_stored(self.store.get_int(keys::NEXT_RESET_TIMESTAMP)) {
            Some(schedule) if schedule.is_due(&now) => {
                info!(
                    seconds = self.state.accumulated_seconds,
                    key = %self.counter_key,
                    "Reset deadline passed, starting a new period"
                );
                self.begin_period();
                self.schedule_reset();
                self.persist();
                true
            }
            Some(_) => false,
            None => {
                let next = self
                    .clock
                    .next_reset(self.config.reset_hour, self.config.reset_minute);
                self.store
                    .set_int(keys::NEXT_RESET_TIMESTAMP, next.timestamp_millis());
                self.flush();
                false
            }
        }
    }

    fn begin_period(&mut self) {
        self.state.accumulated_seconds = 0;
        self.counter_key = schedule::counter_key(
            &self
                .clock
                .period_start(self.config.reset_hour, self.config.reset_minute),
        );
    }

    /// Keep the running total under the key of the period that contains now.
    /// A new reset time or a clock change can move now into another period.
    fn rekey_period(&mut self) {
        let key = schedule::counter_key(
            &self
                .clock
                .period_start(self.config.reset_hour, self.config.reset_minute),
        );
        if key != self.counter_key {
            info!(
                from = %self.counter_key,
                to = %key,
                seconds = self.state.accumulated_seconds,
                "Counter moved to the current period key"
            );
            self.counter_key = key;
        }
    }

    /// Compute the next reset instant and (re)arm its callback
    fn schedule_reset(&mut self) {
        let now = self.clock.now();
        let next = self
            .clock
            .next_reset(self.config.reset_hour, self.config.reset_minute);
        let delay = schedule::delay_until(&now, &next);
        self.next_reset = Some(next);
        self.store
            .set_int(keys::NEXT_RESET_TIMESTAMP, next.timestamp_millis());
        self.post(TimerKind::Reset, delay);
        debug!(next_reset = %next.to_rfc3339(), delay_secs = delay.as_secs(), "Scheduled daily reset");
    }

    fn reload_config(&mut self) {
        self.config = ConfigSnapshot::load(&self.store);
    }

    /// Push text, size, colors, placement and visibility for the current second.
    /// Placement is only re-applied on a level change or when forced.
    pub fn refresh_display(&mut self, force_place: bool) {
        let seconds = self.state.accumulated_seconds;
        let attrs = level::resolve(seconds, &self.config);
        let level_changed = self.placed_level != Some(attrs.level);
        if attrs.level != self.state.current_level {
            info!(from = %self.state.current_level, to = %attrs.level, seconds, "Level changed");
        }
        self.state.current_level = attrs.level;
        self.state.interval_visible = level::interval_visible(seconds, &self.config);

        let result = self.display.set_text(&level::format_hms(seconds));
        self.check_display("set_text", result);
        let result = self.display.set_font_size(attrs.font_size);
        self.check_display("set_font_size", result);

        if (level_changed || force_place) && !self.drag.is_dragging() {
            let placement = position::resolve_placement(attrs.level, &self.config, &self.store);
            let result = self.display.set_placement(placement);
            self.check_display("set_placement", result);
            self.placed_level = Some(attrs.level);
        }

        // No blink loop against a dark or locked screen
        if attrs.blink && self.state.is_screen_on && self.state.is_unlocked {
            if !self.state.blinking {
                self.state.blinking = true;
                self.post(TimerKind::Blink, timing::BLINK_INTERVAL);
                debug!(level = %attrs.level, "Blinking started");
            }
            self.apply_blink_colors();
        } else {
            self.stop_blink();
            self.push_colors(attrs.color, palette::OVERLAY_BACKGROUND);
        }

        self.apply_visibility();
    }

    fn apply_visibility(&mut self) {
        let visible = !self.state.is_manually_hidden && self.state.interval_visible;
        self.state.is_timer_visible = visible;
        let result = self.display.set_visible(visible);
        self.check_display("set_visible", result);
    }

    fn record_analytics(&mut self) {
        let now = self.clock.now();
        let day_key = schedule::analytics_day_key(&now);
        let hour_key = schedule::analytics_hour_key(&now);
        self.store
            .set_int(&day_key, self.state.accumulated_seconds as i64);
        let hour_total = self.store.get_int(&hour_key).unwrap_or(0);
        self.store.set_int(&hour_key, hour_total + 1);
        self.store.insert_into_set(keys::ANALYTICS_DATES, &day_key);
    }

    /// Write the counter and reset bookkeeping, then flush
    fn persist(&mut self) {
        self.store
            .set_int(&self.counter_key, self.state.accumulated_seconds as i64);
        if let Some(next) = self.next_reset {
            self.store
                .set_int(keys::NEXT_RESET_TIMESTAMP, next.timestamp_millis());
        }
        self.flush();
    }

    fn flush(&mut self) {
        if let Err(e) = self.store.flush() {
            warn!(error = ?e, "Failed to persist tracking state");
        }
    }

    fn post(&mut self, kind: TimerKind, delay: std::time::Duration) {
        let now = self.clock.instant();
        self.timers.post(kind, now, delay);
    }

    /// Log display failures; repeated failures drop to debug until one succeeds
    fn check_display(&mut self, operation: &'static str, result: Result<()>) {
        match result {
            Ok(()) => self.display_healthy = true,
            Err(e) if self.display_healthy => {
                warn!(operation, error = ?e, "Display update failed, accounting continues");
                self.display_healthy = false;
            }
            Err(e) => debug!(operation, error = ?e, "Display update failed"),
        }
    }

    /// Write one setting and apply it like a settings-changed notification.
    /// Level position keys go through [`Tracker::select_position`].
    pub fn apply_setting(&mut self, key: &str, value: Value) -> Result<()> {
        if let Some(level) = Level::ALL
            .into_iter()
            .find(|level| keys::position(level.number()) == key)
        {
            let Value::Str(name) = value else {
                bail!("{key} expects a position name");
            };
            return self.select_position(level, &name);
        }
        info!(key = %key, value = ?value, "Setting changed");
        self.store.set(key, value);
        self.flush();
        self.handle_signal(Signal::SettingsChanged);
        Ok(())
    }

    /// Choose a level's position. A named anchor clears the level's custom offset.
    pub fn select_position(&mut self, level: Level, name: &str) -> Result<()> {
        let choice = if name.trim().eq_ignore_ascii_case(PositionChoice::CUSTOM_NAME) {
            PositionChoice::Custom
        } else {
            match Anchor::from_name(name) {
                Some(anchor) => PositionChoice::Named(anchor),
                None => bail!("Unknown position '{name}'"),
            }
        };
        info!(level = %level, position = choice.as_str(), "Position selected");
        position::store_choice(&mut self.store, level, choice);
        self.flush();
        self.handle_signal(Signal::SettingsChanged);
        Ok(())
    }

    pub fn redraw(&mut self) {
        let result = self.display.redraw();
        self.check_display("redraw", result);
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            accumulated_seconds: self.state.accumulated_seconds,
            display_text: level::format_hms(self.state.accumulated_seconds),
            level: self.state.current_level.number(),
            screen_on: self.state.is_screen_on,
            unlocked: self.state.is_unlocked,
            running: self.running,
            timer_visible: self.state.is_timer_visible,
            manually_hidden: self.state.is_manually_hidden,
            blinking: self.state.blinking,
            counter_key: self.counter_key.clone(),
            next_reset: self.next_reset.map(|next| next.to_rfc3339()),
        }
    }
}
