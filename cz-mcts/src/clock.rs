//! Per-move deadline computation and the timeout signal.
//!
//! The clock is owned by the driver. Workers read `has_expired()` without
//! locking (an atomic deadline snapshot); the driver blocks on
//! `wait_deadline` and feeds search progress back via `update_deadline`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use cz_core::{Color, EasingCurve, SearchLimits, SearchOptions};
use parking_lot::{Condvar, Mutex};

/// Completed iterations required before any time-based early stop.
pub const MINIMUM_DEPTH: u32 = 3;

/// Default deadline when no time control is in effect.
const FALLBACK_DEADLINE_MS: i64 = 5000;

/// Sentinel for "no deadline" in the atomic snapshot.
const NO_DEADLINE: i64 = i64::MAX;

/// Direction of change of the best-move evaluation across iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trend {
    Better,
    #[default]
    Same,
    Worse,
}

/// Search progress telemetry fed back into the deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchInfo {
    pub depth: u32,
    pub trend: Trend,
    /// Magnitude of the evaluation swing, in [0, 1].
    pub trend_degree: f32,
}

struct ClockState {
    active: bool,
    on_the_clock: Color,
    limits: SearchLimits,
    info: SearchInfo,
    trend_factor_ms: i64,
    material_score: i32,
    half_move_number: u32,
}

pub struct Clock {
    epoch: Instant,
    /// Microseconds from `epoch` when the move started.
    start_us: AtomicI64,
    /// Absolute deadline in microseconds from `epoch`; `NO_DEADLINE` = none.
    deadline_us: AtomicI64,
    move_overhead_ms: i64,
    easing: EasingCurve,
    enable_trend_factor: bool,
    state: Mutex<ClockState>,
    deadline_cv: Condvar,
}

impl Clock {
    pub fn new(options: &SearchOptions) -> Self {
        Self {
            epoch: Instant::now(),
            start_us: AtomicI64::new(0),
            deadline_us: AtomicI64::new(NO_DEADLINE),
            move_overhead_ms: options.move_overhead_ms,
            easing: options.easing_curve,
            enable_trend_factor: options.enable_trend_factor,
            state: Mutex::new(ClockState {
                active: false,
                on_the_clock: Color::White,
                limits: SearchLimits::default(),
                info: SearchInfo::default(),
                trend_factor_ms: 0,
                material_score: 0,
                half_move_number: 0,
            }),
            deadline_cv: Condvar::new(),
        }
    }

    pub fn set_limits(&self, limits: SearchLimits) {
        self.state.lock().limits = limits;
    }

    /// Mark the clock active for `side`, reset telemetry, restart the move
    /// timer, and compute the first deadline.
    pub fn start_deadline(&self, side: Color, material_score: i32, half_move_number: u32) {
        let mut s = self.state.lock();
        s.active = true;
        s.on_the_clock = side;
        s.info = SearchInfo::default();
        s.material_score = material_score;
        s.half_move_number = half_move_number;
        self.start_us.store(self.now_us(), Ordering::Release);
        self.recalculate(&mut s);
        self.deadline_cv.notify_all();
        log::debug!(
            "clock started for {:?} at half-move {}, deadline {:?}ms",
            s.on_the_clock,
            s.half_move_number,
            self.deadline_ms()
        );
    }

    /// Replace the stored telemetry and recompute the deadline while the
    /// search is running.
    pub fn update_deadline(&self, info: SearchInfo, _is_partial: bool) {
        let mut s = self.state.lock();
        if !s.active {
            return;
        }
        s.info = info;
        self.recalculate(&mut s);
        self.deadline_cv.notify_all();
    }

    pub fn deactivate(&self) {
        let mut s = self.state.lock();
        s.active = false;
        self.deadline_us.store(NO_DEADLINE, Ordering::Release);
        self.deadline_cv.notify_all();
    }

    /// Milliseconds since `start_deadline`.
    pub fn elapsed_ms(&self) -> i64 {
        (self.now_us() - self.start_us.load(Ordering::Acquire)) / 1000
    }

    /// Lock-free; workers poll this once per iteration.
    pub fn has_expired(&self) -> bool {
        let deadline = self.deadline_us.load(Ordering::Acquire);
        deadline != NO_DEADLINE && self.now_us() >= deadline
    }

    /// The computed deadline in milliseconds from the start of the move;
    /// `None` when searching without one.
    pub fn deadline_ms(&self) -> Option<i64> {
        let deadline = self.deadline_us.load(Ordering::Acquire);
        if deadline == NO_DEADLINE {
            return None;
        }
        Some((deadline - self.start_us.load(Ordering::Acquire)) / 1000)
    }

    /// Milliseconds until the deadline; `None` when searching without one.
    pub fn time_to_deadline(&self) -> Option<i64> {
        let deadline = self.deadline_us.load(Ordering::Acquire);
        if deadline == NO_DEADLINE {
            return None;
        }
        Some((deadline - self.now_us()) / 1000)
    }

    pub fn trend_factor_ms(&self) -> i64 {
        self.state.lock().trend_factor_ms
    }

    pub fn less_than_move_overhead(&self) -> bool {
        self.time_to_deadline()
            .is_some_and(|ttd| ttd < self.move_overhead_ms)
    }

    pub fn past_move_overhead(&self) -> bool {
        self.elapsed_ms() > self.move_overhead_ms
    }

    /// Block until the deadline passes, the deadline changes, or `max_wait`
    /// elapses. Returns whether the deadline has passed.
    pub fn wait_deadline(&self, max_wait: Duration) -> bool {
        if self.has_expired() {
            return true;
        }
        let mut wait = max_wait;
        if let Some(ttd) = self.time_to_deadline() {
            wait = wait.min(Duration::from_millis(ttd.max(0) as u64));
        }
        let mut s = self.state.lock();
        let _ = self.deadline_cv.wait_for(&mut s, wait);
        drop(s);
        self.has_expired()
    }

    fn now_us(&self) -> i64 {
        self.epoch.elapsed().as_micros() as i64
    }

    fn recalculate(&self, s: &mut ClockState) {
        if s.limits.infinite {
            self.deadline_us.store(NO_DEADLINE, Ordering::Release);
            return;
        }

        let overhead = self.move_overhead_ms;
        let time = s.limits.time(s.on_the_clock);
        let increment = s.limits.increment(s.on_the_clock).unwrap_or(0);

        // Accumulate the panic budget; the largest single step is a quarter
        // of the remaining time. Shrinks geometrically while trending better.
        if let Some(t) = time {
            let maximum = t - overhead;
            let raw = ((maximum as f64 / 4.0) * f64::from(s.info.trend_degree)).round() as i64;
            if s.info.trend != Trend::Better {
                s.trend_factor_ms += raw;
            } else {
                s.trend_factor_ms /= 2;
            }
            s.trend_factor_ms = s.trend_factor_ms.max(0);
        }

        let mut deadline = FALLBACK_DEADLINE_MS;
        if let Some(move_time) = s.limits.move_time_ms {
            deadline = move_time - overhead;
        } else if let Some(t) = time {
            let maximum = t - overhead;
            if s.info.depth >= MINIMUM_DEPTH {
                let budget =
                    t as f64 / expected_half_moves_till_eog(s.material_score) as f64
                        + increment as f64;
                let mut ideal = self.easing.apply(budget).round() as i64;
                if self.enable_trend_factor {
                    ideal += s.trend_factor_ms;
                }
                deadline = maximum.min(ideal);
            } else {
                deadline = maximum;
            }
        }
        let deadline = deadline.max(0);

        let start = self.start_us.load(Ordering::Acquire);
        self.deadline_us
            .store(start + deadline * 1000, Ordering::Release);
        log::trace!(
            "deadline recomputed: {}ms (depth {}, trend factor {}ms)",
            deadline,
            s.info.depth,
            s.trend_factor_ms
        );
    }
}

/// Material-based estimate of the half-moves left to the end of the game.
/// Heuristic from http://facta.junis.ni.ac.rs/acar/acar200901/acar2009-07.pdf
pub fn expected_half_moves_till_eog(material_score: i32) -> i64 {
    let m = i64::from(material_score);
    if m < 20 {
        m + 10
    } else if m <= 60 {
        (0.375 * m as f64).round() as i64 + 22
    } else {
        (1.25 * m as f64).round() as i64 - 30
    }
}
