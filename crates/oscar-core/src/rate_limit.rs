//! Per-session, per-rate-class token buckets.
//!
//! Each rate class tracks an exponential moving average of the *gap*
//! between consecutive SNACs of that class (in milliseconds): a large
//! average means the session is behaving; a small one means it is
//! flooding. State transitions follow fixed thresholds with one hysteresis
//! rule (see [`RateClassTracker::record`]).

use std::collections::HashMap;

use crate::env::Environment;

/// A rate class's state, in ascending order of how "bad" the session is
/// behaving for that class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateState {
    /// Behaving normally.
    Clear,
    /// Approaching the limit; still dispatched.
    Alert,
    /// Over the limit; SNACs of this class are dropped, not dispatched.
    Limited,
    /// A protocol-critical class crossed its disconnect threshold; the
    /// dispatcher terminates the connection.
    Disconnect,
}

/// Fixed parameters for one rate class, expressed in milliseconds of
/// inter-arrival gap.
#[derive(Debug, Clone, Copy)]
pub struct RateClassParams {
    /// EMA smoothing window.
    pub window: u32,
    /// Gap (ms) at/above which the class is fully clear.
    pub clear_level: u32,
    /// Gap (ms) at/above which the class is merely alert (not yet limited).
    pub alert_level: u32,
    /// Gap (ms) below which the class is limited (dropped).
    pub limit_level: u32,
    /// Gap (ms) below which a critical class disconnects the session.
    pub disconnect_level: u32,
    /// Ceiling the EMA is clamped to.
    pub max_level: u32,
    /// Whether crossing `disconnect_level` terminates the connection. Only
    /// protocol-critical classes (per §4.10) set this.
    pub critical: bool,
}

impl Default for RateClassParams {
    /// A reasonable default class: not critical, thresholds scaled for a
    /// burst of a few SNACs per second being tolerable.
    fn default() -> Self {
        Self {
            window: 10,
            clear_level: 3000,
            alert_level: 2000,
            limit_level: 1000,
            disconnect_level: 200,
            max_level: 6000,
            critical: false,
        }
    }
}

struct RateClassTracker<I> {
    params: RateClassParams,
    current: f64,
    last_time: Option<I>,
    state: RateState,
}

impl<I: Copy + std::ops::Sub<Output = std::time::Duration>> RateClassTracker<I> {
    fn new(params: RateClassParams) -> Self {
        Self { current: f64::from(params.max_level), last_time: None, state: RateState::Clear, params }
    }

    /// Record an arriving SNAC of this class at `now`, update the EMA, and
    /// return `(new_state, transitioned)`.
    fn record(&mut self, now: I) -> (RateState, bool) {
        let prev_state = self.state;

        if let Some(last) = self.last_time {
            let delta_ms = (now - last).as_millis().min(u128::from(u32::MAX)) as f64;
            let window = f64::from(self.params.window.max(1));
            self.current = ((window - 1.0) * self.current + delta_ms) / window;
            self.current = self.current.clamp(0.0, f64::from(self.params.max_level));
        }
        self.last_time = Some(now);

        self.state = next_state(prev_state, self.current, &self.params);
        (self.state, self.state != prev_state)
    }
}

/// `a, limit, alert, disconnect` thresholds are all in the same ms-of-gap
/// unit: smaller current == faster arrivals == worse behavior.
fn next_state(prev: RateState, current: f64, p: &RateClassParams) -> RateState {
    if p.critical && current < f64::from(p.disconnect_level) {
        return RateState::Disconnect;
    }
    // Hysteresis: once Limited, only return to Alert once fully recovered
    // to clear_level, not merely back above limit_level.
    if prev == RateState::Limited {
        return if current >= f64::from(p.clear_level) { RateState::Alert } else { RateState::Limited };
    }
    if current < f64::from(p.limit_level) {
        RateState::Limited
    } else if current < f64::from(p.alert_level) {
        RateState::Alert
    } else {
        RateState::Clear
    }
}

/// A rate class key: `(foodGroup, subGroup)`. The protocol's rate limiting
/// is scoped per SNAC type, not per food group — two sub-groups in the same
/// food group (e.g. `ICBM`'s message-send vs. typing-notification) can have
/// very different legitimate burst rates.
pub type ClassId = (u16, u16);

/// Per-session rate limiter, tracking every class the session has sent a
/// SNAC in.
pub struct RateLimiter<E: Environment> {
    classes: HashMap<ClassId, RateClassTracker<E::Instant>>,
    defaults: HashMap<ClassId, RateClassParams>,
}

impl<E: Environment> RateLimiter<E> {
    /// Build a limiter over the given class-id → params table (an operator
    /// override of the defaults, per §6).
    #[must_use]
    pub fn new(class_params: HashMap<ClassId, RateClassParams>) -> Self {
        Self { classes: HashMap::new(), defaults: class_params }
    }

    /// Record an arriving SNAC in `class_id` at `now`. Unknown classes are
    /// lazily initialized from the configured defaults (or the built-in
    /// default if the class id has no override), matching "if the class is
    /// unknown, allow through with a warning" — the warning is the caller's
    /// responsibility (the dispatcher logs it).
    pub fn record(&mut self, class_id: ClassId, now: E::Instant) -> (RateState, bool) {
        let params = self.defaults.get(&class_id).copied().unwrap_or_default();
        let tracker = self.classes.entry(class_id).or_insert_with(|| RateClassTracker::new(params));
        tracker.record(now)
    }

    /// Current state for a class without recording a new arrival. `Clear`
    /// for classes never seen.
    #[must_use]
    pub fn state(&self, class_id: ClassId) -> RateState {
        self.classes.get(&class_id).map_or(RateState::Clear, |t| t.state)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testutil::TestEnv;

    fn flood_params() -> RateClassParams {
        RateClassParams {
            window: 4,
            clear_level: 3000,
            alert_level: 2000,
            limit_level: 1000,
            disconnect_level: 100,
            max_level: 6000,
            critical: false,
        }
    }

    #[test]
    fn floods_enter_limited_state() {
        let mut limiter = RateLimiter::<TestEnv>::new(HashMap::from([((4, 1), flood_params())]));
        let env = TestEnv::new();

        let mut transitioned_to_limited = false;
        for _ in 0..20 {
            let (state, transitioned) = limiter.record((4, 1), env.now());
            if state == RateState::Limited && transitioned {
                transitioned_to_limited = true;
            }
            env.advance(Duration::from_millis(5));
        }
        assert!(transitioned_to_limited, "rapid-fire SNACs should trip Limited");
    }

    #[test]
    fn spaced_traffic_stays_clear() {
        let mut limiter = RateLimiter::<TestEnv>::new(HashMap::from([((4, 1), flood_params())]));
        let env = TestEnv::new();

        for _ in 0..10 {
            env.advance(Duration::from_secs(5));
            let (state, _) = limiter.record((4, 1), env.now());
            assert_eq!(state, RateState::Clear);
        }
    }

    #[test]
    fn limited_requires_clear_level_to_exit_not_alert_level() {
        let mut limiter = RateLimiter::<TestEnv>::new(HashMap::from([((4, 1), flood_params())]));
        let env = TestEnv::new();

        for _ in 0..10 {
            limiter.record((4, 1), env.now());
            env.advance(Duration::from_millis(1));
        }
        assert_eq!(limiter.state((4, 1)), RateState::Limited);

        // A gap large enough to clear alert_level but not clear_level
        // should NOT move the class out of Limited.
        env.advance(Duration::from_millis(2500));
        let (state, _) = limiter.record((4, 1), env.now());
        assert_eq!(state, RateState::Limited);
    }

    #[test]
    fn critical_class_signals_disconnect() {
        let params = RateClassParams { critical: true, ..flood_params() };
        let mut limiter = RateLimiter::<TestEnv>::new(HashMap::from([((1, 6), params)]));
        let env = TestEnv::new();

        let mut saw_disconnect = false;
        for _ in 0..30 {
            let (state, _) = limiter.record((1, 6), env.now());
            if state == RateState::Disconnect {
                saw_disconnect = true;
                break;
            }
            env.advance(Duration::from_millis(1));
        }
        assert!(saw_disconnect, "critical class flooding should eventually disconnect");
    }

    #[test]
    fn unknown_class_uses_built_in_default() {
        let mut limiter = RateLimiter::<TestEnv>::new(HashMap::new());
        let env = TestEnv::new();
        let (state, _) = limiter.record((9999, 1), env.now());
        assert_eq!(state, RateState::Clear);
    }
}
