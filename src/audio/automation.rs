//! Parameter timelines.
//!
//! An `Automation` is a list of timed events in the style of an audio-graph
//! parameter: a value can be set at a time, or ramped (linearly or
//! exponentially) so that it *arrives* at a value at a time. A ramp always
//! starts from the previous event, and after the last event the value holds.
//! Everything a note does (pitch glide, filter sweep, VCA) is written as one of
//! these before the note starts, so rendering is a pure function of time.

/// Exponential ramps cannot pass through zero; endpoints are clamped to this.
pub const MIN_EXP_VALUE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Curve {
    Step,
    Linear,
    Exponential,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Event {
    time: f64,
    value: f64,
    curve: Curve,
}

#[derive(Clone, Debug)]
pub struct Automation {
    initial: f64,
    events: Vec<Event>,
    // number of events whose time is <= the last evaluated time
    cursor: usize,
    last_t: f64,
}

impl Automation {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            events: Vec::with_capacity(4),
            cursor: 0,
            last_t: f64::NEG_INFINITY,
        }
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(Event { time, value, curve: Curve::Step })
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(Event { time, value, curve: Curve::Linear })
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        let value = value.max(MIN_EXP_VALUE);
        self.insert(Event { time, value, curve: Curve::Exponential })
    }

    /// Value at `t` without touching the cursor.
    pub fn sample(&self, t: f64) -> f64 {
        let idx = self.events.partition_point(|e| e.time <= t);
        self.evaluate(idx, t)
    }

    /// Value at `t`, for callers walking forward through time one frame at
    /// a time. Falls back to a search if `t` moves backwards.
    pub fn value_at(&mut self, t: f64) -> f64 {
        if t < self.last_t {
            self.cursor = self.events.partition_point(|e| e.time <= t);
        }
        while self.cursor < self.events.len() && self.events[self.cursor].time <= t {
            self.cursor += 1;
        }
        self.last_t = t;
        self.evaluate(self.cursor, t)
    }

    // events at the same time keep their insertion order
    fn insert(&mut self, event: Event) -> &mut Self {
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
        self.cursor = 0;
        self.last_t = f64::NEG_INFINITY;
        self
    }

    fn evaluate(&self, idx: usize, t: f64) -> f64 {
        let (t0, v0) = match idx {
            0 => (0.0, self.initial),
            _ => {
                let prev = self.events[idx - 1];
                (prev.time, prev.value)
            }
        };
        let Some(next) = self.events.get(idx) else {
            return v0;
        };
        let span = next.time - t0;
        let frac = if span > 0.0 { ((t - t0) / span).clamp(0.0, 1.0) } else { 1.0 };
        match next.curve {
            Curve::Step => v0,
            Curve::Linear => v0 + (next.value - v0) * frac,
            Curve::Exponential => {
                let a = v0.max(MIN_EXP_VALUE);
                a * (next.value / a).powf(frac)
            }
        }
    }
}
