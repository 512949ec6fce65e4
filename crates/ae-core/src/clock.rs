//! Sequencer clock: tempo, time signature, loop range, and buffer position.
//!
//! All positions are in frames. The clock never talks to the driver or the
//! render thread directly — the render core owns one and mutates it once per
//! callback; `set_tempo`/`set_loop_range` mutate a "queued" shadow that is
//! swapped in at a safe point (§5 "Shared-resource policy").

use serde::{Deserialize, Serialize};

/// Beats-per-bar / note-value-per-beat, e.g. 4/4, 3/4, 6/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beat_amount: u8,
    pub beat_unit: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beat_amount: 4,
            beat_unit: 4,
        }
    }
}

/// Notifications produced by advancing the clock by one callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockEvents {
    /// Set when `buffer_position % samples_per_step == 0` was crossed, with
    /// the in-callback frame offset at which it happened (§5 "Ordering
    /// guarantees" — notifications report the exact frame within the burst).
    pub step_changed_at: Option<usize>,
    /// Set when `buffer_position == marked_buffer_position` was crossed.
    pub marker_reached_at: Option<usize>,
    /// Set when the loop wrapped back to `min_buffer_position` this callback.
    pub looped: bool,
}

#[derive(Debug, Clone, Copy)]
struct Derived {
    samples_per_beat: f64,
    samples_per_bar: f64,
    samples_per_step: f64,
}

impl Derived {
    fn compute(sample_rate: f64, tempo: f64, time_signature: TimeSignature, steps_per_bar: u32) -> Self {
        let quarter_note = sample_rate * 60.0 / tempo;
        let samples_per_beat = quarter_note * 4.0 / time_signature.beat_unit as f64;
        let samples_per_bar = samples_per_beat * time_signature.beat_amount as f64;
        let samples_per_step = samples_per_bar / steps_per_bar.max(1) as f64;
        Self {
            samples_per_beat,
            samples_per_bar,
            samples_per_step,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct QueuedTempo {
    tempo: f64,
    time_signature: TimeSignature,
}

/// The sample-accurate sequencer clock (§3 "Global clock state").
pub struct Clock {
    sample_rate: f64,
    tempo: f64,
    time_signature: TimeSignature,
    steps_per_bar: u32,
    derived: Derived,

    min_buffer_position: i64,
    max_buffer_position: i64,
    buffer_position: i64,
    step_position: i64,
    marked_buffer_position: Option<i64>,

    queued_tempo: Option<QueuedTempo>,
}

impl Clock {
    pub fn new(sample_rate: f64, tempo: f64, time_signature: TimeSignature, steps_per_bar: u32) -> Self {
        let derived = Derived::compute(sample_rate, tempo, time_signature, steps_per_bar);
        Self {
            sample_rate,
            tempo,
            time_signature,
            steps_per_bar,
            derived,
            min_buffer_position: 0,
            max_buffer_position: derived.samples_per_bar.round() as i64 - 1,
            buffer_position: 0,
            step_position: 0,
            marked_buffer_position: None,
            queued_tempo: None,
        }
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn buffer_position(&self) -> i64 {
        self.buffer_position
    }

    pub fn step_position(&self) -> i64 {
        self.step_position
    }

    pub fn loop_range(&self) -> (i64, i64) {
        (self.min_buffer_position, self.max_buffer_position)
    }

    pub fn samples_per_bar(&self) -> f64 {
        self.derived.samples_per_bar
    }

    pub fn samples_per_beat(&self) -> f64 {
        self.derived.samples_per_beat
    }

    pub fn samples_per_step(&self) -> f64 {
        self.derived.samples_per_step
    }

    pub fn steps_per_bar(&self) -> u32 {
        self.steps_per_bar
    }

    /// Directly set the position, clamped into the loop range (§7 "Invalid
    /// parameter" — out-of-range positions clamp rather than error).
    pub fn set_buffer_position(&mut self, frame: i64) {
        self.buffer_position = frame.clamp(self.min_buffer_position, self.max_buffer_position);
        self.step_position = self.compute_step_position();
    }

    pub fn rewind(&mut self) {
        self.set_buffer_position(self.min_buffer_position);
    }

    /// Set the loop range, clamping the current position into it if needed.
    pub fn set_loop_range(&mut self, min: i64, max: i64, steps_per_bar: u32) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.min_buffer_position = min;
        self.max_buffer_position = max;
        self.steps_per_bar = steps_per_bar.max(1);
        self.derived = Derived::compute(self.sample_rate, self.tempo, self.time_signature, self.steps_per_bar);
        self.buffer_position = self.buffer_position.clamp(min, max);
        self.step_position = self.compute_step_position();
    }

    pub fn set_notification_marker(&mut self, frame: Option<i64>) {
        self.marked_buffer_position = frame;
    }

    /// Queue a tempo/time-signature change; it takes effect on the next
    /// `apply_queued_tempo` call, made by the render core at a callback
    /// boundary (§5, §8 S5).
    pub fn queue_tempo_change(&mut self, tempo: f64, time_signature: TimeSignature) {
        self.queued_tempo = Some(QueuedTempo { tempo, time_signature });
    }

    /// Apply a tempo change immediately (control-thread "now" variant, §6).
    /// Returns the old/new position ratio so callers can rescale dependent
    /// state (event frame offsets, per-channel loop bounds).
    pub fn set_tempo_now(&mut self, tempo: f64, time_signature: TimeSignature) -> f64 {
        self.apply_tempo_change(tempo, time_signature)
    }

    /// Apply a previously queued tempo change, if any. Called once per
    /// render callback, after all mixing for that callback is done (§4.7
    /// step 12). Returns the applied ratio, if a change was pending.
    pub fn apply_queued_tempo(&mut self) -> Option<f64> {
        let queued = self.queued_tempo.take()?;
        Some(self.apply_tempo_change(queued.tempo, queued.time_signature))
    }

    pub fn has_queued_tempo(&self) -> bool {
        self.queued_tempo.is_some()
    }

    fn apply_tempo_change(&mut self, tempo: f64, time_signature: TimeSignature) -> f64 {
        let ratio = self.tempo / tempo;
        self.tempo = tempo;
        self.time_signature = time_signature;
        self.derived = Derived::compute(self.sample_rate, tempo, time_signature, self.steps_per_bar);

        self.min_buffer_position = (self.min_buffer_position as f64 * ratio).round() as i64;
        self.max_buffer_position = (self.max_buffer_position as f64 * ratio).round() as i64;
        self.buffer_position = (self.buffer_position as f64 * ratio)
            .round()
            .clamp(self.min_buffer_position as f64, self.max_buffer_position as f64) as i64;
        self.step_position = self.compute_step_position();
        ratio
    }

    fn compute_step_position(&self) -> i64 {
        if self.derived.samples_per_step <= 0.0 {
            return 0;
        }
        (self.buffer_position as f64 / self.derived.samples_per_step).floor() as i64
    }

    /// Advance the clock by `n` frames, wrapping at `max_buffer_position`
    /// and reporting step/marker crossings with their in-callback offset.
    ///
    /// This only advances the clock's bookkeeping; it is the render core's
    /// job to have already produced `n` frames of audio for the pre-advance
    /// position.
    pub fn advance(&mut self, n: usize) -> ClockEvents {
        let mut events = ClockEvents::default();
        let samples_per_step = self.derived.samples_per_step.max(1.0);

        for offset in 0..n {
            self.buffer_position += 1;

            if self.buffer_position > self.max_buffer_position {
                self.buffer_position = self.min_buffer_position;
                events.looped = true;
            }

            if let Some(marked) = self.marked_buffer_position {
                if self.buffer_position == marked {
                    events.marker_reached_at = Some(offset);
                }
            }

            let new_step = (self.buffer_position as f64 / samples_per_step).floor() as i64;
            if new_step != self.step_position {
                self.step_position = new_step;
                events.step_changed_at = Some(offset);
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_stays_within_loop_range() {
        let mut clock = Clock::new(44_100.0, 120.0, TimeSignature::default(), 16);
        clock.set_loop_range(0, 999, 16);
        for _ in 0..5000 {
            clock.advance(37);
            let (min, max) = clock.loop_range();
            assert!(clock.buffer_position() >= min && clock.buffer_position() <= max);
        }
    }

    #[test]
    fn step_position_matches_formula() {
        let mut clock = Clock::new(44_100.0, 120.0, TimeSignature::default(), 16);
        clock.set_loop_range(0, 100_000, 16);
        clock.advance(12_345);
        let expected = (clock.buffer_position() as f64 / clock.samples_per_step()).floor() as i64;
        assert_eq!(clock.step_position(), expected);
    }

    #[test]
    fn tempo_change_rescales_position_and_range() {
        let mut clock = Clock::new(48_000.0, 120.0, TimeSignature::default(), 16);
        clock.set_loop_range(0, 96_000, 16);
        clock.set_buffer_position(48_000);

        let old_min = 0i64;
        let old_max = 96_000i64;
        let old_pos = 48_000i64;
        let new_tempo = 150.0;
        let ratio = clock.set_tempo_now(new_tempo, TimeSignature::default());

        assert_eq!(ratio, 120.0 / 150.0);
        assert_eq!(clock.tempo(), new_tempo);
        assert_eq!(clock.loop_range().0, (old_min as f64 * ratio).round() as i64);
        assert_eq!(clock.loop_range().1, (old_max as f64 * ratio).round() as i64);
        assert_eq!(clock.buffer_position(), (old_pos as f64 * ratio).round() as i64);
        let (min, max) = clock.loop_range();
        assert!(clock.buffer_position() >= min && clock.buffer_position() <= max);
    }

    #[test]
    fn s5_tempo_update_under_play() {
        let mut clock = Clock::new(48_000.0, 120.0, TimeSignature::new_4_4(), 16);
        clock.set_loop_range(0, 4 * 48_000 - 1, 16);
        clock.set_buffer_position(96_000);

        let new_tempo = 96.0;
        clock.queue_tempo_change(new_tempo, TimeSignature { beat_amount: 12, beat_unit: 8 });
        let ratio = clock.apply_queued_tempo().expect("tempo change was queued");

        assert_eq!(ratio, 120.0 / new_tempo);
        assert_eq!(clock.tempo(), new_tempo);
        assert_eq!(clock.time_signature(), TimeSignature { beat_amount: 12, beat_unit: 8 });
        let (min, max) = clock.loop_range();
        assert!(clock.buffer_position() >= min && clock.buffer_position() <= max);
    }
}

impl TimeSignature {
    pub fn new_4_4() -> Self {
        Self::default()
    }
}
