//! The event model (§3, §4.3, §9 "Inheritance hierarchy of events").
//!
//! The source models events as a base/derived class tree (base -> sample;
//! base -> synth; base -> cacheable). Here that becomes a tagged variant
//! plus a shared `EventBase` record composed into every leaf instead of
//! inherited.

use ae_audio::AudioBuffer;
use ae_core::{to_linear, to_log, Sample};

use crate::ids::{InstrumentId, SampleId};
use crate::registry::SampleRegistry;
use crate::synth::{EnvelopeState, Synthesizer};

pub const MIN_PLAYBACK_RATE: f64 = 0.01;
pub const MAX_PLAYBACK_RATE: f64 = 100.0;

/// Live (non-sequenced) events stay audible at least this long after a
/// stop request, then fade over a quarter of the final buffer (§4.3).
pub const MIN_LIVE_LENGTH_FRAMES: i64 = 64;

pub fn clamp_playback_rate(rate: f64) -> f64 {
    rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

/// Fields common to every event variant (§3 "Event").
#[derive(Debug, Clone)]
pub struct EventBase {
    pub event_start: i64,
    pub event_length: i64,
    volume_log: Sample,
    pub enabled: bool,
    pub locked: bool,
    pub deletable: bool,
    pub sequenced: bool,
    pub instrument_id: InstrumentId,
}

impl EventBase {
    pub fn new(
        instrument_id: InstrumentId,
        event_start: i64,
        event_length: i64,
        volume_linear: Sample,
        sequenced: bool,
    ) -> Self {
        Self {
            event_start,
            event_length,
            volume_log: to_log(volume_linear.clamp(0.0, 1.0)),
            enabled: true,
            locked: false,
            deletable: false,
            sequenced,
            instrument_id,
        }
    }

    pub fn volume_linear(&self) -> Sample {
        to_linear(self.volume_log)
    }

    pub fn volume_log(&self) -> Sample {
        self.volume_log
    }

    /// Invalidates any cache wrapping this event (§9 "Open question -
    /// caching semantics": audible-parameter mutation invalidates).
    pub fn set_volume_linear(&mut self, volume_linear: Sample) {
        self.volume_log = to_log(volume_linear.clamp(0.0, 1.0));
    }
}

#[derive(Debug, Clone)]
pub struct BaseEvent {
    pub base: EventBase,
    pub buffer: AudioBuffer,
}

#[derive(Debug, Clone, Copy)]
pub struct SampleRange {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub loop_start_offset: i64,
    pub loop_end_offset: i64,
    pub crossfade_ms: f64,
}

impl LoopConfig {
    /// `round(c * s / 1000)` per §8 boundary behavior.
    pub fn crossfade_frames(&self, sample_rate: f64) -> i64 {
        (self.crossfade_ms * sample_rate / 1000.0).round() as i64
    }
}

#[derive(Debug, Clone)]
pub struct SampleEvent {
    pub base: EventBase,
    pub sample_id: SampleId,
    pub playback_rate: Option<f64>,
    pub range: Option<SampleRange>,
    pub loop_config: Option<LoopConfig>,
    /// Sample rate the referenced buffer was captured at, if different from
    /// the engine's (§4.3 extension 4).
    pub source_sample_rate: Option<f64>,
}

impl SampleEvent {
    pub fn effective_playback_rate(&self, engine_sample_rate: f64) -> f64 {
        let rate = clamp_playback_rate(self.playback_rate.unwrap_or(1.0));
        match self.source_sample_rate {
            Some(sr) if sr > 0.0 => rate * (sr / engine_sample_rate),
            _ => rate,
        }
    }

    /// Scales by playback rate unless looping, in which case the event
    /// reports its untransformed length so the sequencer treats it as a
    /// stable-duration block (§4.3).
    pub fn effective_length(&self, engine_sample_rate: f64) -> i64 {
        if self.loop_config.is_some() {
            self.base.event_length
        } else {
            let rate = self.effective_playback_rate(engine_sample_rate);
            ((self.base.event_length as f64) / rate).round() as i64
        }
    }

    fn window(&self, buffer: &AudioBuffer) -> (i64, i64) {
        match self.range {
            Some(r) if r.end > r.start => (r.start, r.end),
            _ => (0, buffer.frame_count() as i64 - 1),
        }
    }

    /// Read a linearly-interpolated, possibly loop-crossfaded sample at
    /// fractional source position `pos`, within `(window_start, window_end)`.
    fn read_channel(
        &self,
        buffer: &AudioBuffer,
        channel: usize,
        pos: f64,
        window: (i64, i64),
        sample_rate: f64,
    ) -> Sample {
        let (w_start, w_end) = window;
        let span = (w_end - w_start + 1).max(1);

        let resolve = |p: f64| -> Sample {
            let wrapped = w_start as f64 + (p - w_start as f64).rem_euclid(span as f64);
            let idx0 = wrapped.floor() as i64;
            let idx1 = idx0 + 1;
            let frac = wrapped - idx0 as f64;
            let idx1 = if idx1 > w_end { w_start } else { idx1 };
            let s0 = sample_at(buffer, channel, idx0);
            let s1 = sample_at(buffer, channel, idx1);
            s0 + (s1 - s0) * frac as Sample
        };

        match self.loop_config {
            None => resolve(pos),
            Some(cfg) => {
                let xfade = cfg.crossfade_frames(sample_rate).max(0);
                let loop_len = (cfg.loop_end_offset - cfg.loop_start_offset + 1).max(1);
                let rel = (pos - w_start as f64).rem_euclid(loop_len as f64);
                let abs_pos = w_start as f64 + rel;

                if xfade == 0 {
                    resolve(abs_pos)
                } else {
                    let dist_to_end = cfg.loop_end_offset as f64 - abs_pos;
                    if dist_to_end < xfade as f64 {
                        let k = xfade as f64 - dist_to_end;
                        let fade_out = (dist_to_end / xfade as f64).clamp(0.0, 1.0);
                        let fade_in = 1.0 - fade_out;
                        let tail = resolve(abs_pos) * fade_out as Sample;
                        let head = resolve(cfg.loop_start_offset as f64 + k) * fade_in as Sample;
                        tail + head
                    } else {
                        resolve(abs_pos)
                    }
                }
            }
        }
    }
}

fn sample_at(buffer: &AudioBuffer, channel: usize, index: i64) -> Sample {
    if index < 0 || index as usize >= buffer.frame_count() {
        return 0.0;
    }
    let c = if buffer.channel_count() > channel { channel } else { 0 };
    buffer.channel(c)[index as usize]
}

#[derive(Debug, Clone)]
pub struct SynthEvent {
    pub base: EventBase,
    pub frequency: f64,
    pub oscillator_count: usize,
    pub envelope: EnvelopeState,
    release_tail_frames: i64,
}

impl SynthEvent {
    pub fn new(base: EventBase, frequency: f64, oscillator_count: usize) -> Self {
        Self {
            base,
            frequency,
            envelope: EnvelopeState::new(oscillator_count),
            oscillator_count,
            release_tail_frames: 0,
        }
    }

    pub fn begin_release(&mut self, at_offset: i64, tail_frames: i64) {
        self.envelope.begin_release(at_offset);
        self.release_tail_frames = tail_frames;
    }

    /// `event_end` extended by the release tail once release has begun.
    pub fn event_end(&self) -> i64 {
        let base_end = self.base.event_start + self.base.event_length - 1;
        if self.envelope.releasing {
            base_end + self.release_tail_frames
        } else {
            base_end
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheableEvent {
    pub inner: Box<Event>,
    pub cache_start_offset: i64,
}

#[derive(Debug, Clone)]
pub enum Event {
    Base(BaseEvent),
    Sample(SampleEvent),
    Synth(SynthEvent),
    Cacheable(CacheableEvent),
}

/// Context a mix pass needs beyond the event's own state: the sample
/// registry for sample events, the owning instrument's synthesizer for
/// synth events, and the loop geometry described in §4.3.
#[derive(Clone, Copy)]
pub struct MixContext<'a> {
    pub engine_sample_rate: f64,
    pub channel_local_range: Option<(i64, i64)>,
    pub samples: &'a SampleRegistry,
    pub synthesizer: Option<&'a dyn Synthesizer>,
}

impl Event {
    pub fn base(&self) -> &EventBase {
        match self {
            Event::Base(e) => &e.base,
            Event::Sample(e) => &e.base,
            Event::Synth(e) => &e.base,
            Event::Cacheable(e) => e.inner.base(),
        }
    }

    pub fn base_mut(&mut self) -> &mut EventBase {
        match self {
            Event::Base(e) => &mut e.base,
            Event::Sample(e) => &mut e.base,
            Event::Synth(e) => &mut e.base,
            Event::Cacheable(e) => e.inner.base_mut(),
        }
    }

    pub fn event_start(&self) -> i64 {
        self.base().event_start
    }

    pub fn event_length(&self, engine_sample_rate: f64) -> i64 {
        match self {
            Event::Base(e) => e.base.event_length,
            Event::Sample(e) => e.effective_length(engine_sample_rate),
            Event::Synth(e) => e.base.event_length,
            Event::Cacheable(e) => e.inner.event_length(engine_sample_rate),
        }
    }

    pub fn event_end(&self, engine_sample_rate: f64) -> i64 {
        match self {
            Event::Base(e) => e.base.event_start + e.base.event_length - 1,
            Event::Sample(e) => e.base.event_start + e.effective_length(engine_sample_rate) - 1,
            Event::Synth(e) => e.event_end(),
            Event::Cacheable(e) => e.inner.event_end(engine_sample_rate),
        }
    }

    pub fn is_cacheable(&self) -> bool {
        matches!(self, Event::Cacheable(_))
    }

    pub fn is_locked(&self) -> bool {
        self.base().locked
    }

    pub fn is_deletable(&self) -> bool {
        self.base().deletable
    }

    pub fn is_sequenced(&self) -> bool {
        self.base().sequenced
    }

    pub fn instrument_id(&self) -> InstrumentId {
        self.base().instrument_id
    }

    /// Resolve `frame` through the wrap/local-range rules shared by every
    /// variant (§4.3 mix contract).
    fn absolute_frame(
        i: usize,
        playhead_frame: i64,
        loop_min: i64,
        loop_max: i64,
        loop_is_wrapping: bool,
        loop_wrap_offset: i64,
        use_channel_local_range: bool,
        channel_local_range: Option<(i64, i64)>,
    ) -> i64 {
        let i = i as i64;
        let frame = if loop_is_wrapping && i >= loop_wrap_offset {
            loop_min + (i - loop_wrap_offset)
        } else {
            playhead_frame + i
        };

        if use_channel_local_range && frame > loop_max {
            if let Some((local_min, local_max)) = channel_local_range {
                let span = (local_max - local_min + 1).max(1);
                return local_min + (frame - local_min).rem_euclid(span);
            }
        }
        frame
    }

    /// Mix this event's contribution into `out` for the current callback
    /// window (§4.3). Skips silently if locked or disabled.
    pub fn mix(
        &mut self,
        out: &mut AudioBuffer,
        playhead_frame: i64,
        loop_min: i64,
        loop_max: i64,
        loop_is_wrapping: bool,
        loop_wrap_offset: i64,
        use_channel_local_range: bool,
        ctx: &MixContext,
    ) {
        if self.is_locked() || !self.base().enabled || self.is_deletable() {
            return;
        }

        let event_start = self.event_start();
        let event_end = self.event_end(ctx.engine_sample_rate);
        let volume = self.base().volume_log();
        let frames = out.frame_count();
        let channels = out.channel_count();

        match self {
            Event::Base(e) => {
                for i in 0..frames {
                    let frame = Self::absolute_frame(
                        i,
                        playhead_frame,
                        loop_min,
                        loop_max,
                        loop_is_wrapping,
                        loop_wrap_offset,
                        use_channel_local_range,
                        ctx.channel_local_range,
                    );
                    if frame < event_start || frame > event_end {
                        continue;
                    }
                    let rel = (frame - event_start) as usize;
                    for c in 0..channels {
                        let src = sample_at(&e.buffer, c, rel as i64);
                        out.channel_mut(c)[i] += src * volume;
                    }
                }
            }
            Event::Sample(e) => {
                let Some(registered) = ctx.samples.get(e.sample_id) else {
                    return; // missing sample -> silence, §7
                };
                let rate = e.effective_playback_rate(ctx.engine_sample_rate);
                let window = e.window(&registered.buffer);

                for i in 0..frames {
                    let frame = Self::absolute_frame(
                        i,
                        playhead_frame,
                        loop_min,
                        loop_max,
                        loop_is_wrapping,
                        loop_wrap_offset,
                        use_channel_local_range,
                        ctx.channel_local_range,
                    );
                    if frame < event_start || frame > event_end {
                        continue;
                    }
                    let rel = (frame - event_start) as f64;
                    let pos = window.0 as f64 + rel * rate;
                    for c in 0..channels {
                        let src = e.read_channel(&registered.buffer, c, pos, window, ctx.engine_sample_rate);
                        out.channel_mut(c)[i] += src * volume;
                    }
                }
            }
            Event::Synth(e) => {
                let Some(synth) = ctx.synthesizer else { return };
                let mut scratch = vec![0.0 as Sample; frames];
                synth.render(e.frequency, &mut e.envelope, &mut scratch);

                for i in 0..frames {
                    let frame = Self::absolute_frame(
                        i,
                        playhead_frame,
                        loop_min,
                        loop_max,
                        loop_is_wrapping,
                        loop_wrap_offset,
                        use_channel_local_range,
                        ctx.channel_local_range,
                    );
                    if frame < event_start || frame > event_end {
                        continue;
                    }
                    for c in 0..channels {
                        out.channel_mut(c)[i] += scratch[i] * volume;
                    }
                }
            }
            Event::Cacheable(e) => {
                e.inner.mix(
                    out,
                    playhead_frame,
                    loop_min,
                    loop_max,
                    loop_is_wrapping,
                    loop_wrap_offset,
                    use_channel_local_range,
                    ctx,
                );
            }
        }
    }
}
