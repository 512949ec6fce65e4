//! The render core (§4.7): the hot callback, invoked once per hardware
//! burst under either driver shape (§4.8). Owns everything the render
//! thread touches; every other thread reaches it only through
//! `ControlLink`/`SchedulingFacade` and `NotificationReceiver`.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ae_audio::{AudioBuffer, DiskWriter};
use ae_core::{Clock, Sample, TimeSignature};
use ae_event::{Instrument, MixContext, SampleRegistry, Synthesizer};

use crate::channel::AudioChannel;
use crate::control::ControlLink;
use crate::group::ChannelGroup;
use crate::notification::{Notification, NotificationSender};
use crate::processor::ProcessorChain;
use crate::sequencer;

/// Hard symmetric output ceiling (§4.7 step 9, §7 "clipping").
pub const MAX_OUTPUT: Sample = 1.0;

/// A control-thread request to start/stop recording or bouncing (§6).
#[derive(Debug, Clone)]
pub enum CaptureRequest {
    StartRecording { max_buffers: usize, output_path: PathBuf },
    StartBounce { max_buffers: usize, output_path: PathBuf, range_start: i64, range_end: i64 },
    Stop,
}

enum CaptureKind {
    Recording,
    Bounce { range_start: i64, range_end: i64 },
}

struct Capture {
    kind: CaptureKind,
    writer: DiskWriter,
}

/// Binds an instrument to its channel (by index into `RenderCore::channels`)
/// and, if it plays synth events, the synthesizer that renders them.
pub struct InstrumentBinding {
    pub instrument: Arc<Instrument>,
    pub channel_index: usize,
    pub synthesizer: Option<Box<dyn Synthesizer>>,
}

pub struct RenderCore {
    sample_rate: f64,
    output_channels: usize,
    channel_caching: bool,
    cpu_scaling_mitigation: bool,

    clock: Clock,
    samples: SampleRegistry,
    bindings: Vec<InstrumentBinding>,
    channels: Vec<AudioChannel>,
    groups: Vec<ChannelGroup>,

    master_chain: ProcessorChain,
    pub master_volume: Sample,
    master_buffer: AudioBuffer,

    input_channel: Option<AudioChannel>,

    link: Arc<ControlLink>,
    notifications: NotificationSender,
    capture: Option<Capture>,
}

impl RenderCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sample_rate: f64,
        tempo: f64,
        time_signature: TimeSignature,
        steps_per_bar: u32,
        output_channels: usize,
        frame_count: usize,
        channel_caching: bool,
        cpu_scaling_mitigation: bool,
        link: Arc<ControlLink>,
        notifications: NotificationSender,
    ) -> Self {
        Self {
            sample_rate,
            output_channels,
            channel_caching,
            cpu_scaling_mitigation,
            clock: Clock::new(sample_rate, tempo, time_signature, steps_per_bar),
            samples: SampleRegistry::new(),
            bindings: Vec::new(),
            channels: Vec::new(),
            groups: Vec::new(),
            master_chain: ProcessorChain::new(),
            master_volume: 1.0,
            master_buffer: AudioBuffer::new(output_channels, frame_count),
            input_channel: None,
            link,
            notifications,
            capture: None,
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The shared control link backing this core's render thread side, for
    /// constructing the `SchedulingFacade` the control thread drives it with.
    pub fn control_link(&self) -> Arc<ControlLink> {
        self.link.clone()
    }

    pub fn samples_mut(&mut self) -> &mut SampleRegistry {
        &mut self.samples
    }

    pub fn master_chain_mut(&mut self) -> &mut ProcessorChain {
        &mut self.master_chain
    }

    pub fn enable_input_capture(&mut self, channel_count: usize, frame_count: usize) {
        self.input_channel = Some(AudioChannel::new(channel_count, frame_count));
    }

    pub fn input_channel_mut(&mut self) -> Option<&mut AudioChannel> {
        self.input_channel.as_mut()
    }

    /// Register an instrument and the channel it renders into, returning the
    /// channel's index (usable with `ChannelGroup::add_member`). Registering
    /// the same instrument twice is a no-op that returns the existing
    /// channel index, mirroring the source sequencer's
    /// register/unregisterInstrument dedup behavior.
    pub fn register_instrument(
        &mut self,
        instrument: Arc<Instrument>,
        channel: AudioChannel,
        synthesizer: Option<Box<dyn Synthesizer>>,
    ) -> usize {
        if let Some(existing) = self.bindings.iter().find(|b| b.instrument.id == instrument.id) {
            return existing.channel_index;
        }
        let channel_index = self.channels.len();
        self.channels.push(channel);
        self.bindings.push(InstrumentBinding { instrument, channel_index, synthesizer });
        channel_index
    }

    pub fn unregister_instrument(&mut self, instrument_id: ae_event::InstrumentId) {
        self.bindings.retain(|b| b.instrument.id != instrument_id);
    }

    /// Walk the whole loop range once, forcing every cacheable channel to
    /// populate its cache before playback starts, instead of relying solely
    /// on opportunistic per-callback population (§3 supplement, grounded on
    /// the source's `BulkCacher`). Control-thread-only: never call this from
    /// inside `render()`.
    pub fn prime_cache(&mut self, sweep_frame_count: usize) {
        if sweep_frame_count == 0 {
            return;
        }
        let (loop_min, loop_max) = self.clock.loop_range();
        let mut playhead = loop_min;
        while playhead <= loop_max {
            let window = sweep_frame_count.min((loop_max - playhead + 1) as usize);
            let (loop_is_wrapping, loop_wrap_offset) = sequencer::wrap_params(playhead, window, loop_max);
            for binding in &mut self.bindings {
                let Some(mut reader) = binding.instrument.try_read() else { continue };
                let collection = sequencer::collect_sequenced(
                    &reader,
                    playhead,
                    window,
                    self.sample_rate,
                    loop_min,
                    loop_max,
                );
                let ctx = MixContext {
                    engine_sample_rate: self.sample_rate,
                    channel_local_range: None,
                    samples: &self.samples,
                    synthesizer: binding.synthesizer.as_deref(),
                };
                if let Some(channel) = self.channels.get_mut(binding.channel_index) {
                    channel.render(
                        reader.sequenced_mut(),
                        &collection.sequenced_indices,
                        reader.live_mut(),
                        playhead,
                        loop_min,
                        loop_max,
                        loop_is_wrapping,
                        loop_wrap_offset,
                        true,
                        &ctx,
                    );
                }
            }
            playhead += window as i64;
        }
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut AudioChannel> {
        self.channels.get_mut(index)
    }

    pub fn add_group(&mut self, group: ChannelGroup) -> usize {
        self.groups.push(group);
        self.groups.len() - 1
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut ChannelGroup> {
        self.groups.get_mut(index)
    }

    /// The single entry point valid under both driver shapes (§4.8):
    /// `input`/`output` are interleaved across `output_channels`. Returns
    /// `false` when the engine has been stopped and the caller (the
    /// driver's loop, or the push driver itself) should not call again.
    pub fn render(&mut self, input: &[Sample], output: &mut [Sample]) -> bool {
        let callback_started = Instant::now();

        if !self.link.thread_active.load(Ordering::Acquire) {
            output.fill(0.0);
            return false;
        }

        self.drain_control_link();

        let frame_count = if self.output_channels == 0 {
            0
        } else {
            output.len() / self.output_channels
        };
        if frame_count == 0 {
            return true;
        }

        // Step 2: silence the shared mix buffer.
        self.master_buffer.silence_all();

        let playing = self.link.playing.load(Ordering::Acquire);
        let (loop_min, loop_max) = self.clock.loop_range();
        let playhead = self.clock.buffer_position();
        let (loop_is_wrapping, loop_wrap_offset) = sequencer::wrap_params(playhead, frame_count, loop_max);

        // Step 4: input capture, mixed straight into the master buffer.
        if let Some(input_channel) = &mut self.input_channel {
            let channel_count = input_channel.buffer().channel_count();
            input_channel.buffer_mut().silence_all();
            let available_frames = if self.output_channels > 0 { input.len() / self.output_channels } else { 0 };
            for frame in 0..frame_count.min(available_frames) {
                for c in 0..channel_count {
                    let src_channel = c.min(self.output_channels.saturating_sub(1));
                    input_channel.buffer_mut().channel_mut(c)[frame] = input[frame * self.output_channels + src_channel];
                }
            }
            let is_mono = channel_count < 2;
            input_channel.chain.apply_all(input_channel.buffer_mut(), is_mono);
            let volume = input_channel.volume_linear();
            self.master_buffer.merge(input_channel.buffer(), 0, 0, volume, false);
        }

        // Steps 3, 5: per-instrument collection and per-channel render.
        if playing {
            for binding in &mut self.bindings {
                let Some(mut reader) = binding.instrument.try_read() else {
                    log::warn!("instrument {:?} busy, skipping this callback", binding.instrument.id);
                    continue;
                };

                let collection = sequencer::collect_sequenced(
                    &reader,
                    playhead,
                    frame_count,
                    self.sample_rate,
                    loop_min,
                    loop_max,
                );

                let ctx = MixContext {
                    engine_sample_rate: self.sample_rate,
                    channel_local_range: None,
                    samples: &self.samples,
                    synthesizer: binding.synthesizer.as_deref(),
                };

                if let Some(channel) = self.channels.get_mut(binding.channel_index) {
                    channel.render(
                        reader.sequenced_mut(),
                        &collection.sequenced_indices,
                        reader.live_mut(),
                        playhead,
                        loop_min,
                        loop_max,
                        loop_is_wrapping,
                        loop_wrap_offset,
                        self.channel_caching,
                        &ctx,
                    );
                }

                drop(reader);
                binding.instrument.purge_deletable();
            }
        }

        // Steps 6, 7: ungrouped channels go straight to master with headroom
        // division; grouped channels are summed and processed per group.
        // Headroom divides by the number of audio channels (instruments),
        // not the output channel count — mirrors the source's
        // `channelVolume / channels->size()` (§4.7 step 6).
        let headroom = if self.channels.is_empty() { 1.0 } else { 1.0 / self.channels.len() as Sample };
        let mut in_group = vec![false; self.channels.len()];
        for group in &self.groups {
            for &member in &group.members {
                if member < in_group.len() {
                    in_group[member] = true;
                }
            }
        }
        for (index, channel) in self.channels.iter().enumerate() {
            if !in_group[index] {
                self.master_buffer.merge(channel.buffer(), 0, 0, headroom, false);
            }
        }
        let solo_active = self.groups.iter().any(|g| g.solo);
        for group in &mut self.groups {
            group.apply_effects_to_channels(&self.channels, &mut self.master_buffer, solo_active);
        }

        // Step 8: master processor chain.
        let master_is_mono = self.master_buffer.channel_count() < 2;
        self.master_chain.apply_all(&mut self.master_buffer, master_is_mono);

        // Step 9: gain, clip, interleave; advance the clock and translate
        // its crossing events into notifications.
        for frame in 0..frame_count {
            for c in 0..self.output_channels {
                let src_channel = c.min(self.master_buffer.channel_count().saturating_sub(1));
                let raw = self.master_buffer.channel(src_channel)[frame];
                let scaled = (raw * self.master_volume).clamp(-MAX_OUTPUT, MAX_OUTPUT);
                output[frame * self.output_channels + c] = scaled;
            }
        }

        let clock_events = if playing { self.clock.advance(frame_count) } else { Default::default() };
        if let Some(offset) = clock_events.step_changed_at {
            self.notifications.send(Notification::SequencerPositionUpdated { buffer_offset: offset });
        }
        if clock_events.marker_reached_at.is_some() {
            self.notifications.send(Notification::MarkerPositionReached);
        }

        // Step 11: capture accumulation (recording and offline bounce).
        self.advance_capture(clock_events.looped);

        // Step 12: apply a queued tempo change at this callback boundary.
        if let Some(ratio) = self.clock.apply_queued_tempo() {
            self.rescale_events(ratio);
            self.notifications.send(Notification::SequencerTempoUpdated);
        }

        // Step 13: CPU-scaling mitigation — hold the core busy until the
        // expected deadline so the governor doesn't downclock between bursts.
        if self.cpu_scaling_mitigation {
            let deadline = Duration::from_secs_f64(frame_count as f64 / self.sample_rate);
            while callback_started.elapsed() < deadline {
                std::hint::spin_loop();
            }
        }

        true
    }

    fn drain_control_link(&mut self) {
        if let Some(pending) = self.link.take_pending_tempo() {
            self.clock.queue_tempo_change(pending.tempo, pending.time_signature);
        }
        if let Some(range) = self.link.take_pending_loop_range() {
            self.clock.set_loop_range(range.min, range.max, range.steps_per_bar);
        }
        if let Some(frame) = self.link.take_pending_buffer_position() {
            self.clock.set_buffer_position(frame);
        }
        if self.link.take_rewind_requested() {
            self.clock.rewind();
        }
        if let Some(marker) = self.link.take_pending_marker() {
            self.clock.set_notification_marker(marker);
        }
        if let Some((count, steps_per_bar)) = self.link.take_pending_measures() {
            let samples_per_bar = self.clock.samples_per_bar().round() as i64;
            self.clock.set_loop_range(0, samples_per_bar * count as i64 - 1, steps_per_bar);
            for binding in &self.bindings {
                binding.instrument.set_samples_per_bar(samples_per_bar);
            }
        }
        if let Some(request) = self.link.take_pending_capture() {
            self.apply_capture_request(request);
        }
        if let Some(index) = self.link.take_pending_save_snippet() {
            self.save_recorded_snippet(index);
        }
    }

    fn apply_capture_request(&mut self, request: CaptureRequest) {
        match request {
            CaptureRequest::StartRecording { max_buffers, output_path } => {
                self.capture = Some(Capture {
                    kind: CaptureKind::Recording,
                    writer: DiskWriter::new(output_path, self.output_channels, max_buffers),
                });
            }
            CaptureRequest::StartBounce { max_buffers, output_path, range_start, range_end } => {
                self.capture = Some(Capture {
                    kind: CaptureKind::Bounce { range_start, range_end },
                    writer: DiskWriter::new(output_path, self.output_channels, max_buffers),
                });
            }
            CaptureRequest::Stop => {
                self.finalize_capture();
            }
        }
    }

    fn advance_capture(&mut self, looped: bool) {
        let Some(capture) = &mut self.capture else { return };
        capture.writer.append(&self.master_buffer);

        let range_ended = matches!(
            capture.kind,
            CaptureKind::Bounce { range_end, .. } if self.clock.buffer_position() >= range_end
        );

        if capture.writer.is_full() {
            match capture.kind {
                CaptureKind::Recording => {
                    let recording_id = capture.writer.next_recording_id();
                    if capture.writer.flush(self.sample_rate as u32).is_ok() {
                        self.notifications.send(Notification::RecordedSnippetReady { index: recording_id });
                    }
                }
                CaptureKind::Bounce { .. } => {
                    let _ = capture.writer.flush(self.sample_rate as u32);
                }
            }
        }

        if matches!(capture.kind, CaptureKind::Bounce { .. }) && (looped || range_ended) {
            self.finalize_capture();
        }
    }

    /// Force an early flush of an in-progress recording (§6
    /// `save_recorded_snippet(index)`), rather than waiting for its bounded
    /// buffer to fill. `requested_index` is the caller's own correlation
    /// tag and is echoed back verbatim on the resulting notification, since
    /// the host has no synchronous return path from the render thread.
    /// A no-op if no recording is currently active, or if the active
    /// capture is a bounce (bounces finalize on range end or loop, not on
    /// demand).
    fn save_recorded_snippet(&mut self, requested_index: u64) {
        let Some(capture) = &mut self.capture else { return };
        if !matches!(capture.kind, CaptureKind::Recording) {
            return;
        }
        if capture.writer.flush(self.sample_rate as u32).is_ok() {
            self.notifications.send(Notification::RecordedSnippetReady { index: requested_index });
        }
    }

    fn finalize_capture(&mut self) {
        let Some(mut capture) = self.capture.take() else { return };
        let _ = capture.writer.flush(self.sample_rate as u32);
        match capture.kind {
            CaptureKind::Recording => self.notifications.send(Notification::RecordingCompleted),
            CaptureKind::Bounce { .. } => self.notifications.send(Notification::BounceComplete),
        };
    }

    /// After a tempo change by ratio `r = old/new`, synth events' start and
    /// length scale by `r` (their frequency doesn't); sample events keep
    /// their length but rescale their start (§8 "Round-trip laws").
    fn rescale_events(&mut self, ratio: f64) {
        use ae_event::Event;

        for binding in &self.bindings {
            let mut writer = binding.instrument.write();
            let len = writer.sequenced_mut().len();
            for index in 0..len {
                {
                    let event = &mut writer.sequenced_mut()[index];
                    event.base_mut().event_start = (event.base().event_start as f64 * ratio).round() as i64;
                    if let Event::Synth(synth) = event {
                        synth.base.event_length = (synth.base.event_length as f64 * ratio).round() as i64;
                    }
                }
                writer.reindex(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::default_notification_channel;
    use ae_core::TimeSignature;
    use ae_event::{BaseEvent, Event, EventBase, InstrumentId};

    fn new_core(frame_count: usize) -> (RenderCore, Arc<ControlLink>) {
        let link = ControlLink::new();
        let (tx, _rx) = default_notification_channel();
        let core = RenderCore::new(
            48_000.0,
            120.0,
            TimeSignature::default(),
            16,
            2,
            frame_count,
            false,
            false,
            link.clone(),
            tx,
        );
        (core, link)
    }

    fn mono_event(start: i64, samples: &[Sample]) -> Event {
        Event::Base(BaseEvent {
            base: EventBase::new(InstrumentId(0), start, samples.len() as i64, 1.0, true),
            buffer: {
                let mut buf = AudioBuffer::new(1, samples.len());
                buf.channel_mut(0).copy_from_slice(samples);
                buf
            },
        })
    }

    #[test]
    fn s1_mono_event_is_duplicated_across_stereo_output() {
        let (mut core, link) = new_core(16);
        link.playing.store(true, Ordering::Release);
        core.clock = Clock::new(48_000.0, 130.0, TimeSignature::default(), 16);
        core.clock.set_loop_range(0, 15, 16);

        let instrument = Arc::new(Instrument::new(InstrumentId(0), 16, 48_000.0));
        let source = [-1.0, -1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        instrument.add_sequenced(mono_event(0, &source));

        let mut channel = AudioChannel::new(2, 16);
        channel.set_volume_linear(1.0);
        core.register_instrument(instrument, channel, None);

        let input = vec![0.0; 32];
        let mut output = vec![0.0; 32];
        core.render(&input, &mut output);

        for i in 0..16 {
            let left = output[i * 2];
            let right = output[i * 2 + 1];
            assert!((left - right).abs() < 1e-9);
        }
    }

    #[test]
    fn registering_the_same_instrument_twice_is_a_no_op() {
        let (mut core, _link) = new_core(4);
        let instrument = Arc::new(Instrument::new(InstrumentId(7), 100, 48_000.0));

        let first = core.register_instrument(instrument.clone(), AudioChannel::new(2, 4), None);
        let second = core.register_instrument(instrument, AudioChannel::new(2, 4), None);
        assert_eq!(first, second);
        assert_eq!(core.bindings.len(), 1);
    }

    #[test]
    fn stopped_engine_returns_false_and_silences_output() {
        let (mut core, link) = new_core(8);
        link.thread_active.store(false, Ordering::Release);
        let input = vec![0.0; 16];
        let mut output = vec![1.0; 16];
        let should_continue = core.render(&input, &mut output);
        assert!(!should_continue);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn headroom_divides_ungrouped_channel_contribution() {
        let (mut core, link) = new_core(4);
        link.playing.store(true, Ordering::Release);
        core.clock.set_loop_range(0, 999, 16);

        for id in 0..2 {
            let instrument = Arc::new(Instrument::new(InstrumentId(id), 1_000, 48_000.0));
            let source = [1.0, 1.0, 1.0, 1.0];
            instrument.add_sequenced(mono_event(0, &source));

            let mut channel = AudioChannel::new(2, 4);
            channel.set_volume_linear(1.0);
            core.register_instrument(instrument, channel, None);
        }

        let input = vec![0.0; 8];
        let mut output = vec![0.0; 8];
        core.render(&input, &mut output);

        // Two ungrouped channels, each contributing 1.0: headroom = 1/2.
        assert!((output[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn single_ungrouped_channel_gets_no_headroom_attenuation() {
        let (mut core, link) = new_core(4);
        link.playing.store(true, Ordering::Release);
        core.clock.set_loop_range(0, 999, 16);

        let instrument = Arc::new(Instrument::new(InstrumentId(0), 1_000, 48_000.0));
        let source = [1.0, 1.0, 1.0, 1.0];
        instrument.add_sequenced(mono_event(0, &source));

        let mut channel = AudioChannel::new(2, 4);
        channel.set_volume_linear(1.0);
        core.register_instrument(instrument, channel, None);

        let input = vec![0.0; 8];
        let mut output = vec![0.0; 8];
        core.render(&input, &mut output);

        assert!((output[0] - 1.0).abs() < 1e-6);
    }
}
