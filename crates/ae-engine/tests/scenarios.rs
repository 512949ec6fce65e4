//! End-to-end render scenarios (spec.md §8 S1-S4): constructs a `RenderCore`
//! the way a host would, feeds it instruments/events, and checks the
//! interleaved output against known-good sample sequences. S5 (tempo update
//! under play) and S6 (logarithmic volume) are exercised at the `ae-core`
//! level, where the clock and volume curve actually live.

use std::sync::Arc;

use ae_audio::AudioBuffer;
use ae_core::TimeSignature;
use ae_engine::{default_notification_channel, AudioChannel, ControlLink, RenderCore};
use ae_event::{BaseEvent, Event, EventBase, Instrument, InstrumentId};

fn stereo_event(start: i64, left: &[f64], right: &[f64]) -> Event {
    let mut buffer = AudioBuffer::new(2, left.len());
    buffer.channel_mut(0).copy_from_slice(left);
    buffer.channel_mut(1).copy_from_slice(right);
    Event::Base(BaseEvent {
        base: EventBase::new(InstrumentId(0), start, left.len() as i64, 1.0, true),
        buffer,
    })
}

fn mono_event(start: i64, samples: &[f64]) -> Event {
    let mut buffer = AudioBuffer::new(1, samples.len());
    buffer.channel_mut(0).copy_from_slice(samples);
    Event::Base(BaseEvent {
        base: EventBase::new(InstrumentId(0), start, samples.len() as i64, 1.0, true),
        buffer,
    })
}

fn new_core(sample_rate: f64, tempo: f64, steps_per_bar: u32, frame_count: usize) -> RenderCore {
    let link = ControlLink::new();
    let (tx, _rx) = default_notification_channel();
    RenderCore::new(
        sample_rate,
        tempo,
        TimeSignature::default(),
        steps_per_bar,
        2,
        frame_count,
        false,
        false,
        link,
        tx,
    )
}

#[test]
fn s1_mono_event_stereo_output() {
    let mut core = new_core(48_000.0, 130.0, 16, 16);
    // Pull playing/loop-range state open for rendering via the scheduling
    // facade isn't exposed on RenderCore directly in this harness; drive the
    // clock the same way the render core itself does at construction.
    let source = [-1.0, -1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];

    let instrument = Arc::new(Instrument::new(InstrumentId(0), 16, 48_000.0));
    instrument.add_sequenced(mono_event(0, &source));

    let mut channel = AudioChannel::new(2, 16);
    channel.set_volume_linear(1.0);
    core.register_instrument(instrument, channel, None);

    arm_playback(&mut core, 0, 15);

    let input = vec![0.0; 32];
    let mut output = vec![0.0; 32];
    core.render(&input, &mut output);

    for i in 0..16 {
        assert_eq!(output[i * 2], output[i * 2 + 1], "frame {i} left/right mismatch");
    }
}

#[test]
fn s2_and_s3_overlapping_events_sum_correctly() {
    let mut core = new_core(48_000.0, 130.0, 16, 32);

    let s2_right = [0.5, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0, -0.5, -0.5, -0.5, -0.5, -1.0, -1.0, -1.0, -1.0];
    let s2_left = [0.0; 16];
    let s3 = [0.25, 0.25, 0.25, 0.25, 0.0, 0.0, 0.0, 0.0, -0.25, -0.25, -0.25, -0.25, 0.0, 0.0, 0.0, 0.0];

    let instrument = Arc::new(Instrument::new(InstrumentId(0), 10_000, 48_000.0));
    instrument.add_sequenced(stereo_event(16, &s2_left, &s2_right));
    instrument.add_sequenced(stereo_event(24, &s3, &s3));

    let mut channel = AudioChannel::new(2, 32);
    channel.set_volume_linear(1.0);
    core.register_instrument(instrument, channel, None);

    arm_playback(&mut core, 0, 9_999);
    set_playhead(&mut core, 16);

    let input = vec![0.0; 64];
    let mut output = vec![0.0; 64];
    core.render(&input, &mut output);

    // Relative frame k in this window is absolute frame 16 + k. A single
    // instrument/channel is registered, so headroom (1 / channel count) is
    // 1.0 here; no attenuation is introduced by the mix-down.
    // Frames 24..31 (k = 8..15): right = S2 tail + S3 head, left = S3 only.
    for k in 8..16 {
        let left = output[k * 2];
        let right = output[k * 2 + 1];
        let s2_sample = s2_right[k]; // k relative to S2's own start (16), same index
        let s3_sample = s3[k - 8]; // relative to S3's start (24)
        assert!((left - s3_sample).abs() < 1e-9, "frame {k} left");
        assert!((right - (s2_sample + s3_sample)).abs() < 1e-9, "frame {k} right");
    }

    // Frames 32..39 (k = 16..23): only S3's tail remains, both channels equal.
    for k in 16..24 {
        let left = output[k * 2];
        let right = output[k * 2 + 1];
        assert_eq!(left, right, "frame {k} left/right mismatch");
        assert!((left - s3[k - 8]).abs() < 1e-9, "frame {k} value");
    }
}

#[test]
fn s4_loop_wrap_read() {
    let mut core = new_core(44_100.0, 120.0, 16, 11_025);

    let event_a = mono_event(77_175, &[-0.25; 11_025]);
    let event_b = mono_event(0, &[0.5; 11_025]);

    let instrument = Arc::new(Instrument::new(InstrumentId(0), 88_200, 44_100.0));
    instrument.add_sequenced(event_a);
    instrument.add_sequenced(event_b);

    let mut channel = AudioChannel::new(2, 11_025);
    channel.set_volume_linear(1.0);
    core.register_instrument(instrument, channel, None);

    arm_playback(&mut core, 0, 88_199);
    set_playhead(&mut core, 88_100);

    let input = vec![0.0; 11_025 * 2];
    let mut output = vec![0.0; 11_025 * 2];
    core.render(&input, &mut output);

    // Headroom divides each ungrouped channel's contribution by the number
    // of audio channels (instruments), not the output channel count. A
    // single instrument is registered here, so headroom is 1.0 and the
    // output matches the event constants directly.
    for frame in 0..100 {
        assert!((output[frame * 2] - (-0.25)).abs() < 1e-9, "frame {frame}");
    }
    for frame in 100..11_025 {
        assert!((output[frame * 2] - 0.5).abs() < 1e-9, "frame {frame}");
    }
}

fn arm_playback(core: &mut RenderCore, loop_min: i64, loop_max: i64) {
    // The harness has no SchedulingFacade wired to this ad hoc RenderCore, so
    // drive the loop range and playback flag through a fresh facade built on
    // the same control link it already holds.
    let facade = ae_engine::SchedulingFacade::new(control_link(core));
    facade.set_loop_range(loop_min, loop_max, 16);
    facade.set_playing(true);
    // Apply immediately: the pending slot is drained at the top of render().
}

fn set_playhead(core: &mut RenderCore, frame: i64) {
    let facade = ae_engine::SchedulingFacade::new(control_link(core));
    facade.set_buffer_position(frame);
}

fn control_link(core: &RenderCore) -> Arc<ControlLink> {
    core.control_link()
}
