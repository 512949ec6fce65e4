//! Event collection for the render window (§4.6).
//!
//! Mirrors the source's measure-bucket walk: only the one or two measures
//! overlapping the current window are inspected (N is much smaller than
//! samples_per_bar), duplicates across overlapping buckets are filtered, and
//! deletable events are left in place for `Instrument::purge_deletable` to
//! remove once every instrument has been collected for this callback.

use ae_event::InstrumentReader;

/// Per-instrument collection result for one render callback: the distinct
/// sequenced-event indices eligible this window, ready to hand to
/// `AudioChannel::render` alongside the instrument's live-event list.
#[derive(Debug, Default, Clone)]
pub struct Collection {
    pub sequenced_indices: Vec<usize>,
}

/// Given the current window's start and the loop range, derive whether the
/// window wraps and, if so, the in-window offset at which the wrap begins
/// (§4.6 "Loop wrap"). `loop_wrap_offset = (max_buffer_position - playhead) + 1`.
pub fn wrap_params(playhead_frame: i64, frame_count: usize, loop_max: i64) -> (bool, i64) {
    let window_end = playhead_frame + frame_count as i64 - 1;
    if window_end > loop_max {
        (true, (loop_max - playhead_frame) + 1)
    } else {
        (false, 0)
    }
}

/// Collect the sequenced events overlapping `[playhead, playhead + N - 1]`,
/// and, if the window wraps past `loop_max`, also the events overlapping the
/// wrapped region `[loop_min, loop_min + (N - loop_wrap_offset) - 1]`.
pub fn collect_sequenced(
    reader: &InstrumentReader,
    playhead_frame: i64,
    frame_count: usize,
    engine_sample_rate: f64,
    loop_min: i64,
    loop_max: i64,
) -> Collection {
    let window_end = playhead_frame + frame_count as i64 - 1;
    let mut indices = Vec::new();

    collect_window(reader, playhead_frame, window_end, engine_sample_rate, &mut indices);

    let (is_wrapping, loop_wrap_offset) = wrap_params(playhead_frame, frame_count, loop_max);
    if is_wrapping {
        let wrap_len = frame_count as i64 - loop_wrap_offset;
        if wrap_len > 0 {
            let wrap_start = loop_min;
            let wrap_end = loop_min + wrap_len - 1;
            collect_window(reader, wrap_start, wrap_end, engine_sample_rate, &mut indices);
        }
    }

    Collection { sequenced_indices: indices }
}

fn collect_window(
    reader: &InstrumentReader,
    window_start: i64,
    window_end: i64,
    engine_sample_rate: f64,
    out: &mut Vec<usize>,
) {
    let samples_per_bar = reader.samples_per_bar().max(1);
    let start_measure = (window_start / samples_per_bar).max(0) as usize;
    let end_measure = (window_end / samples_per_bar).max(0) as usize;

    for measure in start_measure..=end_measure {
        for &index in reader.events_for_measure(measure) {
            if out.contains(&index) {
                continue;
            }

            let event = &reader.sequenced()[index];
            if !event.base().enabled || event.is_deletable() {
                continue;
            }

            let event_start = event.event_start();
            let event_end = event.event_end(engine_sample_rate);
            let eligible = (event_start >= window_start && event_start <= window_end)
                || (event_start < window_start && event_end >= window_start);

            if eligible {
                out.push(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_audio::AudioBuffer;
    use ae_event::{BaseEvent, Event, EventBase, Instrument, InstrumentId};

    fn event_at(start: i64, length: i64) -> Event {
        Event::Base(BaseEvent {
            base: EventBase::new(InstrumentId(0), start, length, 1.0, true),
            buffer: AudioBuffer::new(1, length as usize),
        })
    }

    #[test]
    fn collects_events_overlapping_the_window_without_duplicates() {
        let instrument = Instrument::new(InstrumentId(0), 1_000, 48_000.0);
        instrument.add_sequenced(event_at(0, 2_000)); // spans measures 0 and 1
        instrument.add_sequenced(event_at(1_500, 10));

        let reader = instrument.try_read().unwrap();
        let collection = collect_sequenced(&reader, 900, 200, 48_000.0, 0, 10_000);
        assert_eq!(collection.sequenced_indices.len(), 1); // only the first event overlaps [900,1099]
    }

    #[test]
    fn wrap_params_reports_the_wrap_offset() {
        let (wrapping, offset) = wrap_params(9_990, 20, 9_999);
        assert!(wrapping);
        assert_eq!(offset, 10);
    }

    #[test]
    fn no_wrap_when_window_fits_inside_loop_range() {
        let (wrapping, offset) = wrap_params(0, 20, 9_999);
        assert!(!wrapping);
        assert_eq!(offset, 0);
    }

    #[test]
    fn wrap_region_events_are_collected_too() {
        let instrument = Instrument::new(InstrumentId(0), 1_000, 48_000.0);
        instrument.add_sequenced(event_at(5, 10)); // sits right at the start of the loop range

        let reader = instrument.try_read().unwrap();
        // window [9_990, 10_009] wraps at loop_max=9_999 back to loop_min=0
        let collection = collect_sequenced(&reader, 9_990, 20, 48_000.0, 0, 9_999);
        assert_eq!(collection.sequenced_indices, vec![0]);
    }

    #[test]
    fn deletable_events_are_excluded_from_collection() {
        let instrument = Instrument::new(InstrumentId(0), 1_000, 48_000.0);
        let idx = instrument.add_sequenced(event_at(0, 100));
        {
            let mut writer = instrument.write();
            writer.sequenced_mut()[idx].base_mut().deletable = true;
        }

        let reader = instrument.try_read().unwrap();
        let collection = collect_sequenced(&reader, 0, 100, 48_000.0, 0, 10_000);
        assert!(collection.sequenced_indices.is_empty());
    }
}
