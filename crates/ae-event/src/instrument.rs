//! Per-instrument event storage (§3 "Instrument").
//!
//! Reads (sequencer collection on the render thread) and writes (adding,
//! removing, or re-timing an event from a control thread) are arbitrated by
//! a `parking_lot::RwLock`. The render side only ever `try_read`s: a failed
//! acquisition means this instrument is silently skipped for the callback,
//! per §5 "an event loss is preferable to a missed deadline."

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::event::Event;
use crate::ids::InstrumentId;

struct InstrumentData {
    /// Flat storage; indices into this vector are what the measure index
    /// and live list reference.
    sequenced: Vec<Event>,
    /// measure -> indices of `sequenced` events overlapping it. An event
    /// spanning measures M..N appears in every entry M..N (§3).
    measures: Vec<Vec<usize>>,
    live: Vec<Event>,
    samples_per_bar: i64,
    engine_sample_rate: f64,
}

impl InstrumentData {
    fn measure_of(&self, frame: i64) -> usize {
        if self.samples_per_bar <= 0 {
            return 0;
        }
        (frame / self.samples_per_bar).max(0) as usize
    }

    fn ensure_measure_capacity(&mut self, measure: usize) {
        if self.measures.len() <= measure {
            self.measures.resize_with(measure + 1, Vec::new);
        }
    }

    /// Recompute which measure buckets `index` belongs to and insert it.
    /// Called on add and on any start/length mutation (§3 invariant: "measure
    /// cache is kept consistent... on every start/length mutation").
    fn reindex(&mut self, index: usize) {
        let event = &self.sequenced[index];
        let start_measure = self.measure_of(event.event_start());
        let end_measure = self
            .measure_of(event.event_end(self.engine_sample_rate))
            .max(start_measure);
        self.ensure_measure_capacity(end_measure);
        for m in start_measure..=end_measure {
            if !self.measures[m].contains(&index) {
                self.measures[m].push(index);
            }
        }
    }

    fn rebuild_measure_index(&mut self) {
        for bucket in &mut self.measures {
            bucket.clear();
        }
        for i in 0..self.sequenced.len() {
            self.reindex(i);
        }
    }
}

pub struct Instrument {
    pub id: InstrumentId,
    data: RwLock<InstrumentData>,
}

impl Instrument {
    pub fn new(id: InstrumentId, samples_per_bar: i64, engine_sample_rate: f64) -> Self {
        Self {
            id,
            data: RwLock::new(InstrumentData {
                sequenced: Vec::new(),
                measures: Vec::new(),
                live: Vec::new(),
                samples_per_bar,
                engine_sample_rate,
            }),
        }
    }

    pub fn set_samples_per_bar(&self, samples_per_bar: i64) {
        let mut data = self.data.write();
        data.samples_per_bar = samples_per_bar;
        data.rebuild_measure_index();
    }

    /// Add a sequenced event, returning its index in the flat list.
    pub fn add_sequenced(&self, event: Event) -> usize {
        let mut data = self.data.write();
        let index = data.sequenced.len();
        data.sequenced.push(event);
        data.reindex(index);
        index
    }

    pub fn add_live(&self, event: Event) -> usize {
        let mut data = self.data.write();
        let index = data.live.len();
        data.live.push(event);
        index
    }

    /// Removes every sequenced/live event marked deletable and rebuilds the
    /// measure index, mirroring the source's deferred removal queue
    /// processed after the collection pass (§4.6).
    pub fn purge_deletable(&self) {
        let mut data = self.data.write();
        data.sequenced.retain(|e| !e.is_deletable());
        data.live.retain(|e| !e.is_deletable());
        data.rebuild_measure_index();
    }

    /// Non-blocking access for the render thread. `None` means: skip this
    /// instrument for this callback (§5 "an event loss is preferable to a
    /// missed deadline"). Backed by `try_write`, not `try_read`: the render
    /// core only inspects events here (never adds/removes one), but mixing
    /// advances per-event playback state (envelope levels, oscillator phase,
    /// cache write cursors), which needs `&mut Event`. The exclusivity this
    /// guard provides is against a concurrent control-thread add/remove, not
    /// against the render thread's own mutation of playback state.
    pub fn try_read(&self) -> Option<InstrumentReader<'_>> {
        self.data.try_write().map(InstrumentReader)
    }

    pub fn write(&self) -> InstrumentWriter<'_> {
        InstrumentWriter(self.data.write())
    }
}

pub struct InstrumentReader<'a>(RwLockWriteGuard<'a, InstrumentData>);

impl<'a> InstrumentReader<'a> {
    pub fn sequenced(&self) -> &[Event] {
        &self.0.sequenced
    }

    pub fn sequenced_mut(&mut self) -> &mut [Event] {
        &mut self.0.sequenced
    }

    pub fn live(&self) -> &[Event] {
        &self.0.live
    }

    pub fn live_mut(&mut self) -> &mut [Event] {
        &mut self.0.live
    }

    /// Indices into `sequenced()` overlapping measure `measure`, or an
    /// empty slice if the measure has no bucket yet.
    pub fn events_for_measure(&self, measure: usize) -> &[usize] {
        self.0.measures.get(measure).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn samples_per_bar(&self) -> i64 {
        self.0.samples_per_bar
    }
}

pub struct InstrumentWriter<'a>(RwLockWriteGuard<'a, InstrumentData>);

impl<'a> InstrumentWriter<'a> {
    pub fn sequenced_mut(&mut self) -> &mut [Event] {
        &mut self.0.sequenced
    }

    pub fn live_mut(&mut self) -> &mut [Event] {
        &mut self.0.live
    }

    /// Call after mutating an event's start/length directly through
    /// `sequenced_mut` so the measure index stays consistent.
    pub fn reindex(&mut self, index: usize) {
        self.0.reindex(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BaseEvent, EventBase};
    use ae_audio::AudioBuffer;

    fn event_at(start: i64, length: i64) -> Event {
        Event::Base(BaseEvent {
            base: EventBase::new(InstrumentId(0), start, length, 1.0, true),
            buffer: AudioBuffer::new(1, length as usize),
        })
    }

    #[test]
    fn add_sequenced_indexes_into_overlapping_measures() {
        let instrument = Instrument::new(InstrumentId(0), 100, 48_000.0);
        instrument.add_sequenced(event_at(0, 50));
        instrument.add_sequenced(event_at(90, 30)); // spans measure 0 and 1

        let reader = instrument.try_read().unwrap();
        assert_eq!(reader.events_for_measure(0).len(), 2);
        assert_eq!(reader.events_for_measure(1).len(), 1);
    }

    #[test]
    fn purge_deletable_removes_and_reindexes() {
        let instrument = Instrument::new(InstrumentId(0), 100, 48_000.0);
        instrument.add_sequenced(event_at(0, 50));
        let idx = instrument.add_sequenced(event_at(10, 10));
        {
            let mut writer = instrument.write();
            writer.sequenced_mut()[idx].base_mut().deletable = true;
        }
        instrument.purge_deletable();

        let reader = instrument.try_read().unwrap();
        assert_eq!(reader.sequenced().len(), 1);
        assert_eq!(reader.events_for_measure(0).len(), 1);
    }

    #[test]
    fn try_read_fails_while_writer_holds_the_lock() {
        let instrument = Instrument::new(InstrumentId(0), 100, 48_000.0);
        let _writer = instrument.write();
        assert!(instrument.try_read().is_none());
    }
}
