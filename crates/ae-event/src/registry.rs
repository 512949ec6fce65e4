//! Sample buffer registry. Decoding and resource loading are out of scope
//! (§1); this only stores already-decoded buffers keyed by identifier and
//! answers "missing sample" lookups with `None` so callers can fall back to
//! silence per §7 rather than propagate an error.

use std::collections::HashMap;

use ae_audio::AudioBuffer;

use crate::ids::SampleId;

pub struct RegisteredSample {
    pub buffer: AudioBuffer,
    pub sample_rate: f64,
}

#[derive(Default)]
pub struct SampleRegistry {
    samples: HashMap<SampleId, RegisteredSample>,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: SampleId, buffer: AudioBuffer, sample_rate: f64) {
        self.samples.insert(id, RegisteredSample { buffer, sample_rate });
    }

    /// Forbidden while any event still references `id`; enforcing that is a
    /// control-plane responsibility, not this store's.
    pub fn unregister(&mut self, id: SampleId) -> Option<RegisteredSample> {
        self.samples.remove(&id)
    }

    pub fn get(&self, id: SampleId) -> Option<&RegisteredSample> {
        self.samples.get(&id)
    }

    pub fn contains(&self, id: SampleId) -> bool {
        self.samples.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sample_lookup_returns_none() {
        let registry = SampleRegistry::new();
        assert!(registry.get(SampleId(1)).is_none());
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let mut registry = SampleRegistry::new();
        registry.register(SampleId(1), AudioBuffer::new(1, 4), 44_100.0);
        assert!(registry.contains(SampleId(1)));
        assert_eq!(registry.get(SampleId(1)).unwrap().sample_rate, 44_100.0);
    }
}
