//! Processor interface and chain (§4.4 "ProcessorChain"). Individual DSP
//! algorithms are out of scope (§1); this only specifies the seam.

use ae_audio::AudioBuffer;

/// A single effect stage. Implementations own their own DSP state; the
/// chain only sequences `process` calls and tracks cacheability.
pub trait Processor: Send {
    fn process(&mut self, buf: &mut AudioBuffer, is_mono_source: bool);

    /// Whether this processor's output is deterministic for fixed input,
    /// i.e. safe to memoize in a channel cache (§4.5 "Cache lifecycle").
    fn is_cacheable(&self) -> bool {
        true
    }

    fn reset(&mut self) {}
}

/// Ordered list of processors, mutable only between render callbacks
/// (§4.4: "insert/remove/reorder between render callbacks only").
#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, processor: Box<dyn Processor>) {
        self.processors.push(processor);
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Box<dyn Processor>> {
        if index < self.processors.len() {
            Some(self.processors.remove(index))
        } else {
            None
        }
    }

    pub fn reorder(&mut self, from: usize, to: usize) {
        if from < self.processors.len() && to < self.processors.len() {
            let processor = self.processors.remove(from);
            self.processors.insert(to, processor);
        }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Index of the first non-cacheable processor, or `len()` if every
    /// processor is cacheable (§4.5: channel cache stores the pre-image
    /// "before a non-cacheable processor, or the final output if all are
    /// cacheable").
    pub fn first_non_cacheable_index(&self) -> usize {
        self.processors
            .iter()
            .position(|p| !p.is_cacheable())
            .unwrap_or(self.processors.len())
    }

    /// Run every processor in insertion order.
    pub fn apply_all(&mut self, buf: &mut AudioBuffer, is_mono_source: bool) {
        for processor in &mut self.processors {
            processor.process(buf, is_mono_source);
        }
    }

    /// Run only the processors up to (not including) `first_non_cacheable_index`.
    pub fn apply_up_to_cache_boundary(&mut self, buf: &mut AudioBuffer, is_mono_source: bool) {
        let boundary = self.first_non_cacheable_index();
        for processor in self.processors.iter_mut().take(boundary) {
            processor.process(buf, is_mono_source);
        }
    }

    /// Run the processors from `first_non_cacheable_index` onward, applied
    /// after a cache hit has supplied the pre-image.
    pub fn apply_after_cache_boundary(&mut self, buf: &mut AudioBuffer, is_mono_source: bool) {
        let boundary = self.first_non_cacheable_index();
        for processor in self.processors.iter_mut().skip(boundary) {
            processor.process(buf, is_mono_source);
        }
    }
}
