//! ae-event: the event model, sample registry, and per-instrument event
//! storage that sit between the audio primitives in `ae-audio` and the
//! render core in `ae-engine`.

mod error;
mod event;
mod ids;
mod instrument;
mod registry;
mod synth;

pub use error::{EventError, EventResult};
pub use event::{
    clamp_playback_rate, BaseEvent, CacheableEvent, Event, EventBase, LoopConfig, MixContext,
    SampleEvent, SampleRange, SynthEvent, MAX_PLAYBACK_RATE, MIN_LIVE_LENGTH_FRAMES,
    MIN_PLAYBACK_RATE,
};
pub use ids::{InstrumentId, SampleId};
pub use instrument::{Instrument, InstrumentReader, InstrumentWriter};
pub use registry::{RegisteredSample, SampleRegistry};
pub use synth::{EnvelopeState, OscillatorPhases, Synthesizer, MAX_OSCILLATORS};
