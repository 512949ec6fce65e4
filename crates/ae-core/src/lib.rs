//! ae-core: shared types for the render engine workspace.
//!
//! Sample type, hardware configuration enums, the logarithmic volume curve,
//! the sequencer clock, and the crate-wide error type.

mod clock;
mod error;
mod sample;
mod volume;

pub use clock::{Clock, ClockEvents, TimeSignature};
pub use error::{CoreError, CoreResult};
pub use sample::{BufferSize, ChannelLayout, DriverKind, Sample, SampleRate};
pub use volume::{to_bipolar, to_linear, to_log, to_unipolar, VOLUME_CURVE};

/// Engine-wide, persistable configuration (§6 "Configuration").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    pub sample_rate: SampleRate,
    pub buffer_size: BufferSize,
    pub output_channels: ChannelLayout,
    pub input_channels: u8,
    pub channel_caching: bool,
    pub cpu_scaling_mitigation: bool,
    pub driver: DriverKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::default(),
            buffer_size: BufferSize::default(),
            output_channels: ChannelLayout::Stereo,
            input_channels: 0,
            channel_caching: true,
            cpu_scaling_mitigation: false,
            driver: DriverKind::Mock,
        }
    }
}
