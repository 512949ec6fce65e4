//! The duplex driver contract (§4.8/§6 "Driver").
//!
//! Two shapes share one interface. A pull/blocking driver (offline bounce,
//! the mock driver used in tests) owns a loop that calls `read_input` and
//! `write_output` directly. A push/callback driver (the live `cpal` backend)
//! instead takes ownership of a render callback via `start_render` and
//! invokes it from the hardware's own audio thread.

use ae_core::Sample;

use crate::error::AudioResult;

/// `render(input, output)`: read captured input, write rendered output.
/// Both slices are interleaved across the driver's channel count. Called on
/// the audio thread for push drivers; called by the owning loop for pull
/// drivers. Must not allocate, lock persistently, or block.
pub type RenderCallback = Box<dyn FnMut(&[Sample], &mut [Sample]) + Send + 'static>;

pub trait AudioDriver: Send {
    /// Pull shape: write `frame_count` interleaved frames of already-rendered
    /// output. Drivers that only support the push shape return
    /// `AudioError::StreamError` here.
    fn write_output(&mut self, interleaved: &[Sample], frame_count: usize) -> AudioResult<()>;

    /// Pull shape: read up to `frame_count` interleaved frames of captured
    /// input, returning the number of frames actually read.
    fn read_input(&mut self, interleaved: &mut [Sample], frame_count: usize) -> AudioResult<usize>;

    /// Push shape: hand the driver a render callback and begin the render
    /// loop. Pull drivers may treat this as a no-op registration; they are
    /// driven instead via `write_output`/`read_input`.
    fn start_render(&mut self, render: RenderCallback) -> AudioResult<()>;

    fn stop(&mut self) -> AudioResult<()>;

    fn is_supported(&self) -> bool;

    fn is_running(&self) -> bool;

    /// Number of callback bursts the driver should buffer ahead of the
    /// hardware before the core's stream-stabilization mitigation kicks in
    /// (§6 "cpu_scaling_mitigation").
    fn set_buffer_size_in_bursts(&mut self, bursts: usize);

    fn set_device_id(&mut self, id: Option<String>);
}
