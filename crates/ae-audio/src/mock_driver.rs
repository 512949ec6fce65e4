//! Deterministic pull driver used by tests and offline bounce (§5 "Ordering
//! guarantees" requires a driver whose timing doesn't depend on real
//! hardware).

use ae_core::Sample;

use crate::driver::{AudioDriver, RenderCallback};
use crate::error::AudioResult;

pub struct MockDriver {
    render: Option<RenderCallback>,
    running: bool,
    buffer_size_in_bursts: usize,
    device_id: Option<String>,
    input_feed: Vec<Sample>,
    input_cursor: usize,
    /// Every frame ever written via `write_output`, for test inspection.
    pub captured_output: Vec<Sample>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            render: None,
            running: false,
            buffer_size_in_bursts: 2,
            device_id: None,
            input_feed: Vec::new(),
            input_cursor: 0,
            captured_output: Vec::new(),
        }
    }

    /// Queue interleaved samples that subsequent `read_input` calls will
    /// hand out, in order.
    pub fn feed_input(&mut self, interleaved: &[Sample]) {
        self.input_feed.extend_from_slice(interleaved);
    }

    /// Drive the registered render callback for `frame_count` frames,
    /// pulling input from the queued feed and appending to
    /// `captured_output`. Returns the interleaved output produced.
    pub fn pump(&mut self, input: &[Sample], frame_count: usize, channels: usize) -> Vec<Sample> {
        let mut output = vec![0.0; frame_count * channels];
        if let Some(render) = self.render.as_mut() {
            render(input, &mut output);
        }
        self.captured_output.extend_from_slice(&output);
        output
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDriver for MockDriver {
    fn write_output(&mut self, interleaved: &[Sample], frame_count: usize) -> AudioResult<()> {
        let len = frame_count.min(interleaved.len());
        self.captured_output.extend_from_slice(&interleaved[..len]);
        Ok(())
    }

    fn read_input(&mut self, interleaved: &mut [Sample], frame_count: usize) -> AudioResult<usize> {
        let available = self.input_feed.len().saturating_sub(self.input_cursor);
        let to_read = frame_count.min(interleaved.len()).min(available);
        interleaved[..to_read]
            .copy_from_slice(&self.input_feed[self.input_cursor..self.input_cursor + to_read]);
        self.input_cursor += to_read;
        Ok(to_read)
    }

    fn start_render(&mut self, render: RenderCallback) -> AudioResult<()> {
        self.render = Some(render);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        self.running = false;
        Ok(())
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_buffer_size_in_bursts(&mut self, bursts: usize) {
        self.buffer_size_in_bursts = bursts.max(1);
    }

    fn set_device_id(&mut self, id: Option<String>) {
        self.device_id = id;
    }
}
