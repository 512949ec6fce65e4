//! Multi-channel PCM buffer: the engine's unit of currency for mixing.

use ae_core::Sample;

/// A multi-channel buffer of a fixed frame count (§3 "AudioBuffer").
///
/// Invariants: `channel_count() >= 1`; every channel holds exactly
/// `frame_count()` samples.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
}

impl AudioBuffer {
    pub fn new(channel_count: usize, frame_count: usize) -> Self {
        assert!(channel_count >= 1, "AudioBuffer requires at least one channel");
        Self {
            channels: vec![vec![0.0; frame_count]; channel_count],
        }
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index]
    }

    pub fn silence_all(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    pub fn is_silent(&self) -> bool {
        self.channels.iter().all(|c| c.iter().all(|&s| s == 0.0))
    }

    pub fn scale_by(&mut self, factor: Sample) {
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                *sample *= factor;
            }
        }
    }

    /// Broadcast channel 0 into every other channel. Channel 0 itself is
    /// left unchanged.
    pub fn apply_mono_source(&mut self) {
        if self.channels.len() < 2 {
            return;
        }
        let source = self.channels[0].clone();
        for channel in self.channels.iter_mut().skip(1) {
            channel.copy_from_slice(&source);
        }
    }

    /// Sum `scalar * src[src_read_offset + k]` into `self[dst_write_offset + k]`
    /// for each channel pair, `k = 0..frames_written`. If `src` has fewer
    /// channels, its channel 0 is broadcast to every destination channel.
    /// Stops at the destination end, or at the source end unless
    /// `wrap_src_as_loop` is set (in which case source reads wrap modulo the
    /// source length). Returns the number of frames actually written.
    pub fn merge(
        &mut self,
        src: &AudioBuffer,
        src_read_offset: usize,
        dst_write_offset: usize,
        scalar: Sample,
        wrap_src_as_loop: bool,
    ) -> usize {
        let dst_frames = self.frame_count();
        let src_frames = src.frame_count();

        if dst_write_offset >= dst_frames || src_frames == 0 {
            return 0;
        }

        let room_in_dst = dst_frames - dst_write_offset;
        let room_in_src = if wrap_src_as_loop {
            room_in_dst
        } else {
            src_frames.saturating_sub(src_read_offset)
        };
        let frames_written = room_in_dst.min(room_in_src);

        for k in 0..frames_written {
            let src_index = if wrap_src_as_loop {
                (src_read_offset + k) % src_frames
            } else {
                src_read_offset + k
            };

            for c in 0..self.channels.len() {
                let src_channel = if src.channel_count() > c { c } else { 0 };
                let sample = src.channels[src_channel][src_index];
                self.channels[c][dst_write_offset + k] += scalar * sample;
            }
        }

        frames_written
    }
}
