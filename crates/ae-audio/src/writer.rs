//! Bounded disk writer: off-render-thread PCM accumulation and RIFF WAVE
//! flush. Grounded on the original engine's `DiskWriter`/`wavewriter`: a
//! fixed-size interleaved signed-16-bit buffer filled during rendering,
//! flushed to a numbered `.wav` file once full or on demand.

use std::path::{Path, PathBuf};

use ae_core::Sample;
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::buffer::AudioBuffer;
use crate::error::{AudioError, AudioResult};

const MAX_PCM16: f64 = 32_767.0;

fn to_pcm16(sample: Sample) -> i16 {
    let scaled = sample as f64 * MAX_PCM16;
    scaled.clamp(-MAX_PCM16, MAX_PCM16) as i16
}

/// Accumulates rendered output as interleaved signed 16-bit PCM until full,
/// then flushes to a `.wav` file. Never touches the filesystem from
/// `append` — only `flush` performs I/O, so it can be called from a
/// non-render thread once a snippet is ready.
pub struct DiskWriter {
    output_dir: PathBuf,
    channel_count: usize,
    capacity_frames: usize,
    cached: Vec<i16>,
    write_index: usize,
    next_recording_id: u64,
}

impl DiskWriter {
    pub fn new(output_dir: impl Into<PathBuf>, channel_count: usize, capacity_frames: usize) -> Self {
        let mut writer = Self {
            output_dir: output_dir.into(),
            channel_count,
            capacity_frames,
            cached: Vec::new(),
            write_index: 0,
            next_recording_id: 0,
        };
        writer.generate_output_buffer();
        writer
    }

    fn generate_output_buffer(&mut self) {
        self.cached = vec![0; self.capacity_frames * self.channel_count];
        self.write_index = 0;
    }

    pub fn is_full(&self) -> bool {
        self.write_index >= self.cached.len()
    }

    /// The numeric suffix the next `flush` will assign, for callers that
    /// need to report which recording a flush produced (e.g. in a
    /// notification) before or as it happens.
    pub fn next_recording_id(&self) -> u64 {
        self.next_recording_id
    }

    /// Convert and append one render buffer's worth of frames, clipping at
    /// the signed 16-bit ceiling. Returns the number of frames appended,
    /// which is less than `buffer.frame_count()` once the cache fills.
    pub fn append(&mut self, buffer: &AudioBuffer) -> usize {
        let mut frames_appended = 0;
        for frame in 0..buffer.frame_count() {
            if self.write_index + self.channel_count > self.cached.len() {
                break;
            }
            for c in 0..self.channel_count {
                let sample = if buffer.channel_count() > c {
                    buffer.channel(c)[frame]
                } else {
                    buffer.channel(0)[frame]
                };
                self.cached[self.write_index + c] = to_pcm16(sample);
            }
            self.write_index += self.channel_count;
            frames_appended += 1;
        }
        frames_appended
    }

    /// Write whatever has been accumulated so far to a numbered `.wav` file
    /// and reset the cache for the next recording. Only the frames actually
    /// written are flushed; trailing silence in an unfilled cache is cut.
    pub fn flush(&mut self, sample_rate: u32) -> AudioResult<PathBuf> {
        let recorded_samples = self.write_index;
        let path = self.next_path();

        let spec = WavSpec {
            channels: self.channel_count as u16,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(&path, spec)
            .map_err(|e| AudioError::Writer(e.to_string()))?;
        for &sample in &self.cached[..recorded_samples] {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::Writer(e.to_string()))?;
        }
        writer.finalize().map_err(|e| AudioError::Writer(e.to_string()))?;

        self.next_recording_id += 1;
        self.generate_output_buffer();
        Ok(path)
    }

    fn next_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(format!("recording-{}.wav", self.next_recording_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_clips_at_signed_16_bit_ceiling() {
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -(i16::MAX));
        assert_eq!(to_pcm16(0.0), 0);
    }

    #[test]
    fn append_stops_when_cache_is_full() {
        let mut writer = DiskWriter::new("/tmp", 1, 4);
        let mut buf = AudioBuffer::new(1, 8);
        buf.channel_mut(0).copy_from_slice(&[1.0; 8]);
        let appended = writer.append(&buf);
        assert_eq!(appended, 4);
        assert!(writer.is_full());
    }

    #[test]
    fn flush_writes_only_recorded_frames_and_advances_recording_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DiskWriter::new(dir.path(), 1, 16);
        let mut buf = AudioBuffer::new(1, 4);
        buf.channel_mut(0).copy_from_slice(&[0.5, -0.5, 0.25, -0.25]);
        writer.append(&buf);

        let path_one = writer.flush(44_100).unwrap();
        assert!(path_one.ends_with("recording-0.wav"));
        assert!(path_one.exists());

        writer.append(&buf);
        let path_two = writer.flush(44_100).unwrap();
        assert!(path_two.ends_with("recording-1.wav"));
    }
}
