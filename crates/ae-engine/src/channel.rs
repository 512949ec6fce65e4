//! AudioChannel (§4.5): one instrument's working buffer, processor chain,
//! pan/volume, and optional cache.

use ae_audio::AudioBuffer;
use ae_core::{to_linear, to_log, Sample};
use ae_event::{Event, MixContext};

use crate::processor::ProcessorChain;

/// Linear crossfeed pan law observed in the source (§4.5, §9 "Open
/// question - pan law precision"): NOT equal-power. Centered pan (0)
/// leaves both input channels unscaled; panning right bleeds left content
/// into the right output and attenuates it out of the left, and
/// symmetrically for panning left.
pub fn pan_gains(pan: Sample) -> (Sample, Sample, Sample, Sample) {
    let pan = pan.clamp(-1.0, 1.0);
    let gain_ll = 1.0 - pan.max(0.0); // left input -> left output
    let gain_lr = pan.max(0.0); // left input -> right output
    let gain_rr = 1.0 - (-pan).max(0.0); // right input -> right output
    let gain_rl = (-pan).max(0.0); // right input -> left output
    (gain_ll, gain_lr, gain_rr, gain_rl)
}

/// Applies the pan law in place on a stereo buffer. No-op for anything
/// other than exactly 2 channels.
pub fn apply_pan(buf: &mut AudioBuffer, pan: Sample) {
    if buf.channel_count() != 2 {
        return;
    }
    let (gain_ll, gain_lr, gain_rr, gain_rl) = pan_gains(pan);
    for i in 0..buf.frame_count() {
        let l = buf.channel(0)[i];
        let r = buf.channel(1)[i];
        buf.channel_mut(0)[i] = l * gain_ll + r * gain_rl;
        buf.channel_mut(1)[i] = l * gain_lr + r * gain_rr;
    }
}

struct ChannelCache {
    buffer: AudioBuffer,
    start_offset: i64,
    end_offset: i64,
    write_cursor: usize,
    is_caching: bool,
    has_cache: bool,
}

pub struct AudioChannel {
    buffer: AudioBuffer,
    pub chain: ProcessorChain,
    pan: Sample,
    volume_log: Sample,
    pub mute: bool,
    pub cacheable: bool,
    /// Per-channel loop bounds distinct from the global loop (§3
    /// "max_buffer_position"), enabling measure-local patterns like a drum
    /// machine that repeats every bar regardless of the song's loop range.
    pub max_buffer_position: Option<i64>,
    cache: Option<ChannelCache>,
}

impl AudioChannel {
    pub fn new(channel_count: usize, frame_count: usize) -> Self {
        Self {
            buffer: AudioBuffer::new(channel_count, frame_count),
            chain: ProcessorChain::new(),
            pan: 0.0,
            volume_log: to_log(1.0),
            mute: false,
            cacheable: false,
            max_buffer_position: None,
            cache: None,
        }
    }

    pub fn set_pan(&mut self, pan: Sample) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn pan(&self) -> Sample {
        self.pan
    }

    pub fn set_volume_linear(&mut self, volume: Sample) {
        self.volume_log = to_log(volume.clamp(0.0, 1.0));
    }

    pub fn volume_linear(&self) -> Sample {
        to_linear(self.volume_log)
    }

    pub fn volume_log(&self) -> Sample {
        self.volume_log
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut AudioBuffer {
        &mut self.buffer
    }

    /// Configure the cache range; resets any in-progress caching (§4.5
    /// "writing resets on range change or explicit clear").
    pub fn configure_cache(&mut self, start_offset: i64, end_offset: i64) {
        let frames = (end_offset - start_offset + 1).max(0) as usize;
        self.cache = Some(ChannelCache {
            buffer: AudioBuffer::new(self.buffer.channel_count(), frames),
            start_offset,
            end_offset,
            write_cursor: 0,
            is_caching: true,
            has_cache: false,
        });
    }

    pub fn clear_cache(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.write_cursor = 0;
            cache.is_caching = true;
            cache.has_cache = false;
            cache.buffer.silence_all();
        }
    }

    pub fn has_cache(&self) -> bool {
        self.cache.as_ref().map(|c| c.has_cache).unwrap_or(false)
    }

    pub fn is_caching(&self) -> bool {
        self.cache.as_ref().map(|c| c.is_caching).unwrap_or(false)
    }

    /// Write the pre-image into the cache, completing it once the
    /// configured range has been fully written.
    fn write_cache(&mut self, pre_image: &AudioBuffer) {
        let Some(cache) = &mut self.cache else { return };
        if !cache.is_caching {
            return;
        }
        let remaining = cache.buffer.frame_count() - cache.write_cursor;
        let written = cache.buffer.merge(pre_image, 0, cache.write_cursor, 1.0, false).min(remaining);
        cache.write_cursor += written;
        if cache.write_cursor >= cache.buffer.frame_count() {
            cache.is_caching = false;
            cache.has_cache = true;
        }
    }

    /// Mix every sequenced + live event for this callback window into the
    /// channel's working buffer, apply the processor chain (with cache
    /// read/write), and return whether the channel produced any audible
    /// output this callback.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        sequenced: &mut [Event],
        sequenced_indices: &[usize],
        live: &mut [Event],
        playhead_frame: i64,
        loop_min: i64,
        loop_max: i64,
        loop_is_wrapping: bool,
        loop_wrap_offset: i64,
        global_caching_enabled: bool,
        ctx: &MixContext,
    ) -> bool {
        self.buffer.silence_all();

        if self.mute {
            return false;
        }

        let use_channel_local_range = self.max_buffer_position.is_some();
        let channel_local_range = self.max_buffer_position.map(|max| (0, max));
        let ctx = MixContext {
            channel_local_range,
            ..*ctx
        };

        let volume = self.volume_log();

        let use_cache = global_caching_enabled && self.cacheable && self.has_cache();
        if use_cache {
            let Self { buffer, cache, .. } = self;
            if let Some(cache) = cache {
                if cache.has_cache {
                    buffer.silence_all();
                    buffer.merge(&cache.buffer, 0, 0, 1.0, false);
                }
            }
        } else {
            let has_events = !sequenced_indices.is_empty() || !live.is_empty();
            if has_events && volume > 0.0 {
                for &index in sequenced_indices {
                    sequenced[index].mix(
                        &mut self.buffer,
                        playhead_frame,
                        loop_min,
                        loop_max,
                        loop_is_wrapping,
                        loop_wrap_offset,
                        use_channel_local_range,
                        &ctx,
                    );
                }
            }
            // Live events are unioned in unconditionally (§4.6, §4.7 step 5):
            // their effective mix volume defaults to audible even if the
            // channel volume is 0.
            for event in live.iter_mut() {
                event.mix(
                    &mut self.buffer,
                    playhead_frame,
                    loop_min,
                    loop_max,
                    loop_is_wrapping,
                    loop_wrap_offset,
                    use_channel_local_range,
                    &ctx,
                );
            }
        }

        let is_mono_source = self.buffer.channel_count() < 2;

        if global_caching_enabled && self.cacheable && self.is_caching() {
            let pre_image = self.buffer.clone();
            self.chain.apply_up_to_cache_boundary(&mut self.buffer, is_mono_source);
            self.write_cache(&pre_image);
            self.chain.apply_after_cache_boundary(&mut self.buffer, is_mono_source);
        } else {
            self.chain.apply_all(&mut self.buffer, is_mono_source);
        }

        // Channel volume is the fader stage: applied after the processor
        // chain (insert effects), before pan (§4.5 "sum into a destination
        // buffer with pan and volume"). Mixing applies the logarithmic form.
        // Live events must stay audible even at channel volume 0 (§4.6,
        // §4.7 step 5), so the fader itself is forced open when any live
        // event is present and would otherwise be silenced by it.
        let fader_volume = if !live.is_empty() && volume == 0.0 { 1.0 } else { volume };
        self.buffer.scale_by(fader_volume);
        apply_pan(&mut self.buffer, self.pan);
        !self.buffer.is_silent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_right_anchor_matches_observed_source_behavior() {
        let (ll, lr, _, _) = pan_gains(0.3);
        assert!((ll - 0.7).abs() < 1e-9);
        assert!((lr - 0.3).abs() < 1e-9);
    }

    #[test]
    fn pan_left_anchor_matches_observed_source_behavior() {
        let (_, _, rr, rl) = pan_gains(-0.7);
        assert!((rl - 0.7).abs() < 1e-9);
        assert!((rr - 0.3).abs() < 1e-9);
    }

    #[test]
    fn centered_pan_leaves_channels_unscaled() {
        let (ll, lr, rr, rl) = pan_gains(0.0);
        assert_eq!((ll, lr, rr, rl), (1.0, 0.0, 1.0, 0.0));
    }

    #[test]
    fn apply_pan_matches_s4_style_anchor() {
        let mut buf = AudioBuffer::new(2, 1);
        buf.channel_mut(0)[0] = 1.0;
        buf.channel_mut(1)[0] = 0.0;
        apply_pan(&mut buf, 0.3);
        assert!((buf.channel(0)[0] - 0.7).abs() < 1e-9);
        assert!((buf.channel(1)[0] - 0.3).abs() < 1e-9);
    }
}
