//! ChannelGroup (§3, §4.7 step 7): a sub-bus that sums a set of member
//! channels through a shared processor chain before merging into the
//! master buffer.

use ae_audio::AudioBuffer;

use crate::channel::AudioChannel;
use crate::processor::ProcessorChain;

/// Owns a processor chain and an internal mix buffer sized like a channel
/// buffer; membership is by index into whatever channel collection the
/// caller holds (the render core owns that storage, not this struct).
pub struct ChannelGroup {
    buffer: AudioBuffer,
    pub chain: ProcessorChain,
    pub members: Vec<usize>,
    pub mute: bool,
    pub solo: bool,
}

impl ChannelGroup {
    pub fn new(channel_count: usize, frame_count: usize) -> Self {
        Self {
            buffer: AudioBuffer::new(channel_count, frame_count),
            chain: ProcessorChain::new(),
            members: Vec::new(),
            mute: false,
            solo: false,
        }
    }

    pub fn add_member(&mut self, channel_index: usize) {
        if !self.members.contains(&channel_index) {
            self.members.push(channel_index);
        }
    }

    pub fn remove_member(&mut self, channel_index: usize) {
        self.members.retain(|&i| i != channel_index);
    }

    pub fn is_member(&self, channel_index: usize) -> bool {
        self.members.contains(&channel_index)
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    /// Sums the buffers of every member channel into the group's internal
    /// buffer, runs the group chain, and merges the result into `master`.
    /// A muted (and, when any group is soloed, non-soloed) group still
    /// clears its buffer and contributes silence.
    pub fn apply_effects_to_channels(
        &mut self,
        channels: &[AudioChannel],
        master: &mut AudioBuffer,
        solo_active: bool,
    ) {
        self.buffer.silence_all();

        let silenced = self.mute || (solo_active && !self.solo);
        if !silenced {
            for &index in &self.members {
                if let Some(channel) = channels.get(index) {
                    self.buffer.merge(channel.buffer(), 0, 0, 1.0, false);
                }
            }

            let is_mono_source = self.buffer.channel_count() < 2;
            self.chain.apply_all(&mut self.buffer, is_mono_source);
        }

        master.merge(&self.buffer, 0, 0, 1.0, false);
    }
}
