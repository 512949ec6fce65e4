//! Sample type and hardware configuration enums.

/// The floating-point width used for every sample in the engine.
///
/// Selected at build time via the `f64-samples` feature (on by default).
/// Disabling it switches the whole render path to `f32`.
#[cfg(feature = "f64-samples")]
pub type Sample = f64;
#[cfg(not(feature = "f64-samples"))]
pub type Sample = f32;

/// Hardware-selected sample rate, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
pub enum SampleRate {
    Hz44100 = 44_100,
    Hz48000 = 48_000,
    Hz88200 = 88_200,
    Hz96000 = 96_000,
    Hz176400 = 176_400,
    Hz192000 = 192_000,
}

impl SampleRate {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        self as u32 as f64
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::Hz48000
    }
}

/// Hardware callback/burst size, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
pub enum BufferSize {
    Samples64 = 64,
    Samples128 = 128,
    Samples256 = 256,
    Samples512 = 512,
    Samples1024 = 1024,
}

impl BufferSize {
    #[inline]
    pub fn as_usize(self) -> usize {
        self as u32 as usize
    }

    #[inline]
    pub fn latency_ms(self, sample_rate: SampleRate) -> f64 {
        (self.as_usize() as f64 / sample_rate.as_f64()) * 1000.0
    }

    /// The next larger burst size, or `self` if already at the ceiling.
    ///
    /// Used by the underrun-recovery path: on an xrun the driver ceiling is
    /// bumped by one burst (§7 "Underrun").
    pub fn next(self) -> Self {
        match self {
            Self::Samples64 => Self::Samples128,
            Self::Samples128 => Self::Samples256,
            Self::Samples256 => Self::Samples512,
            Self::Samples512 => Self::Samples1024,
            Self::Samples1024 => Self::Samples1024,
        }
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self::Samples256
    }
}

/// Output/input channel layout. The engine itself is channel-count agnostic
/// beyond this; `AudioChannel`/pan law assume stereo output (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn channel_count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::Stereo
    }
}

/// Driver backend selection (§6 "Configuration").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DriverKind {
    /// Pull/blocking: the render loop spins calling `render(n)`.
    Pull,
    /// Callback/duplex: the driver invokes the render function itself.
    Push,
    /// Deterministic in-process driver used by tests and offline bounce.
    Mock,
}
