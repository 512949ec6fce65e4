//! Cross-thread control surface (§5 "Shared-resource policy", §6 "Control
//! interface", §9 "SequencerController-style facade").
//!
//! The render thread owns the `Clock` and the rest of `RenderCore` outright;
//! no other thread ever touches them directly. Control operations instead
//! write into small `parking_lot::Mutex`-guarded slots on a shared
//! `ControlLink`: the control thread may block briefly to acquire one (it
//! has no deadline), while the render thread only ever `try_lock`s them at
//! the top of a callback and silently skips applying a pending change if
//! contended, per the design note "Mutex vs atomic boundary" — "acceptable
//! if the render side uses try_lock and degrades to skip."

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ae_core::TimeSignature;
use parking_lot::Mutex;

use crate::render_core::CaptureRequest;

#[derive(Debug, Clone, Copy)]
pub struct PendingTempo {
    pub tempo: f64,
    pub time_signature: TimeSignature,
}

#[derive(Debug, Clone, Copy)]
pub struct PendingLoopRange {
    pub min: i64,
    pub max: i64,
    pub steps_per_bar: u32,
}

/// Shared cross-thread mailbox. One instance per engine, held by both the
/// `SchedulingFacade` (control side) and the render closure (audio side).
#[derive(Default)]
pub struct ControlLink {
    pub(crate) thread_active: AtomicBool,
    pub(crate) playing: AtomicBool,
    pending_tempo: Mutex<Option<PendingTempo>>,
    pending_loop_range: Mutex<Option<PendingLoopRange>>,
    pending_buffer_position: Mutex<Option<i64>>,
    pending_marker: Mutex<Option<Option<i64>>>,
    pending_measures: Mutex<Option<(u32, u32)>>,
    pending_capture: Mutex<Option<CaptureRequest>>,
    pending_save_snippet: Mutex<Option<u64>>,
    rewind_requested: AtomicBool,
}

impl ControlLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            thread_active: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            ..Default::default()
        })
    }

    pub(crate) fn take_pending_tempo(&self) -> Option<PendingTempo> {
        self.pending_tempo.try_lock().and_then(|mut g| g.take())
    }

    pub(crate) fn take_pending_loop_range(&self) -> Option<PendingLoopRange> {
        self.pending_loop_range.try_lock().and_then(|mut g| g.take())
    }

    pub(crate) fn take_pending_buffer_position(&self) -> Option<i64> {
        self.pending_buffer_position.try_lock().and_then(|mut g| g.take())
    }

    pub(crate) fn take_pending_marker(&self) -> Option<Option<i64>> {
        self.pending_marker.try_lock().and_then(|mut g| g.take())
    }

    pub(crate) fn take_pending_measures(&self) -> Option<(u32, u32)> {
        self.pending_measures.try_lock().and_then(|mut g| g.take())
    }

    pub(crate) fn take_pending_capture(&self) -> Option<CaptureRequest> {
        self.pending_capture.try_lock().and_then(|mut g| g.take())
    }

    pub(crate) fn take_pending_save_snippet(&self) -> Option<u64> {
        self.pending_save_snippet.try_lock().and_then(|mut g| g.take())
    }

    pub(crate) fn take_rewind_requested(&self) -> bool {
        self.rewind_requested.swap(false, Ordering::AcqRel)
    }
}

/// `SequencerController`-style facade (§9) over the shared control link: the
/// named operations of §6's "Control interface", safe to call from any
/// thread.
pub struct SchedulingFacade {
    link: Arc<ControlLink>,
}

impl SchedulingFacade {
    pub fn new(link: Arc<ControlLink>) -> Self {
        Self { link }
    }

    /// Queue a tempo/time-signature change; applied at the next callback
    /// boundary (§4.7 step 12).
    pub fn set_tempo(&self, bpm: f64, beat_amount: u8, beat_unit: u8) {
        *self.link.pending_tempo.lock() = Some(PendingTempo {
            tempo: bpm,
            time_signature: TimeSignature { beat_amount, beat_unit },
        });
    }

    /// Named identically to `set_tempo` in effect: both land on the same
    /// queued slot, since no thread other than the render thread may touch
    /// the clock directly. Kept as a distinct method to match §6's surface.
    pub fn set_tempo_now(&self, bpm: f64, beat_amount: u8, beat_unit: u8) {
        self.set_tempo(bpm, beat_amount, beat_unit);
    }

    pub fn set_playing(&self, playing: bool) {
        self.link.playing.store(playing, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.link.playing.load(Ordering::Acquire)
    }

    pub fn set_loop_range(&self, min_frame: i64, max_frame: i64, steps_per_bar: u32) {
        *self.link.pending_loop_range.lock() = Some(PendingLoopRange {
            min: min_frame,
            max: max_frame,
            steps_per_bar,
        });
    }

    pub fn set_buffer_position(&self, frame: i64) {
        *self.link.pending_buffer_position.lock() = Some(frame);
    }

    pub fn rewind(&self) {
        self.link.rewind_requested.store(true, Ordering::Release);
    }

    pub fn update_measures(&self, count: u32, steps_per_bar: u32) {
        *self.link.pending_measures.lock() = Some((count, steps_per_bar));
    }

    pub fn set_notification_marker(&self, frame: Option<i64>) {
        *self.link.pending_marker.lock() = Some(frame);
    }

    pub fn set_recording_state(&self, enabled: bool, max_buffers: usize, output_path: impl Into<std::path::PathBuf>) {
        let request = if enabled {
            CaptureRequest::StartRecording { max_buffers, output_path: output_path.into() }
        } else {
            CaptureRequest::Stop
        };
        *self.link.pending_capture.lock() = Some(request);
    }

    pub fn set_bounce_state(
        &self,
        enabled: bool,
        max_buffers: usize,
        output_path: impl Into<std::path::PathBuf>,
        range_start: i64,
        range_end: i64,
    ) {
        let request = if enabled {
            CaptureRequest::StartBounce {
                max_buffers,
                output_path: output_path.into(),
                range_start,
                range_end,
            }
        } else {
            CaptureRequest::Stop
        };
        *self.link.pending_capture.lock() = Some(request);
    }

    /// Force an early flush of the recording currently being captured,
    /// instead of waiting for its bounded buffer to fill. `index` is echoed
    /// back on the `RecordedSnippetReady` notification so the caller can
    /// correlate the request with its completion. No-op if no recording is
    /// active at the next callback boundary.
    pub fn save_recorded_snippet(&self, index: u64) {
        *self.link.pending_save_snippet.lock() = Some(index);
    }

    /// Stop the engine. The next render callback returns a terminal signal
    /// and the driver's loop exits (§5 "Cancellation and timeouts").
    pub fn stop(&self) {
        self.link.thread_active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.link.thread_active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_tempo_is_taken_exactly_once() {
        let link = ControlLink::new();
        let facade = SchedulingFacade::new(link.clone());
        facade.set_tempo(140.0, 3, 4);

        let pending = link.take_pending_tempo();
        assert!(pending.is_some());
        assert_eq!(pending.unwrap().tempo, 140.0);
        assert!(link.take_pending_tempo().is_none());
    }

    #[test]
    fn stop_flips_thread_active_false() {
        let link = ControlLink::new();
        let facade = SchedulingFacade::new(link.clone());
        assert!(facade.is_active());
        facade.stop();
        assert!(!facade.is_active());
    }

    #[test]
    fn rewind_request_is_consumed_once() {
        let link = ControlLink::new();
        let facade = SchedulingFacade::new(link.clone());
        facade.rewind();
        assert!(link.take_rewind_requested());
        assert!(!link.take_rewind_requested());
    }
}
