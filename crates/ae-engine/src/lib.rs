//! ae-engine: the render core and everything around it — processor chains,
//! channels, groups, sequencer collection, and the cross-thread control
//! surface the host drives it with.

mod channel;
mod control;
mod error;
mod group;
mod notification;
mod processor;
mod render_core;
mod sequencer;

pub use channel::{apply_pan, pan_gains, AudioChannel};
pub use control::{ControlLink, PendingLoopRange, PendingTempo, SchedulingFacade};
pub use error::{EngineError, EngineResult};
pub use group::ChannelGroup;
pub use notification::{
    default_notification_channel, notification_channel, Notification, NotificationReceiver,
    NotificationSender,
};
pub use processor::{Processor, ProcessorChain};
pub use render_core::{CaptureRequest, InstrumentBinding, RenderCore, MAX_OUTPUT};
pub use sequencer::{collect_sequenced, wrap_params, Collection};
