//! ae-audio: the PCM buffer, wave table, duplex driver contract, and disk
//! writer that sit underneath the render engine.

mod buffer;
mod cpal_driver;
mod driver;
mod error;
mod mock_driver;
mod wave_table;
mod writer;

pub use buffer::AudioBuffer;
pub use cpal_driver::CpalDriver;
pub use driver::{AudioDriver, RenderCallback};
pub use error::{AudioError, AudioResult};
pub use mock_driver::MockDriver;
pub use wave_table::WaveTable;
pub use writer::DiskWriter;
