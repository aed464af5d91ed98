pub mod recorder;
pub mod stats;

pub use recorder::{BagContents, BagReader, BagWriter, RecordingStats};
pub use stats::{FrameStats, StreamCounts};
