pub mod reader;
pub mod sampler;
pub mod selector;

pub use reader::{DirectReader, IoMode, ReadTiming};
pub use sampler::{LatencyProbe, ProbeControl, ProbeState};
pub use selector::BlockSelector;
