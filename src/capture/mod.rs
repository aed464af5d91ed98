pub mod device;
pub mod frame;
pub mod simulated;
pub mod stream;

pub use device::{FrameCallback, Pipeline};
pub use frame::{Frame, FrameMetadata, Modality, PixelFormat, StreamProfile};
pub use simulated::{DeviceFault, SimulatedDevice};
pub use stream::{StreamDeclaration, StreamRequest};
