pub mod debug;
pub mod device;

pub use debug::{DebugPlugin, DEBUG_IDENTIFIER};
pub use device::{DeviceInfo, DeviceInfoPlugin, DEVICE_IDENTIFIER};
