pub mod device;
pub mod license;

pub use device::{Device, DeviceView, HardwareInfo};
pub use license::{License, LicenseStatus, LicenseType, LicenseView};
