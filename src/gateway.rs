//! The seam between a [`Device`](crate::Device) session and the FrontPanel SDK.
//!
//! [`FrontPanel`] models a single SDK handle (`okCFrontPanel`). A [`Backend`]
//! hands out fresh handles; sessions and the enumeration helpers each take
//! their own and drop it when done. The native implementation lives in
//! [`crate::ffi`], an in-memory one in [`mock`].

use crate::constants;
use crate::error::{Error, SdkError};
use std::path::Path;

pub mod mock;

pub type SdkResult<T> = std::result::Result<T, SdkError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsbSpeed {
    #[default]
    Unknown,
    Full,
    High,
    Super,
}

impl UsbSpeed {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            constants::OK_USBSPEED_FULL => Self::Full,
            constants::OK_USBSPEED_HIGH => Self::High,
            constants::OK_USBSPEED_SUPER => Self::Super,
            _ => Self::Unknown,
        }
    }
}

/// What the SDK reports about an opened device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareInfo {
    pub device_id: String,
    pub serial: String,
    pub major_version: i32,
    pub minor_version: i32,
    pub usb_speed: UsbSpeed,
}

/// One entry of [`list_devices`](crate::enumerate::list_devices).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: String,
    pub device_id: String,
}

/// A single FrontPanel SDK handle.
///
/// Implementations release the underlying native object on drop. Pipe
/// calls must be handed buffers whose length is a multiple of
/// `block_size`; [`crate::pipe`] takes care of that for callers.
pub trait FrontPanel {
    fn device_count(&mut self) -> usize;
    fn device_list_serial(&mut self, index: usize) -> String;

    fn open_by_serial(&mut self, serial: &str) -> SdkResult<()>;
    fn is_open(&self) -> bool;
    fn close(&mut self);

    fn device_info(&mut self) -> SdkResult<HardwareInfo>;
    fn is_front_panel_enabled(&mut self) -> bool;
    fn load_default_pll_configuration(&mut self) -> SdkResult<()>;
    fn configure_fpga(&mut self, bitstream: &Path) -> SdkResult<()>;

    fn set_wire_in_value(&mut self, address: u32, value: u32, mask: u32) -> SdkResult<()>;
    fn update_wire_ins(&mut self) -> SdkResult<()>;
    fn update_wire_outs(&mut self) -> SdkResult<()>;
    fn get_wire_out_value(&mut self, address: u32) -> u32;

    fn write_register(&mut self, address: u32, value: u32) -> SdkResult<()>;
    fn read_register(&mut self, address: u32) -> SdkResult<u32>;

    /// Returns the number of bytes accepted by the device.
    fn write_to_block_pipe_in(
        &mut self,
        address: u32,
        block_size: usize,
        data: &[u8],
    ) -> SdkResult<usize>;

    /// Returns the number of bytes read into `data`.
    fn read_from_block_pipe_out(
        &mut self,
        address: u32,
        block_size: usize,
        data: &mut [u8],
    ) -> SdkResult<usize>;

    fn set_timeout(&mut self, timeout_ms: u32);
    fn reset_fpga(&mut self) -> SdkResult<()>;
    fn set_device_id(&mut self, device_id: &str);
    fn get_device_id(&mut self) -> String;
}

/// Produces FrontPanel handles on demand.
pub trait Backend {
    type Handle: FrontPanel;

    fn create_handle(&self) -> Result<Self::Handle, Error>;

    /// Build date and time of the SDK, once it has been loaded.
    fn library_date(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_speed_maps_sdk_constants() {
        assert_eq!(UsbSpeed::from_raw(0), UsbSpeed::Unknown);
        assert_eq!(UsbSpeed::from_raw(1), UsbSpeed::Full);
        assert_eq!(UsbSpeed::from_raw(2), UsbSpeed::High);
        assert_eq!(UsbSpeed::from_raw(3), UsbSpeed::Super);
        assert_eq!(UsbSpeed::from_raw(99), UsbSpeed::Unknown);
    }
}
