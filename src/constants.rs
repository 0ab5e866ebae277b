//! Fixed values of the FrontPanel SDK and of the adapter built on top of it.

/// Pipe transfer granularity used when the caller does not pick one.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Longest device ID the SDK stores, excluding the terminating NUL.
pub const MAX_DEVICE_ID_LENGTH: usize = 32;

/// Longest serial number the SDK reports, excluding the terminating NUL.
pub const MAX_SERIAL_LENGTH: usize = 10;

/// Length of the date and time strings written by `okFrontPanelDLL_GetVersion`.
pub const VERSION_STRING_LENGTH: usize = 32;

pub const OK_USBSPEED_UNKNOWN: i32 = 0;
pub const OK_USBSPEED_FULL: i32 = 1;
pub const OK_USBSPEED_HIGH: i32 = 2;
pub const OK_USBSPEED_SUPER: i32 = 3;

/// Wire-in endpoints occupy `0x00..=0x1f`, wire-outs `0x20..=0x3f`.
pub const WIRE_OUT_BASE: u32 = 0x20;

#[cfg(target_os = "windows")]
pub const LIBRARY_NAME: &str = "okFrontPanel.dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_NAME: &str = "libokFrontPanel.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const LIBRARY_NAME: &str = "libokFrontPanel.so";
