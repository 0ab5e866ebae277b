//! Device discovery that does not need a [`Device`](crate::Device) session.
//!
//! Every call works on its own short-lived handle, which is closed and
//! released before the call returns.

use crate::gateway::{Backend, DeviceInfo, FrontPanel};

/// Serials of all attached boards, in the order the SDK reports them.
pub fn list_serials<B: Backend>(backend: &B) -> Vec<String> {
    let mut handle = match backend.create_handle() {
        Ok(handle) => handle,
        Err(err) => {
            log::debug!("cannot enumerate devices: {err}");
            return Vec::new();
        }
    };
    serials(&mut handle)
}

/// Serial and device ID of every attached board that can be opened.
///
/// Boards that refuse to open are skipped.
pub fn list_devices<B: Backend>(backend: &B) -> Vec<DeviceInfo> {
    let mut handle = match backend.create_handle() {
        Ok(handle) => handle,
        Err(err) => {
            log::debug!("cannot enumerate devices: {err}");
            return Vec::new();
        }
    };

    let mut devices = Vec::new();
    for serial in serials(&mut handle) {
        if let Err(err) = handle.open_by_serial(&serial) {
            log::debug!("skipping {serial}: {err}");
            continue;
        }
        let device_id = handle
            .device_info()
            .map(|info| info.device_id)
            .unwrap_or_else(|_| handle.get_device_id());
        handle.close();
        devices.push(DeviceInfo { serial, device_id });
    }
    devices
}

/// Device ID of the board with `serial`, or an empty string if it cannot be opened.
pub fn device_id<B: Backend>(backend: &B, serial: &str) -> String {
    let Ok(mut handle) = backend.create_handle() else {
        return String::new();
    };
    if handle.open_by_serial(serial).is_err() {
        return String::new();
    }
    let device_id = handle
        .device_info()
        .map(|info| info.device_id)
        .unwrap_or_default();
    handle.close();
    device_id
}

fn serials<H: FrontPanel>(handle: &mut H) -> Vec<String> {
    let count = handle.device_count();
    (0..count).map(|index| handle.device_list_serial(index)).collect()
}
