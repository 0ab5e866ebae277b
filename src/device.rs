use crate::config::{self, SessionConfig};
use crate::constants;
use crate::error::{Error, Result, SdkError};
use crate::gateway::{Backend, FrontPanel, SdkResult, UsbSpeed};
use crate::pipe;
use std::path::Path;
use std::time::Duration;

/// High-level session with one FrontPanel board.
///
/// The type owns at most one SDK handle. `None` means the session is empty;
/// every I/O call then fails with [`Error::NotConnected`]. The handle is
/// closed and released by [`Device::close`], on every failing path of
/// [`Device::open`], and when the session is dropped.
///
/// Every failure also rewrites [`Device::last_error`] before returning, so
/// the message always describes the most recent error.
pub struct Device<B: Backend> {
    backend: B,
    handle: Option<B::Handle>,
    config: SessionConfig,
    serial: String,
    device_id: String,
    firmware_version: String,
    usb3: bool,
    last_error: String,
}

impl<B: Backend> Device<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SessionConfig::default())
    }

    pub fn with_config(backend: B, config: SessionConfig) -> Self {
        Self {
            backend,
            handle: None,
            config,
            serial: String::new(),
            device_id: String::new(),
            firmware_version: String::new(),
            usb3: false,
            last_error: String::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| handle.is_open())
    }

    /// Opens the board with `serial`, optionally loading `firmware` onto the FPGA.
    ///
    /// On any failure the freshly created handle is closed and released
    /// again, leaving the session empty. The cached metadata is only
    /// replaced once every step has succeeded.
    pub fn open(&mut self, serial: &str, firmware: Option<&Path>) -> Result<()> {
        if self.handle.is_some() {
            return Err(self.fail(Error::AlreadyOpened));
        }

        let mut handle = match self.backend.create_handle() {
            Ok(handle) => handle,
            Err(err) => return Err(self.fail(err)),
        };

        log::debug!("opening FrontPanel device {serial}");
        if handle.open_by_serial(serial).is_err() {
            return Err(self.fail(Error::CannotOpen));
        }

        let info = match handle.device_info() {
            Ok(info) => Some(info),
            Err(err) => {
                log::debug!("{serial}: device info unavailable: {err}");
                None
            }
        };

        if self.config.load_default_pll() {
            if let Err(err) = handle.load_default_pll_configuration() {
                log::warn!("{serial}: default PLL configuration not loaded: {err}");
            }
        }

        if let Some(firmware) = firmware.filter(|path| !path.as_os_str().is_empty()) {
            log::debug!("{serial}: configuring FPGA from {}", firmware.display());
            if let Err(err) = handle.configure_fpga(firmware) {
                handle.close();
                return Err(self.fail(Error::FpgaConfigFailed(err)));
            }
        }

        if !handle.is_front_panel_enabled() {
            handle.close();
            return Err(self.fail(Error::FrontPanelNotEnabled));
        }

        if let Some(timeout) = self.config.timeout() {
            handle.set_timeout(config::timeout_millis(timeout));
        }

        match info {
            Some(info) => {
                self.firmware_version =
                    format!("Firmware {}.{}", info.major_version, info.minor_version);
                self.device_id = info.device_id;
                self.serial = info.serial;
                self.usb3 = info.usb_speed == UsbSpeed::Super;
            }
            None => {
                self.firmware_version.clear();
                self.device_id.clear();
                self.serial.clear();
                self.usb3 = false;
            }
        }
        log::info!(
            "opened {} ({}, {}{})",
            self.serial,
            self.device_id,
            self.firmware_version,
            if self.usb3 { ", USB 3" } else { "" }
        );
        self.handle = Some(handle);
        Ok(())
    }

    /// Closes and releases the handle. Does nothing on an empty session.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            log::info!("closed {}", self.serial);
        }
    }

    pub fn reset_device(&mut self) -> Result<()> {
        self.control(|handle| handle.reset_fpga())
    }

    /// Sets the SDK transfer timeout; the SDK counts whole milliseconds.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        let millis = config::timeout_millis(timeout);
        self.control(|handle| {
            handle.set_timeout(millis);
            Ok(())
        })
    }

    /// Reads the device ID from the board itself rather than the value cached at open.
    pub fn get_device_id(&mut self) -> Result<String> {
        self.control(|handle| Ok(handle.get_device_id()))
    }

    /// Stores a new device ID on the board, truncated to 32 bytes.
    ///
    /// The cached [`Device::device_id`] keeps the value read at open.
    pub fn set_device_id(&mut self, device_id: &str) -> Result<()> {
        let device_id = truncate_device_id(device_id);
        self.control(|handle| {
            handle.set_device_id(device_id);
            Ok(())
        })
    }

    pub fn set_close_on_failure(&mut self, enabled: bool) {
        self.config.set_close_on_failure(enabled);
    }

    /// Stages `value` on wire-in `address`, flushing all wire-ins when `send_now` is set.
    pub fn set_wire_in(&mut self, address: u32, value: u32, send_now: bool) -> Result<()> {
        self.control(|handle| {
            handle.set_wire_in_value(address, value, u32::MAX)?;
            if send_now {
                handle.update_wire_ins()?;
            }
            Ok(())
        })
    }

    pub fn update_wire_ins(&mut self) -> Result<()> {
        self.control(|handle| handle.update_wire_ins())
    }

    /// Reads wire-out `address`, first pulling a fresh snapshot when `refresh` is set.
    pub fn get_wire_out(&mut self, address: u32, refresh: bool) -> Result<u32> {
        self.control(|handle| {
            if refresh {
                handle.update_wire_outs()?;
            }
            Ok(handle.get_wire_out_value(address))
        })
    }

    pub fn update_wire_outs(&mut self) -> Result<()> {
        self.control(|handle| handle.update_wire_outs())
    }

    pub fn write_register(&mut self, address: u32, value: u32) -> Result<()> {
        self.control(|handle| handle.write_register(address, value))
    }

    pub fn read_register(&mut self, address: u32) -> Result<u32> {
        self.control(|handle| handle.read_register(address))
    }

    /// Writes `data` to pipe-in `address`, padding to whole blocks as needed.
    ///
    /// Returns the byte count accepted by the SDK, which includes any padding.
    pub fn write_pipe(&mut self, address: u32, data: &[u8], block_size: usize) -> Result<usize> {
        self.control(|handle| pipe::write_pipe(handle, address, data, block_size))
    }

    /// Fills `data` from pipe-out `address`; see [`pipe::read_pipe`].
    pub fn read_pipe(&mut self, address: u32, data: &mut [u8], block_size: usize) -> Result<usize> {
        self.control(|handle| pipe::read_pipe(handle, address, data, block_size))
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size()
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    pub fn is_usb3_speed(&self) -> bool {
        self.usb3
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn library_date(&self) -> Option<String> {
        self.backend.library_date()
    }

    fn fail(&mut self, err: Error) -> Error {
        self.last_error = err.to_string();
        err
    }

    /// Runs one control-plane step against the open handle.
    fn control<T>(&mut self, op: impl FnOnce(&mut B::Handle) -> SdkResult<T>) -> Result<T> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(self.fail(Error::NotConnected));
        };
        let result = op(handle);
        self.settle(result)
    }

    fn settle<T>(&mut self, result: SdkResult<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                if err == SdkError::Failed && self.config.close_on_failure() {
                    log::warn!("{}: SDK call failed, closing session", self.serial);
                    self.close();
                }
                Err(self.fail(Error::Sdk(err)))
            }
        }
    }
}

impl<B: Backend> Drop for Device<B> {
    fn drop(&mut self) {
        self.close();
    }
}

fn truncate_device_id(device_id: &str) -> &str {
    if device_id.len() <= constants::MAX_DEVICE_ID_LENGTH {
        return device_id;
    }
    let mut end = constants::MAX_DEVICE_ID_LENGTH;
    while !device_id.is_char_boundary(end) {
        end -= 1;
    }
    &device_id[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{MockBackend, MockBoard};

    fn session() -> (MockBackend, Device<MockBackend>) {
        let backend = MockBackend::new().with_board(MockBoard::new("S1").with_device_id("alpha"));
        let device = Device::new(backend.clone());
        (backend, device)
    }

    #[test]
    fn device_is_created_closed() {
        let (_backend, device) = session();
        assert!(!device.is_open());
        assert_eq!(device.last_error(), "");
    }

    #[test]
    fn open_caches_metadata() {
        let backend = MockBackend::new().with_board(
            MockBoard::new("S1")
                .with_device_id("alpha")
                .with_firmware(1, 38)
                .with_usb_speed(UsbSpeed::High),
        );
        let mut device = Device::new(backend.clone());
        device.open("S1", None).unwrap();
        assert!(device.is_open());
        assert_eq!(device.serial(), "S1");
        assert_eq!(device.device_id(), "alpha");
        assert_eq!(device.firmware_version(), "Firmware 1.38");
        assert!(!device.is_usb3_speed());
        assert!(backend.board("S1").unwrap().pll_loaded);
    }

    #[test]
    fn pll_load_can_be_skipped() {
        let backend = MockBackend::new().with_board(MockBoard::new("S1"));
        let mut config = SessionConfig::new();
        config.set_load_default_pll(false);
        let mut device = Device::with_config(backend.clone(), config);
        device.open("S1", None).unwrap();
        assert!(!backend.board("S1").unwrap().pll_loaded);
    }

    #[test]
    fn configured_timeout_is_applied_on_open() {
        let backend = MockBackend::new().with_board(MockBoard::new("S1"));
        let mut config = SessionConfig::new();
        config.set_timeout(Some(Duration::from_millis(1500)));
        let mut device = Device::with_config(backend, config);
        device.open("S1", None).unwrap();
        assert_eq!(device.handle.as_ref().unwrap().timeout_ms(), Some(1500));
    }

    #[test]
    fn empty_firmware_path_is_skipped() {
        let (backend, mut device) = session();
        device.open("S1", Some(Path::new(""))).unwrap();
        assert_eq!(backend.board("S1").unwrap().bitstream, None);
    }

    #[test]
    fn set_device_id_keeps_cache() {
        let (backend, mut device) = session();
        device.open("S1", None).unwrap();
        device.set_device_id("beta").unwrap();
        assert_eq!(device.device_id(), "alpha");
        assert_eq!(device.get_device_id().unwrap(), "beta");
        assert_eq!(backend.board("S1").unwrap().device_id, "beta");
    }

    #[test]
    fn device_id_is_truncated_to_32_bytes() {
        assert_eq!(truncate_device_id("short"), "short");
        let long = "x".repeat(40);
        assert_eq!(truncate_device_id(&long).len(), 32);
        let accented = format!("{}é", "a".repeat(31));
        assert_eq!(truncate_device_id(&accented), "a".repeat(31));
    }

    #[test]
    fn set_device_id_on_empty_session_fails_early() {
        let (_backend, mut device) = session();
        assert_eq!(device.set_device_id("beta"), Err(Error::NotConnected));
        assert_eq!(device.last_error(), "Device not connected.");
    }

    #[test]
    fn sdk_errors_update_last_error() {
        let (backend, mut device) = session();
        device.open("S1", None).unwrap();
        backend.fail_next(SdkError::Timeout);
        assert_eq!(
            device.write_register(4, 1),
            Err(Error::Sdk(SdkError::Timeout))
        );
        assert_eq!(device.last_error(), "FrontPanel error -2 (Timeout)");
        assert!(device.is_open());
    }

    #[test]
    fn drop_releases_handle() {
        let (backend, mut device) = session();
        device.open("S1", None).unwrap();
        assert_eq!(backend.live_handles(), 1);
        drop(device);
        assert_eq!(backend.live_handles(), 0);
        assert_eq!(backend.board("S1").unwrap().open_handles, 0);
    }

    #[test]
    fn unplugged_board_reports_closed() {
        let (backend, mut device) = session();
        device.open("S1", None).unwrap();
        backend.with_board_mut("S1", |board| board.connected = false);
        assert!(!device.is_open());
    }
}
