//! Session state behind the scripting bindings.
//!
//! [`ScriptSession`] is what one Python `FPDevice` holds. It owns the
//! [`Device`] once the library has loaded, remembers a load failure that
//! happened before any device existed, and keeps the optional per-session
//! log file. Results come back in the numeric form of [`crate::status`].

use std::io;
use std::path::Path;

use env_logger::Logger;

use crate::device::Device;
use crate::enumerate;
use crate::error::Result;
use crate::gateway::Backend;
use crate::logfile;
use crate::status::IntoStatus;

pub struct ScriptSession<B: Backend> {
    device: Option<Device<B>>,
    logger: Option<Logger>,
    load_error: String,
}

impl<B: Backend> Default for ScriptSession<B> {
    fn default() -> Self {
        Self {
            device: None,
            logger: None,
            load_error: String::new(),
        }
    }
}

impl<B: Backend> ScriptSession<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends later [`ScriptSession::log`] messages to `path`, appending.
    pub fn set_log_file(&mut self, path: &Path) -> io::Result<()> {
        self.logger = Some(logfile::session_logger(path)?);
        Ok(())
    }

    /// Opens `serial` on the backend the caller just loaded.
    ///
    /// The first successful load creates the device; later calls reuse it,
    /// so opening twice without a close reports `ALREADY_OPENED`.
    pub fn open(&mut self, backend: Result<B>, serial: &str, firmware: Option<&Path>) -> i64 {
        let backend = match backend {
            Ok(backend) => backend,
            Err(err) => {
                self.load_error = err.to_string();
                self.write_log(log::Level::Error, &format!("open {serial}: {err}"));
                return i64::from(err.code());
            }
        };
        self.load_error.clear();

        let device = self.device.get_or_insert_with(|| Device::new(backend));
        let status = device.open(serial, firmware).into_status();
        let (level, message) = if status < 0 {
            (log::Level::Error, format!("open {serial}: {}", device.last_error()))
        } else {
            (log::Level::Info, format!("opened {serial} ({})", device.firmware_version()))
        };
        self.write_log(level, &message);
        status
    }

    pub fn close(&mut self) -> i64 {
        if let Some(device) = self.device.as_mut() {
            device.close();
        }
        0
    }

    pub fn is_open(&self) -> bool {
        self.device.as_ref().is_some_and(Device::is_open)
    }

    pub fn device(&self) -> Option<&Device<B>> {
        self.device.as_ref()
    }

    /// The device, or `None` before the first successful library load.
    pub fn device_mut(&mut self) -> Option<&mut Device<B>> {
        self.device.as_mut()
    }

    /// Reads `len` bytes from pipe-out `address`.
    ///
    /// Returns the status and the bytes the caller should store. On error
    /// the byte vector is empty so the caller's buffer stays as it was.
    pub fn read_pipe(
        &mut self,
        address: u32,
        len: usize,
        block_size: Option<usize>,
    ) -> Option<(i64, Vec<u8>)> {
        let device = self.device.as_mut()?;
        let block_size = block_size.unwrap_or(device.block_size());
        let mut buf = vec![0u8; len];
        let status = device.read_pipe(address, &mut buf, block_size).into_status();
        let delivered = usize::try_from(status).map_or(0, |count| count.min(len));
        buf.truncate(delivered);
        Some((status, buf))
    }

    pub fn last_error(&self) -> String {
        match &self.device {
            Some(device) if self.load_error.is_empty() => device.last_error().to_string(),
            _ => self.load_error.clone(),
        }
    }

    /// Levels: 0 fatal, 1 error, 2 message, 3 debug.
    pub fn log(&self, level: i32, text: &str) {
        self.write_log(logfile::level_from_raw(level), text);
    }

    fn write_log(&self, level: log::Level, text: &str) {
        match &self.logger {
            Some(logger) => logfile::write(logger, level, text),
            None => log::log!(target: "py_fp", level, "{text}"),
        }
    }
}

/// `[serial, device_id]` rows for every board that opens.
pub fn device_rows<B: Backend>(backend: &B) -> Vec<Vec<String>> {
    enumerate::list_devices(backend)
        .into_iter()
        .map(|info| vec![info.serial, info.device_id])
        .collect()
}
