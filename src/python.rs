//! `py_fp` extension module: the session adapter as seen from Python.
//!
//! Every method returns the numeric status of [`crate::status`]: negative
//! values are errors, anything else is a value or a byte count. Calling an
//! I/O method before the first `open` raises `IOError`.
//!
//! `open` takes an optional log file. Messages passed to `FPDevice.log` are
//! appended to it; without one they go to the `log` facade.

use crate::device::Device;
use crate::enumerate;
use crate::ffi::{self, Native};
use crate::script::{self, ScriptSession};
use crate::status::{self, IntoStatus};
use pyo3::exceptions::PyIOError;
use pyo3::prelude::*;
use pyo3::types::PyList;
use std::path::PathBuf;

#[pyclass(name = "FPDevice", unsendable)]
pub struct PyDevice {
    session: ScriptSession<Native>,
}

impl PyDevice {
    fn opened(&mut self) -> PyResult<&mut Device<Native>> {
        self.session
            .device_mut()
            .ok_or_else(|| PyIOError::new_err("Device not opened."))
    }

    fn cached(&self, field: impl FnOnce(&Device<Native>) -> &str) -> String {
        self.session.device().map(field).unwrap_or_default().to_string()
    }
}

#[pymethods]
impl PyDevice {
    #[new]
    fn new() -> Self {
        Self {
            session: ScriptSession::new(),
        }
    }

    #[staticmethod]
    fn list_devices() -> Vec<Vec<String>> {
        list_attached()
    }

    #[pyo3(signature = (serial, firmware=None, logfile=None))]
    fn open(
        &mut self,
        serial: &str,
        firmware: Option<PathBuf>,
        logfile: Option<PathBuf>,
    ) -> PyResult<i64> {
        if let Some(path) = logfile {
            self.session.set_log_file(&path).map_err(|err| {
                PyIOError::new_err(format!("cannot open log file {}: {err}", path.display()))
            })?;
        }
        Ok(self
            .session
            .open(Native::load(None), serial, firmware.as_deref()))
    }

    fn close(&mut self) -> i64 {
        self.session.close()
    }

    fn is_open(&self) -> bool {
        self.session.is_open()
    }

    fn reset_device(&mut self) -> PyResult<i64> {
        Ok(self.opened()?.reset_device().into_status())
    }

    #[pyo3(signature = (address, value, send_now=true))]
    fn set_wire_in(&mut self, address: u32, value: u32, send_now: bool) -> PyResult<i64> {
        Ok(self.opened()?.set_wire_in(address, value, send_now).into_status())
    }

    #[pyo3(signature = (address, refresh=true))]
    fn get_wire_out(&mut self, address: u32, refresh: bool) -> PyResult<i64> {
        Ok(self.opened()?.get_wire_out(address, refresh).into_status())
    }

    fn write_register(&mut self, address: u32, value: u32) -> PyResult<i64> {
        Ok(self.opened()?.write_register(address, value).into_status())
    }

    fn read_register(&mut self, address: u32) -> PyResult<i64> {
        Ok(self.opened()?.read_register(address).into_status())
    }

    #[pyo3(signature = (address, data, block_size=None))]
    fn write_pipe(&mut self, address: u32, data: Vec<u8>, block_size: Option<usize>) -> PyResult<i64> {
        let device = self.opened()?;
        let block_size = block_size.unwrap_or(device.block_size());
        Ok(device.write_pipe(address, &data, block_size).into_status())
    }

    /// Fills `data` in place; its length is the number of bytes requested.
    /// Only the bytes actually read are stored.
    #[pyo3(signature = (address, data, block_size=None))]
    fn read_pipe(
        &mut self,
        address: u32,
        data: &Bound<'_, PyList>,
        block_size: Option<usize>,
    ) -> PyResult<i64> {
        let (status, bytes) = self
            .session
            .read_pipe(address, data.len(), block_size)
            .ok_or_else(|| PyIOError::new_err("Device not opened."))?;
        for (index, byte) in bytes.into_iter().enumerate() {
            data.set_item(index, byte)?;
        }
        Ok(status)
    }

    /// Timeout in milliseconds.
    fn set_timeout(&mut self, timeout_ms: u32) -> PyResult<i64> {
        let timeout = std::time::Duration::from_millis(u64::from(timeout_ms));
        Ok(self.opened()?.set_timeout(timeout).into_status())
    }

    fn set_device_id(&mut self, device_id: &str) -> PyResult<i64> {
        Ok(self.opened()?.set_device_id(device_id).into_status())
    }

    fn get_device_id(&mut self) -> PyResult<String> {
        Ok(self.opened()?.get_device_id().unwrap_or_default())
    }

    fn set_close_on_failure(&mut self, enabled: bool) -> PyResult<()> {
        self.opened()?.set_close_on_failure(enabled);
        Ok(())
    }

    #[getter]
    fn serial(&self) -> String {
        self.cached(Device::serial)
    }

    #[getter(device_id)]
    fn cached_device_id(&self) -> String {
        self.cached(Device::device_id)
    }

    #[getter]
    fn firmware_version(&self) -> String {
        self.cached(Device::firmware_version)
    }

    #[getter]
    fn is_usb3_speed(&self) -> bool {
        self.session.device().is_some_and(Device::is_usb3_speed)
    }

    #[getter]
    fn last_error(&self) -> String {
        self.session.last_error()
    }

    #[staticmethod]
    fn library_date() -> String {
        ffi::library_date().unwrap_or_default().to_string()
    }

    /// Levels: 0 fatal, 1 error, 2 message, 3 debug.
    fn log(&self, level: i32, text: &str) {
        self.session.log(level, text);
    }
}

fn list_attached() -> Vec<Vec<String>> {
    match Native::load(None) {
        Ok(backend) => script::device_rows(&backend),
        Err(_) => Vec::new(),
    }
}

#[pyfunction]
#[pyo3(signature = (path=None))]
fn load_library(path: Option<PathBuf>) -> i32 {
    status::load_front_panel_library(path.as_deref())
}

#[pyfunction]
fn list_devices() -> Vec<Vec<String>> {
    list_attached()
}

#[pyfunction]
fn device_id(serial: &str) -> String {
    match Native::load(None) {
        Ok(backend) => enumerate::device_id(&backend, serial),
        Err(_) => String::new(),
    }
}

#[pymodule]
fn py_fp(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyDevice>()?;
    m.add_function(wrap_pyfunction!(load_library, m)?)?;
    m.add_function(wrap_pyfunction!(list_devices, m)?)?;
    m.add_function(wrap_pyfunction!(device_id, m)?)?;
    Ok(())
}
