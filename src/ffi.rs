//! Native FrontPanel backend, bound at run time to the vendor's shared library.
//!
//! The library is opened once per process with `libloading` and every
//! `okFrontPanel_*` entry point the adapter needs is resolved up front, so a
//! missing symbol is reported as [`Error::LibraryNotFound`] at load time
//! rather than in the middle of a session.

use crate::constants;
use crate::error::{Error, SdkError};
use crate::gateway::{Backend, FrontPanel, HardwareInfo, SdkResult, UsbSpeed};
use libloading::Library;
use std::ffi::{CStr, CString, OsStr, c_char, c_int, c_long, c_uint, c_ulong, c_void};
use std::path::Path;
use std::sync::OnceLock;

type RawHandle = *mut c_void;

/// Leading fields of `okTDeviceInfo`. The SDK appends capability fields
/// that grow between releases; `reserved` leaves room for them.
#[repr(C)]
#[allow(dead_code)]
struct RawDeviceInfo {
    device_id: [c_char; constants::MAX_DEVICE_ID_LENGTH + 1],
    serial_number: [c_char; constants::MAX_SERIAL_LENGTH + 1],
    product_name: [c_char; 128],
    product_id: c_int,
    device_interface: c_int,
    usb_speed: c_int,
    device_major_version: c_int,
    device_minor_version: c_int,
    host_interface_major_version: c_int,
    host_interface_minor_version: c_int,
    reserved: [u8; 1024],
}

struct Api {
    get_version: unsafe extern "C" fn(*mut c_char, *mut c_char),
    construct: unsafe extern "C" fn() -> RawHandle,
    destruct: unsafe extern "C" fn(RawHandle),
    get_device_count: unsafe extern "C" fn(RawHandle) -> c_int,
    get_device_list_serial: unsafe extern "C" fn(RawHandle, c_int, *mut c_char),
    open_by_serial: unsafe extern "C" fn(RawHandle, *const c_char) -> c_int,
    is_open: unsafe extern "C" fn(RawHandle) -> c_int,
    close: unsafe extern "C" fn(RawHandle),
    get_device_info: unsafe extern "C" fn(RawHandle, *mut RawDeviceInfo) -> c_int,
    is_front_panel_enabled: unsafe extern "C" fn(RawHandle) -> c_int,
    load_default_pll_configuration: unsafe extern "C" fn(RawHandle) -> c_int,
    configure_fpga: unsafe extern "C" fn(RawHandle, *const c_char) -> c_int,
    set_wire_in_value: unsafe extern "C" fn(RawHandle, c_int, c_ulong, c_ulong) -> c_int,
    update_wire_ins: unsafe extern "C" fn(RawHandle) -> c_int,
    update_wire_outs: unsafe extern "C" fn(RawHandle) -> c_int,
    get_wire_out_value: unsafe extern "C" fn(RawHandle, c_int) -> c_ulong,
    write_register: unsafe extern "C" fn(RawHandle, c_uint, c_uint) -> c_int,
    read_register: unsafe extern "C" fn(RawHandle, c_uint, *mut c_uint) -> c_int,
    write_to_block_pipe_in: unsafe extern "C" fn(RawHandle, c_int, c_int, c_long, *const u8) -> c_long,
    read_from_block_pipe_out: unsafe extern "C" fn(RawHandle, c_int, c_int, c_long, *mut u8) -> c_long,
    set_timeout: unsafe extern "C" fn(RawHandle, c_int),
    reset_fpga: unsafe extern "C" fn(RawHandle) -> c_int,
    set_device_id: unsafe extern "C" fn(RawHandle, *const c_char),
    get_device_id: unsafe extern "C" fn(RawHandle, *mut c_char),
}

fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T, Error> {
    // SAFETY: every caller assigns the symbol to an `Api` field whose type
    // mirrors the prototype in okFrontPanelDLL.h.
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|err| {
        log::debug!("FrontPanel symbol {name} missing: {err}");
        Error::LibraryNotFound
    })?;
    Ok(*symbol)
}

impl Api {
    fn resolve(library: &Library) -> Result<Self, Error> {
        Ok(Self {
            get_version: symbol(library, "okFrontPanelDLL_GetVersion")?,
            construct: symbol(library, "okFrontPanel_Construct")?,
            destruct: symbol(library, "okFrontPanel_Destruct")?,
            get_device_count: symbol(library, "okFrontPanel_GetDeviceCount")?,
            get_device_list_serial: symbol(library, "okFrontPanel_GetDeviceListSerial")?,
            open_by_serial: symbol(library, "okFrontPanel_OpenBySerial")?,
            is_open: symbol(library, "okFrontPanel_IsOpen")?,
            close: symbol(library, "okFrontPanel_Close")?,
            get_device_info: symbol(library, "okFrontPanel_GetDeviceInfo")?,
            is_front_panel_enabled: symbol(library, "okFrontPanel_IsFrontPanelEnabled")?,
            load_default_pll_configuration: symbol(library, "okFrontPanel_LoadDefaultPLLConfiguration")?,
            configure_fpga: symbol(library, "okFrontPanel_ConfigureFPGA")?,
            set_wire_in_value: symbol(library, "okFrontPanel_SetWireInValue")?,
            update_wire_ins: symbol(library, "okFrontPanel_UpdateWireIns")?,
            update_wire_outs: symbol(library, "okFrontPanel_UpdateWireOuts")?,
            get_wire_out_value: symbol(library, "okFrontPanel_GetWireOutValue")?,
            write_register: symbol(library, "okFrontPanel_WriteRegister")?,
            read_register: symbol(library, "okFrontPanel_ReadRegister")?,
            write_to_block_pipe_in: symbol(library, "okFrontPanel_WriteToBlockPipeIn")?,
            read_from_block_pipe_out: symbol(library, "okFrontPanel_ReadFromBlockPipeOut")?,
            set_timeout: symbol(library, "okFrontPanel_SetTimeout")?,
            reset_fpga: symbol(library, "okFrontPanel_ResetFPGA")?,
            set_device_id: symbol(library, "okFrontPanel_SetDeviceID")?,
            get_device_id: symbol(library, "okFrontPanel_GetDeviceID")?,
        })
    }
}

pub struct FrontPanelLibrary {
    api: Api,
    date: String,
    // Keeps the resolved function pointers valid for the life of the process.
    _library: Library,
}

static LIBRARY: OnceLock<FrontPanelLibrary> = OnceLock::new();

impl FrontPanelLibrary {
    fn open(path: Option<&Path>) -> Result<Self, Error> {
        let name = path.map_or(OsStr::new(constants::LIBRARY_NAME), Path::as_os_str);
        // SAFETY: loading runs the SDK's initialisers, which have no
        // preconditions beyond being called from a live process.
        let library = unsafe { Library::new(name) }.map_err(|err| {
            log::debug!("cannot load {}: {err}", name.to_string_lossy());
            Error::LibraryNotFound
        })?;
        let api = Api::resolve(&library)?;

        let mut date = [0 as c_char; constants::VERSION_STRING_LENGTH];
        let mut time = [0 as c_char; constants::VERSION_STRING_LENGTH];
        // SAFETY: both buffers have the size the SDK documents for GetVersion.
        unsafe { (api.get_version)(date.as_mut_ptr(), time.as_mut_ptr()) };
        let date = format!("{} {}", from_c_buf(&date), from_c_buf(&time));

        Ok(Self {
            api,
            date,
            _library: library,
        })
    }
}

/// Backend over the process-wide FrontPanel library.
#[derive(Clone, Copy)]
pub struct Native {
    library: &'static FrontPanelLibrary,
}

impl Native {
    /// Loads the SDK from `path`, or from the platform's default library name.
    ///
    /// Once a load has succeeded, later calls return the same library and
    /// ignore `path`.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        if let Some(library) = LIBRARY.get() {
            return Ok(Self { library });
        }
        let library = FrontPanelLibrary::open(path)?;
        log::info!("loaded FrontPanel library built {}", library.date);
        Ok(Self {
            library: LIBRARY.get_or_init(|| library),
        })
    }

    /// The already-loaded library.
    pub fn get() -> Result<Self, Error> {
        LIBRARY
            .get()
            .map(|library| Self { library })
            .ok_or(Error::LibraryNotFound)
    }
}

/// Build date and time of the loaded SDK.
pub fn library_date() -> Option<&'static str> {
    LIBRARY.get().map(|library| library.date.as_str())
}

impl Backend for Native {
    type Handle = NativeHandle;

    fn create_handle(&self) -> Result<NativeHandle, Error> {
        // SAFETY: Construct takes no arguments and returns an owned handle.
        let raw = unsafe { (self.library.api.construct)() };
        if raw.is_null() {
            return Err(Error::Sdk(SdkError::Failed));
        }
        Ok(NativeHandle {
            api: &self.library.api,
            raw,
        })
    }

    fn library_date(&self) -> Option<String> {
        Some(self.library.date.clone())
    }
}

/// An owned `okCFrontPanel` object, destructed on drop.
pub struct NativeHandle {
    api: &'static Api,
    raw: RawHandle,
}

// SAFETY: the SDK object is not tied to the thread that created it; the
// handle is only ever used through `&mut self`, so it is never shared.
unsafe impl Send for NativeHandle {}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        // SAFETY: `raw` came from Construct and is destructed exactly once.
        unsafe { (self.api.destruct)(self.raw) };
    }
}

fn from_c_buf(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf.iter().map(|&c| c as u8).collect();
    match CStr::from_bytes_until_nul(&bytes) {
        Ok(text) => text.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

fn to_c_long(value: usize) -> SdkResult<c_long> {
    c_long::try_from(value).map_err(|_| SdkError::InvalidParameter)
}

impl FrontPanel for NativeHandle {
    fn device_count(&mut self) -> usize {
        // SAFETY: `raw` is a live handle for the whole lifetime of `self`;
        // the same holds for every call below.
        let count = unsafe { (self.api.get_device_count)(self.raw) };
        usize::try_from(count).unwrap_or(0)
    }

    fn device_list_serial(&mut self, index: usize) -> String {
        let Ok(index) = c_int::try_from(index) else {
            return String::new();
        };
        let mut buf = [0 as c_char; constants::MAX_SERIAL_LENGTH + 1];
        unsafe { (self.api.get_device_list_serial)(self.raw, index, buf.as_mut_ptr()) };
        from_c_buf(&buf)
    }

    fn open_by_serial(&mut self, serial: &str) -> SdkResult<()> {
        let serial = CString::new(serial).map_err(|_| SdkError::InvalidParameter)?;
        SdkError::check(unsafe { (self.api.open_by_serial)(self.raw, serial.as_ptr()) })
    }

    fn is_open(&self) -> bool {
        unsafe { (self.api.is_open)(self.raw) != 0 }
    }

    fn close(&mut self) {
        unsafe { (self.api.close)(self.raw) };
    }

    fn device_info(&mut self) -> SdkResult<HardwareInfo> {
        // SAFETY: okTDeviceInfo is plain data; all-zero is a valid value.
        let mut raw: RawDeviceInfo = unsafe { std::mem::zeroed() };
        SdkError::check(unsafe { (self.api.get_device_info)(self.raw, &mut raw) })?;
        Ok(HardwareInfo {
            device_id: from_c_buf(&raw.device_id),
            serial: from_c_buf(&raw.serial_number),
            major_version: raw.device_major_version,
            minor_version: raw.device_minor_version,
            usb_speed: UsbSpeed::from_raw(raw.usb_speed),
        })
    }

    fn is_front_panel_enabled(&mut self) -> bool {
        unsafe { (self.api.is_front_panel_enabled)(self.raw) != 0 }
    }

    fn load_default_pll_configuration(&mut self) -> SdkResult<()> {
        SdkError::check(unsafe { (self.api.load_default_pll_configuration)(self.raw) })
    }

    fn configure_fpga(&mut self, bitstream: &Path) -> SdkResult<()> {
        let path = bitstream.to_str().ok_or(SdkError::FileError)?;
        let path = CString::new(path).map_err(|_| SdkError::FileError)?;
        SdkError::check(unsafe { (self.api.configure_fpga)(self.raw, path.as_ptr()) })
    }

    fn set_wire_in_value(&mut self, address: u32, value: u32, mask: u32) -> SdkResult<()> {
        let address = c_int::try_from(address).map_err(|_| SdkError::InvalidEndpoint)?;
        SdkError::check(unsafe {
            (self.api.set_wire_in_value)(self.raw, address, c_ulong::from(value), c_ulong::from(mask))
        })
    }

    fn update_wire_ins(&mut self) -> SdkResult<()> {
        SdkError::check(unsafe { (self.api.update_wire_ins)(self.raw) })
    }

    fn update_wire_outs(&mut self) -> SdkResult<()> {
        SdkError::check(unsafe { (self.api.update_wire_outs)(self.raw) })
    }

    fn get_wire_out_value(&mut self, address: u32) -> u32 {
        let Ok(address) = c_int::try_from(address) else {
            return 0;
        };
        // Wire-outs are 32 bits wide; `unsigned long` may be wider.
        unsafe { (self.api.get_wire_out_value)(self.raw, address) as u32 }
    }

    fn write_register(&mut self, address: u32, value: u32) -> SdkResult<()> {
        SdkError::check(unsafe { (self.api.write_register)(self.raw, address, value) })
    }

    fn read_register(&mut self, address: u32) -> SdkResult<u32> {
        let mut value: c_uint = 0;
        SdkError::check(unsafe { (self.api.read_register)(self.raw, address, &mut value) })?;
        Ok(value)
    }

    fn write_to_block_pipe_in(
        &mut self,
        address: u32,
        block_size: usize,
        data: &[u8],
    ) -> SdkResult<usize> {
        let address = c_int::try_from(address).map_err(|_| SdkError::InvalidEndpoint)?;
        let block_size = c_int::try_from(block_size).map_err(|_| SdkError::InvalidBlockSize)?;
        let length = to_c_long(data.len())?;
        let count = unsafe {
            (self.api.write_to_block_pipe_in)(self.raw, address, block_size, length, data.as_ptr())
        };
        SdkError::check_count(i64::from(count))
    }

    fn read_from_block_pipe_out(
        &mut self,
        address: u32,
        block_size: usize,
        data: &mut [u8],
    ) -> SdkResult<usize> {
        let address = c_int::try_from(address).map_err(|_| SdkError::InvalidEndpoint)?;
        let block_size = c_int::try_from(block_size).map_err(|_| SdkError::InvalidBlockSize)?;
        let length = to_c_long(data.len())?;
        let count = unsafe {
            (self.api.read_from_block_pipe_out)(
                self.raw,
                address,
                block_size,
                length,
                data.as_mut_ptr(),
            )
        };
        SdkError::check_count(i64::from(count))
    }

    fn set_timeout(&mut self, timeout_ms: u32) {
        let timeout = c_int::try_from(timeout_ms).unwrap_or(c_int::MAX);
        unsafe { (self.api.set_timeout)(self.raw, timeout) };
    }

    fn reset_fpga(&mut self) -> SdkResult<()> {
        SdkError::check(unsafe { (self.api.reset_fpga)(self.raw) })
    }

    fn set_device_id(&mut self, device_id: &str) {
        let device_id = device_id.split('\0').next().unwrap_or_default();
        let Ok(device_id) = CString::new(device_id) else {
            return;
        };
        unsafe { (self.api.set_device_id)(self.raw, device_id.as_ptr()) };
    }

    fn get_device_id(&mut self) -> String {
        let mut buf = [0 as c_char; constants::MAX_DEVICE_ID_LENGTH + 1];
        unsafe { (self.api.get_device_id)(self.raw, buf.as_mut_ptr()) };
        from_c_buf(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_buffers_stop_at_nul() {
        let mut buf = [0 as c_char; 8];
        for (dst, src) in buf.iter_mut().zip(b"ab\0cd") {
            *dst = *src as c_char;
        }
        assert_eq!(from_c_buf(&buf), "ab");
    }

    #[test]
    fn unterminated_c_buffer_is_taken_whole() {
        let buf = [b'x' as c_char; 4];
        assert_eq!(from_c_buf(&buf), "xxxx");
    }

    #[test]
    fn missing_library_is_reported() {
        let result = Native::load(Some(Path::new("/nonexistent/libokFrontPanel.so")));
        if LIBRARY.get().is_none() {
            assert!(matches!(result, Err(Error::LibraryNotFound)));
            assert!(matches!(Native::get(), Err(Error::LibraryNotFound)));
            assert_eq!(library_date(), None);
        }
    }

    #[test]
    fn device_info_layout_keeps_int_alignment() {
        assert_eq!(std::mem::offset_of!(RawDeviceInfo, product_id), 172);
    }
}
