//! # fpdev
//!
//! Session adapter for Opal Kelly FrontPanel FPGA boards. The crate wraps the
//! vendor's FrontPanel SDK behind a single stateful [`Device`] that opens a
//! board by serial number, optionally loads a bitstream, and then talks to
//! the FPGA design through wire-ins/wire-outs, the register bus, and block
//! pipes of any length. The following example loads the SDK, opens a board,
//! and performs a small pipe round-trip:
//!
//! ```no_run
//! use std::path::Path;
//! use fpdev::{Device, Native, Result};
//!
//! fn main() -> Result<()> {
//!     // Resolve the SDK once per process; later loads are no-ops.
//!     let backend = Native::load(None)?;
//!
//!     let mut device = Device::new(backend);
//!     device.open("1740000JJK", Some(Path::new("loopback.bit")))?;
//!
//!     // Stage two control words and latch them with the second call.
//!     device.set_wire_in(0x00, 0x0000_0001, false)?;
//!     device.set_wire_in(0x01, 0x0000_0400, true)?;
//!
//!     // 1500 bytes are padded to two 1024-byte blocks on the way out and
//!     // trimmed back on the way in.
//!     let tx = vec![0xa5u8; 1500];
//!     let mut rx = vec![0u8; 1500];
//!     device.write_pipe(0x80, &tx, 1024)?;
//!     device.read_pipe(0xa0, &mut rx, 1024)?;
//!
//!     device.close();
//!     Ok(())
//! }
//! ```
//!
//! Boards can be listed without opening a session:
//!
//! ```no_run
//! use fpdev::{Native, Result, enumerate};
//!
//! fn main() -> Result<()> {
//!     let backend = Native::load(None)?;
//!     for info in enumerate::list_devices(&backend) {
//!         println!("{} {}", info.serial, info.device_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Both examples are tagged with `no_run`, so they compile during `cargo test`
//! but do not touch live hardware. Tests run against
//! [`gateway::mock::MockBackend`] instead.
pub mod constants;
pub mod enumerate;
pub mod ffi;
pub mod gateway;
pub mod logfile;
pub mod pipe;
pub mod script;
pub mod status;

mod config;
mod device;
mod error;
#[cfg(feature = "python")]
mod python;

pub use config::SessionConfig;
pub use device::Device;
pub use error::{Error, Result, SdkError};
pub use ffi::Native;
pub use gateway::{Backend, DeviceInfo, FrontPanel, HardwareInfo, UsbSpeed};
pub use status::IntoStatus;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{MockBackend, MockBoard};

    #[test]
    fn device_is_created_closed() {
        let device = Device::new(MockBackend::new());
        assert!(!device.is_open());
        assert_eq!(device.serial(), "");
    }

    #[test]
    fn config_block_size_reaches_device() {
        let mut config = SessionConfig::new();
        config.set_block_size(512);
        let device = Device::with_config(MockBackend::new(), config);
        assert_eq!(device.block_size(), 512);
    }

    #[test]
    fn library_date_comes_from_backend() {
        let device = Device::new(MockBackend::new().with_board(MockBoard::new("A")));
        assert_eq!(device.library_date().as_deref(), Some("Jan  1 2024 00:00:00"));
        let device = Device::new(MockBackend::unavailable());
        assert_eq!(device.library_date(), None);
    }
}
