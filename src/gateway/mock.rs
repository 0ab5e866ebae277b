//! In-memory FrontPanel backend for tests and board-less development.
//!
//! A [`MockBackend`] owns a shared bus of [`MockBoard`]s. Every handle it
//! creates sees the same boards, so state written through one session is
//! visible to the next, as it would be on real hardware. Each board loops
//! its pipes back (bytes written to any pipe-in are returned by the next
//! pipe-out read) and mirrors committed wire-in `n` on wire-out `0x20 + n`.

use super::{Backend, FrontPanel, HardwareInfo, SdkResult, UsbSpeed};
use crate::constants::WIRE_OUT_BASE;
use crate::error::{Error, SdkError};
use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

const WIRE_COUNT: usize = 32;

#[derive(Debug, Clone)]
pub struct MockBoard {
    pub serial: String,
    pub device_id: String,
    pub major_version: i32,
    pub minor_version: i32,
    pub usb_speed: UsbSpeed,
    /// If false, `open_by_serial` fails for this board.
    pub openable: bool,
    /// Cleared to simulate the cable being pulled while a handle is open.
    pub connected: bool,
    pub front_panel_enabled: bool,
    /// If false, the device-info query fails.
    pub info_available: bool,
    pub reject_bitstream: bool,
    pub bitstream: Option<PathBuf>,
    pub pll_loaded: bool,
    pub resets: usize,
    pub wire_ins: [u32; WIRE_COUNT],
    pub registers: HashMap<u32, u32>,
    pub loopback: VecDeque<u8>,
    pub open_handles: usize,
}

impl MockBoard {
    pub fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            device_id: format!("board-{serial}"),
            major_version: 1,
            minor_version: 24,
            usb_speed: UsbSpeed::Super,
            openable: true,
            connected: true,
            front_panel_enabled: true,
            info_available: true,
            reject_bitstream: false,
            bitstream: None,
            pll_loaded: false,
            resets: 0,
            wire_ins: [0; WIRE_COUNT],
            registers: HashMap::new(),
            loopback: VecDeque::new(),
            open_handles: 0,
        }
    }

    pub fn with_device_id(mut self, device_id: &str) -> Self {
        self.device_id = device_id.to_string();
        self
    }

    pub fn with_usb_speed(mut self, speed: UsbSpeed) -> Self {
        self.usb_speed = speed;
        self
    }

    pub fn with_firmware(mut self, major: i32, minor: i32) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    pub fn unopenable(mut self) -> Self {
        self.openable = false;
        self
    }

    pub fn front_panel_disabled(mut self) -> Self {
        self.front_panel_enabled = false;
        self
    }

    pub fn without_device_info(mut self) -> Self {
        self.info_available = false;
        self
    }

    pub fn rejecting_bitstreams(mut self) -> Self {
        self.reject_bitstream = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    In,
    Out,
}

/// A block-pipe call as issued to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeCall {
    pub direction: PipeDirection,
    pub address: u32,
    pub block_size: usize,
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct MockBus {
    pub boards: Vec<MockBoard>,
    pub live_handles: usize,
    pub pipe_calls: Vec<PipeCall>,
    /// Returned by the next control-plane call of any handle, then cleared.
    pub fail_next: Option<SdkError>,
    /// Caps the byte count of the next pipe-out read, then cleared.
    pub short_read: Option<usize>,
    /// Last timeout any handle passed to `set_timeout`.
    pub last_timeout_ms: Option<u32>,
    pub unavailable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    bus: Rc<RefCell<MockBus>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(self, board: MockBoard) -> Self {
        self.bus.borrow_mut().boards.push(board);
        self
    }

    /// A backend whose library failed to load; every handle request fails.
    pub fn unavailable() -> Self {
        let backend = Self::default();
        backend.bus.borrow_mut().unavailable = true;
        backend
    }

    pub fn bus(&self) -> RefMut<'_, MockBus> {
        self.bus.borrow_mut()
    }

    pub fn board(&self, serial: &str) -> Option<MockBoard> {
        self.bus
            .borrow()
            .boards
            .iter()
            .find(|board| board.serial == serial)
            .cloned()
    }

    pub fn with_board_mut<R>(&self, serial: &str, f: impl FnOnce(&mut MockBoard) -> R) -> Option<R> {
        self.bus
            .borrow_mut()
            .boards
            .iter_mut()
            .find(|board| board.serial == serial)
            .map(f)
    }

    pub fn fail_next(&self, err: SdkError) {
        self.bus.borrow_mut().fail_next = Some(err);
    }

    pub fn short_read_next(&self, count: usize) {
        self.bus.borrow_mut().short_read = Some(count);
    }

    pub fn last_timeout_ms(&self) -> Option<u32> {
        self.bus.borrow().last_timeout_ms
    }

    pub fn live_handles(&self) -> usize {
        self.bus.borrow().live_handles
    }

    pub fn pipe_calls(&self) -> Vec<PipeCall> {
        self.bus.borrow().pipe_calls.clone()
    }
}

impl Backend for MockBackend {
    type Handle = MockHandle;

    fn create_handle(&self) -> Result<MockHandle, Error> {
        let mut bus = self.bus.borrow_mut();
        if bus.unavailable {
            return Err(Error::LibraryNotFound);
        }
        bus.live_handles += 1;
        Ok(MockHandle {
            bus: Rc::clone(&self.bus),
            board: None,
            staged: [0; WIRE_COUNT],
            wire_outs: [0; WIRE_COUNT],
            timeout_ms: None,
        })
    }

    fn library_date(&self) -> Option<String> {
        if self.bus.borrow().unavailable {
            None
        } else {
            Some("Jan  1 2024 00:00:00".to_string())
        }
    }
}

#[derive(Debug)]
pub struct MockHandle {
    bus: Rc<RefCell<MockBus>>,
    board: Option<usize>,
    staged: [u32; WIRE_COUNT],
    wire_outs: [u32; WIRE_COUNT],
    timeout_ms: Option<u32>,
}

impl MockHandle {
    pub fn timeout_ms(&self) -> Option<u32> {
        self.timeout_ms
    }

    /// Runs `f` against the opened board after consuming any injected failure.
    fn with_board<T>(&self, f: impl FnOnce(&mut MockBus, usize) -> SdkResult<T>) -> SdkResult<T> {
        let index = self.board.ok_or(SdkError::DeviceNotOpen)?;
        let mut bus = self.bus.borrow_mut();
        if let Some(err) = bus.fail_next.take() {
            return Err(err);
        }
        if !bus.boards[index].connected {
            return Err(SdkError::DeviceNotOpen);
        }
        f(&mut bus, index)
    }

    fn wire_index(address: u32, base: u32) -> SdkResult<usize> {
        address
            .checked_sub(base)
            .map(|offset| offset as usize)
            .filter(|&offset| offset < WIRE_COUNT)
            .ok_or(SdkError::InvalidEndpoint)
    }
}

fn check_block(block_size: usize, len: usize) -> SdkResult<()> {
    if block_size == 0 || len % block_size != 0 {
        return Err(SdkError::InvalidBlockSize);
    }
    Ok(())
}

impl FrontPanel for MockHandle {
    fn device_count(&mut self) -> usize {
        self.bus.borrow().boards.len()
    }

    fn device_list_serial(&mut self, index: usize) -> String {
        self.bus
            .borrow()
            .boards
            .get(index)
            .map(|board| board.serial.clone())
            .unwrap_or_default()
    }

    fn open_by_serial(&mut self, serial: &str) -> SdkResult<()> {
        if self.board.is_some() {
            self.close();
        }
        let mut bus = self.bus.borrow_mut();
        let index = bus
            .boards
            .iter()
            .position(|board| board.serial == serial && board.openable && board.connected)
            .ok_or(SdkError::DeviceNotOpen)?;
        bus.boards[index].open_handles += 1;
        self.board = Some(index);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.board
            .is_some_and(|index| self.bus.borrow().boards[index].connected)
    }

    fn close(&mut self) {
        if let Some(index) = self.board.take() {
            let mut bus = self.bus.borrow_mut();
            bus.boards[index].open_handles -= 1;
        }
    }

    fn device_info(&mut self) -> SdkResult<HardwareInfo> {
        let index = self.board.ok_or(SdkError::DeviceNotOpen)?;
        let bus = self.bus.borrow();
        let board = &bus.boards[index];
        if !board.info_available {
            return Err(SdkError::CommunicationError);
        }
        Ok(HardwareInfo {
            device_id: board.device_id.clone(),
            serial: board.serial.clone(),
            major_version: board.major_version,
            minor_version: board.minor_version,
            usb_speed: board.usb_speed,
        })
    }

    fn is_front_panel_enabled(&mut self) -> bool {
        self.board
            .is_some_and(|index| self.bus.borrow().boards[index].front_panel_enabled)
    }

    fn load_default_pll_configuration(&mut self) -> SdkResult<()> {
        self.with_board(|bus, index| {
            bus.boards[index].pll_loaded = true;
            Ok(())
        })
    }

    fn configure_fpga(&mut self, bitstream: &Path) -> SdkResult<()> {
        self.with_board(|bus, index| {
            let board = &mut bus.boards[index];
            if !bitstream.is_file() {
                return Err(SdkError::FileError);
            }
            if board.reject_bitstream {
                return Err(SdkError::InvalidBitstream);
            }
            board.bitstream = Some(bitstream.to_path_buf());
            Ok(())
        })
    }

    fn set_wire_in_value(&mut self, address: u32, value: u32, mask: u32) -> SdkResult<()> {
        let slot = Self::wire_index(address, 0)?;
        self.with_board(|_, _| Ok(()))?;
        self.staged[slot] = (self.staged[slot] & !mask) | (value & mask);
        Ok(())
    }

    fn update_wire_ins(&mut self) -> SdkResult<()> {
        let staged = self.staged;
        self.with_board(|bus, index| {
            bus.boards[index].wire_ins = staged;
            Ok(())
        })
    }

    fn update_wire_outs(&mut self) -> SdkResult<()> {
        let snapshot = self.with_board(|bus, index| Ok(bus.boards[index].wire_ins))?;
        self.wire_outs = snapshot;
        Ok(())
    }

    fn get_wire_out_value(&mut self, address: u32) -> u32 {
        Self::wire_index(address, WIRE_OUT_BASE)
            .map(|slot| self.wire_outs[slot])
            .unwrap_or(0)
    }

    fn write_register(&mut self, address: u32, value: u32) -> SdkResult<()> {
        self.with_board(|bus, index| {
            bus.boards[index].registers.insert(address, value);
            Ok(())
        })
    }

    fn read_register(&mut self, address: u32) -> SdkResult<u32> {
        self.with_board(|bus, index| {
            Ok(bus.boards[index]
                .registers
                .get(&address)
                .copied()
                .unwrap_or(0))
        })
    }

    fn write_to_block_pipe_in(
        &mut self,
        address: u32,
        block_size: usize,
        data: &[u8],
    ) -> SdkResult<usize> {
        self.with_board(|bus, index| {
            bus.pipe_calls.push(PipeCall {
                direction: PipeDirection::In,
                address,
                block_size,
                len: data.len(),
            });
            check_block(block_size, data.len())?;
            bus.boards[index].loopback.extend(data.iter().copied());
            Ok(data.len())
        })
    }

    fn read_from_block_pipe_out(
        &mut self,
        address: u32,
        block_size: usize,
        data: &mut [u8],
    ) -> SdkResult<usize> {
        self.with_board(|bus, index| {
            bus.pipe_calls.push(PipeCall {
                direction: PipeDirection::Out,
                address,
                block_size,
                len: data.len(),
            });
            check_block(block_size, data.len())?;
            let len = bus
                .short_read
                .take()
                .map_or(data.len(), |count| count.min(data.len()));
            let loopback = &mut bus.boards[index].loopback;
            if loopback.len() < len {
                return Err(SdkError::Timeout);
            }
            for (dst, src) in data.iter_mut().zip(loopback.drain(..len)) {
                *dst = src;
            }
            Ok(len)
        })
    }

    fn set_timeout(&mut self, timeout_ms: u32) {
        self.timeout_ms = Some(timeout_ms);
        if self.board.is_some() {
            self.bus.borrow_mut().last_timeout_ms = Some(timeout_ms);
        }
    }

    fn reset_fpga(&mut self) -> SdkResult<()> {
        self.with_board(|bus, index| {
            let board = &mut bus.boards[index];
            board.resets += 1;
            board.wire_ins = [0; WIRE_COUNT];
            board.loopback.clear();
            Ok(())
        })
    }

    fn set_device_id(&mut self, device_id: &str) {
        if let Some(index) = self.board {
            self.bus.borrow_mut().boards[index].device_id = device_id.to_string();
        }
    }

    fn get_device_id(&mut self) -> String {
        self.board
            .map(|index| self.bus.borrow().boards[index].device_id.clone())
            .unwrap_or_default()
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.close();
        self.bus.borrow_mut().live_handles -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_counted_until_dropped() {
        let backend = MockBackend::new().with_board(MockBoard::new("A"));
        let mut handle = backend.create_handle().unwrap();
        handle.open_by_serial("A").unwrap();
        assert_eq!(backend.live_handles(), 1);
        assert_eq!(backend.board("A").unwrap().open_handles, 1);
        drop(handle);
        assert_eq!(backend.live_handles(), 0);
        assert_eq!(backend.board("A").unwrap().open_handles, 0);
    }

    #[test]
    fn wire_outs_mirror_committed_wire_ins() {
        let backend = MockBackend::new().with_board(MockBoard::new("A"));
        let mut handle = backend.create_handle().unwrap();
        handle.open_by_serial("A").unwrap();
        handle.set_wire_in_value(0x03, 0xcafe, u32::MAX).unwrap();
        handle.update_wire_outs().unwrap();
        assert_eq!(handle.get_wire_out_value(0x23), 0);
        handle.update_wire_ins().unwrap();
        handle.update_wire_outs().unwrap();
        assert_eq!(handle.get_wire_out_value(0x23), 0xcafe);
    }

    #[test]
    fn pipes_reject_unaligned_lengths() {
        let backend = MockBackend::new().with_board(MockBoard::new("A"));
        let mut handle = backend.create_handle().unwrap();
        handle.open_by_serial("A").unwrap();
        assert_eq!(
            handle.write_to_block_pipe_in(0x80, 16, &[0u8; 20]),
            Err(SdkError::InvalidBlockSize)
        );
        assert_eq!(handle.write_to_block_pipe_in(0x80, 16, &[7u8; 32]), Ok(32));
        let mut out = [0u8; 16];
        assert_eq!(handle.read_from_block_pipe_out(0xa0, 16, &mut out), Ok(16));
        assert_eq!(out, [7u8; 16]);
    }

    #[test]
    fn injected_failure_is_consumed_once() {
        let backend = MockBackend::new().with_board(MockBoard::new("A"));
        let mut handle = backend.create_handle().unwrap();
        handle.open_by_serial("A").unwrap();
        backend.fail_next(SdkError::Failed);
        assert_eq!(handle.write_register(1, 2), Err(SdkError::Failed));
        assert_eq!(handle.write_register(1, 2), Ok(()));
    }

    #[test]
    fn short_read_caps_one_transfer() {
        let backend = MockBackend::new().with_board(MockBoard::new("A"));
        let mut handle = backend.create_handle().unwrap();
        handle.open_by_serial("A").unwrap();
        handle.write_to_block_pipe_in(0x80, 16, &[3u8; 32]).unwrap();
        backend.short_read_next(8);
        let mut out = [0u8; 16];
        assert_eq!(handle.read_from_block_pipe_out(0xa0, 16, &mut out), Ok(8));
        assert_eq!(out[..8], [3u8; 8]);
        assert_eq!(out[8..], [0u8; 8]);
        assert_eq!(handle.read_from_block_pipe_out(0xa0, 16, &mut out), Ok(16));
    }

    #[test]
    fn unavailable_backend_refuses_handles() {
        let backend = MockBackend::unavailable();
        assert!(matches!(backend.create_handle(), Err(Error::LibraryNotFound)));
        assert_eq!(backend.library_date(), None);
    }
}
