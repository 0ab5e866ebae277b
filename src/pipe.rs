//! Block-pipe transfers of arbitrary length.
//!
//! `WriteToBlockPipeIn` and `ReadFromBlockPipeOut` only accept lengths that
//! are a multiple of the block size. These helpers pad short or ragged
//! transfers up to the next block boundary through a zero-filled scratch
//! buffer, so callers can move exactly the bytes they have. Each call maps
//! to exactly one gateway transfer; nothing is split.

use crate::error::SdkError;
use crate::gateway::{FrontPanel, SdkResult};

/// Smallest block multiple that holds `size` bytes, never less than one block.
pub fn padded_len(size: usize, block_size: usize) -> usize {
    size.div_ceil(block_size).max(1) * block_size
}

pub fn write_pipe<H: FrontPanel + ?Sized>(
    handle: &mut H,
    address: u32,
    data: &[u8],
    block_size: usize,
) -> SdkResult<usize> {
    if block_size == 0 {
        return Err(SdkError::InvalidBlockSize);
    }
    if data.len() % block_size == 0 {
        return handle.write_to_block_pipe_in(address, block_size, data);
    }

    let mut padded = vec![0u8; padded_len(data.len(), block_size)];
    padded[..data.len()].copy_from_slice(data);
    log::trace!(
        "pipe {address:#04x}: padding write of {} bytes to {}",
        data.len(),
        padded.len()
    );
    handle.write_to_block_pipe_in(address, block_size, &padded)
}

/// Fills `dst` from pipe-out `address`.
///
/// For a padded read the full padded transfer must succeed before anything
/// is copied; on success the reported count is `dst.len()`. A short count
/// or an error from the gateway is returned unchanged and `dst` is not
/// written.
pub fn read_pipe<H: FrontPanel + ?Sized>(
    handle: &mut H,
    address: u32,
    dst: &mut [u8],
    block_size: usize,
) -> SdkResult<usize> {
    if block_size == 0 {
        return Err(SdkError::InvalidBlockSize);
    }
    if dst.len() % block_size == 0 {
        return handle.read_from_block_pipe_out(address, block_size, dst);
    }

    let mut padded = vec![0u8; padded_len(dst.len(), block_size)];
    log::trace!(
        "pipe {address:#04x}: padding read of {} bytes to {}",
        dst.len(),
        padded.len()
    );
    let count = handle.read_from_block_pipe_out(address, block_size, &mut padded)?;
    if count != padded.len() {
        return Ok(count);
    }
    dst.copy_from_slice(&padded[..dst.len()]);
    Ok(dst.len())
}
