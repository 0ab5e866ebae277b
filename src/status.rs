//! Numeric status codes for callers that cannot carry a `Result`.
//!
//! Scripting surfaces and the command-line tool report every outcome as a
//! single integer. Actions return 0 or a negative code. Reads return the
//! value zero-extended to `i64`, or a negative code, so both fit in one
//! channel.

use crate::error::Result;
use crate::ffi::Native;
use std::path::Path;

pub trait IntoStatus {
    fn into_status(self) -> i64;
}

impl IntoStatus for Result<()> {
    fn into_status(self) -> i64 {
        match self {
            Ok(()) => 0,
            Err(err) => i64::from(err.code()),
        }
    }
}

impl IntoStatus for Result<u32> {
    fn into_status(self) -> i64 {
        match self {
            Ok(value) => i64::from(value),
            Err(err) => i64::from(err.code()),
        }
    }
}

impl IntoStatus for Result<usize> {
    fn into_status(self) -> i64 {
        match self {
            Ok(count) => i64::try_from(count).unwrap_or(i64::MAX),
            Err(err) => i64::from(err.code()),
        }
    }
}

/// Loads the FrontPanel library; 0 on success, `LIBRARY_NOT_FOUND` otherwise.
pub fn load_front_panel_library(path: Option<&Path>) -> i32 {
    match Native::load(path) {
        Ok(_) => 0,
        Err(err) => err.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, SdkError};

    #[test]
    fn actions_collapse_to_zero_or_code() {
        assert_eq!(Result::<()>::Ok(()).into_status(), 0);
        assert_eq!(Result::<()>::Err(Error::NotConnected).into_status(), -105);
        assert_eq!(Result::<()>::Err(Error::Sdk(SdkError::Failed)).into_status(), -1);
    }

    #[test]
    fn reads_keep_full_u32_range() {
        assert_eq!(Result::<u32>::Ok(0xdead_beef).into_status(), 0xdead_beef);
        assert_eq!(Result::<u32>::Ok(u32::MAX).into_status(), 4_294_967_295);
        assert_eq!(Result::<u32>::Err(Error::NotConnected).into_status(), -105);
    }

    #[test]
    fn counts_collapse_to_i64() {
        assert_eq!(Result::<usize>::Ok(2048).into_status(), 2048);
        assert_eq!(Result::<usize>::Err(Error::Sdk(SdkError::FileError)).into_status(), -7);
    }

    #[test]
    fn missing_library_loads_as_not_found() {
        if crate::ffi::library_date().is_none() {
            assert_eq!(
                load_front_panel_library(Some(Path::new("/nonexistent/libokFrontPanel.so"))),
                Error::LIBRARY_NOT_FOUND
            );
        }
    }
}
