use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Status codes reported by the FrontPanel SDK (`ok_ErrorCode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkError {
    Failed,
    Timeout,
    DoneNotHigh,
    TransferError,
    CommunicationError,
    InvalidBitstream,
    FileError,
    DeviceNotOpen,
    InvalidEndpoint,
    InvalidBlockSize,
    I2CRestrictedAddress,
    I2CBitError,
    I2CNack,
    I2CUnknownStatus,
    UnsupportedFeature,
    FifoUnderflow,
    FifoOverflow,
    DataAlignmentError,
    InvalidResetProfile,
    InvalidParameter,
    Other(i32),
}

impl SdkError {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::Failed,
            -2 => Self::Timeout,
            -3 => Self::DoneNotHigh,
            -4 => Self::TransferError,
            -5 => Self::CommunicationError,
            -6 => Self::InvalidBitstream,
            -7 => Self::FileError,
            -8 => Self::DeviceNotOpen,
            -9 => Self::InvalidEndpoint,
            -10 => Self::InvalidBlockSize,
            -11 => Self::I2CRestrictedAddress,
            -12 => Self::I2CBitError,
            -13 => Self::I2CNack,
            -14 => Self::I2CUnknownStatus,
            -15 => Self::UnsupportedFeature,
            -16 => Self::FifoUnderflow,
            -17 => Self::FifoOverflow,
            -18 => Self::DataAlignmentError,
            -19 => Self::InvalidResetProfile,
            -20 => Self::InvalidParameter,
            other => Self::Other(other),
        }
    }

    /// Turns a raw `ok_ErrorCode` into a result; `ok_NoError` (0) is success.
    pub fn check(code: i32) -> std::result::Result<(), Self> {
        if code == 0 {
            Ok(())
        } else {
            Err(Self::from_code(code))
        }
    }

    /// Byte counts from the pipe calls are non-negative; anything else is an error code.
    pub fn check_count(count: i64) -> std::result::Result<usize, Self> {
        if count >= 0 {
            usize::try_from(count).map_err(|_| Self::InvalidParameter)
        } else {
            Err(Self::from_code(i32::try_from(count).unwrap_or(i32::MIN)))
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Failed => -1,
            Self::Timeout => -2,
            Self::DoneNotHigh => -3,
            Self::TransferError => -4,
            Self::CommunicationError => -5,
            Self::InvalidBitstream => -6,
            Self::FileError => -7,
            Self::DeviceNotOpen => -8,
            Self::InvalidEndpoint => -9,
            Self::InvalidBlockSize => -10,
            Self::I2CRestrictedAddress => -11,
            Self::I2CBitError => -12,
            Self::I2CNack => -13,
            Self::I2CUnknownStatus => -14,
            Self::UnsupportedFeature => -15,
            Self::FifoUnderflow => -16,
            Self::FifoOverflow => -17,
            Self::DataAlignmentError => -18,
            Self::InvalidResetProfile => -19,
            Self::InvalidParameter => -20,
            Self::Other(code) => *code,
        }
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkError::Other(code) => write!(f, "FrontPanel error {code}"),
            other => write!(f, "FrontPanel error {} ({other:?})", other.code()),
        }
    }
}

impl std::error::Error for SdkError {}

/// Errors surfaced by a [`Device`](crate::Device) session.
///
/// The first six variants are raised by the session itself and carry the
/// fixed negative codes of the adapter ABI (see [`Error::code`]). Everything
/// the SDK reports is passed through untranslated as [`Error::Sdk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    LibraryNotFound,
    AlreadyOpened,
    CannotOpen,
    FpgaConfigFailed(SdkError),
    FrontPanelNotEnabled,
    NotConnected,
    Sdk(SdkError),
}

impl Error {
    pub const LIBRARY_NOT_FOUND: i32 = -100;
    pub const ALREADY_OPENED: i32 = -101;
    pub const CANNOT_OPEN: i32 = -102;
    pub const FPG_CFG_FAILED: i32 = -103;
    pub const FP_NOT_ENABLED: i32 = -104;
    pub const NOT_CONNECTED: i32 = -105;

    pub fn code(&self) -> i32 {
        match self {
            Error::LibraryNotFound => Self::LIBRARY_NOT_FOUND,
            Error::AlreadyOpened => Self::ALREADY_OPENED,
            Error::CannotOpen => Self::CANNOT_OPEN,
            Error::FpgaConfigFailed(_) => Self::FPG_CFG_FAILED,
            Error::FrontPanelNotEnabled => Self::FP_NOT_ENABLED,
            Error::NotConnected => Self::NOT_CONNECTED,
            Error::Sdk(err) => err.code(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LibraryNotFound => write!(f, "FrontPanel library could not be loaded."),
            // "alraedy" is part of the published message set; scripts match on it.
            Error::AlreadyOpened => write!(f, "Cannot open: Device alraedy opened."),
            Error::CannotOpen => write!(f, "Device could not be opened."),
            Error::FpgaConfigFailed(_) => write!(f, "FPG configuration failed."),
            Error::FrontPanelNotEnabled => write!(f, "FrontPanel support is not enabled."),
            Error::NotConnected => write!(f, "Device not connected."),
            Error::Sdk(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FpgaConfigFailed(err) | Error::Sdk(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SdkError> for Error {
    fn from(value: SdkError) -> Self {
        Self::Sdk(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_codes_are_stable() {
        assert_eq!(Error::LibraryNotFound.code(), -100);
        assert_eq!(Error::AlreadyOpened.code(), -101);
        assert_eq!(Error::CannotOpen.code(), -102);
        assert_eq!(Error::FpgaConfigFailed(SdkError::FileError).code(), -103);
        assert_eq!(Error::FrontPanelNotEnabled.code(), -104);
        assert_eq!(Error::NotConnected.code(), -105);
    }

    #[test]
    fn sdk_codes_pass_through() {
        for code in -20..=-1 {
            assert_eq!(SdkError::from_code(code).code(), code);
            assert_eq!(Error::Sdk(SdkError::from_code(code)).code(), code);
        }
        assert_eq!(SdkError::from_code(-42), SdkError::Other(-42));
    }

    #[test]
    fn check_maps_no_error_to_ok() {
        assert_eq!(SdkError::check(0), Ok(()));
        assert_eq!(SdkError::check(-1), Err(SdkError::Failed));
    }

    #[test]
    fn check_count_splits_counts_and_codes() {
        assert_eq!(SdkError::check_count(2048), Ok(2048));
        assert_eq!(SdkError::check_count(0), Ok(0));
        assert_eq!(SdkError::check_count(-7), Err(SdkError::FileError));
    }

    #[test]
    fn messages_match_published_text() {
        assert_eq!(
            Error::AlreadyOpened.to_string(),
            "Cannot open: Device alraedy opened."
        );
        assert_eq!(Error::CannotOpen.to_string(), "Device could not be opened.");
        assert_eq!(Error::NotConnected.to_string(), "Device not connected.");
        assert_eq!(
            Error::Sdk(SdkError::Timeout).to_string(),
            "FrontPanel error -2 (Timeout)"
        );
    }

    #[test]
    fn config_failure_exposes_sdk_source() {
        use std::error::Error as _;
        let err = Error::FpgaConfigFailed(SdkError::InvalidBitstream);
        assert!(err.source().is_some());
        assert!(Error::NotConnected.source().is_none());
    }
}
