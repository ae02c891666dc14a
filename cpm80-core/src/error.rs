//! Error types for the BIOS harness.

use thiserror::Error;

use crate::bios::BiosCall;

/// Errors that can occur while hosting a CP/M session.
#[derive(Error, Debug)]
pub enum CpmError {
    #[error("unsupported sector skew factor: {0}")]
    UnsupportedSkew(u16),

    #[error("unimplemented BIOS peripheral call: {0:?}")]
    UnimplementedBios(BiosCall),

    #[error("BDOS image of {size} bytes does not fit below the BIOS at {limit:#06X}")]
    BdosImageTooLarge { size: usize, limit: u16 },

    #[error("CCP image of {size} bytes does not fit below the BDOS at {limit:#06X}")]
    CcpImageTooLarge { size: usize, limit: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CP/M operations.
pub type CpmResult<T> = Result<T, CpmError>;
