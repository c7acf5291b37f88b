//! Errors raised by the byte codec and element-header codecs.

use dicom_core::Tag;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A read was attempted past the end of the available bytes. The
    /// cursor is left untouched.
    #[snafu(display("short read: needed {} bytes, {} available", needed, available))]
    ShortRead { needed: usize, available: usize },

    #[snafu(display("invalid value representation {:?} for tag {}", bytes, tag))]
    InvalidVr { bytes: [u8; 2], tag: Tag },

    #[snafu(display("AE title error"))]
    AeTitle { source: dicom_core::ae::AeTitleError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
