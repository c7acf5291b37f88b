//! Errors from `read_file` (§4.2), the parser's closed failure set.

use dicom_core::Tag;
use snafu::Snafu;

use crate::dataset::DataSet;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("file too short: {} bytes, need at least 132", len))]
    TooShort { len: usize },

    #[snafu(display("missing \"DICM\" marker at offset 128"))]
    MissingDicmMarker,

    #[snafu(display("unsupported transfer syntax {:?}", uid))]
    UnsupportedTransferSyntax { uid: String },

    /// Ran out of bytes mid-element. Elements decoded before the cutoff
    /// are preserved in `partial`, per the §4.2 Failure Policy.
    #[snafu(display("dataset truncated after {} elements", partial.len()))]
    Truncated { partial: DataSet },

    /// A structurally invalid element (bad nested tag, a sequence whose
    /// declared length disagrees with the sum of its items' lengths,
    /// sequence nesting past the depth limit). `partial` holds every
    /// element decoded before the one that failed.
    #[snafu(display("malformed element at {}", tag))]
    MalformedElement { tag: Tag, partial: DataSet },

    /// Undefined length on a VR/tag combination other than SQ or
    /// encapsulated PixelData.
    #[snafu(display("element {} has undefined length but is not SQ or encapsulated PixelData", tag))]
    UnsupportedUndefinedLength { tag: Tag, partial: DataSet },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
