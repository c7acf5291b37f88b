//! Wire-level AE title helpers, thin wrappers over [`dicom_core::AeTitle`]
//! for the fixed 16-byte fields used by PDU bodies.

use dicom_core::ae::AE_FIELD_LEN;
use dicom_core::AeTitle;
use snafu::ResultExt;

use crate::error::{AeTitleSnafu, Result};

/// Encode an AE title to its 16-byte space-padded wire form.
pub fn encode(ae: &AeTitle) -> [u8; AE_FIELD_LEN] {
    ae.to_wire_bytes()
}

/// Decode a 16-byte wire field into an AE title, trimming trailing spaces.
pub fn decode(bytes: &[u8; AE_FIELD_LEN]) -> Result<AeTitle> {
    AeTitle::from_wire_bytes(bytes).context(AeTitleSnafu)
}
