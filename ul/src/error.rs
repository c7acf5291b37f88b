//! The closed error-kind set for the PDU codec, the association state
//! machine, and DIMSE message exchange (§4.4, §3 Error Taxonomy).

use std::time::Duration;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("connection failed"))]
    ConnectionFailed { source: std::io::Error },

    #[snafu(display("operation timed out"))]
    Timeout,

    #[snafu(display("{:?} phase timed out after {:?}", phase, duration))]
    OperationTimeout { phase: Phase, duration: Duration },

    #[snafu(display("connection closed by peer"))]
    ConnectionClosed,

    #[snafu(display("ARTIM timer expired"))]
    ArtimTimerExpired,

    #[snafu(display("invalid PDU"))]
    InvalidPdu,

    #[snafu(display("unrecognized PDU type {:#04x}", pdu_type))]
    UnrecognizedPduType { pdu_type: u8 },

    #[snafu(display("unexpected end of data while decoding a PDU"))]
    UnexpectedEndOfData,

    #[snafu(display("PDU of {} bytes exceeds the negotiated maximum of {}", received, maximum))]
    PduTooLarge { received: u32, maximum: u32 },

    #[snafu(display("expected {:?}, received {:?}", expected, received))]
    UnexpectedPduType { expected: &'static str, received: &'static str },

    #[snafu(display("association rejected: {:?}/{:?} (reason {})", result, source, reason))]
    AssociationRejected {
        result: crate::pdu::RjResult,
        source: &'static str,
        reason: u8,
    },

    #[snafu(display("association aborted by {:?} (reason {})", source, reason))]
    AssociationAborted { source: crate::pdu::AbortSource, reason: u8 },

    #[snafu(display("no presentation context was accepted"))]
    NoPresentationContextAccepted,

    #[snafu(display("at least one abstract syntax must be proposed"))]
    MissingAbstractSyntax,

    #[snafu(display("SOP class {} is not supported by any accepted context", uid))]
    SopClassNotSupported { uid: String },

    #[snafu(display("invalid AE title"))]
    InvalidAeTitle { source: dicom_core::ae::AeTitleError },

    #[snafu(display("operation invalid in state {:?}", state))]
    InvalidState { state: &'static str },

    #[snafu(display("failed to encode a PDU or message"))]
    EncodingFailed,

    #[snafu(display("failed to decode a PDU or message"))]
    DecodingFailed,

    #[snafu(display("C-STORE failed with status {:#06x}", status))]
    StoreFailed { status: u16 },

    #[snafu(display("C-FIND failed with status {:#06x}", status))]
    QueryFailed { status: u16 },

    #[snafu(display("C-MOVE/C-GET failed with status {:#06x}", status))]
    RetrieveFailed { status: u16 },

    #[snafu(display("partial failure: {} succeeded, {} failed", succeeded, failed))]
    PartialFailure {
        succeeded: usize,
        failed: usize,
        details: Option<String>,
    },
}

/// A named phase for [`Error::OperationTimeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Read,
    Write,
    Operation,
    AssociationEstablishment,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
