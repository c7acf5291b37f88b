//! The DICOM Upper Layer Protocol (PS3.8) and DIMSE messaging (PS3.7):
//! PDU wire codec, the ACSE association state machine, and command-set
//! encode/decode with PDV fragmentation/reassembly.
//!
//! - [`pdu`] holds the PDU value types; [`codec`] encodes/decodes them.
//! - [`association`] drives negotiation, data transfer, and release/abort
//!   over a TCP connection, from either the requester ([`association::client`])
//!   or acceptor ([`association::server`]) side.
//! - [`dimse`] builds and reassembles DIMSE messages on top of an open
//!   association's P-DATA-TF exchange.

pub mod association;
pub mod codec;
pub mod dimse;
pub mod error;
pub mod pdu;

/// This implementation's class UID, sent in User Information negotiation
/// (PS3.5 Annex B). May change between versions.
pub const IMPLEMENTATION_CLASS_UID: &str = "1.2.826.0.1.3680043.9.7229.1.1";
/// This implementation's version name, sent in User Information negotiation.
pub const IMPLEMENTATION_VERSION_NAME: &str = "DICOM-CORE-RS-1";

pub use association::client::{ClientAssociation, ClientAssociationOptions};
pub use association::server::{ServerAssociation, ServerAssociationOptions};
pub use codec::{decode_pdu, encode_pdu, write_pdu};
pub use error::{Error, Result};
pub use pdu::Pdu;
