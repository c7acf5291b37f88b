//! PDU value types (§4.3). Pure data; see [`crate::codec`] for the wire
//! encoding/decoding.

use dicom_core::AeTitle;

/// A fully decoded Upper Layer PDU.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    AssociateRq(AssociateRq),
    AssociateAc(AssociateAc),
    AssociateRj { result: RjResult, source: RjSource },
    PData { values: Vec<PresentationDataValue> },
    ReleaseRq,
    ReleaseRp,
    Abort { source: AbortSource, reason: u8 },
}

impl Pdu {
    /// The wire type byte for this PDU, used by the codec envelope.
    pub fn type_byte(&self) -> u8 {
        match self {
            Pdu::AssociateRq(_) => 0x01,
            Pdu::AssociateAc(_) => 0x02,
            Pdu::AssociateRj { .. } => 0x03,
            Pdu::PData { .. } => 0x04,
            Pdu::ReleaseRq => 0x05,
            Pdu::ReleaseRp => 0x06,
            Pdu::Abort { .. } => 0x07,
        }
    }

    /// A human-readable name for this PDU's variant, for error messages
    /// (`UnexpectedPduType`).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Pdu::AssociateRq(_) => "A-ASSOCIATE-RQ",
            Pdu::AssociateAc(_) => "A-ASSOCIATE-AC",
            Pdu::AssociateRj { .. } => "A-ASSOCIATE-RJ",
            Pdu::PData { .. } => "P-DATA-TF",
            Pdu::ReleaseRq => "A-RELEASE-RQ",
            Pdu::ReleaseRp => "A-RELEASE-RP",
            Pdu::Abort { .. } => "A-ABORT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociateRq {
    pub protocol_version: u16,
    pub called_ae_title: AeTitle,
    pub calling_ae_title: AeTitle,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextProposed>,
    pub user_variables: Vec<UserVariableItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociateAc {
    pub protocol_version: u16,
    pub called_ae_title: AeTitle,
    pub calling_ae_title: AeTitle,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextResult>,
    pub user_variables: Vec<UserVariableItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresentationContextProposed {
    /// Odd in `1..255`.
    pub id: u8,
    pub abstract_syntax: String,
    /// Ordered, non-empty.
    pub transfer_syntaxes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresentationContextResult {
    pub id: u8,
    pub result: PresentationContextResultReason,
    pub transfer_syntax: String,
}

impl PresentationContextResult {
    /// Per spec §3: usable iff `result == Acceptance` and a transfer
    /// syntax is present (always true on the wire; the field is only
    /// semantically meaningful in that case).
    pub fn is_usable(&self) -> bool {
        self.result == PresentationContextResultReason::Acceptance && !self.transfer_syntax.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PresentationContextResultReason {
    Acceptance = 0,
    UserRejection = 1,
    NoReasonProviderRejection = 2,
    AbstractSyntaxNotSupported = 3,
    TransferSyntaxesNotSupported = 4,
}

impl PresentationContextResultReason {
    pub fn from_u8(v: u8) -> Option<Self> {
        use PresentationContextResultReason::*;
        Some(match v {
            0 => Acceptance,
            1 => UserRejection,
            2 => NoReasonProviderRejection,
            3 => AbstractSyntaxNotSupported,
            4 => TransferSyntaxesNotSupported,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserVariableItem {
    MaxLength(u32),
    ImplementationClassUid(String),
    ImplementationVersionName(String),
    UserIdentity(UserIdentityRequest),
    UserIdentityResponse(UserIdentityResponse),
    Unknown { item_type: u8, data: Vec<u8> },
}

/// User Identity negotiation (sub-item `0x58`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentityRequest {
    /// `1..=5`: username, username+passcode, Kerberos, SAML, JWT.
    pub identity_type: u8,
    pub positive_response_requested: bool,
    pub primary_field: Vec<u8>,
    pub secondary_field: Vec<u8>,
}

/// User Identity server response (sub-item `0x59`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentityResponse {
    pub server_response: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RjResult {
    Permanent = 1,
    Transient = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RjSource {
    ServiceUser(u8),
    ServiceProviderAcse(u8),
    ServiceProviderPresentation(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresentationDataValue {
    /// Odd.
    pub presentation_context_id: u8,
    pub is_command: bool,
    pub is_last: bool,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortSource {
    ServiceUser,
    ServiceProvider,
}
