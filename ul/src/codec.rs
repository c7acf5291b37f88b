//! Wire encode/decode of the seven Upper Layer PDUs (§4.3), including all
//! the sub-items nested within A-ASSOCIATE-RQ/AC's variable-item stream.
//!
//! PDU envelopes and PS3.8 sub-item lengths are big-endian, unlike the
//! little-endian DICOM dataset wire formats `dicom-encoding` otherwise
//! serves; every read/write in this module goes through
//! [`Endianness::Big`] explicitly rather than relying on an ambient
//! default, per the Design Notes' "endianness switching mid-stream" note.

use std::io::{Cursor, Read, Write};

use dicom_core::ae::AE_FIELD_LEN;
use dicom_core::AeTitle;
use dicom_encoding::{basic, Endianness};
use snafu::{ensure, ResultExt};

use crate::error::{ConnectionFailedSnafu, InvalidAeTitleSnafu, InvalidPduSnafu, PduTooLargeSnafu, Result, UnrecognizedPduTypeSnafu};
use crate::pdu::*;

/// The PDU envelope's fixed size: type(1) + reserved(1) + length(4).
pub const PDU_HEADER_LEN: u32 = 6;
/// A sub-item header's fixed size: type(1) + reserved(1) + length(2).
const ITEM_HEADER_LEN: u32 = 4;

const TYPE_ASSOCIATE_RQ: u8 = 0x01;
const TYPE_ASSOCIATE_AC: u8 = 0x02;
const TYPE_ASSOCIATE_RJ: u8 = 0x03;
const TYPE_P_DATA_TF: u8 = 0x04;
const TYPE_RELEASE_RQ: u8 = 0x05;
const TYPE_RELEASE_RP: u8 = 0x06;
const TYPE_ABORT: u8 = 0x07;

const ITEM_APPLICATION_CONTEXT: u8 = 0x10;
const ITEM_PRESENTATION_CONTEXT_RQ: u8 = 0x20;
const ITEM_PRESENTATION_CONTEXT_AC: u8 = 0x21;
const ITEM_ABSTRACT_SYNTAX: u8 = 0x30;
const ITEM_TRANSFER_SYNTAX: u8 = 0x40;
const ITEM_USER_INFORMATION: u8 = 0x50;
const ITEM_MAX_LENGTH: u8 = 0x51;
const ITEM_IMPLEMENTATION_CLASS_UID: u8 = 0x52;
const ITEM_IMPLEMENTATION_VERSION_NAME: u8 = 0x55;
const ITEM_USER_IDENTITY_RQ: u8 = 0x58;
const ITEM_USER_IDENTITY_AC: u8 = 0x59;

/// Decode one PDU from `reader`, enforcing `max_pdu_size` against the
/// declared body length. The PDU's own length field, plus the envelope,
/// must not exceed `max_pdu_size`; a larger declared length fails with
/// [`crate::error::Error::PduTooLarge`] without attempting to read the body.
pub fn decode_pdu<R: Read>(reader: &mut R, max_pdu_size: u32) -> Result<Pdu> {
    let mut header = [0u8; PDU_HEADER_LEN as usize];
    reader.read_exact(&mut header).context(ConnectionFailedSnafu)?;
    let pdu_type = header[0];
    let body_len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);

    ensure!(
        PDU_HEADER_LEN + body_len <= max_pdu_size.max(PDU_HEADER_LEN),
        PduTooLargeSnafu {
            received: PDU_HEADER_LEN + body_len,
            maximum: max_pdu_size,
        }
    );

    let mut body = vec![0u8; body_len as usize];
    reader.read_exact(&mut body).context(ConnectionFailedSnafu)?;
    let mut cursor = Cursor::new(&body[..]);

    match pdu_type {
        TYPE_ASSOCIATE_RQ => decode_associate_rq(&mut cursor).map(Pdu::AssociateRq),
        TYPE_ASSOCIATE_AC => decode_associate_ac(&mut cursor).map(Pdu::AssociateAc),
        TYPE_ASSOCIATE_RJ => decode_associate_rj(&mut cursor),
        TYPE_P_DATA_TF => decode_p_data(&mut cursor),
        TYPE_RELEASE_RQ => Ok(Pdu::ReleaseRq),
        TYPE_RELEASE_RP => Ok(Pdu::ReleaseRp),
        TYPE_ABORT => decode_abort(&mut cursor),
        other => UnrecognizedPduTypeSnafu { pdu_type: other }.fail(),
    }
}

/// Encode a PDU to its complete wire form, envelope included.
pub fn encode_pdu(pdu: &Pdu) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    match pdu {
        Pdu::AssociateRq(rq) => encode_associate_rq(&mut body, rq)?,
        Pdu::AssociateAc(ac) => encode_associate_ac(&mut body, ac)?,
        Pdu::AssociateRj { result, source } => encode_associate_rj(&mut body, *result, *source),
        Pdu::PData { values } => encode_p_data(&mut body, values),
        Pdu::ReleaseRq | Pdu::ReleaseRp => body.extend_from_slice(&[0, 0, 0, 0]),
        Pdu::Abort { source, reason } => encode_abort(&mut body, *source, *reason),
    }

    let mut out = Vec::with_capacity(body.len() + PDU_HEADER_LEN as usize);
    out.push(pdu.type_byte());
    out.push(0);
    basic::write_u32(&mut out, body.len() as u32, Endianness::Big).context(ConnectionFailedSnafu)?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Write a PDU directly to a stream, for callers that don't need the
/// encoded bytes themselves (the common case in the association layer).
pub fn write_pdu<W: Write>(writer: &mut W, pdu: &Pdu) -> Result<()> {
    let bytes = encode_pdu(pdu)?;
    writer.write_all(&bytes).context(ConnectionFailedSnafu)
}

// --- sub-item helpers -------------------------------------------------

fn read_item_header(cursor: &mut Cursor<&[u8]>) -> Result<(u8, u16)> {
    let item_type = basic::read_bytes(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    basic::skip(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let len = basic::read_u16(cursor, Endianness::Big).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    Ok((item_type, len))
}

fn read_item_body<'a>(cursor: &mut Cursor<&'a [u8]>, len: u16) -> Result<&'a [u8]> {
    basic::read_bytes(cursor, len as usize).map_err(|_| crate::error::Error::UnexpectedEndOfData.into())
}

fn write_item_header<W: Write>(w: &mut W, item_type: u8, len: u16) -> Result<()> {
    w.write_all(&[item_type, 0]).context(ConnectionFailedSnafu)?;
    basic::write_u16(w, len, Endianness::Big).context(ConnectionFailedSnafu)
}

fn decode_uid_text(bytes: &[u8]) -> String {
    dicom_core::uid::trim_uid(String::from_utf8_lossy(bytes).trim_end()).to_string()
}

fn read_ae_field(cursor: &mut Cursor<&[u8]>) -> Result<AeTitle> {
    let bytes = basic::read_bytes(cursor, AE_FIELD_LEN).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let arr: [u8; AE_FIELD_LEN] = bytes.try_into().expect("checked length");
    AeTitle::from_wire_bytes(&arr).context(InvalidAeTitleSnafu)
}

fn write_ae_field<W: Write>(w: &mut W, ae: &AeTitle) -> Result<()> {
    w.write_all(&ae.to_wire_bytes()).context(ConnectionFailedSnafu)
}

// --- A-ASSOCIATE-RQ ----------------------------------------------------

fn decode_associate_rq(cursor: &mut Cursor<&[u8]>) -> Result<AssociateRq> {
    let protocol_version = basic::read_u16(cursor, Endianness::Big).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    basic::skip(cursor, 2).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let called_ae_title = read_ae_field(cursor)?;
    let calling_ae_title = read_ae_field(cursor)?;
    basic::skip(cursor, 32).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;

    let mut application_context_name = String::new();
    let mut presentation_contexts = Vec::new();
    let mut user_variables = Vec::new();

    while basic::remaining(cursor) > 0 {
        let (item_type, len) = read_item_header(cursor)?;
        let body = read_item_body(cursor, len)?;
        match item_type {
            ITEM_APPLICATION_CONTEXT => application_context_name = decode_uid_text(body),
            ITEM_PRESENTATION_CONTEXT_RQ => presentation_contexts.push(decode_presentation_context_rq(body)?),
            ITEM_USER_INFORMATION => user_variables = decode_user_information(body)?,
            _ => { /* unknown sub-item: skip, per §4.3 Decoder contract */ }
        }
    }

    Ok(AssociateRq {
        protocol_version,
        called_ae_title,
        calling_ae_title,
        application_context_name,
        presentation_contexts,
        user_variables,
    })
}

fn encode_associate_rq(out: &mut Vec<u8>, rq: &AssociateRq) -> Result<()> {
    basic::write_u16(&mut *out, rq.protocol_version, Endianness::Big).context(ConnectionFailedSnafu)?;
    out.extend_from_slice(&[0, 0]);
    write_ae_field(out, &rq.called_ae_title)?;
    write_ae_field(out, &rq.calling_ae_title)?;
    out.extend_from_slice(&[0u8; 32]);

    write_application_context(out, &rq.application_context_name)?;
    for pc in &rq.presentation_contexts {
        encode_presentation_context_rq(out, pc)?;
    }
    encode_user_information(out, &rq.user_variables)?;
    Ok(())
}

fn write_application_context<W: Write>(w: &mut W, uid: &str) -> Result<()> {
    let bytes = dicom_core::uid::pad_uid(uid).into_bytes();
    write_item_header(w, ITEM_APPLICATION_CONTEXT, bytes.len() as u16)?;
    w.write_all(&bytes).context(ConnectionFailedSnafu)
}

fn decode_presentation_context_rq(body: &[u8]) -> Result<PresentationContextProposed> {
    let mut cursor = Cursor::new(body);
    let id = basic::read_bytes(&mut cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    basic::skip(&mut cursor, 3).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;

    let mut abstract_syntax = String::new();
    let mut transfer_syntaxes = Vec::new();
    while basic::remaining(&mut cursor) > 0 {
        let (item_type, len) = read_item_header(&mut cursor)?;
        let item_body = read_item_body(&mut cursor, len)?;
        match item_type {
            ITEM_ABSTRACT_SYNTAX => abstract_syntax = decode_uid_text(item_body),
            ITEM_TRANSFER_SYNTAX => transfer_syntaxes.push(decode_uid_text(item_body)),
            _ => return InvalidPduSnafu.fail(),
        }
    }
    ensure!(id % 2 == 1, InvalidPduSnafu);
    Ok(PresentationContextProposed {
        id,
        abstract_syntax,
        transfer_syntaxes,
    })
}

fn encode_presentation_context_rq<W: Write>(w: &mut W, pc: &PresentationContextProposed) -> Result<()> {
    let mut body = vec![pc.id, 0, 0, 0];
    write_uid_item(&mut body, ITEM_ABSTRACT_SYNTAX, &pc.abstract_syntax);
    for ts in &pc.transfer_syntaxes {
        write_uid_item(&mut body, ITEM_TRANSFER_SYNTAX, ts);
    }
    write_item_header(w, ITEM_PRESENTATION_CONTEXT_RQ, body.len() as u16)?;
    w.write_all(&body).context(ConnectionFailedSnafu)
}

fn write_uid_item(out: &mut Vec<u8>, item_type: u8, uid: &str) {
    let bytes = dicom_core::uid::pad_uid(uid).into_bytes();
    out.push(item_type);
    out.push(0);
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(&bytes);
}

fn decode_user_information(body: &[u8]) -> Result<Vec<UserVariableItem>> {
    let mut cursor = Cursor::new(body);
    let mut items = Vec::new();
    while basic::remaining(&mut cursor) > 0 {
        let (item_type, len) = read_item_header(&mut cursor)?;
        let item_body = read_item_body(&mut cursor, len)?;
        items.push(match item_type {
            ITEM_MAX_LENGTH => {
                let mut c = Cursor::new(item_body);
                let v = basic::read_u32(&mut c, Endianness::Big).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
                UserVariableItem::MaxLength(v)
            }
            ITEM_IMPLEMENTATION_CLASS_UID => UserVariableItem::ImplementationClassUid(decode_uid_text(item_body)),
            ITEM_IMPLEMENTATION_VERSION_NAME => {
                UserVariableItem::ImplementationVersionName(String::from_utf8_lossy(item_body).trim_end().to_string())
            }
            ITEM_USER_IDENTITY_RQ => UserVariableItem::UserIdentity(decode_user_identity_rq(item_body)?),
            ITEM_USER_IDENTITY_AC => UserVariableItem::UserIdentityResponse(decode_user_identity_ac(item_body)?),
            other => UserVariableItem::Unknown {
                item_type: other,
                data: item_body.to_vec(),
            },
        });
    }
    Ok(items)
}

fn encode_user_information<W: Write>(w: &mut W, vars: &[UserVariableItem]) -> Result<()> {
    let mut body = Vec::new();
    for var in vars {
        match var {
            UserVariableItem::MaxLength(v) => {
                body.push(ITEM_MAX_LENGTH);
                body.push(0);
                body.extend_from_slice(&4u16.to_be_bytes());
                body.extend_from_slice(&v.to_be_bytes());
            }
            UserVariableItem::ImplementationClassUid(uid) => write_uid_item(&mut body, ITEM_IMPLEMENTATION_CLASS_UID, uid),
            UserVariableItem::ImplementationVersionName(name) => {
                let bytes = name.as_bytes();
                body.push(ITEM_IMPLEMENTATION_VERSION_NAME);
                body.push(0);
                body.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                body.extend_from_slice(bytes);
            }
            UserVariableItem::UserIdentity(req) => encode_user_identity_rq(&mut body, req),
            UserVariableItem::UserIdentityResponse(resp) => encode_user_identity_ac(&mut body, resp),
            UserVariableItem::Unknown { item_type, data } => {
                body.push(*item_type);
                body.push(0);
                body.extend_from_slice(&(data.len() as u16).to_be_bytes());
                body.extend_from_slice(data);
            }
        }
    }
    write_item_header(w, ITEM_USER_INFORMATION, body.len() as u16)?;
    w.write_all(&body).context(ConnectionFailedSnafu)
}

fn decode_user_identity_rq(body: &[u8]) -> Result<UserIdentityRequest> {
    let mut cursor = Cursor::new(body);
    let identity_type = basic::read_bytes(&mut cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    let positive_response_requested =
        basic::read_bytes(&mut cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0] != 0;
    let primary_len = basic::read_u16(&mut cursor, Endianness::Big).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let primary_field = read_item_body(&mut cursor, primary_len)?.to_vec();
    let secondary_len = basic::read_u16(&mut cursor, Endianness::Big).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let secondary_field = read_item_body(&mut cursor, secondary_len)?.to_vec();
    Ok(UserIdentityRequest {
        identity_type,
        positive_response_requested,
        primary_field,
        secondary_field,
    })
}

fn encode_user_identity_rq(out: &mut Vec<u8>, req: &UserIdentityRequest) {
    let mut body = vec![req.identity_type, req.positive_response_requested as u8];
    body.extend_from_slice(&(req.primary_field.len() as u16).to_be_bytes());
    body.extend_from_slice(&req.primary_field);
    body.extend_from_slice(&(req.secondary_field.len() as u16).to_be_bytes());
    body.extend_from_slice(&req.secondary_field);
    out.push(ITEM_USER_IDENTITY_RQ);
    out.push(0);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
}

fn decode_user_identity_ac(body: &[u8]) -> Result<UserIdentityResponse> {
    let mut cursor = Cursor::new(body);
    let len = basic::read_u16(&mut cursor, Endianness::Big).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let server_response = read_item_body(&mut cursor, len)?.to_vec();
    Ok(UserIdentityResponse { server_response })
}

fn encode_user_identity_ac(out: &mut Vec<u8>, resp: &UserIdentityResponse) {
    let mut body = (resp.server_response.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(&resp.server_response);
    out.push(ITEM_USER_IDENTITY_AC);
    out.push(0);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
}

// --- A-ASSOCIATE-AC ----------------------------------------------------

fn decode_associate_ac(cursor: &mut Cursor<&[u8]>) -> Result<AssociateAc> {
    let protocol_version = basic::read_u16(cursor, Endianness::Big).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    basic::skip(cursor, 2).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    // The AC body still carries the called/calling AE title fields on the
    // wire (echoed back, per PS3.8), even though the result is driven by
    // the negotiated presentation contexts rather than these fields.
    let called_ae_title = read_ae_field(cursor)?;
    let calling_ae_title = read_ae_field(cursor)?;
    basic::skip(cursor, 32).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;

    let mut application_context_name = String::new();
    let mut presentation_contexts = Vec::new();
    let mut user_variables = Vec::new();

    while basic::remaining(cursor) > 0 {
        let (item_type, len) = read_item_header(cursor)?;
        let body = read_item_body(cursor, len)?;
        match item_type {
            ITEM_APPLICATION_CONTEXT => application_context_name = decode_uid_text(body),
            ITEM_PRESENTATION_CONTEXT_AC => presentation_contexts.push(decode_presentation_context_ac(body)?),
            ITEM_USER_INFORMATION => user_variables = decode_user_information(body)?,
            _ => {}
        }
    }

    Ok(AssociateAc {
        protocol_version,
        called_ae_title,
        calling_ae_title,
        application_context_name,
        presentation_contexts,
        user_variables,
    })
}

fn encode_associate_ac(out: &mut Vec<u8>, ac: &AssociateAc) -> Result<()> {
    basic::write_u16(&mut *out, ac.protocol_version, Endianness::Big).context(ConnectionFailedSnafu)?;
    out.extend_from_slice(&[0, 0]);
    write_ae_field(out, &ac.called_ae_title)?;
    write_ae_field(out, &ac.calling_ae_title)?;
    out.extend_from_slice(&[0u8; 32]);

    write_application_context(out, &ac.application_context_name)?;
    for pc in &ac.presentation_contexts {
        encode_presentation_context_ac(out, pc)?;
    }
    encode_user_information(out, &ac.user_variables)?;
    Ok(())
}

fn decode_presentation_context_ac(body: &[u8]) -> Result<PresentationContextResult> {
    let mut cursor = Cursor::new(body);
    let id = basic::read_bytes(&mut cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    basic::skip(&mut cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let result_byte = basic::read_bytes(&mut cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    basic::skip(&mut cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let result = PresentationContextResultReason::from_u8(result_byte).ok_or(crate::error::Error::InvalidPdu)?;

    let mut transfer_syntax = String::new();
    if basic::remaining(&mut cursor) > 0 {
        let (item_type, len) = read_item_header(&mut cursor)?;
        ensure!(item_type == ITEM_TRANSFER_SYNTAX, InvalidPduSnafu);
        transfer_syntax = decode_uid_text(read_item_body(&mut cursor, len)?);
    }
    Ok(PresentationContextResult {
        id,
        result,
        transfer_syntax,
    })
}

fn encode_presentation_context_ac<W: Write>(w: &mut W, pc: &PresentationContextResult) -> Result<()> {
    let mut body = vec![pc.id, 0, pc.result as u8, 0];
    if !pc.transfer_syntax.is_empty() {
        write_uid_item(&mut body, ITEM_TRANSFER_SYNTAX, &pc.transfer_syntax);
    }
    write_item_header(w, ITEM_PRESENTATION_CONTEXT_AC, body.len() as u16)?;
    w.write_all(&body).context(ConnectionFailedSnafu)
}

// --- A-ASSOCIATE-RJ ----------------------------------------------------

fn decode_associate_rj(cursor: &mut Cursor<&[u8]>) -> Result<Pdu> {
    basic::skip(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let result_byte = basic::read_bytes(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    let source_byte = basic::read_bytes(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    let reason = basic::read_bytes(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];

    let result = match result_byte {
        1 => RjResult::Permanent,
        2 => RjResult::Transient,
        _ => return InvalidPduSnafu.fail(),
    };
    let source = match source_byte {
        1 => RjSource::ServiceUser(reason),
        2 => RjSource::ServiceProviderAcse(reason),
        3 => RjSource::ServiceProviderPresentation(reason),
        _ => return InvalidPduSnafu.fail(),
    };
    Ok(Pdu::AssociateRj { result, source })
}

fn encode_associate_rj(out: &mut Vec<u8>, result: RjResult, source: RjSource) {
    let (source_byte, reason) = match source {
        RjSource::ServiceUser(r) => (1u8, r),
        RjSource::ServiceProviderAcse(r) => (2u8, r),
        RjSource::ServiceProviderPresentation(r) => (3u8, r),
    };
    out.extend_from_slice(&[0, result as u8, source_byte, reason]);
}

// --- P-DATA-TF ----------------------------------------------------------

fn decode_p_data(cursor: &mut Cursor<&[u8]>) -> Result<Pdu> {
    let mut values = Vec::new();
    while basic::remaining(cursor) > 0 {
        let pdv_len = basic::read_u32(cursor, Endianness::Big).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
        ensure!(pdv_len >= 2, InvalidPduSnafu);
        let presentation_context_id = basic::read_bytes(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
        let control = basic::read_bytes(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
        let data_len = pdv_len as usize - 2;
        let data = basic::read_bytes(cursor, data_len).map_err(|_| crate::error::Error::UnexpectedEndOfData)?.to_vec();
        values.push(PresentationDataValue {
            presentation_context_id,
            is_command: control & 0x01 != 0,
            is_last: control & 0x02 != 0,
            data,
        });
    }
    Ok(Pdu::PData { values })
}

fn encode_p_data(out: &mut Vec<u8>, values: &[PresentationDataValue]) {
    for pdv in values {
        let pdv_len = (pdv.data.len() + 2) as u32;
        out.extend_from_slice(&pdv_len.to_be_bytes());
        out.push(pdv.presentation_context_id);
        let mut control = 0u8;
        if pdv.is_command {
            control |= 0x01;
        }
        if pdv.is_last {
            control |= 0x02;
        }
        out.push(control);
        out.extend_from_slice(&pdv.data);
    }
}

// --- A-ABORT -------------------------------------------------------------

fn decode_abort(cursor: &mut Cursor<&[u8]>) -> Result<Pdu> {
    basic::skip(cursor, 2).map_err(|_| crate::error::Error::UnexpectedEndOfData)?;
    let source_byte = basic::read_bytes(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    let reason = basic::read_bytes(cursor, 1).map_err(|_| crate::error::Error::UnexpectedEndOfData)?[0];
    let source = match source_byte {
        0 => AbortSource::ServiceUser,
        2 => AbortSource::ServiceProvider,
        _ => return InvalidPduSnafu.fail(),
    };
    Ok(Pdu::Abort { source, reason })
}

fn encode_abort(out: &mut Vec<u8>, source: AbortSource, reason: u8) {
    let source_byte = match source {
        AbortSource::ServiceUser => 0u8,
        AbortSource::ServiceProvider => 2u8,
    };
    out.extend_from_slice(&[0, 0, source_byte, reason]);
}

/// Silence the unused-constant warning: `ITEM_HEADER_LEN` documents the
/// sub-item header shape for readers even though every call site inlines
/// the 4-byte layout directly.
const _: u32 = ITEM_HEADER_LEN;

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::AeTitle;

    fn sample_rq() -> AssociateRq {
        AssociateRq {
            protocol_version: 1,
            called_ae_title: AeTitle::new("PACS_SERVER").unwrap(),
            calling_ae_title: AeTitle::new("MY_CLIENT").unwrap(),
            application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
            presentation_contexts: vec![PresentationContextProposed {
                id: 1,
                abstract_syntax: "1.2.840.10008.5.1.4.1.1.7".to_string(),
                transfer_syntaxes: vec!["1.2.840.10008.1.2.1".to_string()],
            }],
            user_variables: vec![
                UserVariableItem::MaxLength(32768),
                UserVariableItem::ImplementationClassUid("1.2.3.4.5.6.7.8.9".to_string()),
                UserVariableItem::ImplementationVersionName("TEST_V1".to_string()),
            ],
        }
    }

    #[test]
    fn associate_rq_round_trips() {
        let rq = sample_rq();
        let pdu = Pdu::AssociateRq(rq.clone());
        let bytes = encode_pdu(&pdu).unwrap();
        let decoded = decode_pdu(&mut Cursor::new(&bytes[..]), 65536).unwrap();
        assert_eq!(decoded, Pdu::AssociateRq(rq));
    }

    #[test]
    fn pdu_length_integrity_holds() {
        let bytes = encode_pdu(&Pdu::AssociateRq(sample_rq())).unwrap();
        let declared = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        assert_eq!(declared as usize, bytes.len() - 6);
    }

    #[test]
    fn associate_rj_wire_layout_matches_spec_example() {
        let pdu = Pdu::AssociateRj {
            result: RjResult::Permanent,
            source: RjSource::ServiceUser(7),
        };
        let bytes = encode_pdu(&pdu).unwrap();
        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes, vec![0x03, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01, 0x01, 0x07]);
    }

    #[test]
    fn release_handshake_wire_layout() {
        assert_eq!(
            encode_pdu(&Pdu::ReleaseRq).unwrap(),
            vec![0x05, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode_pdu(&Pdu::ReleaseRp).unwrap(),
            vec![0x06, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn p_data_round_trips_multiple_pdvs() {
        let pdu = Pdu::PData {
            values: vec![
                PresentationDataValue {
                    presentation_context_id: 1,
                    is_command: true,
                    is_last: true,
                    data: vec![1, 2, 3],
                },
                PresentationDataValue {
                    presentation_context_id: 3,
                    is_command: false,
                    is_last: false,
                    data: vec![4, 5],
                },
            ],
        };
        let bytes = encode_pdu(&pdu).unwrap();
        let decoded = decode_pdu(&mut Cursor::new(&bytes[..]), 65536).unwrap();
        assert_eq!(decoded, pdu);
    }

    #[test]
    fn unrecognized_pdu_type_is_an_error() {
        let bytes = [0xEE, 0x00, 0x00, 0x00, 0x00, 0x00];
        let err = decode_pdu(&mut Cursor::new(&bytes[..]), 65536).unwrap_err();
        assert!(matches!(err, crate::error::Error::UnrecognizedPduType { .. }));
    }

    #[test]
    fn too_large_pdu_is_rejected_before_reading_body() {
        let bytes = [0x01, 0x00, 0x00, 0x01, 0x00, 0x00];
        let err = decode_pdu(&mut Cursor::new(&bytes[..]), 64).unwrap_err();
        assert!(matches!(err, crate::error::Error::PduTooLarge { .. }));
    }
}
