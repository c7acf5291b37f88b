//! The DIMSE command set (§4.5): group-0000 elements in Implicit VR
//! Little Endian, plus the C-ECHO/C-STORE/C-FIND/C-MOVE/C-GET command
//! fields and the RSP status classification.

use std::collections::BTreeMap;
use std::io::Cursor;

use dicom_core::{Tag, VR};
use dicom_dictionary_std::{tags, StandardDataDictionary};
use dicom_encoding::basic::{self, Endianness};
use dicom_encoding::element::{decode_implicit, encode_implicit, ElementHeader};

use crate::error::Result as UlResult;

/// The DIMSE operation this command set carries, per PS3.7 Table 9.1.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CommandField {
    C_STORE_RQ = 0x0001,
    C_STORE_RSP = 0x8001,
    C_GET_RQ = 0x0010,
    C_GET_RSP = 0x8010,
    C_FIND_RQ = 0x0020,
    C_FIND_RSP = 0x8020,
    C_MOVE_RQ = 0x0021,
    C_MOVE_RSP = 0x8021,
    C_ECHO_RQ = 0x0030,
    C_ECHO_RSP = 0x8030,
    C_CANCEL_RQ = 0x0FFF,
}

impl CommandField {
    pub fn from_u16(v: u16) -> Option<Self> {
        use CommandField::*;
        Some(match v {
            0x0001 => C_STORE_RQ,
            0x8001 => C_STORE_RSP,
            0x0010 => C_GET_RQ,
            0x8010 => C_GET_RSP,
            0x0020 => C_FIND_RQ,
            0x8020 => C_FIND_RSP,
            0x0021 => C_MOVE_RQ,
            0x8021 => C_MOVE_RSP,
            0x0030 => C_ECHO_RQ,
            0x8030 => C_ECHO_RSP,
            0x0FFF => C_CANCEL_RQ,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Priority {
    Medium = 0x0000,
    High = 0x0001,
    Low = 0x0002,
}

/// Value of `(0000,0800)` CommandDataSetType: whether a dataset PDV
/// stream follows the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DatasetType {
    Present = 0x0001,
    Absent = 0x0101,
}

impl DatasetType {
    pub fn is_present(self) -> bool {
        matches!(self, DatasetType::Present)
    }
}

/// The DICOM status classes a RSP's `Status` (0000,0900) falls into
/// (§4.5 status classification table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Warning,
    Refused,
    Failed,
    Cancel,
    Pending,
}

/// Classify a DIMSE response status code. Codes outside every named
/// range (vendor extensions not covered here) are conservatively
/// classified as `Failed`.
pub fn classify_status(code: u16) -> StatusClass {
    match code {
        0x0000 => StatusClass::Success,
        0xB000..=0xBFFF | 0x0001 | 0x0107 | 0x0116 => StatusClass::Warning,
        0xA000..=0xA7FF => StatusClass::Refused,
        0xC000..=0xCFFF | 0x0122 | 0x0117 | 0x0124 => StatusClass::Failed,
        0xFE00 => StatusClass::Cancel,
        0xFF00 | 0xFF01 => StatusClass::Pending,
        _ => StatusClass::Failed,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    UShort(u16),
    ULong(u32),
    Text(String),
}

/// A decoded or to-be-encoded DIMSE command set: the group-0000
/// elements carried ahead of an optional dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSet(BTreeMap<Tag, Value>);

impl CommandSet {
    pub fn new() -> Self {
        CommandSet(BTreeMap::new())
    }

    pub fn set_ushort(&mut self, tag: Tag, value: u16) -> &mut Self {
        self.0.insert(tag, Value::UShort(value));
        self
    }

    pub fn set_ulong(&mut self, tag: Tag, value: u32) -> &mut Self {
        self.0.insert(tag, Value::ULong(value));
        self
    }

    pub fn set_string(&mut self, tag: Tag, value: impl Into<String>) -> &mut Self {
        self.0.insert(tag, Value::Text(value.into()));
        self
    }

    pub fn get_ushort(&self, tag: Tag) -> Option<u16> {
        match self.0.get(&tag) {
            Some(Value::UShort(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_ulong(&self, tag: Tag) -> Option<u32> {
        match self.0.get(&tag) {
            Some(Value::ULong(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_string(&self, tag: Tag) -> Option<&str> {
        match self.0.get(&tag) {
            Some(Value::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn command_field(&self) -> Option<CommandField> {
        self.get_ushort(tags::COMMAND_FIELD).and_then(CommandField::from_u16)
    }

    pub fn message_id(&self) -> Option<u16> {
        self.get_ushort(tags::MESSAGE_ID)
    }

    pub fn status(&self) -> Option<u16> {
        self.get_ushort(tags::STATUS)
    }

    pub fn dataset_type(&self) -> Option<DatasetType> {
        match self.get_ushort(tags::COMMAND_DATA_SET_TYPE) {
            Some(0x0101) => Some(DatasetType::Absent),
            Some(_) => Some(DatasetType::Present),
            None => None,
        }
    }

    /// Build a C-ECHO-RQ command set (§4.5).
    pub fn c_echo_rq(message_id: u16, affected_sop_class_uid: impl Into<String>) -> Self {
        let mut cmd = CommandSet::new();
        cmd.set_string(tags::AFFECTED_SOP_CLASS_UID, affected_sop_class_uid);
        cmd.set_ushort(tags::COMMAND_FIELD, CommandField::C_ECHO_RQ as u16);
        cmd.set_ushort(tags::MESSAGE_ID, message_id);
        cmd.set_ushort(tags::COMMAND_DATA_SET_TYPE, DatasetType::Absent as u16);
        cmd
    }

    /// Build a C-ECHO-RSP command set responding to `message_id` with
    /// `status` (typically `0x0000` Success).
    pub fn c_echo_rsp(message_id: u16, affected_sop_class_uid: impl Into<String>, status: u16) -> Self {
        let mut cmd = CommandSet::new();
        cmd.set_string(tags::AFFECTED_SOP_CLASS_UID, affected_sop_class_uid);
        cmd.set_ushort(tags::COMMAND_FIELD, CommandField::C_ECHO_RSP as u16);
        cmd.set_ushort(tags::MESSAGE_ID_BEING_RESPONDED_TO, message_id);
        cmd.set_ushort(tags::COMMAND_DATA_SET_TYPE, DatasetType::Absent as u16);
        cmd.set_ushort(tags::STATUS, status);
        cmd
    }

    /// Build a C-STORE-RQ command set; always carries a dataset.
    pub fn c_store_rq(
        message_id: u16,
        affected_sop_class_uid: impl Into<String>,
        affected_sop_instance_uid: impl Into<String>,
        priority: Priority,
    ) -> Self {
        let mut cmd = CommandSet::new();
        cmd.set_string(tags::AFFECTED_SOP_CLASS_UID, affected_sop_class_uid);
        cmd.set_ushort(tags::COMMAND_FIELD, CommandField::C_STORE_RQ as u16);
        cmd.set_ushort(tags::MESSAGE_ID, message_id);
        cmd.set_ushort(tags::PRIORITY, priority as u16);
        cmd.set_string(tags::AFFECTED_SOP_INSTANCE_UID, affected_sop_instance_uid);
        cmd.set_ushort(tags::COMMAND_DATA_SET_TYPE, DatasetType::Present as u16);
        cmd
    }

    pub fn c_store_rsp(
        message_id: u16,
        affected_sop_class_uid: impl Into<String>,
        affected_sop_instance_uid: impl Into<String>,
        status: u16,
    ) -> Self {
        let mut cmd = CommandSet::new();
        cmd.set_string(tags::AFFECTED_SOP_CLASS_UID, affected_sop_class_uid);
        cmd.set_ushort(tags::COMMAND_FIELD, CommandField::C_STORE_RSP as u16);
        cmd.set_ushort(tags::MESSAGE_ID_BEING_RESPONDED_TO, message_id);
        cmd.set_string(tags::AFFECTED_SOP_INSTANCE_UID, affected_sop_instance_uid);
        cmd.set_ushort(tags::COMMAND_DATA_SET_TYPE, DatasetType::Absent as u16);
        cmd.set_ushort(tags::STATUS, status);
        cmd
    }

    /// Build a C-FIND/C-MOVE/C-GET-RQ command set; `field` selects which
    /// of the three (the identifier dataset that follows differs in
    /// shape per-service but the command set shape is identical).
    pub fn query_retrieve_rq(
        field: CommandField,
        message_id: u16,
        affected_sop_class_uid: impl Into<String>,
        priority: Priority,
        move_destination: Option<String>,
    ) -> Self {
        let mut cmd = CommandSet::new();
        cmd.set_string(tags::AFFECTED_SOP_CLASS_UID, affected_sop_class_uid);
        cmd.set_ushort(tags::COMMAND_FIELD, field as u16);
        cmd.set_ushort(tags::MESSAGE_ID, message_id);
        cmd.set_ushort(tags::PRIORITY, priority as u16);
        if let Some(dest) = move_destination {
            cmd.set_string(tags::MOVE_DESTINATION, dest);
        }
        cmd.set_ushort(tags::COMMAND_DATA_SET_TYPE, DatasetType::Present as u16);
        cmd
    }

    pub fn query_retrieve_rsp(
        field: CommandField,
        message_id: u16,
        affected_sop_class_uid: impl Into<String>,
        status: u16,
        dataset_present: bool,
    ) -> Self {
        let mut cmd = CommandSet::new();
        cmd.set_string(tags::AFFECTED_SOP_CLASS_UID, affected_sop_class_uid);
        cmd.set_ushort(tags::COMMAND_FIELD, field as u16);
        cmd.set_ushort(tags::MESSAGE_ID_BEING_RESPONDED_TO, message_id);
        cmd.set_ushort(
            tags::COMMAND_DATA_SET_TYPE,
            (if dataset_present { DatasetType::Present } else { DatasetType::Absent }) as u16,
        );
        cmd.set_ushort(tags::STATUS, status);
        cmd
    }

    /// Encode to Implicit VR Little Endian bytes, with `(0000,0000)`
    /// CommandGroupLength computed and prefixed.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (tag, value) in self.0.iter().filter(|(t, _)| **t != tags::COMMAND_GROUP_LENGTH) {
            encode_one(&mut body, *tag, value);
        }

        let mut out = Vec::with_capacity(body.len() + 12);
        let header = ElementHeader {
            tag: tags::COMMAND_GROUP_LENGTH,
            vr: VR::UL,
            len: dicom_core::Length(4),
        };
        encode_implicit(&mut out, &header, Endianness::Little).expect("in-memory write cannot fail");
        basic::write_u32(&mut out, body.len() as u32, Endianness::Little).expect("in-memory write cannot fail");
        out.extend_from_slice(&body);
        out
    }

    /// Decode a complete command-set byte blob (as reassembled by the
    /// [`crate::dimse::assembler::Assembler`]).
    pub fn decode(bytes: &[u8]) -> UlResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let dict = StandardDataDictionary;
        let mut set = CommandSet::new();

        while basic::remaining(&mut cursor) > 0 {
            let (header, _) = decode_implicit(&mut cursor, Endianness::Little, &dict).map_err(|_| crate::error::Error::DecodingFailed)?;
            let value_bytes = basic::read_bytes(&mut cursor, header.len.0 as usize).map_err(|_| crate::error::Error::DecodingFailed)?;
            if header.tag == tags::COMMAND_GROUP_LENGTH {
                continue;
            }
            let value = decode_one(header.vr, value_bytes).ok_or(crate::error::Error::DecodingFailed)?;
            set.0.insert(header.tag, value);
        }
        Ok(set)
    }
}

fn encode_one(out: &mut Vec<u8>, tag: Tag, value: &Value) {
    match value {
        Value::UShort(v) => {
            let header = ElementHeader {
                tag,
                vr: VR::US,
                len: dicom_core::Length(2),
            };
            encode_implicit(&mut *out, &header, Endianness::Little).expect("in-memory write cannot fail");
            basic::write_u16(out, *v, Endianness::Little).expect("in-memory write cannot fail");
        }
        Value::ULong(v) => {
            let header = ElementHeader {
                tag,
                vr: VR::UL,
                len: dicom_core::Length(4),
            };
            encode_implicit(&mut *out, &header, Endianness::Little).expect("in-memory write cannot fail");
            basic::write_u32(out, *v, Endianness::Little).expect("in-memory write cannot fail");
        }
        Value::Text(s) => {
            let mut bytes = s.as_bytes().to_vec();
            if bytes.len() % 2 != 0 {
                bytes.push(0);
            }
            let header = ElementHeader {
                tag,
                vr: VR::UI,
                len: dicom_core::Length(bytes.len() as u32),
            };
            encode_implicit(&mut *out, &header, Endianness::Little).expect("in-memory write cannot fail");
            out.extend_from_slice(&bytes);
        }
    }
}

fn decode_one(vr: VR, bytes: &[u8]) -> Option<Value> {
    match vr {
        VR::US => {
            let mut c = Cursor::new(bytes);
            Some(Value::UShort(basic::read_u16(&mut c, Endianness::Little).ok()?))
        }
        VR::UL => {
            let mut c = Cursor::new(bytes);
            Some(Value::ULong(basic::read_u32(&mut c, Endianness::Little).ok()?))
        }
        _ => Some(Value::Text(
            String::from_utf8_lossy(bytes).trim_end_matches(['\0', ' ']).to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_echo_round_trips() {
        let cmd = CommandSet::c_echo_rq(1, "1.2.840.10008.1.1");
        let bytes = cmd.encode();
        let decoded = CommandSet::decode(&bytes).unwrap();
        assert_eq!(decoded.command_field(), Some(CommandField::C_ECHO_RQ));
        assert_eq!(decoded.message_id(), Some(1));
        assert_eq!(decoded.get_string(tags::AFFECTED_SOP_CLASS_UID), Some("1.2.840.10008.1.1"));
        assert_eq!(decoded.dataset_type().unwrap().is_present(), false);
    }

    #[test]
    fn group_length_covers_remaining_bytes() {
        let cmd = CommandSet::c_store_rq(7, "1.2.840.10008.5.1.4.1.1.7", "1.2.3.4", Priority::Medium);
        let bytes = cmd.encode();
        let mut c = Cursor::new(&bytes[..]);
        let dict = StandardDataDictionary;
        let (header, _) = decode_implicit(&mut c, Endianness::Little, &dict).unwrap();
        assert_eq!(header.tag, tags::COMMAND_GROUP_LENGTH);
        let declared = basic::read_u32(&mut c, Endianness::Little).unwrap();
        assert_eq!(declared as usize, bytes.len() - 12);
    }

    #[test]
    fn status_classification_matches_table() {
        assert_eq!(classify_status(0x0000), StatusClass::Success);
        assert_eq!(classify_status(0xB006), StatusClass::Warning);
        assert_eq!(classify_status(0x0001), StatusClass::Warning);
        assert_eq!(classify_status(0xA700), StatusClass::Refused);
        assert_eq!(classify_status(0xC000), StatusClass::Failed);
        assert_eq!(classify_status(0xFE00), StatusClass::Cancel);
        assert_eq!(classify_status(0xFF00), StatusClass::Pending);
    }
}
