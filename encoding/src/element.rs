//! Explicit- and implicit-VR element-header codecs (§4.2 "Element parsing").

use std::io::{Cursor, Write};

use dicom_core::vr::LengthField;
use dicom_core::{Length, Tag, VR};
use snafu::OptionExt;

use crate::basic::{self, Endianness};
use crate::error::{InvalidVrSnafu, Result};

/// A decoded (or to-be-encoded) element header: tag, VR, and declared
/// length (possibly undefined).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub tag: Tag,
    pub vr: VR,
    pub len: Length,
}

/// Resolves the value representation of a tag encountered under Implicit
/// VR Little Endian, where the wire format carries no VR of its own.
/// Implemented by `dicom-dictionary-std`'s dictionary types.
pub trait VrLookup {
    /// Look up the typical VR for `tag`. Unknown tags take `VR::UN`,
    /// per §4.2.
    fn vr_for(&self, tag: Tag) -> VR;
}

/// Decode an explicit-VR element header. Returns the header and the
/// number of bytes consumed (8 for short-form VRs, 12 for long-form).
pub fn decode_explicit(cursor: &mut Cursor<&[u8]>, endianness: Endianness) -> Result<(ElementHeader, usize)> {
    let group = basic::read_u16(cursor, endianness)?;
    let element = basic::read_u16(cursor, endianness)?;
    let tag = Tag(group, element);

    let vr_bytes = basic::read_bytes(cursor, 2)?;
    let vr_bytes = [vr_bytes[0], vr_bytes[1]];
    let vr = VR::from_bytes(vr_bytes).context(InvalidVrSnafu { bytes: vr_bytes, tag })?;

    let (len, bytes_read) = match vr.length_field() {
        LengthField::Short => (basic::read_u16(cursor, endianness)? as u32, 8),
        LengthField::Long => {
            basic::skip(cursor, 2)?;
            (basic::read_u32(cursor, endianness)?, 12)
        }
    };

    Ok((
        ElementHeader {
            tag,
            vr,
            len: Length(len),
        },
        bytes_read,
    ))
}

/// Decode an implicit-VR element header: tag(4) + length(4), with the VR
/// resolved from `dict`. Always consumes 8 bytes.
pub fn decode_implicit<D: VrLookup + ?Sized>(
    cursor: &mut Cursor<&[u8]>,
    endianness: Endianness,
    dict: &D,
) -> Result<(ElementHeader, usize)> {
    let group = basic::read_u16(cursor, endianness)?;
    let element = basic::read_u16(cursor, endianness)?;
    let tag = Tag(group, element);
    let len = basic::read_u32(cursor, endianness)?;
    let vr = dict.vr_for(tag);
    Ok((
        ElementHeader {
            tag,
            vr,
            len: Length(len),
        },
        8,
    ))
}

/// Encode an explicit-VR element header.
pub fn encode_explicit<W: Write>(mut w: W, header: &ElementHeader, endianness: Endianness) -> std::io::Result<()> {
    basic::write_u16(&mut w, header.tag.group(), endianness)?;
    basic::write_u16(&mut w, header.tag.element(), endianness)?;
    w.write_all(&header.vr.to_bytes())?;
    match header.vr.length_field() {
        LengthField::Short => basic::write_u16(&mut w, header.len.0 as u16, endianness)?,
        LengthField::Long => {
            w.write_all(&[0, 0])?;
            basic::write_u32(&mut w, header.len.0, endianness)?;
        }
    }
    Ok(())
}

/// Encode an implicit-VR element header (tag + 4-byte length; the VR is
/// not written to the wire).
pub fn encode_implicit<W: Write>(mut w: W, header: &ElementHeader, endianness: Endianness) -> std::io::Result<()> {
    basic::write_u16(&mut w, header.tag.group(), endianness)?;
    basic::write_u16(&mut w, header.tag.element(), endianness)?;
    basic::write_u32(&mut w, header.len.0, endianness)
}

#[cfg(test)]
struct UnknownVrDictionary;

#[cfg(test)]
impl VrLookup for UnknownVrDictionary {
    fn vr_for(&self, _tag: Tag) -> VR {
        VR::UN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_short_form_round_trips() {
        let header = ElementHeader {
            tag: Tag(0x0008, 0x0060),
            vr: VR::CS,
            len: Length(2),
        };
        let mut buf = Vec::new();
        encode_explicit(&mut buf, &header, Endianness::Little).unwrap();
        assert_eq!(buf.len(), 8);
        let mut cursor = Cursor::new(&buf[..]);
        let (decoded, n) = decode_explicit(&mut cursor, Endianness::Little).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(n, 8);
    }

    #[test]
    fn explicit_long_form_round_trips() {
        let header = ElementHeader {
            tag: Tag::PIXEL_DATA,
            vr: VR::OB,
            len: Length::UNDEFINED,
        };
        let mut buf = Vec::new();
        encode_explicit(&mut buf, &header, Endianness::Little).unwrap();
        assert_eq!(buf.len(), 12);
        let mut cursor = Cursor::new(&buf[..]);
        let (decoded, n) = decode_explicit(&mut cursor, Endianness::Little).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(n, 12);
    }

    #[test]
    fn implicit_resolves_vr_from_dictionary() {
        let mut buf = Vec::new();
        basic::write_u16(&mut buf, 0x0008, Endianness::Little).unwrap();
        basic::write_u16(&mut buf, 0x0060, Endianness::Little).unwrap();
        basic::write_u32(&mut buf, 2, Endianness::Little).unwrap();
        let mut cursor = Cursor::new(&buf[..]);
        let (decoded, n) = decode_implicit(&mut cursor, Endianness::Little, &UnknownVrDictionary).unwrap();
        assert_eq!(decoded.vr, VR::UN);
        assert_eq!(n, 8);
    }
}
