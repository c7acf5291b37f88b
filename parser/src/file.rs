//! Part 10 file parsing: preamble + "DICM" marker, File Meta Information,
//! then the main dataset under the negotiated transfer syntax (§4.2).

use std::io::{Cursor, Read};

use dicom_core::Tag;
use dicom_dictionary_std::{StandardDataDictionary, StubDataDictionary};
use dicom_encoding::Endianness;
use snafu::OptionExt;

use crate::dataset::DataSet;
use crate::decode::{decode_dataset, StopCondition};
use crate::error::{MissingDicmMarkerSnafu, Result, TooShortSnafu, TruncatedSnafu, UnsupportedTransferSyntaxSnafu};
use crate::transfer_syntax::{TransferSyntax, EXPLICIT_VR_LITTLE_ENDIAN};

const PREAMBLE_LEN: usize = 128;
const DICM_MARKER: &[u8; 4] = b"DICM";

/// `(0002,0010) TransferSyntaxUID`.
const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);

/// A parsed Part 10 file: File Meta Information (group 0002 only) plus
/// the main dataset decoded under its transfer syntax.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DicomFile {
    pub file_meta: DataSet,
    pub main: DataSet,
}

/// Parse a complete Part 10 file from an in-memory buffer.
///
/// On a malformed or truncated main dataset, the elements decoded before
/// the failure are not discarded: they are attached to the returned
/// error's `partial` field, per §4.2's Failure Policy. Absence of Pixel
/// Data is not itself an error.
pub fn read_file(bytes: &[u8]) -> Result<DicomFile> {
    if bytes.len() < PREAMBLE_LEN + 4 {
        return TooShortSnafu { len: bytes.len() }.fail();
    }
    if &bytes[PREAMBLE_LEN..PREAMBLE_LEN + 4] != DICM_MARKER {
        return MissingDicmMarkerSnafu.fail();
    }

    let mut meta_cursor = Cursor::new(&bytes[PREAMBLE_LEN + 4..]);
    let (file_meta, err) = decode_dataset(
        &mut meta_cursor,
        Endianness::Little,
        true,
        &StubDataDictionary,
        0,
        StopCondition::WhileGroup(0x0002),
    );
    if let Some(e) = err {
        return Err(e.into_error(file_meta));
    }

    let ts_uid = file_meta
        .get(TRANSFER_SYNTAX_UID)
        .and_then(|element| std::str::from_utf8(&element.value).ok())
        .map(|s| dicom_core::uid::trim_uid(s).to_string())
        .unwrap_or_else(|| EXPLICIT_VR_LITTLE_ENDIAN.to_string());

    let transfer_syntax = TransferSyntax::for_uid(&ts_uid).context(UnsupportedTransferSyntaxSnafu { uid: ts_uid })?;

    let remaining = &meta_cursor.get_ref()[meta_cursor.position() as usize..];
    let inflated;
    let main_bytes: &[u8] = if transfer_syntax.deflated {
        let mut decoder = flate2::read::DeflateDecoder::new(remaining);
        let mut buf = Vec::new();
        if decoder.read_to_end(&mut buf).is_err() {
            return TruncatedSnafu { partial: DataSet::new() }.fail();
        }
        inflated = buf;
        &inflated
    } else {
        remaining
    };

    let dict = StandardDataDictionary;
    let mut main_cursor = Cursor::new(main_bytes);
    let (main, err) = decode_dataset(
        &mut main_cursor,
        transfer_syntax.byte_order,
        transfer_syntax.explicit_vr,
        &dict,
        0,
        StopCondition::EndOfBuffer,
    );

    match err {
        None => Ok(DicomFile { file_meta, main }),
        Some(e) => Err(e.into_error(main)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::VR;
    use dicom_encoding::{basic, element};

    fn write_explicit_element(buf: &mut Vec<u8>, tag: Tag, vr: VR, value: &[u8]) {
        use dicom_core::Length;
        let header = element::ElementHeader {
            tag,
            vr,
            len: Length(value.len() as u32),
        };
        element::encode_explicit(&mut *buf, &header, Endianness::Little).unwrap();
        buf.extend_from_slice(value);
    }

    fn minimal_file(transfer_syntax_uid: &str, main: impl Fn(&mut Vec<u8>)) -> Vec<u8> {
        let mut out = vec![0u8; PREAMBLE_LEN];
        out.extend_from_slice(DICM_MARKER);

        let mut meta = Vec::new();
        let mut ts_value = transfer_syntax_uid.as_bytes().to_vec();
        if ts_value.len() % 2 != 0 {
            ts_value.push(0);
        }
        write_explicit_element(&mut meta, TRANSFER_SYNTAX_UID, VR::UI, &ts_value);
        out.extend_from_slice(&meta);

        main(&mut out);
        out
    }

    #[test]
    fn rejects_short_buffers() {
        let err = read_file(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, crate::error::Error::TooShort { .. }));
    }

    #[test]
    fn rejects_missing_marker() {
        let buf = vec![0u8; 140];
        let err = read_file(&buf).unwrap_err();
        assert!(matches!(err, crate::error::Error::MissingDicmMarker));
    }

    #[test]
    fn parses_explicit_vr_little_endian_main_dataset() {
        let bytes = minimal_file(super::EXPLICIT_VR_LITTLE_ENDIAN, |out| {
            write_explicit_element(out, Tag(0x0008, 0x0060), VR::CS, b"CT");
        });
        let file = read_file(&bytes).unwrap();
        let modality = file.main.get(Tag(0x0008, 0x0060)).unwrap();
        assert_eq!(&modality.value, b"CT");
    }

    #[test]
    fn parses_implicit_vr_little_endian_via_dictionary() {
        let bytes = minimal_file(crate::transfer_syntax::IMPLICIT_VR_LITTLE_ENDIAN, |out| {
            basic::write_u16(&mut *out, 0x0010, Endianness::Little).unwrap();
            basic::write_u16(&mut *out, 0x0010, Endianness::Little).unwrap();
            basic::write_u32(&mut *out, 8, Endianness::Little).unwrap();
            out.extend_from_slice(b"DOE^JOHN");
        });
        let file = read_file(&bytes).unwrap();
        let name = file.main.get(Tag(0x0010, 0x0010)).unwrap();
        assert_eq!(name.vr, VR::PN);
        assert_eq!(&name.value, b"DOE^JOHN");
    }

    #[test]
    fn unsupported_transfer_syntax_is_reported() {
        let bytes = minimal_file("1.2.3.4.5.not.real", |_| {});
        let err = read_file(&bytes).unwrap_err();
        assert!(matches!(err, crate::error::Error::UnsupportedTransferSyntax { .. }));
    }

    #[test]
    fn truncated_dataset_preserves_prior_elements() {
        let bytes = minimal_file(super::EXPLICIT_VR_LITTLE_ENDIAN, |out| {
            write_explicit_element(out, Tag(0x0008, 0x0060), VR::CS, b"CT");
            // a dangling element header with no value bytes behind it
            basic::write_u16(&mut *out, 0x0010, Endianness::Little).unwrap();
            basic::write_u16(&mut *out, 0x0010, Endianness::Little).unwrap();
            out.extend_from_slice(b"PN");
            basic::write_u16(&mut *out, 100, Endianness::Little).unwrap();
        });
        let err = read_file(&bytes).unwrap_err();
        match err {
            crate::error::Error::Truncated { partial } => {
                assert_eq!(partial.get(Tag(0x0008, 0x0060)).unwrap().value, b"CT");
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn nested_sequence_round_trips_items() {
        let bytes = minimal_file(super::EXPLICIT_VR_LITTLE_ENDIAN, |out| {
            // a defined-length SQ with one item holding one element
            let mut item_body = Vec::new();
            write_explicit_element(&mut item_body, Tag(0x0008, 0x0060), VR::CS, b"CT");

            let mut item = Vec::new();
            basic::write_u16(&mut item, Tag::ITEM.group(), Endianness::Little).unwrap();
            basic::write_u16(&mut item, Tag::ITEM.element(), Endianness::Little).unwrap();
            basic::write_u32(&mut item, item_body.len() as u32, Endianness::Little).unwrap();
            item.extend_from_slice(&item_body);

            use dicom_core::Length;
            let header = element::ElementHeader {
                tag: Tag(0x0040, 0xA730),
                vr: VR::SQ,
                len: Length(item.len() as u32),
            };
            element::encode_explicit(&mut *out, &header, Endianness::Little).unwrap();
            out.extend_from_slice(&item);
        });
        let file = read_file(&bytes).unwrap();
        let seq = file.main.get(Tag(0x0040, 0xA730)).unwrap();
        let items = seq.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get(Tag(0x0008, 0x0060)).unwrap().value, b"CT");
    }

    #[test]
    fn mismatched_sequence_length_is_malformed() {
        let bytes = minimal_file(super::EXPLICIT_VR_LITTLE_ENDIAN, |out| {
            use dicom_core::Length;
            // declares 4 bytes of content but provides none: the item
            // header itself overruns the declared SQ length.
            let header = element::ElementHeader {
                tag: Tag(0x0040, 0xA730),
                vr: VR::SQ,
                len: Length(4),
            };
            element::encode_explicit(&mut *out, &header, Endianness::Little).unwrap();
            basic::write_u16(&mut *out, Tag::ITEM.group(), Endianness::Little).unwrap();
            basic::write_u16(&mut *out, Tag::ITEM.element(), Endianness::Little).unwrap();
            basic::write_u32(&mut *out, 0, Endianness::Little).unwrap();
        });
        let err = read_file(&bytes).unwrap_err();
        assert!(matches!(err, crate::error::Error::MalformedElement { .. }));
    }
}
