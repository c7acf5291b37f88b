//! The small transfer-syntax table §4.2 requires: the four syntaxes the
//! parser must fully decode, plus the JPEG family, which is recognized
//! and framed (encapsulated items parsed) but left opaque — compressed
//! pixel-data decoding is out of scope (spec.md §1 Non-goals).

use byteordered::Endianness;

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";

pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
pub const JPEG_EXTENDED: &str = "1.2.840.10008.1.2.4.51";
pub const JPEG_LOSSLESS_NON_HIERARCHICAL: &str = "1.2.840.10008.1.2.4.57";
pub const JPEG_LOSSLESS_SV1: &str = "1.2.840.10008.1.2.4.70";
pub const JPEG_LS_LOSSLESS: &str = "1.2.840.10008.1.2.4.80";
pub const JPEG_LS_NEAR_LOSSLESS: &str = "1.2.840.10008.1.2.4.81";
pub const JPEG_2000_LOSSLESS: &str = "1.2.840.10008.1.2.4.90";
pub const JPEG_2000: &str = "1.2.840.10008.1.2.4.91";
pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";

const JPEG_FAMILY: &[&str] = &[
    JPEG_BASELINE,
    JPEG_EXTENDED,
    JPEG_LOSSLESS_NON_HIERARCHICAL,
    JPEG_LOSSLESS_SV1,
    JPEG_LS_LOSSLESS,
    JPEG_LS_NEAR_LOSSLESS,
    JPEG_2000_LOSSLESS,
    JPEG_2000,
    RLE_LOSSLESS,
];

/// A transfer syntax's decoding parameters, resolved from its UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSyntax {
    pub uid: &'static str,
    pub explicit_vr: bool,
    pub byte_order: Endianness,
    pub encapsulated_pixel_data: bool,
    pub deflated: bool,
}

impl TransferSyntax {
    /// Resolve a transfer syntax by UID, tolerating a trailing NUL/space
    /// padding byte as found in wire UID fields.
    pub fn for_uid(uid: &str) -> Option<Self> {
        let uid = dicom_core::uid::trim_uid(uid);
        if let Some(&known) = JPEG_FAMILY.iter().find(|&&u| u == uid) {
            return Some(TransferSyntax {
                uid: known,
                explicit_vr: true,
                byte_order: Endianness::Little,
                encapsulated_pixel_data: true,
                deflated: false,
            });
        }
        Some(match uid {
            IMPLICIT_VR_LITTLE_ENDIAN => TransferSyntax {
                uid: IMPLICIT_VR_LITTLE_ENDIAN,
                explicit_vr: false,
                byte_order: Endianness::Little,
                encapsulated_pixel_data: false,
                deflated: false,
            },
            EXPLICIT_VR_LITTLE_ENDIAN => TransferSyntax {
                uid: EXPLICIT_VR_LITTLE_ENDIAN,
                explicit_vr: true,
                byte_order: Endianness::Little,
                encapsulated_pixel_data: false,
                deflated: false,
            },
            EXPLICIT_VR_BIG_ENDIAN => TransferSyntax {
                uid: EXPLICIT_VR_BIG_ENDIAN,
                explicit_vr: true,
                byte_order: Endianness::Big,
                encapsulated_pixel_data: false,
                deflated: false,
            },
            DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => TransferSyntax {
                uid: DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
                explicit_vr: true,
                byte_order: Endianness::Little,
                encapsulated_pixel_data: false,
                deflated: true,
            },
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_the_four_required_syntaxes() {
        assert!(!TransferSyntax::for_uid(IMPLICIT_VR_LITTLE_ENDIAN).unwrap().explicit_vr);
        assert!(TransferSyntax::for_uid(EXPLICIT_VR_LITTLE_ENDIAN).unwrap().explicit_vr);
        assert_eq!(
            TransferSyntax::for_uid(EXPLICIT_VR_BIG_ENDIAN).unwrap().byte_order,
            Endianness::Big
        );
        assert!(TransferSyntax::for_uid(DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN).unwrap().deflated);
    }

    #[test]
    fn recognizes_jpeg_family_as_encapsulated_and_opaque() {
        let ts = TransferSyntax::for_uid(JPEG_BASELINE).unwrap();
        assert!(ts.encapsulated_pixel_data);
        assert!(ts.explicit_vr);
    }

    #[test]
    fn tolerates_trailing_nul_padding() {
        let padded = format!("{EXPLICIT_VR_LITTLE_ENDIAN}\0");
        assert!(TransferSyntax::for_uid(&padded).is_some());
    }

    #[test]
    fn unknown_uid_is_none() {
        assert!(TransferSyntax::for_uid("1.2.3.4.5.not.real").is_none());
    }
}
