//! A DICOM data dictionary (tag → VR). Per the toolkit's scope, the full
//! dictionary table is treated as an external reference table (a large,
//! shape-trivial `tag -> {name, keyword, VR list, VM, retired}` mapping);
//! this crate provides only the interface and a representative subset of
//! entries sufficient to resolve implicit-VR elements commonly seen in
//! file meta, DIMSE command sets, and composite image objects.

use dicom_core::{Tag, VR};
use dicom_encoding::VrLookup;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A dictionary entry: a tag's typical value representation.
pub trait DictionaryEntry {
    fn tag(&self) -> Tag;
    fn vr(&self) -> VR;
}

/// Type trait for a dictionary of DICOM attributes, resolving a tag to
/// its typical VR. Object-safe so it can be used as a trait object.
pub trait DataDictionary: std::fmt::Debug {
    /// Fetch the VR typically associated with `tag`, if known.
    fn vr_of(&self, tag: Tag) -> Option<VR>;
}

/// An empty dictionary: every tag is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubDataDictionary;

impl DataDictionary for StubDataDictionary {
    fn vr_of(&self, _tag: Tag) -> Option<VR> {
        None
    }
}

impl VrLookup for StubDataDictionary {
    fn vr_for(&self, _tag: Tag) -> VR {
        VR::UN
    }
}

/// The standard DICOM dictionary, populated with the subset of PS3.6
/// entries this toolkit's tests and DIMSE command-set handling rely on.
/// Unlisted tags resolve to `VR::UN`, per §4.2.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDataDictionary;

impl DataDictionary for StandardDataDictionary {
    fn vr_of(&self, tag: Tag) -> Option<VR> {
        ENTRIES.get(&tag).copied()
    }
}

impl VrLookup for StandardDataDictionary {
    fn vr_for(&self, tag: Tag) -> VR {
        self.vr_of(tag).unwrap_or(VR::UN)
    }
}

/// Commonly used tags, exposed as named constants for readability at call
/// sites (mirrors `dicom_dictionary_std::tags` upstream, trimmed to the
/// subset this toolkit needs).
pub mod tags {
    use dicom_core::Tag;

    pub const COMMAND_GROUP_LENGTH: Tag = Tag(0x0000, 0x0000);
    pub const AFFECTED_SOP_CLASS_UID: Tag = Tag(0x0000, 0x0002);
    pub const REQUESTED_SOP_CLASS_UID: Tag = Tag(0x0000, 0x0003);
    pub const COMMAND_FIELD: Tag = Tag(0x0000, 0x0100);
    pub const MESSAGE_ID: Tag = Tag(0x0000, 0x0110);
    pub const MESSAGE_ID_BEING_RESPONDED_TO: Tag = Tag(0x0000, 0x0120);
    pub const MOVE_DESTINATION: Tag = Tag(0x0000, 0x0600);
    pub const PRIORITY: Tag = Tag(0x0000, 0x0700);
    pub const COMMAND_DATA_SET_TYPE: Tag = Tag(0x0000, 0x0800);
    pub const STATUS: Tag = Tag(0x0000, 0x0900);
    pub const AFFECTED_SOP_INSTANCE_UID: Tag = Tag(0x0000, 0x1000);
    pub const REQUESTED_SOP_INSTANCE_UID: Tag = Tag(0x0000, 0x1001);
    pub const NUMBER_OF_REMAINING_SUBOPERATIONS: Tag = Tag(0x0000, 0x1020);
    pub const NUMBER_OF_COMPLETED_SUBOPERATIONS: Tag = Tag(0x0000, 0x1021);
    pub const NUMBER_OF_FAILED_SUBOPERATIONS: Tag = Tag(0x0000, 0x1022);
    pub const NUMBER_OF_WARNING_SUBOPERATIONS: Tag = Tag(0x0000, 0x1023);

    pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
    pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
    pub const MODALITY: Tag = Tag(0x0008, 0x0060);

    pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
    pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);

    pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
    pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);

    pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);
}

static ENTRIES: Lazy<HashMap<Tag, VR>> = Lazy::new(|| {
    use VR::*;
    let mut m = HashMap::new();
    // group 0000: DIMSE command set
    m.insert(Tag(0x0000, 0x0000), UL); // CommandGroupLength
    m.insert(Tag(0x0000, 0x0002), UI); // AffectedSOPClassUID
    m.insert(Tag(0x0000, 0x0003), UI); // RequestedSOPClassUID
    m.insert(Tag(0x0000, 0x0100), US); // CommandField
    m.insert(Tag(0x0000, 0x0110), US); // MessageID
    m.insert(Tag(0x0000, 0x0120), US); // MessageIDBeingRespondedTo
    m.insert(Tag(0x0000, 0x0600), AE); // MoveDestination
    m.insert(Tag(0x0000, 0x0700), US); // Priority
    m.insert(Tag(0x0000, 0x0800), US); // CommandDataSetType
    m.insert(Tag(0x0000, 0x0900), US); // Status
    m.insert(Tag(0x0000, 0x0901), AT); // OffendingElement
    m.insert(Tag(0x0000, 0x0902), LO); // ErrorComment
    m.insert(Tag(0x0000, 0x1000), UI); // AffectedSOPInstanceUID
    m.insert(Tag(0x0000, 0x1001), UI); // RequestedSOPInstanceUID
    m.insert(Tag(0x0000, 0x1002), US); // EventTypeID
    m.insert(Tag(0x0000, 0x1005), AT); // AttributeIdentifierList
    m.insert(Tag(0x0000, 0x1008), US); // ActionTypeID
    m.insert(Tag(0x0000, 0x1020), US); // NumberOfRemainingSuboperations
    m.insert(Tag(0x0000, 0x1021), US); // NumberOfCompletedSuboperations
    m.insert(Tag(0x0000, 0x1022), US); // NumberOfFailedSuboperations
    m.insert(Tag(0x0000, 0x1023), US); // NumberOfWarningSuboperations

    // group 0002: file meta (always parsed as explicit VR; listed for completeness)
    m.insert(Tag(0x0002, 0x0000), UL); // FileMetaInformationGroupLength
    m.insert(Tag(0x0002, 0x0001), OB); // FileMetaInformationVersion
    m.insert(Tag(0x0002, 0x0002), UI); // MediaStorageSOPClassUID
    m.insert(Tag(0x0002, 0x0003), UI); // MediaStorageSOPInstanceUID
    m.insert(Tag(0x0002, 0x0010), UI); // TransferSyntaxUID
    m.insert(Tag(0x0002, 0x0012), UI); // ImplementationClassUID
    m.insert(Tag(0x0002, 0x0013), SH); // ImplementationVersionName
    m.insert(Tag(0x0002, 0x0016), AE); // SourceApplicationEntityTitle

    // common identification / composite-object attributes
    m.insert(Tag(0x0008, 0x0005), CS); // SpecificCharacterSet
    m.insert(Tag(0x0008, 0x0016), UI); // SOPClassUID
    m.insert(Tag(0x0008, 0x0018), UI); // SOPInstanceUID
    m.insert(Tag(0x0008, 0x0020), DA); // StudyDate
    m.insert(Tag(0x0008, 0x0030), TM); // StudyTime
    m.insert(Tag(0x0008, 0x0050), SH); // AccessionNumber
    m.insert(Tag(0x0008, 0x0060), CS); // Modality
    m.insert(Tag(0x0008, 0x0090), PN); // ReferringPhysicianName
    m.insert(Tag(0x0008, 0x1030), LO); // StudyDescription
    m.insert(Tag(0x0008, 0x103E), LO); // SeriesDescription

    m.insert(Tag(0x0010, 0x0010), PN); // PatientName
    m.insert(Tag(0x0010, 0x0020), LO); // PatientID
    m.insert(Tag(0x0010, 0x0030), DA); // PatientBirthDate
    m.insert(Tag(0x0010, 0x0040), CS); // PatientSex

    m.insert(Tag(0x0020, 0x000D), UI); // StudyInstanceUID
    m.insert(Tag(0x0020, 0x000E), UI); // SeriesInstanceUID
    m.insert(Tag(0x0020, 0x0010), SH); // StudyID
    m.insert(Tag(0x0020, 0x0011), IS); // SeriesNumber
    m.insert(Tag(0x0020, 0x0013), IS); // InstanceNumber

    m.insert(Tag(0x0028, 0x0002), US); // SamplesPerPixel
    m.insert(Tag(0x0028, 0x0004), CS); // PhotometricInterpretation
    m.insert(Tag(0x0028, 0x0010), US); // Rows
    m.insert(Tag(0x0028, 0x0011), US); // Columns
    m.insert(Tag(0x0028, 0x0100), US); // BitsAllocated
    m.insert(Tag(0x0028, 0x0101), US); // BitsStored
    m.insert(Tag(0x0028, 0x0102), US); // HighBit
    m.insert(Tag(0x0028, 0x0103), US); // PixelRepresentation

    m.insert(Tag(0x7FE0, 0x0010), OW); // PixelData

    m
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_is_always_unknown() {
        assert_eq!(StubDataDictionary.vr_of(tags::PATIENT_NAME), None);
    }

    #[test]
    fn standard_resolves_known_tags() {
        assert_eq!(StandardDataDictionary.vr_of(tags::PATIENT_NAME), Some(VR::PN));
        assert_eq!(StandardDataDictionary.vr_of(tags::SOP_INSTANCE_UID), Some(VR::UI));
    }

    #[test]
    fn standard_falls_back_to_un_via_vr_lookup() {
        assert_eq!(StandardDataDictionary.vr_for(Tag(0x0009, 0x0001)), VR::UN);
    }
}
