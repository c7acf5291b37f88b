//! Core data types shared by every layer of the toolkit: the attribute
//! `Tag`, the `VR` value-representation code, element `Length`, and the
//! `AeTitle` wire type. Pure and reentrant; no I/O.

pub mod ae;
pub mod length;
pub mod observability;
pub mod tag;
pub mod uid;
pub mod vr;

pub use ae::AeTitle;
pub use length::Length;
pub use tag::Tag;
pub use vr::VR;

/// A trait for any data type that carries a DICOM element header.
pub trait Header {
    /// The element's tag.
    fn tag(&self) -> Tag;
    /// The element's declared length, which may be undefined.
    fn len(&self) -> Length;

    /// Whether this is the header of a sequence/encapsulated-pixel-data item.
    fn is_item(&self) -> bool {
        self.tag() == Tag::ITEM
    }

    /// Whether this is the header of an item delimiter.
    fn is_item_delimiter(&self) -> bool {
        self.tag() == Tag::ITEM_DELIMITATION
    }

    /// Whether this is the header of a sequence delimiter.
    fn is_sequence_delimiter(&self) -> bool {
        self.tag() == Tag::SEQUENCE_DELIMITATION
    }
}
