//! `DataElement` and `DataSet` (§3 Core Data Model).

use std::collections::BTreeMap;

use dicom_core::{Header, Length, Tag, VR};

/// A single decoded data element.
///
/// Values are kept as raw wire bytes rather than a typed value enum: the
/// parser's job is framing (tags, VRs, lengths, item/sequence structure),
/// not interpreting date/string/numeric value semantics.
///
/// Invariant: at most one of `items`/`fragments` is populated, and only
/// for `vr == VR::SQ` (sets `items`) or `tag == Tag::PIXEL_DATA` with
/// undefined length (sets `fragments` and `offset_table`).
#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    pub tag: Tag,
    pub vr: VR,
    pub len: Length,
    pub value: Vec<u8>,
    pub items: Option<Vec<DataSet>>,
    pub fragments: Option<Vec<Vec<u8>>>,
    pub offset_table: Option<Vec<u32>>,
}

impl DataElement {
    pub(crate) fn primitive(tag: Tag, vr: VR, value: Vec<u8>) -> Self {
        let len = Length(value.len() as u32);
        DataElement {
            tag,
            vr,
            len,
            value,
            items: None,
            fragments: None,
            offset_table: None,
        }
    }

    pub(crate) fn sequence(tag: Tag, vr: VR, len: Length, items: Vec<DataSet>) -> Self {
        DataElement {
            tag,
            vr,
            len,
            value: Vec::new(),
            items: Some(items),
            fragments: None,
            offset_table: None,
        }
    }

    pub(crate) fn encapsulated(tag: Tag, vr: VR, offset_table: Vec<u32>, fragments: Vec<Vec<u8>>) -> Self {
        DataElement {
            tag,
            vr,
            len: Length::UNDEFINED,
            value: Vec::new(),
            items: None,
            fragments: Some(fragments),
            offset_table: Some(offset_table),
        }
    }

    /// Items of a sequence element, if this is one.
    pub fn items(&self) -> Option<&[DataSet]> {
        self.items.as_deref()
    }

    /// Compressed fragments of an encapsulated pixel-data element, if
    /// this is one.
    pub fn fragments(&self) -> Option<&[Vec<u8>]> {
        self.fragments.as_deref()
    }
}

impl Header for DataElement {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn len(&self) -> Length {
        self.len
    }
}

/// A mapping from [`Tag`] to [`DataElement`] with stable tag-order
/// iteration, backed by a `BTreeMap` since `Tag`'s derived ordering is
/// already group-then-element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet(BTreeMap<Tag, DataElement>);

impl DataSet {
    pub fn new() -> Self {
        DataSet(BTreeMap::new())
    }

    pub fn insert(&mut self, element: DataElement) -> Option<DataElement> {
        self.0.insert(element.tag, element)
    }

    pub fn get(&self, tag: Tag) -> Option<&DataElement> {
        self.0.get(&tag)
    }

    pub fn contains_tag(&self, tag: Tag) -> bool {
        self.0.contains_key(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &DataElement)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = (&'a Tag, &'a DataElement);
    type IntoIter = std::collections::btree_map::Iter<'a, Tag, DataElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
