//! The recursive-descent dataset decoder (§4.2 Element parsing): shared
//! by file meta, the main dataset, sequence items, and (bounded) nested
//! sequences.

use std::io::Cursor;

use dicom_core::{Length, Tag, VR};
use dicom_encoding::{basic, element, Endianness};

use crate::dataset::{DataElement, DataSet};
use crate::error::Error;

/// Sequence nesting is bounded against adversarial/corrupt input, per
/// §4.2 "Recursive sequence parsing".
pub const MAX_SEQUENCE_DEPTH: usize = 64;

/// Internal failure from decoding a single element or a bounded region;
/// carries no partial dataset of its own — the caller (which owns the
/// accumulating [`DataSet`]) attaches that when converting to the public
/// [`Error`].
#[derive(Debug, Clone, Copy)]
pub(crate) enum ElemErr {
    Truncated,
    Malformed(Tag),
    UnsupportedUndefinedLength(Tag),
}

impl ElemErr {
    pub(crate) fn into_error(self, partial: DataSet) -> Error {
        match self {
            ElemErr::Truncated => Error::Truncated { partial },
            ElemErr::Malformed(tag) => Error::MalformedElement { tag, partial },
            ElemErr::UnsupportedUndefinedLength(tag) => Error::UnsupportedUndefinedLength { tag, partial },
        }
    }
}

/// What ends a call to [`decode_dataset`].
#[derive(Debug, Clone, Copy)]
pub(crate) enum StopCondition {
    /// Consume until the cursor reaches a byte position (a defined-length
    /// sequence item or SQ value).
    Limit(u64),
    /// Consume until a specific control tag is encountered (an
    /// undefined-length item, ended by Item Delimitation; or an
    /// undefined-length sequence, ended by Sequence Delimitation). The
    /// control tag's own 8-byte header is consumed and not returned to
    /// the caller.
    ControlTag(Tag),
    /// Consume while the next tag's group matches (File Meta Information,
    /// which ends at the first element outside group 0002). The tag that
    /// breaks the loop is left unconsumed.
    WhileGroup(u16),
    /// Consume until the underlying buffer is exhausted (the outermost
    /// main dataset).
    EndOfBuffer,
}

fn peek_tag(cursor: &mut Cursor<&[u8]>, endianness: Endianness) -> Result<Tag, ElemErr> {
    let save = cursor.position();
    let group = basic::read_u16(cursor, endianness).map_err(|_| ElemErr::Truncated)?;
    let element = basic::read_u16(cursor, endianness).map_err(|_| ElemErr::Truncated)?;
    cursor.set_position(save);
    Ok(Tag(group, element))
}

/// Read a bare tag+length control header (no VR), as used by item
/// introducers and item/sequence delimiters.
fn read_item_header(cursor: &mut Cursor<&[u8]>, endianness: Endianness) -> Result<(Tag, Length), ElemErr> {
    let group = basic::read_u16(cursor, endianness).map_err(|_| ElemErr::Truncated)?;
    let element = basic::read_u16(cursor, endianness).map_err(|_| ElemErr::Truncated)?;
    let len = basic::read_u32(cursor, endianness).map_err(|_| ElemErr::Truncated)?;
    Ok((Tag(group, element), Length(len)))
}

/// Decode a run of sibling elements until `stop` is satisfied or an error
/// occurs. Returns whatever was decoded, plus the error (if any) that
/// cut parsing short.
pub(crate) fn decode_dataset<D: element::VrLookup + ?Sized>(
    cursor: &mut Cursor<&[u8]>,
    endianness: Endianness,
    explicit_vr: bool,
    dict: &D,
    depth: usize,
    stop: StopCondition,
) -> (DataSet, Option<ElemErr>) {
    let mut set = DataSet::new();
    loop {
        match stop {
            StopCondition::Limit(limit) => {
                if cursor.position() >= limit {
                    break;
                }
            }
            StopCondition::EndOfBuffer | StopCondition::WhileGroup(_) => {
                // Both conditions terminate cleanly at end of buffer: File
                // Meta Information and the outermost dataset carry no
                // closing delimiter of their own.
                if basic::remaining(cursor) == 0 {
                    break;
                }
            }
            StopCondition::ControlTag(_) => {
                if basic::remaining(cursor) == 0 {
                    return (set, Some(ElemErr::Truncated));
                }
            }
        }

        let next_tag = match peek_tag(cursor, endianness) {
            Ok(t) => t,
            Err(e) => return (set, Some(e)),
        };

        match stop {
            StopCondition::ControlTag(control) if next_tag == control => {
                if read_item_header(cursor, endianness).is_err() {
                    return (set, Some(ElemErr::Truncated));
                }
                break;
            }
            StopCondition::WhileGroup(group) if next_tag.group() != group => break,
            _ => {}
        }

        let header = if explicit_vr {
            element::decode_explicit(cursor, endianness)
        } else {
            element::decode_implicit(cursor, endianness, dict)
        };
        let (header, _consumed) = match header {
            Ok(h) => h,
            Err(_) => return (set, Some(ElemErr::Truncated)),
        };

        match decode_value(cursor, endianness, explicit_vr, dict, depth, header) {
            Ok(element) => {
                if let StopCondition::Limit(limit) = stop {
                    if cursor.position() > limit {
                        return (set, Some(ElemErr::Malformed(header.tag)));
                    }
                }
                set.insert(element);
            }
            Err(e) => return (set, Some(e)),
        }
    }
    (set, None)
}

fn decode_value<D: element::VrLookup + ?Sized>(
    cursor: &mut Cursor<&[u8]>,
    endianness: Endianness,
    explicit_vr: bool,
    dict: &D,
    depth: usize,
    header: element::ElementHeader,
) -> Result<DataElement, ElemErr> {
    let element::ElementHeader { tag, vr, len } = header;

    if vr == VR::SQ {
        if depth >= MAX_SEQUENCE_DEPTH {
            return Err(ElemErr::Malformed(tag));
        }
        let items = decode_sequence_items(cursor, endianness, explicit_vr, dict, depth + 1, len)?;
        return Ok(DataElement::sequence(tag, vr, len, items));
    }

    if tag == Tag::PIXEL_DATA && len.is_undefined() && matches!(vr, VR::OB | VR::OW) {
        let (offset_table, fragments) = decode_encapsulated_pixel_data(cursor, endianness)?;
        return Ok(DataElement::encapsulated(tag, vr, offset_table, fragments));
    }

    let Some(n) = len.get() else {
        return Err(ElemErr::UnsupportedUndefinedLength(tag));
    };
    let bytes = basic::read_bytes(cursor, n as usize).map_err(|_| ElemErr::Truncated)?;
    Ok(DataElement::primitive(tag, vr, bytes.to_vec()))
}

fn decode_sequence_items<D: element::VrLookup + ?Sized>(
    cursor: &mut Cursor<&[u8]>,
    endianness: Endianness,
    explicit_vr: bool,
    dict: &D,
    depth: usize,
    len: Length,
) -> Result<Vec<DataSet>, ElemErr> {
    let mut items = Vec::new();
    let limit = len.get().map(|n| cursor.position() + n as u64);

    loop {
        if let Some(limit) = limit {
            if cursor.position() >= limit {
                break;
            }
        }
        let (item_tag, item_len) = read_item_header(cursor, endianness)?;
        if limit.is_none() && item_tag == Tag::SEQUENCE_DELIMITATION {
            break;
        }
        if item_tag != Tag::ITEM {
            return Err(ElemErr::Malformed(item_tag));
        }

        let item_set = if let Some(item_limit) = item_len.get() {
            let limit = cursor.position() + item_limit as u64;
            let (set, err) = decode_dataset(cursor, endianness, explicit_vr, dict, depth, StopCondition::Limit(limit));
            match err {
                None => set,
                Some(e) => return Err(e),
            }
        } else {
            let (set, err) = decode_dataset(
                cursor,
                endianness,
                explicit_vr,
                dict,
                depth,
                StopCondition::ControlTag(Tag::ITEM_DELIMITATION),
            );
            match err {
                None => set,
                Some(e) => return Err(e),
            }
        };
        items.push(item_set);
    }

    if let Some(limit) = limit {
        // A defined-length SQ whose items don't sum exactly to the
        // declared length is a hard error, not a silent stop-at-boundary.
        if cursor.position() != limit {
            return Err(ElemErr::Malformed(Tag::ITEM));
        }
    }

    Ok(items)
}

/// Encapsulated PixelData: first item is the Basic Offset Table, always
/// little-endian u32 entries regardless of the dataset's byte order
/// (§4.2); subsequent items are opaque compressed fragments, until
/// Sequence Delimitation.
fn decode_encapsulated_pixel_data(
    cursor: &mut Cursor<&[u8]>,
    endianness: Endianness,
) -> Result<(Vec<u32>, Vec<Vec<u8>>), ElemErr> {
    let (tag, bot_len) = read_item_header(cursor, endianness)?;
    if tag != Tag::ITEM {
        return Err(ElemErr::Malformed(tag));
    }
    let bot_len = bot_len.get().ok_or(ElemErr::Malformed(tag))? as usize;
    let bot_bytes = basic::read_bytes(cursor, bot_len).map_err(|_| ElemErr::Truncated)?;
    let offset_table = bot_bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let mut fragments = Vec::new();
    loop {
        let (tag, frag_len) = read_item_header(cursor, endianness)?;
        if tag == Tag::SEQUENCE_DELIMITATION {
            break;
        }
        if tag != Tag::ITEM {
            return Err(ElemErr::Malformed(tag));
        }
        let frag_len = frag_len.get().ok_or(ElemErr::Malformed(tag))? as usize;
        let bytes = basic::read_bytes(cursor, frag_len).map_err(|_| ElemErr::Truncated)?;
        fragments.push(bytes.to_vec());
    }

    Ok((offset_table, fragments))
}
