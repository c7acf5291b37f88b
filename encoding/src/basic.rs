//! Bounds-checked, endian-aware primitive reads and writes over a byte
//! cursor (§4.1 Byte Codec).
//!
//! All wire integers in DICOM are little-endian except the PDU envelope
//! and sub-item lengths defined by PS3.8, which are big-endian; this
//! module exposes both families via [`byteordered::Endianness`] and
//! leaves the choice to the caller.

use std::io::{Cursor, Read, Write};

pub use byteordered::Endianness;
use byteordered::ByteOrdered;

use crate::error::{Result, ShortReadSnafu};
use snafu::ensure;

/// Ensure that at least `needed` bytes remain in `cursor` before reading.
/// On failure the cursor position is left unchanged, satisfying the
/// "cursor advances only on success" contract.
fn check_remaining(cursor: &Cursor<&[u8]>, needed: usize) -> Result<()> {
    let available = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    ensure!(available >= needed, ShortReadSnafu { needed, available });
    Ok(())
}

/// Read a `u16` in the given byte order.
pub fn read_u16(cursor: &mut Cursor<&[u8]>, endianness: Endianness) -> Result<u16> {
    check_remaining(cursor, 2)?;
    Ok(ByteOrdered::runtime(cursor, endianness)
        .read_u16()
        .expect("bounds already checked"))
}

/// Read a `u32` in the given byte order.
pub fn read_u32(cursor: &mut Cursor<&[u8]>, endianness: Endianness) -> Result<u32> {
    check_remaining(cursor, 4)?;
    Ok(ByteOrdered::runtime(cursor, endianness)
        .read_u32()
        .expect("bounds already checked"))
}

/// Read `n` raw bytes, advancing the cursor.
pub fn read_bytes<'a>(cursor: &mut Cursor<&'a [u8]>, n: usize) -> Result<&'a [u8]> {
    check_remaining(cursor, n)?;
    let start = cursor.position() as usize;
    let slice = &cursor.get_ref()[start..start + n];
    cursor.set_position((start + n) as u64);
    Ok(slice)
}

/// Skip `n` bytes (used for reserved fields), advancing the cursor.
pub fn skip(cursor: &mut Cursor<&[u8]>, n: usize) -> Result<()> {
    check_remaining(cursor, n)?;
    cursor.set_position(cursor.position() + n as u64);
    Ok(())
}

/// Number of bytes left unread in the cursor.
pub fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

/// Write a `u16` in the given byte order. Writers always produce
/// exact-length output.
pub fn write_u16<W: Write>(w: W, v: u16, endianness: Endianness) -> std::io::Result<()> {
    ByteOrdered::runtime(w, endianness).write_u16(v)
}

/// Write a `u32` in the given byte order.
pub fn write_u32<W: Write>(w: W, v: u32, endianness: Endianness) -> std::io::Result<()> {
    ByteOrdered::runtime(w, endianness).write_u32(v)
}

/// Read raw bytes from any [`Read`] source where bounds are not known up
/// front (e.g. a socket); used by the PDU/association layer, which
/// already bounds the read by a declared PDU length before calling this.
pub fn read_n<R: Read>(mut source: R, n: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    source.read_exact(&mut buf)?;
    Ok(buf)
}
