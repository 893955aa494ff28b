//! Low-level binary reading and writing utilities for ZIP record parsing.
//!
//! Every multi-byte field in the container format is little-endian. The read
//! helpers return plain `io::Result` so callers can attach the record name
//! via [`Error::truncated`](crate::Error::truncated); a short read surfaces
//! as `UnexpectedEof`, never as silently zero-filled data.
//!
//! The one stateful primitive here is [`try_signature`]: it consumes four
//! bytes and, when they are not the expected magic, rewinds exactly those
//! four bytes. Downstream record types use it to attempt their own signature
//! and silently fail over to the next candidate record type, which is how
//! the optional sections of the ZIP grammar are parsed without lookahead.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Reads an unsigned 16-bit little-endian integer.
pub fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Reads an unsigned 32-bit little-endian integer.
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads an unsigned 32-bit little-endian integer widened to `u64`.
///
/// The widening is a zero extension: a stored `0xFFFFFFFF` reads back as
/// `0x00000000FFFFFFFF`, never as a sign-extended negative.
pub fn read_u32_widened<R: Read>(r: &mut R) -> io::Result<u64> {
    Ok(u64::from(read_u32(r)?))
}

/// Reads an unsigned 64-bit little-endian integer.
pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads exactly `count` bytes into a new vector.
pub fn read_bytes<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; count];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes an unsigned 16-bit little-endian integer.
pub fn write_u16<W: Write>(w: &mut W, value: u16) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

/// Writes an unsigned 32-bit little-endian integer.
pub fn write_u32<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

/// Writes an unsigned 64-bit little-endian integer.
pub fn write_u64<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

/// Writes the length of `bytes` as a 16-bit little-endian prefix.
///
/// The byte run itself is written separately because the local and central
/// headers interleave several length prefixes before the variable tails.
pub fn write_u16_length<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    debug_assert!(bytes.len() <= 0xffff);
    write_u16(w, bytes.len() as u16)
}

/// Reads a 16-bit length prefix followed by that many raw bytes.
pub fn read_u16_prefixed_bytes<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let len = read_u16(r)? as usize;
    read_bytes(r, len)
}

/// Writes a 16-bit length prefix followed by the raw bytes.
pub fn write_u16_prefixed_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    write_u16_length(w, bytes)?;
    w.write_all(bytes)
}

/// Consumes four bytes and compares them against an expected signature.
///
/// Returns `Ok(true)` when the signature matched, leaving the cursor just
/// past it. On mismatch the cursor is rewound exactly four bytes and
/// `Ok(false)` is returned, so the caller can hand the same position to the
/// next candidate record type.
///
/// A short read here is still an error: if fewer than four bytes remain the
/// input is truncated mid-record, which no record type can recover from.
pub fn try_signature<R: Read + Seek>(r: &mut R, expected: u32) -> io::Result<bool> {
    let actual = read_u32(r)?;
    if actual == expected {
        Ok(true)
    } else {
        r.seek(SeekFrom::Current(-4))?;
        Ok(false)
    }
}
