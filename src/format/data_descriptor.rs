//! The optional data descriptor trailing a streamed entry's data.
//!
//! When flag bit 3 is set, the CRC and sizes were unknown while the local
//! header was written and instead follow the entry data here. The descriptor
//! may or may not begin with its own signature, so the decoder reads the
//! first word and decides: the signature constant means "signature present,
//! CRC next", anything else is already the CRC. A real CRC that happens to
//! equal `0x08074b50` is therefore misread as a signature, an ambiguity
//! baked into the format itself.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::format::cursor::{read_u32, read_u64, write_u32, write_u64};
use crate::format::{DATA_DESCRIPTOR_SIGNATURE, MAX_U32_FIELD};

const RECORD: &str = "data descriptor";

/// A decoded data descriptor.
///
/// The size fields are 32-bit unless the owning entry is Zip64, in which
/// case they are 64-bit. The descriptor has no width marker of its own; the
/// caller supplies the entry's zip64-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Compressed size of the entry data.
    pub compressed_size: u64,
    /// Uncompressed size of the entry data.
    pub uncompressed_size: u64,
    zip64: bool,
}

impl DataDescriptor {
    /// Reads a descriptor, sizing its fields per the owning entry.
    ///
    /// `zip64` must reflect the entry whose data precedes the descriptor:
    /// `true` widens both size fields to 64 bits.
    pub fn read<R: Read>(r: &mut R, zip64: bool) -> Result<Self> {
        Self::read_body(r, zip64).map_err(|e| Error::truncated(RECORD, e))
    }

    fn read_body<R: Read>(r: &mut R, zip64: bool) -> io::Result<Self> {
        let first = read_u32(r)?;
        // First word is either the optional signature or already the CRC.
        let crc32 = if first == DATA_DESCRIPTOR_SIGNATURE {
            read_u32(r)?
        } else {
            first
        };
        let (compressed_size, uncompressed_size) = if zip64 {
            (read_u64(r)?, read_u64(r)?)
        } else {
            (u64::from(read_u32(r)?), u64::from(read_u32(r)?))
        };
        Ok(DataDescriptor {
            crc32,
            compressed_size,
            uncompressed_size,
            zip64,
        })
    }

    /// Writes the descriptor with its signature.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, DATA_DESCRIPTOR_SIGNATURE)?;
        write_u32(w, self.crc32)?;
        if self.zip64 {
            write_u64(w, self.compressed_size)?;
            write_u64(w, self.uncompressed_size)
        } else {
            write_u32(w, self.compressed_size as u32)?;
            write_u32(w, self.uncompressed_size as u32)
        }
    }

    /// Size of the encoded descriptor in bytes, signature included.
    pub fn encoded_len(&self) -> u64 {
        if self.zip64 { 24 } else { 16 }
    }

    /// Whether the size fields are 64-bit.
    pub fn is_zip64(&self) -> bool {
        self.zip64
    }

    /// Starts a builder.
    pub fn builder() -> DataDescriptorBuilder {
        DataDescriptorBuilder::default()
    }
}

/// Builder for [`DataDescriptor`].
///
/// The field width is not set directly: [`build`](Self::build) widens the
/// descriptor when either size reaches the `0xFFFFFFFF` sentinel, matching
/// the promotion the owning entry undergoes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataDescriptorBuilder {
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
}

impl DataDescriptorBuilder {
    /// Sets the CRC-32 of the uncompressed data.
    pub fn crc32(mut self, crc: u32) -> Self {
        self.crc32 = crc;
        self
    }

    /// Sets the compressed size.
    pub fn compressed_size(mut self, size: u64) -> Self {
        self.compressed_size = size;
        self
    }

    /// Sets the uncompressed size.
    pub fn uncompressed_size(mut self, size: u64) -> Self {
        self.uncompressed_size = size;
        self
    }

    /// Produces the descriptor, choosing the field width from the sizes.
    pub fn build(self) -> DataDescriptor {
        DataDescriptor {
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            zip64: self.compressed_size >= MAX_U32_FIELD
                || self.uncompressed_size >= MAX_U32_FIELD,
        }
    }
}
