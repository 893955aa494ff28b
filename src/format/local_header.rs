//! The local file header that precedes each entry's data.

use std::io::{self, Read, Seek, Write};

use log::debug;

use crate::compression::CompressionMethod;
use crate::error::{Error, Result};
use crate::format::cursor::{
    read_bytes, read_u16, read_u32, try_signature, write_u16, write_u16_length, write_u32,
};
use crate::format::extra::{ExtraFields, Zip64ExtraField, Zip64Sentinels};
use crate::format::flags::GeneralPurposeFlags;
use crate::format::timestamp::DosDateTime;
use crate::format::{LOCAL_FILE_HEADER_SIGNATURE, MAX_U32_FIELD, ZIP64_VERSION_NEEDED};

const RECORD: &str = "local file header";

/// A decoded local file header.
///
/// The 32-bit size fields are kept exactly as stored; the widening accessors
/// consult the Zip64 extra-field sub-record when a field holds the
/// `0xFFFFFFFF` sentinel. Construct new headers through
/// [`LocalFileHeaderBuilder`], which performs the inverse promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Minimum extract version, in the encoded `major * 10 + minor` form.
    pub version_needed: u16,
    /// General-purpose flag word.
    pub flags: GeneralPurposeFlags,
    /// Compression method applied to the entry data.
    pub compression_method: CompressionMethod,
    /// Last-modification timestamp.
    pub last_modified: DosDateTime,
    /// CRC-32 of the uncompressed data (zero when a data descriptor follows).
    pub crc32: u32,
    raw_compressed_size: u32,
    raw_uncompressed_size: u32,
    file_name: Vec<u8>,
    extra_fields: ExtraFields,
}

impl LocalFileHeader {
    /// Reads a header from the cursor.
    ///
    /// Returns `Ok(None)` when the next four bytes are not the local file
    /// header signature; the cursor is rewound so another record type can
    /// try the same position. A signature followed by a short body is a
    /// truncation error.
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Option<Self>> {
        if !try_signature(r, LOCAL_FILE_HEADER_SIGNATURE).map_err(|e| Error::truncated(RECORD, e))?
        {
            return Ok(None);
        }
        let header = Self::read_body(r).map_err(|e| Error::truncated(RECORD, e))?;
        debug!(
            "read local header: name={:?} method={} compressed={}",
            header.file_name_lossy(),
            header.compression_method,
            header.compressed_size(),
        );
        Ok(Some(header))
    }

    fn read_body<R: Read>(r: &mut R) -> io::Result<Self> {
        let version_needed = read_u16(r)?;
        let flags = GeneralPurposeFlags::from_raw(read_u16(r)?);
        let compression_method = CompressionMethod::from_raw(read_u16(r)?);
        let time = read_u16(r)?;
        let date = read_u16(r)?;
        let crc32 = read_u32(r)?;
        let raw_compressed_size = read_u32(r)?;
        let raw_uncompressed_size = read_u32(r)?;
        let name_len = read_u16(r)? as usize;
        let extra_len = read_u16(r)? as usize;
        let file_name = read_bytes(r, name_len)?;
        let extra_bytes = read_bytes(r, extra_len)?;
        let sentinels = Zip64Sentinels {
            uncompressed_size: u64::from(raw_uncompressed_size) == MAX_U32_FIELD,
            compressed_size: u64::from(raw_compressed_size) == MAX_U32_FIELD,
            ..Default::default()
        };
        Ok(LocalFileHeader {
            version_needed,
            flags,
            compression_method,
            last_modified: DosDateTime { date, time },
            crc32,
            raw_compressed_size,
            raw_uncompressed_size,
            file_name,
            extra_fields: ExtraFields::parse(&extra_bytes, sentinels),
        })
    }

    /// Writes the header, signature included.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let extra_bytes = self.extra_fields.encode();
        write_u32(w, LOCAL_FILE_HEADER_SIGNATURE)?;
        write_u16(w, self.version_needed)?;
        write_u16(w, self.flags.raw())?;
        write_u16(w, self.compression_method.raw())?;
        write_u16(w, self.last_modified.time)?;
        write_u16(w, self.last_modified.date)?;
        write_u32(w, self.crc32)?;
        write_u32(w, self.raw_compressed_size)?;
        write_u32(w, self.raw_uncompressed_size)?;
        write_u16_length(w, &self.file_name)?;
        write_u16_length(w, &extra_bytes)?;
        w.write_all(&self.file_name)?;
        w.write_all(&extra_bytes)
    }

    /// Size of the encoded header in bytes, signature and tails included.
    pub fn encoded_len(&self) -> u64 {
        30 + self.file_name.len() as u64 + self.extra_fields.encode().len() as u64
    }

    /// Compressed size, widened through the Zip64 sub-record when present.
    pub fn compressed_size(&self) -> u64 {
        match self.extra_fields.zip64().and_then(|z| z.compressed_size) {
            Some(wide) if u64::from(self.raw_compressed_size) == MAX_U32_FIELD => wide,
            _ => u64::from(self.raw_compressed_size),
        }
    }

    /// Uncompressed size, widened through the Zip64 sub-record when present.
    pub fn uncompressed_size(&self) -> u64 {
        match self.extra_fields.zip64().and_then(|z| z.uncompressed_size) {
            Some(wide) if u64::from(self.raw_uncompressed_size) == MAX_U32_FIELD => wide,
            _ => u64::from(self.raw_uncompressed_size),
        }
    }

    /// The 32-bit compressed-size field exactly as stored.
    pub fn raw_compressed_size(&self) -> u32 {
        self.raw_compressed_size
    }

    /// The 32-bit uncompressed-size field exactly as stored.
    pub fn raw_uncompressed_size(&self) -> u32 {
        self.raw_uncompressed_size
    }

    /// Whether the header carries a Zip64 sub-record.
    pub fn is_zip64(&self) -> bool {
        self.extra_fields.zip64().is_some()
    }

    /// Whether the sizes and CRC live in a trailing data descriptor.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags.has_data_descriptor()
    }

    /// The file name bytes exactly as stored.
    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    /// The file name as lossy UTF-8, for display and error messages.
    pub fn file_name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.file_name).into_owned()
    }

    /// The typed extra-field list.
    pub fn extra_fields(&self) -> &ExtraFields {
        &self.extra_fields
    }

    /// Starts a builder.
    pub fn builder() -> LocalFileHeaderBuilder {
        LocalFileHeaderBuilder::default()
    }
}

/// Builder for [`LocalFileHeader`].
///
/// Sizes are set as `u64` and only checked at [`build`](Self::build): values
/// at or past the `0xFFFFFFFF` sentinel promote the header to Zip64 by
/// writing the sentinel
/// into the narrow field, synthesizing the Zip64 sub-record, and raising the
/// extract version to 4.5. [`require_zip32`](Self::require_zip32) turns that
/// promotion into an error instead.
#[derive(Debug, Clone, Default)]
pub struct LocalFileHeaderBuilder {
    version_needed: u16,
    flags: GeneralPurposeFlags,
    compression_method: CompressionMethod,
    last_modified: DosDateTime,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    file_name: Vec<u8>,
    extra_fields: ExtraFields,
    require_zip32: bool,
}

impl LocalFileHeaderBuilder {
    /// Sets the file name bytes.
    pub fn file_name(mut self, name: impl Into<Vec<u8>>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Sets the minimum extract version.
    pub fn version_needed(mut self, version: u16) -> Self {
        self.version_needed = version;
        self
    }

    /// Sets the general-purpose flag word.
    pub fn flags(mut self, flags: GeneralPurposeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the compression method.
    pub fn compression_method(mut self, method: CompressionMethod) -> Self {
        self.compression_method = method;
        self
    }

    /// Sets the last-modification timestamp.
    pub fn last_modified(mut self, when: DosDateTime) -> Self {
        self.last_modified = when;
        self
    }

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

    /// Marks the entry as streamed: sizes and CRC follow in a data
    /// descriptor, and the header fields are written as zero.
    pub fn with_data_descriptor(mut self) -> Self {
        self.flags.insert(GeneralPurposeFlags::DATA_DESCRIPTOR);
        self
    }

    /// Appends a generic extra-field sub-record.
    ///
    /// The Zip64 id is rejected; that record is managed by the builder.
    pub fn extra_field(mut self, id: u16, data: Vec<u8>) -> Result<Self> {
        self.extra_fields.push_other(id, data)?;
        Ok(self)
    }

    /// Fails the build instead of promoting when a size overflows 32 bits.
    pub fn require_zip32(mut self) -> Self {
        self.require_zip32 = true;
        self
    }

    /// Validates the accumulated fields and produces the header.
    pub fn build(mut self) -> Result<LocalFileHeader> {
        if self.file_name.len() > 0xffff {
            return Err(Error::InvalidFormat(format!(
                "file name length {} exceeds 65535",
                self.file_name.len()
            )));
        }

        // The sentinel value itself must promote: a narrow field holding
        // 0xFFFFFFFF without a zip64 record reads as a dangling pointer.
        let needs_zip64 =
            self.compressed_size >= MAX_U32_FIELD || self.uncompressed_size >= MAX_U32_FIELD;
        if needs_zip64 {
            if self.require_zip32 {
                let (field, value) = if self.compressed_size >= MAX_U32_FIELD {
                    ("compressed size", self.compressed_size)
                } else {
                    ("uncompressed size", self.uncompressed_size)
                };
                return Err(Error::Zip64Required { field, value });
            }
            debug!(
                "promoting local header {:?} to zip64: uncompressed={} compressed={}",
                String::from_utf8_lossy(&self.file_name),
                self.uncompressed_size,
                self.compressed_size,
            );
            self.extra_fields.set_zip64(Zip64ExtraField::sizes(
                self.uncompressed_size,
                self.compressed_size,
            ));
            self.version_needed = self.version_needed.max(ZIP64_VERSION_NEEDED);
        }

        // A promoted local header carries both sizes in the zip64 record,
        // so both narrow fields hold the sentinel.
        let narrow = |value: u64| -> u32 {
            if needs_zip64 {
                MAX_U32_FIELD as u32
            } else {
                value as u32
            }
        };
        Ok(LocalFileHeader {
            version_needed: self.version_needed,
            flags: self.flags,
            compression_method: self.compression_method,
            last_modified: self.last_modified,
            crc32: self.crc32,
            raw_compressed_size: narrow(self.compressed_size),
            raw_uncompressed_size: narrow(self.uncompressed_size),
            file_name: self.file_name,
            extra_fields: self.extra_fields,
        })
    }
}
