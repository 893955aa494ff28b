//! Central directory file entries.
//!
//! A central entry repeats the local header's fixed fields and adds the
//! cataloguing ones: who made it, where its local header sits, attribute
//! words, and a per-entry comment. Three of its fields can outgrow their
//! on-disk width (both sizes and the local-header offset at 32 bits, the
//! disk number at 16), and each promotes independently into the Zip64
//! sub-record.

use std::io::{self, Read, Seek, Write};

use log::debug;

use crate::attributes::ExternalAttributes;
use crate::compression::CompressionMethod;
use crate::error::{Error, Result};
use crate::format::cursor::{
    read_bytes, read_u16, read_u32, try_signature, write_u16, write_u16_length, write_u32,
};
use crate::format::extra::{ExtraFields, Zip64ExtraField, Zip64Sentinels};
use crate::format::flags::GeneralPurposeFlags;
use crate::format::local_header::LocalFileHeader;
use crate::format::timestamp::DosDateTime;
use crate::format::{CENTRAL_ENTRY_SIGNATURE, MAX_U16_FIELD, MAX_U32_FIELD, ZIP64_VERSION_NEEDED};

const RECORD: &str = "central directory entry";

/// A decoded central directory file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    /// Version-made-by word: creating system in the high byte, version in
    /// the low byte.
    pub version_made: u16,
    /// Minimum extract version.
    pub version_needed: u16,
    /// General-purpose flag word.
    pub flags: GeneralPurposeFlags,
    /// Compression method of the entry data.
    pub compression_method: CompressionMethod,
    /// Last-modification timestamp.
    pub last_modified: DosDateTime,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    raw_compressed_size: u32,
    raw_uncompressed_size: u32,
    raw_disk_number_start: u16,
    /// Internal attribute word (bit 0: apparent text file).
    pub internal_attributes: u16,
    /// External attribute word (MS-DOS bits, POSIX mode).
    pub external_attributes: ExternalAttributes,
    raw_local_header_offset: u32,
    file_name: Vec<u8>,
    extra_fields: ExtraFields,
    comment: Vec<u8>,
}

impl CentralDirectoryEntry {
    /// Reads an entry from the cursor.
    ///
    /// Returns `Ok(None)` on a non-matching signature after rewinding, which
    /// is how the directory walk detects its own end: the record after the
    /// last entry is the end record (or Zip64 end record), not another entry.
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Option<Self>> {
        if !try_signature(r, CENTRAL_ENTRY_SIGNATURE).map_err(|e| Error::truncated(RECORD, e))? {
            return Ok(None);
        }
        let entry = Self::read_body(r).map_err(|e| Error::truncated(RECORD, e))?;
        debug!(
            "read central entry: name={:?} offset={}",
            entry.file_name_lossy(),
            entry.local_header_offset(),
        );
        Ok(Some(entry))
    }

    fn read_body<R: Read>(r: &mut R) -> io::Result<Self> {
        let version_made = read_u16(r)?;
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
        let comment_len = read_u16(r)? as usize;
        let raw_disk_number_start = read_u16(r)?;
        let internal_attributes = read_u16(r)?;
        let external_attributes = ExternalAttributes::from_raw(read_u32(r)?);
        let raw_local_header_offset = read_u32(r)?;
        let file_name = read_bytes(r, name_len)?;
        let extra_bytes = read_bytes(r, extra_len)?;
        let comment = read_bytes(r, comment_len)?;
        let sentinels = Zip64Sentinels {
            uncompressed_size: u64::from(raw_uncompressed_size) == MAX_U32_FIELD,
            compressed_size: u64::from(raw_compressed_size) == MAX_U32_FIELD,
            local_header_offset: u64::from(raw_local_header_offset) == MAX_U32_FIELD,
            disk_number_start: u64::from(raw_disk_number_start) == MAX_U16_FIELD,
        };
        Ok(CentralDirectoryEntry {
            version_made,
            version_needed,
            flags,
            compression_method,
            last_modified: DosDateTime { date, time },
            crc32,
            raw_compressed_size,
            raw_uncompressed_size,
            raw_disk_number_start,
            internal_attributes,
            external_attributes,
            raw_local_header_offset,
            file_name,
            extra_fields: ExtraFields::parse(&extra_bytes, sentinels),
            comment,
        })
    }

    /// Writes the entry, signature included.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let extra_bytes = self.extra_fields.encode();
        write_u32(w, CENTRAL_ENTRY_SIGNATURE)?;
        write_u16(w, self.version_made)?;
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
        write_u16_length(w, &self.comment)?;
        write_u16(w, self.raw_disk_number_start)?;
        write_u16(w, self.internal_attributes)?;
        write_u32(w, self.external_attributes.raw())?;
        write_u32(w, self.raw_local_header_offset)?;
        w.write_all(&self.file_name)?;
        w.write_all(&extra_bytes)?;
        w.write_all(&self.comment)
    }

    /// Size of the encoded entry in bytes.
    pub fn encoded_len(&self) -> u64 {
        46 + self.file_name.len() as u64
            + self.extra_fields.encode().len() as u64
            + self.comment.len() as u64
    }

    fn widened(&self, raw: u32, wide: Option<u64>) -> u64 {
        match wide {
            Some(wide) if u64::from(raw) == MAX_U32_FIELD => wide,
            _ => u64::from(raw),
        }
    }

    /// Compressed size, widened through the Zip64 sub-record when present.
    pub fn compressed_size(&self) -> u64 {
        self.widened(
            self.raw_compressed_size,
            self.extra_fields.zip64().and_then(|z| z.compressed_size),
        )
    }

    /// Uncompressed size, widened through the Zip64 sub-record when present.
    pub fn uncompressed_size(&self) -> u64 {
        self.widened(
            self.raw_uncompressed_size,
            self.extra_fields.zip64().and_then(|z| z.uncompressed_size),
        )
    }

    /// Offset of the local header from the start of the archive.
    pub fn local_header_offset(&self) -> u64 {
        self.widened(
            self.raw_local_header_offset,
            self.extra_fields
                .zip64()
                .and_then(|z| z.local_header_offset),
        )
    }

    /// Disk number the local header lives on.
    pub fn disk_number_start(&self) -> u32 {
        match self.extra_fields.zip64().and_then(|z| z.disk_number_start) {
            Some(wide) if u64::from(self.raw_disk_number_start) == MAX_U16_FIELD => wide,
            _ => u32::from(self.raw_disk_number_start),
        }
    }

    /// Whether the entry carries a Zip64 sub-record.
    pub fn is_zip64(&self) -> bool {
        self.extra_fields.zip64().is_some()
    }

    /// The file name bytes exactly as stored.
    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    /// The file name as lossy UTF-8.
    pub fn file_name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.file_name).into_owned()
    }

    /// The per-entry comment bytes.
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// The typed extra-field list.
    pub fn extra_fields(&self) -> &ExtraFields {
        &self.extra_fields
    }

    /// Whether the external attributes mark this entry a directory.
    pub fn is_directory(&self) -> bool {
        self.external_attributes.is_directory() || self.file_name.ends_with(b"/")
    }

    /// Starts a builder.
    pub fn builder() -> CentralDirectoryEntryBuilder {
        CentralDirectoryEntryBuilder::default()
    }
}

/// Builder for [`CentralDirectoryEntry`].
///
/// Like the local header builder, promotion to Zip64 happens at
/// [`build`](Self::build), but here each of the four wide fields promotes
/// independently: only the fields that overflow go into the sub-record and
/// have their narrow form set to the sentinel.
#[derive(Debug, Clone, Default)]
pub struct CentralDirectoryEntryBuilder {
    version_made: u16,
    version_needed: u16,
    flags: GeneralPurposeFlags,
    compression_method: CompressionMethod,
    last_modified: DosDateTime,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    disk_number_start: u32,
    internal_attributes: u16,
    external_attributes: ExternalAttributes,
    local_header_offset: u64,
    file_name: Vec<u8>,
    extra_fields: ExtraFields,
    comment: Vec<u8>,
    require_zip32: bool,
}

impl CentralDirectoryEntryBuilder {
    /// Copies the fields a central entry shares with its local header.
    ///
    /// For streamed entries the caller must still set the true CRC and sizes
    /// afterwards; the local header carries zeros for those.
    pub fn matching_local(mut self, header: &LocalFileHeader) -> Self {
        self.version_needed = header.version_needed;
        self.flags = header.flags;
        self.compression_method = header.compression_method;
        self.last_modified = header.last_modified;
        self.crc32 = header.crc32;
        self.compressed_size = header.compressed_size();
        self.uncompressed_size = header.uncompressed_size();
        self.file_name = header.file_name().to_vec();
        self
    }

    /// Sets the version-made-by word.
    pub fn version_made(mut self, version: u16) -> Self {
        self.version_made = version;
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

    /// Sets the disk number the local header lives on.
    pub fn disk_number_start(mut self, disk: u32) -> Self {
        self.disk_number_start = disk;
        self
    }

    /// Sets the internal attribute word.
    pub fn internal_attributes(mut self, attrs: u16) -> Self {
        self.internal_attributes = attrs;
        self
    }

    /// Sets the external attribute word.
    pub fn external_attributes(mut self, attrs: ExternalAttributes) -> Self {
        self.external_attributes = attrs;
        self
    }

    /// Sets the offset of the local header from the start of the archive.
    pub fn local_header_offset(mut self, offset: u64) -> Self {
        self.local_header_offset = offset;
        self
    }

    /// Sets the file name bytes.
    pub fn file_name(mut self, name: impl Into<Vec<u8>>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Sets the per-entry comment bytes.
    pub fn comment(mut self, comment: impl Into<Vec<u8>>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Appends a generic extra-field sub-record; the Zip64 id is rejected.
    pub fn extra_field(mut self, id: u16, data: Vec<u8>) -> Result<Self> {
        self.extra_fields.push_other(id, data)?;
        Ok(self)
    }

    /// Fails the build instead of promoting when a field overflows.
    pub fn require_zip32(mut self) -> Self {
        self.require_zip32 = true;
        self
    }

    /// Validates the accumulated fields and produces the entry.
    pub fn build(mut self) -> Result<CentralDirectoryEntry> {
        if self.file_name.len() > 0xffff {
            return Err(Error::InvalidFormat(format!(
                "file name length {} exceeds 65535",
                self.file_name.len()
            )));
        }
        if self.comment.len() > 0xffff {
            return Err(Error::InvalidFormat(format!(
                "entry comment length {} exceeds 65535",
                self.comment.len()
            )));
        }

        // Values at the sentinel promote too, so the narrow field never
        // holds a sentinel without a zip64 record behind it.
        let mut zip64 = Zip64ExtraField::default();
        if self.uncompressed_size >= MAX_U32_FIELD {
            zip64.uncompressed_size = Some(self.uncompressed_size);
        }
        if self.compressed_size >= MAX_U32_FIELD {
            zip64.compressed_size = Some(self.compressed_size);
        }
        if self.local_header_offset >= MAX_U32_FIELD {
            zip64.local_header_offset = Some(self.local_header_offset);
        }
        if u64::from(self.disk_number_start) >= MAX_U16_FIELD {
            zip64.disk_number_start = Some(self.disk_number_start);
        }

        if zip64.data_len() > 0 {
            if self.require_zip32 {
                let (field, value) = if zip64.uncompressed_size.is_some() {
                    ("uncompressed size", self.uncompressed_size)
                } else if zip64.compressed_size.is_some() {
                    ("compressed size", self.compressed_size)
                } else if zip64.local_header_offset.is_some() {
                    ("local header offset", self.local_header_offset)
                } else {
                    ("disk number", u64::from(self.disk_number_start))
                };
                return Err(Error::Zip64Required { field, value });
            }
            debug!(
                "promoting central entry {:?} to zip64",
                String::from_utf8_lossy(&self.file_name)
            );
            self.extra_fields.set_zip64(zip64);
            self.version_needed = self.version_needed.max(ZIP64_VERSION_NEEDED);
        }

        let clamp32 = |value: u64| -> u32 { value.min(MAX_U32_FIELD) as u32 };
        Ok(CentralDirectoryEntry {
            version_made: self.version_made,
            version_needed: self.version_needed,
            flags: self.flags,
            compression_method: self.compression_method,
            last_modified: self.last_modified,
            crc32: self.crc32,
            raw_compressed_size: clamp32(self.compressed_size),
            raw_uncompressed_size: clamp32(self.uncompressed_size),
            raw_disk_number_start: u64::from(self.disk_number_start).min(MAX_U16_FIELD) as u16,
            internal_attributes: self.internal_attributes,
            external_attributes: self.external_attributes,
            raw_local_header_offset: clamp32(self.local_header_offset),
            file_name: self.file_name,
            extra_fields: self.extra_fields,
            comment: self.comment,
        })
    }
}
