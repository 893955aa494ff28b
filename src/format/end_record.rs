//! The archive trailer: end record, Zip64 end record, and Zip64 locator.
//!
//! Every archive ends with the 22-byte-plus-comment end record. When any of
//! its counts or offsets outgrow their field, the true values move into a
//! Zip64 end record placed before it, found through a fixed-size locator
//! sandwiched between the two. [`Trailer`] owns all three and attaches or
//! detaches the Zip64 pair as the directory geometry demands, so callers
//! never manage the sentinels by hand.

use std::io::{self, Read, Seek, Write};

use log::debug;

use crate::error::{Error, Result};
use crate::format::cursor::{
    read_bytes, read_u16, read_u16_prefixed_bytes, read_u32, read_u64, try_signature, write_u16,
    write_u16_prefixed_bytes, write_u32, write_u64,
};
use crate::format::{
    END_RECORD_SIGNATURE, MAX_COMMENT_LENGTH, MAX_U16_FIELD, MAX_U32_FIELD,
    ZIP64_END_RECORD_SIGNATURE, ZIP64_LOCATOR_SIGNATURE, ZIP64_VERSION_NEEDED,
};

/// The classic end-of-central-directory record.
///
/// Fields are kept exactly as stored; sentinel-aware access goes through
/// [`Trailer`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndOfCentralDirectory {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub directory_start_disk: u16,
    /// Central directory entries on this disk.
    pub entries_on_disk: u16,
    /// Central directory entries in total.
    pub total_entries: u16,
    /// Central directory size in bytes.
    pub directory_size: u32,
    /// Central directory offset from the start of the archive.
    pub directory_offset: u32,
    /// Free-text archive comment.
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Reads the record, returning `Ok(None)` on a non-matching signature.
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Option<Self>> {
        const RECORD: &str = "end of central directory";
        if !try_signature(r, END_RECORD_SIGNATURE).map_err(|e| Error::truncated(RECORD, e))? {
            return Ok(None);
        }
        let body = |r: &mut R| -> io::Result<Self> {
            Ok(EndOfCentralDirectory {
                disk_number: read_u16(r)?,
                directory_start_disk: read_u16(r)?,
                entries_on_disk: read_u16(r)?,
                total_entries: read_u16(r)?,
                directory_size: read_u32(r)?,
                directory_offset: read_u32(r)?,
                comment: read_u16_prefixed_bytes(r)?,
            })
        };
        body(r).map(Some).map_err(|e| Error::truncated(RECORD, e))
    }

    /// Writes the record, signature included.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, END_RECORD_SIGNATURE)?;
        write_u16(w, self.disk_number)?;
        write_u16(w, self.directory_start_disk)?;
        write_u16(w, self.entries_on_disk)?;
        write_u16(w, self.total_entries)?;
        write_u32(w, self.directory_size)?;
        write_u32(w, self.directory_offset)?;
        write_u16_prefixed_bytes(w, &self.comment)
    }

    /// Size of the encoded record in bytes.
    pub fn encoded_len(&self) -> u64 {
        22 + self.comment.len() as u64
    }
}

/// The Zip64 end-of-central-directory record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Zip64EndRecord {
    /// Version-made-by word.
    pub version_made: u16,
    /// Minimum extract version.
    pub version_needed: u16,
    /// Number of this disk.
    pub disk_number: u32,
    /// Disk where the central directory starts.
    pub directory_start_disk: u32,
    /// Central directory entries on this disk.
    pub entries_on_disk: u64,
    /// Central directory entries in total.
    pub total_entries: u64,
    /// Central directory size in bytes.
    pub directory_size: u64,
    /// Central directory offset from the start of the archive.
    pub directory_offset: u64,
    /// Extensible data sector following the fixed fields.
    pub extensible_data: Vec<u8>,
}

impl Zip64EndRecord {
    /// Reads the record, returning `Ok(None)` on a non-matching signature.
    ///
    /// The record declares its own remaining length after the size field;
    /// a declared length below the 44 fixed bytes is malformed.
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Option<Self>> {
        const RECORD: &str = "zip64 end of central directory";
        if !try_signature(r, ZIP64_END_RECORD_SIGNATURE).map_err(|e| Error::truncated(RECORD, e))?
        {
            return Ok(None);
        }
        let declared = read_u64(r).map_err(|e| Error::truncated(RECORD, e))?;
        if declared < 44 {
            return Err(Error::InvalidContainerSize {
                container: "zip64 end record",
                declared,
                measured: 44,
            });
        }
        let body = |r: &mut R| -> io::Result<Self> {
            Ok(Zip64EndRecord {
                version_made: read_u16(r)?,
                version_needed: read_u16(r)?,
                disk_number: read_u32(r)?,
                directory_start_disk: read_u32(r)?,
                entries_on_disk: read_u64(r)?,
                total_entries: read_u64(r)?,
                directory_size: read_u64(r)?,
                directory_offset: read_u64(r)?,
                extensible_data: read_bytes(r, (declared - 44) as usize)?,
            })
        };
        body(r).map(Some).map_err(|e| Error::truncated(RECORD, e))
    }

    /// Writes the record, signature included.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, ZIP64_END_RECORD_SIGNATURE)?;
        write_u64(w, 44 + self.extensible_data.len() as u64)?;
        write_u16(w, self.version_made)?;
        write_u16(w, self.version_needed)?;
        write_u32(w, self.disk_number)?;
        write_u32(w, self.directory_start_disk)?;
        write_u64(w, self.entries_on_disk)?;
        write_u64(w, self.total_entries)?;
        write_u64(w, self.directory_size)?;
        write_u64(w, self.directory_offset)?;
        w.write_all(&self.extensible_data)
    }

    /// Size of the encoded record in bytes.
    pub fn encoded_len(&self) -> u64 {
        56 + self.extensible_data.len() as u64
    }
}

/// The fixed-size locator pointing backward at the Zip64 end record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zip64Locator {
    /// Disk holding the Zip64 end record.
    pub zip64_end_disk: u32,
    /// Offset of the Zip64 end record from the start of the archive.
    pub zip64_end_offset: u64,
    /// Total number of disks.
    pub total_disks: u32,
}

impl Zip64Locator {
    /// Reads the locator, returning `Ok(None)` on a non-matching signature.
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Option<Self>> {
        const RECORD: &str = "zip64 locator";
        if !try_signature(r, ZIP64_LOCATOR_SIGNATURE).map_err(|e| Error::truncated(RECORD, e))? {
            return Ok(None);
        }
        let body = |r: &mut R| -> io::Result<Self> {
            Ok(Zip64Locator {
                zip64_end_disk: read_u32(r)?,
                zip64_end_offset: read_u64(r)?,
                total_disks: read_u32(r)?,
            })
        };
        body(r).map(Some).map_err(|e| Error::truncated(RECORD, e))
    }

    /// Writes the locator, signature included.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, ZIP64_LOCATOR_SIGNATURE)?;
        write_u32(w, self.zip64_end_disk)?;
        write_u64(w, self.zip64_end_offset)?;
        write_u32(w, self.total_disks)
    }
}

/// The complete archive trailer.
///
/// Owns the end record and, when the directory geometry requires one, the
/// Zip64 end record and locator pair. [`set_directory`](Self::set_directory)
/// keeps the three records and their sentinels consistent: the pair appears
/// when a count or offset overflows and disappears again when everything
/// fits the classic record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trailer {
    end: EndOfCentralDirectory,
    zip64: Option<(Zip64EndRecord, Zip64Locator)>,
}

impl Trailer {
    /// A trailer for the given directory geometry.
    pub fn new(total_entries: u64, directory_size: u64, directory_offset: u64) -> Self {
        let mut trailer = Trailer::default();
        trailer.set_directory(total_entries, directory_size, directory_offset);
        trailer
    }

    /// Reassembles a trailer from records read off disk.
    pub(crate) fn from_records(
        end: EndOfCentralDirectory,
        zip64: Option<(Zip64EndRecord, Zip64Locator)>,
    ) -> Self {
        Trailer { end, zip64 }
    }

    /// Updates the directory geometry, attaching or detaching the Zip64
    /// pair as needed.
    pub fn set_directory(
        &mut self,
        total_entries: u64,
        directory_size: u64,
        directory_offset: u64,
    ) {
        // Values at the sentinel need the pair as well, so the narrow
        // fields never hold a sentinel that points at nothing.
        let needs_zip64 = total_entries >= MAX_U16_FIELD
            || directory_size >= MAX_U32_FIELD
            || directory_offset >= MAX_U32_FIELD;
        if needs_zip64 {
            debug!(
                "trailer needs zip64: entries={total_entries} size={directory_size} \
                 offset={directory_offset}"
            );
            let end_record = Zip64EndRecord {
                version_made: ZIP64_VERSION_NEEDED,
                version_needed: ZIP64_VERSION_NEEDED,
                disk_number: 0,
                directory_start_disk: 0,
                entries_on_disk: total_entries,
                total_entries,
                directory_size,
                directory_offset,
                extensible_data: Vec::new(),
            };
            let locator = Zip64Locator {
                zip64_end_disk: 0,
                // The zip64 end record is written directly after the
                // central directory.
                zip64_end_offset: directory_offset + directory_size,
                total_disks: 1,
            };
            self.zip64 = Some((end_record, locator));
        } else {
            self.zip64 = None;
        }

        let clamp16 = |value: u64| -> u16 { value.min(MAX_U16_FIELD) as u16 };
        let clamp32 = |value: u64| -> u32 { value.min(MAX_U32_FIELD) as u32 };
        self.end.entries_on_disk = clamp16(total_entries);
        self.end.total_entries = clamp16(total_entries);
        self.end.directory_size = clamp32(directory_size);
        self.end.directory_offset = clamp32(directory_offset);
    }

    /// Sets the free-text archive comment.
    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) -> Result<()> {
        let comment = comment.into();
        if comment.len() > MAX_COMMENT_LENGTH {
            return Err(Error::InvalidFormat(format!(
                "archive comment length {} exceeds 65535",
                comment.len()
            )));
        }
        self.end.comment = comment;
        Ok(())
    }

    /// The archive comment bytes.
    pub fn comment(&self) -> &[u8] {
        &self.end.comment
    }

    /// Total central directory entries, preferring the Zip64 record.
    pub fn total_entries(&self) -> u64 {
        match &self.zip64 {
            Some((record, _)) if u64::from(self.end.total_entries) == MAX_U16_FIELD => {
                record.total_entries
            }
            _ => u64::from(self.end.total_entries),
        }
    }

    /// Central directory size in bytes, preferring the Zip64 record.
    pub fn directory_size(&self) -> u64 {
        match &self.zip64 {
            Some((record, _)) if u64::from(self.end.directory_size) == MAX_U32_FIELD => {
                record.directory_size
            }
            _ => u64::from(self.end.directory_size),
        }
    }

    /// Central directory offset, preferring the Zip64 record.
    pub fn directory_offset(&self) -> u64 {
        match &self.zip64 {
            Some((record, _)) if u64::from(self.end.directory_offset) == MAX_U32_FIELD => {
                record.directory_offset
            }
            _ => u64::from(self.end.directory_offset),
        }
    }

    /// Whether the Zip64 pair is attached.
    pub fn is_zip64(&self) -> bool {
        self.zip64.is_some()
    }

    /// The classic end record.
    pub fn end_record(&self) -> &EndOfCentralDirectory {
        &self.end
    }

    /// The Zip64 end record, when attached.
    pub fn zip64_end_record(&self) -> Option<&Zip64EndRecord> {
        self.zip64.as_ref().map(|(record, _)| record)
    }

    /// Writes the trailer: Zip64 pair (when attached) then the end record.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if let Some((record, locator)) = &self.zip64 {
            record.write(w)?;
            locator.write(w)?;
        }
        self.end.write(w)
    }

    /// Size of the whole encoded trailer in bytes.
    pub fn encoded_len(&self) -> u64 {
        let zip64_len = self
            .zip64
            .as_ref()
            .map_or(0, |(record, _)| record.encoded_len() + 20);
        zip64_len + self.end.encoded_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_end_record_roundtrip() {
        let mut trailer = Trailer::new(3, 150, 1024);
        trailer.set_comment("built by tests").unwrap();
        assert!(!trailer.is_zip64());

        let mut bytes = Vec::new();
        trailer.write(&mut bytes).unwrap();
        assert_eq!(bytes.len() as u64, trailer.encoded_len());

        let mut cursor = Cursor::new(&bytes);
        let end = EndOfCentralDirectory::read(&mut cursor).unwrap().unwrap();
        assert_eq!(end.total_entries, 3);
        assert_eq!(end.directory_size, 150);
        assert_eq!(end.directory_offset, 1024);
        assert_eq!(end.comment, b"built by tests");
    }

    #[test]
    fn test_end_record_wrong_signature_rewinds() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, ZIP64_LOCATOR_SIGNATURE).unwrap();
        let mut cursor = Cursor::new(&bytes);
        assert!(EndOfCentralDirectory::read(&mut cursor).unwrap().is_none());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_zip64_attached_for_large_offset() {
        let trailer = Trailer::new(10, 500, 0x1_0000_0000);
        assert!(trailer.is_zip64());
        assert_eq!(trailer.directory_offset(), 0x1_0000_0000);
        assert_eq!(trailer.end_record().directory_offset, 0xffff_ffff);
        // Counts that fit stay in the narrow fields.
        assert_eq!(trailer.end_record().total_entries, 10);

        let record = trailer.zip64_end_record().unwrap();
        assert_eq!(record.directory_offset, 0x1_0000_0000);
        assert_eq!(record.version_needed, ZIP64_VERSION_NEEDED);
    }

    #[test]
    fn test_zip64_attached_for_entry_count() {
        let trailer = Trailer::new(0x1_0000, 500, 1000);
        assert!(trailer.is_zip64());
        assert_eq!(trailer.total_entries(), 0x1_0000);
        assert_eq!(trailer.end_record().total_entries, 0xffff);
    }

    #[test]
    fn test_zip64_attached_at_sentinel_boundary() {
        // Exactly 0xFFFF entries is the sentinel value, so the narrow field
        // alone cannot represent it.
        let trailer = Trailer::new(0xffff, 500, 1000);
        assert!(trailer.is_zip64());
        assert_eq!(trailer.total_entries(), 0xffff);
        assert_eq!(trailer.zip64_end_record().unwrap().total_entries, 0xffff);

        let below = Trailer::new(0xfffe, 500, 1000);
        assert!(!below.is_zip64());
    }

    #[test]
    fn test_zip64_detaches_when_geometry_shrinks() {
        let mut trailer = Trailer::new(10, 500, 0x1_0000_0000);
        assert!(trailer.is_zip64());
        trailer.set_directory(10, 500, 2048);
        assert!(!trailer.is_zip64());
        assert_eq!(trailer.directory_offset(), 2048);
    }

    #[test]
    fn test_zip64_trailer_roundtrip() {
        let trailer = Trailer::new(0x1_0000, 0x200, 0x1_0000_0000);
        let mut bytes = Vec::new();
        trailer.write(&mut bytes).unwrap();

        let mut cursor = Cursor::new(&bytes);
        let record = Zip64EndRecord::read(&mut cursor).unwrap().unwrap();
        let locator = Zip64Locator::read(&mut cursor).unwrap().unwrap();
        let end = EndOfCentralDirectory::read(&mut cursor).unwrap().unwrap();

        assert_eq!(record.total_entries, 0x1_0000);
        assert_eq!(record.directory_offset, 0x1_0000_0000);
        assert_eq!(locator.zip64_end_offset, 0x1_0000_0000 + 0x200);
        assert_eq!(end.total_entries, 0xffff);

        let rebuilt = Trailer::from_records(end, Some((record, locator)));
        assert_eq!(rebuilt.total_entries(), 0x1_0000);
        assert_eq!(rebuilt.directory_offset(), 0x1_0000_0000);
    }

    #[test]
    fn test_zip64_end_record_undersized_declaration() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, ZIP64_END_RECORD_SIGNATURE).unwrap();
        write_u64(&mut bytes, 20).unwrap();
        bytes.resize(bytes.len() + 44, 0);

        let mut cursor = Cursor::new(&bytes);
        let err = Zip64EndRecord::read(&mut cursor).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidContainerSize {
                container: "zip64 end record",
                declared: 20,
                measured: 44,
            }
        ));
    }

    #[test]
    fn test_comment_length_cap() {
        let mut trailer = Trailer::new(0, 0, 0);
        assert!(trailer.set_comment(vec![b'x'; 65535]).is_ok());
        assert!(trailer.set_comment(vec![b'x'; 65536]).is_err());
    }
}
