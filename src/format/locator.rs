//! Locating the archive trailer from the end of the file.
//!
//! The end record is followed by a free-text comment of unknown length, so
//! it cannot be found by seeking a fixed distance from the end. The locator
//! reads a bounded window (maximum comment plus the fixed record size) off
//! the tail and scans it backward for the end-record magic, taking the first
//! match found from the highest offset downward. Scanning backward means
//! comment or entry bytes that happen to contain the magic earlier in the
//! window never shadow the genuine record, which is always the rightmost
//! candidate.

use std::io::{Read, Seek, SeekFrom};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::format::end_record::{EndOfCentralDirectory, Trailer, Zip64EndRecord, Zip64Locator};
use crate::format::{
    END_RECORD_SIGNATURE, END_RECORD_SIZE, MAX_COMMENT_LENGTH, MAX_U16_FIELD, MAX_U32_FIELD,
    ZIP64_LOCATOR_SIZE,
};

/// Largest tail window that can contain an end record: the maximum comment
/// plus the fixed record size.
pub const TRAILER_WINDOW: usize = MAX_COMMENT_LENGTH + END_RECORD_SIZE;

/// A trailer found at the end of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedTrailer {
    /// The reassembled trailer records.
    pub trailer: Trailer,
    /// Absolute offset of the end record's signature.
    pub end_record_offset: u64,
}

/// Finds the end-record magic in a tail window.
///
/// Pure function over the byte slice: returns the offset of the rightmost
/// occurrence of the 4-byte magic, or `None` when the window holds no
/// candidate at all.
pub fn find_end_record(window: &[u8]) -> Option<usize> {
    let magic = END_RECORD_SIGNATURE.to_le_bytes();
    if window.len() < 4 {
        return None;
    }
    (0..=window.len() - 4).rev().find(|&i| window[i..i + 4] == magic)
}

/// Locates and reads the archive trailer.
///
/// Reads the bounded tail window, scans it for the end record, and follows
/// the Zip64 locator chain when the end record's counts or offsets hold
/// sentinel values. The cursor position on return is unspecified.
pub fn locate<R: Read + Seek>(r: &mut R) -> Result<LocatedTrailer> {
    let len = r.seek(SeekFrom::End(0))?;
    let window_len = (TRAILER_WINDOW as u64).min(len);
    let window_start = len - window_len;
    r.seek(SeekFrom::Start(window_start))?;
    let mut window = vec![0u8; window_len as usize];
    r.read_exact(&mut window)?;

    let index = find_end_record(&window).ok_or(Error::EndRecordNotFound {
        searched: window_len as usize,
    })?;
    let end_record_offset = window_start + index as u64;
    trace!("end record magic at offset {end_record_offset}");

    r.seek(SeekFrom::Start(end_record_offset))?;
    let end = EndOfCentralDirectory::read(r)?.ok_or_else(|| {
        Error::InvalidFormat("end record vanished between scan and read".to_string())
    })?;

    let zip64 = if has_sentinel(&end) {
        read_zip64_pair(r, end_record_offset)?
    } else {
        None
    };

    let trailer = Trailer::from_records(end, zip64);
    debug!(
        "located trailer: entries={} directory_size={} directory_offset={} zip64={}",
        trailer.total_entries(),
        trailer.directory_size(),
        trailer.directory_offset(),
        trailer.is_zip64(),
    );
    Ok(LocatedTrailer {
        trailer,
        end_record_offset,
    })
}

fn has_sentinel(end: &EndOfCentralDirectory) -> bool {
    u64::from(end.total_entries) == MAX_U16_FIELD
        || u64::from(end.directory_size) == MAX_U32_FIELD
        || u64::from(end.directory_offset) == MAX_U32_FIELD
}

/// Follows the Zip64 chain: locator directly before the end record, then
/// the end record it points at.
///
/// A sentinel without a locator is tolerated (an archive can legitimately
/// hold exactly 65535 entries); a locator pointing at anything other than a
/// Zip64 end record is not.
fn read_zip64_pair<R: Read + Seek>(
    r: &mut R,
    end_record_offset: u64,
) -> Result<Option<(Zip64EndRecord, Zip64Locator)>> {
    if end_record_offset < ZIP64_LOCATOR_SIZE as u64 {
        return Ok(None);
    }
    r.seek(SeekFrom::Start(end_record_offset - ZIP64_LOCATOR_SIZE as u64))?;
    let Some(locator) = Zip64Locator::read(r)? else {
        debug!("sentinel fields without a zip64 locator, keeping raw values");
        return Ok(None);
    };
    r.seek(SeekFrom::Start(locator.zip64_end_offset))?;
    let record = Zip64EndRecord::read(r)?.ok_or_else(|| {
        Error::InvalidFormat(format!(
            "zip64 locator points at offset {:#x} but no zip64 end record is there",
            locator.zip64_end_offset
        ))
    })?;
    Ok(Some((record, locator)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn archive_with_trailer(leading: usize, trailer: &Trailer) -> Vec<u8> {
        let mut bytes = vec![0u8; leading];
        trailer.write(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_find_rightmost_candidate() {
        let magic = END_RECORD_SIGNATURE.to_le_bytes();
        let mut window = vec![0u8; 100];
        window[10..14].copy_from_slice(&magic);
        window[60..64].copy_from_slice(&magic);
        assert_eq!(find_end_record(&window), Some(60));
    }

    #[test]
    fn test_find_nothing() {
        assert_eq!(find_end_record(&[0u8; 100]), None);
        assert_eq!(find_end_record(&[]), None);
    }

    #[test]
    fn test_locate_plain_trailer() {
        let trailer = Trailer::new(2, 96, 128);
        let bytes = archive_with_trailer(224, &trailer);
        let mut cursor = Cursor::new(&bytes);

        let located = locate(&mut cursor).unwrap();
        assert_eq!(located.end_record_offset, 224);
        assert_eq!(located.trailer.total_entries(), 2);
        assert_eq!(located.trailer.directory_offset(), 128);
        assert!(!located.trailer.is_zip64());
    }

    #[test]
    fn test_decoy_magic_before_real_record() {
        // A fake magic planted in the entry data region, left of the real
        // trailer: the rightmost candidate must still win.
        let trailer = Trailer::new(1, 50, 80);
        let mut bytes = archive_with_trailer(130, &trailer);
        bytes[40..44].copy_from_slice(&END_RECORD_SIGNATURE.to_le_bytes());

        let mut cursor = Cursor::new(&bytes);
        let located = locate(&mut cursor).unwrap();
        assert_eq!(located.end_record_offset, 130);
        assert_eq!(located.trailer.total_entries(), 1);
    }

    #[test]
    fn test_no_end_record() {
        let bytes = vec![0u8; 500];
        let mut cursor = Cursor::new(&bytes);
        let err = locate(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::EndRecordNotFound { searched: 500 }));
    }

    #[test]
    fn test_locate_follows_zip64_chain() {
        // Simulated geometry: pretend the directory sits at a >32-bit
        // offset. The zip64 end record is written at the trailer start, so
        // point the locator there instead of the fictitious offset.
        let built = Trailer::new(5, 100, 0x1_0000_0000);
        assert!(built.is_zip64());
        let leading = 64u64;
        let trailer = Trailer::from_records(
            built.end_record().clone(),
            Some((
                built.zip64_end_record().unwrap().clone(),
                Zip64Locator {
                    zip64_end_disk: 0,
                    zip64_end_offset: leading,
                    total_disks: 1,
                },
            )),
        );

        let bytes = archive_with_trailer(leading as usize, &trailer);
        let mut cursor = Cursor::new(&bytes);
        let located = locate(&mut cursor).unwrap();
        assert!(located.trailer.is_zip64());
        assert_eq!(located.trailer.directory_offset(), 0x1_0000_0000);
        assert_eq!(located.trailer.total_entries(), 5);
    }

    #[test]
    fn test_sentinel_without_locator_keeps_raw_values() {
        // Exactly 0xffff entries and no zip64 pair: legitimate, if odd.
        let mut end = EndOfCentralDirectory::default();
        end.entries_on_disk = 0xffff;
        end.total_entries = 0xffff;
        end.directory_size = 10;
        end.directory_offset = 20;
        let mut bytes = vec![0u8; 50];
        end.write(&mut bytes).unwrap();

        let mut cursor = Cursor::new(&bytes);
        let located = locate(&mut cursor).unwrap();
        assert!(!located.trailer.is_zip64());
        assert_eq!(located.trailer.total_entries(), 0xffff);
    }

    #[test]
    fn test_locator_pointing_at_garbage() {
        let locator = Zip64Locator {
            zip64_end_disk: 0,
            zip64_end_offset: 0,
            total_disks: 1,
        };
        let mut end = EndOfCentralDirectory::default();
        end.directory_offset = 0xffff_ffff;

        let mut bytes = vec![0u8; 100];
        locator.write(&mut bytes).unwrap();
        end.write(&mut bytes).unwrap();

        let mut cursor = Cursor::new(&bytes);
        let err = locate(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
