//! Guards against forged size fields forcing oversized allocations.
//!
//! Every size an archive declares is untrusted: a trailer or central entry
//! can claim terabytes while the file holds kilobytes. These tests verify
//! that such claims come back as errors before any buffer of the claimed
//! size is allocated.

mod common;

use std::io::Cursor;

use zapk::{Archive, EndOfCentralDirectory, Error, LocalEntryIter, Zip64EndRecord, Zip64Locator};

#[test]
fn test_forged_directory_size_rejected() {
    let mut bytes = common::stored_archive(&[("hello.txt", b"hello")]);
    // The 32-bit directory size sits 10 bytes from the end of a
    // comment-less end record.
    let at = bytes.len() - 10;
    bytes[at..at + 4].copy_from_slice(&0x7fff_ffffu32.to_le_bytes());

    let err = Archive::open(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidContainerSize {
            container: "central directory",
            declared: 0x7fff_ffff,
            ..
        }
    ));
}

#[test]
fn test_forged_zip64_directory_size_rejected() {
    // A hand-built trailer whose zip64 end record claims a 2^48-byte
    // directory in a file a few dozen bytes long.
    let record = Zip64EndRecord {
        version_made: 45,
        version_needed: 45,
        disk_number: 0,
        directory_start_disk: 0,
        entries_on_disk: 1,
        total_entries: 1,
        directory_size: 1 << 48,
        directory_offset: 0,
        extensible_data: Vec::new(),
    };
    let locator = Zip64Locator {
        zip64_end_disk: 0,
        zip64_end_offset: 0,
        total_disks: 1,
    };
    let end = EndOfCentralDirectory {
        disk_number: 0,
        directory_start_disk: 0,
        entries_on_disk: 0xffff,
        total_entries: 0xffff,
        directory_size: 0xffff_ffff,
        directory_offset: 0xffff_ffff,
        comment: Vec::new(),
    };
    let mut bytes = Vec::new();
    record.write(&mut bytes).unwrap();
    locator.write(&mut bytes).unwrap();
    end.write(&mut bytes).unwrap();

    let err = Archive::open(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidContainerSize {
            container: "central directory",
            declared,
            ..
        } if declared == 1 << 48
    ));
}

#[test]
fn test_forged_entry_size_rejected_before_read() {
    let bytes = common::stored_archive(&[("hello.txt", b"hello")]);
    let directory_offset = {
        let archive = Archive::open(Cursor::new(bytes.clone())).unwrap();
        archive.trailer().directory_offset() as usize
    };
    // The central entry's compressed size sits 20 bytes into the record.
    let mut forged = bytes;
    let at = directory_offset + 20;
    forged[at..at + 4].copy_from_slice(&0x7fff_ffffu32.to_le_bytes());

    let mut archive = Archive::open(Cursor::new(forged)).unwrap();
    let err = archive.entry_data(0).unwrap_err();
    assert!(matches!(
        err,
        Error::Truncated {
            record: "entry data"
        }
    ));
}

#[test]
fn test_forward_scan_rejects_forged_local_size() {
    let bytes = common::stored_archive(&[("hello.txt", b"hello")]);
    // The local header's compressed size sits 18 bytes into the record.
    let mut forged = bytes;
    forged[18..22].copy_from_slice(&0x7fff_ffffu32.to_le_bytes());

    let mut cursor = Cursor::new(forged);
    let err = LocalEntryIter::new(&mut cursor)
        .next()
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Truncated {
            record: "entry data"
        }
    ));
}
