//! Write-then-read round trips through the full archive pipeline.

mod common;

use std::io::{Cursor, Write};

use zapk::{
    Archive, CompressionMethod, DosDateTime, LocalEntryIter, Result, StoredTransform, Writer,
};

#[test]
fn test_hello_txt_scenario() {
    // One stored 5-byte entry named hello.txt with a known CRC.
    let bytes = common::stored_archive(&[("hello.txt", b"hello")]);
    let mut archive = Archive::open(Cursor::new(bytes)).unwrap();

    let entry = &archive.entries()[0];
    assert_eq!(entry.file_name(), b"hello.txt");
    assert_eq!(entry.compression_method, CompressionMethod::Stored);
    assert_eq!(entry.compression_method.raw(), 0);
    assert_eq!(entry.compressed_size(), 5);
    assert_eq!(entry.uncompressed_size(), 5);
    assert_eq!(entry.crc32, 0x3610a686);
    assert!(!entry.is_zip64());

    assert_eq!(archive.read_entry(0).unwrap(), b"hello");
}

#[test]
fn test_many_entries_roundtrip() {
    let files: Vec<(String, Vec<u8>)> = (0..50usize)
        .map(|i| (format!("dir/file-{i:02}.bin"), vec![i as u8; 10 + i]))
        .collect();
    let borrowed: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect();
    let bytes = common::stored_archive(&borrowed);

    let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.entries().len(), 50);
    assert!(archive.damaged().is_empty());
    for (name, data) in &files {
        let index = archive.entry_index(name.as_bytes()).unwrap();
        assert_eq!(&archive.read_entry(index).unwrap(), data);
    }
}

#[test]
fn test_no_zip64_below_four_gib() {
    let bytes = common::stored_archive(&[("small.txt", b"small")]);
    let archive = Archive::open(Cursor::new(bytes)).unwrap();
    assert!(!archive.entries()[0].is_zip64());
    assert!(!archive.trailer().is_zip64());
}

#[test]
fn test_comment_and_timestamp_survive() {
    let mut writer = Writer::new(Vec::new());
    writer.set_timestamp(DosDateTime::from_parts(2023, 11, 5, 8, 30, 14));
    writer.add_bytes("stamped.txt", b"data", &StoredTransform).unwrap();
    writer.set_comment("release build").unwrap();
    let (bytes, _) = writer.finish().unwrap();

    let archive = Archive::open(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.comment(), b"release build");
    let stamp = archive.entries()[0].last_modified;
    assert_eq!(stamp.year(), 2023);
    assert_eq!(stamp.month(), 11);
    assert_eq!(stamp.second(), 14);
}

#[test]
fn test_open_path_roundtrip() -> Result<()> {
    let bytes = common::stored_archive(&[("on-disk.txt", b"persisted")]);
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&bytes)?;
    file.flush()?;

    let mut archive = Archive::open_path(file.path())?;
    let index = archive.entry_index(b"on-disk.txt").unwrap();
    assert_eq!(archive.read_entry(index)?, b"persisted");
    Ok(())
}

#[test]
fn test_forward_scan_matches_directory() {
    let bytes = common::stored_archive(&[("a.txt", b"alpha"), ("b.txt", b"beta")]);

    let mut cursor = Cursor::new(bytes.clone());
    let scanned: Vec<_> = LocalEntryIter::new(&mut cursor)
        .collect::<Result<_>>()
        .unwrap();
    let archive = Archive::open(Cursor::new(bytes)).unwrap();

    assert_eq!(scanned.len(), archive.entries().len());
    for (local, central) in scanned.iter().zip(archive.entries()) {
        assert_eq!(local.header.file_name(), central.file_name());
        assert_eq!(local.header.crc32, central.crc32);
        assert_eq!(local.data.len() as u64, central.compressed_size());
    }
}

#[test]
fn test_streamed_entry_descriptor_on_disk() {
    let mut writer = Writer::new(Vec::new());
    writer
        .add_bytes_streamed("streamed.bin", b"streamed payload", &StoredTransform)
        .unwrap();
    let (bytes, _) = writer.finish().unwrap();

    let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
    let entry = &archive.entries()[0];
    assert!(entry.flags.has_data_descriptor());
    assert_eq!(entry.uncompressed_size(), 16);
    assert_eq!(archive.read_entry(0).unwrap(), b"streamed payload");
}

#[cfg(feature = "deflate")]
#[test]
fn test_mixed_methods_roundtrip() {
    use zapk::DeflateTransform;

    let text: Vec<u8> = b"the quick brown fox jumps over the lazy dog "
        .iter()
        .cycle()
        .take(4096)
        .copied()
        .collect();

    let mut writer = Writer::new(Vec::new());
    writer.add_bytes("stored.txt", b"tiny", &StoredTransform).unwrap();
    writer
        .add_bytes("packed.txt", &text, &DeflateTransform::default())
        .unwrap();
    let (bytes, _) = writer.finish().unwrap();

    let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
    let stored = archive.entry_index(b"stored.txt").unwrap();
    let packed = archive.entry_index(b"packed.txt").unwrap();
    assert_eq!(
        archive.entries()[stored].compression_method,
        CompressionMethod::Stored
    );
    assert_eq!(
        archive.entries()[packed].compression_method,
        CompressionMethod::Deflated
    );
    assert!(archive.entries()[packed].compressed_size() < text.len() as u64);
    assert_eq!(archive.read_entry(stored).unwrap(), b"tiny");
    assert_eq!(archive.read_entry(packed).unwrap(), text);
}
