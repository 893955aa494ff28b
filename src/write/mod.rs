//! Whole-archive writing.
//!
//! [`Writer`] makes one forward pass over a plain `Write` sink, no seeking:
//! local records stream out as entries are added, while the central
//! directory is staged in memory and emitted by [`finish`](Writer::finish)
//! together with the optional signing block and the trailer.

use std::io::Write;

use log::debug;

use crate::compression::CompressionTransform;
use crate::error::{Error, Result};
use crate::format::central_entry::CentralDirectoryEntry;
use crate::format::data_descriptor::DataDescriptor;
use crate::format::end_record::Trailer;
use crate::format::local_header::LocalFileHeader;
use crate::format::timestamp::DosDateTime;
use crate::format::MAX_COMMENT_LENGTH;
use crate::signing::SigningBlock;

/// Default version fields written for new entries: 2.0, MS-DOS origin.
const DEFAULT_VERSION: u16 = 20;

/// Byte totals reported by [`Writer::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveTotals {
    /// Number of entries written.
    pub entries: u64,
    /// Offset of the central directory from the start of the output.
    pub directory_offset: u64,
    /// Central directory size in bytes.
    pub directory_size: u64,
    /// Signing block length, zero when none was set.
    pub signing_block_len: u64,
    /// Total bytes written, trailer included.
    pub total_len: u64,
}

/// Streaming archive writer over a non-seekable sink.
pub struct Writer<W: Write> {
    sink: W,
    position: u64,
    entries: Vec<CentralDirectoryEntry>,
    signing_block: Option<SigningBlock>,
    comment: Vec<u8>,
    timestamp: DosDateTime,
}

impl<W: Write> Writer<W> {
    /// A writer over the given sink.
    pub fn new(sink: W) -> Self {
        Writer {
            sink,
            position: 0,
            entries: Vec::new(),
            signing_block: None,
            comment: Vec::new(),
            timestamp: DosDateTime::default(),
        }
    }

    /// Sets the modification timestamp stamped on subsequent entries.
    pub fn set_timestamp(&mut self, when: DosDateTime) {
        self.timestamp = when;
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
        self.comment = comment;
        Ok(())
    }

    /// Sets the signing block emitted before the central directory.
    ///
    /// The block is refreshed (sorted and padded) at finish time.
    pub fn set_signing_block(&mut self, block: SigningBlock) {
        self.signing_block = Some(block);
    }

    /// Adds an entry from uncompressed bytes, running them through the
    /// given transform.
    ///
    /// The CRC and both sizes are computed here, so the local header is
    /// complete up front and no data descriptor is needed.
    pub fn add_bytes(
        &mut self,
        name: impl Into<Vec<u8>>,
        data: &[u8],
        transform: &dyn CompressionTransform,
    ) -> Result<()> {
        let crc32 = crc32fast::hash(data);
        let stored = transform.compress(data)?;
        let header = LocalFileHeader::builder()
            .file_name(name)
            .version_needed(DEFAULT_VERSION)
            .compression_method(transform.method())
            .last_modified(self.timestamp)
            .crc32(crc32)
            .compressed_size(stored.len() as u64)
            .uncompressed_size(data.len() as u64)
            .build()?;
        self.write_entry(&header, &stored, None)
    }

    /// Adds an entry in streamed form: the local header carries zeros and
    /// the CRC/sizes follow the data in a descriptor.
    pub fn add_bytes_streamed(
        &mut self,
        name: impl Into<Vec<u8>>,
        data: &[u8],
        transform: &dyn CompressionTransform,
    ) -> Result<()> {
        let crc32 = crc32fast::hash(data);
        let stored = transform.compress(data)?;
        let header = LocalFileHeader::builder()
            .file_name(name)
            .version_needed(DEFAULT_VERSION)
            .compression_method(transform.method())
            .last_modified(self.timestamp)
            .with_data_descriptor()
            .build()?;
        let descriptor = DataDescriptor::builder()
            .crc32(crc32)
            .compressed_size(stored.len() as u64)
            .uncompressed_size(data.len() as u64)
            .build();
        self.write_entry(&header, &stored, Some(descriptor))
    }

    /// Adds an entry whose data is already in stored form.
    ///
    /// The header's compressed size must match the data exactly.
    pub fn add_entry_raw(&mut self, header: &LocalFileHeader, stored: &[u8]) -> Result<()> {
        if header.compressed_size() != stored.len() as u64 {
            return Err(Error::InvalidContainerSize {
                container: "entry data",
                declared: header.compressed_size(),
                measured: stored.len() as u64,
            });
        }
        self.write_entry(header, stored, None)
    }

    fn write_entry(
        &mut self,
        header: &LocalFileHeader,
        stored: &[u8],
        descriptor: Option<DataDescriptor>,
    ) -> Result<()> {
        let offset = self.position;
        let mut buf = Vec::with_capacity(header.encoded_len() as usize);
        header.write(&mut buf)?;
        self.write_tracked(&buf)?;
        self.write_tracked(stored)?;

        let mut builder = CentralDirectoryEntry::builder()
            .matching_local(header)
            .version_made(DEFAULT_VERSION)
            .local_header_offset(offset);
        if let Some(descriptor) = descriptor {
            let mut buf = Vec::with_capacity(descriptor.encoded_len() as usize);
            descriptor.write(&mut buf)?;
            self.write_tracked(&buf)?;
            // The central entry records the true values the streamed local
            // header left at zero.
            builder = builder
                .crc32(descriptor.crc32)
                .compressed_size(descriptor.compressed_size)
                .uncompressed_size(descriptor.uncompressed_size);
        }
        let entry = builder.build()?;
        debug!(
            "wrote entry {:?} at {offset}: {} stored bytes",
            entry.file_name_lossy(),
            stored.len(),
        );
        self.entries.push(entry);
        Ok(())
    }

    fn write_tracked(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Emits the signing block, central directory, and trailer, then
    /// returns the sink and the layout totals.
    pub fn finish(mut self) -> Result<(W, ArchiveTotals)> {
        let signing_block_len = match self.signing_block.take() {
            Some(mut block) => {
                block.refresh();
                let encoded = block.encode();
                self.write_tracked(&encoded)?;
                encoded.len() as u64
            }
            None => 0,
        };

        let directory_offset = self.position;
        let mut directory = Vec::new();
        for entry in &self.entries {
            entry.write(&mut directory)?;
        }
        self.write_tracked(&directory)?;
        let directory_size = self.position - directory_offset;

        let mut trailer = Trailer::new(
            self.entries.len() as u64,
            directory_size,
            directory_offset,
        );
        trailer.set_comment(std::mem::take(&mut self.comment))?;
        let mut buf = Vec::with_capacity(trailer.encoded_len() as usize);
        trailer.write(&mut buf)?;
        self.write_tracked(&buf)?;

        self.sink.flush()?;
        let totals = ArchiveTotals {
            entries: self.entries.len() as u64,
            directory_offset,
            directory_size,
            signing_block_len,
            total_len: self.position,
        };
        debug!(
            "finished archive: {} entries, directory at {}, {} bytes total",
            totals.entries, totals.directory_offset, totals.total_len,
        );
        Ok((self.sink, totals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::StoredTransform;
    use crate::read::Archive;
    use crate::signing::{SignatureId, SignatureInfo};
    use std::io::Cursor;

    #[test]
    fn test_roundtrip_through_archive() {
        let mut writer = Writer::new(Vec::new());
        writer.set_timestamp(DosDateTime::from_parts(2024, 6, 15, 12, 0, 0));
        writer.add_bytes("hello.txt", b"hello", &StoredTransform).unwrap();
        writer.add_bytes("data.bin", &[7u8; 256], &StoredTransform).unwrap();
        writer.set_comment("round trip").unwrap();
        let (bytes, totals) = writer.finish().unwrap();

        assert_eq!(totals.entries, 2);
        assert_eq!(totals.total_len, bytes.len() as u64);
        assert_eq!(totals.signing_block_len, 0);

        let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.comment(), b"round trip");
        let index = archive.entry_index(b"hello.txt").unwrap();
        assert_eq!(archive.read_entry(index).unwrap(), b"hello");
        let entry = &archive.entries()[index];
        assert_eq!(entry.compressed_size(), 5);
        assert_eq!(entry.last_modified.year(), 2024);
    }

    #[test]
    fn test_streamed_entry() {
        let mut writer = Writer::new(Vec::new());
        writer
            .add_bytes_streamed("stream.bin", &[1u8; 100], &StoredTransform)
            .unwrap();
        let (bytes, _) = writer.finish().unwrap();

        let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
        let entry = &archive.entries()[0];
        assert!(entry.flags.has_data_descriptor());
        assert_eq!(entry.uncompressed_size(), 100);
        assert_eq!(entry.crc32, crc32fast::hash(&[1u8; 100]));
        assert_eq!(archive.read_entry(0).unwrap(), vec![1u8; 100]);
    }

    #[test]
    fn test_signing_block_emitted_before_directory() {
        let mut block = SigningBlock::new();
        block.set_entry(SignatureInfo::new(SignatureId::V2, vec![0xabu8; 128]));

        let mut writer = Writer::new(Vec::new());
        writer.add_bytes("a.txt", b"aaaa", &StoredTransform).unwrap();
        writer.set_signing_block(block);
        let (bytes, totals) = writer.finish().unwrap();
        assert_eq!(totals.signing_block_len % 4096, 0);

        let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
        let block = archive.signing_block().unwrap();
        assert!(block.entry(SignatureId::V2).is_some());
        assert!(block.entry(SignatureId::Padding).is_some());
        assert_eq!(
            archive.signing_block_offset().unwrap() + totals.signing_block_len,
            totals.directory_offset
        );
        // The signing block must not break entry access.
        assert_eq!(archive.read_entry(0).unwrap(), b"aaaa");
    }

    #[test]
    fn test_add_entry_raw_size_check() {
        let header = LocalFileHeader::builder()
            .file_name("raw.bin")
            .compressed_size(10)
            .uncompressed_size(10)
            .build()
            .unwrap();
        let mut writer = Writer::new(Vec::new());
        let err = writer.add_entry_raw(&header, &[0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidContainerSize {
                container: "entry data",
                declared: 10,
                measured: 4,
            }
        ));
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_deflate_roundtrip() {
        use crate::compression::DeflateTransform;

        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 17) as u8).collect();
        let mut writer = Writer::new(Vec::new());
        writer
            .add_bytes("packed.bin", &data, &DeflateTransform::default())
            .unwrap();
        let (bytes, _) = writer.finish().unwrap();

        let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
        assert!(archive.entries()[0].compressed_size() < data.len() as u64);
        assert_eq!(archive.read_entry(0).unwrap(), data);
    }
}
