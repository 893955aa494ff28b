//! Whole-archive reading.
//!
//! [`Archive::open`] locates the trailer, walks the central directory, and
//! probes for a signing block, all up front; entry data is then fetched on
//! demand by seeking to the local headers the directory points at. For
//! archives without a usable central directory there is also
//! [`LocalEntryIter`], a forward scan over the local records themselves.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, warn};

use crate::compression::transform_for;
use crate::error::{Error, Result};
use crate::format::central_entry::CentralDirectoryEntry;
use crate::format::data_descriptor::DataDescriptor;
use crate::format::end_record::Trailer;
use crate::format::local_header::LocalFileHeader;
use crate::format::locator;
use crate::format::CENTRAL_ENTRY_SIGNATURE;
use crate::signing::SigningBlock;

/// A parsed archive over a seekable reader.
///
/// The central directory and trailer are read eagerly by
/// [`open`](Self::open); entry payloads stay on disk until asked for.
pub struct Archive<R> {
    reader: R,
    stream_len: u64,
    trailer: Trailer,
    entries: Vec<CentralDirectoryEntry>,
    damaged: Vec<(usize, Error)>,
    signing_block: Option<SigningBlock>,
    signing_block_offset: Option<u64>,
}

impl<R> std::fmt::Debug for Archive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.entries.len())
            .field("damaged", &self.damaged.len())
            .field("signed", &self.signing_block.is_some())
            .finish_non_exhaustive()
    }
}

impl Archive<BufReader<File>> {
    /// Opens an archive file from a filesystem path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Archive::open(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Opens an archive over any seekable reader.
    ///
    /// A corrupt central entry does not abort the walk: the directory bytes
    /// are rescanned for the next entry signature and the failure is kept,
    /// per entry, in [`damaged`](Self::damaged).
    pub fn open(mut reader: R) -> Result<Self> {
        let located = locator::locate(&mut reader)?;
        let trailer = located.trailer;
        let stream_len = reader.seek(SeekFrom::End(0))?;

        // Bound the declared directory span against the stream before
        // allocating for it; the size fields are untrusted input.
        let directory_offset = trailer.directory_offset();
        let directory_size = trailer.directory_size();
        if directory_offset > stream_len
            || directory_size > stream_len - directory_offset
        {
            return Err(Error::InvalidContainerSize {
                container: "central directory",
                declared: directory_size,
                measured: stream_len.saturating_sub(directory_offset),
            });
        }
        reader.seek(SeekFrom::Start(directory_offset))?;
        let mut directory = vec![0u8; directory_size as usize];
        reader
            .read_exact(&mut directory)
            .map_err(|e| Error::truncated("central directory", e))?;
        let (entries, damaged) = read_directory(&directory, trailer.total_entries());

        let (signing_block, signing_block_offset) =
            match SigningBlock::read_preceding(&mut reader, directory_offset)? {
                Some((block, offset)) => (Some(block), Some(offset)),
                None => (None, None),
            };

        debug!(
            "opened archive: {} entries ({} damaged), signed={}",
            entries.len(),
            damaged.len(),
            signing_block.is_some(),
        );
        Ok(Archive {
            reader,
            stream_len,
            trailer,
            entries,
            damaged,
            signing_block,
            signing_block_offset,
        })
    }

    /// The central directory entries that parsed cleanly, in directory order.
    pub fn entries(&self) -> &[CentralDirectoryEntry] {
        &self.entries
    }

    /// Directory positions that failed to parse, with their failures.
    pub fn damaged(&self) -> &[(usize, Error)] {
        &self.damaged
    }

    /// The archive trailer.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// The archive comment bytes.
    pub fn comment(&self) -> &[u8] {
        self.trailer.comment()
    }

    /// The signing block, when the archive carries one.
    pub fn signing_block(&self) -> Option<&SigningBlock> {
        self.signing_block.as_ref()
    }

    /// Start offset of the signing block, when the archive carries one.
    pub fn signing_block_offset(&self) -> Option<u64> {
        self.signing_block_offset
    }

    /// Index of the first entry with the given name.
    pub fn entry_index(&self, name: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| e.file_name() == name)
    }

    /// Reads an entry's stored bytes without undoing the compression.
    ///
    /// Seeks to the local header the central entry points at and
    /// cross-checks it before trusting the data that follows it.
    pub fn entry_data(&mut self, index: usize) -> Result<Vec<u8>> {
        let (offset, name, compressed_size) = {
            let entry = &self.entries[index];
            (
                entry.local_header_offset(),
                entry.file_name().to_vec(),
                entry.compressed_size(),
            )
        };

        self.reader.seek(SeekFrom::Start(offset))?;
        let header = LocalFileHeader::read(&mut self.reader)?.ok_or_else(|| {
            Error::InvalidFormat(format!(
                "central entry {:?} points at offset {offset:#x} but no local header is there",
                String::from_utf8_lossy(&name)
            ))
        })?;
        if header.file_name() != name {
            return Err(Error::InvalidFormat(format!(
                "local header at {offset:#x} names {:?}, central entry names {:?}",
                header.file_name_lossy(),
                String::from_utf8_lossy(&name),
            )));
        }

        // The central entry's sizes are authoritative; a streamed local
        // header carries zeros. A size reaching past the end of the stream
        // is rejected before the buffer is allocated.
        let data_start = self.reader.stream_position()?;
        if compressed_size > self.stream_len.saturating_sub(data_start) {
            return Err(Error::Truncated {
                record: "entry data",
            });
        }
        let mut data = vec![0u8; compressed_size as usize];
        self.reader
            .read_exact(&mut data)
            .map_err(|e| Error::truncated("entry data", e))?;
        Ok(data)
    }

    /// Reads an entry, undoes its compression, and verifies the CRC-32.
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        let (method, uncompressed_size, expected_crc, name) = {
            let entry = &self.entries[index];
            (
                entry.compression_method,
                entry.uncompressed_size(),
                entry.crc32,
                entry.file_name_lossy(),
            )
        };
        let stored = self.entry_data(index)?;

        let transform = transform_for(method).ok_or_else(|| {
            Error::InvalidFormat(format!("no transform available for {method}"))
        })?;
        let data = transform.decompress(&stored, uncompressed_size)?;

        let actual = crc32fast::hash(&data);
        if actual != expected_crc {
            return Err(Error::CrcMismatch {
                name,
                expected: expected_crc,
                actual,
            });
        }
        Ok(data)
    }

    /// Consumes the archive and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Walks the in-memory central directory bytes.
///
/// After a bad entry the buffer is rescanned for the next entry signature,
/// so one corrupt record costs one entry, not the rest of the directory.
fn read_directory(
    directory: &[u8],
    expected_entries: u64,
) -> (Vec<CentralDirectoryEntry>, Vec<(usize, Error)>) {
    let mut cursor = std::io::Cursor::new(directory);
    let mut entries = Vec::new();
    let mut damaged = Vec::new();
    let mut index = 0usize;

    while (entries.len() as u64) < expected_entries {
        if cursor.position() as usize + 4 > directory.len() {
            break;
        }
        match CentralDirectoryEntry::read(&mut cursor) {
            Ok(Some(entry)) => {
                entries.push(entry);
            }
            Ok(None) => {
                // No signature where an entry should start.
                let position = cursor.position() as usize;
                match next_signature(directory, position + 1) {
                    Some(resync) => {
                        warn!("stray bytes in central directory at {position}, resyncing");
                        damaged.push((
                            index,
                            Error::InvalidFormat(format!(
                                "expected central entry signature at directory offset {position}"
                            )),
                        ));
                        cursor.set_position(resync as u64);
                    }
                    None => break,
                }
            }
            Err(err) => {
                let position = cursor.position() as usize;
                warn!("central entry {index} failed to parse: {err}");
                damaged.push((index, err));
                match next_signature(directory, position) {
                    Some(resync) => cursor.set_position(resync as u64),
                    None => break,
                }
            }
        }
        index += 1;
    }
    (entries, damaged)
}

fn next_signature(directory: &[u8], from: usize) -> Option<usize> {
    let magic = CENTRAL_ENTRY_SIGNATURE.to_le_bytes();
    if directory.len() < 4 || from > directory.len() - 4 {
        return None;
    }
    (from..=directory.len() - 4).find(|&i| directory[i..i + 4] == magic)
}

/// One record yielded by the forward scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// The local file header.
    pub header: LocalFileHeader,
    /// The stored (still transformed) entry bytes.
    pub data: Vec<u8>,
    /// The trailing data descriptor, when the header's flag promises one.
    pub descriptor: Option<DataDescriptor>,
}

/// Forward scan over local file records.
///
/// Starts at the reader's current position and yields entries until the
/// first record that is not a local header, which in a well-formed archive
/// is the start of the central directory (or the signing block).
pub struct LocalEntryIter<'a, R> {
    reader: &'a mut R,
    done: bool,
}

impl<'a, R: Read + Seek> LocalEntryIter<'a, R> {
    /// A scan starting at the reader's current position.
    pub fn new(reader: &'a mut R) -> Self {
        LocalEntryIter {
            reader,
            done: false,
        }
    }

    fn read_next(&mut self) -> Result<Option<LocalEntry>> {
        let Some(header) = LocalFileHeader::read(self.reader)? else {
            return Ok(None);
        };
        let compressed_size = header.compressed_size();
        if header.has_data_descriptor() && compressed_size == 0 {
            // A streamed entry records its sizes only after the data, so a
            // forward scan cannot know where the data ends.
            return Err(Error::InvalidFormat(format!(
                "streamed entry {:?} has no recorded size, use the central directory",
                header.file_name_lossy()
            )));
        }
        let data_start = self.reader.stream_position()?;
        let stream_len = self.reader.seek(SeekFrom::End(0))?;
        self.reader.seek(SeekFrom::Start(data_start))?;
        if compressed_size > stream_len - data_start {
            return Err(Error::Truncated {
                record: "entry data",
            });
        }
        let mut data = vec![0u8; compressed_size as usize];
        self.reader
            .read_exact(&mut data)
            .map_err(|e| Error::truncated("entry data", e))?;
        let descriptor = if header.has_data_descriptor() {
            Some(DataDescriptor::read(self.reader, header.is_zip64())?)
        } else {
            None
        };
        Ok(Some(LocalEntry {
            header,
            data,
            descriptor,
        }))
    }
}

impl<'a, R: Read + Seek> Iterator for LocalEntryIter<'a, R> {
    type Item = Result<LocalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
