//! The APK Signing Block sitting between entry data and the central
//! directory.
//!
//! Layout: an 8-byte total-size prefix, a run of independently
//! length-prefixed signature entries (8-byte length, 4-byte scheme id,
//! opaque payload), and a 24-byte footer repeating the size followed by the
//! 16-byte magic. Verifiers find the block backward from the central
//! directory start, so the two size fields must agree and the block must end
//! exactly where the directory begins.

pub mod scheme;

use std::io::{Read, Seek, SeekFrom, Write};

use log::debug;

use crate::error::{Error, Result};
use crate::format::cursor::{read_u64, write_u32, write_u64};

pub use scheme::{CertificateDecoder, SignatureId};

/// The 16-byte magic closing the signing block.
pub const SIGNING_BLOCK_MAGIC: [u8; 16] = *b"APK Sig Block 42";

/// Signing blocks are padded so their total length is a multiple of this.
pub const PADDING_ALIGNMENT: u64 = 4096;

/// Fixed footer length: the repeated size plus the magic.
const FOOTER_LEN: u64 = 24;

/// Per-entry overhead: the 8-byte length prefix plus the 4-byte scheme id.
const ENTRY_OVERHEAD: u64 = 12;

/// One signature entry of the signing block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    id: SignatureId,
    payload: Vec<u8>,
}

impl SignatureInfo {
    /// An entry for the given scheme and opaque payload.
    pub fn new(id: SignatureId, payload: Vec<u8>) -> Self {
        SignatureInfo { id, payload }
    }

    /// The scheme id.
    pub fn id(&self) -> SignatureId {
        self.id
    }

    /// The opaque payload bytes, scheme id excluded.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Best-effort raw DER certificate blobs carried by the payload.
    pub fn certificates(&self) -> Vec<Vec<u8>> {
        self.id.certificates(&self.payload)
    }

    /// On-disk length of the entry including its own length prefix.
    pub fn prefixed_len(&self) -> u64 {
        ENTRY_OVERHEAD + self.payload.len() as u64
    }

    fn write<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_u64(w, 4 + self.payload.len() as u64)?;
        write_u32(w, self.id.raw())?;
        w.write_all(&self.payload)
    }
}

/// The complete signing block.
///
/// Mutations go through [`set_entry`](Self::set_entry) and
/// [`remove_entry`](Self::remove_entry); [`refresh`](Self::refresh) then
/// restores the structural invariants (fixed entry order, padding to the
/// 4096-byte alignment) before the block is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SigningBlock {
    entries: Vec<SignatureInfo>,
}

impl SigningBlock {
    /// An empty block.
    pub fn new() -> Self {
        SigningBlock::default()
    }

    /// The entries in their current order.
    pub fn entries(&self) -> &[SignatureInfo] {
        &self.entries
    }

    /// The entry for a scheme, if present.
    pub fn entry(&self, id: SignatureId) -> Option<&SignatureInfo> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Inserts an entry, replacing any existing entry of the same scheme.
    pub fn set_entry(&mut self, entry: SignatureInfo) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Removes and returns the entry for a scheme.
    pub fn remove_entry(&mut self, id: SignatureId) -> Option<SignatureInfo> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index))
    }

    /// The value of both size fields: every entry's fully-prefixed length
    /// plus the 16-byte magic.
    pub fn size(&self) -> u64 {
        self.entries
            .iter()
            .map(SignatureInfo::prefixed_len)
            .sum::<u64>()
            + 16
    }

    /// Total on-disk length of the block, prefix and footer included.
    pub fn total_len(&self) -> u64 {
        // 8-byte head prefix + entries + 24-byte footer.
        self.size() + 16
    }

    /// Restores the structural invariants after mutations.
    ///
    /// Entries are sorted into the fixed scheme order and the padding entry
    /// is resized (or created, or dropped) so the total block length is a
    /// multiple of 4096. Serialization does not call this implicitly;
    /// callers mutate, refresh once, then encode.
    pub fn refresh(&mut self) {
        self.entries.retain(|entry| entry.id != SignatureId::Padding);
        self.entries.sort_by_key(|entry| entry.id.order_key());

        let unpadded = self.total_len();
        let mut pad = (PADDING_ALIGNMENT - unpadded % PADDING_ALIGNMENT) % PADDING_ALIGNMENT;
        if pad > 0 && pad < ENTRY_OVERHEAD {
            pad += PADDING_ALIGNMENT;
        }
        if pad > 0 {
            let payload = vec![0u8; (pad - ENTRY_OVERHEAD) as usize];
            let padding = SignatureInfo::new(SignatureId::Padding, payload);
            let at = self
                .entries
                .iter()
                .position(|entry| entry.id.order_key() > SignatureId::Padding.order_key())
                .unwrap_or(self.entries.len());
            self.entries.insert(at, padding);
        }
        debug!(
            "refreshed signing block: {} entries, size={}, total={}",
            self.entries.len(),
            self.size(),
            self.total_len(),
        );
    }

    /// Serializes the block in its current state.
    pub fn encode(&self) -> Vec<u8> {
        let size = self.size();
        let mut out = Vec::with_capacity(self.total_len() as usize);
        write_u64(&mut out, size).expect("vec write");
        for entry in &self.entries {
            entry.write(&mut out).expect("vec write");
        }
        write_u64(&mut out, size).expect("vec write");
        out.extend_from_slice(&SIGNING_BLOCK_MAGIC);
        out
    }

    /// Reads the block ending exactly at the central directory start.
    ///
    /// Returns `Ok(None)` when no footer magic precedes the directory (the
    /// archive simply is not signed). A footer whose sizes disagree with the
    /// head prefix, or whose entries overrun their span, is an error. On
    /// success also returns the block's start offset.
    pub fn read_preceding<R: Read + Seek>(
        r: &mut R,
        directory_offset: u64,
    ) -> Result<Option<(SigningBlock, u64)>> {
        const RECORD: &str = "signing block footer";
        if directory_offset < FOOTER_LEN + 8 {
            return Ok(None);
        }
        r.seek(SeekFrom::Start(directory_offset - FOOTER_LEN))?;
        let footer_size = read_u64(r).map_err(|e| Error::truncated(RECORD, e))?;
        let mut magic = [0u8; 16];
        r.read_exact(&mut magic)
            .map_err(|e| Error::truncated(RECORD, e))?;
        if magic != SIGNING_BLOCK_MAGIC {
            return Ok(None);
        }

        let total = footer_size
            .checked_add(16)
            .filter(|total| *total <= directory_offset && footer_size >= 16)
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "signing block size {footer_size:#x} does not fit before the \
                     central directory at {directory_offset:#x}"
                ))
            })?;
        let block_start = directory_offset - total;

        r.seek(SeekFrom::Start(block_start))?;
        let head_size = read_u64(r).map_err(|e| Error::truncated("signing block", e))?;
        if head_size != footer_size {
            return Err(Error::InvalidContainerSize {
                container: "signing block",
                declared: head_size,
                measured: footer_size,
            });
        }

        let span = (footer_size - 16) as usize;
        let mut entry_bytes = vec![0u8; span];
        r.read_exact(&mut entry_bytes)
            .map_err(|e| Error::truncated("signing block entries", e))?;
        let entries = parse_entries(&entry_bytes)?;

        debug!(
            "read signing block at {block_start:#x}: {} entries, total={total}",
            entries.len(),
        );
        Ok(Some((SigningBlock { entries }, block_start)))
    }
}

fn parse_entries(mut bytes: &[u8]) -> Result<Vec<SignatureInfo>> {
    let mut entries = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < 8 {
            return Err(Error::Truncated {
                record: "signature entry",
            });
        }
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&bytes[..8]);
        let declared = u64::from_le_bytes(prefix);
        let cursor = &bytes[8..];
        let remaining = cursor.len() as u64;
        if declared < 4 || declared > remaining {
            return Err(Error::InvalidContainerSize {
                container: "signature entry",
                declared,
                measured: remaining,
            });
        }
        let raw_id = u32::from_le_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]);
        let payload = cursor[4..declared as usize].to_vec();
        entries.push(SignatureInfo::new(SignatureId::from_raw(raw_id), payload));
        bytes = &cursor[declared as usize..];
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_block() -> SigningBlock {
        let mut block = SigningBlock::new();
        block.set_entry(SignatureInfo::new(SignatureId::V3, vec![3u8; 600]));
        block.set_entry(SignatureInfo::new(SignatureId::V2, vec![2u8; 400]));
        block.refresh();
        block
    }

    #[test]
    fn test_refresh_orders_and_pads() {
        let block = sample_block();
        let ids: Vec<SignatureId> = block.entries().iter().map(SignatureInfo::id).collect();
        assert_eq!(
            ids,
            vec![SignatureId::V2, SignatureId::V3, SignatureId::Padding]
        );
        assert_eq!(block.total_len() % PADDING_ALIGNMENT, 0);
        let children: u64 = block.entries().iter().map(SignatureInfo::prefixed_len).sum();
        assert_eq!(block.size(), children + 16);
    }

    #[test]
    fn test_refresh_after_removal() {
        let mut block = sample_block();
        block.remove_entry(SignatureId::V3).unwrap();
        block.refresh();
        assert!(block.entry(SignatureId::V3).is_none());
        assert_eq!(block.total_len() % PADDING_ALIGNMENT, 0);
    }

    #[test]
    fn test_set_entry_replaces() {
        let mut block = sample_block();
        block.set_entry(SignatureInfo::new(SignatureId::V2, vec![9u8; 100]));
        assert_eq!(block.entry(SignatureId::V2).unwrap().payload(), &[9u8; 100]);
        assert_eq!(
            block
                .entries()
                .iter()
                .filter(|e| e.id() == SignatureId::V2)
                .count(),
            1
        );
    }

    #[test]
    fn test_encode_read_roundtrip() {
        let block = sample_block();
        let encoded = block.encode();
        assert_eq!(encoded.len() as u64, block.total_len());

        // Pretend the central directory starts right after the block.
        let mut file = vec![0u8; 100];
        file.extend_from_slice(&encoded);
        let directory_offset = file.len() as u64;

        let mut cursor = Cursor::new(&file);
        let (read_back, start) = SigningBlock::read_preceding(&mut cursor, directory_offset)
            .unwrap()
            .unwrap();
        assert_eq!(start, 100);
        assert_eq!(read_back, block);
    }

    #[test]
    fn test_absent_block_is_none() {
        let file = vec![0u8; 200];
        let mut cursor = Cursor::new(&file);
        assert!(
            SigningBlock::read_preceding(&mut cursor, 200)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_head_footer_disagreement() {
        let block = sample_block();
        let mut encoded = block.encode();
        // Corrupt the head prefix.
        encoded[0] ^= 0x01;

        let directory_offset = encoded.len() as u64;
        let mut cursor = Cursor::new(&encoded);
        let err = SigningBlock::read_preceding(&mut cursor, directory_offset).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidContainerSize {
                container: "signing block",
                ..
            }
        ));
    }

    #[test]
    fn test_entry_overrunning_span() {
        let block = sample_block();
        let mut encoded = block.encode();
        // Inflate the first entry's declared length.
        encoded[8] = 0xff;
        encoded[9] = 0xff;

        let directory_offset = encoded.len() as u64;
        let mut cursor = Cursor::new(&encoded);
        let err = SigningBlock::read_preceding(&mut cursor, directory_offset).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidContainerSize {
                container: "signature entry",
                ..
            }
        ));
    }

    #[test]
    fn test_oversized_footer_rejected() {
        let block = sample_block();
        let encoded = block.encode();
        // Keep only the tail: the footer is intact but its declared size
        // now reaches past the start of the file.
        let tail = encoded[encoded.len() - 100..].to_vec();
        let mut cursor = Cursor::new(&tail);
        let err = SigningBlock::read_preceding(&mut cursor, 100).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_certificates_surface_through_entry() {
        let mut payload = Vec::new();
        let der = b"certificate bytes";
        let mut certs = Vec::new();
        certs.extend_from_slice(&(der.len() as u32).to_le_bytes());
        certs.extend_from_slice(der);
        let mut signed_data = Vec::new();
        signed_data.extend_from_slice(&4u32.to_le_bytes());
        signed_data.extend_from_slice(b"dgst");
        signed_data.extend_from_slice(&(certs.len() as u32).to_le_bytes());
        signed_data.extend_from_slice(&certs);
        let mut signer = Vec::new();
        signer.extend_from_slice(&(signed_data.len() as u32).to_le_bytes());
        signer.extend_from_slice(&signed_data);
        let mut signers = Vec::new();
        signers.extend_from_slice(&(signer.len() as u32).to_le_bytes());
        signers.extend_from_slice(&signer);
        payload.extend_from_slice(&(signers.len() as u32).to_le_bytes());
        payload.extend_from_slice(&signers);

        let entry = SignatureInfo::new(SignatureId::V2, payload);
        assert_eq!(entry.certificates(), vec![der.to_vec()]);
    }
}
