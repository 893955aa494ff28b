//! Typed extra-field list carried by local and central headers.
//!
//! The extra-field bytes are a sequence of `id:u16, size:u16, data` records.
//! Instead of patching raw bytes in place, headers keep an explicit ordered
//! list of typed sub-records and regenerate the on-disk bytes in one encode
//! pass at build time. The Zip64 sub-record is one element of that list and
//! the only one this crate interprets.

use std::io::{Cursor, Write};

use crate::error::{Error, Result};
use crate::format::cursor::{read_u32, read_u64, write_u16, write_u32, write_u64};

/// Extra-field id reserved for the Zip64 sub-record.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Which of the owning header's narrow fields hold their sentinel value.
///
/// The Zip64 sub-record carries no field tags: it is the sentinels in the
/// header that say which wide fields are present and in what order. A record
/// is meaningless without them, so readers derive this from the raw header
/// fields before parsing the extra bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zip64Sentinels {
    /// The 32-bit uncompressed size is 0xFFFFFFFF.
    pub uncompressed_size: bool,
    /// The 32-bit compressed size is 0xFFFFFFFF.
    pub compressed_size: bool,
    /// The 32-bit local-header offset is 0xFFFFFFFF.
    pub local_header_offset: bool,
    /// The 16-bit disk-number-start is 0xFFFF.
    pub disk_number_start: bool,
}

/// The Zip64 extended-information sub-record.
///
/// Each field is present on disk only when the matching 32-bit (or 16-bit)
/// header field holds its sentinel value; readers therefore see any prefix
/// of the four fields. Fields the record does not carry read as `None` and
/// the header's own value stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zip64ExtraField {
    /// True uncompressed size when the 32-bit field is 0xFFFFFFFF.
    pub uncompressed_size: Option<u64>,
    /// True compressed size when the 32-bit field is 0xFFFFFFFF.
    pub compressed_size: Option<u64>,
    /// True local-header offset when the 32-bit field is 0xFFFFFFFF.
    pub local_header_offset: Option<u64>,
    /// True disk-number-start when the 16-bit field is 0xFFFF.
    pub disk_number_start: Option<u32>,
}

impl Zip64ExtraField {
    /// A sub-record carrying only the two sizes, as synthesized for a local
    /// file header whose sizes overflow 32 bits.
    pub fn sizes(uncompressed_size: u64, compressed_size: u64) -> Self {
        Zip64ExtraField {
            uncompressed_size: Some(uncompressed_size),
            compressed_size: Some(compressed_size),
            ..Default::default()
        }
    }

    /// Number of data bytes this record occupies on disk.
    pub fn data_len(&self) -> usize {
        self.uncompressed_size.map_or(0, |_| 8)
            + self.compressed_size.map_or(0, |_| 8)
            + self.local_header_offset.map_or(0, |_| 8)
            + self.disk_number_start.map_or(0, |_| 4)
    }

    /// Decodes the sub-record from its data bytes.
    ///
    /// The header's sentinels select which of the four fields the record
    /// carries: a record holding a single u64 is the offset when only the
    /// offset field is 0xFFFFFFFF, not the uncompressed size. A record
    /// shorter than its sentinels promise leaves the later fields absent.
    pub fn parse(data: &[u8], sentinels: Zip64Sentinels) -> Self {
        let mut r = Cursor::new(data);
        let mut field = Zip64ExtraField::default();
        let mut remaining = data.len();
        if sentinels.uncompressed_size && remaining >= 8 {
            field.uncompressed_size = read_u64(&mut r).ok();
            remaining -= 8;
        }
        if sentinels.compressed_size && remaining >= 8 {
            field.compressed_size = read_u64(&mut r).ok();
            remaining -= 8;
        }
        if sentinels.local_header_offset && remaining >= 8 {
            field.local_header_offset = read_u64(&mut r).ok();
            remaining -= 8;
        }
        if sentinels.disk_number_start && remaining >= 4 {
            field.disk_number_start = read_u32(&mut r).ok();
        }
        field
    }

    /// Encodes the full `id, size, data` record.
    pub fn encode<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_u16(w, ZIP64_EXTRA_ID)?;
        write_u16(w, self.data_len() as u16)?;
        if let Some(value) = self.uncompressed_size {
            write_u64(w, value)?;
        }
        if let Some(value) = self.compressed_size {
            write_u64(w, value)?;
        }
        if let Some(value) = self.local_header_offset {
            write_u64(w, value)?;
        }
        if let Some(value) = self.disk_number_start {
            write_u32(w, value)?;
        }
        Ok(())
    }
}

/// One element of the extra-field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// The Zip64 extended-information record.
    Zip64(Zip64ExtraField),
    /// Any other sub-record, kept opaque.
    Other {
        /// The sub-record id.
        id: u16,
        /// The sub-record data bytes, without the id/size prefix.
        data: Vec<u8>,
    },
    /// Trailing bytes too short to form another `id, size, data` record.
    ///
    /// Real-world archives occasionally carry a ragged tail; it is preserved
    /// verbatim so the header round-trips byte-for-byte.
    Unparsed(Vec<u8>),
}

/// The ordered extra-field list of one header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtraFields {
    fields: Vec<ExtraField>,
}

impl ExtraFields {
    /// An empty list.
    pub fn new() -> Self {
        ExtraFields::default()
    }

    /// Parses raw extra-field bytes into the typed list.
    ///
    /// Complete sub-records are split out one by one; a sub-record whose
    /// declared size overruns the remaining bytes, or a tail shorter than
    /// the four prefix bytes, is preserved as [`ExtraField::Unparsed`].
    /// `sentinels` gives the Zip64 sub-record its field layout.
    pub fn parse(bytes: &[u8], sentinels: Zip64Sentinels) -> Self {
        let mut fields = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            if rest.len() < 4 {
                fields.push(ExtraField::Unparsed(rest.to_vec()));
                break;
            }
            let id = u16::from_le_bytes([rest[0], rest[1]]);
            let size = u16::from_le_bytes([rest[2], rest[3]]) as usize;
            if rest.len() < 4 + size {
                fields.push(ExtraField::Unparsed(rest.to_vec()));
                break;
            }
            let data = &rest[4..4 + size];
            if id == ZIP64_EXTRA_ID {
                fields.push(ExtraField::Zip64(Zip64ExtraField::parse(data, sentinels)));
            } else {
                fields.push(ExtraField::Other {
                    id,
                    data: data.to_vec(),
                });
            }
            rest = &rest[4 + size..];
        }
        ExtraFields { fields }
    }

    /// Regenerates the on-disk byte form of the whole list.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for field in &self.fields {
            match field {
                ExtraField::Zip64(zip64) => {
                    // Writing into a Vec cannot fail.
                    zip64.encode(&mut out).expect("vec write");
                }
                ExtraField::Other { id, data } => {
                    write_u16(&mut out, *id).expect("vec write");
                    write_u16(&mut out, data.len() as u16).expect("vec write");
                    out.extend_from_slice(data);
                }
                ExtraField::Unparsed(bytes) => out.extend_from_slice(bytes),
            }
        }
        out
    }

    /// The first Zip64 sub-record in the list, if any.
    pub fn zip64(&self) -> Option<&Zip64ExtraField> {
        self.fields.iter().find_map(|field| match field {
            ExtraField::Zip64(zip64) => Some(zip64),
            _ => None,
        })
    }

    /// Inserts or replaces the Zip64 sub-record.
    pub fn set_zip64(&mut self, zip64: Zip64ExtraField) {
        for field in &mut self.fields {
            if let ExtraField::Zip64(existing) = field {
                *existing = zip64;
                return;
            }
        }
        self.fields.push(ExtraField::Zip64(zip64));
    }

    /// Removes the Zip64 sub-record, if present.
    pub fn remove_zip64(&mut self) {
        self.fields
            .retain(|field| !matches!(field, ExtraField::Zip64(_)));
    }

    /// Appends a generic sub-record.
    ///
    /// The Zip64 id is rejected here; callers must go through
    /// [`set_zip64`](Self::set_zip64) so the record stays typed.
    pub fn push_other(&mut self, id: u16, data: Vec<u8>) -> Result<()> {
        if id == ZIP64_EXTRA_ID {
            return Err(Error::ReservedExtraFieldId { id });
        }
        self.fields.push(ExtraField::Other { id, data });
        Ok(())
    }

    /// The typed sub-records in on-disk order.
    pub fn fields(&self) -> &[ExtraField] {
        &self.fields
    }

    /// Whether the list has no sub-records at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size_sentinels() -> Zip64Sentinels {
        Zip64Sentinels {
            uncompressed_size: true,
            compressed_size: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_zip64_sizes_roundtrip() {
        let field = Zip64ExtraField::sizes(0x1_0000_0000, 0x9876_5432_10);
        let mut bytes = Vec::new();
        field.encode(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 4 + 16);
        assert_eq!(&bytes[0..2], &[0x01, 0x00]);
        assert_eq!(&bytes[2..4], &[16, 0]);

        let parsed = ExtraFields::parse(&bytes, size_sentinels());
        assert_eq!(parsed.zip64(), Some(&field));
    }

    #[test]
    fn test_zip64_full_record() {
        let field = Zip64ExtraField {
            uncompressed_size: Some(1),
            compressed_size: Some(2),
            local_header_offset: Some(3),
            disk_number_start: Some(4),
        };
        let mut bytes = Vec::new();
        field.encode(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 4 + 28);

        let all = Zip64Sentinels {
            uncompressed_size: true,
            compressed_size: true,
            local_header_offset: true,
            disk_number_start: true,
        };
        let parsed = Zip64ExtraField::parse(&bytes[4..], all);
        assert_eq!(parsed, field);
    }

    #[test]
    fn test_partial_zip64_leaves_later_fields_absent() {
        // Sentinels promise both sizes but the record holds only one u64.
        let data = 42u64.to_le_bytes();
        let parsed = Zip64ExtraField::parse(&data, size_sentinels());
        assert_eq!(parsed.uncompressed_size, Some(42));
        assert_eq!(parsed.compressed_size, None);
        assert_eq!(parsed.local_header_offset, None);
        assert_eq!(parsed.disk_number_start, None);
    }

    #[test]
    fn test_offset_only_record_lands_in_offset() {
        // A single u64 with only the offset field sentineled must not be
        // misread as a size.
        let data = 0x1_2345_6789u64.to_le_bytes();
        let sentinels = Zip64Sentinels {
            local_header_offset: true,
            ..Default::default()
        };
        let parsed = Zip64ExtraField::parse(&data, sentinels);
        assert_eq!(parsed.local_header_offset, Some(0x1_2345_6789));
        assert_eq!(parsed.uncompressed_size, None);
        assert_eq!(parsed.compressed_size, None);
    }

    #[test]
    fn test_mixed_list_roundtrip() {
        let mut fields = ExtraFields::new();
        fields.push_other(0x5455, vec![0x03, 1, 2, 3, 4]).unwrap();
        fields.set_zip64(Zip64ExtraField::sizes(10, 20));
        fields.push_other(0x7875, vec![1]).unwrap();

        let bytes = fields.encode();
        let reparsed = ExtraFields::parse(&bytes, size_sentinels());
        assert_eq!(reparsed, fields);
        assert_eq!(reparsed.fields().len(), 3);
    }

    #[test]
    fn test_reserved_id_rejected() {
        let mut fields = ExtraFields::new();
        let err = fields.push_other(ZIP64_EXTRA_ID, vec![0; 8]).unwrap_err();
        assert!(matches!(err, Error::ReservedExtraFieldId { id: 0x0001 }));
    }

    #[test]
    fn test_ragged_tail_preserved() {
        // A complete timestamp record followed by three stray bytes.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0x55, 0x54, 0x01, 0x00, 0x03]);
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe]);

        let fields = ExtraFields::parse(&bytes, Zip64Sentinels::default());
        assert_eq!(fields.fields().len(), 2);
        assert_eq!(
            fields.fields()[1],
            ExtraField::Unparsed(vec![0xde, 0xad, 0xbe])
        );
        assert_eq!(fields.encode(), bytes);
    }

    #[test]
    fn test_overrunning_declared_size_preserved() {
        // Declared size 10 but only 2 data bytes follow.
        let bytes = [0x55, 0x54, 0x0a, 0x00, 0x01, 0x02];
        let fields = ExtraFields::parse(&bytes, Zip64Sentinels::default());
        assert_eq!(fields.fields().len(), 1);
        assert!(matches!(fields.fields()[0], ExtraField::Unparsed(_)));
        assert_eq!(fields.encode(), bytes);
    }

    #[test]
    fn test_set_zip64_replaces_in_place() {
        let mut fields = ExtraFields::new();
        fields.set_zip64(Zip64ExtraField::sizes(1, 1));
        fields.push_other(0x5455, vec![]).unwrap();
        fields.set_zip64(Zip64ExtraField::sizes(2, 2));
        assert_eq!(fields.fields().len(), 2);
        assert_eq!(fields.zip64().unwrap().uncompressed_size, Some(2));
    }
}
