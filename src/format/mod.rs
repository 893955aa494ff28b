//! ZIP/APK container format constants, records, and low-level codecs.
//!
//! This module contains the magic numbers and fixed record sizes defined by
//! the ZIP application note plus the Android signing-block extension, and the
//! record types that encode/decode them.

pub mod central_entry;
pub mod cursor;
pub mod data_descriptor;
pub mod end_record;
pub mod extra;
pub mod flags;
pub mod local_header;
pub mod locator;
pub mod timestamp;

/// Local file header signature (`PK\x03\x04`).
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;

/// Central directory file header signature (`PK\x01\x02`).
pub const CENTRAL_ENTRY_SIGNATURE: u32 = 0x02014b50;

/// End-of-central-directory record signature (`PK\x05\x06`).
pub const END_RECORD_SIGNATURE: u32 = 0x06054b50;

/// Zip64 end-of-central-directory record signature (`PK\x06\x06`).
pub const ZIP64_END_RECORD_SIGNATURE: u32 = 0x06064b50;

/// Zip64 end-of-central-directory locator signature (`PK\x06\x07`).
pub const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064b50;

/// Optional data descriptor signature (`PK\x07\x08`).
///
/// The descriptor may also be written without any signature, in which case
/// its first four bytes are the CRC. See
/// [`data_descriptor::DataDescriptor`].
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// Largest value representable in an unsigned 16-bit header field.
///
/// A 16-bit count equal to this value is the sentinel indicating the true
/// value lives in a Zip64 record.
pub const MAX_U16_FIELD: u64 = 0xffff;

/// Largest value representable in an unsigned 32-bit header field.
///
/// A 32-bit size/offset equal to this value is the sentinel indicating the
/// true value lives in a Zip64 record.
pub const MAX_U32_FIELD: u64 = 0xffff_ffff;

/// Version-needed-to-extract value documented for Zip64 archives (4.5).
pub const ZIP64_VERSION_NEEDED: u16 = 45;

/// Fixed size of the end-of-central-directory record without its comment.
pub const END_RECORD_SIZE: usize = 22;

/// Fixed size of the Zip64 end-of-central-directory record without
/// extensible data.
pub const ZIP64_END_RECORD_SIZE: usize = 56;

/// Fixed size of the Zip64 end-of-central-directory locator.
pub const ZIP64_LOCATOR_SIZE: usize = 20;

/// Maximum length of the free-text comment trailing the end record.
pub const MAX_COMMENT_LENGTH: usize = 0xffff;
