//! Error types for ZIP/APK archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when working with ZIP/APK containers, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`:
//!
//! ```rust,no_run
//! use zapk::{Archive, Result};
//!
//! fn list_entries(path: &str) -> Result<()> {
//!     let mut archive = Archive::open_path(path)?;
//!     for entry in archive.entries() {
//!         println!("{}", entry.file_name_lossy());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Record-level "is this my record" probes are *not* errors: every record
//! type's `read` returns `Ok(None)` when the signature at the cursor does not
//! match, after rewinding the four signature bytes. This is how the optional
//! sections of the ZIP grammar (data descriptor, Zip64 pair) are detected.

use std::io;

/// The main error type for ZIP/APK archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system operations |
/// | Format | [`InvalidFormat`][Self::InvalidFormat], [`EndRecordNotFound`][Self::EndRecordNotFound] | Invalid archive data |
/// | Truncation | [`Truncated`][Self::Truncated] | Fewer bytes than a declared length requires |
/// | Consistency | [`InvalidContainerSize`][Self::InvalidContainerSize] | Size fields disagree with measured content |
/// | Integrity | [`CrcMismatch`][Self::CrcMismatch] | Data corruption |
/// | Validation | [`ReservedExtraFieldId`][Self::ReservedExtraFieldId], [`Zip64Required`][Self::Zip64Required] | Builder misuse |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive structure is invalid or not recognized.
    ///
    /// Returned when a signature that *must* be present is absent, e.g. the
    /// Zip64 end record a locator points at, or a signing block head prefix
    /// disagreeing with its footer.
    #[error("Invalid zip format: {0}")]
    InvalidFormat(String),

    /// Fewer bytes were available than a fixed or declared-length field
    /// requires. Always fatal for the current record, never zero-filled.
    #[error("Truncated {record}")]
    Truncated {
        /// The record (or field) being read when the input ran out.
        record: &'static str,
    },

    /// No end-of-central-directory record was found anywhere in the trailer
    /// window. Fatal for the whole archive.
    #[error("No end-of-central-directory record in the last {searched} bytes")]
    EndRecordNotFound {
        /// Number of trailing bytes that were scanned.
        searched: usize,
    },

    /// A declared container size disagrees with the measured content length.
    ///
    /// Reported distinctly from [`Truncated`][Self::Truncated]: the bytes are
    /// present but self-inconsistent.
    #[error("{container} size mismatch: declared {declared}, measured {measured}")]
    InvalidContainerSize {
        /// The container whose size fields disagree.
        container: &'static str,
        /// The size stored in the container's own size field.
        declared: u64,
        /// The size measured from the actual content.
        measured: u64,
    },

    /// A value needs Zip64 representation but the caller rejected promotion.
    ///
    /// Normal builds promote transparently; this is only returned when
    /// `require_zip32()` was requested on a builder.
    #[error("{field} value {value:#x} requires zip64")]
    Zip64Required {
        /// The field that overflowed its 32-bit (or 16-bit) range.
        field: &'static str,
        /// The offending value.
        value: u64,
    },

    /// CRC-32 of the decompressed entry data does not match the header.
    #[error("CRC mismatch for entry '{name}': expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// Entry file name (lossy UTF-8).
        name: String,
        /// CRC recorded in the header.
        expected: u32,
        /// CRC computed over the data.
        actual: u32,
    },

    /// An attempt to register a generic extra field under the field id
    /// reserved for the Zip64 sub-record.
    #[error("Extra field id {id:#06x} is reserved for the zip64 record")]
    ReservedExtraFieldId {
        /// The reserved id that was passed.
        id: u16,
    },
}

impl Error {
    /// Maps an I/O error from a fixed-width or declared-length read into the
    /// truncation variant, keeping other I/O failures as-is.
    pub(crate) fn truncated(record: &'static str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated { record }
        } else {
            Error::Io(err)
        }
    }
}

/// A convenient `Result` alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
