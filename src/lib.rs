//! # zapk
//!
//! A pure-Rust engine for the ZIP/APK container format.
//!
//! This crate encodes and decodes the byte-level structures of ZIP archives
//! as used by Android application packages: local file headers, the central
//! directory, the end-of-central-directory trailer (standard and Zip64),
//! optional data descriptors, and the APK Signing Block that sits between
//! the entry data and the central directory. It enforces the format's size
//! and offset invariants but deliberately stays out of cryptography: the
//! signing block is carried and validated structurally, signatures are
//! never verified, and certificates surface only as raw DER bytes.
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```rust,no_run
//! use zapk::{Archive, Result};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("app.apk")?;
//!
//!     for entry in archive.entries() {
//!         println!("{}: {} bytes", entry.file_name_lossy(), entry.uncompressed_size());
//!     }
//!
//!     if let Some(index) = archive.entry_index(b"AndroidManifest.xml") {
//!         let data = archive.read_entry(index)?;
//!         println!("manifest is {} bytes", data.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Writing an Archive
//!
//! ```rust
//! use zapk::{Result, StoredTransform, Writer};
//!
//! fn main() -> Result<()> {
//!     let mut writer = Writer::new(Vec::new());
//!     writer.add_bytes("hello.txt", b"hello", &StoredTransform)?;
//!     writer.set_comment("written by zapk")?;
//!
//!     let (bytes, totals) = writer.finish()?;
//!     assert_eq!(totals.entries, 1);
//!     assert_eq!(totals.total_len, bytes.len() as u64);
//!     Ok(())
//! }
//! ```
//!
//! Zip64 is transparent in both directions: builders promote any size,
//! offset, or count that outgrows its narrow field, and readers widen
//! through the Zip64 records automatically.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate transform for entry payloads (via `flate2`) |

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod attributes;
pub mod compression;
pub mod error;
pub mod format;
pub mod read;
pub mod signing;
pub mod write;

pub use compression::{CompressionMethod, CompressionTransform, StoredTransform};
#[cfg(feature = "deflate")]
pub use compression::DeflateTransform;
pub use error::{Error, Result};
pub use format::central_entry::{CentralDirectoryEntry, CentralDirectoryEntryBuilder};
pub use format::data_descriptor::{DataDescriptor, DataDescriptorBuilder};
pub use format::end_record::{EndOfCentralDirectory, Trailer, Zip64EndRecord, Zip64Locator};
pub use format::extra::{ExtraField, ExtraFields, Zip64ExtraField, Zip64Sentinels};
pub use format::flags::{DeflateLevel, GeneralPurposeFlags};
pub use format::local_header::{LocalFileHeader, LocalFileHeaderBuilder};
pub use format::timestamp::DosDateTime;
pub use read::{Archive, LocalEntry, LocalEntryIter};
pub use signing::{CertificateDecoder, SignatureId, SignatureInfo, SigningBlock};
pub use write::{ArchiveTotals, Writer};
