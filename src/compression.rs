//! Compression method codes and the pluggable transform seam.
//!
//! The format engine never compresses anything itself. Entry payloads pass
//! through a [`CompressionTransform`], and the engine only records which
//! method number produced the bytes. The deflate transform lives behind the
//! `deflate` feature; everything else in the crate works without it.

use std::io::{self, Read};

/// A compression method number as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Method 0, data stored without compression.
    Stored,
    /// Method 1, legacy shrinking.
    Shrunk,
    /// Methods 2-5, legacy reduction with factor 1-4.
    Reduced(u8),
    /// Method 6, legacy imploding.
    Imploded,
    /// Method 8, deflate.
    Deflated,
    /// Method 9, deflate64.
    Deflate64,
    /// Method 12, bzip2.
    Bzip2,
    /// Method 14, LZMA.
    Lzma,
    /// Method 93, zstd.
    Zstd,
    /// Method 98, PPMd.
    Ppmd,
    /// Any method number this crate does not name.
    Other(u16),
}

impl CompressionMethod {
    /// Decodes a raw method number.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => CompressionMethod::Stored,
            1 => CompressionMethod::Shrunk,
            2..=5 => CompressionMethod::Reduced((raw - 1) as u8),
            6 => CompressionMethod::Imploded,
            8 => CompressionMethod::Deflated,
            9 => CompressionMethod::Deflate64,
            12 => CompressionMethod::Bzip2,
            14 => CompressionMethod::Lzma,
            93 => CompressionMethod::Zstd,
            98 => CompressionMethod::Ppmd,
            other => CompressionMethod::Other(other),
        }
    }

    /// The raw method number as stored on disk.
    pub fn raw(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Shrunk => 1,
            CompressionMethod::Reduced(factor) => 1 + u16::from(factor),
            CompressionMethod::Imploded => 6,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Deflate64 => 9,
            CompressionMethod::Bzip2 => 12,
            CompressionMethod::Lzma => 14,
            CompressionMethod::Zstd => 93,
            CompressionMethod::Ppmd => 98,
            CompressionMethod::Other(raw) => raw,
        }
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        CompressionMethod::Stored
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMethod::Stored => write!(f, "stored"),
            CompressionMethod::Deflated => write!(f, "deflated"),
            CompressionMethod::Other(raw) => write!(f, "method {raw}"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

/// Opaque payload transform applied between entry data and stored bytes.
///
/// The convenience paths of [`Writer`](crate::Writer) and
/// [`Archive`](crate::Archive) drive this trait; callers with pre-transformed
/// payloads bypass it entirely via the raw entry APIs.
pub trait CompressionTransform {
    /// The method number the transform produces.
    fn method(&self) -> CompressionMethod;

    /// Transforms entry data into its stored form.
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Transforms stored bytes back into entry data.
    ///
    /// `uncompressed_size` is the size declared in the header, passed so the
    /// output buffer can be sized up front and over-long streams cut off.
    fn decompress(&self, data: &[u8], uncompressed_size: u64) -> io::Result<Vec<u8>>;
}

/// The identity transform for method 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredTransform;

impl CompressionTransform for StoredTransform {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Stored
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _uncompressed_size: u64) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Raw-deflate transform for method 8.
#[cfg(feature = "deflate")]
#[derive(Debug, Clone, Copy)]
pub struct DeflateTransform {
    level: flate2::Compression,
}

#[cfg(feature = "deflate")]
impl DeflateTransform {
    /// A transform at the given flate2 compression level.
    pub fn new(level: flate2::Compression) -> Self {
        DeflateTransform { level }
    }
}

#[cfg(feature = "deflate")]
impl Default for DeflateTransform {
    fn default() -> Self {
        DeflateTransform {
            level: flate2::Compression::default(),
        }
    }
}

#[cfg(feature = "deflate")]
impl CompressionTransform for DeflateTransform {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflated
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = flate2::read::DeflateEncoder::new(data, self.level);
        let mut out = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8], uncompressed_size: u64) -> io::Result<Vec<u8>> {
        let mut decoder = flate2::read::DeflateDecoder::new(data);
        let mut out = Vec::with_capacity(usize::try_from(uncompressed_size).unwrap_or(0));
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Picks the built-in transform for a method, if the crate carries one.
pub fn transform_for(method: CompressionMethod) -> Option<Box<dyn CompressionTransform>> {
    match method {
        CompressionMethod::Stored => Some(Box::new(StoredTransform)),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflated => Some(Box::new(DeflateTransform::default())),
        _ => None,
    }
}
