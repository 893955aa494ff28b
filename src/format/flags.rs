//! The general-purpose flag bitset carried by local and central headers.
//!
//! Bits 1 and 2 are not independent booleans: together they encode a deflate
//! sub-level when the compression method is deflate, and they alias with the
//! dictionary-size and tree-count bits of the legacy imploding method. The
//! decoder therefore masks and interprets those two bits as a unit before
//! any single-bit flag is tested; everything else is an independent boolean.

use std::fmt;

/// Deflate sub-level encoded in bits 1-2 of the general-purpose flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeflateLevel {
    /// Normal compression (`-en`).
    #[default]
    Normal,
    /// Maximum compression (`-exx`/`-ex`).
    Maximum,
    /// Fast compression (`-ef`).
    Fast,
    /// Super-fast compression (`-es`).
    SuperFast,
}

impl DeflateLevel {
    /// The two-bit mask covering the sub-level in the flag word.
    pub const MASK: u16 = 0b110;

    /// Decodes the sub-level from a full flag word.
    pub fn from_flags(flags: u16) -> Self {
        match flags & Self::MASK {
            0b000 => DeflateLevel::Normal,
            0b010 => DeflateLevel::Maximum,
            0b100 => DeflateLevel::Fast,
            _ => DeflateLevel::SuperFast,
        }
    }

    /// The two-bit pattern for this sub-level, already in position.
    pub fn bits(self) -> u16 {
        match self {
            DeflateLevel::Normal => 0b000,
            DeflateLevel::Maximum => 0b010,
            DeflateLevel::Fast => 0b100,
            DeflateLevel::SuperFast => 0b110,
        }
    }
}

/// The 16-bit general-purpose flag word.
///
/// Construct one from a raw header value with [`GeneralPurposeFlags::from_raw`]
/// or start from [`GeneralPurposeFlags::default`] and set individual flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneralPurposeFlags(u16);

impl GeneralPurposeFlags {
    /// Bit 0: entry data is encrypted.
    pub const ENCRYPTED: u16 = 1 << 0;
    /// Bit 3: sizes and CRC live in a trailing data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 1 << 3;
    /// Bit 6: strong encryption.
    pub const STRONG_ENCRYPTION: u16 = 1 << 6;
    /// Bit 11: file name and comment are UTF-8.
    pub const UTF8_NAMES: u16 = 1 << 11;
    /// Bit 13: selected central-directory fields are masked (encrypted CD).
    pub const CENTRAL_DIRECTORY_ENCRYPTED: u16 = 1 << 13;

    /// Wraps a raw flag word read from a header.
    pub fn from_raw(raw: u16) -> Self {
        GeneralPurposeFlags(raw)
    }

    /// The raw 16-bit word as stored on disk.
    pub fn raw(self) -> u16 {
        self.0
    }

    /// The deflate sub-level unit (bits 1-2).
    ///
    /// Only meaningful when the compression method is deflate; for the
    /// imploding method the same two bits mean dictionary size and tree
    /// count, which is why they must never be tested one bit at a time.
    pub fn deflate_level(self) -> DeflateLevel {
        DeflateLevel::from_flags(self.0)
    }

    /// Replaces the deflate sub-level unit, leaving the other bits alone.
    pub fn set_deflate_level(&mut self, level: DeflateLevel) {
        self.0 = (self.0 & !DeflateLevel::MASK) | level.bits();
    }

    /// Whether a single-bit flag is set.
    pub fn contains(self, flag: u16) -> bool {
        (self.0 & flag) == flag
    }

    /// Sets a single-bit flag.
    pub fn insert(&mut self, flag: u16) {
        self.0 |= flag;
    }

    /// Clears a single-bit flag.
    pub fn remove(&mut self, flag: u16) {
        self.0 &= !flag;
    }

    /// Whether the entry promises a trailing data descriptor.
    pub fn has_data_descriptor(self) -> bool {
        self.contains(Self::DATA_DESCRIPTOR)
    }

    /// Whether the file name bytes are declared UTF-8.
    pub fn utf8_names(self) -> bool {
        self.contains(Self::UTF8_NAMES)
    }

    /// Whether the entry data is encrypted (either scheme).
    pub fn encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED) || self.contains(Self::STRONG_ENCRYPTION)
    }
}

impl fmt::Display for GeneralPurposeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x} ({:?})", self.0, self.deflate_level())?;
        if self.has_data_descriptor() {
            write!(f, " +descriptor")?;
        }
        if self.utf8_names() {
            write!(f, " +utf8")?;
        }
        if self.encrypted() {
            write!(f, " +encrypted")?;
        }
        Ok(())
    }
}
