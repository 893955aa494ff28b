//! Internal and external attribute words of the central directory entry.
//!
//! The engine stores these as the plain integers they are on disk; what a
//! mode of `0o755` means for extraction is the caller's business. The helpers
//! here only pack and unpack the conventional layout: MS-DOS bits in the low
//! byte of the external word, a POSIX mode in its high 16 bits, and the text
//! flag in bit 0 of the internal word.

/// MS-DOS read-only attribute bit.
pub const MSDOS_READ_ONLY: u32 = 0x01;
/// MS-DOS hidden attribute bit.
pub const MSDOS_HIDDEN: u32 = 0x02;
/// MS-DOS system attribute bit.
pub const MSDOS_SYSTEM: u32 = 0x04;
/// MS-DOS directory attribute bit.
pub const MSDOS_DIRECTORY: u32 = 0x10;
/// MS-DOS archive attribute bit.
pub const MSDOS_ARCHIVE: u32 = 0x20;

/// Internal-attribute bit declaring the entry an apparent text file.
pub const INTERNAL_TEXT_FILE: u16 = 0x01;

/// The 32-bit external file attributes word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExternalAttributes(u32);

impl ExternalAttributes {
    /// Wraps a raw attribute word read from a central entry.
    pub fn from_raw(raw: u32) -> Self {
        ExternalAttributes(raw)
    }

    /// The raw 32-bit word as stored on disk.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The POSIX mode from the high 16 bits, e.g. `0o100644`.
    pub fn unix_mode(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Replaces the POSIX mode, leaving the MS-DOS byte alone.
    pub fn set_unix_mode(&mut self, mode: u16) {
        self.0 = (self.0 & 0x0000_ffff) | (u32::from(mode) << 16);
    }

    /// Whether an MS-DOS attribute bit is set.
    pub fn has_msdos(self, bit: u32) -> bool {
        (self.0 & bit) == bit
    }

    /// Sets an MS-DOS attribute bit.
    pub fn set_msdos(&mut self, bit: u32) {
        self.0 |= bit;
    }

    /// Whether the MS-DOS directory bit is set.
    pub fn is_directory(self) -> bool {
        self.has_msdos(MSDOS_DIRECTORY)
    }
}
