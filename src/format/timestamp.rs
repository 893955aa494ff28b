//! MS-DOS date/time codec used by the ZIP header time fields.
//!
//! The date word packs day (5 bits), month (4 bits), and year-since-1980
//! (7 bits); the time word packs second/2 (5 bits), minute (6 bits), and
//! hour (5 bits). Resolution is therefore two seconds and the representable
//! range is 1980 through 2107.

/// A packed MS-DOS date/time pair as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    /// The packed date word.
    pub date: u16,
    /// The packed time word.
    pub time: u16,
}

impl DosDateTime {
    /// Packs calendar components into the DOS representation.
    ///
    /// Out-of-range components are clamped to the representable range
    /// rather than wrapping into neighboring bit fields: seconds round down
    /// to the 2-second grid, years before 1980 pin to 1980, years after
    /// 2107 pin to 2107.
    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let year = year.clamp(1980, 2107) - 1980;
        let month = month.clamp(1, 12) as u16;
        let day = day.clamp(1, 31) as u16;
        let hour = hour.min(23) as u16;
        let minute = minute.min(59) as u16;
        let second = (second.min(59) / 2) as u16;
        DosDateTime {
            date: (year << 9) | (month << 5) | day,
            time: (hour << 11) | (minute << 5) | second,
        }
    }

    /// Calendar year (1980-2107).
    pub fn year(self) -> u16 {
        (self.date >> 9) + 1980
    }

    /// Month of year (1-12 for well-formed stamps).
    pub fn month(self) -> u8 {
        ((self.date >> 5) & 0x0f) as u8
    }

    /// Day of month (1-31 for well-formed stamps).
    pub fn day(self) -> u8 {
        (self.date & 0x1f) as u8
    }

    /// Hour of day (0-23 for well-formed stamps).
    pub fn hour(self) -> u8 {
        (self.time >> 11) as u8
    }

    /// Minute of hour (0-59 for well-formed stamps).
    pub fn minute(self) -> u8 {
        ((self.time >> 5) & 0x3f) as u8
    }

    /// Second of minute, always even due to the 2-second resolution.
    pub fn second(self) -> u8 {
        ((self.time & 0x1f) * 2) as u8
    }
}

impl std::fmt::Display for DosDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}.{:02}.{:02} {:02}:{:02}:{:02}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}
