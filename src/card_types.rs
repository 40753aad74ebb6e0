use core::fmt::{Debug, Formatter, Result};
use ufmt::{uDebug, uWrite};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    MifareMini,
    Mifare1K,
    Mifare4K,
    MifareUltralight,
    MifarePlus,
    /// Compliant with ISO/IEC 14443-4.
    Iso14443_4,
    Unknown,
}

impl CardType {
    /// Card family announced by the final SAK of a selection.
    pub fn from_sak(sak: u8) -> CardType {
        match sak & 0x7F {
            0x09 => CardType::MifareMini,
            0x08 => CardType::Mifare1K,
            0x18 => CardType::Mifare4K,
            0x00 => CardType::MifareUltralight,
            0x10 | 0x11 => CardType::MifarePlus,
            sak if sak & 0x20 != 0 => CardType::Iso14443_4,
            _ => CardType::Unknown,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CardType::MifareMini => "MifareMini",
            CardType::Mifare1K => "Mifare1K",
            CardType::Mifare4K => "Mifare4K",
            CardType::MifareUltralight => "MifareUltralight",
            CardType::MifarePlus => "MifarePlus",
            CardType::Iso14443_4 => "Iso14443_4",
            CardType::Unknown => "Unknown",
        }
    }
}

impl Debug for CardType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.name())
    }
}

impl uDebug for CardType {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> core::result::Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        f.write_str(self.name())
    }
}
