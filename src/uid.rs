// src/uid.rs

use crate::errors::RFIDError;
use core::fmt::{Debug, Display, Formatter, Result};
use ufmt::{uDisplay, uWrite};

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Card UID of 4, 7 or 10 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid {
    bytes: [u8; 10],
    len: u8,
}

impl Uid {
    pub fn from_slice(bytes: &[u8]) -> core::result::Result<Self, RFIDError> {
        if !matches!(bytes.len(), 4 | 7 | 10) {
            return Err(RFIDError::ProtocolError);
        }
        let mut uid = Uid {
            bytes: [0; 10],
            len: bytes.len() as u8,
        };
        uid.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(uid)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    fn hex_pairs(&self) -> impl Iterator<Item = [u8; 2]> + '_ {
        self.as_bytes()
            .iter()
            .map(|b| [DIGITS[usize::from(b >> 4)], DIGITS[usize::from(b & 0xF)]])
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for pair in self.hex_pairs() {
            write!(f, "{}{}", pair[0] as char, pair[1] as char)?;
        }
        Ok(())
    }
}

impl Debug for Uid {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "Uid({})", self)
    }
}

impl uDisplay for Uid {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> core::result::Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        for pair in self.hex_pairs() {
            f.write_str(core::str::from_utf8(&pair).unwrap_or("??"))?;
        }
        Ok(())
    }
}
