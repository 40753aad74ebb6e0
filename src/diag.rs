// src/diag.rs

use core::convert::Infallible;
use ufmt::{uDisplay, uWrite};

/// Diagnostic sink that drops everything.
pub struct NoDiagnostics;

impl uWrite for NoDiagnostics {
    type Error = Infallible;

    fn write_str(&mut self, _s: &str) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Diagnostic sink writing to the process' standard output.
#[cfg(feature = "std")]
pub struct StdoutDiagnostics;

#[cfg(feature = "std")]
impl uWrite for StdoutDiagnostics {
    type Error = std::io::Error;

    fn write_str(&mut self, s: &str) -> Result<(), std::io::Error> {
        use std::io::Write;
        std::io::stdout().write_all(s.as_bytes())
    }
}

/// Formats a byte as two uppercase hex digits.
pub struct Hex(pub u8);

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

impl uDisplay for Hex {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        let pair = [
            DIGITS[(self.0 >> 4) as usize],
            DIGITS[(self.0 & 0xF) as usize],
        ];
        f.write_str(core::str::from_utf8(&pair).unwrap_or("??"))
    }
}

/// Writes one diagnostic line when the driver runs with `debug` set.
macro_rules! diag {
    ($reader:expr, $($arg:tt)+) => {
        if $reader.config.debug {
            ufmt::uwriteln!(&mut $reader.diag, $($arg)+).ok();
        }
    };
}
