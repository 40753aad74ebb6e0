use core::fmt::{Debug, Display, Formatter, Result};
use embedded_hal::spi::ErrorKind;
use ufmt::{uDebug, uWrite};

/// What went wrong on the bus when a transaction failed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BusFaultKind {
    Overrun,
    ModeFault,
    FrameFormat,
    ChipSelectFault,
    Other,
}

impl BusFaultKind {
    fn as_str(&self) -> &'static str {
        match self {
            BusFaultKind::Overrun => "overrun",
            BusFaultKind::ModeFault => "mode fault",
            BusFaultKind::FrameFormat => "frame format",
            BusFaultKind::ChipSelectFault => "chip select fault",
            BusFaultKind::Other => "other",
        }
    }
}

impl From<ErrorKind> for BusFaultKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Overrun => BusFaultKind::Overrun,
            ErrorKind::ModeFault => BusFaultKind::ModeFault,
            ErrorKind::FrameFormat => BusFaultKind::FrameFormat,
            ErrorKind::ChipSelectFault => BusFaultKind::ChipSelectFault,
            _ => BusFaultKind::Other,
        }
    }
}

impl Debug for BusFaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RFIDError {
    /// The chip never became ready within the bounded wait.
    BusTimeout,
    /// The SPI bus or the chip-select pin failed.
    BusFault(BusFaultKind),
    /// A chip command did not complete within the configured timeout.
    CommandTimeout,
    /// Register reads are not self-consistent; wiring or power problem.
    ChipNotResponding,
    /// Malformed, truncated or CRC-corrupted answer from a card.
    ProtocolError,
    /// No card answered the request.
    NoCardPresent,
    /// Data does not fit into the 64-byte FIFO.
    NoRoom,
}

impl RFIDError {
    /// Protocol-level non-detections: retried on the next poll tick and never
    /// reported to listeners.
    pub fn is_transient(&self) -> bool {
        matches!(self, RFIDError::ProtocolError | RFIDError::NoCardPresent)
    }

    fn as_str(&self) -> &'static str {
        match self {
            RFIDError::BusTimeout => "BusTimeout",
            RFIDError::BusFault(_) => "BusFault",
            RFIDError::CommandTimeout => "CommandTimeout",
            RFIDError::ChipNotResponding => "ChipNotResponding",
            RFIDError::ProtocolError => "ProtocolError",
            RFIDError::NoCardPresent => "NoCardPresent",
            RFIDError::NoRoom => "NoRoom",
        }
    }
}

impl Debug for RFIDError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            RFIDError::BusFault(kind) => write!(f, "BusFault({:?})", kind),
            other => f.write_str(other.as_str()),
        }
    }
}

impl Display for RFIDError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            RFIDError::BusTimeout => f.write_str("chip did not become ready in time"),
            RFIDError::BusFault(kind) => write!(f, "bus fault: {}", kind.as_str()),
            RFIDError::CommandTimeout => f.write_str("chip command timed out"),
            RFIDError::ChipNotResponding => f.write_str("chip is not responding"),
            RFIDError::ProtocolError => f.write_str("malformed answer from card"),
            RFIDError::NoCardPresent => f.write_str("no card present"),
            RFIDError::NoRoom => f.write_str("data does not fit into the FIFO"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RFIDError {}

// Implementing uDebug for RFIDError
impl uDebug for RFIDError {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<W>) -> core::result::Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        match self {
            RFIDError::BusFault(kind) => {
                f.write_str("BusFault(")?;
                f.write_str(kind.as_str())?;
                f.write_str(")")
            }
            other => f.write_str(other.as_str()),
        }
    }
}
