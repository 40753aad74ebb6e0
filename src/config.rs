// src/config.rs

use crate::commands::{PICC_CMD_REQA, PICC_CMD_WUPA};
use core::fmt::{Debug, Display, Formatter, Result};
use ufmt::{uDebug, uWrite};

// ----------------------------------------------------------------------------
// Configurable
// ----------------------------------------------------------------------------
pub const DEFAULT_DELAY_MS: u32 = 100;
pub const DEFAULT_CLOCK_DIVIDER: u16 = 512;
pub const DEFAULT_COMMAND_TIMEOUT_US: u32 = 25_000;

// ----------------------------------------------------------------------------
// Should probably not be changed:
// ----------------------------------------------------------------------------
/// Core clock the BCM2835 SPI divider applies to.
pub const BCM2835_CORE_CLOCK_HZ: u32 = 250_000_000;
/// Interval between two reads of an interrupt register while waiting.
pub const POLL_STEP_US: u32 = 50;
/// Attempts at reading a consistent version before the chip counts as gone.
pub const CHIP_CHECK_ATTEMPTS: u32 = 3;

// Chip timer: f_timer = 13.56 MHz / (2 * TPreScaler + 1) = 40 kHz (25 us per
// tick), started automatically at the end of every transmission.
pub const TIMER_MODE: u8 = 0x80;
pub const TIMER_PRESCALER: u8 = 0xA9;
/// 1000 ticks of 25 us: a card that stays silent for 25 ms is not there.
pub const TIMER_RELOAD: u16 = 0x03E8;
/// Force 100% ASK modulation.
pub const TX_ASK_100: u8 = 0x40;
/// TxWaitRF, MFIN active high, CRC preset 0x6363 (ISO 14443-3 6.2.4).
pub const MODE_CRC_6363: u8 = 0x3D;

/// Which ISO 14443-A request a poll starts with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// REQA: only cards in IDLE answer.
    Request,
    /// WUPA: cards in IDLE and HALT answer.
    WakeUp,
}

impl RequestKind {
    pub fn picc_command(self) -> u8 {
        match self {
            RequestKind::Request => PICC_CMD_REQA,
            RequestKind::WakeUp => PICC_CMD_WUPA,
        }
    }
}

/// Receiver gain, RFCfgReg bits 6..4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AntennaGain {
    Db18,
    Db23,
    Db33,
    Db38,
    Db43,
    Db48,
}

impl AntennaGain {
    pub fn register_value(self) -> u8 {
        let bits = match self {
            AntennaGain::Db18 => 0b000,
            AntennaGain::Db23 => 0b001,
            AntennaGain::Db33 => 0b100,
            AntennaGain::Db38 => 0b101,
            AntennaGain::Db43 => 0b110,
            AntennaGain::Db48 => 0b111,
        };
        bits << 4
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Time between two poll ticks.
    pub delay_ms: u32,
    /// SPI clock divisor on the host bus.
    pub clock_divider: u16,
    /// Write diagnostics to the driver's output sink.
    pub debug: bool,
    /// Upper bound for a single chip command.
    pub command_timeout_us: u32,
    pub request: RequestKind,
    pub antenna_gain: AntennaGain,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            delay_ms: DEFAULT_DELAY_MS,
            clock_divider: DEFAULT_CLOCK_DIVIDER,
            debug: false,
            command_timeout_us: DEFAULT_COMMAND_TIMEOUT_US,
            request: RequestKind::Request,
            antenna_gain: AntennaGain::Db33,
        }
    }
}

impl Config {
    pub fn with_delay_ms(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_clock_divider(mut self, clock_divider: u16) -> Self {
        self.clock_divider = clock_divider;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_command_timeout_us(mut self, command_timeout_us: u32) -> Self {
        self.command_timeout_us = command_timeout_us;
        self
    }

    pub fn with_request(mut self, request: RequestKind) -> Self {
        self.request = request;
        self
    }

    pub fn with_antenna_gain(mut self, antenna_gain: AntennaGain) -> Self {
        self.antenna_gain = antenna_gain;
        self
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.delay_ms == 0 {
            return Err(ConfigError::ZeroDelay);
        }
        // BCM2835 divisors are even; odd values are silently rounded down by
        // the hardware.
        if self.clock_divider == 0 || self.clock_divider % 2 != 0 {
            return Err(ConfigError::InvalidClockDivider(self.clock_divider));
        }
        if self.command_timeout_us < POLL_STEP_US {
            return Err(ConfigError::TimeoutTooShort(self.command_timeout_us));
        }
        Ok(())
    }

    /// SPI clock resulting from `clock_divider` applied to `core_hz`.
    pub fn spi_clock_hz(&self, core_hz: u32) -> u32 {
        core_hz / u32::from(self.clock_divider.max(1))
    }

    /// Number of interrupt register polls that fit into the command timeout.
    pub fn poll_budget(&self) -> u32 {
        (self.command_timeout_us / POLL_STEP_US).max(1)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    ZeroDelay,
    InvalidClockDivider(u16),
    TimeoutTooShort(u32),
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ConfigError::ZeroDelay => write!(f, "ZeroDelay"),
            ConfigError::InvalidClockDivider(d) => write!(f, "InvalidClockDivider({})", d),
            ConfigError::TimeoutTooShort(t) => write!(f, "TimeoutTooShort({})", t),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ConfigError::ZeroDelay => write!(f, "poll delay must be at least 1 ms"),
            ConfigError::InvalidClockDivider(d) => {
                write!(f, "clock divider {} is not a non-zero even number", d)
            }
            ConfigError::TimeoutTooShort(t) => {
                write!(f, "command timeout of {} us is shorter than one poll step", t)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

impl uDebug for ConfigError {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<W>) -> core::result::Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        match self {
            ConfigError::ZeroDelay => f.write_str("ZeroDelay"),
            ConfigError::InvalidClockDivider(d) => ufmt::uwrite!(f, "InvalidClockDivider({})", d),
            ConfigError::TimeoutTooShort(t) => ufmt::uwrite!(f, "TimeoutTooShort({})", t),
        }
    }
}
