use crate::config::*;
use crate::diag::{Hex, NoDiagnostics};
use crate::errors::{BusFaultKind, RFIDError};
use crate::registers::*;
use crate::select::SelectState;
use crate::transport::RegisterTransport;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use ufmt::uWrite;

/// MFRC522 driver. Owns the bus: every chip access goes through `&mut self`,
/// so no two operations can interleave.
pub struct RfidRc522<SPI, CS, D, W = NoDiagnostics> {
    pub(crate) transport: RegisterTransport<SPI, CS>,
    pub(crate) delay: D,
    pub(crate) config: Config,
    pub(crate) diag: W,
    pub(crate) select_state: SelectState,
}

impl<SPI, CS, D> RfidRc522<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, cs: CS, delay: D, config: Config) -> Self {
        RfidRc522 {
            transport: RegisterTransport::new(spi, cs),
            delay,
            config,
            diag: NoDiagnostics,
            select_state: SelectState::Idle,
        }
    }
}

impl<SPI, CS, D, W> RfidRc522<SPI, CS, D, W>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    W: uWrite,
{
    /// Sends diagnostics to `diag` (only written when `config.debug` is set).
    pub fn with_diagnostics<W2: uWrite>(self, diag: W2) -> RfidRc522<SPI, CS, D, W2> {
        RfidRc522 {
            transport: self.transport,
            delay: self.delay,
            config: self.config,
            diag,
            select_state: self.select_state,
        }
    }

    /// Pulses the reset pin, then initializes the chip.
    pub fn init_with_reset<RST: OutputPin>(&mut self, reset_pin: &mut RST) -> Result<u8, RFIDError> {
        // Chip select idles high
        self.transport.release_chip_select()?;

        reset_pin
            .set_low()
            .map_err(|_| RFIDError::BusFault(BusFaultKind::Other))?;
        self.delay.delay_ms(50);
        reset_pin
            .set_high()
            .map_err(|_| RFIDError::BusFault(BusFaultKind::Other))?;
        self.delay.delay_ms(50);

        self.init()
    }

    /// Soft resets the chip and configures timer, modulation, CRC preset and
    /// antenna. Returns the chip version.
    pub fn init(&mut self) -> Result<u8, RFIDError> {
        self.soft_reset()?;

        let version = self.verify_chip()?;
        diag!(self, "RFID-RC522 Version: 0x{}", Hex(version));
        diag!(
            self,
            "SPI clock: {} Hz (divider {})",
            self.config.spi_clock_hz(BCM2835_CORE_CLOCK_HZ),
            self.config.clock_divider
        );

        // Reset baud rates and ModWidthReg
        self.transport.write_register(TX_MODE_REG, 0x00)?;
        self.transport.write_register(RX_MODE_REG, 0x00)?;
        self.transport.write_register(MODE_WIDTH_REG, 0x26)?;

        let [reload_high, reload_low] = TIMER_RELOAD.to_be_bytes();
        self.transport.write_register(T_MODE_REG, TIMER_MODE)?;
        self.transport.write_register(T_PRESCALER_REG, TIMER_PRESCALER)?;
        self.transport.write_register(T_RELOAD_REG_H, reload_high)?;
        self.transport.write_register(T_RELOAD_REG_L, reload_low)?;

        self.transport.write_register(TX_ASK_REG, TX_ASK_100)?;
        self.transport.write_register(MODE_REG, MODE_CRC_6363)?;

        // Bits received after a collision are cleared
        self.transport.clear_bits(COLL_REG, VALUES_AFTER_COLL)?;

        self.antenna_on()?;
        self.set_antenna_gain(self.config.antenna_gain)?;
        Ok(version)
    }

    pub fn version(&mut self) -> Result<u8, RFIDError> {
        self.transport.read_register(VERSION_REG)
    }

    pub fn antenna_on(&mut self) -> Result<(), RFIDError> {
        let current = self.transport.read_register(TX_CONTROL_REG)?;
        if (current & TX_RF_EN) != TX_RF_EN {
            self.transport
                .write_register(TX_CONTROL_REG, current | TX_RF_EN)?;
        }
        Ok(())
    }

    pub fn antenna_off(&mut self) -> Result<(), RFIDError> {
        self.transport.clear_bits(TX_CONTROL_REG, TX_RF_EN)
    }

    pub fn set_antenna_gain(&mut self, gain: AntennaGain) -> Result<(), RFIDError> {
        self.transport
            .modify_register(RF_CFG_REG, |value| {
                (value & !RX_GAIN_MASK) | gain.register_value()
            })?;
        self.config.antenna_gain = gain;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn select_state(&self) -> SelectState {
        self.select_state
    }

    /// Raw register access, for diagnostics and tests.
    pub fn transport(&mut self) -> &mut RegisterTransport<SPI, CS> {
        &mut self.transport
    }

    pub fn release(self) -> (SPI, CS, D) {
        let (spi, cs) = self.transport.release();
        (spi, cs, self.delay)
    }
}
