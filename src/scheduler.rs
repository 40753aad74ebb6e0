// src/scheduler.rs

use crate::detection::{DetectionEvent, DetectionState, Detector};
use crate::diag::NoDiagnostics;
use crate::errors::RFIDError;
use crate::rfid_rc522::RfidRc522;
use crate::select::Card;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use ufmt::uWrite;

/// Periodic card polling with edge-triggered reporting. Owns the reader, so
/// it is the only code touching the bus.
pub struct PollingScheduler<SPI, CS, D, W = NoDiagnostics> {
    reader: RfidRc522<SPI, CS, D, W>,
    detector: Detector,
    fault: Option<RFIDError>,
}

impl<SPI, CS, D, W> PollingScheduler<SPI, CS, D, W>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    W: uWrite,
{
    pub fn new(reader: RfidRc522<SPI, CS, D, W>) -> Self {
        PollingScheduler {
            reader,
            detector: Detector::new(),
            fault: None,
        }
    }

    /// Initializes the reader; a failure is recorded as the fault.
    pub fn init(&mut self) -> Result<u8, RFIDError> {
        let result = self.reader.init();
        self.fault = result.err();
        result
    }

    /// One poll: request, select, compare. Returns the event if the state
    /// changed. Transport and chip failures leave the state alone and are
    /// returned as the scheduler's fault.
    pub fn tick(&mut self) -> Result<Option<DetectionEvent>, RFIDError> {
        let next = match self.poll() {
            Ok(card) => DetectionState::CardPresent(card.uid),
            Err(err) if err.is_transient() => DetectionState::NoCard,
            Err(err) => {
                self.fault = Some(err);
                diag!(self.reader, "reader fault: {:?}", err);
                return Err(err);
            }
        };
        self.fault = None;

        let event = self.detector.observe(next);
        if let Some(event) = event {
            match event.current {
                DetectionState::CardPresent(uid) => diag!(self.reader, "card {}", uid),
                DetectionState::NoCard => diag!(self.reader, "card removed"),
            }
        }
        Ok(event)
    }

    fn poll(&mut self) -> Result<Card, RFIDError> {
        let kind = self.reader.config.request;
        match self.reader.request(kind) {
            // A card selected by the previous tick is still ACTIVE; the first
            // request only drops it back to IDLE.
            Err(RFIDError::NoCardPresent) => {
                diag!(self.reader, "no answer, requesting again");
                self.reader.request(kind)?;
            }
            other => {
                other?;
            }
        }
        self.reader.select()
    }

    pub fn state(&self) -> DetectionState {
        self.detector.state()
    }

    pub fn fault(&self) -> Option<RFIDError> {
        self.fault
    }

    /// Sleeps for the configured poll delay.
    pub fn wait_interval(&mut self) {
        let delay_ms = self.reader.config.delay_ms;
        self.reader.delay.delay_ms(delay_ms);
    }

    /// Polls forever, handing every transition and every fault to `f`.
    pub fn run<F>(&mut self, mut f: F) -> !
    where
        F: FnMut(Result<DetectionEvent, RFIDError>),
    {
        loop {
            match self.tick() {
                Ok(Some(event)) => f(Ok(event)),
                Ok(None) => {}
                Err(err) => f(Err(err)),
            }
            self.wait_interval();
        }
    }

    pub fn reader(&mut self) -> &mut RfidRc522<SPI, CS, D, W> {
        &mut self.reader
    }

    pub fn release(self) -> RfidRc522<SPI, CS, D, W> {
        self.reader
    }
}
