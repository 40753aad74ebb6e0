// src/cs_pin_wrapper.rs

use crate::errors::{BusFaultKind, RFIDError};
use embedded_hal::digital::OutputPin;

/// Active-low chip select. `select` starts a bus transaction, `deselect`
/// ends it.
pub struct CsPinWrapper<CS> {
    cs: CS,
}

impl<CS> CsPinWrapper<CS>
where
    CS: OutputPin,
{
    pub fn new(cs: CS) -> Self {
        CsPinWrapper { cs }
    }

    pub fn select(&mut self) -> Result<(), RFIDError> {
        self.cs
            .set_low()
            .map_err(|_| RFIDError::BusFault(BusFaultKind::ChipSelectFault))
    }

    pub fn deselect(&mut self) -> Result<(), RFIDError> {
        self.cs
            .set_high()
            .map_err(|_| RFIDError::BusFault(BusFaultKind::ChipSelectFault))
    }

    pub fn release(self) -> CS {
        self.cs
    }
}
