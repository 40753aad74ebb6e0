#![cfg_attr(not(any(test, feature = "std")), no_std)]
// src/lib.rs

#[macro_use]
mod diag;

pub mod card_types;
pub mod commands;
pub mod config;
pub mod cs_pin_wrapper;
pub mod detection;
pub mod errors;
pub mod fifo;
pub mod registers;
pub mod rfid_rc522;
pub mod scheduler;
pub mod select;
pub mod sequencer;
pub mod transport;
pub mod uid;

#[cfg(feature = "std")]
pub mod cancellation_token;
#[cfg(feature = "std")]
pub mod observers;
#[cfg(feature = "std")]
pub mod runner;

#[cfg(test)]
mod sim;

pub use card_types::CardType;
pub use config::{AntennaGain, Config, ConfigError, RequestKind};
pub use detection::{DetectionEvent, DetectionState};
pub use diag::{Hex, NoDiagnostics};
#[cfg(feature = "std")]
pub use diag::StdoutDiagnostics;
pub use errors::{BusFaultKind, RFIDError};
pub use rfid_rc522::RfidRc522;
pub use scheduler::PollingScheduler;
pub use select::{Atqa, Card, SelectState};
pub use uid::Uid;

#[cfg(feature = "std")]
pub use cancellation_token::CancellationToken;
#[cfg(feature = "std")]
pub use observers::{ObserverRegistry, Subscription, SubscriptionId};
#[cfg(feature = "std")]
pub use runner::{Poller, PollerError, PollerHandle, PollerStatus};
