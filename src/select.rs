// src/select.rs

use crate::card_types::CardType;
use crate::commands::*;
use crate::config::RequestKind;
use crate::errors::RFIDError;
use crate::rfid_rc522::RfidRc522;
use crate::sequencer::Framing;
use crate::uid::Uid;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use ufmt::uWrite;

/// Anticollision frames allowed per cascade level; each one fixes at least
/// one more UID bit.
pub const MAX_ANTICOLLISION_ROUNDS: usize = 32;

const CASCADE_COMMANDS: [u8; 3] = [PICC_CMD_SEL_CL1, PICC_CMD_SEL_CL2, PICC_CMD_SEL_CL3];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectState {
    Idle,
    /// A PICC answered REQA/WUPA.
    RequestSent,
    CandidateResolving,
    Selected,
}

/// Answer to request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Atqa(pub [u8; 2]);

impl Atqa {
    /// UID size announced in bits 7..6: 4, 7 or 10 bytes.
    pub fn uid_len(&self) -> Option<usize> {
        match self.0[0] >> 6 {
            0 => Some(4),
            1 => Some(7),
            2 => Some(10),
            _ => None,
        }
    }
}

/// A selected PICC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Card {
    pub uid: Uid,
    pub sak: u8,
}

impl Card {
    pub fn card_type(&self) -> CardType {
        CardType::from_sak(self.sak)
    }
}

fn bcc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

impl<SPI, CS, D, W> RfidRc522<SPI, CS, D, W>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    W: uWrite,
{
    /// Sends REQA or WUPA as a short frame.
    pub fn request(&mut self, kind: RequestKind) -> Result<Atqa, RFIDError> {
        self.select_state = SelectState::Idle;

        let response = self.transceive(&[kind.picc_command()], Framing::SHORT)?;
        // Colliding ATQAs still mean a PICC is there.
        if response.data.len() != 2 || response.valid_bits != 8 {
            return Err(RFIDError::ProtocolError);
        }

        self.select_state = SelectState::RequestSent;
        Ok(Atqa([response.data[0], response.data[1]]))
    }

    /// Resolves one PICC through all cascade levels and selects it.
    pub fn select(&mut self) -> Result<Card, RFIDError> {
        if self.select_state != SelectState::RequestSent {
            self.select_state = SelectState::Idle;
            return Err(RFIDError::ProtocolError);
        }

        self.select_state = SelectState::CandidateResolving;
        match self.select_cascade() {
            Ok(card) => {
                self.select_state = SelectState::Selected;
                Ok(card)
            }
            Err(err) => {
                self.select_state = SelectState::Idle;
                // A PICC that goes quiet halfway through is a broken exchange.
                Err(match err {
                    RFIDError::NoCardPresent => RFIDError::ProtocolError,
                    other => other,
                })
            }
        }
    }

    /// Puts the selected PICC into HALT. Only silence counts as success.
    pub fn halt(&mut self) -> Result<(), RFIDError> {
        let mut frame = [PICC_CMD_HLTA, 0x00, 0x00, 0x00];
        let crc = self.compute_crc(&frame[..2])?;
        frame[2..].copy_from_slice(&crc.to_le_bytes());

        self.select_state = SelectState::Idle;
        match self.transceive(&frame, Framing::BYTES) {
            Err(RFIDError::NoCardPresent) => Ok(()),
            Ok(_) => Err(RFIDError::ProtocolError),
            Err(err) => Err(err),
        }
    }

    fn select_cascade(&mut self) -> Result<Card, RFIDError> {
        let mut uid = [0u8; 10];
        let mut len = 0;

        for (level, &sel) in CASCADE_COMMANDS.iter().enumerate() {
            let bytes = self.anticollision(sel)?;
            let sak = self.select_level(sel, &bytes)?;

            let cascade = sak & SAK_CASCADE != 0;
            if cascade != (bytes[0] == PICC_CMD_CT) {
                return Err(RFIDError::ProtocolError);
            }
            if cascade {
                uid[len..len + 3].copy_from_slice(&bytes[1..4]);
                len += 3;
                diag!(self, "cascade level {} complete", level + 1);
                continue;
            }

            uid[len..len + 4].copy_from_slice(&bytes[..4]);
            len += 4;
            let card = Card {
                uid: Uid::from_slice(&uid[..len])?,
                sak,
            };
            diag!(self, "selected {} ({:?})", card.uid, card.card_type());
            return Ok(card);
        }

        // SAK still asked for another level after the third.
        Err(RFIDError::ProtocolError)
    }

    /// Learns the 4 bytes of one cascade level bit by bit, always following
    /// the PICCs that answered 1 at a colliding position.
    fn anticollision(&mut self, sel: u8) -> Result<[u8; 5], RFIDError> {
        let mut level = [0u8; 5];
        let mut known = 0usize;

        for _ in 0..MAX_ANTICOLLISION_ROUNDS {
            let whole = known / 8;
            let partial = known % 8;
            let sent = whole + usize::from(partial != 0);

            let mut frame = [0u8; 7];
            frame[0] = sel;
            frame[1] = (((2 + whole) as u8) << 4) | partial as u8;
            frame[2..2 + sent].copy_from_slice(&level[..sent]);

            let response = self.transceive(&frame[..2 + sent], Framing::split_at(known))?;
            let expected = level.len() - whole;
            if response.data.is_empty() || response.data.len() > expected {
                return Err(RFIDError::ProtocolError);
            }

            // Bits below the alignment in the first byte are ours already.
            for (i, &byte) in response.data.iter().enumerate() {
                if i == 0 && partial != 0 {
                    let mask = 0xFFu8 << partial;
                    level[whole] = (level[whole] & !mask) | (byte & mask);
                } else {
                    level[whole + i] = byte;
                }
            }

            let Some(position) = response.collision else {
                if response.data.len() != expected || level[4] != bcc(&level[..4]) {
                    return Err(RFIDError::ProtocolError);
                }
                return Ok(level);
            };

            let resolved = whole * 8 + usize::from(position);
            if resolved <= known || resolved > 32 {
                return Err(RFIDError::ProtocolError);
            }
            let bit = resolved - 1;
            level[bit / 8] |= 1 << (bit % 8);
            known = resolved;
            diag!(self, "collision, {} bits known", known);

            if known == 32 {
                level[4] = bcc(&level[..4]);
                return Ok(level);
            }
        }

        Err(RFIDError::ProtocolError)
    }

    /// Sends SELECT for a fully known level and returns the SAK.
    fn select_level(&mut self, sel: u8, level: &[u8; 5]) -> Result<u8, RFIDError> {
        let mut frame = [0u8; 9];
        frame[0] = sel;
        frame[1] = NVB_SELECT;
        frame[2..7].copy_from_slice(level);
        let crc = self.compute_crc(&frame[..7])?;
        frame[7..].copy_from_slice(&crc.to_le_bytes());

        let response = self.transceive(&frame, Framing::BYTES)?;
        if response.collision.is_some() || response.data.len() != 3 || response.valid_bits != 8 {
            return Err(RFIDError::ProtocolError);
        }

        let sak = response.data[0];
        let crc = self.compute_crc(&response.data[..1])?;
        if response.data[1..3] != crc.to_le_bytes() {
            diag!(self, "SAK failed its CRC check");
            return Err(RFIDError::ProtocolError);
        }
        Ok(sak)
    }
}
