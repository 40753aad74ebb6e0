// src/commands.rs

/// Commands for the MFRC522 (CommandReg bits 3..0).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Idle,
    Mem,
    GenerateRandomID,
    CalcCRC,
    Transceive,
    NoCmdChange,
    MFAuthent,
    SoftReset,
}

impl Command {
    pub fn code(self) -> u8 {
        match self {
            Command::Idle => 0x00,
            Command::Mem => 0x01,
            Command::GenerateRandomID => 0x02,
            Command::CalcCRC => 0x03,
            Command::NoCmdChange => 0x07,
            Command::Transceive => 0x0C,
            Command::MFAuthent => 0x0E,
            Command::SoftReset => 0x0F,
        }
    }

    pub fn from_code(code: u8) -> Option<Command> {
        match code & 0x0F {
            0x00 => Some(Command::Idle),
            0x01 => Some(Command::Mem),
            0x02 => Some(Command::GenerateRandomID),
            0x03 => Some(Command::CalcCRC),
            0x07 => Some(Command::NoCmdChange),
            0x0C => Some(Command::Transceive),
            0x0E => Some(Command::MFAuthent),
            0x0F => Some(Command::SoftReset),
            _ => None,
        }
    }
}

// ISO 14443-A commands sent to the PICC
pub const PICC_CMD_REQA: u8 = 0x26;
pub const PICC_CMD_WUPA: u8 = 0x52;
pub const PICC_CMD_CT: u8 = 0x88; // Cascade tag, first UID byte of an incomplete level
pub const PICC_CMD_SEL_CL1: u8 = 0x93;
pub const PICC_CMD_SEL_CL2: u8 = 0x95;
pub const PICC_CMD_SEL_CL3: u8 = 0x97;
pub const PICC_CMD_HLTA: u8 = 0x50;

/// NVB announcing a complete level: SEL, NVB, 4 UID bytes and BCC.
pub const NVB_SELECT: u8 = 0x70;

/// SAK bit signalling that the UID is not complete yet.
pub const SAK_CASCADE: u8 = 0x04;
