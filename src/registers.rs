// src/registers.rs
//
// MFRC522 register addresses (6-bit). The SPI address byte is built by the
// transport: `(addr << 1) | 0x80` to read, `addr << 1` to write.

// Command and Status Registers
pub const COMMAND_REG: u8 = 0x01;         // Starts and stops command execution
pub const COM_IEN_REG: u8 = 0x02;         // Communication Interrupt Enable Register
pub const DIV_IEN_REG: u8 = 0x03;         // DivIrq interrupt Enable Register
pub const COMM_IRQ_REG: u8 = 0x04;        // Interrupt request bits
pub const DIV_IRQ_REG: u8 = 0x05;         // Set bits to signal internal events
pub const ERROR_REG: u8 = 0x06;           // Error bits showing the error status of the last command
pub const STATUS1_REG: u8 = 0x07;         // Communication status bits
pub const STATUS2_REG: u8 = 0x08;         // Receiver and transmitter status bits
pub const FIFO_DATA_REG: u8 = 0x09;       // FIFO data input/output
pub const FIFO_LEVEL_REG: u8 = 0x0A;      // Number of bytes in the FIFO buffer
pub const WATER_LEVEL_REG: u8 = 0x0B;     // Level for FIFO underflow and overflow warning
pub const CONTROL_REG: u8 = 0x0C;         // Miscellaneous control bits
pub const BIT_FRAMING_REG: u8 = 0x0D;     // Adjustments for bit-oriented frames
pub const COLL_REG: u8 = 0x0E;            // Collision detection

// Command Registers
pub const MODE_REG: u8 = 0x11;            // Defines general modes for transmitting and receiving
pub const TX_MODE_REG: u8 = 0x12;         // Defines transmission data rate and framing
pub const RX_MODE_REG: u8 = 0x13;         // Defines reception data rate and framing
pub const TX_CONTROL_REG: u8 = 0x14;      // Controls the antenna driver pins TX1 and TX2
pub const TX_ASK_REG: u8 = 0x15;          // Controls the setting of the transmission modulation

// Configuration Registers
pub const CRC_RESULT_REG_H: u8 = 0x21;    // CRC calculation result, MSB
pub const CRC_RESULT_REG_L: u8 = 0x22;    // CRC calculation result, LSB
pub const MODE_WIDTH_REG: u8 = 0x24;      // Modulation width setting
pub const RF_CFG_REG: u8 = 0x26;          // Configures the receiver gain
pub const T_MODE_REG: u8 = 0x2A;          // Timer settings
pub const T_PRESCALER_REG: u8 = 0x2B;     // Timer prescaler value
pub const T_RELOAD_REG_H: u8 = 0x2C;      // 16-bit timer reload value (high byte)
pub const T_RELOAD_REG_L: u8 = 0x2D;      // 16-bit timer reload value (low byte)

// Test Registers
pub const VERSION_REG: u8 = 0x37;         // Shows the software version

/// Mask of a valid register address.
pub const ADDRESS_MASK: u8 = 0x3F;

// CommandReg bits
pub const COMMAND_MASK: u8 = 0x0F;
pub const POWER_DOWN: u8 = 1 << 4;

// ComIrqReg bits. Bit 7 (Set1) selects whether written ones set or clear.
pub const IRQ_SET1: u8 = 1 << 7;
pub const TX_IRQ: u8 = 1 << 6;
pub const RX_IRQ: u8 = 1 << 5;
pub const IDLE_IRQ: u8 = 1 << 4;
pub const HI_ALERT_IRQ: u8 = 1 << 3;
pub const LO_ALERT_IRQ: u8 = 1 << 2;
pub const ERR_IRQ: u8 = 1 << 1;
pub const TIMER_IRQ: u8 = 1 << 0;
pub const ALL_COMM_IRQS: u8 = 0x7F;

// DivIrqReg bits
pub const CRC_IRQ: u8 = 1 << 2;

// ErrorReg bits
pub const PROTOCOL_ERR: u8 = 1 << 0;
pub const PARITY_ERR: u8 = 1 << 1;
pub const CRC_ERR: u8 = 1 << 2;
pub const COLL_ERR: u8 = 1 << 3;
pub const BUFFER_OVFL: u8 = 1 << 4;
pub const TEMP_ERR: u8 = 1 << 6;
pub const WR_ERR: u8 = 1 << 7;

// FIFOLevelReg
pub const FLUSH_BUFFER: u8 = 1 << 7;
pub const FIFO_LEVEL_MASK: u8 = 0x7F;

// ControlReg
pub const RX_LAST_BITS_MASK: u8 = 0x07;

// BitFramingReg
pub const START_SEND: u8 = 1 << 7;

// CollReg
pub const VALUES_AFTER_COLL: u8 = 1 << 7;
pub const COLL_POS_NOT_VALID: u8 = 1 << 5;
pub const COLL_POS_MASK: u8 = 0x1F;

// TxControlReg
pub const TX_RF_EN: u8 = 0x03;

// RFCfgReg
pub const RX_GAIN_MASK: u8 = 0x70;
