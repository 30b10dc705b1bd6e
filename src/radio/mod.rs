//! Si4461 sub-GHz transceiver support.
//!
//! This module contains:
//! - [`si446x`]: Chip driver over `embedded-hal` SPI, GPIO and delay traits
//! - [`profile`]: Patch and property tables the driver streams at init
//! - [`clock`]: Protocol timer in 0.5 ms counts
//! - [`sync`]: Sync-word detection wait
//! - `esp32`: Board wiring for the ESP32 (ESP32 only)
//!
//! The mesh engine only talks to the chip through [`Transceiver`], so the
//! simulated chip and the real one are interchangeable.

pub mod clock;
#[cfg(feature = "esp32")]
pub mod esp32;
pub mod profile;
mod si446x;
pub mod sync;

use std::fmt;

pub use clock::{Clock, SysTicks, SystemClock, COUNTS_PER_MS, COUNTS_PER_SYS_TICK};
pub use profile::{Property, RadioProfile};
pub use si446x::Si446x;
pub use sync::SyncWait;

/// Si4461 command opcodes used by the stack.
pub mod cmd {
    pub const POWER_UP: u8 = 0x02;
    pub const SET_PROPERTY: u8 = 0x11;
    pub const GPIO_PIN_CFG: u8 = 0x13;
    pub const FIFO_INFO: u8 = 0x15;
    pub const GET_INT_STATUS: u8 = 0x20;
    pub const START_TX: u8 = 0x31;
    pub const START_RX: u8 = 0x32;
    pub const CHANGE_STATE: u8 = 0x34;
    pub const READ_CMD_BUFF: u8 = 0x44;
    pub const WRITE_TX_FIFO: u8 = 0x66;
    pub const READ_RX_FIFO: u8 = 0x77;
}

/// Property groups and numbers the stack touches after init.
pub mod prop {
    pub const INT_CTL_GROUP: u8 = 0x01;
    pub const INT_CTL_ENABLE: u8 = 0x00;

    pub const SYNC_GROUP: u8 = 0x11;
    pub const SYNC_CONFIG: u8 = 0x00;
    /// Sync bytes live at numbers 1..=4.
    pub const SYNC_BITS_FIRST: u8 = 0x01;
    pub const SYNC_SKIP_TX: u8 = 0x80;

    pub const MODEM_MOD_TYPE_GROUP: u8 = 0x20;
    pub const MODEM_MOD_TYPE: u8 = 0x00;
    pub const MOD_TYPE_CW: u8 = 0x00;
    pub const MOD_TYPE_2GFSK: u8 = 0x03;

    pub const FREQ_CONTROL_GROUP: u8 = 0x40;
    pub const FREQ_CONTROL_FRAC2: u8 = 0x02;
    pub const FREQ_CONTROL_FRAC3: u8 = 0x03;
    pub const FREQ_FRAC2_DEFAULT: u8 = 0x17;
    pub const FREQ_FRAC3_DEFAULT: u8 = 0xE4;
}

/// Pending-interrupt bits in the third GET_INT_STATUS response byte.
pub const PH_PACKET_RX: u8 = 0x10;
pub const PH_PACKET_SENT: u8 = 0x20;

/// Chip operating states, as encoded in CHANGE_STATE and START_* commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChipState {
    NoChange = 0,
    Sleep = 1,
    Ready = 3,
    TxTune = 5,
    RxTune = 6,
    Tx = 7,
    Rx = 8,
}

impl ChipState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::NoChange),
            1 => Some(Self::Sleep),
            3 => Some(Self::Ready),
            5 => Some(Self::TxTune),
            6 => Some(Self::RxTune),
            7 => Some(Self::Tx),
            8 => Some(Self::Rx),
            _ => None,
        }
    }
}

/// FIFO selection for FIFO_INFO resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fifo(u8);

impl Fifo {
    pub const NONE: Fifo = Fifo(0);
    pub const TX: Fifo = Fifo(0x01);
    pub const RX: Fifo = Fifo(0x02);
    pub const BOTH: Fifo = Fifo(0x03);

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// FIFO_INFO response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FifoInfo {
    pub rx_count: u8,
    pub tx_space: u8,
}

/// Packet-handler pending flags sampled by GET_INT_STATUS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntStatus {
    pub ph_pend: u8,
}

impl IntStatus {
    pub fn packet_received(&self) -> bool {
        self.ph_pend & PH_PACKET_RX != 0
    }

    pub fn packet_sent(&self) -> bool {
        self.ph_pend & PH_PACKET_SENT != 0
    }
}

/// Operations the mesh protocol needs from a transceiver.
///
/// Sync bytes are given in on-air order; implementations reverse them for
/// the chip's LSB-first comparator.
pub trait Transceiver {
    /// Power-on sequence: reset, patch, power up, pin config, properties.
    fn init(&mut self) -> Result<(), RadioError>;

    fn set_property(&mut self, group: u8, number: u8, value: u8) -> Result<(), RadioError>;

    /// Program a 1..=4 byte sync word. `skip_tx` stops the chip from
    /// sending the sync word itself on transmit.
    fn configure_sync(&mut self, sync: &[u8], skip_tx: bool) -> Result<(), RadioError>;

    /// Reset the RX FIFO and start receiving `len` bytes, then enter `next`.
    fn start_rx(&mut self, len: u8, next: ChipState) -> Result<(), RadioError>;

    /// Transmit `len` bytes already uploaded, then enter `next`.
    fn start_tx(&mut self, len: u8, next: ChipState) -> Result<(), RadioError>;

    fn upload(&mut self, data: &[u8]) -> Result<(), RadioError>;

    fn download(&mut self, buf: &mut [u8]) -> Result<(), RadioError>;

    /// FIFO_INFO, optionally resetting FIFOs first.
    fn fifo_info(&mut self, reset: Fifo) -> Result<FifoInfo, RadioError>;

    /// Sample and clear pending interrupts.
    fn interrupt_status(&mut self) -> Result<IntStatus, RadioError>;

    fn change_state(&mut self, state: ChipState) -> Result<(), RadioError>;

    /// Block until a sync word is detected or `timeout_ms` expires.
    fn wait_sync(&mut self, timeout_ms: u32) -> bool;

    /// Forget any sync detection seen so far.
    fn clear_sync(&mut self);

    fn reset_fifo(&mut self, fifo: Fifo) -> Result<(), RadioError> {
        self.fifo_info(fifo).map(|_| ())
    }
}

/// Radio errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// SPI transfer failed.
    Spi(embedded_hal::spi::ErrorKind),
    /// GPIO access failed.
    Gpio(embedded_hal::digital::ErrorKind),
    /// CTS never asserted before `command`.
    CtsTimeout { command: u8 },
    /// The command buffer never reported ready after `command`.
    ResponseTimeout { command: u8 },
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "SPI error: {:?}", e),
            Self::Gpio(e) => write!(f, "GPIO error: {:?}", e),
            Self::CtsTimeout { command } => write!(f, "CTS timeout before command {:#04x}", command),
            Self::ResponseTimeout { command } => {
                write!(f, "no response to command {:#04x}", command)
            }
        }
    }
}

impl std::error::Error for RadioError {}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    #[esp32_test]
    fn test_chip_state_codes() {
        for s in [
            ChipState::NoChange,
            ChipState::Sleep,
            ChipState::Ready,
            ChipState::TxTune,
            ChipState::RxTune,
            ChipState::Tx,
            ChipState::Rx,
        ] {
            assert_eq!(ChipState::from_u8(s as u8), Some(s));
        }
        assert_eq!(ChipState::from_u8(2), None);
    }

    #[esp32_test]
    fn test_int_status_flags() {
        let st = IntStatus { ph_pend: 0x30 };
        assert!(st.packet_received());
        assert!(st.packet_sent());
        assert!(!IntStatus::default().packet_sent());
    }

    #[esp32_test]
    fn test_error_display() {
        let e = RadioError::CtsTimeout { command: 0x31 };
        assert_eq!(e.to_string(), "CTS timeout before command 0x31");
    }
}
