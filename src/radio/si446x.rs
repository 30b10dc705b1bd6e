//! Si4461 driver.
//!
//! Commands are written in one SPI transaction after CTS is asserted.
//! Responses are fetched with READ_CMD_BUFF, retried until the chip
//! reports 0xFF. Both waits are bounded and end in a [`RadioError`] rather
//! than spinning on a stuck chip.

use super::profile::RadioProfile;
use super::sync::SyncWait;
use super::{cmd, prop, ChipState, Fifo, FifoInfo, IntStatus, RadioError, Transceiver};
use crate::codec::reverse_byte;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, InputPin, OutputPin};
use embedded_hal::spi::{Error as _, Operation, SpiDevice};
use log::{debug, info};

/// All traffic goes out on channel 0.
const CHANNEL: u8 = 0;

/// CTS polls before giving up on a command.
const CTS_POLL_LIMIT: u32 = 50;
const CTS_POLL_US: u32 = 20;

/// READ_CMD_BUFF attempts before giving up on a response.
const RESPONSE_POLL_LIMIT: u32 = 50;
const CMD_BUFF_READY: u8 = 0xFF;

const SDN_HIGH_MS: u32 = 6;
const SDN_SETTLE_MS: u32 = 12;
const PATCH_ROW_MS: u32 = 8;

/// POWER_UP arguments: patch boot, external 30 MHz crystal.
const POWER_UP_ARGS: [u8; 6] = [0x81, 0x00, 0x01, 0xC9, 0xC3, 0x80];

/// GPIO0 TX state, GPIO1 CTS, GPIO2 TX data, GPIO3 sync detect, nIRQ, SDO.
const GPIO_PIN_CFG_ARGS: [u8; 7] = [0x60, 0x48, 0x44, 0x5A, 0x67, 0x4B, 0x00];

/// Si4461 on an SPI bus with shutdown and CTS lines.
pub struct Si446x<SPI, SDN, CTS, D, W> {
    spi: SPI,
    sdn: SDN,
    cts: CTS,
    delay: D,
    sync: W,
    profile: RadioProfile,
}

impl<SPI, SDN, CTS, D, W> Si446x<SPI, SDN, CTS, D, W>
where
    SPI: SpiDevice,
    SDN: OutputPin,
    CTS: InputPin,
    D: DelayNs,
    W: SyncWait,
{
    pub fn new(spi: SPI, sdn: SDN, cts: CTS, delay: D, sync: W, profile: RadioProfile) -> Self {
        Self {
            spi,
            sdn,
            cts,
            delay,
            sync,
            profile,
        }
    }

    fn wait_cts(&mut self, command: u8) -> Result<(), RadioError> {
        for _ in 0..CTS_POLL_LIMIT {
            if self.cts.is_high().map_err(|e| RadioError::Gpio(e.kind()))? {
                return Ok(());
            }
            self.delay.delay_us(CTS_POLL_US);
        }
        Err(RadioError::CtsTimeout { command })
    }

    fn write_raw(&mut self, command: u8, args: &[u8]) -> Result<(), RadioError> {
        self.spi
            .transaction(&mut [Operation::Write(&[command]), Operation::Write(args)])
            .map_err(|e| RadioError::Spi(e.kind()))
    }

    /// CTS-gated command without a response.
    fn command(&mut self, command: u8, args: &[u8]) -> Result<(), RadioError> {
        self.wait_cts(command)?;
        self.write_raw(command, args)
    }

    /// CTS-gated command followed by a READ_CMD_BUFF response.
    fn command_response(
        &mut self,
        command: u8,
        args: &[u8],
        response: &mut [u8],
    ) -> Result<(), RadioError> {
        self.command(command, args)?;
        for _ in 0..RESPONSE_POLL_LIMIT {
            let mut ready = [0u8];
            self.spi
                .transaction(&mut [
                    Operation::Write(&[cmd::READ_CMD_BUFF]),
                    Operation::Read(&mut ready),
                    Operation::Read(response),
                ])
                .map_err(|e| RadioError::Spi(e.kind()))?;
            if ready[0] == CMD_BUFF_READY {
                return Ok(());
            }
        }
        Err(RadioError::ResponseTimeout { command })
    }

    fn reset(&mut self) -> Result<(), RadioError> {
        self.sdn.set_high().map_err(|e| RadioError::Gpio(e.kind()))?;
        self.delay.delay_ms(SDN_HIGH_MS);
        self.sdn.set_low().map_err(|e| RadioError::Gpio(e.kind()))?;
        self.delay.delay_ms(SDN_SETTLE_MS);
        Ok(())
    }
}

impl<SPI, SDN, CTS, D, W> Transceiver for Si446x<SPI, SDN, CTS, D, W>
where
    SPI: SpiDevice,
    SDN: OutputPin,
    CTS: InputPin,
    D: DelayNs,
    W: SyncWait,
{
    fn init(&mut self) -> Result<(), RadioError> {
        info!(
            "Initializing Si4461: {} patch rows, {} properties",
            self.profile.patch.len(),
            self.profile.properties.len()
        );
        let profile = self.profile;
        self.reset()?;

        // The patch loader does not assert CTS between rows; it is paced.
        for row in profile.patch {
            self.write_raw(row[0], &row[1..])?;
            self.delay.delay_ms(PATCH_ROW_MS);
        }

        self.command(cmd::POWER_UP, &POWER_UP_ARGS)?;
        self.wait_cts(cmd::POWER_UP)?;
        self.interrupt_status()?;

        self.command(cmd::GPIO_PIN_CFG, &GPIO_PIN_CFG_ARGS)?;
        self.wait_cts(cmd::GPIO_PIN_CFG)?;
        self.interrupt_status()?;

        for p in profile.properties {
            self.set_property(p.group, p.number, p.value)?;
        }
        debug!("Si4461 configured");
        Ok(())
    }

    fn set_property(&mut self, group: u8, number: u8, value: u8) -> Result<(), RadioError> {
        self.command(cmd::SET_PROPERTY, &[group, 1, number, value])
    }

    fn configure_sync(&mut self, sync: &[u8], skip_tx: bool) -> Result<(), RadioError> {
        let len = sync.len().clamp(1, 4) as u8;
        let mut config = len - 1;
        if skip_tx {
            config |= prop::SYNC_SKIP_TX;
        }
        self.set_property(prop::SYNC_GROUP, prop::SYNC_CONFIG, config)?;
        for (i, &b) in sync.iter().take(4).enumerate() {
            self.set_property(
                prop::SYNC_GROUP,
                prop::SYNC_BITS_FIRST + i as u8,
                reverse_byte(b),
            )?;
        }
        Ok(())
    }

    fn start_rx(&mut self, len: u8, next: ChipState) -> Result<(), RadioError> {
        self.reset_fifo(Fifo::RX)?;
        self.command(
            cmd::START_RX,
            &[
                CHANNEL,
                0,
                0,
                len,
                ChipState::NoChange as u8,
                next as u8,
                ChipState::NoChange as u8,
            ],
        )
    }

    fn start_tx(&mut self, len: u8, next: ChipState) -> Result<(), RadioError> {
        self.command(cmd::START_TX, &[CHANNEL, (next as u8) << 4, 0, len, 0, 0])
    }

    fn upload(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.command(cmd::WRITE_TX_FIFO, data)
    }

    fn download(&mut self, buf: &mut [u8]) -> Result<(), RadioError> {
        self.wait_cts(cmd::READ_RX_FIFO)?;
        self.spi
            .transaction(&mut [Operation::Write(&[cmd::READ_RX_FIFO]), Operation::Read(buf)])
            .map_err(|e| RadioError::Spi(e.kind()))
    }

    fn fifo_info(&mut self, reset: Fifo) -> Result<FifoInfo, RadioError> {
        let mut resp = [0u8; 2];
        self.command_response(cmd::FIFO_INFO, &[reset.bits()], &mut resp)?;
        Ok(FifoInfo {
            rx_count: resp[0],
            tx_space: resp[1],
        })
    }

    fn interrupt_status(&mut self) -> Result<IntStatus, RadioError> {
        let mut resp = [0u8; 3];
        self.command_response(cmd::GET_INT_STATUS, &[], &mut resp)?;
        Ok(IntStatus { ph_pend: resp[2] })
    }

    fn change_state(&mut self, state: ChipState) -> Result<(), RadioError> {
        self.command(cmd::CHANGE_STATE, &[state as u8])
    }

    fn wait_sync(&mut self, timeout_ms: u32) -> bool {
        self.sync.wait(timeout_ms)
    }

    fn clear_sync(&mut self) {
        self.sync.clear()
    }
}
