//! Simulated Si4461 behind the `embedded-hal` traits.
//!
//! [`SimChip`] interprets the command subset the driver uses: properties,
//! FIFOs, interrupt status, TX/RX starts and state changes. Patch rows and
//! power-up commands are accepted and ignored. Transmits are recorded on the
//! [`SimAir`]; a receive start takes the first queued frame whose sync word
//! matches the programmed one.

use super::air::{SentFrame, SimAir};
use super::clock::SimClock;
use crate::codec::reverse_byte;
use crate::radio::{
    cmd, prop, ChipState, RadioProfile, Si446x, SyncWait, COUNTS_PER_MS, PH_PACKET_RX,
    PH_PACKET_SENT,
};
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

const FIFO_SIZE: usize = 64;
const CMD_BUFF_READY: u8 = 0xFF;

/// The driver over a simulated chip.
pub type SimRadio = Si446x<SimChip, SimPin, SimPin, SimClock, SimSync>;

#[derive(Debug, Default)]
struct ChipRegs {
    properties: HashMap<(u8, u8), u8>,
    tx_fifo: VecDeque<u8>,
    rx_fifo: VecDeque<u8>,
    ph_pend: u8,
    response: Vec<u8>,
    state: u8,
}

impl ChipRegs {
    fn property(&self, group: u8, number: u8) -> u8 {
        self.properties.get(&(group, number)).copied().unwrap_or(0)
    }

    /// Programmed sync word in on-air order.
    fn sync_word(&self) -> Vec<u8> {
        let config = self.property(prop::SYNC_GROUP, prop::SYNC_CONFIG);
        let len = (config & 0x03) + 1;
        (0..len)
            .map(|i| reverse_byte(self.property(prop::SYNC_GROUP, prop::SYNC_BITS_FIRST + i)))
            .collect()
    }

    fn execute(&mut self, command: u8, args: &[u8], air: &SimAir) {
        let arg = |i: usize| args.get(i).copied().unwrap_or(0);
        match command {
            cmd::SET_PROPERTY => {
                let (group, count, first) = (arg(0), arg(1), arg(2));
                for i in 0..count {
                    self.properties
                        .insert((group, first.wrapping_add(i)), arg(3 + i as usize));
                }
            }
            cmd::FIFO_INFO => {
                let reset = arg(0);
                if reset & 0x01 != 0 {
                    self.tx_fifo.clear();
                }
                if reset & 0x02 != 0 {
                    self.rx_fifo.clear();
                }
                self.response = vec![
                    self.rx_fifo.len().min(FIFO_SIZE) as u8,
                    FIFO_SIZE.saturating_sub(self.tx_fifo.len()) as u8,
                ];
            }
            cmd::GET_INT_STATUS => {
                self.response = vec![0, 0, self.ph_pend];
                self.ph_pend = 0;
            }
            cmd::WRITE_TX_FIFO => self.tx_fifo.extend(args),
            cmd::START_TX => {
                let len = match usize::from(arg(3)) {
                    0 => self.tx_fifo.len(),
                    n => n.min(self.tx_fifo.len()),
                };
                let payload: Vec<u8> = self.tx_fifo.drain(..len).collect();
                let config = self.property(prop::SYNC_GROUP, prop::SYNC_CONFIG);
                let sync = (config & prop::SYNC_SKIP_TX == 0).then(|| self.sync_word());
                air.record(SentFrame { sync, payload });
                self.ph_pend |= PH_PACKET_SENT;
                self.state = arg(1) >> 4;
            }
            cmd::START_RX => {
                let len = usize::from(arg(3));
                if let Some(payload) = air.receive(&self.sync_word()) {
                    let complete = len > 0 && payload.len() >= len;
                    self.rx_fifo.extend(payload);
                    if complete {
                        self.ph_pend |= PH_PACKET_RX;
                    }
                }
                self.state = ChipState::Rx as u8;
            }
            cmd::CHANGE_STATE => self.state = arg(0),
            _ => {}
        }
    }
}

/// Simulated chip. Clones share registers, so a test can keep one to
/// inspect the chip the engine drives.
#[derive(Debug, Clone)]
pub struct SimChip {
    regs: Arc<Mutex<ChipRegs>>,
    air: Arc<SimAir>,
}

impl SimChip {
    pub fn new(air: Arc<SimAir>) -> Self {
        Self {
            regs: Arc::default(),
            air,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChipRegs> {
        self.regs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn property(&self, group: u8, number: u8) -> Option<u8> {
        self.lock().properties.get(&(group, number)).copied()
    }

    pub fn state(&self) -> Option<ChipState> {
        ChipState::from_u8(self.lock().state)
    }

    pub fn sync_word(&self) -> Vec<u8> {
        self.lock().sync_word()
    }
}

impl spi::ErrorType for SimChip {
    type Error = Infallible;
}

impl SpiDevice for SimChip {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let command = match operations.first() {
            Some(Operation::Write(bytes)) if !bytes.is_empty() => bytes[0],
            _ => return Ok(()),
        };
        let mut regs = self.lock();
        match command {
            cmd::READ_CMD_BUFF => {
                if let Some(Operation::Read(ready)) = operations.get_mut(1) {
                    ready.fill(CMD_BUFF_READY);
                }
                if let Some(Operation::Read(response)) = operations.get_mut(2) {
                    for (i, b) in response.iter_mut().enumerate() {
                        *b = regs.response.get(i).copied().unwrap_or(0);
                    }
                }
            }
            cmd::READ_RX_FIFO => {
                if let Some(Operation::Read(buf)) = operations.get_mut(1) {
                    for b in buf.iter_mut() {
                        *b = regs.rx_fifo.pop_front().unwrap_or(0);
                    }
                }
            }
            _ => {
                let args: Vec<u8> = match operations.get(1) {
                    Some(Operation::Write(bytes)) => bytes.to_vec(),
                    _ => Vec::new(),
                };
                regs.execute(command, &args, &self.air);
            }
        }
        Ok(())
    }
}

/// Shutdown and CTS lines. CTS always reads high.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimPin;

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Sync-detect signal raised by the air. A wait that finds none lets the
/// whole timeout pass on the virtual clock.
#[derive(Debug, Clone)]
pub struct SimSync {
    air: Arc<SimAir>,
    clock: SimClock,
}

impl SimSync {
    pub fn new(air: Arc<SimAir>, clock: SimClock) -> Self {
        Self { air, clock }
    }
}

impl SyncWait for SimSync {
    fn clear(&mut self) {
        self.air.clear_sync();
    }

    fn wait(&mut self, timeout_ms: u32) -> bool {
        if self.air.take_sync() {
            return true;
        }
        self.clock.advance(timeout_ms.saturating_mul(COUNTS_PER_MS));
        false
    }
}

/// Driver over a fresh simulated chip on `air`. The returned chip handle
/// shares the driver's registers.
pub fn sim_radio(air: &Arc<SimAir>, clock: &SimClock) -> (SimRadio, SimChip) {
    let chip = SimChip::new(air.clone());
    let radio = Si446x::new(
        chip.clone(),
        SimPin,
        SimPin,
        clock.clone(),
        SimSync::new(air.clone(), clock.clone()),
        RadioProfile::WISAFE,
    );
    (radio, chip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::{Fifo, Transceiver};
    use wisafe_rs_esp32_macros::esp32_test;

    fn radio() -> (SimRadio, SimChip, Arc<SimAir>) {
        let air = SimAir::new();
        let (radio, chip) = sim_radio(&air, &SimClock::new());
        (radio, chip, air)
    }

    #[esp32_test]
    fn test_init_streams_profile() {
        let (mut radio, chip, _air) = radio();
        radio.init().unwrap();
        let last = RadioProfile::WISAFE.properties.last().unwrap();
        assert_eq!(chip.property(last.group, last.number), Some(last.value));
    }

    #[esp32_test]
    fn test_sync_word_round_trip() {
        let (mut radio, chip, _air) = radio();
        radio.configure_sync(&[0xAA, 0xA9, 0x14], true).unwrap();
        assert_eq!(chip.sync_word(), vec![0xAA, 0xA9, 0x14]);
    }

    #[esp32_test]
    fn test_transmit_records_frame() {
        let (mut radio, chip, air) = radio();
        radio.configure_sync(&[0x00], false).unwrap();
        radio.upload(&[0x2A, 0xAA, 0xAA, 0xA8]).unwrap();
        radio.start_tx(4, ChipState::RxTune).unwrap();
        let status = radio.interrupt_status().unwrap();
        assert!(status.packet_sent());
        assert!(!radio.interrupt_status().unwrap().packet_sent());
        assert_eq!(chip.state(), Some(ChipState::RxTune));

        let sent = air.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sync, Some(vec![0x00]));
        assert_eq!(sent[0].payload, vec![0x2A, 0xAA, 0xAA, 0xA8]);
    }

    #[esp32_test]
    fn test_receive_matching_frame() {
        let (mut radio, _chip, air) = radio();
        air.queue(&[0xA9, 0x03], &[1, 2, 3, 4]);
        radio.configure_sync(&[0xA9, 0x03], false).unwrap();
        radio.start_rx(4, ChipState::Ready).unwrap();
        assert!(radio.wait_sync(10));
        assert!(radio.interrupt_status().unwrap().packet_received());
        assert_eq!(radio.fifo_info(Fifo::NONE).unwrap().rx_count, 4);
        let mut buf = [0u8; 4];
        radio.download(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[esp32_test]
    fn test_missed_sync_spends_timeout() {
        let air = SimAir::new();
        let clock = SimClock::new();
        let (mut radio, _chip) = sim_radio(&air, &clock);
        radio.configure_sync(&[0xAA, 0xAA, 0xA8], true).unwrap();
        radio.start_rx(0, ChipState::TxTune).unwrap();
        assert!(!radio.wait_sync(6));
        assert!(clock.now() >= 12);
    }
}
