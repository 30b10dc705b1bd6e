//! Continuous-wave transmit for frequency calibration.
//!
//! Production test 5 keys an unmodulated carrier and lets the host nudge
//! the synthesizer fraction with single-byte tuning commands until it
//! saves, exits or goes quiet for a minute.

use super::engine::{EngineError, MeshEngine};
use crate::bridge::{HostCommand, Tune};
use crate::radio::{prop, ChipState, Clock, RadioError, Transceiver};
use log::{debug, info};

/// Fine tuning step applied to the third fraction byte.
const FINE_STEP: u8 = 5;
/// Idle time in system ticks before the carrier is dropped (one minute).
const IDLE_TIMEOUT: u32 = 480;
/// Host poll interval while the carrier is up.
const POLL_INTERVAL_MS: u32 = 5;

impl<R: Transceiver, C: Clock> MeshEngine<R, C> {
    /// Transmit a carrier until the host saves, exits or stops tuning.
    ///
    /// The radio is always put back into 2GFSK and Ready on the way out.
    pub fn continuous_transmit(&mut self) -> Result<(), EngineError> {
        info!("Continuous transmit started");
        let result = self.carrier_loop();
        let restored = self.restore_modulation();
        result?;
        restored?;
        info!("Continuous transmit stopped");
        Ok(())
    }

    fn carrier_loop(&mut self) -> Result<(), EngineError> {
        let mut frac2 = prop::FREQ_FRAC2_DEFAULT;
        let mut frac3 = prop::FREQ_FRAC3_DEFAULT;

        let radio = self.link.radio_mut();
        radio.set_property(prop::MODEM_MOD_TYPE_GROUP, prop::MODEM_MOD_TYPE, prop::MOD_TYPE_CW)?;
        radio.change_state(ChipState::Tx)?;

        let mut start = self.sys_time();
        while self.sys_time().wrapping_sub(start) < IDLE_TIMEOUT {
            let Some(step) = self.next_tune_step() else {
                self.link.clock_mut().delay_ms(POLL_INTERVAL_MS);
                continue;
            };
            match step {
                Tune::Increment => frac2 = frac2.wrapping_add(1),
                Tune::Decrement => frac2 = frac2.wrapping_sub(1),
                Tune::FineIncrement if frac3 <= u8::MAX - FINE_STEP => frac3 += FINE_STEP,
                Tune::FineDecrement if frac3 >= FINE_STEP => frac3 -= FINE_STEP,
                Tune::FineIncrement | Tune::FineDecrement => {}
                Tune::Exit => {
                    self.link.apply_calibration(
                        prop::FREQ_FRAC2_DEFAULT,
                        prop::FREQ_FRAC3_DEFAULT,
                    )?;
                    return Ok(());
                }
                Tune::Save => {
                    info!("Saving frequency calibration {:#04x}/{:#04x}", frac2, frac3);
                    self.store.save_freq_frac(frac2, frac3)?;
                    return Ok(());
                }
            }
            debug!("Tuned to {:#04x}/{:#04x}", frac2, frac3);
            self.retune(frac2, frac3)?;
            start = self.sys_time();
        }
        info!("No tuning input, leaving continuous transmit");
        Ok(())
    }

    fn next_tune_step(&mut self) -> Option<Tune> {
        let msg = self.port.poll()?;
        match HostCommand::classify(&msg, true) {
            Ok(HostCommand::Tune(step)) => Some(step),
            other => {
                debug!("Ignoring {:?} during continuous transmit", other);
                None
            }
        }
    }

    fn retune(&mut self, frac2: u8, frac3: u8) -> Result<(), RadioError> {
        self.link.apply_calibration(frac2, frac3)?;
        let radio = self.link.radio_mut();
        radio.change_state(ChipState::Ready)?;
        radio.change_state(ChipState::Tx)
    }

    fn restore_modulation(&mut self) -> Result<(), RadioError> {
        let radio = self.link.radio_mut();
        radio.set_property(
            prop::MODEM_MOD_TYPE_GROUP,
            prop::MODEM_MOD_TYPE,
            prop::MOD_TYPE_2GFSK,
        )?;
        radio.change_state(ChipState::Ready)
    }
}
