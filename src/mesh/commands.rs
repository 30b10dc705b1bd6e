//! Host command handling.
//!
//! Replies to host commands go straight onto the reply queue. Reports
//! produced by the radio side use the single outgoing slot instead.

use super::engine::{EngineError, MeshEngine};
use super::reason::RumorReason;
use crate::bridge::command::MAX_TRANSPARENT_LEN;
use crate::bridge::{extended, spimsg, HostCommand, Rejected};
use crate::codec::consts::{FWREV, NULL_SID, RESERVED_KEY, SID_MASK};
use crate::codec::SidMap;
use crate::radio::{Clock, Transceiver};
use log::{debug, info, warn};

/// Production test selectors (`E8 <test>`).
mod prod_test {
    pub const VERSION: u8 = 1;
    pub const CONTINUOUS_TX: u8 = 5;
    pub const LOOPBACK: u8 = 6;
    pub const RESERVED_MESH: u8 = 7;
}

/// Sub-commands of the `E9` production test response.
const PROD_TEST_VERSION_OK: u8 = 0x01;

impl<R: Transceiver, C: Clock> MeshEngine<R, C> {
    /// Read the next complete command from the host, if any.
    pub(super) fn next_command(&mut self) -> Option<HostCommand> {
        let msg = self.port.poll()?;
        match HostCommand::classify(&msg, false) {
            Ok(cmd) => Some(cmd),
            Err(Rejected::Empty) => None,
            Err(e) => {
                warn!("Dropping host message {:02X?}: {:?}", msg.as_slice(), e);
                None
            }
        }
    }

    /// Run one host command.
    pub fn process_command(&mut self, cmd: HostCommand) -> Result<(), EngineError> {
        debug!("Host command {:?}", cmd);
        match cmd {
            HostCommand::UnitTest { payload, len } => self.stage_sd_rumor(payload, len),
            HostCommand::Transparent { payload, len } => {
                self.stage_sd_rumor(payload, len);
                self.ack();
            }
            HostCommand::Diagnostic => {
                let gw = self.st.gateway_id;
                self.reply(&[
                    spimsg::DIAG_RESULT,
                    32,
                    32,
                    32,
                    100,
                    FWREV,
                    gw[0],
                    gw[1],
                    gw[2],
                    0,
                    0,
                    self.st.sid,
                    7,
                ]);
            }
            HostCommand::IdRequest => {
                let k = self.st.keys;
                self.reply(&[spimsg::ID_RESPONSE, 0, 0, 0, k[0], k[1], k[2]]);
            }
            HostCommand::Clear | HostCommand::Reset => {
                if self.store.mfct_stamped()? {
                    self.nack();
                } else {
                    info!("Clearing mesh membership");
                    self.reset_to_unjoined();
                    self.ack();
                }
            }
            HostCommand::ManufacturingMode => {
                info!("Manufacturing stamp cleared");
                self.store.clear_mfct()?;
            }
            HostCommand::OperationalMode => {
                info!("Manufacturing stamp written");
                self.store.set_mfct()?;
            }
            HostCommand::AlarmIdent { id, model } => {
                self.st.gateway_id = id;
                self.st.sd_model = model;
                self.nack();
            }
            HostCommand::Tune(step) => {
                debug!("Tuning step {:?} outside continuous transmit", step);
                self.nack();
            }
            HostCommand::Extended {
                len,
                option,
                arg2,
                arg3,
                new_map,
            } => {
                if len < 2 {
                    self.nack();
                } else {
                    self.extended_request(option, arg2, arg3, new_map);
                }
            }
            HostCommand::ProductionTest { len, test } => {
                if len < 2 || self.store.mfct_stamped()? {
                    self.nack();
                } else {
                    self.production_test(test)?;
                }
            }
        }
        Ok(())
    }

    fn stage_sd_rumor(&mut self, payload: [u8; MAX_TRANSPARENT_LEN], len: u8) {
        self.st.pass_thru = payload;
        self.st.pass_thru_len = len;
        self.st.reasons.insert(RumorReason::SdRumor);
    }

    /// `D3 <option> ...`
    fn extended_request(&mut self, option: u8, arg2: u8, arg3: u8, new_map: SidMap) {
        match option {
            extended::SIDMAP => {
                let mut reply = [0u8; 10];
                reply[0] = spimsg::EXTENDED_RESPONSE;
                reply[1] = extended::SIDMAP;
                reply[2..].copy_from_slice(&self.st.sid_map.bytes());
                self.reply(&reply);
            }
            extended::SIDMAP_UPDATE => {
                info!("SID map update requested: {}", new_map);
                self.st.new_sid_map = new_map;
                self.st.reasons.insert(RumorReason::SidMapUpdate);
                self.ack();
            }
            extended::REMOTE_STATUS => {
                let target = arg2 & SID_MASK;
                if self.st.sid_map.contains(target) {
                    self.st.targets.status_request = target;
                    self.st.reasons.insert(RumorReason::StatusRequest);
                    self.st.map_msg_type = arg3;
                    self.ack();
                } else {
                    self.nack();
                }
            }
            extended::REMOTE_MAP => {
                let target = arg2 & SID_MASK;
                if self.st.sid_map.contains(target) {
                    self.st.targets.map_request = target;
                    self.st.reasons.insert(RumorReason::MapRequest);
                    self.st.map_msg_type = arg3;
                    self.ack();
                } else {
                    self.nack();
                }
            }
            extended::BUTTON_PRESS => {
                self.ack();
                self.button = arg2;
            }
            extended::SD_RUMOR_TARGET => {
                let target = if arg2 <= SID_MASK { arg2 } else { NULL_SID };
                self.st.targets.sd_rumor = target;
                let reasons = self.st.reasons.bits();
                self.reply(&[
                    spimsg::EXTENDED_RESPONSE,
                    extended::SD_RUMOR_TARGET,
                    target,
                    (reasons >> 8) as u8,
                    (reasons & 0xFF) as u8,
                ]);
            }
            other => {
                debug!("Unknown extended option {:#04x}", other);
                self.nack();
            }
        }
    }

    /// `E8 <test>`, only while the manufacturing stamp is absent.
    fn production_test(&mut self, test: u8) -> Result<(), EngineError> {
        match test {
            prod_test::VERSION => {
                self.reply(&[spimsg::PROD_TEST_RESPONSE, PROD_TEST_VERSION_OK]);
            }
            prod_test::CONTINUOUS_TX => {
                self.ack();
                self.continuous_transmit()?;
            }
            prod_test::LOOPBACK => self.ack(),
            prod_test::RESERVED_MESH => {
                self.ack();
                self.join_reserved_mesh();
            }
            other => {
                debug!("Unknown production test {}", other);
                self.nack();
            }
        }
        Ok(())
    }

    /// Put the node on the reserved test mesh for a few minutes.
    fn join_reserved_mesh(&mut self) {
        info!("Joining reserved test mesh");
        self.st.keys = [RESERVED_KEY; 3];
        self.st.sid = 1;
        self.st.sid_map = SidMap::from_bytes([0xFF, 0, 0, 0, 0, 0, 0, 0]);
        self.st.minute = 0;
        self.st.minute_sys_time = 0;
        self.reset_sys_time();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::HostLink;
    use crate::config::{MemoryStore, NodeConfig, RmStore};
    use crate::mesh::LearnState;
    use crate::sim::{self, SimAir, SimClock, SimRadio};
    use wisafe_rs_esp32_macros::esp32_test;

    fn engine() -> (MeshEngine<SimRadio, SimClock>, HostLink) {
        let store = RmStore::new(Box::new(MemoryStore::new()));
        let gw = sim::gateway(&NodeConfig::default(), SimAir::new(), store);
        (gw.engine, gw.host)
    }

    fn join(engine: &mut MeshEngine<SimRadio, SimClock>) {
        let st = engine.state_mut();
        st.sid = 3;
        st.keys = [0x05, 0x12, 0x34];
        st.sid_map = SidMap::from_bytes([0b1000_1000, 0, 0, 0, 0, 0, 0, 0]);
    }

    fn reply(host: &mut HostLink) -> Vec<u8> {
        host.try_recv().unwrap().unwrap().as_slice().to_vec()
    }

    fn run(engine: &mut MeshEngine<SimRadio, SimClock>, payload: &[u8]) {
        let msg = crate::bridge::HostMessage::new(payload).unwrap();
        let cmd = HostCommand::classify(&msg, false).unwrap();
        engine.process_command(cmd).unwrap();
    }

    #[esp32_test]
    fn test_transparent_stages_sd_rumor() {
        let (mut engine, mut host) = engine();
        run(&mut engine, &[0x12, 0x34, 0x56]);
        assert_eq!(reply(&mut host), vec![spimsg::ACK]);
        let st = engine.state();
        assert!(st.reasons.contains(RumorReason::SdRumor));
        assert_eq!(st.pass_thru_len, 3);
        assert_eq!(&st.pass_thru[..3], &[0x12, 0x34, 0x56]);
    }

    #[esp32_test]
    fn test_unit_test_is_not_acked() {
        let (mut engine, mut host) = engine();
        run(&mut engine, &[spimsg::UNIT_TEST, 1, 2, 3, 4, 5]);
        assert!(engine.state().reasons.contains(RumorReason::SdRumor));
        assert_eq!(host.try_recv().unwrap(), None);
    }

    #[esp32_test]
    fn test_diagnostic_and_id() {
        let (mut engine, mut host) = engine();
        join(&mut engine);
        run(&mut engine, &[spimsg::DIAG_REQ]);
        let diag = reply(&mut host);
        assert_eq!(diag.len(), 13);
        assert_eq!(diag[0], spimsg::DIAG_RESULT);
        assert_eq!(diag[11], 3);
        assert_eq!(diag[12], 7);

        run(&mut engine, &[spimsg::ID_REQ]);
        assert_eq!(
            reply(&mut host),
            vec![spimsg::ID_RESPONSE, 0, 0, 0, 0x05, 0x12, 0x34]
        );
    }

    #[esp32_test]
    fn test_clear_respects_mfct_stamp() {
        let (mut engine, mut host) = engine();
        join(&mut engine);
        engine.store_mut().set_mfct().unwrap();
        run(&mut engine, &[spimsg::CLEAR_CMD]);
        assert_eq!(reply(&mut host), vec![spimsg::NACK]);
        assert!(engine.state().is_joined());

        run(&mut engine, &[spimsg::MFCT_MODE, b'M', b'F', b'T']);
        run(&mut engine, &[spimsg::CLEAR_CMD]);
        assert_eq!(reply(&mut host), vec![spimsg::ACK]);
        assert!(!engine.state().is_joined());
    }

    #[esp32_test]
    fn test_sidmap_query_and_update() {
        let (mut engine, mut host) = engine();
        join(&mut engine);
        run(&mut engine, &[spimsg::EXTENDED_REQ, extended::SIDMAP]);
        assert_eq!(
            reply(&mut host),
            vec![0xD4, 0x03, 0b1000_1000, 0, 0, 0, 0, 0, 0, 0]
        );

        run(
            &mut engine,
            &[spimsg::EXTENDED_REQ, extended::SIDMAP_UPDATE, 0x08, 0, 0, 0, 0, 0, 0, 0],
        );
        assert_eq!(reply(&mut host), vec![spimsg::ACK]);
        let st = engine.state();
        assert!(st.reasons.contains(RumorReason::SidMapUpdate));
        assert_eq!(st.new_sid_map, SidMap::single(3));
    }

    #[esp32_test]
    fn test_remote_status_needs_member() {
        let (mut engine, mut host) = engine();
        join(&mut engine);
        run(&mut engine, &[spimsg::EXTENDED_REQ, extended::REMOTE_STATUS, 9, 0]);
        assert_eq!(reply(&mut host), vec![spimsg::NACK]);

        run(&mut engine, &[spimsg::EXTENDED_REQ, extended::REMOTE_STATUS, 0x80 | 7, 2]);
        assert_eq!(reply(&mut host), vec![spimsg::ACK]);
        let st = engine.state();
        assert_eq!(st.targets.status_request, 7);
        assert_eq!(st.map_msg_type, 2);
        assert!(st.reasons.contains(RumorReason::StatusRequest));
    }

    #[esp32_test]
    fn test_sd_rumor_target_reports_reasons() {
        let (mut engine, mut host) = engine();
        engine.state_mut().reasons.insert(RumorReason::PropagateRumor);
        run(&mut engine, &[spimsg::EXTENDED_REQ, extended::SD_RUMOR_TARGET, 7]);
        assert_eq!(reply(&mut host), vec![0xD4, 0x1A, 7, 0x01, 0x00]);
        assert_eq!(engine.state().targets.sd_rumor, 7);

        run(&mut engine, &[spimsg::EXTENDED_REQ, extended::SD_RUMOR_TARGET, 0x55]);
        assert_eq!(reply(&mut host)[2], NULL_SID);
    }

    #[esp32_test]
    fn test_button_press_is_deferred() {
        let (mut engine, mut host) = engine();
        run(&mut engine, &[spimsg::EXTENDED_REQ, extended::BUTTON_PRESS, 0x65]);
        assert_eq!(reply(&mut host), vec![spimsg::ACK]);
        assert_eq!(engine.button, 0x65);
    }

    #[esp32_test]
    fn test_short_and_unknown_extended_nack() {
        let (mut engine, mut host) = engine();
        run(&mut engine, &[spimsg::EXTENDED_REQ]);
        assert_eq!(reply(&mut host), vec![spimsg::NACK]);
        run(&mut engine, &[spimsg::EXTENDED_REQ, 0x42]);
        assert_eq!(reply(&mut host), vec![spimsg::NACK]);
    }

    #[esp32_test]
    fn test_alarm_ident_updates_identity() {
        let (mut engine, mut host) = engine();
        run(&mut engine, &[spimsg::ALARM_IDENT, 9, 8, 7, 6, 5, 0]);
        assert_eq!(reply(&mut host), vec![spimsg::NACK]);
        assert_eq!(engine.state().gateway_id, [9, 8, 7]);
        assert_eq!(engine.state().sd_model, [6, 5]);
    }

    #[esp32_test]
    fn test_production_tests() {
        let (mut engine, mut host) = engine();
        run(&mut engine, &[spimsg::PROD_TEST_CMD, 1]);
        assert_eq!(reply(&mut host), vec![spimsg::PROD_TEST_RESPONSE, 0x01]);
        run(&mut engine, &[spimsg::PROD_TEST_CMD, 6]);
        assert_eq!(reply(&mut host), vec![spimsg::ACK]);
        run(&mut engine, &[spimsg::PROD_TEST_CMD, 0]);
        assert_eq!(reply(&mut host), vec![spimsg::NACK]);

        run(&mut engine, &[spimsg::PROD_TEST_CMD, 7]);
        assert_eq!(reply(&mut host), vec![spimsg::ACK]);
        let st = engine.state();
        assert_eq!(st.keys, [RESERVED_KEY; 3]);
        assert_eq!(st.sid, 1);
        assert!(st.sid_map.contains(7));
        assert_eq!(engine.learn_state(), LearnState::Inactive);
    }

    #[esp32_test]
    fn test_production_test_refused_when_stamped() {
        let (mut engine, mut host) = engine();
        run(&mut engine, &[spimsg::OPER_MODE, b'O', b'P', b'R']);
        run(&mut engine, &[spimsg::PROD_TEST_CMD, 1]);
        assert_eq!(reply(&mut host), vec![spimsg::NACK]);
    }
}
