//! The mesh main loop.
//!
//! [`MeshEngine`] owns the protocol state, the radio link, the persisted
//! record and the mesh end of the host link. The scheduler calls
//! [`MeshEngine::main_loop`] once per tick; everything below that call is
//! single-threaded.
//!
//! A pass runs these steps in order:
//! 1. minute tracking and neighbour-check scheduling
//! 2. one host command
//! 3. a pending button press (learn or unlearn)
//! 4. confirmation expiry
//! 5. building the highest-priority rumor
//! 6. the chirp phase, which may receive a neighbour's rumor
//! 7. the listen phase, which spreads or propagates our own rumor
//! 8. the host-bound report, radio sleep and stats
//!
//! Radio and storage failures are logged at the step that hit them and the
//! pass carries on. Protocol failures only ever show up as state changes.

use super::fsm::{self, Phase, WindowOutcome};
use super::link::{RadioLink, ReceivedRumor};
use super::reason::RumorReason;
use super::state::*;
use crate::bridge::{extended, spimsg, HostCommand, MeshPort};
use crate::codec::consts::{msg, NULL_SID};
use crate::codec::{FrameKeys, SidMap};
use crate::config::{ConfigError, NodeConfig, RmStore};
use crate::radio::{Clock, RadioError, SysTicks, Transceiver};
use crate::status::MeshStats;
use log::{debug, error, info, warn};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

/// Passes a host command may stay pending before it is dropped.
pub(super) const COMMAND_TIMEOUT_PASSES: u8 = 3;
/// Minutes a node may run on the reserved test keys.
const RESERVED_MESH_MINUTES: u32 = 3;

/// Button value that joins a mesh.
pub const CMD_LEARN: u8 = 0x01;
/// Button value that leaves the mesh.
pub const CMD_UNLEARN: u8 = 0x65;
/// Set when the press came from the on-board button rather than the host.
pub const ON_BOARD_BUTTON: u8 = 0x80;

/// Failure inside one main-loop step.
#[derive(Debug)]
pub enum EngineError {
    Radio(RadioError),
    Config(ConfigError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Radio(e) => write!(f, "radio: {}", e),
            EngineError::Config(e) => write!(f, "config: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Radio(e) => Some(e),
            EngineError::Config(e) => Some(e),
        }
    }
}

impl From<RadioError> for EngineError {
    fn from(e: RadioError) -> Self {
        EngineError::Radio(e)
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

/// One gateway on the mesh.
pub struct MeshEngine<R, C> {
    pub(super) st: MeshState,
    pub(super) link: RadioLink<R, C>,
    pub(super) store: RmStore,
    pub(super) port: MeshPort,
    pub(super) stats: Arc<MeshStats>,
    phase: Phase,
    sys_ticks: Cell<SysTicks>,
    /// Host command waiting to be processed.
    pending: Option<HostCommand>,
    command_timeout: u8,
    /// Simulated button press, set by `D3 12`.
    pub(super) button: u8,
}

impl<R: Transceiver, C: Clock> MeshEngine<R, C> {
    pub fn new(link: RadioLink<R, C>, store: RmStore, port: MeshPort, config: &NodeConfig) -> Self {
        let stats = link.stats().clone();
        Self {
            st: MeshState::new(config.gateway_id, config.scramble),
            link,
            store,
            port,
            stats,
            phase: Phase::Idle,
            sys_ticks: Cell::new(SysTicks::default()),
            pending: None,
            command_timeout: 0,
            button: 0,
        }
    }

    pub fn state(&self) -> &MeshState {
        &self.st
    }

    pub fn state_mut(&mut self) -> &mut MeshState {
        &mut self.st
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn learn_state(&self) -> LearnState {
        self.st.learn_state
    }

    pub fn stats(&self) -> &Arc<MeshStats> {
        &self.stats
    }

    pub fn link_mut(&mut self) -> &mut RadioLink<R, C> {
        &mut self.link
    }

    pub fn store_mut(&mut self) -> &mut RmStore {
        &mut self.store
    }

    /// Queue a button press for the next pass.
    pub fn press_button(&mut self, value: u8) {
        self.button = value;
    }

    /// System ticks (125 ms) since the last time reset.
    pub fn sys_time(&self) -> u32 {
        let mut ticks = self.sys_ticks.get();
        let now = ticks.update(self.link.clock().counts());
        self.sys_ticks.set(ticks);
        now
    }

    pub(super) fn reset_sys_time(&mut self) {
        let start = SysTicks::starting_at(self.link.clock().counts());
        self.sys_ticks.set(start);
    }

    /// Bring up the radio and restore the persisted mesh.
    pub fn init(&mut self) {
        if let Err(e) = self.link.init() {
            error!("Radio init failed: {}", e);
        }
        self.st.targets = Targets::default();

        match self.store.restore_mesh_info() {
            Ok(Some(info)) => {
                self.st.apply_mesh_info(&info);
                if self.st.is_joined() {
                    info!(
                        "Restored mesh {}: SID {}, {} members",
                        self.st.mesh_id(),
                        self.st.sid,
                        self.st.sid_map.count()
                    );
                } else {
                    info!("Stored record is unjoined");
                }
            }
            Ok(None) => {
                warn!("No valid mesh record, starting unjoined");
                self.leave_mesh();
            }
            Err(e) => {
                error!("Reading mesh record failed: {}", e);
                self.st.forget_mesh();
            }
        }
        self.reset_sys_time();

        match self.store.freq_frac() {
            Ok(Some((frac2, frac3))) => {
                info!("Applying frequency calibration {:#04x}/{:#04x}", frac2, frac3);
                if let Err(e) = self.link.apply_calibration(frac2, frac3) {
                    error!("Applying calibration failed: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => error!("Reading calibration failed: {}", e),
        }
        self.stats.update(&self.st);
    }

    /// One main-loop pass.
    pub fn main_loop(&mut self) {
        self.stats.record_pass();
        self.track_minutes();

        if let Err(e) = self.poll_host() {
            error!("Host command failed: {}", e);
        }
        if let Err(e) = self.handle_button() {
            error!("Button handling failed: {}", e);
        }
        self.expire_confirmation();

        let previous_seq = self.st.rumor_seq;
        if !self.st.reasons.is_empty() {
            self.start_reason_rumor();
        }

        if self.st.is_joined() {
            if let Err(e) = self.chirp_phase(previous_seq) {
                error!("Chirp phase failed: {}", e);
            }
        }
        if let Err(e) = self.listen_phase() {
            error!("Listen phase failed: {}", e);
        }

        if let Some(report) = self.st.outgoing.take() {
            self.reply(&report);
        }
        if let Err(e) = self.link.sleep() {
            error!("Radio sleep failed: {}", e);
        }
        self.phase = Phase::Idle;
        self.stats.update(&self.st);
    }

    fn track_minutes(&mut self) {
        if !self.st.is_joined() {
            return;
        }
        let now = self.sys_time();
        if now.wrapping_sub(self.st.minute_sys_time) <= MINUTE_SYS_TIME_COUNT {
            return;
        }
        self.st.minute_sys_time = now;
        self.st.minute += 1;

        if self.st.minute >= RESERVED_MESH_MINUTES && self.on_reserved_keys() {
            info!("Test mesh time is up, leaving");
            self.reset_to_unjoined();
            return;
        }
        self.schedule_neighbour_check();
    }

    fn on_reserved_keys(&self) -> bool {
        self.st.keys == [crate::codec::consts::RESERVED_KEY; 3]
    }

    fn schedule_neighbour_check(&mut self) {
        let sid = u32::from(self.st.sid);
        let elapsed = self.st.minute.wrapping_sub(self.st.check_nbrs_minute);
        let due = if self.st.check_nbrs_count < CHECK_NBRS_FREQUENT {
            elapsed >= CHECK_NBRS_SHORT_INTERVAL + sid
        } else {
            elapsed >= CHECK_NBRS_LONG_INTERVAL + sid
        };
        if !due {
            return;
        }
        self.st.check_nbrs_minute = self.st.minute;
        if self.st.check_nbrs_count < CHECK_NBRS_FREQUENT {
            self.st.check_nbrs_count += 1;
        }
        debug!("Neighbour check due at minute {}", self.st.minute);
        self.st.reasons.insert(RumorReason::CheckNbrs);
    }

    /// Take one host command off the queue and run it.
    ///
    /// A command waits while the host has no room for a reply and is
    /// dropped after [`COMMAND_TIMEOUT_PASSES`] passes.
    fn poll_host(&mut self) -> Result<(), EngineError> {
        if self.pending.is_none() {
            self.command_timeout = 0;
            self.pending = self.next_command();
        }
        let Some(cmd) = self.pending else {
            return Ok(());
        };
        if !self.port.reply_ready() {
            self.command_timeout += 1;
            if self.command_timeout >= COMMAND_TIMEOUT_PASSES {
                error!("Dropping host command {:?}, host not reading replies", cmd);
                self.pending = None;
                self.command_timeout = 0;
            }
            return Ok(());
        }
        self.pending = None;
        self.process_command(cmd)
    }

    fn handle_button(&mut self) -> Result<(), EngineError> {
        let button = std::mem::take(&mut self.button);
        if button == 0 {
            return Ok(());
        }
        let from_host = button & ON_BOARD_BUTTON == 0;

        match button & !ON_BOARD_BUTTON {
            CMD_UNLEARN => {
                info!("Unlearning gateway");
                self.reset_to_unjoined();
                if from_host {
                    self.ack();
                }
                self.st.learn_state = LearnState::Unlearnt;
            }
            CMD_LEARN if !self.st.is_joined() => {
                info!("Learning gateway in");
                self.st.learn_state = LearnState::Active;
                self.stats.update(&self.st);
                let joined = self.join_network().inspect_err(|_| {
                    self.st.learn_state = LearnState::Inactive;
                })?;
                if joined {
                    if from_host {
                        self.ack();
                    }
                    self.st.learn_state = LearnState::Joined;
                } else {
                    info!("No mesh answered");
                    self.st.learn_state = LearnState::Inactive;
                }
            }
            other => debug!("Ignoring button value {:#04x}", other),
        }
        Ok(())
    }

    fn expire_confirmation(&mut self) {
        if let Some(pending) = self.st.confirmation {
            if self.sys_time().wrapping_sub(pending.since) > CONFIRMATION_TIMEOUT {
                debug!("Confirmation for {:#04x} timed out", pending.msg);
                self.st.confirmation = None;
            }
        }
    }

    /// Try to join a mesh for up to five seconds.
    ///
    /// On success the advertised SID, keys and SID map are adopted and
    /// persisted, and a JOINED rumor is queued.
    pub fn join_network(&mut self) -> Result<bool, EngineError> {
        self.st.reset_keys();
        let Some(ack) = self.link.join(&self.st)? else {
            return Ok(false);
        };

        self.st.sid = ack.sid;
        self.st.sid_map = ack.sid_map;
        let announce = FrameKeys {
            sid: ack.sid,
            keys: [0; 3],
            scramble: self.st.scramble,
        };
        self.link.confirm_join(&announce)?;

        self.st.keys = ack.keys;
        self.st.nbr_map = SidMap::single(ack.sender);
        self.st.reasons.insert(RumorReason::Joined);
        self.save_mesh();
        info!(
            "Joined mesh {} as SID {} via {}",
            self.st.mesh_id(),
            ack.sid,
            ack.sender
        );
        Ok(true)
    }

    /// Build the rumor for the highest-priority pending reason.
    pub fn start_reason_rumor(&mut self) {
        let Some(reason) = self.st.reasons.highest_priority() else {
            return;
        };
        self.st.current = Some(reason);
        if reason.reuses_buffer() {
            self.st.reload_rumor();
            return;
        }

        self.st.rumor_map = self.st.sid_map;
        self.st.rumor_map.clear(self.st.sid);

        let msg_type = match reason {
            RumorReason::StatusReply => {
                self.st.build(msg::STATUSREPLY);
                self.st.rumor_map = SidMap::single(self.st.targets.status_reply);
                msg::STATUSREPLY
            }
            RumorReason::StatusRequest => {
                let target = self.st.targets.status_request;
                if self.st.map_msg_type == 0 {
                    self.st.build_targeted(msg::STATUSREQ, target);
                    self.expect_confirmation(msg::STATUSREQ);
                } else {
                    self.st.pass_thru = [0; 9];
                    self.st.pass_thru[0] = spimsg::DO_EXDIG_ID;
                    self.st.pass_thru_len = 4;
                    self.st.build(msg::SD_RUMOR);
                }
                self.st.rumor_map = SidMap::single(target);
                msg::STATUSREQ
            }
            RumorReason::MapReply => {
                self.st.build(msg::MAPREPLY);
                self.st.rumor_map = SidMap::single(self.st.targets.map_reply);
                msg::MAPREPLY
            }
            RumorReason::MapRequest => {
                let target = self.st.targets.map_request;
                self.st.build_targeted(msg::MAPREQ, target);
                self.st.rumor_map = SidMap::single(target);
                msg::MAPREQ
            }
            RumorReason::SdRumor => {
                self.st.build(msg::SD_RUMOR);
                let target = std::mem::replace(&mut self.st.targets.sd_rumor, NULL_SID);
                if target != NULL_SID {
                    self.st.rumor_map = SidMap::single(target);
                }
                msg::SD_RUMOR
            }
            RumorReason::CheckNbrs | RumorReason::SniffNbrs => {
                // Nobody is a target; our own bit keeps the window open.
                self.st.build(msg::JOINED);
                self.st.rumor_map = SidMap::single(self.st.sid);
                msg::JOINED
            }
            RumorReason::Joined => {
                self.st.build(msg::JOINED);
                msg::JOINED
            }
            RumorReason::SidMapUpdate => {
                self.st.build(msg::SIDMAP_UPDATE);
                self.expect_confirmation(msg::SIDMAP_UPDATE);
                msg::SIDMAP_UPDATE
            }
            RumorReason::PropagateRumor | RumorReason::SpreadRumor => return,
        };
        self.st.start_rumor(msg_type);
        debug!(
            "Starting {} rumor {:#04x} seq {} to {}",
            reason, msg_type, self.st.rumor.seq, self.st.rumor_map
        );
    }

    fn expect_confirmation(&mut self, msg: u8) {
        self.st.confirmation = Some(PendingConfirmation {
            msg,
            since: self.sys_time(),
        });
    }

    fn long_chirp_due(&mut self) -> bool {
        if self.st.short_chirp_count < SHORT_CHIRP_COUNT || self.st.current.is_some() {
            self.st.short_chirp_count = self.st.short_chirp_count.saturating_add(1);
            false
        } else {
            self.st.short_chirp_count = 0;
            true
        }
    }

    /// Chirp until nobody answers, our rumor is lost, or five chirps went
    /// out.
    fn chirp_phase(&mut self, previous_seq: u8) -> Result<(), EngineError> {
        let original = self.st.current;
        let mut attempt = 0u8;
        loop {
            if attempt != 0 {
                self.link.clock_mut().delay_ms(1);
            }
            self.phase = Phase::Chirping { attempt };
            let long = self.long_chirp_due();
            if let Some(rumor) = self.link.chirp_to_receive(&mut self.st, long)? {
                self.dispatch_rumor(&rumor);
            }
            attempt += 1;
            if self.st.current.is_none() || attempt >= CHIRP_ATTEMPTS {
                break;
            }
        }

        if original.is_some() && original != self.st.current {
            // The rumor was put aside, so its sequence number is unused.
            self.st.rumor_seq = previous_seq;
        }
        Ok(())
    }

    /// Offer the current rumor to chirping neighbours until the listen
    /// window runs out.
    fn listen_phase(&mut self) -> Result<(), EngineError> {
        if self.st.current.is_none() {
            return Ok(());
        }
        self.st.reload_rumor();
        self.st.listen_time_left = LISTEN_DURATION;

        while self.st.listen_time_left > 0 {
            let started = self.sys_time();
            if let Some(reason) = self.st.current {
                self.phase = Phase::listen(reason, self.st.propagation_count);
                let left = self.st.listen_time_left;
                self.link.listen_to_transmit(&mut self.st, left)?;
            }
            let spent = self.sys_time().wrapping_sub(started);

            let left = u32::from(self.st.listen_time_left);
            if left > spent {
                self.st.listen_time_left = (left - spent.max(1)) as u16;
            } else {
                self.st.listen_time_left = 0;
                self.close_window();
            }
        }
        Ok(())
    }

    fn close_window(&mut self) {
        let Some(current) = self.st.current else {
            return;
        };
        let attempts = if current == RumorReason::PropagateRumor {
            self.st.propagation_count += 1;
            self.st.propagation_count
        } else {
            self.st.reasons.remove(current);
            0
        };

        let outcome = fsm::window_closed(current, self.st.rumor_map.any(), attempts);
        debug!("Window closed for {}: {:?}", current, outcome);
        match outcome {
            WindowOutcome::ProbeDone => self.st.current = None,
            WindowOutcome::StartPropagation => {
                self.st.reasons.insert(RumorReason::PropagateRumor);
                self.st.propagate_map = self.st.sid_map;
                self.st.propagation_count = 0;
                self.st.reload_rumor();
                self.st.listen_time_left = LISTEN_DURATION;
                self.st.current = Some(RumorReason::PropagateRumor);
            }
            WindowOutcome::RetryPropagation => {
                self.st.current = None;
                self.st.reload_rumor();
            }
            WindowOutcome::Retire => {
                self.st.current = None;
                self.generate_confirmation();
            }
            WindowOutcome::Abandon => {
                warn!(
                    "Abandoning rumor {:#04x}, still missing {}",
                    self.st.rumor.msg, self.st.rumor_map
                );
                self.st.reasons.remove(RumorReason::PropagateRumor);
                self.st.current = None;
                self.generate_confirmation();
            }
        }
    }

    /// Tell the initiator how a confirmable rumor went.
    pub fn generate_confirmation(&mut self) {
        if self.st.rumor.msg & msg::CONFIRM_BIT == 0 {
            return;
        }
        if self.st.rumor.initiator == self.st.sid {
            let (missing, ttl) = (self.st.rumor_map, self.st.rumor.ttl);
            self.process_confirmation(missing, ttl);
            return;
        }

        self.st.current = Some(RumorReason::SpreadRumor);
        self.st.reasons.insert(RumorReason::SpreadRumor);
        self.st.listen_time_left = LISTEN_DURATION;
        self.st.build(msg::CONFIRM);
        self.st.rumor_map = SidMap::single(self.st.rumor.initiator);
        self.st.start_rumor(msg::CONFIRM);
    }

    /// Report a confirmation to the host. `missing` holds the nodes the
    /// rumor never reached.
    pub fn process_confirmation(&mut self, missing: SidMap, ttl: u8) {
        let expected = self.st.confirmation.take();
        let Some(pending) = expected else {
            debug!("Unexpected confirmation");
            return;
        };
        if pending.msg == msg::STATUSREQ && missing.is_empty() {
            // The status reply will tell the host.
            return;
        }

        if !self.st.outgoing.is_pending() {
            let mut report = [0u8; 11];
            report[0] = spimsg::EXTENDED_RESPONSE;
            report[1] = extended::MISSING_MAP;
            report[2] = ttl;
            report[3..].copy_from_slice(&missing.bytes());
            self.st.outgoing.set(&report);
        }
        if pending.msg == msg::SIDMAP_UPDATE {
            let new_map = self.st.new_sid_map;
            self.sid_map_update(new_map);
        }
    }

    /// Apply an authoritative membership map.
    ///
    /// Members absent from `new_map` are forgotten. A node that finds
    /// itself removed, or alone, leaves the mesh. The record is always
    /// rewritten.
    pub fn sid_map_update(&mut self, new_map: SidMap) {
        if !self.st.is_joined() || !new_map.contains(self.st.sid) {
            warn!("Removed from the mesh by SID map update");
            self.leave_mesh();
            self.st.learn_state = LearnState::Unlearnt;
        }

        let mut others = false;
        for id in 0..MAX_MESH_SIZE {
            if self.st.sid_map.contains(id) && !new_map.contains(id) {
                self.st.sid_map.clear(id);
                self.st.nbr_map.clear(id);
            }
            if id != self.st.sid && new_map.contains(id) {
                others = true;
            }
        }
        if !others {
            warn!("No other mesh members left");
            self.leave_mesh();
            self.st.learn_state = LearnState::Unlearnt;
        }
        self.save_mesh();
    }

    /// Act on a rumor received after a chirp.
    fn dispatch_rumor(&mut self, rumor: &ReceivedRumor) {
        let initiator = rumor.initiator();
        if initiator == self.st.sid {
            return;
        }
        let raw = rumor.bytes();
        let sender = rumor.sender();
        let fresh = !rumor.old_news();
        debug!(
            "Rumor {:#04x} from {} via {}{}",
            rumor.msg(),
            initiator,
            sender,
            if fresh { "" } else { " (old news)" }
        );

        match rumor.msg() {
            msg::JOINED => {
                if !self.st.sid_map.contains(initiator) {
                    info!("SID {} joined the mesh", initiator);
                    self.st.sid_map.set(initiator);
                }
                self.save_mesh();
                if fresh && !self.st.outgoing.is_pending() {
                    self.st.outgoing.set(&[
                        spimsg::EXTENDED_RESPONSE,
                        extended::REMOTE_ID,
                        initiator,
                        raw[ReceivedRumor::MAP_OFFSET + 7],
                        raw[5],
                        raw[6],
                    ]);
                }
            }
            msg::SIDMAP_UPDATE => {
                self.sid_map_update(rumor.map());
                if fresh && !self.st.outgoing.is_pending() {
                    let mut report = [0u8; 10];
                    report[0] = spimsg::EXTENDED_RESPONSE;
                    report[1] = extended::SIDMAP_UPDATE;
                    report[2..].copy_from_slice(&self.st.sid_map.bytes());
                    self.st.outgoing.set(&report);
                }
                return;
            }
            msg::SD_RUMOR => {
                if fresh {
                    let mut report = [0u8; 11];
                    report[..8].copy_from_slice(&rumor.map().bytes());
                    report[8] = raw[5];
                    let len = usize::from(raw[6]).min(9);
                    report[len] = initiator;
                    report[len + 1] = rumor.seq();
                    self.st.outgoing.set(&report[..len + 2]);
                }
            }
            msg::STATUSREQ if rumor.byte5() == self.st.sid => {
                self.st.reasons.insert(RumorReason::StatusReply);
                self.st.targets.status_reply = initiator;
            }
            msg::MAPREQ if rumor.byte5() == self.st.sid => {
                self.st.reasons.insert(RumorReason::MapReply);
                self.st.targets.map_reply = initiator;
                self.st.map_msg_type = rumor.byte6();
            }
            msg::MAPREPLY => {
                if !self.st.outgoing.is_pending() {
                    let mut report = [0u8; 13];
                    report[0] = spimsg::EXTENDED_RESPONSE;
                    report[1] = extended::REMOTE_MAP;
                    report[2] = raw[6];
                    report[3..11].copy_from_slice(&rumor.map().bytes());
                    report[11] = initiator;
                    report[12] = rumor.seq();
                    self.st.outgoing.set(&report);
                }
            }
            msg::STATUSREPLY => {
                if !self.st.outgoing.is_pending() {
                    let mut report = [0u8; 13];
                    report[0] = spimsg::EXTENDED_RESPONSE;
                    report[1] = extended::REMOTE_STATUS;
                    report[2] = initiator;
                    report[3] = raw[5];
                    report[4] = raw[6];
                    report[5..].copy_from_slice(rumor.raw_map());
                    self.st.outgoing.set(&report);
                }
            }
            msg::CONFIRM => self.process_confirmation(rumor.map(), rumor.byte5()),
            other => {
                debug!("Ignoring rumor type {:#04x}", other);
                return;
            }
        }
        self.st.note_neighbour(sender);
    }

    /// Erase the record and forget the mesh identity.
    pub(super) fn leave_mesh(&mut self) {
        if let Err(e) = self.store.reset() {
            error!("Erasing mesh record failed: {}", e);
        }
        self.st.forget_mesh();
    }

    /// Leave the mesh and restart the system time, as after a clear.
    pub(super) fn reset_to_unjoined(&mut self) {
        self.leave_mesh();
        self.reset_sys_time();
    }

    pub(super) fn save_mesh(&mut self) {
        if let Err(e) = self.store.save_mesh_info(&self.st.mesh_info()) {
            error!("Saving mesh record failed: {}", e);
        }
    }

    /// Queue a reply. The port logs a dropped one.
    pub(super) fn reply(&self, payload: &[u8]) {
        let _ = self.port.reply(payload);
    }

    pub(super) fn ack(&self) {
        self.reply(&[spimsg::ACK]);
    }

    pub(super) fn nack(&self) {
        self.reply(&[spimsg::NACK]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::HostLink;
    use crate::bridge::{ESC, FLAG};
    use crate::codec::consts::{DITHER, FRAME_MARKER, JOIN_ACK_LEN, MSG_LEN_LONG, OK_LEN, RUMOR_LEN};
    use crate::codec::RumorFields;
    use crate::config::{MemoryStore, MeshInfo};
    use crate::radio::{prop, ChipState, COUNTS_PER_SYS_TICK};
    use crate::sim::{self, Peer, SimAir, SimGateway};
    use wisafe_rs_esp32_macros::esp32_test;

    const KEYS: [u8; 3] = [0x05, 0x12, 0x34];
    const OUR_SID: u8 = 3;

    fn gateway_with(config: &NodeConfig, store: MemoryStore) -> SimGateway {
        sim::gateway(config, SimAir::new(), RmStore::new(Box::new(store)))
    }

    fn gateway() -> SimGateway {
        gateway_with(&NodeConfig::default(), MemoryStore::new())
    }

    /// A gateway already in mesh `KEYS` as SID 3 alongside `members`.
    fn joined(members: &[u8]) -> SimGateway {
        let mut gw = gateway();
        let st = gw.engine.state_mut();
        st.sid = OUR_SID;
        st.keys = KEYS;
        st.sid_map = SidMap::single(OUR_SID);
        for &id in members {
            st.sid_map.set(id);
        }
        gw.engine.save_mesh();
        gw
    }

    fn map_of(ids: &[u8]) -> SidMap {
        let mut map = SidMap::EMPTY;
        for &id in ids {
            map.set(id);
        }
        map
    }

    fn reply(host: &mut HostLink) -> Option<Vec<u8>> {
        host.try_recv().unwrap().map(|m| m.as_slice().to_vec())
    }

    fn advance_ticks(gw: &SimGateway, ticks: u32) {
        gw.clock.advance(ticks * COUNTS_PER_SYS_TICK);
    }

    #[esp32_test]
    fn test_init_restores_record_and_calibration() {
        let store = MemoryStore::new();
        let mut rm = RmStore::new(Box::new(store.clone()));
        rm.save_mesh_info(&MeshInfo {
            sid: 4,
            keys: KEYS,
            sid_map: map_of(&[4, 6]),
            gateway_id: [7, 8, 9],
            sd_model: [0, 0],
        })
        .unwrap();
        rm.save_freq_frac(0x18, 0xE9).unwrap();

        let gw = gateway_with(&NodeConfig::default(), store);
        let st = gw.engine.state();
        assert!(st.is_joined());
        assert_eq!(st.sid, 4);
        assert_eq!(st.gateway_id, [7, 8, 9]);
        assert_eq!(
            gw.chip.property(prop::FREQ_CONTROL_GROUP, prop::FREQ_CONTROL_FRAC2),
            Some(0x18)
        );
    }

    #[esp32_test]
    fn test_init_without_record_is_unjoined() {
        let gw = gateway();
        assert!(!gw.engine.state().is_joined());
        assert_eq!(gw.engine.state().sid, NULL_SID);
        assert_eq!(gw.engine.learn_state(), LearnState::Inactive);
    }

    #[esp32_test]
    fn test_join_via_host_button() {
        let mut gw = gateway();
        let peer = Peer::new(2, KEYS);
        peer.invite(&gw.air);
        peer.join_ack(&gw.air, 9, SidMap::single(2));

        gw.host
            .send(&[spimsg::EXTENDED_REQ, extended::BUTTON_PRESS, CMD_LEARN])
            .unwrap();
        gw.engine.main_loop();

        assert_eq!(reply(&mut gw.host), Some(vec![spimsg::ACK]));
        assert_eq!(reply(&mut gw.host), Some(vec![spimsg::ACK]));
        assert_eq!(gw.engine.learn_state(), LearnState::Joined);

        let st = gw.engine.state();
        assert_eq!(st.sid, 9);
        assert_eq!(st.keys, KEYS);
        assert!(st.sid_map.contains(9));
        assert!(st.sid_map.contains(2));
        assert!(st.nbr_map.contains(2));

        // The new SID is announced with five OKs.
        let oks = gw
            .air
            .sent()
            .iter()
            .filter(|f| f.payload.len() == OK_LEN && f.payload[5] == 9)
            .count();
        assert_eq!(oks, 5);

        let info = gw.engine.store_mut().restore_mesh_info().unwrap().unwrap();
        assert_eq!(info.sid, 9);
        assert_eq!(info.keys, KEYS);
    }

    #[esp32_test]
    fn test_join_without_invite_gives_up() {
        let mut gw = gateway();
        gw.engine.press_button(CMD_LEARN | ON_BOARD_BUTTON);
        gw.engine.main_loop();
        assert!(!gw.engine.state().is_joined());
        assert_eq!(gw.engine.learn_state(), LearnState::Inactive);
        assert_eq!(reply(&mut gw.host), None);
    }

    #[esp32_test]
    fn test_join_ack_with_bad_crc_ignored() {
        let mut gw = gateway();
        let peer = Peer::new(2, KEYS);
        peer.invite(&gw.air);
        let mut ack = [0u8; JOIN_ACK_LEN];
        ack[0] = 2;
        ack[1] = msg::JOINACK;
        ack[2] = 9;
        gw.air.queue(&[FRAME_MARKER, MSG_LEN_LONG], &ack);

        assert!(!gw.engine.join_network().unwrap());
        assert_eq!(gw.engine.state().sid, NULL_SID);
    }

    #[esp32_test]
    fn test_unlearn_leaves_mesh() {
        let mut gw = joined(&[7]);
        gw.engine.press_button(CMD_UNLEARN | ON_BOARD_BUTTON);
        gw.engine.main_loop();

        assert!(!gw.engine.state().is_joined());
        assert!(gw.engine.state().sid_map.is_empty());
        assert_eq!(gw.engine.learn_state(), LearnState::Unlearnt);
        assert_eq!(reply(&mut gw.host), None);
        assert_eq!(gw.engine.store_mut().restore_mesh_info().unwrap(), None);
    }

    #[esp32_test]
    fn test_host_unlearn_is_acked() {
        let mut gw = joined(&[7]);
        gw.engine.press_button(CMD_UNLEARN);
        gw.engine.main_loop();
        assert_eq!(reply(&mut gw.host), Some(vec![spimsg::ACK]));
        assert!(!gw.engine.state().is_joined());
    }

    #[esp32_test]
    fn test_sidmap_update_spreads_and_confirms() {
        let mut gw = joined(&[7]);
        let peer = Peer::new(7, KEYS);
        peer.accept(&gw.air, OUR_SID);

        let new_map = map_of(&[OUR_SID, 7]);
        let mut request = vec![spimsg::EXTENDED_REQ, extended::SIDMAP_UPDATE];
        request.extend_from_slice(&new_map.bytes());
        gw.host.send(&request).unwrap();
        gw.engine.main_loop();

        assert_eq!(reply(&mut gw.host), Some(vec![spimsg::ACK]));

        let rumors = gw.air.sent_matching(RUMOR_LEN, 6, msg::SIDMAP_UPDATE);
        assert_eq!(rumors.len(), 1);
        assert_eq!(&rumors[0][11..19], &new_map.dithered(DITHER));

        // Everybody got it: an empty missing map with the rumor's TTL.
        let mut report = vec![spimsg::EXTENDED_RESPONSE, extended::MISSING_MAP, 5];
        report.extend_from_slice(&[0; 8]);
        assert_eq!(reply(&mut gw.host), Some(report));

        let st = gw.engine.state();
        assert!(!st.reasons.contains(RumorReason::SidMapUpdate));
        assert_eq!(st.confirmation, None);
        assert_eq!(st.sid_map, new_map);
        assert!(st.nbr_map.contains(7));
    }

    #[esp32_test]
    fn test_sidmap_update_forgets_members() {
        let mut gw = joined(&[7, 9]);
        gw.engine.state_mut().nbr_map = map_of(&[7, 9]);
        gw.engine.sid_map_update(map_of(&[OUR_SID, 7]));

        let st = gw.engine.state();
        assert!(st.is_joined());
        assert_eq!(st.sid_map, map_of(&[OUR_SID, 7]));
        assert_eq!(st.nbr_map, SidMap::single(7));
        let info = gw.engine.store_mut().restore_mesh_info().unwrap().unwrap();
        assert_eq!(info.sid_map, map_of(&[OUR_SID, 7]));
    }

    #[esp32_test]
    fn test_sidmap_update_without_us_evicts() {
        let mut gw = joined(&[7]);
        gw.engine.sid_map_update(SidMap::single(7));

        let st = gw.engine.state();
        assert!(!st.is_joined());
        assert!(st.sid_map.is_empty());
        assert_eq!(st.keys, [0; 3]);
        assert_eq!(gw.engine.learn_state(), LearnState::Unlearnt);
        let stored = gw.engine.store_mut().restore_mesh_info().unwrap();
        assert!(stored.map_or(true, |info| info.sid == NULL_SID));
    }

    #[esp32_test]
    fn test_sidmap_update_alone_leaves() {
        let mut gw = joined(&[7]);
        gw.engine.sid_map_update(SidMap::single(OUR_SID));
        assert!(!gw.engine.state().is_joined());
        assert_eq!(gw.engine.learn_state(), LearnState::Unlearnt);
    }

    #[esp32_test]
    fn test_joined_rumor_reported() {
        let mut gw = joined(&[7]);
        let peer = Peer::new(9, KEYS);
        let fields = RumorFields {
            gateway_id: [0xA1, 0xB2, 0xC3],
            ..RumorFields::default()
        };
        let frame = peer.rumor(msg::JOINED, &fields);
        peer.deliver(&gw.air, &frame, false);
        gw.engine.main_loop();

        assert_eq!(
            reply(&mut gw.host),
            Some(vec![
                spimsg::EXTENDED_RESPONSE,
                extended::REMOTE_ID,
                9,
                0xA1 ^ DITHER,
                0xB2,
                0xC3
            ])
        );
        let st = gw.engine.state();
        assert!(st.sid_map.contains(9));
        assert!(st.nbr_map.contains(9));
        let info = gw.engine.store_mut().restore_mesh_info().unwrap().unwrap();
        assert!(info.sid_map.contains(9));

        // The rumor was acked back to its sender.
        assert_eq!(gw.air.sent_matching(12, 7, 9).len(), 1);
    }

    #[esp32_test]
    fn test_old_news_not_reported() {
        let mut gw = joined(&[7]);
        let peer = Peer::new(9, KEYS);
        let frame = peer.rumor(msg::JOINED, &RumorFields::default());
        peer.deliver(&gw.air, &frame, true);
        gw.engine.main_loop();

        assert_eq!(reply(&mut gw.host), None);
        assert!(gw.engine.state().sid_map.contains(9));
    }

    #[esp32_test]
    fn test_sd_rumor_passed_to_host() {
        let mut gw = joined(&[7]);
        let peer = Peer::new(7, KEYS);
        let mut pass_thru = [0u8; 9];
        pass_thru[..3].copy_from_slice(&[0x11, 0x22, 0x33]);
        let fields = RumorFields {
            pass_thru,
            pass_thru_len: 3,
            ..RumorFields::default()
        };
        peer.deliver(&gw.air, &peer.rumor(msg::SD_RUMOR, &fields), false);
        gw.engine.main_loop();

        assert_eq!(reply(&mut gw.host), Some(vec![0x11, 0x22, 0x33, 7, 0]));
    }

    #[esp32_test]
    fn test_rumor_from_stranger_is_not_a_neighbour() {
        let mut gw = joined(&[7]);
        let stranger = Peer::new(12, KEYS);
        let mut pass_thru = [0u8; 9];
        pass_thru[0] = 0x42;
        let fields = RumorFields {
            pass_thru,
            pass_thru_len: 1,
            ..RumorFields::default()
        };
        stranger.deliver(&gw.air, &stranger.rumor(msg::SD_RUMOR, &fields), false);
        gw.engine.main_loop();

        assert_eq!(reply(&mut gw.host), Some(vec![0x42, 12, 0]));
        let st = gw.engine.state();
        assert!(!st.nbr_map.contains(12));
        assert!(!st.sid_map.contains(12));
    }

    #[esp32_test]
    fn test_status_request_for_us_queues_reply() {
        let mut gw = joined(&[7]);
        let peer = Peer::new(7, KEYS);
        let fields = RumorFields {
            target: OUR_SID,
            ..RumorFields::default()
        };
        peer.deliver(&gw.air, &peer.rumor(msg::STATUSREQ, &fields), false);
        gw.engine.main_loop();

        let st = gw.engine.state();
        assert!(st.reasons.contains(RumorReason::StatusReply));
        assert_eq!(st.targets.status_reply, 7);
    }

    #[esp32_test]
    fn test_status_request_for_other_ignored() {
        let mut gw = joined(&[7, 9]);
        let peer = Peer::new(7, KEYS);
        let fields = RumorFields {
            target: 9,
            ..RumorFields::default()
        };
        peer.deliver(&gw.air, &peer.rumor(msg::STATUSREQ, &fields), false);
        gw.engine.main_loop();
        assert!(!gw.engine.state().reasons.contains(RumorReason::StatusReply));
    }

    #[esp32_test]
    fn test_neighbour_rumor_restores_sequence() {
        let mut gw = joined(&[7]);
        gw.engine.state_mut().reasons.insert(RumorReason::SdRumor);
        let peer = Peer::new(7, KEYS);
        peer.deliver(&gw.air, &peer.rumor(msg::JOINED, &RumorFields::default()), true);
        gw.engine.main_loop();

        let st = gw.engine.state();
        assert_eq!(st.rumor_seq, 0);
        assert!(st.reasons.contains(RumorReason::SdRumor));
        assert_eq!(st.current, None);
    }

    #[esp32_test]
    fn test_neighbour_check_schedule() {
        let mut gw = joined(&[7]);
        {
            let st = gw.engine.state_mut();
            st.minute = 62;
            st.check_nbrs_minute = 0;
        }
        gw.engine.schedule_neighbour_check();
        assert!(!gw.engine.state().reasons.contains(RumorReason::CheckNbrs));

        gw.engine.state_mut().minute = 60 + u32::from(OUR_SID);
        gw.engine.schedule_neighbour_check();
        let st = gw.engine.state();
        assert!(st.reasons.contains(RumorReason::CheckNbrs));
        assert_eq!(st.check_nbrs_count, 1);
        assert_eq!(st.check_nbrs_minute, 63);

        // After the frequent checks only a daily one runs.
        {
            let st = gw.engine.state_mut();
            st.reasons.clear();
            st.check_nbrs_count = CHECK_NBRS_FREQUENT;
            st.minute = 63 + 1440 + 2;
        }
        gw.engine.schedule_neighbour_check();
        assert!(!gw.engine.state().reasons.contains(RumorReason::CheckNbrs));
        gw.engine.state_mut().minute = 63 + 1440 + 3;
        gw.engine.schedule_neighbour_check();
        let st = gw.engine.state();
        assert!(st.reasons.contains(RumorReason::CheckNbrs));
        assert_eq!(st.check_nbrs_count, CHECK_NBRS_FREQUENT);
    }

    #[esp32_test]
    fn test_minute_tick_runs_neighbour_probe() {
        let mut gw = joined(&[7]);
        gw.engine.state_mut().minute = 62;
        advance_ticks(&gw, MINUTE_SYS_TIME_COUNT + 1);
        gw.engine.main_loop();

        let st = gw.engine.state();
        assert_eq!(st.minute, 63);
        assert_eq!(st.check_nbrs_count, 1);
        assert_eq!(st.rumor.msg, msg::JOINED);
        assert!(!st.reasons.contains(RumorReason::CheckNbrs));
        assert_eq!(st.current, None);
    }

    #[esp32_test]
    fn test_reserved_mesh_expires() {
        let mut gw = gateway();
        gw.host.send(&[spimsg::PROD_TEST_CMD, 0x07]).unwrap();
        gw.engine.poll_host().unwrap();
        assert_eq!(reply(&mut gw.host), Some(vec![spimsg::ACK]));
        assert!(gw.engine.state().is_joined());

        for _ in 0..2 {
            advance_ticks(&gw, MINUTE_SYS_TIME_COUNT + 2);
            gw.engine.track_minutes();
        }
        assert!(gw.engine.state().is_joined());
        advance_ticks(&gw, MINUTE_SYS_TIME_COUNT + 2);
        gw.engine.track_minutes();
        assert!(!gw.engine.state().is_joined());
    }

    #[esp32_test]
    fn test_confirmation_expires() {
        let mut gw = joined(&[7]);
        let since = gw.engine.sys_time();
        gw.engine.state_mut().confirmation = Some(PendingConfirmation {
            msg: msg::STATUSREQ,
            since,
        });
        advance_ticks(&gw, CONFIRMATION_TIMEOUT / 2);
        gw.engine.expire_confirmation();
        assert!(gw.engine.state().confirmation.is_some());

        advance_ticks(&gw, CONFIRMATION_TIMEOUT);
        gw.engine.expire_confirmation();
        assert_eq!(gw.engine.state().confirmation, None);
    }

    #[esp32_test]
    fn test_confirmation_reports_missing_nodes() {
        let mut gw = joined(&[7, 9]);
        gw.engine.state_mut().confirmation = Some(PendingConfirmation {
            msg: msg::STATUSREQ,
            since: 0,
        });
        gw.engine.process_confirmation(SidMap::single(9), 4);

        let mut expected = vec![spimsg::EXTENDED_RESPONSE, extended::MISSING_MAP, 4];
        expected.extend_from_slice(&SidMap::single(9).bytes());
        assert_eq!(gw.engine.state().outgoing.as_slice(), &expected[..]);
        assert_eq!(gw.engine.state().confirmation, None);
    }

    #[esp32_test]
    fn test_complete_status_confirmation_is_silent() {
        let mut gw = joined(&[7]);
        gw.engine.state_mut().confirmation = Some(PendingConfirmation {
            msg: msg::STATUSREQ,
            since: 0,
        });
        gw.engine.process_confirmation(SidMap::EMPTY, 5);
        assert!(!gw.engine.state().outgoing.is_pending());
        assert_eq!(gw.engine.state().confirmation, None);
    }

    #[esp32_test]
    fn test_unexpected_confirmation_ignored() {
        let mut gw = joined(&[7]);
        gw.engine.process_confirmation(SidMap::single(7), 5);
        assert!(!gw.engine.state().outgoing.is_pending());
    }

    #[esp32_test]
    fn test_remote_rumor_confirmed_to_initiator() {
        let mut gw = joined(&[7]);
        gw.engine.state_mut().rumor = Rumor {
            msg: msg::STATUSREQ,
            initiator: 7,
            ..Rumor::default()
        };
        gw.engine.generate_confirmation();

        let st = gw.engine.state();
        assert_eq!(st.current, Some(RumorReason::SpreadRumor));
        assert!(st.reasons.contains(RumorReason::SpreadRumor));
        assert_eq!(st.rumor.msg, msg::CONFIRM);
        assert_eq!(st.rumor.initiator, OUR_SID);
        assert_eq!(st.rumor_map, SidMap::single(7));
        assert_eq!(st.listen_time_left, LISTEN_DURATION);
    }

    #[esp32_test]
    fn test_unconfirmable_rumor_needs_no_confirmation() {
        let mut gw = joined(&[7]);
        gw.engine.state_mut().rumor = Rumor {
            msg: msg::JOINED,
            initiator: 7,
            ..Rumor::default()
        };
        gw.engine.generate_confirmation();
        assert_eq!(gw.engine.state().current, None);
        assert!(gw.engine.state().reasons.is_empty());
    }

    #[esp32_test]
    fn test_unanswered_rumor_starts_propagation() {
        let mut gw = joined(&[7]);
        gw.engine.state_mut().reasons.insert(RumorReason::Joined);
        gw.engine.main_loop();

        let st = gw.engine.state();
        assert!(!st.reasons.contains(RumorReason::Joined));
        assert!(st.reasons.contains(RumorReason::PropagateRumor));
        assert_eq!(st.propagate_map, st.sid_map);
        assert_eq!(st.propagation_count, 1);
    }

    #[esp32_test]
    fn test_propagation_exhausted_reports_missing() {
        let mut gw = joined(&[7]);
        let new_map = map_of(&[OUR_SID, 7]);
        let mut request = vec![spimsg::EXTENDED_REQ, extended::SIDMAP_UPDATE];
        request.extend_from_slice(&new_map.bytes());
        gw.host.send(&request).unwrap();

        // Node 7 never answers.
        let mut passes = 0;
        loop {
            gw.engine.main_loop();
            passes += 1;
            if gw.engine.state().reasons.is_empty() || passes == 20 {
                break;
            }
        }

        let st = gw.engine.state();
        assert!(st.reasons.is_empty());
        assert_eq!(st.current, None);
        assert_eq!(st.propagation_count, PROPAGATION_COUNT_LIMIT);
        assert_eq!(passes, usize::from(PROPAGATION_COUNT_LIMIT));
        assert_eq!(st.confirmation, None);

        assert_eq!(reply(&mut gw.host), Some(vec![spimsg::ACK]));
        let mut report = vec![spimsg::EXTENDED_RESPONSE, extended::MISSING_MAP, 5];
        report.extend_from_slice(&SidMap::single(7).bytes());
        assert_eq!(reply(&mut gw.host), Some(report));
        assert_eq!(reply(&mut gw.host), None);
    }

    #[esp32_test]
    fn test_propagation_handed_over_to_neighbour() {
        let mut gw = joined(&[7, 9]);
        gw.engine.state_mut().reasons.insert(RumorReason::Joined);
        gw.engine.main_loop();
        {
            let st = gw.engine.state();
            assert!(st.reasons.contains(RumorReason::PropagateRumor));
            assert_eq!(st.rumor_map, map_of(&[7, 9]));
        }

        // 7 takes the rumor, then acks the hand-over.
        let peer = Peer::new(7, KEYS);
        peer.accept(&gw.air, OUR_SID);
        peer.ack(&gw.air, OUR_SID);
        gw.engine.main_loop();

        let st = gw.engine.state();
        assert_eq!(st.rumor_map, SidMap::single(9));
        assert!(st.reasons.is_empty());
        assert_eq!(st.current, None);
        assert!(st.nbr_map.contains(7));
        assert_eq!(gw.air.pending(), 0);
        let handed = gw.air.sent_matching(RUMOR_LEN, 6, msg::PROPAGATE);
        assert_eq!(handed.len(), 1);
    }

    #[esp32_test]
    fn test_minutes_continue_across_count_wrap() {
        let mut gw = joined(&[7]);
        gw.clock.advance(u32::MAX - 60_000 - gw.clock.now());
        gw.engine.main_loop();
        assert_eq!(gw.engine.state().minute, 1);

        // Cross the wrap well inside the next minute.
        gw.clock.advance(u32::MAX - gw.clock.now() + 1_000);
        assert!(gw.clock.now() < 60_000);
        gw.engine.main_loop();
        assert_eq!(gw.engine.state().minute, 1);

        advance_ticks(&gw, MINUTE_SYS_TIME_COUNT + 2);
        gw.engine.main_loop();
        assert_eq!(gw.engine.state().minute, 2);
    }

    #[esp32_test]
    fn test_command_waits_for_room_for_escaped_reply() {
        let mut gw = gateway();
        gw.engine.state_mut().gateway_id = [FLAG, ESC, FLAG];
        for _ in 0..3 {
            gw.engine.ack();
        }
        gw.host.send(&[spimsg::DIAG_REQ]).unwrap();
        gw.engine.main_loop();

        // One free item: the diagnostic reply would not fit.
        for _ in 0..3 {
            assert_eq!(reply(&mut gw.host), Some(vec![spimsg::ACK]));
        }
        assert_eq!(reply(&mut gw.host), None);

        gw.engine.main_loop();
        let diag = reply(&mut gw.host).unwrap();
        assert_eq!(diag.len(), 13);
        assert_eq!(diag[0], spimsg::DIAG_RESULT);
        assert_eq!(&diag[6..9], &[FLAG, ESC, FLAG]);
    }

    #[esp32_test]
    fn test_radio_sleeps_after_pass() {
        let mut gw = joined(&[7]);
        gw.engine.main_loop();
        assert_eq!(gw.chip.state(), Some(ChipState::Sleep));
        assert_eq!(gw.engine.phase(), Phase::Idle);
        assert_eq!(gw.engine.stats().main_loop_count(), 1);
    }

    #[esp32_test]
    fn test_command_waits_for_reply_room() {
        let config = NodeConfig {
            host_queue_depth: 1,
            ..NodeConfig::default()
        };
        let mut gw = gateway_with(&config, MemoryStore::new());
        gw.host.send(&[spimsg::ID_REQ]).unwrap();
        gw.engine.main_loop();
        gw.host.send(&[spimsg::ID_REQ]).unwrap();
        gw.engine.main_loop();
        gw.engine.main_loop();

        assert!(reply(&mut gw.host).is_some());
        assert_eq!(reply(&mut gw.host), None);
        gw.engine.main_loop();
        assert!(reply(&mut gw.host).is_some());
    }

    #[esp32_test]
    fn test_command_dropped_after_timeout() {
        let config = NodeConfig {
            host_queue_depth: 1,
            ..NodeConfig::default()
        };
        let mut gw = gateway_with(&config, MemoryStore::new());
        gw.host.send(&[spimsg::ID_REQ]).unwrap();
        gw.engine.main_loop();
        gw.host.send(&[spimsg::ID_REQ]).unwrap();
        for _ in 0..COMMAND_TIMEOUT_PASSES {
            gw.engine.main_loop();
        }

        assert!(reply(&mut gw.host).is_some());
        gw.engine.main_loop();
        assert_eq!(reply(&mut gw.host), None);
    }
}
