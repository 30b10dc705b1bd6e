//! Mesh protocol state.
//!
//! Everything the engine knows about its mesh lives in [`MeshState`]. The
//! state is owned by the single mesh task and passed by reference to the
//! radio exchanges, so no locking happens below the task boundary.

use super::reason::{Reasons, RumorReason};
use crate::codec::consts::{DEFAULT_TTL, NULL_SID, SID_MASK};
use crate::codec::{build_rumor, FrameKeys, RumorFields, RumorFrame, SidMap};
use crate::config::MeshInfo;
use std::fmt;
use zeroize::Zeroize;

/// SIDs above this are never tracked as neighbours.
pub const MAX_MESH_SIZE: u8 = 50;
/// Listen window in main-loop time units (about 3 s).
pub const LISTEN_DURATION: u16 = 26;
pub const PROPAGATION_COUNT_LIMIT: u8 = 5;
/// Short chirps between two full OK frames.
pub const SHORT_CHIRP_COUNT: u8 = 29;
/// Chirps per main-loop pass.
pub const CHIRP_ATTEMPTS: u8 = 5;
/// System ticks an expected confirmation is waited for (5 minutes).
pub const CONFIRMATION_TIMEOUT: u32 = 2400;
/// System ticks per protocol minute.
pub const MINUTE_SYS_TIME_COUNT: u32 = 480;
pub const CHECK_NBRS_SHORT_INTERVAL: u32 = 60;
pub const CHECK_NBRS_LONG_INTERVAL: u32 = 1440;
/// Neighbour checks run at the short interval this many times.
pub const CHECK_NBRS_FREQUENT: u8 = 6;

/// Host-bound message buffer size.
pub const HOST_MSG_LEN: usize = 16;

/// Gateway learn-in progress, as shown to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LearnState {
    #[default]
    Inactive,
    Active,
    Joined,
    Unlearnt,
}

impl LearnState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Joined => "joined",
            Self::Unlearnt => "unlearnt",
        }
    }
}

impl fmt::Display for LearnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The rumor being spread, with the frame it was first built as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rumor {
    pub frame: RumorFrame,
    pub msg: u8,
    pub initiator: u8,
    pub seq: u8,
    pub ttl: u8,
}

impl Default for Rumor {
    fn default() -> Self {
        Self {
            frame: [0; 21],
            msg: 0,
            initiator: NULL_SID,
            seq: 0,
            ttl: DEFAULT_TTL,
        }
    }
}

/// Single-target SIDs requested by the host or by remote nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targets {
    pub status_reply: u8,
    pub status_request: u8,
    pub map_reply: u8,
    pub map_request: u8,
    /// Next SD rumor goes only to this SID. Consumed once.
    pub sd_rumor: u8,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            status_reply: NULL_SID,
            status_request: NULL_SID,
            map_reply: NULL_SID,
            map_request: NULL_SID,
            sd_rumor: NULL_SID,
        }
    }
}

/// A confirmation the gateway is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingConfirmation {
    /// Message type that asked for it.
    pub msg: u8,
    /// System tick it was requested at.
    pub since: u32,
}

/// One host-bound message. Only one can be pending per main-loop pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutgoingMsg {
    buf: [u8; HOST_MSG_LEN],
    len: usize,
}

impl OutgoingMsg {
    pub fn is_pending(&self) -> bool {
        self.len != 0
    }

    /// Replace the pending message. Longer input is truncated.
    pub fn set(&mut self, msg: &[u8]) {
        let len = msg.len().min(HOST_MSG_LEN);
        self.buf[..len].copy_from_slice(&msg[..len]);
        self.len = len;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn take(&mut self) -> Option<Vec<u8>> {
        if self.len == 0 {
            return None;
        }
        let msg = self.as_slice().to_vec();
        self.len = 0;
        Some(msg)
    }
}

/// Protocol state of one gateway.
#[derive(Debug, Clone)]
pub struct MeshState {
    pub sid: u8,
    pub keys: [u8; 3],
    pub gateway_id: [u8; 3],
    pub sd_model: [u8; 2],
    /// Frame scrambling enabled by configuration.
    pub scramble: bool,

    pub sid_map: SidMap,
    pub nbr_map: SidMap,
    /// Nodes that still have to hear the current rumor.
    pub rumor_map: SidMap,
    /// Nodes that may take the rumor over.
    pub propagate_map: SidMap,
    /// Staged map for a host-initiated SID map update.
    pub new_sid_map: SidMap,

    pub reasons: Reasons,
    pub current: Option<RumorReason>,
    pub rumor: Rumor,
    /// Frame placed on the air by the listen phase.
    pub msgbuf: RumorFrame,
    /// Sequence number for the next rumor started here.
    pub rumor_seq: u8,
    pub targets: Targets,
    pub map_msg_type: u8,

    /// Host message waiting to be wrapped in an SD rumor.
    pub pass_thru: [u8; 9],
    pub pass_thru_len: u8,

    pub confirmation: Option<PendingConfirmation>,
    pub propagation_count: u8,
    pub listen_time_left: u16,
    pub short_chirp_count: u8,

    pub minute: u32,
    pub minute_sys_time: u32,
    pub check_nbrs_minute: u32,
    pub check_nbrs_count: u8,

    pub outgoing: OutgoingMsg,
    pub learn_state: LearnState,
}

impl MeshState {
    pub fn new(gateway_id: [u8; 3], scramble: bool) -> Self {
        Self {
            sid: NULL_SID,
            keys: [0; 3],
            gateway_id,
            sd_model: [0; 2],
            scramble,
            sid_map: SidMap::EMPTY,
            nbr_map: SidMap::EMPTY,
            rumor_map: SidMap::EMPTY,
            propagate_map: SidMap::EMPTY,
            new_sid_map: SidMap::EMPTY,
            reasons: Reasons::NONE,
            current: None,
            rumor: Rumor::default(),
            msgbuf: [0; 21],
            rumor_seq: 0,
            targets: Targets::default(),
            map_msg_type: 0,
            pass_thru: [0; 9],
            pass_thru_len: 0,
            confirmation: None,
            propagation_count: 0,
            listen_time_left: 0,
            short_chirp_count: 0,
            minute: 0,
            minute_sys_time: 0,
            check_nbrs_minute: 0,
            check_nbrs_count: 0,
            outgoing: OutgoingMsg::default(),
            learn_state: LearnState::Inactive,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.sid != NULL_SID
    }

    /// Mesh ID, the low six bits of key 0.
    pub fn mesh_id(&self) -> u8 {
        self.keys[0] & SID_MASK
    }

    pub fn frame_keys(&self) -> FrameKeys {
        FrameKeys {
            sid: self.sid,
            keys: self.keys,
            scramble: self.scramble,
        }
    }

    /// XOR key for the scrambled frame area; zero when not in use.
    pub fn scramble_key(&self) -> u8 {
        if self.scramble && self.is_joined() {
            self.keys[1]
        } else {
            0
        }
    }

    pub fn rumor_fields(&self) -> RumorFields {
        RumorFields {
            seq: self.rumor_seq,
            gateway_id: self.gateway_id,
            target: NULL_SID,
            map_msg_type: self.map_msg_type,
            rumor_ttl: self.rumor.ttl,
            nbr_map: self.nbr_map,
            sid_map: self.sid_map,
            rumor_map: self.rumor_map,
            new_sid_map: self.new_sid_map,
            pass_thru: self.pass_thru,
            pass_thru_len: self.pass_thru_len,
        }
    }

    /// Build a rumor frame of `msg_type` into the transmit buffer.
    pub fn build(&mut self, msg_type: u8) {
        self.msgbuf = build_rumor(msg_type, &self.frame_keys(), &self.rumor_fields());
    }

    /// Build a frame of `msg_type` aimed at `target`.
    pub fn build_targeted(&mut self, msg_type: u8, target: u8) {
        let mut fields = self.rumor_fields();
        fields.target = target;
        self.msgbuf = build_rumor(msg_type, &self.frame_keys(), &fields);
    }

    /// Take the frame in the transmit buffer as a new rumor started here.
    pub fn start_rumor(&mut self, msg: u8) {
        self.rumor = Rumor {
            frame: self.msgbuf,
            msg,
            initiator: self.sid,
            seq: self.rumor_seq,
            ttl: DEFAULT_TTL,
        };
        self.rumor_seq = self.rumor_seq.wrapping_add(1);
    }

    /// Put the saved rumor back into the transmit buffer.
    pub fn reload_rumor(&mut self) {
        self.msgbuf = self.rumor.frame;
    }

    /// Record `id` as a neighbour if it is a known mesh member.
    pub fn note_neighbour(&mut self, id: u8) {
        if id < MAX_MESH_SIZE && self.sid_map.contains(id) {
            self.nbr_map.set(id);
        }
    }

    /// Forget the mesh identity. Keys are wiped.
    pub fn forget_mesh(&mut self) {
        self.sid = NULL_SID;
        self.keys.zeroize();
        self.sid_map.clear_all();
    }

    /// Identity reset before joining. The SID map survives until the join
    /// ack replaces it.
    pub fn reset_keys(&mut self) {
        self.sid = NULL_SID;
        self.keys.zeroize();
    }

    pub fn mesh_info(&self) -> MeshInfo {
        MeshInfo {
            sid: self.sid,
            keys: self.keys,
            sid_map: self.sid_map,
            gateway_id: self.gateway_id,
            sd_model: self.sd_model,
        }
    }

    pub fn apply_mesh_info(&mut self, info: &MeshInfo) {
        self.sid = info.sid;
        self.keys = info.keys;
        self.sid_map = info.sid_map;
        self.gateway_id = info.gateway_id;
        self.sd_model = info.sd_model;
    }
}

impl Drop for MeshState {
    fn drop(&mut self) {
        self.keys.zeroize();
    }
}
