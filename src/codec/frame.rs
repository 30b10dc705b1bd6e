//! Frame builders.
//!
//! Every frame starts with a four byte preamble stub. The CRC covers the
//! bytes from offset 4 up to the CRC itself and is appended big-endian.
//! Scrambling is applied separately by the radio link, after the CRC.

use super::consts::*;
use super::crc::MeshCrc;
use super::map::SidMap;

/// A long (rumor class) frame as placed in the TX FIFO.
pub type RumorFrame = [u8; RUMOR_LEN];

/// Identity fields every frame builder needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameKeys {
    pub sid: u8,
    pub keys: [u8; 3],
    pub scramble: bool,
}

impl FrameKeys {
    /// First CRC-covered byte: mesh key 0 shifted over the length code.
    pub fn first_byte(&self, len_code: u8) -> u8 {
        (self.keys[0] << 2).wrapping_add(len_code)
    }

    /// Fresh CRC register seeded for this mesh.
    pub fn crc(&self) -> MeshCrc {
        MeshCrc::for_keys(self.keys, self.scramble)
    }

    /// Write the CRC of `frame[4..crc_at]` into `frame[crc_at..crc_at + 2]`.
    fn seal(&self, frame: &mut [u8], crc_at: usize) {
        let mut crc = self.crc();
        crc.update_slice(&frame[PREAMBLE_LEN..crc_at]);
        frame[crc_at..crc_at + 2].copy_from_slice(&crc.finish().to_be_bytes());
    }
}

/// Mesh state a rumor frame is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RumorFields {
    pub seq: u8,
    pub gateway_id: [u8; 3],
    pub target: u8,
    pub map_msg_type: u8,
    pub rumor_ttl: u8,
    pub nbr_map: SidMap,
    pub sid_map: SidMap,
    pub rumor_map: SidMap,
    pub new_sid_map: SidMap,
    pub pass_thru: [u8; 9],
    pub pass_thru_len: u8,
}

/// Bare chirp: preamble ending in the chirp marker.
pub fn build_chirp() -> [u8; CHIRP_LEN] {
    [PREAMBLE_START, PREAMBLE, PREAMBLE, CHIRP_MARKER]
}

/// Answer to a chirp, sent by a node that has a rumor to deliver.
pub fn build_chirp_response(k: &FrameKeys) -> [u8; CHIRP_RESPONSE_LEN] {
    [
        PREAMBLE_START,
        PREAMBLE,
        PREAMBLE,
        FRAME_MARKER,
        k.first_byte(MSG_LEN_TINY),
    ]
}

pub fn build_ok(k: &FrameKeys) -> [u8; OK_LEN] {
    let mut frame = [0u8; OK_LEN];
    frame[..4].copy_from_slice(&[PREAMBLE_START, PREAMBLE, PREAMBLE, FRAME_MARKER]);
    frame[4] = k.first_byte(MSG_LEN_SHORT);
    frame[5] = k.sid;
    k.seal(&mut frame, 6);
    frame
}

/// Acknowledge a rumor received from `rumor_sender`.
pub fn build_rumor_ack(k: &FrameKeys, rumor_sender: u8, gateway_id: [u8; 3]) -> [u8; RUMOR_ACK_LEN] {
    let mut frame = [0u8; RUMOR_ACK_LEN];
    frame[..4].copy_from_slice(&[PREAMBLE, PREAMBLE, PREAMBLE, FRAME_MARKER]);
    frame[4] = k.first_byte(MSG_LEN_MEDIUM);
    frame[5] = k.sid;
    frame[6] = msg::ACKRUMOR;
    frame[7] = rumor_sender;
    frame[8] = gateway_id[1];
    frame[9] = gateway_id[2] ^ MM_XOR_REV12;
    k.seal(&mut frame, 10);
    frame
}

pub fn build_join_request(k: &FrameKeys, gateway_id: [u8; 3]) -> [u8; JOIN_REQUEST_LEN] {
    let mut frame = [DITHER; JOIN_REQUEST_LEN];
    frame[..4].copy_from_slice(&[PREAMBLE, PREAMBLE, PREAMBLE, FRAME_MARKER]);
    frame[4] = MSG_LEN_LONG;
    frame[5] = FILLER;
    frame[6] = msg::JOINREQ;
    frame[7] = FWREV;
    frame[8..11].copy_from_slice(&gateway_id);
    k.seal(&mut frame, 19);
    frame
}

/// Build a long rumor frame of `msg_type`.
///
/// Unknown types keep only the common header.
pub fn build_rumor(msg_type: u8, k: &FrameKeys, f: &RumorFields) -> RumorFrame {
    let mut frame = [0u8; RUMOR_LEN];
    frame[..4].copy_from_slice(&[PREAMBLE_START, PREAMBLE, PREAMBLE, FRAME_MARKER]);
    frame[4] = k.first_byte(MSG_LEN_LONG);
    frame[5] = k.sid;
    frame[6] = msg_type;
    frame[7] = k.sid;
    frame[8] = (f.seq << 4) | DEFAULT_TTL;

    let body = &mut frame[9..19];
    match msg_type {
        msg::JOINED => {
            body[0] = f.gateway_id[1];
            body[1] = f.gateway_id[2];
            let mut bytes = f.nbr_map.bytes();
            bytes[7] = f.gateway_id[0];
            body[2..].copy_from_slice(&SidMap::from_bytes(bytes).dithered(DITHER));
        }
        msg::CONFIRM => {
            body[0] = f.rumor_ttl;
            body[1] = k.keys[2];
            body[2..].copy_from_slice(&f.rumor_map.dithered(DITHER));
        }
        msg::STATUSREQ => {
            body[0] = f.target;
            body[1] = k.keys[2];
            body[2..].copy_from_slice(&f.nbr_map.dithered(DITHER));
        }
        msg::STATUSREPLY => {
            // Battery readings and RSSI are fixed: a gateway has neither.
            body.copy_from_slice(&[
                32,
                32,
                32,
                100,
                FWREV,
                f.gateway_id[0],
                f.gateway_id[1],
                f.gateway_id[2],
                0,
                0,
            ]);
        }
        msg::MAPREQ => {
            body[0] = f.target;
            body[1] = f.map_msg_type;
            body[2..].copy_from_slice(&f.nbr_map.dithered(DITHER));
        }
        msg::MAPREPLY => {
            body[0] = k.keys[1];
            body[1] = f.map_msg_type;
            let map = if f.map_msg_type == 0 {
                f.sid_map
            } else {
                f.nbr_map
            };
            body[2..].copy_from_slice(&map.dithered(DITHER));
        }
        msg::SD_RUMOR => {
            body[0] = f.pass_thru[8];
            body[1] = f.pass_thru_len;
            for (dst, src) in body[2..].iter_mut().zip(&f.pass_thru[..8]) {
                *dst = src ^ DITHER;
            }
            frame[5] |= URGENT_BIT;
        }
        msg::MFCT_STAMP => {
            body[0] = k.keys[1];
            body[1] = k.keys[2];
            body[2..].copy_from_slice(&f.rumor_map.dithered(DITHER));
        }
        msg::SIDMAP_UPDATE => {
            body[0] = k.keys[1];
            body[1] = k.keys[2];
            body[2..].copy_from_slice(&f.new_sid_map.dithered(DITHER));
        }
        msg::PROPAGATE => {
            frame[7] = f.target;
            frame[8..11].copy_from_slice(&k.keys);
            frame[11..19].copy_from_slice(&f.rumor_map.dithered(DITHER));
            frame[5] |= URGENT_BIT;
        }
        _ => {}
    }

    k.seal(&mut frame, 19);
    frame
}

/// Mark (or unmark) a rumor as old news for the receiver and reseal the CRC.
pub fn mark_old_news(frame: &mut RumorFrame, k: &FrameKeys, old_news: bool) {
    if old_news {
        frame[5] |= OLD_NEWS_BIT;
    } else {
        frame[5] &= !OLD_NEWS_BIT;
    }
    k.seal(frame, 19);
}

/// XOR the scrambled area (bytes 8 onwards) of an outgoing frame.
pub fn scramble(frame: &mut [u8], key: u8) {
    if frame.len() > 8 {
        for b in frame[8..].iter_mut() {
            *b ^= key;
        }
    }
}
