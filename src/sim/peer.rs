//! Scripted mesh peers.
//!
//! A [`Peer`] queues the frames a real node would put on the air during one
//! exchange with the gateway. Frames are built with the same codec the
//! gateway uses, so the gateway checks them exactly as it would a real
//! node's.

use super::air::SimAir;
use crate::codec::consts::*;
use crate::codec::{
    build_chirp, build_chirp_response, build_ok, build_rumor, build_rumor_ack, crc_of,
    mark_old_news, FrameKeys, MeshCrc, RumorFields, RumorFrame, SidMap,
};

/// A mesh member driven by the test script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub keys: FrameKeys,
    pub gateway_id: [u8; 3],
}

impl Peer {
    pub fn new(sid: u8, keys: [u8; 3]) -> Self {
        Self {
            keys: FrameKeys {
                sid,
                keys,
                scramble: false,
            },
            gateway_id: [0x10, 0x20, sid],
        }
    }

    pub fn sid(&self) -> u8 {
        self.keys.sid
    }

    /// Queue the part of `frame` after its sync word, the sync word being
    /// the `sync_len` bytes that end at `sync_end`.
    fn queue(air: &SimAir, frame: &[u8], sync_end: usize, sync_len: usize) {
        air.queue(&frame[sync_end - sync_len..sync_end], &frame[sync_end..]);
    }

    /// Inviting chirp, as sent by a member that accepts joins.
    pub fn invite(&self, air: &SimAir) {
        air.queue(
            &[PREAMBLE, PREAMBLE, FRAME_MARKER, 0x01],
            &[INVITING_BIT | self.sid(), 0, 0],
        );
    }

    /// Join ack handing out `sid` in a mesh whose members are `members`.
    /// Sealed with the unjoined keys the joining node still holds.
    pub fn join_ack(&self, air: &SimAir, sid: u8, members: SidMap) {
        let mut rx = [0u8; JOIN_ACK_LEN];
        rx[0] = self.sid();
        rx[1] = msg::JOINACK;
        rx[2] = sid;
        rx[3..6].copy_from_slice(&self.keys.keys);
        rx[6..14].copy_from_slice(&members.dithered(DITHER));

        let mut covered = [0u8; JOIN_ACK_LEN - 1];
        covered[0] = MSG_LEN_LONG;
        covered[1..].copy_from_slice(&rx[..14]);
        let crc = crc_of(MeshCrc::for_keys([0; 3], self.keys.scramble), &covered);
        rx[14..].copy_from_slice(&crc.to_be_bytes());
        air.queue(&[FRAME_MARKER, MSG_LEN_LONG], &rx);
    }

    /// Rumor frame of `msg_type` started by this peer.
    pub fn rumor(&self, msg_type: u8, fields: &RumorFields) -> RumorFrame {
        build_rumor(msg_type, &self.keys, fields)
    }

    /// Answer the gateway's next chirp and deliver `frame`.
    pub fn deliver(&self, air: &SimAir, frame: &RumorFrame, old_news: bool) {
        let mut frame = *frame;
        mark_old_news(&mut frame, &self.keys, old_news);
        Self::queue(air, &build_chirp_response(&self.keys), 5, 3);
        Self::queue(air, &frame, 5, 4);
    }

    /// Answer the gateway's chirp without sending a rumor.
    pub fn chirp_response(&self, air: &SimAir) {
        Self::queue(air, &build_chirp_response(&self.keys), 5, 3);
    }

    /// Chirp at a listening gateway, answer with an OK and ack the rumor it
    /// sends. `gateway_sid` is the SID the ack names.
    pub fn accept(&self, air: &SimAir, gateway_sid: u8) {
        Self::queue(air, &build_chirp(), 4, 3);
        Self::queue(air, &build_ok(&self.keys), 5, 2);
        self.ack(air, gateway_sid);
    }

    /// Rumor ack naming `rumor_sender`.
    pub fn ack(&self, air: &SimAir, rumor_sender: u8) {
        let ack = build_rumor_ack(&self.keys, rumor_sender, self.gateway_id);
        Self::queue(air, &ack, 5, 4);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    const KEYS: [u8; 3] = [0x05, 0x12, 0x34];

    #[esp32_test]
    fn test_join_ack_passes_unjoined_crc() {
        let air = SimAir::new();
        let peer = Peer::new(2, KEYS);
        peer.join_ack(&air, 9, SidMap::single(2));
        let rx = air.receive(&[FRAME_MARKER, MSG_LEN_LONG]).unwrap();
        assert_eq!(rx.len(), JOIN_ACK_LEN);

        let mut crc = MeshCrc::for_keys([0; 3], false);
        crc.update(MSG_LEN_LONG);
        crc.update_slice(&rx);
        assert!(crc.is_ok());
    }

    #[esp32_test]
    fn test_delivered_rumor_uses_long_sync() {
        let air = SimAir::new();
        let peer = Peer::new(2, KEYS);
        let frame = peer.rumor(msg::JOINED, &RumorFields::default());
        peer.deliver(&air, &frame, false);

        assert!(air
            .receive(&[PREAMBLE, FRAME_MARKER, peer.keys.first_byte(MSG_LEN_TINY)])
            .is_some());
        let long_first = peer.keys.first_byte(MSG_LEN_LONG);
        let payload = air
            .receive(&[PREAMBLE, PREAMBLE, FRAME_MARKER, long_first])
            .unwrap();
        assert_eq!(payload.len(), 16);

        let mut buf = vec![long_first];
        buf.extend(payload);
        assert!(peer.keys.crc().check(&buf));
    }

    #[esp32_test]
    fn test_accept_queues_listen_exchange() {
        let air = SimAir::new();
        let peer = Peer::new(2, KEYS);
        peer.accept(&air, 3);
        assert_eq!(air.pending(), 3);
        assert!(air.receive(&[PREAMBLE, PREAMBLE, CHIRP_MARKER]).is_some());
        let ok = air
            .receive(&[FRAME_MARKER, peer.keys.first_byte(MSG_LEN_SHORT)])
            .unwrap();
        assert_eq!(ok[0], 2);
    }
}
