//! Timed radio exchanges.
//!
//! Each exchange programs a sync word, starts TX or RX with the state the
//! chip should fall into afterwards, and polls the packet handler against a
//! deadline in timer counts. A missed deadline is not an error: the
//! exchange simply reports that nothing was received. Only chip failures
//! come back as [`RadioError`].

use super::random::Lfsr;
use super::reason::RumorReason;
use super::state::MeshState;
use crate::codec::consts::*;
use crate::codec::{
    build_chirp, build_chirp_response, build_join_request, build_ok, build_rumor_ack,
    mark_old_news, scramble, FrameKeys, SidMap,
};
use crate::radio::clock::FIVE_SECONDS;
use crate::radio::{
    prop, ChipState, Clock, Fifo, RadioError, Transceiver, COUNTS_PER_MS, PH_PACKET_RX,
    PH_PACKET_SENT,
};
use crate::status::MeshStats;
use log::{debug, info};
use std::sync::Arc;

/// Sync word of an inviting chirp from a mesh member.
const INVITE_SYNC: [u8; 4] = [PREAMBLE, PREAMBLE, FRAME_MARKER, 0x01];
/// Sync word of a join ack: marker plus the long length code.
const JOIN_ACK_SYNC: [u8; 2] = [FRAME_MARKER, MSG_LEN_LONG];
/// Bytes of an invite read after its sync word.
const INVITE_LEN: u8 = 3;
/// Bytes of an OK read after its sync word (sender and CRC are skipped).
const OK_PEEK_LEN: u8 = 3;
/// Received rumor: first byte plus the 16 bytes after the sync word.
pub const RCV_RUMOR_LEN: usize = 17;
/// Rumor ack: first byte plus the 7 bytes after the sync word.
pub const RCV_ACK_LEN: usize = 8;

/// Extra listen jitter, in timer counts.
const LISTEN_JITTER: u16 = 500;

/// Deadlines in timer counts (0.5 ms).
mod deadline {
    pub const CHIRP_SENT: u32 = 6;
    pub const OK_SENT: u32 = 10;
    pub const SHORT_RX: u32 = 12;
    pub const RUMOR_SENT: u32 = 20;
    pub const ACK_WINDOW: u32 = 20;
    pub const JOIN_ACK_WINDOW: u32 = 20;
    pub const JOIN_REQUEST_SENT: u32 = 20;
}

/// Wait for a chirp response, in milliseconds.
const CHIRP_RESPONSE_WAIT_MS: u32 = 6;
/// Wait for an inviting chirp, in milliseconds.
const INVITE_WAIT_MS: u32 = 5000;

/// Repetitions of the OK that completes a join.
const JOIN_OK_REPEATS: usize = 5;

/// Mesh identity handed out by a join ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAck {
    pub sid: u8,
    /// Member that answered our request.
    pub sender: u8,
    pub keys: [u8; 3],
    pub sid_map: SidMap,
}

/// A rumor as received: the first byte followed by the 16 bytes read after
/// the sync word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedRumor([u8; RCV_RUMOR_LEN]);

impl ReceivedRumor {
    /// Offset of the 8-byte map or payload.
    pub const MAP_OFFSET: usize = 7;

    pub fn from_bytes(bytes: [u8; RCV_RUMOR_LEN]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8; RCV_RUMOR_LEN] {
        &self.0
    }

    pub fn sender(&self) -> u8 {
        self.0[1] & SID_MASK
    }

    /// The sender says we have heard this rumor before.
    pub fn old_news(&self) -> bool {
        self.0[1] & OLD_NEWS_BIT != 0
    }

    pub fn msg(&self) -> u8 {
        self.0[2]
    }

    pub fn initiator(&self) -> u8 {
        self.0[3] & SID_MASK
    }

    pub fn seq(&self) -> u8 {
        self.0[4] >> 4
    }

    pub fn byte5(&self) -> u8 {
        self.0[5]
    }

    pub fn byte6(&self) -> u8 {
        self.0[6]
    }

    /// The 8 map bytes, still dithered.
    pub fn raw_map(&self) -> &[u8] {
        &self.0[Self::MAP_OFFSET..Self::MAP_OFFSET + 8]
    }

    pub fn map(&self) -> SidMap {
        SidMap::from_dithered(self.raw_map(), DITHER)
    }
}

/// A rumor or propagate ack: first byte plus 7 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrame([u8; RCV_ACK_LEN]);

impl AckFrame {
    pub fn from_bytes(bytes: [u8; RCV_ACK_LEN]) -> Self {
        Self(bytes)
    }

    /// True if this acks `id`'s frame and, when the acker says whom it
    /// acks (`discriminator` in byte 5), names `own_sid`. Acks without the
    /// discriminator come from older nodes and are accepted.
    pub fn accepted(&self, id: u8, own_sid: u8, discriminator: u8) -> bool {
        if self.0[1] & SID_MASK != id || self.0[2] != msg::ACKRUMOR {
            return false;
        }
        self.0[5] != discriminator || self.0[3] & SID_MASK == own_sid
    }
}

/// The radio side of the mesh protocol.
pub struct RadioLink<R, C> {
    radio: R,
    clock: C,
    random: Lfsr,
    stats: Arc<MeshStats>,
}

impl<R: Transceiver, C: Clock> RadioLink<R, C> {
    pub fn new(radio: R, clock: C, random: Lfsr, stats: Arc<MeshStats>) -> Self {
        Self {
            radio,
            clock,
            random,
            stats,
        }
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn stats(&self) -> &Arc<MeshStats> {
        &self.stats
    }

    pub fn init(&mut self) -> Result<(), RadioError> {
        self.radio.init()
    }

    pub fn sleep(&mut self) -> Result<(), RadioError> {
        self.radio.change_state(ChipState::Sleep)
    }

    pub fn apply_calibration(&mut self, frac2: u8, frac3: u8) -> Result<(), RadioError> {
        self.radio
            .set_property(prop::FREQ_CONTROL_GROUP, prop::FREQ_CONTROL_FRAC2, frac2)?;
        self.radio
            .set_property(prop::FREQ_CONTROL_GROUP, prop::FREQ_CONTROL_FRAC3, frac3)
    }

    fn upload(&mut self, frame: &[u8], key: u8) -> Result<(), RadioError> {
        if key == 0 || frame.len() <= 8 {
            return self.radio.upload(frame);
        }
        let mut buf = [0u8; RUMOR_LEN];
        let buf = &mut buf[..frame.len()];
        buf.copy_from_slice(frame);
        scramble(buf, key);
        self.radio.upload(buf)
    }

    fn download(&mut self, buf: &mut [u8], key: u8) -> Result<(), RadioError> {
        self.radio.download(buf)?;
        if key != 0 {
            for b in buf.iter_mut().skip(3) {
                *b ^= key;
            }
        }
        Ok(())
    }

    /// Poll until `flag` is pending or `limit` counts have passed since
    /// `start`.
    fn poll_since(&mut self, flag: u8, start: u32, limit: u32) -> Result<bool, RadioError> {
        loop {
            let status = self.radio.interrupt_status()?;
            if status.ph_pend & flag != 0 {
                return Ok(true);
            }
            if self.clock.since(start) >= limit {
                return Ok(false);
            }
        }
    }

    fn poll(&mut self, flag: u8, limit: u32) -> Result<bool, RadioError> {
        let start = self.clock.counts();
        self.poll_since(flag, start, limit)
    }

    /// Send `len` uploaded bytes and wait for the packet-sent flag.
    fn transmit(&mut self, len: usize, next: ChipState, limit: u32) -> Result<bool, RadioError> {
        let start = self.clock.counts();
        self.radio.start_tx(len as u8, next)?;
        let sent = self.poll_since(PH_PACKET_SENT, start, limit)?;
        if sent {
            self.stats.record_tx();
        }
        Ok(sent)
    }

    /// The chip only transmits with a sync word configured; a single zero
    /// byte is used for frames that carry their own preamble.
    fn plain_sync(&mut self) -> Result<(), RadioError> {
        self.radio.configure_sync(&[0x00], false)
    }

    /// Listen for an inviting chirp with the join request already loaded.
    pub fn receive_invite(&mut self, st: &MeshState) -> Result<bool, RadioError> {
        self.radio.reset_fifo(Fifo::TX)?;
        let request = build_join_request(&st.frame_keys(), st.gateway_id);
        self.upload(&request, st.scramble_key())?;

        self.radio.configure_sync(&INVITE_SYNC, false)?;
        self.radio.reset_fifo(Fifo::RX)?;
        self.radio.interrupt_status()?;
        self.radio.clear_sync();

        let start = self.clock.counts();
        self.radio.start_rx(INVITE_LEN, ChipState::Ready)?;
        self.radio.wait_sync(INVITE_WAIT_MS);
        let received = self.poll_since(PH_PACKET_RX, start, FIVE_SECONDS)?;

        let mut invite = [0u8; INVITE_LEN as usize];
        let mut inviting = false;
        if received {
            self.download(&mut invite, st.scramble_key())?;
            inviting = invite[0] & INVITING_BIT != 0;
        }
        self.radio.interrupt_status()?;
        if inviting {
            self.stats.record_rx();
            debug!("Invite received");
        }
        Ok(inviting)
    }

    pub fn send_join_request(&mut self) -> Result<bool, RadioError> {
        self.plain_sync()?;
        let sent = self.transmit(
            JOIN_REQUEST_LEN,
            ChipState::Ready,
            deadline::JOIN_REQUEST_SENT,
        )?;
        self.radio.interrupt_status()?;
        Ok(sent)
    }

    /// Wait for a join ack and validate it against the unjoined keys.
    pub fn receive_join_ack(&mut self, st: &MeshState) -> Result<Option<JoinAck>, RadioError> {
        self.radio.configure_sync(&JOIN_ACK_SYNC, false)?;
        self.radio.reset_fifo(Fifo::RX)?;
        self.radio.interrupt_status()?;
        self.radio.start_rx(JOIN_ACK_LEN as u8, ChipState::Ready)?;

        let start = self.clock.counts();
        let mut ack = None;
        while ack.is_none() && self.clock.since(start) < deadline::JOIN_ACK_WINDOW {
            let info = self.radio.fifo_info(Fifo::NONE)?;
            if (info.rx_count as usize) < JOIN_ACK_LEN {
                continue;
            }
            let mut rx = [0u8; JOIN_ACK_LEN];
            self.download(&mut rx, st.scramble_key())?;
            if rx[1] != msg::JOINACK {
                continue;
            }
            let mut crc = st.frame_keys().crc();
            crc.update(MSG_LEN_LONG);
            crc.update_slice(&rx);
            if !crc.is_ok() {
                debug!("Join ack failed CRC");
                continue;
            }
            let mut keys = [0u8; 3];
            keys.copy_from_slice(&rx[3..6]);
            let sid = rx[2] & SID_MASK;
            let mut sid_map = SidMap::from_dithered(&rx[6..14], DITHER);
            sid_map.set(sid);
            ack = Some(JoinAck {
                sid,
                sender: rx[0] & SID_MASK,
                keys,
                sid_map,
            });
        }
        self.radio.interrupt_status()?;
        if ack.is_some() {
            self.stats.record_rx();
        }
        Ok(ack)
    }

    /// Send an OK frame already in the TX FIFO.
    fn send_ok(&mut self) -> Result<bool, RadioError> {
        self.plain_sync()?;
        let sent = self.transmit(OK_LEN, ChipState::Ready, deadline::OK_SENT)?;
        self.radio.interrupt_status()?;
        Ok(sent)
    }

    /// Announce the new SID to the mesh. The OKs go out under the new SID
    /// but still with the unjoined keys, which `keys` must hold.
    pub fn confirm_join(&mut self, keys: &FrameKeys) -> Result<(), RadioError> {
        self.radio.reset_fifo(Fifo::TX)?;
        let ok = build_ok(keys);
        for _ in 0..JOIN_OK_REPEATS {
            self.upload(&ok, 0)?;
            self.send_ok()?;
        }
        Ok(())
    }

    /// One join attempt window: invite, request, ack, for up to five
    /// seconds.
    pub fn join(&mut self, st: &MeshState) -> Result<Option<JoinAck>, RadioError> {
        self.radio.change_state(ChipState::Ready)?;
        let start = self.clock.counts();
        loop {
            if self.receive_invite(st)? {
                self.send_join_request()?;
                if let Some(ack) = self.receive_join_ack(st)? {
                    info!("Join ack: SID {} mesh {}", ack.sid, ack.keys[0] & SID_MASK);
                    return Ok(Some(ack));
                }
            }
            if self.clock.since(start) >= FIVE_SECONDS {
                return Ok(None);
            }
        }
    }

    /// Chirp and, if a neighbour is waiting to talk, receive its rumor.
    ///
    /// A detected chirp response means some node is in its listen phase,
    /// so our own current rumor is dropped for this pass. A rumor that
    /// passes the CRC and carries the rumor bit is acked and returned.
    pub fn chirp_to_receive(
        &mut self,
        st: &mut MeshState,
        long: bool,
    ) -> Result<Option<ReceivedRumor>, RadioError> {
        let k = st.frame_keys();
        let key = st.scramble_key();

        if long {
            self.radio.reset_fifo(Fifo::TX)?;
            self.upload(&build_ok(&k), key)?;
            self.send_ok()?;
        }

        self.radio.reset_fifo(Fifo::BOTH)?;
        self.upload(&build_chirp(), key)?;
        self.radio
            .configure_sync(&[PREAMBLE, FRAME_MARKER, st.mesh_id() << 2], true)?;
        self.transmit(CHIRP_LEN, ChipState::RxTune, deadline::CHIRP_SENT)?;

        self.radio.clear_sync();
        self.radio.start_rx(0, ChipState::TxTune)?;
        self.upload(&build_ok(&k), key)?;
        let mut rumor = None;
        if self.radio.wait_sync(CHIRP_RESPONSE_WAIT_MS) {
            rumor = self.receive_after_chirp(st, &k, key)?;
        }

        self.radio.interrupt_status()?;
        self.radio
            .set_property(prop::INT_CTL_GROUP, prop::INT_CTL_ENABLE, 0)?;
        Ok(rumor)
    }

    fn receive_after_chirp(
        &mut self,
        st: &mut MeshState,
        k: &FrameKeys,
        key: u8,
    ) -> Result<Option<ReceivedRumor>, RadioError> {
        let start = self.clock.counts();
        self.radio.start_tx(OK_LEN as u8, ChipState::RxTune)?;
        if let Some(reason) = st.current.take() {
            debug!("Neighbour is listening, holding {}", reason);
        }

        let long_first = k.first_byte(MSG_LEN_LONG);
        self.radio
            .configure_sync(&[PREAMBLE, PREAMBLE, FRAME_MARKER, long_first], true)?;
        if self.poll_since(PH_PACKET_SENT, start, deadline::OK_SENT)? {
            self.stats.record_tx();
        }

        self.radio.start_rx(JOIN_ACK_LEN as u8, ChipState::TxTune)?;
        if !self.poll(PH_PACKET_RX, deadline::SHORT_RX)? {
            return Ok(None);
        }
        let mut rx = [0u8; JOIN_ACK_LEN];
        self.download(&mut rx, key)?;

        let mut buf = [0u8; RCV_RUMOR_LEN];
        buf[0] = long_first;
        buf[1..].copy_from_slice(&rx);
        if !k.crc().check(&buf) || buf[2] & msg::RUMOR_BIT == 0 {
            debug!("Discarding frame after chirp");
            return Ok(None);
        }
        self.stats.record_rx();
        let rumor = ReceivedRumor(buf);

        self.radio.reset_fifo(Fifo::TX)?;
        let ack = build_rumor_ack(k, rumor.sender(), st.gateway_id);
        self.upload(&ack, key)?;
        self.transmit(RUMOR_ACK_LEN, ChipState::Ready, deadline::SHORT_RX)?;
        Ok(Some(rumor))
    }

    /// Offer the rumor in `st.msgbuf` to chirping neighbours for up to
    /// `time_left << 8` counts.
    ///
    /// Returns true when a neighbour acked the rumor. Rumor bookkeeping
    /// (`rumor_map`, reasons, listen window) is updated as acks arrive.
    pub fn listen_to_transmit(
        &mut self,
        st: &mut MeshState,
        time_left: u16,
    ) -> Result<bool, RadioError> {
        let timeout = (time_left as u32) << 8;
        let k = st.frame_keys();
        let key = st.scramble_key();
        let short_first = k.first_byte(MSG_LEN_SHORT);

        let start = self.clock.counts();
        let mut rearm = true;
        let mut success = false;
        while !success && self.clock.since(start) < timeout {
            if rearm {
                self.radio.reset_fifo(Fifo::TX)?;
                self.upload(&build_chirp_response(&k), key)?;
                self.radio
                    .configure_sync(&[PREAMBLE, PREAMBLE, CHIRP_MARKER], true)?;
            }

            self.radio.clear_sync();
            self.radio.interrupt_status()?;
            self.radio.start_rx(0, ChipState::TxTune)?;
            let jitter = self.random.below(LISTEN_JITTER) as u32;
            rearm = self.radio.wait_sync((timeout + jitter) / COUNTS_PER_MS);
            if !rearm {
                continue;
            }

            let tx_start = self.clock.counts();
            self.radio.start_tx(CHIRP_RESPONSE_LEN as u8, ChipState::RxTune)?;
            self.radio.interrupt_status()?;
            self.radio
                .configure_sync(&[FRAME_MARKER, short_first], true)?;
            if self.poll_since(PH_PACKET_SENT, tx_start, deadline::SHORT_RX)? {
                self.stats.record_tx();
            }

            self.radio.start_rx(OK_PEEK_LEN, ChipState::TxTune)?;
            if !self.poll(PH_PACKET_RX, deadline::SHORT_RX)? {
                continue;
            }
            let mut ok = [0u8; OK_PEEK_LEN as usize];
            self.download(&mut ok, key)?;
            let id = ok[0] & SID_MASK;
            if !st.sid_map.contains(id) {
                continue;
            }
            self.stats.record_rx();
            st.nbr_map.set(id);

            let propagating = st.current == Some(RumorReason::PropagateRumor);
            if !propagating && st.rumor_map.contains(id) {
                self.send_rumor(st, false, key)?;
                if self.rumor_acked(st, id, MM_XOR_REV12)? {
                    st.rumor_map.clear(id);
                    if st.rumor_map.is_empty() {
                        st.listen_time_left = 0;
                    }
                    debug!("Rumor delivered to {}", id);
                    success = true;
                }
            } else if propagating && st.propagate_map.contains(id) {
                let old_news = !st.rumor_map.contains(id);
                self.send_rumor(st, old_news, key)?;
                if self.rumor_acked(st, id, MM_XOR_REV12)? {
                    st.rumor_map.clear(id);
                    self.hand_over(st, id, key)?;
                    success = true;
                }
            }
        }

        self.radio.interrupt_status()?;
        self.radio
            .set_property(prop::INT_CTL_GROUP, prop::INT_CTL_ENABLE, 0)?;
        Ok(success)
    }

    /// After a propagating delivery: either everybody has it now, or ask
    /// `id` to take the rumor over.
    fn hand_over(&mut self, st: &mut MeshState, id: u8, key: u8) -> Result<(), RadioError> {
        if st.rumor_map.is_empty() {
            st.reasons.remove(RumorReason::PropagateRumor);
            st.current = Some(RumorReason::SpreadRumor);
            st.reasons.insert(RumorReason::SpreadRumor);
            st.listen_time_left = 0;
            return Ok(());
        }

        st.build_targeted(msg::PROPAGATE, id);
        self.radio.reset_fifo(Fifo::TX)?;
        let frame = st.msgbuf;
        self.upload(&frame, key)?;
        self.radio.interrupt_status()?;
        self.transmit(RUMOR_LEN, ChipState::RxTune, deadline::RUMOR_SENT)?;

        if self.rumor_acked(st, id, MM_XOR_PROPAGATE_ACK)? {
            info!("Rumor handed over to {}", id);
            if let Some(reason) = st.current.take() {
                st.reasons.remove(reason);
            }
            st.listen_time_left = 0;
        } else {
            st.reload_rumor();
        }
        Ok(())
    }

    /// Put the rumor on the air, marked old news or not for the receiver.
    fn send_rumor(&mut self, st: &mut MeshState, old_news: bool, key: u8) -> Result<bool, RadioError> {
        let k = st.frame_keys();
        mark_old_news(&mut st.msgbuf, &k, old_news);
        let frame = st.msgbuf;
        self.radio.reset_fifo(Fifo::TX)?;
        self.upload(&frame, key)?;
        self.clock.delay_ms(1);
        self.radio.interrupt_status()?;
        self.transmit(RUMOR_LEN, ChipState::RxTune, deadline::RUMOR_SENT)
    }

    fn rumor_acked(&mut self, st: &MeshState, id: u8, xor: u8) -> Result<bool, RadioError> {
        Ok(match self.receive_ack(st, id)? {
            Some(ack) => ack.accepted(id, st.sid, st.keys[2] ^ xor),
            None => false,
        })
    }

    /// Receive a 7-byte ack from `id` within 10 ms.
    pub fn receive_ack(&mut self, st: &MeshState, id: u8) -> Result<Option<AckFrame>, RadioError> {
        let k = st.frame_keys();
        let key = st.scramble_key();
        let medium_first = k.first_byte(MSG_LEN_MEDIUM);
        self.radio
            .configure_sync(&[PREAMBLE, PREAMBLE, FRAME_MARKER, medium_first], true)?;

        let start = self.clock.counts();
        let mut ack = None;
        while ack.is_none() && self.clock.since(start) < deadline::ACK_WINDOW {
            self.radio.interrupt_status()?;
            self.radio.start_rx(ACK_LEN as u8, ChipState::Ready)?;
            if !self.poll_since(PH_PACKET_RX, start, deadline::ACK_WINDOW)? {
                break;
            }
            let mut rx = [0u8; ACK_LEN];
            self.download(&mut rx, key)?;
            let mut buf = [0u8; RCV_ACK_LEN];
            buf[0] = medium_first;
            buf[1..].copy_from_slice(&rx);
            if k.crc().check(&buf) && rx[0] & SID_MASK == id {
                ack = Some(AckFrame(buf));
            }
        }
        self.radio.interrupt_status()?;
        if ack.is_some() {
            self.stats.record_rx();
        }
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    #[esp32_test]
    fn test_received_rumor_fields() {
        let mut raw = [0u8; RCV_RUMOR_LEN];
        raw[0] = 0x17;
        raw[1] = 0x40 | 9;
        raw[2] = msg::SD_RUMOR;
        raw[3] = 0x80 | 12;
        raw[4] = 0x35;
        raw[5] = 0xAB;
        raw[6] = 4;
        raw[7] = 0x01 ^ DITHER;
        for b in raw[8..15].iter_mut() {
            *b = DITHER;
        }
        let rumor = ReceivedRumor::from_bytes(raw);
        assert_eq!(rumor.sender(), 9);
        assert!(rumor.old_news());
        assert_eq!(rumor.msg(), msg::SD_RUMOR);
        assert_eq!(rumor.initiator(), 12);
        assert_eq!(rumor.seq(), 3);
        assert_eq!(rumor.byte5(), 0xAB);
        assert_eq!(rumor.byte6(), 4);
        assert_eq!(rumor.map(), SidMap::single(0));
    }

    #[esp32_test]
    fn test_ack_acceptance() {
        let key2 = 0x34;
        let ours = AckFrame::from_bytes([0x16, 7, msg::ACKRUMOR, 3, 0x11, key2 ^ MM_XOR_REV12, 0, 0]);
        assert!(ours.accepted(7, 3, key2 ^ MM_XOR_REV12));
        assert!(!ours.accepted(7, 4, key2 ^ MM_XOR_REV12));
        assert!(!ours.accepted(8, 3, key2 ^ MM_XOR_REV12));

        // Older firmware does not say whom it acks.
        let legacy = AckFrame::from_bytes([0x16, 7, msg::ACKRUMOR, 9, 0x11, 0x00, 0, 0]);
        assert!(legacy.accepted(7, 3, key2 ^ MM_XOR_REV12));

        let wrong_type = AckFrame::from_bytes([0x16, 7, msg::JOINED, 3, 0, 0, 0, 0]);
        assert!(!wrong_type.accepted(7, 3, key2 ^ MM_XOR_REV12));
    }

    #[esp32_test]
    fn test_propagate_ack_discriminator() {
        let key2 = 0x34;
        let ack = AckFrame::from_bytes([0x16, 7, msg::ACKRUMOR, 5, 0, key2 ^ MM_XOR_PROPAGATE_ACK, 0, 0]);
        assert!(!ack.accepted(7, 3, key2 ^ MM_XOR_PROPAGATE_ACK));
        assert!(ack.accepted(7, 5, key2 ^ MM_XOR_PROPAGATE_ACK));
    }
}
