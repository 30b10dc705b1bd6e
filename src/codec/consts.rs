//! Wire constants shared with deployed WiSafe-2 devices.
//!
//! These values are fixed by the installed base and must not change.

/// Mesh message type byte (third byte after the length code).
pub mod msg {
    pub const JOINREQ: u8 = 0x00;
    pub const JOINACK: u8 = 0x01;
    pub const ACKRUMOR: u8 = 0x03;
    pub const PROPAGATE: u8 = 0x04;
    pub const MFCT_STAMP: u8 = 0x14;
    pub const JOINED: u8 = 0x22;
    pub const CONFIRM: u8 = 0x29;
    pub const STATUSREPLY: u8 = 0x2C;
    pub const SD_RUMOR: u8 = 0x2E;
    pub const MAPREPLY: u8 = 0x36;
    pub const STATUSREQ: u8 = 0x6B;
    pub const MAPREQ: u8 = 0x75;
    pub const SIDMAP_UPDATE: u8 = 0x77;

    /// Set in every type that travels as a rumor.
    pub const RUMOR_BIT: u8 = 0x20;
    /// Set in every type whose initiator expects a confirmation.
    pub const CONFIRM_BIT: u8 = 0x40;
}

/// Length codes carried in the low two bits of the first payload byte.
pub const MSG_LEN_TINY: u8 = 0;
pub const MSG_LEN_SHORT: u8 = 1;
pub const MSG_LEN_MEDIUM: u8 = 2;
pub const MSG_LEN_LONG: u8 = 3;

/// Sender-byte flag: the receiver already had this rumor.
pub const OLD_NEWS_BIT: u8 = 0x40;
/// Sender-byte flag on SD rumors and propagate frames.
pub const URGENT_BIT: u8 = 0x80;
/// Invite flag in the first byte of an inviting chirp.
pub const INVITING_BIT: u8 = 0x80;
/// Join request filler flag.
pub const FILLER: u8 = 0x80;

/// XOR applied to bitmaps embedded in frames.
pub const DITHER: u8 = 0xCC;
/// Firmware revision advertised in join requests and status replies.
pub const FWREV: u8 = 0;

pub const SID_MASK: u8 = 0x3F;
pub const NULL_SID: u8 = 0x40;
pub const NULL_MID: u8 = 0;

/// Rumor-ack discriminator for acks that name their target (`Key2 ^ 0x93`).
pub const MM_XOR_REV12: u8 = 0x93;
/// Propagate-ack discriminator (`Key2 ^ 0x92`).
pub const MM_XOR_PROPAGATE_ACK: u8 = 0x92;

/// Bytes before the CRC-covered area of every frame.
pub const PREAMBLE_LEN: usize = 4;

pub const JOIN_REQUEST_LEN: usize = 21;
pub const RUMOR_LEN: usize = 21;
pub const JOIN_ACK_LEN: usize = 16;
pub const ACK_LEN: usize = 7;
pub const CHIRP_LEN: usize = 4;
pub const CHIRP_RESPONSE_LEN: usize = 5;
pub const RUMOR_ACK_LEN: usize = 12;
pub const OK_LEN: usize = 8;

/// Preamble bytes. Frames start `2A AA AA` (or `AA AA AA`) then a marker.
pub const PREAMBLE_START: u8 = 0x2A;
pub const PREAMBLE: u8 = 0xAA;
/// Marker byte that precedes a length-coded frame.
pub const FRAME_MARKER: u8 = 0xA9;
/// Marker byte that ends a bare chirp.
pub const CHIRP_MARKER: u8 = 0xA8;

pub const DEFAULT_TTL: u8 = 5;

/// Mesh keys of the reserved production-test mesh.
pub const RESERVED_KEY: u8 = 0x99;

/// Frequency calibration key pair marking a persisted calibration.
pub const FREQ_KEY0: u8 = 29;
pub const FREQ_KEY1: u8 = 13;

/// Manufacturing stamp bytes.
pub const MFCT_STAMP0: u8 = 0x67;
pub const MFCT_STAMP1: u8 = 0x89;

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    #[esp32_test]
    fn test_rumor_bit_marks_rumor_types() {
        for t in [
            msg::JOINED,
            msg::CONFIRM,
            msg::STATUSREPLY,
            msg::SD_RUMOR,
            msg::MAPREPLY,
            msg::STATUSREQ,
            msg::MAPREQ,
            msg::SIDMAP_UPDATE,
        ] {
            assert_ne!(t & msg::RUMOR_BIT, 0, "type {:02X}", t);
        }
        assert_eq!(msg::PROPAGATE & msg::RUMOR_BIT, 0);
        assert_eq!(msg::MFCT_STAMP & msg::RUMOR_BIT, 0);
    }

    #[esp32_test]
    fn test_confirm_bit_only_on_confirmed_types() {
        let confirmed = [msg::STATUSREQ, msg::MAPREQ, msg::SIDMAP_UPDATE];
        for t in confirmed {
            assert_ne!(t & msg::CONFIRM_BIT, 0);
        }
        assert_eq!(msg::JOINED & msg::CONFIRM_BIT, 0);
        assert_eq!(msg::SD_RUMOR & msg::CONFIRM_BIT, 0);
    }
}
