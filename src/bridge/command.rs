//! Classification of decoded host messages.
//!
//! The first byte selects the command; the length decides between commands
//! that share a first byte with the transparent pass-through.

use super::escape::HostMessage;
use crate::codec::SidMap;

/// Message type bytes exchanged with the host.
pub mod spimsg {
    pub const ACK: u8 = 0x46;
    pub const NACK: u8 = 0x47;
    pub const UNIT_TEST: u8 = 0x70;
    pub const ALARM_IDENT: u8 = 0x91;
    pub const DO_EXDIG_ID: u8 = 0xC3;
    pub const DIAG_REQ: u8 = 0xD1;
    pub const DIAG_RESULT: u8 = 0xD2;
    pub const EXTENDED_REQ: u8 = 0xD3;
    pub const EXTENDED_RESPONSE: u8 = 0xD4;
    pub const CLEAR_CMD: u8 = 0xE2;
    pub const RESET_CMD: u8 = 0xE5;
    pub const ID_REQ: u8 = 0xE6;
    pub const ID_RESPONSE: u8 = 0xE7;
    pub const PROD_TEST_CMD: u8 = 0xE8;
    pub const PROD_TEST_RESPONSE: u8 = 0xE9;
    pub const MFCT_MODE: u8 = 0xEA;
    pub const OPER_MODE: u8 = 0xEB;

    pub const INC_FREQ: u8 = b'I';
    pub const DEC_FREQ: u8 = b'D';
    pub const FINE_INC_FREQ: u8 = b'H';
    pub const FINE_DEC_FREQ: u8 = b'C';
    pub const EXIT_FREQ: u8 = b'E';
    pub const SAVE_FREQ: u8 = b'S';
}

/// Options of the extended request and response.
pub mod extended {
    pub const MISSING_MAP: u8 = 0x01;
    pub const SIDMAP: u8 = 0x03;
    pub const SIDMAP_UPDATE: u8 = 0x04;
    pub const REMOTE_STATUS: u8 = 0x06;
    pub const REMOTE_ID: u8 = 0x09;
    pub const REMOTE_MAP: u8 = 0x11;
    pub const BUTTON_PRESS: u8 = 0x12;
    pub const SD_RUMOR_TARGET: u8 = 0x1A;
}

/// Longest message spread as a transparent rumor.
pub const MAX_TRANSPARENT_LEN: usize = 9;

/// Step of the continuous-transmit frequency tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tune {
    Increment,
    Decrement,
    FineIncrement,
    FineDecrement,
    /// Restore defaults and leave.
    Exit,
    /// Persist and leave.
    Save,
}

/// A classified host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Unit-test message, spread like a transparent one but not acked.
    UnitTest { payload: [u8; MAX_TRANSPARENT_LEN], len: u8 },
    /// The attached alarm announces itself.
    AlarmIdent { id: [u8; 3], model: [u8; 2] },
    Diagnostic,
    Clear,
    Reset,
    IdRequest,
    Tune(Tune),
    /// `EA 'M' 'F' 'T'`: clear the manufacturing stamp.
    ManufacturingMode,
    /// `EB 'O' 'P' 'R'`: write the manufacturing stamp.
    OperationalMode,
    Extended {
        len: usize,
        option: u8,
        arg2: u8,
        arg3: u8,
        /// Bytes 2..10, meaningful for a SID map update.
        new_map: SidMap,
    },
    ProductionTest { len: usize, test: u8 },
    /// Anything short enough is spread as an SD rumor.
    Transparent { payload: [u8; MAX_TRANSPARENT_LEN], len: u8 },
}

/// Why a message was not turned into a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Empty frame.
    Empty,
    /// A tuning byte outside continuous-transmit mode.
    NotTuning,
    /// Unknown or malformed.
    Invalid,
}

fn pass_thru(msg: &HostMessage) -> ([u8; MAX_TRANSPARENT_LEN], u8) {
    let mut payload = [0u8; MAX_TRANSPARENT_LEN];
    for (i, b) in payload.iter_mut().enumerate() {
        *b = msg.byte(i);
    }
    (payload, msg.len().min(MAX_TRANSPARENT_LEN) as u8)
}

fn tune_step(byte: u8) -> Option<Tune> {
    match byte {
        spimsg::INC_FREQ => Some(Tune::Increment),
        spimsg::DEC_FREQ => Some(Tune::Decrement),
        spimsg::FINE_INC_FREQ => Some(Tune::FineIncrement),
        spimsg::FINE_DEC_FREQ => Some(Tune::FineDecrement),
        spimsg::EXIT_FREQ => Some(Tune::Exit),
        spimsg::SAVE_FREQ => Some(Tune::Save),
        _ => None,
    }
}

impl HostCommand {
    /// Classify a decoded message. Tuning bytes are only commands while
    /// `tuning` is set.
    pub fn classify(msg: &HostMessage, tuning: bool) -> Result<Self, Rejected> {
        if msg.is_empty() {
            return Err(Rejected::Empty);
        }
        let len = msg.len();
        let first = msg.byte(0);

        if (len == 6 || len == 8) && first == spimsg::UNIT_TEST {
            let (mut payload, len) = pass_thru(msg);
            payload[8] = 0;
            return Ok(Self::UnitTest { payload, len });
        }
        if len >= 7 && first == spimsg::ALARM_IDENT {
            return Ok(Self::AlarmIdent {
                id: [msg.byte(1), msg.byte(2), msg.byte(3)],
                model: [msg.byte(4), msg.byte(5)],
            });
        }
        if len == 1 {
            match first {
                spimsg::DIAG_REQ => return Ok(Self::Diagnostic),
                spimsg::CLEAR_CMD => return Ok(Self::Clear),
                spimsg::RESET_CMD => return Ok(Self::Reset),
                spimsg::ID_REQ => return Ok(Self::IdRequest),
                _ => {}
            }
            if let Some(step) = tune_step(first) {
                return if tuning {
                    Ok(Self::Tune(step))
                } else {
                    Err(Rejected::NotTuning)
                };
            }
        }
        if len == 4 && first == spimsg::MFCT_MODE {
            return match &msg.as_slice()[1..] {
                [b'M', b'F', b'T'] => Ok(Self::ManufacturingMode),
                _ => Err(Rejected::Invalid),
            };
        }
        if len == 4 && first == spimsg::OPER_MODE {
            return match &msg.as_slice()[1..] {
                [b'O', b'P', b'R'] => Ok(Self::OperationalMode),
                _ => Err(Rejected::Invalid),
            };
        }
        if first == spimsg::EXTENDED_REQ {
            let mut map = [0u8; 8];
            for (i, b) in map.iter_mut().enumerate() {
                *b = msg.byte(2 + i);
            }
            return Ok(Self::Extended {
                len,
                option: msg.byte(1),
                arg2: msg.byte(2),
                arg3: msg.byte(3),
                new_map: SidMap::from_bytes(map),
            });
        }
        if first == spimsg::PROD_TEST_CMD {
            return Ok(Self::ProductionTest {
                len,
                test: msg.byte(1),
            });
        }
        if len <= MAX_TRANSPARENT_LEN {
            let (payload, len) = pass_thru(msg);
            return Ok(Self::Transparent { payload, len });
        }
        Err(Rejected::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    fn classify(bytes: &[u8]) -> Result<HostCommand, Rejected> {
        HostCommand::classify(&HostMessage::new(bytes).unwrap(), false)
    }

    #[esp32_test]
    fn test_single_byte_commands() {
        assert_eq!(classify(&[0xD1]), Ok(HostCommand::Diagnostic));
        assert_eq!(classify(&[0xE2]), Ok(HostCommand::Clear));
        assert_eq!(classify(&[0xE5]), Ok(HostCommand::Reset));
        assert_eq!(classify(&[0xE6]), Ok(HostCommand::IdRequest));
    }

    #[esp32_test]
    fn test_tuning_only_in_cw_mode() {
        assert_eq!(classify(b"I"), Err(Rejected::NotTuning));
        let msg = HostMessage::new(b"S").unwrap();
        assert_eq!(
            HostCommand::classify(&msg, true),
            Ok(HostCommand::Tune(Tune::Save))
        );
    }

    #[esp32_test]
    fn test_stamp_magic_words() {
        assert_eq!(classify(b"\xEAMFT"), Ok(HostCommand::ManufacturingMode));
        assert_eq!(classify(b"\xEBOPR"), Ok(HostCommand::OperationalMode));
        assert_eq!(classify(b"\xEAMFX"), Err(Rejected::Invalid));
        assert_eq!(classify(b"\xEBMFT"), Err(Rejected::Invalid));
    }

    #[esp32_test]
    fn test_extended_sid_map_update() {
        let cmd = classify(&[0xD3, 0x04, 0x13, 0, 0, 0, 0, 0, 0, 0x80]).unwrap();
        match cmd {
            HostCommand::Extended {
                len,
                option,
                new_map,
                ..
            } => {
                assert_eq!(len, 10);
                assert_eq!(option, extended::SIDMAP_UPDATE);
                assert!(new_map.contains(0));
                assert!(new_map.contains(1));
                assert!(new_map.contains(4));
                assert!(new_map.contains(63));
                assert_eq!(new_map.count(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[esp32_test]
    fn test_alarm_ident() {
        assert_eq!(
            classify(&[0x91, 1, 2, 3, 4, 5, 6]),
            Ok(HostCommand::AlarmIdent {
                id: [1, 2, 3],
                model: [4, 5]
            })
        );
        // Too short for an ident: falls through to pass-through.
        assert!(matches!(
            classify(&[0x91, 1, 2]),
            Ok(HostCommand::Transparent { len: 3, .. })
        ));
    }

    #[esp32_test]
    fn test_unit_test_lengths() {
        assert!(matches!(
            classify(&[0x70, 1, 2, 3, 4, 5]),
            Ok(HostCommand::UnitTest { len: 6, .. })
        ));
        assert!(matches!(
            classify(&[0x70, 1, 2]),
            Ok(HostCommand::Transparent { len: 3, .. })
        ));
    }

    #[esp32_test]
    fn test_transparent_limit() {
        match classify(&[9, 8, 7, 6, 5, 4, 3, 2, 1]).unwrap() {
            HostCommand::Transparent { payload, len } => {
                assert_eq!(len, 9);
                assert_eq!(payload, [9, 8, 7, 6, 5, 4, 3, 2, 1]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(classify(&[0x11; 10]), Err(Rejected::Invalid));
        assert!(HostCommand::classify(&HostMessage::new(&[]).unwrap(), false).is_err());
    }

    #[esp32_test]
    fn test_production_test() {
        assert_eq!(
            classify(&[0xE8, 0x07]),
            Ok(HostCommand::ProductionTest { len: 2, test: 7 })
        );
    }
}
