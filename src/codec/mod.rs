//! WiSafe-2 wire codec.
//!
//! This module contains:
//! - [`consts`]: Message types, length codes, flag bits and frame lengths
//! - [`crc`]: The mesh CRC-16 (poly 0x8005, key-seeded)
//! - [`map`]: 8-byte SID bitmaps, dithering and bit helpers
//! - [`frame`]: Frame builders for every radio exchange
//!
//! Nothing here touches the radio; every function is a pure transform of
//! mesh state into bytes or back.

pub mod consts;
mod crc;
mod frame;
mod map;

pub use crc::{crc_of, MeshCrc, CRC_CHECK_OK};
pub use frame::{
    build_chirp, build_chirp_response, build_join_request, build_ok, build_rumor,
    build_rumor_ack, mark_old_news, scramble, FrameKeys, RumorFields, RumorFrame,
};
pub use map::{reverse_byte, seq_field, SidMap, MAP_SIZE};
