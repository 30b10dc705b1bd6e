//! Board-supplied radio configuration.
//!
//! The patch rows and property values come from the radio vendor's
//! configuration tool for the WiSafe-2 band plan. They carry no meaning the
//! stack relies on beyond being streamed to the chip in order; treat them
//! as opaque calibration data and cross-check against the datasheet before
//! editing.

/// One SET_PROPERTY write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property {
    pub group: u8,
    pub number: u8,
    pub value: u8,
}

impl Property {
    pub const fn new(group: u8, number: u8, value: u8) -> Self {
        Self {
            group,
            number,
            value,
        }
    }
}

/// Patch table and property list applied by `Si446x::init`.
#[derive(Debug, Clone, Copy)]
pub struct RadioProfile {
    /// Each row is a command byte followed by seven argument bytes.
    pub patch: &'static [[u8; 8]],
    pub properties: &'static [Property],
}

impl RadioProfile {
    /// Profile used by deployed WiSafe-2 gateways (30 MHz crystal).
    pub const WISAFE: RadioProfile = RadioProfile {
        patch: &WISAFE_PATCH,
        properties: &WISAFE_PROPERTIES,
    };

    /// Profile with no patch and no properties, for simulated chips.
    pub const EMPTY: RadioProfile = RadioProfile {
        patch: &[],
        properties: &[],
    };
}

impl Default for RadioProfile {
    fn default() -> Self {
        Self::WISAFE
    }
}

/// Firmware patch rows streamed to the chip after reset, one command per row.
pub const WISAFE_PATCH: [[u8; 8]; 64] = [
    [0x04, 0x21, 0x71, 0x4B, 0x00, 0x00, 0xDC, 0x95],
    [0x05, 0xA6, 0x22, 0x21, 0xF0, 0x41, 0x5B, 0x26],
    [0xE2, 0x2F, 0x1C, 0xBB, 0x0A, 0xA8, 0x94, 0x28],
    [0x05, 0x87, 0x67, 0xE2, 0x58, 0x1A, 0x07, 0x5B],
    [0xE1, 0xD0, 0x72, 0xD8, 0x8A, 0xB8, 0x5B, 0x7D],
    [0x05, 0x11, 0xEC, 0x9E, 0x28, 0x23, 0x1B, 0x6D],
    [0xE2, 0x4F, 0x8A, 0xB2, 0xA9, 0x29, 0x14, 0x13],
    [0x05, 0xD1, 0x2E, 0x71, 0x6A, 0x51, 0x4C, 0x2C],
    [0xE5, 0x80, 0x27, 0x42, 0xA4, 0x69, 0xB0, 0x7F],
    [0x05, 0xAA, 0x81, 0x2A, 0xBD, 0x45, 0xE8, 0xA8],
    [0xEA, 0xE4, 0xF0, 0x24, 0xC9, 0x9F, 0xCC, 0x3C],
    [0x05, 0x08, 0xF5, 0x05, 0x04, 0x27, 0x62, 0x98],
    [0xEA, 0x6B, 0x62, 0x84, 0xA1, 0xF9, 0x4A, 0xE2],
    [0x05, 0xE9, 0x77, 0x05, 0x4F, 0x84, 0xEE, 0x35],
    [0xE2, 0x43, 0xC3, 0x8D, 0xFB, 0xAD, 0x54, 0x25],
    [0x05, 0x14, 0x06, 0x5E, 0x39, 0x36, 0x2F, 0x45],
    [0xEA, 0x0C, 0x1C, 0x74, 0xD0, 0x11, 0xFC, 0x32],
    [0x05, 0xDA, 0x38, 0xBA, 0x0E, 0x3C, 0xE7, 0x8B],
    [0xEA, 0xB0, 0x09, 0xE6, 0xFF, 0x94, 0xBB, 0xA9],
    [0x05, 0xD7, 0x11, 0x29, 0xFE, 0xDC, 0x71, 0xD5],
    [0xEA, 0x7F, 0x83, 0xA7, 0x60, 0x90, 0x62, 0x18],
    [0x05, 0x84, 0x7F, 0x6A, 0xD1, 0x91, 0xC6, 0x52],
    [0xEA, 0x2A, 0xD8, 0x7B, 0x8E, 0x4A, 0x9F, 0x91],
    [0x05, 0xBD, 0xAA, 0x9D, 0x16, 0x18, 0x06, 0x15],
    [0xE2, 0x55, 0xAD, 0x2D, 0x0A, 0x14, 0x1F, 0x5D],
    [0x05, 0xD3, 0xE0, 0x7C, 0x39, 0xCF, 0x01, 0xF0],
    [0xEF, 0x3A, 0x91, 0x72, 0x6A, 0x03, 0xBB, 0x96],
    [0xE7, 0x83, 0x6D, 0xA4, 0x92, 0xFC, 0x13, 0xA7],
    [0xEF, 0xF8, 0xFD, 0xCF, 0x62, 0x07, 0x6F, 0x1E],
    [0xE7, 0x4C, 0xEA, 0x4A, 0x75, 0x4F, 0xD6, 0xCF],
    [0xE2, 0xF6, 0x11, 0xE4, 0x26, 0x0D, 0x4D, 0xC6],
    [0x05, 0xFB, 0xBF, 0xE8, 0x07, 0x89, 0xC3, 0x51],
    [0xEF, 0x82, 0x27, 0x04, 0x3F, 0x96, 0xA8, 0x58],
    [0xE7, 0x41, 0x29, 0x3C, 0x75, 0x2A, 0x03, 0x1C],
    [0xEF, 0xAF, 0x59, 0x98, 0x36, 0xAA, 0x0F, 0x06],
    [0xE6, 0xF6, 0x93, 0x41, 0x2D, 0xEC, 0x0E, 0x99],
    [0x05, 0x29, 0x19, 0x90, 0xE5, 0xAA, 0x36, 0x40],
    [0xE7, 0xFB, 0x68, 0x10, 0x7D, 0x77, 0x5D, 0xC0],
    [0xE7, 0xCB, 0xB4, 0xDD, 0xCE, 0x90, 0x54, 0xBE],
    [0xE7, 0x72, 0x8A, 0xD6, 0x02, 0xF4, 0xDD, 0xCC],
    [0xE7, 0x6A, 0x21, 0x0B, 0x02, 0x86, 0xEC, 0x15],
    [0xE7, 0x7B, 0x7C, 0x3D, 0x6B, 0x81, 0x03, 0xD0],
    [0xEF, 0x7D, 0x61, 0x36, 0x94, 0x7C, 0xA0, 0xDF],
    [0xEF, 0xCC, 0x85, 0x3B, 0xDA, 0xE0, 0x5C, 0x1C],
    [0xE7, 0xE3, 0x75, 0xBB, 0x39, 0x22, 0x4B, 0xA8],
    [0xEF, 0xF9, 0xCE, 0xE0, 0x5E, 0xEB, 0x1D, 0xCB],
    [0xE7, 0xBD, 0xE2, 0x70, 0xD5, 0xAB, 0x4E, 0x3F],
    [0xE7, 0xB7, 0x8D, 0x20, 0x68, 0x6B, 0x09, 0x52],
    [0xEF, 0xA1, 0x1B, 0x90, 0xCD, 0x98, 0x00, 0x63],
    [0xEF, 0x54, 0x67, 0x5D, 0x9C, 0x11, 0xFC, 0x45],
    [0xE7, 0xD4, 0x9B, 0xC8, 0x97, 0xBE, 0x8A, 0x07],
    [0xEF, 0x52, 0x8D, 0x90, 0x63, 0x73, 0xD5, 0x2A],
    [0xEF, 0x03, 0xBC, 0x6E, 0x1C, 0x76, 0xBE, 0x4A],
    [0xE7, 0xC2, 0xED, 0x67, 0xBA, 0x5E, 0x66, 0x21],
    [0xEF, 0xE7, 0x3F, 0x87, 0xBE, 0xE0, 0x7A, 0x6D],
    [0xE7, 0xC9, 0x70, 0x93, 0x1D, 0x64, 0xF5, 0x6C],
    [0xEF, 0xF5, 0x28, 0x08, 0x34, 0xB3, 0xB6, 0x2C],
    [0xEF, 0x3A, 0x0A, 0xEC, 0x0F, 0xDB, 0x56, 0xCA],
    [0xEF, 0x39, 0xA0, 0x6E, 0xED, 0x79, 0xD0, 0x24],
    [0xE7, 0x6C, 0x0B, 0xAF, 0xA9, 0x4E, 0x40, 0xB5],
    [0xE9, 0xB9, 0xAF, 0xBF, 0x25, 0x50, 0xD1, 0x37],
    [0x05, 0x9E, 0xDB, 0xDE, 0x3F, 0x94, 0xE9, 0x6B],
    [0xEC, 0xC5, 0x05, 0xAA, 0x57, 0xDC, 0x8A, 0x5E],
    [0x05, 0x70, 0xDA, 0x84, 0x84, 0xDD, 0xCA, 0x90],
];

/// Property writes applied after power-up, as `(group, number, value)`.
pub const WISAFE_PROPERTIES: [Property; 175] = [
    Property::new(0x00, 0x00, 0x52),
    Property::new(0x00, 0x01, 0x00),
    Property::new(0x00, 0x03, 0x20),
    Property::new(0x01, 0x00, 0x00),
    Property::new(0x01, 0x02, 0x00),
    Property::new(0x02, 0x00, 0x00),
    Property::new(0x02, 0x01, 0x00),
    Property::new(0x02, 0x02, 0x00),
    Property::new(0x02, 0x03, 0x00),
    Property::new(0x22, 0x00, 0x20),
    Property::new(0x22, 0x01, 0x7F),
    Property::new(0x22, 0x02, 0x00),
    Property::new(0x20, 0x00, 0x03),
    Property::new(0x20, 0x01, 0x00),
    Property::new(0x20, 0x02, 0x07),
    Property::new(0x20, 0x51, 0x08),
    Property::new(0x20, 0x4A, 0xFF),
    Property::new(0x20, 0x4C, 0x00),
    Property::new(0x10, 0x00, 0x00),
    Property::new(0x10, 0x01, 0x00),
    Property::new(0x10, 0x02, 0x00),
    Property::new(0x10, 0x03, 0x0F),
    Property::new(0x10, 0x04, 0x31),
    Property::new(0x10, 0x05, 0x00),
    Property::new(0x10, 0x06, 0x00),
    Property::new(0x10, 0x07, 0x00),
    Property::new(0x10, 0x08, 0x00),
    Property::new(0x11, 0x00, 0x00),
    Property::new(0x11, 0x01, 0x55),
    Property::new(0x11, 0x02, 0x55),
    Property::new(0x11, 0x03, 0x95),
    Property::new(0x11, 0x04, 0x80),
    Property::new(0x11, 0x05, 0x00),
    Property::new(0x12, 0x00, 0x00),
    Property::new(0x12, 0x03, 0xFF),
    Property::new(0x12, 0x04, 0xFF),
    Property::new(0x12, 0x05, 0x00),
    Property::new(0x12, 0x06, 0x00),
    Property::new(0x12, 0x08, 0x00),
    Property::new(0x12, 0x09, 0x00),
    Property::new(0x12, 0x0A, 0x00),
    Property::new(0x12, 0x0B, 0x30),
    Property::new(0x12, 0x0C, 0x30),
    Property::new(0x12, 0x0D, 0x00),
    Property::new(0x12, 0x0E, 0x00),
    Property::new(0x12, 0x0F, 0x00),
    Property::new(0x12, 0x10, 0x80),
    Property::new(0x12, 0x11, 0x00),
    Property::new(0x12, 0x12, 0x00),
    Property::new(0x12, 0x13, 0x00),
    Property::new(0x12, 0x14, 0x00),
    Property::new(0x12, 0x15, 0x00),
    Property::new(0x12, 0x16, 0x00),
    Property::new(0x12, 0x17, 0x00),
    Property::new(0x12, 0x18, 0x00),
    Property::new(0x12, 0x19, 0x00),
    Property::new(0x12, 0x1A, 0x00),
    Property::new(0x12, 0x1B, 0x00),
    Property::new(0x12, 0x1C, 0x00),
    Property::new(0x12, 0x1D, 0x00),
    Property::new(0x12, 0x1E, 0x00),
    Property::new(0x12, 0x1F, 0x00),
    Property::new(0x12, 0x20, 0x00),
    Property::new(0x12, 0x21, 0x00),
    Property::new(0x12, 0x22, 0x00),
    Property::new(0x12, 0x23, 0x00),
    Property::new(0x12, 0x24, 0x00),
    Property::new(0x12, 0x25, 0x00),
    Property::new(0x12, 0x26, 0x00),
    Property::new(0x12, 0x27, 0x00),
    Property::new(0x12, 0x28, 0x00),
    Property::new(0x12, 0x29, 0x00),
    Property::new(0x12, 0x2A, 0x00),
    Property::new(0x12, 0x2B, 0x00),
    Property::new(0x12, 0x2C, 0x00),
    Property::new(0x12, 0x2D, 0x00),
    Property::new(0x12, 0x2E, 0x00),
    Property::new(0x12, 0x2F, 0x00),
    Property::new(0x12, 0x30, 0x00),
    Property::new(0x12, 0x31, 0x00),
    Property::new(0x12, 0x32, 0x00),
    Property::new(0x12, 0x33, 0x00),
    Property::new(0x12, 0x34, 0x00),
    Property::new(0x30, 0x00, 0x00),
    Property::new(0x30, 0x01, 0x00),
    Property::new(0x30, 0x02, 0x00),
    Property::new(0x30, 0x03, 0x00),
    Property::new(0x30, 0x04, 0x00),
    Property::new(0x30, 0x05, 0x00),
    Property::new(0x30, 0x06, 0x00),
    Property::new(0x30, 0x07, 0x00),
    Property::new(0x30, 0x08, 0x00),
    Property::new(0x30, 0x09, 0x00),
    Property::new(0x30, 0x0A, 0x00),
    Property::new(0x30, 0x0B, 0x00),
    Property::new(0x20, 0x03, 0x13),
    Property::new(0x20, 0x04, 0x88),
    Property::new(0x20, 0x05, 0x00),
    Property::new(0x20, 0x06, 0x09),
    Property::new(0x20, 0x07, 0xC9),
    Property::new(0x20, 0x08, 0xC3),
    Property::new(0x20, 0x09, 0x80),
    Property::new(0x20, 0x0A, 0x00),
    Property::new(0x20, 0x0B, 0x02),
    Property::new(0x20, 0x0C, 0xBB),
    Property::new(0x20, 0x18, 0x01),
    Property::new(0x22, 0x03, 0x1D),
    Property::new(0x40, 0x00, 0x38),
    Property::new(0x40, 0x01, 0x0F),
    Property::new(0x40, 0x02, 0x17),
    Property::new(0x40, 0x03, 0xE4),
    Property::new(0x40, 0x04, 0x22),
    Property::new(0x40, 0x05, 0x22),
    Property::new(0x40, 0x06, 0x20),
    Property::new(0x40, 0x07, 0xFF),
    Property::new(0x20, 0x19, 0x00),
    Property::new(0x20, 0x1A, 0x08),
    Property::new(0x20, 0x1B, 0x03),
    Property::new(0x20, 0x1C, 0xC0),
    Property::new(0x20, 0x1D, 0x00),
    Property::new(0x20, 0x1E, 0x10),
    Property::new(0x20, 0x1F, 0x10),
    Property::new(0x20, 0x22, 0x00),
    Property::new(0x20, 0x23, 0x4E),
    Property::new(0x20, 0x24, 0x06),
    Property::new(0x20, 0x25, 0x8D),
    Property::new(0x20, 0x26, 0xB9),
    Property::new(0x20, 0x27, 0x07),
    Property::new(0x20, 0x28, 0xFF),
    Property::new(0x20, 0x29, 0x02),
    Property::new(0x20, 0x2A, 0x00),
    Property::new(0x20, 0x2C, 0x00),
    Property::new(0x20, 0x2D, 0x12),
    Property::new(0x20, 0x2E, 0x81),
    Property::new(0x20, 0x2F, 0x18),
    Property::new(0x20, 0x30, 0x01),
    Property::new(0x20, 0x31, 0xAC),
    Property::new(0x20, 0x32, 0xA0),
    Property::new(0x20, 0x35, 0xE0),
    Property::new(0x20, 0x38, 0x11),
    Property::new(0x20, 0x39, 0x11),
    Property::new(0x20, 0x3A, 0x11),
    Property::new(0x20, 0x3B, 0x80),
    Property::new(0x20, 0x3C, 0x1A),
    Property::new(0x20, 0x3D, 0x28),
    Property::new(0x20, 0x3E, 0x00),
    Property::new(0x20, 0x3F, 0x00),
    Property::new(0x20, 0x40, 0x28),
    Property::new(0x20, 0x42, 0xA4),
    Property::new(0x20, 0x43, 0x23),
    Property::new(0x20, 0x50, 0x84),
    Property::new(0x20, 0x45, 0x03),
    Property::new(0x20, 0x46, 0x00),
    Property::new(0x20, 0x47, 0xA6),
    Property::new(0x20, 0x48, 0x01),
    Property::new(0x20, 0x49, 0x00),
    Property::new(0x20, 0x4E, 0x40),
    Property::new(0x21, 0x00, 0xCC),
    Property::new(0x21, 0x01, 0xA1),
    Property::new(0x21, 0x02, 0x30),
    Property::new(0x21, 0x03, 0xA0),
    Property::new(0x21, 0x04, 0x21),
    Property::new(0x21, 0x05, 0xD1),
    Property::new(0x21, 0x06, 0xB9),
    Property::new(0x21, 0x07, 0xC9),
    Property::new(0x21, 0x08, 0xEA),
    Property::new(0x21, 0x09, 0x05),
    Property::new(0x21, 0x0A, 0x12),
    Property::new(0x21, 0x0B, 0x11),
    Property::new(0x21, 0x0C, 0x0A),
    Property::new(0x21, 0x0D, 0x04),
    Property::new(0x21, 0x0E, 0x15),
    Property::new(0x21, 0x0F, 0xFC),
    Property::new(0x21, 0x10, 0x03),
    Property::new(0x21, 0x11, 0x00),
];
