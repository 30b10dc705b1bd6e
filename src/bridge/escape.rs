//! Host byte-stream framing.
//!
//! Messages end with [`FLAG`]. A literal `FLAG` or [`ESC`] inside a message
//! is sent as `ESC 0x01` or `ESC 0x02`. The decoder keeps its escape state
//! between calls, so input may arrive one byte at a time.

/// End of message.
pub const FLAG: u8 = 0x7E;
/// Escape prefix.
pub const ESC: u8 = 0x7D;
const ESCAPED_FLAG: u8 = 0x01;
const ESCAPED_ESC: u8 = 0x02;

/// Longest decoded message.
pub const MAX_MESSAGE_LEN: usize = 16;

/// A decoded host message.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HostMessage {
    buf: [u8; MAX_MESSAGE_LEN],
    len: usize,
}

impl HostMessage {
    /// Copy `bytes` into a message. Returns `None` if it is too long.
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_MESSAGE_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            buf,
            len: bytes.len(),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte at `i`, zero past the end.
    pub fn byte(&self, i: usize) -> u8 {
        if i < self.len {
            self.buf[i]
        } else {
            0
        }
    }
}

impl std::fmt::Debug for HostMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostMessage(")?;
        for b in self.as_slice() {
            write!(f, "{:02X}", b)?;
        }
        write!(f, ")")
    }
}

/// Streaming decoder.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    buf: [u8; MAX_MESSAGE_LEN],
    len: usize,
    escaped: bool,
    /// Input overflowed the buffer; drop everything up to the next FLAG.
    discarding: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns a message when `byte` completes one.
    pub fn push(&mut self, byte: u8) -> Option<HostMessage> {
        if self.escaped {
            self.escaped = false;
            self.save(if byte == ESCAPED_FLAG { FLAG } else { ESC });
            return None;
        }
        match byte {
            ESC => {
                self.escaped = true;
                None
            }
            FLAG => self.finish(),
            _ => {
                self.save(byte);
                None
            }
        }
    }

    /// Feed a queue item. Decoding stops at the first FLAG; anything after
    /// it in the item is padding.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Option<HostMessage> {
        for &b in chunk {
            let was_flag = b == FLAG && !self.escaped;
            let msg = self.push(b);
            if was_flag {
                return msg;
            }
        }
        None
    }

    fn save(&mut self, byte: u8) {
        if self.discarding {
            return;
        }
        if self.len < MAX_MESSAGE_LEN {
            self.buf[self.len] = byte;
            self.len += 1;
        } else {
            log::warn!("Host message longer than {} bytes dropped", MAX_MESSAGE_LEN);
            self.len = 0;
            self.discarding = true;
        }
    }

    fn finish(&mut self) -> Option<HostMessage> {
        let msg = if self.discarding {
            None
        } else {
            HostMessage::new(&self.buf[..self.len])
        };
        self.len = 0;
        self.discarding = false;
        msg
    }
}

/// Escape `payload` and terminate it with FLAG.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() * 2 + 1);
    for &b in payload {
        match b {
            FLAG => out.extend_from_slice(&[ESC, ESCAPED_FLAG]),
            ESC => out.extend_from_slice(&[ESC, ESCAPED_ESC]),
            _ => out.push(b),
        }
    }
    out.push(FLAG);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    fn decode_all(stream: &[u8]) -> Vec<Vec<u8>> {
        let mut decoder = Decoder::new();
        stream
            .iter()
            .filter_map(|&b| decoder.push(b))
            .map(|m| m.as_slice().to_vec())
            .collect()
    }

    #[esp32_test]
    fn test_escape_both_specials() {
        let payload = [0x10, FLAG, 0x20, ESC, ESC, FLAG];
        let encoded = encode(&payload);
        assert_eq!(
            encoded,
            vec![0x10, ESC, 0x01, 0x20, ESC, 0x02, ESC, 0x02, ESC, 0x01, FLAG]
        );
        assert_eq!(decode_all(&encoded), vec![payload.to_vec()]);
    }

    #[esp32_test]
    fn test_escape_state_spans_calls() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.push_chunk(&[0xD1, ESC]), None);
        let msg = decoder.push_chunk(&[0x01, FLAG]).unwrap();
        assert_eq!(msg.as_slice(), &[0xD1, FLAG]);
    }

    #[esp32_test]
    fn test_overflow_dropped_next_message_intact() {
        let mut stream = vec![0x55; MAX_MESSAGE_LEN + 4];
        stream.push(FLAG);
        stream.extend_from_slice(&encode(&[0xE6]));
        assert_eq!(decode_all(&stream), vec![vec![0xE6]]);
    }

    #[esp32_test]
    fn test_full_buffer_is_accepted() {
        let payload = [0x33; MAX_MESSAGE_LEN];
        assert_eq!(decode_all(&encode(&payload)), vec![payload.to_vec()]);
    }

    #[esp32_test]
    fn test_chunk_padding_ignored() {
        let mut decoder = Decoder::new();
        let mut item = [0u8; 16];
        item[..3].copy_from_slice(&[0xD3, 0x03, FLAG]);
        let msg = decoder.push_chunk(&item).unwrap();
        assert_eq!(msg.as_slice(), &[0xD3, 0x03]);
        // The padding after FLAG did not start a new message.
        assert_eq!(decoder.push(FLAG).map(|m| m.len()), Some(0));
    }

    #[esp32_test]
    fn test_message_byte_past_end() {
        let msg = HostMessage::new(&[1, 2]).unwrap();
        assert_eq!(msg.byte(1), 2);
        assert_eq!(msg.byte(5), 0);
        assert!(HostMessage::new(&[0; 17]).is_none());
    }
}
